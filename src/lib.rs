//! Mod manager for Marvel's Spider-Man Remastered and Miles Morales.
//!
//! The game-specific logic (load order, archive merging, deployment hooks,
//! installers and tool integration) is written against [`host::Host`];
//! [`app::App`] is the file-backed host driven by [`cli`].

pub mod app;
pub mod archive;
pub mod cli;
pub mod config;
pub mod deploy;
pub mod error;
pub mod game;
pub mod host;
pub mod importer;
pub mod installers;
pub mod library;
pub mod load_order;
pub mod merge;
pub mod nexus;
pub mod orchestrator;
pub mod tools;

#[cfg(test)]
mod testing;
