//! The surface the mod manager exposes to the game integration.
//!
//! Everything in [`crate::load_order`], [`crate::merge`], [`crate::tools`],
//! [`crate::installers`] and [`crate::orchestrator`] talks to the outside world
//! through [`Host`]. The standalone [`crate::app::App`] implements it on top of
//! the file-backed [`crate::library::Library`]; tests use a recording fake.

use crate::game::{GameId, GamePaths};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModAttributes {
    #[serde(default)]
    pub nexus_mod_id: Option<u32>,
    #[serde(default)]
    pub file_id: Option<u64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub uploaded_timestamp: Option<i64>,
    #[serde(default)]
    pub install_time: Option<String>,
    #[serde(default)]
    pub logical_file_name: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mod_type: String,
    pub installation_path: String,
    #[serde(default)]
    pub archive_id: Option<String>,
    #[serde(default)]
    pub attributes: ModAttributes,
}

impl ModRecord {
    pub fn upload_time(&self) -> i64 {
        self.attributes.uploaded_timestamp.unwrap_or(0)
    }
}

/// One file laid down by the last deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedFile {
    /// Path relative to the game root.
    pub rel_path: String,
    /// Id of the mod that owns the file.
    pub source: String,
    #[serde(default)]
    pub mod_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentManifest {
    pub files: Vec<DeployedFile>,
}

/// Deployed files grouped by mod type id.
pub type Deployment = HashMap<String, Vec<DeployedFile>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredTool {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub working_directory: PathBuf,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub default_primary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Activity,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    InstallSuitTool(GameId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub title: String,
    pub follow_up: FollowUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: Option<String>,
    pub kind: NotificationKind,
    pub title: Option<String>,
    pub message: String,
    pub allow_suppress: bool,
    pub allow_report: bool,
    pub display_ms: Option<u64>,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            title: None,
            message: message.into(),
            allow_suppress: false,
            allow_report: false,
            display_ms: None,
            actions: Vec::new(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        let mut notification = Self::new(NotificationKind::Error, message);
        notification.title = Some(title.into());
        notification
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkbox {
    pub id: String,
    pub text: String,
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub title: String,
    pub body: String,
    pub checkboxes: Vec<Checkbox>,
    pub buttons: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialogResult {
    pub action: String,
    pub input: HashMap<String, bool>,
}

/// A file listed on a Nexus mod page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub file_id: u64,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub category_id: u32,
    pub uploaded_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: String,
    pub local_path: PathBuf,
    #[serde(default)]
    pub nexus_mod_id: Option<u32>,
    #[serde(default)]
    pub file_id: Option<u64>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub trait Host {
    /// Game root of a discovered game.
    fn discovery(&self, game: GameId) -> Option<PathBuf>;
    fn staging_path(&self, game: GameId) -> PathBuf;
    fn download_path(&self, game: GameId) -> PathBuf;
    /// Image shipped with the game registration, added to new merged archives.
    fn thumbnail(&self, game: GameId) -> Option<PathBuf>;
    fn is_premium(&self) -> bool;

    fn mods(&self, game: GameId) -> Vec<ModRecord>;
    fn is_mod_enabled(&self, game: GameId, mod_id: &str) -> bool;
    fn set_mod_enabled(&mut self, game: GameId, mod_id: &str, enabled: bool) -> Result<()>;
    fn create_mod(&mut self, game: GameId, record: ModRecord) -> Result<()>;
    fn set_deployment_necessary(&mut self, game: GameId, necessary: bool);
    fn deployment_manifest(&self, game: GameId) -> Result<DeploymentManifest>;

    fn discovered_tool(&self, game: GameId, tool_id: &str) -> Option<DiscoveredTool>;
    fn add_discovered_tool(&mut self, game: GameId, tool: DiscoveredTool) -> Result<()>;

    fn notify(&mut self, notification: Notification);
    fn dismiss(&mut self, id: &str);
    fn show_dialog(&mut self, dialog: Dialog) -> Result<DialogResult>;

    fn mod_files(&mut self, game: GameId, nexus_mod_id: u32) -> Result<Vec<RemoteFile>>;
    fn find_download(&self, file_id: u64) -> Option<DownloadRecord>;
    fn start_download(
        &mut self,
        game: GameId,
        nexus_mod_id: u32,
        file: &RemoteFile,
    ) -> Result<DownloadRecord>;
    /// Installs a finished download and returns the new mod id.
    fn install_download(&mut self, game: GameId, download_id: &str) -> Result<String>;

    fn run_executable(&mut self, exec: &Path, args: &[String], cwd: &Path)
        -> Result<ProcessOutput>;

    fn game_paths(&self, game: GameId) -> Option<GamePaths> {
        self.discovery(game)
            .map(|root| GamePaths::new(game, &root))
    }
}
