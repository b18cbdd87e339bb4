//! Folds loose `ModFiles` trees of several mods into one archive per game.
//!
//! The deployment calls [`merge`] once per file. Every file under the same
//! mod root maps to the same [`MergeContext`] key, so each root is appended to
//! the archive once per deployment cycle.

use crate::{
    archive::Archiver,
    game::{self, GameId, SMPC_INFO},
};
use anyhow::{Context, Result};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

pub const MARKER: &str = "modFiles";

const MOD_INFO: &str = "Title=Vortex Merged Mod\n\
Author=Vortex\n\
Description=Contains one or more mods merged into one\n";

/// Mod roots already folded into the merged archive during the current cycle.
#[derive(Debug, Default)]
pub struct MergeContext {
    merged: HashSet<PathBuf>,
}

impl MergeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.merged.clear();
    }

    pub fn contains(&self, root: &Path) -> bool {
        self.merged.contains(root)
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    fn insert(&mut self, root: PathBuf) -> bool {
        self.merged.insert(root)
    }

    fn remove(&mut self, root: &Path) {
        self.merged.remove(root);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The file is not inside a `modFiles` tree; deploy it as-is.
    NotMergeable,
    /// Its mod root was already appended this cycle.
    AlreadyMerged,
    Merged { root: PathBuf, created: bool },
}

/// What the deployment should hand to [`merge`] for a supported game.
#[derive(Debug, Clone, Copy)]
pub struct MergeTest {
    pub game: GameId,
}

impl MergeTest {
    pub fn base_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    pub fn filter(&self, _rel_path: &Path) -> bool {
        true
    }
}

pub fn test(game_id: &str) -> Option<MergeTest> {
    game::supported_games()
        .into_iter()
        .find(|game| game.as_str() == game_id)
        .map(|game| MergeTest { game })
}

/// Prefix of `path` up to and including the last `modFiles` segment (any casing).
pub fn mod_root(path: &Path) -> Option<PathBuf> {
    let components: Vec<_> = path.components().collect();
    let idx = components.iter().rposition(|component| {
        component
            .as_os_str()
            .to_string_lossy()
            .eq_ignore_ascii_case(MARKER)
    })?;
    Some(components[..=idx].iter().collect())
}

pub fn merged_archive_path(game: GameId, merge_dir: &Path) -> PathBuf {
    merge_dir.join(game.merged_archive_name())
}

pub fn merge(
    ctx: &mut MergeContext,
    archiver: &mut dyn Archiver,
    game: GameId,
    thumbnail: Option<&Path>,
    source: &Path,
    merge_dir: &Path,
) -> Result<MergeOutcome> {
    let Some(root) = mod_root(source) else {
        return Ok(MergeOutcome::NotMergeable);
    };
    if !ctx.insert(root.clone()) {
        return Ok(MergeOutcome::AlreadyMerged);
    }

    match append_root(archiver, game, thumbnail, &root, merge_dir) {
        Ok(created) => Ok(MergeOutcome::Merged { root, created }),
        Err(err) => {
            ctx.remove(&root);
            Err(err)
        }
    }
}

fn append_root(
    archiver: &mut dyn Archiver,
    game: GameId,
    thumbnail: Option<&Path>,
    root: &Path,
    merge_dir: &Path,
) -> Result<bool> {
    let archive = merged_archive_path(game, merge_dir);
    let created = !archive.exists();
    if created {
        fs::create_dir_all(merge_dir).context("create merge dir")?;
        let info_path = merge_dir.join(SMPC_INFO);
        fs::write(&info_path, MOD_INFO).context("write merged mod info")?;
        let added = archiver.add(&archive, &[info_path.clone()]);
        if let Err(err) = fs::remove_file(&info_path) {
            warn!(path = %info_path.display(), error = %err, "failed to remove merged mod info");
        }
        added.context("add merged mod info")?;
        if let Some(thumbnail) = thumbnail.filter(|path| path.is_file()) {
            archiver
                .add(&archive, &[thumbnail.to_path_buf()])
                .context("add merged mod thumbnail")?;
        }
        info!(%game, archive = %archive.display(), "created merged archive");
    }

    archiver
        .add(&archive, &[root.to_path_buf()])
        .with_context(|| format!("merge {}", root.display()))?;
    debug!(%game, root = %root.display(), "merged mod root");
    Ok(created)
}
