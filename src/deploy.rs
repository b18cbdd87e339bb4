use crate::{
    archive::Archiver,
    game::{self, GameId, GamePaths, MOD_TYPE_ID, TOOL_DIR, TOOL_TYPE_ID},
    host::{DeployedFile, Deployment, DeploymentManifest, ModRecord},
    merge::{self, MergeContext, MergeOutcome},
};
use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    fs,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Owner of the merged archive in the deployment manifest. Also the name of
/// the staging folder the archive is built in.
pub const MERGED_MOD_ID: &str = "__merged.smpc-mod";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub file_count: usize,
    pub removed_count: usize,
    pub merged_roots: usize,
    pub overridden_files: usize,
    /// Files whose `modFiles` tree could not be written into the merged archive.
    pub merge_failures: usize,
}

pub struct DeployRequest<'a> {
    pub game: GameId,
    pub paths: &'a GamePaths,
    pub staging: &'a Path,
    /// Enabled mods in deployment order; later mods win conflicts.
    pub mods: &'a [&'a ModRecord],
    pub thumbnail: Option<&'a Path>,
}

struct FilePlan {
    source: PathBuf,
    rel_path: PathBuf,
    mod_id: String,
    mod_type: String,
    order: usize,
}

/// Directory, relative to the game root, that files of `mod_type` land in.
pub fn type_root(game: GameId, mod_type: &str) -> PathBuf {
    match mod_type {
        TOOL_TYPE_ID => PathBuf::from(TOOL_DIR),
        MOD_TYPE_ID => game::mods_rel_path(game),
        _ => PathBuf::new(),
    }
}

pub fn deploy(
    request: &DeployRequest<'_>,
    previous: &DeploymentManifest,
    merge_ctx: &mut MergeContext,
    archiver: &mut dyn Archiver,
) -> Result<(DeploymentManifest, DeployReport)> {
    let game = request.game;
    let removed_count = purge(request.paths, previous)?;

    let merge_dir = request.staging.join(MERGED_MOD_ID);
    if merge_dir.exists() {
        fs::remove_dir_all(&merge_dir).context("clear merge dir")?;
    }

    let mut map: HashMap<PathBuf, FilePlan> = HashMap::new();
    let mut overridden_files = 0usize;
    let mut merge_failures = 0usize;
    for (order, record) in request.mods.iter().enumerate() {
        let mod_root = request.staging.join(&record.installation_path);
        if !mod_root.is_dir() {
            warn!(%game, mod_id = %record.id, "mod folder missing from staging");
            continue;
        }
        let dest_root = type_root(game, &record.mod_type);
        for entry in WalkDir::new(&mod_root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_ignored_deploy_path(entry.path()))
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&mod_root).context("rel path")?;
            if record.mod_type != TOOL_TYPE_ID {
                match merge::merge(
                    merge_ctx,
                    archiver,
                    game,
                    request.thumbnail,
                    entry.path(),
                    &merge_dir,
                ) {
                    Ok(MergeOutcome::NotMergeable) => {}
                    Ok(_) => continue,
                    Err(err) => {
                        warn!(
                            %game,
                            mod_id = %record.id,
                            file = %rel.display(),
                            error = %format!("{err:#}"),
                            "merge failed"
                        );
                        merge_failures += 1;
                        continue;
                    }
                }
            }
            let rel_path = dest_root.join(rel);
            let previous = map.insert(
                rel_path.clone(),
                FilePlan {
                    source: entry.path().to_path_buf(),
                    rel_path,
                    mod_id: record.id.clone(),
                    mod_type: record.mod_type.clone(),
                    order,
                },
            );
            if let Some(previous) = previous {
                debug!(file = %previous.rel_path.display(), loser = %previous.mod_id, "file overridden");
                overridden_files += 1;
            }
        }
    }

    let merged_archive = merge::merged_archive_path(game, &merge_dir);
    if merged_archive.is_file() {
        let rel_path = game::mods_rel_path(game).join(game.merged_archive_name());
        map.insert(
            rel_path.clone(),
            FilePlan {
                source: merged_archive,
                rel_path,
                mod_id: MERGED_MOD_ID.to_string(),
                mod_type: MOD_TYPE_ID.to_string(),
                order: usize::MAX,
            },
        );
    }

    let mut plans: Vec<FilePlan> = map.into_values().collect();
    plans.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.rel_path.cmp(&b.rel_path)));

    let mut created = Vec::with_capacity(plans.len());
    let mut files = Vec::with_capacity(plans.len());
    for plan in plans {
        let dest = request.paths.game_root.join(&plan.rel_path);
        if let Err(err) = link_or_copy(&plan.source, &dest) {
            for path in created.iter().rev() {
                let _ = fs::remove_file(path);
            }
            return Err(err).context("deploy file");
        }
        created.push(dest);
        files.push(DeployedFile {
            rel_path: manifest_path(&plan.rel_path),
            source: plan.mod_id,
            mod_type: plan.mod_type,
        });
    }

    let report = DeployReport {
        file_count: files.len(),
        removed_count,
        merged_roots: merge_ctx.len(),
        overridden_files,
        merge_failures,
    };
    info!(
        %game,
        files = report.file_count,
        removed = report.removed_count,
        merged = report.merged_roots,
        merge_failures = report.merge_failures,
        "deployment finished"
    );
    Ok((DeploymentManifest { files }, report))
}

/// Removes every file a previous deployment laid down inside the game root.
pub fn purge(paths: &GamePaths, manifest: &DeploymentManifest) -> Result<usize> {
    let mut removed = 0;
    for file in &manifest.files {
        let rel = Path::new(&file.rel_path);
        if rel.is_absolute() || rel.components().any(|c| matches!(c, Component::ParentDir)) {
            warn!(path = %file.rel_path, "refusing to purge path outside game root");
            continue;
        }
        let path = paths.game_root.join(rel);
        if !path.exists() {
            continue;
        }
        if fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Deployed files grouped by mod type.
pub fn by_type(manifest: &DeploymentManifest) -> Deployment {
    let mut deployment: Deployment = HashMap::new();
    for file in &manifest.files {
        deployment
            .entry(file.mod_type.clone())
            .or_default()
            .push(file.clone());
    }
    deployment
}

fn manifest_path(rel: &Path) -> String {
    rel.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn link_or_copy(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).context("create dir")?;
    }
    if let Ok(meta) = fs::symlink_metadata(dest) {
        if meta.file_type().is_dir() {
            anyhow::bail!("destination exists as directory: {:?}", dest);
        }
        fs::remove_file(dest).with_context(|| format!("remove existing file {:?}", dest))?;
    }
    if let Err(err) = fs::hard_link(source, dest) {
        debug!(error = %err, "hardlink failed, copying");
        fs::copy(source, dest).with_context(|| format!("copy {:?} -> {:?}", source, dest))?;
    }
    Ok(())
}

fn is_ignored_deploy_path(path: &Path) -> bool {
    path.components().any(|component| {
        let part = component.as_os_str().to_string_lossy();
        part.eq_ignore_ascii_case("__MACOSX")
            || part.eq_ignore_ascii_case(".ds_store")
            || part.eq_ignore_ascii_case("thumbs.db")
    })
}
