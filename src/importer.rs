use crate::{
    archive,
    game::{GameId, DEFAULT_TYPE_ID},
    host::{Host, ModAttributes, ModRecord},
    installers::{self, Instruction},
};
use anyhow::{bail, Context, Result};
use blake3::Hasher;
use std::{
    fs,
    path::{Component, Path, PathBuf},
    time::UNIX_EPOCH,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const INSTALLING_SUFFIX: &str = ".installing";

/// Where an archive came from, carried onto the mod record.
#[derive(Debug, Clone, Default)]
pub struct ImportSource {
    pub archive_id: Option<String>,
    pub attributes: ModAttributes,
}

struct StagingGuard {
    path: PathBuf,
    armed: bool,
}

impl StagingGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Installs `archive` into the staging folder and registers the resulting mods.
///
/// Returns the ids of every mod created, nested modpack contents included.
pub fn import_archive<H: Host + ?Sized>(
    host: &mut H,
    game: GameId,
    archive: &Path,
    source: &ImportSource,
) -> Result<Vec<String>> {
    if !archive.is_file() {
        bail!("archive not found: {}", archive.display());
    }
    let staging = host.staging_path(game);
    fs::create_dir_all(&staging).context("create staging dir")?;

    let mod_id = mod_id_for(archive);
    let extract_dir = staging.join(format!("{mod_id}{INSTALLING_SUFFIX}"));
    if extract_dir.exists() {
        fs::remove_dir_all(&extract_dir).context("clear stale install dir")?;
    }
    let _extract_guard = StagingGuard::new(extract_dir.clone());
    archive::extract(archive, &extract_dir)
        .with_context(|| format!("extract {}", archive.display()))?;

    let files = list_files(&extract_dir)?;
    let instructions = match installers::select_installer(&files, game) {
        Some(installer) => {
            info!(%game, installer = installer.id(), archive = %archive.display(), "installing");
            installer.install(host, &files, &extract_dir, game)?
        }
        None => {
            debug!(%game, archive = %archive.display(), "no installer matched, copying verbatim");
            fallback_instructions(&files)
        }
    };

    let mod_dir = staging.join(&mod_id);
    if mod_dir.exists() {
        fs::remove_dir_all(&mod_dir).context("remove previous install")?;
    }
    let mut mod_guard = StagingGuard::new(mod_dir.clone());
    fs::create_dir_all(&mod_dir).context("create mod dir")?;

    let mut mod_type = DEFAULT_TYPE_ID.to_string();
    let mut payload = 0usize;
    let mut created = Vec::new();
    for instruction in instructions {
        match instruction {
            Instruction::Copy {
                source: from,
                destination,
            } => {
                let src = safe_join(&extract_dir, &from)?;
                let dest = safe_join(&mod_dir, &destination)?;
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).context("create file dir")?;
                }
                fs::copy(&src, &dest).with_context(|| format!("copy {from}"))?;
                payload += 1;
            }
            Instruction::SetModType(kind) => mod_type = kind,
            Instruction::GenerateFile { data, destination } => {
                let dest = safe_join(&mod_dir, &destination)?;
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).context("create file dir")?;
                }
                fs::write(&dest, data).with_context(|| format!("write {destination}"))?;
                payload += 1;
            }
            Instruction::Submodule { key, path } => {
                info!(%game, submodule = %key, "installing nested archive");
                let nested = ImportSource {
                    archive_id: source.archive_id.clone(),
                    attributes: ModAttributes {
                        logical_file_name: Some(file_stem(&path)),
                        ..source.attributes.clone()
                    },
                };
                created.extend(import_archive(host, game, &path, &nested)?);
            }
        }
    }

    if payload == 0 {
        // Nothing of its own: a modpack wrapper, represented by its contents.
        if created.is_empty() {
            warn!(%game, archive = %archive.display(), "archive produced no files");
        }
        return Ok(created);
    }

    let mut attributes = source.attributes.clone();
    attributes.install_time = OffsetDateTime::now_utc().format(&Rfc3339).ok();
    let name = attributes
        .logical_file_name
        .clone()
        .unwrap_or_else(|| file_stem(archive));
    host.create_mod(
        game,
        ModRecord {
            id: mod_id.clone(),
            name,
            mod_type,
            installation_path: mod_id.clone(),
            archive_id: source.archive_id.clone(),
            attributes,
        },
    )?;
    mod_guard.disarm();
    created.insert(0, mod_id);
    Ok(created)
}

/// Extracted entries relative to `root`, `/`-separated, directories ending in `/`.
pub fn list_files(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        let rel = entry.path().strip_prefix(root).context("rel path")?;
        let name = rel
            .components()
            .map(|component| component.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");
        if entry.file_type().is_dir() {
            files.push(format!("{name}/"));
        } else {
            files.push(name);
        }
    }
    Ok(files)
}

fn fallback_instructions(files: &[String]) -> Vec<Instruction> {
    files
        .iter()
        .filter(|file| !file.ends_with('/'))
        .map(|file| Instruction::Copy {
            source: file.clone(),
            destination: file.clone(),
        })
        .collect()
}

fn safe_join(root: &Path, rel: &str) -> Result<PathBuf> {
    let rel = Path::new(rel);
    let escapes = rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        bail!("path escapes install dir: {}", rel.display());
    }
    Ok(root.join(rel))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "mod".to_string())
}

/// Stable id for an archive: readable stem plus a hash of its path and mtime.
pub fn mod_id_for(archive: &Path) -> String {
    let mut hasher = Hasher::new();
    hasher.update(archive.to_string_lossy().as_bytes());
    if let Ok(modified) = fs::metadata(archive).and_then(|meta| meta.modified()) {
        if let Ok(duration) = modified.duration_since(UNIX_EPOCH) {
            hasher.update(&duration.as_secs().to_le_bytes());
        }
    }
    let hash = hasher.finalize();
    let hex = hash.to_hex();
    format!("{}-{}", sanitize_label(&file_stem(archive)), &hex.as_str()[..12])
}

fn sanitize_label(value: &str) -> String {
    value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
