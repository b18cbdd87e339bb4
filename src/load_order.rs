use crate::{
    game::{self, GameId},
    host::{DeploymentManifest, Host, Notification},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::Path,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOrderEntry {
    /// Archive file name inside the mods folder.
    pub id: String,
    pub enabled: bool,
    pub name: String,
    /// Owning mod, the merged archive's own name, or `None` for files placed by hand.
    #[serde(default)]
    pub mod_id: Option<String>,
}

pub fn usage_instructions() -> &'static str {
    "This screen displays the order in which the SMPC tool is expected to load the mod assets \
     into the game, higher index will get loaded last. By default only one merged mod is \
     deployed to the mods folder and will therefore generally be the only item in this list, \
     unless other mods have been added manually. If no entries are present in the list, \
     install some mods and make sure to deploy."
}

/// Reads the load order for `game`: mods folder listing, overlaid with `ModManager.txt`.
pub fn deserialize<H: Host + ?Sized>(host: &mut H, game: GameId) -> Result<Vec<LoadOrderEntry>> {
    let paths = host
        .game_paths(game)
        .with_context(|| format!("{game} is not discovered"))?;
    let listing = list_mod_archives(&paths.mods_dir, game)?;

    let manifest = match host.deployment_manifest(game) {
        Ok(manifest) => manifest,
        Err(err) => {
            warn!(%game, error = %err, "failed to read deployment manifest");
            host.notify(Notification::error(
                "Failed to read deployment manifest",
                format!("{err:#}"),
            ));
            return Ok(Vec::new());
        }
    };
    let managed = managed_archives(&manifest, game);

    let overlay = match fs::read_to_string(&paths.lo_file) {
        Ok(data) => parse_overlay(&data),
        Err(err) => {
            debug!(path = %paths.lo_file.display(), error = %err, "no load order overlay");
            HashMap::new()
        }
    };

    Ok(build_entries(game, &listing, &overlay, &managed))
}

/// Writes `entries` as `id,1` / `id,0` lines, replacing the load order file.
pub fn serialize<H: Host + ?Sized>(host: &H, game: GameId, entries: &[LoadOrderEntry]) -> Result<()> {
    let paths = host
        .game_paths(game)
        .with_context(|| format!("{game} is not discovered"))?;
    if let Some(parent) = paths.lo_file.parent() {
        fs::create_dir_all(parent).context("create load order dir")?;
    }
    fs::write(&paths.lo_file, render(entries)).context("write load order")?;
    debug!(%game, count = entries.len(), "load order written");
    Ok(())
}

pub fn validate(_entries: &[LoadOrderEntry]) -> Option<String> {
    None
}

pub fn render(entries: &[LoadOrderEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{},{}", entry.id, if entry.enabled { '1' } else { '0' }))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses `name,flag` lines. Later lines win; anything but `1` is disabled.
pub fn parse_overlay(data: &str) -> HashMap<String, bool> {
    let mut overlay = HashMap::new();
    for line in data.split('\n') {
        let mut parts = line.split(',');
        let name = parts.next().unwrap_or_default();
        let enabled = parts.next() == Some("1");
        overlay.insert(name.to_string(), enabled);
    }
    overlay
}

pub fn build_entries(
    game: GameId,
    listing: &[String],
    overlay: &HashMap<String, bool>,
    managed: &HashMap<String, String>,
) -> Vec<LoadOrderEntry> {
    let merged_name = game.merged_archive_name();
    listing
        .iter()
        .map(|file_name| {
            let mod_id = if *file_name == merged_name {
                Some(file_name.clone())
            } else {
                managed.get(&file_name.to_lowercase()).cloned()
            };
            LoadOrderEntry {
                id: file_name.clone(),
                enabled: overlay.get(file_name).copied().unwrap_or(true),
                name: file_name.clone(),
                mod_id,
            }
        })
        .collect()
}

/// Archives in the mods folder, in directory listing order.
pub fn list_mod_archives(mods_dir: &Path, game: GameId) -> Result<Vec<String>> {
    let mod_ext = game.spec().mod_ext;
    let mut names = Vec::new();
    for entry in fs::read_dir(mods_dir).context("read mods dir")? {
        let entry = entry.context("read mods dir entry")?;
        let name = entry.file_name().to_string_lossy().to_string();
        if extension_of(&name) == Some(mod_ext) {
            names.push(name);
        }
    }
    Ok(names)
}

/// Lower-cased archive basename -> owning mod id, for files deployed into the mods folder.
pub fn managed_archives(manifest: &DeploymentManifest, game: GameId) -> HashMap<String, String> {
    manifest
        .files
        .iter()
        .filter(|file| in_mods_folder(&file.rel_path, game))
        .filter_map(|file| {
            let base = file.rel_path.rsplit(['/', '\\']).next()?;
            Some((base.to_lowercase(), file.source.clone()))
        })
        .collect()
}

/// Whether a game-relative path lies inside the mods folder, in any casing or separator style.
pub fn in_mods_folder(rel_path: &str, game: GameId) -> bool {
    let mods_base = normalize_rel(&game::mods_rel_path(game).to_string_lossy());
    let rel = normalize_rel(rel_path);
    rel.len() > mods_base.len()
        && rel.starts_with(&mods_base)
        && rel.as_bytes()[mods_base.len()] == b'/'
}

fn normalize_rel(path: &str) -> String {
    path.replace('\\', "/")
        .trim_matches('/')
        .to_lowercase()
}

fn extension_of(name: &str) -> Option<&str> {
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(&name[dot..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{game::GamePaths, host::DeployedFile, testing::FakeHost};
    use tempfile::TempDir;

    fn setup(files: &[&str]) -> (TempDir, FakeHost, GamePaths) {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::with_root(temp.path());
        let paths = GamePaths::new(GameId::SpiderManRemastered, temp.path());
        fs::create_dir_all(&paths.mods_dir).unwrap();
        for file in files {
            fs::write(paths.mods_dir.join(file), b"x").unwrap();
        }
        (temp, host, paths)
    }

    fn flags(entries: &[LoadOrderEntry]) -> HashMap<String, bool> {
        entries
            .iter()
            .map(|entry| (entry.id.clone(), entry.enabled))
            .collect()
    }

    #[test]
    fn build_entries___overlay_applies_in_listing_order() {
        let listing: Vec<String> = ["a.smpcmod", "b.smpcmod", "c.smpcmod"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let overlay = parse_overlay("a.smpcmod,1\nb.smpcmod,0\n");
        let entries = build_entries(
            GameId::SpiderManRemastered,
            &listing,
            &overlay,
            &HashMap::new(),
        );

        let got: Vec<(&str, bool)> = entries
            .iter()
            .map(|entry| (entry.id.as_str(), entry.enabled))
            .collect();
        assert_eq!(
            got,
            vec![("a.smpcmod", true), ("b.smpcmod", false), ("c.smpcmod", true)]
        );
        assert!(entries.iter().all(|entry| entry.name == entry.id));
    }

    #[test]
    fn parse_overlay___treats_malformed_lines_as_disabled() {
        let overlay = parse_overlay("a,1\nbroken\n,1\nb,yes\na,0");
        assert_eq!(overlay.get("a"), Some(&false));
        assert_eq!(overlay.get("broken"), Some(&false));
        assert_eq!(overlay.get(""), Some(&true));
        assert_eq!(overlay.get("b"), Some(&false));
    }

    #[test]
    fn parse_overlay___trailing_newline_yields_disabled_empty_entry() {
        let overlay = parse_overlay("a,1\n");
        assert_eq!(overlay.len(), 2);
        assert_eq!(overlay.get("a"), Some(&true));
        assert_eq!(overlay.get(""), Some(&false));
    }

    #[test]
    fn in_mods_folder___requires_separator_after_folder() {
        let game = GameId::MilesMorales;
        assert!(in_mods_folder("SMPCTool/ModManager/MMPCMods/suit.mmpcmod", game));
        assert!(in_mods_folder("smpctool\\modmanager\\mmpcmods\\suit.mmpcmod", game));
        assert!(!in_mods_folder("SMPCTool/ModManager/MMPCModsX/suit.mmpcmod", game));
        assert!(!in_mods_folder("SMPCTool/ModManager/MMPCMods", game));
    }

    #[test]
    fn deserialize___without_load_order_file_enables_everything() {
        let (_temp, mut host, _paths) = setup(&["a.smpcmod", "b.smpcmod", "c.smpcmod"]);
        let entries = deserialize(&mut host, GameId::SpiderManRemastered).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|entry| entry.enabled));
    }

    #[test]
    fn deserialize___ignores_other_extensions() {
        let (_temp, mut host, _paths) =
            setup(&["a.smpcmod", "b.mmpcmod", "notes.txt", "c.SMPCMOD"]);
        let entries = deserialize(&mut host, GameId::SpiderManRemastered).unwrap();
        let ids: Vec<&str> = entries.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["a.smpcmod"]);
    }

    #[test]
    fn deserialize___resolves_owner_case_insensitively() {
        let (_temp, mut host, _paths) = setup(&["Suit.smpcmod", "VortexMergedMod.smpcmod", "loose.smpcmod"]);
        host.manifest = Some(DeploymentManifest {
            files: vec![DeployedFile {
                rel_path: "SMPCTool/ModManager/SMPCMods/SUIT.SMPCMOD".to_string(),
                source: "suit-mod-1".to_string(),
                mod_type: String::new(),
            }],
        });

        let entries = deserialize(&mut host, GameId::SpiderManRemastered).unwrap();
        let owners: HashMap<String, Option<String>> = entries
            .into_iter()
            .map(|entry| (entry.id, entry.mod_id))
            .collect();
        assert_eq!(owners["Suit.smpcmod"].as_deref(), Some("suit-mod-1"));
        assert_eq!(
            owners["VortexMergedMod.smpcmod"].as_deref(),
            Some("VortexMergedMod.smpcmod")
        );
        assert_eq!(owners["loose.smpcmod"], None);
    }

    #[test]
    fn deserialize___manifest_failure_notifies_and_returns_empty() {
        let (_temp, mut host, _paths) = setup(&["a.smpcmod"]);
        host.manifest = None;
        let entries = deserialize(&mut host, GameId::SpiderManRemastered).unwrap();
        assert!(entries.is_empty());
        assert_eq!(host.notifications.len(), 1);
        assert_eq!(
            host.notifications[0].title.as_deref(),
            Some("Failed to read deployment manifest")
        );
    }

    #[test]
    fn deserialize___missing_mods_dir_propagates() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        assert!(deserialize(&mut host, GameId::SpiderManRemastered).is_err());
    }

    #[test]
    fn serialize___round_trips_flags_and_tracks_disk() {
        let (_temp, mut host, paths) = setup(&["a.smpcmod", "b.smpcmod", "c.smpcmod"]);
        let mut entries = deserialize(&mut host, GameId::SpiderManRemastered).unwrap();
        for entry in &mut entries {
            entry.enabled = entry.id != "b.smpcmod";
        }
        serialize(&host, GameId::SpiderManRemastered, &entries).unwrap();

        fs::remove_file(paths.mods_dir.join("c.smpcmod")).unwrap();
        fs::write(paths.mods_dir.join("d.smpcmod"), b"x").unwrap();

        let reread = flags(&deserialize(&mut host, GameId::SpiderManRemastered).unwrap());
        assert_eq!(reread.get("a.smpcmod"), Some(&true));
        assert_eq!(reread.get("b.smpcmod"), Some(&false));
        assert_eq!(reread.get("c.smpcmod"), None);
        assert_eq!(reread.get("d.smpcmod"), Some(&true));
    }

    #[test]
    fn render___joins_without_trailing_newline() {
        let entries = vec![
            LoadOrderEntry {
                id: "a.smpcmod".into(),
                enabled: true,
                name: "a.smpcmod".into(),
                mod_id: None,
            },
            LoadOrderEntry {
                id: "b.smpcmod".into(),
                enabled: false,
                name: "b.smpcmod".into(),
                mod_id: None,
            },
        ];
        assert_eq!(render(&entries), "a.smpcmod,1\nb.smpcmod,0");
    }
}
