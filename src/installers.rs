use crate::{
    game::{self, GameId, TOOL_TYPE_ID},
    host::{Checkbox, Dialog, Host},
    tools,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Copy `source` (relative to the extracted archive) to `destination` inside the mod.
    Copy { source: String, destination: String },
    SetModType(String),
    GenerateFile { data: Vec<u8>, destination: String },
    /// Install the archive at `path` as its own nested mod.
    Submodule { key: String, path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supported {
    pub supported: bool,
    pub required_files: Vec<String>,
}

impl Supported {
    fn from(supported: bool) -> Self {
        Self {
            supported,
            required_files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installer {
    Tool,
    Mod,
    Modpack,
}

impl Installer {
    pub fn all() -> [Installer; 3] {
        [Installer::Tool, Installer::Mod, Installer::Modpack]
    }

    pub fn id(self) -> &'static str {
        match self {
            Installer::Tool => "smpc-tool-installer",
            Installer::Mod => "smpc-mod-installer",
            Installer::Modpack => "smpc-modpack-installer",
        }
    }

    /// Lower runs first.
    pub fn priority(self) -> u32 {
        match self {
            Installer::Tool | Installer::Mod => 10,
            Installer::Modpack => 5,
        }
    }

    pub fn test(self, files: &[String], game: GameId) -> Supported {
        match self {
            Installer::Tool => test_tool(files, game),
            Installer::Mod => test_mod(files, game),
            Installer::Modpack => test_modpack(files, game),
        }
    }

    pub fn install<H: Host + ?Sized>(
        self,
        host: &mut H,
        files: &[String],
        destination: &Path,
        game: GameId,
    ) -> Result<Vec<Instruction>> {
        match self {
            Installer::Tool => install_tool(host, files, destination, game),
            Installer::Mod => install_mod(host, files, game),
            Installer::Modpack => Ok(install_modpack(files, destination, game)),
        }
    }
}

/// First supported installer by priority; ties keep registration order.
pub fn select_installer(files: &[String], game: GameId) -> Option<Installer> {
    let mut installers = Installer::all();
    installers.sort_by_key(|installer| installer.priority());
    installers
        .into_iter()
        .find(|installer| installer.test(files, game).supported)
}

fn is_dir_entry(file: &str) -> bool {
    file.ends_with('/') || file.ends_with('\\')
}

fn base_name(file: &str) -> &str {
    file.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file)
}

/// `.ext` of the file name, like Node's `path.extname`.
fn ext_name(file: &str) -> &str {
    let name = base_name(file);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &name[idx..],
    }
}

fn stem(file: &str) -> &str {
    let name = base_name(file);
    let ext = ext_name(file);
    &name[..name.len() - ext.len()]
}

pub fn test_tool(files: &[String], game: GameId) -> Supported {
    let exec = game.spec().tool_exec;
    Supported::from(files.iter().any(|file| file == exec))
}

pub fn install_tool<H: Host + ?Sized>(
    host: &mut H,
    files: &[String],
    destination: &Path,
    game: GameId,
) -> Result<Vec<Instruction>> {
    let mut instructions: Vec<Instruction> = files
        .iter()
        .filter(|file| !is_dir_entry(file) && !ext_name(file).is_empty())
        .map(|file| Instruction::Copy {
            source: file.clone(),
            destination: file.clone(),
        })
        .collect();

    let game_root = host
        .discovery(game)
        .with_context(|| format!("{game} is not discovered"))?;
    let mut asset_archive_dir = game_root
        .join("asset_archive")
        .to_string_lossy()
        .to_string();
    asset_archive_dir.push(std::path::MAIN_SEPARATOR);

    instructions.push(Instruction::SetModType(TOOL_TYPE_ID.to_string()));
    instructions.push(Instruction::GenerateFile {
        data: asset_archive_dir.into_bytes(),
        destination: "assetArchiveDir.txt".to_string(),
    });

    let folder = destination
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let folder = folder.strip_suffix(".installing").unwrap_or(&folder);
    let expected = host.staging_path(game).join(folder);
    tools::update_tool(host, game, &expected.join(game.spec().tool_exec))?;
    info!(%game, dest = %expected.display(), "installing modding tool");
    Ok(instructions)
}

pub fn test_modpack(files: &[String], game: GameId) -> Supported {
    let ext = game.spec().modpack_ext;
    Supported::from(files.iter().any(|file| ext_name(file) == ext))
}

pub fn install_modpack(files: &[String], destination: &Path, game: GameId) -> Vec<Instruction> {
    let ext = game.spec().modpack_ext;
    files
        .iter()
        .find(|file| ext_name(file) == ext)
        .map(|modpack| {
            vec![Instruction::Submodule {
                key: modpack.clone(),
                path: destination.join(modpack),
            }]
        })
        .unwrap_or_default()
}

pub fn test_mod(files: &[String], game: GameId) -> Supported {
    let ext = game.spec().mod_ext;
    Supported::from(files.iter().any(|file| ext_name(file) == ext))
}

/// Lets the user pick which of several mod archives to install. The first is preselected.
pub fn choose_mods<H: Host + ?Sized>(host: &mut H, files: &[String]) -> Result<Vec<String>> {
    let result = host.show_dialog(Dialog {
        title: "Select SMPC Mod".to_string(),
        body: "The archive you are installing contains multiple mod files.\n\n\
               There are multiple potential reasons for this, they may all be required, may be \
               variants for you to pick one or one might be an uninstaller. If in doubt, please \
               consult the mod description."
            .to_string(),
        checkboxes: files
            .iter()
            .enumerate()
            .map(|(idx, file)| Checkbox {
                id: stem(file).to_string(),
                text: file.clone(),
                value: idx == 0,
            })
            .collect(),
        buttons: vec!["Select".to_string()],
    })?;
    Ok(files
        .iter()
        .filter(|file| result.input.get(stem(file)).copied().unwrap_or(false))
        .cloned()
        .collect())
}

pub fn install_mod<H: Host + ?Sized>(
    host: &mut H,
    files: &[String],
    game: GameId,
) -> Result<Vec<Instruction>> {
    let ext = game.spec().mod_ext;
    let mut mod_files = Vec::new();
    let mut assets = Vec::new();
    for file in files {
        if is_dir_entry(file) {
            continue;
        }
        if ext_name(file) == ext {
            mod_files.push(file.clone());
        } else {
            assets.push(file.clone());
        }
    }

    if mod_files.len() > 1 {
        mod_files = choose_mods(host, &mod_files)?;
    }

    let mods_rel = game::mods_rel_path(game);
    let mut instructions: Vec<Instruction> = mod_files
        .iter()
        .map(|file| Instruction::Copy {
            source: file.clone(),
            destination: mods_rel
                .join(base_name(file))
                .to_string_lossy()
                .to_string(),
        })
        .collect();
    instructions.extend(assets.into_iter().map(|file| Instruction::Copy {
        source: file.clone(),
        destination: file,
    }));
    Ok(instructions)
}
