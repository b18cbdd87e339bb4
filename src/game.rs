use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};

pub const TOOL_ID: &str = "SMPCModdingTool";
pub const TOOL_NAME: &str = "SMPC Modding Tool";
pub const SUIT_TOOL_ID: &str = "SuitAdderTool";
pub const SUIT_TOOL_NAME: &str = "Suit Adder Tool";
pub const SUIT_TOOL_EXEC: &str = "Suit Adder Tool.exe";
pub const SMPC_INFO: &str = "SMPCMod.info";
pub const THUMBNAIL: &str = "Thumbnail.png";
pub const LO_FILE: &str = "ModManager.txt";
pub const TOOL_DIR: &str = "SMPCTool";

/// Mod type of archives that end up in the mods folder.
pub const MOD_TYPE_ID: &str = "smpc-mod";
/// Mod type of the modding tool itself, deployed to `<game>/SMPCTool`.
pub const TOOL_TYPE_ID: &str = "smpc-modding-tool";
/// Default mod type, deployed relative to the game root.
pub const DEFAULT_TYPE_ID: &str = "";

pub const MERGED_MOD_STEM: &str = "VortexMergedMod";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameId {
    #[serde(rename = "marvelsspidermanremastered")]
    SpiderManRemastered,
    #[serde(rename = "spidermanmilesmorales")]
    MilesMorales,
}

impl Default for GameId {
    fn default() -> Self {
        GameId::SpiderManRemastered
    }
}

/// Everything that differs between the two supported games.
#[derive(Debug, Clone, Copy)]
pub struct GameSpec {
    pub id: GameId,
    pub name: &'static str,
    pub game_exec: &'static str,
    pub steam_app_id: u32,
    pub mod_ext: &'static str,
    pub modpack_ext: &'static str,
    pub tool_exec: &'static str,
    pub tool_page_id: u32,
    pub suit_tool_page_id: u32,
    pub mods_folder: &'static str,
}

const SPIDER_MAN: GameSpec = GameSpec {
    id: GameId::SpiderManRemastered,
    name: "Marvel's Spider-Man Remastered",
    game_exec: "Spider-Man.exe",
    steam_app_id: 1817070,
    mod_ext: ".smpcmod",
    modpack_ext: ".smpcmodpack",
    tool_exec: "SMPCTool.exe",
    tool_page_id: 51,
    suit_tool_page_id: 2318,
    mods_folder: "SMPCMods",
};

const MILES_MORALES: GameSpec = GameSpec {
    id: GameId::MilesMorales,
    name: "Marvel's Spider-Man: Miles Morales",
    game_exec: "MilesMorales.exe",
    steam_app_id: 1817190,
    mod_ext: ".mmpcmod",
    modpack_ext: ".mmpcmodpack",
    tool_exec: "MMPCTool.exe",
    tool_page_id: 8,
    suit_tool_page_id: 2,
    mods_folder: "MMPCMods",
};

impl GameId {
    pub fn spec(self) -> &'static GameSpec {
        match self {
            GameId::SpiderManRemastered => &SPIDER_MAN,
            GameId::MilesMorales => &MILES_MORALES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameId::SpiderManRemastered => "marvelsspidermanremastered",
            GameId::MilesMorales => "spidermanmilesmorales",
        }
    }

    pub fn display_name(self) -> &'static str {
        self.spec().name
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "marvelsspidermanremastered" | "spiderman" | "smpc" => Ok(GameId::SpiderManRemastered),
            "spidermanmilesmorales" | "milesmorales" | "mmpc" => Ok(GameId::MilesMorales),
            other => bail!("unsupported game: {other}"),
        }
    }

    /// File name of the archive the merge engine builds for this game.
    pub fn merged_archive_name(self) -> String {
        format!("{MERGED_MOD_STEM}{}", self.spec().mod_ext)
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn supported_games() -> Vec<GameId> {
    vec![GameId::SpiderManRemastered, GameId::MilesMorales]
}

pub fn is_supported(game_id: &str) -> bool {
    supported_games()
        .iter()
        .any(|game| game.as_str() == game_id)
}

/// Mods folder relative to the game root.
pub fn mods_rel_path(game: GameId) -> PathBuf {
    Path::new(TOOL_DIR)
        .join("ModManager")
        .join(game.spec().mods_folder)
}

/// Load order file relative to the game root.
pub fn lo_rel_path() -> PathBuf {
    Path::new(TOOL_DIR).join("ModManager").join(LO_FILE)
}

#[derive(Debug, Clone)]
pub struct GamePaths {
    pub game_root: PathBuf,
    pub tool_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub lo_file: PathBuf,
    pub asset_archive_dir: PathBuf,
}

impl GamePaths {
    pub fn new(game: GameId, game_root: &Path) -> Self {
        Self {
            game_root: game_root.to_path_buf(),
            tool_dir: game_root.join(TOOL_DIR),
            mods_dir: game_root.join(mods_rel_path(game)),
            lo_file: game_root.join(lo_rel_path()),
            asset_archive_dir: game_root.join("asset_archive"),
        }
    }

    pub fn tool_exec(&self, game: GameId) -> PathBuf {
        self.tool_dir.join(game.spec().tool_exec)
    }

    pub fn suit_tool_exec(&self) -> PathBuf {
        self.tool_dir.join(SUIT_TOOL_EXEC)
    }
}

pub fn looks_like_game_root(game: GameId, path: &Path) -> bool {
    path.join(game.spec().game_exec).is_file()
}

/// Validates a configured game root.
pub fn resolve_game_root(game: GameId, configured: Option<&Path>) -> Result<PathBuf> {
    let root = configured.with_context(|| {
        format!(
            "no game root configured for {}; run `setup --game-root <dir>`",
            game.display_name()
        )
    })?;
    if !looks_like_game_root(game, root) {
        bail!(
            "invalid game root: expected {} in {}",
            game.spec().game_exec,
            root.display()
        );
    }
    Ok(root.to_path_buf())
}
