use crate::game::{self, GameId};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

pub const HOME_ENV: &str = "SMPC_MODDER_HOME";
const APP_DIR: &str = "smpc-modder";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub active_game: GameId,
    /// Game roots chosen by the user, keyed by game id.
    #[serde(default)]
    pub game_roots: HashMap<GameId, PathBuf>,
    #[serde(default)]
    pub nexus_api_key: Option<String>,
    /// Premium accounts may download from Nexus without a browser round trip.
    #[serde(default)]
    pub premium: bool,
    /// Enable mods right after installing them.
    #[serde(default = "default_true")]
    pub auto_enable: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            active_game: GameId::default(),
            game_roots: HashMap::new(),
            nexus_api_key: None,
            premium: false,
            auto_enable: true,
        }
    }
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_in(&base_data_dir()?)
    }

    pub fn load_or_create_in(base_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig::default();
        config.save_in(base_dir)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_in(&base_data_dir()?)
    }

    pub fn save_in(&self, base_dir: &Path) -> Result<()> {
        fs::create_dir_all(base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }

    pub fn game_root(&self, game: GameId) -> Option<&Path> {
        self.game_roots.get(&game).map(PathBuf::as_path)
    }
}

/// Per-game state directory and the resolved game root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub game_id: GameId,
    pub game_name: String,
    pub data_dir: PathBuf,
    #[serde(default)]
    pub game_root: Option<PathBuf>,
}

impl GameConfig {
    pub fn load_or_create(game: GameId, app: &AppConfig) -> Result<Self> {
        Self::load_or_create_in(&base_data_dir()?, game, app)
    }

    pub fn load_or_create_in(base_dir: &Path, game: GameId, app: &AppConfig) -> Result<Self> {
        let data_dir = base_dir.join(game.as_str());
        fs::create_dir_all(&data_dir).context("create game data dir")?;

        let game_root = match game::resolve_game_root(game, app.game_root(game)) {
            Ok(root) => Some(root),
            Err(err) => {
                warn!(%game, error = %format!("{err:#}"), "game not discovered");
                None
            }
        };
        debug!(%game, data_dir = %data_dir.display(), "game config resolved");

        let config = GameConfig {
            game_id: game,
            game_name: game.display_name().to_string(),
            data_dir,
            game_root,
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = self.data_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(config_path, raw).context("write config")?;
        Ok(())
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("staging")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }
}

fn default_true() -> bool {
    true
}

pub fn base_data_dir() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn app_config___created_with_defaults_then_reloaded() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::load_or_create_in(temp.path()).unwrap();
        assert_eq!(config.active_game, GameId::SpiderManRemastered);
        assert!(config.auto_enable);
        assert!(!config.premium);

        config.active_game = GameId::MilesMorales;
        config
            .game_roots
            .insert(GameId::MilesMorales, PathBuf::from("/games/mm"));
        config.save_in(temp.path()).unwrap();

        let reloaded = AppConfig::load_or_create_in(temp.path()).unwrap();
        assert_eq!(reloaded.active_game, GameId::MilesMorales);
        assert_eq!(
            reloaded.game_root(GameId::MilesMorales),
            Some(Path::new("/games/mm"))
        );
    }

    #[test]
    fn app_config___tolerates_missing_fields() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("config.json"),
            r#"{"active_game":"spidermanmilesmorales"}"#,
        )
        .unwrap();
        let config = AppConfig::load_or_create_in(temp.path()).unwrap();
        assert_eq!(config.active_game, GameId::MilesMorales);
        assert!(config.auto_enable);
        assert!(config.nexus_api_key.is_none());
    }

    #[test]
    fn game_config___uses_configured_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("game");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("Spider-Man.exe"), b"").unwrap();
        let mut app = AppConfig::default();
        app.game_roots.insert(GameId::SpiderManRemastered, root.clone());

        let config =
            GameConfig::load_or_create_in(temp.path(), GameId::SpiderManRemastered, &app).unwrap();
        assert_eq!(config.game_root, Some(root));
        assert_eq!(
            config.data_dir,
            temp.path().join("marvelsspidermanremastered")
        );
        assert!(config.data_dir.join("config.json").is_file());
    }
}
