use crate::host::{DeploymentManifest, DiscoveredTool, DownloadRecord, ModRecord};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

const LIBRARY_FILE: &str = "library.json";

/// Installed mods, their enable state and the last deployment of one game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Library {
    #[serde(default)]
    pub mods: Vec<ModRecord>,
    /// Deployment order; later entries win file conflicts.
    #[serde(default)]
    pub order: Vec<ModState>,
    #[serde(default)]
    pub downloads: Vec<DownloadRecord>,
    #[serde(default)]
    pub tools: Vec<DiscoveredTool>,
    #[serde(default)]
    pub deployment_necessary: bool,
    /// Run the modding tool on the next deployment even without asset mods.
    #[serde(default)]
    pub force_tool_run: bool,
    #[serde(default)]
    pub manifest: DeploymentManifest,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModState {
    pub id: String,
    pub enabled: bool,
}

impl Library {
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        let library_path = data_dir.join(LIBRARY_FILE);
        if library_path.exists() {
            let raw = fs::read_to_string(&library_path).context("read library.json")?;
            let mut library: Library = serde_json::from_str(&raw).context("parse library.json")?;
            library.ensure_order();
            return Ok(library);
        }

        let library = Library::default();
        library.save(data_dir)?;
        Ok(library)
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir).context("create data dir")?;
        let library_path = data_dir.join(LIBRARY_FILE);
        let raw = serde_json::to_string_pretty(self).context("serialize library.json")?;
        fs::write(library_path, raw).context("write library.json")?;
        Ok(())
    }

    /// Keeps `order` in step with `mods`: new mods append disabled, stale ids drop.
    pub fn ensure_order(&mut self) {
        let ids: Vec<String> = self.mods.iter().map(|m| m.id.clone()).collect();
        self.order.retain(|state| ids.contains(&state.id));
        for id in ids {
            if !self.order.iter().any(|state| state.id == id) {
                self.order.push(ModState { id, enabled: false });
            }
        }
    }

    pub fn find_mod(&self, query: &str) -> Option<&ModRecord> {
        self.mods
            .iter()
            .find(|m| m.id == query)
            .or_else(|| self.mods.iter().find(|m| m.name.eq_ignore_ascii_case(query)))
    }

    /// Inserts or replaces a mod by id, keeping its position in the order.
    pub fn upsert_mod(&mut self, record: ModRecord) {
        match self.mods.iter_mut().find(|m| m.id == record.id) {
            Some(existing) => *existing = record,
            None => self.mods.push(record),
        }
        self.ensure_order();
    }

    pub fn remove_mod(&mut self, id: &str) -> Option<ModRecord> {
        let idx = self.mods.iter().position(|m| m.id == id)?;
        let removed = self.mods.remove(idx);
        self.ensure_order();
        Some(removed)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.order
            .iter()
            .any(|state| state.id == id && state.enabled)
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.order.iter_mut().find(|state| state.id == id) {
            Some(state) => {
                state.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Enabled mods in deployment order.
    pub fn enabled_mods(&self) -> Vec<&ModRecord> {
        let index = self.index_by_id();
        self.order
            .iter()
            .filter(|state| state.enabled)
            .filter_map(|state| index.get(state.id.as_str()).copied())
            .collect()
    }

    pub fn move_mod(&mut self, id: &str, index: usize) -> bool {
        let Some(from) = self.order.iter().position(|state| state.id == id) else {
            return false;
        };
        let state = self.order.remove(from);
        let to = index.min(self.order.len());
        self.order.insert(to, state);
        true
    }

    pub fn upsert_tool(&mut self, tool: DiscoveredTool) {
        match self.tools.iter_mut().find(|t| t.id == tool.id) {
            Some(existing) => *existing = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn tool(&self, id: &str) -> Option<&DiscoveredTool> {
        self.tools.iter().find(|tool| tool.id == id)
    }

    pub fn find_download(&self, file_id: u64) -> Option<&DownloadRecord> {
        self.downloads
            .iter()
            .find(|download| download.file_id == Some(file_id))
    }

    pub fn download(&self, id: &str) -> Option<&DownloadRecord> {
        self.downloads.iter().find(|download| download.id == id)
    }

    pub fn index_by_id(&self) -> HashMap<&str, &ModRecord> {
        self.mods.iter().map(|m| (m.id.as_str(), m)).collect()
    }
}
