use crate::{
    game::GameId,
    host::{
        DeploymentManifest, Dialog, DialogResult, DiscoveredTool, DownloadRecord, Host,
        ModRecord, Notification, ProcessOutput, RemoteFile,
    },
};
use anyhow::{anyhow, Result};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::{Path, PathBuf},
};

#[derive(Debug, Clone)]
pub struct Invocation {
    pub exec: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// In-memory host that records what the integration asked of it.
#[derive(Default)]
pub struct FakeHost {
    pub game_root: Option<PathBuf>,
    pub staging: PathBuf,
    pub downloads_dir: PathBuf,
    pub thumbnail: Option<PathBuf>,
    pub premium: bool,
    pub mods: Vec<ModRecord>,
    pub enabled: HashSet<String>,
    pub deployment_necessary: bool,
    pub manifest: Option<DeploymentManifest>,
    pub tools: HashMap<String, DiscoveredTool>,
    pub notifications: Vec<Notification>,
    pub dismissed: Vec<String>,
    pub dialogs: Vec<Dialog>,
    pub dialog_answers: VecDeque<DialogResult>,
    pub remote_files: Vec<RemoteFile>,
    pub downloads: Vec<DownloadRecord>,
    pub started_downloads: Vec<u64>,
    pub installed_downloads: Vec<String>,
    pub invocations: Vec<Invocation>,
    pub process_outputs: VecDeque<ProcessOutput>,
}

impl FakeHost {
    pub fn with_root(root: &Path) -> Self {
        Self {
            game_root: Some(root.to_path_buf()),
            staging: root.join("staging"),
            downloads_dir: root.join("downloads"),
            manifest: Some(DeploymentManifest::default()),
            ..Self::default()
        }
    }

    pub fn add_mod(&mut self, id: &str, mod_type: &str, enabled: bool) -> &mut ModRecord {
        self.mods.push(ModRecord {
            id: id.to_string(),
            name: id.to_string(),
            mod_type: mod_type.to_string(),
            installation_path: id.to_string(),
            archive_id: None,
            attributes: Default::default(),
        });
        if enabled {
            self.enabled.insert(id.to_string());
        }
        self.mods.last_mut().expect("just pushed")
    }

    pub fn answer(&mut self, action: &str) {
        self.dialog_answers.push_back(DialogResult {
            action: action.to_string(),
            input: HashMap::new(),
        });
    }
}

impl Host for FakeHost {
    fn discovery(&self, _game: GameId) -> Option<PathBuf> {
        self.game_root.clone()
    }

    fn staging_path(&self, _game: GameId) -> PathBuf {
        self.staging.clone()
    }

    fn download_path(&self, _game: GameId) -> PathBuf {
        self.downloads_dir.clone()
    }

    fn thumbnail(&self, _game: GameId) -> Option<PathBuf> {
        self.thumbnail.clone()
    }

    fn is_premium(&self) -> bool {
        self.premium
    }

    fn mods(&self, _game: GameId) -> Vec<ModRecord> {
        self.mods.clone()
    }

    fn is_mod_enabled(&self, _game: GameId, mod_id: &str) -> bool {
        self.enabled.contains(mod_id)
    }

    fn set_mod_enabled(&mut self, _game: GameId, mod_id: &str, enabled: bool) -> Result<()> {
        if enabled {
            self.enabled.insert(mod_id.to_string());
        } else {
            self.enabled.remove(mod_id);
        }
        Ok(())
    }

    fn create_mod(&mut self, _game: GameId, record: ModRecord) -> Result<()> {
        self.mods.push(record);
        Ok(())
    }

    fn set_deployment_necessary(&mut self, _game: GameId, necessary: bool) {
        self.deployment_necessary = necessary;
    }

    fn deployment_manifest(&self, _game: GameId) -> Result<DeploymentManifest> {
        self.manifest
            .clone()
            .ok_or_else(|| anyhow!("manifest unavailable"))
    }

    fn discovered_tool(&self, _game: GameId, tool_id: &str) -> Option<DiscoveredTool> {
        self.tools.get(tool_id).cloned()
    }

    fn add_discovered_tool(&mut self, _game: GameId, tool: DiscoveredTool) -> Result<()> {
        self.tools.insert(tool.id.clone(), tool);
        Ok(())
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    fn dismiss(&mut self, id: &str) {
        self.dismissed.push(id.to_string());
    }

    fn show_dialog(&mut self, dialog: Dialog) -> Result<DialogResult> {
        self.dialogs.push(dialog);
        self.dialog_answers
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected dialog"))
    }

    fn mod_files(&mut self, _game: GameId, _nexus_mod_id: u32) -> Result<Vec<RemoteFile>> {
        Ok(self.remote_files.clone())
    }

    fn find_download(&self, file_id: u64) -> Option<DownloadRecord> {
        self.downloads
            .iter()
            .find(|download| download.file_id == Some(file_id))
            .cloned()
    }

    fn start_download(
        &mut self,
        _game: GameId,
        nexus_mod_id: u32,
        file: &RemoteFile,
    ) -> Result<DownloadRecord> {
        self.started_downloads.push(file.file_id);
        let record = DownloadRecord {
            id: format!("dl-{}", file.file_id),
            local_path: PathBuf::from(&file.name),
            nexus_mod_id: Some(nexus_mod_id),
            file_id: Some(file.file_id),
            version: file.version.clone(),
        };
        self.downloads.push(record.clone());
        Ok(record)
    }

    fn install_download(&mut self, _game: GameId, download_id: &str) -> Result<String> {
        self.installed_downloads.push(download_id.to_string());
        let mod_id = format!("mod-{download_id}");
        self.mods.push(ModRecord {
            id: mod_id.clone(),
            name: mod_id.clone(),
            mod_type: String::new(),
            installation_path: mod_id.clone(),
            archive_id: Some(download_id.to_string()),
            attributes: Default::default(),
        });
        Ok(mod_id)
    }

    fn run_executable(
        &mut self,
        exec: &Path,
        args: &[String],
        cwd: &Path,
    ) -> Result<ProcessOutput> {
        self.invocations.push(Invocation {
            exec: exec.to_path_buf(),
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
        });
        Ok(self.process_outputs.pop_front().unwrap_or(ProcessOutput {
            success: true,
            code: Some(0),
            ..ProcessOutput::default()
        }))
    }
}
