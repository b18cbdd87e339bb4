//! Standalone host: the file-backed [`Library`] behind the [`Host`] seam.
//!
//! Every CLI command loads an [`App`] for one game, runs one operation and
//! persists the library before returning.

use crate::{
    archive::ZipArchiver,
    config::{AppConfig, GameConfig},
    deploy::{self, DeployReport, DeployRequest},
    error::is_user_canceled,
    game::{GameId, GamePaths, THUMBNAIL},
    host::{
        DeploymentManifest, Dialog, DialogResult, DiscoveredTool, DownloadRecord, FollowUp, Host,
        ModAttributes, ModRecord, Notification, NotificationKind, ProcessOutput, RemoteFile,
    },
    importer::{self, ImportSource},
    library::Library,
    load_order::{self, LoadOrderEntry},
    nexus::NexusClient,
    orchestrator::Orchestrator,
    tools,
};
use anyhow::{anyhow, bail, Context, Result};
use std::{
    collections::HashMap,
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::{debug, error, info, warn};

const WINE_ENV: &str = "SMPC_MODDER_WINE";

pub struct App {
    pub app_config: AppConfig,
    pub config: GameConfig,
    pub library: Library,
    base_dir: PathBuf,
    orchestrator: Orchestrator,
    interactive: bool,
    /// Launcher for Windows executables on other platforms.
    pub wine: String,
    /// Everything raised through [`Host::notify`] during this run.
    pub notifications: Vec<Notification>,
}

impl App {
    pub fn load(game: Option<GameId>, interactive: bool) -> Result<Self> {
        Self::load_in(&crate::config::base_data_dir()?, game, interactive)
    }

    pub fn load_in(base_dir: &Path, game: Option<GameId>, interactive: bool) -> Result<Self> {
        let mut app_config = AppConfig::load_or_create_in(base_dir)?;
        if let Some(game) = game {
            if app_config.active_game != game {
                app_config.active_game = game;
                app_config.save_in(base_dir)?;
            }
        }
        let game = app_config.active_game;
        let config = GameConfig::load_or_create_in(base_dir, game, &app_config)?;
        let library = Library::load_or_create(&config.data_dir)?;
        let mut orchestrator = Orchestrator::new(game);
        orchestrator.set_force_tool_run(library.force_tool_run);

        Ok(Self {
            app_config,
            config,
            library,
            base_dir: base_dir.to_path_buf(),
            orchestrator,
            interactive,
            wine: std::env::var(WINE_ENV).unwrap_or_else(|_| "wine".to_string()),
            notifications: Vec::new(),
        })
    }

    pub fn game(&self) -> GameId {
        self.config.game_id
    }

    pub fn paths(&self) -> Result<GamePaths> {
        let game = self.game();
        self.game_paths(game).with_context(|| {
            format!(
                "{} has no game root; run `smpc-modder setup --game-root <dir>`",
                game.display_name()
            )
        })
    }

    pub fn save(&mut self) -> Result<()> {
        self.library.force_tool_run = self.orchestrator.force_tool_run();
        self.library.save(&self.config.data_dir)
    }

    fn with_orchestrator<T>(&mut self, f: impl FnOnce(&mut Orchestrator, &mut Self) -> T) -> T {
        let mut placeholder = Orchestrator::new(self.game());
        placeholder.set_force_tool_run(self.orchestrator.force_tool_run());
        let mut orchestrator = std::mem::replace(&mut self.orchestrator, placeholder);
        let out = f(&mut orchestrator, self);
        self.orchestrator = orchestrator;
        out
    }

    /// Stores the game root and prepares the mods folder and tools.
    pub fn setup(&mut self, game_root: Option<PathBuf>) -> Result<()> {
        let game = self.game();
        if let Some(root) = game_root {
            let root = crate::game::resolve_game_root(game, Some(&root))?;
            self.app_config.game_roots.insert(game, root.clone());
            self.app_config.save_in(&self.base_dir)?;
            self.config.game_root = Some(root);
            self.config.save()?;
        }
        self.paths()?;
        self.with_orchestrator(|orchestrator, app| orchestrator.setup(app))?;
        self.save()
    }

    pub fn install(&mut self, archive: &Path) -> Result<Vec<String>> {
        let game = self.game();
        let ids = importer::import_archive(self, game, archive, &ImportSource::default())?;
        self.after_install(&ids)?;
        Ok(ids)
    }

    fn after_install(&mut self, ids: &[String]) -> Result<()> {
        for id in ids {
            if self.app_config.auto_enable {
                self.library.set_enabled(id, true);
            }
            let id = id.clone();
            self.with_orchestrator(|orchestrator, app| orchestrator.did_install_mod(app, &id))?;
        }
        if !ids.is_empty() {
            self.library.deployment_necessary = true;
        }
        self.save()
    }

    pub fn set_enabled(&mut self, query: &str, enabled: bool) -> Result<String> {
        let id = self.resolve_mod(query)?;
        self.library.set_enabled(&id, enabled);
        self.library.deployment_necessary = true;
        self.save()?;
        Ok(id)
    }

    pub fn move_mod(&mut self, query: &str, index: usize) -> Result<String> {
        let id = self.resolve_mod(query)?;
        self.library.move_mod(&id, index);
        self.library.deployment_necessary = true;
        self.save()?;
        Ok(id)
    }

    pub fn remove(&mut self, query: &str) -> Result<ModRecord> {
        let id = self.resolve_mod(query)?;
        let record = self
            .library
            .remove_mod(&id)
            .with_context(|| format!("mod {id} vanished"))?;
        let folder = self.config.staging_dir().join(&record.installation_path);
        if folder.exists() {
            fs::remove_dir_all(&folder)
                .with_context(|| format!("remove staging folder {}", folder.display()))?;
        }
        self.with_orchestrator(|orchestrator, app| orchestrator.did_remove_mods(app));
        self.save()?;
        Ok(record)
    }

    fn resolve_mod(&self, query: &str) -> Result<String> {
        self.library
            .find_mod(query)
            .map(|record| record.id.clone())
            .with_context(|| format!("no installed mod matches {query:?}"))
    }

    pub fn deploy(&mut self) -> Result<DeployReport> {
        let game = self.game();
        let paths = self.paths()?;
        self.with_orchestrator(|orchestrator, app| orchestrator.will_deploy(app))?;

        let staging = self.config.staging_dir();
        let thumbnail = self.thumbnail(game);
        let mods = self.library.enabled_mods();
        let request = DeployRequest {
            game,
            paths: &paths,
            staging: &staging,
            mods: &mods,
            thumbnail: thumbnail.as_deref(),
        };
        let result = deploy::deploy(
            &request,
            &self.library.manifest,
            self.orchestrator.merge_context_mut(),
            &mut ZipArchiver,
        );
        let (manifest, report) = match result {
            Ok(done) => done,
            Err(err) => {
                self.orchestrator.abort();
                return Err(err);
            }
        };
        self.library.manifest = manifest;
        self.library.deployment_necessary = false;
        self.save()?;
        if report.merge_failures > 0 {
            self.notify(Notification::error(
                "Failed to merge mods",
                format!(
                    "{} file(s) could not be added to {}",
                    report.merge_failures,
                    game.merged_archive_name()
                ),
            ));
        }

        if let Err(err) = self.refresh_load_order(game) {
            warn!(%game, error = %format!("{err:#}"), "failed to update load order");
            self.notify(Notification::error("Failed to update load order", format!("{err:#}")));
        }

        let deployment = deploy::by_type(&self.library.manifest);
        self.with_orchestrator(|orchestrator, app| orchestrator.did_deploy(app, &deployment))?;
        self.save()?;
        Ok(report)
    }

    fn refresh_load_order(&mut self, game: GameId) -> Result<()> {
        let entries = load_order::deserialize(self, game)?;
        load_order::serialize(self, game, &entries)
    }

    pub fn purge(&mut self) -> Result<usize> {
        let paths = self.paths()?;
        self.with_orchestrator(|orchestrator, app| orchestrator.will_purge(app))?;
        let removed = deploy::purge(&paths, &self.library.manifest)?;
        self.library.manifest = DeploymentManifest::default();
        self.library.deployment_necessary = true;
        self.orchestrator.did_purge();
        self.save()?;
        info!(game = %self.game(), removed, "purge finished");
        Ok(removed)
    }

    pub fn load_order(&mut self) -> Result<Vec<LoadOrderEntry>> {
        let game = self.game();
        load_order::deserialize(self, game)
    }

    pub fn set_load_order_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        let game = self.game();
        let mut entries = load_order::deserialize(self, game)?;
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id.eq_ignore_ascii_case(id))
            .with_context(|| format!("{id} is not in the load order"))?;
        entry.enabled = enabled;
        if let Some(problem) = load_order::validate(&entries) {
            bail!(problem);
        }
        load_order::serialize(self, game, &entries)
    }

    /// Runs a follow-up offered by a notification.
    pub fn follow_up(&mut self, follow_up: FollowUp) -> Result<()> {
        match follow_up {
            FollowUp::InstallSuitTool(game) => match tools::ensure_suit_tool(self, game) {
                Err(err) if is_user_canceled(&err) => Ok(()),
                other => other,
            },
        }
    }

    pub fn open_game_dir(&mut self) -> Result<()> {
        let paths = self.paths()?;
        let target = if paths.mods_dir.is_dir() {
            paths.mods_dir
        } else {
            paths.game_root
        };
        open_external(&target)
    }

    fn nexus(&self) -> Result<NexusClient> {
        let key = self
            .app_config
            .nexus_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .context("no Nexus API key configured (set nexus_api_key in config.json)")?;
        Ok(NexusClient::new(key))
    }

    fn prompt(&self, dialog: &Dialog) -> Result<DialogResult> {
        let stdin = io::stdin();
        let mut stderr = io::stderr();
        let mut input: HashMap<String, bool> = dialog
            .checkboxes
            .iter()
            .map(|checkbox| (checkbox.id.clone(), checkbox.value))
            .collect();

        writeln!(stderr, "\n== {} ==\n{}\n", dialog.title, dialog.body)?;
        if !dialog.checkboxes.is_empty() {
            loop {
                for (idx, checkbox) in dialog.checkboxes.iter().enumerate() {
                    let mark = if input.get(&checkbox.id).copied().unwrap_or(false) { 'x' } else { ' ' };
                    writeln!(stderr, "  [{mark}] {}. {}", idx + 1, checkbox.text)?;
                }
                write!(stderr, "Toggle a number, or press enter to continue: ")?;
                stderr.flush()?;
                let mut line = String::new();
                stdin.lock().read_line(&mut line).context("read answer")?;
                let line = line.trim();
                if line.is_empty() {
                    break;
                }
                match line.parse::<usize>().ok().and_then(|n| dialog.checkboxes.get(n.wrapping_sub(1))) {
                    Some(checkbox) => {
                        let value = input.entry(checkbox.id.clone()).or_insert(false);
                        *value = !*value;
                    }
                    None => writeln!(stderr, "unknown choice {line:?}")?,
                }
            }
        }

        if dialog.buttons.len() <= 1 {
            let action = dialog.buttons.first().cloned().unwrap_or_default();
            return Ok(DialogResult { action, input });
        }
        loop {
            for (idx, button) in dialog.buttons.iter().enumerate() {
                writeln!(stderr, "  {}) {}", idx + 1, button)?;
            }
            write!(stderr, "Choose: ")?;
            stderr.flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).context("read answer")? == 0 {
                bail!("stdin closed during prompt");
            }
            if let Some(button) = line
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| dialog.buttons.get(n.wrapping_sub(1)))
            {
                return Ok(DialogResult {
                    action: button.clone(),
                    input,
                });
            }
        }
    }
}

impl Host for App {
    fn discovery(&self, _game: GameId) -> Option<PathBuf> {
        self.config.game_root.clone()
    }

    fn staging_path(&self, _game: GameId) -> PathBuf {
        self.config.staging_dir()
    }

    fn download_path(&self, _game: GameId) -> PathBuf {
        self.config.downloads_dir()
    }

    fn thumbnail(&self, _game: GameId) -> Option<PathBuf> {
        let path = self.config.data_dir.join(THUMBNAIL);
        path.is_file().then_some(path)
    }

    fn is_premium(&self) -> bool {
        self.app_config.premium
    }

    fn mods(&self, _game: GameId) -> Vec<ModRecord> {
        self.library.mods.clone()
    }

    fn is_mod_enabled(&self, _game: GameId, mod_id: &str) -> bool {
        self.library.is_enabled(mod_id)
    }

    fn set_mod_enabled(&mut self, _game: GameId, mod_id: &str, enabled: bool) -> Result<()> {
        if !self.library.set_enabled(mod_id, enabled) {
            return Err(anyhow!("unknown mod {mod_id}"));
        }
        self.save()
    }

    fn create_mod(&mut self, _game: GameId, record: ModRecord) -> Result<()> {
        info!(mod_id = %record.id, name = %record.name, "mod added");
        self.library.upsert_mod(record);
        self.save()
    }

    fn set_deployment_necessary(&mut self, game: GameId, necessary: bool) {
        self.library.deployment_necessary = necessary;
        if let Err(err) = self.save() {
            warn!(%game, error = %err, "failed to persist deployment flag");
        }
    }

    fn deployment_manifest(&self, _game: GameId) -> Result<DeploymentManifest> {
        Ok(self.library.manifest.clone())
    }

    fn discovered_tool(&self, _game: GameId, tool_id: &str) -> Option<DiscoveredTool> {
        self.library.tool(tool_id).cloned()
    }

    fn add_discovered_tool(&mut self, _game: GameId, tool: DiscoveredTool) -> Result<()> {
        debug!(tool = %tool.id, path = %tool.path.display(), "tool registered");
        self.library.upsert_tool(tool);
        self.save()
    }

    fn notify(&mut self, notification: Notification) {
        let title = notification.title.as_deref().unwrap_or("");
        match notification.kind {
            NotificationKind::Error => error!(title, message = %notification.message, "notification"),
            NotificationKind::Warning => warn!(title, message = %notification.message, "notification"),
            NotificationKind::Info | NotificationKind::Activity => {
                info!(title, message = %notification.message, "notification")
            }
        }
        if notification.kind != NotificationKind::Activity {
            if title.is_empty() {
                eprintln!("{}", notification.message);
            } else {
                eprintln!("{title}: {}", notification.message);
            }
            for action in &notification.actions {
                match action.follow_up {
                    FollowUp::InstallSuitTool(_) => {
                        eprintln!("  ({}: run `smpc-modder setup`)", action.title)
                    }
                }
            }
        }
        self.notifications.push(notification);
    }

    fn dismiss(&mut self, id: &str) {
        debug!(id, "notification dismissed");
        self.notifications
            .retain(|notification| notification.id.as_deref() != Some(id));
    }

    fn show_dialog(&mut self, dialog: Dialog) -> Result<DialogResult> {
        if !self.interactive {
            // Checkbox defaults, first button. Prompts here start with "Cancel".
            let input = dialog
                .checkboxes
                .iter()
                .map(|checkbox| (checkbox.id.clone(), checkbox.value))
                .collect();
            let action = dialog.buttons.first().cloned().unwrap_or_default();
            debug!(title = %dialog.title, %action, "non-interactive dialog answered");
            return Ok(DialogResult { action, input });
        }
        self.prompt(&dialog)
    }

    fn mod_files(&mut self, game: GameId, nexus_mod_id: u32) -> Result<Vec<RemoteFile>> {
        self.nexus()?.mod_files(game, nexus_mod_id)
    }

    fn find_download(&self, file_id: u64) -> Option<DownloadRecord> {
        self.library.find_download(file_id).cloned()
    }

    fn start_download(
        &mut self,
        game: GameId,
        nexus_mod_id: u32,
        file: &RemoteFile,
    ) -> Result<DownloadRecord> {
        let dir = self.config.downloads_dir();
        let path = self.nexus()?.download(game, nexus_mod_id, file, &dir)?;
        let record = DownloadRecord {
            id: format!("{nexus_mod_id}-{}", file.file_id),
            local_path: path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&file.name)),
            nexus_mod_id: Some(nexus_mod_id),
            file_id: Some(file.file_id),
            version: file.version.clone(),
        };
        self.library.downloads.retain(|existing| existing.id != record.id);
        self.library.downloads.push(record.clone());
        self.save()?;
        Ok(record)
    }

    fn install_download(&mut self, game: GameId, download_id: &str) -> Result<String> {
        let download = self
            .library
            .download(download_id)
            .cloned()
            .with_context(|| format!("unknown download {download_id}"))?;
        let archive = self.config.downloads_dir().join(&download.local_path);
        let source = ImportSource {
            archive_id: Some(download.id.clone()),
            attributes: ModAttributes {
                nexus_mod_id: download.nexus_mod_id,
                file_id: download.file_id,
                version: download.version.clone(),
                source: Some("nexus".to_string()),
                ..ModAttributes::default()
            },
        };
        let ids = importer::import_archive(self, game, &archive, &source)?;
        self.after_install(&ids)?;
        ids.into_iter()
            .next()
            .with_context(|| format!("{} installed no mods", archive.display()))
    }

    fn run_executable(&mut self, exec: &Path, args: &[String], cwd: &Path) -> Result<ProcessOutput> {
        let mut command = if needs_wine(exec) {
            let mut command = Command::new(&self.wine);
            command.arg(exec);
            command
        } else {
            Command::new(exec)
        };
        let output = command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("launch {}", exec.display()))?;
        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

fn needs_wine(exec: &Path) -> bool {
    !cfg!(windows)
        && exec
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("exe"))
            .unwrap_or(false)
}

pub fn open_external(target: &Path) -> Result<()> {
    let target = target.to_string_lossy().to_string();
    let mut errors = Vec::new();
    let candidates = [
        ("xdg-open", vec![target.as_str()]),
        ("gio", vec!["open", target.as_str()]),
        ("kde-open5", vec![target.as_str()]),
    ];
    for (command, args) in candidates {
        match Command::new(command)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => return Ok(()),
            Ok(status) => errors.push(format!("{command} exited {status}")),
            Err(err) => errors.push(format!("{command} failed: {err}")),
        }
    }
    Err(anyhow!("could not open {target}: {}", errors.join("; ")))
}
