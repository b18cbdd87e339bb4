//! Reactions to the deployment lifecycle of one game.
//!
//! ```text
//!   Idle --will_deploy--> Deploying --did_deploy--> Idle
//!   Idle --will_purge---> Purging ---did_purge----> Idle
//! ```
//!
//! The orchestrator owns the [`MergeContext`] of the running cycle and resets
//! it on both edges of a deployment.

use crate::{
    error::{is_not_found, is_user_canceled, ToolUnavailable},
    game::{GameId, MOD_TYPE_ID, TOOL_ID, TOOL_NAME, TOOL_TYPE_ID},
    host::{Deployment, Host, Notification},
    load_order,
    merge::MergeContext,
    tools,
};
use anyhow::{Context, Result};
use std::fs;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Deploying,
    Purging,
}

#[derive(Debug)]
pub struct Orchestrator {
    game: GameId,
    phase: Phase,
    force_tool_run: bool,
    merge: MergeContext,
}

impl Orchestrator {
    pub fn new(game: GameId) -> Self {
        Self {
            game,
            phase: Phase::Idle,
            force_tool_run: false,
            merge: MergeContext::new(),
        }
    }

    pub fn game(&self) -> GameId {
        self.game
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn force_tool_run(&self) -> bool {
        self.force_tool_run
    }

    pub fn set_force_tool_run(&mut self, force: bool) {
        self.force_tool_run = force;
    }

    pub fn merge_context_mut(&mut self) -> &mut MergeContext {
        &mut self.merge
    }

    /// Prepares a freshly managed game: mods folder plus both tools.
    pub fn setup<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        let game = self.game;
        let paths = host
            .game_paths(game)
            .with_context(|| format!("{game} is not discovered"))?;
        fs::create_dir_all(&paths.mods_dir).context("create mods dir")?;
        let meta = fs::metadata(&paths.mods_dir).context("stat mods dir")?;
        if meta.permissions().readonly() {
            anyhow::bail!("mods dir is not writable: {}", paths.mods_dir.display());
        }

        for (label, result) in [
            ("modding tool", tools::ensure_tool(host, game)),
            ("suit tool", tools::ensure_suit_tool(host, game)),
        ] {
            match result {
                Ok(()) => {}
                Err(err) if is_user_canceled(&err) => {
                    debug!(%game, label, "setup prompt declined");
                }
                Err(err) => return Err(err).with_context(|| format!("set up {label}")),
            }
        }
        Ok(())
    }

    pub fn will_deploy<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        let game = self.game;
        self.phase = Phase::Deploying;
        self.merge.reset();

        if !host.is_premium() {
            // Download links need a premium account.
            if has_enabled_content(host, game) && !tool_resolvable(host, game) {
                self.phase = Phase::Idle;
                return Err(ToolUnavailable {
                    tool: TOOL_NAME.to_string(),
                    game,
                }
                .into());
            }
            return Ok(());
        }

        let tool_enabled = host
            .mods(game)
            .iter()
            .find(|record| record.mod_type == TOOL_TYPE_ID)
            .map(|record| host.is_mod_enabled(game, &record.id))
            .unwrap_or(false);
        if !tool_enabled {
            if let Err(err) = tools::ensure_tool(host, game) {
                if !is_user_canceled(&err) {
                    warn!(%game, error = %err, "failed to install modding tool");
                    host.notify(Notification::error("Failed to install SMPC", format!("{err:#}")));
                }
            }
        }
        Ok(())
    }

    pub fn did_deploy<H: Host + ?Sized>(&mut self, host: &mut H, deployment: &Deployment) -> Result<()> {
        let game = self.game;
        host.dismiss("redundant-mods");
        self.merge.reset();
        self.phase = Phase::Idle;

        let Some(paths) = host.game_paths(game) else {
            return Ok(());
        };
        let enabled_asset_mods = host
            .mods(game)
            .iter()
            .filter(|record| record.mod_type == MOD_TYPE_ID && host.is_mod_enabled(game, &record.id))
            .count();
        let deployed_archives = deploys_mod_archives(deployment, game);
        if !self.force_tool_run && enabled_asset_mods == 0 && !deployed_archives {
            debug!(%game, "no asset mods deployed, skipping tools");
            return Ok(());
        }
        self.force_tool_run = false;

        info!(%game, enabled_asset_mods, "running tools after deployment");
        let exec = paths.tool_exec(game);
        if exec.is_file() {
            if let Err(err) = tools::run_tool(host, &exec) {
                warn!(%game, error = %err, "failed to run SMPC");
            }
        } else {
            tools::raise_tool_reminder(host);
        }
        if let Err(err) = tools::run_suit_tool(host, game, &paths.tool_dir, deployment) {
            warn!(%game, error = %err, "failed to run suit adder tool");
        }
        Ok(())
    }

    pub fn will_purge<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        let game = self.game;
        let Some(paths) = host.game_paths(game) else {
            return Ok(());
        };
        self.phase = Phase::Purging;

        if let Err(err) = fs::remove_file(&paths.lo_file) {
            if !is_not_found(&err) {
                debug!(path = %paths.lo_file.display(), error = %err, "load order not removed");
            }
        }

        if host.mods(game).is_empty() {
            return Ok(());
        }
        // Restores the game archives to their unmodded state.
        tools::run_tool(host, &paths.tool_exec(game))
    }

    pub fn did_purge(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Back to idle after a deployment that failed between the two hooks.
    pub fn abort(&mut self) {
        self.merge.reset();
        self.phase = Phase::Idle;
    }

    pub fn did_remove_mods<H: Host + ?Sized>(&mut self, host: &mut H) {
        host.set_deployment_necessary(self.game, true);
        self.force_tool_run = true;
    }

    pub fn did_install_mod<H: Host + ?Sized>(&mut self, host: &mut H, mod_id: &str) -> Result<()> {
        let game = self.game;
        let is_tool = host
            .mods(game)
            .iter()
            .any(|record| record.id == mod_id && record.mod_type == TOOL_TYPE_ID);
        if !is_tool {
            return Ok(());
        }
        let paths = host
            .game_paths(game)
            .with_context(|| format!("{game} is not discovered"))?;
        tools::update_tool(host, game, &paths.tool_exec(game))
    }
}

fn has_enabled_content<H: Host + ?Sized>(host: &H, game: GameId) -> bool {
    host.mods(game).iter().any(|record| {
        record.mod_type != TOOL_TYPE_ID && host.is_mod_enabled(game, &record.id)
    })
}

fn tool_resolvable<H: Host + ?Sized>(host: &H, game: GameId) -> bool {
    let page_id = game.spec().tool_page_id;
    let installed = host.mods(game).iter().any(|record| {
        record.mod_type == TOOL_TYPE_ID || record.attributes.nexus_mod_id == Some(page_id)
    });
    let discovered = host
        .discovered_tool(game, TOOL_ID)
        .map(|tool| tool.path.is_file())
        .unwrap_or(false);
    let in_game = host
        .game_paths(game)
        .map(|paths| paths.tool_exec(game).is_file())
        .unwrap_or(false);
    installed || discovered || in_game
}

fn deploys_mod_archives(deployment: &Deployment, game: GameId) -> bool {
    let ext = game.spec().mod_ext;
    deployment.values().flatten().any(|file| {
        load_order::in_mods_folder(&file.rel_path, game)
            && file.rel_path.to_lowercase().ends_with(ext)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::{GamePaths, DEFAULT_TYPE_ID},
        host::DeployedFile,
        testing::FakeHost,
    };
    use std::{collections::HashMap, path::Path};
    use tempfile::TempDir;

    fn host_with_tool(root: &Path, game: GameId) -> (FakeHost, GamePaths) {
        let host = FakeHost::with_root(root);
        let paths = GamePaths::new(game, root);
        fs::create_dir_all(&paths.tool_dir).unwrap();
        fs::write(paths.tool_exec(game), b"").unwrap();
        (host, paths)
    }

    #[test]
    fn did_deploy___skips_tool_without_asset_mods() {
        let temp = TempDir::new().unwrap();
        let (mut host, _paths) = host_with_tool(temp.path(), GameId::SpiderManRemastered);
        let mut orchestrator = Orchestrator::new(GameId::SpiderManRemastered);
        orchestrator.did_deploy(&mut host, &HashMap::new()).unwrap();
        assert!(host.invocations.is_empty());
        assert_eq!(host.dismissed, vec!["redundant-mods".to_string()]);
    }

    #[test]
    fn did_deploy___runs_tool_for_enabled_asset_mod_and_resets_merge() {
        let temp = TempDir::new().unwrap();
        let (mut host, paths) = host_with_tool(temp.path(), GameId::SpiderManRemastered);
        host.add_mod("suit", MOD_TYPE_ID, true);
        let mut orchestrator = Orchestrator::new(GameId::SpiderManRemastered);
        orchestrator.will_deploy(&mut host).unwrap();
        assert_eq!(orchestrator.phase(), Phase::Deploying);

        crate::merge::merge(
            orchestrator.merge_context_mut(),
            &mut crate::archive::ZipArchiver,
            GameId::SpiderManRemastered,
            None,
            Path::new("/nowhere/ModFiles/a.dat"),
            temp.path(),
        )
        .ok();

        orchestrator.did_deploy(&mut host, &HashMap::new()).unwrap();
        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert!(orchestrator.merge_context_mut().is_empty());
        assert_eq!(host.invocations.len(), 1);
        assert_eq!(host.invocations[0].exec, paths.tool_exec(GameId::SpiderManRemastered));
    }

    #[test]
    fn did_deploy___runs_for_archives_in_mods_folder() {
        let temp = TempDir::new().unwrap();
        let (mut host, _paths) = host_with_tool(temp.path(), GameId::MilesMorales);
        let mut deployment = HashMap::new();
        deployment.insert(
            DEFAULT_TYPE_ID.to_string(),
            vec![DeployedFile {
                rel_path: "SMPCTool/ModManager/MMPCMods/suit.mmpcmod".into(),
                source: "suit".into(),
                mod_type: DEFAULT_TYPE_ID.into(),
            }],
        );
        let mut orchestrator = Orchestrator::new(GameId::MilesMorales);
        orchestrator.did_deploy(&mut host, &deployment).unwrap();
        assert_eq!(host.invocations.len(), 1);
    }

    #[test]
    fn did_deploy___ignores_archives_beside_mods_folder() {
        let temp = TempDir::new().unwrap();
        let (mut host, _paths) = host_with_tool(temp.path(), GameId::MilesMorales);
        let mut deployment = HashMap::new();
        deployment.insert(
            DEFAULT_TYPE_ID.to_string(),
            vec![DeployedFile {
                rel_path: "SMPCTool/ModManager/MMPCModsX/suit.mmpcmod".into(),
                source: "suit".into(),
                mod_type: DEFAULT_TYPE_ID.into(),
            }],
        );
        let mut orchestrator = Orchestrator::new(GameId::MilesMorales);
        orchestrator.did_deploy(&mut host, &deployment).unwrap();
        assert!(host.invocations.is_empty());
    }

    #[test]
    fn did_deploy___reminds_when_tool_is_not_deployed() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        host.add_mod("suit", MOD_TYPE_ID, true);
        let mut orchestrator = Orchestrator::new(GameId::SpiderManRemastered);
        orchestrator.did_deploy(&mut host, &HashMap::new()).unwrap();
        assert!(host.invocations.is_empty());
        assert_eq!(host.notifications.len(), 1);
        assert_eq!(host.notifications[0].id.as_deref(), Some("run-smpc-notif"));
    }

    #[test]
    fn did_remove_mods___forces_next_tool_run_once() {
        let temp = TempDir::new().unwrap();
        let (mut host, _paths) = host_with_tool(temp.path(), GameId::SpiderManRemastered);
        let mut orchestrator = Orchestrator::new(GameId::SpiderManRemastered);

        orchestrator.did_remove_mods(&mut host);
        assert!(host.deployment_necessary);
        assert!(orchestrator.force_tool_run());

        orchestrator.did_deploy(&mut host, &HashMap::new()).unwrap();
        assert_eq!(host.invocations.len(), 1);
        assert!(!orchestrator.force_tool_run());

        orchestrator.did_deploy(&mut host, &HashMap::new()).unwrap();
        assert_eq!(host.invocations.len(), 1);
    }

    #[test]
    fn will_purge___removes_load_order_and_reverts_when_mods_remain() {
        let temp = TempDir::new().unwrap();
        let (mut host, paths) = host_with_tool(temp.path(), GameId::SpiderManRemastered);
        fs::create_dir_all(paths.lo_file.parent().unwrap()).unwrap();
        fs::write(&paths.lo_file, "a.smpcmod,1").unwrap();
        host.add_mod("suit", MOD_TYPE_ID, false);

        let mut orchestrator = Orchestrator::new(GameId::SpiderManRemastered);
        orchestrator.will_purge(&mut host).unwrap();
        assert_eq!(orchestrator.phase(), Phase::Purging);
        assert!(!paths.lo_file.exists());
        assert_eq!(host.invocations.len(), 1);

        orchestrator.did_purge();
        assert_eq!(orchestrator.phase(), Phase::Idle);
    }

    #[test]
    fn will_purge___without_mods_skips_tool() {
        let temp = TempDir::new().unwrap();
        let (mut host, _paths) = host_with_tool(temp.path(), GameId::SpiderManRemastered);
        let mut orchestrator = Orchestrator::new(GameId::SpiderManRemastered);
        orchestrator.will_purge(&mut host).unwrap();
        assert!(host.invocations.is_empty());
    }

    #[test]
    fn will_deploy___free_user_without_tool_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        host.add_mod("suit", MOD_TYPE_ID, true);
        let mut orchestrator = Orchestrator::new(GameId::SpiderManRemastered);
        let err = orchestrator.will_deploy(&mut host).unwrap_err();
        assert!(err.is::<ToolUnavailable>());
        assert_eq!(orchestrator.phase(), Phase::Idle);
    }

    #[test]
    fn will_deploy___premium_cancel_is_silent() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        host.premium = true;
        host.answer("Cancel");
        let mut orchestrator = Orchestrator::new(GameId::SpiderManRemastered);
        orchestrator.will_deploy(&mut host).unwrap();
        assert_eq!(host.dialogs.len(), 1);
        assert!(host.notifications.is_empty());
    }

    #[test]
    fn setup___swallows_declined_prompts() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        host.answer("Cancel");
        host.answer("Cancel");
        let mut orchestrator = Orchestrator::new(GameId::MilesMorales);
        orchestrator.setup(&mut host).unwrap();
        assert!(GamePaths::new(GameId::MilesMorales, temp.path()).mods_dir.is_dir());
        assert_eq!(host.dialogs.len(), 2);
    }

    #[test]
    fn did_install_mod___registers_deployed_tool_path() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        host.add_mod("tool", TOOL_TYPE_ID, true);
        let mut orchestrator = Orchestrator::new(GameId::MilesMorales);
        orchestrator.did_install_mod(&mut host, "tool").unwrap();
        assert_eq!(
            host.tools[TOOL_ID].path,
            temp.path().join("SMPCTool").join("MMPCTool.exe")
        );
    }
}
