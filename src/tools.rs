//! The SMPC modding tool and the Suit Adder Tool: discovery, installation and runs.

use crate::{
    error::{is_not_found, SuitToolFailure, UserCanceled},
    game::{GameId, DEFAULT_TYPE_ID, SUIT_TOOL_EXEC, SUIT_TOOL_ID, SUIT_TOOL_NAME, TOOL_DIR, TOOL_ID, TOOL_NAME},
    host::{
        Deployment, Dialog, DiscoveredTool, DownloadRecord, FollowUp, Host, ModAttributes,
        ModRecord, Notification, NotificationAction, NotificationKind,
    },
};
use anyhow::{anyhow, Context, Result};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{info, warn};

const RUNNING_TOOL_NOTIF: &str = "running-spmctool";
const MAIN_FILE_CATEGORY: u32 = 1;
const CANCEL: &str = "Cancel";
const DOWNLOAD_AND_INSTALL: &str = "Download and Install";

pub fn update_tool<H: Host + ?Sized>(host: &mut H, game: GameId, exec: &Path) -> Result<()> {
    let working_directory = exec
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    host.add_discovered_tool(
        game,
        DiscoveredTool {
            id: TOOL_ID.to_string(),
            name: TOOL_NAME.to_string(),
            path: exec.to_path_buf(),
            working_directory,
            hidden: false,
            custom: false,
            default_primary: false,
        },
    )
}

/// Whether some installed mod provides the tool from Nexus page `page_id`.
///
/// An enabled copy wins; otherwise the newest disabled copy is enabled silently.
pub fn check_tool_installed<H: Host + ?Sized>(
    host: &mut H,
    game: GameId,
    exec: &Path,
    page_id: u32,
) -> Result<bool> {
    let tools: Vec<ModRecord> = host
        .mods(game)
        .into_iter()
        .filter(|record| record.attributes.nexus_mod_id == Some(page_id))
        .collect();

    if tools.iter().any(|record| host.is_mod_enabled(game, &record.id)) {
        if let Err(err) = fs::metadata(exec) {
            info!(%game, exec = %exec.display(), error = %err, "tool enabled but not deployed");
            host.set_deployment_necessary(game, true);
        }
        return Ok(true);
    }

    let newest = tools.into_iter().fold(None::<ModRecord>, |best, record| match best {
        Some(best) if best.upload_time() >= record.upload_time() => Some(best),
        _ => Some(record),
    });
    match newest {
        Some(record) => {
            info!(%game, mod_id = %record.id, "enabling installed tool");
            host.set_mod_enabled(game, &record.id, true)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

pub fn ensure_tool<H: Host + ?Sized>(host: &mut H, game: GameId) -> Result<()> {
    let paths = host
        .game_paths(game)
        .with_context(|| format!("{game} is not discovered"))?;
    let exec = paths.tool_exec(game);
    if check_tool_installed(host, game, &exec, game.spec().tool_page_id)? {
        update_tool(host, game, &exec)
    } else {
        query_tool(host, game)
    }
}

pub fn ensure_suit_tool<H: Host + ?Sized>(host: &mut H, game: GameId) -> Result<()> {
    let paths = host
        .game_paths(game)
        .with_context(|| format!("{game} is not discovered"))?;
    let exec = paths.suit_tool_exec();
    if check_tool_installed(host, game, &exec, game.spec().suit_tool_page_id)? {
        return Ok(());
    }
    query_suit_tool(host, game)
}

fn query_tool<H: Host + ?Sized>(host: &mut H, game: GameId) -> Result<()> {
    let result = host.show_dialog(Dialog {
        title: TOOL_NAME.to_string(),
        body: format!(
            "\"{TOOL_NAME}\" is required to successfully mod \"{}\".\n\n\
             The tool can be downloaded and installed for you.",
            game.display_name()
        ),
        checkboxes: Vec::new(),
        buttons: vec![CANCEL.to_string(), DOWNLOAD_AND_INSTALL.to_string()],
    })?;
    if result.action == CANCEL {
        return Err(UserCanceled.into());
    }

    let mod_id = download_and_install(host, game, game.spec().tool_page_id)?;
    let paths = host
        .game_paths(game)
        .with_context(|| format!("{game} is not discovered"))?;
    info!(%game, %mod_id, "modding tool installed");
    update_tool(host, game, &paths.tool_exec(game))
}

fn query_suit_tool<H: Host + ?Sized>(host: &mut H, game: GameId) -> Result<()> {
    let result = host.show_dialog(Dialog {
        title: "Suit Tool".to_string(),
        body: "You likely want \"Suit Adder Tool\" by ASC as it's required to install suit mods \
               that install to a separate slot instead of replacing an existing suit. \
               (It will be run automatically after deployment)."
            .to_string(),
        checkboxes: Vec::new(),
        buttons: vec![CANCEL.to_string(), DOWNLOAD_AND_INSTALL.to_string()],
    })?;
    if result.action == CANCEL {
        return Err(UserCanceled.into());
    }

    let page_id = game.spec().suit_tool_page_id;
    // Distributed as a bare executable, so it skips the installer pipeline.
    let download = download(host, game, page_id)?;
    let install_time = OffsetDateTime::now_utc().format(&Rfc3339).ok();
    host.create_mod(
        game,
        ModRecord {
            id: SUIT_TOOL_ID.to_string(),
            name: SUIT_TOOL_NAME.to_string(),
            mod_type: DEFAULT_TYPE_ID.to_string(),
            installation_path: SUIT_TOOL_ID.to_string(),
            archive_id: Some(download.id.clone()),
            attributes: ModAttributes {
                nexus_mod_id: Some(page_id),
                file_id: download.file_id,
                version: download.version.clone(),
                uploaded_timestamp: None,
                install_time,
                logical_file_name: Some(SUIT_TOOL_NAME.to_string()),
                source: Some("nexus".to_string()),
            },
        },
    )?;

    let mod_base = host.staging_path(game).join(SUIT_TOOL_ID).join(TOOL_DIR);
    fs::create_dir_all(&mod_base).context("create suit tool dir")?;
    let downloaded = host.download_path(game).join(&download.local_path);
    fs::copy(&downloaded, mod_base.join(SUIT_TOOL_EXEC)).context("copy suit tool")?;
    fs::write(mod_base.join("lang.txt"), "en").context("write suit tool language")?;
    host.set_mod_enabled(game, SUIT_TOOL_ID, true)?;
    host.set_deployment_necessary(game, true);
    info!(%game, "suit tool installed");
    Ok(())
}

/// Finds the newest main file on the page, reusing an existing download of it.
pub fn download<H: Host + ?Sized>(host: &mut H, game: GameId, page_id: u32) -> Result<DownloadRecord> {
    let files = host.mod_files(game, page_id)?;
    let latest = files
        .into_iter()
        .filter(|file| file.category_id == MAIN_FILE_CATEGORY)
        .max_by_key(|file| file.uploaded_timestamp)
        .ok_or_else(|| anyhow!("no main file on Nexus page {page_id}"))?;

    if let Some(existing) = host.find_download(latest.file_id) {
        info!(%game, file_id = latest.file_id, "reusing existing download");
        return Ok(existing);
    }
    host.start_download(game, page_id, &latest)
}

pub fn download_and_install<H: Host + ?Sized>(
    host: &mut H,
    game: GameId,
    page_id: u32,
) -> Result<String> {
    let download = download(host, game, page_id)?;
    let mod_id = host.install_download(game, &download.id)?;
    host.set_mod_enabled(game, &mod_id, true)?;
    Ok(mod_id)
}

/// Runs the injection tool with `-install`. A missing executable is not an error.
pub fn run_tool<H: Host + ?Sized>(host: &mut H, exec: &Path) -> Result<()> {
    if let Err(err) = fs::metadata(exec) {
        if is_not_found(&err) {
            warn!(exec = %exec.display(), "modding tool not deployed, skipping run");
            return Ok(());
        }
        return Err(err).with_context(|| format!("stat {}", exec.display()));
    }

    host.notify(
        Notification::new(NotificationKind::Activity, "Running SMPCTool").with_id(RUNNING_TOOL_NOTIF),
    );
    let cwd = exec.parent().map(Path::to_path_buf).unwrap_or_default();
    info!(exec = %exec.display(), "running modding tool");
    match host.run_executable(exec, &["-install".to_string()], &cwd) {
        Ok(output) if output.success => {}
        Ok(output) => {
            warn!(code = ?output.code, stderr = %output.stderr.trim(), "modding tool failed");
            let mut notification = Notification::error(
                "Failed to run tool",
                format!("{} exited with {:?}", exec.display(), output.code),
            );
            notification.allow_report = false;
            host.notify(notification);
        }
        Err(err) => {
            warn!(error = %err, "failed to launch modding tool");
            let allow_report = err
                .downcast_ref::<io::Error>()
                .map(|io_err| {
                    matches!(
                        io_err.kind(),
                        io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
                    )
                })
                .unwrap_or(false);
            let mut notification = Notification::error("Failed to run tool", format!("{err:#}"));
            notification.allow_report = allow_report;
            host.notify(notification);
        }
    }
    host.dismiss(RUNNING_TOOL_NOTIF);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuitOutcome {
    Added,
    Failed(SuitFailureKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuitFailureKind {
    NoElements,
    OffsetOutsideLimit,
    EndOfStream,
    Unknown,
}

// Both spellings: the tool prints the first one today.
const SUIT_SUCCESS_MARKERS: [&str; 2] = ["Suit Added Succesfully", "Suit Added Successfully"];

const SUIT_FAILURE_TABLE: [(&str, SuitFailureKind); 3] = [
    ("Sequence contains no elements", SuitFailureKind::NoElements),
    ("Offset outside limit", SuitFailureKind::OffsetOutsideLimit),
    (
        "cannot be read past the end of the stream",
        SuitFailureKind::EndOfStream,
    ),
];

/// The tool always ends by reading a key from a redirected console, so exit
/// status alone says little; console output decides.
pub fn classify_suit_output(stdout: &str, exit_ok: bool) -> SuitOutcome {
    if SUIT_SUCCESS_MARKERS
        .iter()
        .any(|marker| stdout.contains(marker))
    {
        return SuitOutcome::Added;
    }
    if exit_ok {
        return SuitOutcome::Added;
    }
    let kind = SUIT_FAILURE_TABLE
        .iter()
        .find(|(needle, _)| stdout.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(SuitFailureKind::Unknown);
    SuitOutcome::Failed(kind)
}

impl SuitFailureKind {
    pub fn failure(self) -> SuitToolFailure {
        let (summary, remediation) = match self {
            SuitFailureKind::NoElements => (
                "Error was \"Sequence contains no elements\".",
                "Suggested solutions from the tool author:\n \
                 - \"One of the smpcmods you have installed is incompatible with the tool you need to uninstall it.\"\n \
                 - \"Try verifying game files and installing again\"",
            ),
            SuitFailureKind::OffsetOutsideLimit => (
                "Error was \"Offset outside limit\".",
                "Suggested solutions from the tool author:\n - \"Delete toc.BAK and verify your game files.\"",
            ),
            SuitFailureKind::EndOfStream => (
                "Error was \"cannot be read past the end of the stream\".",
                "This probably means one of the suits is not compatible with the tool. \
                 Check everything for updates.",
            ),
            SuitFailureKind::Unknown => (
                "Please check the log for full error message.",
                "Common solutions are:\n - validate game files\n - delete toc.BAK\n \
                 - check tool and suit files for updates",
            ),
        };
        SuitToolFailure {
            summary: summary.to_string(),
            remediation: remediation.to_string(),
        }
    }
}

/// Feeds every deployed `.suit` file to the Suit Adder Tool, one run per file.
pub fn run_suit_tool<H: Host + ?Sized>(
    host: &mut H,
    game: GameId,
    tool_dir: &Path,
    deployment: &Deployment,
) -> Result<()> {
    let suit_files: Vec<&str> = deployment
        .get(DEFAULT_TYPE_ID)
        .map(|files| {
            files
                .iter()
                .filter(|file| Path::new(&file.rel_path).extension().and_then(|ext| ext.to_str()) == Some("suit"))
                .map(|file| file.rel_path.as_str())
                .collect()
        })
        .unwrap_or_default();
    if suit_files.is_empty() {
        return Ok(());
    }

    let exec = tool_dir.join(SUIT_TOOL_EXEC);
    if let Err(err) = fs::metadata(&exec) {
        if !is_not_found(&err) {
            return Err(err).with_context(|| format!("stat {}", exec.display()));
        }
        warn!(%game, "suit mods deployed but the suit tool is missing");
        let mut notification = Notification::new(
            NotificationKind::Warning,
            "You have mods installed that require the \"Suit Adder Tool\" to activate. \
             It can be run automatically if you let it be installed for you.",
        );
        notification.allow_suppress = true;
        notification.actions.push(NotificationAction {
            title: "Install".to_string(),
            follow_up: FollowUp::InstallSuitTool(game),
        });
        host.notify(notification);
        return Ok(());
    }

    let game_root = host
        .discovery(game)
        .with_context(|| format!("{game} is not discovered"))?;
    for rel_path in suit_files {
        let suit_path: PathBuf = game_root.join(rel_path);
        info!(suit = %suit_path.display(), "processing suit file");
        let args = [suit_path.to_string_lossy().to_string()];
        let (stdout, exit_ok, stderr) = match host.run_executable(&exec, &args, tool_dir) {
            Ok(output) => (output.stdout, output.success, output.stderr),
            Err(err) => (String::new(), false, format!("{err:#}")),
        };
        match classify_suit_output(&stdout, exit_ok) {
            SuitOutcome::Added => {}
            SuitOutcome::Failed(kind) => {
                warn!(%stdout, %stderr, ?kind, "suit adder tool failed");
                let failure = kind.failure();
                let mut notification = Notification::error(
                    "Failed to run \"Suit Adder Tool\"",
                    format!("{}\n{}", failure.summary, failure.remediation),
                );
                notification.allow_report = false;
                host.notify(notification);
            }
        }
    }
    Ok(())
}

pub fn raise_tool_reminder<H: Host + ?Sized>(host: &mut H) {
    let mut notification = Notification::new(
        NotificationKind::Info,
        "Please remember to run the SMPC Modding Tool to insert the mod files into the game archives.",
    )
    .with_id("run-smpc-notif");
    notification.title = Some("Run Spider-Man PC Modding Tool".to_string());
    notification.allow_suppress = true;
    notification.display_ms = Some(8000);
    host.notify(notification);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::{GamePaths, TOOL_TYPE_ID},
        host::{DeployedFile, ProcessOutput, RemoteFile},
        testing::FakeHost,
    };
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn remote(file_id: u64, category_id: u32, uploaded: i64) -> RemoteFile {
        RemoteFile {
            file_id,
            name: format!("file-{file_id}.zip"),
            version: Some("1.0".to_string()),
            category_id,
            uploaded_timestamp: uploaded,
        }
    }

    #[test]
    fn classify_suit_output___accepts_both_success_spellings() {
        assert_eq!(
            classify_suit_output("...Suit Added Succesfully\nPress any key", false),
            SuitOutcome::Added
        );
        assert_eq!(
            classify_suit_output("Suit Added Successfully", false),
            SuitOutcome::Added
        );
    }

    #[test]
    fn classify_suit_output___maps_known_failures() {
        assert_eq!(
            classify_suit_output("Unhandled: Sequence contains no elements", false),
            SuitOutcome::Failed(SuitFailureKind::NoElements)
        );
        assert_eq!(
            classify_suit_output("Offset outside limit", false),
            SuitOutcome::Failed(SuitFailureKind::OffsetOutsideLimit)
        );
        assert_eq!(
            classify_suit_output("Unable to read beyond: cannot be read past the end of the stream", false),
            SuitOutcome::Failed(SuitFailureKind::EndOfStream)
        );
        assert_eq!(
            classify_suit_output("something else", false),
            SuitOutcome::Failed(SuitFailureKind::Unknown)
        );
        assert_eq!(classify_suit_output("", true), SuitOutcome::Added);
    }

    #[test]
    fn check_tool_installed___enables_newest_disabled_copy() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        host.add_mod("old", TOOL_TYPE_ID, false).attributes = ModAttributes {
            nexus_mod_id: Some(51),
            uploaded_timestamp: Some(10),
            ..Default::default()
        };
        host.add_mod("new", TOOL_TYPE_ID, false).attributes = ModAttributes {
            nexus_mod_id: Some(51),
            uploaded_timestamp: Some(20),
            ..Default::default()
        };
        host.add_mod("other", TOOL_TYPE_ID, false).attributes.nexus_mod_id = Some(8);

        let exec = temp.path().join("SMPCTool/SMPCTool.exe");
        assert!(check_tool_installed(&mut host, GameId::SpiderManRemastered, &exec, 51).unwrap());
        assert!(host.enabled.contains("new"));
        assert!(!host.enabled.contains("old"));
    }

    #[test]
    fn check_tool_installed___flags_undeployed_enabled_tool() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        host.add_mod("tool", TOOL_TYPE_ID, true).attributes.nexus_mod_id = Some(51);
        let exec = temp.path().join("SMPCTool/SMPCTool.exe");
        assert!(check_tool_installed(&mut host, GameId::SpiderManRemastered, &exec, 51).unwrap());
        assert!(host.deployment_necessary);
    }

    #[test]
    fn check_tool_installed___false_without_copies() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        let exec = temp.path().join("SMPCTool/SMPCTool.exe");
        assert!(!check_tool_installed(&mut host, GameId::SpiderManRemastered, &exec, 51).unwrap());
    }

    #[test]
    fn ensure_tool___cancel_is_user_canceled() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        host.answer(CANCEL);
        let err = ensure_tool(&mut host, GameId::SpiderManRemastered).unwrap_err();
        assert!(err.is::<UserCanceled>());
        assert!(host.installed_downloads.is_empty());
    }

    #[test]
    fn ensure_tool___downloads_newest_main_file_and_registers_it() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        host.remote_files = vec![remote(1, 1, 100), remote(2, 1, 300), remote(3, 4, 900)];
        host.answer(DOWNLOAD_AND_INSTALL);

        ensure_tool(&mut host, GameId::MilesMorales).unwrap();

        assert_eq!(host.started_downloads, vec![2]);
        assert_eq!(host.installed_downloads, vec!["dl-2".to_string()]);
        assert!(host.enabled.contains("mod-dl-2"));
        let tool = host.tools.get(TOOL_ID).unwrap();
        assert_eq!(tool.path, temp.path().join("SMPCTool").join("MMPCTool.exe"));
    }

    #[test]
    fn download___reuses_existing_download() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        host.remote_files = vec![remote(7, 1, 1)];
        host.downloads.push(DownloadRecord {
            id: "existing".into(),
            local_path: PathBuf::from("x.zip"),
            nexus_mod_id: Some(51),
            file_id: Some(7),
            version: None,
        });
        let record = download(&mut host, GameId::SpiderManRemastered, 51).unwrap();
        assert_eq!(record.id, "existing");
        assert!(host.started_downloads.is_empty());
    }

    #[test]
    fn ensure_suit_tool___stages_executable_as_mod() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        fs::create_dir_all(&host.downloads_dir).unwrap();
        fs::write(host.downloads_dir.join("file-5.zip"), b"exe").unwrap();
        host.remote_files = vec![remote(5, 1, 1)];
        host.answer(DOWNLOAD_AND_INSTALL);

        ensure_suit_tool(&mut host, GameId::SpiderManRemastered).unwrap();

        let base = host.staging.join(SUIT_TOOL_ID).join(TOOL_DIR);
        assert_eq!(fs::read(base.join(SUIT_TOOL_EXEC)).unwrap(), b"exe");
        assert_eq!(fs::read_to_string(base.join("lang.txt")).unwrap(), "en");
        assert!(host.enabled.contains(SUIT_TOOL_ID));
        assert!(host.deployment_necessary);
        let record = host.mods.iter().find(|m| m.id == SUIT_TOOL_ID).unwrap();
        assert_eq!(record.attributes.nexus_mod_id, Some(2318));
    }

    #[test]
    fn run_tool___missing_executable_is_skipped() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        run_tool(&mut host, &temp.path().join("SMPCTool/SMPCTool.exe")).unwrap();
        assert!(host.invocations.is_empty());
        assert!(host.notifications.is_empty());
    }

    #[test]
    fn run_tool___passes_install_flag_and_cwd() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        let paths = GamePaths::new(GameId::SpiderManRemastered, temp.path());
        fs::create_dir_all(&paths.tool_dir).unwrap();
        let exec = paths.tool_exec(GameId::SpiderManRemastered);
        fs::write(&exec, b"").unwrap();
        host.process_outputs.push_back(ProcessOutput {
            success: false,
            code: Some(3),
            ..Default::default()
        });

        run_tool(&mut host, &exec).unwrap();

        assert_eq!(host.invocations.len(), 1);
        assert_eq!(host.invocations[0].args, vec!["-install".to_string()]);
        assert_eq!(host.invocations[0].cwd, paths.tool_dir);
        assert_eq!(host.dismissed, vec![RUNNING_TOOL_NOTIF.to_string()]);
        assert!(host
            .notifications
            .iter()
            .any(|n| n.kind == NotificationKind::Error));
    }

    fn suit_deployment(paths: &[&str]) -> Deployment {
        let mut deployment = HashMap::new();
        deployment.insert(
            DEFAULT_TYPE_ID.to_string(),
            paths
                .iter()
                .map(|rel| DeployedFile {
                    rel_path: rel.to_string(),
                    source: "suits".to_string(),
                    mod_type: DEFAULT_TYPE_ID.to_string(),
                })
                .collect(),
        );
        deployment
    }

    #[test]
    fn run_suit_tool___runs_once_per_suit_and_reports_failures() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        let paths = GamePaths::new(GameId::SpiderManRemastered, temp.path());
        fs::create_dir_all(&paths.tool_dir).unwrap();
        fs::write(paths.suit_tool_exec(), b"").unwrap();
        host.process_outputs.push_back(ProcessOutput {
            success: false,
            stdout: "Suit Added Succesfully".into(),
            ..Default::default()
        });
        host.process_outputs.push_back(ProcessOutput {
            success: false,
            stdout: "Offset outside limit".into(),
            ..Default::default()
        });

        let deployment = suit_deployment(&["Suits/a.suit", "Suits/b.suit", "readme.txt"]);
        run_suit_tool(&mut host, GameId::SpiderManRemastered, &paths.tool_dir, &deployment)
            .unwrap();

        assert_eq!(host.invocations.len(), 2);
        assert_eq!(
            host.invocations[0].args,
            vec![temp.path().join("Suits/a.suit").to_string_lossy().to_string()]
        );
        assert_eq!(host.notifications.len(), 1);
        assert!(host.notifications[0].message.contains("Offset outside limit"));
    }

    #[test]
    fn run_suit_tool___missing_tool_offers_install() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        let paths = GamePaths::new(GameId::MilesMorales, temp.path());
        let deployment = suit_deployment(&["a.suit"]);
        run_suit_tool(&mut host, GameId::MilesMorales, &paths.tool_dir, &deployment).unwrap();
        assert!(host.invocations.is_empty());
        assert_eq!(
            host.notifications[0].actions[0].follow_up,
            FollowUp::InstallSuitTool(GameId::MilesMorales)
        );
    }

    #[test]
    fn run_suit_tool___no_suits_does_nothing() {
        let temp = TempDir::new().unwrap();
        let mut host = FakeHost::with_root(temp.path());
        run_suit_tool(&mut host, GameId::MilesMorales, temp.path(), &HashMap::new()).unwrap();
        assert!(host.notifications.is_empty());
    }
}
