use crate::{
    app::App,
    game::{self, GameId},
    host::Notification,
    load_order::LoadOrderEntry,
};
use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use std::{
    io::{self, BufRead, IsTerminal, Write},
    path::PathBuf,
};

const AUTHOR: &str = "Josh | jedijosh920";
const CONTRIBUTORS: &[&str] = &["Tkachov"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct GlobalOptions {
    format: OutputFormat,
    game: Option<GameId>,
    assume_defaults: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum CliAction {
    Command {
        command: CliCommand,
        global: GlobalOptions,
    },
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Setup { game_root: Option<PathBuf> },
    Install(PathBuf),
    Enable(String),
    Disable(String),
    Remove(String),
    Move { query: String, index: usize },
    Deploy,
    Purge,
    LoadOrderList,
    LoadOrderSet { id: String, enabled: bool },
    Mods,
    Open,
    About,
    Paths,
    Help,
    Version,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let CliAction::Command { command, global } = parse_args(&args)?;
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("smpc-modder v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::About => {
            print_about();
            Ok(())
        }
        command => {
            let interactive = !global.assume_defaults && io::stdin().is_terminal();
            let mut app = App::load(global.game, interactive)?;
            let result = run_command(&mut app, command, global.format);
            report_notifications(&mut app, interactive)?;
            result
        }
    }
}

fn parse_args(args: &[String]) -> Result<CliAction> {
    let (global, tokens) = parse_global_options(args)?;
    let command = parse_subcommand(&tokens)?;
    Ok(CliAction::Command { command, global })
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut format = OutputFormat::Text;
    let mut game = None;
    let mut assume_defaults = false;
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            format = parse_format(value)?;
            continue;
        }
        if arg == "--format" {
            let value = iter.next().ok_or_else(|| anyhow!("--format requires a value"))?;
            format = parse_format(value)?;
            continue;
        }
        if let Some(value) = arg.strip_prefix("--game=") {
            game = Some(GameId::parse(value)?);
            continue;
        }
        if arg == "--game" {
            let value = iter.next().ok_or_else(|| anyhow!("--game requires a game id"))?;
            game = Some(GameId::parse(value)?);
            continue;
        }
        if arg == "--yes" || arg == "-y" {
            assume_defaults = true;
            continue;
        }
        tokens.push(arg.to_string());
    }

    Ok((
        GlobalOptions {
            format,
            game,
            assume_defaults,
        },
        tokens,
    ))
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    OutputFormat::parse(value).ok_or_else(|| anyhow!("Unknown format: {value} (use 'json' or 'text')"))
}

fn parse_subcommand(tokens: &[String]) -> Result<CliCommand> {
    let Some(head) = tokens.first() else {
        return Ok(CliCommand::Help);
    };
    let rest = tokens.get(1..).unwrap_or(&[]);
    let command = match head.as_str() {
        "--help" | "-h" | "help" => CliCommand::Help,
        "--version" | "-V" | "version" => CliCommand::Version,
        "setup" => CliCommand::Setup {
            game_root: parse_setup(rest)?,
        },
        "install" => CliCommand::Install(PathBuf::from(required(rest, 0, "install requires an archive path")?)),
        "enable" => CliCommand::Enable(required(rest, 0, "enable requires a mod id or name")?),
        "disable" => CliCommand::Disable(required(rest, 0, "disable requires a mod id or name")?),
        "remove" => CliCommand::Remove(required(rest, 0, "remove requires a mod id or name")?),
        "move" => {
            let query = required(rest, 0, "move requires a mod id or name")?;
            let index = required(rest, 1, "move requires a target position")?;
            let index = index
                .parse::<usize>()
                .map_err(|_| anyhow!("Invalid position: {index}"))?;
            CliCommand::Move { query, index }
        }
        "deploy" => CliCommand::Deploy,
        "purge" => CliCommand::Purge,
        "load-order" | "lo" => parse_load_order(rest)?,
        "mods" => CliCommand::Mods,
        "open" => CliCommand::Open,
        "about" => CliCommand::About,
        "paths" => CliCommand::Paths,
        other => bail!("Unknown command: {other} (see 'smpc-modder help')"),
    };
    Ok(command)
}

fn required(tokens: &[String], index: usize, message: &str) -> Result<String> {
    tokens
        .get(index)
        .cloned()
        .ok_or_else(|| anyhow!(message.to_string()))
}

fn parse_setup(args: &[String]) -> Result<Option<PathBuf>> {
    let mut game_root = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--game-root=") {
            game_root = Some(PathBuf::from(value));
        } else if arg == "--game-root" {
            let value = iter.next().ok_or_else(|| anyhow!("--game-root requires a directory"))?;
            game_root = Some(PathBuf::from(value));
        } else {
            bail!("Unknown setup option: {arg}");
        }
    }
    Ok(game_root)
}

fn parse_load_order(args: &[String]) -> Result<CliCommand> {
    let sub = args.first().map(|value| value.as_str()).unwrap_or("list");
    match sub {
        "list" => Ok(CliCommand::LoadOrderList),
        "set" => {
            let id = required(args, 1, "load-order set requires an archive name")?;
            let state = required(args, 2, "load-order set requires 'on' or 'off'")?;
            let enabled = match state.as_str() {
                "on" | "1" | "true" => true,
                "off" | "0" | "false" => false,
                other => bail!("Invalid state: {other} (use 'on' or 'off')"),
            };
            Ok(CliCommand::LoadOrderSet { id, enabled })
        }
        other => bail!("Unknown load-order command: {other} (use 'list' or 'set')"),
    }
}

fn run_command(app: &mut App, command: CliCommand, format: OutputFormat) -> Result<()> {
    match command {
        CliCommand::Setup { game_root } => {
            app.setup(game_root)?;
            let paths = app.paths()?;
            println!(
                "{} ready at {}",
                app.game().display_name(),
                paths.game_root.display()
            );
        }
        CliCommand::Install(archive) => {
            let ids = app.install(&archive)?;
            if ids.is_empty() {
                println!("No mods installed from {}", archive.display());
            }
            for id in ids {
                println!("Installed {id}");
            }
        }
        CliCommand::Enable(query) => {
            let id = app.set_enabled(&query, true)?;
            println!("Enabled {id}");
        }
        CliCommand::Disable(query) => {
            let id = app.set_enabled(&query, false)?;
            println!("Disabled {id}");
        }
        CliCommand::Remove(query) => {
            let record = app.remove(&query)?;
            println!("Removed {} ({})", record.name, record.id);
        }
        CliCommand::Move { query, index } => {
            let id = app.move_mod(&query, index)?;
            println!("Moved {id} to position {index}");
        }
        CliCommand::Deploy => {
            let report = app.deploy()?;
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&DeployOutput {
                        files: report.file_count,
                        removed: report.removed_count,
                        merged_roots: report.merged_roots,
                        overridden: report.overridden_files,
                    })?
                ),
                OutputFormat::Text => {
                    println!(
                        "Deployed {} file(s), removed {} stale file(s)",
                        report.file_count, report.removed_count
                    );
                    if report.merged_roots > 0 {
                        println!(
                            "Merged {} mod root(s), {} file(s) overridden",
                            report.merged_roots, report.overridden_files
                        );
                    }
                }
            }
        }
        CliCommand::Purge => {
            let removed = app.purge()?;
            println!("Purged {removed} file(s)");
        }
        CliCommand::LoadOrderList => {
            let entries = app.load_order()?;
            print_load_order(&entries, format)?;
        }
        CliCommand::LoadOrderSet { id, enabled } => {
            app.set_load_order_enabled(&id, enabled)?;
            let entries = app.load_order()?;
            print_load_order(&entries, format)?;
        }
        CliCommand::Mods => list_mods(app, format)?,
        CliCommand::Open => app.open_game_dir()?,
        CliCommand::Paths => list_paths(app, format)?,
        CliCommand::Help | CliCommand::Version | CliCommand::About => {}
    }
    Ok(())
}

#[derive(Serialize)]
struct DeployOutput {
    files: usize,
    removed: usize,
    merged_roots: usize,
    overridden: usize,
}

fn print_load_order(entries: &[LoadOrderEntry], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("{}", crate::load_order::usage_instructions());
            }
            for (index, entry) in entries.iter().enumerate() {
                let enabled = if entry.enabled { "x" } else { " " };
                let owner = entry.mod_id.as_deref().unwrap_or("-");
                println!("{:>3} [{enabled}] {} ({owner})", index + 1, entry.name);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ModListItem {
    order: usize,
    id: String,
    name: String,
    kind: String,
    version: Option<String>,
    enabled: bool,
}

fn list_mods(app: &App, format: OutputFormat) -> Result<()> {
    let index = app.library.index_by_id();
    let items: Vec<ModListItem> = app
        .library
        .order
        .iter()
        .enumerate()
        .filter_map(|(position, state)| {
            let record = index.get(state.id.as_str())?;
            Some(ModListItem {
                order: position,
                id: record.id.clone(),
                name: record.name.clone(),
                kind: if record.mod_type.is_empty() {
                    "default".to_string()
                } else {
                    record.mod_type.clone()
                },
                version: record.attributes.version.clone(),
                enabled: state.enabled,
            })
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            for item in items {
                let enabled = if item.enabled { "x" } else { " " };
                let version = item.version.as_deref().unwrap_or("");
                println!(
                    "{:>3} [{enabled}] {kind:<18} {name} {version} <{id}>",
                    item.order,
                    kind = item.kind,
                    name = item.name,
                    id = item.id
                );
            }
            if app.library.deployment_necessary {
                println!("Deployment pending; run 'smpc-modder deploy'");
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PathsOutput {
    game: String,
    data_dir: String,
    staging_dir: String,
    downloads_dir: String,
    game_root: Option<String>,
    mods_dir: Option<String>,
    tool_dir: Option<String>,
    load_order_file: Option<String>,
    error: Option<String>,
}

fn list_paths(app: &App, format: OutputFormat) -> Result<()> {
    let (paths, error) = match app.paths() {
        Ok(paths) => (Some(paths), None),
        Err(err) => (None, Some(format!("{err:#}"))),
    };
    let show = |path: &std::path::Path| path.display().to_string();
    let output = PathsOutput {
        game: app.game().as_str().to_string(),
        data_dir: show(&app.config.data_dir),
        staging_dir: show(&app.config.staging_dir()),
        downloads_dir: show(&app.config.downloads_dir()),
        game_root: paths.as_ref().map(|p| show(&p.game_root)),
        mods_dir: paths.as_ref().map(|p| show(&p.mods_dir)),
        tool_dir: paths.as_ref().map(|p| show(&p.tool_dir)),
        load_order_file: paths.as_ref().map(|p| show(&p.lo_file)),
        error,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => {
            let unset = || "-".to_string();
            println!("Game: {}", app.game().display_name());
            println!("Data dir: {}", output.data_dir);
            println!("Staging: {}", output.staging_dir);
            println!("Downloads: {}", output.downloads_dir);
            println!("Game root: {}", output.game_root.unwrap_or_else(unset));
            println!("Mods folder: {}", output.mods_dir.unwrap_or_else(unset));
            println!("Tool dir: {}", output.tool_dir.unwrap_or_else(unset));
            println!("Load order: {}", output.load_order_file.unwrap_or_else(unset));
            if let Some(error) = output.error {
                println!("Warning: {error}");
            }
        }
    }
    Ok(())
}

/// Offers the follow-up actions of anything the run raised. The messages
/// themselves were already printed by the host.
fn report_notifications(app: &mut App, interactive: bool) -> Result<()> {
    let notifications: Vec<Notification> = std::mem::take(&mut app.notifications);
    if !interactive {
        return Ok(());
    }
    let mut stderr = io::stderr();
    for action in notifications.iter().flat_map(|notification| &notification.actions) {
        write!(stderr, "{}? [y/N] ", action.title)?;
        stderr.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        if matches!(line.trim(), "y" | "Y" | "yes") {
            app.follow_up(action.follow_up)?;
        }
    }
    Ok(())
}

fn print_about() {
    println!("Support for these games is made possible by the Spider-Man PC Modding Tool.");
    println!(
        "Special thanks to {AUTHOR} for developing the tool, and to its contributors: {}",
        CONTRIBUTORS.join(", ")
    );
}

fn print_help() {
    println!("smpc-modder v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  smpc-modder setup [--game-root <dir>]   Store the game root and install tools");
    println!("  smpc-modder install <archive>          Install a mod archive");
    println!("  smpc-modder enable <mod>               Enable an installed mod");
    println!("  smpc-modder disable <mod>              Disable an installed mod");
    println!("  smpc-modder remove <mod>               Uninstall a mod");
    println!("  smpc-modder move <mod> <index>         Change deployment order");
    println!("  smpc-modder deploy                     Deploy enabled mods and run the tool");
    println!("  smpc-modder purge                      Remove deployed files");
    println!("  smpc-modder load-order [list]          Show the mod archive load order");
    println!("  smpc-modder load-order set <id> on|off Toggle a mod archive");
    println!("  smpc-modder mods                       List installed mods");
    println!("  smpc-modder open                       Open the mods folder");
    println!("  smpc-modder paths                      Show resolved paths");
    println!("  smpc-modder about                      Credits for the modding tool");
    println!();
    println!("Global options:");
    println!(
        "  --game <id>                            {}",
        game::supported_games()
            .iter()
            .map(|game| game.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    );
    println!("  --format <json|text>                   Output format for list commands");
    println!("  -y, --yes                              Never prompt; take dialog defaults");
    println!("  -h, --help                             Show help");
    println!("  -V, --version                          Show version");
    println!();
    println!("Environment:");
    println!("  SMPC_MODDER_HOME                       Data directory override");
    println!("  SMPC_MODDER_LOG                        Log filter (default: info)");
    println!("  SMPC_MODDER_WINE                       Launcher for .exe tools (default: wine)");
}
