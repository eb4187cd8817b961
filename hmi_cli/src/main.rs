mod cli;
mod error_fmt;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use hmi_core::{MockCommand, MouldParams, ProfileStore, StoreCfg};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, ProfilesCmd};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    // clap handles --help/--version and usage errors (exit 2) itself
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error hooks: {e}");
    }

    if let Err(err) = try_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("error: {}", humanize(&err));
        }
        tracing::error!(error = %err, "hmi exited with error");
        std::process::exit(exit_code_for_error(&err));
    }
}

fn try_main(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(&cli, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run {
            script,
            ticks,
            send_profile,
            snapshot_every,
            mock,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let flag = Arc::clone(&shutdown);
                ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                    .wrap_err("install Ctrl-C handler")?;
            }

            let (mut bridge, max_ticks) = match script.as_deref() {
                Some(path) => {
                    let (link, lines) = run::script_link(path)?;
                    (run::assemble(&cfg, link)?, Some(ticks.unwrap_or(lines)))
                }
                None => (run::assemble(&cfg, run::serial_link(&cfg)?)?, ticks),
            };
            for line in &mock {
                let cmd = MockCommand::parse(line)
                    .ok_or_else(|| eyre::eyre!("invalid mock command {line:?}"))?;
                tracing::info!(?cmd, "debug override applied");
                bridge.apply_mock(cmd);
            }

            let outcome =
                run::run_loop(&mut bridge, max_ticks, snapshot_every, cli.json, &shutdown)?;
            if let Some(index) = send_profile {
                run::send_profile(&mut bridge, index)?;
            }

            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "ticks": outcome.ticks,
                        "lines": outcome.lines,
                        "interrupted": outcome.interrupted,
                        "snapshot": outcome.snapshot,
                    })
                );
            } else {
                run::print_snapshot(&outcome.snapshot, false)?;
                println!(
                    "run complete: {} ticks, {} lines{}",
                    outcome.ticks,
                    outcome.lines,
                    if outcome.interrupted { " (interrupted)" } else { "" }
                );
            }
            Ok(())
        }
        Commands::Profiles { action } => profiles(&cfg, action, cli.json),
        Commands::Health => {
            let fs = run::open_flash(&cfg)?;
            let store = ProfileStore::new(fs, StoreCfg::from(&cfg.storage));
            let count = store.load().len();
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "status": "ok", "profiles": count })
                );
            } else {
                println!("ok: config valid, {count} stored profiles");
            }
            Ok(())
        }
    }
}

fn profiles(cfg: &hmi_config::Config, action: ProfilesCmd, json: bool) -> Result<()> {
    match action {
        ProfilesCmd::List => {
            let store = ProfileStore::new(run::open_flash(cfg)?, StoreCfg::from(&cfg.storage));
            let loaded = store.load();
            if json {
                println!("{}", serde_json::to_string(&loaded)?);
            } else if loaded.is_empty() {
                println!("no stored profiles");
            } else {
                for (i, p) in loaded.iter().enumerate() {
                    println!(
                        "{i:>2}: {:<31} {} fill={:.3}@{:.3} torque={:.3}",
                        p.name, p.mode, p.fill_volume, p.fill_speed, p.inject_torque
                    );
                }
            }
            Ok(())
        }
        ProfilesCmd::Dump => {
            let store = ProfileStore::new(run::open_flash(cfg)?, StoreCfg::from(&cfg.storage));
            let dump = store
                .hex_dump()
                .wrap_err_with(|| format!("read {}", cfg.storage.profiles_file))?;
            print!("{dump}");
            Ok(())
        }
        ProfilesCmd::Import { file } => {
            let rows = hmi_config::load_profiles_csv(&file)?;
            let imported: Vec<MouldParams> = rows.iter().map(MouldParams::from).collect();
            let mut bridge = run::assemble(cfg, hmi_hardware::SimulatedLink::new())?;
            let added = bridge.import_profiles(imported)?;
            let skipped = rows.len() - added;
            if skipped > 0 {
                tracing::warn!(skipped, limit = bridge.book().limit(), "profile limit reached during import");
            }
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "imported": added, "skipped": skipped, "total": bridge.book().len() })
                );
            } else {
                println!(
                    "imported {added} profiles ({skipped} skipped), {} stored",
                    bridge.book().len()
                );
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<hmi_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = hmi_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate()
        .map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    Ok(cfg)
}

/// Console logs go to stderr (pretty or JSON). `[logging].file` adds a
/// JSON-lines file sink, optionally rotated.
fn init_tracing(cli: &Cli, logging: &hmi_config::Logging) -> Result<()> {
    let level = cli
        .log_level
        .as_deref()
        .or(logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let console = if cli.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let file_layer = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
