mod board;
mod cli;
mod commands;
mod error_fmt;
mod rt;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use udm_core::{ControllerCfg, UdmError};

use crate::cli::{Cli, Commands, DEFAULT_CONFIG, JSON_MODE};
use crate::commands::{Ctx, RunArgs};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn config_error(msg: impl Into<String>) -> eyre::Report {
    eyre::Report::new(UdmError::Config(msg.into()))
}

/// Load, parse and validate the config. A missing default file means
/// built-in defaults; a missing explicit file is an error.
fn load_config(path: Option<&Path>) -> eyre::Result<udm_config::Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            if !default.exists() {
                return Ok(udm_config::Config::default());
            }
            default
        }
    };
    let text = std::fs::read_to_string(&path)
        .map_err(|e| config_error(format!("reading {}: {e}", path.display())))?;
    let cfg: udm_config::Config = toml::from_str(&text)
        .map_err(|e| config_error(format!("parsing {}: {e}", path.display())))?;
    cfg.validate()
        .map_err(|e| config_error(format!("{}: {e}", path.display())))?;
    Ok(cfg)
}

/// Console logs go to stderr (pretty or JSON lines); `[logging].file` adds a
/// non-blocking JSON file sink. The returned guard flushes the file on drop.
fn init_tracing(
    json: bool,
    level: &str,
    logging: &udm_config::Logging,
) -> eyre::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;

    let (pretty, json_layer) = if json {
        (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };

    let mut guard = None;
    let file_layer = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| config_error(format!("logging.file '{file}' has no file name")))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, g) = tracing_appender::non_blocking(appender);
            guard = Some(g);
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    // A subscriber may already be installed (e.g. in tests); keep it.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json_layer)
        .with(file_layer)
        .try_init();
    Ok(guard)
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    let ccfg = ControllerCfg::try_from(&cfg).map_err(eyre::Report::new)?;

    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    let _guard = init_tracing(cli.json, level, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, "configuration loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let ctx = Ctx {
        cfg: &cfg,
        ccfg,
        json: cli.json,
    };
    match cli.cmd {
        Commands::Run {
            ticks,
            object_cm,
            rt,
            rt_prio,
            rt_lock,
            rt_cpu,
            stats,
        } => commands::run(
            &ctx,
            RunArgs {
                ticks,
                object_cm,
                rt,
                rt_prio,
                rt_lock,
                rt_cpu,
                stats,
            },
            shutdown,
        ),
        Commands::Simulate {
            ticks,
            object_cm,
            press,
            fault,
        } => commands::simulate(&ctx, ticks, object_cm, &press, fault),
        Commands::Threshold { set } => commands::threshold(&ctx, set),
        Commands::SelfCheck { fault } => commands::self_check(&ctx, fault),
    }
}

fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    let _ = JSON_MODE.set(json);
    let _ = color_eyre::install();

    let code = match real_main(cli) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = ?err, "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                println!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            exit_code_for_error(&err)
        }
    };
    std::process::exit(code);
}
