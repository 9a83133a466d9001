mod cli;
mod error_fmt;
mod rt;
mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use dispenser_config::{Config, Logging};
use dispenser_core::DispenserError;
use eyre::{Result, WrapErr};

use crate::cli::{Cli, Commands, DEFAULT_CONFIG, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("Warning: color-eyre not installed: {e}");
    }
    let code = match real_main(cli) {
        Ok(()) => 0,
        Err(err) => report(&err),
    };
    flush_logs();
    std::process::exit(code);
}

fn report(err: &eyre::Report) -> i32 {
    tracing::error!(error = %format!("{err:#}"), "command failed");
    if JSON_MODE.get().copied().unwrap_or(false) {
        println!("{}", format_error_json(err));
    } else {
        eprintln!("{}", humanize(err));
    }
    exit_code_for_error(err)
}

fn flush_logs() {
    if let Ok(mut guard) = FILE_GUARD.lock() {
        drop(guard.take());
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let loaded = load_config(cli.config.as_deref());
    let logging = loaded
        .as_ref()
        .map(|(cfg, _)| cfg.logging.clone())
        .unwrap_or_default();
    init_tracing(&cli, &logging)?;
    let (cfg, path) = loaded?;
    tracing::debug!(config = ?path, "configuration loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "Ctrl-C handler not installed");
        }
    }

    match cli.cmd {
        Commands::Run {
            max_ticks,
            rt,
            rt_prio,
            rt_lock,
        } => {
            if rt {
                rt::setup_rt_once(rt_prio, rt_lock);
            }
            run::run(&cfg, cli.json, max_ticks, shutdown).wrap_err("run")
        }
        Commands::Measure => run::measure(&cfg, cli.json),
        Commands::Sync => run::sync(&cfg, cli.json),
        Commands::SelfCheck => run::self_check(&cfg, cli.json),
        Commands::Health => run::health(&cfg, path.as_deref(), cli.json),
    }
}

/// An explicit `--config` must exist; the default path is optional.
fn load_config(path: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    let as_config_error = |e: eyre::Report| eyre::Report::new(DispenserError::Config(format!("{e:#}")));
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = PathBuf::from(DEFAULT_CONFIG);
            if !p.exists() {
                return Ok((Config::default(), None));
            }
            p
        }
    };
    let cfg = dispenser_config::load_file(&path).map_err(as_config_error)?;
    Ok((cfg, Some(path)))
}

/// Console logs go to stderr so stdout stays machine-readable; the optional
/// file layer always writes JSON lines.
fn init_tracing(cli: &Cli, logging: &Logging) -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let console_filter = || {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&cli.log_level))
            .wrap_err_with(|| format!("invalid log level {:?}", cli.log_level))
    };
    let (pretty, json) = if cli.json {
        let layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter()?);
        (None, Some(layer))
    } else {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter()?);
        (Some(layer), None)
    };

    let file = match &logging.file {
        Some(file) => {
            let file = Path::new(file);
            let dir = file
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = file
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name"))?;
            let rotation = match logging.rotation.as_deref() {
                Some("daily") => Rotation::DAILY,
                Some("hourly") => Rotation::HOURLY,
                _ => Rotation::NEVER,
            };
            let appender = RollingFileAppender::builder()
                .rotation(rotation)
                .filename_prefix(name.to_string_lossy().into_owned())
                .build(dir)
                .wrap_err_with(|| format!("open log file in {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if let Ok(mut slot) = FILE_GUARD.lock() {
                *slot = Some(guard);
            }
            let level = logging.level.as_deref().unwrap_or("info");
            let filter = EnvFilter::try_new(level)
                .wrap_err_with(|| format!("invalid logging.level {level:?}"))?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file)
        .with(pretty)
        .with(json)
        .try_init()
        .map_err(|e| eyre::eyre!("install tracing subscriber: {e}"))
}
