use anyhow::{Context, Result};
use log::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};

const LOG_PREFIX: &str = "server_ingestor_";

/// Installs the global logger: stdout plus a fresh file under `log_dir`.
pub fn setup_logging(log_dir: &Path, log_level: &str) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
    cleanup_old_logs(log_dir)?;

    let log_file = fern::log_file(new_log_path(log_dir))?;
    base_dispatch(parse_level(log_level))
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .context("A global logger is already installed")?;

    Ok(())
}

fn new_log_path(log_dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    log_dir.join(format!("{}{}.log", LOG_PREFIX, stamp))
}

// HTTP client internals stay at warn or quieter.
fn base_dispatch(level: LevelFilter) -> fern::Dispatch {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .level_for("hyper_util", LevelFilter::Warn.min(level))
        .level_for("reqwest", LevelFilter::Warn.min(level))
}

fn parse_level(log_level: &str) -> LevelFilter {
    log_level.trim().parse().unwrap_or(LevelFilter::Info)
}

fn cleanup_old_logs(log_dir: &Path) -> Result<()> {
    let mut names: Vec<String> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.starts_with(LOG_PREFIX) && name.ends_with(".log"))
        .collect();

    // Timestamped names sort chronologically; newest first
    names.sort_by(|a, b| b.cmp(a));

    for name in names.iter().skip(1) {
        let path = log_dir.join(name);
        if let Err(e) = fs::remove_file(&path) {
            eprintln!("Failed to delete old log file {:?}: {}", path, e);
        }
    }

    Ok(())
}
