//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

use crate::adapters::console_report_adapter::ConsoleReportAdapter;
use crate::adapters::csv_source_adapter::CsvSourceAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_store_adapter::JsonStoreAdapter;
use crate::domain::config_validation::validate_sync_config;
use crate::domain::error::NavsyncError;
use crate::domain::instrument::{parse_codes, Instrument, InstrumentClass};
use crate::domain::store::MergePolicy;
use crate::domain::sync::Synchronizer;
use crate::domain::sync_config::{SyncConfig, SyncMode, DEFAULT_WINDOW_SIZE};
use crate::domain::reconcile::DEFAULT_MAX_OFFSET_DAYS;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;
use crate::ports::store_port::StorePort;

#[derive(Parser, Debug)]
#[command(name = "navsync", about = "Incremental price history sync for funds and indices")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch missing trading days and merge them into the store
    Sync {
        #[arg(short, long)]
        config: PathBuf,
        /// Override [sync] mode (incremental, backfill, latest)
        #[arg(long)]
        mode: Option<SyncMode>,
        /// Override [sync] window_size
        #[arg(long)]
        window: Option<usize>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the dates the next incremental sync would fetch
    Gaps {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        window: Option<usize>,
    },
    /// Show stored history per instrument
    Status {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Sync {
            config,
            mode,
            window,
            dry_run,
        } => run_sync(&config, mode, window, dry_run),
        Command::Gaps { config, window } => run_gaps(&config, window),
        Command::Status { config } => run_status(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: NavsyncError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, NavsyncError> {
    FileConfigAdapter::from_file(path).map_err(|e| NavsyncError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Config file, validated, plus the run parameters built from it.
struct Loaded {
    adapter: FileConfigAdapter,
    base_dir: PathBuf,
    sync: SyncConfig,
}

fn prepare(config_path: &Path) -> Result<Loaded, NavsyncError> {
    info!(path = %config_path.display(), "loading config");
    let adapter = load_config(config_path)?;
    validate_sync_config(&adapter)?;
    let sync = build_sync_config(&adapter)?;
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(Loaded {
        adapter,
        base_dir,
        sync,
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> NavsyncError {
    NavsyncError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: reason.into(),
    }
}

fn parse_or<T>(config: &dyn ConfigPort, section: &str, key: &str, default: T) -> Result<T, NavsyncError>
where
    T: std::str::FromStr<Err = String>,
{
    match config.get_trimmed(section, key) {
        Some(raw) => raw.parse().map_err(|reason| invalid(section, key, reason)),
        None => Ok(default),
    }
}

/// Non-negative integer setting where zero or absence means "not set".
fn optional_count(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<usize>, NavsyncError> {
    let value = config.get_int(section, key, 0);
    let count = usize::try_from(value).map_err(|_| invalid(section, key, "must be non-negative"))?;
    Ok((count > 0).then_some(count))
}

pub fn build_instruments(config: &dyn ConfigPort) -> Result<Vec<Instrument>, NavsyncError> {
    let codes_str = config
        .get_string("instruments", "codes")
        .ok_or_else(|| NavsyncError::ConfigMissing {
            section: "instruments".into(),
            key: "codes".into(),
        })?;
    let codes = parse_codes(&codes_str).map_err(|e| invalid("instruments", "codes", e.to_string()))?;

    codes
        .into_iter()
        .map(|code| {
            let section = format!("instrument.{code}");
            let name = config
                .get_trimmed(&section, "name")
                .unwrap_or_else(|| code.clone());
            let class = parse_or(config, &section, "class", InstrumentClass::default())?;
            Ok(Instrument::new(code, name, class))
        })
        .collect()
}

pub fn build_sync_config(config: &dyn ConfigPort) -> Result<SyncConfig, NavsyncError> {
    let mut sync = SyncConfig::new(build_instruments(config)?);

    sync.mode = parse_or(config, "sync", "mode", SyncMode::default())?;
    sync.window_size = optional_count(config, "sync", "window_size")?.unwrap_or(DEFAULT_WINDOW_SIZE);
    sync.bootstrap_window_size = optional_count(config, "sync", "bootstrap_window_size")?;
    sync.merge_policy = parse_or(config, "sync", "merge_policy", MergePolicy::DateKeyed)?;
    sync.latest_merge_policy = parse_or(config, "sync", "latest_merge_policy", MergePolicy::LatestPrice)?;
    sync.max_offset_days = config.get_int("sync", "max_offset_days", DEFAULT_MAX_OFFSET_DAYS);
    if sync.max_offset_days < 0 {
        return Err(invalid("sync", "max_offset_days", "must be non-negative"));
    }
    // 0 means unbounded.
    sync.max_history = optional_count(config, "store", "max_history")?.filter(|cap| *cap > 0);
    sync.run_timeout = optional_count(config, "sync", "run_timeout_secs")?
        .map(|secs| Duration::from_secs(secs as u64));

    Ok(sync)
}

/// Relative paths in the config resolve against the config file's directory.
fn resolve_path(base_dir: &Path, raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

pub fn store_path(config: &dyn ConfigPort, base_dir: &Path) -> Result<PathBuf, NavsyncError> {
    config
        .get_trimmed("store", "path")
        .map(|raw| resolve_path(base_dir, &raw))
        .ok_or_else(|| NavsyncError::ConfigMissing {
            section: "store".into(),
            key: "path".into(),
        })
}

pub fn source_from_config(config: &dyn ConfigPort, base_dir: &Path) -> Result<CsvSourceAdapter, NavsyncError> {
    let kind = config
        .get_trimmed("source", "kind")
        .unwrap_or_else(|| "csv".to_string());
    if !kind.eq_ignore_ascii_case("csv") {
        return Err(invalid("source", "kind", format!("unknown source kind '{kind}'")));
    }
    let path = config
        .get_trimmed("source", "path")
        .ok_or_else(|| NavsyncError::ConfigMissing {
            section: "source".into(),
            key: "path".into(),
        })?;
    Ok(CsvSourceAdapter::new(resolve_path(base_dir, &path)))
}

fn run_sync(
    config_path: &Path,
    mode: Option<SyncMode>,
    window: Option<usize>,
    dry_run: bool,
) -> ExitCode {
    let mut loaded = match prepare(config_path) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };
    if let Some(mode) = mode {
        loaded.sync.mode = mode;
    }
    if let Some(window) = window {
        if let Err(e) = loaded.sync.override_window(window) {
            return fail(e);
        }
    }

    let store = match store_path(&loaded.adapter, &loaded.base_dir) {
        Ok(p) => JsonStoreAdapter::new(p),
        Err(e) => return fail(e),
    };
    let source = match source_from_config(&loaded.adapter, &loaded.base_dir) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    info!(
        instruments = loaded.sync.instruments.len(),
        store = %store.location(),
        "starting sync"
    );
    let summary = match Synchronizer::new(&loaded.sync, &source, &store)
        .dry_run(dry_run)
        .run()
    {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    match ConsoleReportAdapter::stdout().write_summary(&summary) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn run_gaps(config_path: &Path, window: Option<usize>) -> ExitCode {
    let mut loaded = match prepare(config_path) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };
    loaded.sync.mode = SyncMode::Incremental;
    if let Some(window) = window {
        if let Err(e) = loaded.sync.override_window(window) {
            return fail(e);
        }
    }

    let store = match store_path(&loaded.adapter, &loaded.base_dir) {
        Ok(p) => JsonStoreAdapter::new(p),
        Err(e) => return fail(e),
    };
    let source = match source_from_config(&loaded.adapter, &loaded.base_dir) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let summary = match Synchronizer::new(&loaded.sync, &source, &store)
        .dry_run(true)
        .run()
    {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    for date in &summary.targets {
        println!("{}", date);
    }
    eprintln!(
        "{} of {} trading days need a fetch",
        summary.targets.len(),
        summary.window.len()
    );
    ExitCode::SUCCESS
}

fn run_status(config_path: &Path) -> ExitCode {
    let loaded = match prepare(config_path) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };
    let store_port = match store_path(&loaded.adapter, &loaded.base_dir) {
        Ok(p) => JsonStoreAdapter::new(p),
        Err(e) => return fail(e),
    };

    let store = match store_port.load() {
        Ok(Some(store)) => store,
        Ok(None) => {
            eprintln!("No store at {}", store_port.location());
            return ExitCode::SUCCESS;
        }
        Err(e) => return fail(e),
    };

    match ConsoleReportAdapter::stdout().write_status(&store, &loaded.sync.tracked_ids()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let loaded = match prepare(config_path) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };

    let sync = &loaded.sync;
    eprintln!("Instruments:");
    for instrument in &sync.instruments {
        eprintln!("  {:<12} {:<6} {}", instrument.id, instrument.class.to_string(), instrument.name);
    }
    eprintln!("\nSync:");
    eprintln!("  mode:        {}", sync.mode);
    eprintln!("  window:      {} trading days", sync.window_size);
    if let Some(size) = sync.bootstrap_window_size {
        eprintln!("  bootstrap:   {} trading days", size);
    }
    eprintln!("  max offset:  {} days", sync.max_offset_days);
    if let Some(cap) = sync.max_history {
        eprintln!("  retention:   {} entries per instrument", cap);
    }

    eprintln!("\nConfiguration is valid");
    ExitCode::SUCCESS
}
