//! Configuration validation.
//!
//! Validates all config fields before a sync runs.

use crate::domain::error::NavsyncError;
use crate::domain::instrument::{parse_codes, InstrumentClass};
use crate::domain::store::MergePolicy;
use crate::domain::sync_config::{SyncMode, MAX_RUN_TIMEOUT_SECS, MAX_WINDOW_SIZE};
use crate::ports::config_port::ConfigPort;

pub const SOURCE_KINDS: &[&str] = &["csv"];

pub fn validate_sync_config(config: &dyn ConfigPort) -> Result<(), NavsyncError> {
    validate_store(config)?;
    validate_window(config)?;
    validate_mode(config)?;
    validate_merge_policies(config)?;
    validate_offset(config)?;
    validate_timeout(config)?;
    validate_source(config)?;
    validate_instruments(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> NavsyncError {
    NavsyncError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> NavsyncError {
    NavsyncError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn validate_store(config: &dyn ConfigPort) -> Result<(), NavsyncError> {
    if config.get_trimmed("store", "path").is_none() {
        return Err(missing("store", "path"));
    }
    if config.get_int("store", "max_history", 0) < 0 {
        return Err(invalid("store", "max_history", "max_history must be non-negative"));
    }
    Ok(())
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), NavsyncError> {
    let max = MAX_WINDOW_SIZE as i64;
    let window = config.get_int("sync", "window_size", 5);
    if !(1..=max).contains(&window) {
        return Err(invalid(
            "sync",
            "window_size",
            format!("window_size must be between 1 and {max}"),
        ));
    }

    let bootstrap = config.get_int("sync", "bootstrap_window_size", 0);
    if !(0..=max).contains(&bootstrap) {
        return Err(invalid(
            "sync",
            "bootstrap_window_size",
            format!("bootstrap_window_size must be between 0 and {max}"),
        ));
    }

    let cap = config.get_int("store", "max_history", 0);
    if cap > 0 && cap < window.max(bootstrap) {
        return Err(invalid(
            "store",
            "max_history",
            "max_history must be at least the sync window",
        ));
    }
    Ok(())
}

fn validate_mode(config: &dyn ConfigPort) -> Result<(), NavsyncError> {
    if let Some(mode) = config.get_trimmed("sync", "mode") {
        mode.parse::<SyncMode>()
            .map_err(|reason| invalid("sync", "mode", reason))?;
    }
    Ok(())
}

fn validate_merge_policies(config: &dyn ConfigPort) -> Result<(), NavsyncError> {
    for key in ["merge_policy", "latest_merge_policy"] {
        if let Some(policy) = config.get_trimmed("sync", key) {
            policy
                .parse::<MergePolicy>()
                .map_err(|reason| invalid("sync", key, reason))?;
        }
    }
    Ok(())
}

fn validate_offset(config: &dyn ConfigPort) -> Result<(), NavsyncError> {
    if config.get_int("sync", "max_offset_days", 5) < 0 {
        return Err(invalid(
            "sync",
            "max_offset_days",
            "max_offset_days must be non-negative",
        ));
    }
    Ok(())
}

fn validate_timeout(config: &dyn ConfigPort) -> Result<(), NavsyncError> {
    let max = MAX_RUN_TIMEOUT_SECS as i64;
    if !(0..=max).contains(&config.get_int("sync", "run_timeout_secs", 0)) {
        return Err(invalid(
            "sync",
            "run_timeout_secs",
            format!("run_timeout_secs must be between 0 and {max}"),
        ));
    }
    Ok(())
}

fn validate_source(config: &dyn ConfigPort) -> Result<(), NavsyncError> {
    let kind = config
        .get_trimmed("source", "kind")
        .unwrap_or_else(|| "csv".to_string())
        .to_lowercase();
    if !SOURCE_KINDS.contains(&kind.as_str()) {
        return Err(invalid(
            "source",
            "kind",
            format!("unknown source kind '{kind}' (expected one of: {})", SOURCE_KINDS.join(", ")),
        ));
    }
    if config.get_trimmed("source", "path").is_none() {
        return Err(missing("source", "path"));
    }
    Ok(())
}

fn validate_instruments(config: &dyn ConfigPort) -> Result<(), NavsyncError> {
    let codes_str = config
        .get_string("instruments", "codes")
        .ok_or_else(|| missing("instruments", "codes"))?;
    let codes = parse_codes(&codes_str).map_err(|e| invalid("instruments", "codes", e.to_string()))?;

    for code in &codes {
        let section = format!("instrument.{code}");
        if let Some(class) = config.get_trimmed(&section, "class") {
            class
                .parse::<InstrumentClass>()
                .map_err(|reason| invalid(&section, "class", reason))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const BASE: &str = "[store]\npath = data.json\n\n[source]\nkind = csv\npath = snapshots\n\n[instruments]\ncodes = RBF5736,^GSPC\n";

    fn with(extra: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(&format!("{BASE}\n{extra}")).unwrap()
    }

    fn err_key(result: Result<(), NavsyncError>) -> String {
        match result.unwrap_err() {
            NavsyncError::ConfigInvalid { key, .. } | NavsyncError::ConfigMissing { key, .. } => key,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn minimal_config_is_valid() {
        assert!(validate_sync_config(&with("")).is_ok());
    }

    #[test]
    fn missing_store_path() {
        let adapter = FileConfigAdapter::from_string(
            "[source]\npath = s\n[instruments]\ncodes = EFA\n",
        )
        .unwrap();
        assert_eq!(err_key(validate_sync_config(&adapter)), "path");
    }

    #[test]
    fn zero_window_is_invalid() {
        assert_eq!(
            err_key(validate_sync_config(&with("[sync]\nwindow_size = 0\n"))),
            "window_size"
        );
    }

    #[test]
    fn cap_smaller_than_window_is_invalid() {
        let adapter = FileConfigAdapter::from_string(
            "[store]\npath = d.json\nmax_history = 10\n[sync]\nbootstrap_window_size = 260\n[source]\npath = s\n[instruments]\ncodes = EFA\n",
        )
        .unwrap();
        assert_eq!(err_key(validate_sync_config(&adapter)), "max_history");
    }

    #[test]
    fn unknown_mode_is_invalid() {
        assert_eq!(
            err_key(validate_sync_config(&with("[sync]\nmode = weekly\n"))),
            "mode"
        );
    }

    #[test]
    fn unknown_merge_policy_is_invalid() {
        assert_eq!(
            err_key(validate_sync_config(&with("[sync]\nlatest_merge_policy = newest\n"))),
            "latest_merge_policy"
        );
    }

    #[test]
    fn unknown_source_kind_is_invalid() {
        let adapter = FileConfigAdapter::from_string(
            "[store]\npath = d.json\n[source]\nkind = playwright\npath = s\n[instruments]\ncodes = EFA\n",
        )
        .unwrap();
        assert_eq!(err_key(validate_sync_config(&adapter)), "kind");
    }

    #[test]
    fn duplicate_codes_are_invalid() {
        let adapter = FileConfigAdapter::from_string(
            "[store]\npath = d.json\n[source]\npath = s\n[instruments]\ncodes = EFA, efa\n",
        )
        .unwrap();
        assert_eq!(err_key(validate_sync_config(&adapter)), "codes");
    }

    #[test]
    fn unknown_instrument_class_is_invalid() {
        assert_eq!(
            err_key(validate_sync_config(&with("[instrument.^GSPC]\nclass = bond\n"))),
            "class"
        );
    }

    #[test]
    fn negative_timeout_is_invalid() {
        assert_eq!(
            err_key(validate_sync_config(&with("[sync]\nrun_timeout_secs = -1\n"))),
            "run_timeout_secs"
        );
    }

    #[test]
    fn huge_timeout_is_invalid() {
        assert_eq!(
            err_key(validate_sync_config(&with(
                "[sync]\nrun_timeout_secs = 9223372036854775807\n"
            ))),
            "run_timeout_secs"
        );
    }

    #[test]
    fn huge_windows_are_invalid() {
        assert_eq!(
            err_key(validate_sync_config(&with("[sync]\nwindow_size = 100000000\n"))),
            "window_size"
        );
        assert_eq!(
            err_key(validate_sync_config(&with(
                "[sync]\nbootstrap_window_size = 100000000\n"
            ))),
            "bootstrap_window_size"
        );
    }

    #[test]
    fn bounds_are_inclusive() {
        let extra = format!(
            "[sync]\nwindow_size = {MAX_WINDOW_SIZE}\nrun_timeout_secs = {MAX_RUN_TIMEOUT_SECS}\n"
        );
        assert!(validate_sync_config(&with(&extra)).is_ok());
    }
}
