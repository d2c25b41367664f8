//! Domain error types.

use chrono::NaiveDate;

/// Failure reported by a quote source for a single fetch.
///
/// These are per-date conditions: the orchestrator records them as skip
/// reasons and moves on to the next date.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("source returned no rows for any tracked instrument")]
    Empty,
}

impl SourceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        SourceError::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Top-level error type for navsync.
#[derive(Debug, thiserror::Error)]
pub enum NavsyncError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("store {path} is corrupt: {reason}")]
    StoreCorrupt { path: String, reason: String },

    #[error("failed to write store {path}: {reason}")]
    StoreWrite { path: String, reason: String },

    #[error("no quote data for any of {attempted} requested dates")]
    SourceExhausted { attempted: usize },

    #[error("history for {instrument} is out of order at {date}")]
    HistoryOrder { instrument: String, date: NaiveDate },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&NavsyncError> for std::process::ExitCode {
    fn from(err: &NavsyncError) -> Self {
        let code: u8 = match err {
            NavsyncError::Io(_) => 1,
            NavsyncError::ConfigParse { .. }
            | NavsyncError::ConfigMissing { .. }
            | NavsyncError::ConfigInvalid { .. } => 2,
            NavsyncError::StoreCorrupt { .. }
            | NavsyncError::StoreWrite { .. }
            | NavsyncError::HistoryOrder { .. } => 3,
            NavsyncError::SourceExhausted { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_messages() {
        assert_eq!(
            SourceError::unavailable("timeout").to_string(),
            "source unavailable: timeout"
        );
        assert_eq!(
            SourceError::Empty.to_string(),
            "source returned no rows for any tracked instrument"
        );
    }

    #[test]
    fn store_corrupt_message_names_path() {
        let err = NavsyncError::StoreCorrupt {
            path: "data.json".into(),
            reason: "expected value at line 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "store data.json is corrupt: expected value at line 1"
        );
    }

    #[test]
    fn exit_codes_by_category() {
        use std::process::ExitCode;

        let cases = [
            (NavsyncError::Io(std::io::Error::other("x")), ExitCode::from(1)),
            (
                NavsyncError::ConfigMissing {
                    section: "store".into(),
                    key: "path".into(),
                },
                ExitCode::from(2),
            ),
            (
                NavsyncError::StoreCorrupt {
                    path: "p".into(),
                    reason: "r".into(),
                },
                ExitCode::from(3),
            ),
            (
                NavsyncError::SourceExhausted { attempted: 3 },
                ExitCode::from(5),
            ),
        ];
        for (err, expected) in &cases {
            assert_eq!(ExitCode::from(err), *expected);
        }
    }
}
