//! Environment configuration for the demo binary.

use std::str::FromStr;

use keel_core::snapshot::SnapshotPolicy;

use crate::error::AppError;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable, multi-line output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(AppError::Config(format!(
                "KEEL_LOG_FORMAT must be `json` or `pretty`, got `{other}`"
            ))),
        }
    }
}

/// Runtime settings read from `KEEL_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Snapshot every N committed events; `0` disables snapshots.
    pub snapshot_every: u64,
    /// Log output format.
    pub log_format: LogFormat,
    /// Events fetched per batch when listeners catch up.
    pub replay_batch: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            snapshot_every: 50,
            log_format: LogFormat::Json,
            replay_batch: 100,
        }
    }
}

impl DemoConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let snapshot_every = match lookup("KEEL_SNAPSHOT_EVERY") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                AppError::Config(format!("KEEL_SNAPSHOT_EVERY must be a u64: {e}"))
            })?,
            None => defaults.snapshot_every,
        };
        let log_format = match lookup("KEEL_LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => defaults.log_format,
        };
        let replay_batch = match lookup("KEEL_REPLAY_BATCH") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(0) => {
                    return Err(AppError::Config(
                        "KEEL_REPLAY_BATCH must be greater than zero".into(),
                    ));
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(AppError::Config(format!(
                        "KEEL_REPLAY_BATCH must be a usize: {e}"
                    )));
                }
            },
            None => defaults.replay_batch,
        };

        Ok(Self {
            snapshot_every,
            log_format,
            replay_batch,
        })
    }

    /// The snapshot policy implied by `snapshot_every`.
    #[must_use]
    pub fn snapshot_policy(&self) -> SnapshotPolicy {
        match self.snapshot_every {
            0 => SnapshotPolicy::Never,
            n => SnapshotPolicy::EveryNEvents(n),
        }
    }
}
