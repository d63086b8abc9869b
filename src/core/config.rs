//! Parallelism and logging configuration
//!
//! Configuration is a plain value handed to the reader, the batch assembler
//! and the projection engine. Hardware concurrency is detected once by the
//! caller (usually at process start) and injected here.

use crate::core::error::{ChainError, ConfigError};
use log::LevelFilter;
use std::str::FromStr;

/// Default cap on worker threads regardless of core count
pub const DEFAULT_MAX_WORKERS_CAP: usize = 8;

/// Default minimum number of items before parallel dispatch is used
pub const DEFAULT_MIN_ITEMS_FOR_PARALLEL: usize = 100;

/// Parallel dispatch settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelConfig {
    available_cores: usize,
    max_workers: usize,
    min_items_for_parallel: usize,
}

/// Snapshot of a [`ParallelConfig`] for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSummary {
    pub available_cores: usize,
    pub max_workers: usize,
    pub min_items_for_parallel: usize,
    pub parallel_enabled: bool,
}

impl ParallelConfig {
    /// Build a config for a machine with `available_cores` cores
    ///
    /// A reported core count of 0 is treated as 1.
    pub fn new(available_cores: usize) -> Self {
        let available_cores = available_cores.max(1);
        Self {
            available_cores,
            max_workers: available_cores.min(DEFAULT_MAX_WORKERS_CAP),
            min_items_for_parallel: DEFAULT_MIN_ITEMS_FOR_PARALLEL,
        }
    }

    /// Detect the hardware concurrency of this machine
    pub fn detect() -> Self {
        Self::new(num_cpus::get())
    }

    /// Config that never dispatches work in parallel
    pub fn serial() -> Self {
        Self::new(1).disabled()
    }

    pub fn available_cores(&self) -> usize {
        self.available_cores
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn min_items_for_parallel(&self) -> usize {
        self.min_items_for_parallel
    }

    /// Set the worker limit; 0 disables parallel dispatch
    pub fn with_max_workers(self, max_workers: usize) -> Result<Self, ConfigError> {
        if max_workers > self.available_cores {
            return Err(ConfigError::MaxWorkersExceedsCores {
                requested: max_workers,
                available: self.available_cores,
            });
        }
        Ok(Self {
            max_workers,
            ..self
        })
    }

    pub fn with_min_items_for_parallel(self, min_items_for_parallel: usize) -> Self {
        Self {
            min_items_for_parallel,
            ..self
        }
    }

    pub fn disabled(self) -> Self {
        Self {
            max_workers: 0,
            ..self
        }
    }

    /// Re-enable parallel dispatch, with the default cap when `max_workers` is `None`
    pub fn enabled(self, max_workers: Option<usize>) -> Result<Self, ConfigError> {
        match max_workers {
            Some(n) => self.with_max_workers(n),
            None => Ok(Self {
                max_workers: self.available_cores.min(DEFAULT_MAX_WORKERS_CAP),
                ..self
            }),
        }
    }

    pub fn is_parallel_enabled(&self) -> bool {
        self.max_workers > 0
    }

    /// Whether `n_items` units of work are worth spreading over workers
    pub fn should_parallelize(&self, n_items: usize) -> bool {
        self.is_parallel_enabled() && n_items >= self.min_items_for_parallel
    }

    /// Build a worker pool sized to `max_workers`, or `None` when disabled
    pub fn build_pool(&self) -> Result<Option<rayon::ThreadPool>, ChainError> {
        if !self.is_parallel_enabled() {
            return Ok(None);
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map(Some)
            .map_err(|e| ChainError::ThreadPool(e.to_string()))
    }

    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            available_cores: self.available_cores,
            max_workers: self.max_workers,
            min_items_for_parallel: self.min_items_for_parallel,
            parallel_enabled: self.is_parallel_enabled(),
        }
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self::detect()
    }
}

/// Log verbosity accepted at the configuration boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// `log` has no level above error, so critical collapses onto it
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Error | LogLevel::Critical => LevelFilter::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

/// Install an `env_logger` at `level`, writing to stderr
///
/// # Errors
/// Fails if a logger is already installed for this process; the existing
/// logger stays in place.
pub fn init_logging(level: LogLevel) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .format_timestamp_secs()
        .try_init()
}
