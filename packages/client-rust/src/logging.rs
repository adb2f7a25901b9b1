//! Process-wide `tracing` subscriber setup.
//!
//! Output goes to stderr. `RUST_LOG` takes precedence over the configured
//! filter when set.

use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter `{filter}`: {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    pub with_target: bool,
    pub with_thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            with_target: true,
            with_thread_names: true,
        }
    }
}

impl LoggingConfig {
    /// Default configuration raised to `debug` (1) or `trace` (2+).
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let filter = match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        Self {
            filter: filter.to_string(),
            ..Self::default()
        }
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return Ok(EnvFilter::from_default_env());
        }
        EnvFilter::try_new(&self.filter).map_err(|source| LoggingError::InvalidFilter {
            filter: self.filter.clone(),
            source,
        })
    }
}

/// Installs the global subscriber. Call once at startup.
///
/// # Errors
///
/// Returns `LoggingError::InvalidFilter` for unparsable directives and
/// `LoggingError::AlreadyInitialized` if a subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let builder = fmt()
        .with_env_filter(config.env_filter()?)
        .with_writer(std::io::stderr)
        .with_target(config.with_target)
        .with_thread_names(config.with_thread_names);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|_| LoggingError::AlreadyInitialized)
}
