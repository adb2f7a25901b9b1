use std::num::NonZeroU32;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use regex::Regex;

/// Environment key holding the method-name pattern exempt from forced
/// argument serialization.
pub const SERIALIZATION_EXEMPT_PATTERN_ENV: &str = "CALLGUARD_SERIALIZATION_EXEMPT_PATTERN";

/// Errors raised while building client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid serialization exemption pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Per-façade configuration for the intercepting invoker.
#[derive(Debug, Clone, Default)]
pub struct InvokerConfig {
    /// Deep-copy every argument through serialization before the call,
    /// simulating a process boundary.
    pub force_argument_serialization: bool,
    /// Upper bound on attempts of one interactive call, counting the first.
    ///
    /// `None` (the default) leaves the retry loop unbounded: the operation
    /// listener alone decides when to stop answering `true`.
    pub max_attempts: Option<NonZeroU32>,
}

/// Process-wide override naming methods exempt from forced argument
/// serialization.
///
/// Set once during startup and read lock-free on every call. The pattern
/// must match the whole method name.
#[derive(Debug)]
pub struct SerializationOverride {
    pattern: ArcSwapOption<Regex>,
}

impl SerializationOverride {
    /// Creates an override with no exempt methods.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pattern: ArcSwapOption::empty(),
        }
    }

    /// Reads [`SERIALIZATION_EXEMPT_PATTERN_ENV`] from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` if the variable holds an invalid regex.
    pub fn from_env() -> Result<Self, ConfigError> {
        let this = Self::new();
        if let Ok(pattern) = std::env::var(SERIALIZATION_EXEMPT_PATTERN_ENV) {
            this.set_pattern(Some(&pattern))?;
        }
        Ok(this)
    }

    /// Replaces the exemption pattern. `None` clears it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` if `pattern` is not a valid regex;
    /// the previous pattern stays in effect.
    pub fn set_pattern(&self, pattern: Option<&str>) -> Result<(), ConfigError> {
        let compiled = match pattern {
            Some(p) => Some(Arc::new(Regex::new(&format!("^(?:{p})$")).map_err(
                |source| ConfigError::InvalidPattern {
                    pattern: p.to_string(),
                    source,
                },
            )?)),
            None => None,
        };
        tracing::debug!(pattern = ?pattern, "serialization exemption pattern set");
        self.pattern.store(compiled);
        Ok(())
    }

    /// Whether `method` is exempt from forced argument serialization.
    #[must_use]
    pub fn is_exempt(&self, method: &str) -> bool {
        let current = self.pattern.load();
        match &*current {
            Some(re) => re.is_match(method),
            None => false,
        }
    }
}

impl Default for SerializationOverride {
    fn default() -> Self {
        Self::new()
    }
}
