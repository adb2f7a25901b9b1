//! Message catalog lookup used for operation descriptions and dialog text.

use std::collections::HashMap;

use serde_json::Value;

/// Key wrapping an operation description while it runs (`{0}` = description).
pub const PROCESSING_KEY: &str = "callguard.processing";
/// Key describing a successful operation.
pub const SUCCESS_KEY: &str = "callguard.success";
/// Key wrapping an operation description when an attempt failed.
pub const FAILURE_KEY: &str = "callguard.failure";

/// Resolves a message key and positional parameters to display text.
pub trait MessageCatalog: Send + Sync {
    /// Localized text for `key`, or `None` when the catalog has no entry.
    fn resolve(&self, key: &str, params: &[Value]) -> Option<String>;

    /// Localized text for `key`, falling back to the key itself.
    fn text_or_key(&self, key: &str, params: &[Value]) -> String {
        self.resolve(key, params).unwrap_or_else(|| key.to_string())
    }
}

/// In-memory catalog with `{0}`-style positional placeholders.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<String, String>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the invoker's built-in lifecycle keys.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.insert(PROCESSING_KEY, "Processing {0}");
        catalog.insert(SUCCESS_KEY, "Operation completed");
        catalog.insert(FAILURE_KEY, "Operation failed: {0}");
        catalog
    }

    pub fn insert(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.entries.insert(key.into(), template.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticCatalog {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl MessageCatalog for StaticCatalog {
    fn resolve(&self, key: &str, params: &[Value]) -> Option<String> {
        self.entries
            .get(key)
            .map(|template| format_message(template, params))
    }
}

/// Substitutes `{n}` placeholders with the n-th parameter.
///
/// Placeholders are resolved in one left-to-right pass over the template, so
/// inserted parameter text is never rescanned. String parameters are
/// inserted without quotes; placeholders without a matching parameter are
/// left untouched.
#[must_use]
pub fn format_message(template: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let param = after.find('}').and_then(|close| {
            let index: usize = after[..close].parse().ok()?;
            params.get(index).map(|param| (close, param))
        });
        match param {
            Some((close, param)) => {
                match param {
                    Value::String(s) => out.push_str(s),
                    other => out.push_str(&other.to_string()),
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
