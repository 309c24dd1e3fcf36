use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_DELIMITER: &str = ".";
pub const DEFAULT_WILDCARD: &str = "*";

/// Single-segment wildcard setting.
///
/// Accepts either a token or a boolean. `true` (and, leniently, `false`)
/// selects the default `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WildcardToken {
    Enabled(bool),
    Token(String),
}

impl WildcardToken {
    /// The single-segment token.
    pub fn single(&self) -> &str {
        match self {
            WildcardToken::Token(token) => token,
            WildcardToken::Enabled(_) => DEFAULT_WILDCARD,
        }
    }
}

impl Default for WildcardToken {
    fn default() -> Self {
        WildcardToken::Token(DEFAULT_WILDCARD.to_string())
    }
}

impl From<&str> for WildcardToken {
    fn from(token: &str) -> Self {
        WildcardToken::Token(token.to_string())
    }
}

impl From<bool> for WildcardToken {
    fn from(enabled: bool) -> Self {
        WildcardToken::Enabled(enabled)
    }
}

/// Dispatcher settings.
///
/// Deserializable so it can sit inside a service's YAML/JSON config:
///
/// ```yaml
/// events:
///   delimiter: "/"
///   wildcard: "+"
/// ```
///
/// Missing fields take their defaults (`.` and `*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Separator between pattern segments.
    pub delimiter: String,

    /// Single-segment wildcard token.
    pub wildcard: WildcardToken,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            wildcard: WildcardToken::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }
        let wildcard = self.wildcard.single();
        if wildcard.is_empty() {
            return Err(ConfigError::EmptyWildcard);
        }
        // A token containing the delimiter could never come out of a split.
        if wildcard.contains(self.delimiter.as_str()) {
            return Err(ConfigError::WildcardContainsDelimiter {
                wildcard: wildcard.to_string(),
                delimiter: self.delimiter.clone(),
            });
        }
        Ok(())
    }
}
