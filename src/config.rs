//! Application settings.

use serde::Deserialize;

/// Default request body cap: 1 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1 << 20;

/// Settings applied to every exchange an [`App`](crate::App) handles.
///
/// Missing fields fall back to their defaults when deserialized, so a host
/// can embed this in its own config file:
///
/// ```rust
/// let config: strata::AppConfig = serde_json::from_str(r#"{"max_body_bytes": 4096}"#).unwrap();
/// assert_eq!(config.max_body_bytes, Some(4096));
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Body drains past this many bytes fail with `413`. `None` disables
    /// the cap.
    pub max_body_bytes: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { max_body_bytes: Some(DEFAULT_MAX_BODY_BYTES) }
    }
}

impl AppConfig {
    /// No cap on body size.
    pub fn unbounded() -> Self {
        Self { max_body_bytes: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_one_mebibyte() {
        assert_eq!(AppConfig::default().max_body_bytes, Some(1_048_576));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn null_disables_the_cap() {
        let config: AppConfig = serde_json::from_str(r#"{"max_body_bytes": null}"#).unwrap();
        assert_eq!(config, AppConfig::unbounded());
    }
}
