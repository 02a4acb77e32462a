use serde::{Deserialize, Serialize};
use vault_core::RetryConfig;

/// Tunables of the file engine. Every field has a default, so an empty
/// TOML table is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Unversioned container holding derived auxiliary files.
    pub auxiliary_bucket: String,
    /// Upper bound on the version chain entries read for one key.
    pub version_history_limit: usize,
    /// Page size used when the engine walks a prefix on its own.
    pub list_page_size: usize,
    /// Largest `maxItems` a listing request may ask for.
    pub max_list_items: usize,
    /// Extensions (with leading dot, lower case) a preview may have to be
    /// picked as the active preview of its base file.
    pub preview_extensions: Vec<String>,
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auxiliary_bucket: "asset-auxiliary".to_string(),
            version_history_limit: 100,
            list_page_size: 1000,
            max_list_items: 1000,
            preview_extensions: [".png", ".jpg", ".jpeg", ".svg", ".gif"]
                .into_iter()
                .map(String::from)
                .collect(),
            retry: RetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"auxiliary_bucket":"aux","retry":{"max_attempts":2}}"#)
                .unwrap();
        assert_eq!(config.auxiliary_bucket, "aux");
        assert_eq!(config.version_history_limit, 100);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.base_delay_ms, 50);
        assert_eq!(config.preview_extensions.len(), 5);
    }
}
