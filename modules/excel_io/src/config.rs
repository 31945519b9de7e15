use serde::{Deserialize, Serialize};

/// Configuration for the excel_io module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcelIoConfig {
    /// Turns route derivation and interception on or off.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// File name stem used when an export binding leaves it empty.
    #[serde(default = "default_file_name")]
    pub default_file_name: String,
    /// Sheet label used when an export binding leaves it empty.
    #[serde(default = "default_sheet_name")]
    pub default_sheet_name: String,
    /// chrono format for date-time cells.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Upper bound for an uploaded request body, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_async_core_pool_size")]
    pub async_core_pool_size: usize,
    #[serde(default = "default_async_max_pool_size")]
    pub async_max_pool_size: usize,
    #[serde(default = "default_async_queue_capacity")]
    pub async_queue_capacity: usize,
    /// How long shutdown waits for queued and running async exports.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ExcelIoConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_file_name: default_file_name(),
            default_sheet_name: default_sheet_name(),
            date_format: default_date_format(),
            max_file_size: default_max_file_size(),
            async_core_pool_size: default_async_core_pool_size(),
            async_max_pool_size: default_async_max_pool_size(),
            async_queue_capacity: default_async_queue_capacity(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl ExcelIoConfig {
    pub fn shutdown_grace(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_file_name() -> String {
    "export".to_string()
}

fn default_sheet_name() -> String {
    "Sheet1".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_async_core_pool_size() -> usize {
    2
}

fn default_async_max_pool_size() -> usize {
    5
}

fn default_async_queue_capacity() -> usize {
    100
}

fn default_shutdown_grace_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_section_keeps_defaults() {
        let cfg: ExcelIoConfig =
            serde_json::from_value(serde_json::json!({ "max_file_size": 2048 })).unwrap();
        assert_eq!(cfg.max_file_size, 2048);
        assert!(cfg.enabled);
        assert_eq!(cfg.default_file_name, "export");
        assert_eq!(cfg.default_sheet_name, "Sheet1");
        assert_eq!(cfg.async_core_pool_size, 2);
        assert_eq!(cfg.async_max_pool_size, 5);
        assert_eq!(cfg.async_queue_capacity, 100);
        assert_eq!(cfg.shutdown_grace().as_secs(), 60);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res: Result<ExcelIoConfig, _> =
            serde_json::from_value(serde_json::json!({ "max_file_size_mb": 1 }));
        assert!(res.is_err());
    }
}
