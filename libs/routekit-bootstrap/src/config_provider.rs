use std::sync::Arc;

use serde_json::Value;

use crate::config::AppConfig;

/// Where modules look up their `modules.<name>` section.
pub trait ConfigProvider: Send + Sync {
    fn get_module_config(&self, module_name: &str) -> Option<&Value>;

    /// A global section (`server`, `logging`) rendered as JSON.
    fn get_config_raw(&self, key: &str) -> Option<Value>;
}

/// [`ConfigProvider`] over a fully loaded [`AppConfig`].
#[derive(Debug, Clone)]
pub struct AppConfigProvider {
    config: Arc<AppConfig>,
}

impl AppConfigProvider {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl ConfigProvider for AppConfigProvider {
    fn get_module_config(&self, module_name: &str) -> Option<&Value> {
        self.config.modules.get(module_name)
    }

    fn get_config_raw(&self, key: &str) -> Option<Value> {
        let section = match key {
            "server" => serde_json::to_value(&self.config.server),
            "logging" => serde_json::to_value(self.config.logging.as_ref()?),
            _ => return None,
        };
        section.ok()
    }
}
