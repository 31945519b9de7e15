use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use routekit_bootstrap::ConfigProvider;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("module '{module}' config must be an object")]
    InvalidModuleStructure { module: String },
    #[error("invalid config for module '{module}': {source}")]
    InvalidConfig {
        module: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-module view of the runtime: name, raw config, cancellation.
#[derive(Clone)]
pub struct ModuleCtx {
    module_name: Arc<str>,
    config_provider: Arc<dyn ConfigProvider>,
    cancellation_token: CancellationToken,
}

impl ModuleCtx {
    pub fn new(
        module_name: impl Into<Arc<str>>,
        config_provider: Arc<dyn ConfigProvider>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            module_name: module_name.into(),
            config_provider,
            cancellation_token,
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    pub fn raw_config(&self) -> Option<&serde_json::Value> {
        self.config_provider.get_module_config(&self.module_name)
    }

    /// Deserialize the module's config section.
    ///
    /// A missing section yields `T::default()`; the section may either be the
    /// config object itself or wrap it under a `config` key.
    pub fn config<T: DeserializeOwned + Default>(&self) -> Result<T, ConfigError> {
        let Some(raw) = self.raw_config() else {
            return Ok(T::default());
        };
        let obj = raw
            .as_object()
            .ok_or_else(|| ConfigError::InvalidModuleStructure {
                module: self.module_name.to_string(),
            })?;
        let section = obj.get("config").unwrap_or(raw);
        serde_json::from_value(section.clone()).map_err(|source| ConfigError::InvalidConfig {
            module: self.module_name.to_string(),
            source,
        })
    }
}
