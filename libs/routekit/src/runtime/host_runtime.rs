//! Host Runtime - orchestrates the full RouteKit lifecycle
//!
//! This module contains the HostRuntime type that owns and coordinates
//! the execution of all lifecycle phases: init → REST → finalize → start → serve → stop.

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::api::RouteTable;
use crate::context::{ConfigProvider, ModuleCtx};
use crate::registry::{ModuleRegistry, RegistryError};

/// HostRuntime owns the lifecycle orchestration for RouteKit.
pub struct HostRuntime {
    registry: ModuleRegistry,
    modules_cfg: Arc<dyn ConfigProvider>,
    cancel: CancellationToken,
}

impl HostRuntime {
    pub fn new(
        registry: ModuleRegistry,
        modules_cfg: Arc<dyn ConfigProvider>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            modules_cfg,
            cancel,
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn ctx_for(&self, module: &'static str) -> ModuleCtx {
        ModuleCtx::new(module, self.modules_cfg.clone(), self.cancel.child_token())
    }

    /// INIT phase: initialize all modules in topological order.
    async fn run_init_phase(&self) -> Result<(), RegistryError> {
        tracing::info!("Phase: init");

        for entry in self.registry.modules() {
            let ctx = self.ctx_for(entry.name);
            entry
                .core
                .init(&ctx)
                .await
                .map_err(|source| RegistryError::Init {
                    module: entry.name,
                    source,
                })?;
        }

        Ok(())
    }

    /// REST phase: every module registers, then every module finalizes against the full table.
    fn run_rest_phase(&self) -> Result<RouteTable, RegistryError> {
        tracing::info!("Phase: rest (sync)");

        let mut routes = RouteTable::new();

        for e in self.registry.modules() {
            if let Some(rest) = &e.rest {
                rest.register_rest(&self.ctx_for(e.name), &mut routes)
                    .map_err(|source| RegistryError::RestRegister {
                        module: e.name,
                        source,
                    })?;
            }
        }

        tracing::info!("Phase: rest finalize");
        for e in self.registry.modules() {
            if let Some(rest) = &e.rest {
                rest.finalize_rest(&self.ctx_for(e.name), &mut routes)
                    .map_err(|source| RegistryError::RestFinalize {
                        module: e.name,
                        source,
                    })?;
            }
        }

        tracing::info!(routes = routes.len(), "Route table complete");
        Ok(routes)
    }

    /// START phase: start all stateful modules.
    async fn run_start_phase(&self) -> Result<(), RegistryError> {
        tracing::info!("Phase: start");

        for e in self.registry.modules() {
            if let Some(s) = &e.stateful {
                tracing::debug!(module = e.name, "Starting stateful module");
                s.start(self.cancel.clone())
                    .await
                    .map_err(|source| RegistryError::Start {
                        module: e.name,
                        source,
                    })?;
            }
        }

        Ok(())
    }

    /// STOP phase: stop all stateful modules in reverse order.
    ///
    /// Errors are logged but do not fail the shutdown process.
    pub async fn run_stop_phase(&self) {
        tracing::info!("Phase: stop");

        for e in self.registry.modules().iter().rev() {
            if let Some(s) = &e.stateful {
                if let Err(err) = s.stop(self.cancel.clone()).await {
                    tracing::warn!(module = e.name, error = %err, "Failed to stop module");
                }
            }
        }
    }

    /// init → REST → finalize → start, returning the frozen router.
    pub async fn prepare(&self) -> anyhow::Result<Router> {
        self.run_init_phase().await?;
        let routes = self.run_rest_phase()?;
        let router = routes.into_router()?;
        self.run_start_phase().await?;
        Ok(router)
    }

    /// Run the full lifecycle: prepare → serve until cancelled → stop.
    pub async fn run_full_cycle(
        self,
        addr: SocketAddr,
        wrap: impl FnOnce(Router) -> Router,
    ) -> anyhow::Result<()> {
        let router = wrap(self.prepare().await?);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("HTTP server bound on {}", addr);

        let shutdown = {
            let cancel = self.cancel.clone();
            async move {
                cancel.cancelled().await;
                tracing::info!("HTTP server shutting down gracefully (cancellation)");
            }
        };

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| anyhow::anyhow!(e));

        self.run_stop_phase().await;
        served
    }
}
