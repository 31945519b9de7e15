use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::api::RouteTable;

/// Core module: DI/wiring and config parsing.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    async fn init(&self, ctx: &crate::context::ModuleCtx) -> anyhow::Result<()>;
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Pure wiring; must be sync. Runs AFTER init.
pub trait RestfulModule: Send + Sync {
    /// Register the module's operations into the shared route table.
    fn register_rest(
        &self,
        ctx: &crate::context::ModuleCtx,
        routes: &mut RouteTable,
    ) -> anyhow::Result<()>;

    /// Runs once every module has registered. The table is complete at this
    /// point, so modules may derive extra routes from other modules' operations
    /// or layer them.
    fn finalize_rest(
        &self,
        _ctx: &crate::context::ModuleCtx,
        _routes: &mut RouteTable,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait StatefulModule: Send + Sync {
    async fn start(&self, cancel: CancellationToken) -> anyhow::Result<()>;
    async fn stop(&self, cancel: CancellationToken) -> anyhow::Result<()>;
}
