use std::sync::Arc;

use async_trait::async_trait;
use routekit::{Module, ModuleCtx, RestfulModule, RouteTable, StatefulModule};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ExcelIoConfig;
use crate::domain::extractor::StreamExtractor;
use crate::domain::intercept::{install_export_interception, install_import_support};
use crate::domain::processor::ExportProcessor;
use crate::domain::reader::SheetReader;
use crate::domain::runtime::InterchangeRuntime;
use crate::domain::wrapper::ResponseWrapper;

/// Spreadsheet export/import for the operations of every other module.
///
/// Register it under [`ExcelIoModule::NAME`] with the `rest` and `stateful`
/// capabilities. It adds no routes of its own; in the finalize phase it derives
/// export routes and installs the interception layer.
#[derive(Default)]
pub struct ExcelIoModule {
    // Keep the runtime behind ArcSwap for cheap read-mostly access.
    runtime: arc_swap::ArcSwapOption<InterchangeRuntime>,
    wrappers: Vec<Arc<dyn ResponseWrapper>>,
    extractors: Vec<Arc<dyn StreamExtractor>>,
    readers: Vec<Arc<dyn SheetReader>>,
    processors: Vec<Arc<dyn ExportProcessor>>,
}

impl ExcelIoModule {
    pub const NAME: &'static str = "excel_io";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wrapper(mut self, wrapper: Arc<dyn ResponseWrapper>) -> Self {
        self.wrappers.push(wrapper);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn StreamExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn with_reader(mut self, reader: Arc<dyn SheetReader>) -> Self {
        self.readers.push(reader);
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn ExportProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// The runtime, once `init` has run.
    pub fn runtime(&self) -> Option<Arc<InterchangeRuntime>> {
        self.runtime.load_full()
    }

    fn initialized(&self) -> anyhow::Result<Arc<InterchangeRuntime>> {
        self.runtime()
            .ok_or_else(|| anyhow::anyhow!("excel_io runtime not initialized"))
    }
}

#[async_trait]
impl Module for ExcelIoModule {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        info!("Initializing excel_io module");

        let cfg: ExcelIoConfig = ctx.config()?;
        debug!(
            "Loaded excel_io config: enabled={}, max_file_size={}, pool={}/{}/{}",
            cfg.enabled,
            cfg.max_file_size,
            cfg.async_core_pool_size,
            cfg.async_max_pool_size,
            cfg.async_queue_capacity
        );

        let runtime = InterchangeRuntime::new(cfg);
        for w in &self.wrappers {
            runtime.register_wrapper(w.clone());
        }
        for e in &self.extractors {
            runtime.register_extractor(e.clone());
        }
        for r in &self.readers {
            runtime.register_reader(r.clone());
        }
        for p in &self.processors {
            runtime.register_processor(p.clone());
        }

        info!(runtime = ?runtime, "excel_io runtime initialized");
        self.runtime.store(Some(Arc::new(runtime)));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl RestfulModule for ExcelIoModule {
    fn register_rest(&self, _ctx: &ModuleCtx, _routes: &mut RouteTable) -> anyhow::Result<()> {
        Ok(())
    }

    fn finalize_rest(&self, _ctx: &ModuleCtx, routes: &mut RouteTable) -> anyhow::Result<()> {
        let runtime = self.initialized()?;

        let imports = install_import_support(routes, &runtime);

        if !runtime.config().enabled {
            info!(imports, "excel_io export interception disabled by config");
            return Ok(());
        }

        let report = install_export_interception(routes, &runtime);
        for (handler_id, reason) in &report.skipped {
            warn!(%handler_id, %reason, "Operation exported without a derived route");
        }
        info!(
            derived = report.registered.len(),
            skipped = report.skipped.len(),
            imports,
            "excel_io routes finalized"
        );
        Ok(())
    }
}

#[async_trait]
impl StatefulModule for ExcelIoModule {
    async fn start(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
        let Some(runtime) = self.runtime() else {
            return Ok(());
        };
        let grace = runtime.config().shutdown_grace();
        if !runtime.dispatcher().shutdown(grace).await {
            warn!(
                stats = ?runtime.dispatcher().stats(),
                "Async exports still running after the grace period"
            );
        }
        Ok(())
    }
}
