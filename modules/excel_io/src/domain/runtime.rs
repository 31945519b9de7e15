//! Everything a request needs to export or import: config, codec, chains, registries.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::ExcelIoConfig;
use crate::domain::codec::{TableCodec, XlsxCodec};
use crate::domain::dispatcher::{ExportDispatcher, PoolSize};
use crate::domain::extractor::{default_extractors, ExtractorChain, StreamExtractor};
use crate::domain::materializer::Materializer;
use crate::domain::processor::{DefaultExportProcessor, ExportProcessor};
use crate::domain::reader::{DefaultSheetReader, SheetReader};
use crate::domain::wrapper::{ResponseWrapper, WrapperChain};

pub struct InterchangeRuntime {
    config: ExcelIoConfig,
    codec: Arc<dyn TableCodec>,
    wrappers: WrapperChain,
    extractors: ExtractorChain,
    readers: DashMap<String, Arc<dyn SheetReader>>,
    processors: DashMap<String, Arc<dyn ExportProcessor>>,
    dispatcher: ExportDispatcher,
}

impl InterchangeRuntime {
    /// Runtime with the built-in codec, extractors, reader and processor.
    ///
    /// Starts the export dispatcher, so it must be called inside a tokio runtime.
    pub fn new(config: ExcelIoConfig) -> Self {
        let codec: Arc<dyn TableCodec> = Arc::new(XlsxCodec::new(config.date_format.clone()));
        let dispatcher = ExportDispatcher::start(PoolSize {
            core: config.async_core_pool_size,
            max: config.async_max_pool_size,
            queue: config.async_queue_capacity,
        });

        let rt = Self {
            codec: codec.clone(),
            wrappers: WrapperChain::new(),
            extractors: ExtractorChain::new(default_extractors()),
            readers: DashMap::new(),
            processors: DashMap::new(),
            dispatcher,
            config,
        };
        rt.register_reader(Arc::new(DefaultSheetReader::new(codec.clone())));
        rt.register_processor(Arc::new(DefaultExportProcessor::new(codec)));
        rt
    }

    pub fn config(&self) -> &ExcelIoConfig {
        &self.config
    }

    pub fn codec(&self) -> &Arc<dyn TableCodec> {
        &self.codec
    }

    pub fn wrappers(&self) -> &WrapperChain {
        &self.wrappers
    }

    pub fn extractors(&self) -> &ExtractorChain {
        &self.extractors
    }

    pub fn dispatcher(&self) -> &ExportDispatcher {
        &self.dispatcher
    }

    pub fn register_wrapper(&self, wrapper: Arc<dyn ResponseWrapper>) {
        tracing::debug!(wrapper = wrapper.id(), priority = wrapper.priority(), "Response wrapper registered");
        self.wrappers.register(wrapper);
    }

    pub fn register_extractor(&self, extractor: Arc<dyn StreamExtractor>) {
        tracing::debug!(extractor = extractor.id(), priority = extractor.priority(), "Stream extractor registered");
        self.extractors.register(extractor);
    }

    /// Registering under an existing id replaces the previous reader.
    pub fn register_reader(&self, reader: Arc<dyn SheetReader>) {
        if self.readers.insert(reader.id().to_string(), reader.clone()).is_some() {
            tracing::info!(reader = reader.id(), "Sheet reader replaced");
        }
    }

    /// Registering under an existing id replaces the previous processor.
    pub fn register_processor(&self, processor: Arc<dyn ExportProcessor>) {
        if self
            .processors
            .insert(processor.id().to_string(), processor.clone())
            .is_some()
        {
            tracing::info!(processor = processor.id(), "Export processor replaced");
        }
    }

    pub fn processor(&self, id: &str) -> Option<Arc<dyn ExportProcessor>> {
        self.processors.get(id).map(|p| p.value().clone())
    }

    pub fn materializer(&self) -> Materializer<'_> {
        Materializer {
            extractors: &self.extractors,
            readers: &self.readers,
            max_file_size: self.config.max_file_size,
        }
    }
}

impl std::fmt::Debug for InterchangeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterchangeRuntime")
            .field("wrappers", &self.wrappers.len())
            .field("extractors", &self.extractors.len())
            .field("readers", &self.readers.len())
            .field("processors", &self.processors.len())
            .field("pool", &self.dispatcher.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::binding::DEFAULT_PROCESSOR;
    use crate::domain::processor::ExportJob;
    use crate::domain::sink::ResponseSink;
    use serde_json::Value;

    struct Mailer;

    #[async_trait::async_trait]
    impl ExportProcessor for Mailer {
        fn id(&self) -> &str {
            "mail"
        }

        async fn process(
            &self,
            _job: &ExportJob,
            _records: Vec<Value>,
            _sink: &mut ResponseSink,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn defaults_are_registered() {
        let rt = InterchangeRuntime::new(ExcelIoConfig::default());
        assert!(rt.processor(DEFAULT_PROCESSOR).is_some());
        assert!(rt.processor("mail").is_none());
        assert_eq!(rt.extractors().len(), 3);
        assert_eq!(rt.wrappers().len(), 1);

        rt.register_processor(Arc::new(Mailer));
        assert!(rt.processor("mail").is_some());
    }
}
