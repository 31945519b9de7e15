use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::binding::DEFAULT_PROCESSOR;
use crate::domain::codec::TableCodec;
use crate::domain::record::RecordSchema;
use crate::domain::sink::ResponseSink;

/// Resolved parameters of one export run.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub file_name: String,
    pub sheet_name: String,
    pub schema: RecordSchema,
}

/// Produces the export output from the record list; selected per binding by id.
///
/// Processors that ignore `records` (bindings with `reuse_handler = false`)
/// fetch their own data, e.g. to mail a report instead of returning it.
#[async_trait]
pub trait ExportProcessor: Send + Sync {
    fn id(&self) -> &str;

    async fn process(
        &self,
        job: &ExportJob,
        records: Vec<Value>,
        sink: &mut ResponseSink,
    ) -> anyhow::Result<()>;
}

/// Encodes the records with the codec and writes them as an attachment.
pub struct DefaultExportProcessor {
    codec: Arc<dyn TableCodec>,
}

impl DefaultExportProcessor {
    pub fn new(codec: Arc<dyn TableCodec>) -> Self {
        Self { codec }
    }
}

#[async_trait]
impl ExportProcessor for DefaultExportProcessor {
    fn id(&self) -> &str {
        DEFAULT_PROCESSOR
    }

    async fn process(
        &self,
        job: &ExportJob,
        records: Vec<Value>,
        sink: &mut ResponseSink,
    ) -> anyhow::Result<()> {
        let rows = records.len();
        let codec = self.codec.clone();
        let schema = job.schema.clone();
        let sheet = job.sheet_name.clone();

        let bytes = tokio::task::spawn_blocking(move || codec.encode(&records, &schema, &sheet))
            .await
            .context("spreadsheet encoder task failed")?
            .with_context(|| format!("cannot write sheet '{}'", job.sheet_name))?;

        sink.attachment(
            self.codec.content_type(),
            &job.file_name,
            self.codec.extension(),
            bytes,
        )?;

        tracing::info!(
            file = %job.file_name,
            rows,
            detached = sink.is_detached(),
            "Export complete"
        );
        Ok(())
    }
}
