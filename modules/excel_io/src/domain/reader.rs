use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::domain::binding::DEFAULT_READER;
use crate::domain::codec::TableCodec;
use crate::domain::error::InterchangeError;
use crate::domain::record::RecordSchema;

/// Turns uploaded bytes into records; selected per import binding by id.
pub trait SheetReader: Send + Sync {
    fn id(&self) -> &str;

    fn read(&self, bytes: &[u8], schema: &RecordSchema) -> Result<Vec<Value>, InterchangeError>;
}

/// Reads the first sheet through the configured codec.
pub struct DefaultSheetReader {
    codec: Arc<dyn TableCodec>,
}

impl DefaultSheetReader {
    pub fn new(codec: Arc<dyn TableCodec>) -> Self {
        Self { codec }
    }
}

impl SheetReader for DefaultSheetReader {
    fn id(&self) -> &str {
        DEFAULT_READER
    }

    fn read(&self, bytes: &[u8], schema: &RecordSchema) -> Result<Vec<Value>, InterchangeError> {
        let started = Instant::now();
        tracing::debug!(record = schema.name(), size = bytes.len(), "Reading spreadsheet");

        let rows = self.codec.decode(bytes, schema).map_err(|e| {
            tracing::warn!(record = schema.name(), error = %e, "Spreadsheet read failed");
            InterchangeError::decode(format!("cannot read {} records", schema.name()), e)
        })?;

        tracing::info!(
            record = schema.name(),
            rows = rows.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Spreadsheet read"
        );
        Ok(rows)
    }
}
