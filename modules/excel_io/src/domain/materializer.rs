//! Turns an upload into the value an import parameter asks for.

use std::sync::Arc;

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde_json::Value;

use crate::domain::binding::{ImportSpec, ParamKind};
use crate::domain::error::InterchangeError;
use crate::domain::extractor::{ExtractorChain, InboundRequest, StreamExtractor};
use crate::domain::reader::SheetReader;

/// Value handed to an import parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Raw(Bytes),
    Records(Vec<Value>),
}

/// Read `body` into memory, failing as soon as it grows past `limit` bytes.
pub async fn buffer_body(
    body: Body,
    limit: u64,
    declared: Option<u64>,
) -> Result<Bytes, InterchangeError> {
    let too_large = || InterchangeError::PayloadTooLarge {
        limit,
        actual: declared,
    };
    if declared.is_some_and(|n| n > limit) {
        return Err(too_large());
    }

    let mut buf = BytesMut::new();
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| InterchangeError::decode("cannot read request body", e))?;
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(too_large());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Runs extractors, enforces the size limit, then decodes through a reader.
pub struct Materializer<'a> {
    pub extractors: &'a ExtractorChain,
    pub readers: &'a dashmap::DashMap<String, Arc<dyn SheetReader>>,
    pub max_file_size: u64,
}

impl Materializer<'_> {
    #[tracing::instrument(
        name = "excel_io.materialize",
        skip(self, request, spec),
        fields(field = %spec.field, record = spec.schema.name())
    )]
    pub async fn resolve_parameter(
        &self,
        request: &InboundRequest,
        spec: &ImportSpec,
        kind: ParamKind,
    ) -> Result<Option<Resolved>, InterchangeError> {
        let Some(bytes) = self.extract(request, spec).await else {
            if spec.required {
                return Err(InterchangeError::missing(&spec.field));
            }
            tracing::debug!("Optional import field absent");
            return Ok(None);
        };

        let declared = request.declared_length().unwrap_or(bytes.len() as u64);
        if declared > self.max_file_size {
            return Err(InterchangeError::PayloadTooLarge {
                limit: self.max_file_size,
                actual: Some(declared),
            });
        }

        if kind == ParamKind::Raw {
            return Ok(Some(Resolved::Raw(bytes)));
        }

        let reader = self
            .readers
            .get(&spec.reader)
            .map(|r| r.value().clone())
            .ok_or_else(|| {
                InterchangeError::contract(format!("no sheet reader registered as '{}'", spec.reader))
            })?;
        reader
            .read(&bytes, &spec.schema)
            .map(|rows| Some(Resolved::Records(rows)))
    }

    async fn extract(&self, request: &InboundRequest, spec: &ImportSpec) -> Option<Bytes> {
        let candidates: Vec<Arc<dyn StreamExtractor>> = if spec.extractors.is_empty() {
            self.extractors.snapshot().iter().cloned().collect()
        } else {
            spec.extractors
                .iter()
                .filter_map(|id| {
                    let found = self.extractors.by_id(id);
                    if found.is_none() {
                        tracing::warn!(extractor = %id, "Unknown extractor in import binding");
                    }
                    found
                })
                .collect()
        };

        for extractor in candidates {
            if !extractor.supports(request, &spec.field) {
                continue;
            }
            if let Some(bytes) = extractor.extract(request, &spec.field).await {
                tracing::debug!(extractor = extractor.id(), size = bytes.len(), "Upload extracted");
                return Some(bytes);
            }
        }
        None
    }
}
