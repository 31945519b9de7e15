use async_trait::async_trait;
use bytes::Bytes;

use super::{InboundRequest, StreamExtractor};
use crate::domain::chain::Ranked;
use crate::domain::codec::XLSX_CONTENT_TYPE;

const ACCEPTED: [&str; 3] = [
    XLSX_CONTENT_TYPE,
    "application/octet-stream",
    "application/vnd.ms-excel",
];

/// Treats the whole body as the file when it is sent with a spreadsheet or binary media type.
pub struct RawBodyExtractor;

impl Ranked for RawBodyExtractor {
    fn id(&self) -> &str {
        "raw_body"
    }

    fn priority(&self) -> i32 {
        300
    }
}

#[async_trait]
impl StreamExtractor for RawBodyExtractor {
    fn supports(&self, request: &InboundRequest, _field: &str) -> bool {
        request
            .content_type()
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .map(|m| ACCEPTED.contains(&m.essence_str()))
            .unwrap_or(false)
    }

    async fn extract(&self, request: &InboundRequest, _field: &str) -> Option<Bytes> {
        // without Content-Length (chunked upload) fall back to what was buffered
        let length = request
            .declared_length()
            .unwrap_or(request.body().len() as u64);
        if length == 0 || request.body().is_empty() {
            return None;
        }
        Some(request.body().clone())
    }
}
