use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;

use super::{InboundRequest, StreamExtractor};
use crate::domain::chain::Ranked;

/// Reads a base64 string field from a JSON body; a `data:` URI prefix is dropped.
pub struct Base64JsonExtractor;

impl Ranked for Base64JsonExtractor {
    fn id(&self) -> &str {
        "base64_json"
    }

    fn priority(&self) -> i32 {
        200
    }
}

#[async_trait]
impl StreamExtractor for Base64JsonExtractor {
    fn supports(&self, request: &InboundRequest, _field: &str) -> bool {
        request
            .content_type()
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false)
    }

    async fn extract(&self, request: &InboundRequest, field: &str) -> Option<Bytes> {
        let json: serde_json::Value = serde_json::from_slice(request.body()).ok()?;
        let text = json.get(field)?.as_str()?;

        // "data:<mime>;base64,<payload>"
        let payload = match text.split_once(',') {
            Some((_, rest)) => rest,
            None => text,
        };

        match base64::engine::general_purpose::STANDARD.decode(payload.trim()) {
            Ok(bytes) if !bytes.is_empty() => Some(Bytes::from(bytes)),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(field, error = %e, "Field is not valid base64");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::extractor::test_support::inbound;

    #[tokio::test]
    async fn decodes_plain_and_data_uri_payloads() {
        let req = inbound(Some("application/json"), r#"{"file":"aGVsbG8="}"#);
        assert!(Base64JsonExtractor.supports(&req, "file"));
        assert_eq!(
            &Base64JsonExtractor.extract(&req, "file").await.unwrap()[..],
            b"hello"
        );

        let req = inbound(
            Some("application/json; charset=utf-8"),
            r#"{"file":"data:application/vnd.openxmlformats-officedocument.spreadsheetml.sheet;base64,aGVsbG8="}"#,
        );
        assert_eq!(
            &Base64JsonExtractor.extract(&req, "file").await.unwrap()[..],
            b"hello"
        );
    }

    #[tokio::test]
    async fn failures_mean_absent() {
        for body in [
            "not json",
            r#"{"file": 42}"#,
            r#"{"other":"aGVsbG8="}"#,
            r#"{"file":"!!!not base64!!!"}"#,
        ] {
            let req = inbound(Some("application/json"), body);
            assert!(Base64JsonExtractor.extract(&req, "file").await.is_none(), "{body}");
        }
    }

    #[test]
    fn only_json_requests_are_supported() {
        assert!(!Base64JsonExtractor.supports(&inbound(Some("text/plain"), ""), "file"));
        assert!(!Base64JsonExtractor.supports(&inbound(None, ""), "file"));
    }
}
