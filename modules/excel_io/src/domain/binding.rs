//! Declarative export/import bindings attached to operations at registration time.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Query, RawPathParams};
use futures::future::BoxFuture;
use http::request::Parts;
use http::{HeaderMap, Method, Uri};
use routekit::Problem;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::domain::error::InterchangeError;
use crate::domain::record::{RecordSchema, Tabular};

pub const DEFAULT_PROCESSOR: &str = "default";
pub const DEFAULT_READER: &str = "default";

/// Export binding of one handler.
#[derive(Debug, Clone)]
pub struct ExportSpec {
    /// Explicit derived path; `None` means `<original>/export`.
    pub path: Option<String>,
    /// File name stem; `None` uses the configured default.
    pub file_name: Option<String>,
    /// Sheet label; `None` uses the configured default.
    pub sheet_name: Option<String>,
    pub schema: RecordSchema,
    /// Id of the export processor.
    pub processor: String,
    /// When false the handler is not called and the processor gets an empty list.
    pub reuse_handler: bool,
    /// Run the export on the async dispatcher and answer `202 Accepted`.
    pub asynchronous: bool,
}

impl ExportSpec {
    pub fn of<T: Tabular>() -> Self {
        Self::with_schema(T::schema())
    }

    pub fn with_schema(schema: RecordSchema) -> Self {
        Self {
            path: None,
            file_name: None,
            sheet_name: None,
            schema,
            processor: DEFAULT_PROCESSOR.to_string(),
            reuse_handler: true,
            asynchronous: false,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    pub fn processor(mut self, id: impl Into<String>) -> Self {
        self.processor = id.into();
        self
    }

    pub fn reuse_handler(mut self, reuse: bool) -> Self {
        self.reuse_handler = reuse;
        self
    }

    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }
}

/// Import binding of one handler parameter.
#[derive(Debug, Clone)]
pub struct ImportSpec {
    /// Form field (multipart) or JSON member (base64) holding the file.
    pub field: String,
    pub schema: RecordSchema,
    pub required: bool,
    /// Id of the sheet reader.
    pub reader: String,
    /// Extractor ids to try, in order; empty means the global chain.
    pub extractors: Vec<String>,
}

impl ImportSpec {
    pub fn of<T: Tabular>() -> Self {
        Self::with_schema(T::schema())
    }

    pub fn with_schema(schema: RecordSchema) -> Self {
        Self {
            field: "file".to_string(),
            schema,
            required: true,
            reader: DEFAULT_READER.to_string(),
            extractors: Vec::new(),
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn reader(mut self, id: impl Into<String>) -> Self {
        self.reader = id.into();
        self
    }

    pub fn extractor(mut self, id: impl Into<String>) -> Self {
        self.extractors.push(id.into());
        self
    }
}

/// What an import parameter wants from the materializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Decoded records.
    Records,
    /// The uploaded bytes, undecoded.
    Raw,
}

/// Request data captured for a data handler, so it can be called again outside the request.
#[derive(Debug, Clone)]
pub struct RequestArgs {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    path_params: Vec<(String, String)>,
}

impl RequestArgs {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            path_params: Vec::new(),
        }
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push((name.into(), value.into()));
        self
    }

    pub async fn capture(parts: &mut Parts) -> Self {
        let path_params = RawPathParams::from_request_parts(parts, &())
            .await
            .map(|params| {
                params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            path_params,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Deserialize the query string.
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, Problem> {
        Query::<T>::try_from_uri(&self.uri)
            .map(|Query(q)| q)
            .map_err(|e| routekit::bad_request(e.body_text()))
    }
}

impl<S> FromRequestParts<S> for RequestArgs
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::capture(parts).await)
    }
}

/// A data handler turned into a first-class value: captured request in, JSON result out.
pub type DataHandler =
    Arc<dyn Fn(RequestArgs) -> BoxFuture<'static, Result<Value, InterchangeError>> + Send + Sync>;

/// Box a typed handler into a [`DataHandler`].
pub fn data_handler<F, Fut, R>(handler: F) -> DataHandler
where
    F: Fn(RequestArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Problem>> + Send + 'static,
    R: Serialize,
{
    Arc::new(move |args| {
        let fut = handler(args);
        Box::pin(async move {
            let result = fut.await.map_err(InterchangeError::Handler)?;
            serde_json::to_value(result).map_err(|e| {
                InterchangeError::contract(format!("handler result is not serializable: {e}"))
            })
        })
    })
}

/// Export binding plus the handler it re-invokes; attached to the operation.
#[derive(Clone)]
pub struct ExportBinding {
    spec: Arc<ExportSpec>,
    handler: DataHandler,
}

impl ExportBinding {
    pub fn new(spec: ExportSpec, handler: DataHandler) -> Self {
        Self {
            spec: Arc::new(spec),
            handler,
        }
    }

    pub fn spec(&self) -> &ExportSpec {
        &self.spec
    }

    pub async fn invoke(&self, args: RequestArgs) -> Result<Value, InterchangeError> {
        (self.handler)(args).await
    }
}

impl std::fmt::Debug for ExportBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportBinding")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}
