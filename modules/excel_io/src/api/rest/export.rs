//! Export binding on the operation builder and the endpoint that serves it.

use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use routekit::api::{Endpoint, Missing, OperationBuilder, Present};
use routekit::Problem;
use serde::Serialize;

use crate::domain::binding::{data_handler, ExportBinding, ExportSpec, RequestArgs};
use crate::domain::dispatcher::ExportTask;
use crate::domain::export::run_export;
use crate::domain::intercept::ExportInvocation;
use crate::domain::runtime::InterchangeRuntime;
use crate::domain::sink::ResponseSink;

/// Declare an operation whose data can also be downloaded as a spreadsheet.
///
/// ```rust,ignore
/// OperationBuilder::get("/users")
///     .export_handler(ExportSpec::of::<UserDto>().file_name("users"), list_users)
///     .json_response(200, "Users")
///     .register(&mut routes)?;
/// ```
///
/// The handler serves the operation itself as JSON. Once `excel_io` has
/// finalized the route table, a GET on the derived path runs the same handler
/// and returns its records as an attachment.
pub trait OperationBuilderExportExt<R> {
    fn export_handler<F, Fut, T>(self, spec: ExportSpec, handler: F) -> OperationBuilder<Present, R>
    where
        F: Fn(RequestArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Problem>> + Send + 'static,
        T: Serialize;
}

impl<R> OperationBuilderExportExt<R> for OperationBuilder<Missing, R> {
    fn export_handler<F, Fut, T>(self, spec: ExportSpec, handler: F) -> OperationBuilder<Present, R>
    where
        F: Fn(RequestArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Problem>> + Send + 'static,
        T: Serialize,
    {
        let binding = ExportBinding::new(spec, data_handler(handler));
        let served = binding.clone();
        self.attach(binding)
            .endpoint(Endpoint::from_fn(move |filter| {
                let binding = served.clone();
                axum::routing::on(filter, move |req: Request| serve(binding.clone(), req))
            }))
    }
}

async fn serve(binding: ExportBinding, req: Request) -> Response {
    let runtime = req.extensions().get::<Arc<InterchangeRuntime>>().cloned();
    let invocation = req.extensions().get::<ExportInvocation>().cloned();

    match (runtime, invocation) {
        (Some(runtime), Some(ExportInvocation { args })) => export(runtime, binding, args).await,
        (runtime, _) => {
            let (mut parts, _body) = req.into_parts();
            let args = RequestArgs::capture(&mut parts).await;
            render(runtime, &binding, args).await
        }
    }
}

/// Normal rendering: the handler result as JSON, in the registered envelope.
async fn render(
    runtime: Option<Arc<InterchangeRuntime>>,
    binding: &ExportBinding,
    args: RequestArgs,
) -> Response {
    match binding.invoke(args).await {
        Ok(value) => {
            let value = match runtime {
                Some(rt) => rt.wrappers().wrap_result(value),
                None => value,
            };
            Json(value).into_response()
        }
        Err(e) => Problem::from(e).into_response(),
    }
}

#[tracing::instrument(
    name = "excel_io.export",
    skip_all,
    fields(uri = %args.uri(), asynchronous = binding.spec().asynchronous)
)]
async fn export(runtime: Arc<InterchangeRuntime>, binding: ExportBinding, args: RequestArgs) -> Response {
    if binding.spec().asynchronous {
        let label = args.uri().path().to_string();
        let task_runtime = runtime.clone();
        let task: ExportTask = Box::pin(async move {
            let mut sink = ResponseSink::detached(label);
            run_export(&task_runtime, &binding, args, &mut sink)
                .await
                .map(|_| ())
        });
        let submission = runtime.dispatcher().submit(task).await;
        tracing::info!(?submission, "Async export accepted");
        return StatusCode::ACCEPTED.into_response();
    }

    let mut sink = ResponseSink::for_response();
    match run_export(&runtime, &binding, args, &mut sink).await {
        Ok(records) => {
            tracing::debug!(records, "Export served");
            sink.into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, kind = e.kind(), "Export failed");
            Problem::from(e).into_response()
        }
    }
}
