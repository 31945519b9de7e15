//! One export run: call the data handler, unwrap its envelope, hand the records to a processor.

use serde_json::Value;

use crate::domain::binding::{ExportBinding, RequestArgs};
use crate::domain::error::InterchangeError;
use crate::domain::processor::ExportJob;
use crate::domain::runtime::InterchangeRuntime;
use crate::domain::sink::ResponseSink;

/// Run the export described by `binding` into `sink`; returns the number of records exported.
pub async fn run_export(
    runtime: &InterchangeRuntime,
    binding: &ExportBinding,
    args: RequestArgs,
    sink: &mut ResponseSink,
) -> Result<usize, InterchangeError> {
    let spec = binding.spec();

    let records = if spec.reuse_handler {
        let result = binding.invoke(args).await?;
        records_of(runtime.wrappers().unwrap_result(result))?
    } else {
        Vec::new()
    };

    let processor = runtime.processor(&spec.processor).ok_or_else(|| {
        InterchangeError::contract(format!("no export processor registered as '{}'", spec.processor))
    })?;

    let config = runtime.config();
    let job = ExportJob {
        file_name: non_empty(spec.file_name.as_deref(), &config.default_file_name),
        sheet_name: non_empty(spec.sheet_name.as_deref(), &config.default_sheet_name),
        schema: spec.schema.clone(),
    };

    let count = records.len();
    tracing::debug!(
        processor = processor.id(),
        file = %job.file_name,
        records = count,
        "Running export"
    );
    processor
        .process(&job, records, sink)
        .await
        .map_err(|e| InterchangeError::encode(format!("export '{}' failed", job.file_name), e))?;
    Ok(count)
}

/// A data handler must produce a list; an absent result counts as an empty one.
fn records_of(payload: Value) -> Result<Vec<Value>, InterchangeError> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Null => {
            tracing::debug!("Export handler returned no data; exporting an empty sheet");
            Ok(Vec::new())
        }
        other => Err(InterchangeError::contract(format!(
            "export handler must return a list, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn non_empty(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}
