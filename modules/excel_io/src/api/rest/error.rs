use routekit::Problem;

use crate::domain::error::InterchangeError;

/// Convert interchange errors to HTTP Problem responses
pub fn interchange_error_to_problem(err: InterchangeError) -> Problem {
    let code = err.kind();
    let problem = match err {
        InterchangeError::Decode { message, source } => Problem::new(
            422,
            "Unreadable Spreadsheet",
            format!("{message}: {source:#}"),
        ),

        InterchangeError::Encode { message, source } => Problem::new(
            500,
            "Export Failed",
            format!("{message}: {source:#}"),
        ),

        InterchangeError::ContractViolation(message) => {
            Problem::new(500, "Contract Violation", message)
        }

        InterchangeError::PayloadTooLarge { limit, actual } => Problem::new(
            413,
            "Payload Too Large",
            match actual {
                Some(n) => format!("Upload of {n} bytes exceeds the limit of {limit} bytes"),
                None => format!("Upload exceeds the limit of {limit} bytes"),
            },
        ),

        InterchangeError::MissingRequiredInput { field } => Problem::new(
            400,
            "Missing Upload",
            format!("Required file field '{field}' is missing"),
        ),

        // the handler already chose its status
        InterchangeError::Handler(problem) => return problem,
    };
    problem.with_code(code)
}

impl From<InterchangeError> for Problem {
    fn from(e: InterchangeError) -> Self {
        interchange_error_to_problem(e)
    }
}
