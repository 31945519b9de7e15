use routekit::Problem;
use thiserror::Error;

/// Failures of the spreadsheet interchange: decoding uploads, encoding
/// exports, and the contracts between handlers and the interchange layer.
#[derive(Error, Debug)]
pub enum InterchangeError {
    #[error("failed to decode spreadsheet: {message}")]
    Decode {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to encode spreadsheet: {message}")]
    Encode {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("payload exceeds the limit of {limit} bytes")]
    PayloadTooLarge { limit: u64, actual: Option<u64> },

    #[error("required import field '{field}' is missing")]
    MissingRequiredInput { field: String },

    #[error("data handler failed: {0}")]
    Handler(Problem),
}

impl InterchangeError {
    pub fn decode(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Decode {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn encode(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Encode {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation(message.into())
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingRequiredInput {
            field: field.into(),
        }
    }

    /// Stable machine-readable discriminator, also used as the Problem `code`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode_failure",
            Self::Encode { .. } => "encode_failure",
            Self::ContractViolation(_) => "contract_violation",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::MissingRequiredInput { .. } => "missing_required_input",
            Self::Handler(_) => "handler_failed",
        }
    }
}
