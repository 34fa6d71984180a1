//! Shared error type across rgoose crates.

use thiserror::Error;

/// Stable error codes (used in JSON output and metrics labels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid input / malformed request.
    BadRequest,
    /// Buffer does not carry an R-GOOSE SPDU.
    NotRgoose,
    /// Unsupported config or protocol version.
    UnsupportedVersion,
    /// A declared length ran past the captured bytes.
    Malformed,
    /// The PDU decoder made no progress.
    ZeroLengthPdu,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in JSON output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::NotRgoose => "NOT_RGOOSE",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Malformed => "MALFORMED",
            ErrorCode::ZeroLengthPdu => "ZERO_LENGTH_PDU",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RgooseError>;

/// Unified error type used by core and tap.
#[derive(Debug, Error)]
pub enum RgooseError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not an R-GOOSE frame")]
    NotRgoose,
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("malformed frame at offset {offset}: {detail}")]
    Malformed { offset: usize, detail: String },
    #[error("zero-byte GOOSE PDU at offset {0}")]
    ZeroLengthPdu(usize),
    #[error("internal: {0}")]
    Internal(String),
}

impl RgooseError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            RgooseError::BadRequest(_) => ErrorCode::BadRequest,
            RgooseError::NotRgoose => ErrorCode::NotRgoose,
            RgooseError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            RgooseError::Malformed { .. } => ErrorCode::Malformed,
            RgooseError::ZeroLengthPdu(_) => ErrorCode::ZeroLengthPdu,
            RgooseError::Internal(_) => ErrorCode::Internal,
        }
    }
}
