//! Error types for the PDF engine.
//!
//! Every failure inside the reader, the page operations, the encryption module and
//! the writer is one of the variants below. The engine facade maps them onto a
//! stable [`ErrorCode`] plus an HTTP-style status so callers never see internal
//! parse state.

use serde::Serialize;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while transforming a PDF.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Input bytes are not a parseable PDF (broken xref, truncated stream, bad nesting...)
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// The document uses a security handler or algorithm this engine does not implement
    #[error("Unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    /// Neither the user nor the owner password check accepted the password
    #[error("Incorrect password")]
    IncorrectPassword,

    /// A page index or range bound lies outside the document
    #[error("Page index {index} out of range (document has {count} pages)")]
    PageIndexOutOfRange {
        /// Offending index as supplied by the caller
        index: usize,
        /// Number of pages in the document
        count: usize,
    },

    /// A reorder request is not a bijection over the page indices
    #[error("Invalid page permutation: {0}")]
    InvalidPermutation(String),

    /// An operation parameter is out of its allowed domain (rotation, opacity...)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Required input is missing or unusable (empty file list, bad JSON field...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The caller aborted the operation between page-level steps
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error (CLI and archive output)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding failed
    #[error("Image error: {0}")]
    Image(String),

    /// Zip bundling failed
    #[error("Archive error: {0}")]
    Zip(String),
}

impl Error {
    /// Shorthand used throughout the reader.
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedDocument(msg.into())
    }

    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::MalformedDocument(_) => ErrorCode::MalformedDocument,
            Error::UnsupportedEncryption(_) => ErrorCode::UnsupportedEncryption,
            Error::IncorrectPassword => ErrorCode::IncorrectPassword,
            Error::PageIndexOutOfRange { .. } => ErrorCode::PageIndexOutOfRange,
            Error::InvalidPermutation(_) => ErrorCode::InvalidPermutation,
            Error::InvalidParameter(_) => ErrorCode::InvalidParameter,
            Error::InvalidInput(_) | Error::Image(_) => ErrorCode::InvalidInput,
            Error::Cancelled => ErrorCode::Cancelled,
            Error::Io(_) | Error::Zip(_) => ErrorCode::Internal,
        }
    }

    /// Short message safe to hand to an end user.
    ///
    /// Internal failures collapse to a generic message.
    pub fn public_message(&self) -> String {
        match self.code() {
            ErrorCode::Internal => "Internal error while processing the document".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Stable error codes exposed by the engine facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Unparseable input
    MalformedDocument,
    /// Unknown security handler
    UnsupportedEncryption,
    /// Wrong password for unlock
    IncorrectPassword,
    /// Page index or range outside the document
    PageIndexOutOfRange,
    /// Non-bijective reorder
    InvalidPermutation,
    /// Bad rotation, opacity, ...
    InvalidParameter,
    /// Missing or unusable input
    InvalidInput,
    /// Aborted by the caller
    Cancelled,
    /// Anything else
    Internal,
}

impl ErrorCode {
    /// Code as written in error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MalformedDocument => "MALFORMED_DOCUMENT",
            ErrorCode::UnsupportedEncryption => "UNSUPPORTED_ENCRYPTION",
            ErrorCode::IncorrectPassword => "INCORRECT_PASSWORD",
            ErrorCode::PageIndexOutOfRange => "PAGE_INDEX_OUT_OF_RANGE",
            ErrorCode::InvalidPermutation => "INVALID_PERMUTATION",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// HTTP status equivalent.
    ///
    /// Wrong passwords are 401 so clients can prompt again instead of giving up.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::IncorrectPassword => 401,
            ErrorCode::Internal => 500,
            _ => 400,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON error body returned to route handlers: `{ "error": ..., "code": ... }`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
    /// Stable code
    pub code: ErrorCode,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            error: err.public_message(),
            code: err.code(),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Zip(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_error_message() {
        let err = Error::malformed("xref not found");
        let msg = format!("{}", err);
        assert!(msg.contains("Malformed document"));
        assert!(msg.contains("xref not found"));
    }

    #[test]
    fn test_page_index_error_message() {
        let err = Error::PageIndexOutOfRange { index: 12, count: 10 };
        let msg = format!("{}", err);
        assert!(msg.contains("12"));
        assert!(msg.contains("10 pages"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::IncorrectPassword.code().http_status(), 401);
        assert_eq!(Error::InvalidInput("no files".into()).code().http_status(), 400);
        assert_eq!(Error::InvalidPermutation("dup".into()).code().http_status(), 400);
        assert_eq!(Error::malformed("x").code().http_status(), 400);
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(io.code().http_status(), 500);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "secret path /tmp/x"));
        assert!(!io.public_message().contains("/tmp/x"));
    }

    #[test]
    fn test_error_body_json() {
        let body = ErrorBody::from(&Error::IncorrectPassword);
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"error":"Incorrect password","code":"INCORRECT_PASSWORD"}"#);
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
