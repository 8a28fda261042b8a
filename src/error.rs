//! Error types for the resume editor.
//!
//! This module defines all error types that can occur during PDF parsing,
//! font/CMap handling, and content-stream patching.

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during processing.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Unsupported PDF version
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Parse warning (non-fatal)
    #[error("Parse warning at byte {offset}: {message}")]
    ParseWarning {
        /// Byte offset where warning occurred
        offset: usize,
        /// Warning message
        message: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error
    #[error("UTF-8 decoding error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Input PDF is encrypted; unsupported
    #[error("Encrypted PDF is not supported")]
    EncryptedPdf,

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Font error (generic dictionary parsing failure)
    #[error("Font error: {0}")]
    Font(String),

    /// Font has no usable encoding (no ToUnicode, no standard encoding)
    #[error("Font {0} has no usable encoding")]
    UnsupportedFont(String),

    /// Replacement text contains a character absent from the target font
    #[error("Character {0:?} is not covered by font {1}")]
    UnmappableGlyph(char, String),

    /// Measured width of a replacement exceeds its line's glyph-space budget
    #[error("Measured width {measured:.2} exceeds budget {budget:.2}")]
    BudgetExceeded {
        /// Measured width of the replacement, in user-space units
        measured: f32,
        /// Width budget available for the line
        budget: f32,
    },

    /// No content-block sequence decodes to the expected original text
    #[error("No content block sequence matches target text {0:?}")]
    MatchFailed(String),

    /// A match would cross a protected content run (date/email/location)
    #[error("Match would cross a protected boundary at block {0}")]
    ProtectedBoundary(usize),

    /// Parse or rewrite error on a content stream
    #[error("Content stream patch failed: {0}")]
    StreamPatchFailed(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(crate::object::ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_error() {
        let err = Error::InvalidHeader("NotAPDF".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid PDF header"));
        assert!(msg.contains("NotAPDF"));
    }

    #[test]
    fn test_object_not_found_error() {
        let err = Error::ObjectNotFound(10, 0);
        let msg = format!("{}", err);
        assert!(msg.contains("10 0 R"));
    }

    #[test]
    fn test_budget_exceeded_error() {
        let err = Error::BudgetExceeded {
            measured: 220.0,
            budget: 180.0,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("220"));
        assert!(msg.contains("180"));
    }

    #[test]
    fn test_unmappable_glyph_error() {
        let err = Error::UnmappableGlyph('日', "Helvetica".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Helvetica"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
