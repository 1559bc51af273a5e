//! Layout errors

use thiserror::Error;

/// Failure to decode, encode, or declare a record layout
///
/// Always fatal to the call that produced it; the codec never retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("{schema}: buffer is {actual} bytes, layout requires {expected}")]
    BufferLength {
        schema: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{schema}: descriptors cover {actual} bytes but {declared} were declared")]
    DeclaredLength {
        schema: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("{schema}: invalid descriptor for `{field}`: {reason}")]
    InvalidDescriptor {
        schema: &'static str,
        field: String,
        reason: &'static str,
    },

    #[error("field `{0}` is missing")]
    MissingField(String),

    #[error("{schema}: field `{field}` is not part of the layout")]
    UnexpectedField { schema: &'static str, field: String },

    #[error("field `{field}` does not hold {expected}")]
    TypeMismatch { field: String, expected: &'static str },

    #[error("field `{field}` value does not fit in {width} bytes")]
    ValueOutOfRange { field: String, width: usize },

    #[error("field `{field}` expects {expected} bytes, got {actual}")]
    BlobWidth {
        field: String,
        expected: usize,
        actual: usize,
    },
}
