//! Common result and error types for the Kestrel legalization core.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates an unrecoverable internal error (a bug in Kestrel's
/// legalization rules), not a problem with the input design. User-facing
/// configuration errors carry their own types in the crates that detect them.
pub type KestrelResult<T> = Result<T, InternalError>;

/// An internal invariant violation indicating a bug in Kestrel.
///
/// A recognized cell type reaching a dispatch branch with an unexpected shape
/// is the canonical example: the legalization rules, not the input netlist,
/// are at fault.
#[derive(Debug, thiserror::Error)]
#[error("internal legalizer error: {message}")]
pub struct InternalError {
    /// Description of the violated invariant.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("bad dispatch");
        assert_eq!(format!("{err}"), "internal legalizer error: bad dispatch");
    }

    #[test]
    fn from_string() {
        let err: InternalError = "oops".to_string().into();
        assert_eq!(err.message, "oops");
    }
}
