//! Error types for the legalization passes.

use kestrel_common::InternalError;

/// The result type of every legalization pass.
pub type LegalizeResult<T> = Result<T, LegalizeError>;

/// A fatal error that aborts legalization.
///
/// Warnings and progress notes go through the diagnostic sink instead; an
/// `Err` from a pass means the run cannot continue.
#[derive(Debug, thiserror::Error)]
pub enum LegalizeError {
    /// The input design asks for something the target fabric cannot realize,
    /// or references device resources that do not exist.
    #[error("{0}")]
    Config(String),
    /// An internal invariant was violated; a bug in the legalization rules
    /// rather than in the input design.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl LegalizeError {
    /// Creates a configuration error from a formatted message.
    pub fn config(message: impl Into<String>) -> Self {
        LegalizeError::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_displays_message_verbatim() {
        let err = LegalizeError::config("failed to find GTP/GTX site for IPAD_X0Y2/PAD");
        assert_eq!(
            err.to_string(),
            "failed to find GTP/GTX site for IPAD_X0Y2/PAD"
        );
    }

    #[test]
    fn internal_wraps_transparently() {
        let err: LegalizeError = InternalError::new("unexpected memory type").into();
        assert_eq!(
            err.to_string(),
            "internal legalizer error: unexpected memory type"
        );
    }
}
