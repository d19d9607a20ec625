//! Severity levels for legalization diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity of a [`Diagnostic`](crate::Diagnostic).
///
/// Legalization either succeeds or aborts; diagnostics therefore only carry
/// the non-fatal levels.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// Progress or traceability information.
    Info,
    /// A structurally atypical but legalizable construct.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        assert!(Severity::Info < Severity::Warning);
    }

    #[test]
    fn display() {
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
