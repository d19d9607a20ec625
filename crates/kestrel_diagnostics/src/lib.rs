//! Diagnostics for the Kestrel legalization core.
//!
//! Legalizers report informational and warning messages through a
//! [`DiagnosticSink`]. A [`Diagnostic`] carries the names of the cell, site,
//! and tile involved so a message can be traced back to the design and the
//! device; message text itself is not a stability contract. Fatal errors are
//! not diagnostics; they abort the pass through the legalizer's `Result`.

#![warn(missing_docs)]

pub mod diagnostic;
pub mod severity;
pub mod sink;

pub use diagnostic::Diagnostic;
pub use severity::Severity;
pub use sink::DiagnosticSink;
