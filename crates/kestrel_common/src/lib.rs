//! Shared foundational types for the Kestrel legalization core.
//!
//! This crate provides interned identifiers, packed bit vectors for LUT
//! initialization data, and the common result type used for internal
//! invariant violations.

#![warn(missing_docs)]

pub mod bits;
pub mod ident;
pub mod result;

pub use bits::BitVec;
pub use ident::{Ident, Interner};
pub use result::{InternalError, KestrelResult};
