//! Interned identifiers for cheap cloning and O(1) equality comparison.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};

/// A unique identifier for any named entity in the netlist.
///
/// Cell names, net names, port names, cell types, and parameter keys are all
/// interned strings represented as a `u32` index into an [`Interner`]. This
/// makes the name-keyed maps on every cell cheap to build and compare.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// Creates an `Ident` from a raw `u32` index.
    ///
    /// Intended for deserialization and testing; normal code obtains idents
    /// through [`Interner::id`].
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index of this identifier.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: `Ident` wraps a `u32`, which always fits in a `usize` on the
// platforms we support. `try_from_usize` rejects anything wider.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// String interner shared by a whole legalization session.
///
/// Interning deduplicates the very repetitive port/parameter vocabulary of a
/// netlist (`A0`..`A5`, `INIT`, `WCLK`, ...) and gives the graph stable,
/// copyable keys.
pub struct Interner {
    rodeo: ThreadedRodeo<Ident>,
}

impl Interner {
    /// Creates a new empty interner.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Interns a string, returning its [`Ident`]. Re-interning an existing
    /// string returns the same identifier without allocating.
    pub fn id(&self, s: &str) -> Ident {
        self.rodeo.get_or_intern(s)
    }

    /// Returns the ident for `s` only if it has already been interned.
    pub fn get(&self, s: &str) -> Option<Ident> {
        self.rodeo.get(s)
    }

    /// Resolves an [`Ident`] back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if the `Ident` was not created by this interner.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.rodeo.resolve(&ident)
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_string_same_ident() {
        let interner = Interner::new();
        let a = interner.id("WCLK");
        let b = interner.id("WCLK");
        assert_eq!(a, b);
    }

    #[test]
    fn different_strings_differ() {
        let interner = Interner::new();
        assert_ne!(interner.id("A0"), interner.id("A1"));
    }

    #[test]
    fn resolve_roundtrip() {
        let interner = Interner::new();
        let id = interner.id("RAMD64E");
        assert_eq!(interner.resolve(id), "RAMD64E");
    }

    #[test]
    fn get_without_interning() {
        let interner = Interner::new();
        assert!(interner.get("INIT").is_none());
        let id = interner.id("INIT");
        assert_eq!(interner.get("INIT"), Some(id));
    }

    #[test]
    fn raw_roundtrip() {
        let id = Ident::from_raw(7);
        assert_eq!(id.as_raw(), 7);
    }
}
