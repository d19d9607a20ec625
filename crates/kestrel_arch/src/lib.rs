//! Target-architecture facts for the Kestrel legalization core.
//!
//! Legalization consumes the physical device as a read-only service: tile and
//! site geometry through the [`DeviceGeometry`] trait, plus the small set of
//! per-family constants (cluster heights, BEL slot encoding) the packers need
//! to emit placement constraints. The full device database, placement, and
//! routing live elsewhere in the flow.

#![warn(missing_docs)]

pub mod bels;
pub mod geom;

pub use geom::{DeviceGeometry, Site, StaticGeometry, Tile};

use serde::{Deserialize, Serialize};

/// The device family being legalized for.
///
/// The families share the generalized clock-control and LUT-memory BELs but
/// differ in how many memory slots a slice stacks.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Family {
    /// 7-series style fabric: 4 LUT-memory slots per slice.
    Series7,
    /// UltraScale style fabric: 8 LUT-memory slots per slice.
    UltraScale,
}

impl Family {
    /// Number of stacked LUT-memory slots in one slice cluster.
    pub fn dram_height(self) -> i32 {
        match self {
            Family::Series7 => 4,
            Family::UltraScale => 8,
        }
    }

    /// Base slot of the four fixed banks of a whole-slice memory primitive.
    pub fn banked_dram_zoffset(self) -> i32 {
        match self {
            Family::Series7 => 0,
            Family::UltraScale => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_heights() {
        assert_eq!(Family::Series7.dram_height(), 4);
        assert_eq!(Family::UltraScale.dram_height(), 8);
    }

    #[test]
    fn banked_offsets() {
        assert_eq!(Family::Series7.banked_dram_zoffset(), 0);
        assert_eq!(Family::UltraScale.banked_dram_zoffset(), 4);
    }
}
