//! BEL slot encoding for slice-packed primitives.
//!
//! A slice stacks several BELs per logical slot: the wide 6-input LUT, the
//! narrow 5-input LUT beneath it, and the intra-slice selection muxes. A
//! packed cell's z-constraint encodes both the slot index and which BEL
//! inside the slot it occupies.

/// The 6-input LUT BEL of a slot.
pub const BEL_6LUT: i32 = 0;
/// The 5-input LUT BEL of a slot (secondary output).
pub const BEL_5LUT: i32 = 1;
/// The first-level selection mux between two adjacent LUT slots.
pub const BEL_F7MUX: i32 = 2;
/// The second-level selection mux combining two first-level muxes.
pub const BEL_F8MUX: i32 = 3;
/// The third-level selection mux (wide fabrics only).
pub const BEL_F9MUX: i32 = 4;

/// Encodes a slot index and BEL into a cell z-constraint.
pub fn slot_z(slot: i32, bel: i32) -> i32 {
    (slot << 4) | bel
}

/// Extracts the slot index from an encoded z-constraint.
pub fn z_slot(z: i32) -> i32 {
    z >> 4
}

/// Extracts the BEL from an encoded z-constraint.
pub fn z_bel(z: i32) -> i32 {
    z & 0xF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        let z = slot_z(3, BEL_5LUT);
        assert_eq!(z_slot(z), 3);
        assert_eq!(z_bel(z), BEL_5LUT);
    }

    #[test]
    fn slots_are_disjoint() {
        assert_ne!(slot_z(0, BEL_6LUT), slot_z(0, BEL_5LUT));
        assert_ne!(slot_z(0, BEL_6LUT), slot_z(1, BEL_6LUT));
    }
}
