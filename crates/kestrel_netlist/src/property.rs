//! Typed parameter and attribute values.

use kestrel_common::BitVec;
use serde::{Deserialize, Serialize};

/// A typed parameter value attached to a cell.
///
/// Parameters configure a primitive (INIT truth tables, clock inversion
/// flags, divide ratios); attributes carry non-functional annotations such as
/// placement hints. Both use this type.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Property {
    /// A boolean flag.
    Bool(bool),
    /// A plain integer.
    Int(i64),
    /// A string-valued setting (e.g. `COMPENSATION = "INTERNAL"`).
    Str(String),
    /// An ordered bit vector (e.g. an INIT truth table), LSB first.
    Bits(BitVec),
}

impl Property {
    /// Returns the value as an integer, if it has an integer reading.
    ///
    /// Booleans read as 0/1 and bit vectors as their low 64 bits; strings
    /// have no integer reading.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Property::Bool(b) => Some(*b as i64),
            Property::Int(v) => Some(*v),
            Property::Str(_) => None,
            Property::Bits(b) => Some(b.as_u64() as i64),
        }
    }

    /// Returns the value as a string slice, if it is string-valued.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a bit vector of exactly `width` bits.
    ///
    /// Integer values are converted from their low bits; bit vectors are
    /// zero-extended or truncated to `width`. Strings and booleans have no
    /// bit-vector reading.
    pub fn to_bits(&self, width: u32) -> Option<BitVec> {
        match self {
            Property::Int(v) => Some(BitVec::from_u64(*v as u64, width)),
            Property::Bits(b) if b.width() == width => Some(b.clone()),
            Property::Bits(b) if b.width() < width => Some(b.zero_extend(width)),
            Property::Bits(b) => Some(b.extract(0, width)),
            _ => None,
        }
    }

    /// Extracts a contiguous sub-range of a bit-vector value as a new
    /// `Property::Bits`. Integer values are widened first so that e.g. a
    /// numeric INIT can still be sliced.
    pub fn extract(&self, offset: u32, len: u32) -> Option<Property> {
        let bits = self.to_bits(offset + len)?;
        Some(Property::Bits(bits.extract(offset, len)))
    }
}

impl From<bool> for Property {
    fn from(v: bool) -> Self {
        Property::Bool(v)
    }
}

impl From<i64> for Property {
    fn from(v: i64) -> Self {
        Property::Int(v)
    }
}

impl From<&str> for Property {
    fn from(v: &str) -> Self {
        Property::Str(v.to_string())
    }
}

impl From<BitVec> for Property {
    fn from(v: BitVec) -> Self {
        Property::Bits(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_readings() {
        assert_eq!(Property::Bool(true).as_int(), Some(1));
        assert_eq!(Property::Int(42).as_int(), Some(42));
        assert_eq!(Property::from("SYNC").as_int(), None);
        assert_eq!(
            Property::Bits(BitVec::from_u64(0b101, 3)).as_int(),
            Some(5)
        );
    }

    #[test]
    fn str_reading() {
        assert_eq!(Property::from("INTERNAL").as_str(), Some("INTERNAL"));
        assert_eq!(Property::Int(1).as_str(), None);
    }

    #[test]
    fn to_bits_from_int() {
        let bits = Property::Int(0xAB).to_bits(8).unwrap();
        assert_eq!(bits.as_u64(), 0xAB);
        assert_eq!(bits.width(), 8);
    }

    #[test]
    fn to_bits_extends_and_truncates() {
        let p = Property::Bits(BitVec::from_u64(0xF, 4));
        assert_eq!(p.to_bits(8).unwrap().as_u64(), 0xF);
        assert_eq!(p.to_bits(2).unwrap().as_u64(), 0x3);
    }

    #[test]
    fn extract_slices_init() {
        let mut init = BitVec::new(128);
        init.set(64, true);
        init.set(127, true);
        let p = Property::Bits(init);
        let high = p.extract(64, 64).unwrap();
        match high {
            Property::Bits(b) => {
                assert!(b.get(0));
                assert!(b.get(63));
                assert_eq!(b.width(), 64);
            }
            _ => panic!("extract must produce bits"),
        }
    }

    #[test]
    fn extract_from_int() {
        let p = Property::Int(0b1100);
        let hi = p.extract(2, 2).unwrap();
        assert_eq!(hi.as_int(), Some(0b11));
    }

    #[test]
    fn json_round_trip() {
        let props = vec![
            Property::Bool(true),
            Property::Int(-7),
            Property::from("ASYNC"),
            Property::Bits(BitVec::from_u64(0xDEAD, 16)),
        ];
        let json = serde_json::to_string(&props).unwrap();
        let back: Vec<Property> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, props);
    }
}
