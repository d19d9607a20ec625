//! Cells, ports, and placement-constraint records.

use crate::arena::{CellId, NetId};
use crate::property::Property;
use kestrel_common::Ident;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The direction of a port: a sink (input) or the net's driver (output).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PortDir {
    /// A sink: the port observes the connected net.
    Input,
    /// A source: the port drives the connected net.
    Output,
}

/// A reference to one port of one cell, stored on the net side.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PortRef {
    /// The cell owning the port.
    pub cell: CellId,
    /// The port's name on that cell.
    pub port: Ident,
}

/// A single port of a cell: a direction and at most one connected net.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Port {
    /// The port's name.
    pub name: Ident,
    /// Whether the port sinks or drives its net.
    pub dir: PortDir,
    /// The connected net, if any.
    pub net: Option<NetId>,
}

/// Relative-placement constraints binding a cell into a cluster.
///
/// A constrained cell declares itself a child of a base cell at a relative
/// (dx, dy) offset (always (0, 0) for the clusters built here) and a
/// stacking slot. The base cell owns the ordered list of its children.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClusterConstraint {
    /// The base cell this cell is constrained to, if any.
    pub parent: Option<CellId>,
    /// Cells constrained to this cell (only set on cluster bases).
    pub children: Vec<CellId>,
    /// The stacking slot, encoded as `(slot << 4) | bel` for slice BELs.
    pub z: Option<i32>,
    /// Whether `z` is an absolute slot index rather than relative to the parent.
    pub abs_z: bool,
    /// Tile-relative x offset from the parent.
    pub dx: i32,
    /// Tile-relative y offset from the parent.
    pub dy: i32,
}

/// An instance of a primitive type in the netlist.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cell {
    /// The cell's unique name.
    pub name: Ident,
    /// The primitive type tag (generic before legalization, BEL after).
    pub ty: Ident,
    /// Ports by name.
    pub ports: HashMap<Ident, Port>,
    /// Functional parameters by name.
    pub params: HashMap<Ident, Property>,
    /// Non-functional annotations (placement hints, resolved BELs) by name.
    pub attrs: HashMap<Ident, Property>,
    /// Cluster placement constraints.
    pub constr: ClusterConstraint,
}

impl Cell {
    /// Creates a cell with no ports, parameters, or constraints.
    pub fn new(name: Ident, ty: Ident) -> Self {
        Self {
            name,
            ty,
            ports: HashMap::new(),
            params: HashMap::new(),
            attrs: HashMap::new(),
            constr: ClusterConstraint::default(),
        }
    }

    /// Returns the net connected to `port`, if the port exists and is wired.
    pub fn port_net(&self, port: Ident) -> Option<NetId> {
        self.ports.get(&port).and_then(|p| p.net)
    }

    /// Returns an integer parameter, or `default` when absent or non-numeric.
    pub fn int_param_or(&self, key: Ident, default: i64) -> i64 {
        self.params
            .get(&key)
            .and_then(Property::as_int)
            .unwrap_or(default)
    }

    /// Returns a boolean parameter (any nonzero integer reading is true).
    pub fn bool_param_or(&self, key: Ident, default: bool) -> bool {
        self.params
            .get(&key)
            .and_then(Property::as_int)
            .map(|v| v != 0)
            .unwrap_or(default)
    }

    /// Returns a string parameter, or `default` when absent or non-string.
    pub fn str_param_or<'a>(&'a self, key: Ident, default: &'a str) -> &'a str {
        self.params
            .get(&key)
            .and_then(Property::as_str)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_common::Interner;

    #[test]
    fn param_defaults() {
        let interner = Interner::new();
        let mut cell = Cell::new(interner.id("c0"), interner.id("BUFG"));
        let key = interner.id("IS_CE_INVERTED");
        assert_eq!(cell.int_param_or(key, 0), 0);
        assert!(!cell.bool_param_or(key, false));
        cell.params.insert(key, Property::Int(1));
        assert_eq!(cell.int_param_or(key, 0), 1);
        assert!(cell.bool_param_or(key, false));
    }

    #[test]
    fn str_param_fallback() {
        let interner = Interner::new();
        let mut cell = Cell::new(interner.id("c0"), interner.id("BUFGMUX"));
        let key = interner.id("CLK_SEL_TYPE");
        assert_eq!(cell.str_param_or(key, "SYNC"), "SYNC");
        cell.params.insert(key, Property::from("ASYNC"));
        assert_eq!(cell.str_param_or(key, "SYNC"), "ASYNC");
    }

    #[test]
    fn port_net_missing_port() {
        let interner = Interner::new();
        let cell = Cell::new(interner.id("c0"), interner.id("BUFG"));
        assert_eq!(cell.port_net(interner.id("I")), None);
    }
}
