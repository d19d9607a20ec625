//! Nets: named signals with one driver and any number of sinks.

use crate::cell::PortRef;
use kestrel_common::Ident;
use serde::{Deserialize, Serialize};

/// A named signal in the netlist.
///
/// A net has at most one driving port and any number of sink ports. The two
/// process-wide constant nets (logic-0 and logic-1) have no driver cell; they
/// are identified by the netlist, not by shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Net {
    /// The net's unique name.
    pub name: Ident,
    /// The port driving this net, if any.
    pub driver: Option<PortRef>,
    /// Sink ports observing this net, in connection order.
    pub users: Vec<PortRef>,
}

impl Net {
    /// Creates a new net with no connections.
    pub fn new(name: Ident) -> Self {
        Self {
            name,
            driver: None,
            users: Vec::new(),
        }
    }

    /// Returns `true` if no port references this net.
    pub fn is_unused(&self) -> bool {
        self.driver.is_none() && self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_common::Interner;

    #[test]
    fn fresh_net_is_unused() {
        let interner = Interner::new();
        let net = Net::new(interner.id("clk"));
        assert!(net.is_unused());
    }
}
