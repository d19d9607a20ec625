//! The mutable netlist graph and its mutation primitives.

use crate::arena::{Arena, CellId, NetId};
use crate::cell::{Cell, Port, PortDir, PortRef};
use crate::net::Net;
use kestrel_common::{Ident, Interner};
use std::collections::{HashMap, HashSet};

/// Name of the process-wide logic-0 constant net.
pub const GND_NET: &str = "$GND_NET";
/// Name of the process-wide logic-1 constant net.
pub const VCC_NET: &str = "$VCC_NET";

/// The shared mutable design graph.
///
/// Every legalizer mutates one `Netlist` in place. Mutations take effect
/// immediately and are not transactional; iteration wanting a stable view
/// takes a snapshot through [`sorted_cells`](Self::sorted_cells) first.
pub struct Netlist<'a> {
    /// All cells, including retired and pending ones.
    pub cells: Arena<CellId, Cell>,
    /// All nets.
    pub nets: Arena<NetId, Net>,
    /// String interner shared with the caller.
    pub interner: &'a Interner,
    net_by_name: HashMap<Ident, NetId>,
    retired: HashSet<CellId>,
    pending: HashSet<CellId>,
    gnd: NetId,
    vcc: NetId,
    autoidx: u32,
}

impl<'a> Netlist<'a> {
    /// Creates an empty netlist holding only the two constant nets.
    pub fn new(interner: &'a Interner) -> Self {
        let mut nets = Arena::new();
        let mut net_by_name = HashMap::new();
        let gnd_name = interner.id(GND_NET);
        let vcc_name = interner.id(VCC_NET);
        let gnd = nets.alloc(Net::new(gnd_name));
        let vcc = nets.alloc(Net::new(vcc_name));
        net_by_name.insert(gnd_name, gnd);
        net_by_name.insert(vcc_name, vcc);
        Self {
            cells: Arena::new(),
            nets,
            interner,
            net_by_name,
            retired: HashSet::new(),
            pending: HashSet::new(),
            gnd,
            vcc,
            autoidx: 0,
        }
    }

    /// Interns a string through the shared interner.
    pub fn id(&self, s: &str) -> Ident {
        self.interner.id(s)
    }

    /// The logic-0 constant net.
    pub fn gnd(&self) -> NetId {
        self.gnd
    }

    /// The logic-1 constant net.
    pub fn vcc(&self) -> NetId {
        self.vcc
    }

    /// Returns `true` if `net` is one of the two constant nets.
    pub fn is_constant(&self, net: NetId) -> bool {
        net == self.gnd || net == self.vcc
    }

    // --- Lookup ---

    /// Returns the cell with the given ID.
    pub fn cell(&self, id: CellId) -> &Cell {
        self.cells.get(id)
    }

    /// Returns the cell with the given ID, mutably.
    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        self.cells.get_mut(id)
    }

    /// Returns the net with the given ID.
    pub fn net(&self, id: NetId) -> &Net {
        self.nets.get(id)
    }

    /// Resolves a cell's name to a string slice.
    pub fn cell_name(&self, id: CellId) -> &str {
        self.interner.resolve(self.cells.get(id).name)
    }

    /// Resolves a net's name to a string slice.
    pub fn net_name(&self, id: NetId) -> &str {
        self.interner.resolve(self.nets.get(id).name)
    }

    /// Looks up a net by name.
    pub fn net_by_name(&self, name: Ident) -> Option<NetId> {
        self.net_by_name.get(&name).copied()
    }

    /// Returns the net connected to a cell's port, if the port exists and is
    /// wired.
    pub fn port_net(&self, cell: CellId, port: Ident) -> Option<NetId> {
        self.cells.get(cell).port_net(port)
    }

    /// Returns the cell driving `net`, if any.
    pub fn net_driver_cell(&self, net: NetId) -> Option<CellId> {
        self.nets.get(net).driver.map(|p| p.cell)
    }

    // --- Creation ---

    /// Creates a new named net.
    ///
    /// # Panics
    ///
    /// Panics if a net with this name already exists.
    pub fn add_net(&mut self, name: &str) -> NetId {
        let ident = self.id(name);
        assert!(
            !self.net_by_name.contains_key(&ident),
            "duplicate net name '{name}'"
        );
        let id = self.nets.alloc(Net::new(ident));
        self.net_by_name.insert(ident, id);
        id
    }

    /// Creates a fresh internal net named `<base cell name>/<postfix>`,
    /// uniquified with a counter if the name is taken.
    pub fn create_internal_net(&mut self, base: CellId, postfix: &str) -> NetId {
        let base_name = self.cell_name(base).to_string();
        let mut name = format!("{base_name}/{postfix}");
        while self.net_by_name.contains_key(&self.interner.id(&name)) {
            name = format!("{base_name}/{postfix}${}", self.autoidx);
            self.autoidx += 1;
        }
        self.add_net(&name)
    }

    /// Creates a live cell with no ports.
    pub fn add_cell(&mut self, name: &str, ty: &str) -> CellId {
        let cell = Cell::new(self.id(name), self.id(ty));
        self.cells.alloc(cell)
    }

    /// Creates a synthesized cell in the pending buffer.
    ///
    /// Pending cells are fully connectable but excluded from
    /// [`sorted_cells`](Self::sorted_cells) until [`flush_pending`]
    /// (Self::flush_pending) commits them, so a sweep never observes cells it
    /// created itself.
    pub fn add_pending_cell(&mut self, name: &str, ty: &str) -> CellId {
        let id = self.add_cell(name, ty);
        self.pending.insert(id);
        id
    }

    /// Commits all pending cells to the live graph.
    pub fn flush_pending(&mut self) {
        self.pending.clear();
    }

    /// Marks a cell retired: no longer iterated, never revisited.
    ///
    /// Nets referenced by a retired cell stay valid for the remainder of the
    /// pass; physical removal is the orchestrator's bookkeeping.
    pub fn retire(&mut self, id: CellId) {
        self.retired.insert(id);
    }

    /// Returns `true` if the cell has been retired.
    pub fn is_retired(&self, id: CellId) -> bool {
        self.retired.contains(&id)
    }

    /// Returns the IDs of all live (non-retired, non-pending) cells, sorted
    /// by cell name so every sweep is deterministic.
    pub fn sorted_cells(&self) -> Vec<CellId> {
        let mut ids: Vec<CellId> = self
            .cells
            .iter()
            .map(|(id, _)| id)
            .filter(|id| !self.retired.contains(id) && !self.pending.contains(id))
            .collect();
        ids.sort_by(|a, b| self.cell_name(*a).cmp(self.cell_name(*b)));
        ids
    }

    /// Returns a cell's port names sorted by string, for deterministic port
    /// sweeps.
    pub fn sorted_port_names(&self, cell: CellId) -> Vec<Ident> {
        let mut names: Vec<Ident> = self.cells.get(cell).ports.keys().copied().collect();
        names.sort_by(|a, b| self.interner.resolve(*a).cmp(self.interner.resolve(*b)));
        names
    }

    // --- Connectivity primitives ---

    /// Adds a port to a cell without connecting it.
    ///
    /// # Panics
    ///
    /// Panics if the cell already has a port with this name.
    pub fn add_port(&mut self, cell: CellId, name: Ident, dir: PortDir) {
        let ports = &mut self.cells.get_mut(cell).ports;
        let prev = ports.insert(name, Port { name, dir, net: None });
        assert!(
            prev.is_none(),
            "cell already has a port named '{}'",
            self.interner.resolve(name)
        );
    }

    /// Connects an existing port to a net.
    ///
    /// # Panics
    ///
    /// Panics if the port does not exist, is already connected, or is an
    /// output on a net that already has a driver (single-driver invariant).
    pub fn connect(&mut self, cell: CellId, port: Ident, net: NetId) {
        let port_entry = self
            .cells
            .get_mut(cell)
            .ports
            .get_mut(&port)
            .unwrap_or_else(|| panic!("no port '{}' to connect", resolve_for_panic(port)));
        assert!(
            port_entry.net.is_none(),
            "port '{}' is already connected",
            resolve_for_panic(port)
        );
        port_entry.net = Some(net);
        let dir = port_entry.dir;
        let pref = PortRef { cell, port };
        let net_entry = self.nets.get_mut(net);
        match dir {
            PortDir::Input => net_entry.users.push(pref),
            PortDir::Output => {
                assert!(
                    net_entry.driver.is_none(),
                    "net '{}' already has a driver",
                    resolve_for_panic(net_entry.name)
                );
                net_entry.driver = Some(pref);
            }
        }
    }

    /// Adds an input port (creating it if needed) and connects it.
    pub fn connect_input(&mut self, cell: CellId, port: &str, net: NetId) {
        let ident = self.id(port);
        if !self.cells.get(cell).ports.contains_key(&ident) {
            self.add_port(cell, ident, PortDir::Input);
        }
        self.connect(cell, ident, net);
    }

    /// Adds an output port (creating it if needed) and connects it.
    pub fn connect_output(&mut self, cell: CellId, port: &str, net: NetId) {
        let ident = self.id(port);
        if !self.cells.get(cell).ports.contains_key(&ident) {
            self.add_port(cell, ident, PortDir::Output);
        }
        self.connect(cell, ident, net);
    }

    /// Disconnects a port from its net, if connected. Missing ports are a
    /// no-op, matching the tolerant disconnects legalizers rely on.
    pub fn disconnect(&mut self, cell: CellId, port: Ident) {
        let Some(port_entry) = self.cells.get_mut(cell).ports.get_mut(&port) else {
            return;
        };
        let Some(net) = port_entry.net.take() else {
            return;
        };
        let dir = port_entry.dir;
        let net_entry = self.nets.get_mut(net);
        match dir {
            PortDir::Input => {
                net_entry
                    .users
                    .retain(|p| !(p.cell == cell && p.port == port));
            }
            PortDir::Output => {
                debug_assert_eq!(
                    net_entry.driver,
                    Some(PortRef { cell, port }),
                    "driver bookkeeping out of sync"
                );
                net_entry.driver = None;
            }
        }
    }

    /// Renames a port, preserving its net connection.
    ///
    /// The net-side [`PortRef`]s are updated in place, so the connected net
    /// is identical (by identity) before and after the rename.
    ///
    /// # Panics
    ///
    /// Panics if the old port does not exist or the new name is taken.
    pub fn rename_port(&mut self, cell: CellId, old: Ident, new: Ident) {
        if old == new {
            return;
        }
        let ports = &mut self.cells.get_mut(cell).ports;
        let mut port_entry = ports
            .remove(&old)
            .unwrap_or_else(|| panic!("no port '{}' to rename", resolve_for_panic(old)));
        assert!(
            !ports.contains_key(&new),
            "rename target '{}' already exists",
            resolve_for_panic(new)
        );
        port_entry.name = new;
        let net = port_entry.net;
        let dir = port_entry.dir;
        ports.insert(new, port_entry);
        if let Some(net) = net {
            let net_entry = self.nets.get_mut(net);
            match dir {
                PortDir::Input => {
                    for user in net_entry.users.iter_mut() {
                        if user.cell == cell && user.port == old {
                            user.port = new;
                        }
                    }
                }
                PortDir::Output => {
                    if let Some(driver) = net_entry.driver.as_mut() {
                        if driver.cell == cell && driver.port == old {
                            driver.port = new;
                        }
                    }
                }
            }
        }
    }
}

// Panic paths cannot reach the interner; raw indices are still actionable.
fn resolve_for_panic(ident: Ident) -> String {
    format!("#{}", ident.as_raw())
}
