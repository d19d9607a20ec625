//! Technology legalization for Kestrel.
//!
//! The passes in this crate rewrite a synthesized netlist of generic library
//! primitives into the restricted set of placeable cells the placer
//! understands. Three families of resources are handled:
//!
//! - clock buffers and clock managers, collapsed onto the generalized
//!   `BUFGCTRL`/`BUFHCE` control BELs ([`Packer::pack_clocking`]);
//! - LUT-based distributed memories, decomposed into per-LUT read ports
//!   stacked into slice clusters ([`Packer::pack_dram`]);
//! - gigabit transceivers, pinned to their dedicated sites and checked for
//!   legal clock plumbing ([`Packer::pack_gt`]).
//!
//! Each pass sweeps a name-sorted snapshot of the live cells, mutates the
//! graph through the [`Netlist`] primitives, and defers removal of consumed
//! cells and commit of synthesized ones to an end-of-pass flush, so a sweep
//! never observes its own edits.

#![warn(missing_docs)]

mod clocking;
mod dram;
mod error;
mod gt;
mod muxtree;
mod xform;

pub use error::{LegalizeError, LegalizeResult};
pub use xform::{generic_xform, xform_cell, Injection, XFormRule};

use kestrel_arch::{DeviceGeometry, Family};
use kestrel_common::Ident;
use kestrel_diagnostics::DiagnosticSink;
use kestrel_netlist::{CellId, Netlist};
use std::collections::{HashMap, HashSet};

/// The legalization driver.
///
/// Borrows the netlist mutably for the duration of a run and the device
/// geometry and diagnostic sink immutably. Fatal problems surface as
/// [`LegalizeError`]; everything advisory goes to the sink.
pub struct Packer<'n, 'i> {
    pub(crate) nl: &'n mut Netlist<'i>,
    pub(crate) geom: &'n dyn DeviceGeometry,
    pub(crate) sink: &'n DiagnosticSink,
    pub(crate) family: Family,
    /// Cells consumed by the current pass, retired at the next flush.
    pub(crate) packed: HashSet<CellId>,
    pub(crate) dram_rules: HashMap<Ident, XFormRule>,
    pub(crate) dram32_6_rules: HashMap<Ident, XFormRule>,
    pub(crate) dram32_5_rules: HashMap<Ident, XFormRule>,
}

impl<'n, 'i> Packer<'n, 'i> {
    /// Creates a packer over the given netlist, geometry, and sink.
    pub fn new(
        nl: &'n mut Netlist<'i>,
        geom: &'n dyn DeviceGeometry,
        sink: &'n DiagnosticSink,
        family: Family,
    ) -> Self {
        Self {
            nl,
            geom,
            sink,
            family,
            packed: HashSet::new(),
            dram_rules: HashMap::new(),
            dram32_6_rules: HashMap::new(),
            dram32_5_rules: HashMap::new(),
        }
    }

    /// Runs every legalization pass in dependency order.
    pub fn run(&mut self) -> LegalizeResult<()> {
        self.pack_clocking()?;
        self.pack_dram()?;
        self.pack_gt()?;
        Ok(())
    }

    /// Retires consumed cells and commits synthesized ones.
    pub(crate) fn flush_cells(&mut self) {
        for cell in std::mem::take(&mut self.packed) {
            self.nl.retire(cell);
        }
        self.nl.flush_pending();
    }
}

/// Legalizes a netlist in one call; see [`Packer::run`].
pub fn legalize(
    nl: &mut Netlist,
    geom: &dyn DeviceGeometry,
    sink: &DiagnosticSink,
    family: Family,
) -> LegalizeResult<()> {
    Packer::new(nl, geom, sink, family).run()
}
