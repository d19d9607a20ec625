//! The shared mutable design graph for the Kestrel legalization core.
//!
//! A [`Netlist`] owns arenas of [`Cell`]s and [`Net`]s; ports reference nets
//! through opaque [`NetId`]s and nets hold non-owning [`PortRef`]s back to
//! their connected ports, so the cyclic cell↔port↔net↔cell structure never
//! forms an ownership cycle. Connecting and disconnecting a port are the
//! single graph-mutation primitives every legalizer builds on.
//!
//! Legalizers consume cells by marking them retired and synthesize new cells
//! into a pending buffer that is committed once, after the originating sweep
//! completes, so a sweep never mutates the collection it iterates.

#![warn(missing_docs)]

pub mod arena;
pub mod cell;
pub mod net;
pub mod netlist;
pub mod property;

pub use arena::{Arena, ArenaId, CellId, NetId};
pub use cell::{Cell, ClusterConstraint, Port, PortDir, PortRef};
pub use net::Net;
pub use netlist::Netlist;
pub use property::Property;
