//! # LVS Netlist
//!
//! SPICE/CDL schematic netlists: a tolerant line-based parser, hierarchy
//! discovery (top cells, instantiation tree), device model normalization and
//! a writer for the layout-derived netlist.

pub mod hierarchy;
pub mod model;
pub mod parser;
pub mod writer;

pub use hierarchy::HierarchyNode;
pub use model::{parse_dimension, DeviceKind, DeviceModel, DeviceRecord, ParamValue, Subcircuit};
pub use parser::{parse_file, parse_str, Netlist, NetlistError, ParseDiagnostic};
pub use writer::{format_dimension, netlist_to_string, subcircuit_to_string, write_netlist_file};
