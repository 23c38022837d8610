//! # LVS Compare
//!
//! Topology-invariant comparison of a schematic subcircuit against the
//! netlist extracted from its layout. Both sides are reduced to canonical
//! signatures, devices are put in correspondence, and six checks (ports,
//! devices, sizes, nets, opens, shorts) report their differences as data.

pub mod canonical;
pub mod checks;
pub mod compare;
pub mod correspondence;
pub mod report;

pub use canonical::{canonicalize, CanonicalDevice, RoleClass, Signature};
pub use compare::{
    compare, compare_signatures, CellComparison, CheckKind, CheckResults, CheckStatus,
    CompareOptions, Counts, UnknownCheck,
};
pub use correspondence::{Correspondence, DevicePair};
pub use report::{CellOutcome, LvsReport};
