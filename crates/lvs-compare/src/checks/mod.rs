//! The six comparison checks. Each takes the schematic and layout
//! signatures and returns its differences as data.

pub mod connectivity;
pub mod devices;
pub mod nets;
pub mod ports;
pub mod sizes;

pub use connectivity::{check_opens, check_shorts, NetGroups};
pub use devices::{check_devices, DeviceDiff, DeviceMismatch};
pub use nets::{check_nets, NetMismatch};
pub use ports::{check_ports, PortDiff};
pub use sizes::{check_sizes, SizeMismatch, SizedDevice, DEFAULT_TOLERANCE};
