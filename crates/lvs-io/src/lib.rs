//! # LVS I/O
//!
//! GDS-II stream reading and writing, plus the JSON documents that describe a
//! process: the layer map and the extraction configuration (base layers,
//! conductor stack, pin text layers).

pub mod config;
pub mod gds;

pub use config::{
    load_layer_map, load_process_config, BaseLayers, ConfigError, ConfigFile, PinLayer,
    ProcessConfig,
};
pub use gds::{read_gds, write_gds, GdsError, GdsReader, GdsWriter};
