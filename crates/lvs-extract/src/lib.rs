//! # LVS Extract
//!
//! Net extraction and MOS device recognition on flattened layout geometry.
//! Conductor layers are merged, device recognition layers derived with
//! boolean operations, pin labels name the metal they sit on, connectivity
//! is propagated tier by tier through the layer stack, and every gate with
//! exactly two diffusion neighbours becomes a transistor.

pub mod connect;
pub mod devices;
pub mod error;
pub mod extractor;
pub mod geometry;
pub mod labels;
pub mod layers;
pub mod netmap;

pub use devices::ExtractedDevice;
pub use error::ExtractionError;
pub use extractor::{extract_cell, extract_from_library, Extraction};
pub use geometry::{PolygonId, Workspace};
pub use netmap::{NetMap, NetUnionFind};
