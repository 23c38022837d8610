//! # LVS Core
//!
//! Layout library with hierarchical cell management and flattening, the
//! layer model (layer map, layer stack, reserved synthetic layers), an R-tree
//! spatial index, and the fixed-precision geometry kernel that every
//! extraction step runs on.

pub mod cell;
pub mod database;
pub mod geometry;
pub mod kernel;
pub mod layer;
pub mod spatial;

pub use cell::{ArraySpec, Cell, CellInstance, FlatCell, Transform};
pub use database::{CellTree, LayoutError, LayoutLibrary};
pub use geometry::{BBox, GeomPrimitive, Label, Path, PathEnd, Point, Polygon};
pub use kernel::GeometryKernel;
pub use layer::{synthetic, LayerError, LayerInfo, LayerMap, LayerSpec, LayerStack, Tier};
pub use spatial::{SpatialEntry, SpatialIndex};
