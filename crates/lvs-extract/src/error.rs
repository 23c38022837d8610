use thiserror::Error;

use lvs_core::database::LayoutError;
use lvs_core::layer::LayerSpec;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("cell '{cell}' has no shapes on required layer {name} ({spec})")]
    MissingLayer {
        cell: String,
        name: String,
        spec: LayerSpec,
    },

    #[error("cell '{cell}' has no gate regions: diff and poly never intersect")]
    NoGates { cell: String },

    #[error(transparent)]
    Layout(#[from] LayoutError),
}
