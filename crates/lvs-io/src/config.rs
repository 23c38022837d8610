//! Layer map and process configuration documents.
//!
//! Both are JSON. The layer map binds `(layer_name, datatype_name)` keys to
//! GDS numbers; the process configuration names the five base layers that
//! device recognition needs, the conductor stack, and which text layers label
//! which metal layers.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lvs_core::layer::{LayerError, LayerInfo, LayerMap, LayerSpec, LayerStack, Tier};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error("layer stack is empty")]
    EmptyStack,
}

// ── Layer map document ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerMapEntry {
    pub layer_name: String,
    pub datatype_name: String,
    pub layer_number: u16,
    pub datatype_number: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerMapFile {
    pub layers: Vec<LayerMapEntry>,
}

impl LayerMapFile {
    pub fn into_layer_map(self) -> Result<LayerMap, ConfigError> {
        let mut map = LayerMap::new();
        for entry in self.layers {
            map.insert(LayerInfo::new(
                &entry.layer_name,
                &entry.datatype_name,
                LayerSpec::new(entry.layer_number, entry.datatype_number),
            ))?;
        }
        Ok(map)
    }
}

// ── Process configuration document ───────────────────────────────────

/// A layer given either by GDS numbers or by its layer-map key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerRef {
    Numeric(u16, u16),
    Named(String, String),
}

impl LayerRef {
    pub fn resolve(&self, map: &LayerMap) -> Result<LayerSpec, LayerError> {
        match self {
            LayerRef::Numeric(l, d) => {
                let spec = LayerSpec::new(*l, *d);
                if spec.is_synthetic() {
                    return Err(LayerError::ReservedLayer {
                        name: spec.to_string(),
                        purpose: String::new(),
                        spec,
                    });
                }
                Ok(spec)
            }
            LayerRef::Named(name, purpose) => map.resolve(name, purpose),
        }
    }
}

/// One stack entry: a single layer or a list of same-height alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TierEntry {
    Single(LayerRef),
    Alternatives(Vec<LayerRef>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseLayerRefs {
    pub poly: LayerRef,
    pub diff: LayerRef,
    pub pp: LayerRef,
    pub np: LayerRef,
    pub nwell: LayerRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinInfoEntry {
    pub pin: LayerRef,
    pub metal: LayerRef,
}

/// The process configuration exactly as written in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub layer_map: BaseLayerRefs,
    pub layer_stack: Vec<TierEntry>,
    #[serde(default)]
    pub pin_info: Vec<PinInfoEntry>,
}

// ── Resolved configuration ───────────────────────────────────────────

/// The layers device recognition is built on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseLayers {
    pub poly: LayerSpec,
    pub diff: LayerSpec,
    pub pp: LayerSpec,
    pub np: LayerSpec,
    pub nwell: LayerSpec,
}

/// A text layer whose labels name polygons on `metal`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinLayer {
    pub text: LayerSpec,
    pub metal: LayerSpec,
}

/// Fully resolved process configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    pub base: BaseLayers,
    pub stack: LayerStack,
    pub pins: Vec<PinLayer>,
}

impl ConfigFile {
    /// Resolve every reference to numbers. The base layers are registered in
    /// `map` under `(name, "drawing")` so the stack may refer to them by name.
    pub fn resolve(&self, map: &mut LayerMap) -> Result<ProcessConfig, ConfigError> {
        let base = BaseLayers {
            poly: self.layer_map.poly.resolve(map)?,
            diff: self.layer_map.diff.resolve(map)?,
            pp: self.layer_map.pp.resolve(map)?,
            np: self.layer_map.np.resolve(map)?,
            nwell: self.layer_map.nwell.resolve(map)?,
        };
        for (name, spec) in [
            ("poly", base.poly),
            ("diff", base.diff),
            ("pp", base.pp),
            ("np", base.np),
            ("nwell", base.nwell),
        ] {
            map.insert(LayerInfo::new(name, "drawing", spec))?;
        }

        if self.layer_stack.is_empty() {
            return Err(ConfigError::EmptyStack);
        }
        let mut stack = LayerStack::default();
        for entry in &self.layer_stack {
            let tier = match entry {
                TierEntry::Single(r) => Tier::single(r.resolve(map)?),
                TierEntry::Alternatives(refs) => Tier::alternatives(
                    refs.iter()
                        .map(|r| r.resolve(map))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
            };
            stack.push(tier);
        }

        let pins = self
            .pin_info
            .iter()
            .map(|p| {
                Ok(PinLayer {
                    text: p.pin.resolve(map)?,
                    metal: p.metal.resolve(map)?,
                })
            })
            .collect::<Result<Vec<_>, LayerError>>()?;

        log::debug!(
            "Process configuration: {} stack tiers, {} pin layers",
            stack.tier_count(),
            pins.len()
        );
        Ok(ProcessConfig { base, stack, pins })
    }
}

// ── Loading ──────────────────────────────────────────────────────────

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_layer_map(path: impl AsRef<Path>) -> Result<LayerMap, ConfigError> {
    let file: LayerMapFile = read_json(path.as_ref())?;
    let map = file.into_layer_map()?;
    log::info!("Loaded {} layers from {}", map.len(), path.as_ref().display());
    Ok(map)
}

/// Load the process configuration, resolving names against `map`.
pub fn load_process_config(
    path: impl AsRef<Path>,
    map: &mut LayerMap,
) -> Result<ProcessConfig, ConfigError> {
    let file: ConfigFile = read_json(path.as_ref())?;
    file.resolve(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYERMAP: &str = r#"{
        "layers": [
            {"layer_name": "CO", "datatype_name": "drawing", "layer_number": 6, "datatype_number": 0},
            {"layer_name": "M1", "datatype_name": "drawing", "layer_number": 7, "datatype_number": 0},
            {"layer_name": "M1", "datatype_name": "pin", "layer_number": 8, "datatype_number": 0}
        ]
    }"#;

    const CONFIG: &str = r#"{
        "layer_map": {"poly": [2, 0], "diff": [1, 0], "pp": [3, 0], "np": [4, 0], "nwell": [5, 0]},
        "layer_stack": [[["diff", "drawing"], ["poly", "drawing"]], ["CO", "drawing"], [7, 0]],
        "pin_info": [{"pin": ["M1", "pin"], "metal": [7, 0]}]
    }"#;

    fn layer_map() -> LayerMap {
        serde_json::from_str::<LayerMapFile>(LAYERMAP)
            .unwrap()
            .into_layer_map()
            .unwrap()
    }

    #[test]
    fn test_resolve_mixed_references() {
        let mut map = layer_map();
        let cfg: ConfigFile = serde_json::from_str(CONFIG).unwrap();
        let resolved = cfg.resolve(&mut map).unwrap();

        assert_eq!(resolved.base.poly, LayerSpec::new(2, 0));
        assert_eq!(resolved.stack.tier_count(), 3);
        assert_eq!(
            resolved.stack.tiers()[0].layers(),
            &[LayerSpec::new(1, 0), LayerSpec::new(2, 0)]
        );
        assert_eq!(resolved.stack.tiers()[1].layers(), &[LayerSpec::new(6, 0)]);
        assert_eq!(
            resolved.pins,
            vec![PinLayer {
                text: LayerSpec::new(8, 0),
                metal: LayerSpec::new(7, 0)
            }]
        );
        assert_eq!(map.get("nwell", "drawing"), Some(LayerSpec::new(5, 0)));
    }

    #[test]
    fn test_unknown_stack_layer() {
        let mut map = layer_map();
        let cfg: ConfigFile = serde_json::from_str(
            r#"{
                "layer_map": {"poly": [2, 0], "diff": [1, 0], "pp": [3, 0], "np": [4, 0], "nwell": [5, 0]},
                "layer_stack": [["M9", "drawing"]]
            }"#,
        )
        .unwrap();
        let err = cfg.resolve(&mut map).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Layer(LayerError::UnknownLayer { .. })
        ));
    }

    #[test]
    fn test_synthetic_numbers_rejected() {
        let bad = r#"{"layers": [{"layer_name": "X", "datatype_name": "drawing", "layer_number": 1003, "datatype_number": 0}]}"#;
        let err = serde_json::from_str::<LayerMapFile>(bad)
            .unwrap()
            .into_layer_map()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Layer(LayerError::ReservedLayer { .. })
        ));

        let mut map = LayerMap::new();
        let cfg: ConfigFile = serde_json::from_str(
            r#"{
                "layer_map": {"poly": [1001, 0], "diff": [1, 0], "pp": [3, 0], "np": [4, 0], "nwell": [5, 0]},
                "layer_stack": [[1, 0]]
            }"#,
        )
        .unwrap();
        assert!(cfg.resolve(&mut map).is_err());
    }
}
