use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// First layer number reserved for layers synthesized during extraction.
pub const SYNTHETIC_LAYER_BASE: u16 = 1000;

/// A GDS `(layer, datatype)` pair. Text labels reuse it as `(layer, texttype)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerSpec {
    pub layer: u16,
    pub datatype: u16,
}

impl LayerSpec {
    pub const fn new(layer: u16, datatype: u16) -> Self {
        Self { layer, datatype }
    }

    pub fn is_synthetic(&self) -> bool {
        self.layer >= SYNTHETIC_LAYER_BASE
    }
}

impl fmt::Display for LayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.layer, self.datatype)
    }
}

/// Layers created by the device-recognition boolean pass.
pub mod synthetic {
    use super::LayerSpec;

    pub const GATE: LayerSpec = LayerSpec::new(1001, 0);
    pub const PMOS_ACTIVE: LayerSpec = LayerSpec::new(1002, 0);
    pub const NMOS_ACTIVE: LayerSpec = LayerSpec::new(1003, 0);
    pub const P_DIFFUSION: LayerSpec = LayerSpec::new(1004, 0);
    pub const N_DIFFUSION: LayerSpec = LayerSpec::new(1005, 0);
    /// N+ diffusion inside the n-well (PMOS body tap).
    pub const P_BODY: LayerSpec = LayerSpec::new(1006, 0);
    /// P+ diffusion outside the n-well (substrate tap).
    pub const N_BODY: LayerSpec = LayerSpec::new(1007, 0);
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayerError {
    #[error("layer {name}/{purpose} uses {spec}, which collides with the reserved synthetic range (>= 1000)")]
    ReservedLayer {
        name: String,
        purpose: String,
        spec: LayerSpec,
    },

    #[error("unknown layer {name}/{purpose}")]
    UnknownLayer { name: String, purpose: String },
}

/// A named technology layer bound to its GDS numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub name: String,
    pub purpose: String,
    pub spec: LayerSpec,
}

impl LayerInfo {
    pub fn new(name: &str, purpose: &str, spec: LayerSpec) -> Self {
        Self {
            name: name.to_string(),
            purpose: purpose.to_string(),
            spec,
        }
    }
}

/// Maps logical `(name, purpose)` keys to GDS layer numbers.
#[derive(Debug, Clone, Default)]
pub struct LayerMap {
    layers: Vec<LayerInfo>,
    index: HashMap<(String, String), usize>,
}

impl LayerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layer. User layers may never enter the synthetic range.
    pub fn insert(&mut self, info: LayerInfo) -> Result<(), LayerError> {
        if info.spec.is_synthetic() {
            return Err(LayerError::ReservedLayer {
                name: info.name,
                purpose: info.purpose,
                spec: info.spec,
            });
        }
        let key = (info.name.clone(), info.purpose.clone());
        match self.index.get(&key) {
            Some(&i) => self.layers[i] = info,
            None => {
                self.index.insert(key, self.layers.len());
                self.layers.push(info);
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str, purpose: &str) -> Option<LayerSpec> {
        self.index
            .get(&(name.to_string(), purpose.to_string()))
            .map(|&i| self.layers[i].spec)
    }

    pub fn resolve(&self, name: &str, purpose: &str) -> Result<LayerSpec, LayerError> {
        self.get(name, purpose).ok_or_else(|| LayerError::UnknownLayer {
            name: name.to_string(),
            purpose: purpose.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// One height level of the stack. Several layers in a tier are alternatives
/// at the same height and are never connected to each other directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    layers: Vec<LayerSpec>,
}

impl Tier {
    pub fn single(layer: LayerSpec) -> Self {
        Self {
            layers: vec![layer],
        }
    }

    pub fn alternatives(layers: Vec<LayerSpec>) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn contains(&self, layer: LayerSpec) -> bool {
        self.layers.contains(&layer)
    }
}

/// Ordered tiers defining which layer pairs may conduct into each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerStack {
    tiers: Vec<Tier>,
}

impl LayerStack {
    pub fn new(tiers: Vec<Tier>) -> Self {
        Self { tiers }
    }

    pub fn push(&mut self, tier: Tier) {
        self.tiers.push(tier);
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn tier_of(&self, layer: LayerSpec) -> Option<usize> {
        self.tiers.iter().position(|t| t.contains(layer))
    }

    /// All layers of the tiers directly below and above `layer`.
    pub fn neighbors(&self, layer: LayerSpec) -> Vec<LayerSpec> {
        let Some(idx) = self.tier_of(layer) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        if idx > 0 {
            result.extend_from_slice(self.tiers[idx - 1].layers());
        }
        if let Some(upper) = self.tiers.get(idx + 1) {
            result.extend_from_slice(upper.layers());
        }
        result
    }

    /// Every layer mentioned by the stack, bottom tier first.
    pub fn layers(&self) -> impl Iterator<Item = LayerSpec> + '_ {
        self.tiers.iter().flat_map(|t| t.layers().iter().copied())
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF: LayerSpec = LayerSpec::new(1, 0);
    const POLY: LayerSpec = LayerSpec::new(2, 0);
    const CONT: LayerSpec = LayerSpec::new(6, 0);
    const MET1: LayerSpec = LayerSpec::new(7, 0);

    fn stack() -> LayerStack {
        LayerStack::new(vec![
            Tier::alternatives(vec![DIFF, POLY]),
            Tier::single(CONT),
            Tier::single(MET1),
        ])
    }

    #[test]
    fn test_layer_map_rejects_synthetic_range() {
        let mut map = LayerMap::new();
        assert!(map.insert(LayerInfo::new("poly", "drawing", POLY)).is_ok());
        let err = map
            .insert(LayerInfo::new("bad", "drawing", LayerSpec::new(1002, 0)))
            .unwrap_err();
        assert!(matches!(err, LayerError::ReservedLayer { .. }));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("poly", "drawing"), Some(POLY));
        assert!(map.resolve("metal9", "drawing").is_err());
    }

    #[test]
    fn test_stack_neighbors() {
        let stack = stack();
        assert_eq!(stack.tier_of(POLY), Some(0));
        assert_eq!(stack.neighbors(POLY), vec![CONT]);
        assert_eq!(stack.neighbors(CONT), vec![DIFF, POLY, MET1]);
        assert_eq!(stack.neighbors(MET1), vec![CONT]);
        assert!(stack.neighbors(LayerSpec::new(99, 0)).is_empty());
    }

    #[test]
    fn test_synthetic_layers_are_reserved() {
        assert!(synthetic::GATE.is_synthetic());
        assert!(synthetic::N_BODY.is_synthetic());
        assert!(!MET1.is_synthetic());
    }
}
