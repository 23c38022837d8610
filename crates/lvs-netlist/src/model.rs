use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Device class, from the first letter of the instance name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// `M` lines: drain, gate, source, bulk, model.
    Mosfet,
    /// `X` lines: subcircuit instances.
    Instance,
    /// Any other prefix (R, C, L, D, Q, ...), stored uppercase.
    Other(char),
}

impl DeviceKind {
    pub fn from_instance(name: &str) -> Self {
        match name.chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('M') => DeviceKind::Mosfet,
            Some('X') => DeviceKind::Instance,
            Some(c) => DeviceKind::Other(c),
            None => DeviceKind::Other('?'),
        }
    }
}

/// Normalized transistor model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceModel {
    Pmos,
    Nmos,
    Other(String),
}

impl DeviceModel {
    /// `p`/`pmos` and `n`/`nmos` (any case) are the two MOS polarities;
    /// anything else is kept uppercased.
    pub fn normalize(model: &str) -> Self {
        match model.to_ascii_lowercase().as_str() {
            "p" | "pmos" => DeviceModel::Pmos,
            "n" | "nmos" => DeviceModel::Nmos,
            _ => DeviceModel::Other(model.to_ascii_uppercase()),
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceModel::Pmos => write!(f, "PMOS"),
            DeviceModel::Nmos => write!(f, "NMOS"),
            DeviceModel::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A parameter value: `key=value` or a bare flag token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamValue {
    Value(String),
    Flag,
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Value(s) => Some(s),
            ParamValue::Flag => None,
        }
    }
}

/// One device or instance line of a subcircuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub instance: String,
    pub kind: DeviceKind,
    pub nets: Vec<String>,
    /// Model, value or subcircuit name. `None` for malformed lines.
    pub model: Option<String>,
    pub params: IndexMap<String, ParamValue>,
}

impl DeviceRecord {
    pub fn new(instance: &str, nets: Vec<String>, model: Option<String>) -> Self {
        Self {
            instance: instance.to_string(),
            kind: DeviceKind::from_instance(instance),
            nets,
            model,
            params: IndexMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params
            .insert(key.to_string(), ParamValue::Value(value.to_string()));
        self
    }

    /// Case-insensitive parameter lookup.
    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Channel width in micrometers.
    pub fn width(&self) -> Option<f64> {
        self.param("w").and_then(|v| v.as_str()).and_then(parse_dimension)
    }

    /// Channel length in micrometers.
    pub fn length(&self) -> Option<f64> {
        self.param("l").and_then(|v| v.as_str()).and_then(parse_dimension)
    }

    /// Finger count (`nf`), 1 when absent.
    pub fn fingers(&self) -> u32 {
        self.param("nf")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .map(|n| n.max(1.0) as u32)
            .unwrap_or(1)
    }

    pub fn device_model(&self) -> Option<DeviceModel> {
        self.model.as_deref().map(DeviceModel::normalize)
    }

    /// A MOSFET line with all four terminals and a model.
    pub fn is_complete_mos(&self) -> bool {
        self.kind == DeviceKind::Mosfet && self.nets.len() >= 4 && self.model.is_some()
    }
}

/// A `.SUBCKT` block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Subcircuit {
    pub name: String,
    pub ports: Vec<String>,
    pub devices: Vec<DeviceRecord>,
}

impl Subcircuit {
    pub fn new(name: &str, ports: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            ports,
            devices: Vec::new(),
        }
    }

    /// Subcircuit instances (`X` lines) with a resolved target.
    pub fn instances(&self) -> impl Iterator<Item = (&str, &str)> {
        self.devices
            .iter()
            .filter(|d| d.kind == DeviceKind::Instance)
            .filter_map(|d| d.model.as_deref().map(|m| (d.instance.as_str(), m)))
    }
}

/// Parse a dimension to micrometers. `u`/`um` are micrometers, `n`/`nm`
/// nanometers, `p`/`pm` picometers, `m`/`mm` millimeters; a bare number is
/// already in micrometers.
pub fn parse_dimension(text: &str) -> Option<f64> {
    let s = text.trim().to_ascii_lowercase();
    let (digits, scale) = if let Some(d) = s.strip_suffix("um").or_else(|| s.strip_suffix('u')) {
        (d, 1.0)
    } else if let Some(d) = s.strip_suffix("nm").or_else(|| s.strip_suffix('n')) {
        (d, 1e-3)
    } else if let Some(d) = s.strip_suffix("pm").or_else(|| s.strip_suffix('p')) {
        (d, 1e-6)
    } else if let Some(d) = s.strip_suffix("mm").or_else(|| s.strip_suffix('m')) {
        (d, 1e3)
    } else {
        (s.as_str(), 1.0)
    };
    digits.trim().parse::<f64>().ok().map(|v| v * scale)
}
