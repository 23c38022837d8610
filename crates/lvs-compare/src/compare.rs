use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lvs_netlist::model::Subcircuit;

use crate::canonical::{canonicalize, Signature};
use crate::checks::{
    check_devices, check_nets, check_opens, check_ports, check_shorts, check_sizes, DeviceDiff,
    NetGroups, NetMismatch, PortDiff, SizeMismatch, DEFAULT_TOLERANCE,
};
use crate::correspondence::Correspondence;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown check '{0}' (expected one of: ports, devices, sizes, nets, opens, shorts)")]
pub struct UnknownCheck(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Ports,
    Devices,
    Sizes,
    Nets,
    Opens,
    Shorts,
}

impl CheckKind {
    pub const ALL: [CheckKind; 6] = [
        CheckKind::Ports,
        CheckKind::Devices,
        CheckKind::Sizes,
        CheckKind::Nets,
        CheckKind::Opens,
        CheckKind::Shorts,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            CheckKind::Ports => "Port Check",
            CheckKind::Devices => "Device Check",
            CheckKind::Sizes => "Device Size Check",
            CheckKind::Nets => "Nets Check",
            CheckKind::Opens => "Open Nets",
            CheckKind::Shorts => "Shorted Nets",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckKind::Ports => "ports",
            CheckKind::Devices => "devices",
            CheckKind::Sizes => "sizes",
            CheckKind::Nets => "nets",
            CheckKind::Opens => "opens",
            CheckKind::Shorts => "shorts",
        };
        f.write_str(name)
    }
}

impl FromStr for CheckKind {
    type Err = UnknownCheck;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckKind::ALL
            .into_iter()
            .find(|k| k.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCheck(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompareOptions {
    /// Relative W/L tolerance.
    pub tolerance: f64,
    pub checks: BTreeSet<CheckKind>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            checks: CheckKind::ALL.into_iter().collect(),
        }
    }
}

/// Pass, fail, or not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Pass,
    Fail,
    NotRun,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "PASS"),
            CheckStatus::Fail => write!(f, "FAIL"),
            CheckStatus::NotRun => write!(f, "NA"),
        }
    }
}

/// Results of the selected checks; `None` for deselected ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResults {
    pub ports: Option<PortDiff>,
    pub devices: Option<DeviceDiff>,
    pub sizes: Option<Vec<SizeMismatch>>,
    pub nets: Option<Vec<NetMismatch>>,
    pub opens: Option<NetGroups>,
    pub shorts: Option<NetGroups>,
}

impl CheckResults {
    /// Number of reported entries.
    pub fn count(&self, kind: CheckKind) -> Option<usize> {
        match kind {
            CheckKind::Ports => self.ports.as_ref().map(|d| d.count()),
            CheckKind::Devices => self.devices.as_ref().map(|d| d.count()),
            CheckKind::Sizes => self.sizes.as_ref().map(|d| d.len()),
            CheckKind::Nets => self.nets.as_ref().map(|d| d.len()),
            CheckKind::Opens => self.opens.as_ref().map(|d| d.len()),
            CheckKind::Shorts => self.shorts.as_ref().map(|d| d.len()),
        }
    }

    pub fn status(&self, kind: CheckKind) -> CheckStatus {
        match self.count(kind) {
            None => CheckStatus::NotRun,
            Some(0) => CheckStatus::Pass,
            Some(_) => CheckStatus::Fail,
        }
    }

    pub fn passed(&self) -> bool {
        CheckKind::ALL
            .iter()
            .all(|k| self.status(*k) != CheckStatus::Fail)
    }
}

/// Schematic and layout side of a count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub schematic: usize,
    pub layout: usize,
}

/// The comparison of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellComparison {
    pub cell: String,
    pub devices: Counts,
    pub ports: Counts,
    /// Internal (non-port) nets touched by a device.
    pub nets: Counts,
    pub supply_nets: Vec<String>,
    pub tolerance: f64,
    pub correspondence: Correspondence,
    pub results: CheckResults,
}

impl CellComparison {
    pub fn passed(&self) -> bool {
        self.results.passed()
    }
}

/// Run the selected checks on two already canonical signatures.
pub fn compare_signatures(
    schematic: &Signature,
    layout: &Signature,
    options: &CompareOptions,
) -> CellComparison {
    let run = |kind: CheckKind| options.checks.contains(&kind);
    let correspondence = Correspondence::build(schematic, layout);

    let results = CheckResults {
        ports: run(CheckKind::Ports).then(|| check_ports(schematic, layout)),
        devices: run(CheckKind::Devices).then(|| check_devices(schematic, layout)),
        sizes: run(CheckKind::Sizes).then(|| check_sizes(schematic, layout, options.tolerance)),
        nets: run(CheckKind::Nets).then(|| check_nets(schematic, layout)),
        opens: run(CheckKind::Opens).then(|| check_opens(schematic, layout, &correspondence)),
        shorts: run(CheckKind::Shorts).then(|| check_shorts(schematic, layout, &correspondence)),
    };

    let comparison = CellComparison {
        cell: schematic.name.clone(),
        devices: Counts {
            schematic: schematic.devices.len(),
            layout: layout.devices.len(),
        },
        ports: Counts {
            schematic: schematic.ports.len(),
            layout: layout.ports.len(),
        },
        nets: Counts {
            schematic: schematic.internal_net_count(),
            layout: layout.internal_net_count(),
        },
        supply_nets: Vec::new(),
        tolerance: options.tolerance,
        correspondence,
        results,
    };
    log::info!(
        "Compared '{}': {}",
        comparison.cell,
        if comparison.passed() { "match" } else { "mismatch" }
    );
    comparison
}

/// Canonicalize both subcircuits and compare them.
pub fn compare(schematic: &Subcircuit, layout: &Subcircuit, options: &CompareOptions) -> CellComparison {
    compare_signatures(&canonicalize(schematic), &canonicalize(layout), options)
}
