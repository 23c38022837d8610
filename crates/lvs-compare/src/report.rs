//! The verification report: one outcome per cell, rendered as text or JSON.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checks::NetGroups;
use crate::compare::{CellComparison, CheckKind};

/// What happened to one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CellOutcome {
    Compared(Box<CellComparison>),
    ExtractionFailed { cell: String, reason: String },
    Skipped { cell: String, reason: String },
}

impl CellOutcome {
    pub fn cell(&self) -> &str {
        match self {
            CellOutcome::Compared(c) => &c.cell,
            CellOutcome::ExtractionFailed { cell, .. } | CellOutcome::Skipped { cell, .. } => cell,
        }
    }

    /// Skipped cells neither pass nor fail the run.
    pub fn passed(&self) -> bool {
        match self {
            CellOutcome::Compared(c) => c.passed(),
            CellOutcome::ExtractionFailed { .. } => false,
            CellOutcome::Skipped { .. } => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LvsReport {
    pub run_id: Uuid,
    pub layout: String,
    pub schematic: String,
    pub cells: Vec<CellOutcome>,
}

impl LvsReport {
    pub fn new(layout: &str, schematic: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            layout: layout.to_string(),
            schematic: schematic.to_string(),
            cells: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: CellOutcome) {
        self.cells.push(outcome);
    }

    pub fn passed(&self) -> bool {
        self.cells.iter().all(|c| c.passed())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let rule = "-".repeat(60);
        let mut out = String::new();
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "LVS VERIFICATION REPORT");
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "Run ID            : {}", self.run_id);
        let _ = writeln!(out, "Layout Database   : {}", self.layout);
        let _ = writeln!(out, "Source Netlist    : {}", self.schematic);
        let _ = writeln!(out, "Hierarchy Mode    : Flattened");
        let _ = writeln!(
            out,
            "Overall Status    : {}",
            if self.passed() { "PASSED" } else { "FAILED" }
        );

        for outcome in &self.cells {
            let _ = writeln!(out, "\n{}", rule);
            let _ = writeln!(out, "Cell: {}", outcome.cell());
            let _ = writeln!(out, "{}", rule);
            match outcome {
                CellOutcome::Compared(c) => render_comparison(&mut out, c),
                CellOutcome::ExtractionFailed { reason, .. } => {
                    let _ = writeln!(out, "EXTRACTION FAILED: {}", reason);
                }
                CellOutcome::Skipped { reason, .. } => {
                    let _ = writeln!(out, "SKIPPED: {}", reason);
                }
            }
        }
        out
    }
}

fn render_groups(out: &mut String, title: &str, side: &str, other: &str, groups: &NetGroups) {
    let _ = writeln!(out, "\n{} ({})", title, groups.len());
    for (i, (net, landed)) in groups.iter().enumerate() {
        let names: Vec<&str> = landed.iter().map(|s| s.as_str()).collect();
        let _ = writeln!(out, "  #{} {} net {} -> {} nets {{{}}}", i + 1, side, net, other, names.join(", "));
    }
}

fn render_comparison(out: &mut String, c: &CellComparison) {
    let _ = writeln!(
        out,
        "Match             : {}",
        if c.passed() { "PASSED" } else { "FAILED" }
    );
    let _ = writeln!(out, "Supply Nets       : {}", c.supply_nets.join(", "));
    let _ = writeln!(out, "Tolerance (W/L)   : {}%", c.tolerance * 100.0);
    let _ = writeln!(out, "Devices           : schematic {}, layout {}", c.devices.schematic, c.devices.layout);
    let _ = writeln!(out, "Nets              : schematic {}, layout {}", c.nets.schematic, c.nets.layout);
    let _ = writeln!(out, "Ports             : schematic {}, layout {}", c.ports.schematic, c.ports.layout);

    let _ = writeln!(out, "\n{:<26}{:<8}{}", "Check Type", "Status", "Count");
    for kind in CheckKind::ALL {
        let count = c
            .results
            .count(kind)
            .map_or_else(|| "NA".to_string(), |n| n.to_string());
        let _ = writeln!(out, "{:<26}{:<8}{}", kind.title(), c.results.status(kind), count);
    }

    let r = &c.results;
    if let Some(ports) = r.ports.as_ref().filter(|p| !p.is_empty()) {
        let _ = writeln!(out, "\nPORT MISMATCHES");
        let _ = writeln!(out, "  Present in netlist only : {}", ports.schematic_only.join(", "));
        let _ = writeln!(out, "  Present in layout only  : {}", ports.layout_only.join(", "));
    }
    if let Some(devices) = r.devices.as_ref().filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "\nDEVICE MISMATCHES ({})", devices.count());
        for d in &devices.schematic {
            let _ = writeln!(out, "  schematic {} {}", d.model, d.instance);
        }
        for d in &devices.layout {
            let _ = writeln!(out, "  layout    {} {}", d.model, d.instance);
        }
        for inst in &devices.unparsed_schematic {
            let _ = writeln!(out, "  schematic {} (unparsed)", inst);
        }
        for inst in &devices.unparsed_layout {
            let _ = writeln!(out, "  layout    {} (unparsed)", inst);
        }
    }
    if let Some(sizes) = r.sizes.as_ref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "\nDEVICE SIZE MISMATCHES ({})", sizes.len());
        let dim = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{}u", x));
        for (i, m) in sizes.iter().enumerate() {
            let _ = writeln!(out, "  #{} {}", i + 1, m.model);
            for (side, dev) in [("schematic", &m.schematic), ("layout", &m.layout)] {
                match dev {
                    Some(d) => {
                        let _ = writeln!(
                            out,
                            "    {:<10} {} W={} L={}",
                            side,
                            d.instance,
                            dim(d.width),
                            dim(d.length)
                        );
                    }
                    None => {
                        let _ = writeln!(out, "    {:<10} (no counterpart)", side);
                    }
                }
            }
        }
    }
    if let Some(nets) = r.nets.as_ref().filter(|n| !n.is_empty()) {
        let _ = writeln!(out, "\nNETS MISMATCH ({})", nets.len());
        for (i, m) in nets.iter().enumerate() {
            let _ = writeln!(
                out,
                "  #{} schematic {} / layout {}",
                i + 1,
                m.schematic.as_deref().unwrap_or("None"),
                m.layout.as_deref().unwrap_or("None")
            );
        }
    }
    if let Some(opens) = r.opens.as_ref().filter(|o| !o.is_empty()) {
        render_groups(out, "OPEN NETS", "schematic", "layout", opens);
    }
    if let Some(shorts) = r.shorts.as_ref().filter(|s| !s.is_empty()) {
        render_groups(out, "SHORTED NETS", "layout", "schematic", shorts);
    }
}
