//! Per-cell runs and the parallel batch over them.

use rayon::prelude::*;

use lvs_compare::{compare, CellOutcome, CompareOptions};
use lvs_core::cell::Cell;
use lvs_core::database::LayoutLibrary;
use lvs_extract::extract_from_library;
use lvs_io::config::ProcessConfig;
use lvs_netlist::model::Subcircuit;
use lvs_netlist::parser::Netlist;

/// Read-only inputs shared by every cell run.
pub struct RunInputs {
    pub library: LayoutLibrary,
    pub netlist: Netlist,
    pub config: ProcessConfig,
    pub options: CompareOptions,
}

/// Everything one cell run produced.
pub struct CellRun {
    pub outcome: CellOutcome,
    /// The layout-derived subcircuit, when extraction succeeded.
    pub extracted: Option<Subcircuit>,
    /// The working geometry, when extraction succeeded.
    pub geometry: Option<Cell>,
}

impl CellRun {
    fn without_extraction(outcome: CellOutcome) -> Self {
        Self {
            outcome,
            extracted: None,
            geometry: None,
        }
    }
}

/// Cells defined in both the schematic and the layout, in netlist order.
pub fn discover_cells(library: &LayoutLibrary, netlist: &Netlist) -> Vec<String> {
    for top in netlist.top_cells() {
        log::debug!(
            "Schematic top cell '{}' ({} cells below)",
            top,
            netlist.hierarchy(top).size()
        );
    }
    netlist
        .names()
        .filter(|name| library.get_cell(name).is_some())
        .map(str::to_string)
        .collect()
}

/// Extract, canonicalize and compare one cell.
pub fn run_cell(cell: &str, inputs: &RunInputs) -> CellRun {
    let Some(schematic) = inputs.netlist.get(cell) else {
        log::warn!("Cell '{}' skipped: not in the schematic netlist", cell);
        return CellRun::without_extraction(CellOutcome::Skipped {
            cell: cell.to_string(),
            reason: "not defined in the schematic netlist".to_string(),
        });
    };
    if inputs.library.get_cell(cell).is_none() {
        log::warn!("Cell '{}' skipped: not in the layout", cell);
        return CellRun::without_extraction(CellOutcome::Skipped {
            cell: cell.to_string(),
            reason: "not defined in the layout".to_string(),
        });
    }

    let extraction = match extract_from_library(&inputs.library, cell, &inputs.config) {
        Ok(e) => e,
        Err(e) => {
            log::error!("Cell '{}': extraction failed: {}", cell, e);
            return CellRun::without_extraction(CellOutcome::ExtractionFailed {
                cell: cell.to_string(),
                reason: e.to_string(),
            });
        }
    };

    let extracted = extraction.to_subcircuit();
    let mut comparison = compare(schematic, &extracted, &inputs.options);
    comparison.supply_nets = extraction.supply_nets.iter().cloned().collect();

    CellRun {
        outcome: CellOutcome::Compared(Box::new(comparison)),
        extracted: Some(extracted),
        geometry: Some(extraction.geometry_cell()),
    }
}

/// Run every cell on the rayon pool. Results keep the order of `cells`.
pub fn run_batch(cells: &[String], inputs: &RunInputs) -> Vec<CellRun> {
    cells.par_iter().map(|cell| run_cell(cell, inputs)).collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use lvs_compare::CheckKind;

    #[test]
    fn test_discovery_uses_cells_in_both_inputs() {
        let inputs = inputs(false);
        assert_eq!(discover_cells(&inputs.library, &inputs.netlist), vec!["INV", "EMPTY"]);
    }

    #[test]
    fn test_matching_inverter_passes() {
        let run = run_cell("INV", &inputs(false));
        let CellOutcome::Compared(cmp) = &run.outcome else {
            panic!("expected a comparison, got {:?}", run.outcome);
        };
        assert!(cmp.passed(), "{:?}", cmp.results);
        assert_eq!(cmp.devices.layout, 2);
        assert_eq!(cmp.supply_nets, vec!["VDD", "VSS"]);
        let extracted = run.extracted.unwrap();
        assert!(extracted.devices.iter().all(|d| d.fingers() == 1));
    }

    #[test]
    fn test_split_gate_is_an_open() {
        let run = run_cell("INV", &inputs(true));
        let CellOutcome::Compared(cmp) = &run.outcome else {
            panic!("expected a comparison");
        };
        let opens = cmp.results.opens.as_ref().unwrap();
        assert_eq!(opens.len(), 1);
        assert!(opens["A"].contains("A"));
        assert_eq!(opens["A"].len(), 2);
        assert_eq!(cmp.results.count(CheckKind::Shorts), Some(0));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let inputs = inputs(false);
        let cells = vec!["INV".to_string(), "EMPTY".to_string(), "NOLAYOUT".to_string()];
        let runs = run_batch(&cells, &inputs);
        assert!(matches!(runs[0].outcome, CellOutcome::Compared(_)));
        assert!(matches!(runs[1].outcome, CellOutcome::ExtractionFailed { .. }));
        assert!(matches!(runs[2].outcome, CellOutcome::Skipped { .. }));
        assert!(runs[1].extracted.is_none());
    }
}
