//! `lvs`: compare a GDS layout against a SPICE/CDL schematic, cell by cell.

mod runner;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser as ClapParser;
use env_logger::Env;

use lvs_compare::{CheckKind, CompareOptions, LvsReport};
use lvs_core::database::LayoutLibrary;
use lvs_io::config::{load_layer_map, load_process_config};
use lvs_io::gds::{read_gds, write_gds};
use lvs_netlist::parser::parse_file;
use lvs_netlist::writer::write_netlist_file;

use runner::{discover_cells, run_batch, CellRun, RunInputs};

#[derive(ClapParser, Debug)]
#[command(
    version,
    about = "Layout-vs-schematic checker",
    long_about = "Extracts transistors and nets from a GDS layout, canonicalizes them \
                  together with the matching SPICE/CDL subcircuits and reports port, \
                  device, size, net, open and short mismatches per cell."
)]
struct Args {
    /// GDS-II layout.
    layout: PathBuf,

    /// SPICE/CDL schematic netlist.
    schematic: PathBuf,

    /// Layer map JSON (layer names to GDS numbers).
    #[arg(long)]
    layer_map: PathBuf,

    /// Process configuration JSON (base layers, stack, pin layers).
    #[arg(long)]
    config: PathBuf,

    /// Cells to check. Defaults to every cell in both inputs.
    #[arg(long, value_delimiter = ',')]
    cells: Vec<String>,

    /// Directory for the report and the layout-derived netlist.
    #[arg(long, default_value = "lvs_out")]
    out_dir: PathBuf,

    /// Relative W/L tolerance.
    #[arg(long, default_value_t = lvs_compare::checks::DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Checks to run.
    #[arg(long, value_delimiter = ',', default_value = "ports,devices,sizes,nets,opens,shorts")]
    checks: Vec<CheckKind>,

    /// Also write the report as JSON.
    #[arg(long)]
    json: bool,

    /// Write the working geometry, synthetic layers included, as GDS.
    #[arg(long)]
    dump_geometry: bool,
}

fn load_inputs(args: &Args) -> Result<RunInputs> {
    if args.tolerance.is_nan() || args.tolerance < 0.0 {
        bail!("tolerance must be a non-negative number, got {}", args.tolerance);
    }

    let library = read_gds(&args.layout)
        .with_context(|| format!("failed to read layout {}", args.layout.display()))?;
    log::info!("Layout top cells: {}", library.top_cells().join(", "));

    let netlist = parse_file(&args.schematic)
        .with_context(|| format!("failed to read schematic {}", args.schematic.display()))?;
    for d in &netlist.diagnostics {
        log::warn!("{}:{}: {}", args.schematic.display(), d.line, d.message);
    }

    let mut map = load_layer_map(&args.layer_map)
        .with_context(|| format!("failed to load layer map {}", args.layer_map.display()))?;
    let config = load_process_config(&args.config, &mut map)
        .with_context(|| format!("failed to load process config {}", args.config.display()))?;

    Ok(RunInputs {
        library,
        netlist,
        config,
        options: CompareOptions {
            tolerance: args.tolerance,
            checks: args.checks.iter().copied().collect(),
        },
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "layout".to_string())
}

fn write_outputs(args: &Args, inputs: &RunInputs, runs: &[CellRun], report: &LvsReport) -> Result<()> {
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;
    let stem = file_stem(&args.layout);

    let extracted = runs.iter().filter_map(|r| r.extracted.as_ref());
    let netlist_path = args.out_dir.join(format!("{}_layout.cdl", stem));
    write_netlist_file(&netlist_path, extracted)
        .with_context(|| format!("failed to write {}", netlist_path.display()))?;

    let text_path = args.out_dir.join("lvs_report.txt");
    fs::write(&text_path, report.render_text())
        .with_context(|| format!("failed to write {}", text_path.display()))?;

    if args.json {
        let json_path = args.out_dir.join("lvs_report.json");
        fs::write(&json_path, report.to_json()?)
            .with_context(|| format!("failed to write {}", json_path.display()))?;
    }

    if args.dump_geometry {
        let mut dump = LayoutLibrary::new(&format!("{}_lvs", inputs.library.name));
        dump.dbu = inputs.library.dbu;
        dump.user_unit_m = inputs.library.user_unit_m;
        for cell in runs.iter().filter_map(|r| r.geometry.clone()) {
            dump.add_cell(cell);
        }
        let gds_path = args.out_dir.join(format!("{}_lvs.gds", stem));
        write_gds(&gds_path, &dump)
            .with_context(|| format!("failed to write {}", gds_path.display()))?;
    }

    log::info!("Outputs written to {}", args.out_dir.display());
    Ok(())
}

fn run(args: &Args) -> Result<LvsReport> {
    let inputs = load_inputs(args)?;

    let cells = if args.cells.is_empty() {
        discover_cells(&inputs.library, &inputs.netlist)
    } else {
        args.cells.clone()
    };
    if cells.is_empty() {
        bail!("no cell is defined in both the layout and the schematic");
    }
    log::info!("Checking {} cells: {}", cells.len(), cells.join(", "));

    let runs = run_batch(&cells, &inputs);
    let mut report = LvsReport::new(
        &args.layout.display().to_string(),
        &args.schematic.display().to_string(),
    );
    for r in &runs {
        report.push(r.outcome.clone());
    }

    write_outputs(args, &inputs, &runs, &report)?;
    Ok(report)
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let report = run(&args)?;
    print!("{}", report.render_text());

    if report.passed() {
        log::info!("LVS passed");
        Ok(ExitCode::SUCCESS)
    } else {
        log::warn!("LVS failed");
        Ok(ExitCode::FAILURE)
    }
}
