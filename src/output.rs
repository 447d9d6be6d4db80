use std::fs::File;
use std::path::Path;

use colored::Colorize;
use csv::Writer;
use log::info;

use crate::analysis::{Solution, BALANCE_TOLERANCE};
use crate::circuit::Circuit;
use crate::error::{DcsimError, Result};

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

/// Element names in registration order, resistors first, then sources.
/// Keeps printed and exported output deterministic.
fn element_names(circuit: &Circuit) -> Vec<String> {
    circuit
        .resistors
        .iter()
        .map(|r| r.name.clone())
        .chain(circuit.voltage_sources.iter().map(|v| v.name.clone()))
        .chain(circuit.current_sources.iter().map(|i| i.name.clone()))
        .collect()
}

/// Print node voltages, the per-element table, and the power balance.
pub fn print_solution(circuit: &Circuit, solution: &Solution) {
    println!("\n{}", "Node voltages".bold());
    let mut labels: Vec<&String> = solution.voltages.keys().collect();
    labels.sort();
    for label in labels {
        println!("  V({}) = {:.6} V", label, solution.voltages[label]);
    }

    println!("\n{}", "Elements".bold());
    println!(
        "  {:<10} {:>12} {:>12} {:>12}",
        "name", "V [V]", "I [A]", "P [W]"
    );
    for name in element_names(circuit) {
        if let Some(result) = solution.elements.get(&name) {
            println!(
                "  {:<10} {:>12.6} {:>12.6} {:>12.6}",
                name, result.voltage, result.current, result.power
            );
        }
    }

    let balance = format!("{:.6e} W", solution.power_balance);
    if solution.is_balanced(BALANCE_TOLERANCE) {
        println!("\nPower balance: {}", balance.green());
    } else {
        println!("\nPower balance: {}", balance.red().bold());
    }
}

/// Export a solution to the given path in the chosen format.
pub fn export(
    circuit: &Circuit,
    solution: &Solution,
    path: impl AsRef<Path>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Csv => write_csv(circuit, solution, path),
        OutputFormat::Json => write_json(solution, path),
    }
}

fn export_error(path: &Path, reason: impl ToString) -> DcsimError {
    DcsimError::Export {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// One wide CSV row: V(<node>) columns, then I(<element>) and P(<element>).
pub fn write_csv(circuit: &Circuit, solution: &Solution, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| export_error(path, e))?;
    let mut writer = Writer::from_writer(file);

    let mut labels: Vec<&String> = solution.voltages.keys().collect();
    labels.sort();
    let names = element_names(circuit);

    let mut header = Vec::new();
    for label in &labels {
        header.push(format!("V({})", label));
    }
    for name in &names {
        header.push(format!("I({})", name));
        header.push(format!("P({})", name));
    }
    writer
        .write_record(&header)
        .map_err(|e| export_error(path, e))?;

    let mut record = Vec::new();
    for label in &labels {
        record.push(solution.voltages[*label].to_string());
    }
    for name in &names {
        let result = &solution.elements[name];
        record.push(result.current.to_string());
        record.push(result.power.to_string());
    }
    writer
        .write_record(&record)
        .map_err(|e| export_error(path, e))?;
    writer.flush().map_err(|e| export_error(path, e))?;

    info!("results exported to CSV: {}", path.display());
    Ok(())
}

/// Full solution as pretty JSON.
pub fn write_json(solution: &Solution, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| export_error(path, e))?;
    serde_json::to_writer_pretty(file, solution).map_err(|e| export_error(path, e))?;

    info!("results exported to JSON: {}", path.display());
    Ok(())
}
