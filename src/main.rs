use clap::ArgMatches;
use colored::Colorize;
use log::{info, warn};
use std::path::Path;

mod analysis;
mod circuit;
mod cli;
mod error;
mod mna;
mod netlist;
mod output;
mod solver;
mod value;

use crate::analysis::SolveOptions;
use crate::cli::CliArgs;
use crate::netlist::NetlistParser;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    env_logger::init();

    let matches = cli::create_cli().get_matches();

    if let Err(e) = run_application(&matches) {
        eprintln!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

fn run_application(matches: &ArgMatches) -> anyhow::Result<()> {
    let args = CliArgs::from_matches(matches)?;

    info!("loading netlist: {}", args.input_file);
    if !Path::new(&args.input_file).exists() {
        return Err(anyhow::anyhow!("Input file '{}' not found", args.input_file));
    }

    let parsed = NetlistParser::new()
        .strict(args.strict)
        .parse_file(&args.input_file)?;
    for issue in &parsed.issues {
        warn!(
            "{}",
            format!(
                "skipped netlist line {}: {} ({})",
                issue.line, issue.text, issue.reason
            )
            .yellow()
        );
    }

    let options = SolveOptions {
        regularize: args.regularize,
        ..SolveOptions::default()
    };
    let solution = parsed.circuit.solve_with(&options)?;

    output::print_solution(&parsed.circuit, &solution);

    if let Some(output_file) = &args.output_file {
        output::export(&parsed.circuit, &solution, output_file, args.output_format)?;
        println!("Results exported to: {}", output_file.bright_green());
    }

    Ok(())
}
