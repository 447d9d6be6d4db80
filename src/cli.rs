use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};

use crate::output::OutputFormat;

/// Build the command-line interface definition.
pub fn create_cli() -> Command {
    Command::new("dcsim")
        .version(crate::VERSION)
        .about("A DC circuit solver based on Modified Nodal Analysis")
        .arg(
            Arg::new("input")
                .help("Input netlist file (.net)")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output file for solve results"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .default_value("csv")
                .value_parser(["csv", "json"])
                .help("Output format"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(clap::ArgAction::SetTrue)
                .help("Fail on the first malformed netlist line"),
        )
        .arg(
            Arg::new("gmin")
                .long("gmin")
                .action(clap::ArgAction::SetTrue)
                .help("Regularize singular systems with a GMIN leak conductance"),
        )
}

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub input_file: String,
    pub output_file: Option<String>,
    pub output_format: OutputFormat,
    /// Abort on the first malformed netlist line.
    pub strict: bool,
    /// Apply GMIN regularization instead of failing on singular systems.
    pub regularize: bool,
}

impl CliArgs {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let input_file = matches
            .get_one::<String>("input")
            .ok_or_else(|| anyhow!("Input netlist file is required"))?
            .clone();

        let output_file = matches.get_one::<String>("output").cloned();

        let output_format = match matches.get_one::<String>("format").unwrap().as_str() {
            "csv" => OutputFormat::Csv,
            "json" => OutputFormat::Json,
            _ => return Err(anyhow!("Invalid output format")),
        };

        Ok(CliArgs {
            input_file,
            output_file,
            output_format,
            strict: matches.get_flag("strict"),
            regularize: matches.get_flag("gmin"),
        })
    }
}
