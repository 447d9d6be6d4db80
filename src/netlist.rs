use std::fs;
use std::path::Path;

use log::debug;
use nom::{
    bytes::complete::take_while1,
    character::complete::{multispace0, multispace1},
    IResult,
};

use crate::circuit::Circuit;
use crate::error::{DcsimError, Result};
use crate::value;

/// One malformed line, kept alongside the parsed circuit in lenient mode.
#[derive(Debug, Clone, PartialEq)]
pub struct LineIssue {
    pub line: usize,
    pub text: String,
    pub reason: String,
}

/// Result of parsing a netlist: the circuit plus any per-line issues.
#[derive(Debug)]
pub struct ParsedNetlist {
    pub circuit: Circuit,
    pub issues: Vec<LineIssue>,
}

impl ParsedNetlist {
    /// True when every data line parsed.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Line-oriented netlist reader.
///
/// Blank lines and lines starting with `*`, `#`, or `;` are comments. Data
/// lines tokenize as `<name> <nodeA> <nodeB> <value>`; the leading character
/// of the name (case-insensitive) selects the element kind (`R`, `V`, `I`)
/// and the value goes through [`value::parse`].
///
/// Malformed lines are never discarded silently: lenient mode (default)
/// records them as [`LineIssue`]s, strict mode fails on the first one.
#[derive(Debug, Clone, Default)]
pub struct NetlistParser {
    strict: bool,
}

impl NetlistParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on the first malformed line instead of collecting issues.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<ParsedNetlist> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| DcsimError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        self.parse_str(&content)
    }

    pub fn parse_str(&self, content: &str) -> Result<ParsedNetlist> {
        let mut circuit = Circuit::new();
        let mut issues = Vec::new();

        for (number, raw) in content.lines().enumerate() {
            let line_no = number + 1;
            let line = raw.trim();
            if line.is_empty() || is_comment(line) {
                continue;
            }

            match apply_data_line(&mut circuit, line) {
                Ok(()) => {}
                Err(reason) => {
                    if self.strict {
                        return Err(DcsimError::netlist_line(line_no, reason));
                    }
                    debug!("netlist line {} skipped: {}", line_no, reason);
                    issues.push(LineIssue {
                        line: line_no,
                        text: line.to_string(),
                        reason,
                    });
                }
            }
        }

        Ok(ParsedNetlist { circuit, issues })
    }
}

fn is_comment(line: &str) -> bool {
    matches!(line.chars().next(), Some('*') | Some('#') | Some(';'))
}

fn token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

/// Tokenize `<name> <nodeA> <nodeB> <value>`; extra trailing tokens are
/// tolerated as in the original format.
fn data_tokens(input: &str) -> IResult<&str, (&str, &str, &str, &str)> {
    let (input, _) = multispace0(input)?;
    let (input, name) = token(input)?;
    let (input, _) = multispace1(input)?;
    let (input, node_a) = token(input)?;
    let (input, _) = multispace1(input)?;
    let (input, node_b) = token(input)?;
    let (input, _) = multispace1(input)?;
    let (input, value) = token(input)?;
    Ok((input, (name, node_a, node_b, value)))
}

fn apply_data_line(circuit: &mut Circuit, line: &str) -> std::result::Result<(), String> {
    let (_, (name, node_a, node_b, value_token)) = data_tokens(line)
        .map_err(|_| "expected '<name> <nodeA> <nodeB> <value>'".to_string())?;

    let value = value::parse(value_token).map_err(|e| e.to_string())?;

    match name.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('R') => circuit.add_resistor(name, node_a, node_b, value),
        Some('V') => circuit.add_voltage_source(name, node_a, node_b, value),
        Some('I') => circuit.add_current_source(name, node_a, node_b, value),
        _ => return Err(format!("unknown element type '{}'", name)),
    }
    Ok(())
}
