use thiserror::Error;

/// Result type alias using [`DcsimError`].
pub type Result<T> = std::result::Result<T, DcsimError>;

/// Unified error type for all dcsim operations.
#[derive(Error, Debug)]
pub enum DcsimError {
    /// Malformed numeric token or unrecognized magnitude suffix.
    #[error("invalid value '{token}': {reason}")]
    ValueParse { token: String, reason: String },

    /// The assembled system has no unique solution.
    #[error("singular system: {reason}")]
    SingularSystem { reason: String },

    /// A netlist data line could not be parsed.
    #[error("netlist line {line}: {reason}")]
    NetlistLine { line: usize, reason: String },

    /// The circuit has no unknowns to solve for.
    #[error("circuit has no nodes or sources to analyze")]
    EmptyCircuit,

    /// Matrix/vector dimensions do not agree.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Iterative solver ran out of iterations.
    #[error("solver did not converge after {iterations} iterations (residual: {residual:.2e})")]
    NoConvergence { iterations: usize, residual: f64 },

    /// Error reading a netlist file.
    #[error("failed to read '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing an export file.
    #[error("failed to write '{path}': {reason}")]
    Export { path: String, reason: String },
}

impl DcsimError {
    pub fn value_parse(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValueParse {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Singular-matrix failure with the standard diagnostic cause.
    pub fn singular() -> Self {
        Self::SingularSystem {
            reason: "circuit open or node floating".to_string(),
        }
    }

    pub fn netlist_line(line: usize, reason: impl Into<String>) -> Self {
        Self::NetlistLine {
            line,
            reason: reason.into(),
        }
    }
}
