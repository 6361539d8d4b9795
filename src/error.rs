//! Error types for component generation
//!
//! Component-level failures (`ExpressionTooLong`) are recoverable at instruction
//! granularity; request-level failures (`UnknownInstruction`, `DependencyTimeout`)
//! are fatal only for the instruction they name. Nothing here is batch-fatal.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::isa::InstructionKind;

/// A component whose serialized expression exceeds the configured budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: expression too long ({actual_length} chars, limit {limit})")]
pub struct ExpressionTooLong {
    /// Component name
    pub name: String,
    /// Length of the rendered conjunction
    pub actual_length: usize,
    /// Budget in force when the component was checked
    pub limit: usize,
}

/// Errors raised while decomposing or scheduling instructions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error(transparent)]
    ExpressionTooLong(#[from] ExpressionTooLong),

    #[error("unknown instruction: {0}")]
    UnknownInstruction(String),

    #[error("{instruction}: dependency {dependency} did not complete")]
    DependencyTimeout {
        instruction: InstructionKind,
        dependency: InstructionKind,
    },

    #[error("invalid operand width: {0} nibbles (expected 1..=8)")]
    InvalidWidth(u8),

    #[error("{component}: aggregation needs {expected}")]
    MalformedAggregation {
        component: String,
        expected: &'static str,
    },

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

impl GenerationError {
    /// Short machine-readable kind, used in manifests and JSON reports
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::ExpressionTooLong(_) => "expression_too_long",
            GenerationError::UnknownInstruction(_) => "unknown_instruction",
            GenerationError::DependencyTimeout { .. } => "dependency_timeout",
            GenerationError::InvalidWidth(_) => "invalid_width",
            GenerationError::MalformedAggregation { .. } => "malformed_aggregation",
            GenerationError::WorkerPool(_) => "worker_pool",
        }
    }
}

/// Errors raised while writing or reading generated artifacts
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest already has an entry for {0}")]
    DuplicateManifestKey(String),

    #[error("malformed manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl EmitError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EmitError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while reading solver query text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryParseError {
    #[error("at offset {position}: {message}")]
    Expression { position: usize, message: String },

    #[error("not a variable name: {0}")]
    UnknownVariable(String),

    #[error("operators `{first}` and `{second}` mixed without parentheses")]
    MixedOperators { first: char, second: char },

    #[error("line {line}: {message}")]
    Line { line: usize, message: String },

    #[error("query has no solve line")]
    MissingSolve,
}

/// Errors raised at the solver boundary. Callers report `Unavailable` and
/// `Timeout` as unproven, never as unsatisfiable.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("solver unavailable: {0}")]
    Unavailable(String),

    #[error("solver timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unreadable query: {0}")]
    Query(#[from] QueryParseError),
}

/// Errors raised by the VM-side validator
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{instruction}: constraint violated: {clause}")]
    ConstraintViolation {
        instruction: InstructionKind,
        clause: String,
    },

    #[error("{instruction}: expected {inputs} inputs and {outputs} outputs, got {got_inputs} and {got_outputs}")]
    OperandShape {
        instruction: InstructionKind,
        inputs: usize,
        outputs: usize,
        got_inputs: usize,
        got_outputs: usize,
    },

    #[error(transparent)]
    Generation(#[from] GenerationError),
}
