//! Solver boundary
//!
//! A [`SolverBackend`] decides whether one emitted query is satisfiable.
//! Three backends share the interface:
//! - `process`: runs an external driver on the query file with a timeout
//! - `builtin`: in-process search over the parsed clauses
//! - `z3_backend`: z3 Boolean terms (feature `z3`)

pub mod builtin;
pub mod process;
#[cfg(feature = "z3")]
pub mod z3_backend;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::SolverConfig;
use crate::error::SolverError;

pub use builtin::BuiltinBackend;
pub use process::ProcessBackend;
#[cfg(feature = "z3")]
pub use z3_backend::Z3Backend;

/// Verdict on one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum SolverVerdict {
    Satisfiable {
        /// Variable name to value, when the backend reports one
        witness: Option<BTreeMap<String, bool>>,
    },
    /// Proven by an in-process backend; the external driver never reports it
    Unsatisfiable,
    /// No proof of satisfiability
    Unproven { reason: String },
}

impl SolverVerdict {
    pub fn label(&self) -> &'static str {
        match self {
            SolverVerdict::Satisfiable { .. } => "satisfiable",
            SolverVerdict::Unsatisfiable => "unsatisfiable",
            SolverVerdict::Unproven { .. } => "unproven",
        }
    }

    pub fn is_satisfiable(&self) -> bool {
        matches!(self, SolverVerdict::Satisfiable { .. })
    }

    /// Folds backend failures into a verdict. Unavailable and timed-out
    /// solvers leave the query unproven.
    pub fn from_result(result: Result<SolverVerdict, SolverError>) -> SolverVerdict {
        match result {
            Ok(verdict) => verdict,
            Err(err) => SolverVerdict::Unproven {
                reason: err.to_string(),
            },
        }
    }
}

pub trait SolverBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Checks query text in the emitted format
    fn check_query(&self, query: &str) -> Result<SolverVerdict, SolverError>;

    fn check_file(&self, path: &Path) -> Result<SolverVerdict, SolverError> {
        let query = fs::read_to_string(path)?;
        self.check_query(&query)
    }
}

/// The external driver when one is configured, the built-in search otherwise
pub fn backend_for(config: &SolverConfig) -> Box<dyn SolverBackend> {
    match &config.driver {
        Some(driver) => Box::new(ProcessBackend::new(driver.clone(), config.timeout())),
        None => Box::new(BuiltinBackend::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_failures_are_unproven() {
        let verdict = SolverVerdict::from_result(Err(SolverError::Timeout(Duration::from_secs(5))));
        assert_eq!(verdict.label(), "unproven");
        assert!(!verdict.is_satisfiable());

        let verdict =
            SolverVerdict::from_result(Err(SolverError::Unavailable("tau not found".into())));
        assert!(matches!(verdict, SolverVerdict::Unproven { ref reason } if reason.contains("tau")));
    }

    #[test]
    fn test_default_backend_is_builtin() {
        let backend = backend_for(&SolverConfig::default());
        assert_eq!(backend.name(), "builtin");
    }

    #[test]
    fn test_verdict_json() {
        let json = serde_json::to_string(&SolverVerdict::Unsatisfiable).unwrap();
        assert_eq!(json, r#"{"verdict":"unsatisfiable"}"#);
    }
}
