//! Validation run over emitted query files
//!
//! Walks an output directory, checks each query against the solver's hard
//! length ceiling, then hands it to a solver backend.

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};
use walkdir::WalkDir;

use nibble_compose::emit::QUERY_EXTENSION;
use nibble_compose::parser::solve_expression;
use nibble_compose::solver::{backend_for, BuiltinBackend, ProcessBackend};
use nibble_compose::{SolverBackend, SolverConfig, SolverVerdict};

/// Driver used by the process backend when none is configured
pub const DEFAULT_DRIVER: &str = "tau";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    Builtin,
    Process,
    Z3,
}

impl FromStr for BackendChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "builtin" => Ok(BackendChoice::Builtin),
            "process" => Ok(BackendChoice::Process),
            "z3" => Ok(BackendChoice::Z3),
            _ => Err(format!("Unknown backend: {}. Expected: builtin, process, z3", s)),
        }
    }
}

/// The requested backend, or the configured default when none is named
pub fn make_backend(choice: Option<BackendChoice>, config: &SolverConfig) -> Result<Box<dyn SolverBackend>> {
    match choice {
        None => Ok(backend_for(config)),
        Some(BackendChoice::Builtin) => Ok(Box::new(BuiltinBackend::new())),
        Some(BackendChoice::Process) => {
            let driver = config
                .driver
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DRIVER));
            Ok(Box::new(ProcessBackend::new(driver, config.timeout())))
        }
        #[cfg(feature = "z3")]
        Some(BackendChoice::Z3) => Ok(Box::new(nibble_compose::solver::Z3Backend::new(config.timeout()))),
        #[cfg(not(feature = "z3"))]
        Some(BackendChoice::Z3) => bail!("this build does not include the z3 backend (enable the `z3` feature)"),
    }
}

/// One emitted query on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFile {
    pub path: PathBuf,
    /// Path below the output directory, `/`-separated
    pub relative: String,
    /// Directory name, the instruction prefix
    pub instruction: String,
    pub component: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    Satisfiable,
    Unsatisfiable,
    /// No proof either way (timeout, missing driver, driver without `solution:`)
    Unproven { reason: String },
    /// Over the hard ceiling; never sent to the solver
    TooLarge { length: usize, ceiling: usize },
    /// Could not be read or has no `solve` line
    Unreadable { reason: String },
}

impl QueryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            QueryStatus::Satisfiable => "satisfiable",
            QueryStatus::Unsatisfiable => "unsatisfiable",
            QueryStatus::Unproven { .. } => "unproven",
            QueryStatus::TooLarge { .. } => "too_large",
            QueryStatus::Unreadable { .. } => "unreadable",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            QueryStatus::Unsatisfiable | QueryStatus::TooLarge { .. } | QueryStatus::Unreadable { .. }
        )
    }

    /// Whether this result fails a validation run. Strict runs also fail
    /// on queries left unproven.
    pub fn fails_run(&self, strict: bool) -> bool {
        self.is_failure() || (strict && matches!(self, QueryStatus::Unproven { .. }))
    }
}

impl From<SolverVerdict> for QueryStatus {
    fn from(verdict: SolverVerdict) -> Self {
        match verdict {
            SolverVerdict::Satisfiable { .. } => QueryStatus::Satisfiable,
            SolverVerdict::Unsatisfiable => QueryStatus::Unsatisfiable,
            SolverVerdict::Unproven { reason } => QueryStatus::Unproven { reason },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub file: QueryFile,
    pub expression_length: Option<usize>,
    pub status: QueryStatus,
}

/// Result counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub total: usize,
    pub satisfiable: usize,
    pub unsatisfiable: usize,
    pub unproven: usize,
    pub too_large: usize,
    pub unreadable: usize,
}

impl Tally {
    pub fn of(results: &[QueryResult]) -> Self {
        let mut tally = Tally {
            total: results.len(),
            ..Tally::default()
        };
        for result in results {
            match result.status {
                QueryStatus::Satisfiable => tally.satisfiable += 1,
                QueryStatus::Unsatisfiable => tally.unsatisfiable += 1,
                QueryStatus::Unproven { .. } => tally.unproven += 1,
                QueryStatus::TooLarge { .. } => tally.too_large += 1,
                QueryStatus::Unreadable { .. } => tally.unreadable += 1,
            }
        }
        tally
    }
}

/// Every query file under `dir`, sorted by relative path
pub fn discover_queries(dir: &Path) -> Result<Vec<QueryFile>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|s| s.to_str()) != Some(QUERY_EXTENSION)
        {
            continue;
        }
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let component = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let instruction = if parts.len() > 1 {
            parts[parts.len() - 2].clone()
        } else {
            String::new()
        };
        files.push(QueryFile {
            path: path.to_path_buf(),
            relative: parts.join("/"),
            instruction,
            component,
        });
    }
    debug!(dir = %dir.display(), files = files.len(), "discovered query files");
    Ok(files)
}

/// Checks one file: length first, then the solver
pub fn validate_one(file: &QueryFile, backend: &dyn SolverBackend, hard_ceiling: usize) -> QueryResult {
    let text = match std::fs::read_to_string(&file.path) {
        Ok(t) => t,
        Err(e) => {
            return QueryResult {
                file: file.clone(),
                expression_length: None,
                status: QueryStatus::Unreadable {
                    reason: e.to_string(),
                },
            }
        }
    };
    let Some(expression) = solve_expression(&text) else {
        return QueryResult {
            file: file.clone(),
            expression_length: None,
            status: QueryStatus::Unreadable {
                reason: "no solve line".to_string(),
            },
        };
    };

    let length = expression.len();
    let status = if length > hard_ceiling {
        QueryStatus::TooLarge {
            length,
            ceiling: hard_ceiling,
        }
    } else {
        SolverVerdict::from_result(backend.check_file(&file.path)).into()
    };
    QueryResult {
        file: file.clone(),
        expression_length: Some(length),
        status,
    }
}

/// Runs every file through `backend` on `jobs` threads. Results keep the
/// order of `files`.
pub fn validate_queries(
    files: &[QueryFile],
    backend: &dyn SolverBackend,
    hard_ceiling: usize,
    jobs: usize,
) -> Result<Vec<QueryResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("building validation thread pool")?;
    let results: Vec<QueryResult> = pool.install(|| {
        files
            .par_iter()
            .map(|file| validate_one(file, backend, hard_ceiling))
            .collect()
    });

    let tally = Tally::of(&results);
    info!(
        backend = backend.name(),
        total = tally.total,
        satisfiable = tally.satisfiable,
        unsatisfiable = tally.unsatisfiable,
        unproven = tally.unproven,
        too_large = tally.too_large,
        "validation finished"
    );
    Ok(results)
}
