//! External solver driver
//!
//! Runs `<driver> <query file>` with a bounded wait. The driver prints
//! `solution:` followed by an assignment when the query is satisfiable.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use super::{SolverBackend, SolverVerdict};
use crate::error::SolverError;

#[derive(Debug, Clone)]
pub struct ProcessBackend {
    driver: PathBuf,
    timeout: Duration,
}

impl ProcessBackend {
    pub fn new(driver: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            driver: driver.into(),
            timeout,
        }
    }

    pub fn driver(&self) -> &Path {
        &self.driver
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn spawn(&self, command: &mut Command) -> Result<Child, SolverError> {
        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    SolverError::Unavailable(format!("{}: {}", self.driver.display(), e))
                }
                _ => SolverError::Io(e),
            })
    }

    fn wait(&self, mut child: Child) -> Result<Output, SolverError> {
        match child.wait_timeout(self.timeout)? {
            Some(_) => Ok(child.wait_with_output()?),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(driver = %self.driver.display(), timeout = ?self.timeout, "solver timed out");
                Err(SolverError::Timeout(self.timeout))
            }
        }
    }
}

impl SolverBackend for ProcessBackend {
    fn name(&self) -> &str {
        "process"
    }

    fn check_file(&self, path: &Path) -> Result<SolverVerdict, SolverError> {
        debug!(driver = %self.driver.display(), file = %path.display(), "running solver");
        let child = self.spawn(Command::new(&self.driver).arg(path).stdin(Stdio::null()))?;
        let output = self.wait(child)?;
        Ok(parse_output(&output))
    }

    /// Feeds the query on stdin
    fn check_query(&self, query: &str) -> Result<SolverVerdict, SolverError> {
        let mut child = self.spawn(Command::new(&self.driver).stdin(Stdio::piped()))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(query.as_bytes())?;
        }
        let output = self.wait(child)?;
        Ok(parse_output(&output))
    }
}

fn parse_output(output: &Output) -> SolverVerdict {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    classify(&stdout, &stderr)
}

/// Verdict from the driver's output streams.
///
/// Only `solution:` on stdout proves anything. Any other output, whether the
/// driver found no solution or failed outright, leaves the query unproven.
pub fn classify(stdout: &str, stderr: &str) -> SolverVerdict {
    if stdout.contains("solution:") {
        return SolverVerdict::Satisfiable { witness: None };
    }
    let first_line = |text: &str| {
        text.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    };
    let reason = first_line(stderr)
        .or_else(|| first_line(stdout))
        .unwrap_or_else(|| "no solution in solver output".to_string());
    SolverVerdict::Unproven { reason }
}
