//! Generation manifest
//!
//! `manifest.json` summarises a batch: per instruction its state, file list
//! with digests, tallies and contract headers. It has no timestamps, so two
//! runs over the same requests produce identical bytes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::emit::RenderedComponent;
use crate::error::{EmitError, GenerationError};
use crate::orchestrator::{BatchReport, InstructionOutcome, InstructionState};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub generator: String,
    pub max_expr_chars: usize,
    pub width_nibbles: u8,
    pub instructions: BTreeMap<String, InstructionEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_requests: Vec<ErrorEntry>,
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionEntry {
    pub state: InstructionState,
    pub implicit: bool,
    pub component_count: usize,
    pub passed: usize,
    pub failed: usize,
    pub total_constraint_count: usize,
    pub max_expression_length: usize,
    pub files: Vec<FileEntry>,
    pub contracts: BTreeMap<String, ContractEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Relative to the output directory, `/`-separated
    pub path: String,
    pub sha256: String,
    pub expression_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEntry {
    pub assumptions: Vec<String>,
    pub guarantees: Vec<String>,
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub kind: String,
    pub message: String,
}

impl From<&GenerationError> for ErrorEntry {
    fn from(err: &GenerationError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub instructions: usize,
    pub complete: usize,
    pub partially_failed: usize,
    pub blocked: usize,
    pub components: usize,
    pub passed: usize,
    pub failed: usize,
}

impl Manifest {
    pub fn new(max_expr_chars: usize, width_nibbles: u8) -> Self {
        Self {
            generator: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            max_expr_chars,
            width_nibbles,
            instructions: BTreeMap::new(),
            rejected_requests: Vec::new(),
            totals: Totals::default(),
        }
    }

    /// Adds one entry. Each key is written once; a second insert is an error.
    pub fn insert(&mut self, key: impl Into<String>, entry: InstructionEntry) -> Result<(), EmitError> {
        let key = key.into();
        if self.instructions.contains_key(&key) {
            return Err(EmitError::DuplicateManifestKey(key));
        }
        self.totals.instructions += 1;
        match entry.state {
            InstructionState::Complete => self.totals.complete += 1,
            InstructionState::PartiallyFailed => self.totals.partially_failed += 1,
            InstructionState::Blocked => self.totals.blocked += 1,
            InstructionState::Pending | InstructionState::Generating => {}
        }
        self.totals.components += entry.component_count;
        self.totals.passed += entry.passed;
        self.totals.failed += entry.failed;
        self.instructions.insert(key, entry);
        Ok(())
    }

    /// Builds the manifest for `report` from the rendered files of each instruction
    pub fn from_report(
        report: &BatchReport,
        rendered: &BTreeMap<String, Vec<RenderedComponent>>,
    ) -> Result<Self, EmitError> {
        let mut manifest = Manifest::new(report.max_expr_chars, report.width_nibbles);
        for outcome in &report.outcomes {
            let key = outcome.instruction.mnemonic();
            let files = rendered.get(key).map(Vec::as_slice).unwrap_or(&[]);
            manifest.insert(key, entry_for(outcome, files))?;
        }
        manifest.rejected_requests = report.request_errors.iter().map(ErrorEntry::from).collect();
        Ok(manifest)
    }

    pub fn to_json(&self) -> String {
        // Only string keys and plain data: serialization cannot fail
        serde_json::to_string_pretty(self).unwrap_or_default() + "\n"
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    pub fn load(dir: &Path) -> Result<Self, EmitError> {
        let path = Self::path_in(dir);
        let content = std::fs::read_to_string(&path).map_err(|e| EmitError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|source| EmitError::Manifest { path, source })
    }

    /// Every file entry with its instruction key
    pub fn files(&self) -> impl Iterator<Item = (&str, &FileEntry)> {
        self.instructions
            .iter()
            .flat_map(|(key, entry)| entry.files.iter().map(move |f| (key.as_str(), f)))
    }
}

fn entry_for(outcome: &InstructionOutcome, files: &[RenderedComponent]) -> InstructionEntry {
    let contracts = outcome
        .accepted
        .iter()
        .map(|component| {
            let contract = &component.contract;
            let entry = ContractEntry {
                assumptions: contract.assumptions().iter().map(|e| e.to_string()).collect(),
                guarantees: contract.guarantees().iter().map(|e| e.to_string()).collect(),
                variables: contract.variables().iter().map(|v| v.to_string()).collect(),
            };
            (component.name().to_string(), entry)
        })
        .collect();

    InstructionEntry {
        state: outcome.state,
        implicit: outcome.implicit,
        component_count: outcome.passed() + outcome.failed(),
        passed: outcome.passed(),
        failed: outcome.failed(),
        total_constraint_count: outcome.total_constraint_count,
        max_expression_length: outcome.max_expression_length,
        files: files
            .iter()
            .map(|f| FileEntry {
                path: f.manifest_path(),
                sha256: f.digest.clone(),
                expression_length: f.expression_length,
            })
            .collect(),
        contracts,
        errors: outcome.all_errors().iter().map(ErrorEntry::from).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(state: InstructionState) -> InstructionEntry {
        InstructionEntry {
            state,
            implicit: false,
            component_count: 3,
            passed: 2,
            failed: 1,
            total_constraint_count: 10,
            max_expression_length: 400,
            files: Vec::new(),
            contracts: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_keys_are_write_once() {
        let mut manifest = Manifest::new(700, 8);
        manifest.insert("ADD", entry(InstructionState::Complete)).unwrap();
        let err = manifest.insert("ADD", entry(InstructionState::Complete)).unwrap_err();
        assert!(matches!(err, EmitError::DuplicateManifestKey(ref k) if k == "ADD"));
        assert_eq!(manifest.totals.instructions, 1);
    }

    #[test]
    fn test_totals() {
        let mut manifest = Manifest::new(700, 8);
        manifest.insert("ADD", entry(InstructionState::Complete)).unwrap();
        manifest.insert("HASH", entry(InstructionState::PartiallyFailed)).unwrap();
        manifest.insert("JZ", entry(InstructionState::Blocked)).unwrap();
        assert_eq!(manifest.totals.complete, 1);
        assert_eq!(manifest.totals.partially_failed, 1);
        assert_eq!(manifest.totals.blocked, 1);
        assert_eq!(manifest.totals.components, 9);
        assert_eq!(manifest.totals.failed, 3);
    }

    #[test]
    fn test_json_round_trip() {
        let mut manifest = Manifest::new(700, 8);
        manifest.insert("NOP", entry(InstructionState::Complete)).unwrap();
        let json = manifest.to_json();
        assert!(json.contains("\"state\": \"complete\""));
        assert!(!json.contains("rejected_requests"));
        let parsed: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, manifest);
    }
}
