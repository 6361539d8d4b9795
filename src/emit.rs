//! Component emission
//!
//! Accepted components are written as `<out>/<mnemonic>/<component>.tau`,
//! followed by `<out>/manifest.json`. Unchanged files are left alone.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cache::{DigestCache, WriteOutcome};
use crate::contract::Component;
use crate::error::EmitError;
use crate::isa::InstructionKind;
use crate::manifest::Manifest;
use crate::orchestrator::{BatchReport, InstructionOutcome};

/// File extension of emitted queries
pub const QUERY_EXTENSION: &str = "tau";

/// A serialized component, before or after it reaches disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedComponent {
    pub instruction: InstructionKind,
    pub name: String,
    /// Relative to the output directory
    pub relative_path: PathBuf,
    pub content: String,
    pub digest: String,
    pub expression_length: usize,
}

impl RenderedComponent {
    pub fn new(instruction: InstructionKind, component: &Component) -> Self {
        let content = component.serialize();
        Self {
            instruction,
            name: component.name().to_string(),
            relative_path: ComponentEmitter::relative_path(instruction, component.name()),
            digest: DigestCache::digest(&content),
            expression_length: component.contract.expression_length(),
            content,
        }
    }

    /// Path as recorded in the manifest, independent of the platform separator
    pub fn manifest_path(&self) -> String {
        format!("{}/{}.{}", self.instruction.prefix(), self.name, QUERY_EXTENSION)
    }
}

/// Tallies of one emission run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitSummary {
    pub manifest: Manifest,
    pub written: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone)]
pub struct ComponentEmitter {
    root: PathBuf,
    cache: DigestCache,
}

impl ComponentEmitter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: DigestCache::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn relative_path(instruction: InstructionKind, component: &str) -> PathBuf {
        PathBuf::from(instruction.prefix()).join(format!("{}.{}", component, QUERY_EXTENSION))
    }

    /// Serializes the accepted components of `outcome` without touching disk
    pub fn render(outcome: &InstructionOutcome) -> Vec<RenderedComponent> {
        outcome
            .accepted
            .iter()
            .map(|component| RenderedComponent::new(outcome.instruction, component))
            .collect()
    }

    /// Renders every outcome, keyed by mnemonic
    pub fn render_report(report: &BatchReport) -> BTreeMap<String, Vec<RenderedComponent>> {
        report
            .outcomes
            .iter()
            .map(|outcome| (outcome.instruction.mnemonic().to_string(), Self::render(outcome)))
            .collect()
    }

    /// Writes one rendered component, skipping it when the file is current
    pub fn write(&self, rendered: &RenderedComponent) -> Result<WriteOutcome, EmitError> {
        let path = self.root.join(&rendered.relative_path);
        self.cache
            .store(&path, &rendered.content)
            .map_err(|e| EmitError::io(path, e))
    }

    /// Writes every accepted component of `report` and the manifest
    pub fn emit(&self, report: &BatchReport) -> Result<EmitSummary, EmitError> {
        let rendered = Self::render_report(report);
        let mut written = 0;
        let mut unchanged = 0;
        for file in rendered.values().flatten() {
            match self.write(file)? {
                WriteOutcome::Written => written += 1,
                WriteOutcome::Unchanged => unchanged += 1,
            }
        }
        debug!(written, unchanged, "component files emitted");

        let manifest = Manifest::from_report(report, &rendered)?;
        let manifest_path = Manifest::path_in(&self.root);
        self.cache
            .store(&manifest_path, &manifest.to_json())
            .map_err(|e| EmitError::io(&manifest_path, e))?;
        info!(
            root = %self.root.display(),
            written,
            unchanged,
            "wrote manifest"
        );

        Ok(EmitSummary {
            manifest,
            written,
            unchanged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::orchestrator::Orchestrator;
    use std::fs;

    #[test]
    fn test_layout_and_restart() {
        let dir = tempfile::tempdir().unwrap();
        let report = Orchestrator::new(&GeneratorConfig::default())
            .unwrap()
            .generate(&["XOR", "JZ"]);
        let emitter = ComponentEmitter::new(dir.path());

        let first = emitter.emit(&report).unwrap();
        assert_eq!(first.unchanged, 0);
        assert_eq!(first.written, report.total_passed());
        assert!(dir.path().join("xor").join("xor_nibble_0.tau").is_file());
        assert!(dir.path().join("eq").join("eq_eq_aggregator.tau").is_file());
        assert!(dir.path().join("manifest.json").is_file());

        let second = emitter.emit(&report).unwrap();
        assert_eq!(second.written, 0);
        assert_eq!(second.unchanged, first.written);
        assert_eq!(second.manifest, first.manifest);
    }

    #[test]
    fn test_manifest_matches_files() {
        let dir = tempfile::tempdir().unwrap();
        let report = Orchestrator::new(&GeneratorConfig::default())
            .unwrap()
            .generate(&["SUB"]);
        let summary = ComponentEmitter::new(dir.path()).emit(&report).unwrap();

        let loaded = Manifest::load(dir.path()).unwrap();
        assert_eq!(loaded, summary.manifest);
        let sub = &loaded.instructions["SUB"];
        assert_eq!(sub.files.len(), 15);
        for file in &sub.files {
            let content = fs::read_to_string(dir.path().join(&file.path)).unwrap();
            assert_eq!(DigestCache::digest(&content), file.sha256);
            assert!(file.expression_length <= 700);
        }
    }
}
