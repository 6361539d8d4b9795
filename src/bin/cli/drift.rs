//! Generator drift detection
//!
//! Detects when emitted files and the current generator diverge: the
//! instructions recorded in `manifest.json` are regenerated in memory and
//! every digest is compared with the manifest and with the file on disk.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use walkdir::WalkDir;

use nibble_compose::cache::DigestCache;
use nibble_compose::emit::QUERY_EXTENSION;
use nibble_compose::{ComponentEmitter, GeneratorConfig, Manifest, Orchestrator};

use super::generate::escape_xml;

/// Drift detection result
#[derive(Debug, Clone, Default)]
pub struct DriftResult {
    /// Files the generator produces that are absent from the manifest or the disk
    pub missing: Vec<DriftEntry>,
    /// Files whose recorded or on-disk content differs from the generator's
    pub stale: Vec<DriftEntry>,
    /// Files recorded or present that the generator no longer produces
    pub unexpected: Vec<DriftEntry>,
    /// Files that match everywhere
    pub current: usize,
}

/// One drifted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftEntry {
    pub path: String,
    pub detail: String,
}

impl DriftEntry {
    fn new(path: &str, detail: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            detail: detail.into(),
        }
    }
}

impl DriftResult {
    pub fn has_drift(&self) -> bool {
        !self.missing.is_empty() || !self.stale.is_empty() || !self.unexpected.is_empty()
    }
}

/// Detect drift in the output directory `dir`
pub fn detect_drift(dir: &Path, config: &GeneratorConfig) -> Result<DriftResult> {
    let manifest = Manifest::load(dir).context("reading manifest")?;

    // Regenerate with the width and budget the files were produced with
    let mut config = config.clone();
    config.word_nibbles = manifest.width_nibbles;
    config.max_expr_chars = manifest.max_expr_chars;
    config.hard_ceiling = config.hard_ceiling.max(config.max_expr_chars);
    let orchestrator = Orchestrator::new(&config).context("setting up generator")?;
    let requests: Vec<&str> = manifest.instructions.keys().map(String::as_str).collect();
    let report = orchestrator.generate(requests.as_slice());

    let generated: BTreeMap<String, String> = ComponentEmitter::render_report(&report)
        .values()
        .flatten()
        .map(|file| (file.manifest_path(), file.digest.clone()))
        .collect();
    let recorded: BTreeMap<&str, &str> = manifest
        .files()
        .map(|(_, file)| (file.path.as_str(), file.sha256.as_str()))
        .collect();

    let cache = DigestCache::new();
    let mut result = DriftResult::default();
    for (path, digest) in &generated {
        match recorded.get(path.as_str()) {
            None => {
                result.missing.push(DriftEntry::new(path, "not recorded in manifest"));
                continue;
            }
            Some(&sha) if sha != digest.as_str() => {
                result
                    .stale
                    .push(DriftEntry::new(path, "manifest digest differs from generator output"));
                continue;
            }
            Some(_) => {}
        }
        match cache.load(&dir.join(path)) {
            None => result.missing.push(DriftEntry::new(path, "file not on disk")),
            Some(on_disk) if &on_disk != digest => result
                .stale
                .push(DriftEntry::new(path, "file on disk differs from generator output")),
            Some(_) => result.current += 1,
        }
    }

    for path in recorded.keys() {
        if !generated.contains_key(*path) {
            result
                .unexpected
                .push(DriftEntry::new(path, "recorded in manifest but no longer generated"));
        }
    }

    for path in query_files(dir)? {
        if !generated.contains_key(&path) && !recorded.contains_key(path.as_str()) {
            result
                .unexpected
                .push(DriftEntry::new(&path, "file on disk is neither generated nor recorded"));
        }
    }

    Ok(result)
}

/// Query files under `dir`, as `/`-separated relative paths
fn query_files(dir: &Path) -> Result<BTreeSet<String>> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().and_then(|s| s.to_str()) == Some(QUERY_EXTENSION)
        {
            let relative = path.strip_prefix(dir).unwrap_or(path);
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.insert(parts.join("/"));
        }
    }
    Ok(files)
}

fn push_section(output: &mut String, title: &str, entries: &[DriftEntry]) {
    if entries.is_empty() {
        return;
    }
    output.push_str(title);
    output.push('\n');
    output.push_str(&"-".repeat(title.chars().count()));
    output.push('\n');
    for entry in entries {
        output.push_str(&format!("  {} ({})\n", entry.path, entry.detail));
    }
    output.push('\n');
}

/// Format drift report as human-readable text
pub fn format_drift_human(result: &DriftResult) -> String {
    let mut output = String::new();

    output.push_str("=== Generator Drift Report ===\n\n");

    push_section(&mut output, "❌ Missing Files:", &result.missing);
    push_section(&mut output, "⚠️  Stale Files:", &result.stale);
    push_section(&mut output, "ℹ️  Unexpected Files:", &result.unexpected);

    output.push_str("Summary:\n");
    output.push_str("--------\n");
    output.push_str(&format!("  Current: {}\n", result.current));
    output.push_str(&format!("  Missing: {}\n", result.missing.len()));
    output.push_str(&format!("  Stale: {}\n", result.stale.len()));
    output.push_str(&format!("  Unexpected: {}\n", result.unexpected.len()));

    if !result.has_drift() {
        output.push_str("\n✅ No drift detected! Emitted files match the generator.\n");
    }

    output
}

/// Format drift report as JSON
pub fn format_drift_json(result: &DriftResult) -> String {
    let entries = |list: &[DriftEntry]| {
        list.iter()
            .map(|e| serde_json::json!({ "path": e.path, "detail": e.detail }))
            .collect::<Vec<_>>()
    };
    serde_json::json!({
        "current": result.current,
        "missing": entries(&result.missing),
        "stale": entries(&result.stale),
        "unexpected": entries(&result.unexpected),
    })
    .to_string()
        + "\n"
}

/// Format drift report as Markdown
pub fn format_drift_markdown(result: &DriftResult) -> String {
    let mut md = String::new();
    md.push_str("# Generator Drift Report\n\n");
    md.push_str("## Summary\n\n");
    md.push_str(&format!("- **Current:** {}\n", result.current));
    md.push_str(&format!("- **Missing:** {}\n", result.missing.len()));
    md.push_str(&format!("- **Stale:** {}\n", result.stale.len()));
    md.push_str(&format!("- **Unexpected:** {}\n\n", result.unexpected.len()));

    if !result.has_drift() {
        md.push_str("✅ No drift detected.\n");
        return md;
    }

    md.push_str("## Drifted Files\n\n");
    md.push_str("| File | Kind | Detail |\n");
    md.push_str("|------|------|--------|\n");
    let sections = [
        ("missing", &result.missing),
        ("stale", &result.stale),
        ("unexpected", &result.unexpected),
    ];
    for (kind, entries) in sections {
        for entry in entries {
            md.push_str(&format!("| `{}` | {} | {} |\n", entry.path, kind, entry.detail));
        }
    }
    md
}

/// Format drift report as JUnit XML, one failed test case per drifted file
pub fn format_drift_junit(result: &DriftResult) -> String {
    let drifted = result.missing.len() + result.stale.len() + result.unexpected.len();
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!(
        "<testsuite name=\"drift\" tests=\"{}\" failures=\"{}\">\n",
        result.current + drifted,
        drifted
    ));
    let sections = [
        ("missing", &result.missing),
        ("stale", &result.stale),
        ("unexpected", &result.unexpected),
    ];
    for (kind, entries) in sections {
        for entry in entries {
            xml.push_str(&format!(
                "  <testcase name=\"{}\">\n    <failure message=\"{}\">{}</failure>\n  </testcase>\n",
                escape_xml(&entry.path),
                kind,
                escape_xml(&entry.detail)
            ));
        }
    }
    xml.push_str("</testsuite>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn emit(dir: &Path, requests: &[&str]) -> usize {
        let report = Orchestrator::new(&GeneratorConfig::default())
            .unwrap()
            .generate(requests);
        ComponentEmitter::new(dir).emit(&report).unwrap().manifest.totals.passed
    }

    #[test]
    fn test_fresh_output_has_no_drift() {
        let dir = tempfile::tempdir().unwrap();
        let files = emit(dir.path(), &["SUB", "JNZ"]);
        let result = detect_drift(dir.path(), &GeneratorConfig::default()).unwrap();
        assert!(!result.has_drift(), "{:?}", result);
        assert_eq!(result.current, files);
        assert!(format_drift_human(&result).contains("No drift detected"));
        assert!(format_drift_markdown(&result).contains("No drift detected"));
        assert!(format_drift_junit(&result).contains("failures=\"0\""));
    }

    #[test]
    fn test_edited_removed_and_extra_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        emit(dir.path(), &["XOR"]);
        let manifest = Manifest::load(dir.path()).unwrap();
        let paths: Vec<String> = manifest.files().map(|(_, f)| f.path.clone()).collect();

        fs::write(dir.path().join(&paths[0]), "solve 1\nquit\n").unwrap();
        fs::remove_file(dir.path().join(&paths[1])).unwrap();
        fs::write(dir.path().join("xor/leftover.tau"), "solve 1\nquit\n").unwrap();

        let result = detect_drift(dir.path(), &GeneratorConfig::default()).unwrap();
        assert!(result.has_drift());
        assert_eq!(result.stale, vec![DriftEntry::new(&paths[0], "file on disk differs from generator output")]);
        assert_eq!(result.missing, vec![DriftEntry::new(&paths[1], "file not on disk")]);
        assert_eq!(result.unexpected.len(), 1);
        assert_eq!(result.unexpected[0].path, "xor/leftover.tau");
        assert_eq!(result.current, paths.len() - 2);

        let json: serde_json::Value = serde_json::from_str(&format_drift_json(&result)).unwrap();
        assert_eq!(json["stale"][0]["path"], paths[0].as_str());

        let md = format_drift_markdown(&result);
        assert!(md.contains(&format!("| `{}` | stale |", paths[0])));
        assert!(md.contains("| `xor/leftover.tau` | unexpected |"));

        let xml = format_drift_junit(&result);
        assert!(xml.contains(&format!("tests=\"{}\" failures=\"3\"", paths.len() - 2 + 3)));
        assert!(xml.contains("<failure message=\"missing\">file not on disk</failure>"));
    }

    #[test]
    fn test_missing_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(detect_drift(dir.path(), &GeneratorConfig::default()).is_err());
    }
}
