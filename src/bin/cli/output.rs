//! Output formatting for validation results
//!
//! Formats results as human-readable, JSON, JUnit XML, or Markdown

use std::fmt::Write;

use super::generate::escape_xml;
use super::validate::{QueryResult, QueryStatus, Tally};

/// Format validation results
pub fn format_results(results: &[QueryResult], backend: &str, format: &str) -> String {
    match format {
        "human" => format_human(results, backend),
        "json" => format_json(results, backend),
        "junit" => format_junit(results),
        "markdown" => format_markdown(results, backend),
        _ => format_human(results, backend),
    }
}

fn length_text(result: &QueryResult) -> String {
    result
        .expression_length
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Format as human-readable text
fn format_human(results: &[QueryResult], backend: &str) -> String {
    let mut output = String::new();
    output.push_str(&format!("Validating queries with the {} backend...\n\n", backend));

    for result in results {
        match &result.status {
            QueryStatus::Satisfiable => {
                output.push_str(&format!("  ✅ {} ({} chars)\n", result.file.relative, length_text(result)));
            }
            QueryStatus::Unsatisfiable => {
                output.push_str(&format!("  ❌ {}: UNSATISFIABLE\n", result.file.relative));
            }
            QueryStatus::Unproven { reason } => {
                output.push_str(&format!("  ⏳ {}: unproven ({})\n", result.file.relative, reason));
            }
            QueryStatus::TooLarge { length, ceiling } => {
                output.push_str(&format!(
                    "  ❌ {}: too large ({} chars, ceiling {})\n",
                    result.file.relative, length, ceiling
                ));
            }
            QueryStatus::Unreadable { reason } => {
                output.push_str(&format!("  ❌ {}: unreadable ({})\n", result.file.relative, reason));
            }
        }
    }

    let tally = Tally::of(results);
    let failed = tally.unsatisfiable + tally.too_large + tally.unreadable;
    output.push('\n');
    output.push_str(&format!(
        "test result: {}. {} satisfiable; {} failed; {} unproven\n",
        if failed > 0 { "FAILED" } else { "ok" },
        tally.satisfiable,
        failed,
        tally.unproven
    ));
    output.push_str(&format!("  Queries checked: {}\n", tally.total));
    if let Some(max) = results.iter().filter_map(|r| r.expression_length).max() {
        output.push_str(&format!("  Longest expression: {} chars\n", max));
    }

    output
}

/// Format as JSON
fn format_json(results: &[QueryResult], backend: &str) -> String {
    use serde_json::json;

    let tally = Tally::of(results);
    let json_results: Vec<_> = results
        .iter()
        .map(|result| {
            let mut obj = json!({
                "file": result.file.relative,
                "instruction": result.file.instruction,
                "component": result.file.component,
                "expression_length": result.expression_length,
                "status": result.status.label(),
            });
            match &result.status {
                QueryStatus::Unproven { reason } | QueryStatus::Unreadable { reason } => {
                    obj["reason"] = json!(reason);
                }
                QueryStatus::TooLarge { ceiling, .. } => {
                    obj["ceiling"] = json!(ceiling);
                }
                QueryStatus::Satisfiable | QueryStatus::Unsatisfiable => {}
            }
            obj
        })
        .collect();

    let output = json!({
        "backend": backend,
        "summary": {
            "total": tally.total,
            "satisfiable": tally.satisfiable,
            "unsatisfiable": tally.unsatisfiable,
            "unproven": tally.unproven,
            "too_large": tally.too_large,
            "unreadable": tally.unreadable,
        },
        "results": json_results,
    });

    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string()) + "\n"
}

/// Format as JUnit XML, one suite per instruction directory
fn format_junit(results: &[QueryResult]) -> String {
    let tally = Tally::of(results);
    let failures = tally.unsatisfiable + tally.too_large + tally.unreadable;

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        xml,
        "<testsuites name=\"nibble-compose\" tests=\"{}\" failures=\"{}\" skipped=\"{}\" time=\"0.0\">",
        tally.total, failures, tally.unproven
    );

    let mut start = 0;
    while start < results.len() {
        let suite = &results[start].file.instruction;
        let end = results[start..]
            .iter()
            .position(|r| &r.file.instruction != suite)
            .map_or(results.len(), |offset| start + offset);
        let group = &results[start..end];
        let suite_failures = group.iter().filter(|r| r.status.is_failure()).count();
        let _ = writeln!(
            xml,
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" time=\"0.0\">",
            if suite.is_empty() { "queries" } else { suite },
            group.len(),
            suite_failures
        );
        for result in group {
            let _ = write!(
                xml,
                "    <testcase name=\"{}\" classname=\"{}\"",
                result.file.component, suite
            );
            match &result.status {
                QueryStatus::Satisfiable => xml.push_str("/>\n"),
                QueryStatus::Unproven { reason } => {
                    let _ = writeln!(
                        xml,
                        ">\n      <skipped message=\"{}\"/>\n    </testcase>",
                        escape_xml(reason)
                    );
                }
                QueryStatus::Unsatisfiable => {
                    xml.push_str(">\n      <failure message=\"unsatisfiable\"/>\n    </testcase>\n");
                }
                QueryStatus::TooLarge { length, ceiling } => {
                    let _ = writeln!(
                        xml,
                        ">\n      <failure message=\"too large\">{} chars, ceiling {}</failure>\n    </testcase>",
                        length, ceiling
                    );
                }
                QueryStatus::Unreadable { reason } => {
                    let _ = writeln!(
                        xml,
                        ">\n      <error message=\"{}\"/>\n    </testcase>",
                        escape_xml(reason)
                    );
                }
            }
        }
        xml.push_str("  </testsuite>\n");
        start = end;
    }

    xml.push_str("</testsuites>\n");
    xml
}

/// Format as Markdown
fn format_markdown(results: &[QueryResult], backend: &str) -> String {
    let tally = Tally::of(results);
    let mut md = String::new();

    md.push_str("# Query Validation Report\n\n");
    md.push_str(&format!("**Backend:** {}\n\n", backend));

    md.push_str("## Summary\n\n");
    md.push_str(&format!("- **Total Queries:** {}\n", tally.total));
    md.push_str(&format!("- **Satisfiable:** {} ✅\n", tally.satisfiable));
    md.push_str(&format!("- **Unsatisfiable:** {} ❌\n", tally.unsatisfiable));
    md.push_str(&format!("- **Too large:** {} ❌\n", tally.too_large));
    md.push_str(&format!("- **Unproven:** {} ⏳\n\n", tally.unproven));

    md.push_str("## Results\n\n");
    md.push_str("| File | Length | Status |\n");
    md.push_str("|------|--------|--------|\n");
    for result in results {
        let status = match &result.status {
            QueryStatus::Satisfiable => "✅ Satisfiable".to_string(),
            QueryStatus::Unsatisfiable => "❌ Unsatisfiable".to_string(),
            QueryStatus::Unproven { .. } => "⏳ Unproven".to_string(),
            QueryStatus::TooLarge { ceiling, .. } => format!("❌ Too large (> {})", ceiling),
            QueryStatus::Unreadable { .. } => "❌ Unreadable".to_string(),
        };
        md.push_str(&format!(
            "| `{}` | {} | {} |\n",
            result.file.relative,
            length_text(result),
            status
        ));
    }

    let unproven: Vec<_> = results
        .iter()
        .filter_map(|r| match &r.status {
            QueryStatus::Unproven { reason } => Some((r, reason)),
            _ => None,
        })
        .collect();
    if !unproven.is_empty() {
        md.push_str("\n## Unproven Queries\n\n");
        for (result, reason) in unproven {
            md.push_str(&format!("- `{}`: {}\n", result.file.relative, reason));
        }
    }

    md
}
