//! Reports for the `generate` subcommand

use std::fmt::Write;

use nibble_compose::emit::EmitSummary;
use nibble_compose::{BatchReport, InstructionKind, InstructionState};

/// Requested mnemonics; every instruction when none are given
pub fn requested(instructions: Vec<String>) -> Vec<String> {
    if instructions.is_empty() {
        InstructionKind::ALL
            .iter()
            .map(|kind| kind.mnemonic().to_string())
            .collect()
    } else {
        instructions
    }
}

/// Exit status for a finished batch. Partial results only fail the run in
/// strict mode.
pub fn exit_code(report: &BatchReport, strict: bool) -> i32 {
    if strict && !report.is_success() {
        1
    } else {
        0
    }
}

fn status_icon(state: InstructionState) -> &'static str {
    match state {
        InstructionState::Complete => "✅",
        InstructionState::PartiallyFailed => "⚠️ ",
        InstructionState::Blocked => "⛔",
        InstructionState::Pending | InstructionState::Generating => "⏳",
    }
}

/// Format as human-readable text
pub fn format_generate_human(report: &BatchReport, summary: Option<&EmitSummary>) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Generating components ({} nibbles, budget {} chars)...\n\n",
        report.width_nibbles, report.max_expr_chars
    ));

    for outcome in &report.outcomes {
        output.push_str(&format!(
            "{} {}{}: {} ({} passed, {} failed, max length {})\n",
            status_icon(outcome.state),
            outcome.instruction,
            if outcome.implicit { " (dependency)" } else { "" },
            outcome.state.label(),
            outcome.passed(),
            outcome.failed(),
            outcome.max_expression_length
        ));
        for error in outcome.all_errors() {
            output.push_str(&format!("    {}\n", error));
        }
    }
    for error in &report.request_errors {
        output.push_str(&format!("❌ {}\n", error));
    }

    output.push('\n');
    output.push_str(&format!(
        "result: {}. {} complete; {} partially failed; {} blocked; {} rejected requests\n",
        if report.is_success() { "ok" } else { "FAILED" },
        report.count(InstructionState::Complete),
        report.count(InstructionState::PartiallyFailed),
        report.count(InstructionState::Blocked),
        report.request_errors.len()
    ));
    output.push_str(&format!(
        "  Components: {} ({} within budget, {} over)\n",
        report.total_components(),
        report.total_passed(),
        report.total_failed()
    ));
    let waves: Vec<String> = report
        .waves
        .iter()
        .map(|wave| {
            wave.iter()
                .map(|k| k.mnemonic())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    output.push_str(&format!("  Waves: {}\n", waves.join(" | ")));
    match summary {
        Some(s) => output.push_str(&format!(
            "  Files: {} written, {} unchanged\n",
            s.written, s.unchanged
        )),
        None => output.push_str("  Files: none (dry run)\n"),
    }
    output
}

/// Format as JSON
pub fn format_generate_json(report: &BatchReport, summary: Option<&EmitSummary>) -> String {
    use serde_json::json;

    let instructions: Vec<_> = report
        .outcomes
        .iter()
        .map(|o| {
            json!({
                "instruction": o.instruction.mnemonic(),
                "implicit": o.implicit,
                "state": o.state,
                "passed": o.passed(),
                "failed": o.failed(),
                "total_constraint_count": o.total_constraint_count,
                "max_expression_length": o.max_expression_length,
                "errors": o.all_errors().iter().map(ToString::to_string).collect::<Vec<_>>(),
            })
        })
        .collect();

    let mut output = json!({
        "summary": {
            "success": report.is_success(),
            "width_nibbles": report.width_nibbles,
            "max_expr_chars": report.max_expr_chars,
            "components": report.total_components(),
            "passed": report.total_passed(),
            "failed": report.total_failed(),
        },
        "instructions": instructions,
        "rejected_requests": report.request_errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "waves": report.waves.iter()
            .map(|w| w.iter().map(|k| k.mnemonic()).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
    });
    if let Some(s) = summary {
        output["files"] = json!({ "written": s.written, "unchanged": s.unchanged });
    }

    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string()) + "\n"
}

/// Format as JUnit XML: one test case per component, rejections as failures
pub fn format_generate_junit(report: &BatchReport) -> String {
    let total = report.total_components() + report.request_errors.len();
    let failures = report.total_failed() + report.request_errors.len();

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        xml,
        "<testsuites name=\"nibble-compose\" tests=\"{}\" failures=\"{}\" time=\"0.0\">",
        total, failures
    );

    for outcome in &report.outcomes {
        let _ = writeln!(
            xml,
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" time=\"0.0\">",
            outcome.instruction,
            outcome.passed() + outcome.failed(),
            outcome.failed()
        );
        for component in &outcome.accepted {
            let _ = writeln!(
                xml,
                "    <testcase name=\"{}\" classname=\"{}\"/>",
                component.name(),
                outcome.instruction.prefix()
            );
        }
        for rejected in &outcome.rejected {
            let _ = writeln!(
                xml,
                "    <testcase name=\"{}\" classname=\"{}\">\n      <failure message=\"expression too long\">{} chars, limit {}</failure>\n    </testcase>",
                rejected.name,
                outcome.instruction.prefix(),
                rejected.actual_length,
                rejected.limit
            );
        }
        xml.push_str("  </testsuite>\n");
    }

    if !report.request_errors.is_empty() {
        let _ = writeln!(
            xml,
            "  <testsuite name=\"requests\" tests=\"{0}\" failures=\"{0}\" time=\"0.0\">",
            report.request_errors.len()
        );
        for (i, error) in report.request_errors.iter().enumerate() {
            let _ = writeln!(
                xml,
                "    <testcase name=\"request-{}\" classname=\"requests\">\n      <failure message=\"{}\"/>\n    </testcase>",
                i,
                escape_xml(&error.to_string())
            );
        }
        xml.push_str("  </testsuite>\n");
    }

    xml.push_str("</testsuites>\n");
    xml
}

/// Format as Markdown
pub fn format_generate_markdown(report: &BatchReport) -> String {
    let mut md = String::new();

    md.push_str("# Nibble Decomposition Report\n\n");
    md.push_str("## Summary\n\n");
    md.push_str(&format!("- **Width:** {} nibbles\n", report.width_nibbles));
    md.push_str(&format!("- **Budget:** {} chars\n", report.max_expr_chars));
    md.push_str(&format!("- **Components:** {}\n", report.total_components()));
    md.push_str(&format!("- **Within budget:** {} ✅\n", report.total_passed()));
    md.push_str(&format!("- **Over budget:** {} ❌\n\n", report.total_failed()));

    md.push_str("## Instructions\n\n");
    md.push_str("| Instruction | State | Passed | Failed | Constraints | Max length |\n");
    md.push_str("|-------------|-------|--------|--------|-------------|------------|\n");
    for o in &report.outcomes {
        md.push_str(&format!(
            "| `{}`{} | {} {} | {} | {} | {} | {} |\n",
            o.instruction,
            if o.implicit { " *" } else { "" },
            status_icon(o.state).trim_end(),
            o.state.label(),
            o.passed(),
            o.failed(),
            o.total_constraint_count,
            o.max_expression_length
        ));
    }

    let failing: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| !o.all_errors().is_empty())
        .collect();
    if !failing.is_empty() || !report.request_errors.is_empty() {
        md.push_str("\n## Errors\n\n");
        for o in failing {
            for error in o.all_errors() {
                md.push_str(&format!("- `{}`: {}\n", o.instruction, error));
            }
        }
        for error in &report.request_errors {
            md.push_str(&format!("- {}\n", error));
        }
    }

    md
}

pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
