//! Instruction table for the `list` subcommand

use nibble_compose::{ComponentKind, GenerationError, GeneratorConfig, InstructionKind, NibbleDecomposer};

/// One instruction and the shape of its decomposition
#[derive(Debug, Clone)]
pub struct InstructionRow {
    pub mnemonic: &'static str,
    pub family: &'static str,
    pub dependencies: Vec<&'static str>,
    pub nibbles: usize,
    pub links: usize,
    /// Aggregators and standalone checks
    pub extras: usize,
    pub components: usize,
    pub constraints: usize,
    pub max_expression_length: usize,
}

/// Decomposes each selected instruction at the configured width
pub fn describe(
    config: &GeneratorConfig,
    instructions: &[InstructionKind],
) -> Result<Vec<InstructionRow>, GenerationError> {
    let decomposer = NibbleDecomposer::new(config)?;
    instructions
        .iter()
        .map(|&kind| {
            let plan = decomposer.decompose(kind)?;
            let count = |wanted: &[ComponentKind]| {
                plan.components
                    .iter()
                    .filter(|c| wanted.contains(&c.kind))
                    .count()
            };
            Ok(InstructionRow {
                mnemonic: kind.mnemonic(),
                family: kind.family().label(),
                dependencies: kind.dependencies().iter().map(InstructionKind::mnemonic).collect(),
                nibbles: count(&[ComponentKind::Nibble]),
                links: count(&[ComponentKind::Link]),
                extras: count(&[ComponentKind::Aggregate, ComponentKind::Check]),
                components: plan.components.len(),
                constraints: plan.total_constraint_count,
                max_expression_length: plan
                    .components
                    .iter()
                    .map(|c| c.contract.expression_length())
                    .max()
                    .unwrap_or(0),
            })
        })
        .collect()
}

pub fn format_list_human(rows: &[InstructionRow]) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<8} {:<11} {:>6} {:>6} {:>6} {:>6} {:>8} {:>7}  {}\n",
        "NAME", "FAMILY", "NIBBLE", "LINK", "EXTRA", "TOTAL", "CLAUSES", "MAXLEN", "DEPENDS"
    ));
    for row in rows {
        let deps = if row.dependencies.is_empty() {
            "-".to_string()
        } else {
            row.dependencies.join(", ")
        };
        output.push_str(&format!(
            "{:<8} {:<11} {:>6} {:>6} {:>6} {:>6} {:>8} {:>7}  {}\n",
            row.mnemonic,
            row.family,
            row.nibbles,
            row.links,
            row.extras,
            row.components,
            row.constraints,
            row.max_expression_length,
            deps
        ));
    }
    output.push_str(&format!(
        "\n{} instructions, {} components\n",
        rows.len(),
        rows.iter().map(|r| r.components).sum::<usize>()
    ));
    output
}

pub fn format_list_json(rows: &[InstructionRow]) -> String {
    let rows: Vec<_> = rows
        .iter()
        .map(|r| {
            serde_json::json!({
                "instruction": r.mnemonic,
                "family": r.family,
                "dependencies": r.dependencies,
                "nibble_components": r.nibbles,
                "link_components": r.links,
                "extra_components": r.extras,
                "components": r.components,
                "constraints": r.constraints,
                "max_expression_length": r.max_expression_length,
            })
        })
        .collect();
    serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string()) + "\n"
}

pub fn format_list_markdown(rows: &[InstructionRow]) -> String {
    let mut md = String::new();
    md.push_str("| Instruction | Family | Components | Links | Max length | Depends on |\n");
    md.push_str("|-------------|--------|------------|-------|------------|------------|\n");
    for row in rows {
        md.push_str(&format!(
            "| `{}` | {} | {} | {} | {} | {} |\n",
            row.mnemonic,
            row.family,
            row.components,
            row.links,
            row.max_expression_length,
            if row.dependencies.is_empty() {
                "-".to_string()
            } else {
                row.dependencies.join(", ")
            }
        ));
    }
    md
}
