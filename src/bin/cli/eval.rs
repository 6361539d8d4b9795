//! The `eval` subcommand: one execution against an instruction's constraints

use anyhow::{anyhow, Result};

use nibble_compose::validator::Execution;
use nibble_compose::{ConstraintValidator, InstructionKind, PlanValidator, ValidationError};

/// What `eval` found
#[derive(Debug, Clone)]
pub enum EvalReport {
    /// Results the constraints determine for the given operands
    Computed {
        instruction: InstructionKind,
        inputs: Vec<u32>,
        outputs: Vec<Option<u32>>,
    },
    /// A full execution checked against the constraints
    Checked {
        execution: Execution,
        /// The policy error when the validator runs in halt mode
        halted: Option<String>,
    },
}

impl EvalReport {
    pub fn is_violation(&self) -> bool {
        match self {
            EvalReport::Computed { .. } => false,
            EvalReport::Checked { execution, .. } => !execution.satisfied,
        }
    }
}

/// Parses a decimal or `0x` hexadecimal word
pub fn parse_word(text: &str) -> Result<u32> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    };
    parsed.map_err(|e| anyhow!("invalid word `{}`: {}", text, e))
}

fn parse_words(texts: &[String]) -> Result<Vec<u32>> {
    texts
        .iter()
        .filter(|t| !t.trim().is_empty())
        .map(|t| parse_word(t))
        .collect()
}

pub fn run_eval(
    validator: &PlanValidator,
    kind: InstructionKind,
    inputs: &[String],
    outputs: Option<&[String]>,
) -> Result<EvalReport> {
    let inputs = parse_words(inputs)?;
    let Some(outputs) = outputs else {
        let outputs = validator.execute(kind, &inputs)?;
        return Ok(EvalReport::Computed {
            instruction: kind,
            inputs,
            outputs,
        });
    };

    let outputs = parse_words(outputs)?;
    let halted = match validator.validate(kind, &inputs, &outputs) {
        Ok(_) => None,
        Err(err @ ValidationError::ConstraintViolation { .. }) => Some(err.to_string()),
        Err(err) => return Err(err.into()),
    };
    let execution = validator.check(kind, &inputs, &outputs)?;
    Ok(EvalReport::Checked { execution, halted })
}

fn word(value: u32) -> String {
    format!("{:#010x} ({})", value, value)
}

pub fn format_eval_human(report: &EvalReport) -> String {
    let mut output = String::new();
    match report {
        EvalReport::Computed {
            instruction,
            inputs,
            outputs,
        } => {
            output.push_str(&format!("{}\n", instruction));
            for (i, value) in inputs.iter().enumerate() {
                output.push_str(&format!("  in[{}]  = {}\n", i, word(*value)));
            }
            for (i, value) in outputs.iter().enumerate() {
                match value {
                    Some(v) => output.push_str(&format!("  out[{}] = {}\n", i, word(*v))),
                    None => output.push_str(&format!("  out[{}] = unconstrained\n", i)),
                }
            }
        }
        EvalReport::Checked { execution, halted } => {
            if execution.satisfied {
                output.push_str(&format!("✅ {}: execution satisfies every constraint\n", execution.instruction));
            } else {
                output.push_str(&format!("❌ {}: constraint violation\n", execution.instruction));
                for clause in &execution.violated {
                    output.push_str(&format!("    violated: {}\n", clause));
                }
                if execution.undetermined > 0 {
                    output.push_str(&format!("    {} clauses undetermined\n", execution.undetermined));
                }
                if let Some(err) = halted {
                    output.push_str(&format!("    halted: {}\n", err));
                }
            }
        }
    }
    output
}
