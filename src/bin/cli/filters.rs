//! Filtering logic for instruction selection
//!
//! Filters instructions by family label and mnemonic pattern.

use regex::RegexBuilder;

use nibble_compose::InstructionKind;

/// Filter instructions based on criteria
pub fn filter_instructions(
    instructions: &[InstructionKind],
    family: Option<&str>,
    pattern: Option<&str>,
) -> Vec<InstructionKind> {
    instructions
        .iter()
        .copied()
        .filter(|kind| {
            if let Some(family) = family {
                if !matches_family(*kind, family) {
                    return false;
                }
            }

            if let Some(pattern) = pattern {
                if !matches_name(kind.mnemonic(), pattern) {
                    return false;
                }
            }

            true
        })
        .collect()
}

fn matches_family(kind: InstructionKind, family: &str) -> bool {
    kind.family().label().eq_ignore_ascii_case(family.trim())
}

/// Case-insensitive whole-name match; `*` matches any run of characters
pub fn matches_name(name: &str, pattern: &str) -> bool {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    match RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => re.is_match(name),
        Err(_) => name.eq_ignore_ascii_case(pattern),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_name() {
        assert!(matches_name("JNZ", "j*"));
        assert!(matches_name("JNZ", "*nz"));
        assert!(matches_name("MSTORE", "*STORE"));
        assert!(matches_name("ADD", "add"));
        assert!(!matches_name("ADD", "ad"));
        assert!(!matches_name("LOAD", "*STORE"));
    }

    #[test]
    fn test_filter_by_family_and_pattern() {
        let comparisons = filter_instructions(&InstructionKind::ALL, Some("comparison"), None);
        assert_eq!(comparisons.len(), 6);

        let jumps = filter_instructions(&InstructionKind::ALL, Some("control"), Some("J*"));
        assert_eq!(
            jumps,
            vec![InstructionKind::Jmp, InstructionKind::Jz, InstructionKind::Jnz]
        );

        assert!(filter_instructions(&InstructionKind::ALL, Some("vector"), None).is_empty());
    }
}
