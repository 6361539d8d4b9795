//! Comparison decomposition: per-nibble flags folded by aggregators

use nibble_compose::{
    ComponentKind, GeneratorConfig, InstructionKind, NibbleDecomposer, PlanValidator,
};
use proptest::prelude::*;
use std::sync::OnceLock;

fn validator() -> &'static PlanValidator {
    static VALIDATOR: OnceLock<PlanValidator> = OnceLock::new();
    VALIDATOR.get_or_init(|| PlanValidator::new(&GeneratorConfig::default()).unwrap())
}

fn flag(kind: InstructionKind, a: u32, b: u32) -> u32 {
    let outputs = validator().execute(kind, &[a, b]).unwrap();
    assert_eq!(outputs.len(), 1);
    outputs[0].expect("comparison result is determined")
}

#[test]
fn differing_high_nibble_decides_less_than() {
    // 0x1F and 0x2F agree on nibble 0; nibble 1 decides
    assert_eq!(flag(InstructionKind::Lt, 0x1F, 0x2F), 1);
    assert_eq!(flag(InstructionKind::Gt, 0x1F, 0x2F), 0);
    assert_eq!(flag(InstructionKind::Eq, 0x1F, 0x2F), 0);

    assert_eq!(flag(InstructionKind::Lt, 0x3F, 0x3F), 0);
    assert_eq!(flag(InstructionKind::Eq, 0x3F, 0x3F), 1);
    assert_eq!(flag(InstructionKind::Lte, 0x3F, 0x3F), 1);
    assert_eq!(flag(InstructionKind::Neq, 0x3F, 0x3F), 0);
}

#[test]
fn most_significant_difference_wins_over_lower_nibbles() {
    assert_eq!(flag(InstructionKind::Lt, 0x0FFF_FFFF, 0x1000_0000), 1);
    assert_eq!(flag(InstructionKind::Gt, 0x8000_0000, 0x7FFF_FFFF), 1);
}

#[test]
fn comparison_plans_have_aggregators_and_no_links() {
    let decomposer = NibbleDecomposer::with_width(8).unwrap();
    let expected = [
        (InstructionKind::Eq, 1),
        (InstructionKind::Neq, 1),
        (InstructionKind::Lt, 2),
        (InstructionKind::Gt, 2),
        (InstructionKind::Lte, 3),
        (InstructionKind::Gte, 3),
    ];
    for (kind, aggregators) in expected {
        let plan = decomposer.decompose(kind).unwrap();
        assert!(plan.links.is_empty(), "{}", kind);
        assert_eq!(plan.nibble_components().count(), 8, "{}", kind);
        let found = plan
            .components
            .iter()
            .filter(|c| c.kind == ComponentKind::Aggregate)
            .count();
        assert_eq!(found, aggregators, "{}", kind);
    }
}

proptest! {
    #[test]
    fn comparisons_match_unsigned_order(a in any::<u32>(), b in any::<u32>()) {
        prop_assert_eq!(flag(InstructionKind::Eq, a, b), (a == b) as u32);
        prop_assert_eq!(flag(InstructionKind::Neq, a, b), (a != b) as u32);
        prop_assert_eq!(flag(InstructionKind::Lt, a, b), (a < b) as u32);
        prop_assert_eq!(flag(InstructionKind::Gt, a, b), (a > b) as u32);
        prop_assert_eq!(flag(InstructionKind::Lte, a, b), (a <= b) as u32);
        prop_assert_eq!(flag(InstructionKind::Gte, a, b), (a >= b) as u32);
    }

    #[test]
    fn close_values_compare_correctly(a in any::<u32>(), delta in 0u32..16) {
        // Operands differing only in the low nibble exercise the equal-prefix path
        let b = a ^ delta;
        prop_assert_eq!(flag(InstructionKind::Lt, a, b), (a < b) as u32);
        prop_assert_eq!(flag(InstructionKind::Eq, a, b), (a == b) as u32);
    }
}
