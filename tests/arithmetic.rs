//! Carry-chain composition checked against native 32-bit arithmetic

use nibble_compose::{
    ConstraintValidator, GeneratorConfig, InstructionKind, NibbleDecomposer, PlanValidator, ViolationPolicy,
};
use proptest::prelude::*;
use std::sync::OnceLock;

fn validator() -> &'static PlanValidator {
    static VALIDATOR: OnceLock<PlanValidator> = OnceLock::new();
    VALIDATOR.get_or_init(|| PlanValidator::new(&GeneratorConfig::default()).unwrap())
}

fn run(kind: InstructionKind, inputs: &[u32]) -> Vec<u32> {
    validator()
        .execute(kind, inputs)
        .unwrap()
        .into_iter()
        .map(|v| v.expect("every result bit is determined"))
        .collect()
}

proptest! {
    #[test]
    fn add_matches_wrapping_add(a in any::<u32>(), b in any::<u32>()) {
        let (sum, carry) = a.overflowing_add(b);
        prop_assert_eq!(run(InstructionKind::Add, &[a, b]), vec![sum, carry as u32]);
    }

    #[test]
    fn sub_matches_wrapping_sub_with_borrow(a in any::<u32>(), b in any::<u32>()) {
        prop_assert_eq!(run(InstructionKind::Sub, &[a, b]), vec![a.wrapping_sub(b), (a < b) as u32]);
    }

    #[test]
    fn shifts_move_one_bit(a in any::<u32>()) {
        prop_assert_eq!(run(InstructionKind::Shl, &[a]), vec![a << 1, a >> 31]);
        prop_assert_eq!(run(InstructionKind::Shr, &[a]), vec![a >> 1, a & 1]);
    }

    #[test]
    fn bitwise_is_lane_parallel(a in any::<u32>(), b in any::<u32>()) {
        prop_assert_eq!(run(InstructionKind::And, &[a, b]), vec![a & b]);
        prop_assert_eq!(run(InstructionKind::Or, &[a, b]), vec![a | b]);
        prop_assert_eq!(run(InstructionKind::Xor, &[a, b]), vec![a ^ b]);
        prop_assert_eq!(run(InstructionKind::Not, &[a]), vec![!a]);
    }

    #[test]
    fn wrong_sum_is_a_violation(a in any::<u32>(), b in any::<u32>(), flip in 0u32..32) {
        let (sum, carry) = a.overflowing_add(b);
        let v = validator();
        prop_assert!(v.validate(InstructionKind::Add, &[a, b], &[sum, carry as u32]).unwrap());
        prop_assert!(!v.validate(InstructionKind::Add, &[a, b], &[sum ^ (1 << flip), carry as u32]).unwrap());
    }

    #[test]
    fn low_byte_of_word_addition(a in 0u32..256, b in 0u32..256) {
        // 8-bit operands inside the 32-bit composition: the carry out of
        // nibble 1 lands in bit 8 and the flag stays clear
        prop_assert_eq!(run(InstructionKind::Add, &[a, b]), vec![a + b, 0]);
    }
}

#[test]
fn add_is_exact_over_every_byte_pair_at_two_nibbles() {
    let validator = PlanValidator::with_decomposer(
        NibbleDecomposer::with_width(2).unwrap(),
        ViolationPolicy::Advisory,
    );
    for a in 0u32..256 {
        for b in 0u32..256 {
            let outputs = validator.execute(InstructionKind::Add, &[a, b]).unwrap();
            assert_eq!(
                outputs,
                vec![Some((a + b) & 0xFF), Some((a + b > 0xFF) as u32)],
                "{} + {}",
                a,
                b
            );
        }
    }
}

#[test]
fn operands_wider_than_the_width_are_truncated() {
    let validator = PlanValidator::with_decomposer(
        NibbleDecomposer::with_width(2).unwrap(),
        ViolationPolicy::Advisory,
    );
    let outputs = validator.execute(InstructionKind::Add, &[0x1FF, 0x101]).unwrap();
    assert_eq!(outputs, vec![Some(0x00), Some(1)]);
}

#[test]
fn halt_policy_surfaces_the_violated_clause() {
    let config = GeneratorConfig {
        violation_policy: ViolationPolicy::Halt,
        ..GeneratorConfig::default()
    };
    let validator = PlanValidator::new(&config).unwrap();
    assert!(validator.validate(InstructionKind::Sub, &[5, 3], &[2, 0]).unwrap());
    let err = validator.validate(InstructionKind::Sub, &[5, 3], &[2, 1]).unwrap_err();
    assert!(err.to_string().contains("SUB"), "{}", err);
    assert_eq!(validator.validations(), 2);
    assert_eq!(validator.violations(), 1);
}
