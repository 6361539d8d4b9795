//! Placeholder cryptographic chains
//!
//! HASH, SIGN and VERIFY fold their input nibble by nibble through a 4-bit
//! running state. The mixing step is pluggable; [`RotateXorMix`] is the
//! default and carries no cryptographic strength.

use std::fmt;

use super::{NibbleClauses, PlanBuilder};
use crate::contract::{CarryFlags, ComponentKind, Expr, Role, VariableId};
use crate::isa::CryptoOp;

/// One step of a nibble-serial mixing function.
///
/// `mix` must agree with `reference` on every input: the expression form is
/// what gets emitted, the integer form is what the validator checks against.
pub trait MixingFunction: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// State before the first nibble (low 4 bits used)
    fn initial_state(&self) -> u8 {
        0
    }

    /// Next state bits from the current state bits and the nibble input bits
    fn mix(&self, state: [Expr; 4], input: [Expr; 4]) -> [Expr; 4];

    /// Integer form of [`MixingFunction::mix`] on 4-bit values
    fn reference(&self, state: u8, input: u8) -> u8;
}

/// `t = input ^ state`, rotate `t` left by one, then combine lanes pairwise
#[derive(Debug, Clone, Copy, Default)]
pub struct RotateXorMix;

impl MixingFunction for RotateXorMix {
    fn name(&self) -> &str {
        "rotate-xor"
    }

    fn mix(&self, state: [Expr; 4], input: [Expr; 4]) -> [Expr; 4] {
        let [s0, s1, s2, s3] = state;
        let [i0, i1, i2, i3] = input;
        let t = [Expr::xor(i0, s0), Expr::xor(i1, s1), Expr::xor(i2, s2), Expr::xor(i3, s3)];
        let r = [t[3].clone(), t[0].clone(), t[1].clone(), t[2].clone()];
        [
            Expr::and(r[0].clone(), t[1].clone()),
            Expr::or(r[1].clone(), t[2].clone()),
            Expr::xor(r[2].clone(), t[3].clone()),
            Expr::and(r[3].clone(), t[0].clone()),
        ]
    }

    fn reference(&self, state: u8, input: u8) -> u8 {
        let t = (input ^ state) & 0xF;
        let bit = |v: u8, i: u8| (v >> i) & 1;
        let r = ((t << 1) | (t >> 3)) & 0xF;
        let out0 = bit(r, 0) & bit(t, 1);
        let out1 = bit(r, 1) | bit(t, 2);
        let out2 = bit(r, 2) ^ bit(t, 3);
        let out3 = bit(r, 3) & bit(t, 0);
        out0 | (out1 << 1) | (out2 << 2) | (out3 << 3)
    }
}

/// Runs `mixer` over the low `width` nibbles of `message`, mixed with `key` for SIGN/VERIFY
pub fn reference_digest(mixer: &dyn MixingFunction, width: u8, message: u32, key: Option<u32>) -> u8 {
    let mut state = mixer.initial_state() & 0xF;
    for n in 0..width as u32 {
        let mut input = ((message >> (4 * n)) & 0xF) as u8;
        if let Some(key) = key {
            input ^= ((key >> (4 * n)) & 0xF) as u8;
        }
        state = mixer.reference(state, input) & 0xF;
    }
    state
}

pub(crate) fn build(builder: &mut PlanBuilder, op: CryptoOp, mixer: &dyn MixingFunction) {
    let kind = builder.kind();
    let width = builder.width();
    let keyed = op != CryptoOp::Hash;
    let initial = mixer.initial_state();

    let mut previous = None;
    for n in 0..width {
        let mut clauses = NibbleClauses::default();
        let state: [Expr; 4] = std::array::from_fn(|i| {
            if n == 0 {
                Expr::constant((initial >> i) & 1 == 1)
            } else {
                Expr::var(VariableId::bit(kind, n, Role::StateIn(i as u8)))
            }
        });
        if n > 0 {
            for i in 0..4 {
                clauses.assume_boolean(VariableId::bit(kind, n, Role::StateIn(i)));
            }
        }
        let input: [Expr; 4] = std::array::from_fn(|i| {
            let message = Expr::var(VariableId::bit(kind, n, Role::Message(i as u8)));
            if keyed {
                Expr::xor(message, Expr::var(VariableId::bit(kind, n, Role::Key(i as u8))))
            } else {
                message
            }
        });

        for (i, value) in mixer.mix(state, input).into_iter().enumerate() {
            clauses.export(VariableId::bit(kind, n, Role::StateOut(i as u8)), value);
        }

        let carries = CarryFlags {
            carry_in: n > 0,
            carry_out: n + 1 < width,
        };
        let name = builder.nibble_name(None, n);
        let index = builder.push_nibble(clauses.into_nibble(name, n, carries));
        if let Some(prev) = previous {
            for i in 0..4u8 {
                builder.link(
                    prev,
                    index,
                    VariableId::bit(kind, n - 1, Role::StateOut(i)),
                    VariableId::bit(kind, n, Role::StateIn(i)),
                    Some(i as usize),
                );
            }
        }
        previous = Some(index);
    }

    if op == CryptoOp::Verify {
        let last = width - 1;
        let mut clauses = NibbleClauses::default();
        for i in 0..4 {
            clauses.assume_boolean(VariableId::bit(kind, last, Role::StateOut(i)));
        }
        let matches = Expr::all((0..4).map(|i| {
            Expr::xnor(
                Expr::var(VariableId::bit(kind, last, Role::StateOut(i))),
                Expr::var(VariableId::bit(kind, 0, Role::Tag(i))),
            )
        }));
        clauses.export(VariableId::instruction(kind, Role::Ok), matches);
        builder.push_extra(clauses.into_standalone(format!("{}_tag_check", kind.prefix()), ComponentKind::Check));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Assignment;
    use crate::decompose::NibbleDecomposer;
    use crate::isa::InstructionKind;

    #[test]
    fn test_mix_matches_reference_exhaustively() {
        let mixer = RotateXorMix;
        let kind = InstructionKind::Hash;
        let q = |i: u8| VariableId::bit(kind, 1, Role::StateIn(i));
        let m = |i: u8| VariableId::bit(kind, 1, Role::Message(i));
        let out = mixer.mix(
            std::array::from_fn(|i| Expr::var(q(i as u8))),
            std::array::from_fn(|i| Expr::var(m(i as u8))),
        );
        for state in 0..16u8 {
            for input in 0..16u8 {
                let mut assignment = Assignment::new();
                for i in 0..4 {
                    assignment.insert(q(i), (state >> i) & 1 == 1);
                    assignment.insert(m(i), (input >> i) & 1 == 1);
                }
                let expected = mixer.reference(state, input);
                for (i, expr) in out.iter().enumerate() {
                    assert_eq!(expr.eval(&assignment), Some((expected >> i) & 1 == 1));
                }
            }
        }
    }

    #[test]
    fn test_hash_links_four_state_bits_per_boundary() {
        let plan = NibbleDecomposer::with_width(8)
            .unwrap()
            .decompose(InstructionKind::Hash)
            .unwrap();
        assert_eq!(plan.links.len(), 28);
        assert_eq!(plan.nibble_components().count(), 8);
        assert!(plan.component("hash_link_0_to_1_3").is_some());
        // the first nibble starts from the constant initial state
        assert!(plan.components[0].contract.assumptions().is_empty());
    }

    #[test]
    fn test_verify_has_tag_check() {
        let plan = NibbleDecomposer::with_width(8)
            .unwrap()
            .decompose(InstructionKind::Verify)
            .unwrap();
        let check = plan.component("verify_tag_check").unwrap();
        assert!(check.contract.expression().contains("verify_tg0"));
        assert!(plan.component("sign_tag_check").is_none());
    }

    #[test]
    fn test_reference_digest_is_deterministic() {
        let a = reference_digest(&RotateXorMix, 8, 0xDEAD_BEEF, None);
        let b = reference_digest(&RotateXorMix, 8, 0xDEAD_BEEF, None);
        assert_eq!(a, b);
        assert!(a < 16);
        assert_eq!(
            reference_digest(&RotateXorMix, 8, 0x1234, Some(0)),
            reference_digest(&RotateXorMix, 8, 0x1234, None)
        );
    }
}
