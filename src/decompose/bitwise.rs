//! Bitwise operations (no cross-nibble state) and one-bit shifts

use super::{NibbleClauses, PlanBuilder};
use crate::contract::{CarryFlags, Expr, Role, VariableId};
use crate::isa::{BitwiseOp, ShiftDirection};

pub(crate) fn build_parallel(builder: &mut PlanBuilder, op: BitwiseOp) {
    let kind = builder.kind();
    for n in 0..builder.width() {
        let mut clauses = NibbleClauses::default();
        for off in 0..4 {
            let a = Expr::var(VariableId::bit(kind, n, Role::OperandA(off)));
            let b = || Expr::var(VariableId::bit(kind, n, Role::OperandB(off)));
            let value = match op {
                BitwiseOp::And => Expr::and(a, b()),
                BitwiseOp::Or => Expr::or(a, b()),
                BitwiseOp::Xor => Expr::xor(a, b()),
                BitwiseOp::Not => Expr::not(a),
            };
            clauses.export(VariableId::bit(kind, n, Role::Result(off)), value);
        }
        let name = builder.nibble_name(None, n);
        builder.push_nibble(clauses.into_nibble(name, n, CarryFlags::default()));
    }
}

/// One-bit shifts. The bit shifted out of a nibble is its carry-out and
/// enters the neighbouring nibble as carry-in: upward for SHL, downward for
/// SHR. The bit shifted out of the word is `ovf` (SHL) or `unf` (SHR).
pub(crate) fn build_shift(builder: &mut PlanBuilder, direction: ShiftDirection) {
    let kind = builder.kind();
    let width = builder.width();
    let a = |n: u8, off: u8| Expr::var(VariableId::bit(kind, n, Role::OperandA(off)));

    for n in 0..width {
        let mut clauses = NibbleClauses::default();
        let (has_carry_in, has_carry_out) = match direction {
            ShiftDirection::Left => (n > 0, n + 1 < width),
            ShiftDirection::Right => (n + 1 < width, n > 0),
        };

        let incoming = if has_carry_in {
            let ci = VariableId::flag(kind, n, Role::CarryIn);
            clauses.assume_boolean(ci);
            Expr::var(ci)
        } else {
            Expr::constant(false)
        };

        let (outgoing, results): (Expr, [Expr; 4]) = match direction {
            ShiftDirection::Left => (
                a(n, 3),
                [incoming, a(n, 0), a(n, 1), a(n, 2)],
            ),
            ShiftDirection::Right => (
                a(n, 0),
                [a(n, 1), a(n, 2), a(n, 3), incoming],
            ),
        };
        for (off, value) in results.into_iter().enumerate() {
            clauses.export(VariableId::bit(kind, n, Role::Result(off as u8)), value);
        }

        let out_id = if has_carry_out {
            VariableId::flag(kind, n, Role::CarryOut)
        } else {
            match direction {
                ShiftDirection::Left => VariableId::instruction(kind, Role::Overflow),
                ShiftDirection::Right => VariableId::instruction(kind, Role::Underflow),
            }
        };
        clauses.export(out_id, outgoing);

        let carries = CarryFlags {
            carry_in: has_carry_in,
            carry_out: has_carry_out,
        };
        let name = builder.nibble_name(None, n);
        builder.push_nibble(clauses.into_nibble(name, n, carries));
    }

    // Nibble components sit at indices 0..width in nibble order
    for n in 0..width.saturating_sub(1) {
        let (from, to) = match direction {
            ShiftDirection::Left => (n, n + 1),
            ShiftDirection::Right => (n + 1, n),
        };
        builder.link(
            from as usize,
            to as usize,
            VariableId::flag(kind, from, Role::CarryOut),
            VariableId::flag(kind, to, Role::CarryIn),
            None,
        );
    }
}
