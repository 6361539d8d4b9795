//! Carry chains: ADD, SUB, and the constant-addend chains used for PC+4 and SP±4

use super::{NibbleClauses, PlanBuilder};
use crate::contract::{CarryFlags, Expr, Role, VariableId};
use crate::isa::{ChainOp, InstructionKind};

/// Second operand of a chain
#[derive(Debug, Clone, Copy)]
pub(crate) enum Addend {
    Operand(fn(u8) -> Role),
    /// Bitwise complement of an operand, for subtraction
    Complement(fn(u8) -> Role),
    /// Word constant; bit `k` of the word feeds global bit `k`
    Constant(u64),
}

impl Addend {
    fn bit(&self, kind: InstructionKind, n: u8, off: u8) -> Expr {
        match *self {
            Addend::Operand(role) => Expr::var(VariableId::bit(kind, n, role(off))),
            Addend::Complement(role) => Expr::not(Expr::var(VariableId::bit(kind, n, role(off)))),
            Addend::Constant(value) => {
                let bit = n as u32 * 4 + off as u32;
                Expr::constant(bit < 64 && (value >> bit) & 1 == 1)
            }
        }
    }
}

/// What happens to the carry out of the most significant bit
#[derive(Debug, Clone, Copy)]
pub(crate) enum FinalCarry {
    /// Exported as an instruction-level flag, optionally inverted
    Flag { role: Role, inverted: bool },
    /// Wraps around silently
    Discard,
}

/// A ripple-carry adder split at nibble boundaries.
///
/// Nibble 0 is a half adder unless `initial_carry` is set; every other
/// nibble consumes `ci[n]`, linked from `co[n-1]`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CarryChain {
    pub augend: fn(u8) -> Role,
    pub addend: Addend,
    pub sum: fn(u8) -> Role,
    pub initial_carry: bool,
    pub final_carry: FinalCarry,
}

impl CarryChain {
    /// Clauses of nibble `n` in a chain `width` nibbles wide
    pub fn nibble(&self, kind: InstructionKind, n: u8, width: u8) -> NibbleClauses {
        let last = n + 1 == width;
        let mut clauses = NibbleClauses::default();

        let mut carry = if n == 0 {
            Expr::constant(self.initial_carry)
        } else {
            let ci = VariableId::flag(kind, n, Role::CarryIn);
            clauses.assume_boolean(ci);
            Expr::var(ci)
        };

        for off in 0..4u8 {
            let a = Expr::var(VariableId::bit(kind, n, (self.augend)(off)));
            let b = self.addend.bit(kind, n, off);

            let sum = Expr::parity([a.clone(), b.clone(), carry.clone()]);
            clauses.export(VariableId::bit(kind, n, (self.sum)(off)), sum);

            let next = Expr::or(
                Expr::and(a.clone(), b.clone()),
                Expr::and(carry, Expr::xor(a, b)),
            );

            carry = if off < 3 {
                // Atoms are passed straight to the next bit
                if next.is_atomic() {
                    next
                } else {
                    let k = VariableId::bit(kind, n, Role::Carry(off));
                    clauses.define(k, next);
                    Expr::var(k)
                }
            } else if !last {
                let co = VariableId::flag(kind, n, Role::CarryOut);
                clauses.export(co, next);
                Expr::var(co)
            } else {
                if let FinalCarry::Flag { role, inverted } = self.final_carry {
                    let value = if inverted { Expr::not(next) } else { next };
                    clauses.export(VariableId::instruction(kind, role), value);
                }
                Expr::constant(false)
            };
        }
        clauses
    }

    /// Emits every nibble of the chain and links consecutive carries.
    ///
    /// `extend` may add clauses to each nibble before it becomes a component.
    pub fn build(
        &self,
        builder: &mut PlanBuilder,
        lane: Option<&str>,
        mut extend: impl FnMut(u8, &mut NibbleClauses),
    ) {
        let kind = builder.kind();
        let width = builder.width();
        let mut previous = None;
        for n in 0..width {
            let mut clauses = self.nibble(kind, n, width);
            extend(n, &mut clauses);
            let carries = CarryFlags {
                carry_in: n > 0,
                carry_out: n + 1 < width,
            };
            let name = builder.nibble_name(lane, n);
            let index = builder.push_nibble(clauses.into_nibble(name, n, carries));
            if let Some(prev) = previous {
                builder.link(
                    prev,
                    index,
                    VariableId::flag(kind, n - 1, Role::CarryOut),
                    VariableId::flag(kind, n, Role::CarryIn),
                    None,
                );
            }
            previous = Some(index);
        }
    }
}

pub(crate) fn build(builder: &mut PlanBuilder, op: ChainOp) {
    let addend = match op {
        ChainOp::Add => Addend::Operand(Role::OperandB),
        ChainOp::Sub => Addend::Complement(Role::OperandB),
    };
    let chain = CarryChain {
        augend: Role::OperandA,
        addend,
        sum: Role::Result,
        initial_carry: op == ChainOp::Sub,
        // SUB reports the borrow, the complement of the final carry
        final_carry: FinalCarry::Flag {
            role: Role::Overflow,
            inverted: op == ChainOp::Sub,
        },
    };
    chain.build(builder, None, |_, _| {});
}
