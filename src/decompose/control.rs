//! Control flow: jumps, conditional jumps, call and return

use super::arith::{Addend, CarryChain, FinalCarry};
use super::{export_copy, NibbleClauses, PlanBuilder};
use crate::contract::{CarryFlags, ComponentKind, Expr, Role, VariableId};
use crate::isa::{ControlOp, InstructionKind};

/// Aggregator result a conditional jump takes its branch decision from
pub(crate) fn condition_source(op: ControlOp) -> Option<VariableId> {
    match op {
        ControlOp::Jz => Some(VariableId::instruction(InstructionKind::Eq, Role::EqualFinal)),
        ControlOp::Jnz => Some(VariableId::instruction(InstructionKind::Neq, Role::DifferFinal)),
        _ => None,
    }
}

/// PC + instruction size, with the sum in `sum`
fn pc_chain(sum: fn(u8) -> Role, word_bytes: u8) -> CarryChain {
    CarryChain {
        augend: Role::Pc,
        addend: Addend::Constant(word_bytes as u64),
        sum,
        initial_carry: false,
        final_carry: FinalCarry::Discard,
    }
}

pub(crate) fn build(builder: &mut PlanBuilder, op: ControlOp, word_bytes: u8) {
    let kind = builder.kind();
    match op {
        ControlOp::Jmp | ControlOp::Ret => {
            let source = if op == ControlOp::Jmp {
                Role::Target
            } else {
                Role::ReturnAddress
            };
            for n in 0..builder.width() {
                let mut clauses = NibbleClauses::default();
                export_copy(&mut clauses, kind, n, Role::NextPc, source);
                let name = builder.nibble_name(None, n);
                builder.push_nibble(clauses.into_nibble(name, n, CarryFlags::default()));
            }
        }
        ControlOp::Call => {
            pc_chain(Role::ReturnAddress, word_bytes).build(builder, None, |n, clauses| {
                export_copy(clauses, kind, n, Role::NextPc, Role::Target);
            });
        }
        ControlOp::Jz | ControlOp::Jnz => {
            let take = VariableId::instruction(kind, Role::Take);
            pc_chain(Role::Sum, word_bytes).build(builder, None, |n, clauses| {
                clauses.assume_boolean(take);
                for off in 0..4 {
                    let target = Expr::var(VariableId::bit(kind, n, Role::Target(off)));
                    let fallthrough = Expr::var(VariableId::bit(kind, n, Role::Sum(off)));
                    let next = Expr::or(
                        Expr::and(Expr::var(take), target),
                        Expr::and(Expr::not(Expr::var(take)), fallthrough),
                    );
                    clauses.export(VariableId::bit(kind, n, Role::NextPc(off)), next);
                }
            });

            if let Some(source) = condition_source(op) {
                let mut clauses = NibbleClauses::default();
                clauses.assume_boolean(source);
                clauses.export(take, Expr::var(source));
                builder.push_extra(
                    clauses.into_standalone(format!("{}_condition", kind.prefix()), ComponentKind::Check),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompose::NibbleDecomposer;

    #[test]
    fn test_jz_imports_eq_result() {
        let plan = NibbleDecomposer::with_width(8)
            .unwrap()
            .decompose(InstructionKind::Jz)
            .unwrap();
        let condition = plan.component("jz_condition").unwrap();
        assert_eq!(
            condition.contract.expression(),
            "eq_eqf=0|eq_eqf=1 && jz_tk=eq_eqf"
        );
        assert_eq!(plan.links.len(), 7);
        assert_eq!(plan.nibble_components().count(), 8);
    }

    #[test]
    fn test_jnz_imports_neq_result() {
        let plan = NibbleDecomposer::with_width(8)
            .unwrap()
            .decompose(InstructionKind::Jnz)
            .unwrap();
        assert!(plan
            .component("jnz_condition")
            .unwrap()
            .contract
            .expression()
            .ends_with("jnz_tk=neq_nef"));
    }

    #[test]
    fn test_mux_clause() {
        let plan = NibbleDecomposer::with_width(8)
            .unwrap()
            .decompose(InstructionKind::Jz)
            .unwrap();
        let text = plan.components[0].contract.expression();
        assert!(text.contains("jz_n0=((jz_tk&jz_t0)|(jz_tk'&jz_s0))"), "{text}");
    }

    #[test]
    fn test_call_and_return() {
        let decomposer = NibbleDecomposer::with_width(8).unwrap();
        let call = decomposer.decompose(InstructionKind::Call).unwrap();
        assert_eq!(call.links.len(), 7);
        assert!(call.components[0].contract.expression().contains("call_n0=call_t0"));

        let ret = decomposer.decompose(InstructionKind::Ret).unwrap();
        assert!(ret.links.is_empty());
        assert_eq!(ret.components[3].contract.expression().split(" && ").count(), 4);
    }
}
