//! Comparisons: local per-nibble flags plus aggregation

use super::{NibbleClauses, PlanBuilder};
use crate::aggregate::{AggregationKind, Aggregator, NibbleFlag};
use crate::contract::{CarryFlags, Expr, Role, VariableId};
use crate::error::GenerationError;
use crate::isa::{CompareOp, InstructionKind};

/// Strict flag within one nibble: bit 3 first, ties fall through to lower bits
fn strict_within(kind: InstructionKind, n: u8, less: bool) -> Expr {
    let a = |off: u8| Expr::var(VariableId::bit(kind, n, Role::OperandA(off)));
    let b = |off: u8| Expr::var(VariableId::bit(kind, n, Role::OperandB(off)));
    let decides = |off: u8| {
        if less {
            Expr::and(Expr::not(a(off)), b(off))
        } else {
            Expr::and(a(off), Expr::not(b(off)))
        }
    };

    let mut acc = decides(0);
    for off in 1..4 {
        acc = Expr::or(decides(off), Expr::and(Expr::xnor(a(off), b(off)), acc));
    }
    acc
}

fn local_flags(builder: &mut PlanBuilder, op: CompareOp) {
    let kind = builder.kind();
    for n in 0..builder.width() {
        let mut clauses = NibbleClauses::default();
        let pairs = || {
            (0..4).map(move |off| {
                (
                    Expr::var(VariableId::bit(kind, n, Role::OperandA(off))),
                    Expr::var(VariableId::bit(kind, n, Role::OperandB(off))),
                )
            })
        };

        if op == CompareOp::Neq {
            let differ = Expr::any(pairs().map(|(a, b)| Expr::xor(a, b)));
            clauses.export(VariableId::flag(kind, n, Role::Differ), differ);
        } else {
            let equal = Expr::all(pairs().map(|(a, b)| Expr::xnor(a, b)));
            clauses.export(VariableId::flag(kind, n, Role::Equal), equal);
        }
        match op {
            CompareOp::Lt | CompareOp::Lte => {
                clauses.export(VariableId::flag(kind, n, Role::Less), strict_within(kind, n, true))
            }
            CompareOp::Gt | CompareOp::Gte => clauses.export(
                VariableId::flag(kind, n, Role::Greater),
                strict_within(kind, n, false),
            ),
            CompareOp::Eq | CompareOp::Neq => {}
        }

        let name = builder.nibble_name(None, n);
        builder.push_nibble(clauses.into_nibble(name, n, CarryFlags::default()));
    }
}

pub(crate) fn build(builder: &mut PlanBuilder, op: CompareOp) -> Result<(), GenerationError> {
    local_flags(builder, op);

    let kind = builder.kind();
    let prefix = kind.prefix();
    let width = builder.width();
    let aggregator = Aggregator::new();
    let per_nibble = |role: Role| -> Vec<NibbleFlag> {
        (0..width)
            .map(|n| NibbleFlag::plain(VariableId::flag(kind, n, role)))
            .collect()
    };
    let lexicographic = |role: Role| -> Vec<NibbleFlag> {
        (0..width)
            .map(|n| {
                NibbleFlag::strict(
                    VariableId::flag(kind, n, role),
                    VariableId::flag(kind, n, Role::Equal),
                )
            })
            .collect()
    };
    let equal_final = VariableId::instruction(kind, Role::EqualFinal);

    match op {
        CompareOp::Eq => {
            builder.push_extra(aggregator.aggregate(
                format!("{prefix}_eq_aggregator"),
                equal_final,
                &per_nibble(Role::Equal),
                AggregationKind::AllEqual,
            )?);
        }
        CompareOp::Neq => {
            builder.push_extra(aggregator.aggregate(
                format!("{prefix}_ne_aggregator"),
                VariableId::instruction(kind, Role::DifferFinal),
                &per_nibble(Role::Differ),
                AggregationKind::AnyDiffer,
            )?);
        }
        CompareOp::Lt | CompareOp::Gt | CompareOp::Lte | CompareOp::Gte => {
            let less = matches!(op, CompareOp::Lt | CompareOp::Lte);
            let (flag_role, final_role, fold, label) = if less {
                (Role::Less, Role::LessFinal, AggregationKind::LexicographicLess, "lt")
            } else {
                (Role::Greater, Role::GreaterFinal, AggregationKind::LexicographicGreater, "gt")
            };
            let strict_final = VariableId::instruction(kind, final_role);

            builder.push_extra(aggregator.aggregate(
                format!("{prefix}_{label}_aggregator"),
                strict_final,
                &lexicographic(flag_role),
                fold,
            )?);
            builder.push_extra(aggregator.aggregate(
                format!("{prefix}_eq_aggregator"),
                equal_final,
                &per_nibble(Role::Equal),
                AggregationKind::AllEqual,
            )?);

            if matches!(op, CompareOp::Lte | CompareOp::Gte) {
                builder.push_extra(aggregator.aggregate(
                    format!("{prefix}_or_eq_aggregator"),
                    VariableId::instruction(kind, Role::OrEqualFinal),
                    &[NibbleFlag::plain(strict_final), NibbleFlag::plain(equal_final)],
                    AggregationKind::OrEqual,
                )?);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Assignment, ComponentKind};
    use crate::decompose::NibbleDecomposer;

    fn aggregates(kind: InstructionKind) -> Vec<String> {
        NibbleDecomposer::with_width(8)
            .unwrap()
            .decompose(kind)
            .unwrap()
            .components
            .iter()
            .filter(|c| c.kind == ComponentKind::Aggregate)
            .map(|c| c.name().to_string())
            .collect()
    }

    #[test]
    fn test_aggregator_sets() {
        assert_eq!(aggregates(InstructionKind::Eq), vec!["eq_eq_aggregator"]);
        assert_eq!(aggregates(InstructionKind::Neq), vec!["neq_ne_aggregator"]);
        assert_eq!(aggregates(InstructionKind::Lt), vec!["lt_lt_aggregator", "lt_eq_aggregator"]);
        assert_eq!(
            aggregates(InstructionKind::Gte),
            vec!["gte_gt_aggregator", "gte_eq_aggregator", "gte_or_eq_aggregator"]
        );
    }

    #[test]
    fn test_strict_within_nibble_exhaustive() {
        for less in [true, false] {
            let expr = strict_within(InstructionKind::Lt, 0, less);
            for a in 0..16u8 {
                for b in 0..16u8 {
                    let mut assignment = Assignment::new();
                    for off in 0..4 {
                        assignment.insert(
                            VariableId::bit(InstructionKind::Lt, 0, Role::OperandA(off)),
                            (a >> off) & 1 == 1,
                        );
                        assignment.insert(
                            VariableId::bit(InstructionKind::Lt, 0, Role::OperandB(off)),
                            (b >> off) & 1 == 1,
                        );
                    }
                    let expected = if less { a < b } else { a > b };
                    assert_eq!(expr.eval(&assignment), Some(expected), "{a} vs {b}");
                }
            }
        }
    }

    #[test]
    fn test_comparison_nibbles_have_no_links() {
        let plan = NibbleDecomposer::with_width(8)
            .unwrap()
            .decompose(InstructionKind::Lte)
            .unwrap();
        assert!(plan.links.is_empty());
        assert_eq!(plan.nibble_components().count(), 8);
        assert_eq!(plan.components.len(), 11);
    }
}
