//! Flag aggregation
//!
//! Folds per-nibble comparison flags into one instruction-level result. The
//! lexicographic kinds walk from the most significant nibble down: the first
//! nibble that is not equal decides.

use crate::contract::{Component, ComponentKind, Contract, Expr, VariableId};
use crate::error::GenerationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationKind {
    /// AND of all flags
    AllEqual,
    /// OR of all flags
    AnyDiffer,
    /// Strict less-than flags folded MSB first
    LexicographicLess,
    /// Strict greater-than flags folded MSB first
    LexicographicGreater,
    /// OR of a strict result and an equality result
    OrEqual,
}

impl AggregationKind {
    fn needs_equal_flags(&self) -> bool {
        matches!(
            self,
            AggregationKind::LexicographicLess | AggregationKind::LexicographicGreater
        )
    }
}

/// One input to an aggregator, in nibble order (index 0 is least significant).
///
/// `equal` is the nibble's equality flag; the lexicographic kinds need it for
/// every nibble above the lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NibbleFlag {
    pub flag: VariableId,
    pub equal: Option<VariableId>,
}

impl NibbleFlag {
    pub fn plain(flag: VariableId) -> Self {
        Self { flag, equal: None }
    }

    pub fn strict(flag: VariableId, equal: VariableId) -> Self {
        Self {
            flag,
            equal: Some(equal),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Builds a component guaranteeing `output = fold(flags)`.
    pub fn aggregate(
        &self,
        name: impl Into<String>,
        output: VariableId,
        flags: &[NibbleFlag],
        kind: AggregationKind,
    ) -> Result<Component, GenerationError> {
        let name = name.into();
        if flags.is_empty() {
            return Err(GenerationError::MalformedAggregation {
                component: name,
                expected: "at least one flag",
            });
        }

        let value = match kind {
            AggregationKind::AllEqual => Expr::all(flags.iter().map(|f| Expr::var(f.flag))),
            AggregationKind::AnyDiffer | AggregationKind::OrEqual => {
                Expr::any(flags.iter().map(|f| Expr::var(f.flag)))
            }
            AggregationKind::LexicographicLess | AggregationKind::LexicographicGreater => {
                lexicographic(&name, flags)?
            }
        };

        // Every consumed variable must be a Boolean
        let mut consumed = Vec::new();
        for (i, flag) in flags.iter().enumerate() {
            consumed.push(flag.flag);
            if kind.needs_equal_flags() && i > 0 {
                if let Some(equal) = flag.equal {
                    consumed.push(equal);
                }
            }
        }
        let assumptions = consumed.into_iter().rev().map(Expr::boolean_domain).collect();
        let definition = Expr::defines(output, value);

        Ok(Component::standalone(
            Contract::new(name, assumptions, vec![definition.clone()], vec![definition]),
            ComponentKind::Aggregate,
        ))
    }
}

/// `f[msb] | (e[msb] & (f[msb-1] | (e[msb-1] & ... f[0])))`
fn lexicographic(name: &str, flags: &[NibbleFlag]) -> Result<Expr, GenerationError> {
    let mut acc = Expr::var(flags[0].flag);
    for flag in &flags[1..] {
        let equal = flag.equal.ok_or_else(|| GenerationError::MalformedAggregation {
            component: name.to_string(),
            expected: "an equality flag per nibble",
        })?;
        acc = Expr::or(Expr::var(flag.flag), Expr::and(Expr::var(equal), acc));
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Assignment, Role};
    use crate::isa::InstructionKind;

    fn lt_flags(nibbles: u8) -> Vec<NibbleFlag> {
        (0..nibbles)
            .map(|n| {
                NibbleFlag::strict(
                    VariableId::flag(InstructionKind::Lt, n, Role::Less),
                    VariableId::flag(InstructionKind::Lt, n, Role::Equal),
                )
            })
            .collect()
    }

    fn output_for(component: &Component, output: VariableId, assignment: &Assignment) -> Option<bool> {
        match &component.contract.constraints()[0] {
            Expr::Eq(lhs, rhs) => {
                assert_eq!(**lhs, Expr::var(output));
                rhs.eval(assignment)
            }
            other => panic!("unexpected constraint {other}"),
        }
    }

    #[test]
    fn test_lexicographic_fold_text() {
        let out = VariableId::instruction(InstructionKind::Lt, Role::LessFinal);
        let component = Aggregator::new()
            .aggregate("lt_lt_aggregator", out, &lt_flags(3), AggregationKind::LexicographicLess)
            .unwrap();
        let constraint = component.contract.constraints()[0].to_string();
        assert_eq!(constraint, "lt_ltf=(lt_l2|(lt_e2&(lt_l1|(lt_e1&lt_l0))))");
        assert_eq!(component.contract.assumptions().len(), 5);
        assert!(component.nibble_index.is_none());
    }

    #[test]
    fn test_most_significant_difference_decides() {
        let out = VariableId::instruction(InstructionKind::Lt, Role::LessFinal);
        let flags = lt_flags(2);
        let component = Aggregator::new()
            .aggregate("lt_lt_aggregator", out, &flags, AggregationKind::LexicographicLess)
            .unwrap();

        // high nibble says greater (not less, not equal); low nibble says less
        let mut assignment = Assignment::new();
        assignment.insert(flags[1].flag, false);
        assignment.insert(flags[1].equal.unwrap(), false);
        assignment.insert(flags[0].flag, true);
        assert_eq!(output_for(&component, out, &assignment), Some(false));

        // high nibble equal: low nibble decides
        assignment.insert(flags[1].equal.unwrap(), true);
        assert_eq!(output_for(&component, out, &assignment), Some(true));
    }

    #[test]
    fn test_all_and_any() {
        let flags: Vec<NibbleFlag> = (0..4)
            .map(|n| NibbleFlag::plain(VariableId::flag(InstructionKind::Eq, n, Role::Equal)))
            .collect();
        let out = VariableId::instruction(InstructionKind::Eq, Role::EqualFinal);
        let all = Aggregator::new()
            .aggregate("eq_eq_aggregator", out, &flags, AggregationKind::AllEqual)
            .unwrap();
        let any = Aggregator::new()
            .aggregate("eq_any_aggregator", out, &flags, AggregationKind::AnyDiffer)
            .unwrap();

        let mut assignment: Assignment = flags.iter().map(|f| (f.flag, true)).collect();
        assert_eq!(output_for(&all, out, &assignment), Some(true));
        assignment.insert(flags[2].flag, false);
        assert_eq!(output_for(&all, out, &assignment), Some(false));
        assert_eq!(output_for(&any, out, &assignment), Some(true));
    }

    #[test]
    fn test_malformed_inputs() {
        let out = VariableId::instruction(InstructionKind::Lt, Role::LessFinal);
        let err = Aggregator::new()
            .aggregate("lt_lt_aggregator", out, &[], AggregationKind::AllEqual)
            .unwrap_err();
        assert!(matches!(err, GenerationError::MalformedAggregation { .. }));

        let flags: Vec<NibbleFlag> = (0..2)
            .map(|n| NibbleFlag::plain(VariableId::flag(InstructionKind::Lt, n, Role::Less)))
            .collect();
        assert!(Aggregator::new()
            .aggregate("lt_lt_aggregator", out, &flags, AggregationKind::LexicographicLess)
            .is_err());
    }
}
