//! Carry linking
//!
//! A linker is a one-variable component asserting that what one nibble
//! produces is what the next nibble consumes. It is the only mechanism by
//! which carries cross component boundaries.

use crate::contract::{Component, ComponentKind, ComponentRef, Contract, Expr, LinkSpec, VariableId};

#[derive(Debug, Clone, Copy, Default)]
pub struct CarryLinker;

impl CarryLinker {
    pub fn new() -> Self {
        Self
    }

    /// Name of the linker for `spec`. `lane` distinguishes several links
    /// across the same nibble boundary.
    pub fn link_name(spec: &LinkSpec, from_nibble: u8, to_nibble: u8, lane: Option<usize>) -> String {
        let base = format!(
            "{}_link_{}_to_{}",
            spec.from.instruction.prefix(),
            from_nibble,
            to_nibble
        );
        match lane {
            Some(lane) => format!("{}_{}", base, lane),
            None => base,
        }
    }

    /// Builds the linker component for `spec`.
    ///
    /// Assumes the produced variable is Boolean and guarantees
    /// `consumed = produced`.
    pub fn link(&self, spec: &LinkSpec, name: impl Into<String>) -> Component {
        let equality = Expr::defines(spec.consumed, Expr::var(spec.produced));
        let contract = Contract::new(
            name,
            vec![Expr::boolean_domain(spec.produced)],
            vec![equality.clone()],
            vec![equality],
        );
        Component::standalone(contract, ComponentKind::Link)
    }

    /// Links `produced` of component `from` to `consumed` of component `to`.
    pub fn connect(
        &self,
        from: &Component,
        to: &Component,
        produced: VariableId,
        consumed: VariableId,
        lane: Option<usize>,
    ) -> (LinkSpec, Component) {
        let instruction = produced.instruction_kind();
        let spec = LinkSpec {
            produced,
            consumed,
            from: ComponentRef {
                instruction,
                name: from.name().to_string(),
            },
            to: ComponentRef {
                instruction: consumed.instruction_kind(),
                name: to.name().to_string(),
            },
        };
        let name = Self::link_name(
            &spec,
            from.nibble_index.unwrap_or(0),
            to.nibble_index.unwrap_or(0),
            lane,
        );
        let component = self.link(&spec, name);
        (spec, component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Assignment, CarryFlags, Role};
    use crate::isa::InstructionKind;

    fn nibble(n: u8, vars: Vec<VariableId>) -> Component {
        let clauses = vars.into_iter().map(Expr::boolean_domain).collect();
        Component::nibble(
            Contract::new(format!("add_nibble_{n}"), vec![], vec![], clauses),
            n,
            CarryFlags::default(),
        )
    }

    #[test]
    fn test_link_shape() {
        let co = VariableId::flag(InstructionKind::Add, 0, Role::CarryOut);
        let ci = VariableId::flag(InstructionKind::Add, 1, Role::CarryIn);
        let (spec, component) = CarryLinker::new().connect(&nibble(0, vec![co]), &nibble(1, vec![ci]), co, ci, None);

        assert_eq!(component.name(), "add_link_0_to_1");
        assert_eq!(component.kind, ComponentKind::Link);
        assert_eq!(spec.from.name, "add_nibble_0");
        assert_eq!(spec.to.name, "add_nibble_1");
        assert_eq!(
            component.contract.expression(),
            "add_co0=0|add_co0=1 && add_ci1=add_co0"
        );
        assert_eq!(component.contract.variables().len(), 2);
    }

    #[test]
    fn test_link_is_satisfied_only_by_equal_values() {
        let co = VariableId::flag(InstructionKind::Add, 0, Role::CarryOut);
        let ci = VariableId::flag(InstructionKind::Add, 1, Role::CarryIn);
        let (_, component) = CarryLinker::new().connect(&nibble(0, vec![co]), &nibble(1, vec![ci]), co, ci, None);

        for (produced, consumed) in [(false, false), (true, true), (false, true), (true, false)] {
            let assignment: Assignment = [(co, produced), (ci, consumed)].into_iter().collect();
            let holds = component.contract.clauses().all(|c| c.eval(&assignment) == Some(true));
            assert_eq!(holds, produced == consumed);
        }
    }

    #[test]
    fn test_lane_suffix() {
        let out = VariableId::bit(InstructionKind::Hash, 2, Role::StateOut(1));
        let input = VariableId::bit(InstructionKind::Hash, 3, Role::StateIn(1));
        let (_, component) =
            CarryLinker::new().connect(&nibble(2, vec![out]), &nibble(3, vec![input]), out, input, Some(1));
        assert_eq!(component.name(), "hash_link_2_to_3_1");
    }
}
