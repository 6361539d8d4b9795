//! Contract model
//!
//! A [`Contract`] is an assume/guarantee pair plus the clauses that relate its
//! variables. A [`Component`] wraps a contract with the nibble it covers and
//! its carry interface; an [`InstructionPlan`] is the full ordered set of
//! components for one instruction.

pub mod expr;
pub mod variable;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use expr::{Assignment, Expr};
pub use variable::{Indexing, Role, UnknownVariable, VariableId};

use crate::isa::InstructionKind;

/// Separator between clauses of the solver conjunction
pub const CLAUSE_SEPARATOR: &str = " && ";

/// An assume/guarantee contract.
///
/// `variables` always covers every variable mentioned by the assumptions,
/// guarantees and constraints; it is computed on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    name: String,
    assumptions: Vec<Expr>,
    guarantees: Vec<Expr>,
    variables: BTreeSet<VariableId>,
    constraints: Vec<Expr>,
}

impl Contract {
    pub fn new(
        name: impl Into<String>,
        assumptions: Vec<Expr>,
        guarantees: Vec<Expr>,
        constraints: Vec<Expr>,
    ) -> Self {
        let mut variables = BTreeSet::new();
        for expr in assumptions.iter().chain(&guarantees).chain(&constraints) {
            expr.collect_variables(&mut variables);
        }
        Self {
            name: name.into(),
            assumptions,
            guarantees,
            variables,
            constraints,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn assumptions(&self) -> &[Expr] {
        &self.assumptions
    }

    pub fn guarantees(&self) -> &[Expr] {
        &self.guarantees
    }

    pub fn constraints(&self) -> &[Expr] {
        &self.constraints
    }

    pub fn variables(&self) -> &BTreeSet<VariableId> {
        &self.variables
    }

    /// Clauses submitted to the solver: assumptions first, then constraints
    pub fn clauses(&self) -> impl Iterator<Item = &Expr> {
        self.assumptions.iter().chain(&self.constraints)
    }

    pub fn clause_count(&self) -> usize {
        self.assumptions.len() + self.constraints.len()
    }

    /// The conjunction handed to the solver; `1` when there are no clauses
    pub fn expression(&self) -> String {
        let rendered: Vec<String> = self.clauses().map(|c| c.to_string()).collect();
        if rendered.is_empty() {
            "1".to_string()
        } else {
            rendered.join(CLAUSE_SEPARATOR)
        }
    }

    /// Length the size budget is checked against
    pub fn expression_length(&self) -> usize {
        self.expression().len()
    }

    /// Full query text: descriptive header, `solve` line, `quit`
    pub fn serialize(&self) -> String {
        format!(
            "# Component: {}\n# Assumptions: {}\n# Guarantees: {}\n\nsolve {}\n\nquit\n",
            self.name,
            header_list(&self.assumptions),
            header_list(&self.guarantees),
            self.expression()
        )
    }
}

fn header_list(exprs: &[Expr]) -> String {
    if exprs.is_empty() {
        "none".to_string()
    } else {
        exprs
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// What part of a plan a component plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Nibble,
    Link,
    Aggregate,
    Check,
}

/// Carry interface of a nibble component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryFlags {
    pub carry_in: bool,
    pub carry_out: bool,
}

/// One independently solvable unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub contract: Contract,
    /// Nibble covered, `None` for linkers, aggregators and checks
    pub nibble_index: Option<u8>,
    pub carries: CarryFlags,
    pub kind: ComponentKind,
}

impl Component {
    pub fn nibble(contract: Contract, nibble: u8, carries: CarryFlags) -> Self {
        Self {
            contract,
            nibble_index: Some(nibble),
            carries,
            kind: ComponentKind::Nibble,
        }
    }

    pub fn standalone(contract: Contract, kind: ComponentKind) -> Self {
        Self {
            contract,
            nibble_index: None,
            carries: CarryFlags::default(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        self.contract.name()
    }

    pub fn serialize(&self) -> String {
        self.contract.serialize()
    }
}

/// Names a component inside an instruction's plan
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentRef {
    pub instruction: InstructionKind,
    pub name: String,
}

/// A produced variable of one component that another component consumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub produced: VariableId,
    pub consumed: VariableId,
    pub from: ComponentRef,
    pub to: ComponentRef,
}

/// Every component of one instruction, in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionPlan {
    pub instruction: InstructionKind,
    pub width_nibbles: u8,
    pub components: Vec<Component>,
    pub links: Vec<LinkSpec>,
    pub total_constraint_count: usize,
}

impl InstructionPlan {
    pub fn new(
        instruction: InstructionKind,
        width_nibbles: u8,
        components: Vec<Component>,
        links: Vec<LinkSpec>,
    ) -> Self {
        let total_constraint_count = components.iter().map(|c| c.contract.clause_count()).sum();
        Self {
            instruction,
            width_nibbles,
            components,
            links,
            total_constraint_count,
        }
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name() == name)
    }

    pub fn nibble_components(&self) -> impl Iterator<Item = &Component> {
        self.components
            .iter()
            .filter(|c| c.kind == ComponentKind::Nibble)
    }

    /// Every clause of every component, in plan order
    pub fn clauses(&self) -> impl Iterator<Item = &Expr> {
        self.components.iter().flat_map(|c| c.contract.clauses())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Contract {
        let ci = VariableId::flag(InstructionKind::Add, 1, Role::CarryIn);
        let a = VariableId::bit(InstructionKind::Add, 1, Role::OperandA(0));
        let r = VariableId::bit(InstructionKind::Add, 1, Role::Result(0));
        Contract::new(
            "add_nibble_1",
            vec![Expr::boolean_domain(ci)],
            vec![Expr::defines(r, Expr::xor(Expr::var(a), Expr::var(ci)))],
            vec![Expr::defines(r, Expr::xor(Expr::var(a), Expr::var(ci)))],
        )
    }

    #[test]
    fn test_variables_cover_every_clause() {
        let contract = sample();
        let names: Vec<String> = contract.variables().iter().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["add_a4", "add_r4", "add_ci1"]);
        assert_eq!(contract.clause_count(), 2);
    }

    #[test]
    fn test_serialize_layout() {
        let text = sample().serialize();
        let expected = "# Component: add_nibble_1\n\
                        # Assumptions: add_ci1=0|add_ci1=1\n\
                        # Guarantees: add_r4=(add_a4+add_ci1)\n\
                        \n\
                        solve add_ci1=0|add_ci1=1 && add_r4=(add_a4+add_ci1)\n\
                        \n\
                        quit\n";
        assert_eq!(text, expected);
        assert_eq!(
            sample().expression_length(),
            "add_ci1=0|add_ci1=1 && add_r4=(add_a4+add_ci1)".len()
        );
    }

    #[test]
    fn test_empty_contract_serializes_to_true() {
        let contract = Contract::new("nop_component", vec![], vec![], vec![]);
        let text = contract.serialize();
        assert!(text.contains("# Assumptions: none\n"));
        assert!(text.contains("# Guarantees: none\n"));
        assert!(text.contains("solve 1\n"));
    }

    #[test]
    fn test_plan_counts_clauses() {
        let plan = InstructionPlan::new(
            InstructionKind::Add,
            1,
            vec![Component::nibble(sample(), 1, CarryFlags { carry_in: true, carry_out: false })],
            vec![],
        );
        assert_eq!(plan.total_constraint_count, 2);
        assert!(plan.component("add_nibble_1").is_some());
        assert_eq!(plan.clauses().count(), 2);
    }
}
