//! Boolean expressions over [`VariableId`]s
//!
//! The smart constructors ([`Expr::and`], [`Expr::xor`], ...) fold constants
//! and flatten nested operators of the same kind, so clauses built from
//! constant addends (PC+4, SP-4) stay short. Rendering follows the solver's
//! operator set: `&`, `|`, `+` (xor), postfix `'` and `=`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::variable::VariableId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Const(bool),
    Var(VariableId),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Xor(Vec<Expr>),
    Eq(Box<Expr>, Box<Expr>),
}

/// Variable assignment used for evaluation
pub type Assignment = BTreeMap<VariableId, bool>;

impl Expr {
    pub fn var(id: VariableId) -> Expr {
        Expr::Var(id)
    }

    pub fn constant(value: bool) -> Expr {
        Expr::Const(value)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: Expr) -> Expr {
        match expr {
            Expr::Const(value) => Expr::Const(!value),
            Expr::Not(inner) => *inner,
            other => Expr::Not(Box::new(other)),
        }
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Expr {
        Expr::all([lhs, rhs])
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Expr {
        Expr::any([lhs, rhs])
    }

    pub fn xor(lhs: Expr, rhs: Expr) -> Expr {
        Expr::parity([lhs, rhs])
    }

    /// `(lhs + rhs)'`
    pub fn xnor(lhs: Expr, rhs: Expr) -> Expr {
        Expr::not(Expr::xor(lhs, rhs))
    }

    /// Conjunction. Empty conjunction is `1`.
    pub fn all(terms: impl IntoIterator<Item = Expr>) -> Expr {
        let mut kept = Vec::new();
        for term in terms {
            match term {
                Expr::Const(true) => {}
                Expr::Const(false) => return Expr::Const(false),
                Expr::And(inner) => kept.extend(inner),
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => Expr::Const(true),
            1 => kept.remove(0),
            _ => Expr::And(kept),
        }
    }

    /// Disjunction. Empty disjunction is `0`.
    pub fn any(terms: impl IntoIterator<Item = Expr>) -> Expr {
        let mut kept = Vec::new();
        for term in terms {
            match term {
                Expr::Const(false) => {}
                Expr::Const(true) => return Expr::Const(true),
                Expr::Or(inner) => kept.extend(inner),
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => Expr::Const(false),
            1 => kept.remove(0),
            _ => Expr::Or(kept),
        }
    }

    /// Exclusive or of all terms. Constant `1` terms become a negation.
    pub fn parity(terms: impl IntoIterator<Item = Expr>) -> Expr {
        let mut kept = Vec::new();
        let mut invert = false;
        for term in terms {
            match term {
                Expr::Const(value) => invert ^= value,
                Expr::Xor(inner) => kept.extend(inner),
                other => kept.push(other),
            }
        }
        let folded = match kept.len() {
            0 => Expr::Const(false),
            1 => kept.remove(0),
            _ => Expr::Xor(kept),
        };
        if invert {
            Expr::not(folded)
        } else {
            folded
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Eq(Box::new(lhs), Box::new(rhs))
    }

    /// `x=0|x=1`
    pub fn boolean_domain(id: VariableId) -> Expr {
        Expr::Or(vec![
            Expr::eq(Expr::Var(id), Expr::Const(false)),
            Expr::eq(Expr::Var(id), Expr::Const(true)),
        ])
    }

    /// `id = value`
    pub fn defines(id: VariableId, value: Expr) -> Expr {
        Expr::eq(Expr::Var(id), value)
    }

    /// Three-valued evaluation: `None` when the value depends on an unassigned variable.
    pub fn eval(&self, assignment: &Assignment) -> Option<bool> {
        match self {
            Expr::Const(value) => Some(*value),
            Expr::Var(id) => assignment.get(id).copied(),
            Expr::Not(inner) => inner.eval(assignment).map(|v| !v),
            Expr::And(terms) => {
                let mut unknown = false;
                for term in terms {
                    match term.eval(assignment) {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(true)
                }
            }
            Expr::Or(terms) => {
                let mut unknown = false;
                for term in terms {
                    match term.eval(assignment) {
                        Some(true) => return Some(true),
                        Some(false) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
            Expr::Xor(terms) => {
                let mut acc = false;
                for term in terms {
                    acc ^= term.eval(assignment)?;
                }
                Some(acc)
            }
            Expr::Eq(lhs, rhs) => Some(lhs.eval(assignment)? == rhs.eval(assignment)?),
        }
    }

    /// Collect every variable mentioned by this expression
    pub fn collect_variables(&self, out: &mut BTreeSet<VariableId>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(id) => {
                out.insert(*id);
            }
            Expr::Not(inner) => inner.collect_variables(out),
            Expr::And(terms) | Expr::Or(terms) | Expr::Xor(terms) => {
                for term in terms {
                    term.collect_variables(out);
                }
            }
            Expr::Eq(lhs, rhs) => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
        }
    }

    pub fn variables(&self) -> BTreeSet<VariableId> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    /// Renders without parentheses when used as an operand
    pub fn is_atomic(&self) -> bool {
        matches!(self, Expr::Const(_) | Expr::Var(_) | Expr::Not(_))
    }

    /// `x=0` style equations of two atoms render bare inside `&`/`|`/`+`
    fn is_simple_equation(&self) -> bool {
        match self {
            Expr::Eq(lhs, rhs) => lhs.is_atomic() && rhs.is_atomic(),
            _ => false,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, allow_equation: bool) -> fmt::Result {
        if self.is_atomic() || (allow_equation && self.is_simple_equation()) {
            write!(f, "{}", self)
        } else {
            write!(f, "({})", self)
        }
    }

    fn fmt_joined(terms: &[Expr], op: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                f.write_str(op)?;
            }
            term.fmt_operand(f, true)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(value) => f.write_str(if *value { "1" } else { "0" }),
            Expr::Var(id) => write!(f, "{}", id),
            Expr::Not(inner) => {
                match inner.as_ref() {
                    Expr::Const(_) | Expr::Var(_) | Expr::Not(_) => write!(f, "{}", inner)?,
                    other => write!(f, "({})", other)?,
                }
                f.write_str("'")
            }
            Expr::And(terms) => Expr::fmt_joined(terms, "&", f),
            Expr::Or(terms) => Expr::fmt_joined(terms, "|", f),
            Expr::Xor(terms) => Expr::fmt_joined(terms, "+", f),
            Expr::Eq(lhs, rhs) => {
                lhs.fmt_operand(f, false)?;
                f.write_str("=")?;
                rhs.fmt_operand(f, false)
            }
        }
    }
}
