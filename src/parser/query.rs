//! Reader for the solver query format
//!
//! Accepts exactly what [`Contract::serialize`] writes: three `#` header
//! lines, a `solve` line holding the clause conjunction, and `quit`.
//! Within a clause every operator level uses a single operator; mixing `&`,
//! `|` and `+` without parentheses is rejected rather than resolved by
//! precedence.

use regex::Regex;
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::contract::{Contract, Expr, VariableId, CLAUSE_SEPARATOR};
use crate::error::QueryParseError;

/// A query file read back into clauses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub name: Option<String>,
    pub assumptions: Vec<Expr>,
    pub guarantees: Vec<Expr>,
    /// Every clause of the `solve` line, in order
    pub clauses: Vec<Expr>,
}

impl ParsedQuery {
    pub fn parse(text: &str) -> Result<Self, QueryParseError> {
        let header_re = Regex::new(r"^#\s*(Component|Assumptions|Guarantees):\s*(.*)$").map_err(|e| {
            QueryParseError::Line {
                line: 0,
                message: format!("regex error: {}", e),
            }
        })?;

        let mut name = None;
        let mut assumptions = Vec::new();
        let mut guarantees = Vec::new();
        let mut clauses = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            let line_error = |err: QueryParseError| QueryParseError::Line {
                line: index + 1,
                message: err.to_string(),
            };
            if line.is_empty() {
                continue;
            }
            if line == "quit" {
                break;
            }
            if let Some(caps) = header_re.captures(line) {
                let value = caps[2].trim();
                match &caps[1] {
                    "Component" => name = Some(value.to_string()),
                    "Assumptions" => assumptions = parse_header_list(value).map_err(line_error)?,
                    _ => guarantees = parse_header_list(value).map_err(line_error)?,
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("solve") {
                if clauses.is_some() {
                    return Err(QueryParseError::Line {
                        line: index + 1,
                        message: "second solve line".to_string(),
                    });
                }
                clauses = Some(parse_conjunction(rest).map_err(line_error)?);
                continue;
            }
            return Err(QueryParseError::Line {
                line: index + 1,
                message: format!("unexpected line `{}`", line),
            });
        }

        Ok(Self {
            name,
            assumptions,
            guarantees,
            clauses: clauses.ok_or(QueryParseError::MissingSolve)?,
        })
    }

    /// Clauses after the assumptions; all clauses when the header does not
    /// match the start of the conjunction
    pub fn constraints(&self) -> &[Expr] {
        if self.clauses.starts_with(&self.assumptions) {
            &self.clauses[self.assumptions.len()..]
        } else {
            &self.clauses
        }
    }

    pub fn variables(&self) -> BTreeSet<VariableId> {
        let mut out = BTreeSet::new();
        for clause in &self.clauses {
            clause.collect_variables(&mut out);
        }
        out
    }

    pub fn into_contract(self) -> Contract {
        let constraints = self.constraints().to_vec();
        let assumptions = if self.clauses.starts_with(&self.assumptions) {
            self.assumptions
        } else {
            Vec::new()
        };
        Contract::new(
            self.name.unwrap_or_else(|| "query".to_string()),
            assumptions,
            self.guarantees,
            constraints,
        )
    }
}

pub fn parse_query(text: &str) -> Result<ParsedQuery, QueryParseError> {
    ParsedQuery::parse(text)
}

/// The conjunction on the `solve` line, as written. This is the text the
/// expression budget measures.
pub fn solve_expression(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .take_while(|line| *line != "quit")
        .find_map(|line| line.strip_prefix("solve "))
        .map(str::trim)
}

/// Splits a conjunction on `&&`. A lone `1` is the empty conjunction.
pub fn parse_conjunction(text: &str) -> Result<Vec<Expr>, QueryParseError> {
    let text = text.trim();
    if text == "1" || text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(CLAUSE_SEPARATOR.trim())
        .map(|clause| parse_clause(clause.trim()))
        .collect()
}

fn parse_header_list(value: &str) -> Result<Vec<Expr>, QueryParseError> {
    if value == "none" {
        return Ok(Vec::new());
    }
    value.split(", ").map(|item| parse_clause(item.trim())).collect()
}

/// Parses one clause
pub fn parse_clause(text: &str) -> Result<Expr, QueryParseError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some((position, token)) => Err(QueryParseError::Expression {
            position: *position,
            message: format!("unexpected {:?}", token),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Const(bool),
    Op(char),
    Equals,
    Prime,
    Open,
    Close,
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, QueryParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((position, c)) = chars.next() {
        let token = match c {
            ' ' | '\t' => continue,
            '&' | '|' | '+' => Token::Op(c),
            '=' => Token::Equals,
            '\'' => Token::Prime,
            '(' => Token::Open,
            ')' => Token::Close,
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        ident.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(ident)
            }
            '0' | '1' => {
                if matches!(chars.peek(), Some(&(_, next)) if next.is_ascii_alphanumeric()) {
                    return Err(QueryParseError::Expression {
                        position,
                        message: "constants are 0 or 1".to_string(),
                    });
                }
                Token::Const(c == '1')
            }
            other => {
                return Err(QueryParseError::Expression {
                    position,
                    message: format!("unexpected character `{}`", other),
                })
            }
        };
        tokens.push((position, token));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(p, _)| *p)
            .unwrap_or(0)
    }

    fn error(&self, message: &str) -> QueryParseError {
        QueryParseError::Expression {
            position: self.position(),
            message: message.to_string(),
        }
    }

    fn operator(&self) -> Option<char> {
        match self.peek() {
            Some(Token::Op(c)) => Some(*c),
            _ => None,
        }
    }

    /// equation (op equation)*, one operator per level
    fn expr(&mut self) -> Result<Expr, QueryParseError> {
        let first = self.equation()?;
        let Some(op) = self.operator() else {
            return Ok(first);
        };
        let mut terms = vec![first];
        while let Some(next) = self.operator() {
            if next != op {
                return Err(QueryParseError::MixedOperators {
                    first: op,
                    second: next,
                });
            }
            self.pos += 1;
            terms.push(self.equation()?);
        }
        Ok(match op {
            '&' => Expr::And(terms),
            '|' => Expr::Or(terms),
            _ => Expr::Xor(terms),
        })
    }

    fn equation(&mut self) -> Result<Expr, QueryParseError> {
        let lhs = self.postfix()?;
        if self.peek() == Some(&Token::Equals) {
            self.pos += 1;
            let rhs = self.postfix()?;
            return Ok(Expr::Eq(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn postfix(&mut self) -> Result<Expr, QueryParseError> {
        let mut expr = self.primary()?;
        while self.peek() == Some(&Token::Prime) {
            self.pos += 1;
            expr = Expr::Not(Box::new(expr));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, QueryParseError> {
        let token = self.peek().cloned().ok_or_else(|| self.error("unexpected end of clause"))?;
        self.pos += 1;
        match token {
            Token::Ident(name) => VariableId::from_str(&name)
                .map(Expr::Var)
                .map_err(|_| QueryParseError::UnknownVariable(name)),
            Token::Const(value) => Ok(Expr::Const(value)),
            Token::Open => {
                let inner = self.expr()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(self.error("expected `)`"));
                }
                self.pos += 1;
                Ok(inner)
            }
            _ => {
                self.pos -= 1;
                Err(self.error("expected a variable, constant or `(`"))
            }
        }
    }
}
