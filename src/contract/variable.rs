//! Variable identities and their single textual rendering

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::isa::InstructionKind;

/// What a variable means inside its instruction.
///
/// Bit roles carry the bit offset inside their nibble (`0..4`); the global bit
/// index is `4 * nibble + offset`. Flag roles are indexed by nibble, and
/// instruction roles are not indexed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    // Bit roles
    OperandA(u8),
    OperandB(u8),
    Result(u8),
    /// Carry out of a bit that stays inside its nibble
    Carry(u8),
    Sum(u8),
    Pc(u8),
    Target(u8),
    NextPc(u8),
    Address(u8),
    BusAddress(u8),
    Value(u8),
    BusData(u8),
    StackPointer(u8),
    NextStackPointer(u8),
    Slot(u8),
    Second(u8),
    ReturnAddress(u8),
    Message(u8),
    Key(u8),
    Tag(u8),
    StateIn(u8),
    StateOut(u8),

    // Per-nibble flags
    CarryIn,
    CarryOut,
    Equal,
    Less,
    Greater,
    Differ,
    InRange,

    // Instruction-level flags
    Overflow,
    Underflow,
    EqualFinal,
    LessFinal,
    GreaterFinal,
    DifferFinal,
    OrEqualFinal,
    Take,
    Ok,
    Select,
    Halted,
}

/// How a role is indexed when rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indexing {
    Bit,
    Nibble,
    Instruction,
}

/// Constructors for bit roles, by code
const BIT_ROLES: &[(&str, fn(u8) -> Role)] = &[
    ("a", Role::OperandA),
    ("b", Role::OperandB),
    ("r", Role::Result),
    ("k", Role::Carry),
    ("s", Role::Sum),
    ("p", Role::Pc),
    ("t", Role::Target),
    ("n", Role::NextPc),
    ("ad", Role::Address),
    ("ba", Role::BusAddress),
    ("v", Role::Value),
    ("bd", Role::BusData),
    ("sp", Role::StackPointer),
    ("ns", Role::NextStackPointer),
    ("sl", Role::Slot),
    ("w", Role::Second),
    ("ra", Role::ReturnAddress),
    ("ms", Role::Message),
    ("ky", Role::Key),
    ("tg", Role::Tag),
    ("q", Role::StateIn),
    ("h", Role::StateOut),
];

const FLAG_ROLES: &[(&str, Role)] = &[
    ("ci", Role::CarryIn),
    ("co", Role::CarryOut),
    ("e", Role::Equal),
    ("l", Role::Less),
    ("g", Role::Greater),
    ("d", Role::Differ),
    ("ir", Role::InRange),
    ("ovf", Role::Overflow),
    ("unf", Role::Underflow),
    ("eqf", Role::EqualFinal),
    ("ltf", Role::LessFinal),
    ("gtf", Role::GreaterFinal),
    ("nef", Role::DifferFinal),
    ("oef", Role::OrEqualFinal),
    ("tk", Role::Take),
    ("ok", Role::Ok),
    ("sel", Role::Select),
    ("hlt", Role::Halted),
];

impl Role {
    /// Letters-only code used in the rendered name
    pub fn code(&self) -> &'static str {
        match self.bit_offset() {
            Some(_) => BIT_ROLES
                .iter()
                .find(|(_, ctor)| ctor(0) == self.with_offset(0))
                .map(|(code, _)| *code)
                .unwrap_or("?"),
            None => FLAG_ROLES
                .iter()
                .find(|(_, role)| role == self)
                .map(|(code, _)| *code)
                .unwrap_or("?"),
        }
    }

    pub fn indexing(&self) -> Indexing {
        if self.bit_offset().is_some() {
            return Indexing::Bit;
        }
        match self {
            Role::CarryIn
            | Role::CarryOut
            | Role::Equal
            | Role::Less
            | Role::Greater
            | Role::Differ
            | Role::InRange => Indexing::Nibble,
            _ => Indexing::Instruction,
        }
    }

    /// Offset inside the nibble, for bit roles
    pub fn bit_offset(&self) -> Option<u8> {
        match *self {
            Role::OperandA(k)
            | Role::OperandB(k)
            | Role::Result(k)
            | Role::Carry(k)
            | Role::Sum(k)
            | Role::Pc(k)
            | Role::Target(k)
            | Role::NextPc(k)
            | Role::Address(k)
            | Role::BusAddress(k)
            | Role::Value(k)
            | Role::BusData(k)
            | Role::StackPointer(k)
            | Role::NextStackPointer(k)
            | Role::Slot(k)
            | Role::Second(k)
            | Role::ReturnAddress(k)
            | Role::Message(k)
            | Role::Key(k)
            | Role::Tag(k)
            | Role::StateIn(k)
            | Role::StateOut(k) => Some(k),
            _ => None,
        }
    }

    fn with_offset(&self, offset: u8) -> Role {
        match *self {
            Role::OperandA(_) => Role::OperandA(offset),
            Role::OperandB(_) => Role::OperandB(offset),
            Role::Result(_) => Role::Result(offset),
            Role::Carry(_) => Role::Carry(offset),
            Role::Sum(_) => Role::Sum(offset),
            Role::Pc(_) => Role::Pc(offset),
            Role::Target(_) => Role::Target(offset),
            Role::NextPc(_) => Role::NextPc(offset),
            Role::Address(_) => Role::Address(offset),
            Role::BusAddress(_) => Role::BusAddress(offset),
            Role::Value(_) => Role::Value(offset),
            Role::BusData(_) => Role::BusData(offset),
            Role::StackPointer(_) => Role::StackPointer(offset),
            Role::NextStackPointer(_) => Role::NextStackPointer(offset),
            Role::Slot(_) => Role::Slot(offset),
            Role::Second(_) => Role::Second(offset),
            Role::ReturnAddress(_) => Role::ReturnAddress(offset),
            Role::Message(_) => Role::Message(offset),
            Role::Key(_) => Role::Key(offset),
            Role::Tag(_) => Role::Tag(offset),
            Role::StateIn(_) => Role::StateIn(offset),
            Role::StateOut(_) => Role::StateOut(offset),
            other => other,
        }
    }
}

/// Unique identity of one Boolean variable.
///
/// Fields are private so every value satisfies the indexing rule of its role;
/// that is what keeps [`fmt::Display`] injective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariableId {
    instruction: InstructionKind,
    nibble: Option<u8>,
    role: Role,
}

impl VariableId {
    /// Bit `role` of nibble `nibble`. Offsets are reduced modulo 4.
    pub fn bit(instruction: InstructionKind, nibble: u8, role: Role) -> Self {
        let role = match role.bit_offset() {
            Some(offset) => role.with_offset(offset % 4),
            None => role,
        };
        Self {
            instruction,
            nibble: Some(nibble),
            role,
        }
    }

    /// Per-nibble flag such as a carry or a comparison flag
    pub fn flag(instruction: InstructionKind, nibble: u8, role: Role) -> Self {
        Self {
            instruction,
            nibble: Some(nibble),
            role,
        }
    }

    /// Instruction-level flag such as `ovf` or an aggregator result
    pub fn instruction(instruction: InstructionKind, role: Role) -> Self {
        Self {
            instruction,
            nibble: None,
            role,
        }
    }

    /// Variable for global bit `bit` of a bit role
    pub fn global_bit(instruction: InstructionKind, bit: u32, role: fn(u8) -> Role) -> Self {
        Self::bit(instruction, (bit / 4) as u8, role((bit % 4) as u8))
    }

    pub fn instruction_kind(&self) -> InstructionKind {
        self.instruction
    }

    pub fn nibble(&self) -> Option<u8> {
        self.nibble
    }

    pub fn role(&self) -> Role {
        self.role
    }

    fn index(&self) -> Option<u32> {
        match self.role.indexing() {
            Indexing::Bit => {
                let offset = self.role.bit_offset().unwrap_or(0) as u32;
                Some(self.nibble.unwrap_or(0) as u32 * 4 + offset)
            }
            Indexing::Nibble => Some(self.nibble.unwrap_or(0) as u32),
            Indexing::Instruction => None,
        }
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.instruction.prefix(), self.role.code())?;
        if let Some(index) = self.index() {
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

/// Error for names that are not the rendering of any [`VariableId`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a variable name: {0}")]
pub struct UnknownVariable(pub String);

impl FromStr for VariableId {
    type Err = UnknownVariable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownVariable(s.to_string());
        let (prefix, rest) = s.split_once('_').ok_or_else(unknown)?;
        let instruction: InstructionKind = prefix.parse().map_err(|_| unknown())?;
        if prefix != instruction.prefix() {
            return Err(unknown());
        }

        let split = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (code, digits) = rest.split_at(split);
        let index: Option<u32> = if digits.is_empty() {
            None
        } else {
            // Reject leading zeros so the parse stays the exact inverse of rendering
            if digits.len() > 1 && digits.starts_with('0') {
                return Err(unknown());
            }
            Some(digits.parse().map_err(|_| unknown())?)
        };

        if let Some((_, ctor)) = BIT_ROLES.iter().find(|(c, _)| *c == code) {
            let bit = index.ok_or_else(unknown)?;
            if bit >= 256 * 4 {
                return Err(unknown());
            }
            return Ok(VariableId::global_bit(instruction, bit, *ctor));
        }

        let (_, role) = FLAG_ROLES
            .iter()
            .find(|(c, _)| *c == code)
            .ok_or_else(unknown)?;
        match (role.indexing(), index) {
            (Indexing::Nibble, Some(n)) if n < 256 => {
                Ok(VariableId::flag(instruction, n as u8, *role))
            }
            (Indexing::Instruction, None) => Ok(VariableId::instruction(instruction, *role)),
            _ => Err(unknown()),
        }
    }
}
