//! Instruction set
//!
//! The closed set of instructions the decomposer lowers. Every
//! [`InstructionKind`] maps to exactly one [`OperationFamily`]; the mapping is
//! an exhaustive `match`, so adding an instruction without a decomposition
//! rule does not compile.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GenerationError;

/// Every instruction with a registered decomposition rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstructionKind {
    // Arithmetic
    Add,
    Sub,
    // Bitwise
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    // Comparison
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    // Memory
    Load,
    Store,
    Mload,
    Mstore,
    // Stack
    Push,
    Pop,
    Dup,
    Swap,
    // Control flow
    Jmp,
    Jz,
    Jnz,
    Call,
    Ret,
    // Crypto placeholders
    Hash,
    Sign,
    Verify,
    // System
    Nop,
    Halt,
}

/// Addition-style carry chains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOp {
    Add,
    /// `a + b' + 1`
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
    Not,
}

/// Direction of a one-bit shift. Also the direction the linking runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftDirection {
    /// Low nibble to high nibble
    Left,
    /// High nibble to low nibble
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAccess {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemorySpace {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOp {
    Push,
    Pop,
    Dup,
    Swap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Jmp,
    Jz,
    Jnz,
    Call,
    Ret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoOp {
    Hash,
    Sign,
    Verify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemOp {
    Nop,
    Halt,
}

/// Decomposition strategy, selected once per instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationFamily {
    CarryChain(ChainOp),
    Parallel(BitwiseOp),
    Shift(ShiftDirection),
    Comparison(CompareOp),
    Memory(MemoryAccess, MemorySpace),
    Stack(StackOp),
    Control(ControlOp),
    Crypto(CryptoOp),
    System(SystemOp),
}

impl OperationFamily {
    /// Family name as used by the CLI `--family` filter
    pub fn label(&self) -> &'static str {
        match self {
            OperationFamily::CarryChain(_) => "arithmetic",
            OperationFamily::Parallel(_) => "bitwise",
            OperationFamily::Shift(_) => "shift",
            OperationFamily::Comparison(_) => "comparison",
            OperationFamily::Memory(..) => "memory",
            OperationFamily::Stack(_) => "stack",
            OperationFamily::Control(_) => "control",
            OperationFamily::Crypto(_) => "crypto",
            OperationFamily::System(_) => "system",
        }
    }
}

impl InstructionKind {
    /// All instructions, in declaration order
    pub const ALL: [InstructionKind; 32] = [
        InstructionKind::Add,
        InstructionKind::Sub,
        InstructionKind::And,
        InstructionKind::Or,
        InstructionKind::Xor,
        InstructionKind::Not,
        InstructionKind::Shl,
        InstructionKind::Shr,
        InstructionKind::Eq,
        InstructionKind::Neq,
        InstructionKind::Lt,
        InstructionKind::Gt,
        InstructionKind::Lte,
        InstructionKind::Gte,
        InstructionKind::Load,
        InstructionKind::Store,
        InstructionKind::Mload,
        InstructionKind::Mstore,
        InstructionKind::Push,
        InstructionKind::Pop,
        InstructionKind::Dup,
        InstructionKind::Swap,
        InstructionKind::Jmp,
        InstructionKind::Jz,
        InstructionKind::Jnz,
        InstructionKind::Call,
        InstructionKind::Ret,
        InstructionKind::Hash,
        InstructionKind::Sign,
        InstructionKind::Verify,
        InstructionKind::Nop,
        InstructionKind::Halt,
    ];

    /// Upper-case assembly mnemonic
    pub fn mnemonic(&self) -> &'static str {
        match self {
            InstructionKind::Add => "ADD",
            InstructionKind::Sub => "SUB",
            InstructionKind::And => "AND",
            InstructionKind::Or => "OR",
            InstructionKind::Xor => "XOR",
            InstructionKind::Not => "NOT",
            InstructionKind::Shl => "SHL",
            InstructionKind::Shr => "SHR",
            InstructionKind::Eq => "EQ",
            InstructionKind::Neq => "NEQ",
            InstructionKind::Lt => "LT",
            InstructionKind::Gt => "GT",
            InstructionKind::Lte => "LTE",
            InstructionKind::Gte => "GTE",
            InstructionKind::Load => "LOAD",
            InstructionKind::Store => "STORE",
            InstructionKind::Mload => "MLOAD",
            InstructionKind::Mstore => "MSTORE",
            InstructionKind::Push => "PUSH",
            InstructionKind::Pop => "POP",
            InstructionKind::Dup => "DUP",
            InstructionKind::Swap => "SWAP",
            InstructionKind::Jmp => "JMP",
            InstructionKind::Jz => "JZ",
            InstructionKind::Jnz => "JNZ",
            InstructionKind::Call => "CALL",
            InstructionKind::Ret => "RET",
            InstructionKind::Hash => "HASH",
            InstructionKind::Sign => "SIGN",
            InstructionKind::Verify => "VERIFY",
            InstructionKind::Nop => "NOP",
            InstructionKind::Halt => "HALT",
        }
    }

    /// Lower-case prefix used for variable names, component names and
    /// output directories. Never contains `_`.
    pub fn prefix(&self) -> String {
        self.mnemonic().to_ascii_lowercase()
    }

    pub fn family(&self) -> OperationFamily {
        use OperationFamily as F;
        match self {
            InstructionKind::Add => F::CarryChain(ChainOp::Add),
            InstructionKind::Sub => F::CarryChain(ChainOp::Sub),
            InstructionKind::And => F::Parallel(BitwiseOp::And),
            InstructionKind::Or => F::Parallel(BitwiseOp::Or),
            InstructionKind::Xor => F::Parallel(BitwiseOp::Xor),
            InstructionKind::Not => F::Parallel(BitwiseOp::Not),
            InstructionKind::Shl => F::Shift(ShiftDirection::Left),
            InstructionKind::Shr => F::Shift(ShiftDirection::Right),
            InstructionKind::Eq => F::Comparison(CompareOp::Eq),
            InstructionKind::Neq => F::Comparison(CompareOp::Neq),
            InstructionKind::Lt => F::Comparison(CompareOp::Lt),
            InstructionKind::Gt => F::Comparison(CompareOp::Gt),
            InstructionKind::Lte => F::Comparison(CompareOp::Lte),
            InstructionKind::Gte => F::Comparison(CompareOp::Gte),
            InstructionKind::Load => F::Memory(MemoryAccess::Read, MemorySpace::Primary),
            InstructionKind::Store => F::Memory(MemoryAccess::Write, MemorySpace::Primary),
            InstructionKind::Mload => F::Memory(MemoryAccess::Read, MemorySpace::Secondary),
            InstructionKind::Mstore => F::Memory(MemoryAccess::Write, MemorySpace::Secondary),
            InstructionKind::Push => F::Stack(StackOp::Push),
            InstructionKind::Pop => F::Stack(StackOp::Pop),
            InstructionKind::Dup => F::Stack(StackOp::Dup),
            InstructionKind::Swap => F::Stack(StackOp::Swap),
            InstructionKind::Jmp => F::Control(ControlOp::Jmp),
            InstructionKind::Jz => F::Control(ControlOp::Jz),
            InstructionKind::Jnz => F::Control(ControlOp::Jnz),
            InstructionKind::Call => F::Control(ControlOp::Call),
            InstructionKind::Ret => F::Control(ControlOp::Ret),
            InstructionKind::Hash => F::Crypto(CryptoOp::Hash),
            InstructionKind::Sign => F::Crypto(CryptoOp::Sign),
            InstructionKind::Verify => F::Crypto(CryptoOp::Verify),
            InstructionKind::Nop => F::System(SystemOp::Nop),
            InstructionKind::Halt => F::System(SystemOp::Halt),
        }
    }

    /// Instructions whose generated components this instruction consumes.
    ///
    /// Conditional jumps read the instruction-level result of a comparison
    /// aggregator, so that comparison must be generated first.
    pub fn dependencies(&self) -> &'static [InstructionKind] {
        match self {
            InstructionKind::Jz => &[InstructionKind::Eq],
            InstructionKind::Jnz => &[InstructionKind::Neq],
            _ => &[],
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl FromStr for InstructionKind {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        InstructionKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.mnemonic().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| GenerationError::UnknownInstruction(wanted.to_string()))
    }
}
