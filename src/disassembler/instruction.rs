//! Decoded CIL instructions.

use std::fmt;

use super::opcodes::{self, OpCode, OperandEncoding};
use crate::{metadata::token::Token, Result};

/// An inline immediate value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// Signed 8-bit value (`ldc.i4.s`)
    Int8(i8),
    /// Unsigned 8-bit value (`unaligned.`, `no.`)
    UInt8(u8),
    /// Signed 32-bit value
    Int32(i32),
    /// Signed 64-bit value
    Int64(i64),
    /// 32-bit float
    Float32(f32),
    /// 64-bit float
    Float64(f64),
}

impl Immediate {
    /// The value as a sign-extended integer, or `None` for floats.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Immediate::Int8(value) => Some(i64::from(value)),
            Immediate::UInt8(value) => Some(i64::from(value)),
            Immediate::Int32(value) => Some(i64::from(value)),
            Immediate::Int64(value) => Some(value),
            Immediate::Float32(_) | Immediate::Float64(_) => None,
        }
    }
}

/// The decoded inline operand of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Integer or float immediate
    Immediate(Immediate),
    /// Absolute offset of a branch target within the method body
    Target(u64),
    /// Absolute offsets of the targets of a `switch`
    Switch(Vec<u64>),
    /// Metadata or user-string token
    Token(Token),
    /// Local variable index
    Local(u16),
    /// Argument index
    Argument(u16),
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Branches when a condition holds
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Calls another method and continues
    Call,
    /// Returns from the method
    Return,
    /// Multi-way branch
    Switch,
    /// Raises an exception
    Throw,
    /// Ends a finally, fault or filter block
    EndFinally,
    /// Leaves a protected region
    Leave,
    /// Prefix that modifies the next instruction
    Meta,
}

/// A single CIL instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Offset of the first opcode byte within the method body
    pub offset: u64,
    /// Encoded size in bytes
    pub size: u64,
    /// `0xFE` for two-byte opcodes, `0` otherwise
    pub prefix: u8,
    /// The (second) opcode byte
    pub opcode: u8,
    /// ILAsm mnemonic
    pub mnemonic: &'static str,
    /// Effect on control flow
    pub flow_type: FlowType,
    /// The decoded operand
    pub operand: Operand,
}

impl Instruction {
    /// Build an instruction from its mnemonic and operand, for callers that assemble
    /// instruction streams without encoded bytes.
    ///
    /// The offset is left at zero and the size follows the opcode's encoding.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the mnemonic is unknown or the operand does not
    /// fit the opcode's operand encoding.
    pub fn from_mnemonic(mnemonic: &str, operand: Operand) -> Result<Instruction> {
        let Some(info) = opcodes::by_mnemonic(mnemonic) else {
            return Err(malformed_error!("Unknown mnemonic - {}", mnemonic));
        };

        let fits = match (&operand, info.encoding) {
            (Operand::None, OperandEncoding::None) => true,
            (Operand::Immediate(Immediate::Int8(_)), OperandEncoding::ShortInt) => {
                info.mnemonic == "ldc.i4.s"
            }
            (Operand::Immediate(Immediate::UInt8(_)), OperandEncoding::ShortInt) => {
                info.mnemonic != "ldc.i4.s"
            }
            (Operand::Immediate(Immediate::Int32(_)), OperandEncoding::Int)
            | (Operand::Immediate(Immediate::Int64(_)), OperandEncoding::Int64)
            | (Operand::Immediate(Immediate::Float32(_)), OperandEncoding::ShortFloat)
            | (Operand::Immediate(Immediate::Float64(_)), OperandEncoding::Float)
            | (Operand::Target(_), OperandEncoding::ShortBranch | OperandEncoding::Branch)
            | (Operand::Switch(_), OperandEncoding::Switch) => true,
            (Operand::Local(index), OperandEncoding::ShortVar | OperandEncoding::Var) => {
                !is_argument_access(info.canonical)
                    && (info.encoding == OperandEncoding::Var || *index <= 0xFF)
            }
            (Operand::Argument(index), OperandEncoding::ShortVar | OperandEncoding::Var) => {
                is_argument_access(info.canonical)
                    && (info.encoding == OperandEncoding::Var || *index <= 0xFF)
            }
            (
                Operand::Token(_),
                OperandEncoding::Type
                | OperandEncoding::Method
                | OperandEncoding::Field
                | OperandEncoding::Tok
                | OperandEncoding::String
                | OperandEncoding::Sig,
            ) => true,
            _ => false,
        };

        if !fits {
            return Err(malformed_error!(
                "Operand {:?} does not fit '{}'",
                operand,
                mnemonic
            ));
        }

        let operand_size = match &operand {
            Operand::Switch(targets) => 4 + 4 * targets.len(),
            _ => info.encoding.size().unwrap_or(0),
        };
        let opcode_size = if info.prefix == 0xFE { 2 } else { 1 };

        Ok(Instruction {
            offset: 0,
            size: (opcode_size + operand_size) as u64,
            prefix: info.prefix,
            opcode: info.code,
            mnemonic: info.mnemonic,
            flow_type: info.flow,
            operand,
        })
    }

    /// The opcode table entry of this instruction.
    #[must_use]
    pub fn info(&self) -> Option<&'static OpCode> {
        opcodes::lookup(self.prefix, self.opcode)
    }

    /// The long form this instruction folds into (`ldarg.0` -> `ldarg`).
    #[must_use]
    pub fn canonical_mnemonic(&self) -> &'static str {
        self.info().map_or(self.mnemonic, |info| info.canonical)
    }

    /// Returns `true` if the canonical mnemonic equals `mnemonic`.
    #[must_use]
    pub fn is(&self, mnemonic: &str) -> bool {
        self.canonical_mnemonic() == mnemonic
    }

    /// The token operand, if any.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        match self.operand {
            Operand::Token(token) => Some(token),
            _ => None,
        }
    }

    /// The pushed integer of an `ldc.i4*` or `ldc.i8` instruction, including macro forms.
    #[must_use]
    pub fn int_constant(&self) -> Option<i64> {
        match self.mnemonic {
            "ldc.i4.m1" => Some(-1),
            "ldc.i4.s" | "ldc.i4" | "ldc.i8" => match self.operand {
                Operand::Immediate(immediate) => immediate.as_i64(),
                _ => None,
            },
            _ => self
                .mnemonic
                .strip_prefix("ldc.i4.")
                .and_then(|digit| digit.parse::<i64>().ok()),
        }
    }

    /// The local index used by `ldloc*`, `ldloca*` and `stloc*`, including macro forms.
    #[must_use]
    pub fn local_index(&self) -> Option<u16> {
        match self.operand {
            Operand::Local(index) => Some(index),
            _ => macro_index(self.mnemonic, &["ldloc.", "stloc."]),
        }
    }

    /// The argument index used by `ldarg*`, `ldarga*` and `starg*`, including macro forms.
    #[must_use]
    pub fn argument_index(&self) -> Option<u16> {
        match self.operand {
            Operand::Argument(index) => Some(index),
            _ => macro_index(self.mnemonic, &["ldarg."]),
        }
    }

    /// Returns `true` for instructions that transfer control to another location.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.flow_type,
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch | FlowType::Switch
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {}", self.offset, self.mnemonic)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Immediate(immediate) => match immediate.as_i64() {
                Some(value) => write!(f, " {value}"),
                None => write!(f, " {immediate:?}"),
            },
            Operand::Target(target) => write!(f, " IL_{target:04x}"),
            Operand::Switch(targets) => {
                let labels = targets
                    .iter()
                    .map(|target| format!("IL_{target:04x}"))
                    .collect::<Vec<_>>();
                write!(f, " ({})", labels.join(", "))
            }
            Operand::Token(token) => write!(f, " {token}"),
            Operand::Local(index) => write!(f, " V_{index}"),
            Operand::Argument(index) => write!(f, " A_{index}"),
        }
    }
}

/// Returns `true` if a canonical `*arg*` mnemonic addresses arguments rather than locals.
pub(crate) fn is_argument_access(canonical: &str) -> bool {
    matches!(canonical, "ldarg" | "ldarga" | "starg")
}

fn macro_index(mnemonic: &str, prefixes: &[&str]) -> Option<u16> {
    prefixes.iter().find_map(|prefix| {
        mnemonic
            .strip_prefix(prefix)
            .and_then(|digit| digit.parse::<u16>().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_mnemonic() {
        let ldc = Instruction::from_mnemonic("ldc.i4", Operand::Immediate(Immediate::Int32(7)))
            .unwrap();
        assert_eq!(ldc.size, 5);
        assert_eq!(ldc.int_constant(), Some(7));

        let ldloc = Instruction::from_mnemonic("ldloc", Operand::Local(300)).unwrap();
        assert_eq!(ldloc.size, 4);
        assert_eq!(ldloc.prefix, 0xFE);
        assert_eq!(ldloc.local_index(), Some(300));

        let switch =
            Instruction::from_mnemonic("switch", Operand::Switch(vec![0x10, 0x20])).unwrap();
        assert_eq!(switch.size, 13);
        assert!(switch.is_branch());
    }

    #[test]
    fn from_mnemonic_rejects_mismatch() {
        assert!(Instruction::from_mnemonic("ldc.i4.9", Operand::None).is_err());
        assert!(Instruction::from_mnemonic("ret", Operand::Local(0)).is_err());
        assert!(Instruction::from_mnemonic("ldarg.s", Operand::Local(0)).is_err());
        assert!(Instruction::from_mnemonic("ldloc.s", Operand::Local(0x100)).is_err());
    }

    #[test]
    fn macro_forms() {
        let ldc = Instruction::from_mnemonic("ldc.i4.m1", Operand::None).unwrap();
        assert_eq!(ldc.int_constant(), Some(-1));
        assert_eq!(ldc.canonical_mnemonic(), "ldc.i4");

        let ldc = Instruction::from_mnemonic("ldc.i4.8", Operand::None).unwrap();
        assert_eq!(ldc.int_constant(), Some(8));

        let stloc = Instruction::from_mnemonic("stloc.3", Operand::None).unwrap();
        assert_eq!(stloc.local_index(), Some(3));
        assert!(stloc.is("stloc"));

        let ldarg = Instruction::from_mnemonic("ldarg.1", Operand::None).unwrap();
        assert_eq!(ldarg.argument_index(), Some(1));
        assert_eq!(ldarg.local_index(), None);
    }

    #[test]
    fn display() {
        let mut instruction =
            Instruction::from_mnemonic("ldstr", Operand::Token(Token::new(0x7000_0001))).unwrap();
        instruction.offset = 0x12;
        assert_eq!(instruction.to_string(), "IL_0012: ldstr 0x70000001");
    }
}
