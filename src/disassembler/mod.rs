//! CIL instruction decoding.
//!
//! The [`opcodes`] table describes every defined opcode; [`decode_instruction`] and
//! [`decode_stream`] turn method body bytes into [`Instruction`] values whose operands are
//! already typed (immediates, branch targets, tokens, local and argument indices).
//!
//! # Example
//! ```rust
//! use vmscope::{disassembler::decode_instruction, Parser};
//!
//! let bytecode = &[0x00, 0x2A]; // nop, ret
//! let mut parser = Parser::new(bytecode);
//! let instruction = decode_instruction(&mut parser)?;
//! assert_eq!(instruction.mnemonic, "nop");
//! # Ok::<(), vmscope::Error>(())
//! ```

mod decoder;
mod instruction;
pub mod opcodes;

pub use decoder::{decode_instruction, decode_stream};
pub use instruction::{FlowType, Immediate, Instruction, Operand};
pub(crate) use instruction::is_argument_access;
pub use opcodes::{OpCode, OperandEncoding};
