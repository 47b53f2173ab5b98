//! Restricted evaluation of constant initializers.
//!
//! Obfuscators rarely store their key as a literal. Instead the static constructor builds
//! it from a handful of constants with arithmetic, bitwise operations and rotations. This
//! evaluator runs exactly that subset of CIL on a small typed stack and refuses everything
//! else, so it never has to guess what a call or a branch would have done.
//!
//! Supported instructions: `nop`, `ldc.i4*`, `ldc.i8`, `dup`, `pop`, `add`, `sub`, `mul`,
//! `and`, `or`, `xor`, `shl`, `shr`, `shr.un`, `neg`, `not`, `conv.i4`, `conv.u4`,
//! `conv.i8`, `conv.u8`, `stloc*`, `ldloc*` and `ldsfld`. Arithmetic wraps like the CLR does.
//!
//! # Examples
//!
//! ```rust
//! use vmscope::{
//!     devirtualization::evaluate_constant,
//!     disassembler::{Immediate, Instruction, Operand},
//! };
//!
//! // (0x1234 << 16) | 0xABCD
//! let sequence = vec![
//!     Instruction::from_mnemonic("ldc.i4", Operand::Immediate(Immediate::Int32(0x1234)))?,
//!     Instruction::from_mnemonic("ldc.i4.s", Operand::Immediate(Immediate::Int8(16)))?,
//!     Instruction::from_mnemonic("shl", Operand::None)?,
//!     Instruction::from_mnemonic("ldc.i4", Operand::Immediate(Immediate::Int32(0xABCD)))?,
//!     Instruction::from_mnemonic("or", Operand::None)?,
//! ];
//! assert_eq!(evaluate_constant(&sequence)?, 0x1234_ABCD);
//! # Ok::<(), vmscope::Error>(())
//! ```

use std::collections::HashMap;

use thiserror::Error;

use crate::{
    disassembler::Instruction,
    metadata::{container::CodeContainer, token::Token},
};

/// Why a constant could not be evaluated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The instruction is outside the supported subset.
    #[error("unsupported instruction '{mnemonic}' at index {index}")]
    Unsupported {
        /// Mnemonic of the instruction
        mnemonic: String,
        /// Position in the sequence
        index: usize,
    },

    /// An instruction needed more values than the stack held.
    #[error("stack underflow at index {index}")]
    StackUnderflow {
        /// Position in the sequence
        index: usize,
    },

    /// The sequence did not leave exactly one value.
    #[error("sequence leaves {depth} values on the stack")]
    StackImbalance {
        /// Number of values left
        depth: usize,
    },

    /// A binary operation mixed 32-bit and 64-bit operands.
    #[error("operand width mismatch for '{mnemonic}' at index {index}")]
    TypeMismatch {
        /// Mnemonic of the instruction
        mnemonic: String,
        /// Position in the sequence
        index: usize,
    },

    /// A loaded static field has no initializer that can be found.
    #[error("no initializer for field {token}")]
    UnresolvedField {
        /// The field token
        token: Token,
    },

    /// A local was stored more than once.
    #[error("local {local} is assigned more than once")]
    Reassigned {
        /// Local index
        local: u16,
    },

    /// A local was loaded before it was stored.
    #[error("local {local} is read before it is assigned")]
    UnassignedLocal {
        /// Local index
        local: u16,
    },

    /// Field initializers load each other deeper than the configured limit.
    #[error("field initializers nest deeper than {0}")]
    RecursionLimit(usize),

    /// The sequence is empty.
    #[error("empty instruction sequence")]
    Empty,
}

/// A typed stack value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value {
    I32(i32),
    I64(i64),
}

impl Value {
    fn widen(self) -> i64 {
        match self {
            Value::I32(value) => i64::from(value),
            Value::I64(value) => value,
        }
    }
}

type Initializers<'a> = dyn Fn(Token) -> Option<Vec<Instruction>> + 'a;

struct Evaluator<'a> {
    initializers: &'a Initializers<'a>,
    max_depth: usize,
}

impl Evaluator<'_> {
    fn run(&self, instructions: &[Instruction], depth: usize) -> Result<Value, EvalError> {
        if instructions.is_empty() {
            return Err(EvalError::Empty);
        }

        let mut stack: Vec<Value> = Vec::new();
        let mut locals: HashMap<u16, Value> = HashMap::new();

        for (index, instruction) in instructions.iter().enumerate() {
            let mnemonic = instruction.canonical_mnemonic();
            let mismatch = || EvalError::TypeMismatch {
                mnemonic: instruction.mnemonic.to_string(),
                index,
            };

            let value = match mnemonic {
                "nop" => continue,
                "ldc.i4" => match instruction.int_constant() {
                    Some(value) => Value::I32(value as i32),
                    None => return Err(mismatch()),
                },
                "ldc.i8" => match instruction.int_constant() {
                    Some(value) => Value::I64(value),
                    None => return Err(mismatch()),
                },
                "dup" => {
                    let value = pop(&mut stack, index)?;
                    stack.push(value);
                    value
                }
                "pop" => {
                    pop(&mut stack, index)?;
                    continue;
                }
                "add" | "sub" | "mul" | "and" | "or" | "xor" => {
                    let right = pop(&mut stack, index)?;
                    let left = pop(&mut stack, index)?;
                    match (left, right) {
                        (Value::I32(left), Value::I32(right)) => {
                            Value::I32(binary32(mnemonic, left, right))
                        }
                        (Value::I64(left), Value::I64(right)) => {
                            Value::I64(binary64(mnemonic, left, right))
                        }
                        _ => return Err(mismatch()),
                    }
                }
                "shl" | "shr" | "shr.un" => {
                    let Value::I32(count) = pop(&mut stack, index)? else {
                        return Err(mismatch());
                    };
                    let count = count as u32;
                    match pop(&mut stack, index)? {
                        Value::I32(value) => Value::I32(match mnemonic {
                            "shl" => value.wrapping_shl(count),
                            "shr" => value.wrapping_shr(count),
                            _ => (value as u32).wrapping_shr(count) as i32,
                        }),
                        Value::I64(value) => Value::I64(match mnemonic {
                            "shl" => value.wrapping_shl(count),
                            "shr" => value.wrapping_shr(count),
                            _ => (value as u64).wrapping_shr(count) as i64,
                        }),
                    }
                }
                "neg" => match pop(&mut stack, index)? {
                    Value::I32(value) => Value::I32(value.wrapping_neg()),
                    Value::I64(value) => Value::I64(value.wrapping_neg()),
                },
                "not" => match pop(&mut stack, index)? {
                    Value::I32(value) => Value::I32(!value),
                    Value::I64(value) => Value::I64(!value),
                },
                "conv.i4" | "conv.u4" => Value::I32(pop(&mut stack, index)?.widen() as i32),
                "conv.i8" => Value::I64(pop(&mut stack, index)?.widen()),
                "conv.u8" => match pop(&mut stack, index)? {
                    Value::I32(value) => Value::I64(i64::from(value as u32)),
                    Value::I64(value) => Value::I64(value),
                },
                "stloc" => {
                    let value = pop(&mut stack, index)?;
                    let Some(local) = instruction.local_index() else {
                        return Err(mismatch());
                    };
                    if locals.insert(local, value).is_some() {
                        return Err(EvalError::Reassigned { local });
                    }
                    continue;
                }
                "ldloc" => {
                    let Some(local) = instruction.local_index() else {
                        return Err(mismatch());
                    };
                    *locals
                        .get(&local)
                        .ok_or(EvalError::UnassignedLocal { local })?
                }
                "ldsfld" => {
                    let Some(token) = instruction.token() else {
                        return Err(mismatch());
                    };
                    self.field(token, depth + 1)?
                }
                _ => {
                    return Err(EvalError::Unsupported {
                        mnemonic: instruction.mnemonic.to_string(),
                        index,
                    })
                }
            };

            stack.push(value);
        }

        match stack.as_slice() {
            [value] => Ok(*value),
            _ => Err(EvalError::StackImbalance { depth: stack.len() }),
        }
    }

    fn field(&self, token: Token, depth: usize) -> Result<Value, EvalError> {
        if depth > self.max_depth {
            return Err(EvalError::RecursionLimit(self.max_depth));
        }

        let Some(initializer) = (self.initializers)(token) else {
            return Err(EvalError::UnresolvedField { token });
        };

        self.run(&initializer, depth)
    }
}

fn pop(stack: &mut Vec<Value>, index: usize) -> Result<Value, EvalError> {
    stack.pop().ok_or(EvalError::StackUnderflow { index })
}

fn binary32(mnemonic: &str, left: i32, right: i32) -> i32 {
    match mnemonic {
        "add" => left.wrapping_add(right),
        "sub" => left.wrapping_sub(right),
        "mul" => left.wrapping_mul(right),
        "and" => left & right,
        "or" => left | right,
        _ => left ^ right,
    }
}

fn binary64(mnemonic: &str, left: i64, right: i64) -> i64 {
    match mnemonic {
        "add" => left.wrapping_add(right),
        "sub" => left.wrapping_sub(right),
        "mul" => left.wrapping_mul(right),
        "and" => left & right,
        "or" => left | right,
        _ => left ^ right,
    }
}

/// Evaluate a self-contained instruction sequence.
///
/// A 32-bit result is sign-extended. Static field loads fail with
/// [`EvalError::UnresolvedField`]; use [`evaluate_field`] to follow them.
///
/// # Errors
/// Returns an [`EvalError`] for unsupported instructions and malformed sequences.
pub fn evaluate_constant(instructions: &[Instruction]) -> Result<i64, EvalError> {
    let evaluator = Evaluator {
        initializers: &|_| None,
        max_depth: 0,
    };

    evaluator.run(instructions, 0).map(Value::widen)
}

/// Evaluate the static initializer of `field`, following loads of other static fields
/// through their own initializers up to `max_depth` levels.
///
/// # Errors
/// Returns [`EvalError::UnresolvedField`] if the container has no initializer for a field,
/// [`EvalError::RecursionLimit`] for initializers nested too deep (including cycles), and
/// the errors of [`evaluate_constant`].
pub fn evaluate_field<C: CodeContainer + ?Sized>(
    container: &C,
    field: Token,
    max_depth: usize,
) -> Result<i64, EvalError> {
    let initializers = |token| container.field_initializer(token);
    let evaluator = Evaluator {
        initializers: &initializers,
        max_depth,
    };

    evaluator.field(field, 0).map(Value::widen)
}
