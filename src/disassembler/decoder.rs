use super::{
    instruction::{is_argument_access, Immediate, Instruction, Operand},
    opcodes::{self, OperandEncoding},
};
use crate::{file::parser::Parser, metadata::token::Token, Result};

/// Upper bound on `switch` arms accepted from an instruction stream.
const MAX_SWITCH_TARGETS: u32 = 0x0001_0000;

/// Decode all instructions from the parser's position to the end of its data.
///
/// Offsets of the returned instructions and branch targets are relative to the start of the
/// parser's data, which is the first byte of the method's code.
///
/// # Errors
/// Returns an error for unknown opcodes or truncated operands.
///
/// # Examples
///
/// ```rust
/// use vmscope::{disassembler::decode_stream, Parser};
///
/// // ldc.i4.1, ldc.i4.2, add, ret
/// let mut parser = Parser::new(&[0x17, 0x18, 0x58, 0x2A]);
/// let instructions = decode_stream(&mut parser)?;
///
/// assert_eq!(instructions.len(), 4);
/// assert_eq!(instructions[2].mnemonic, "add");
/// # Ok::<(), vmscope::Error>(())
/// ```
pub fn decode_stream(parser: &mut Parser) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();

    while parser.has_more_data() {
        instructions.push(decode_instruction(parser)?);
    }

    Ok(instructions)
}

/// Decode a single instruction at the parser's position.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for unknown or reserved opcodes and
/// [`crate::Error::OutOfBounds`] for truncated operands.
///
/// # Examples
///
/// ```rust
/// use vmscope::{disassembler::{decode_instruction, Operand}, Parser};
///
/// let mut parser = Parser::new(&[0x72, 0x01, 0x00, 0x00, 0x70]);
/// let instruction = decode_instruction(&mut parser)?;
///
/// assert_eq!(instruction.mnemonic, "ldstr");
/// assert!(matches!(instruction.operand, Operand::Token(token) if token.value() == 0x7000_0001));
/// # Ok::<(), vmscope::Error>(())
/// ```
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let offset = parser.pos() as u64;
    let first_byte = parser.read_le::<u8>()?;

    let info = if first_byte == 0xFE {
        let second_byte = parser.read_le::<u8>()?;
        match opcodes::lookup(0xFE, second_byte) {
            Some(info) => info,
            None => return Err(malformed_error!("Invalid opcode: FE {:02X}", second_byte)),
        }
    } else {
        match opcodes::lookup(0, first_byte) {
            Some(info) => info,
            None => return Err(malformed_error!("Invalid opcode: {:02X}", first_byte)),
        }
    };

    let operand = match info.encoding {
        OperandEncoding::None => Operand::None,
        OperandEncoding::ShortInt => {
            if info.mnemonic == "ldc.i4.s" {
                Operand::Immediate(Immediate::Int8(parser.read_le::<i8>()?))
            } else {
                Operand::Immediate(Immediate::UInt8(parser.read_le::<u8>()?))
            }
        }
        OperandEncoding::Int => Operand::Immediate(Immediate::Int32(parser.read_le::<i32>()?)),
        OperandEncoding::Int64 => Operand::Immediate(Immediate::Int64(parser.read_le::<i64>()?)),
        OperandEncoding::ShortFloat => {
            Operand::Immediate(Immediate::Float32(parser.read_le::<f32>()?))
        }
        OperandEncoding::Float => Operand::Immediate(Immediate::Float64(parser.read_le::<f64>()?)),
        OperandEncoding::ShortVar | OperandEncoding::Var => {
            let index = if info.encoding == OperandEncoding::ShortVar {
                u16::from(parser.read_le::<u8>()?)
            } else {
                parser.read_le::<u16>()?
            };

            if is_argument_access(info.canonical) {
                Operand::Argument(index)
            } else {
                Operand::Local(index)
            }
        }
        OperandEncoding::ShortBranch => {
            let delta = i64::from(parser.read_le::<i8>()?);
            Operand::Target(relative_target(parser.pos(), delta))
        }
        OperandEncoding::Branch => {
            let delta = i64::from(parser.read_le::<i32>()?);
            Operand::Target(relative_target(parser.pos(), delta))
        }
        OperandEncoding::Switch => {
            let count = parser.read_le::<u32>()?;
            if count > MAX_SWITCH_TARGETS {
                return Err(malformed_error!("Switch with {} targets", count));
            }

            let mut deltas = Vec::with_capacity(count as usize);
            for _ in 0..count {
                deltas.push(i64::from(parser.read_le::<i32>()?));
            }

            let next = parser.pos();
            Operand::Switch(
                deltas
                    .into_iter()
                    .map(|delta| relative_target(next, delta))
                    .collect(),
            )
        }
        OperandEncoding::Type
        | OperandEncoding::Method
        | OperandEncoding::Field
        | OperandEncoding::Tok
        | OperandEncoding::String
        | OperandEncoding::Sig => Operand::Token(Token::new(parser.read_le::<u32>()?)),
    };

    Ok(Instruction {
        offset,
        size: parser.pos() as u64 - offset,
        prefix: info.prefix,
        opcode: info.code,
        mnemonic: info.mnemonic,
        flow_type: info.flow,
        operand,
    })
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn relative_target(next: usize, delta: i64) -> u64 {
    (next as i64).wrapping_add(delta) as u64
}
