//! The CIL opcode table (ECMA-335 Partition III).
//!
//! Every defined opcode is listed once with its mnemonic, the canonical long form it folds
//! into for structural comparison, the encoding of its inline operand and its effect on
//! control flow. Lookups by byte value and by mnemonic go through indexes built on first use.

use std::{collections::HashMap, sync::OnceLock};

use super::instruction::FlowType;

/// How an opcode's inline operand is encoded in the instruction stream.
///
/// The variants follow the operand kinds of ECMA-335 Partition VI.C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandEncoding {
    /// `InlineNone` - no operand
    None,
    /// `ShortInlineI` - 8-bit integer
    ShortInt,
    /// `InlineI` - 32-bit integer
    Int,
    /// `InlineI8` - 64-bit integer
    Int64,
    /// `ShortInlineR` - 32-bit float
    ShortFloat,
    /// `InlineR` - 64-bit float
    Float,
    /// `ShortInlineVar` - 8-bit local or argument index
    ShortVar,
    /// `InlineVar` - 16-bit local or argument index
    Var,
    /// `ShortInlineBrTarget` - 8-bit relative branch target
    ShortBranch,
    /// `InlineBrTarget` - 32-bit relative branch target
    Branch,
    /// `InlineSwitch` - count followed by 32-bit relative targets
    Switch,
    /// `InlineType` - TypeDef, TypeRef or TypeSpec token
    Type,
    /// `InlineMethod` - MethodDef, MemberRef or MethodSpec token
    Method,
    /// `InlineField` - Field or MemberRef token
    Field,
    /// `InlineTok` - any type, method or field token
    Tok,
    /// `InlineString` - user-string heap token
    String,
    /// `InlineSig` - StandAloneSig token
    Sig,
}

impl OperandEncoding {
    /// Fixed size of the operand in bytes, or `None` for the variable-length switch table.
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self {
            OperandEncoding::None => Some(0),
            OperandEncoding::ShortInt | OperandEncoding::ShortVar | OperandEncoding::ShortBranch => {
                Some(1)
            }
            OperandEncoding::Var => Some(2),
            OperandEncoding::Int
            | OperandEncoding::ShortFloat
            | OperandEncoding::Branch
            | OperandEncoding::Type
            | OperandEncoding::Method
            | OperandEncoding::Field
            | OperandEncoding::Tok
            | OperandEncoding::String
            | OperandEncoding::Sig => Some(4),
            OperandEncoding::Int64 | OperandEncoding::Float => Some(8),
            OperandEncoding::Switch => None,
        }
    }
}

/// One entry of the opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    /// `0xFE` for two-byte opcodes, `0` otherwise
    pub prefix: u8,
    /// The (second) opcode byte
    pub code: u8,
    /// The mnemonic as written in ILAsm
    pub mnemonic: &'static str,
    /// Long form that short and macro encodings fold into (`ldarg.0` -> `ldarg`)
    pub canonical: &'static str,
    /// Encoding of the inline operand
    pub encoding: OperandEncoding,
    /// Effect on control flow
    pub flow: FlowType,
}

impl OpCode {
    /// Returns `true` if this opcode is a short or macro form of another opcode.
    #[must_use]
    pub fn is_folded(&self) -> bool {
        self.mnemonic != self.canonical
    }
}

const fn op(
    prefix: u8,
    code: u8,
    mnemonic: &'static str,
    canonical: &'static str,
    encoding: OperandEncoding,
    flow: FlowType,
) -> OpCode {
    OpCode {
        prefix,
        code,
        mnemonic,
        canonical,
        encoding,
        flow,
    }
}

use FlowType::{
    Call, ConditionalBranch, EndFinally, Leave, Meta, Return, Sequential, Switch as SwitchFlow,
    Throw, UnconditionalBranch,
};
use OperandEncoding as E;

/// All defined CIL opcodes.
#[rustfmt::skip]
pub static OPCODES: &[OpCode] = &[
    op(0x00, 0x00, "nop", "nop", E::None, Sequential),
    op(0x00, 0x01, "break", "break", E::None, Sequential),
    op(0x00, 0x02, "ldarg.0", "ldarg", E::None, Sequential),
    op(0x00, 0x03, "ldarg.1", "ldarg", E::None, Sequential),
    op(0x00, 0x04, "ldarg.2", "ldarg", E::None, Sequential),
    op(0x00, 0x05, "ldarg.3", "ldarg", E::None, Sequential),
    op(0x00, 0x06, "ldloc.0", "ldloc", E::None, Sequential),
    op(0x00, 0x07, "ldloc.1", "ldloc", E::None, Sequential),
    op(0x00, 0x08, "ldloc.2", "ldloc", E::None, Sequential),
    op(0x00, 0x09, "ldloc.3", "ldloc", E::None, Sequential),
    op(0x00, 0x0A, "stloc.0", "stloc", E::None, Sequential),
    op(0x00, 0x0B, "stloc.1", "stloc", E::None, Sequential),
    op(0x00, 0x0C, "stloc.2", "stloc", E::None, Sequential),
    op(0x00, 0x0D, "stloc.3", "stloc", E::None, Sequential),
    op(0x00, 0x0E, "ldarg.s", "ldarg", E::ShortVar, Sequential),
    op(0x00, 0x0F, "ldarga.s", "ldarga", E::ShortVar, Sequential),
    op(0x00, 0x10, "starg.s", "starg", E::ShortVar, Sequential),
    op(0x00, 0x11, "ldloc.s", "ldloc", E::ShortVar, Sequential),
    op(0x00, 0x12, "ldloca.s", "ldloca", E::ShortVar, Sequential),
    op(0x00, 0x13, "stloc.s", "stloc", E::ShortVar, Sequential),
    op(0x00, 0x14, "ldnull", "ldnull", E::None, Sequential),
    op(0x00, 0x15, "ldc.i4.m1", "ldc.i4", E::None, Sequential),
    op(0x00, 0x16, "ldc.i4.0", "ldc.i4", E::None, Sequential),
    op(0x00, 0x17, "ldc.i4.1", "ldc.i4", E::None, Sequential),
    op(0x00, 0x18, "ldc.i4.2", "ldc.i4", E::None, Sequential),
    op(0x00, 0x19, "ldc.i4.3", "ldc.i4", E::None, Sequential),
    op(0x00, 0x1A, "ldc.i4.4", "ldc.i4", E::None, Sequential),
    op(0x00, 0x1B, "ldc.i4.5", "ldc.i4", E::None, Sequential),
    op(0x00, 0x1C, "ldc.i4.6", "ldc.i4", E::None, Sequential),
    op(0x00, 0x1D, "ldc.i4.7", "ldc.i4", E::None, Sequential),
    op(0x00, 0x1E, "ldc.i4.8", "ldc.i4", E::None, Sequential),
    op(0x00, 0x1F, "ldc.i4.s", "ldc.i4", E::ShortInt, Sequential),
    op(0x00, 0x20, "ldc.i4", "ldc.i4", E::Int, Sequential),
    op(0x00, 0x21, "ldc.i8", "ldc.i8", E::Int64, Sequential),
    op(0x00, 0x22, "ldc.r4", "ldc.r4", E::ShortFloat, Sequential),
    op(0x00, 0x23, "ldc.r8", "ldc.r8", E::Float, Sequential),
    op(0x00, 0x25, "dup", "dup", E::None, Sequential),
    op(0x00, 0x26, "pop", "pop", E::None, Sequential),
    op(0x00, 0x27, "jmp", "jmp", E::Method, Call),
    op(0x00, 0x28, "call", "call", E::Method, Call),
    op(0x00, 0x29, "calli", "calli", E::Sig, Call),
    op(0x00, 0x2A, "ret", "ret", E::None, Return),
    op(0x00, 0x2B, "br.s", "br", E::ShortBranch, UnconditionalBranch),
    op(0x00, 0x2C, "brfalse.s", "brfalse", E::ShortBranch, ConditionalBranch),
    op(0x00, 0x2D, "brtrue.s", "brtrue", E::ShortBranch, ConditionalBranch),
    op(0x00, 0x2E, "beq.s", "beq", E::ShortBranch, ConditionalBranch),
    op(0x00, 0x2F, "bge.s", "bge", E::ShortBranch, ConditionalBranch),
    op(0x00, 0x30, "bgt.s", "bgt", E::ShortBranch, ConditionalBranch),
    op(0x00, 0x31, "ble.s", "ble", E::ShortBranch, ConditionalBranch),
    op(0x00, 0x32, "blt.s", "blt", E::ShortBranch, ConditionalBranch),
    op(0x00, 0x33, "bne.un.s", "bne.un", E::ShortBranch, ConditionalBranch),
    op(0x00, 0x34, "bge.un.s", "bge.un", E::ShortBranch, ConditionalBranch),
    op(0x00, 0x35, "bgt.un.s", "bgt.un", E::ShortBranch, ConditionalBranch),
    op(0x00, 0x36, "ble.un.s", "ble.un", E::ShortBranch, ConditionalBranch),
    op(0x00, 0x37, "blt.un.s", "blt.un", E::ShortBranch, ConditionalBranch),
    op(0x00, 0x38, "br", "br", E::Branch, UnconditionalBranch),
    op(0x00, 0x39, "brfalse", "brfalse", E::Branch, ConditionalBranch),
    op(0x00, 0x3A, "brtrue", "brtrue", E::Branch, ConditionalBranch),
    op(0x00, 0x3B, "beq", "beq", E::Branch, ConditionalBranch),
    op(0x00, 0x3C, "bge", "bge", E::Branch, ConditionalBranch),
    op(0x00, 0x3D, "bgt", "bgt", E::Branch, ConditionalBranch),
    op(0x00, 0x3E, "ble", "ble", E::Branch, ConditionalBranch),
    op(0x00, 0x3F, "blt", "blt", E::Branch, ConditionalBranch),
    op(0x00, 0x40, "bne.un", "bne.un", E::Branch, ConditionalBranch),
    op(0x00, 0x41, "bge.un", "bge.un", E::Branch, ConditionalBranch),
    op(0x00, 0x42, "bgt.un", "bgt.un", E::Branch, ConditionalBranch),
    op(0x00, 0x43, "ble.un", "ble.un", E::Branch, ConditionalBranch),
    op(0x00, 0x44, "blt.un", "blt.un", E::Branch, ConditionalBranch),
    op(0x00, 0x45, "switch", "switch", E::Switch, SwitchFlow),
    op(0x00, 0x46, "ldind.i1", "ldind.i1", E::None, Sequential),
    op(0x00, 0x47, "ldind.u1", "ldind.u1", E::None, Sequential),
    op(0x00, 0x48, "ldind.i2", "ldind.i2", E::None, Sequential),
    op(0x00, 0x49, "ldind.u2", "ldind.u2", E::None, Sequential),
    op(0x00, 0x4A, "ldind.i4", "ldind.i4", E::None, Sequential),
    op(0x00, 0x4B, "ldind.u4", "ldind.u4", E::None, Sequential),
    op(0x00, 0x4C, "ldind.i8", "ldind.i8", E::None, Sequential),
    op(0x00, 0x4D, "ldind.i", "ldind.i", E::None, Sequential),
    op(0x00, 0x4E, "ldind.r4", "ldind.r4", E::None, Sequential),
    op(0x00, 0x4F, "ldind.r8", "ldind.r8", E::None, Sequential),
    op(0x00, 0x50, "ldind.ref", "ldind.ref", E::None, Sequential),
    op(0x00, 0x51, "stind.ref", "stind.ref", E::None, Sequential),
    op(0x00, 0x52, "stind.i1", "stind.i1", E::None, Sequential),
    op(0x00, 0x53, "stind.i2", "stind.i2", E::None, Sequential),
    op(0x00, 0x54, "stind.i4", "stind.i4", E::None, Sequential),
    op(0x00, 0x55, "stind.i8", "stind.i8", E::None, Sequential),
    op(0x00, 0x56, "stind.r4", "stind.r4", E::None, Sequential),
    op(0x00, 0x57, "stind.r8", "stind.r8", E::None, Sequential),
    op(0x00, 0x58, "add", "add", E::None, Sequential),
    op(0x00, 0x59, "sub", "sub", E::None, Sequential),
    op(0x00, 0x5A, "mul", "mul", E::None, Sequential),
    op(0x00, 0x5B, "div", "div", E::None, Sequential),
    op(0x00, 0x5C, "div.un", "div.un", E::None, Sequential),
    op(0x00, 0x5D, "rem", "rem", E::None, Sequential),
    op(0x00, 0x5E, "rem.un", "rem.un", E::None, Sequential),
    op(0x00, 0x5F, "and", "and", E::None, Sequential),
    op(0x00, 0x60, "or", "or", E::None, Sequential),
    op(0x00, 0x61, "xor", "xor", E::None, Sequential),
    op(0x00, 0x62, "shl", "shl", E::None, Sequential),
    op(0x00, 0x63, "shr", "shr", E::None, Sequential),
    op(0x00, 0x64, "shr.un", "shr.un", E::None, Sequential),
    op(0x00, 0x65, "neg", "neg", E::None, Sequential),
    op(0x00, 0x66, "not", "not", E::None, Sequential),
    op(0x00, 0x67, "conv.i1", "conv.i1", E::None, Sequential),
    op(0x00, 0x68, "conv.i2", "conv.i2", E::None, Sequential),
    op(0x00, 0x69, "conv.i4", "conv.i4", E::None, Sequential),
    op(0x00, 0x6A, "conv.i8", "conv.i8", E::None, Sequential),
    op(0x00, 0x6B, "conv.r4", "conv.r4", E::None, Sequential),
    op(0x00, 0x6C, "conv.r8", "conv.r8", E::None, Sequential),
    op(0x00, 0x6D, "conv.u4", "conv.u4", E::None, Sequential),
    op(0x00, 0x6E, "conv.u8", "conv.u8", E::None, Sequential),
    op(0x00, 0x6F, "callvirt", "callvirt", E::Method, Call),
    op(0x00, 0x70, "cpobj", "cpobj", E::Type, Sequential),
    op(0x00, 0x71, "ldobj", "ldobj", E::Type, Sequential),
    op(0x00, 0x72, "ldstr", "ldstr", E::String, Sequential),
    op(0x00, 0x73, "newobj", "newobj", E::Method, Call),
    op(0x00, 0x74, "castclass", "castclass", E::Type, Sequential),
    op(0x00, 0x75, "isinst", "isinst", E::Type, Sequential),
    op(0x00, 0x76, "conv.r.un", "conv.r.un", E::None, Sequential),
    op(0x00, 0x79, "unbox", "unbox", E::Type, Sequential),
    op(0x00, 0x7A, "throw", "throw", E::None, Throw),
    op(0x00, 0x7B, "ldfld", "ldfld", E::Field, Sequential),
    op(0x00, 0x7C, "ldflda", "ldflda", E::Field, Sequential),
    op(0x00, 0x7D, "stfld", "stfld", E::Field, Sequential),
    op(0x00, 0x7E, "ldsfld", "ldsfld", E::Field, Sequential),
    op(0x00, 0x7F, "ldsflda", "ldsflda", E::Field, Sequential),
    op(0x00, 0x80, "stsfld", "stsfld", E::Field, Sequential),
    op(0x00, 0x81, "stobj", "stobj", E::Type, Sequential),
    op(0x00, 0x82, "conv.ovf.i1.un", "conv.ovf.i1.un", E::None, Sequential),
    op(0x00, 0x83, "conv.ovf.i2.un", "conv.ovf.i2.un", E::None, Sequential),
    op(0x00, 0x84, "conv.ovf.i4.un", "conv.ovf.i4.un", E::None, Sequential),
    op(0x00, 0x85, "conv.ovf.i8.un", "conv.ovf.i8.un", E::None, Sequential),
    op(0x00, 0x86, "conv.ovf.u1.un", "conv.ovf.u1.un", E::None, Sequential),
    op(0x00, 0x87, "conv.ovf.u2.un", "conv.ovf.u2.un", E::None, Sequential),
    op(0x00, 0x88, "conv.ovf.u4.un", "conv.ovf.u4.un", E::None, Sequential),
    op(0x00, 0x89, "conv.ovf.u8.un", "conv.ovf.u8.un", E::None, Sequential),
    op(0x00, 0x8A, "conv.ovf.i.un", "conv.ovf.i.un", E::None, Sequential),
    op(0x00, 0x8B, "conv.ovf.u.un", "conv.ovf.u.un", E::None, Sequential),
    op(0x00, 0x8C, "box", "box", E::Type, Sequential),
    op(0x00, 0x8D, "newarr", "newarr", E::Type, Sequential),
    op(0x00, 0x8E, "ldlen", "ldlen", E::None, Sequential),
    op(0x00, 0x8F, "ldelema", "ldelema", E::Type, Sequential),
    op(0x00, 0x90, "ldelem.i1", "ldelem.i1", E::None, Sequential),
    op(0x00, 0x91, "ldelem.u1", "ldelem.u1", E::None, Sequential),
    op(0x00, 0x92, "ldelem.i2", "ldelem.i2", E::None, Sequential),
    op(0x00, 0x93, "ldelem.u2", "ldelem.u2", E::None, Sequential),
    op(0x00, 0x94, "ldelem.i4", "ldelem.i4", E::None, Sequential),
    op(0x00, 0x95, "ldelem.u4", "ldelem.u4", E::None, Sequential),
    op(0x00, 0x96, "ldelem.i8", "ldelem.i8", E::None, Sequential),
    op(0x00, 0x97, "ldelem.i", "ldelem.i", E::None, Sequential),
    op(0x00, 0x98, "ldelem.r4", "ldelem.r4", E::None, Sequential),
    op(0x00, 0x99, "ldelem.r8", "ldelem.r8", E::None, Sequential),
    op(0x00, 0x9A, "ldelem.ref", "ldelem.ref", E::None, Sequential),
    op(0x00, 0x9B, "stelem.i", "stelem.i", E::None, Sequential),
    op(0x00, 0x9C, "stelem.i1", "stelem.i1", E::None, Sequential),
    op(0x00, 0x9D, "stelem.i2", "stelem.i2", E::None, Sequential),
    op(0x00, 0x9E, "stelem.i4", "stelem.i4", E::None, Sequential),
    op(0x00, 0x9F, "stelem.i8", "stelem.i8", E::None, Sequential),
    op(0x00, 0xA0, "stelem.r4", "stelem.r4", E::None, Sequential),
    op(0x00, 0xA1, "stelem.r8", "stelem.r8", E::None, Sequential),
    op(0x00, 0xA2, "stelem.ref", "stelem.ref", E::None, Sequential),
    op(0x00, 0xA3, "ldelem", "ldelem", E::Type, Sequential),
    op(0x00, 0xA4, "stelem", "stelem", E::Type, Sequential),
    op(0x00, 0xA5, "unbox.any", "unbox.any", E::Type, Sequential),
    op(0x00, 0xB3, "conv.ovf.i1", "conv.ovf.i1", E::None, Sequential),
    op(0x00, 0xB4, "conv.ovf.u1", "conv.ovf.u1", E::None, Sequential),
    op(0x00, 0xB5, "conv.ovf.i2", "conv.ovf.i2", E::None, Sequential),
    op(0x00, 0xB6, "conv.ovf.u2", "conv.ovf.u2", E::None, Sequential),
    op(0x00, 0xB7, "conv.ovf.i4", "conv.ovf.i4", E::None, Sequential),
    op(0x00, 0xB8, "conv.ovf.u4", "conv.ovf.u4", E::None, Sequential),
    op(0x00, 0xB9, "conv.ovf.i8", "conv.ovf.i8", E::None, Sequential),
    op(0x00, 0xBA, "conv.ovf.u8", "conv.ovf.u8", E::None, Sequential),
    op(0x00, 0xC2, "refanyval", "refanyval", E::Type, Sequential),
    op(0x00, 0xC3, "ckfinite", "ckfinite", E::None, Sequential),
    op(0x00, 0xC6, "mkrefany", "mkrefany", E::Type, Sequential),
    op(0x00, 0xD0, "ldtoken", "ldtoken", E::Tok, Sequential),
    op(0x00, 0xD1, "conv.u2", "conv.u2", E::None, Sequential),
    op(0x00, 0xD2, "conv.u1", "conv.u1", E::None, Sequential),
    op(0x00, 0xD3, "conv.i", "conv.i", E::None, Sequential),
    op(0x00, 0xD4, "conv.ovf.i", "conv.ovf.i", E::None, Sequential),
    op(0x00, 0xD5, "conv.ovf.u", "conv.ovf.u", E::None, Sequential),
    op(0x00, 0xD6, "add.ovf", "add.ovf", E::None, Sequential),
    op(0x00, 0xD7, "add.ovf.un", "add.ovf.un", E::None, Sequential),
    op(0x00, 0xD8, "mul.ovf", "mul.ovf", E::None, Sequential),
    op(0x00, 0xD9, "mul.ovf.un", "mul.ovf.un", E::None, Sequential),
    op(0x00, 0xDA, "sub.ovf", "sub.ovf", E::None, Sequential),
    op(0x00, 0xDB, "sub.ovf.un", "sub.ovf.un", E::None, Sequential),
    op(0x00, 0xDC, "endfinally", "endfinally", E::None, EndFinally),
    op(0x00, 0xDD, "leave", "leave", E::Branch, Leave),
    op(0x00, 0xDE, "leave.s", "leave", E::ShortBranch, Leave),
    op(0x00, 0xDF, "stind.i", "stind.i", E::None, Sequential),
    op(0x00, 0xE0, "conv.u", "conv.u", E::None, Sequential),
    op(0xFE, 0x00, "arglist", "arglist", E::None, Sequential),
    op(0xFE, 0x01, "ceq", "ceq", E::None, Sequential),
    op(0xFE, 0x02, "cgt", "cgt", E::None, Sequential),
    op(0xFE, 0x03, "cgt.un", "cgt.un", E::None, Sequential),
    op(0xFE, 0x04, "clt", "clt", E::None, Sequential),
    op(0xFE, 0x05, "clt.un", "clt.un", E::None, Sequential),
    op(0xFE, 0x06, "ldftn", "ldftn", E::Method, Sequential),
    op(0xFE, 0x07, "ldvirtftn", "ldvirtftn", E::Method, Sequential),
    op(0xFE, 0x09, "ldarg", "ldarg", E::Var, Sequential),
    op(0xFE, 0x0A, "ldarga", "ldarga", E::Var, Sequential),
    op(0xFE, 0x0B, "starg", "starg", E::Var, Sequential),
    op(0xFE, 0x0C, "ldloc", "ldloc", E::Var, Sequential),
    op(0xFE, 0x0D, "ldloca", "ldloca", E::Var, Sequential),
    op(0xFE, 0x0E, "stloc", "stloc", E::Var, Sequential),
    op(0xFE, 0x0F, "localloc", "localloc", E::None, Sequential),
    op(0xFE, 0x11, "endfilter", "endfilter", E::None, EndFinally),
    op(0xFE, 0x12, "unaligned.", "unaligned.", E::ShortInt, Meta),
    op(0xFE, 0x13, "volatile.", "volatile.", E::None, Meta),
    op(0xFE, 0x14, "tail.", "tail.", E::None, Meta),
    op(0xFE, 0x15, "initobj", "initobj", E::Type, Sequential),
    op(0xFE, 0x16, "constrained.", "constrained.", E::Type, Meta),
    op(0xFE, 0x17, "cpblk", "cpblk", E::None, Sequential),
    op(0xFE, 0x18, "initblk", "initblk", E::None, Sequential),
    op(0xFE, 0x19, "no.", "no.", E::ShortInt, Meta),
    op(0xFE, 0x1A, "rethrow", "rethrow", E::None, Throw),
    op(0xFE, 0x1C, "sizeof", "sizeof", E::Type, Sequential),
    op(0xFE, 0x1D, "refanytype", "refanytype", E::None, Sequential),
    op(0xFE, 0x1E, "readonly.", "readonly.", E::None, Meta),
];

struct Index {
    single: [Option<usize>; 256],
    prefixed: [Option<usize>; 256],
    by_mnemonic: HashMap<&'static str, usize>,
}

fn index() -> &'static Index {
    static INDEX: OnceLock<Index> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut index = Index {
            single: [None; 256],
            prefixed: [None; 256],
            by_mnemonic: HashMap::with_capacity(OPCODES.len()),
        };

        for (position, opcode) in OPCODES.iter().enumerate() {
            let slot = if opcode.prefix == 0xFE {
                &mut index.prefixed[opcode.code as usize]
            } else {
                &mut index.single[opcode.code as usize]
            };
            *slot = Some(position);
            index.by_mnemonic.insert(opcode.mnemonic, position);
        }

        index
    })
}

/// Look up a one-byte opcode, or a two-byte opcode when `prefix` is `0xFE`.
#[must_use]
pub fn lookup(prefix: u8, code: u8) -> Option<&'static OpCode> {
    let index = index();
    let slot = if prefix == 0xFE {
        index.prefixed[code as usize]
    } else {
        index.single[code as usize]
    };

    slot.map(|position| &OPCODES[position])
}

/// Look up an opcode by its ILAsm mnemonic.
#[must_use]
pub fn by_mnemonic(mnemonic: &str) -> Option<&'static OpCode> {
    index()
        .by_mnemonic
        .get(mnemonic)
        .map(|&position| &OPCODES[position])
}

/// Returns `true` if `mnemonic` is the canonical form of at least one opcode.
#[must_use]
pub fn is_canonical(mnemonic: &str) -> bool {
    by_mnemonic(mnemonic).is_some_and(|opcode| !opcode.is_folded())
}
