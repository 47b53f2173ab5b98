//! The signature catalog shipped with the crate.
//!
//! Handlers of the interpreter follow a small set of idioms: operands are popped from the
//! virtual stack into locals (`ldarg`, `callvirt`, `stloc`), tokens are resolved through a
//! helper call, results are boxed and pushed back, and branches write the new instruction
//! pointer into a field of the machine state. The templates below are assembled from those
//! fragments.

use super::signatures::{OperandType, SignatureDefinition};

/// Pop one operand from the virtual stack into a local.
const POP: &[&str] = &["ldarg", "callvirt", "stloc"];
/// Box the result and push it.
const PUSH: &[&str] = &["box", "callvirt", "ret"];
/// Read the inline operand and resolve it to a member.
const RESOLVE: &[&str] = &["ldarg", "ldarg", "callvirt", "call"];
/// Resolve a type token into a local.
const RESOLVE_TYPE: &[&str] = &["ldarg", "ldarg", "callvirt", "call", "stloc"];
/// Read the branch target and store it as the next instruction pointer.
const JUMP: &[&str] = &["ldarg", "ldarg", "callvirt", "stfld", "ret"];

const BINARY: &[&str] = &[
    "add", "sub", "mul", "div", "div.un", "rem", "rem.un", "and", "or", "xor", "shl", "shr",
    "shr.un", "add.ovf", "add.ovf.un", "sub.ovf", "sub.ovf.un", "mul.ovf", "mul.ovf.un", "ceq",
    "cgt", "cgt.un", "clt", "clt.un",
];

const UNARY: &[&str] = &[
    "neg", "not", "conv.i1", "conv.i2", "conv.i4", "conv.i8", "conv.u1", "conv.u2", "conv.u4",
    "conv.u8", "conv.i", "conv.u", "conv.r4", "conv.r8", "conv.r.un", "conv.ovf.i1",
    "conv.ovf.i2", "conv.ovf.i4", "conv.ovf.i8", "conv.ovf.u1", "conv.ovf.u2", "conv.ovf.u4",
    "conv.ovf.u8", "conv.ovf.i", "conv.ovf.u", "conv.ovf.i1.un", "conv.ovf.i2.un",
    "conv.ovf.i4.un", "conv.ovf.i8.un", "conv.ovf.u1.un", "conv.ovf.u2.un", "conv.ovf.u4.un",
    "conv.ovf.u8.un", "conv.ovf.i.un", "conv.ovf.u.un", "ckfinite",
];

/// Comparison branches: mnemonic, comparison computed by the handler, branch taken on its result.
const COMPARE_BRANCHES: &[(&str, &str, &str)] = &[
    ("beq", "ceq", "brfalse"),
    ("bne.un", "ceq", "brtrue"),
    ("bge", "clt", "brtrue"),
    ("blt", "clt", "brfalse"),
    ("bgt", "cgt", "brfalse"),
    ("ble", "cgt", "brtrue"),
    ("bge.un", "clt.un", "brtrue"),
    ("blt.un", "clt.un", "brfalse"),
    ("bgt.un", "cgt.un", "brfalse"),
    ("ble.un", "cgt.un", "brtrue"),
];

const LOAD_ELEMENT: &[&str] = &[
    "ldelem.i1", "ldelem.u1", "ldelem.i2", "ldelem.u2", "ldelem.i4", "ldelem.u4", "ldelem.i8",
    "ldelem.i", "ldelem.r4", "ldelem.r8", "ldelem.ref",
];

const STORE_ELEMENT: &[&str] = &[
    "stelem.i", "stelem.i1", "stelem.i2", "stelem.i4", "stelem.i8", "stelem.r4", "stelem.r8",
    "stelem.ref",
];

const LOAD_INDIRECT: &[&str] = &[
    "ldind.i1", "ldind.u1", "ldind.i2", "ldind.u2", "ldind.i4", "ldind.u4", "ldind.i8", "ldind.i",
    "ldind.r4", "ldind.r8", "ldind.ref",
];

const STORE_INDIRECT: &[&str] = &[
    "stind.i", "stind.i1", "stind.i2", "stind.i4", "stind.i8", "stind.r4", "stind.r8",
    "stind.ref",
];

#[derive(Default)]
struct Catalog {
    definitions: Vec<SignatureDefinition>,
}

impl Catalog {
    fn add(&mut self, mnemonic: &str, operand_type: OperandType, parts: &[&[&str]]) {
        self.definitions.push(SignatureDefinition {
            mnemonic: mnemonic.to_string(),
            operand_type,
            template: parts
                .iter()
                .flat_map(|part| part.iter())
                .map(ToString::to_string)
                .collect(),
        });
    }
}

/// All built-in signature definitions, grouped by instruction family.
pub(crate) fn definitions() -> Vec<SignatureDefinition> {
    use OperandType::{Branch, Field, InlineConst, Method, None, Other, Switch, Type};

    let mut catalog = Catalog::default();

    for &op in BINARY {
        catalog.add(op, None, &[POP, POP, &["ldarg", "ldloc", "ldloc", op], PUSH]);
    }
    for &op in UNARY {
        catalog.add(op, None, &[POP, &["ldarg", "ldloc", op], PUSH]);
    }

    // Stack
    catalog.add("nop", None, &[&["ret"]]);
    catalog.add("break", None, &[&["call", "ret"]]);
    catalog.add("pop", None, &[&["ldarg", "callvirt", "pop", "ret"]]);
    catalog.add(
        "dup",
        None,
        &[POP, &["ldarg", "ldloc", "callvirt", "ldarg", "ldloc", "callvirt", "ret"]],
    );
    catalog.add("ldnull", None, &[&["ldarg", "ldnull", "callvirt", "ret"]]);
    catalog.add("ldc.i4", InlineConst, &[&["ldarg", "ldarg", "callvirt"], PUSH]);
    for (op, conversion) in [("ldc.i8", "conv.i8"), ("ldc.r4", "conv.r4"), ("ldc.r8", "conv.r8")] {
        catalog.add(op, InlineConst, &[&["ldarg", "ldarg", "callvirt", conversion], PUSH]);
    }

    // Locals and arguments
    catalog.add(
        "ldloc",
        Other,
        &[&["ldarg", "ldarg", "ldarg", "callvirt", "callvirt", "callvirt", "ret"]],
    );
    catalog.add(
        "stloc",
        Other,
        &[&["ldarg", "ldarg", "callvirt", "ldarg", "callvirt", "callvirt", "ret"]],
    );
    catalog.add(
        "ldloca",
        Other,
        &[&["ldarg", "ldarg", "callvirt", "newobj", "callvirt", "ret"]],
    );
    catalog.add(
        "ldarg",
        Other,
        &[&["ldarg", "ldarg", "ldfld", "ldarg", "callvirt", "ldelem.ref", "callvirt", "ret"]],
    );
    catalog.add(
        "starg",
        Other,
        &[&["ldarg", "ldfld", "ldarg", "callvirt", "ldarg", "callvirt", "stelem.ref", "ret"]],
    );
    catalog.add(
        "ldarga",
        Other,
        &[&["ldarg", "ldarg", "ldfld", "ldarg", "callvirt", "newobj", "callvirt", "ret"]],
    );
    catalog.add(
        "arglist",
        None,
        &[&["ldarg", "ldarg", "ldfld", "newobj", "callvirt", "ret"]],
    );
    catalog.add(
        "ldstr",
        Other,
        &[&["ldarg", "ldarg", "ldarg", "callvirt", "call", "callvirt", "ret"]],
    );
    catalog.add("ldtoken", Other, &[RESOLVE, &["call"], PUSH]);

    // Control flow
    catalog.add("br", Branch, &[JUMP]);
    catalog.add("leave", Branch, &[&["ldarg", "ldarg", "callvirt", "callvirt", "ret"]]);
    catalog.add("brtrue", Branch, &[POP, &["ldloc", "call", "brfalse"], JUMP]);
    catalog.add("brfalse", Branch, &[POP, &["ldloc", "call", "brtrue"], JUMP]);
    for &(op, comparison, condition) in COMPARE_BRANCHES {
        catalog.add(
            op,
            Branch,
            &[POP, POP, &["ldloc", "ldloc", comparison, condition], JUMP],
        );
    }
    catalog.add(
        "switch",
        Switch,
        &[
            POP,
            &["ldarg", "ldarg", "callvirt", "stloc", "ldloc", "call", "stloc"],
            &["ldloc", "ldloc", "ldlen", "conv.i4", "bge.un"],
            &["ldarg", "ldloc", "ldloc", "ldelem.i4", "stfld", "ret"],
        ],
    );
    catalog.add("ret", None, &[&["ldarg", "ldc.i4", "stfld", "ret"]]);
    catalog.add("throw", None, &[POP, &["ldloc", "castclass", "throw"]]);
    catalog.add("rethrow", None, &[&["ldarg", "ldfld", "throw"]]);
    catalog.add("endfinally", None, &[&["ldarg", "callvirt", "ret"]]);
    catalog.add("endfilter", None, &[POP, &["ldarg", "ldloc", "callvirt", "ret"]]);

    // Calls
    catalog.add("call", Method, &[RESOLVE, &["callvirt", "ret"]]);
    catalog.add("callvirt", Method, &[RESOLVE, &["callvirt", "callvirt", "ret"]]);
    catalog.add("newobj", Method, &[RESOLVE, &["newobj", "callvirt", "ret"]]);
    catalog.add("jmp", Method, &[RESOLVE, &["ldarg", "callvirt", "ret"]]);
    catalog.add("ldftn", Method, &[RESOLVE, &["callvirt"], PUSH]);
    catalog.add("ldvirtftn", Method, &[POP, RESOLVE, &["ldloc", "callvirt"], PUSH]);
    catalog.add(
        "calli",
        Other,
        &[POP, &["ldarg", "ldarg", "callvirt", "ldloc", "call", "callvirt", "ret"]],
    );

    // Fields
    catalog.add("ldfld", Field, &[POP, RESOLVE, &["ldloc", "callvirt", "callvirt", "ret"]]);
    catalog.add("ldsfld", Field, &[RESOLVE, &["ldnull", "callvirt", "callvirt", "ret"]]);
    catalog.add(
        "stfld",
        Field,
        &[POP, POP, &["ldarg", "callvirt", "call", "ldloc", "ldloc", "callvirt", "ret"]],
    );
    catalog.add("stsfld", Field, &[POP, RESOLVE, &["ldnull", "ldloc", "callvirt", "ret"]]);
    catalog.add("ldflda", Field, &[POP, RESOLVE, &["ldloc", "newobj", "callvirt", "ret"]]);
    catalog.add("ldsflda", Field, &[RESOLVE, &["ldnull", "newobj", "callvirt", "ret"]]);

    // Type tokens
    catalog.add(
        "box",
        Type,
        &[POP, RESOLVE_TYPE, &["ldarg", "ldloc", "ldloc", "call", "callvirt", "ret"]],
    );
    catalog.add(
        "unbox",
        Type,
        &[POP, RESOLVE_TYPE, &["ldarg", "ldloc", "ldloc", "call", "newobj", "callvirt", "ret"]],
    );
    catalog.add(
        "unbox.any",
        Type,
        &[POP, RESOLVE_TYPE, &["ldarg", "ldloc", "ldloc", "call", "call", "callvirt", "ret"]],
    );
    catalog.add(
        "castclass",
        Type,
        &[
            POP,
            RESOLVE_TYPE,
            &["ldloc", "ldloc", "callvirt", "brtrue", "newobj", "throw"],
            &["ldarg", "ldloc", "callvirt", "ret"],
        ],
    );
    catalog.add(
        "isinst",
        Type,
        &[
            POP,
            RESOLVE_TYPE,
            &["ldloc", "ldloc", "callvirt", "brtrue", "ldnull", "stloc"],
            &["ldarg", "ldloc", "callvirt", "ret"],
        ],
    );
    catalog.add(
        "newarr",
        Type,
        &[POP, RESOLVE_TYPE, &["ldarg", "ldloc", "ldloc", "call", "call"], PUSH],
    );
    catalog.add(
        "ldelema",
        Type,
        &[POP, POP, RESOLVE_TYPE, &["ldarg", "ldloc", "ldloc", "ldloc", "newobj", "callvirt", "ret"]],
    );
    catalog.add(
        "ldelem",
        Type,
        &[POP, POP, RESOLVE_TYPE, &["ldarg", "ldloc", "ldloc", "callvirt", "callvirt", "ret"]],
    );
    catalog.add(
        "stelem",
        Type,
        &[POP, POP, POP, RESOLVE_TYPE, &["ldloc", "ldloc", "ldloc", "call", "callvirt", "ret"]],
    );
    catalog.add(
        "ldobj",
        Type,
        &[POP, RESOLVE_TYPE, &["ldarg", "ldloc", "callvirt", "ldloc", "call", "callvirt", "ret"]],
    );
    catalog.add(
        "stobj",
        Type,
        &[POP, POP, RESOLVE_TYPE, &["ldloc", "ldloc", "ldloc", "call", "callvirt", "ret"]],
    );
    catalog.add(
        "cpobj",
        Type,
        &[POP, POP, RESOLVE_TYPE, &["ldloc", "ldloc", "callvirt", "ldloc", "call", "callvirt", "ret"]],
    );
    catalog.add(
        "initobj",
        Type,
        &[POP, RESOLVE_TYPE, &["ldloc", "ldloc", "call", "callvirt", "ret"]],
    );
    catalog.add("sizeof", Type, &[RESOLVE_TYPE, &["ldarg", "ldloc", "call"], PUSH]);
    catalog.add(
        "mkrefany",
        Type,
        &[POP, RESOLVE_TYPE, &["ldarg", "ldloc", "ldloc", "newobj", "callvirt", "ret"]],
    );
    catalog.add(
        "refanyval",
        Type,
        &[POP, RESOLVE_TYPE, &["ldarg", "ldloc", "callvirt", "ldloc", "newobj", "callvirt", "ret"]],
    );

    // Arrays and pointers
    catalog.add(
        "ldlen",
        None,
        &[POP, &["ldarg", "ldloc", "castclass", "ldlen", "conv.i4"], PUSH],
    );
    for &op in LOAD_ELEMENT {
        catalog.add(op, None, &[POP, POP, &["ldarg", "ldloc", "castclass", "ldloc", op], PUSH]);
    }
    for &op in STORE_ELEMENT {
        catalog.add(op, None, &[POP, POP, POP, &["ldloc", "castclass", "ldloc", "ldloc", op, "ret"]]);
    }
    for &op in LOAD_INDIRECT {
        catalog.add(op, None, &[POP, &["ldarg", "ldloc", "callvirt", op], PUSH]);
    }
    for &op in STORE_INDIRECT {
        catalog.add(op, None, &[POP, POP, &["ldloc", "callvirt", "ldloc", op, "ret"]]);
    }
    catalog.add("localloc", None, &[POP, &["ldarg", "ldloc", "call"], PUSH]);
    catalog.add("refanytype", None, &[POP, &["ldarg", "ldloc", "callvirt"], PUSH]);
    catalog.add("cpblk", None, &[POP, POP, POP, &["ldloc", "ldloc", "ldloc", "call", "ret"]]);
    catalog.add(
        "initblk",
        None,
        &[POP, POP, POP, &["ldloc", "ldloc", "ldloc", "call", "pop", "ret"]],
    );

    catalog.definitions
}
