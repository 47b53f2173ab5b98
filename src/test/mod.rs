//! Fixtures shared by the unit tests.
//!
//! [`VmSample`] assembles a small protected module: an interpreter type with a constructor,
//! a dispatch entry point and handler methods, a key field assembled in a static
//! constructor, and methods whose bodies call into the interpreter. [`image`] assembles
//! complete PE files for the loader.


use crate::{
    devirtualization::signatures::{OperandShape, Step, SwitchArms},
    disassembler::{Immediate, Instruction, Operand},
    metadata::{
        builder::ModuleBuilder,
        cilmodule::CilModule,
        members::MethodCode,
        method::{FieldAttributes, MethodAttributes},
        signatures::{ElementKind, MemberSignature, MethodSignature},
        token::Token,
    },
};

/// Value XORed into the key inside the static constructor.
pub(crate) const KEY_MASK: i32 = 0x5A5A_5A5A;

pub(crate) fn op(mnemonic: &str, operand: Operand) -> Instruction {
    Instruction::from_mnemonic(mnemonic, operand).unwrap()
}

pub(crate) fn ldc(value: i32) -> Instruction {
    op("ldc.i4", Operand::Immediate(Immediate::Int32(value)))
}

/// Flags and signature of a handler: `instance void H(object)`.
pub(crate) fn handler_signature() -> (MethodAttributes, MethodSignature) {
    (
        MethodAttributes::HIDE_BY_SIG,
        MethodSignature::new(true, ElementKind::Void, vec![ElementKind::Object]),
    )
}

/// One token of each kind, for operands of generated bodies.
pub(crate) struct FixtureTokens {
    pub ty: Token,
    pub method: Token,
    pub field: Token,
    pub string: Token,
}

impl FixtureTokens {
    pub(crate) fn new(builder: &mut ModuleBuilder) -> Self {
        let ty = builder.add_type_ref("System", "Object");
        let method = builder.add_member_ref(
            ty,
            "ToString",
            MemberSignature::Method(MethodSignature::new(true, ElementKind::String, Vec::new())),
        );
        let field = builder.add_member_ref(ty, "state", MemberSignature::Field(ElementKind::I4));
        let string = builder.add_user_string("operand");

        FixtureTokens {
            ty,
            method,
            field,
            string,
        }
    }
}

/// An instruction sequence whose normalized form is exactly `template`.
pub(crate) fn handler_body(template: &[Step], tokens: &FixtureTokens) -> Vec<Instruction> {
    template
        .iter()
        .map(|step| {
            let operand = match step.shape {
                OperandShape::None => Operand::None,
                OperandShape::Int => match step.opcode {
                    "ldc.i8" => Operand::Immediate(Immediate::Int64(1)),
                    _ => Operand::Immediate(Immediate::Int32(1)),
                },
                OperandShape::Float => match step.opcode {
                    "ldc.r4" => Operand::Immediate(Immediate::Float32(1.0)),
                    _ => Operand::Immediate(Immediate::Float64(1.0)),
                },
                OperandShape::Local => Operand::Local(0),
                OperandShape::Arg => Operand::Argument(1),
                OperandShape::Branch => Operand::Target(0),
                OperandShape::Switch(arms) => Operand::Switch(vec![0; switch_arms(arms)]),
                OperandShape::Type => Operand::Token(tokens.ty),
                OperandShape::Method => Operand::Token(tokens.method),
                OperandShape::Field => Operand::Token(tokens.field),
                OperandShape::String => Operand::Token(tokens.string),
                OperandShape::Sig | OperandShape::Token => Operand::Token(Token::new(0x1100_0001)),
            };

            op(step.opcode, operand)
        })
        .collect()
}

fn switch_arms(arms: SwitchArms) -> usize {
    match arms {
        SwitchArms::Single => 1,
        SwitchArms::Small => 4,
        SwitchArms::Large => 12,
    }
}

/// A protected module under construction.
pub(crate) struct VmSample {
    pub builder: ModuleBuilder,
    pub tokens: FixtureTokens,
    pub interpreter: Token,
    pub constructor: Token,
    pub dispatch: Token,
    pub key_field: Token,
    pub program: Token,
}

impl VmSample {
    /// Interpreter and key field, with the key assembled as `(key ^ mask) ^ mask`.
    pub(crate) fn new(key: i32) -> Self {
        let mut builder = ModuleBuilder::new("Protected.exe");
        let tokens = FixtureTokens::new(&mut builder);

        let keys = builder.add_type("", "<Keys>");
        let key_field = builder
            .add_field(keys, "Key", FieldAttributes::STATIC, ElementKind::I8)
            .unwrap();
        builder
            .add_method(
                keys,
                ".cctor",
                MethodAttributes::STATIC | MethodAttributes::RT_SPECIAL_NAME,
                MethodSignature::new(false, ElementKind::Void, Vec::new()),
                MethodCode::Decoded(vec![
                    ldc(key ^ KEY_MASK),
                    ldc(KEY_MASK),
                    op("xor", Operand::None),
                    op("conv.i8", Operand::None),
                    op("stsfld", Operand::Token(key_field)),
                    op("ret", Operand::None),
                ]),
            )
            .unwrap();

        let interpreter = builder.add_type("VM", "Interpreter");
        let constructor = builder
            .add_method(
                interpreter,
                ".ctor",
                MethodAttributes::RT_SPECIAL_NAME | MethodAttributes::SPECIAL_NAME,
                MethodSignature::new(true, ElementKind::Void, Vec::new()),
                MethodCode::Decoded(vec![op("ret", Operand::None)]),
            )
            .unwrap();
        let dispatch = builder
            .add_method(
                interpreter,
                "Run",
                MethodAttributes::HIDE_BY_SIG,
                MethodSignature::new(
                    true,
                    ElementKind::Object,
                    vec![
                        ElementKind::String,
                        ElementKind::String,
                        ElementKind::I8,
                        ElementKind::SzArray(Box::new(ElementKind::Object)),
                    ],
                ),
                MethodCode::Decoded(vec![op("ldnull", Operand::None), op("ret", Operand::None)]),
            )
            .unwrap();

        let program = builder.add_type("App", "Program");

        VmSample {
            builder,
            tokens,
            interpreter,
            constructor,
            dispatch,
            key_field,
            program,
        }
    }

    /// The call stub a virtualized method consists of.
    pub(crate) fn stub(&mut self, resource: &str, position: &str) -> Vec<Instruction> {
        let resource = self.builder.add_user_string(resource);
        let position = self.builder.add_user_string(position);

        vec![
            op("newobj", Operand::Token(self.constructor)),
            op("ldstr", Operand::Token(resource)),
            op("ldstr", Operand::Token(position)),
            op("ldsfld", Operand::Token(self.key_field)),
            op("ldc.i4.1", Operand::None),
            op("newarr", Operand::Token(self.tokens.ty)),
            op("dup", Operand::None),
            op("ldc.i4.0", Operand::None),
            op("ldarg.0", Operand::None),
            op("stelem.ref", Operand::None),
            op("callvirt", Operand::Token(self.dispatch)),
            op("pop", Operand::None),
            op("ret", Operand::None),
        ]
    }

    /// Add a static method of `Program` with the given body.
    pub(crate) fn add_method(&mut self, name: &str, body: Vec<Instruction>) -> Token {
        self.builder
            .add_method(
                self.program,
                name,
                MethodAttributes::STATIC | MethodAttributes::HIDE_BY_SIG,
                MethodSignature::new(false, ElementKind::Void, vec![ElementKind::Object]),
                MethodCode::Decoded(body),
            )
            .unwrap()
    }

    /// Add a method of `Program` that calls into the interpreter.
    pub(crate) fn add_virtualized(&mut self, name: &str, resource: &str, position: &str) -> Token {
        let body = self.stub(resource, position);
        self.add_method(name, body)
    }

    /// Add a handler with the given body to the interpreter type.
    pub(crate) fn add_handler(&mut self, name: &str, body: Vec<Instruction>) -> Token {
        let (flags, signature) = handler_signature();
        self.builder
            .add_method(self.interpreter, name, flags, signature, MethodCode::Decoded(body))
            .unwrap()
    }

    pub(crate) fn build(self) -> CilModule {
        self.builder.build()
    }
}
