//! Builds protected modules through the public builder API.

#![allow(dead_code)]

use vmscope::{
    devirtualization::{OperandShape, Step, SwitchArms},
    disassembler::{Immediate, Instruction, Operand},
    metadata::{
        builder::ModuleBuilder,
        members::MethodCode,
        method::{FieldAttributes, MethodAttributes},
        signatures::{ElementKind, MemberSignature, MethodSignature},
    },
    CilModule, Token,
};

pub const KEY_MASK: i32 = 0x0F0F_0F0F;

pub fn op(mnemonic: &str, operand: Operand) -> Instruction {
    Instruction::from_mnemonic(mnemonic, operand).unwrap()
}

pub fn ldc(value: i32) -> Instruction {
    op("ldc.i4", Operand::Immediate(Immediate::Int32(value)))
}

/// A module with an interpreter type, a key field and a `Program` type for stubs.
pub struct Protected {
    pub builder: ModuleBuilder,
    pub interpreter: Token,
    pub constructor: Token,
    pub dispatch: Token,
    pub key_field: Token,
    pub program: Token,
    object: Token,
    method_ref: Token,
    field_ref: Token,
    string: Token,
}

impl Protected {
    pub fn new(key: i32) -> Self {
        let mut builder = ModuleBuilder::new("Protected.exe");

        let object = builder.add_type_ref("System", "Object");
        let method_ref = builder.add_member_ref(
            object,
            "GetHashCode",
            MemberSignature::Method(MethodSignature::new(true, ElementKind::I4, Vec::new())),
        );
        let field_ref = builder.add_member_ref(object, "value", MemberSignature::Field(ElementKind::I8));
        let string = builder.add_user_string("literal");

        let holder = builder.add_type("", "<Module>");
        let key_field = builder
            .add_field(holder, "k", FieldAttributes::STATIC, ElementKind::I8)
            .unwrap();
        builder
            .add_method(
                holder,
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

        let interpreter = builder.add_type("Protection", "Machine");
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
                "Execute",
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

        let program = builder.add_type("Sample", "Program");

        Protected {
            builder,
            interpreter,
            constructor,
            dispatch,
            key_field,
            program,
            object,
            method_ref,
            field_ref,
            string,
        }
    }

    /// A static method of `Program` that forwards into the interpreter.
    pub fn add_virtualized(&mut self, name: &str, resource: &str, position: &str) -> Token {
        let resource = self.builder.add_user_string(resource);
        let position = self.builder.add_user_string(position);

        let body = vec![
            op("newobj", Operand::Token(self.constructor)),
            op("ldstr", Operand::Token(resource)),
            op("ldstr", Operand::Token(position)),
            op("ldsfld", Operand::Token(self.key_field)),
            op("ldc.i4.0", Operand::None),
            op("newarr", Operand::Token(self.object)),
            op("callvirt", Operand::Token(self.dispatch)),
            op("ret", Operand::None),
        ];

        self.add_plain(name, body)
    }

    /// A static method of `Program` with an arbitrary body.
    pub fn add_plain(&mut self, name: &str, body: Vec<Instruction>) -> Token {
        self.builder
            .add_method(
                self.program,
                name,
                MethodAttributes::STATIC | MethodAttributes::HIDE_BY_SIG,
                MethodSignature::new(false, ElementKind::Object, Vec::new()),
                MethodCode::Decoded(body),
            )
            .unwrap()
    }

    /// An instance `void (object)` method of the interpreter type.
    pub fn add_handler(&mut self, name: &str, body: Vec<Instruction>) -> Token {
        self.builder
            .add_method(
                self.interpreter,
                name,
                MethodAttributes::HIDE_BY_SIG,
                MethodSignature::new(true, ElementKind::Void, vec![ElementKind::Object]),
                MethodCode::Decoded(body),
            )
            .unwrap()
    }

    /// A handler body whose normalized form is `template`.
    pub fn body_for(&self, template: &[Step]) -> Vec<Instruction> {
        template
            .iter()
            .map(|step| {
                let operand = match step.shape {
                    OperandShape::None => Operand::None,
                    OperandShape::Int if step.opcode == "ldc.i8" => {
                        Operand::Immediate(Immediate::Int64(7))
                    }
                    OperandShape::Int => Operand::Immediate(Immediate::Int32(7)),
                    OperandShape::Float if step.opcode == "ldc.r4" => {
                        Operand::Immediate(Immediate::Float32(0.5))
                    }
                    OperandShape::Float => Operand::Immediate(Immediate::Float64(0.5)),
                    OperandShape::Local => Operand::Local(2),
                    OperandShape::Arg => Operand::Argument(1),
                    OperandShape::Branch => Operand::Target(0),
                    OperandShape::Switch(SwitchArms::Single) => Operand::Switch(vec![0]),
                    OperandShape::Switch(SwitchArms::Small) => Operand::Switch(vec![0; 3]),
                    OperandShape::Switch(SwitchArms::Large) => Operand::Switch(vec![0; 16]),
                    OperandShape::Type => Operand::Token(self.object),
                    OperandShape::Method => Operand::Token(self.method_ref),
                    OperandShape::Field => Operand::Token(self.field_ref),
                    OperandShape::String => Operand::Token(self.string),
                    OperandShape::Sig | OperandShape::Token => {
                        Operand::Token(Token::new(0x1100_0001))
                    }
                };

                op(step.opcode, operand)
            })
            .collect()
    }

    pub fn build(self) -> CilModule {
        self.builder.build()
    }
}
