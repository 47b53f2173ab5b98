//! Assemble a [`CilModule`] from typed parts.
//!
//! [`ModuleBuilder`] hands out tokens the same way the metadata tables would: rows are
//! numbered in the order they are added, and literals get offsets laid out like the `#US`
//! heap. This makes it possible to model a container without writing a PE image.
//!
//! # Examples
//!
//! ```rust
//! use vmscope::{
//!     disassembler::{Instruction, Operand},
//!     metadata::{
//!         builder::ModuleBuilder,
//!         members::MethodCode,
//!         method::MethodAttributes,
//!         signatures::{ElementKind, MethodSignature},
//!     },
//!     CodeContainer,
//! };
//!
//! let mut builder = ModuleBuilder::new("Sample.dll");
//! let program = builder.add_type("Sample", "Program");
//! let main = builder.add_method(
//!     program,
//!     "Main",
//!     MethodAttributes::STATIC,
//!     MethodSignature::new(false, ElementKind::Void, Vec::new()),
//!     MethodCode::Decoded(vec![Instruction::from_mnemonic("ret", Operand::None)?]),
//! )?;
//!
//! let module = builder.build();
//! assert_eq!(module.methods_with_bodies(), vec![main]);
//! assert_eq!(module.method_name(main).as_deref(), Some("Sample.Program::Main"));
//! # Ok::<(), vmscope::Error>(())
//! ```

use crate::{
    disassembler::Immediate,
    metadata::{
        cilmodule::{CilModule, USER_STRING_TABLE},
        members::{
            FieldDef, MemberRef, MethodCode, MethodDef, MethodSpec, Resource, TypeDef, TypeRef,
        },
        method::{FieldAttributes, MethodAttributes},
        signatures::{ElementKind, MemberSignature, MethodSignature},
        tables::TableId,
        token::Token,
    },
    Error::TypeNotFound,
    Result,
};

/// Builds a [`CilModule`] member by member.
pub struct ModuleBuilder {
    module: CilModule,
    next_user_string: u32,
}

impl ModuleBuilder {
    /// Start an empty module called `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        ModuleBuilder {
            module: CilModule {
                name: name.to_string(),
                ..CilModule::default()
            },
            next_user_string: 1,
        }
    }

    /// Add a top-level type definition.
    pub fn add_type(&mut self, namespace: &str, name: &str) -> Token {
        let token = next_token(TableId::TypeDef, self.module.types.len());
        self.module.types.push(TypeDef {
            token,
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: 0,
            extends: None,
            fields: Vec::new(),
            methods: Vec::new(),
            nested_types: Vec::new(),
            enclosing_type: None,
        });

        token
    }

    /// Add a type nested inside `enclosing`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if `enclosing` was not added before.
    pub fn add_nested_type(&mut self, enclosing: Token, name: &str) -> Result<Token> {
        self.type_mut(enclosing)?;

        let token = self.add_type("", name);
        self.type_mut(token)?.enclosing_type = Some(enclosing);
        self.type_mut(enclosing)?.nested_types.push(token);

        Ok(token)
    }

    /// Add a reference to a type of another module.
    pub fn add_type_ref(&mut self, namespace: &str, name: &str) -> Token {
        let token = next_token(TableId::TypeRef, self.module.type_refs.len());
        self.module.type_refs.push(TypeRef {
            token,
            namespace: namespace.to_string(),
            name: name.to_string(),
        });

        token
    }

    /// Add a field to `ty`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if `ty` was not added before.
    pub fn add_field(
        &mut self,
        ty: Token,
        name: &str,
        flags: FieldAttributes,
        field_type: ElementKind,
    ) -> Result<Token> {
        let token = next_token(TableId::Field, self.module.fields.len());
        self.type_mut(ty)?.fields.push(token);
        self.module.fields.push(FieldDef {
            token,
            name: name.to_string(),
            declaring_type: ty,
            flags,
            field_type,
            constant: None,
        });

        Ok(token)
    }

    /// Give `field` an integer default value, as a `Constant` row would.
    ///
    /// # Errors
    /// Returns an error if `field` does not exist or `value` is a float.
    pub fn set_constant(&mut self, field: Token, value: Immediate) -> Result<()> {
        if value.as_i64().is_none() {
            return Err(malformed_error!("Field constants must be integers"));
        }

        let Some(index) = index(field, TableId::Field, self.module.fields.len()) else {
            return Err(malformed_error!("No field definition - {}", field));
        };

        self.module.fields[index].constant = Some(value);
        Ok(())
    }

    /// Add a method to `ty`.
    ///
    /// Decoded instructions are laid out back to back starting at offset zero.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if `ty` was not added before.
    pub fn add_method(
        &mut self,
        ty: Token,
        name: &str,
        flags: MethodAttributes,
        signature: MethodSignature,
        code: MethodCode,
    ) -> Result<Token> {
        let code = match code {
            MethodCode::Decoded(mut instructions) => {
                let mut offset = 0;
                for instruction in &mut instructions {
                    instruction.offset = offset;
                    offset += instruction.size;
                }
                MethodCode::Decoded(instructions)
            }
            other => other,
        };

        let token = next_token(TableId::MethodDef, self.module.methods.len());
        self.type_mut(ty)?.methods.push(token);
        self.module.methods.push(MethodDef {
            token,
            name: name.to_string(),
            declaring_type: ty,
            flags,
            signature,
            code,
        });

        Ok(token)
    }

    /// Add a member reference.
    pub fn add_member_ref(
        &mut self,
        parent: Token,
        name: &str,
        signature: MemberSignature,
    ) -> Token {
        let token = next_token(TableId::MemberRef, self.module.member_refs.len());
        self.module.member_refs.push(MemberRef {
            token,
            name: name.to_string(),
            parent,
            signature,
        });

        token
    }

    /// Add a generic instantiation of `method`.
    pub fn add_method_spec(&mut self, method: Token) -> Token {
        let token = next_token(TableId::MethodSpec, self.module.method_specs.len());
        self.module.method_specs.push(MethodSpec { token, method });

        token
    }

    /// Add a literal and return the token `ldstr` would use for it.
    pub fn add_user_string(&mut self, value: &str) -> Token {
        let offset = self.next_user_string;
        let length = value.encode_utf16().count() as u32 * 2 + 1;
        let prefix = match length {
            0..=0x7F => 1,
            0x80..=0x3FFF => 2,
            _ => 4,
        };

        self.next_user_string += prefix + length;
        self.module.user_strings.insert(offset, value.to_string());

        Token::from_parts(USER_STRING_TABLE, offset)
    }

    /// Embed a resource.
    pub fn add_resource(&mut self, name: &str, data: Vec<u8>) {
        self.module.resources.push(Resource {
            name: name.to_string(),
            data,
        });
    }

    /// Set the entry point method.
    pub fn set_entry_point(&mut self, method: Token) {
        self.module.entry_point = Some(method);
    }

    /// Finish the module.
    #[must_use]
    pub fn build(self) -> CilModule {
        self.module
    }

    fn type_mut(&mut self, ty: Token) -> Result<&mut TypeDef> {
        let index = index(ty, TableId::TypeDef, self.module.types.len()).ok_or(TypeNotFound(ty))?;
        Ok(&mut self.module.types[index])
    }
}

fn next_token(table: TableId, len: usize) -> Token {
    Token::from_parts(table as u8, len as u32 + 1)
}

fn index(token: Token, table: TableId, len: usize) -> Option<usize> {
    if token.table() != table as u8 || token.is_null() || token.row() as usize > len {
        return None;
    }

    Some(token.row() as usize - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        disassembler::{Instruction, Operand},
        metadata::container::{CodeContainer, TokenKind},
    };

    fn op(mnemonic: &str, operand: Operand) -> Instruction {
        Instruction::from_mnemonic(mnemonic, operand).unwrap()
    }

    fn void_method() -> MethodSignature {
        MethodSignature::new(false, ElementKind::Void, Vec::new())
    }

    #[test]
    fn types_and_names() {
        let mut builder = ModuleBuilder::new("Test.dll");
        let outer = builder.add_type("Ns", "Outer");
        let inner = builder.add_nested_type(outer, "Inner").unwrap();
        let external = builder.add_type_ref("System", "Object");
        let module = builder.build();

        assert_eq!(outer, Token::new(0x0200_0001));
        assert_eq!(module.type_name(inner).as_deref(), Some("Ns.Outer/Inner"));
        assert_eq!(module.type_name(external).as_deref(), Some("System.Object"));
        assert_eq!(module.nested_types(outer).unwrap(), &[inner]);
        assert!(module.is_type_definition(outer));
        assert!(!module.is_type_definition(external));
        assert!(matches!(
            module.type_methods(Token::new(0x0200_0009)),
            Err(TypeNotFound(_))
        ));
    }

    #[test]
    fn methods_and_bodies() {
        let mut builder = ModuleBuilder::new("Test.dll");
        let ty = builder.add_type("", "C");
        let abstract_method = builder
            .add_method(ty, "A", MethodAttributes::ABSTRACT, void_method(), MethodCode::None)
            .unwrap();
        let broken = builder
            .add_method(
                ty,
                "B",
                MethodAttributes::STATIC,
                void_method(),
                MethodCode::Malformed("truncated".to_string()),
            )
            .unwrap();
        let code = builder
            .add_method(
                ty,
                "C",
                MethodAttributes::STATIC,
                void_method(),
                MethodCode::Decoded(vec![
                    op("ldc.i4", Operand::Immediate(Immediate::Int32(7))),
                    op("pop", Operand::None),
                    op("ret", Operand::None),
                ]),
            )
            .unwrap();
        let module = builder.build();

        assert_eq!(module.methods_with_bodies(), vec![broken, code]);
        assert!(module.method_instructions(abstract_method).is_err());
        assert!(module.method_instructions(broken).is_err());

        let instructions = module.method_instructions(code).unwrap();
        let offsets = instructions.iter().map(|i| i.offset).collect::<Vec<_>>();
        assert_eq!(offsets, vec![0, 5, 6]);
    }

    #[test]
    fn member_resolution() {
        let mut builder = ModuleBuilder::new("Test.dll");
        let ty = builder.add_type("", "C");
        let method = builder
            .add_method(ty, "Run", MethodAttributes::STATIC, void_method(), MethodCode::None)
            .unwrap();
        let field = builder
            .add_field(ty, "Key", FieldAttributes::STATIC, ElementKind::I8)
            .unwrap();
        let console = builder.add_type_ref("System", "Console");
        let write_line = builder.add_member_ref(
            console,
            "WriteLine",
            MemberSignature::Method(MethodSignature::new(
                false,
                ElementKind::Void,
                vec![ElementKind::String],
            )),
        );
        let remote_field =
            builder.add_member_ref(console, "Out", MemberSignature::Field(ElementKind::Object));
        let spec = builder.add_method_spec(method);
        let literal = builder.add_user_string("hello");
        let module = builder.build();

        let resolved = module.resolve_method(write_line).unwrap();
        assert_eq!(resolved.name, "WriteLine");
        assert_eq!(resolved.declaring_type, Some(console));
        assert_eq!(
            module.method_name(write_line).as_deref(),
            Some("System.Console::WriteLine")
        );

        let resolved = module.resolve_method(spec).unwrap();
        assert_eq!(resolved.token, spec);
        assert_eq!(resolved.name, "Run");

        assert!(module.resolve_method(field).is_none());
        assert!(module.resolve_field(field).unwrap().is_static);
        assert_eq!(module.resolve_field(remote_field).unwrap().name, "Out");

        assert_eq!(module.token_kind(ty), TokenKind::Type);
        assert_eq!(module.token_kind(spec), TokenKind::Method);
        assert_eq!(module.token_kind(write_line), TokenKind::Method);
        assert_eq!(module.token_kind(remote_field), TokenKind::Field);
        assert_eq!(module.token_kind(literal), TokenKind::String);
        assert_eq!(module.token_kind(Token::new(0x1100_0001)), TokenKind::Signature);
        assert_eq!(module.token_kind(Token::new(0x2000_0001)), TokenKind::Other);

        assert_eq!(module.user_string(literal), Some("hello"));
    }

    #[test]
    fn user_string_offsets() {
        let mut builder = ModuleBuilder::new("Test.dll");
        let first = builder.add_user_string("ab");
        let second = builder.add_user_string("");

        assert_eq!(first, Token::new(0x7000_0001));
        // 1 length byte + 4 bytes of text + 1 flag byte
        assert_eq!(second, Token::new(0x7000_0007));
    }

    #[test]
    fn field_initializers() {
        let mut builder = ModuleBuilder::new("Test.dll");
        let ty = builder.add_type("", "Config");
        let first = builder
            .add_field(ty, "First", FieldAttributes::STATIC, ElementKind::I4)
            .unwrap();
        let second = builder
            .add_field(ty, "Second", FieldAttributes::STATIC, ElementKind::I8)
            .unwrap();
        let literal = builder
            .add_field(
                ty,
                "Literal",
                FieldAttributes::STATIC | FieldAttributes::LITERAL,
                ElementKind::I4,
            )
            .unwrap();
        let missing = builder
            .add_field(ty, "Missing", FieldAttributes::STATIC, ElementKind::I4)
            .unwrap();
        builder.set_constant(literal, Immediate::Int32(-3)).unwrap();
        assert!(builder.set_constant(literal, Immediate::Float32(1.0)).is_err());

        builder
            .add_method(
                ty,
                ".cctor",
                MethodAttributes::STATIC | MethodAttributes::SPECIAL_NAME,
                void_method(),
                MethodCode::Decoded(vec![
                    op("ldc.i4.5", Operand::None),
                    op("stsfld", Operand::Token(first)),
                    op("ldc.i8", Operand::Immediate(Immediate::Int64(9))),
                    op("ldc.i4.2", Operand::None),
                    op("shl", Operand::None),
                    op("stsfld", Operand::Token(second)),
                    op("ret", Operand::None),
                ]),
            )
            .unwrap();
        let module = builder.build();

        let mnemonics = |field| {
            module
                .field_initializer(field)
                .unwrap()
                .iter()
                .map(|instruction| instruction.mnemonic)
                .collect::<Vec<_>>()
        };

        assert_eq!(mnemonics(first), vec!["ldc.i4.5"]);
        assert_eq!(mnemonics(second), vec!["ldc.i8", "ldc.i4.2", "shl"]);
        assert_eq!(mnemonics(literal), vec!["ldc.i4"]);
        assert_eq!(
            module.field_initializer(literal).unwrap()[0].int_constant(),
            Some(-3)
        );
        assert!(module.field_initializer(missing).is_none());
    }

    #[test]
    fn resources() {
        let mut builder = ModuleBuilder::new("Test.dll");
        builder.add_resource("payload", vec![1, 2, 3]);
        let module = builder.build();

        assert_eq!(module.resource("payload"), Some(&[1_u8, 2, 3][..]));
        assert!(module.resource("other").is_none());
    }
}
