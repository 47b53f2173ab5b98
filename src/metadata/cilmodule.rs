//! The loaded, immutable model of a .NET module.
//!
//! # Examples
//!
//! ```rust,no_run
//! use vmscope::CilModule;
//!
//! let module = CilModule::from_file("protected.exe".as_ref())?;
//! for ty in module.types() {
//!     println!("{} ({} methods)", ty.qualified_name(), ty.methods.len());
//! }
//! # Ok::<(), vmscope::Error>(())
//! ```

use std::{collections::HashMap, path::Path, sync::Arc};

use crate::{
    disassembler::{Immediate, Instruction, Operand},
    file::File,
    metadata::{
        container::{CodeContainer, FieldRef, MethodRef, TokenKind},
        loader,
        members::{
            FieldDef, MemberRef, MethodCode, MethodDef, MethodSpec, Resource, TypeDef, TypeRef,
        },
        signatures::MemberSignature,
        tables::TableId,
        token::Token,
    },
    Error::TypeNotFound,
    Result,
};

/// Token table id of user-string literals.
pub(crate) const USER_STRING_TABLE: u8 = 0x70;

/// A loaded .NET module.
///
/// Everything the analysis reads is resolved during loading: names, signatures, method
/// bodies as instruction streams, literal strings referenced by code, field constants and
/// embedded resources. The value is immutable afterwards and may be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct CilModule {
    pub(crate) name: String,
    pub(crate) entry_point: Option<Token>,
    pub(crate) types: Vec<TypeDef>,
    pub(crate) type_refs: Vec<TypeRef>,
    pub(crate) methods: Vec<MethodDef>,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) member_refs: Vec<MemberRef>,
    pub(crate) method_specs: Vec<MethodSpec>,
    pub(crate) user_strings: HashMap<u32, String>,
    pub(crate) resources: Vec<Resource>,
}

impl CilModule {
    /// Load the module at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be read, and a parsing error
    /// if it is not a .NET binary or its metadata is damaged. Undecodable method bodies are
    /// not an error; they are kept as [`MethodCode::Malformed`].
    pub fn from_file(path: &Path) -> Result<CilModule> {
        let file = File::from_file(path)?;
        loader::load(&Arc::new(file))
    }

    /// Load a module from an in-memory image.
    ///
    /// # Errors
    /// See [`CilModule::from_file`].
    pub fn from_mem(data: Vec<u8>) -> Result<CilModule> {
        let file = File::from_mem(data)?;
        loader::load(&Arc::new(file))
    }

    /// Name from the `Module` table.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry point method, if any.
    #[must_use]
    pub fn entry_point(&self) -> Option<Token> {
        self.entry_point
    }

    /// Type definitions in declaration order.
    #[must_use]
    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    /// Type references in declaration order.
    #[must_use]
    pub fn type_refs(&self) -> &[TypeRef] {
        &self.type_refs
    }

    /// Method definitions in declaration order.
    #[must_use]
    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    /// Field definitions in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Member references in declaration order.
    #[must_use]
    pub fn member_refs(&self) -> &[MemberRef] {
        &self.member_refs
    }

    /// Generic method instantiations in declaration order.
    #[must_use]
    pub fn method_specs(&self) -> &[MethodSpec] {
        &self.method_specs
    }

    /// Embedded resources in declaration order.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// The type definition named by `token`.
    #[must_use]
    pub fn type_def(&self, token: Token) -> Option<&TypeDef> {
        row(&self.types, token, TableId::TypeDef)
    }

    /// The method definition named by `token`.
    #[must_use]
    pub fn method_def(&self, token: Token) -> Option<&MethodDef> {
        row(&self.methods, token, TableId::MethodDef)
    }

    /// The field definition named by `token`.
    #[must_use]
    pub fn field_def(&self, token: Token) -> Option<&FieldDef> {
        row(&self.fields, token, TableId::Field)
    }

    /// The member reference named by `token`.
    #[must_use]
    pub fn member_ref(&self, token: Token) -> Option<&MemberRef> {
        row(&self.member_refs, token, TableId::MemberRef)
    }

    /// Find a type definition by its qualified name.
    #[must_use]
    pub fn type_by_name(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|ty| ty.qualified_name() == name)
    }

    fn type_ref(&self, token: Token) -> Option<&TypeRef> {
        row(&self.type_refs, token, TableId::TypeRef)
    }

    fn method_spec(&self, token: Token) -> Option<&MethodSpec> {
        row(&self.method_specs, token, TableId::MethodSpec)
    }

    fn type_def_or_err(&self, ty: Token) -> Result<&TypeDef> {
        self.type_def(ty).ok_or(TypeNotFound(ty))
    }

    fn static_constructor(&self, ty: Token) -> Option<&MethodDef> {
        self.type_def(ty)?
            .methods
            .iter()
            .filter_map(|token| self.method_def(*token))
            .find(|method| method.name == ".cctor")
    }
}

fn row<T>(rows: &[T], token: Token, table: TableId) -> Option<&T> {
    if token.table() != table as u8 || token.is_null() {
        return None;
    }

    rows.get(token.row() as usize - 1)
}

/// Returns `true` for a `stsfld` whose operand is `field`.
fn stores_field(instruction: &Instruction, field: Token) -> bool {
    instruction.is("stsfld") && instruction.token() == Some(field)
}

impl CodeContainer for CilModule {
    fn methods_with_bodies(&self) -> Vec<Token> {
        self.methods
            .iter()
            .filter(|method| method.code.has_body())
            .map(|method| method.token)
            .collect()
    }

    fn method_instructions(&self, method: Token) -> Result<&[Instruction]> {
        let Some(definition) = self.method_def(method) else {
            return Err(malformed_error!("No method definition - {}", method));
        };

        match &definition.code {
            MethodCode::Decoded(instructions) => Ok(instructions),
            MethodCode::Malformed(message) => Err(malformed_error!(
                "Method body of {} is malformed - {}",
                method,
                message
            )),
            MethodCode::None => Err(malformed_error!("Method {} has no body", method)),
        }
    }

    fn resolve_method(&self, token: Token) -> Option<MethodRef<'_>> {
        match TableId::from_u8(token.table())? {
            TableId::MethodDef => {
                let method = self.method_def(token)?;
                Some(MethodRef {
                    token,
                    name: &method.name,
                    declaring_type: Some(method.declaring_type),
                    signature: &method.signature,
                })
            }
            TableId::MemberRef => {
                let member = self.member_ref(token)?;
                let MemberSignature::Method(signature) = &member.signature else {
                    return None;
                };

                let declaring_type = match TableId::from_u8(member.parent.table()) {
                    Some(TableId::MethodDef) => self
                        .method_def(member.parent)
                        .map(|method| method.declaring_type),
                    Some(TableId::ModuleRef | TableId::Module) => None,
                    _ => Some(member.parent),
                };

                Some(MethodRef {
                    token,
                    name: &member.name,
                    declaring_type,
                    signature,
                })
            }
            TableId::MethodSpec => {
                let spec = self.method_spec(token)?;
                if spec.method.table() == TableId::MethodSpec as u8 {
                    return None;
                }

                self.resolve_method(spec.method)
                    .map(|method| MethodRef { token, ..method })
            }
            _ => None,
        }
    }

    fn resolve_field(&self, token: Token) -> Option<FieldRef<'_>> {
        match TableId::from_u8(token.table())? {
            TableId::Field => {
                let field = self.field_def(token)?;
                Some(FieldRef {
                    token,
                    name: &field.name,
                    declaring_type: Some(field.declaring_type),
                    field_type: &field.field_type,
                    is_static: field.is_static(),
                })
            }
            TableId::MemberRef => {
                let member = self.member_ref(token)?;
                let MemberSignature::Field(field_type) = &member.signature else {
                    return None;
                };

                Some(FieldRef {
                    token,
                    name: &member.name,
                    declaring_type: Some(member.parent),
                    field_type,
                    is_static: false,
                })
            }
            _ => None,
        }
    }

    fn token_kind(&self, token: Token) -> TokenKind {
        if token.table() == USER_STRING_TABLE {
            return TokenKind::String;
        }

        match TableId::from_u8(token.table()) {
            Some(TableId::TypeDef | TableId::TypeRef | TableId::TypeSpec) => TokenKind::Type,
            Some(TableId::MethodDef | TableId::MethodSpec) => TokenKind::Method,
            Some(TableId::Field) => TokenKind::Field,
            Some(TableId::StandAloneSig) => TokenKind::Signature,
            Some(TableId::MemberRef) => match self.member_ref(token).map(|m| &m.signature) {
                Some(MemberSignature::Method(_)) => TokenKind::Method,
                Some(MemberSignature::Field(_)) => TokenKind::Field,
                None => TokenKind::Other,
            },
            _ => TokenKind::Other,
        }
    }

    fn user_string(&self, token: Token) -> Option<&str> {
        if token.table() != USER_STRING_TABLE {
            return None;
        }

        self.user_strings.get(&token.row()).map(String::as_str)
    }

    fn type_name(&self, token: Token) -> Option<String> {
        if let Some(ty) = self.type_def(token) {
            let mut name = ty.qualified_name();
            let mut enclosing = ty.enclosing_type;
            // Bounded by the number of types, so cyclic nesting cannot loop forever
            for _ in 0..self.types.len() {
                let Some(outer) = enclosing.and_then(|token| self.type_def(token)) else {
                    break;
                };
                name = format!("{}/{}", outer.qualified_name(), name);
                enclosing = outer.enclosing_type;
            }
            return Some(name);
        }

        self.type_ref(token).map(|ty| {
            if ty.namespace.is_empty() {
                ty.name.clone()
            } else {
                format!("{}.{}", ty.namespace, ty.name)
            }
        })
    }

    fn type_methods(&self, ty: Token) -> Result<&[Token]> {
        Ok(&self.type_def_or_err(ty)?.methods)
    }

    fn type_fields(&self, ty: Token) -> Result<&[Token]> {
        Ok(&self.type_def_or_err(ty)?.fields)
    }

    fn nested_types(&self, ty: Token) -> Result<&[Token]> {
        Ok(&self.type_def_or_err(ty)?.nested_types)
    }

    fn field_initializer(&self, field: Token) -> Option<Vec<Instruction>> {
        let definition = self.field_def(field)?;

        if let Some(constant) = definition.constant {
            let instruction = match constant {
                Immediate::Int64(_) => {
                    Instruction::from_mnemonic("ldc.i8", Operand::Immediate(constant))
                }
                _ => Instruction::from_mnemonic(
                    "ldc.i4",
                    Operand::Immediate(Immediate::Int32(constant.as_i64()? as i32)),
                ),
            };
            return instruction.ok().map(|instruction| vec![instruction]);
        }

        let cctor = self.static_constructor(definition.declaring_type)?;
        let MethodCode::Decoded(instructions) = &cctor.code else {
            return None;
        };

        let end = instructions
            .iter()
            .position(|instruction| stores_field(instruction, field))?;
        let start = instructions[..end]
            .iter()
            .rposition(|instruction| instruction.is("stsfld"))
            .map_or(0, |previous| previous + 1);

        Some(instructions[start..end].to_vec())
    }

    fn resource(&self, name: &str) -> Option<&[u8]> {
        self.resources
            .iter()
            .find(|resource| resource.name == name)
            .map(|resource| resource.data.as_slice())
    }

    fn is_type_definition(&self, token: Token) -> bool {
        self.type_def(token).is_some()
    }
}
