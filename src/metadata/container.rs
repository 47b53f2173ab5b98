//! The interface the analysis engine reads a binary through.
//!
//! [`CodeContainer`] is implemented by [`crate::CilModule`]; callers that model a container
//! themselves can implement it directly. All operations are read-only and every sequence is
//! returned in declaration order.

use crate::{
    disassembler::Instruction,
    metadata::{
        members::is_constructor_name,
        signatures::{ElementKind, MethodSignature},
        token::Token,
    },
    Result,
};

/// What a metadata token names, as far as operand shapes are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// TypeDef, TypeRef or TypeSpec
    Type,
    /// MethodDef, MethodSpec or a MemberRef with a method signature
    Method,
    /// Field or a MemberRef with a field signature
    Field,
    /// User string
    String,
    /// Stand-alone signature
    Signature,
    /// Anything else, including tokens that do not resolve
    Other,
}

/// A method named by a MethodDef, MemberRef or MethodSpec token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodRef<'a> {
    /// The token the method was resolved from
    pub token: Token,
    /// Simple name
    pub name: &'a str,
    /// Declaring type; TypeDef or TypeRef for most methods, `None` for global functions
    pub declaring_type: Option<Token>,
    /// Signature
    pub signature: &'a MethodSignature,
}

impl MethodRef<'_> {
    /// Returns `true` for instance and type constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        is_constructor_name(self.name)
    }
}

/// A field named by a Field or MemberRef token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRef<'a> {
    /// The token the field was resolved from
    pub token: Token,
    /// Simple name
    pub name: &'a str,
    /// Declaring type
    pub declaring_type: Option<Token>,
    /// Type of the field
    pub field_type: &'a ElementKind,
    /// `true` for static fields defined in this module
    pub is_static: bool,
}

/// Read access to a loaded binary.
///
/// Implementations must be immutable for their lifetime; the analysis memoizes results on
/// that assumption.
pub trait CodeContainer: Send + Sync {
    /// MethodDef tokens of all methods that have a body, in declaration order.
    fn methods_with_bodies(&self) -> Vec<Token>;

    /// The decoded instruction stream of a method.
    ///
    /// # Errors
    /// Returns an error if the method does not exist, has no body, or its body could not
    /// be decoded.
    fn method_instructions(&self, method: Token) -> Result<&[Instruction]>;

    /// Resolve a MethodDef, MemberRef or MethodSpec token.
    fn resolve_method(&self, token: Token) -> Option<MethodRef<'_>>;

    /// Resolve a Field or MemberRef token.
    fn resolve_field(&self, token: Token) -> Option<FieldRef<'_>>;

    /// Classify what `token` names.
    fn token_kind(&self, token: Token) -> TokenKind;

    /// The literal a `ldstr` operand names.
    fn user_string(&self, token: Token) -> Option<&str>;

    /// The qualified name of a TypeDef or TypeRef; nested types are joined with `/`.
    fn type_name(&self, token: Token) -> Option<String>;

    /// Methods declared by a type definition.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if `ty` is not a type definition.
    fn type_methods(&self, ty: Token) -> Result<&[Token]>;

    /// Fields declared by a type definition.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if `ty` is not a type definition.
    fn type_fields(&self, ty: Token) -> Result<&[Token]>;

    /// Types nested directly inside a type definition.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if `ty` is not a type definition.
    fn nested_types(&self, ty: Token) -> Result<&[Token]>;

    /// The instructions that compute the initial value of a static field, or `None` if no
    /// initializer can be found.
    fn field_initializer(&self, field: Token) -> Option<Vec<Instruction>>;

    /// Contents of the embedded resource called `name`.
    fn resource(&self, name: &str) -> Option<&[u8]>;

    /// `Type::Method` display name of a method token.
    fn method_name(&self, token: Token) -> Option<String> {
        let method = self.resolve_method(token)?;
        match method.declaring_type.and_then(|ty| self.type_name(ty)) {
            Some(ty) => Some(format!("{}::{}", ty, method.name)),
            None => Some(method.name.to_string()),
        }
    }

    /// Returns `true` if `token` is a type definition of this container.
    fn is_type_definition(&self, token: Token) -> bool {
        token.table() == 0x02 && self.type_methods(token).is_ok()
    }
}
