//! The resolved members of a loaded module.
//!
//! Rows from the metadata tables are turned into these owned values once during loading,
//! with names and signatures already looked up in their heaps. Cross references between
//! them are kept as [`Token`]s.

use crate::{
    disassembler::{Immediate, Instruction},
    metadata::{
        method::{FieldAttributes, MethodAttributes},
        signatures::{ElementKind, MemberSignature, MethodSignature},
        token::Token,
    },
};

/// A type defined in the module.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    /// `TypeDef` token
    pub token: Token,
    /// Namespace, empty for the global namespace and for nested types
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// `TypeAttributes`
    pub flags: u32,
    /// Base type, if any
    pub extends: Option<Token>,
    /// Fields in declaration order
    pub fields: Vec<Token>,
    /// Methods in declaration order
    pub methods: Vec<Token>,
    /// Nested types in declaration order
    pub nested_types: Vec<Token>,
    /// The enclosing type of a nested type
    pub enclosing_type: Option<Token>,
}

impl TypeDef {
    /// The name qualified with its namespace.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// A type referenced from another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// `TypeRef` token
    pub token: Token,
    /// Namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
}

/// The code of a method as far as it could be read.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodCode {
    /// Abstract, runtime-implemented or P/Invoke methods
    None,
    /// The decoded instruction stream
    Decoded(Vec<Instruction>),
    /// The body exists but could not be decoded
    Malformed(String),
}

impl MethodCode {
    /// Returns `true` if the method has a body, readable or not.
    #[must_use]
    pub fn has_body(&self) -> bool {
        !matches!(self, MethodCode::None)
    }
}

/// A method defined in the module.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// `MethodDef` token
    pub token: Token,
    /// Simple name
    pub name: String,
    /// The type declaring the method
    pub declaring_type: Token,
    /// `MethodAttributes`
    pub flags: MethodAttributes,
    /// Decoded signature
    pub signature: MethodSignature,
    /// Body
    pub code: MethodCode,
}

impl MethodDef {
    /// Returns `true` for instance and type constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        is_constructor_name(&self.name)
    }
}

/// A field defined in the module.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// `Field` token
    pub token: Token,
    /// Simple name
    pub name: String,
    /// The type declaring the field
    pub declaring_type: Token,
    /// `FieldAttributes`
    pub flags: FieldAttributes,
    /// Type of the field
    pub field_type: ElementKind,
    /// Integer default value from the `Constant` table
    pub constant: Option<Immediate>,
}

impl FieldDef {
    /// Returns `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldAttributes::STATIC)
    }
}

/// A reference to a method or field, possibly of another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// `MemberRef` token
    pub token: Token,
    /// Simple name
    pub name: String,
    /// TypeDef, TypeRef, TypeSpec, ModuleRef or MethodDef the member belongs to
    pub parent: Token,
    /// Decoded signature
    pub signature: MemberSignature,
}

/// An instantiation of a generic method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    /// `MethodSpec` token
    pub token: Token,
    /// The instantiated `MethodDef` or `MemberRef`
    pub method: Token,
}

/// A resource embedded in the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Manifest name
    pub name: String,
    /// Contents, without the length prefix
    pub data: Vec<u8>,
}

pub(crate) fn is_constructor_name(name: &str) -> bool {
    name == ".ctor" || name == ".cctor"
}
