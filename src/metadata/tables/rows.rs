//! Raw rows of the tables the loader resolves.
//!
//! Heap references are kept as offsets and table references as row ids; the loader turns
//! them into names, signatures and tokens.

use super::{CodedIndex, CodedIndexType, RowReadable, TableId};
use crate::Result;

/// A `Module` row (II.22.30).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRaw {
    /// Row id
    pub rid: u32,
    /// `#Strings` offset of the module name
    pub name: u32,
}

impl RowReadable for ModuleRaw {
    const TABLE: TableId = TableId::Module;

    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self> {
        Ok(ModuleRaw {
            rid,
            name: columns[1],
        })
    }
}

/// A `TypeRef` row (II.22.38).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRefRaw {
    /// Row id
    pub rid: u32,
    /// Module, ModuleRef, AssemblyRef or enclosing TypeRef
    pub resolution_scope: CodedIndex,
    /// `#Strings` offset of the type name
    pub type_name: u32,
    /// `#Strings` offset of the namespace
    pub type_namespace: u32,
}

impl RowReadable for TypeRefRaw {
    const TABLE: TableId = TableId::TypeRef;

    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self> {
        Ok(TypeRefRaw {
            rid,
            resolution_scope: CodedIndexType::ResolutionScope.decode(columns[0])?,
            type_name: columns[1],
            type_namespace: columns[2],
        })
    }
}

/// A `TypeDef` row (II.22.37).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefRaw {
    /// Row id
    pub rid: u32,
    /// `TypeAttributes`
    pub flags: u32,
    /// `#Strings` offset of the type name
    pub type_name: u32,
    /// `#Strings` offset of the namespace
    pub type_namespace: u32,
    /// Base type
    pub extends: CodedIndex,
    /// First row of this type's run in the Field (or FieldPtr) table
    pub field_list: u32,
    /// First row of this type's run in the MethodDef (or MethodPtr) table
    pub method_list: u32,
}

impl RowReadable for TypeDefRaw {
    const TABLE: TableId = TableId::TypeDef;

    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self> {
        Ok(TypeDefRaw {
            rid,
            flags: columns[0],
            type_name: columns[1],
            type_namespace: columns[2],
            extends: CodedIndexType::TypeDefOrRef.decode(columns[3])?,
            field_list: columns[4],
            method_list: columns[5],
        })
    }
}

/// A `FieldPtr` row, present only in unoptimized (`#-`) metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPtrRaw {
    /// Row id
    pub rid: u32,
    /// The Field row this entry stands for
    pub field: u32,
}

impl RowReadable for FieldPtrRaw {
    const TABLE: TableId = TableId::FieldPtr;

    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self> {
        Ok(FieldPtrRaw {
            rid,
            field: columns[0],
        })
    }
}

/// A `Field` row (II.22.15).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRaw {
    /// Row id
    pub rid: u32,
    /// `FieldAttributes`
    pub flags: u16,
    /// `#Strings` offset of the name
    pub name: u32,
    /// `#Blob` offset of the field signature
    pub signature: u32,
}

impl RowReadable for FieldRaw {
    const TABLE: TableId = TableId::Field;

    #[allow(clippy::cast_possible_truncation)]
    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self> {
        Ok(FieldRaw {
            rid,
            flags: columns[0] as u16,
            name: columns[1],
            signature: columns[2],
        })
    }
}

/// A `MethodPtr` row, present only in unoptimized (`#-`) metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPtrRaw {
    /// Row id
    pub rid: u32,
    /// The MethodDef row this entry stands for
    pub method: u32,
}

impl RowReadable for MethodPtrRaw {
    const TABLE: TableId = TableId::MethodPtr;

    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self> {
        Ok(MethodPtrRaw {
            rid,
            method: columns[0],
        })
    }
}

/// A `MethodDef` row (II.22.26).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDefRaw {
    /// Row id
    pub rid: u32,
    /// RVA of the method body, `0` for abstract and extern methods
    pub rva: u32,
    /// `MethodImplAttributes`
    pub impl_flags: u16,
    /// `MethodAttributes`
    pub flags: u16,
    /// `#Strings` offset of the name
    pub name: u32,
    /// `#Blob` offset of the method signature
    pub signature: u32,
}

impl RowReadable for MethodDefRaw {
    const TABLE: TableId = TableId::MethodDef;

    #[allow(clippy::cast_possible_truncation)]
    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self> {
        Ok(MethodDefRaw {
            rid,
            rva: columns[0],
            impl_flags: columns[1] as u16,
            flags: columns[2] as u16,
            name: columns[3],
            signature: columns[4],
        })
    }
}

/// A `MemberRef` row (II.22.25).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRefRaw {
    /// Row id
    pub rid: u32,
    /// Declaring type, module or method
    pub class: CodedIndex,
    /// `#Strings` offset of the name
    pub name: u32,
    /// `#Blob` offset of the method or field signature
    pub signature: u32,
}

impl RowReadable for MemberRefRaw {
    const TABLE: TableId = TableId::MemberRef;

    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self> {
        Ok(MemberRefRaw {
            rid,
            class: CodedIndexType::MemberRefParent.decode(columns[0])?,
            name: columns[1],
            signature: columns[2],
        })
    }
}

/// A `Constant` row (II.22.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantRaw {
    /// Row id
    pub rid: u32,
    /// `ELEMENT_TYPE_*` of the value
    pub element_type: u8,
    /// Owning field, parameter or property
    pub parent: CodedIndex,
    /// `#Blob` offset of the little-endian value
    pub value: u32,
}

impl RowReadable for ConstantRaw {
    const TABLE: TableId = TableId::Constant;

    #[allow(clippy::cast_possible_truncation)]
    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self> {
        Ok(ConstantRaw {
            rid,
            // The type byte is followed by a padding byte
            element_type: (columns[0] & 0xFF) as u8,
            parent: CodedIndexType::HasConstant.decode(columns[1])?,
            value: columns[2],
        })
    }
}

/// A `ManifestResource` row (II.22.24).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestResourceRaw {
    /// Row id
    pub rid: u32,
    /// Offset of the resource within the CLI resources directory
    pub offset: u32,
    /// `ManifestResourceAttributes`
    pub flags: u32,
    /// `#Strings` offset of the resource name
    pub name: u32,
    /// File or AssemblyRef holding the resource, null when embedded
    pub implementation: CodedIndex,
}

impl RowReadable for ManifestResourceRaw {
    const TABLE: TableId = TableId::ManifestResource;

    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self> {
        Ok(ManifestResourceRaw {
            rid,
            offset: columns[0],
            flags: columns[1],
            name: columns[2],
            implementation: CodedIndexType::Implementation.decode(columns[3])?,
        })
    }
}

/// A `NestedClass` row (II.22.32).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedClassRaw {
    /// Row id
    pub rid: u32,
    /// TypeDef row of the nested type
    pub nested_class: u32,
    /// TypeDef row of the enclosing type
    pub enclosing_class: u32,
}

impl RowReadable for NestedClassRaw {
    const TABLE: TableId = TableId::NestedClass;

    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self> {
        Ok(NestedClassRaw {
            rid,
            nested_class: columns[0],
            enclosing_class: columns[1],
        })
    }
}

/// A `MethodSpec` row (II.22.29).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpecRaw {
    /// Row id
    pub rid: u32,
    /// The generic method being instantiated
    pub method: CodedIndex,
    /// `#Blob` offset of the instantiation signature
    pub instantiation: u32,
}

impl RowReadable for MethodSpecRaw {
    const TABLE: TableId = TableId::MethodSpec;

    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self> {
        Ok(MethodSpecRaw {
            rid,
            method: CodedIndexType::MethodDefOrRef.decode(columns[0])?,
            instantiation: columns[1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typedef_columns() {
        let row = TypeDefRaw::from_columns(2, &[0x0010_0001, 0x20, 0x30, (1 << 2) | 1, 3, 5])
            .unwrap();

        assert_eq!(row.flags, 0x0010_0001);
        assert_eq!(row.extends.table, TableId::TypeRef);
        assert_eq!(row.extends.row, 1);
        assert_eq!(row.field_list, 3);
        assert_eq!(row.method_list, 5);
    }

    #[test]
    fn constant_type_byte() {
        let row = ConstantRaw::from_columns(1, &[0x0008, 1 << 2, 0x10]).unwrap();

        assert_eq!(row.element_type, 0x08);
        assert_eq!(row.parent.table, TableId::Field);
        assert_eq!(row.parent.row, 1);
    }

    #[test]
    fn invalid_coded_index() {
        assert!(MemberRefRaw::from_columns(1, &[0x07, 0, 0]).is_err());
    }
}
