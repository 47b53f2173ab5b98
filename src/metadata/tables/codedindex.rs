use strum::{EnumCount, EnumIter};

use super::TableId;
use crate::{metadata::token::Token, Result};

/// The coded index kinds of II.24.2.6.
///
/// A coded index packs a table selector into its low bits and a row into the rest.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
#[allow(missing_docs)]
pub enum CodedIndexType {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// The tables selected by each tag value; `None` marks a reserved tag.
    #[must_use]
    pub fn tags(&self) -> &'static [Option<TableId>] {
        match self {
            CodedIndexType::TypeDefOrRef => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasConstant => &[
                Some(TableId::Field),
                Some(TableId::Param),
                Some(TableId::Property),
            ],
            CodedIndexType::HasCustomAttribute => &[
                Some(TableId::MethodDef),
                Some(TableId::Field),
                Some(TableId::TypeRef),
                Some(TableId::TypeDef),
                Some(TableId::Param),
                Some(TableId::InterfaceImpl),
                Some(TableId::MemberRef),
                Some(TableId::Module),
                Some(TableId::DeclSecurity),
                Some(TableId::Property),
                Some(TableId::Event),
                Some(TableId::StandAloneSig),
                Some(TableId::ModuleRef),
                Some(TableId::TypeSpec),
                Some(TableId::Assembly),
                Some(TableId::AssemblyRef),
                Some(TableId::File),
                Some(TableId::ExportedType),
                Some(TableId::ManifestResource),
                Some(TableId::GenericParam),
                Some(TableId::GenericParamConstraint),
                Some(TableId::MethodSpec),
            ],
            CodedIndexType::HasFieldMarshal => &[Some(TableId::Field), Some(TableId::Param)],
            CodedIndexType::HasDeclSecurity => &[
                Some(TableId::TypeDef),
                Some(TableId::MethodDef),
                Some(TableId::Assembly),
            ],
            CodedIndexType::MemberRefParent => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::ModuleRef),
                Some(TableId::MethodDef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasSemantics => &[Some(TableId::Event), Some(TableId::Property)],
            CodedIndexType::MethodDefOrRef => {
                &[Some(TableId::MethodDef), Some(TableId::MemberRef)]
            }
            CodedIndexType::MemberForwarded => &[Some(TableId::Field), Some(TableId::MethodDef)],
            CodedIndexType::Implementation => &[
                Some(TableId::File),
                Some(TableId::AssemblyRef),
                Some(TableId::ExportedType),
            ],
            CodedIndexType::CustomAttributeType => &[
                None,
                None,
                Some(TableId::MethodDef),
                Some(TableId::MemberRef),
                None,
            ],
            CodedIndexType::ResolutionScope => &[
                Some(TableId::Module),
                Some(TableId::ModuleRef),
                Some(TableId::AssemblyRef),
                Some(TableId::TypeRef),
            ],
            CodedIndexType::TypeOrMethodDef => &[Some(TableId::TypeDef), Some(TableId::MethodDef)],
        }
    }

    /// Number of low bits holding the tag.
    #[must_use]
    pub fn tag_bits(&self) -> u8 {
        let tags = self.tags().len();
        // Smallest n with 2^n >= tags
        #[allow(clippy::cast_possible_truncation)]
        let bits = (usize::BITS - (tags - 1).leading_zeros()) as u8;
        bits
    }

    /// Split a raw coded index value into its table and row.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for reserved or out-of-range tags.
    pub fn decode(&self, value: u32) -> Result<CodedIndex> {
        let tag_bits = self.tag_bits();
        let tag = (value & ((1 << tag_bits) - 1)) as usize;

        match self.tags().get(tag) {
            Some(Some(table)) => Ok(CodedIndex {
                table: *table,
                row: value >> tag_bits,
            }),
            _ => Err(malformed_error!(
                "Invalid {:?} coded index tag - {}",
                self,
                tag
            )),
        }
    }
}

/// A decoded coded index: a row in one of several tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodedIndex {
    /// The selected table
    pub table: TableId,
    /// 1-based row, `0` for a null reference
    pub row: u32,
}

impl CodedIndex {
    /// The referenced row as a token.
    #[must_use]
    pub fn token(&self) -> Token {
        Token::from_parts(self.table as u8, self.row)
    }

    /// Returns `true` for the null reference.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row == 0
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn tag_bits() {
        assert_eq!(CodedIndexType::TypeDefOrRef.tag_bits(), 2);
        assert_eq!(CodedIndexType::HasCustomAttribute.tag_bits(), 5);
        assert_eq!(CodedIndexType::MemberRefParent.tag_bits(), 3);
        assert_eq!(CodedIndexType::CustomAttributeType.tag_bits(), 3);
        assert_eq!(CodedIndexType::MethodDefOrRef.tag_bits(), 1);
        assert_eq!(CodedIndexType::ResolutionScope.tag_bits(), 2);

        for kind in CodedIndexType::iter() {
            assert!(1 << kind.tag_bits() >= kind.tags().len());
        }
    }

    #[test]
    fn decode() {
        // TypeRef row 5
        let index = CodedIndexType::TypeDefOrRef.decode((5 << 2) | 1).unwrap();
        assert_eq!(index.table, TableId::TypeRef);
        assert_eq!(index.row, 5);
        assert_eq!(index.token().value(), 0x0100_0005);

        // MemberRef row 3
        let index = CodedIndexType::MethodDefOrRef.decode((3 << 1) | 1).unwrap();
        assert_eq!(index.token().value(), 0x0A00_0003);

        assert!(CodedIndexType::TypeDefOrRef.decode(3).is_err());
        assert!(CodedIndexType::CustomAttributeType.decode(0).is_err());
    }
}
