//! Method and field signature blobs (II.23.2), decoded to the level of detail the analysis
//! needs: element kinds with their type tokens, calling convention and parameter list.

use std::fmt;

use crate::{file::parser::Parser, metadata::token::Token, Result};

const MAX_RECURSION_DEPTH: usize = 50;

#[allow(missing_docs)]
pub mod element_type {
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const PTR: u8 = 0x0F;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1B;
    pub const OBJECT: u8 = 0x1C;
    pub const SZARRAY: u8 = 0x1D;
    pub const MVAR: u8 = 0x1E;
    pub const CMOD_REQD: u8 = 0x1F;
    pub const CMOD_OPT: u8 = 0x20;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
}

/// Calling convention flag of instance methods.
pub const HASTHIS: u8 = 0x20;
/// Calling convention flag for an explicit `this` parameter.
pub const EXPLICITTHIS: u8 = 0x40;
/// Calling convention flag of generic methods.
pub const GENERIC: u8 = 0x10;
/// Leading byte of field signatures.
pub const FIELD: u8 = 0x06;

/// A simplified type signature.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ElementKind {
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    String,
    Object,
    IntPtr,
    UIntPtr,
    TypedByRef,
    /// Reference type named by a TypeDef, TypeRef or TypeSpec token
    Class(Token),
    /// Value type named by a TypeDef, TypeRef or TypeSpec token
    ValueType(Token),
    /// Instantiated generic type
    GenericInst(Token, Vec<ElementKind>),
    /// Single-dimensional zero-based array
    SzArray(Box<ElementKind>),
    /// Multi-dimensional array
    Array(Box<ElementKind>),
    /// Unmanaged pointer
    Ptr(Box<ElementKind>),
    /// Managed reference
    ByRef(Box<ElementKind>),
    /// Generic parameter of the declaring type
    Var(u32),
    /// Generic parameter of the method
    MVar(u32),
    /// Function pointer
    FnPtr,
}

impl ElementKind {
    /// Returns `true` for the 8 to 64-bit integer primitives.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ElementKind::I1
                | ElementKind::U1
                | ElementKind::I2
                | ElementKind::U2
                | ElementKind::I4
                | ElementKind::U4
                | ElementKind::I8
                | ElementKind::U8
        )
    }

    /// Returns `true` for `System.Object`.
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, ElementKind::Object)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Void => write!(f, "void"),
            ElementKind::Boolean => write!(f, "bool"),
            ElementKind::Char => write!(f, "char"),
            ElementKind::I1 => write!(f, "int8"),
            ElementKind::U1 => write!(f, "uint8"),
            ElementKind::I2 => write!(f, "int16"),
            ElementKind::U2 => write!(f, "uint16"),
            ElementKind::I4 => write!(f, "int32"),
            ElementKind::U4 => write!(f, "uint32"),
            ElementKind::I8 => write!(f, "int64"),
            ElementKind::U8 => write!(f, "uint64"),
            ElementKind::R4 => write!(f, "float32"),
            ElementKind::R8 => write!(f, "float64"),
            ElementKind::String => write!(f, "string"),
            ElementKind::Object => write!(f, "object"),
            ElementKind::IntPtr => write!(f, "native int"),
            ElementKind::UIntPtr => write!(f, "native uint"),
            ElementKind::TypedByRef => write!(f, "typedref"),
            ElementKind::Class(token) => write!(f, "class {token}"),
            ElementKind::ValueType(token) => write!(f, "valuetype {token}"),
            ElementKind::GenericInst(token, args) => {
                write!(f, "{token}<")?;
                for (position, arg) in args.iter().enumerate() {
                    if position > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
            ElementKind::SzArray(inner) => write!(f, "{inner}[]"),
            ElementKind::Array(inner) => write!(f, "{inner}[,]"),
            ElementKind::Ptr(inner) => write!(f, "{inner}*"),
            ElementKind::ByRef(inner) => write!(f, "{inner}&"),
            ElementKind::Var(index) => write!(f, "!{index}"),
            ElementKind::MVar(index) => write!(f, "!!{index}"),
            ElementKind::FnPtr => write!(f, "method*"),
        }
    }
}

/// A decoded method signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// Instance method (`HASTHIS`)
    pub has_this: bool,
    /// `this` is passed explicitly as the first parameter
    pub explicit_this: bool,
    /// Number of generic parameters
    pub generic_params: u32,
    /// Return type
    pub ret: ElementKind,
    /// Parameter types, without `this`
    pub params: Vec<ElementKind>,
}

impl MethodSignature {
    /// An instance or static method signature.
    #[must_use]
    pub fn new(has_this: bool, ret: ElementKind, params: Vec<ElementKind>) -> Self {
        MethodSignature {
            has_this,
            explicit_this: false,
            generic_params: 0,
            ret,
            params,
        }
    }
}

/// The signature of a MemberRef, which names either a method or a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberSignature {
    /// Method reference
    Method(MethodSignature),
    /// Field reference with the field's type
    Field(ElementKind),
}

struct SignatureParser<'a> {
    parser: Parser<'a>,
    depth: usize,
}

impl<'a> SignatureParser<'a> {
    fn new(data: &'a [u8]) -> Self {
        SignatureParser {
            parser: Parser::new(data),
            depth: 0,
        }
    }

    fn skip_custom_mods(&mut self) -> Result<()> {
        while self.parser.has_more_data() {
            let next_byte = self.parser.peek_byte()?;
            if next_byte != element_type::CMOD_OPT && next_byte != element_type::CMOD_REQD {
                break;
            }

            self.parser.advance_by(1)?;
            self.parser.read_compressed_token()?;
        }

        Ok(())
    }

    fn parse_type(&mut self) -> Result<ElementKind> {
        self.depth += 1;
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(malformed_error!("Signature nesting exceeds {}", MAX_RECURSION_DEPTH));
        }

        self.skip_custom_mods()?;

        let current_byte = self.parser.read_le::<u8>()?;
        let kind = match current_byte {
            element_type::VOID => ElementKind::Void,
            element_type::BOOLEAN => ElementKind::Boolean,
            element_type::CHAR => ElementKind::Char,
            element_type::I1 => ElementKind::I1,
            element_type::U1 => ElementKind::U1,
            element_type::I2 => ElementKind::I2,
            element_type::U2 => ElementKind::U2,
            element_type::I4 => ElementKind::I4,
            element_type::U4 => ElementKind::U4,
            element_type::I8 => ElementKind::I8,
            element_type::U8 => ElementKind::U8,
            element_type::R4 => ElementKind::R4,
            element_type::R8 => ElementKind::R8,
            element_type::STRING => ElementKind::String,
            element_type::OBJECT => ElementKind::Object,
            element_type::I => ElementKind::IntPtr,
            element_type::U => ElementKind::UIntPtr,
            element_type::TYPEDBYREF => ElementKind::TypedByRef,
            element_type::CLASS => ElementKind::Class(self.parser.read_compressed_token()?),
            element_type::VALUETYPE => {
                ElementKind::ValueType(self.parser.read_compressed_token()?)
            }
            element_type::VAR => ElementKind::Var(self.parser.read_compressed_uint()?),
            element_type::MVAR => ElementKind::MVar(self.parser.read_compressed_uint()?),
            element_type::PTR => ElementKind::Ptr(Box::new(self.parse_type()?)),
            element_type::BYREF => ElementKind::ByRef(Box::new(self.parse_type()?)),
            element_type::PINNED => self.parse_type()?,
            element_type::SZARRAY => ElementKind::SzArray(Box::new(self.parse_type()?)),
            element_type::ARRAY => {
                let element = self.parse_type()?;
                let _rank = self.parser.read_compressed_uint()?;
                let sizes = self.parser.read_compressed_uint()?;
                for _ in 0..sizes {
                    self.parser.read_compressed_uint()?;
                }
                let lower_bounds = self.parser.read_compressed_uint()?;
                for _ in 0..lower_bounds {
                    self.parser.read_compressed_uint()?;
                }

                ElementKind::Array(Box::new(element))
            }
            element_type::GENERICINST => {
                let base = self.parser.read_le::<u8>()?;
                if base != element_type::CLASS && base != element_type::VALUETYPE {
                    return Err(malformed_error!(
                        "GENERICINST - Next byte is not TYPE_CLASS or TYPE_VALUE - {}",
                        base
                    ));
                }

                let token = self.parser.read_compressed_token()?;
                let count = self.parser.read_compressed_uint()?;
                let mut args = Vec::with_capacity(count.min(16) as usize);
                for _ in 0..count {
                    args.push(self.parse_type()?);
                }

                ElementKind::GenericInst(token, args)
            }
            element_type::FNPTR => {
                self.parse_method()?;
                ElementKind::FnPtr
            }
            _ => {
                return Err(malformed_error!(
                    "Unsupported ELEMENT_TYPE - {}",
                    current_byte
                ))
            }
        };

        self.depth -= 1;
        Ok(kind)
    }

    fn parse_method(&mut self) -> Result<MethodSignature> {
        let convention = self.parser.read_le::<u8>()?;
        let generic_params = if convention & GENERIC != 0 {
            self.parser.read_compressed_uint()?
        } else {
            0
        };

        let param_count = self.parser.read_compressed_uint()?;
        let ret = self.parse_type()?;

        let mut params = Vec::with_capacity(param_count.min(64) as usize);
        for _ in 0..param_count {
            if self.parser.peek_byte()? == element_type::SENTINEL {
                self.parser.advance_by(1)?;
            }
            params.push(self.parse_type()?);
        }

        Ok(MethodSignature {
            has_this: convention & HASTHIS != 0,
            explicit_this: convention & EXPLICITTHIS != 0,
            generic_params,
            ret,
            params,
        })
    }

    fn parse_field(&mut self) -> Result<ElementKind> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != FIELD {
            return Err(malformed_error!(
                "SignatureField - invalid start - {}",
                head_byte
            ));
        }

        self.parse_type()
    }
}

/// Decode a method signature blob.
///
/// # Errors
/// Returns an error for truncated blobs or unknown element types.
///
/// # Examples
///
/// ```rust
/// use vmscope::metadata::signatures::{parse_method_signature, ElementKind};
///
/// // instance void (object)
/// let signature = parse_method_signature(&[0x20, 0x01, 0x01, 0x1C])?;
/// assert!(signature.has_this);
/// assert_eq!(signature.ret, ElementKind::Void);
/// assert_eq!(signature.params, vec![ElementKind::Object]);
/// # Ok::<(), vmscope::Error>(())
/// ```
pub fn parse_method_signature(data: &[u8]) -> Result<MethodSignature> {
    SignatureParser::new(data).parse_method()
}

/// Decode a field signature blob to the field's type.
///
/// # Errors
/// Returns an error if the blob does not start with `FIELD` or is malformed.
pub fn parse_field_signature(data: &[u8]) -> Result<ElementKind> {
    SignatureParser::new(data).parse_field()
}

/// Decode the signature of a MemberRef, which may name a method or a field.
///
/// # Errors
/// Returns an error for malformed blobs.
pub fn parse_member_signature(data: &[u8]) -> Result<MemberSignature> {
    match data.first() {
        Some(&FIELD) => Ok(MemberSignature::Field(parse_field_signature(data)?)),
        Some(_) => Ok(MemberSignature::Method(parse_method_signature(data)?)),
        None => Err(malformed_error!("Empty member signature")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_signatures() {
        // static int32 (string, class 0x01000003[])
        let signature = parse_method_signature(&[0x00, 0x02, 0x08, 0x0E, 0x1D, 0x12, 0x0D]).unwrap();
        assert!(!signature.has_this);
        assert_eq!(signature.ret, ElementKind::I4);
        assert_eq!(
            signature.params,
            vec![
                ElementKind::String,
                ElementKind::SzArray(Box::new(ElementKind::Class(Token::new(0x0100_0003))))
            ]
        );

        // generic instance method: !!0 <1> (int64&)
        let signature = parse_method_signature(&[0x30, 0x01, 0x01, 0x1E, 0x00, 0x10, 0x0A]).unwrap();
        assert!(signature.has_this);
        assert_eq!(signature.generic_params, 1);
        assert_eq!(signature.ret, ElementKind::MVar(0));
        assert_eq!(signature.params, vec![ElementKind::ByRef(Box::new(ElementKind::I8))]);
    }

    #[test]
    fn field_signatures() {
        assert_eq!(parse_field_signature(&[0x06, 0x08]).unwrap(), ElementKind::I4);
        assert!(parse_field_signature(&[0x06, 0x08]).unwrap().is_integer());

        // modreq(0x01000001) uint64
        assert_eq!(
            parse_field_signature(&[0x06, 0x1F, 0x05, 0x0B]).unwrap(),
            ElementKind::U8
        );

        // List<int32>
        let kind = parse_field_signature(&[0x06, 0x15, 0x12, 0x09, 0x01, 0x08]).unwrap();
        assert_eq!(
            kind,
            ElementKind::GenericInst(Token::new(0x0100_0002), vec![ElementKind::I4])
        );
        assert!(!kind.is_integer());

        assert!(parse_field_signature(&[0x07, 0x08]).is_err());
    }

    #[test]
    fn member_signatures() {
        assert_eq!(
            parse_member_signature(&[0x06, 0x0A]).unwrap(),
            MemberSignature::Field(ElementKind::I8)
        );
        assert!(matches!(
            parse_member_signature(&[0x20, 0x00, 0x01]).unwrap(),
            MemberSignature::Method(signature) if signature.params.is_empty()
        ));
        assert!(parse_member_signature(&[]).is_err());
    }

    #[test]
    fn display() {
        let kind = ElementKind::SzArray(Box::new(ElementKind::Object));
        assert_eq!(kind.to_string(), "object[]");
    }
}
