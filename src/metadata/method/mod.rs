//! Method attributes and method body headers (II.25.4).

mod body;

pub use body::MethodBody;

use bitflags::bitflags;

bitflags! {
    /// Flags of a method body header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodBodyFlags: u16 {
        /// Tiny header, code size in the upper six bits
        const TINY_FORMAT = 0x2;
        /// Fat header
        const FAT_FORMAT = 0x3;
        /// Extra data sections follow the code
        const MORE_SECTS = 0x8;
        /// Locals are zero-initialized
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    /// Flags of an extra data section following the code.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u8 {
        /// Exception handling table
        const EHTABLE = 0x1;
        /// Optimized IL table (unused)
        const OPT_ILTABLE = 0x2;
        /// Fat section layout
        const FAT_FORMAT = 0x40;
        /// Another section follows
        const MORE_SECTS = 0x80;
    }
}

bitflags! {
    /// `MethodAttributes` (II.23.1.10), the bits the analysis looks at.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MethodAttributes: u16 {
        /// Defined on the type rather than per instance
        const STATIC = 0x0010;
        /// Cannot be overridden
        const FINAL = 0x0020;
        /// Virtual method
        const VIRTUAL = 0x0040;
        /// Hides by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Always gets a new vtable slot
        const NEW_SLOT = 0x0100;
        /// No implementation
        const ABSTRACT = 0x0400;
        /// Name is special
        const SPECIAL_NAME = 0x0800;
        /// Runtime interprets the name (`.ctor`, `.cctor`)
        const RT_SPECIAL_NAME = 0x1000;
        /// Implemented through platform invoke
        const PINVOKE_IMPL = 0x2000;
    }
}

/// Mask of the member access bits of `MethodAttributes`.
pub const METHOD_ACCESS_MASK: u16 = 0x0007;

bitflags! {
    /// `FieldAttributes` (II.23.1.5), the bits the analysis looks at.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FieldAttributes: u16 {
        /// Defined on the type rather than per instance
        const STATIC = 0x0010;
        /// Only assignable in an initializer
        const INIT_ONLY = 0x0020;
        /// Compile-time constant
        const LITERAL = 0x0040;
        /// Has a row in the Constant table
        const HAS_DEFAULT = 0x8000;
    }
}
