//! Flag constants of the metadata tables (ECMA-335 II.23.1).

use bitflags::bitflags;

#[allow(non_snake_case)]
/// `TypeDef.Flags` constants.
pub mod TypeAttributes {
    /// Mask for the visibility bits
    pub const VISIBILITY_MASK: u32 = 0x0000_0007;
    /// Top-level type, not visible outside the assembly
    pub const NOT_PUBLIC: u32 = 0x0000_0000;
    /// Top-level public type
    pub const PUBLIC: u32 = 0x0000_0001;
    /// Nested, public
    pub const NESTED_PUBLIC: u32 = 0x0000_0002;
    /// Nested, private
    pub const NESTED_PRIVATE: u32 = 0x0000_0003;
    /// Nested, family
    pub const NESTED_FAMILY: u32 = 0x0000_0004;
    /// Nested, assembly
    pub const NESTED_ASSEMBLY: u32 = 0x0000_0005;
    /// Nested, family and assembly
    pub const NESTED_FAM_AND_ASSEM: u32 = 0x0000_0006;
    /// Nested, family or assembly
    pub const NESTED_FAM_OR_ASSEM: u32 = 0x0000_0007;
    /// Type is an interface
    pub const INTERFACE: u32 = 0x0000_0020;
    /// Type is abstract
    pub const ABSTRACT: u32 = 0x0000_0080;
    /// Type cannot be derived from
    pub const SEALED: u32 = 0x0000_0100;
    /// Name is special
    pub const SPECIAL_NAME: u32 = 0x0000_0400;
    /// Type initializer may run before first static field access
    pub const BEFORE_FIELD_INIT: u32 = 0x0010_0000;
}

#[allow(non_snake_case)]
/// `Field.Flags` constants.
pub mod FieldAttributes {
    /// Mask for the access bits
    pub const FIELD_ACCESS_MASK: u16 = 0x0007;
    /// Compiler controlled
    pub const COMPILER_CONTROLLED: u16 = 0x0000;
    /// Accessible only by the parent type
    pub const PRIVATE: u16 = 0x0001;
    /// Accessible by subtypes in this assembly
    pub const FAM_AND_ASSEM: u16 = 0x0002;
    /// Accessible within the assembly
    pub const ASSEMBLY: u16 = 0x0003;
    /// Accessible by subtypes
    pub const FAMILY: u16 = 0x0004;
    /// Accessible by subtypes and within the assembly
    pub const FAM_OR_ASSEM: u16 = 0x0005;
    /// Accessible by anyone
    pub const PUBLIC: u16 = 0x0006;
    /// Static field
    pub const STATIC: u16 = 0x0010;
    /// Read-only after initialization
    pub const INIT_ONLY: u16 = 0x0020;
    /// Compile-time constant
    pub const LITERAL: u16 = 0x0040;
}

/// Mask for the access bits of `MethodDef.Flags`
pub const METHOD_ACCESS_MASK: u16 = 0x0007;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Access part of `MethodDef.Flags`
    pub struct MethodAccessFlags: u16 {
        /// Compiler controlled
        const COMPILER_CONTROLLED = 0x0000;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by subtypes in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible within the assembly
        const ASSEMBLY = 0x0003;
        /// Accessible by subtypes
        const FAMILY = 0x0004;
        /// Accessible by subtypes and within the assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone
        const PUBLIC = 0x0006;
    }
}

impl MethodAccessFlags {
    /// Extracts the access bits from raw method flags.
    #[must_use]
    pub fn from_method_flags(flags: u16) -> Self {
        Self::from_bits_truncate(flags & METHOD_ACCESS_MASK)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Non-access part of `MethodDef.Flags`
    pub struct MethodModifiers: u16 {
        /// Member of the type rather than of an instance
        const STATIC = 0x0010;
        /// Cannot be overridden
        const FINAL = 0x0020;
        /// Virtual
        const VIRTUAL = 0x0040;
        /// Hides by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Always gets a new vtable slot
        const NEW_SLOT = 0x0100;
        /// Overridable only if also accessible
        const STRICT = 0x0200;
        /// No implementation
        const ABSTRACT = 0x0400;
        /// Name is special
        const SPECIAL_NAME = 0x0800;
        /// Implementation is forwarded through P/Invoke
        const PINVOKE_IMPL = 0x2000;
        /// Name is special to the runtime
        const RT_SPECIAL_NAME = 0x1000;
    }
}

impl MethodModifiers {
    /// Extracts the modifier bits from raw method flags.
    #[must_use]
    pub fn from_method_flags(flags: u16) -> Self {
        Self::from_bits_truncate(flags & !METHOD_ACCESS_MASK)
    }
}

#[allow(non_snake_case)]
/// `MethodDef.ImplFlags` constants.
pub mod MethodImplAttributes {
    /// Mask for the code type
    pub const CODE_TYPE_MASK: u16 = 0x0003;
    /// Method body is IL
    pub const IL: u16 = 0x0000;
    /// Method body is native
    pub const NATIVE: u16 = 0x0001;
    /// Method body is provided by the runtime
    pub const RUNTIME: u16 = 0x0003;
    /// Method is implemented internally by the runtime
    pub const INTERNAL_CALL: u16 = 0x1000;
}

#[allow(non_snake_case)]
/// `Param.Flags` constants.
pub mod ParamAttributes {
    /// Input parameter
    pub const IN: u16 = 0x0001;
    /// Output parameter
    pub const OUT: u16 = 0x0002;
    /// Optional parameter
    pub const OPTIONAL: u16 = 0x0010;
}

#[allow(non_snake_case)]
/// `MethodSemantics.Semantics` constants.
pub mod MethodSemanticsAttributes {
    /// Property setter
    pub const SETTER: u16 = 0x0001;
    /// Property getter
    pub const GETTER: u16 = 0x0002;
    /// Other accessor
    pub const OTHER: u16 = 0x0004;
    /// Event add accessor
    pub const ADD_ON: u16 = 0x0008;
    /// Event remove accessor
    pub const REMOVE_ON: u16 = 0x0010;
    /// Event raise accessor
    pub const FIRE: u16 = 0x0020;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_flags_split() {
        // private hidebysig static
        let flags = 0x0091;

        assert_eq!(
            MethodAccessFlags::from_method_flags(flags),
            MethodAccessFlags::PRIVATE
        );
        let modifiers = MethodModifiers::from_method_flags(flags);
        assert!(modifiers.contains(MethodModifiers::STATIC));
        assert!(modifiers.contains(MethodModifiers::HIDE_BY_SIG));
        assert!(!modifiers.contains(MethodModifiers::VIRTUAL));
    }
}
