use crate::{metadata::token::Token, Result};

#[allow(non_snake_case)]
/// `ELEMENT_TYPE_*` constants (ECMA-335 II.23.1.16).
pub mod ELEMENT_TYPE {
    /// Marks the end of a list
    pub const END: u8 = 0x00;
    /// `void`
    pub const VOID: u8 = 0x01;
    /// `bool`
    pub const BOOLEAN: u8 = 0x02;
    /// `char`
    pub const CHAR: u8 = 0x03;
    /// `sbyte`
    pub const I1: u8 = 0x04;
    /// `byte`
    pub const U1: u8 = 0x05;
    /// `short`
    pub const I2: u8 = 0x06;
    /// `ushort`
    pub const U2: u8 = 0x07;
    /// `int`
    pub const I4: u8 = 0x08;
    /// `uint`
    pub const U4: u8 = 0x09;
    /// `long`
    pub const I8: u8 = 0x0A;
    /// `ulong`
    pub const U8: u8 = 0x0B;
    /// `float`
    pub const R4: u8 = 0x0C;
    /// `double`
    pub const R8: u8 = 0x0D;
    /// `string`
    pub const STRING: u8 = 0x0E;
    /// Unmanaged pointer, followed by a type
    pub const PTR: u8 = 0x0F;
    /// Managed reference, followed by a type
    pub const BYREF: u8 = 0x10;
    /// Value type, followed by a `TypeDefOrRef` token
    pub const VALUETYPE: u8 = 0x11;
    /// Reference type, followed by a `TypeDefOrRef` token
    pub const CLASS: u8 = 0x12;
    /// Generic parameter of the type, followed by its number
    pub const VAR: u8 = 0x13;
    /// Multi-dimensional array
    pub const ARRAY: u8 = 0x14;
    /// Generic instantiation
    pub const GENERICINST: u8 = 0x15;
    /// Typed reference
    pub const TYPEDBYREF: u8 = 0x16;
    /// `nint`
    pub const I: u8 = 0x18;
    /// `nuint`
    pub const U: u8 = 0x19;
    /// Function pointer, followed by a method signature
    pub const FNPTR: u8 = 0x1B;
    /// `object`
    pub const OBJECT: u8 = 0x1C;
    /// Single-dimensional zero-based array
    pub const SZARRAY: u8 = 0x1D;
    /// Generic parameter of the method, followed by its number
    pub const MVAR: u8 = 0x1E;
    /// Required modifier, followed by a `TypeDefOrRef` token
    pub const CMOD_REQD: u8 = 0x1F;
    /// Optional modifier, followed by a `TypeDefOrRef` token
    pub const CMOD_OPT: u8 = 0x20;
    /// Start of the variable part of a vararg call site
    pub const SENTINEL: u8 = 0x41;
    /// Pinned local
    pub const PINNED: u8 = 0x45;
}

#[allow(non_snake_case)]
/// Leading byte of method signatures (ECMA-335 II.23.2.1 - II.23.2.3).
pub mod CALLING_CONVENTION {
    /// Default managed calling convention
    pub const DEFAULT: u8 = 0x00;
    /// Variable argument list
    pub const VARARG: u8 = 0x05;
    /// Field signature
    pub const FIELD: u8 = 0x06;
    /// Generic method instantiation (`MethodSpec` blob)
    pub const GENERICINST: u8 = 0x0A;
    /// Mask of the calling convention kind
    pub const KIND_MASK: u8 = 0x0F;
    /// Method has generic parameters
    pub const GENERIC: u8 = 0x10;
    /// Instance method
    pub const HASTHIS: u8 = 0x20;
    /// `this` is passed explicitly as first parameter
    pub const EXPLICITTHIS: u8 = 0x40;
}

/// A type inside a signature blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSignature {
    /// `void`, only valid as a return type
    Void,
    /// `System.Boolean`
    Boolean,
    /// `System.Char`
    Char,
    /// `System.SByte`
    I1,
    /// `System.Byte`
    U1,
    /// `System.Int16`
    I2,
    /// `System.UInt16`
    U2,
    /// `System.Int32`
    I4,
    /// `System.UInt32`
    U4,
    /// `System.Int64`
    I8,
    /// `System.UInt64`
    U8,
    /// `System.Single`
    R4,
    /// `System.Double`
    R8,
    /// `System.String`
    String,
    /// `System.IntPtr`
    I,
    /// `System.UIntPtr`
    U,
    /// `System.Object`
    Object,
    /// `System.TypedReference`
    TypedByRef,
    /// Unmanaged pointer
    Ptr(Box<TypeSignature>),
    /// Managed reference (`ref`, `out`, `in`)
    ByRef(Box<TypeSignature>),
    /// Value type given by a `TypeDef` or `TypeRef` token
    ValueType(Token),
    /// Reference type given by a `TypeDef` or `TypeRef` token
    Class(Token),
    /// Generic parameter of the enclosing type
    GenericParamType(u32),
    /// Generic parameter of the enclosing method
    GenericParamMethod(u32),
    /// Multi-dimensional array
    Array(SignatureArray),
    /// Single-dimensional zero-based array
    SzArray(Box<TypeSignature>),
    /// Instantiated generic type; the first element is `Class` or `ValueType`
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    /// Function pointer
    FnPtr(Box<SignatureMethod>),
    /// A type carrying a custom modifier
    Modified(CustomModifier, Box<TypeSignature>),
    /// Pinned local
    Pinned(Box<TypeSignature>),
}

/// A `modreq` / `modopt` custom modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CustomModifier {
    /// `modreq` if true, `modopt` otherwise
    pub required: bool,
    /// The modifier type
    pub modifier: Token,
}

/// Shape of a multi-dimensional array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureArray {
    /// Element type
    pub base: Box<TypeSignature>,
    /// Number of dimensions
    pub rank: u32,
    /// Declared sizes, leading dimensions first
    pub sizes: Vec<u32>,
    /// Declared lower bounds, leading dimensions first
    pub lower_bounds: Vec<i32>,
}

/// A method signature (`MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureMethod {
    /// Instance method
    pub has_this: bool,
    /// `this` is the first explicit parameter
    pub explicit_this: bool,
    /// Calling convention kind (`CALLING_CONVENTION::KIND_MASK` bits)
    pub calling_convention: u8,
    /// Number of generic parameters, 0 for non-generic methods
    pub generic_param_count: u32,
    /// Return type
    pub return_type: TypeSignature,
    /// Fixed parameters
    pub params: Vec<TypeSignature>,
    /// Parameters after the sentinel of a vararg call site
    pub varargs: Vec<TypeSignature>,
}

impl SignatureMethod {
    /// A non-generic default-convention signature.
    #[must_use]
    pub fn new(has_this: bool, return_type: TypeSignature, params: Vec<TypeSignature>) -> Self {
        SignatureMethod {
            has_this,
            explicit_this: false,
            calling_convention: CALLING_CONVENTION::DEFAULT,
            generic_param_count: 0,
            return_type,
            params,
            varargs: Vec::new(),
        }
    }
}

/// A field signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureField {
    /// The field type, including custom modifiers
    pub base: TypeSignature,
}

impl TypeSignature {
    /// Rebuilds the signature with every embedded type token passed through `map`.
    ///
    /// # Errors
    /// Propagates the first error returned by `map`.
    pub fn try_map_tokens<F>(&self, map: &mut F) -> Result<TypeSignature>
    where
        F: FnMut(Token) -> Result<Token>,
    {
        Ok(match self {
            TypeSignature::Ptr(base) => TypeSignature::Ptr(Box::new(base.try_map_tokens(map)?)),
            TypeSignature::ByRef(base) => {
                TypeSignature::ByRef(Box::new(base.try_map_tokens(map)?))
            }
            TypeSignature::ValueType(token) => TypeSignature::ValueType(map(*token)?),
            TypeSignature::Class(token) => TypeSignature::Class(map(*token)?),
            TypeSignature::Array(array) => TypeSignature::Array(SignatureArray {
                base: Box::new(array.base.try_map_tokens(map)?),
                rank: array.rank,
                sizes: array.sizes.clone(),
                lower_bounds: array.lower_bounds.clone(),
            }),
            TypeSignature::SzArray(base) => {
                TypeSignature::SzArray(Box::new(base.try_map_tokens(map)?))
            }
            TypeSignature::GenericInst(base, args) => TypeSignature::GenericInst(
                Box::new(base.try_map_tokens(map)?),
                args.iter()
                    .map(|arg| arg.try_map_tokens(map))
                    .collect::<Result<Vec<_>>>()?,
            ),
            TypeSignature::FnPtr(method) => {
                TypeSignature::FnPtr(Box::new(method.try_map_tokens(map)?))
            }
            TypeSignature::Modified(modifier, base) => TypeSignature::Modified(
                CustomModifier {
                    required: modifier.required,
                    modifier: map(modifier.modifier)?,
                },
                Box::new(base.try_map_tokens(map)?),
            ),
            TypeSignature::Pinned(base) => {
                TypeSignature::Pinned(Box::new(base.try_map_tokens(map)?))
            }
            other => other.clone(),
        })
    }

    /// Whether the type refers to a generic parameter anywhere inside it.
    #[must_use]
    pub fn has_generic_params(&self) -> bool {
        match self {
            TypeSignature::GenericParamType(_) | TypeSignature::GenericParamMethod(_) => true,
            TypeSignature::Ptr(base)
            | TypeSignature::ByRef(base)
            | TypeSignature::SzArray(base)
            | TypeSignature::Pinned(base)
            | TypeSignature::Modified(_, base) => base.has_generic_params(),
            TypeSignature::Array(array) => array.base.has_generic_params(),
            TypeSignature::GenericInst(base, args) => {
                base.has_generic_params() || args.iter().any(TypeSignature::has_generic_params)
            }
            TypeSignature::FnPtr(method) => method.has_generic_params(),
            _ => false,
        }
    }
}

impl SignatureMethod {
    /// Rebuilds the signature with every embedded type token passed through `map`.
    ///
    /// # Errors
    /// Propagates the first error returned by `map`.
    pub fn try_map_tokens<F>(&self, map: &mut F) -> Result<SignatureMethod>
    where
        F: FnMut(Token) -> Result<Token>,
    {
        Ok(SignatureMethod {
            has_this: self.has_this,
            explicit_this: self.explicit_this,
            calling_convention: self.calling_convention,
            generic_param_count: self.generic_param_count,
            return_type: self.return_type.try_map_tokens(map)?,
            params: self
                .params
                .iter()
                .map(|param| param.try_map_tokens(map))
                .collect::<Result<Vec<_>>>()?,
            varargs: self
                .varargs
                .iter()
                .map(|param| param.try_map_tokens(map))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// Whether the return type or any parameter refers to a generic parameter.
    #[must_use]
    pub fn has_generic_params(&self) -> bool {
        self.return_type.has_generic_params()
            || self.params.iter().any(TypeSignature::has_generic_params)
    }
}
