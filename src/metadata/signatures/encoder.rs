use crate::{
    metadata::{
        signatures::{
            SignatureField, SignatureMethod, TypeSignature, CALLING_CONVENTION, ELEMENT_TYPE,
        },
        tables::TableId,
        token::Token,
    },
    Result,
};

/// Appends an ECMA-335 II.23.2 compressed unsigned integer.
///
/// # Errors
/// Returns a malformed error for values above `0x1FFF_FFFF`.
pub fn write_compressed_uint(value: u32, out: &mut Vec<u8>) -> Result<()> {
    if value <= 0x7F {
        out.push(value as u8);
    } else if value <= 0x3FFF {
        out.push(((value >> 8) as u8) | 0x80);
        out.push(value as u8);
    } else if value <= 0x1FFF_FFFF {
        out.push(((value >> 24) as u8) | 0xC0);
        out.push((value >> 16) as u8);
        out.push((value >> 8) as u8);
        out.push(value as u8);
    } else {
        return Err(malformed_error!(
            "Value too large for compressed encoding - {}",
            value
        ));
    }

    Ok(())
}

/// Appends an ECMA-335 II.23.2 compressed signed integer.
///
/// # Errors
/// Returns a malformed error for values outside of the 29-bit signed range.
pub fn write_compressed_int(value: i32, out: &mut Vec<u8>) -> Result<()> {
    let (bits, width) = if (-0x40..0x40).contains(&value) {
        (7, 1)
    } else if (-0x2000..0x2000).contains(&value) {
        (14, 2)
    } else if (-0x1000_0000..0x1000_0000).contains(&value) {
        (29, 4)
    } else {
        return Err(malformed_error!(
            "Value too large for compressed encoding - {}",
            value
        ));
    };

    let mask = (1_u32 << bits) - 1;
    #[allow(clippy::cast_sign_loss)]
    let rotated = (((value as u32) << 1) & mask) | u32::from(value < 0);

    match width {
        1 => out.push(rotated as u8),
        2 => {
            out.push(((rotated >> 8) as u8) | 0x80);
            out.push(rotated as u8);
        }
        _ => {
            out.push(((rotated >> 24) as u8) | 0xC0);
            out.push((rotated >> 16) as u8);
            out.push((rotated >> 8) as u8);
            out.push(rotated as u8);
        }
    }

    Ok(())
}

/// Appends a `TypeDefOrRefOrSpecEncoded` token.
///
/// # Errors
/// Returns a malformed error if the token does not point into `TypeDef`, `TypeRef` or `TypeSpec`.
pub fn write_compressed_token(token: Token, out: &mut Vec<u8>) -> Result<()> {
    let tag = match TableId::from_u8(token.table()) {
        Some(TableId::TypeDef) => 0,
        Some(TableId::TypeRef) => 1,
        Some(TableId::TypeSpec) => 2,
        _ => {
            return Err(malformed_error!(
                "Token {} cannot be encoded in a signature",
                token
            ))
        }
    };

    write_compressed_uint((token.row() << 2) | tag, out)
}

fn primitive_element(signature: &TypeSignature) -> Option<u8> {
    match signature {
        TypeSignature::Void => Some(ELEMENT_TYPE::VOID),
        TypeSignature::Boolean => Some(ELEMENT_TYPE::BOOLEAN),
        TypeSignature::Char => Some(ELEMENT_TYPE::CHAR),
        TypeSignature::I1 => Some(ELEMENT_TYPE::I1),
        TypeSignature::U1 => Some(ELEMENT_TYPE::U1),
        TypeSignature::I2 => Some(ELEMENT_TYPE::I2),
        TypeSignature::U2 => Some(ELEMENT_TYPE::U2),
        TypeSignature::I4 => Some(ELEMENT_TYPE::I4),
        TypeSignature::U4 => Some(ELEMENT_TYPE::U4),
        TypeSignature::I8 => Some(ELEMENT_TYPE::I8),
        TypeSignature::U8 => Some(ELEMENT_TYPE::U8),
        TypeSignature::R4 => Some(ELEMENT_TYPE::R4),
        TypeSignature::R8 => Some(ELEMENT_TYPE::R8),
        TypeSignature::String => Some(ELEMENT_TYPE::STRING),
        TypeSignature::I => Some(ELEMENT_TYPE::I),
        TypeSignature::U => Some(ELEMENT_TYPE::U),
        TypeSignature::Object => Some(ELEMENT_TYPE::OBJECT),
        TypeSignature::TypedByRef => Some(ELEMENT_TYPE::TYPEDBYREF),
        _ => None,
    }
}

/// Appends the encoding of `signature`.
///
/// # Errors
/// Returns an error if a token or a size cannot be encoded.
pub fn encode_type(signature: &TypeSignature, out: &mut Vec<u8>) -> Result<()> {
    match signature {
        TypeSignature::Ptr(base) => {
            out.push(ELEMENT_TYPE::PTR);
            encode_type(base, out)?;
        }
        TypeSignature::ByRef(base) => {
            out.push(ELEMENT_TYPE::BYREF);
            encode_type(base, out)?;
        }
        TypeSignature::ValueType(token) => {
            out.push(ELEMENT_TYPE::VALUETYPE);
            write_compressed_token(*token, out)?;
        }
        TypeSignature::Class(token) => {
            out.push(ELEMENT_TYPE::CLASS);
            write_compressed_token(*token, out)?;
        }
        TypeSignature::GenericParamType(number) => {
            out.push(ELEMENT_TYPE::VAR);
            write_compressed_uint(*number, out)?;
        }
        TypeSignature::GenericParamMethod(number) => {
            out.push(ELEMENT_TYPE::MVAR);
            write_compressed_uint(*number, out)?;
        }
        TypeSignature::Array(array) => {
            out.push(ELEMENT_TYPE::ARRAY);
            encode_type(&array.base, out)?;
            write_compressed_uint(array.rank, out)?;
            write_compressed_uint(array.sizes.len() as u32, out)?;
            for size in &array.sizes {
                write_compressed_uint(*size, out)?;
            }
            write_compressed_uint(array.lower_bounds.len() as u32, out)?;
            for bound in &array.lower_bounds {
                write_compressed_int(*bound, out)?;
            }
        }
        TypeSignature::SzArray(base) => {
            out.push(ELEMENT_TYPE::SZARRAY);
            encode_type(base, out)?;
        }
        TypeSignature::GenericInst(base, args) => {
            out.push(ELEMENT_TYPE::GENERICINST);
            encode_type(base, out)?;
            write_compressed_uint(args.len() as u32, out)?;
            for arg in args {
                encode_type(arg, out)?;
            }
        }
        TypeSignature::FnPtr(method) => {
            out.push(ELEMENT_TYPE::FNPTR);
            encode_method_into(method, out)?;
        }
        TypeSignature::Modified(modifier, base) => {
            out.push(if modifier.required {
                ELEMENT_TYPE::CMOD_REQD
            } else {
                ELEMENT_TYPE::CMOD_OPT
            });
            write_compressed_token(modifier.modifier, out)?;
            encode_type(base, out)?;
        }
        TypeSignature::Pinned(base) => {
            out.push(ELEMENT_TYPE::PINNED);
            encode_type(base, out)?;
        }
        primitive => match primitive_element(primitive) {
            Some(element) => out.push(element),
            None => {
                return Err(malformed_error!(
                    "Type cannot be encoded - {:?}",
                    primitive
                ))
            }
        },
    }

    Ok(())
}

fn encode_method_into(method: &SignatureMethod, out: &mut Vec<u8>) -> Result<()> {
    let mut convention = method.calling_convention & CALLING_CONVENTION::KIND_MASK;
    if method.has_this {
        convention |= CALLING_CONVENTION::HASTHIS;
    }
    if method.explicit_this {
        convention |= CALLING_CONVENTION::EXPLICITTHIS;
    }
    if method.generic_param_count > 0 {
        convention |= CALLING_CONVENTION::GENERIC;
    }
    out.push(convention);

    if method.generic_param_count > 0 {
        write_compressed_uint(method.generic_param_count, out)?;
    }

    write_compressed_uint((method.params.len() + method.varargs.len()) as u32, out)?;
    encode_type(&method.return_type, out)?;
    for param in &method.params {
        encode_type(param, out)?;
    }
    if !method.varargs.is_empty() {
        out.push(ELEMENT_TYPE::SENTINEL);
        for param in &method.varargs {
            encode_type(param, out)?;
        }
    }

    Ok(())
}

/// Encodes a method signature blob.
///
/// # Errors
/// Returns an error if a token or a count cannot be encoded.
pub fn encode_method_signature(method: &SignatureMethod) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(8);
    encode_method_into(method, &mut out)?;
    Ok(out)
}

/// Encodes a field signature blob.
///
/// # Errors
/// Returns an error if a token cannot be encoded.
pub fn encode_field_signature(field: &SignatureField) -> Result<Vec<u8>> {
    let mut out = vec![CALLING_CONVENTION::FIELD];
    encode_type(&field.base, &mut out)?;
    Ok(out)
}

/// Encodes a `MethodSpec` instantiation blob.
///
/// # Errors
/// Returns an error if a token cannot be encoded.
pub fn encode_method_spec_signature(args: &[TypeSignature]) -> Result<Vec<u8>> {
    let mut out = vec![CALLING_CONVENTION::GENERICINST];
    write_compressed_uint(args.len() as u32, &mut out)?;
    for arg in args {
        encode_type(arg, &mut out)?;
    }
    Ok(out)
}
