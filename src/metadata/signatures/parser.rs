use crate::{
    file::parser::Parser,
    metadata::signatures::{
        CustomModifier, SignatureArray, SignatureField, SignatureMethod, TypeSignature,
        CALLING_CONVENTION, ELEMENT_TYPE,
    },
    Result,
};

/// Nesting limit for recursive type signatures
const MAX_RECURSION_DEPTH: usize = 64;

/// Decoder for signature blobs (ECMA-335 II.23.2).
///
/// # Examples
///
/// ```rust
/// use bephookgen::metadata::signatures::{SignatureParser, TypeSignature};
///
/// // instance void (int32, string)
/// let blob = [0x20, 0x02, 0x01, 0x08, 0x0E];
/// let method = SignatureParser::new(&blob).parse_method_signature()?;
///
/// assert!(method.has_this);
/// assert_eq!(method.return_type, TypeSignature::Void);
/// assert_eq!(method.params, vec![TypeSignature::I4, TypeSignature::String]);
/// # Ok::<(), bephookgen::Error>(())
/// ```
pub struct SignatureParser<'a> {
    parser: Parser<'a>,
    depth: usize,
}

impl<'a> SignatureParser<'a> {
    /// Creates a decoder over a signature blob (without the heap length prefix).
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        SignatureParser {
            parser: Parser::new(data),
            depth: 0,
        }
    }

    /// Decodes a single type.
    ///
    /// # Errors
    /// Returns an error on truncated input, unknown element types or excessive nesting.
    pub fn parse_type(&mut self) -> Result<TypeSignature> {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            return Err(malformed_error!(
                "Signature nesting exceeds {} levels",
                MAX_RECURSION_DEPTH
            ));
        }

        let element = self.parser.read_le::<u8>()?;
        let parsed = match element {
            ELEMENT_TYPE::VOID => TypeSignature::Void,
            ELEMENT_TYPE::BOOLEAN => TypeSignature::Boolean,
            ELEMENT_TYPE::CHAR => TypeSignature::Char,
            ELEMENT_TYPE::I1 => TypeSignature::I1,
            ELEMENT_TYPE::U1 => TypeSignature::U1,
            ELEMENT_TYPE::I2 => TypeSignature::I2,
            ELEMENT_TYPE::U2 => TypeSignature::U2,
            ELEMENT_TYPE::I4 => TypeSignature::I4,
            ELEMENT_TYPE::U4 => TypeSignature::U4,
            ELEMENT_TYPE::I8 => TypeSignature::I8,
            ELEMENT_TYPE::U8 => TypeSignature::U8,
            ELEMENT_TYPE::R4 => TypeSignature::R4,
            ELEMENT_TYPE::R8 => TypeSignature::R8,
            ELEMENT_TYPE::STRING => TypeSignature::String,
            ELEMENT_TYPE::I => TypeSignature::I,
            ELEMENT_TYPE::U => TypeSignature::U,
            ELEMENT_TYPE::OBJECT => TypeSignature::Object,
            ELEMENT_TYPE::TYPEDBYREF => TypeSignature::TypedByRef,
            ELEMENT_TYPE::PTR => TypeSignature::Ptr(Box::new(self.parse_type()?)),
            ELEMENT_TYPE::BYREF => TypeSignature::ByRef(Box::new(self.parse_type()?)),
            ELEMENT_TYPE::VALUETYPE => {
                TypeSignature::ValueType(self.parser.read_compressed_token()?)
            }
            ELEMENT_TYPE::CLASS => TypeSignature::Class(self.parser.read_compressed_token()?),
            ELEMENT_TYPE::VAR => TypeSignature::GenericParamType(self.parser.read_compressed_uint()?),
            ELEMENT_TYPE::MVAR => {
                TypeSignature::GenericParamMethod(self.parser.read_compressed_uint()?)
            }
            ELEMENT_TYPE::ARRAY => {
                let base = self.parse_type()?;
                let rank = self.parser.read_compressed_uint()?;

                let num_sizes = self.parser.read_compressed_uint()?;
                let mut sizes = Vec::with_capacity(num_sizes.min(32) as usize);
                for _ in 0..num_sizes {
                    sizes.push(self.parser.read_compressed_uint()?);
                }

                let num_lo_bounds = self.parser.read_compressed_uint()?;
                let mut lower_bounds = Vec::with_capacity(num_lo_bounds.min(32) as usize);
                for _ in 0..num_lo_bounds {
                    lower_bounds.push(self.parser.read_compressed_int()?);
                }

                TypeSignature::Array(SignatureArray {
                    base: Box::new(base),
                    rank,
                    sizes,
                    lower_bounds,
                })
            }
            ELEMENT_TYPE::SZARRAY => TypeSignature::SzArray(Box::new(self.parse_type()?)),
            ELEMENT_TYPE::GENERICINST => {
                let base = self.parse_type()?;
                if !matches!(
                    base,
                    TypeSignature::Class(_) | TypeSignature::ValueType(_)
                ) {
                    return Err(malformed_error!(
                        "GENERICINST base must be a class or value type - {:?}",
                        base
                    ));
                }

                let arg_count = self.parser.read_compressed_uint()?;
                let mut args = Vec::with_capacity(arg_count.min(32) as usize);
                for _ in 0..arg_count {
                    args.push(self.parse_type()?);
                }

                TypeSignature::GenericInst(Box::new(base), args)
            }
            ELEMENT_TYPE::FNPTR => TypeSignature::FnPtr(Box::new(self.parse_method_signature()?)),
            ELEMENT_TYPE::CMOD_REQD | ELEMENT_TYPE::CMOD_OPT => {
                let modifier = CustomModifier {
                    required: element == ELEMENT_TYPE::CMOD_REQD,
                    modifier: self.parser.read_compressed_token()?,
                };
                TypeSignature::Modified(modifier, Box::new(self.parse_type()?))
            }
            ELEMENT_TYPE::PINNED => TypeSignature::Pinned(Box::new(self.parse_type()?)),
            _ => {
                return Err(malformed_error!(
                    "Unsupported element type in signature - 0x{:02X}",
                    element
                ))
            }
        };

        self.depth -= 1;
        Ok(parsed)
    }

    /// Decodes a method signature.
    ///
    /// # Errors
    /// Returns an error on truncated input or invalid types.
    pub fn parse_method_signature(&mut self) -> Result<SignatureMethod> {
        let convention = self.parser.read_le::<u8>()?;
        let kind = convention & CALLING_CONVENTION::KIND_MASK;
        if kind == CALLING_CONVENTION::FIELD || kind == CALLING_CONVENTION::GENERICINST {
            return Err(malformed_error!(
                "Not a method signature - calling convention 0x{:02X}",
                convention
            ));
        }

        let generic_param_count = if convention & CALLING_CONVENTION::GENERIC != 0 {
            self.parser.read_compressed_uint()?
        } else {
            0
        };

        let param_count = self.parser.read_compressed_uint()?;
        let return_type = self.parse_type()?;

        let mut params = Vec::with_capacity(param_count.min(64) as usize);
        let mut varargs = Vec::new();
        let mut after_sentinel = false;
        for _ in 0..param_count {
            if self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                self.parser.read_le::<u8>()?;
                after_sentinel = true;
            }

            let param = self.parse_type()?;
            if after_sentinel {
                varargs.push(param);
            } else {
                params.push(param);
            }
        }

        Ok(SignatureMethod {
            has_this: convention & CALLING_CONVENTION::HASTHIS != 0,
            explicit_this: convention & CALLING_CONVENTION::EXPLICITTHIS != 0,
            calling_convention: kind,
            generic_param_count,
            return_type,
            params,
            varargs,
        })
    }

    /// Decodes a field signature.
    ///
    /// # Errors
    /// Returns an error if the blob is not a field signature or is truncated.
    pub fn parse_field_signature(&mut self) -> Result<SignatureField> {
        let head = self.parser.read_le::<u8>()?;
        if head != CALLING_CONVENTION::FIELD {
            return Err(malformed_error!(
                "Not a field signature - leading byte 0x{:02X}",
                head
            ));
        }

        Ok(SignatureField {
            base: self.parse_type()?,
        })
    }

    /// Decodes a `MethodSpec` instantiation blob into its type arguments.
    ///
    /// # Errors
    /// Returns an error if the blob is not an instantiation or is truncated.
    pub fn parse_method_spec_signature(&mut self) -> Result<Vec<TypeSignature>> {
        let head = self.parser.read_le::<u8>()?;
        if head != CALLING_CONVENTION::GENERICINST {
            return Err(malformed_error!(
                "Not a method instantiation - leading byte 0x{:02X}",
                head
            ));
        }

        let count = self.parser.read_compressed_uint()?;
        let mut args = Vec::with_capacity(count.min(32) as usize);
        for _ in 0..count {
            args.push(self.parse_type()?);
        }

        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::Token;

    #[test]
    fn static_method() {
        // static bool (class Player, int32&, float32[])
        let blob = [0x00, 0x03, 0x02, 0x12, 0x09, 0x10, 0x08, 0x1D, 0x0C];
        let method = SignatureParser::new(&blob).parse_method_signature().unwrap();

        assert!(!method.has_this);
        assert_eq!(method.return_type, TypeSignature::Boolean);
        assert_eq!(
            method.params,
            vec![
                TypeSignature::Class(Token::new(0x0100_0002)),
                TypeSignature::ByRef(Box::new(TypeSignature::I4)),
                TypeSignature::SzArray(Box::new(TypeSignature::R4)),
            ]
        );
    }

    #[test]
    fn generic_method() {
        // instance !!0 <1> (class List`1<!!0>)
        let blob = [0x30, 0x01, 0x01, 0x1E, 0x00, 0x15, 0x12, 0x05, 0x01, 0x1E, 0x00];
        let method = SignatureParser::new(&blob).parse_method_signature().unwrap();

        assert_eq!(method.generic_param_count, 1);
        assert_eq!(method.return_type, TypeSignature::GenericParamMethod(0));
        assert!(method.has_generic_params());
    }

    #[test]
    fn field_and_modifiers() {
        // field int32 modreq(IsVolatile)
        let blob = [0x06, 0x1F, 0x09, 0x08];
        let field = SignatureParser::new(&blob).parse_field_signature().unwrap();

        assert_eq!(
            field.base,
            TypeSignature::Modified(
                CustomModifier {
                    required: true,
                    modifier: Token::new(0x0100_0002),
                },
                Box::new(TypeSignature::I4)
            )
        );
    }

    #[test]
    fn method_spec() {
        let blob = [0x0A, 0x02, 0x0E, 0x12, 0x0D];
        let args = SignatureParser::new(&blob)
            .parse_method_spec_signature()
            .unwrap();

        assert_eq!(
            args,
            vec![TypeSignature::String, TypeSignature::Class(Token::new(0x0100_0003))]
        );
    }

    #[test]
    fn invalid() {
        assert!(SignatureParser::new(&[0x00, 0x01, 0x01])
            .parse_method_signature()
            .is_err());
        assert!(SignatureParser::new(&[0x00, 0x00, 0x50])
            .parse_method_signature()
            .is_err());
        assert!(SignatureParser::new(&[0x06, 0x08])
            .parse_method_signature()
            .is_err());
    }
}
