//! Signature blobs (ECMA-335 II.23.2).
//!
//! [`SignatureParser`] decodes method, field and method-instantiation blobs into a
//! [`TypeSignature`] tree; the `encode_*` functions write such trees back. Token remapping over a
//! tree ([`TypeSignature::try_map_tokens`]) is what lets the hook generator carry signatures from
//! one module into another.

mod encoder;
mod parser;
mod types;

pub use encoder::{
    encode_field_signature, encode_method_signature, encode_method_spec_signature, encode_type,
    write_compressed_int, write_compressed_token, write_compressed_uint,
};
pub use parser::SignatureParser;
pub use types::*;
