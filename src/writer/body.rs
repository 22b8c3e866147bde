//! IL method bodies: a small instruction emitter and the tiny/fat header encoding
//! (ECMA-335 II.25.4).

use bitflags::bitflags;

use crate::{metadata::token::Token, Result};

bitflags! {
    #[derive(PartialEq, Eq, Clone, Copy, Debug)]
    /// Method header flags
    pub struct MethodBodyFlags: u16 {
        /// Tiny header, code size in the upper six bits
        const TINY_FORMAT = 0x2;
        /// Fat header
        const FAT_FORMAT = 0x3;
        /// Extra data sections follow the code
        const MORE_SECTS = 0x8;
        /// Zero-initialize locals
        const INIT_LOCALS = 0x10;
    }
}

/// Largest code size a tiny header can describe
const TINY_MAX_CODE: usize = 0x3F;
/// Largest stack depth a tiny header implies
const TINY_MAX_STACK: u16 = 8;

/// A complete method body ready to be placed in the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// Maximum evaluation stack depth
    pub max_stack: u16,
    /// IL code
    pub code: Vec<u8>,
    /// Token of the local variable signature, 0 for none
    pub local_var_sig_token: u32,
    /// Zero-initialize locals
    pub init_locals: bool,
}

impl MethodBody {
    /// Encodes header and code; tiny when the body allows it, fat otherwise.
    ///
    /// # Errors
    /// Returns a malformed error if the code is too large for a fat header.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let is_tiny = self.code.len() <= TINY_MAX_CODE
            && self.max_stack <= TINY_MAX_STACK
            && self.local_var_sig_token == 0;

        if is_tiny {
            let mut out = Vec::with_capacity(self.code.len() + 1);
            out.push(((self.code.len() as u8) << 2) | MethodBodyFlags::TINY_FORMAT.bits() as u8);
            out.extend_from_slice(&self.code);
            return Ok(out);
        }

        let code_size = u32::try_from(self.code.len())
            .map_err(|_| malformed_error!("Method body of {} bytes is too large", self.code.len()))?;

        let mut flags = MethodBodyFlags::FAT_FORMAT;
        if self.init_locals {
            flags |= MethodBodyFlags::INIT_LOCALS;
        }
        // Header size in dwords sits in the upper nibble
        let first = flags.bits() | (3 << 12);

        let mut out = Vec::with_capacity(self.code.len() + 12);
        out.extend_from_slice(&first.to_le_bytes());
        out.extend_from_slice(&self.max_stack.to_le_bytes());
        out.extend_from_slice(&code_size.to_le_bytes());
        out.extend_from_slice(&self.local_var_sig_token.to_le_bytes());
        out.extend_from_slice(&self.code);
        Ok(out)
    }
}

/// Emits IL while tracking the evaluation stack depth.
///
/// # Examples
///
/// ```rust
/// use bephookgen::writer::body::IlBuilder;
///
/// let body = IlBuilder::new().ldarg(0).ldarg(1).pop().ret().finish();
/// assert_eq!(body.code, vec![0x02, 0x03, 0x26, 0x2A]);
/// assert_eq!(body.max_stack, 2);
/// ```
#[derive(Debug, Default)]
pub struct IlBuilder {
    code: Vec<u8>,
    depth: i32,
    max_depth: i32,
}

impl IlBuilder {
    /// Creates an empty emitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn op(&mut self, opcode: u8, pops: i32, pushes: i32) -> &mut Self {
        self.code.push(opcode);
        self.depth = (self.depth - pops).max(0) + pushes;
        self.max_depth = self.max_depth.max(self.depth);
        self
    }

    fn token(&mut self, token: Token) -> &mut Self {
        self.code.extend_from_slice(&token.value().to_le_bytes());
        self
    }

    /// `ldarg` in its shortest form.
    pub fn ldarg(&mut self, index: u16) -> &mut Self {
        match index {
            0..=3 => {
                self.op(0x02 + index as u8, 0, 1)
            }
            4..=255 => {
                self.op(0x0E, 0, 1);
                self.code.push(index as u8);
                self
            }
            _ => {
                self.code.push(0xFE);
                self.op(0x09, 0, 1);
                self.code.extend_from_slice(&index.to_le_bytes());
                self
            }
        }
    }

    /// `ldnull`
    pub fn ldnull(&mut self) -> &mut Self {
        self.op(0x14, 0, 1)
    }

    /// `ldc.i4` in its shortest form.
    pub fn ldc_i4(&mut self, value: i32) -> &mut Self {
        match value {
            -1..=8 => {
                self.op((0x16 + value) as u8, 0, 1)
            }
            -128..=127 => {
                self.op(0x1F, 0, 1);
                self.code.push(value as i8 as u8);
                self
            }
            _ => {
                self.op(0x20, 0, 1);
                self.code.extend_from_slice(&value.to_le_bytes());
                self
            }
        }
    }

    /// `ldstr` with a `#US` token.
    pub fn ldstr(&mut self, token: Token) -> &mut Self {
        self.op(0x72, 0, 1).token(token)
    }

    /// `ldtoken`
    pub fn ldtoken(&mut self, token: Token) -> &mut Self {
        self.op(0xD0, 0, 1).token(token)
    }

    /// `call`, consuming `pops` stack slots (arguments and `this`) and pushing `pushes`.
    pub fn call(&mut self, token: Token, pops: i32, pushes: i32) -> &mut Self {
        self.op(0x28, pops, pushes).token(token)
    }

    /// `pop`
    pub fn pop(&mut self) -> &mut Self {
        self.op(0x26, 1, 0)
    }

    /// `ret`
    pub fn ret(&mut self) -> &mut Self {
        let pops = i32::from(self.depth > 0);
        self.op(0x2A, pops, 0)
    }

    /// Finishes the body without locals.
    #[must_use]
    pub fn finish(&mut self) -> MethodBody {
        MethodBody {
            max_stack: self.max_depth.clamp(0, i32::from(u16::MAX)) as u16,
            code: std::mem::take(&mut self.code),
            local_var_sig_token: 0,
            init_locals: false,
        }
    }
}
