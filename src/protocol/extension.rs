//! Type-tagged Begin extension written by protocol-changing adapters.
//!
//! When an adapter changes protocol, it replaces the Begin extension with
//! this structure: a type tag naming the routed protocol, the resolved
//! composite api id, the resolved operation id, and the original extension
//! bytes nested verbatim so a downstream stage can recover them.
//!
//! Layout (packed, Little Endian): type_id u32 @0; api_id u64 @4;
//! operation length u16 @12 + UTF-8 bytes; nested original extension to end.

use crate::error::{GatewireError, Result};

use super::wire_format::{get_u32, get_u64, put_u32, put_u64};

/// Fixed-size prefix of a rewritten Begin extension.
pub const BEGIN_EX_FIXED_SIZE: usize = 14;

/// Rewritten Begin extension carrying routed-protocol context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginEx<'a> {
    /// Type tag of the routed protocol binding.
    pub type_id: u32,
    /// Resolved composite api identifier.
    pub api_id: u64,
    /// Resolved operation identifier.
    pub operation_id: &'a str,
    /// Original origin-side extension bytes, nested unmodified.
    pub origin_extension: &'a [u8],
}

impl<'a> BeginEx<'a> {
    /// Total encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        BEGIN_EX_FIXED_SIZE + self.operation_id.len() + self.origin_extension.len()
    }

    /// Encode into `buf` starting at `offset`; returns the bytes written.
    ///
    /// # Panics
    ///
    /// Panics if `buf[offset..]` is shorter than [`BeginEx::encoded_len`] or
    /// the operation id exceeds `u16::MAX` bytes.
    pub fn encode(&self, buf: &mut [u8], offset: usize) -> usize {
        let len = self.encoded_len();
        assert!(buf.len() >= offset + len, "extension scratch too small");
        assert!(self.operation_id.len() <= u16::MAX as usize);

        put_u32(buf, offset, self.type_id);
        put_u64(buf, offset + 4, self.api_id);
        buf[offset + 12..offset + 14]
            .copy_from_slice(&(self.operation_id.len() as u16).to_le_bytes());
        let at = offset + BEGIN_EX_FIXED_SIZE;
        buf[at..at + self.operation_id.len()].copy_from_slice(self.operation_id.as_bytes());
        let at = at + self.operation_id.len();
        buf[at..at + self.origin_extension.len()].copy_from_slice(self.origin_extension);

        len
    }

    /// Decode a rewritten extension from `bytes`.
    pub fn decode(bytes: &'a [u8]) -> Result<BeginEx<'a>> {
        if bytes.len() < BEGIN_EX_FIXED_SIZE {
            return Err(GatewireError::MalformedFrame(format!(
                "begin extension needs {BEGIN_EX_FIXED_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let op_len = u16::from_le_bytes(bytes[12..14].try_into().unwrap()) as usize;
        let op_end = BEGIN_EX_FIXED_SIZE + op_len;
        if bytes.len() < op_end {
            return Err(GatewireError::MalformedFrame(format!(
                "begin extension operation id of {op_len} bytes exceeds {} remaining",
                bytes.len() - BEGIN_EX_FIXED_SIZE
            )));
        }

        let operation_id = std::str::from_utf8(&bytes[BEGIN_EX_FIXED_SIZE..op_end])
            .map_err(|_| {
                GatewireError::MalformedFrame("begin extension operation id not UTF-8".to_string())
            })?;

        Ok(BeginEx {
            type_id: get_u32(bytes, 0),
            api_id: get_u64(bytes, 4),
            operation_id,
            origin_extension: &bytes[op_end..],
        })
    }
}
