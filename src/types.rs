//! Shared binary types: [`ByteOrder`] and [`EncodingFormat`].

use std::fmt;

use crate::{DataFileError, Result};

/// Byte order for multi-byte binary fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// Decode a signed integer of 2, 4 or 8 bytes.
    ///
    /// 8-byte values are narrowed to `i64`; callers that need a sample value
    /// truncate further.
    pub fn read_int(self, bytes: &[u8]) -> Result<i64> {
        let value = match (bytes.len(), self) {
            (2, ByteOrder::Big) => i16::from_be_bytes([bytes[0], bytes[1]]) as i64,
            (2, ByteOrder::Little) => i16::from_le_bytes([bytes[0], bytes[1]]) as i64,
            (4, ByteOrder::Big) => {
                i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64
            }
            (4, ByteOrder::Little) => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64
            }
            (8, order) => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                match order {
                    ByteOrder::Big => i64::from_be_bytes(buf),
                    ByteOrder::Little => i64::from_le_bytes(buf),
                }
            }
            (n, _) => {
                return Err(DataFileError::InvalidHeader(format!(
                    "unsupported integer width {n}"
                )));
            }
        };
        Ok(value)
    }

    /// Encode a 32-bit signed integer.
    pub fn i32_bytes(self, value: i32) -> [u8; 4] {
        match self {
            ByteOrder::Big => value.to_be_bytes(),
            ByteOrder::Little => value.to_le_bytes(),
        }
    }

    /// Decode a 32-bit IEEE float from the first four bytes.
    pub fn read_f32(self, bytes: &[u8]) -> f32 {
        let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            ByteOrder::Big => f32::from_be_bytes(b),
            ByteOrder::Little => f32::from_le_bytes(b),
        }
    }

    /// Encode a 32-bit IEEE float.
    pub fn f32_bytes(self, value: f32) -> [u8; 4] {
        match self {
            ByteOrder::Big => value.to_be_bytes(),
            ByteOrder::Little => value.to_le_bytes(),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Big => write!(f, "big-endian"),
            Self::Little => write!(f, "little-endian"),
        }
    }
}

/// Encoding format for sample data in a miniSEED data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFormat {
    /// 16-bit signed integer (code 1).
    Int16,
    /// 32-bit signed integer (code 3).
    Int32,
    /// 32-bit IEEE float (code 4).
    Float32,
    /// 64-bit IEEE double (code 5).
    Float64,
    /// Steim-1 compressed integers (code 10).
    Steim1,
    /// Steim-2 compressed integers (code 11).
    Steim2,
}

impl EncodingFormat {
    /// Convert a raw encoding code (from Blockette 1000) to an `EncodingFormat`.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::Int16),
            3 => Ok(Self::Int32),
            4 => Ok(Self::Float32),
            5 => Ok(Self::Float64),
            10 => Ok(Self::Steim1),
            11 => Ok(Self::Steim2),
            _ => Err(DataFileError::UnsupportedEncoding(code)),
        }
    }

    /// Convert to the raw encoding code for Blockette 1000.
    pub fn to_code(self) -> u8 {
        match self {
            Self::Int16 => 1,
            Self::Int32 => 3,
            Self::Float32 => 4,
            Self::Float64 => 5,
            Self::Steim1 => 10,
            Self::Steim2 => 11,
        }
    }

    /// Steim payloads must start on a 64-byte frame boundary.
    pub fn is_steim(self) -> bool {
        matches!(self, Self::Steim1 | Self::Steim2)
    }
}

impl fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int16 => write!(f, "INT16"),
            Self::Int32 => write!(f, "INT32"),
            Self::Float32 => write!(f, "FLOAT32"),
            Self::Float64 => write!(f, "FLOAT64"),
            Self::Steim1 => write!(f, "Steim1"),
            Self::Steim2 => write!(f, "Steim2"),
        }
    }
}
