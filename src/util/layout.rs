//! Byte layout parameters: endianness and pointer width.

use std::fmt;

use serde::Serialize;

/// Byte order of multi-byte scalars.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    /// Native byte order of the host.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Little => f.write_str("little-endian"),
            Self::Big => f.write_str("big-endian"),
        }
    }
}

/// On-disk pointer width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum PtrWidth {
    #[default]
    Bits32,
    Bits64,
}

impl PtrWidth {
    /// Size of a pointer in bytes.
    #[inline]
    pub const fn bytes(self) -> i64 {
        match self {
            Self::Bits32 => 4,
            Self::Bits64 => 8,
        }
    }

    /// log2 of the pointer size; relocation deltas are stored in these units.
    #[inline]
    pub const fn shift(self) -> u32 {
        match self {
            Self::Bits32 => 2,
            Self::Bits64 => 3,
        }
    }
}

impl fmt::Display for PtrWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bits32 => f.write_str("32-bit"),
            Self::Bits64 => f.write_str("64-bit"),
        }
    }
}
