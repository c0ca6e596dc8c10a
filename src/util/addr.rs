//! File address primitives.
//!
//! Every on-disk pointer is a byte offset, either from the start of the
//! stream or from the active base offset of a sectioned payload.

use std::fmt;
use std::ops::{Add, Sub};

use serde::Serialize;

/// Signed byte offset into a stream. Zero is reserved as the null pointer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FileAddr(i64);

impl FileAddr {
    /// The "absent" sentinel.
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn from_u64(value: u64) -> Self {
        Self(value as i64)
    }

    #[inline]
    pub const fn get(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Absolute position of this offset relative to `base`.
    #[inline]
    pub const fn absolute(self, base: FileAddr) -> FileAddr {
        Self(base.0 + self.0)
    }

    /// Offset of this absolute position when measured from `base`.
    #[inline]
    pub const fn relative_to(self, base: FileAddr) -> FileAddr {
        Self(self.0 - base.0)
    }

    /// Position as a seekable stream index, if non-negative.
    #[inline]
    pub fn as_u64(self) -> Option<u64> {
        u64::try_from(self.0).ok()
    }

    /// Round up to a multiple of `align` (a power of two).
    #[inline]
    pub const fn align_up(self, align: i64) -> FileAddr {
        Self(align_up(self.0, align))
    }
}

impl Add<i64> for FileAddr {
    type Output = FileAddr;

    fn add(self, rhs: i64) -> FileAddr {
        FileAddr(self.0 + rhs)
    }
}

impl Sub for FileAddr {
    type Output = i64;

    fn sub(self, rhs: FileAddr) -> i64 {
        self.0 - rhs.0
    }
}

impl From<u64> for FileAddr {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl fmt::Display for FileAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-{:#x}", self.0.unsigned_abs())
        } else {
            write!(f, "{:#x}", self.0)
        }
    }
}

/// Round `value` up to a multiple of `align` (a power of two).
#[inline]
pub const fn align_up(value: i64, align: i64) -> i64 {
    (value + align - 1) & !(align - 1)
}
