//! Container format constants.
//!
//! ## Sectioned ("modern") stream
//!
//! ```text
//! +----------------------+  0x00
//! | AETC section header  |  32 bytes
//! +----------------------+  0x20  <- base offset for every payload pointer
//! | scene pointer array  |  null terminated
//! | pooled records       |
//! | pooled strings       |
//! +----------------------+  aligned to 16
//! | POF0 / POF1 header   |  depth 1
//! | relocation table     |
//! +----------------------+
//! | EOFC header          |  size 0
//! +----------------------+
//! ```
//!
//! ## Legacy (flat) stream
//!
//! No header. The scene pointer array sits at offset zero and every
//! pointer is 32-bit, little-endian and absolute.

use crate::util::Endianness;

/// Container section holding the scene graph payload.
pub const SIG_AETC: [u8; 4] = *b"AETC";

/// Relocation table for 32-bit pointers.
pub const SIG_POF0: [u8; 4] = *b"POF0";

/// Relocation table for 64-bit pointers.
pub const SIG_POF1: [u8; 4] = *b"POF1";

/// End-of-container marker.
pub const SIG_EOFC: [u8; 4] = *b"EOFC";

/// Size of a section header in bytes.
pub const SECTION_HEADER_SIZE: u32 = 0x20;

/// Larger header variant some writers emit; accepted on read.
pub const SECTION_HEADER_SIZE_EXTENDED: u32 = 0x40;

/// Endianness marker for little-endian sections.
pub const ENDIANNESS_LITTLE: u32 = 0x1000_0000;

/// Endianness marker for big-endian sections.
pub const ENDIANNESS_BIG: u32 = 0x1800_0000;

/// Alignment applied to section boundaries and pooled records in the
/// sectioned layout.
pub const SECTION_ALIGNMENT: i64 = 16;

/// Alignment applied to pooled records in the legacy layout.
pub const LEGACY_ALIGNMENT: i64 = 4;

/// Marker value stored in a section header for the given byte order.
pub const fn endianness_marker(endianness: Endianness) -> u32 {
    match endianness {
        Endianness::Little => ENDIANNESS_LITTLE,
        Endianness::Big => ENDIANNESS_BIG,
    }
}
