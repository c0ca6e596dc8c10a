//! Pointer-offset (POF) relocation tables.
//!
//! A relocation table lists the payload-relative position of every
//! non-null pointer in a sectioned stream. Positions are sorted and
//! delta-encoded in units of the pointer size:
//!
//! | delta (units)   | encoding                          |
//! |-----------------|-----------------------------------|
//! | `< 0x40`        | 1 byte, `0x40 \| d`                |
//! | `< 0x4000`      | 2 bytes big-endian, `0x8000 \| d`  |
//! | `< 0x4000_0000` | 4 bytes big-endian, `0xC000_0000 \| d` |
//!
//! The body is preceded by a u32 length (counting itself) and padded with
//! zeroes to a multiple of four. A zero byte ends the table.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::format::{SIG_POF0, SIG_POF1};
use crate::util::{align_up, Endianness, Error, PtrWidth, Result};

/// Decoded relocation table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelocationTable {
    pub ptr_width: PtrWidth,
    /// Payload-relative pointer positions, ascending.
    pub offsets: Vec<u64>,
}

impl RelocationTable {
    /// Build a table from unsorted positions.
    pub fn new(ptr_width: PtrWidth, mut offsets: Vec<u64>) -> Self {
        offsets.sort_unstable();
        offsets.dedup();
        Self { ptr_width, offsets }
    }

    /// Section signature for this table's pointer width.
    pub fn signature(&self) -> [u8; 4] {
        match self.ptr_width {
            PtrWidth::Bits32 => SIG_POF0,
            PtrWidth::Bits64 => SIG_POF1,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Encode the table body (length prefix included).
    pub fn encode(&self, endianness: Endianness) -> Result<Vec<u8>> {
        let shift = self.ptr_width.shift();
        let unit = 1u64 << shift;
        let mut out = vec![0u8; 4];
        let mut previous = 0u64;

        for &offset in &self.offsets {
            let delta = offset - previous;
            if delta % unit != 0 {
                return Err(Error::format(format!(
                    "pointer at {:#x} is not aligned to {} bytes",
                    offset, unit
                )));
            }
            let d = delta >> shift;
            if d < 0x40 {
                out.push(0x40 | d as u8);
            } else if d < 0x4000 {
                out.extend_from_slice(&(0x8000 | d as u16).to_be_bytes());
            } else if d < 0x4000_0000 {
                out.extend_from_slice(&(0xC000_0000 | d as u32).to_be_bytes());
            } else {
                return Err(Error::InsufficientSpace(format!(
                    "relocation delta {:#x} exceeds the table encoding",
                    delta
                )));
            }
            previous = offset;
        }

        let len = align_up(out.len() as i64, 4) as usize;
        out.resize(len, 0);
        match endianness {
            Endianness::Little => LittleEndian::write_u32(&mut out[0..4], len as u32),
            Endianness::Big => BigEndian::write_u32(&mut out[0..4], len as u32),
        }
        Ok(out)
    }

    /// Decode a table body produced by [`RelocationTable::encode`].
    pub fn decode(ptr_width: PtrWidth, endianness: Endianness, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::count("relocation table", bytes.len() as u64));
        }
        let declared = match endianness {
            Endianness::Little => LittleEndian::read_u32(&bytes[0..4]),
            Endianness::Big => BigEndian::read_u32(&bytes[0..4]),
        } as usize;
        if declared < 4 || declared > bytes.len() {
            return Err(Error::count("relocation table", declared as u64));
        }

        let shift = ptr_width.shift();
        let body = &bytes[4..declared];
        let mut offsets = Vec::new();
        let mut current = 0u64;
        let mut i = 0;
        while i < body.len() {
            let tag = body[i] & 0xC0;
            let (delta, width) = match tag {
                0x00 => break,
                0x40 => ((body[i] & 0x3F) as u64, 1),
                0x80 => {
                    if i + 2 > body.len() {
                        return Err(Error::format("truncated relocation entry"));
                    }
                    ((BigEndian::read_u16(&body[i..]) & 0x3FFF) as u64, 2)
                }
                _ => {
                    if i + 4 > body.len() {
                        return Err(Error::format("truncated relocation entry"));
                    }
                    ((BigEndian::read_u32(&body[i..]) & 0x3FFF_FFFF) as u64, 4)
                }
            };
            current += delta << shift;
            offsets.push(current);
            i += width;
        }

        Ok(Self { ptr_width, offsets })
    }
}
