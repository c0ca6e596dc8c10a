//! Self-identifying section headers and the pointer-width scan.

use std::io::{Read, Seek};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::{debug, trace};

use super::format::*;
use super::Reader;
use crate::util::{Endianness, FileAddr, PtrWidth, Result};

/// 32-byte section header preceding every block of a sectioned stream.
///
/// Field order on disk: signature, section size, data offset, endianness
/// marker, depth, data size, two reserved words. Every numeric field uses
/// the byte order the marker declares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionHeader {
    pub signature: [u8; 4],
    /// Bytes of payload following the header.
    pub section_size: u32,
    /// Distance from the header start to the payload (the header size).
    pub data_offset: u32,
    pub endianness: Endianness,
    pub depth: u32,
    /// Bytes of meaningful data inside the payload.
    pub data_size: u32,
}

impl SectionHeader {
    pub const SIZE: usize = SECTION_HEADER_SIZE as usize;

    /// Create a header with the default header size.
    pub fn new(signature: [u8; 4], endianness: Endianness, depth: u32, data_size: u32) -> Self {
        Self {
            signature,
            section_size: FileAddr::new(data_size as i64).align_up(SECTION_ALIGNMENT).get() as u32,
            data_offset: SECTION_HEADER_SIZE,
            endianness,
            depth,
            data_size,
        }
    }

    /// Decode a header, returning `None` when the bytes are not shaped like one.
    ///
    /// The signature is not checked; callers decide which ones they accept.
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Option<Self> {
        let endianness = match LittleEndian::read_u32(&bytes[12..16]) {
            ENDIANNESS_LITTLE => Endianness::Little,
            ENDIANNESS_BIG => Endianness::Big,
            m if m.swap_bytes() == ENDIANNESS_BIG => Endianness::Big,
            _ => return None,
        };
        let read = |at: usize| match endianness {
            Endianness::Little => LittleEndian::read_u32(&bytes[at..at + 4]),
            Endianness::Big => BigEndian::read_u32(&bytes[at..at + 4]),
        };

        let data_offset = read(8);
        if data_offset != SECTION_HEADER_SIZE && data_offset != SECTION_HEADER_SIZE_EXTENDED {
            return None;
        }

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&bytes[0..4]);
        Some(Self {
            signature,
            section_size: read(4),
            data_offset,
            endianness,
            depth: read(16),
            data_size: read(20),
        })
    }

    /// Encode the header in its own byte order.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.signature);
        let marker = endianness_marker(self.endianness);
        let fields = [
            (4, self.section_size),
            (8, self.data_offset),
            (12, marker),
            (16, self.depth),
            (20, self.data_size),
        ];
        for (at, value) in fields {
            match self.endianness {
                Endianness::Little => LittleEndian::write_u32(&mut bytes[at..at + 4], value),
                Endianness::Big => BigEndian::write_u32(&mut bytes[at..at + 4], value),
            }
        }
        bytes
    }

    /// Read a header at an absolute position without moving the cursor.
    ///
    /// Returns `Ok(None)` if fewer than 32 bytes remain or the bytes are
    /// not shaped like a header.
    pub fn read_at<R: Read + Seek>(reader: &mut Reader<R>, at: FileAddr) -> Result<Option<Self>> {
        if at.get() < 0 || at.get() + Self::SIZE as i64 > reader.len() as i64 {
            return Ok(None);
        }
        reader.read_at(at, |r| {
            let mut bytes = [0u8; Self::SIZE];
            r.read_exact(&mut bytes)?;
            Ok(Self::from_bytes(&bytes))
        })
    }

    /// Absolute position of the payload.
    #[inline]
    pub fn data_start(&self, header_start: FileAddr) -> FileAddr {
        header_start + self.data_offset as i64
    }

    /// Absolute position of the next sibling header.
    #[inline]
    pub fn next_section(&self, header_start: FileAddr) -> FileAddr {
        self.data_start(header_start) + self.section_size as i64
    }

    /// Printable signature.
    pub fn signature_str(&self) -> String {
        String::from_utf8_lossy(&self.signature).into_owned()
    }
}

/// Result of walking the top-level sections of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionScan {
    /// Width implied by the first relocation table found, if any.
    pub pointer_width: Option<PtrWidth>,
    /// Header position of that relocation table.
    pub relocation_section: Option<FileAddr>,
}

impl SectionScan {
    /// Pointer width to use, falling back to 32-bit.
    pub fn pointer_width_or_default(&self) -> PtrWidth {
        self.pointer_width.unwrap_or(PtrWidth::Bits32)
    }
}

/// Walk sections from the start of the stream looking for a relocation
/// table signature.
///
/// Stops at the first `POF0`/`POF1`, at `EOFC`, at anything that is not a
/// header, or when the walk leaves the stream. Run once per stream; the
/// result is threaded through the decode rather than cached globally.
pub fn scan_sections<R: Read + Seek>(reader: &mut Reader<R>) -> Result<SectionScan> {
    let mut at = FileAddr::NULL;
    while let Some(header) = SectionHeader::read_at(reader, at)? {
        trace!(at = %at, signature = %header.signature_str(), size = header.section_size, "section");
        let pointer_width = match header.signature {
            SIG_POF0 => Some(PtrWidth::Bits32),
            SIG_POF1 => Some(PtrWidth::Bits64),
            SIG_EOFC => break,
            _ => None,
        };
        if pointer_width.is_some() {
            debug!(at = %at, width = ?pointer_width, "relocation table found");
            return Ok(SectionScan { pointer_width, relocation_section: Some(at) });
        }

        let next = header.next_section(at);
        if next <= at {
            break;
        }
        at = next;
    }

    debug!("no relocation table found; assuming 32-bit pointers");
    Ok(SectionScan { pointer_width: None, relocation_section: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_bytes_little() {
        let header = SectionHeader::new(SIG_AETC, Endianness::Little, 0, 0x31);
        assert_eq!(header.section_size, 0x40);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"AETC");
        assert_eq!(&bytes[12..16], &[0x00, 0x00, 0x00, 0x10]);
        assert_eq!(SectionHeader::from_bytes(&bytes), Some(header));
    }

    #[test]
    fn test_header_bytes_big() {
        let header = SectionHeader::new(SIG_POF1, Endianness::Big, 1, 8);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[12..16], &[0x18, 0x00, 0x00, 0x00]);
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x00, 0x20]);
        let parsed = SectionHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.endianness, Endianness::Big);
        assert_eq!(parsed.depth, 1);
    }

    #[test]
    fn test_not_a_header() {
        let bytes = [0u8; SectionHeader::SIZE];
        assert!(SectionHeader::from_bytes(&bytes).is_none());
    }

    fn stream(sections: &[SectionHeader]) -> Vec<u8> {
        let mut out = Vec::new();
        for s in sections {
            out.extend_from_slice(&s.to_bytes());
            out.resize(out.len() + s.section_size as usize, 0);
        }
        out
    }

    #[test]
    fn test_scan_finds_pof1() {
        let bytes = stream(&[
            SectionHeader::new(SIG_AETC, Endianness::Little, 0, 0x50),
            SectionHeader::new(SIG_POF1, Endianness::Little, 1, 0x10),
            SectionHeader::new(SIG_EOFC, Endianness::Little, 0, 0),
        ]);
        let mut reader = Reader::new(Cursor::new(bytes)).unwrap();
        let scan = scan_sections(&mut reader).unwrap();
        assert_eq!(scan.pointer_width, Some(PtrWidth::Bits64));
        assert_eq!(scan.relocation_section, Some(FileAddr::new(0x20 + 0x50)));
    }

    #[test]
    fn test_scan_stops_at_eofc() {
        let bytes = stream(&[
            SectionHeader::new(SIG_AETC, Endianness::Little, 0, 0x10),
            SectionHeader::new(SIG_EOFC, Endianness::Little, 0, 0),
            SectionHeader::new(SIG_POF1, Endianness::Little, 1, 0x10),
        ]);
        let mut reader = Reader::new(Cursor::new(bytes)).unwrap();
        let scan = scan_sections(&mut reader).unwrap();
        assert_eq!(scan.pointer_width, None);
        assert_eq!(scan.pointer_width_or_default(), PtrWidth::Bits32);
    }

    #[test]
    fn test_scan_out_of_bounds() {
        let mut header = SectionHeader::new(SIG_AETC, Endianness::Little, 0, 0);
        header.section_size = 0x1000;
        let bytes = header.to_bytes().to_vec();
        let mut reader = Reader::new(Cursor::new(bytes)).unwrap();
        let scan = scan_sections(&mut reader).unwrap();
        assert_eq!(scan.pointer_width, None);
    }
}
