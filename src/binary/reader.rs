//! Stateful binary read cursor.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use smallvec::SmallVec;

use crate::util::{Endianness, Error, FileAddr, PtrWidth, Result};

macro_rules! read_scalar {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $size:expr) => {
        $(#[$doc])*
        pub fn $name(&mut self) -> Result<$ty> {
            self.ensure($size)?;
            let value = match self.endianness {
                Endianness::Little => self.inner.$name::<LittleEndian>()?,
                Endianness::Big => self.inner.$name::<BigEndian>()?,
            };
            self.pos += $size;
            Ok(value)
        }
    };
}

/// Read cursor over a seekable stream.
///
/// Carries the pointer width and endianness of the stream plus a stack of
/// base offsets. Every `*_offset` helper resolves against the innermost
/// base; raw pointer reads return the value exactly as stored.
pub struct Reader<R> {
    inner: R,
    pos: u64,
    len: u64,
    endianness: Endianness,
    ptr_width: PtrWidth,
    base_offsets: SmallVec<[FileAddr; 4]>,
}

impl<R: Read + Seek> Reader<R> {
    /// Wrap a stream with the default (32-bit, little-endian) layout.
    pub fn new(inner: R) -> Result<Self> {
        Self::with_layout(inner, PtrWidth::Bits32, Endianness::Little)
    }

    /// Wrap a stream with an explicit layout.
    pub fn with_layout(mut inner: R, ptr_width: PtrWidth, endianness: Endianness) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            pos: 0,
            len,
            endianness,
            ptr_width,
            base_offsets: SmallVec::new(),
        })
    }

    /// Total stream length in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    #[inline]
    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    #[inline]
    pub fn ptr_width(&self) -> PtrWidth {
        self.ptr_width
    }

    #[inline]
    pub fn set_ptr_width(&mut self, ptr_width: PtrWidth) {
        self.ptr_width = ptr_width;
    }

    /// Current absolute position.
    #[inline]
    pub fn position(&self) -> FileAddr {
        FileAddr::from_u64(self.pos)
    }

    /// Bytes left between the cursor and the end of the stream.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    /// Move to an absolute position.
    pub fn seek(&mut self, addr: FileAddr) -> Result<()> {
        let pos = addr
            .as_u64()
            .filter(|&p| p <= self.len)
            .ok_or_else(|| Error::pointer("seek target", addr))?;
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    /// Skip `count` bytes forward.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.seek(FileAddr::from_u64(self.pos + count))
    }

    /// Skip padding up to the next multiple of `align` (absolute).
    pub fn align(&mut self, align: i64) -> Result<()> {
        let target = self.position().align_up(align);
        if target != self.position() {
            self.seek(target)?;
        }
        Ok(())
    }

    /// Align to the pointer width and return the record's start position.
    pub fn begin_record(&mut self) -> Result<FileAddr> {
        self.align(self.ptr_width.bytes())?;
        Ok(self.position())
    }

    /// Innermost base offset, or zero when none is active.
    #[inline]
    pub fn base_offset(&self) -> FileAddr {
        self.base_offsets.last().copied().unwrap_or(FileAddr::NULL)
    }

    /// Make the current position the base for subsequent offsets.
    pub fn push_base_offset(&mut self) {
        self.base_offsets.push(self.position());
    }

    /// Push an explicit absolute base.
    pub fn push_base_offset_at(&mut self, base: FileAddr) {
        self.base_offsets.push(base);
    }

    pub fn pop_base_offset(&mut self) -> Option<FileAddr> {
        self.base_offsets.pop()
    }

    /// Absolute position of a stored offset under the active base.
    /// Null stays null.
    #[inline]
    pub fn resolve(&self, offset: FileAddr) -> FileAddr {
        if offset.is_null() {
            FileAddr::NULL
        } else {
            offset.absolute(self.base_offset())
        }
    }

    /// True if a stored offset is non-null and lands inside the stream.
    pub fn is_valid_offset(&self, offset: FileAddr) -> bool {
        if offset.is_null() {
            return false;
        }
        let abs = self.resolve(offset).get();
        abs >= 0 && (abs as u64) < self.len
    }

    /// Resolve a stored offset, rejecting anything outside the stream.
    ///
    /// Null passes through as null; callers decide whether null is allowed.
    pub fn checked(&self, what: &'static str, offset: FileAddr) -> Result<FileAddr> {
        if offset.is_null() {
            Ok(FileAddr::NULL)
        } else if self.is_valid_offset(offset) {
            Ok(self.resolve(offset))
        } else {
            Err(Error::pointer(what, offset))
        }
    }

    /// Run `f` at an absolute position, then restore the cursor.
    pub fn read_at<T>(&mut self, addr: FileAddr, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.position();
        self.seek(addr)?;
        let result = f(self);
        self.seek(saved)?;
        result
    }

    /// Run `f` at a stored offset (resolved against the active base), then
    /// restore the cursor.
    pub fn read_at_offset<T>(
        &mut self,
        what: &'static str,
        offset: FileAddr,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if offset.is_null() {
            return Err(Error::pointer(what, offset));
        }
        let addr = self.checked(what, offset)?;
        self.read_at(addr, f)
    }

    fn ensure(&self, size: u64) -> Result<()> {
        if self.pos + size > self.len {
            Err(Error::pointer("read past end of stream", self.position()))
        } else {
            Ok(())
        }
    }

    /// Fill `buf` from the stream.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ensure(buf.len() as u64)?;
        self.inner.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Read `len` bytes into a new buffer.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let value = self.inner.read_u8()?;
        self.pos += 1;
        Ok(value)
    }

    read_scalar!(read_u16, u16, 2);
    read_scalar!(read_u32, u32, 4);
    read_scalar!(read_i32, i32, 4);
    read_scalar!(read_u64, u64, 8);
    read_scalar!(read_i64, i64, 8);
    read_scalar!(read_f32, f32, 4);

    /// Read a pointer-width offset exactly as stored.
    ///
    /// Aligns to the pointer width first, matching the writer.
    pub fn read_ptr(&mut self) -> Result<FileAddr> {
        self.align(self.ptr_width.bytes())?;
        Ok(match self.ptr_width {
            PtrWidth::Bits32 => FileAddr::new(self.read_u32()? as i64),
            PtrWidth::Bits64 => FileAddr::new(self.read_i64()?),
        })
    }

    /// Read a NUL-terminated string at the cursor.
    pub fn read_cstr(&mut self) -> Result<String> {
        let start = self.position();
        let mut bytes = Vec::new();
        loop {
            if self.remaining() == 0 {
                return Err(Error::format(format!("unterminated string at {}", start)));
            }
            match self.read_u8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        Ok(String::from_utf8(bytes)?)
    }

    /// Read a string pointer and follow it. A null pointer yields `""`.
    pub fn read_str_ptr(&mut self, what: &'static str) -> Result<String> {
        let offset = self.read_ptr()?;
        if offset.is_null() {
            return Ok(String::new());
        }
        self.read_at_offset(what, offset, |r| r.read_cstr())
    }

    /// Recover the wrapped stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_scalars_little() {
        let bytes = vec![0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x80, 0x3F];
        let mut r = Reader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(r.read_u32().unwrap(), 0x04030201);
        assert_eq!(r.read_f32().unwrap(), 1.0);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_scalars_big() {
        let bytes = vec![0x01, 0x02, 0x03, 0x04];
        let mut r = Reader::with_layout(Cursor::new(bytes), PtrWidth::Bits32, Endianness::Big).unwrap();
        assert_eq!(r.read_u32().unwrap(), 0x01020304);
    }

    #[test]
    fn test_read_past_end_is_bad_pointer() {
        let mut r = Reader::new(Cursor::new(vec![1, 2])).unwrap();
        assert!(matches!(r.read_u32(), Err(Error::BadPointer { .. })));
    }

    #[test]
    fn test_read_ptr_aligns() {
        let mut bytes = vec![0xAAu8; 8];
        bytes.extend_from_slice(&0x30u64.to_le_bytes());
        let mut r = Reader::with_layout(Cursor::new(bytes), PtrWidth::Bits64, Endianness::Little).unwrap();
        r.read_u8().unwrap();
        assert_eq!(r.read_ptr().unwrap(), FileAddr::new(0x30));
        assert_eq!(r.position(), FileAddr::new(16));
    }

    #[test]
    fn test_read_at_restores_position() {
        let bytes = b"\x08\x00\x00\x00xxxxhello\0".to_vec();
        let mut r = Reader::new(Cursor::new(bytes)).unwrap();
        let s = r.read_str_ptr("name").unwrap();
        assert_eq!(s, "hello");
        assert_eq!(r.position(), FileAddr::new(4));
    }

    #[test]
    fn test_base_offset_resolution() {
        let mut r = Reader::new(Cursor::new(vec![0u8; 64])).unwrap();
        r.push_base_offset_at(FileAddr::new(0x20));
        assert_eq!(r.resolve(FileAddr::new(0x10)), FileAddr::new(0x30));
        assert_eq!(r.resolve(FileAddr::NULL), FileAddr::NULL);
        assert!(r.is_valid_offset(FileAddr::new(0x1F)));
        assert!(!r.is_valid_offset(FileAddr::new(0x20)));
        r.pop_base_offset();
        assert_eq!(r.base_offset(), FileAddr::NULL);
    }

    #[test]
    fn test_checked_rejects_out_of_bounds() {
        let r = Reader::new(Cursor::new(vec![0u8; 16])).unwrap();
        assert!(matches!(
            r.checked("item", FileAddr::new(0x100)),
            Err(Error::BadPointer { what: "item", .. })
        ));
        assert_eq!(r.checked("item", FileAddr::NULL).unwrap(), FileAddr::NULL);
        assert!(matches!(r.checked("item", FileAddr::new(-4)), Err(Error::BadPointer { .. })));
    }

    #[test]
    fn test_unterminated_string() {
        let bytes = b"\x04\x00\x00\x00abc".to_vec();
        let mut r = Reader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(r.read_str_ptr("name"), Err(Error::BadFormat(_))));
    }
}
