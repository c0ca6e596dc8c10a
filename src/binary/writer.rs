//! Stateful binary write cursor with deferred-resolution pools.
//!
//! Records are written with fixed-size fields in place; anything of
//! variable size is queued and placed later:
//!
//! - **pointer pool**: [`Writer::write_func_ptr`] reserves a pointer and
//!   queues a closure that writes the pointee at the end of the stream.
//!   Closures may queue more pointers; the pool is drained front to back
//!   until empty, which lays the graph out breadth first.
//! - **string pool**: [`Writer::write_str_ptr`] reserves a pointer and
//!   queues the string. Identical strings share one copy when pooling is on.
//! - **delayed pool**: [`Writer::write_delayed`] reserves bytes whose value
//!   is only known once everything else is placed (sizes, back references).
//!
//! [`Writer::finalize`] flushes the pools in that order.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::io::{Seek, SeekFrom, Write};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::util::{align_up, Endianness, Error, FileAddr, PtrWidth, Result};

macro_rules! write_scalar {
    ($name:ident, $ty:ty, $size:expr) => {
        pub fn $name(&mut self, value: $ty) -> Result<()> {
            match self.endianness {
                Endianness::Little => self.inner.$name::<LittleEndian>(value)?,
                Endianness::Big => self.inner.$name::<BigEndian>(value)?,
            }
            self.advance($size);
            Ok(())
        }
    };
}

/// Deferred write callback. Runs with the cursor at the reserved location.
pub type WriteFn<'a, W, K> = Box<dyn FnOnce(&mut Writer<'a, W, K>) -> Result<()> + 'a>;

/// A pointer whose pointee has not been placed yet.
struct PendingPointer<'a, W, K> {
    return_address: FileAddr,
    base_address: FileAddr,
    write: WriteFn<'a, W, K>,
}

/// A string pointer awaiting the string pool flush.
struct PendingString<'a> {
    return_address: FileAddr,
    base_address: FileAddr,
    value: &'a str,
    alignment: i64,
}

/// Reserved bytes patched after every pointer and string is placed.
struct DelayedWrite<'a, W, K> {
    return_address: FileAddr,
    base_address: FileAddr,
    write: WriteFn<'a, W, K>,
}

/// Write cursor over a seekable stream.
///
/// `'a` bounds the data queued closures may borrow. `K` names records
/// that other records refer to by position: a record calls
/// [`Writer::mark`] when it is written, and references to it go through
/// [`Writer::write_node_ptr`], which resolves once every record is placed.
pub struct Writer<'a, W, K> {
    inner: W,
    pos: u64,
    end: u64,
    endianness: Endianness,
    ptr_width: PtrWidth,
    base_offsets: SmallVec<[FileAddr; 4]>,
    pool_alignment: i64,
    string_pooling: bool,
    pointer_pool: VecDeque<PendingPointer<'a, W, K>>,
    string_pool: Vec<PendingString<'a>>,
    delayed_pool: Vec<DelayedWrite<'a, W, K>>,
    written_strings: HashMap<&'a str, FileAddr>,
    placements: HashMap<K, FileAddr>,
    relocations: Vec<FileAddr>,
}

impl<'a, W, K> Writer<'a, W, K>
where
    W: Write + Seek + 'a,
    K: Copy + Eq + Hash + Debug + 'a,
{
    /// Wrap a stream positioned at its start.
    pub fn new(inner: W, ptr_width: PtrWidth, endianness: Endianness) -> Self {
        Self {
            inner,
            pos: 0,
            end: 0,
            endianness,
            ptr_width,
            base_offsets: SmallVec::new(),
            pool_alignment: ptr_width.bytes(),
            string_pooling: true,
            pointer_pool: VecDeque::new(),
            string_pool: Vec::new(),
            delayed_pool: Vec::new(),
            written_strings: HashMap::new(),
            placements: HashMap::new(),
            relocations: Vec::new(),
        }
    }

    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    #[inline]
    pub fn ptr_width(&self) -> PtrWidth {
        self.ptr_width
    }

    /// Alignment of every pointee placed by the pointer pool.
    pub fn set_pool_alignment(&mut self, alignment: i64) {
        self.pool_alignment = alignment.max(1);
    }

    /// Enable or disable string deduplication.
    pub fn set_string_pooling(&mut self, enabled: bool) {
        self.string_pooling = enabled;
    }

    #[inline]
    pub fn string_pooling(&self) -> bool {
        self.string_pooling
    }

    /// Current absolute position.
    #[inline]
    pub fn position(&self) -> FileAddr {
        FileAddr::from_u64(self.pos)
    }

    /// Absolute end of everything written so far.
    #[inline]
    pub fn stream_end(&self) -> FileAddr {
        FileAddr::from_u64(self.end)
    }

    /// Absolute positions of every non-null pointer written so far.
    pub fn relocations(&self) -> &[FileAddr] {
        &self.relocations
    }

    #[inline]
    fn advance(&mut self, size: u64) {
        self.pos += size;
        self.end = self.end.max(self.pos);
    }

    /// Move to an absolute position inside the written range.
    pub fn seek(&mut self, addr: FileAddr) -> Result<()> {
        let pos = addr
            .as_u64()
            .filter(|&p| p <= self.end)
            .ok_or_else(|| Error::pointer("write seek target", addr))?;
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    /// Move to the end of the written range.
    pub fn seek_end(&mut self) -> Result<()> {
        self.seek(self.stream_end())
    }

    /// Innermost base offset, or zero when none is active.
    #[inline]
    pub fn base_offset(&self) -> FileAddr {
        self.base_offsets.last().copied().unwrap_or(FileAddr::NULL)
    }

    /// Make the current position the base for subsequent pointers.
    pub fn push_base_offset(&mut self) {
        self.base_offsets.push(self.position());
    }

    pub fn pop_base_offset(&mut self) -> Option<FileAddr> {
        self.base_offsets.pop()
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        self.advance(data.len() as u64);
        Ok(())
    }

    /// Write `count` zero bytes.
    pub fn write_padding(&mut self, count: u64) -> Result<()> {
        const ZEROES: [u8; 16] = [0; 16];
        let mut left = count;
        while left > 0 {
            let n = left.min(ZEROES.len() as u64);
            self.write_bytes(&ZEROES[..n as usize])?;
            left -= n;
        }
        Ok(())
    }

    /// Pad with zeroes up to the next multiple of `align` (absolute).
    pub fn align(&mut self, align: i64) -> Result<()> {
        let target = align_up(self.pos as i64, align) as u64;
        self.write_padding(target - self.pos)
    }

    /// Align to the pointer width and return the record's start position.
    pub fn begin_record(&mut self) -> Result<FileAddr> {
        self.align(self.ptr_width.bytes())?;
        Ok(self.position())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_u8(value)?;
        self.advance(1);
        Ok(())
    }

    write_scalar!(write_u16, u16, 2);
    write_scalar!(write_u32, u32, 4);
    write_scalar!(write_i32, i32, 4);
    write_scalar!(write_u64, u64, 8);
    write_scalar!(write_i64, i64, 8);
    write_scalar!(write_f32, f32, 4);

    /// Write a raw pointer-width value. Does not align or record a relocation.
    fn write_ptr_raw(&mut self, offset: i64) -> Result<()> {
        match self.ptr_width {
            PtrWidth::Bits32 => {
                let value = u32::try_from(offset).map_err(|_| {
                    Error::InsufficientSpace(format!("offset {:#x} does not fit a 32-bit pointer", offset))
                })?;
                self.write_u32(value)
            }
            PtrWidth::Bits64 => self.write_i64(offset),
        }
    }

    /// Align and reserve a zeroed pointer slot, returning its position.
    fn reserve_ptr(&mut self) -> Result<FileAddr> {
        self.align(self.ptr_width.bytes())?;
        let at = self.position();
        self.write_ptr_raw(0)?;
        Ok(at)
    }

    /// Seek to `at`, write `target` relative to `base`, and record the slot.
    fn patch_ptr(&mut self, at: FileAddr, base: FileAddr, target: FileAddr) -> Result<()> {
        self.seek(at)?;
        if target.is_null() {
            return self.write_ptr_raw(0);
        }
        self.write_ptr_raw(target.relative_to(base).get())?;
        self.relocations.push(at);
        Ok(())
    }

    /// Write a null pointer.
    pub fn write_null_ptr(&mut self) -> Result<()> {
        self.reserve_ptr().map(|_| ())
    }

    /// Write a pointer to an already known absolute position.
    pub fn write_ptr_to(&mut self, target: FileAddr) -> Result<()> {
        let at = self.reserve_ptr()?;
        let base = self.base_offset();
        self.patch_ptr(at, base, target)
    }

    /// Reserve a pointer whose pointee `f` writes once the pool reaches it.
    pub fn write_func_ptr<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()> + 'a,
    {
        let return_address = self.reserve_ptr()?;
        self.pointer_pool.push_back(PendingPointer {
            return_address,
            base_address: self.base_offset(),
            write: Box::new(f),
        });
        Ok(())
    }

    /// Reserve a string pointer with byte alignment.
    pub fn write_str_ptr(&mut self, value: &'a str) -> Result<()> {
        self.write_str_ptr_aligned(value, 1)
    }

    /// Reserve a string pointer; the string starts on a multiple of `alignment`.
    pub fn write_str_ptr_aligned(&mut self, value: &'a str, alignment: i64) -> Result<()> {
        let return_address = self.reserve_ptr()?;
        self.string_pool.push(PendingString {
            return_address,
            base_address: self.base_offset(),
            value,
            alignment: alignment.max(1),
        });
        Ok(())
    }

    /// Reserve `size` bytes that `f` fills during the delayed flush.
    ///
    /// `f` runs with the cursor at the reservation and must write exactly
    /// `size` bytes.
    pub fn write_delayed<F>(&mut self, size: u64, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()> + 'a,
    {
        let return_address = self.position();
        self.write_padding(size)?;
        self.delayed_pool.push(DelayedWrite {
            return_address,
            base_address: self.base_offset(),
            write: Box::new(f),
        });
        Ok(())
    }

    /// Reserve a pointer whose absolute target `f` computes during the
    /// delayed flush.
    pub fn write_delayed_ptr<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&Self) -> Result<FileAddr> + 'a,
    {
        let return_address = self.reserve_ptr()?;
        let base_address = self.base_offset();
        self.delayed_pool.push(DelayedWrite {
            return_address,
            base_address,
            write: Box::new(move |w: &mut Self| {
                let target = f(w)?;
                w.patch_ptr(return_address, base_address, target)
            }),
        });
        Ok(())
    }

    /// Reserve a pointer to the record registered under `key`.
    pub fn write_node_ptr(&mut self, key: K) -> Result<()> {
        self.write_delayed_ptr(move |w| w.placement(key))
    }

    /// Register the current position as the location of `key`.
    pub fn mark(&mut self, key: K) {
        let at = self.position();
        if let Some(previous) = self.placements.insert(key, at) {
            trace!(?key, %previous, %at, "record placed twice; keeping the latest");
        }
    }

    /// Absolute position registered for `key`.
    pub fn placement(&self, key: K) -> Result<FileAddr> {
        self.placements
            .get(&key)
            .copied()
            .ok_or_else(|| Error::other(format!("reference to unwritten record {:?}", key)))
    }

    /// Run `f` at an absolute position inside the written range, then
    /// restore the cursor.
    pub fn write_at<T>(&mut self, addr: FileAddr, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.position();
        self.seek(addr)?;
        let result = f(self);
        self.seek(saved)?;
        result
    }

    /// Drain the pointer pool, including entries queued while draining.
    fn flush_pointer_pool(&mut self) -> Result<usize> {
        let mut flushed = 0;
        while let Some(pending) = self.pointer_pool.pop_front() {
            self.seek_end()?;
            self.align(self.pool_alignment)?;
            let target = self.position();

            self.patch_ptr(pending.return_address, pending.base_address, target)?;
            self.seek(target)?;

            self.base_offsets.push(pending.base_address);
            let result = (pending.write)(self);
            self.base_offsets.pop();
            result?;
            flushed += 1;
        }
        Ok(flushed)
    }

    /// Place every queued string, sharing copies when pooling is on.
    fn flush_string_pool(&mut self) -> Result<(usize, usize)> {
        let pending = std::mem::take(&mut self.string_pool);
        let (mut written, mut shared) = (0, 0);
        for entry in pending {
            let existing = if self.string_pooling {
                self.written_strings.get(entry.value).copied()
            } else {
                None
            };

            let target = match existing {
                Some(at) => {
                    shared += 1;
                    at
                }
                None => {
                    self.seek_end()?;
                    self.align(entry.alignment)?;
                    let at = self.position();
                    self.write_bytes(entry.value.as_bytes())?;
                    self.write_u8(0)?;
                    self.written_strings.entry(entry.value).or_insert(at);
                    written += 1;
                    at
                }
            };
            self.patch_ptr(entry.return_address, entry.base_address, target)?;
        }
        Ok((written, shared))
    }

    /// Run every delayed write at its reservation.
    fn flush_delayed_pool(&mut self) -> Result<usize> {
        let pending = std::mem::take(&mut self.delayed_pool);
        let count = pending.len();
        for entry in pending {
            self.seek(entry.return_address)?;
            self.base_offsets.push(entry.base_address);
            let result = (entry.write)(self);
            self.base_offsets.pop();
            result?;
        }
        Ok(count)
    }

    /// Flush pointers, then strings, then delayed writes, and leave the
    /// cursor at the end of the stream.
    pub fn finalize(&mut self) -> Result<()> {
        loop {
            let pointers = self.flush_pointer_pool()?;
            let (strings, shared) = self.flush_string_pool()?;
            let delayed = self.flush_delayed_pool()?;
            debug!(pointers, strings, shared, delayed, end = %self.stream_end(), "pools flushed");

            if self.pointer_pool.is_empty() && self.string_pool.is_empty() && self.delayed_pool.is_empty() {
                break;
            }
        }
        self.seek_end()
    }

    /// Flush the underlying stream and return it.
    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
