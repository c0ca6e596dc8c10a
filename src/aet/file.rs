//! Reading and writing sets on disk.

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use super::{read, AetSet, ContainerInfo, ReadOptions, WriteOptions};
use crate::util::Result;

/// Memory-map `path` and decode it.
pub fn read_file(path: impl AsRef<Path>, options: &ReadOptions) -> Result<(AetSet, ContainerInfo)> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    debug!(path = %path.display(), len, "reading set");

    // Mapping an empty file fails on some platforms.
    if len == 0 {
        return read::decode(Cursor::new(&[][..]), options);
    }
    // SAFETY: the map is read-only and dropped before returning. Concurrent
    // truncation by another process is outside what we guard against.
    let mmap = unsafe { Mmap::map(&file)? };
    read::decode(Cursor::new(&mmap[..]), options)
}

/// Encode `set` into a new file at `path`, replacing any existing one.
pub fn write_file(path: impl AsRef<Path>, set: &AetSet, options: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut out = set.write(BufWriter::new(file), options)?;
    out.flush()?;
    debug!(path = %path.display(), "set written");
    Ok(())
}
