//! AetSet scene graphs and their binary codec.
//!
//! An [`AetSet`] is an ordered list of [`Scene`]s. Each scene owns its
//! compositions, layers and items in flat arrays; layers refer to items and
//! parents by index ([`LayerItem`], [`LayerId`]) rather than by pointer.
//!
//! Two on-disk generations are supported:
//!
//! - [`Layout::Legacy`]: a bare, null-terminated array of absolute 32-bit
//!   scene pointers followed by the scene data.
//! - [`Layout::Modern`]: the same payload wrapped in an `AETC` section,
//!   addressed relative to the payload start, followed by a `POF0`/`POF1`
//!   relocation table and an `EOFC` terminator. Pointers may be 32 or 64
//!   bits wide.
//!
//! # Example
//!
//! ```no_run
//! use aetset::aet::{AetSet, ReadOptions, WriteOptions};
//! use aetset::PtrWidth;
//!
//! let bytes = std::fs::read("aet_title.bin")?;
//! let set = AetSet::from_bytes(&bytes, &ReadOptions::default())?;
//! for scene in &set.scenes {
//!     println!("{}: {} layers", scene.name, scene.layer_count());
//! }
//! let modern = set.to_bytes(&WriteOptions::modern(PtrWidth::Bits64))?;
//! # Ok::<(), aetset::Error>(())
//! ```

mod item;
mod layer;
mod link;
mod read;
mod scene;
mod write;

pub mod file;

use std::fmt;
use std::io::{Cursor, Read, Seek, Write};

use serde::Serialize;

use crate::binary::RelocationTable;
use crate::util::{Endianness, PtrWidth, Result};

pub use item::{Audio, Rgb8, Video, VideoSource};
pub use layer::{
    BlendMode, ItemType, Layer, LayerAudio, LayerFlags, LayerItem, LayerQuality, LayerVideo, LayerVideo3D, Marker,
    TrackMatte, TransferMode,
};
pub use read::ReadOptions;
pub use scene::{Camera, Composition, CompositionId, LayerId, Scene};
pub use write::WriteOptions;

/// On-disk generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Layout {
    /// Flat, absolute 32-bit little-endian pointers.
    #[default]
    Legacy,
    /// Sectioned container with a relocation table.
    Modern,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Modern => f.write_str("modern"),
        }
    }
}

/// How a stream was laid out, as detected while decoding it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerInfo {
    pub layout: Layout,
    pub pointer_width: PtrWidth,
    pub endianness: Endianness,
    /// Decoded relocation table of a modern container.
    pub relocations: Option<RelocationTable>,
}

impl ContainerInfo {
    /// Number of relocated pointers, if the stream carries a table.
    pub fn relocation_count(&self) -> Option<usize> {
        self.relocations.as_ref().map(RelocationTable::len)
    }
}

/// Top-level container: an ordered list of independent scenes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AetSet {
    pub scenes: Vec<Scene>,
}

impl AetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// First scene with the given name.
    pub fn scene_by_name(&self, name: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.name == name)
    }

    pub fn scene_by_name_mut(&mut self, name: &str) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.name == name)
    }

    /// Decode a set, detecting the layout.
    pub fn read<R: Read + Seek>(stream: R, options: &ReadOptions) -> Result<Self> {
        read::decode(stream, options).map(|(set, _)| set)
    }

    /// Decode a set and report how the stream was laid out.
    pub fn read_with_info<R: Read + Seek>(stream: R, options: &ReadOptions) -> Result<(Self, ContainerInfo)> {
        read::decode(stream, options)
    }

    pub fn from_bytes(bytes: &[u8], options: &ReadOptions) -> Result<Self> {
        Self::read(Cursor::new(bytes), options)
    }

    /// Encode the set into `stream`, returning the stream.
    pub fn write<'a, W>(&'a self, stream: W, options: &WriteOptions) -> Result<W>
    where
        W: Write + Seek + 'a,
    {
        write::encode(self, stream, options)
    }

    pub fn to_bytes(&self, options: &WriteOptions) -> Result<Vec<u8>> {
        self.write(Cursor::new(Vec::new()), options).map(Cursor::into_inner)
    }
}
