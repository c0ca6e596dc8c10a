//! # aetset
//!
//! Reader and writer for AetSet animation files: scenes of compositions,
//! layers and keyframed curves stored as a compact, pointer-linked binary
//! graph.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (file addresses, layout, errors)
//! - [`binary`] - Relocatable read/write cursors, section headers, relocation tables
//! - [`anim`] - Animation curves and sampled transforms
//! - [`aet`] - Scene graph model and its codec
//!
//! ## Example
//!
//! ```ignore
//! use aetset::prelude::*;
//!
//! let (set, info) = aetset::aet::file::read_file("aet_title.bin", &ReadOptions::default())?;
//! println!("{} layout, {} pointers", info.layout, info.pointer_width);
//!
//! for scene in &set.scenes {
//!     for (id, layer) in scene.layers() {
//!         println!("{:?} {} [{}, {})", id, layer.name, layer.start_frame, layer.end_frame);
//!     }
//! }
//! ```

pub mod util;
pub mod binary;
pub mod anim;
pub mod aet;

// Re-export commonly used types
pub use util::{Endianness, Error, FileAddr, PtrWidth, Result};
pub use aet::{AetSet, ReadOptions, WriteOptions};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Endianness, Error, FileAddr, PtrWidth, Result};
    pub use crate::anim::{FCurve, KeyFrame};
    pub use crate::aet::{
        AetSet, Composition, CompositionId, Layer, LayerId, LayerItem, Layout, ReadOptions, Scene, WriteOptions,
    };
}
