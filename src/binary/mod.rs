//! Relocatable binary layer.
//!
//! A [`Reader`] / [`Writer`] pair over seekable streams with pointer-width
//! and endianness awareness, a base-offset stack for self-relative blocks,
//! and (write side) the pointer, string and delayed-write pools that turn
//! a graph of records into a flat, pointer-linked buffer.
//!
//! Sectioned streams are wrapped in [`SectionHeader`]s; the first
//! relocation table found by [`scan_sections`] fixes the pointer width.

mod format;
mod reader;
mod relocation;
mod section;
mod writer;

pub use format::*;
pub use reader::*;
pub use relocation::*;
pub use section::*;
pub use writer::*;
