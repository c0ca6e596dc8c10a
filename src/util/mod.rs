//! Utility types shared by every layer of the codec.
//!
//! - [`FileAddr`] - Signed stream offsets with a null sentinel
//! - [`Error`] / [`Result`] - Error handling
//! - [`Endianness`] / [`PtrWidth`] - Byte layout parameters

mod addr;
mod error;
mod layout;

pub use addr::*;
pub use error::*;
pub use layout::*;
