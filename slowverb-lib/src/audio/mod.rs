//! Audio buffers and the load path.

pub mod buffer;
pub mod decode;

pub use buffer::{AudioAsset, RenderedExport};
pub use decode::{decode_bytes, decode_file, DecodeError};
