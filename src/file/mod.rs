//! Movie container access and the byte-level codec.
//!
//! This module provides everything below the bytecode model: reading and writing the
//! primitive encodings, loading movie files from disk or memory, and decoding the Shockwave
//! Flash container that carries the bytecode units.
//!
//! # Architecture
//!
//! - **Sources** - a movie is read from a mapped file or an owned buffer
//! - **Byte codec** - [`Parser`](crate::file::parser::Parser) and
//!   [`Writer`](crate::file::writer::Writer) for fixed-width, variable-length and string fields
//! - **Container** - [`Movie`](crate::file::movie::Movie), the header and tag list
//!
//! # Key Components
//!
//! - [`crate::file::Backend`] - Raw bytes of a movie
//! - [`crate::file::Physical`] - A mapped movie file
//! - [`crate::file::Memory`] - A movie already in memory
//! - [`crate::file::parser`] - Bounds-checked reader
//! - [`crate::file::writer`] - Encoder producing minimal encodings
//! - [`crate::file::io`] - Little-endian primitives shared by both
//! - [`crate::file::movie`] - The container
//!
//! # Examples
//!
//! ```rust,no_run
//! use abcpatch::Movie;
//!
//! let data = std::fs::read("Habbo.swf")?;
//! let movie = Movie::from_mem(data)?;
//! for (index, unit) in movie.units().enumerate() {
//!     println!("unit {}: {} classes", index, unit.instances.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod io;
pub mod movie;
pub mod parser;
pub mod writer;

mod memory;
mod physical;

pub use memory::Memory;
pub use physical::Physical;


/// Source of the raw movie bytes handed to [`Movie::parse`](crate::file::movie::Movie::parse).
///
/// A mapped file and an owned buffer are both read once, front to back, by the container
/// decoder; compressed bodies are inflated into a separate buffer.
pub trait Backend: Send + Sync {
    /// The whole movie as stored, header included.
    fn data(&self) -> &[u8];
}
