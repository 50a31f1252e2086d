// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # abcpatch
//!
//! A patch engine for the AVM2 bytecode of the Habbo Hotel Flash client. `abcpatch` loads a
//! client movie, finds the methods that enforce its hosting and encryption policy, and
//! rewrites them so the client can talk to a custom server. It is built on a complete
//! reader and writer for the ActionScript Byte Code (ABC) format and a label-aware
//! instruction editor that keeps branches, switch tables and exception ranges intact while
//! code is inserted and removed.
//!
//! ## Features
//!
//! - **Container codec** - Uncompressed, zlib and LZMA movies, read from memory-mapped files
//! - **Bytecode model** - Constant pool, methods, classes, scripts and bodies with a
//!   byte-exact round trip for canonical input
//! - **Instruction editor** - Insert, remove and replace instructions by position while every
//!   jump keeps its target
//! - **Signature search** - Locate methods by parameter and return types, frame metrics and
//!   dispatch ids rather than obfuscated names
//! - **Patches** - RSA key replacement, host check bypass, handshake disabling, debug register
//!   renaming and identifier sanitization
//! - **Message registry** - Header tables and the client revision string
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use abcpatch::prelude::*;
//!
//! let mut game = Game::from_file("Habbo.swf")?;
//! for report in game.run(&PatchConfig::new().with_disable_handshake(true)) {
//!     println!("{report}");
//! }
//! game.save("Habbo.patched.swf", None)?;
//! # Ok::<(), abcpatch::Error>(())
//! ```
//!
//! ### Working with the bytecode directly
//!
//! ```rust,no_run
//! use abcpatch::{editor::CodeEditor, Movie};
//!
//! let mut movie = Movie::from_file("Habbo.swf")?;
//! let unit = movie.unit_mut(0).ok_or(abcpatch::Error::Empty)?;
//! let body = &mut unit.bodies_mut()[0];
//!
//! let mut editor = CodeEditor::from_body(body)?;
//! editor.remove_range(0, 1)?;
//! editor.write_to(body)?;
//! # Ok::<(), abcpatch::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - Byte codec, file backends and the movie container
//! - [`abc`] - The bytecode unit model
//! - [`assembly`] - Opcode table, instruction decoder and encoder
//! - [`editor`] - Label-aware editing of one method body
//! - [`locator`] - Signature-based method and slot search
//! - [`registry`] - Message header tables and the revision slot
//! - [`sanitizer`] - Renaming of invalid namespaces and classes
//! - [`patches`] - The patch operations
//! - [`game`] - The driver tying a movie to its patch state
//! - [`config`] - Target layout and patch selection
//! - [`events`] - Log of every edit made
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result`]. Structural errors of the input
//! ([`Error::Malformed`], [`Error::OutOfBounds`]) are fatal to loading; patch-level problems
//! are reported per patch through [`patches::PatchReport`], so one missing target never
//! stops the remaining patches.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use abcpatch::prelude::*;
///
/// let game = Game::from_file("Habbo.swf")?;
/// if let Some(revision) = game.revision() {
///     println!("{revision}");
/// }
/// # Ok::<(), abcpatch::Error>(())
/// ```
pub mod prelude;

pub mod abc;
pub mod assembly;
pub mod cache;
pub mod config;
pub mod editor;
pub mod events;
pub mod file;
pub mod game;
pub mod locator;
pub mod patches;
pub mod registry;
pub mod sanitizer;

/// `abcpatch` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use abcpatch::{Movie, Result};
///
/// fn load(path: &str) -> Result<Movie> {
///     Movie::from_file(path)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `abcpatch` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust,no_run
/// use abcpatch::{Error, Movie};
///
/// match Movie::from_file("Habbo.swf") {
///     Ok(movie) => println!("{} units", movie.unit_count()),
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {message}"),
///     Err(e) => println!("Error: {e}"),
/// }
/// ```
pub use error::Error;

/// A bytecode unit.
pub use abc::AbcFile;

/// The patch driver.
pub use game::Game;

/// The movie container and the byte reader used by every decoder.
pub use file::{movie::Movie, parser::Parser};
