//! # abcpatch Prelude
//!
//! The types needed to load a client, patch it and inspect the result.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all abcpatch operations
pub use crate::Error;

/// The result type used throughout abcpatch
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Patch driver for a loaded client
pub use crate::Game;

/// Movie container and its compression modes
pub use crate::file::movie::{Compression, Movie};

/// Bytecode unit
pub use crate::AbcFile;

// ================================================================================================
// Configuration
// ================================================================================================

/// Target layout, key pair and patch selection
pub use crate::config::{GameLayout, PatchConfig, RsaKeys};

// ================================================================================================
// Patches and Results
// ================================================================================================

/// Patch requests and their reports
pub use crate::patches::{Patch, PatchKind, PatchOutcome, PatchReport};

/// Message header tables
pub use crate::registry::{Direction, MessageRegistry};

/// Edit log
pub use crate::events::{EventKind, EventLog, MethodRef};

// ================================================================================================
// Bytecode Editing
// ================================================================================================

/// Instruction model
pub use crate::assembly::{Instruction, Operand};

/// Label-aware body editor
pub use crate::editor::CodeEditor;

/// Signature search
pub use crate::locator::{MethodSignature, TraitOwner};
