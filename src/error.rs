use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! unsupported_edit {
    ($($arg:tt)*) => {
        crate::Error::UnsupportedEdit(format!($($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into three groups: decoding failures raised while reading a movie or a
/// bytecode unit, I/O failures from the filesystem, and the patching taxonomy used by the editor
/// and patch operations.
///
/// # Error Categories
///
/// ## Decoding Errors
/// - [`Error::Malformed`] - Corrupted or invalid structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the input
/// - [`Error::NotSupported`] - Unsupported format revision (e.g. an unknown bytecode major version)
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::InvalidOpcode`] - An instruction stream holds an unknown opcode
/// - [`Error::InvalidBranch`] - A branch lands between instruction boundaries
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// ## Patching Errors
/// - [`Error::NotFound`] - A signature matched zero candidates
/// - [`Error::UnsupportedEdit`] - A structural edit was refused; the body is untouched
/// - [`Error::StructuralInvariant`] - An edit left a jump or exception bound dangling
///
/// Ambiguous signature matches are never errors: the first candidate in declaration order wins
/// and the event log records the ambiguity.
///
/// # Examples
///
/// ```rust,no_run
/// use abcpatch::{Error, Movie};
///
/// match Movie::from_file("Habbo.swf") {
///     Ok(movie) => println!("{} bytecode units", movie.unit_count()),
///     Err(Error::NotSupported) => eprintln!("Bytecode version is not supported"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed movie: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged or does not follow the expected layout.
    ///
    /// Carries the source location where the problem was detected, which makes
    /// fuzzing crashes and bug reports far easier to track down.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the input.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The container or a feature of it is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Other errors that don't fit a specific category.
    #[error("{0}")]
    Error(String),

    /// An instruction stream contains an opcode that is not part of the instruction set.
    #[error("Invalid opcode 0x{0:02X}")]
    InvalidOpcode(u8),

    /// A branch displacement does not land on an instruction boundary.
    #[error("Branch at instruction {position} does not land on an instruction boundary")]
    InvalidBranch {
        /// Index of the offending branch instruction
        position: usize,
    },

    /// A signature matched zero candidates.
    ///
    /// This is the expected outcome when a client release changed shape; patch operations
    /// report it as a failed patch rather than aborting the batch.
    #[error("Target not found - {0}")]
    NotFound(String),

    /// A structural edit was refused because it would orphan a jump target or exception bound.
    ///
    /// The affected method body is left exactly as it was before the call.
    #[error("Unsupported edit - {0}")]
    UnsupportedEdit(String),

    /// An edit produced a jump or exception bound that no longer resolves.
    ///
    /// Reaching this indicates a defect in the editor, not a recoverable condition.
    #[error("Structural invariant violated - {0}")]
    StructuralInvariant(String),
}
