use std::path::PathBuf;

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

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Two consequence classes exist and callers are expected to treat them differently:
///
/// ## Fatal errors (abort the whole validation run)
/// - [`Error::ArchiveNotFound`] - The package path does not exist
/// - [`Error::ArchiveCorrupt`] - The package container's central directory cannot be parsed
/// - [`Error::FileError`] - Filesystem I/O failure while opening the package
///
/// ## Per-binary errors (converted into verdicts, never propagated past the evaluator)
/// - [`Error::NoSymbols`] - No debug information source exists for a binary
/// - [`Error::UnreadableSymbols`] - Debug information exists but neither the portable nor
///   the windows format decoder accepts it
/// - [`Error::Malformed`] - Corrupted structure inside a binary or its debug information
/// - [`Error::OutOfBounds`] - A read past the end of a stream was prevented
///
/// One bad binary never prevents reporting on the rest of the package: everything in the
/// second class is caught at the per-binary boundary by the evaluator.
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// This error indicates that a structure is corrupted or doesn't conform to the
    /// expected format. The error includes the source location where the malformation
    /// was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// The package file does not exist at the given path.
    ///
    /// Fatal: there is nothing to validate.
    #[error("Package not found - {0}")]
    ArchiveNotFound(PathBuf),

    /// The package container is unreadable.
    ///
    /// Raised when the archive's central directory cannot be parsed. Fatal: no entry
    /// enumeration is possible, so the whole run aborts.
    #[error("Package archive is corrupt - {0}")]
    ArchiveCorrupt(String),

    /// No debug information exists for a binary.
    ///
    /// Expected, not fatal: the evaluator folds this into a `NoSymbols` verdict for the
    /// affected binary. Default facts are never synthesized in its place.
    #[error("No debug information found")]
    NoSymbols,

    /// Debug information exists but could not be decoded.
    ///
    /// Raised only after both the portable and the windows format decoders have rejected
    /// the data. Becomes a verdict for the affected binary, never a crash.
    #[error("Debug information is present but could not be read")]
    UnreadableSymbols,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),
}
