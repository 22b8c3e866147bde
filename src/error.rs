use std::{fmt, path::PathBuf};

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
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The pipeline stage an error was raised in.
///
/// Attached to [`Error::Stage`] so the orchestrator can report which file failed and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Computing the content hash of the input assembly
    Hash,
    /// Rewriting type, method and field visibility
    Publicize,
    /// Locating referenced assemblies in the search directories
    Resolve,
    /// Building the hook module
    HookGen,
    /// Serializing an output assembly
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Hash => "hash",
            Stage::Publicize => "publicize",
            Stage::Resolve => "resolve",
            Stage::HookGen => "hookgen",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Input parsing
/// - [`Error::Malformed`] - Corrupted or invalid PE / metadata structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
/// - [`Error::NotSupported`] - Valid but unsupported layout (e.g. uncompressed `#-` tables)
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O and external
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from the goblin crate
///
/// ## Pipeline
/// - [`Error::UnresolvedAssembly`] - A referenced assembly was not found in any search directory
/// - [`Error::ManagedDirNotFound`] - Neither the client nor the server `Managed` directory exists
/// - [`Error::InvalidHash`] - A hex digest could not be parsed
/// - [`Error::Stage`] - Any of the above, annotated with the input file and failing stage
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// Includes the source location where the malformation was detected.
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
    #[error("Out of Bound read would have occurred! - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This file type or metadata layout is not supported.
    #[error("This file type is not supported - {0}")]
    NotSupported(String),

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// A referenced assembly could not be located in any of the search directories.
    #[error("Unable to resolve assembly '{name}' (searched: {searched:?})")]
    UnresolvedAssembly {
        /// Simple name of the referenced assembly
        name: String,
        /// Every directory that was probed, in order
        searched: Vec<PathBuf>,
    },

    /// Neither the client nor the dedicated-server `Managed` directory exists below the game root.
    #[error("No Managed directory found below '{}'", .0.display())]
    ManagedDirNotFound(PathBuf),

    /// A string could not be parsed as a 128-bit hex digest.
    #[error("Invalid content hash - '{0}'")]
    InvalidHash(String),

    /// Failed to lay out or serialize an output image.
    #[error("Failed to write image - {message}")]
    WriteFailed {
        /// Description of what went wrong
        message: String,
    },

    /// A pipeline stage failed for a specific input file.
    #[error("{stage} failed for '{}': {source}", .file.display())]
    Stage {
        /// The input assembly that was being processed
        file: PathBuf,
        /// The stage that failed
        stage: Stage,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps `self` with the file and stage it occurred in.
    ///
    /// Errors that already carry a stage are returned unchanged so the innermost context wins.
    #[must_use]
    pub fn in_stage(self, file: impl Into<PathBuf>, stage: Stage) -> Error {
        match self {
            Error::Stage { .. } => self,
            other => Error::Stage {
                file: file.into(),
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Points a staged error at `file` instead of the file it was raised for.
    ///
    /// Errors without a stage are returned unchanged.
    #[must_use]
    pub fn for_input(self, file: impl Into<PathBuf>) -> Error {
        match self {
            Error::Stage { stage, source, .. } => Error::Stage {
                file: file.into(),
                stage,
                source,
            },
            other => other,
        }
    }

    /// Returns the stage this error was annotated with, if any.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
