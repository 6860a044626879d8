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

/// The generic Error type, covering all failures this library can return.
///
/// Every condition that renders an image unusable for surface hashing is a
/// [`Error::Malformed`] (bad signature kinds, out-of-range element codes,
/// missing CLI headers, invalid stream layout). Reads past the end of a
/// buffer surface as [`Error::OutOfBounds`]. There are no partial results:
/// any error aborts the current hashing invocation and the hasher state is
/// dropped with it.
///
/// # Examples
///
/// ```rust,no_run
/// use dotsurf::{surface_hash_from_path, Error, SurfaceHashOptions};
/// use std::path::Path;
///
/// match surface_hash_from_path(Path::new("assembly.dll"), SurfaceHashOptions::empty()) {
///     Ok(hash) => println!("surface hash: {hash:#018x}"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("malformed image: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
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
    ///
    /// The input is not a .NET PE executable (PE32/PE32+ with a CLR runtime
    /// header), or uses a feature this library does not implement.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// Recursion limit reached.
    ///
    /// Signature blobs and struct layouts can nest; a maximum depth is
    /// enforced to prevent stack overflow on crafted inputs. The associated
    /// value is the limit that was hit.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),
}
