//! Metadata streams of a .NET image.
//!
//! ECMA-335 metadata is organized into named streams located through the
//! metadata root: the `#~` tables stream and the `#Strings`, `#Blob`, `#GUID`
//! and `#US` heaps. This module provides safe, reference-based accessors for
//! the streams the surface hasher consumes.
//!
//! # Key Components
//!
//! - [`StreamHeader`] - Name, offset and size of one stream
//! - [`Strings`] - UTF-8 identifier heap
//! - [`Blob`] - Binary blob heap (signatures, attribute values)
//! - [`Guid`] - 16-byte GUID heap (module MVIDs)
//! - [`TablesHeader`] - The `#~` stream with all metadata tables
//!
//! # References
//!
//! - [ECMA-335 II.24.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

mod blob;
mod guid;
mod streamheader;
mod strings;
mod tablesheader;

pub use blob::Blob;
pub use guid::Guid;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tablesheader::TablesHeader;
