// Copyright 2025-2026 Johann Kempter
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

//! # dotsurf
//!
//! A cross-platform library for computing **API-surface hashes** of .NET
//! assemblies. Built in pure Rust, `dotsurf` parses ECMA-335 metadata
//! directly from PE executables, without requiring Windows or the .NET
//! runtime, and folds everything a referencing compiler can observe into a
//! single 64-bit value.
//!
//! Two assemblies that differ only in implementation details (method
//! bodies, private members, local names, compiler-generated plumbing)
//! produce the **same** hash; any change observable to a consumer (public
//! signatures, visibility, base types, constants, attributes, struct
//! layouts) changes it with overwhelming probability. Build systems use the
//! hash as a cache key: if a dependency's surface hash is unchanged, its
//! dependents need not be rebuilt.
//!
//! The hash is FNV-1a based and deliberately **not** cryptographic; it is a
//! cache key, not a tamper seal, and has no stability guarantee across
//! versions of this library.
//!
//! # Architecture
//!
//! - **File Layer**: Memory-mapped PE access and binary parsing
//! - **Metadata Layer**: ECMA-335 headers, heaps and the `#~` tables stream
//! - **Surface Layer**: Classification, signature hashing and the
//!   top-level traversal
//!
//! ## Key Components
//!
//! - [`surface_hash_from_path`] / [`surface_hash_from_mem`] - One-shot entry points
//! - [`crate::File`] - PE container access
//! - [`crate::metadata::CilImage`] - Parsed metadata of one image
//! - [`crate::SurfaceHasher`] - The traversal and hash orchestrator
//! - [`crate::Error`] and [`crate::Result`] - Error handling
//!
//! # Usage Examples
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotsurf::{surface_hash_from_path, SurfaceHashOptions};
//! use std::path::Path;
//!
//! let hash = surface_hash_from_path(Path::new("MyLib.dll"), SurfaceHashOptions::empty())?;
//! println!("surface hash: {hash:#018x}");
//! # Ok::<(), dotsurf::Error>(())
//! ```
//!
//! ## Staged API
//!
//! ```rust,no_run
//! use dotsurf::{metadata::CilImage, File, SurfaceHasher, SurfaceHashOptions};
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("MyLib.dll"))?;
//! let image = CilImage::new(&file)?;
//! let hash = SurfaceHasher::new(&image, SurfaceHashOptions::empty()).hash()?;
//! # Ok::<(), dotsurf::Error>(())
//! ```

#[macro_use]
mod error;

pub mod hashing;
pub mod metadata;
pub mod surface;

mod file;

pub use error::Error;
pub use file::parser::Parser;
pub use file::File;
pub use surface::{SurfaceHashOptions, SurfaceHasher};

use std::path::Path;

/// Convenience `Result` type used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Compute the API-surface hash of an assembly on disk.
///
/// The file is memory-mapped, parsed, traversed and dropped; no state is
/// retained between invocations.
///
/// # Arguments
/// * `path` - Path to a PE32/PE32+ image containing CLI metadata
/// * `options` - Hashing options
///
/// # Errors
/// Returns an error if the file cannot be read or is not a well-formed
/// .NET assembly.
pub fn surface_hash_from_path(path: &Path, options: SurfaceHashOptions) -> Result<u64> {
    let file = File::from_file(path)?;
    let image = metadata::CilImage::new(&file)?;
    SurfaceHasher::new(&image, options).hash()
}

/// Compute the API-surface hash of an assembly already in memory.
///
/// # Arguments
/// * `data` - The bytes of a PE32/PE32+ image containing CLI metadata
/// * `options` - Hashing options
///
/// # Errors
/// Returns an error if the data is not a well-formed .NET assembly.
pub fn surface_hash_from_mem(data: Vec<u8>, options: SurfaceHashOptions) -> Result<u64> {
    let file = File::from_mem(data)?;
    let image = metadata::CilImage::new(&file)?;
    SurfaceHasher::new(&image, options).hash()
}
