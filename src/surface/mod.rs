//! API-surface hashing over parsed metadata.
//!
//! This is the core of the crate: deciding which metadata entities a
//! referencing compiler can observe, visiting them in an order independent
//! of on-disk table layout, and folding their semantic content into one
//! 64-bit value.
//!
//! # Key Components
//!
//! - [`SurfaceHasher`] - The top-level traversal and hash orchestrator
//! - [`SurfaceHashOptions`] - Hashing options
//! - [`classifier`] - Surface membership predicates over CLR visibility bits
//! - [`wellknown::WellKnownTypes`] - Lazily populated attribute classification
//! - [`signature::SignatureHasher`] - Streaming ECMA-335 signature hashing
//! - [`cache::HandleCache`] - Per-invocation memoization
//!
//! # Example
//!
//! ```rust,no_run
//! use dotsurf::{surface_hash_from_path, SurfaceHashOptions};
//! use std::path::Path;
//!
//! let hash = surface_hash_from_path(Path::new("MyLib.dll"), SurfaceHashOptions::empty())?;
//! println!("{hash:#018x}");
//! # Ok::<(), dotsurf::Error>(())
//! ```

pub mod cache;
pub mod classifier;
pub mod signature;
pub mod wellknown;

mod hasher;

pub use hasher::SurfaceHasher;

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    /// Options controlling surface hash computation
    pub struct SurfaceHashOptions: u32 {
        /// Disable the well-known attribute filter and hash every custom
        /// attribute, including compiler-generated ones.
        const INCLUDE_ALL_ATTRIBUTES = 0x0001;
    }
}
