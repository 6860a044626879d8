//! ECMA-335 metadata parsing: headers, heaps and tables.
//!
//! This module contains everything needed to go from a raw PE image to typed
//! metadata access: the Cor20 header, the metadata root with its stream
//! directory, the heaps, the `#~` tables stream, and [`CilImage`] which wires
//! all of it together over a borrowed [`crate::File`].

pub mod cor20;
pub mod root;
pub mod streams;
pub mod tables;
pub mod token;

mod image;

pub use image::CilImage;
