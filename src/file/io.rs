//! Low-level safe reading utilities for PE and metadata parsing.
//!
//! This module provides the [`CilIO`] trait for safe, bounds-checked reading
//! of little-endian primitives from byte slices. It is used throughout the
//! file and metadata modules; CLI metadata is little-endian only.

use crate::{Error::OutOfBounds, Result};

/// Trait for implementing type specific safe readers.
///
/// This trait abstracts over reading primitive types from byte slices in a
/// safe and bounds-checked way. It is implemented for the integer types used
/// in PE and metadata parsing.
pub trait CilIO: Sized {
    #[allow(missing_docs)]
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

impl CilIO for u64 {
    type Bytes = [u8; 8];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u64::from_le_bytes(bytes)
    }
}

impl CilIO for u32 {
    type Bytes = [u8; 4];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u32::from_le_bytes(bytes)
    }
}

impl CilIO for u16 {
    type Bytes = [u8; 2];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u16::from_le_bytes(bytes)
    }
}

impl CilIO for u8 {
    type Bytes = [u8; 1];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u8::from_le_bytes(bytes)
    }
}

/// Generic method to safely read T in little-endian from a data stream.
///
/// ## Arguments
/// * 'data' - The data buffer / stream to read from
///
/// # Errors
/// Returns [`OutOfBounds`] if the buffer is too short for T
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Generic method to safely read T from an offset and in little-endian from a data stream.
///
/// ## Arguments
/// * 'data'    - The data buffer / stream to read from
/// * 'offset'  - An offset to read from, will be advanced by the amount of bytes read
///
/// # Errors
/// Returns [`OutOfBounds`] if reading would exceed the data length
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(OutOfBounds);
    };

    *offset += type_len;

    Ok(T::from_le_bytes(read))
}

/// Safely read 4 or 2 bytes from an offset and in little-endian from a data stream.
///
/// Metadata heap and table indexes are 2 bytes wide until the referenced heap
/// or table outgrows `u16`, after which they widen to 4 bytes.
///
/// ## Arguments
/// * 'data'        - The data buffer / stream to read from
/// * 'offset'      - An offset to read from, will be advanced by the amount of bytes read
/// * `is_large`    - Indicates if 2 or 4 bytes should be read
///
/// # Errors
/// Returns [`OutOfBounds`] if reading would exceed the data length
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}
