//! Blob Heap (`#Blob`) for .NET Metadata
//!
//! Provides access to the ECMA-335 `#Blob` heap, which stores binary data
//! such as signatures and custom attribute values. Each valid blob carries
//! its size in a compressed prefix.
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{Error::OutOfBounds, Result};

/// '#Blob' points to streams of bytes. Each 'valid' blob is pointed to by
/// another table index, and each encodes its size in the first bytes:
///
/// * If the first byte is 0bbbbbbb, the blob contains bbbbbbb bytes of data.
/// * If the first two bytes are 10bbbbbb and x, the blob contains
///   (bbbbbb << 8 + x) bytes of data.
/// * If the first four bytes are 110bbbbb, x, y, and z, the blob contains
///   (bbbbb << 24 + x << 16 + y << 8 + z) bytes of data.
///
/// # Examples
///
/// ```rust
/// use dotsurf::metadata::streams::Blob;
/// let data = &[0u8, 0x03, 0x41, 0x42, 0x43];
/// let blob = Blob::from(data).unwrap();
/// let b = blob.get(1).unwrap();
/// assert_eq!(b, &[0x41, 0x42, 0x43]);
/// ```
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Create a `Blob` object from a sequence of bytes
    ///
    /// # Arguments
    /// * 'data'    - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the data is empty or doesn't start with a null
    /// byte (invalid blob heap format)
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob { data })
    }

    /// Get a view into the bytes contained at the provided location.
    ///
    /// ## Arguments
    /// * 'index' - The offset within the blob to be accessed (comes from metadata tables)
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds or if the size prefix
    /// is invalid
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let (skip, len) = if (self.data[index] >> 7) & 1 == 0 {
            (1, (self.data[index]) as usize)
        } else if (self.data[index] >> 6) & 1 == 0 {
            if index + 1 >= self.data.len() {
                return Err(OutOfBounds);
            }

            let size_p_1 = (self.data[index] & 0b_0011_1111_u8) as usize;
            let size_p_2 = self.data[index + 1] as usize;

            (2, (size_p_1 << 8) + size_p_2)
        } else if (self.data[index] >> 5) & 1 == 0 {
            if index + 3 >= self.data.len() {
                return Err(OutOfBounds);
            }

            let size_p_1 = (self.data[index] & 0b_0001_1111_u8) as usize;
            let size_p_2 = self.data[index + 1] as usize;
            let size_p_3 = self.data[index + 2] as usize;
            let size_p_4 = self.data[index + 3] as usize;

            (
                4,
                (size_p_1 << 24) + (size_p_2 << 16) + (size_p_3 << 8) + size_p_4,
            )
        } else {
            return Err(malformed_error!("Invalid blob index - {}", index));
        };

        let Some(data_start) = index.checked_add(skip) else {
            return Err(OutOfBounds);
        };

        let Some(data_end) = data_start.checked_add(len) else {
            return Err(OutOfBounds);
        };

        if data_start > self.data.len() || data_end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.data[data_start..data_end])
    }
}
