//! GUID Heap (`#GUID`) for .NET Metadata
//!
//! Provides access to the ECMA-335 `#GUID` heap, which stores 16-byte GUIDs
//! referenced by 1-based index from the metadata tables (most prominently
//! the module MVID).
//!
//! # Reference
//! - [ECMA-335 II.24.2.5](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{Error::OutOfBounds, Result};

/// '#GUID' is a simple array of 16-byte GUIDs. Indexes are 1-based; index 0
/// denotes "no GUID".
pub struct Guid<'a> {
    data: &'a [u8],
}

impl<'a> Guid<'a> {
    /// Create a `Guid` object from a sequence of bytes
    ///
    /// # Arguments
    /// * 'data'    - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the heap size is not a multiple of 16
    pub fn from(data: &'a [u8]) -> Result<Guid<'a>> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "Invalid #GUID heap size - {}",
                data.len()
            ));
        }

        Ok(Guid { data })
    }

    /// Get the GUID at the provided 1-based index.
    ///
    /// ## Arguments
    /// * 'index' - The 1-based index of the GUID (comes from metadata tables)
    ///
    /// # Errors
    /// Returns an error if the index is 0 or out of bounds
    pub fn get(&self, index: usize) -> Result<[u8; 16]> {
        if index == 0 {
            return Err(OutOfBounds);
        }

        let start = (index - 1) * 16;
        let Some(end) = start.checked_add(16) else {
            return Err(OutOfBounds);
        };

        if end > self.data.len() {
            return Err(OutOfBounds);
        }

        let mut guid = [0_u8; 16];
        guid.copy_from_slice(&self.data[start..end]);
        Ok(guid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let mut data = vec![0_u8; 32];
        data[0..16].copy_from_slice(&[0x11; 16]);
        data[16..32].copy_from_slice(&[0x22; 16]);

        let guids = Guid::from(&data).unwrap();

        assert_eq!(guids.get(1).unwrap(), [0x11; 16]);
        assert_eq!(guids.get(2).unwrap(), [0x22; 16]);

        assert!(matches!(guids.get(0), Err(OutOfBounds)));
        assert!(matches!(guids.get(3), Err(OutOfBounds)));
    }

    #[test]
    fn crafted_invalid() {
        let data = [0_u8; 17];
        if Guid::from(&data).is_ok() {
            panic!("This should not be valid!")
        }
    }
}
