//! PE file abstraction for .NET binaries.
//!
//! This module provides access to Portable Executable files containing CLI
//! metadata. It abstracts over different data sources (memory-mapped files,
//! in-memory buffers) behind the [`Backend`] trait and exposes the pieces the
//! metadata layer needs: the CLR runtime header directory, RVA to file offset
//! translation, and bounds-checked slicing of the raw image.
//!
//! Both PE32 and PE32+ images are supported. An image without a CLR runtime
//! header is rejected at load time; netmodule-only files are not supported.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotsurf::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("assembly.dll"))?;
//! let (clr_rva, clr_size) = file.clr();
//! println!("CLR header at RVA 0x{:x}, size: {} bytes", clr_rva, clr_size);
//! # Ok::<(), dotsurf::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use crate::{
    Error::{Empty, GoblinErr},
    Result,
};
use goblin::pe::PE;
use memory::Memory;
use ouroboros::self_referencing;
use physical::Physical;

/// Backend trait for file data sources.
///
/// This trait abstracts over the source of PE data, allowing for both
/// in-memory and on-disk representations.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    /// Returns an error if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

#[self_referencing]
/// A loaded PE file with .NET metadata.
///
/// Wraps the parsed PE and provides access to the CLR runtime header
/// directory, section-based address translation, and the raw image bytes.
/// Loading validates that the image actually is a .NET assembly by checking
/// for the CLR runtime header data directory.
pub struct File {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
    /// The parsed PE structure, referencing the data.
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl File {
    /// Loads a PE file from the given path.
    ///
    /// The file is memory-mapped for efficient access.
    ///
    /// # Arguments
    /// * `file` - Path to the PE file on disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not a valid PE, or
    /// does not contain .NET metadata.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Loads a PE file from a memory buffer.
    ///
    /// # Arguments
    /// * `data` - The bytes of the PE file.
    ///
    /// # Errors
    /// Returns an error if the buffer is empty, is not a valid PE, or does
    /// not contain .NET metadata.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    /// Internal loader for any backend.
    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let data = Box::new(data);

        File::try_new(data, |data| {
            let data = data.as_ref();
            match PE::parse(data.data()) {
                Ok(pe) => match pe.header.optional_header {
                    Some(optional_header) => {
                        if optional_header
                            .data_directories
                            .get_clr_runtime_header()
                            .is_none()
                        {
                            Err(malformed_error!(
                                "File does not have a CLR runtime header directory"
                            ))
                        } else {
                            Ok(pe)
                        }
                    }
                    None => Err(malformed_error!("File does not have an OptionalHeader")),
                },
                Err(error) => Err(GoblinErr(error)),
            }
        })
    }

    /// Returns the total size of the loaded file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_data(|data| data.len())
    }

    /// Returns `true` if the file has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the RVA and size (in bytes) of the CLR runtime header.
    ///
    /// # Panics
    /// Panics if the CLR runtime header is missing. Load validation
    /// guarantees its presence for every successfully constructed `File`.
    #[must_use]
    pub fn clr(&self) -> (usize, usize) {
        self.with_pe(|pe| {
            let optional_header = pe.header.optional_header.unwrap();
            let clr_dir = optional_header
                .data_directories
                .get_clr_runtime_header()
                .unwrap();

            (clr_dir.virtual_address as usize, clr_dir.size as usize)
        })
    }

    /// Returns the raw data of the loaded file.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.with_data(|data| data.data())
    }

    /// Returns a slice of the file data at the given offset and length.
    ///
    /// # Errors
    /// Returns an error if the requested range is out of bounds.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.with_data(|data| data.data_slice(offset, len))
    }

    /// Converts a relative virtual address (RVA) to a file offset.
    ///
    /// # Arguments
    /// * `rva` - The RVA to convert.
    ///
    /// # Errors
    /// Returns an error if the RVA does not fall inside any section.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        self.with_pe(|pe| {
            let rva_u32 = u32::try_from(rva)
                .map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

            for section in &pe.sections {
                let Some(section_max) = section.virtual_address.checked_add(section.virtual_size)
                else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        section.virtual_size
                    ));
                };

                if section.virtual_address <= rva_u32 && section_max > rva_u32 {
                    return Ok((rva - section.virtual_address as usize)
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }

    /// Reads a bounded view at the given RVA.
    ///
    /// # Errors
    /// Returns an error if the RVA is unmapped or the range exceeds the file.
    pub fn data_at_rva(&self, rva: usize, len: usize) -> Result<&[u8]> {
        let offset = self.rva_to_offset(rva)?;
        self.data_slice(offset, len)
    }
}
