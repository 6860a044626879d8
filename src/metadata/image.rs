//! Assembled metadata view over a loaded PE file.
//!
//! [`CilImage`] locates the Cor20 header through the CLR data directory,
//! reads the metadata root, and wires up the heaps and the tables stream.
//! It borrows the [`File`]; the file must outlive the image, and the image
//! must outlive any hasher constructed over it.

use crate::{
    file::File,
    metadata::{
        cor20::Cor20Header,
        root::Root,
        streams::{Blob, Guid, Strings, TablesHeader},
    },
    Result,
};

/// Parsed metadata of one .NET PE image: Cor20 header, heaps and tables.
pub struct CilImage<'a> {
    file: &'a File,
    /// The CLR runtime header
    pub cor20: Cor20Header,
    /// The `#Strings` heap
    pub strings: Strings<'a>,
    /// The `#Blob` heap
    pub blob: Blob<'a>,
    /// The `#GUID` heap, if present
    pub guid: Option<Guid<'a>>,
    /// The `#~` tables stream
    pub tables: TablesHeader<'a>,
}

impl<'a> CilImage<'a> {
    /// Parse the metadata of a loaded PE file.
    ///
    /// ## Arguments
    /// * 'file' - The loaded PE image
    ///
    /// # Errors
    /// Returns an error if the Cor20 header, metadata root, or any required
    /// stream is missing or malformed.
    pub fn new(file: &'a File) -> Result<CilImage<'a>> {
        let (clr_rva, clr_size) = file.clr();
        if clr_size < 72 {
            return Err(malformed_error!(
                "CLR runtime header directory too small - {}",
                clr_size
            ));
        }

        let cor20 = Cor20Header::read(file.data_at_rva(clr_rva, 72)?)?;

        let meta = file.data_at_rva(
            cor20.meta_data_rva as usize,
            cor20.meta_data_size as usize,
        )?;
        let root = Root::read(meta)?;

        let stream_slice = |name: &str| -> Result<Option<&'a [u8]>> {
            match root.stream(name) {
                Some(header) => {
                    let start = header.offset as usize;
                    let Some(end) = start.checked_add(header.size as usize) else {
                        return Err(malformed_error!("Stream '{}' overflows metadata", name));
                    };
                    if end > meta.len() {
                        return Err(malformed_error!("Stream '{}' exceeds metadata", name));
                    }
                    Ok(Some(&meta[start..end]))
                }
                None => Ok(None),
            }
        };

        let Some(tables_data) = stream_slice("#~")? else {
            return Err(malformed_error!("Image has no #~ stream"));
        };
        let Some(strings_data) = stream_slice("#Strings")? else {
            return Err(malformed_error!("Image has no #Strings stream"));
        };

        // An image without signatures carries no #Blob stream; hashing still
        // needs a heap object, so fall back to the single-null empty heap.
        const EMPTY_BLOB_HEAP: &[u8] = &[0];
        let blob = match stream_slice("#Blob")? {
            Some(blob_data) => Blob::from(blob_data)?,
            None => Blob::from(EMPTY_BLOB_HEAP)?,
        };

        let guid = match stream_slice("#GUID")? {
            Some(guid_data) => Some(Guid::from(guid_data)?),
            None => None,
        };

        Ok(CilImage {
            file,
            cor20,
            strings: Strings::from(strings_data)?,
            blob,
            guid,
            tables: TablesHeader::from(tables_data)?,
        })
    }

    /// Read the body of an embedded manifest resource.
    ///
    /// Resource bodies live in the blob the Cor20 resources directory points
    /// at; each body is a 4-byte length prefix followed by the data.
    ///
    /// ## Arguments
    /// * '`data_offset`' - The offset from the `ManifestResource` row
    ///
    /// # Errors
    /// Returns an error if the image has no resources directory or the
    /// offset/length fall outside of it.
    pub fn resource_data(&self, data_offset: u32) -> Result<&'a [u8]> {
        if self.cor20.resource_rva == 0 {
            return Err(malformed_error!(
                "Resource body requested but image has no resources directory"
            ));
        }

        if data_offset >= self.cor20.resource_size {
            return Err(malformed_error!(
                "Resource offset {} outside resources directory",
                data_offset
            ));
        }

        let resources = self.file.data_at_rva(
            self.cor20.resource_rva as usize,
            self.cor20.resource_size as usize,
        )?;

        let mut offset = data_offset as usize;
        let length = crate::file::io::read_le_at::<u32>(resources, &mut offset)? as usize;
        if offset + length > resources.len() {
            return Err(malformed_error!(
                "Resource body at {} exceeds resources directory",
                data_offset
            ));
        }

        Ok(&resources[offset..offset + length])
    }
}
