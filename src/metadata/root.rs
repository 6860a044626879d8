//! Metadata root header and stream directory for .NET assemblies.
//!
//! This module defines the [`Root`] struct, which represents the root
//! metadata header and stream directory as specified by ECMA-335. The
//! metadata root is the entry point for reading .NET assembly metadata: it
//! contains the version string and the directory required to locate all
//! metadata streams (`#~`, `#Strings`, `#Blob`, ...).
//!
//! # References
//!
//! - [ECMA-335 II.24.2.1: Metadata root](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// The MAGIC value indicating the CIL header
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The header of the present Metadata, providing necessary information for
/// parsing. The [`Root`] struct gives access to the version string and all
/// stream headers required to parse .NET assembly metadata.
pub struct Root {
    /// Magic signature for physical metadata: 0x424A5342
    pub signature: u32,
    /// `MajorVersion`
    pub major_version: u16,
    /// `MinorVersion`
    pub minor_version: u16,
    /// Number of bytes allocated to hold version string
    pub length: u32,
    /// 'VersionString\0'
    pub version: String,
    /// Number of Streams
    pub stream_number: u16,
    /// Streams
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Reads a [`Root`] metadata header from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice from which this object shall be read
    ///
    /// # Errors
    /// Returns an error if the data is too short, the signature is invalid,
    /// or the stream directory is malformed.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 36 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {}",
                signature
            ));
        }

        let version_string_length = read_le_at::<u32>(data, &mut (12))?;
        match u32::checked_add(version_string_length, 16_u32) {
            Some(str_end) => {
                let data_len = u32::try_from(data.len())
                    .map_err(|_| malformed_error!("Data length too large"))?;
                if str_end > data_len {
                    return Err(OutOfBounds);
                }
            }
            None => {
                return Err(malformed_error!(
                    "Version string length causing integer overflow - {} + {}",
                    version_string_length,
                    16
                ))
            }
        }

        let mut version_string = String::with_capacity(version_string_length as usize);
        for counter in 0..version_string_length {
            let version_char = read_le_at::<u8>(data, &mut (16 + counter as usize))?;
            if version_char == 0 {
                break;
            }

            version_string.push(char::from(version_char));
        }

        if version_string.is_empty() {
            return Err(malformed_error!("Version string cannot be empty"));
        }

        if !version_string.starts_with('v') {
            return Err(malformed_error!(
                "Version string '{}' must start with 'v' (ECMA-335 II.24.2.1)",
                version_string
            ));
        }

        if version_string.len() > 255 {
            return Err(malformed_error!(
                "Version string length {} exceeds reasonable limit (255)",
                version_string.len()
            ));
        }

        let stream_count = read_le_at::<u16>(data, &mut (16 + version_string_length as usize + 2))?;
        if stream_count == 0 || stream_count > 6 || (stream_count * 9) as usize > data.len() {
            // 9 - min size that a valid StreamHeader can be; No duplicates, no more than 6 possible
            return Err(malformed_error!("Invalid stream count"));
        }

        let mut streams = Vec::with_capacity(stream_count as usize);
        let mut stream_offset = 16 + version_string_length as usize + 4;
        let mut streams_seen = [false; 5];

        for _ in 0..stream_count {
            if stream_offset > data.len() {
                return Err(OutOfBounds);
            }

            let new_stream = StreamHeader::from(&data[stream_offset..])?;
            if new_stream.offset as usize > data.len()
                || new_stream.size as usize > data.len()
                || new_stream.name.len() > 32
            {
                return Err(OutOfBounds);
            }

            match u32::checked_add(new_stream.offset, new_stream.size) {
                Some(range) => {
                    if range as usize > data.len() {
                        return Err(OutOfBounds);
                    }
                }
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        new_stream.offset,
                        new_stream.size
                    ))
                }
            }

            let stream_index = match new_stream.name.as_str() {
                "#Strings" => 0,
                "#US" => 1,
                "#Blob" => 2,
                "#GUID" => 3,
                "#~" => 4,
                _ => unreachable!("StreamHeader::from() should have validated the name"),
            };

            if streams_seen[stream_index] {
                return Err(malformed_error!(
                    "Duplicate stream name found: '{}'",
                    new_stream.name
                ));
            }
            streams_seen[stream_index] = true;

            let name_aligned = ((new_stream.name.len() + 1) + 3) & !3;
            stream_offset += 8 + name_aligned;

            streams.push(new_stream);
        }

        Ok(Root {
            signature,
            major_version: read_le_at::<u16>(data, &mut (4))?,
            minor_version: read_le_at::<u16>(data, &mut (6))?,
            length: version_string_length,
            version: version_string,
            stream_number: stream_count,
            stream_headers: streams,
        })
    }

    /// Look up a stream header by name.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers
            .iter()
            .find(|header| header.name == name)
    }
}
