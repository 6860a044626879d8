//! Table row counts and index size calculation for the `#~` stream.
//!
//! Index fields inside metadata rows are 2 bytes wide until the referenced
//! heap or table outgrows `u16`; [`TableInfo`] captures the row counts of
//! every present table plus the heap size flags and answers all "how wide is
//! this field" questions, including the full row size of each table so that
//! tables this crate does not materialize can be skipped.

use std::sync::Arc;
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::{read_le, read_le_at},
    metadata::tables::{CodedIndexType, TableId},
    Error::OutOfBounds,
    Result,
};

/// Holds information about the size that reference index fields have
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// The count of rows in this table
    pub rows: u32,
    /// Number of bits required to represent any valid row index
    pub bits: u8,
    /// If the count is > `u16::MAX`, the indexes of other tables into this table will be 4 bytes instead of 2
    pub is_large: bool,
}

impl TableRowInfo {
    /// Creates a new `TableRowInfo` instance with the given row count.
    ///
    /// # Arguments
    /// * `rows` - The number of rows in the table
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            let zeros = rows.leading_zeros();
            // Safe: 32 - zeros is always <= 32, fits in u8
            (32 - zeros) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// `TableInfo` holds information regarding the row count and reference index
/// field sizes of all tables in this binary
#[derive(Clone, Default)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_indexes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

/// Cheap-copy reference to a `TableInfo` structure
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Build a new `TableInfo` struct from the `#~` header.
    ///
    /// ## Arguments
    /// * 'data' - The `#~` stream, starting at its header
    /// * '`valid_bitvec`' - The valid bitvector from the header, showing which tables are present
    ///
    /// # Errors
    /// Returns an error if the table data is insufficient or a table this
    /// crate cannot size is present
    pub fn new(data: &[u8], valid_bitvec: u64) -> Result<Self> {
        // Everything beyond GenericParamConstraint (0x2C) belongs to portable
        // PDB images, which never appear in a PE `#~` stream.
        let known_tables = (1_u64 << (TableId::GenericParamConstraint as usize + 1)) - 1;
        if valid_bitvec & !known_tables != 0 {
            return Err(malformed_error!(
                "Unsupported metadata table present - {:#x}",
                valid_bitvec
            ));
        }

        let mut table_info =
            vec![TableRowInfo::default(); TableId::GenericParamConstraint as usize + 1];
        let mut next_row_offset = 24;

        for table_id in TableId::iter() {
            if data.len() < next_row_offset {
                return Err(OutOfBounds);
            }

            if (valid_bitvec & (1 << table_id as usize)) == 0 {
                continue;
            }

            let row_count = read_le_at::<u32>(data, &mut next_row_offset)?;
            if row_count == 0 {
                continue;
            }

            table_info[table_id as usize] = TableRowInfo::new(row_count);
        }

        let heap_size_flags = read_le::<u8>(&data[6..])?;
        let mut table_info = TableInfo {
            rows: table_info,
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: heap_size_flags & 1 == 1,
            is_large_index_guid: heap_size_flags & 2 == 2,
            is_large_index_blob: heap_size_flags & 4 == 4,
        };

        table_info.calculate_coded_index_bits();

        Ok(table_info)
    }

    #[cfg(test)]
    /// Special constructor for unit-tests
    ///
    /// ## Arguments
    /// * 'valid_tables'    - A slice of tuples, which provides (table_id, row_count) of the valid tables
    /// * 'large_str'       - Specify if the #String heap indexes are 4 or 2 bytes
    /// * 'large_blob'      - Specify if the #Blob heap indexes are 4 or 2 bytes
    /// * 'large_guid'      - Specify if the #GUID heap indexes are 4 or 2 bytes
    pub fn new_test(
        valid_tables: &[(TableId, u32)],
        large_str: bool,
        large_blob: bool,
        large_guid: bool,
    ) -> Self {
        let mut table_info = TableInfo {
            rows: vec![TableRowInfo::default(); TableId::GenericParamConstraint as usize + 1],
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: large_str,
            is_large_index_guid: large_guid,
            is_large_index_blob: large_blob,
        };

        for valid_table in valid_tables {
            table_info.rows[valid_table.0 as usize] = TableRowInfo::new(valid_table.1);
        }

        table_info.calculate_coded_index_bits();
        table_info
    }

    /// Decodes a coded index value into its component table and row index.
    ///
    /// # Arguments
    /// * `value` - The encoded value to decode
    /// * `coded_index_type` - The type of coded index being decoded
    ///
    /// # Errors
    /// Returns an error if the tag value is out of bounds for the coded index type
    pub fn decode_coded_index(
        &self,
        value: u32,
        coded_index_type: CodedIndexType,
    ) -> Result<(TableId, u32)> {
        let tables = coded_index_type.tables();
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let tag_bits = (tables.len() as f32).log2().ceil() as u8;
        let tag_mask = (1 << tag_bits) - 1;

        let tag = value & tag_mask;
        let index = value >> tag_bits;

        if tag as usize >= tables.len() {
            return Err(OutOfBounds);
        }

        Ok((tables[tag as usize], index))
    }

    /// Returns true, if a requested table is larger than 2^16 rows and hence
    /// requires 4 byte indexes instead of 2
    ///
    /// ## Arguments
    /// * `id` - The `TableId` to query
    #[must_use]
    pub fn is_large(&self, id: TableId) -> bool {
        self.rows[id as usize].is_large
    }

    /// Indicates the size of indexes referring into the '#Strings' heap. True means 4 bytes, False is 2 bytes
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Indicates the size of indexes referring into the '#GUID' heap. True means 4 bytes, False is 2 bytes
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// Indicates the size of indexes referring into the '#Blob' heap. True means 4 bytes, False is 2 bytes
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Returns the size of '#Strings' heap indexes in bytes
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.is_large_index_str {
            4
        } else {
            2
        }
    }

    /// Returns the size of '#GUID' heap indexes in bytes
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.is_large_index_guid {
            4
        } else {
            2
        }
    }

    /// Returns the size of '#Blob' heap indexes in bytes
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.is_large_index_blob {
            4
        } else {
            2
        }
    }

    /// Returns the metadata for a specific table.
    ///
    /// # Arguments
    /// * `table` - The `TableId` for which to retrieve metadata
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Returns the number of bits required to represent an index into a specific table.
    #[must_use]
    pub fn table_index_bits(&self, table_id: TableId) -> u8 {
        self.rows[table_id as usize].bits
    }

    /// Returns the number of bytes required to represent an index into a specific table.
    #[must_use]
    pub fn table_index_bytes(&self, table_id: TableId) -> u8 {
        if self.rows[table_id as usize].bits > 16 {
            4
        } else {
            2
        }
    }

    /// Returns the cached bit size for a specific coded index type.
    #[must_use]
    pub fn coded_index_bits(&self, coded_index_type: CodedIndexType) -> u8 {
        self.coded_indexes[coded_index_type as usize]
    }

    /// Returns the cached byte size for a specific coded index reference.
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index_type: CodedIndexType) -> u8 {
        if self.coded_indexes[coded_index_type as usize] > 16 {
            4
        } else {
            2
        }
    }

    /// Returns the full row size in bytes for any metadata table.
    ///
    /// Used to step over tables that the surface hasher has no use for when
    /// walking the `#~` stream; layouts per ECMA-335 §II.22.
    #[must_use]
    #[rustfmt::skip]
    pub fn row_bytes(&self, table_id: TableId) -> u32 {
        let strs = u32::from(self.str_bytes());
        let guid = u32::from(self.guid_bytes());
        let blob = u32::from(self.blob_bytes());
        let idx = |id: TableId| u32::from(self.table_index_bytes(id));
        let ci = |ty: CodedIndexType| u32::from(self.coded_index_bytes(ty));

        match table_id {
            TableId::Module                 => 2 + strs + 3 * guid,
            TableId::TypeRef                => ci(CodedIndexType::ResolutionScope) + 2 * strs,
            TableId::TypeDef                => 4 + 2 * strs + ci(CodedIndexType::TypeDefOrRef) + idx(TableId::Field) + idx(TableId::MethodDef),
            TableId::FieldPtr               => idx(TableId::Field),
            TableId::Field                  => 2 + strs + blob,
            TableId::MethodPtr              => idx(TableId::MethodDef),
            TableId::MethodDef              => 8 + strs + blob + idx(TableId::Param),
            TableId::ParamPtr               => idx(TableId::Param),
            TableId::Param                  => 4 + strs,
            TableId::InterfaceImpl          => idx(TableId::TypeDef) + ci(CodedIndexType::TypeDefOrRef),
            TableId::MemberRef              => ci(CodedIndexType::MemberRefParent) + strs + blob,
            TableId::Constant               => 2 + ci(CodedIndexType::HasConstant) + blob,
            TableId::CustomAttribute        => ci(CodedIndexType::HasCustomAttribute) + ci(CodedIndexType::CustomAttributeType) + blob,
            TableId::FieldMarshal           => ci(CodedIndexType::HasFieldMarshal) + blob,
            TableId::DeclSecurity           => 2 + ci(CodedIndexType::HasDeclSecurity) + blob,
            TableId::ClassLayout            => 6 + idx(TableId::TypeDef),
            TableId::FieldLayout            => 4 + idx(TableId::Field),
            TableId::StandAloneSig          => blob,
            TableId::EventMap               => idx(TableId::TypeDef) + idx(TableId::Event),
            TableId::EventPtr               => idx(TableId::Event),
            TableId::Event                  => 2 + strs + ci(CodedIndexType::TypeDefOrRef),
            TableId::PropertyMap            => idx(TableId::TypeDef) + idx(TableId::Property),
            TableId::PropertyPtr            => idx(TableId::Property),
            TableId::Property               => 2 + strs + blob,
            TableId::MethodSemantics        => 2 + idx(TableId::MethodDef) + ci(CodedIndexType::HasSemantics),
            TableId::MethodImpl             => idx(TableId::TypeDef) + 2 * ci(CodedIndexType::MethodDefOrRef),
            TableId::ModuleRef              => strs,
            TableId::TypeSpec               => blob,
            TableId::ImplMap                => 2 + ci(CodedIndexType::MemberForwarded) + strs + idx(TableId::ModuleRef),
            TableId::FieldRVA               => 4 + idx(TableId::Field),
            TableId::EncLog                 => 8,
            TableId::EncMap                 => 4,
            TableId::Assembly               => 16 + blob + 2 * strs,
            TableId::AssemblyProcessor      => 4,
            TableId::AssemblyOS             => 12,
            TableId::AssemblyRef            => 12 + 2 * blob + 2 * strs,
            TableId::AssemblyRefProcessor   => 4 + idx(TableId::AssemblyRef),
            TableId::AssemblyRefOS          => 12 + idx(TableId::AssemblyRef),
            TableId::File                   => 4 + strs + blob,
            TableId::ExportedType           => 8 + 2 * strs + ci(CodedIndexType::Implementation),
            TableId::ManifestResource       => 8 + strs + ci(CodedIndexType::Implementation),
            TableId::NestedClass            => 2 * idx(TableId::TypeDef),
            TableId::GenericParam           => 4 + ci(CodedIndexType::TypeOrMethodDef) + strs,
            TableId::MethodSpec             => ci(CodedIndexType::MethodDefOrRef) + blob,
            TableId::GenericParamConstraint => idx(TableId::GenericParam) + ci(CodedIndexType::TypeDefOrRef),
        }
    }

    /// Calculates the number of bits required for a specific coded index type.
    fn calculate_coded_index_size(&self, coded_index_type: CodedIndexType) -> u8 {
        let tables = coded_index_type.tables();
        let max_bits = tables
            .iter()
            .map(|table| self.table_index_bits(*table))
            .max()
            .unwrap_or(1);

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let tag_bits = (tables.len() as f32).log2().ceil() as u8;
        max_bits + tag_bits
    }

    /// Calculates and caches the bit sizes required for all coded index types.
    fn calculate_coded_index_bits(&mut self) {
        for coded_index in CodedIndexType::iter() {
            let size = self.calculate_coded_index_size(coded_index);
            self.coded_indexes[coded_index as usize] = size;
        }
    }
}
