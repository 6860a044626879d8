//! Raw row readers for assembly-level tables: the manifest, assembly and
//! module references, type specifications, exported types and manifest
//! resources.

use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

#[derive(Clone, Debug)]
/// The `Assembly` table holds the manifest of the current assembly; at most
/// one row. `TableId` = 0x20
pub struct AssemblyRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// the hash algorithm used for files in the assembly
    pub hash_alg_id: u32,
    /// `MajorVersion`
    pub major_version: u16,
    /// `MinorVersion`
    pub minor_version: u16,
    /// `BuildNumber`
    pub build_number: u16,
    /// `RevisionNumber`
    pub revision_number: u16,
    /// a 4-byte bitmask of type `AssemblyFlags`
    pub flags: u32,
    /// an index into the Blob heap
    pub public_key: u32,
    /// an index into the String heap
    pub name: u32,
    /// an index into the String heap
    pub culture: u32,
}

impl RowReadable for AssemblyRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* hash_alg_id */     4 +
            /* version (4x u16) */ 8 +
            /* flags */           4 +
            /* public_key */      sizes.blob_bytes() +
            /* name */            sizes.str_bytes() +
            /* culture */         sizes.str_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(AssemblyRaw {
            rid,
            token: Token::new(TableId::Assembly.token_base() + rid),
            hash_alg_id: read_le_at::<u32>(data, offset)?,
            major_version: read_le_at::<u16>(data, offset)?,
            minor_version: read_le_at::<u16>(data, offset)?,
            build_number: read_le_at::<u16>(data, offset)?,
            revision_number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            public_key: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            culture: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `AssemblyRef` table references the assemblies this module depends on. `TableId` = 0x23
pub struct AssemblyRefRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// `MajorVersion`
    pub major_version: u16,
    /// `MinorVersion`
    pub minor_version: u16,
    /// `BuildNumber`
    pub build_number: u16,
    /// `RevisionNumber`
    pub revision_number: u16,
    /// a 4-byte bitmask of type `AssemblyFlags`
    pub flags: u32,
    /// an index into the Blob heap, full key or its 8-byte token
    pub public_key_or_token: u32,
    /// an index into the String heap
    pub name: u32,
    /// an index into the String heap
    pub culture: u32,
    /// an index into the Blob heap
    pub hash_value: u32,
}

impl RowReadable for AssemblyRefRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* version (4x u16) */    8 +
            /* flags */               4 +
            /* public_key_or_token */ sizes.blob_bytes() +
            /* name */                sizes.str_bytes() +
            /* culture */             sizes.str_bytes() +
            /* hash_value */          sizes.blob_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(AssemblyRefRaw {
            rid,
            token: Token::new(TableId::AssemblyRef.token_base() + rid),
            major_version: read_le_at::<u16>(data, offset)?,
            minor_version: read_le_at::<u16>(data, offset)?,
            build_number: read_le_at::<u16>(data, offset)?,
            revision_number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            public_key_or_token: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            culture: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            hash_value: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `ModuleRef` table references external modules. `TableId` = 0x1A
pub struct ModuleRefRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into the String heap
    pub name: u32,
}

impl RowReadable for ModuleRefRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* name */ sizes.str_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ModuleRefRaw {
            rid,
            token: Token::new(TableId::ModuleRef.token_base() + rid),
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `TypeSpec` table stores signatures of constructed types. `TableId` = 0x1B
pub struct TypeSpecRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into the Blob heap, a `TypeSpecSig`
    pub signature: u32,
}

impl RowReadable for TypeSpecRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* signature */ sizes.blob_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(TypeSpecRaw {
            rid,
            token: Token::new(TableId::TypeSpec.token_base() + rid),
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `ExportedType` table lists types forwarded to or exported from other
/// modules of the assembly. `TableId` = 0x27
pub struct ExportedTypeRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// a 4-byte bitmask of type `TypeAttributes`
    pub flags: u32,
    /// a hint to the `TypeDef` token in the target module, may be stale
    pub type_def_id: u32,
    /// an index into the String heap
    pub type_name: u32,
    /// an index into the String heap
    pub type_namespace: u32,
    /// an index into the File, `AssemblyRef` or `ExportedType` table; more precisely, an `Implementation`
    pub implementation: CodedIndex,
}

impl RowReadable for ExportedTypeRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* flags */          4 +
            /* type_def_id */    4 +
            /* type_name */      sizes.str_bytes() +
            /* type_namespace */ sizes.str_bytes() +
            /* implementation */ sizes.coded_index_bytes(CodedIndexType::Implementation)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ExportedTypeRaw {
            rid,
            token: Token::new(TableId::ExportedType.token_base() + rid),
            flags: read_le_at::<u32>(data, offset)?,
            type_def_id: read_le_at::<u32>(data, offset)?,
            type_name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            implementation: CodedIndex::read(data, offset, sizes, CodedIndexType::Implementation)?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `ManifestResource` table lists the resources of the assembly. `TableId` = 0x28
pub struct ManifestResourceRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// byte offset of the resource body within the CLI resources blob
    pub data_offset: u32,
    /// a 4-byte bitmask of type `ManifestResourceAttributes`
    pub flags: u32,
    /// an index into the String heap
    pub name: u32,
    /// an index into the File or `AssemblyRef` table, or null for embedded resources
    pub implementation: CodedIndex,
}

impl RowReadable for ManifestResourceRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* data_offset */    4 +
            /* flags */          4 +
            /* name */           sizes.str_bytes() +
            /* implementation */ sizes.coded_index_bytes(CodedIndexType::Implementation)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ManifestResourceRaw {
            rid,
            token: Token::new(TableId::ManifestResource.token_base() + rid),
            data_offset: read_le_at::<u32>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            implementation: CodedIndex::read(data, offset, sizes, CodedIndexType::Implementation)?,
        })
    }
}
