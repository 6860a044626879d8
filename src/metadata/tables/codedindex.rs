//! Coded index types for .NET metadata tables.
//!
//! Coded indices are a space-efficient encoding used in CLI metadata to
//! reference one of several possible tables with a single value: the lower
//! bits select the target table, the remaining bits carry the row index.
//!
//! # References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Section II.24.2.6

use strum::{EnumCount, EnumIter};

use crate::{
    file::io::read_le_at,
    metadata::{
        tables::{TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// The coded index combinations defined by the CLI metadata specification
/// that this crate decodes.
///
/// Each variant corresponds to a specific set of tables that can be encoded
/// together. The tag width depends on how many tables the combination spans.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
pub enum CodedIndexType {
    /// References `TypeDef`, `TypeRef`, or `TypeSpec` tables.
    TypeDefOrRef,

    /// References `Field`, `Param`, or `Property` tables.
    ///
    /// Used to identify entities that can have constant values assigned.
    HasConstant,

    /// References any entity that can have custom attributes attached.
    HasCustomAttribute,

    /// References `Field` or `Param` tables (marshalling descriptors).
    HasFieldMarshal,

    /// References `TypeDef`, `MethodDef`, or `Assembly` tables.
    HasDeclSecurity,

    /// References `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef`, or
    /// `TypeSpec` tables. Used as the parent reference for member references.
    MemberRefParent,

    /// References `Event` or `Property` tables.
    ///
    /// Used to identify entities that have semantic methods (getter, setter,
    /// adder, remover) associated with them.
    HasSemantics,

    /// References `MethodDef` or `MemberRef` tables.
    MethodDefOrRef,

    /// References `Field` or `MethodDef` tables (P/Invoke forwarding).
    MemberForwarded,

    /// References `File`, `AssemblyRef`, or `ExportedType` tables.
    ///
    /// Used to specify the implementation location for exported types and
    /// manifest resources.
    Implementation,

    /// References `MethodDef` or `MemberRef` tables.
    ///
    /// Used to identify the constructor methods for custom attributes.
    /// Note: tags 0, 1 and 4 are normally unused but supported by the
    /// encoding scheme.
    CustomAttributeType,

    /// References `Module`, `ModuleRef`, `AssemblyRef`, or `TypeRef` tables.
    ///
    /// Used to specify the scope in which a type reference resolves.
    ResolutionScope,

    /// References `TypeDef` or `MethodDef` tables (generic parameter owners).
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// Returns the table IDs that can be referenced by this coded index
    /// type, in encoding order (tag 0, 1, 2, ...).
    #[must_use]
    pub fn tables(&self) -> &'static [TableId] {
        match self {
            CodedIndexType::TypeDefOrRef => {
                &[TableId::TypeDef, TableId::TypeRef, TableId::TypeSpec]
            }
            CodedIndexType::HasConstant => &[TableId::Field, TableId::Param, TableId::Property],
            CodedIndexType::HasCustomAttribute => &[
                TableId::MethodDef,
                TableId::Field,
                TableId::TypeRef,
                TableId::TypeDef,
                TableId::Param,
                TableId::InterfaceImpl,
                TableId::MemberRef,
                TableId::Module,
                TableId::DeclSecurity, // In the standard PDF, this is wrongly labeled as 'Permission' (although no such table exists)
                TableId::Property,
                TableId::Event,
                TableId::StandAloneSig,
                TableId::ModuleRef,
                TableId::TypeSpec,
                TableId::Assembly,
                TableId::AssemblyRef,
                TableId::File,
                TableId::ExportedType,
                TableId::ManifestResource,
                TableId::GenericParam,
                TableId::GenericParamConstraint,
                TableId::MethodSpec,
            ],
            CodedIndexType::HasFieldMarshal => &[TableId::Field, TableId::Param],
            CodedIndexType::HasDeclSecurity => {
                &[TableId::TypeDef, TableId::MethodDef, TableId::Assembly]
            }
            CodedIndexType::MemberRefParent => &[
                TableId::TypeDef,
                TableId::TypeRef,
                TableId::ModuleRef,
                TableId::MethodDef,
                TableId::TypeSpec,
            ],
            CodedIndexType::HasSemantics => &[TableId::Event, TableId::Property],
            CodedIndexType::MethodDefOrRef => &[TableId::MethodDef, TableId::MemberRef],
            CodedIndexType::MemberForwarded => &[TableId::Field, TableId::MethodDef],
            CodedIndexType::Implementation => {
                &[TableId::File, TableId::AssemblyRef, TableId::ExportedType]
            }
            CodedIndexType::CustomAttributeType => &[
                TableId::MethodDef,
                TableId::MethodDef,
                TableId::MethodDef,
                TableId::MemberRef,
                TableId::MemberRef,
            ],
            CodedIndexType::ResolutionScope => &[
                TableId::Module,
                TableId::ModuleRef,
                TableId::AssemblyRef,
                TableId::TypeRef,
            ],
            CodedIndexType::TypeOrMethodDef => &[TableId::TypeDef, TableId::MethodDef],
        }
    }
}

/// A decoded representation of a coded index value: the target table, the
/// 1-based row within it, and the equivalent metadata token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodedIndex {
    /// The [`TableId`] this index is referring to.
    pub tag: TableId,

    /// The row ID that this `CodedIndex` is pointing to.
    ///
    /// This is a 1-based index into the specified table. Row 0 is reserved
    /// and indicates a null reference.
    pub row: u32,

    /// The computed metadata token for this coded index.
    pub token: Token,
}

impl CodedIndex {
    /// Reads and decodes a coded index from a byte buffer.
    ///
    /// Automatically reads 2 or 4 bytes depending on the table sizes, then
    /// splits the value into its tag and row components.
    ///
    /// ## Arguments
    ///
    /// * `data` - The byte buffer to read from
    /// * `offset` - Current read position, advanced past the index
    /// * `info` - Table information for size calculations and decoding
    /// * `ci_type` - The specific coded index type to decode
    ///
    /// # Errors
    /// Returns an error if the buffer is too small or the tag value is
    /// invalid for this coded index type.
    pub fn read(
        data: &[u8],
        offset: &mut usize,
        info: &TableInfoRef,
        ci_type: CodedIndexType,
    ) -> Result<Self> {
        let size_needed = info.coded_index_bits(ci_type);
        let coded_index = if size_needed > 16 {
            read_le_at::<u32>(data, offset)?
        } else {
            u32::from(read_le_at::<u16>(data, offset)?)
        };

        let (tag, row) = info.decode_coded_index(coded_index, ci_type)?;
        Ok(CodedIndex::new(tag, row))
    }

    /// Creates a new `CodedIndex` with the specified table and row,
    /// computing the metadata token per the ECMA-335 encoding scheme.
    #[must_use]
    pub fn new(tag: TableId, row: u32) -> CodedIndex {
        CodedIndex {
            tag,
            row,
            token: Token::new(row | (u32::from(tag as u8) << 24)),
        }
    }

    /// Returns true if this index points at row 0 (a null reference).
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row == 0
    }
}
