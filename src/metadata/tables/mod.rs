//! Metadata table infrastructure and raw row readers.
//!
//! The `#~` stream stores all metadata tables back to back, in table-id
//! order, with index field widths that depend on heap and table sizes. This
//! module provides the shared plumbing ([`TableId`], [`TableInfo`],
//! [`CodedIndex`], [`MetadataTable`]) plus `*Raw` row readers for the tables
//! the surface hasher consumes. Tables with no bearing on the API surface
//! (pointer indirection tables, marshalling, security, EnC, ...) are sized
//! via [`TableInfo::row_bytes`] and skipped.
//!
//! # References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Partition II, Section 22

mod assembly;
mod codedindex;
mod defs;
mod info;
mod members;
mod table;

pub use assembly::{
    AssemblyRaw, AssemblyRefRaw, ExportedTypeRaw, ManifestResourceRaw, ModuleRefRaw, TypeSpecRaw,
};
pub use codedindex::{CodedIndex, CodedIndexType};
pub use defs::{FieldRaw, MethodDefRaw, ModuleRaw, ParamRaw, TypeDefRaw, TypeRefRaw};
pub use info::{TableInfo, TableInfoRef, TableRowInfo};
pub use members::{
    ConstantRaw, CustomAttributeRaw, EventMapRaw, EventRaw, GenericParamConstraintRaw,
    GenericParamRaw, InterfaceImplRaw, MemberRefRaw, MethodSemanticsRaw, NestedClassRaw,
    PropertyMapRaw, PropertyRaw, SEMANTICS_ADD_ON, SEMANTICS_GETTER, SEMANTICS_REMOVE_ON,
    SEMANTICS_SETTER,
};
pub use table::MetadataTable;

use crate::Result;
use strum::{EnumCount, EnumIter};

/// All metadata tables that can appear in the `#~` stream of a PE image,
/// with their ECMA-335 table numbers as discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
#[repr(usize)]
pub enum TableId {
    /// Current module descriptor. `TableId` = 0x00
    Module = 0x00,
    /// References to types defined in other modules. `TableId` = 0x01
    TypeRef = 0x01,
    /// Type definitions of this module. `TableId` = 0x02
    TypeDef = 0x02,
    /// Field indirection for edit-and-continue. `TableId` = 0x03
    FieldPtr = 0x03,
    /// Field definitions. `TableId` = 0x04
    Field = 0x04,
    /// Method indirection for edit-and-continue. `TableId` = 0x05
    MethodPtr = 0x05,
    /// Method definitions. `TableId` = 0x06
    MethodDef = 0x06,
    /// Param indirection for edit-and-continue. `TableId` = 0x07
    ParamPtr = 0x07,
    /// Method parameter definitions. `TableId` = 0x08
    Param = 0x08,
    /// Interface implementations. `TableId` = 0x09
    InterfaceImpl = 0x09,
    /// References to members of other types. `TableId` = 0x0A
    MemberRef = 0x0A,
    /// Compile-time constant values. `TableId` = 0x0B
    Constant = 0x0B,
    /// Custom attribute applications. `TableId` = 0x0C
    CustomAttribute = 0x0C,
    /// Marshalling descriptors. `TableId` = 0x0D
    FieldMarshal = 0x0D,
    /// Declarative security. `TableId` = 0x0E
    DeclSecurity = 0x0E,
    /// Type layout information. `TableId` = 0x0F
    ClassLayout = 0x0F,
    /// Explicit field offsets. `TableId` = 0x10
    FieldLayout = 0x10,
    /// Standalone signatures. `TableId` = 0x11
    StandAloneSig = 0x11,
    /// Maps types to their events. `TableId` = 0x12
    EventMap = 0x12,
    /// Event indirection for edit-and-continue. `TableId` = 0x13
    EventPtr = 0x13,
    /// Event definitions. `TableId` = 0x14
    Event = 0x14,
    /// Maps types to their properties. `TableId` = 0x15
    PropertyMap = 0x15,
    /// Property indirection for edit-and-continue. `TableId` = 0x16
    PropertyPtr = 0x16,
    /// Property definitions. `TableId` = 0x17
    Property = 0x17,
    /// Links accessor methods to properties and events. `TableId` = 0x18
    MethodSemantics = 0x18,
    /// Explicit method overrides. `TableId` = 0x19
    MethodImpl = 0x19,
    /// References to external modules. `TableId` = 0x1A
    ModuleRef = 0x1A,
    /// Type specification signatures. `TableId` = 0x1B
    TypeSpec = 0x1B,
    /// P/Invoke mappings. `TableId` = 0x1C
    ImplMap = 0x1C,
    /// Field initial data locations. `TableId` = 0x1D
    FieldRVA = 0x1D,
    /// Edit-and-continue log. `TableId` = 0x1E
    EncLog = 0x1E,
    /// Edit-and-continue mapping. `TableId` = 0x1F
    EncMap = 0x1F,
    /// The assembly manifest. `TableId` = 0x20
    Assembly = 0x20,
    /// Processor targeting (unused). `TableId` = 0x21
    AssemblyProcessor = 0x21,
    /// OS targeting (unused). `TableId` = 0x22
    AssemblyOS = 0x22,
    /// References to external assemblies. `TableId` = 0x23
    AssemblyRef = 0x23,
    /// Processor targeting of references (unused). `TableId` = 0x24
    AssemblyRefProcessor = 0x24,
    /// OS targeting of references (unused). `TableId` = 0x25
    AssemblyRefOS = 0x25,
    /// Files in a multi-file assembly. `TableId` = 0x26
    File = 0x26,
    /// Types forwarded to or exported from other modules. `TableId` = 0x27
    ExportedType = 0x27,
    /// Embedded and linked resources. `TableId` = 0x28
    ManifestResource = 0x28,
    /// Nesting relationships between types. `TableId` = 0x29
    NestedClass = 0x29,
    /// Generic parameter definitions. `TableId` = 0x2A
    GenericParam = 0x2A,
    /// Generic method instantiations. `TableId` = 0x2B
    MethodSpec = 0x2B,
    /// Constraints on generic parameters. `TableId` = 0x2C
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// The token base for rows of this table: `rid | (table << 24)`.
    #[must_use]
    pub fn token_base(self) -> u32 {
        (self as u32) << 24
    }
}

/// Trait defining the interface for reading and parsing metadata table rows.
///
/// This trait must be implemented by any type that represents a row in a
/// metadata table. Row identifiers follow the 1-based CLI convention.
pub trait RowReadable: Sized {
    /// Calculates the size in bytes of a single row for this table type.
    ///
    /// Takes into account variable-sized fields such as heap indices and
    /// coded indexes that may be 2 or 4 bytes depending on image shape.
    ///
    /// ## Arguments
    /// * `sizes` - Table size information for this image
    fn row_size(sizes: &TableInfoRef) -> u32;

    /// Reads and parses a single row from the provided byte buffer,
    /// advancing `offset` past the row.
    ///
    /// ## Arguments
    /// * `data` - The byte buffer containing the table data
    /// * `offset` - Current read position, advanced by the bytes consumed
    /// * `rid` - The 1-based row identifier for this entry
    /// * `sizes` - Table size information for parsing variable-sized fields
    ///
    /// # Errors
    /// Returns an error when the buffer contains insufficient data or a
    /// malformed row structure
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::{EnumCount as _, IntoEnumIterator};

    #[test]
    fn ids_match_table_numbers() {
        assert_eq!(TableId::Module as usize, 0x00);
        assert_eq!(TableId::TypeDef as usize, 0x02);
        assert_eq!(TableId::Assembly as usize, 0x20);
        assert_eq!(TableId::GenericParamConstraint as usize, 0x2C);
    }

    #[test]
    fn iteration_is_in_id_order() {
        let ids: Vec<usize> = TableId::iter().map(|id| id as usize).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), TableId::COUNT);
    }

    #[test]
    fn token_base() {
        assert_eq!(TableId::TypeDef.token_base(), 0x0200_0000);
        assert_eq!(TableId::MethodDef.token_base(), 0x0600_0000);
        assert_eq!(TableId::AssemblyRef.token_base(), 0x2300_0000);
    }
}
