//! The `#~` stream: header parsing and typed access to metadata tables.
//!
//! [`TablesHeader`] parses the compressed tables stream of a .NET image. It
//! materializes typed, lazily-parsed views for the tables the surface hasher
//! consumes and steps over everything else by computed row size, so the
//! walk stays independent of which tables an emitter chose to write.
//!
//! ## Reference
//! * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - II.24.2.6 && II.22

use std::sync::Arc;
use strum::IntoEnumIterator;

use crate::{
    file::io::read_le,
    metadata::tables::{
        AssemblyRaw, AssemblyRefRaw, ConstantRaw, CustomAttributeRaw, EventMapRaw, EventRaw,
        ExportedTypeRaw, FieldRaw, GenericParamConstraintRaw, GenericParamRaw, InterfaceImplRaw,
        ManifestResourceRaw, MemberRefRaw, MetadataTable, MethodDefRaw, MethodSemanticsRaw,
        ModuleRaw, ModuleRefRaw, NestedClassRaw, ParamRaw, PropertyMapRaw, PropertyRaw,
        RowReadable, TableId, TableInfo, TableInfoRef, TypeDefRaw, TypeRefRaw, TypeSpecRaw,
    },
    Error::OutOfBounds,
    Result,
};

/// Typed view over the `#~` stream of a .NET image.
///
/// Each field holds the lazily-parsed table if it is present in the image.
/// Tables irrelevant to API-surface hashing are sized and skipped during
/// construction but never materialized.
#[derive(Default)]
pub struct TablesHeader<'a> {
    /// Major version of table schemata, shall be 2
    pub major_version: u8,
    /// Minor version of table schemata, shall be 0
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Row counts and reference index sizes of all tables
    pub info: TableInfoRef,
    /// The `Module` table
    pub module: Option<MetadataTable<'a, ModuleRaw>>,
    /// The `TypeRef` table
    pub type_ref: Option<MetadataTable<'a, TypeRefRaw>>,
    /// The `TypeDef` table
    pub type_def: Option<MetadataTable<'a, TypeDefRaw>>,
    /// The `Field` table
    pub field: Option<MetadataTable<'a, FieldRaw>>,
    /// The `MethodDef` table
    pub method_def: Option<MetadataTable<'a, MethodDefRaw>>,
    /// The `Param` table
    pub param: Option<MetadataTable<'a, ParamRaw>>,
    /// The `InterfaceImpl` table
    pub interface_impl: Option<MetadataTable<'a, InterfaceImplRaw>>,
    /// The `MemberRef` table
    pub member_ref: Option<MetadataTable<'a, MemberRefRaw>>,
    /// The `Constant` table
    pub constant: Option<MetadataTable<'a, ConstantRaw>>,
    /// The `CustomAttribute` table
    pub custom_attribute: Option<MetadataTable<'a, CustomAttributeRaw>>,
    /// The `EventMap` table
    pub event_map: Option<MetadataTable<'a, EventMapRaw>>,
    /// The `Event` table
    pub event: Option<MetadataTable<'a, EventRaw>>,
    /// The `PropertyMap` table
    pub property_map: Option<MetadataTable<'a, PropertyMapRaw>>,
    /// The `Property` table
    pub property: Option<MetadataTable<'a, PropertyRaw>>,
    /// The `MethodSemantics` table
    pub method_semantics: Option<MetadataTable<'a, MethodSemanticsRaw>>,
    /// The `ModuleRef` table
    pub module_ref: Option<MetadataTable<'a, ModuleRefRaw>>,
    /// The `TypeSpec` table
    pub type_spec: Option<MetadataTable<'a, TypeSpecRaw>>,
    /// The `Assembly` table
    pub assembly: Option<MetadataTable<'a, AssemblyRaw>>,
    /// The `AssemblyRef` table
    pub assembly_ref: Option<MetadataTable<'a, AssemblyRefRaw>>,
    /// The `ExportedType` table
    pub exported_type: Option<MetadataTable<'a, ExportedTypeRaw>>,
    /// The `ManifestResource` table
    pub manifest_resource: Option<MetadataTable<'a, ManifestResourceRaw>>,
    /// The `NestedClass` table
    pub nested_class: Option<MetadataTable<'a, NestedClassRaw>>,
    /// The `GenericParam` table
    pub generic_param: Option<MetadataTable<'a, GenericParamRaw>>,
    /// The `GenericParamConstraint` table
    pub generic_param_constraint: Option<MetadataTable<'a, GenericParamConstraintRaw>>,
}

impl<'a> TablesHeader<'a> {
    /// Create a `TablesHeader` object from a sequence of bytes
    ///
    /// # Arguments
    /// * 'data' - The bytes of the `#~` stream
    ///
    /// # Errors
    /// Returns an error if the data is too short, no table has rows, or a
    /// table slice falls outside the stream
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let valid_bitvec = read_le::<u64>(&data[8..])?;
        if valid_bitvec == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        let mut header = TablesHeader {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            valid: valid_bitvec,
            sorted: read_le::<u64>(&data[16..])?,
            info: Arc::new(TableInfo::new(data, valid_bitvec)?),
            ..TablesHeader::default()
        };

        #[allow(clippy::cast_possible_truncation)]
        let mut offset = (24 + valid_bitvec.count_ones() * 4) as usize;

        fn materialize<'b, T: RowReadable>(
            data: &'b [u8],
            offset: &mut usize,
            rows: u32,
            info: &TableInfoRef,
        ) -> Result<MetadataTable<'b, T>> {
            if *offset > data.len() {
                return Err(OutOfBounds);
            }

            let table = MetadataTable::<T>::new(&data[*offset..], rows, info.clone())?;
            *offset += usize::try_from(table.size()).map_err(|_| OutOfBounds)?;
            Ok(table)
        }

        for table_id in TableId::iter() {
            if (valid_bitvec & (1 << table_id as usize)) == 0 {
                continue;
            }

            let rows = header.info.get(table_id).rows;
            if rows == 0 {
                continue;
            }

            let info = header.info.clone();
            match table_id {
                TableId::Module => {
                    header.module = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::TypeRef => {
                    header.type_ref = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::TypeDef => {
                    header.type_def = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::Field => {
                    header.field = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::MethodDef => {
                    header.method_def = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::Param => {
                    header.param = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::InterfaceImpl => {
                    header.interface_impl = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::MemberRef => {
                    header.member_ref = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::Constant => {
                    header.constant = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::CustomAttribute => {
                    header.custom_attribute = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::EventMap => {
                    header.event_map = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::Event => {
                    header.event = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::PropertyMap => {
                    header.property_map = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::Property => {
                    header.property = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::MethodSemantics => {
                    header.method_semantics = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::ModuleRef => {
                    header.module_ref = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::TypeSpec => {
                    header.type_spec = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::Assembly => {
                    header.assembly = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::AssemblyRef => {
                    header.assembly_ref = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::ExportedType => {
                    header.exported_type = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::ManifestResource => {
                    header.manifest_resource = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::NestedClass => {
                    header.nested_class = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::GenericParam => {
                    header.generic_param = Some(materialize(data, &mut offset, rows, &info)?);
                }
                TableId::GenericParamConstraint => {
                    header.generic_param_constraint =
                        Some(materialize(data, &mut offset, rows, &info)?);
                }
                _ => {
                    // Not surface-relevant; step over by computed row size
                    let skip = u64::from(rows) * u64::from(header.info.row_bytes(table_id));
                    let skip = usize::try_from(skip).map_err(|_| OutOfBounds)?;
                    if offset + skip > data.len() {
                        return Err(OutOfBounds);
                    }
                    offset += skip;
                }
            }
        }

        Ok(header)
    }

    /// Get the table count
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }
}
