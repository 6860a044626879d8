//! Raw row readers for member-related tables: interface implementations,
//! member references, constants, custom attributes, events, properties,
//! accessor semantics, nesting and generic parameters.

use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

#[derive(Clone, Debug)]
/// The `InterfaceImpl` table records the interfaces a type implements. `TableId` = 0x09
pub struct InterfaceImplRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into the `TypeDef` table
    pub class: u32,
    /// an index into the `TypeDef`, `TypeRef`, or `TypeSpec` table; more precisely, a `TypeDefOrRef`
    pub interface: CodedIndex,
}

impl RowReadable for InterfaceImplRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* class */     sizes.table_index_bytes(TableId::TypeDef) +
            /* interface */ sizes.coded_index_bytes(CodedIndexType::TypeDefOrRef)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(InterfaceImplRaw {
            rid,
            token: Token::new(TableId::InterfaceImpl.token_base() + rid),
            class: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            interface: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `MemberRef` table references methods and fields of other types. `TableId` = 0x0A
pub struct MemberRefRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into the `MemberRefParent` coded index space
    pub class: CodedIndex,
    /// an index into the String heap
    pub name: u32,
    /// an index into the Blob heap, a `MethodRefSig` or `FieldSig`
    pub signature: u32,
}

impl RowReadable for MemberRefRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* class */     sizes.coded_index_bytes(CodedIndexType::MemberRefParent) +
            /* name */      sizes.str_bytes() +
            /* signature */ sizes.blob_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(MemberRefRaw {
            rid,
            token: Token::new(TableId::MemberRef.token_base() + rid),
            class: CodedIndex::read(data, offset, sizes, CodedIndexType::MemberRefParent)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `Constant` table stores compile-time constant values for fields,
/// parameters and properties. `TableId` = 0x0B
pub struct ConstantRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// a 1-byte `ELEMENT_TYPE` code of the constant
    pub base_type: u8,
    /// an index into the `HasConstant` coded index space
    pub parent: CodedIndex,
    /// an index into the Blob heap, the constant value
    pub value: u32,
}

impl RowReadable for ConstantRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* base_type + padding */ 2 +
            /* parent */              sizes.coded_index_bytes(CodedIndexType::HasConstant) +
            /* value */               sizes.blob_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        let base_type = read_le_at::<u8>(data, offset)?;
        let _padding = read_le_at::<u8>(data, offset)?;

        Ok(ConstantRaw {
            rid,
            token: Token::new(TableId::Constant.token_base() + rid),
            base_type,
            parent: CodedIndex::read(data, offset, sizes, CodedIndexType::HasConstant)?,
            value: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `CustomAttribute` table applies attributes to metadata entities. `TableId` = 0x0C
pub struct CustomAttributeRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into the `HasCustomAttribute` coded index space, the bearer
    pub parent: CodedIndex,
    /// an index into the `CustomAttributeType` coded index space, the constructor
    pub constructor: CodedIndex,
    /// an index into the Blob heap, the attribute value per II.23.3
    pub value: u32,
}

impl RowReadable for CustomAttributeRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* parent */      sizes.coded_index_bytes(CodedIndexType::HasCustomAttribute) +
            /* constructor */ sizes.coded_index_bytes(CodedIndexType::CustomAttributeType) +
            /* value */       sizes.blob_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(CustomAttributeRaw {
            rid,
            token: Token::new(TableId::CustomAttribute.token_base() + rid),
            parent: CodedIndex::read(data, offset, sizes, CodedIndexType::HasCustomAttribute)?,
            constructor: CodedIndex::read(
                data,
                offset,
                sizes,
                CodedIndexType::CustomAttributeType,
            )?,
            value: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `EventMap` table links types to their run of `Event` rows. `TableId` = 0x12
pub struct EventMapRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into the `TypeDef` table
    pub parent: u32,
    /// an index into the Event table; it marks the first of a contiguous run of Events owned by this Type
    pub event_list: u32,
}

impl RowReadable for EventMapRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* parent */     sizes.table_index_bytes(TableId::TypeDef) +
            /* event_list */ sizes.table_index_bytes(TableId::Event)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(EventMapRaw {
            rid,
            token: Token::new(TableId::EventMap.token_base() + rid),
            parent: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            event_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Event))?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `Event` table defines events. `TableId` = 0x14
pub struct EventRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// a 2-byte bitmask of type `EventAttributes`
    pub flags: u16,
    /// an index into the String heap
    pub name: u32,
    /// an index into the `TypeDef`, `TypeRef`, or `TypeSpec` table; the delegate type of the event
    pub event_type: CodedIndex,
}

impl RowReadable for EventRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* flags */      2 +
            /* name */       sizes.str_bytes() +
            /* event_type */ sizes.coded_index_bytes(CodedIndexType::TypeDefOrRef)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(EventRaw {
            rid,
            token: Token::new(TableId::Event.token_base() + rid),
            flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            event_type: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `PropertyMap` table links types to their run of `Property` rows. `TableId` = 0x15
pub struct PropertyMapRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into the `TypeDef` table
    pub parent: u32,
    /// an index into the Property table; it marks the first of a contiguous run of Properties owned by this Type
    pub property_list: u32,
}

impl RowReadable for PropertyMapRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* parent */        sizes.table_index_bytes(TableId::TypeDef) +
            /* property_list */ sizes.table_index_bytes(TableId::Property)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(PropertyMapRaw {
            rid,
            token: Token::new(TableId::PropertyMap.token_base() + rid),
            parent: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            property_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Property))?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `Property` table defines properties. `TableId` = 0x17
pub struct PropertyRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// a 2-byte bitmask of type `PropertyAttributes`
    pub flags: u16,
    /// an index into the String heap
    pub name: u32,
    /// an index into the Blob heap, a `PropertySig`
    pub signature: u32,
}

impl RowReadable for PropertyRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* flags */     2 +
            /* name */      sizes.str_bytes() +
            /* signature */ sizes.blob_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(PropertyRaw {
            rid,
            token: Token::new(TableId::Property.token_base() + rid),
            flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

/// `MethodSemantics` attribute: the method is a property setter
pub const SEMANTICS_SETTER: u16 = 0x0001;
/// `MethodSemantics` attribute: the method is a property getter
pub const SEMANTICS_GETTER: u16 = 0x0002;
/// `MethodSemantics` attribute: the method is an event subscriber
pub const SEMANTICS_ADD_ON: u16 = 0x0008;
/// `MethodSemantics` attribute: the method removes an event subscription
pub const SEMANTICS_REMOVE_ON: u16 = 0x0010;

#[derive(Clone, Debug)]
/// The `MethodSemantics` table links accessor methods to the property or
/// event they implement. `TableId` = 0x18
pub struct MethodSemanticsRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// a 2-byte bitmask of type `MethodSemanticsAttributes`
    pub semantics: u16,
    /// an index into the `MethodDef` table
    pub method: u32,
    /// an index into the Event or Property table; more precisely, a `HasSemantics`
    pub association: CodedIndex,
}

impl RowReadable for MethodSemanticsRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* semantics */   2 +
            /* method */      sizes.table_index_bytes(TableId::MethodDef) +
            /* association */ sizes.coded_index_bytes(CodedIndexType::HasSemantics)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(MethodSemanticsRaw {
            rid,
            token: Token::new(TableId::MethodSemantics.token_base() + rid),
            semantics: read_le_at::<u16>(data, offset)?,
            method: read_le_at_dyn(data, offset, sizes.is_large(TableId::MethodDef))?,
            association: CodedIndex::read(data, offset, sizes, CodedIndexType::HasSemantics)?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `NestedClass` table records which types are nested in which. `TableId` = 0x29
pub struct NestedClassRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into the `TypeDef` table, the nested type
    pub nested_class: u32,
    /// an index into the `TypeDef` table, the enclosing type
    pub enclosing_class: u32,
}

impl RowReadable for NestedClassRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* nested_class */    sizes.table_index_bytes(TableId::TypeDef) +
            /* enclosing_class */ sizes.table_index_bytes(TableId::TypeDef)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(NestedClassRaw {
            rid,
            token: Token::new(TableId::NestedClass.token_base() + rid),
            nested_class: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            enclosing_class: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `GenericParam` table defines the type parameters of generic types
/// and methods. `TableId` = 0x2A
pub struct GenericParamRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// the 0-based position of the parameter
    pub number: u16,
    /// a 2-byte bitmask of type `GenericParamAttributes`
    pub flags: u16,
    /// an index into the `TypeDef` or `MethodDef` table; more precisely, a `TypeOrMethodDef`
    pub owner: CodedIndex,
    /// an index into the String heap
    pub name: u32,
}

impl RowReadable for GenericParamRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* number */ 2 +
            /* flags */  2 +
            /* owner */  sizes.coded_index_bytes(CodedIndexType::TypeOrMethodDef) +
            /* name */   sizes.str_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(GenericParamRaw {
            rid,
            token: Token::new(TableId::GenericParam.token_base() + rid),
            number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            owner: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeOrMethodDef)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

#[derive(Clone, Debug)]
/// The `GenericParamConstraint` table records the constraints of generic
/// parameters. `TableId` = 0x2C
pub struct GenericParamConstraintRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into the `GenericParam` table
    pub owner: u32,
    /// an index into the `TypeDef`, `TypeRef`, or `TypeSpec` table; the constraining type
    pub constraint: CodedIndex,
}

impl RowReadable for GenericParamConstraintRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* owner */      sizes.table_index_bytes(TableId::GenericParam) +
            /* constraint */ sizes.coded_index_bytes(CodedIndexType::TypeDefOrRef)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(GenericParamConstraintRaw {
            rid,
            token: Token::new(TableId::GenericParamConstraint.token_base() + rid),
            owner: read_le_at_dyn(data, offset, sizes.is_large(TableId::GenericParam))?,
            constraint: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
        })
    }
}
