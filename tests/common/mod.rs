//! Synthetic .NET image builder for integration tests.
//!
//! Emits a minimal but well-formed PE32 image containing CLI metadata:
//! DOS/PE/optional headers, one `.text` section holding the Cor20 header,
//! the optional resources blob and the metadata (root, `#~`, `#Strings`,
//! `#GUID`, `#Blob`). All heaps and tables stay small, so every index is
//! 2 bytes wide.
//!
//! Tables must be populated in owner order: members belong to the most
//! recently added type, parameters to the most recently added method.

#![allow(dead_code)]

use std::collections::HashMap;

/// `TypeAttributes`: public, not nested
pub const T_PUBLIC: u32 = 0x0000_0001;
/// `TypeAttributes`: not public (internal)
pub const T_NOT_PUBLIC: u32 = 0x0000_0000;
/// `TypeAttributes`: nested public
pub const T_NESTED_PUBLIC: u32 = 0x0000_0002;
/// `TypeAttributes`: sealed
pub const T_SEALED: u32 = 0x0000_0100;
/// `TypeAttributes`: abstract
pub const T_ABSTRACT: u32 = 0x0000_0080;
/// `TypeAttributes`: interface
pub const T_INTERFACE: u32 = 0x0000_0020;
/// `TypeAttributes`: the usual class shape emitted by compilers
pub const T_CLASS: u32 = 0x0010_0000; // BeforeFieldInit

/// `MethodAttributes`: public
pub const M_PUBLIC: u16 = 0x0006;
/// `MethodAttributes`: private
pub const M_PRIVATE: u16 = 0x0001;
/// `MethodAttributes`: assembly (internal)
pub const M_ASSEMBLY: u16 = 0x0003;
/// `MethodAttributes`: family (protected)
pub const M_FAMILY: u16 = 0x0004;
/// `MethodAttributes`: static
pub const M_STATIC: u16 = 0x0010;
/// `MethodAttributes`: hide-by-sig (always set by compilers)
pub const M_HIDE_BY_SIG: u16 = 0x0080;
/// `MethodAttributes`: special name (accessors, operators)
pub const M_SPECIAL_NAME: u16 = 0x0800;

/// `FieldAttributes`: public
pub const F_PUBLIC: u16 = 0x0006;
/// `FieldAttributes`: private
pub const F_PRIVATE: u16 = 0x0001;
/// `FieldAttributes`: static
pub const F_STATIC: u16 = 0x0010;
/// `FieldAttributes`: literal (const)
pub const F_LITERAL: u16 = 0x0040;

/// Method signature: instance, no parameters, returns void
pub const SIG_INSTANCE_VOID: &[u8] = &[0x20, 0x00, 0x01];
/// Method signature: instance, one int parameter, returns int
pub const SIG_INSTANCE_INT_INT: &[u8] = &[0x20, 0x01, 0x08, 0x08];
/// Method signature: instance, one int parameter, returns ref int
pub const SIG_INSTANCE_REFINT_INT: &[u8] = &[0x20, 0x01, 0x10, 0x08, 0x08];
/// Field signature: int
pub const SIG_FIELD_INT: &[u8] = &[0x06, 0x08];
/// Field signature: string
pub const SIG_FIELD_STRING: &[u8] = &[0x06, 0x0E];

struct TypeRefRow {
    scope: u16,
    name: u16,
    namespace: u16,
}

struct TypeDefRow {
    flags: u32,
    name: u16,
    namespace: u16,
    extends: u16,
    field_start: u16,
    method_start: u16,
}

struct FieldRow {
    flags: u16,
    name: u16,
    signature: u16,
}

struct MethodRow {
    rva: u32,
    impl_flags: u16,
    flags: u16,
    name: u16,
    signature: u16,
    param_start: u16,
}

struct ParamRow {
    flags: u16,
    sequence: u16,
    name: u16,
}

struct MemberRefRow {
    class: u16,
    name: u16,
    signature: u16,
}

struct ConstantRow {
    base_type: u8,
    parent: u16,
    value: u16,
}

struct CustomAttributeRow {
    parent: u16,
    constructor: u16,
    value: u16,
}

struct GenericParamRow {
    number: u16,
    flags: u16,
    owner: u16,
    name: u16,
}

struct GenericParamConstraintRow {
    owner: u16,
    constraint: u16,
}

struct InterfaceImplRow {
    class: u16,
    interface: u16,
}

struct NestedClassRow {
    nested: u16,
    enclosing: u16,
}

struct ManifestResourceRow {
    data_offset: u32,
    flags: u32,
    name: u16,
}

struct AssemblyRefRow {
    name: u16,
}

struct MapRow {
    parent: u16,
    list_start: u16,
}

struct PropertyRow {
    flags: u16,
    name: u16,
    signature: u16,
}

struct EventRow {
    flags: u16,
    name: u16,
    event_type: u16,
}

struct MethodSemanticsRow {
    semantics: u16,
    method: u16,
    association: u16,
}

struct ExportedTypeRow {
    flags: u32,
    type_def_id: u32,
    name: u16,
    namespace: u16,
    implementation: u16,
}

/// Builds complete PE images with CLI metadata.
pub struct ImageBuilder {
    assembly_name: u16,
    strings: Vec<u8>,
    string_index: HashMap<String, u16>,
    blobs: Vec<u8>,
    type_refs: Vec<TypeRefRow>,
    type_defs: Vec<TypeDefRow>,
    fields: Vec<FieldRow>,
    methods: Vec<MethodRow>,
    params: Vec<ParamRow>,
    interface_impls: Vec<InterfaceImplRow>,
    member_refs: Vec<MemberRefRow>,
    constants: Vec<ConstantRow>,
    custom_attributes: Vec<CustomAttributeRow>,
    assembly_refs: Vec<AssemblyRefRow>,
    nested_classes: Vec<NestedClassRow>,
    generic_params: Vec<GenericParamRow>,
    generic_param_constraints: Vec<GenericParamConstraintRow>,
    manifest_resources: Vec<ManifestResourceRow>,
    resources: Vec<u8>,
    event_maps: Vec<MapRow>,
    events: Vec<EventRow>,
    property_maps: Vec<MapRow>,
    properties: Vec<PropertyRow>,
    method_semantics: Vec<MethodSemanticsRow>,
    exported_types: Vec<ExportedTypeRow>,
}

impl ImageBuilder {
    /// Start a new image for an assembly with the given simple name. The
    /// module row, the assembly manifest and an assembly reference for the
    /// runtime library are always present.
    pub fn new(assembly_name: &str) -> ImageBuilder {
        let mut builder = ImageBuilder {
            assembly_name: 0,
            strings: vec![0],
            string_index: HashMap::new(),
            blobs: vec![0],
            type_refs: Vec::new(),
            type_defs: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            params: Vec::new(),
            interface_impls: Vec::new(),
            member_refs: Vec::new(),
            constants: Vec::new(),
            custom_attributes: Vec::new(),
            assembly_refs: Vec::new(),
            nested_classes: Vec::new(),
            generic_params: Vec::new(),
            generic_param_constraints: Vec::new(),
            manifest_resources: Vec::new(),
            resources: Vec::new(),
            event_maps: Vec::new(),
            events: Vec::new(),
            property_maps: Vec::new(),
            properties: Vec::new(),
            method_semantics: Vec::new(),
            exported_types: Vec::new(),
        };

        builder.assembly_name = builder.string(assembly_name);
        let runtime_name = builder.string("System.Runtime");
        builder.assembly_refs.push(AssemblyRefRow { name: runtime_name });

        // <Module> leads the TypeDef table in every compiled assembly
        let module_name = builder.string("<Module>");
        builder.type_defs.push(TypeDefRow {
            flags: 0,
            name: module_name,
            namespace: 0,
            extends: 0,
            field_start: 1,
            method_start: 1,
        });

        builder
    }

    /// Intern a string into `#Strings`, returning its index.
    pub fn string(&mut self, value: &str) -> u16 {
        if value.is_empty() {
            return 0;
        }

        if let Some(&index) = self.string_index.get(value) {
            return index;
        }

        let index = u16::try_from(self.strings.len()).expect("string heap overflow");
        self.strings.extend_from_slice(value.as_bytes());
        self.strings.push(0);
        self.string_index.insert(value.to_string(), index);
        index
    }

    /// Store a blob into `#Blob`, returning its index.
    pub fn blob(&mut self, value: &[u8]) -> u16 {
        if value.is_empty() {
            return 0;
        }

        assert!(value.len() < 0x80, "test blobs use the 1-byte size prefix");
        let index = u16::try_from(self.blobs.len()).expect("blob heap overflow");
        self.blobs.push(u8::try_from(value.len()).unwrap());
        self.blobs.extend_from_slice(value);
        index
    }

    /// Add a type reference scoped to the runtime assembly reference.
    /// Returns its rid.
    pub fn add_type_ref(&mut self, namespace: &str, name: &str) -> u16 {
        let namespace = self.string(namespace);
        let name = self.string(name);
        self.type_refs.push(TypeRefRow {
            scope: coded_resolution_scope_assembly_ref(1),
            name,
            namespace,
        });
        u16::try_from(self.type_refs.len()).unwrap()
    }

    /// Add a type definition extending the given `TypeDefOrRef` coded
    /// index. Members added afterwards belong to it. Returns its rid.
    pub fn add_type(&mut self, namespace: &str, name: &str, flags: u32, extends: u16) -> u16 {
        let namespace = self.string(namespace);
        let name = self.string(name);
        self.type_defs.push(TypeDefRow {
            flags,
            name,
            namespace,
            extends,
            field_start: u16::try_from(self.fields.len() + 1).unwrap(),
            method_start: u16::try_from(self.methods.len() + 1).unwrap(),
        });
        u16::try_from(self.type_defs.len()).unwrap()
    }

    /// Add a field to the most recently added type. Returns its rid.
    pub fn add_field(&mut self, flags: u16, name: &str, signature: &[u8]) -> u16 {
        let name = self.string(name);
        let signature = self.blob(signature);
        self.fields.push(FieldRow {
            flags,
            name,
            signature,
        });
        u16::try_from(self.fields.len()).unwrap()
    }

    /// Add a method to the most recently added type. Returns its rid.
    pub fn add_method(&mut self, flags: u16, name: &str, signature: &[u8]) -> u16 {
        self.add_method_with_rva(flags, name, signature, 0x2050)
    }

    /// Add a method with an explicit body RVA; the RVA is implementation
    /// detail and must never influence the hash.
    pub fn add_method_with_rva(
        &mut self,
        flags: u16,
        name: &str,
        signature: &[u8],
        rva: u32,
    ) -> u16 {
        let name = self.string(name);
        let signature = self.blob(signature);
        self.methods.push(MethodRow {
            rva,
            impl_flags: 0,
            flags,
            name,
            signature,
            param_start: u16::try_from(self.params.len() + 1).unwrap(),
        });
        u16::try_from(self.methods.len()).unwrap()
    }

    /// Add a parameter row to the most recently added method.
    pub fn add_param(&mut self, flags: u16, sequence: u16, name: &str) -> u16 {
        let name = self.string(name);
        self.params.push(ParamRow {
            flags,
            sequence,
            name,
        });
        u16::try_from(self.params.len()).unwrap()
    }

    /// Add a member reference. Returns its rid.
    pub fn add_member_ref(&mut self, class: u16, name: &str, signature: &[u8]) -> u16 {
        let name = self.string(name);
        let signature = self.blob(signature);
        self.member_refs.push(MemberRefRow {
            class,
            name,
            signature,
        });
        u16::try_from(self.member_refs.len()).unwrap()
    }

    /// Attach a constant to a `HasConstant` coded parent.
    pub fn add_constant(&mut self, parent: u16, base_type: u8, value: &[u8]) {
        let value = self.blob(value);
        self.constants.push(ConstantRow {
            base_type,
            parent,
            value,
        });
    }

    /// Attach a custom attribute to a `HasCustomAttribute` coded parent.
    pub fn add_custom_attribute(&mut self, parent: u16, constructor: u16, value: &[u8]) {
        let value = self.blob(value);
        self.custom_attributes.push(CustomAttributeRow {
            parent,
            constructor,
            value,
        });
    }

    /// Add a generic parameter to a `TypeOrMethodDef` coded owner.
    pub fn add_generic_param(&mut self, owner: u16, number: u16, flags: u16, name: &str) -> u16 {
        let name = self.string(name);
        self.generic_params.push(GenericParamRow {
            number,
            flags,
            owner,
            name,
        });
        u16::try_from(self.generic_params.len()).unwrap()
    }

    /// Constrain a generic parameter to a `TypeDefOrRef` coded type.
    pub fn add_generic_param_constraint(&mut self, owner: u16, constraint: u16) {
        self.generic_param_constraints.push(GenericParamConstraintRow { owner, constraint });
    }

    /// Record an interface implementation for a type definition.
    pub fn add_interface_impl(&mut self, class: u16, interface: u16) {
        self.interface_impls.push(InterfaceImplRow { class, interface });
    }

    /// Record a nesting relationship between two type definitions.
    pub fn add_nested_class(&mut self, nested: u16, enclosing: u16) {
        self.nested_classes.push(NestedClassRow { nested, enclosing });
    }

    /// Add an embedded manifest resource with the given body.
    pub fn add_resource(&mut self, name: &str, flags: u32, body: &[u8]) {
        let name = self.string(name);
        let data_offset = u32::try_from(self.resources.len()).unwrap();
        self.resources
            .extend_from_slice(&u32::try_from(body.len()).unwrap().to_le_bytes());
        self.resources.extend_from_slice(body);
        while self.resources.len() % 8 != 0 {
            self.resources.push(0);
        }

        self.manifest_resources.push(ManifestResourceRow {
            data_offset,
            flags,
            name,
        });
    }

    /// Open the property run of a type; properties added afterwards belong
    /// to it.
    pub fn begin_properties(&mut self, type_rid: u16) {
        self.property_maps.push(MapRow {
            parent: type_rid,
            list_start: u16::try_from(self.properties.len() + 1).unwrap(),
        });
    }

    /// Add a property to the most recently opened property run.
    pub fn add_property(&mut self, name: &str, signature: &[u8]) -> u16 {
        let name = self.string(name);
        let signature = self.blob(signature);
        self.properties.push(PropertyRow {
            flags: 0,
            name,
            signature,
        });
        u16::try_from(self.properties.len()).unwrap()
    }

    /// Open the event run of a type; events added afterwards belong to it.
    pub fn begin_events(&mut self, type_rid: u16) {
        self.event_maps.push(MapRow {
            parent: type_rid,
            list_start: u16::try_from(self.events.len() + 1).unwrap(),
        });
    }

    /// Add an event of the given `TypeDefOrRef` coded delegate type.
    pub fn add_event(&mut self, name: &str, event_type: u16) -> u16 {
        let name = self.string(name);
        self.events.push(EventRow {
            flags: 0,
            name,
            event_type,
        });
        u16::try_from(self.events.len()).unwrap()
    }

    /// Link an accessor method to a property or event (`HasSemantics`
    /// coded association).
    pub fn add_semantics(&mut self, semantics: u16, method: u16, association: u16) {
        self.method_semantics.push(MethodSemanticsRow {
            semantics,
            method,
            association,
        });
    }

    /// Add a type-forwarder row implemented by the runtime assembly ref.
    pub fn add_exported_type(&mut self, namespace: &str, name: &str, flags: u32) -> u16 {
        let namespace = self.string(namespace);
        let name = self.string(name);
        self.exported_types.push(ExportedTypeRow {
            flags,
            type_def_id: 0,
            name,
            namespace,
            implementation: coded_implementation_assembly_ref(1),
        });
        u16::try_from(self.exported_types.len()).unwrap()
    }

    /// Grant `InternalsVisibleTo` to the named friend assembly: adds the
    /// attribute type reference, its constructor member reference and the
    /// assembly-level attribute row.
    pub fn set_internals_visible_to(&mut self, friend: &str) {
        let attribute =
            self.add_type_ref("System.Runtime.CompilerServices", "InternalsVisibleToAttribute");
        // instance void .ctor(string)
        let constructor = self.add_member_ref(
            coded_member_ref_parent_type_ref(attribute),
            ".ctor",
            &[0x20, 0x01, 0x01, 0x0E],
        );

        let mut value = vec![0x01, 0x00];
        value.push(u8::try_from(friend.len()).expect("short friend names only"));
        value.extend_from_slice(friend.as_bytes());
        value.extend_from_slice(&[0x00, 0x00]);

        self.add_custom_attribute(
            coded_has_custom_attribute_assembly(),
            coded_custom_attribute_type_member_ref(constructor),
            &value,
        );
    }

    /// Assemble the complete PE image.
    pub fn build(&self) -> Vec<u8> {
        let metadata = self.build_metadata();

        const SECTION_RVA: u32 = 0x2000;
        const SECTION_FILE_OFFSET: u32 = 0x200;
        const COR20_SIZE: u32 = 72;

        let resources_rva = if self.resources.is_empty() {
            0
        } else {
            SECTION_RVA + COR20_SIZE
        };
        let metadata_rva = SECTION_RVA + COR20_SIZE + u32::try_from(self.resources.len()).unwrap();

        let mut section = Vec::new();
        section.extend_from_slice(&self.build_cor20(
            metadata_rva,
            u32::try_from(metadata.len()).unwrap(),
            resources_rva,
            u32::try_from(self.resources.len()).unwrap(),
        ));
        section.extend_from_slice(&self.resources);
        section.extend_from_slice(&metadata);

        let section_virtual_size = u32::try_from(section.len()).unwrap();
        let section_raw_size = align(section_virtual_size, 0x200);
        let size_of_image = SECTION_RVA + align(section_virtual_size, 0x2000);

        let mut image = Vec::new();

        // DOS header
        image.extend_from_slice(&[0x4D, 0x5A]); // MZ
        image.resize(0x3C, 0);
        image.extend_from_slice(&0x80_u32.to_le_bytes()); // e_lfanew
        image.resize(0x80, 0);

        // PE signature + COFF header
        image.extend_from_slice(b"PE\0\0");
        image.extend_from_slice(&0x014C_u16.to_le_bytes()); // machine: i386
        image.extend_from_slice(&1_u16.to_le_bytes()); // section count
        image.extend_from_slice(&0_u32.to_le_bytes()); // timestamp
        image.extend_from_slice(&0_u32.to_le_bytes()); // symbol table
        image.extend_from_slice(&0_u32.to_le_bytes()); // symbol count
        image.extend_from_slice(&0xE0_u16.to_le_bytes()); // optional header size
        image.extend_from_slice(&0x2102_u16.to_le_bytes()); // characteristics: EXE | 32BIT | DLL

        // Optional header (PE32)
        image.extend_from_slice(&0x010B_u16.to_le_bytes()); // magic
        image.push(8); // linker major
        image.push(0); // linker minor
        image.extend_from_slice(&section_raw_size.to_le_bytes()); // size of code
        image.extend_from_slice(&0_u32.to_le_bytes()); // size of initialized data
        image.extend_from_slice(&0_u32.to_le_bytes()); // size of uninitialized data
        image.extend_from_slice(&0_u32.to_le_bytes()); // entry point
        image.extend_from_slice(&SECTION_RVA.to_le_bytes()); // base of code
        image.extend_from_slice(&0_u32.to_le_bytes()); // base of data
        image.extend_from_slice(&0x1000_0000_u32.to_le_bytes()); // image base
        image.extend_from_slice(&0x2000_u32.to_le_bytes()); // section alignment
        image.extend_from_slice(&0x200_u32.to_le_bytes()); // file alignment
        image.extend_from_slice(&4_u16.to_le_bytes()); // OS major
        image.extend_from_slice(&0_u16.to_le_bytes()); // OS minor
        image.extend_from_slice(&0_u16.to_le_bytes()); // image major
        image.extend_from_slice(&0_u16.to_le_bytes()); // image minor
        image.extend_from_slice(&4_u16.to_le_bytes()); // subsystem major
        image.extend_from_slice(&0_u16.to_le_bytes()); // subsystem minor
        image.extend_from_slice(&0_u32.to_le_bytes()); // win32 version
        image.extend_from_slice(&size_of_image.to_le_bytes());
        image.extend_from_slice(&0x200_u32.to_le_bytes()); // size of headers
        image.extend_from_slice(&0_u32.to_le_bytes()); // checksum
        image.extend_from_slice(&3_u16.to_le_bytes()); // subsystem: CUI
        image.extend_from_slice(&0x8540_u16.to_le_bytes()); // dll characteristics
        image.extend_from_slice(&0x0010_0000_u32.to_le_bytes()); // stack reserve
        image.extend_from_slice(&0x1000_u32.to_le_bytes()); // stack commit
        image.extend_from_slice(&0x0010_0000_u32.to_le_bytes()); // heap reserve
        image.extend_from_slice(&0x1000_u32.to_le_bytes()); // heap commit
        image.extend_from_slice(&0_u32.to_le_bytes()); // loader flags
        image.extend_from_slice(&16_u32.to_le_bytes()); // directory count

        // Data directories; only #14 (CLR runtime header) is populated
        for directory in 0..16_u32 {
            if directory == 14 {
                image.extend_from_slice(&SECTION_RVA.to_le_bytes());
                image.extend_from_slice(&COR20_SIZE.to_le_bytes());
            } else {
                image.extend_from_slice(&0_u64.to_le_bytes());
            }
        }

        // Section table: .text
        image.extend_from_slice(b".text\0\0\0");
        image.extend_from_slice(&section_virtual_size.to_le_bytes());
        image.extend_from_slice(&SECTION_RVA.to_le_bytes());
        image.extend_from_slice(&section_raw_size.to_le_bytes());
        image.extend_from_slice(&SECTION_FILE_OFFSET.to_le_bytes());
        image.extend_from_slice(&0_u32.to_le_bytes()); // relocations
        image.extend_from_slice(&0_u32.to_le_bytes()); // line numbers
        image.extend_from_slice(&0_u16.to_le_bytes()); // relocation count
        image.extend_from_slice(&0_u16.to_le_bytes()); // line number count
        image.extend_from_slice(&0x6000_0020_u32.to_le_bytes()); // CODE | EXECUTE | READ

        image.resize(SECTION_FILE_OFFSET as usize, 0);
        image.extend_from_slice(&section);
        image.resize((SECTION_FILE_OFFSET + section_raw_size) as usize, 0);

        image
    }

    fn build_cor20(
        &self,
        metadata_rva: u32,
        metadata_size: u32,
        resources_rva: u32,
        resources_size: u32,
    ) -> Vec<u8> {
        let mut cor20 = Vec::with_capacity(72);
        cor20.extend_from_slice(&72_u32.to_le_bytes());
        cor20.extend_from_slice(&2_u16.to_le_bytes()); // runtime major
        cor20.extend_from_slice(&5_u16.to_le_bytes()); // runtime minor
        cor20.extend_from_slice(&metadata_rva.to_le_bytes());
        cor20.extend_from_slice(&metadata_size.to_le_bytes());
        cor20.extend_from_slice(&1_u32.to_le_bytes()); // flags: ILONLY
        cor20.extend_from_slice(&0_u32.to_le_bytes()); // entry point token
        cor20.extend_from_slice(&resources_rva.to_le_bytes());
        cor20.extend_from_slice(&resources_size.to_le_bytes());
        cor20.resize(72, 0);
        cor20
    }

    fn build_metadata(&self) -> Vec<u8> {
        let tables = self.build_tables_stream();
        let strings = pad4(&self.strings);
        let guid = vec![0x42_u8; 16]; // one MVID
        let blobs = pad4(&self.blobs);

        let version = b"v4.0.30319\0\0";
        let header_size = 16 + version.len() + 4;

        struct StreamDesc<'a> {
            name: &'a [u8],
            data: &'a [u8],
        }

        let streams = [
            StreamDesc { name: b"#~\0\0", data: &tables },
            StreamDesc { name: b"#Strings\0\0\0\0", data: &strings },
            StreamDesc { name: b"#GUID\0\0\0", data: &guid },
            StreamDesc { name: b"#Blob\0\0\0", data: &blobs },
        ];

        let directory_size: usize = streams.iter().map(|stream| 8 + stream.name.len()).sum();

        let mut metadata = Vec::new();
        metadata.extend_from_slice(&0x424A_5342_u32.to_le_bytes()); // BSJB
        metadata.extend_from_slice(&1_u16.to_le_bytes()); // major
        metadata.extend_from_slice(&1_u16.to_le_bytes()); // minor
        metadata.extend_from_slice(&0_u32.to_le_bytes()); // reserved
        metadata.extend_from_slice(&u32::try_from(version.len()).unwrap().to_le_bytes());
        metadata.extend_from_slice(version);
        metadata.extend_from_slice(&0_u16.to_le_bytes()); // flags
        metadata.extend_from_slice(&u16::try_from(streams.len()).unwrap().to_le_bytes());

        let mut offset = header_size + directory_size;
        for stream in &streams {
            metadata.extend_from_slice(&u32::try_from(offset).unwrap().to_le_bytes());
            metadata.extend_from_slice(&u32::try_from(stream.data.len()).unwrap().to_le_bytes());
            metadata.extend_from_slice(stream.name);
            offset += stream.data.len();
        }

        for stream in &streams {
            metadata.extend_from_slice(stream.data);
        }

        metadata
    }

    fn build_tables_stream(&self) -> Vec<u8> {
        // (table id, row count) for every non-empty table, in id order
        let mut present: Vec<(usize, usize)> = Vec::new();
        present.push((0x00, 1)); // Module
        if !self.type_refs.is_empty() {
            present.push((0x01, self.type_refs.len()));
        }
        present.push((0x02, self.type_defs.len()));
        if !self.fields.is_empty() {
            present.push((0x04, self.fields.len()));
        }
        if !self.methods.is_empty() {
            present.push((0x06, self.methods.len()));
        }
        if !self.params.is_empty() {
            present.push((0x08, self.params.len()));
        }
        if !self.interface_impls.is_empty() {
            present.push((0x09, self.interface_impls.len()));
        }
        if !self.member_refs.is_empty() {
            present.push((0x0A, self.member_refs.len()));
        }
        if !self.constants.is_empty() {
            present.push((0x0B, self.constants.len()));
        }
        if !self.custom_attributes.is_empty() {
            present.push((0x0C, self.custom_attributes.len()));
        }
        if !self.event_maps.is_empty() {
            present.push((0x12, self.event_maps.len()));
        }
        if !self.events.is_empty() {
            present.push((0x14, self.events.len()));
        }
        if !self.property_maps.is_empty() {
            present.push((0x15, self.property_maps.len()));
        }
        if !self.properties.is_empty() {
            present.push((0x17, self.properties.len()));
        }
        if !self.method_semantics.is_empty() {
            present.push((0x18, self.method_semantics.len()));
        }
        present.push((0x20, 1)); // Assembly
        if !self.assembly_refs.is_empty() {
            present.push((0x23, self.assembly_refs.len()));
        }
        if !self.exported_types.is_empty() {
            present.push((0x27, self.exported_types.len()));
        }
        if !self.manifest_resources.is_empty() {
            present.push((0x28, self.manifest_resources.len()));
        }
        if !self.nested_classes.is_empty() {
            present.push((0x29, self.nested_classes.len()));
        }
        if !self.generic_params.is_empty() {
            present.push((0x2A, self.generic_params.len()));
        }
        if !self.generic_param_constraints.is_empty() {
            present.push((0x2C, self.generic_param_constraints.len()));
        }

        let mut valid = 0_u64;
        for (id, _) in &present {
            valid |= 1 << id;
        }

        let mut stream = Vec::new();
        stream.extend_from_slice(&0_u32.to_le_bytes()); // reserved
        stream.push(2); // major
        stream.push(0); // minor
        stream.push(0); // heap size flags: all small
        stream.push(1); // reserved
        stream.extend_from_slice(&valid.to_le_bytes());
        stream.extend_from_slice(&valid.to_le_bytes()); // sorted (claim all)
        for (_, rows) in &present {
            stream.extend_from_slice(&u32::try_from(*rows).unwrap().to_le_bytes());
        }

        // Module: generation, name, mvid, encid, encbaseid
        stream.extend_from_slice(&0_u16.to_le_bytes());
        stream.extend_from_slice(&self.assembly_name.to_le_bytes());
        stream.extend_from_slice(&1_u16.to_le_bytes());
        stream.extend_from_slice(&0_u16.to_le_bytes());
        stream.extend_from_slice(&0_u16.to_le_bytes());

        for row in &self.type_refs {
            stream.extend_from_slice(&row.scope.to_le_bytes());
            stream.extend_from_slice(&row.name.to_le_bytes());
            stream.extend_from_slice(&row.namespace.to_le_bytes());
        }

        for row in &self.type_defs {
            stream.extend_from_slice(&row.flags.to_le_bytes());
            stream.extend_from_slice(&row.name.to_le_bytes());
            stream.extend_from_slice(&row.namespace.to_le_bytes());
            stream.extend_from_slice(&row.extends.to_le_bytes());
            stream.extend_from_slice(&row.field_start.to_le_bytes());
            stream.extend_from_slice(&row.method_start.to_le_bytes());
        }

        for row in &self.fields {
            stream.extend_from_slice(&row.flags.to_le_bytes());
            stream.extend_from_slice(&row.name.to_le_bytes());
            stream.extend_from_slice(&row.signature.to_le_bytes());
        }

        for row in &self.methods {
            stream.extend_from_slice(&row.rva.to_le_bytes());
            stream.extend_from_slice(&row.impl_flags.to_le_bytes());
            stream.extend_from_slice(&row.flags.to_le_bytes());
            stream.extend_from_slice(&row.name.to_le_bytes());
            stream.extend_from_slice(&row.signature.to_le_bytes());
            stream.extend_from_slice(&row.param_start.to_le_bytes());
        }

        for row in &self.params {
            stream.extend_from_slice(&row.flags.to_le_bytes());
            stream.extend_from_slice(&row.sequence.to_le_bytes());
            stream.extend_from_slice(&row.name.to_le_bytes());
        }

        for row in &self.interface_impls {
            stream.extend_from_slice(&row.class.to_le_bytes());
            stream.extend_from_slice(&row.interface.to_le_bytes());
        }

        for row in &self.member_refs {
            stream.extend_from_slice(&row.class.to_le_bytes());
            stream.extend_from_slice(&row.name.to_le_bytes());
            stream.extend_from_slice(&row.signature.to_le_bytes());
        }

        for row in &self.constants {
            stream.push(row.base_type);
            stream.push(0);
            stream.extend_from_slice(&row.parent.to_le_bytes());
            stream.extend_from_slice(&row.value.to_le_bytes());
        }

        for row in &self.custom_attributes {
            stream.extend_from_slice(&row.parent.to_le_bytes());
            stream.extend_from_slice(&row.constructor.to_le_bytes());
            stream.extend_from_slice(&row.value.to_le_bytes());
        }

        for row in &self.event_maps {
            stream.extend_from_slice(&row.parent.to_le_bytes());
            stream.extend_from_slice(&row.list_start.to_le_bytes());
        }

        for row in &self.events {
            stream.extend_from_slice(&row.flags.to_le_bytes());
            stream.extend_from_slice(&row.name.to_le_bytes());
            stream.extend_from_slice(&row.event_type.to_le_bytes());
        }

        for row in &self.property_maps {
            stream.extend_from_slice(&row.parent.to_le_bytes());
            stream.extend_from_slice(&row.list_start.to_le_bytes());
        }

        for row in &self.properties {
            stream.extend_from_slice(&row.flags.to_le_bytes());
            stream.extend_from_slice(&row.name.to_le_bytes());
            stream.extend_from_slice(&row.signature.to_le_bytes());
        }

        for row in &self.method_semantics {
            stream.extend_from_slice(&row.semantics.to_le_bytes());
            stream.extend_from_slice(&row.method.to_le_bytes());
            stream.extend_from_slice(&row.association.to_le_bytes());
        }

        // Assembly: hashalg, version 1.0.0.0, flags, publickey, name, culture
        stream.extend_from_slice(&0x8004_u32.to_le_bytes());
        stream.extend_from_slice(&1_u16.to_le_bytes());
        stream.extend_from_slice(&0_u16.to_le_bytes());
        stream.extend_from_slice(&0_u16.to_le_bytes());
        stream.extend_from_slice(&0_u16.to_le_bytes());
        stream.extend_from_slice(&0_u32.to_le_bytes());
        stream.extend_from_slice(&0_u16.to_le_bytes());
        stream.extend_from_slice(&self.assembly_name.to_le_bytes());
        stream.extend_from_slice(&0_u16.to_le_bytes());

        for row in &self.assembly_refs {
            stream.extend_from_slice(&4_u16.to_le_bytes()); // major
            stream.extend_from_slice(&0_u16.to_le_bytes()); // minor
            stream.extend_from_slice(&0_u16.to_le_bytes()); // build
            stream.extend_from_slice(&0_u16.to_le_bytes()); // revision
            stream.extend_from_slice(&0_u32.to_le_bytes()); // flags
            stream.extend_from_slice(&0_u16.to_le_bytes()); // public key or token
            stream.extend_from_slice(&row.name.to_le_bytes());
            stream.extend_from_slice(&0_u16.to_le_bytes()); // culture
            stream.extend_from_slice(&0_u16.to_le_bytes()); // hash value
        }

        for row in &self.exported_types {
            stream.extend_from_slice(&row.flags.to_le_bytes());
            stream.extend_from_slice(&row.type_def_id.to_le_bytes());
            stream.extend_from_slice(&row.name.to_le_bytes());
            stream.extend_from_slice(&row.namespace.to_le_bytes());
            stream.extend_from_slice(&row.implementation.to_le_bytes());
        }

        for row in &self.manifest_resources {
            stream.extend_from_slice(&row.data_offset.to_le_bytes());
            stream.extend_from_slice(&row.flags.to_le_bytes());
            stream.extend_from_slice(&row.name.to_le_bytes());
            stream.extend_from_slice(&0_u16.to_le_bytes()); // implementation: embedded
        }

        for row in &self.nested_classes {
            stream.extend_from_slice(&row.nested.to_le_bytes());
            stream.extend_from_slice(&row.enclosing.to_le_bytes());
        }

        for row in &self.generic_params {
            stream.extend_from_slice(&row.number.to_le_bytes());
            stream.extend_from_slice(&row.flags.to_le_bytes());
            stream.extend_from_slice(&row.owner.to_le_bytes());
            stream.extend_from_slice(&row.name.to_le_bytes());
        }

        for row in &self.generic_param_constraints {
            stream.extend_from_slice(&row.owner.to_le_bytes());
            stream.extend_from_slice(&row.constraint.to_le_bytes());
        }

        stream
    }
}

fn align(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

fn pad4(data: &[u8]) -> Vec<u8> {
    let mut padded = data.to_vec();
    while padded.len() % 4 != 0 {
        padded.push(0);
    }
    padded
}

// Coded index construction; tags per ECMA-335 II.24.2.6.

/// `TypeDefOrRef` pointing at a `TypeDef` row
pub fn coded_type_def_or_ref_type_def(rid: u16) -> u16 {
    rid << 2
}

/// `TypeDefOrRef` pointing at a `TypeRef` row
pub fn coded_type_def_or_ref_type_ref(rid: u16) -> u16 {
    (rid << 2) | 1
}

/// `ResolutionScope` pointing at an `AssemblyRef` row
pub fn coded_resolution_scope_assembly_ref(rid: u16) -> u16 {
    (rid << 2) | 2
}

/// `MemberRefParent` pointing at a `TypeRef` row
pub fn coded_member_ref_parent_type_ref(rid: u16) -> u16 {
    (rid << 3) | 1
}

/// `CustomAttributeType` pointing at a `MemberRef` row
pub fn coded_custom_attribute_type_member_ref(rid: u16) -> u16 {
    (rid << 3) | 3
}

/// `HasCustomAttribute` pointing at the assembly manifest
pub fn coded_has_custom_attribute_assembly() -> u16 {
    (1 << 5) | 14
}

/// `HasCustomAttribute` pointing at a `TypeDef` row
pub fn coded_has_custom_attribute_type_def(rid: u16) -> u16 {
    (rid << 5) | 3
}

/// `HasCustomAttribute` pointing at a `MethodDef` row
pub fn coded_has_custom_attribute_method_def(rid: u16) -> u16 {
    rid << 5
}

/// `HasConstant` pointing at a `Field` row
pub fn coded_has_constant_field(rid: u16) -> u16 {
    rid << 2
}

/// `HasConstant` pointing at a `Param` row
pub fn coded_has_constant_param(rid: u16) -> u16 {
    (rid << 2) | 1
}

/// `TypeOrMethodDef` pointing at a `TypeDef` row
pub fn coded_type_or_method_def_type_def(rid: u16) -> u16 {
    rid << 1
}

/// `TypeOrMethodDef` pointing at a `MethodDef` row
pub fn coded_type_or_method_def_method_def(rid: u16) -> u16 {
    (rid << 1) | 1
}

/// `HasSemantics` pointing at a `Property` row
pub fn coded_has_semantics_property(rid: u16) -> u16 {
    (rid << 1) | 1
}

/// `HasSemantics` pointing at an `Event` row
pub fn coded_has_semantics_event(rid: u16) -> u16 {
    rid << 1
}

/// `Implementation` pointing at an `AssemblyRef` row
pub fn coded_implementation_assembly_ref(rid: u16) -> u16 {
    (rid << 2) | 1
}

/// `MethodSemantics`: setter
pub const SEM_SETTER: u16 = 0x0001;
/// `MethodSemantics`: getter
pub const SEM_GETTER: u16 = 0x0002;
/// `MethodSemantics`: event add
pub const SEM_ADD_ON: u16 = 0x0008;
/// `MethodSemantics`: event remove
pub const SEM_REMOVE_ON: u16 = 0x0010;
