//! The top-level surface traversal and hash orchestrator.
//!
//! [`SurfaceHasher`] walks the assembly definition, its custom attributes,
//! every type definition, exported type and public manifest resource, and
//! folds their consumer-observable content into one `u64`. All set-valued
//! collections (types, members, interfaces, constraints, attributes) go
//! through the sorted combine so the result is invariant under table-row
//! reordering; positional collections (method parameters, generic argument
//! lists) fold in order.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    hashing,
    metadata::{
        tables::{
            AssemblyRaw, AssemblyRefRaw, CodedIndex, ConstantRaw, CustomAttributeRaw, EventRaw,
            ExportedTypeRaw, FieldRaw, GenericParamConstraintRaw, GenericParamRaw,
            InterfaceImplRaw, ManifestResourceRaw, MemberRefRaw, MethodDefRaw, MethodSemanticsRaw,
            ParamRaw, PropertyRaw, TableId, TypeDefRaw, TypeRefRaw, TypeSpecRaw, SEMANTICS_ADD_ON,
            SEMANTICS_GETTER, SEMANTICS_REMOVE_ON, SEMANTICS_SETTER,
        },
        token::Token,
        CilImage,
    },
    surface::{
        cache::HandleCache,
        classifier,
        signature::{MethodSigHash, SignatureHasher, TypeHashResolver, ELEMENT_TYPE},
        wellknown::WellKnownTypes,
        SurfaceHashOptions,
    },
    Result,
};

/// Upper bound on implementation-chain walks for exported types; a longer
/// chain in a real image means a cycle.
const MAX_NESTING_DEPTH: usize = 64;

/// Cross-table lookup maps built once per invocation.
///
/// Metadata stores many relations child-to-parent (`CustomAttribute.parent`,
/// `NestedClass.nested_class`); the surface walk needs them parent-to-child.
#[derive(Default)]
struct SurfaceIndex {
    /// bearer token -> `CustomAttribute` rids
    custom_attrs: FxHashMap<Token, Vec<u32>>,
    /// `TypeDef` rid -> `InterfaceImpl` rids
    interface_impls: FxHashMap<u32, Vec<u32>>,
    /// nested `TypeDef` rid -> enclosing `TypeDef` rid
    enclosing: FxHashMap<u32, u32>,
    /// owner token -> `GenericParam` rids, sorted by parameter number
    generic_params: FxHashMap<Token, Vec<u32>>,
    /// `GenericParam` rid -> `GenericParamConstraint` rids
    constraints: FxHashMap<u32, Vec<u32>>,
    /// owner token -> `Constant` rid
    constants: FxHashMap<Token, u32>,
    /// `Property`/`Event` token -> `MethodSemantics` rids
    semantics: FxHashMap<Token, Vec<u32>>,
    /// `TypeDef` rid -> `[start, end)` run in the `Property` table
    property_ranges: FxHashMap<u32, (u32, u32)>,
    /// `TypeDef` rid -> `[start, end)` run in the `Event` table
    event_ranges: FxHashMap<u32, (u32, u32)>,
    /// `MethodDef` rid -> declaring `TypeDef` rid
    method_owner: FxHashMap<u32, u32>,
}

/// Computes the 64-bit API-surface hash of one parsed image.
///
/// All state lives for a single invocation: construct, call
/// [`SurfaceHasher::hash`], drop. Two hashers over different images share
/// nothing and need no synchronization.
pub struct SurfaceHasher<'a> {
    image: &'a CilImage<'a>,
    options: SurfaceHashOptions,
    cache: HandleCache,
    well_known: WellKnownTypes,
    internals_visible: bool,
    index: SurfaceIndex,
}

impl<'a> SurfaceHasher<'a> {
    /// Create a hasher over a parsed image.
    ///
    /// ## Arguments
    /// * 'image' - The parsed metadata; must outlive the hasher
    /// * 'options' - Hashing options
    #[must_use]
    pub fn new(image: &'a CilImage<'a>, options: SurfaceHashOptions) -> SurfaceHasher<'a> {
        SurfaceHasher {
            image,
            options,
            cache: HandleCache::new(),
            well_known: WellKnownTypes::new(),
            internals_visible: false,
            index: build_index(image),
        }
    }

    /// Compute the surface hash.
    ///
    /// # Errors
    /// Returns an error if the image misses its assembly definition or any
    /// reachable metadata is malformed. No partial result is produced.
    pub fn hash(mut self) -> Result<u64> {
        let assembly = self.assembly_row()?;

        // Own version deliberately excluded so version bumps alone do not
        // invalidate caches downstream.
        let assembly_def = hashing::combine3(
            self.string_hash(assembly.name)?,
            self.string_hash(assembly.culture)?,
            self.blob_hash(assembly.public_key)?,
        );

        self.internals_visible = self.detect_internals_visible()?;

        let assembly_attrs = self.custom_attributes_hash(assembly.token)?;
        let module_attrs =
            self.custom_attributes_hash(Token::new(TableId::Module.token_base() + 1))?;

        let mut surface = Vec::new();

        let type_count = self
            .image
            .tables
            .type_def
            .as_ref()
            .map_or(0, |table| table.row_count());
        for rid in 1..=type_count {
            if self.type_def_in_surface(rid)? {
                surface.push(self.type_surface_hash(rid)?);
            }
        }

        let exported_count = self
            .image
            .tables
            .exported_type
            .as_ref()
            .map_or(0, |table| table.row_count());
        for rid in 1..=exported_count {
            if self.exported_type_in_surface(rid)? {
                surface.push(self.exported_type_hash(rid)?);
            }
        }

        let assembly_name = self.image.strings.get(assembly.name as usize)?;
        let resource_count = self
            .image
            .tables
            .manifest_resource
            .as_ref()
            .map_or(0, |table| table.row_count());
        for rid in 1..=resource_count {
            let row = self.manifest_resource_row(rid)?;
            let name = self.image.strings.get(row.name as usize)?;
            if classifier::resource_in_surface(row.flags, name, assembly_name) {
                let resource = self.resource_hash(&row)?;
                surface.push(resource);
            }
        }

        Ok(hashing::combine4(
            assembly_def,
            assembly_attrs,
            module_attrs,
            hashing::combine_sorted(&mut surface),
        ))
    }

    // ------------------------------------------------------------------
    // Surface membership
    // ------------------------------------------------------------------

    /// A type definition is in surface if its own visibility passes and, for
    /// nested types, every enclosing type is in surface too.
    fn type_def_in_surface(&self, rid: u32) -> Result<bool> {
        let mut current = rid;
        for _ in 0..=MAX_NESTING_DEPTH {
            let row = self.type_def_row(current)?;
            let name = self.image.strings.get(row.type_name as usize)?;
            if !classifier::type_in_surface(row.flags, name, self.internals_visible) {
                return Ok(false);
            }

            if !classifier::is_nested_visibility(row.flags) {
                return Ok(true);
            }

            match self.index.enclosing.get(&current) {
                Some(&enclosing) => current = enclosing,
                // Nested visibility without a NestedClass row: unreachable
                // from any consumer
                None => return Ok(false),
            }
        }

        Err(malformed_error!("Cyclic type nesting at TypeDef {}", rid))
    }

    fn exported_type_in_surface(&self, rid: u32) -> Result<bool> {
        let mut current = rid;
        for _ in 0..=MAX_NESTING_DEPTH {
            let row = self.exported_type_row(current)?;
            let name = self.image.strings.get(row.type_name as usize)?;
            if !classifier::type_in_surface(row.flags, name, self.internals_visible) {
                return Ok(false);
            }

            if classifier::is_nested_visibility(row.flags)
                && row.implementation.tag == TableId::ExportedType
            {
                current = row.implementation.row;
            } else {
                return Ok(true);
            }
        }

        Err(malformed_error!(
            "Cyclic implementation chain at ExportedType {}",
            rid
        ))
    }

    // ------------------------------------------------------------------
    // Type definition surface hash
    // ------------------------------------------------------------------

    fn type_surface_hash(&mut self, rid: u32) -> Result<u64> {
        let row = self.type_def_row(rid)?;

        let flags_masked = u64::from(row.flags & classifier::TYPE_HASHED_ATTRIBUTES);
        let namespace = self.string_hash(row.type_namespace)?;
        let name = self.string_hash(row.type_name)?;
        let generics = self.generic_params_hash(row.token)?;

        let base = if row.extends.is_null() {
            hashing::OFFSET
        } else {
            self.type_usage_from_coded(row.extends)?
        };

        let mut interfaces = Vec::new();
        for ii_rid in self.index.interface_impls.get(&rid).cloned().unwrap_or_default() {
            let impl_row = self.interface_impl_row(ii_rid)?;

            // Interfaces whose top-level type is a non-surface definition of
            // this assembly are as invisible as the definition itself
            if self.interface_is_hidden(impl_row.interface)? {
                continue;
            }

            let usage = self.type_usage_from_coded(impl_row.interface)?;
            let attrs = self.custom_attributes_hash(impl_row.token)?;
            interfaces.push(hashing::combine2(usage, attrs));
        }
        let supertypes = hashing::combine2(base, hashing::combine_sorted(&mut interfaces));

        let enclosing = match self.index.enclosing.get(&rid).copied() {
            Some(enclosing_rid) => self.type_def_usage_hash(enclosing_rid)?,
            None => hashing::OFFSET,
        };

        // The base usage hash above has registered System.ValueType if this
        // image references it; structs are recognized from here on
        let is_struct =
            !row.extends.is_null() && Some(row.extends.token) == self.well_known.system_value_type;

        let mut members = Vec::new();

        let (field_start, field_end) = self.field_range(&row);
        for field_rid in field_start..field_end {
            let field = self.field_row(field_rid)?;
            if !classifier::member_in_surface(u32::from(field.flags), self.internals_visible) {
                continue;
            }
            members.push(self.field_surface_hash(&field)?);
        }

        let mut accessors: FxHashSet<u32> = FxHashSet::default();
        let (method_start, method_end) = self.method_range(&row);
        for method_rid in method_start..method_end {
            let method = self.method_row(method_rid)?;
            if !classifier::member_in_surface(u32::from(method.flags), self.internals_visible) {
                continue;
            }
            members.push(self.method_surface_hash(&method)?);

            if u32::from(method.flags) & classifier::METHOD_SPECIAL_NAME != 0 {
                let method_name = self.image.strings.get(method.name as usize)?;
                if method_name != ".ctor" && method_name != ".cctor" {
                    accessors.insert(method_rid);
                }
            }
        }

        // Properties and events contribute name and attributes when one of
        // their accessors is in surface; their types are already captured by
        // the accessor signatures
        if let Some((start, end)) = self.index.property_ranges.get(&rid).copied() {
            for property_rid in start..end {
                let property = self.property_row(property_rid)?;
                if self.has_surface_accessor(
                    property.token,
                    &accessors,
                    SEMANTICS_GETTER | SEMANTICS_SETTER,
                )? {
                    let property_name = self.string_hash(property.name)?;
                    let attrs = self.custom_attributes_hash(property.token)?;
                    members.push(hashing::combine2(property_name, attrs));
                }
            }
        }

        if let Some((start, end)) = self.index.event_ranges.get(&rid).copied() {
            for event_rid in start..end {
                let event = self.event_row(event_rid)?;
                if self.has_surface_accessor(
                    event.token,
                    &accessors,
                    SEMANTICS_ADD_ON | SEMANTICS_REMOVE_ON,
                )? {
                    let event_name = self.string_hash(event.name)?;
                    let attrs = self.custom_attributes_hash(event.token)?;
                    members.push(hashing::combine2(event_name, attrs));
                }
            }
        }

        let members_hash = hashing::combine_sorted(&mut members);
        let attrs = self.custom_attributes_hash(row.token)?;

        let mut hash = hashing::combine_seq(&[
            flags_masked,
            namespace,
            name,
            generics,
            supertypes,
            enclosing,
            members_hash,
            attrs,
        ]);

        if is_struct {
            // Instance-field layout is consumer-observable even when the
            // fields themselves are private (definite assignment, the
            // unmanaged constraint)
            hash = hashing::combine2(hash, self.struct_field_hash(rid)?);
        }

        Ok(hash)
    }

    /// An interface entry is dropped when its top-level type is a type
    /// definition outside the surface. For instantiations this looks at the
    /// generic type behind the `TypeSpec`, not at the arguments.
    fn interface_is_hidden(&self, index: CodedIndex) -> Result<bool> {
        match index.tag {
            TableId::TypeDef => Ok(!self.type_def_in_surface(index.row)?),
            TableId::TypeSpec => {
                let row = self.type_spec_row(index.row)?;
                let data = self.image.blob.get(row.signature as usize)?;

                let mut parser = crate::Parser::new(data);
                if parser.peek_byte().ok() != Some(ELEMENT_TYPE::GENERICINST) {
                    return Ok(false);
                }

                parser.read_le::<u8>()?;
                let head = parser.read_le::<u8>()?;
                if head != ELEMENT_TYPE::CLASS && head != ELEMENT_TYPE::VALUETYPE {
                    return Ok(false);
                }

                let generic_type = parser.read_compressed_token()?;
                if generic_type.table() == TableId::TypeDef as u8 {
                    Ok(!self.type_def_in_surface(generic_type.row())?)
                } else {
                    Ok(false)
                }
            }
            _ => Ok(false),
        }
    }

    fn has_surface_accessor(
        &self,
        association: Token,
        accessors: &FxHashSet<u32>,
        mask: u16,
    ) -> Result<bool> {
        let Some(rids) = self.index.semantics.get(&association) else {
            return Ok(false);
        };

        for &ms_rid in rids {
            let row = self.method_semantics_row(ms_rid)?;
            if row.semantics & mask != 0 && accessors.contains(&row.method) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn field_surface_hash(&mut self, field: &FieldRaw) -> Result<u64> {
        let name = self.string_hash(field.name)?;
        let flags = u64::from(u32::from(field.flags) & classifier::FIELD_HASHED_ATTRIBUTES);
        let field_type = self.field_sig_hash(field.signature)?;

        let constant = if u32::from(field.flags) & classifier::FIELD_LITERAL != 0 {
            match self.index.constants.get(&field.token).copied() {
                Some(constant_rid) => self.constant_hash(constant_rid)?,
                None => hashing::OFFSET,
            }
        } else {
            hashing::OFFSET
        };

        let attrs = self.custom_attributes_hash(field.token)?;

        Ok(hashing::combine_seq(&[
            name, flags, field_type, constant, attrs,
        ]))
    }

    fn method_surface_hash(&mut self, method: &MethodDefRaw) -> Result<u64> {
        let name = self.string_hash(method.name)?;
        let flags = u64::from(u32::from(method.flags) & classifier::METHOD_HASHED_ATTRIBUTES);
        let generics = self.generic_params_hash(method.token)?;

        let (param_start, param_end) = self.param_range(method);
        let mut param_hashes = Vec::new();
        for param_rid in param_start..param_end {
            let param = self.param_row(param_rid)?;
            param_hashes.push(self.param_surface_hash(&param)?);
        }
        let params = hashing::combine_seq(&param_hashes);

        let signature = self.method_sig_hash(method.signature)?;
        let attrs = self.custom_attributes_hash(method.token)?;

        Ok(hashing::combine_seq(&[
            name,
            flags,
            generics,
            params,
            signature.full,
            attrs,
        ]))
    }

    fn param_surface_hash(&mut self, param: &ParamRaw) -> Result<u64> {
        let name = self.string_hash(param.name)?;
        let flags = u64::from(u32::from(param.flags) & classifier::PARAM_HASHED_ATTRIBUTES);
        let attrs = self.custom_attributes_hash(param.token)?;

        let constant = match self.index.constants.get(&param.token).copied() {
            Some(constant_rid) => self.constant_hash(constant_rid)?,
            None => hashing::OFFSET,
        };

        Ok(hashing::combine_seq(&[name, flags, attrs, constant]))
    }

    /// Generic parameter names are ignored (parameters are positional) and
    /// the per-parameter hashes are sorted before the outer combine:
    /// position identity is fully captured by index, attributes and
    /// constraints, and external usage rebinds names anyway.
    fn generic_params_hash(&mut self, owner: Token) -> Result<u64> {
        let rids = match self.index.generic_params.get(&owner) {
            Some(rids) => rids.clone(),
            None => return Ok(hashing::OFFSET),
        };

        let mut params = Vec::with_capacity(rids.len());
        for rid in rids {
            let row = self.generic_param_row(rid)?;

            let mut constraints = Vec::new();
            for constraint_rid in self.index.constraints.get(&rid).cloned().unwrap_or_default() {
                let constraint = self.generic_param_constraint_row(constraint_rid)?;
                let usage = self.type_usage_from_coded(constraint.constraint)?;
                let attrs = self.custom_attributes_hash(constraint.token)?;
                constraints.push(hashing::combine2(usage, attrs));
            }
            let constraints_hash = hashing::combine_sorted(&mut constraints);

            let attrs = self.custom_attributes_hash(row.token)?;

            params.push(hashing::combine_seq(&[
                u64::from(row.number),
                u64::from(row.flags),
                constraints_hash,
                attrs,
            ]));
        }

        Ok(hashing::combine_sorted(&mut params))
    }

    // ------------------------------------------------------------------
    // Struct layout
    // ------------------------------------------------------------------

    /// Content hash over the types of a struct's instance fields. For
    /// typedefs that are not value types this delegates to the usage hash.
    fn struct_field_hash(&mut self, rid: u32) -> Result<u64> {
        if let Some(&hash) = self.cache.struct_layouts.get(&rid) {
            return Ok(hash);
        }

        let row = self.type_def_row(rid)?;

        let is_struct = if row.extends.is_null() {
            false
        } else {
            // Resolving the base registers System.ValueType on first sight
            self.type_usage_from_coded(row.extends)?;
            Some(row.extends.token) == self.well_known.system_value_type
        };

        if !is_struct {
            return self.type_def_usage_hash(rid);
        }

        // Break self-reference before descending: System.Int32 contains an
        // Int32 field in mscorlib. The offset basis is the empty structural
        // fingerprint, the correct fixpoint for such types.
        self.cache.struct_layouts.insert(rid, hashing::OFFSET);

        let (field_start, field_end) = self.field_range(&row);
        let mut layout = Vec::new();
        for field_rid in field_start..field_end {
            let field = self.field_row(field_rid)?;
            if u32::from(field.flags) & classifier::FIELD_STATIC != 0 {
                continue;
            }

            let data = self.image.blob.get(field.signature as usize)?;
            let mut resolver = LayoutTypes { hasher: &mut *self };
            layout.push(SignatureHasher::new(data, &mut resolver).hash_field_signature()?);
        }

        let hash = hashing::combine_sorted(&mut layout);
        self.cache.struct_layouts.insert(rid, hash);
        Ok(hash)
    }

    // ------------------------------------------------------------------
    // Entity ("usage") hashes
    // ------------------------------------------------------------------

    fn type_usage_from_coded(&mut self, index: CodedIndex) -> Result<u64> {
        match index.tag {
            TableId::TypeDef => self.type_def_usage_hash(index.row),
            TableId::TypeRef => self.type_ref_hash(index.row),
            TableId::TypeSpec => self.type_spec_usage_hash(index.row),
            _ => Err(malformed_error!(
                "Index does not denote a type - {}",
                index.token
            )),
        }
    }

    /// Identity of a type definition as seen from a usage site: namespace
    /// and name only. Visibility and members deliberately excluded.
    fn type_def_usage_hash(&mut self, rid: u32) -> Result<u64> {
        let token = Token::new(TableId::TypeDef.token_base() + rid);
        if let Some(&hash) = self.cache.entities.get(&token) {
            return Ok(hash);
        }

        let row = self.type_def_row(rid)?;
        let namespace = self.image.strings.get(row.type_namespace as usize)?;
        let name = self.image.strings.get(row.type_name as usize)?;
        let namespace_hash = self.string_hash(row.type_namespace)?;
        let name_hash = self.string_hash(row.type_name)?;

        let hash = hashing::combine2(namespace_hash, name_hash);

        self.well_known.observe(token, namespace_hash, namespace, name);
        self.cache.entities.insert(token, hash);
        Ok(hash)
    }

    fn type_ref_hash(&mut self, rid: u32) -> Result<u64> {
        let token = Token::new(TableId::TypeRef.token_base() + rid);
        if let Some(&hash) = self.cache.entities.get(&token) {
            return Ok(hash);
        }

        // Guard against malformed resolution-scope cycles; the placeholder
        // is replaced with the final value below
        self.cache.entities.insert(token, hashing::OFFSET);

        let row = self.type_ref_row(rid)?;
        let namespace = self.image.strings.get(row.type_namespace as usize)?;
        let name = self.image.strings.get(row.type_name as usize)?;
        let namespace_hash = self.string_hash(row.type_namespace)?;
        let name_hash = self.string_hash(row.type_name)?;

        let hash = if row.resolution_scope.is_null() {
            hashing::combine2(namespace_hash, name_hash)
        } else {
            match row.resolution_scope.tag {
                TableId::AssemblyRef => hashing::combine3(
                    self.assembly_ref_hash(row.resolution_scope.row)?,
                    namespace_hash,
                    name_hash,
                ),
                TableId::TypeRef => hashing::combine3(
                    self.type_ref_hash(row.resolution_scope.row)?,
                    namespace_hash,
                    name_hash,
                ),
                _ => hashing::combine2(namespace_hash, name_hash),
            }
        };

        self.well_known.observe(token, namespace_hash, namespace, name);
        self.cache.entities.insert(token, hash);
        Ok(hash)
    }

    fn type_spec_usage_hash(&mut self, rid: u32) -> Result<u64> {
        let token = Token::new(TableId::TypeSpec.token_base() + rid);
        if let Some(&hash) = self.cache.entities.get(&token) {
            return Ok(hash);
        }

        self.cache.entities.insert(token, hashing::OFFSET);

        let row = self.type_spec_row(rid)?;
        let data = self.image.blob.get(row.signature as usize)?;
        let signature = {
            let mut resolver = UsageTypes { hasher: &mut *self };
            SignatureHasher::new(data, &mut resolver).hash_type_spec_signature()?
        };
        let attrs = self.custom_attributes_hash(token)?;

        let hash = hashing::combine2(signature, attrs);
        self.cache.entities.insert(token, hash);
        Ok(hash)
    }

    fn assembly_ref_hash(&mut self, rid: u32) -> Result<u64> {
        let token = Token::new(TableId::AssemblyRef.token_base() + rid);
        if let Some(&hash) = self.cache.entities.get(&token) {
            return Ok(hash);
        }

        let row = self.assembly_ref_row(rid)?;
        let version = hashing::combine4(
            u64::from(row.major_version),
            u64::from(row.minor_version),
            u64::from(row.revision_number),
            u64::from(row.build_number),
        );

        let hash = hashing::combine4(
            self.string_hash(row.name)?,
            version,
            self.string_hash(row.culture)?,
            self.blob_hash(row.public_key_or_token)?,
        );

        self.cache.entities.insert(token, hash);
        Ok(hash)
    }

    fn member_ref_hash(&mut self, rid: u32) -> Result<u64> {
        let token = Token::new(TableId::MemberRef.token_base() + rid);
        if let Some(&hash) = self.cache.entities.get(&token) {
            return Ok(hash);
        }

        self.cache.entities.insert(token, hashing::OFFSET);

        let row = self.member_ref_row(rid)?;
        let name = self.string_hash(row.name)?;
        let data = self.image.blob.get(row.signature as usize)?;
        let attrs = self.custom_attributes_hash(token)?;

        // Field references start with the FIELD signature kind; everything
        // else is a method reference
        let hash = if data.first() == Some(&0x06) {
            let field_type = {
                let mut resolver = UsageTypes { hasher: &mut *self };
                SignatureHasher::new(data, &mut resolver).hash_field_signature()?
            };
            hashing::combine3(name, field_type, attrs)
        } else {
            let signature = {
                let mut resolver = UsageTypes { hasher: &mut *self };
                SignatureHasher::new(data, &mut resolver).hash_method_signature()?
            };
            hashing::combine4(
                name,
                signature.params_and_return,
                u64::from(signature.generic_param_count),
                attrs,
            )
        };

        self.cache.entities.insert(token, hash);
        Ok(hash)
    }

    fn method_def_usage_hash(&mut self, rid: u32) -> Result<u64> {
        let token = Token::new(TableId::MethodDef.token_base() + rid);
        if let Some(&hash) = self.cache.entities.get(&token) {
            return Ok(hash);
        }

        let row = self.method_row(rid)?;
        let name = self.string_hash(row.name)?;
        let signature = self.method_sig_hash(row.signature)?;

        let hash = hashing::combine2(name, signature.full);
        self.cache.entities.insert(token, hash);
        Ok(hash)
    }

    fn constant_hash(&mut self, rid: u32) -> Result<u64> {
        let token = Token::new(TableId::Constant.token_base() + rid);
        if let Some(&hash) = self.cache.entities.get(&token) {
            return Ok(hash);
        }

        let row = self.constant_row(rid)?;
        let hash = hashing::combine2(u64::from(row.base_type), self.blob_hash(row.value)?);

        self.cache.entities.insert(token, hash);
        Ok(hash)
    }

    // ------------------------------------------------------------------
    // Custom attributes
    // ------------------------------------------------------------------

    fn custom_attributes_hash(&mut self, parent: Token) -> Result<u64> {
        let rids = match self.index.custom_attrs.get(&parent) {
            Some(rids) => rids.clone(),
            None => return Ok(hashing::OFFSET),
        };

        let mut hashes = Vec::with_capacity(rids.len());
        for rid in rids {
            let row = self.custom_attribute_row(rid)?;
            if let Some(hash) = self.custom_attribute_hash(&row)? {
                hashes.push(hash);
            }
        }

        Ok(hashing::combine_sorted(&mut hashes))
    }

    /// Hash one attribute application, or `None` if the filter strips it.
    ///
    /// The constructor usage and the attribute's declaring type are hashed
    /// as entities; the value blob is folded opaquely after the prolog
    /// check. That is unambiguous because attribute blobs encode referenced
    /// types as strings, never as metadata handles.
    fn custom_attribute_hash(&mut self, row: &CustomAttributeRaw) -> Result<Option<u64>> {
        let (attr_type, type_usage, constructor) =
            self.attribute_constructor(row.constructor)?;

        if !self.options.contains(SurfaceHashOptions::INCLUDE_ALL_ATTRIBUTES)
            && self.well_known.is_ignored_attribute(attr_type)
        {
            return Ok(None);
        }

        let value = self.attribute_value_hash(row.value)?;
        Ok(Some(hashing::combine3(type_usage, constructor, value)))
    }

    /// Resolve an attribute constructor to its declaring type token, the
    /// type's usage hash and the constructor's own hash.
    fn attribute_constructor(&mut self, index: CodedIndex) -> Result<(Token, u64, u64)> {
        match index.tag {
            TableId::MemberRef => {
                let row = self.member_ref_row(index.row)?;
                let (attr_type, type_usage) = match row.class.tag {
                    TableId::TypeRef => (row.class.token, self.type_ref_hash(row.class.row)?),
                    TableId::TypeDef => {
                        (row.class.token, self.type_def_usage_hash(row.class.row)?)
                    }
                    TableId::TypeSpec => {
                        (row.class.token, self.type_spec_usage_hash(row.class.row)?)
                    }
                    _ => {
                        return Err(malformed_error!(
                            "Invalid custom attribute constructor parent - {}",
                            row.class.token
                        ))
                    }
                };

                Ok((attr_type, type_usage, self.member_ref_hash(index.row)?))
            }
            TableId::MethodDef => {
                let owner = self
                    .index
                    .method_owner
                    .get(&index.row)
                    .copied()
                    .ok_or_else(|| {
                        malformed_error!(
                            "Custom attribute constructor outside any type - {}",
                            index.token
                        )
                    })?;

                let attr_type = Token::new(TableId::TypeDef.token_base() + owner);
                let type_usage = self.type_def_usage_hash(owner)?;
                Ok((attr_type, type_usage, self.method_def_usage_hash(index.row)?))
            }
            _ => Err(malformed_error!(
                "Invalid custom attribute constructor - {}",
                index.token
            )),
        }
    }

    /// Validate the prolog and fold the raw payload bytes.
    fn attribute_value_hash(&mut self, blob_index: u32) -> Result<u64> {
        let data = self.image.blob.get(blob_index as usize)?;
        if data.is_empty() {
            return Ok(hashing::OFFSET);
        }

        if data.len() < 2 || u16::from_le_bytes([data[0], data[1]]) != 0x0001 {
            return Err(malformed_error!(
                "Invalid custom attribute prolog - expected 0x0001"
            ));
        }

        Ok(hashing::from_bytes(&data[2..]))
    }

    fn detect_internals_visible(&mut self) -> Result<bool> {
        let assembly_token = Token::new(TableId::Assembly.token_base() + 1);
        let rids = match self.index.custom_attrs.get(&assembly_token) {
            Some(rids) => rids.clone(),
            None => return Ok(false),
        };

        for rid in rids {
            let row = self.custom_attribute_row(rid)?;
            let Some((namespace_index, name_index)) =
                self.attribute_type_name_indices(row.constructor)?
            else {
                continue;
            };

            let namespace = self.image.strings.get(namespace_index as usize)?;
            let name = self.image.strings.get(name_index as usize)?;
            let namespace_hash = self.string_hash(namespace_index)?;
            if self
                .well_known
                .is_internals_visible_to(namespace_hash, namespace, name)
            {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// The string-heap indexes of an attribute constructor's declaring type
    /// name, when that type is nominal.
    fn attribute_type_name_indices(&self, index: CodedIndex) -> Result<Option<(u32, u32)>> {
        match index.tag {
            TableId::MemberRef => {
                let row = self.member_ref_row(index.row)?;
                match row.class.tag {
                    TableId::TypeRef => {
                        let type_ref = self.type_ref_row(row.class.row)?;
                        Ok(Some((type_ref.type_namespace, type_ref.type_name)))
                    }
                    TableId::TypeDef => {
                        let type_def = self.type_def_row(row.class.row)?;
                        Ok(Some((type_def.type_namespace, type_def.type_name)))
                    }
                    _ => Ok(None),
                }
            }
            TableId::MethodDef => match self.index.method_owner.get(&index.row) {
                Some(&owner) => {
                    let type_def = self.type_def_row(owner)?;
                    Ok(Some((type_def.type_namespace, type_def.type_name)))
                }
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Exported types and resources
    // ------------------------------------------------------------------

    fn exported_type_hash(&mut self, rid: u32) -> Result<u64> {
        let row = self.exported_type_row(rid)?;

        let flags_masked = u64::from(row.flags & classifier::TYPE_HASHED_ATTRIBUTES);
        let namespace = self.string_hash(row.type_namespace)?;
        let name = self.string_hash(row.type_name)?;
        let implementation = self.implementation_hash(row.implementation, 0)?;
        let attrs = self.custom_attributes_hash(row.token)?;

        Ok(hashing::combine_seq(&[
            flags_masked,
            namespace,
            name,
            implementation,
            attrs,
        ]))
    }

    fn implementation_hash(&mut self, index: CodedIndex, depth: usize) -> Result<u64> {
        if depth > MAX_NESTING_DEPTH {
            return Err(malformed_error!(
                "Cyclic implementation chain - {}",
                index.token
            ));
        }

        if index.is_null() {
            return Ok(hashing::OFFSET);
        }

        match index.tag {
            TableId::AssemblyRef => self.assembly_ref_hash(index.row),
            TableId::ExportedType => {
                let parent = self.exported_type_row(index.row)?;
                let parent_impl = self.implementation_hash(parent.implementation, depth + 1)?;
                Ok(hashing::combine3(
                    parent_impl,
                    self.string_hash(parent.type_namespace)?,
                    self.string_hash(parent.type_name)?,
                ))
            }
            // File-backed implementations live outside this image
            _ => Ok(hashing::OFFSET),
        }
    }

    /// Streams the resource body through a general-purpose digest and folds
    /// the digest into the hash; this keeps resource contents stable across
    /// re-emits regardless of where the body lands in the image.
    fn resource_hash(&mut self, row: &ManifestResourceRaw) -> Result<u64> {
        let name = self.string_hash(row.name)?;

        let body = if row.implementation.is_null() {
            let data = self.image.resource_data(row.data_offset)?;
            let digest = md5::compute(data);
            hashing::from_bytes(&digest.0)
        } else if row.implementation.tag == TableId::AssemblyRef {
            self.assembly_ref_hash(row.implementation.row)?
        } else {
            hashing::OFFSET
        };

        Ok(hashing::combine2(name, body))
    }

    // ------------------------------------------------------------------
    // Heap and signature plumbing
    // ------------------------------------------------------------------

    fn string_hash(&mut self, index: u32) -> Result<u64> {
        if let Some(&hash) = self.cache.strings.get(&index) {
            return Ok(hash);
        }

        let hash = if index == 0 {
            hashing::OFFSET
        } else {
            hashing::from_utf8(self.image.strings.get(index as usize)?)
        };

        self.cache.strings.insert(index, hash);
        Ok(hash)
    }

    fn blob_hash(&mut self, index: u32) -> Result<u64> {
        if index == 0 {
            return Ok(hashing::OFFSET);
        }

        Ok(hashing::from_bytes(self.image.blob.get(index as usize)?))
    }

    fn method_sig_hash(&mut self, blob_index: u32) -> Result<MethodSigHash> {
        let data = self.image.blob.get(blob_index as usize)?;
        let mut resolver = UsageTypes { hasher: &mut *self };
        SignatureHasher::new(data, &mut resolver).hash_method_signature()
    }

    fn field_sig_hash(&mut self, blob_index: u32) -> Result<u64> {
        let data = self.image.blob.get(blob_index as usize)?;
        let mut resolver = UsageTypes { hasher: &mut *self };
        SignatureHasher::new(data, &mut resolver).hash_field_signature()
    }

    // ------------------------------------------------------------------
    // Row access and member runs
    // ------------------------------------------------------------------

    fn assembly_row(&self) -> Result<AssemblyRaw> {
        self.image
            .tables
            .assembly
            .as_ref()
            .and_then(|table| table.get(1))
            .ok_or_else(|| malformed_error!("Assembly definition missing"))
    }

    fn type_def_row(&self, rid: u32) -> Result<TypeDefRaw> {
        self.image
            .tables
            .type_def
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("TypeDef row out of range - {}", rid))
    }

    fn type_ref_row(&self, rid: u32) -> Result<TypeRefRaw> {
        self.image
            .tables
            .type_ref
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("TypeRef row out of range - {}", rid))
    }

    fn type_spec_row(&self, rid: u32) -> Result<TypeSpecRaw> {
        self.image
            .tables
            .type_spec
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("TypeSpec row out of range - {}", rid))
    }

    fn field_row(&self, rid: u32) -> Result<FieldRaw> {
        self.image
            .tables
            .field
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("Field row out of range - {}", rid))
    }

    fn method_row(&self, rid: u32) -> Result<MethodDefRaw> {
        self.image
            .tables
            .method_def
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("MethodDef row out of range - {}", rid))
    }

    fn param_row(&self, rid: u32) -> Result<ParamRaw> {
        self.image
            .tables
            .param
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("Param row out of range - {}", rid))
    }

    fn interface_impl_row(&self, rid: u32) -> Result<InterfaceImplRaw> {
        self.image
            .tables
            .interface_impl
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("InterfaceImpl row out of range - {}", rid))
    }

    fn member_ref_row(&self, rid: u32) -> Result<MemberRefRaw> {
        self.image
            .tables
            .member_ref
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("MemberRef row out of range - {}", rid))
    }

    fn constant_row(&self, rid: u32) -> Result<ConstantRaw> {
        self.image
            .tables
            .constant
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("Constant row out of range - {}", rid))
    }

    fn custom_attribute_row(&self, rid: u32) -> Result<CustomAttributeRaw> {
        self.image
            .tables
            .custom_attribute
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("CustomAttribute row out of range - {}", rid))
    }

    fn property_row(&self, rid: u32) -> Result<PropertyRaw> {
        self.image
            .tables
            .property
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("Property row out of range - {}", rid))
    }

    fn event_row(&self, rid: u32) -> Result<EventRaw> {
        self.image
            .tables
            .event
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("Event row out of range - {}", rid))
    }

    fn method_semantics_row(&self, rid: u32) -> Result<MethodSemanticsRaw> {
        self.image
            .tables
            .method_semantics
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("MethodSemantics row out of range - {}", rid))
    }

    fn generic_param_row(&self, rid: u32) -> Result<GenericParamRaw> {
        self.image
            .tables
            .generic_param
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("GenericParam row out of range - {}", rid))
    }

    fn generic_param_constraint_row(&self, rid: u32) -> Result<GenericParamConstraintRaw> {
        self.image
            .tables
            .generic_param_constraint
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("GenericParamConstraint row out of range - {}", rid))
    }

    fn assembly_ref_row(&self, rid: u32) -> Result<AssemblyRefRaw> {
        self.image
            .tables
            .assembly_ref
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("AssemblyRef row out of range - {}", rid))
    }

    fn exported_type_row(&self, rid: u32) -> Result<ExportedTypeRaw> {
        self.image
            .tables
            .exported_type
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("ExportedType row out of range - {}", rid))
    }

    fn manifest_resource_row(&self, rid: u32) -> Result<ManifestResourceRaw> {
        self.image
            .tables
            .manifest_resource
            .as_ref()
            .and_then(|table| table.get(rid))
            .ok_or_else(|| malformed_error!("ManifestResource row out of range - {}", rid))
    }

    fn field_range(&self, row: &TypeDefRaw) -> (u32, u32) {
        let total = self
            .image
            .tables
            .field
            .as_ref()
            .map_or(0, |table| table.row_count());
        let next = self
            .image
            .tables
            .type_def
            .as_ref()
            .and_then(|table| table.get(row.rid + 1))
            .map(|next_row| next_row.field_list);
        list_range(row.field_list, next, total)
    }

    fn method_range(&self, row: &TypeDefRaw) -> (u32, u32) {
        let total = self
            .image
            .tables
            .method_def
            .as_ref()
            .map_or(0, |table| table.row_count());
        let next = self
            .image
            .tables
            .type_def
            .as_ref()
            .and_then(|table| table.get(row.rid + 1))
            .map(|next_row| next_row.method_list);
        list_range(row.method_list, next, total)
    }

    fn param_range(&self, row: &MethodDefRaw) -> (u32, u32) {
        let total = self
            .image
            .tables
            .param
            .as_ref()
            .map_or(0, |table| table.row_count());
        let next = self
            .image
            .tables
            .method_def
            .as_ref()
            .and_then(|table| table.get(row.rid + 1))
            .map(|next_row| next_row.param_list);
        list_range(row.param_list, next, total)
    }
}

/// Resolver producing identity ("usage") hashes for signature tokens.
struct UsageTypes<'h, 'a> {
    hasher: &'h mut SurfaceHasher<'a>,
}

impl TypeHashResolver for UsageTypes<'_, '_> {
    fn hash_type_def(&mut self, rid: u32) -> Result<u64> {
        self.hasher.type_def_usage_hash(rid)
    }

    fn hash_type_ref(&mut self, rid: u32) -> Result<u64> {
        self.hasher.type_ref_hash(rid)
    }

    fn hash_type_spec(&mut self, rid: u32) -> Result<u64> {
        self.hasher.type_spec_usage_hash(rid)
    }
}

/// Resolver recursing into struct layouts: a typedef sighted in a field
/// type contributes its own instance-field layout rather than its name.
struct LayoutTypes<'h, 'a> {
    hasher: &'h mut SurfaceHasher<'a>,
}

impl TypeHashResolver for LayoutTypes<'_, '_> {
    fn hash_type_def(&mut self, rid: u32) -> Result<u64> {
        self.hasher.struct_field_hash(rid)
    }

    fn hash_type_ref(&mut self, rid: u32) -> Result<u64> {
        self.hasher.type_ref_hash(rid)
    }

    fn hash_type_spec(&mut self, rid: u32) -> Result<u64> {
        self.hasher.type_spec_usage_hash(rid)
    }
}

/// Clamp a member-run `[start, next_start)` against the member table size.
fn list_range(start: u32, next: Option<u32>, total: u32) -> (u32, u32) {
    if start == 0 || total == 0 {
        return (1, 1);
    }

    let start = start.min(total + 1);
    let end = next.unwrap_or(total + 1).min(total + 1);
    (start, end.max(start))
}

fn build_index(image: &CilImage<'_>) -> SurfaceIndex {
    let mut index = SurfaceIndex::default();

    if let Some(table) = &image.tables.custom_attribute {
        for row in table.iter() {
            index
                .custom_attrs
                .entry(row.parent.token)
                .or_default()
                .push(row.rid);
        }
    }

    if let Some(table) = &image.tables.interface_impl {
        for row in table.iter() {
            index
                .interface_impls
                .entry(row.class)
                .or_default()
                .push(row.rid);
        }
    }

    if let Some(table) = &image.tables.nested_class {
        for row in table.iter() {
            index.enclosing.insert(row.nested_class, row.enclosing_class);
        }
    }

    if let Some(table) = &image.tables.generic_param {
        let mut by_owner: FxHashMap<Token, Vec<(u16, u32)>> = FxHashMap::default();
        for row in table.iter() {
            by_owner
                .entry(row.owner.token)
                .or_default()
                .push((row.number, row.rid));
        }

        for (owner, mut params) in by_owner {
            params.sort_unstable();
            index
                .generic_params
                .insert(owner, params.into_iter().map(|(_, rid)| rid).collect());
        }
    }

    if let Some(table) = &image.tables.generic_param_constraint {
        for row in table.iter() {
            index.constraints.entry(row.owner).or_default().push(row.rid);
        }
    }

    if let Some(table) = &image.tables.constant {
        for row in table.iter() {
            index.constants.insert(row.parent.token, row.rid);
        }
    }

    if let Some(table) = &image.tables.method_semantics {
        for row in table.iter() {
            index
                .semantics
                .entry(row.association.token)
                .or_default()
                .push(row.rid);
        }
    }

    if let (Some(map), Some(properties)) = (&image.tables.property_map, &image.tables.property) {
        let rows: Vec<_> = map.iter().collect();
        for (position, row) in rows.iter().enumerate() {
            let next = rows.get(position + 1).map(|next_row| next_row.property_list);
            index
                .property_ranges
                .insert(row.parent, list_range(row.property_list, next, properties.row_count()));
        }
    }

    if let (Some(map), Some(events)) = (&image.tables.event_map, &image.tables.event) {
        let rows: Vec<_> = map.iter().collect();
        for (position, row) in rows.iter().enumerate() {
            let next = rows.get(position + 1).map(|next_row| next_row.event_list);
            index
                .event_ranges
                .insert(row.parent, list_range(row.event_list, next, events.row_count()));
        }
    }

    if let Some(type_defs) = &image.tables.type_def {
        let method_total = image
            .tables
            .method_def
            .as_ref()
            .map_or(0, |table| table.row_count());
        let rows: Vec<_> = type_defs.iter().collect();
        for (position, row) in rows.iter().enumerate() {
            let next = rows.get(position + 1).map(|next_row| next_row.method_list);
            let (start, end) = list_range(row.method_list, next, method_total);
            for method_rid in start..end {
                index.method_owner.insert(method_rid, row.rid);
            }
        }
    }

    index
}
