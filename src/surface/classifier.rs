//! API-surface membership predicates.
//!
//! Whether an entity belongs to the surface is decided purely from its CLR
//! visibility bits, the assembly-wide `InternalsVisibleTo` state, and a
//! compiler-generated-name heuristic. Nested-type chains are resolved by the
//! hasher, which owns the tables; the predicates here are per-row.

/// `TypeAttributes` visibility: not nested, not exported
pub const TYPE_VIS_NOT_PUBLIC: u32 = 0x0;
/// `TypeAttributes` visibility: not nested, exported
pub const TYPE_VIS_PUBLIC: u32 = 0x1;
/// `TypeAttributes` visibility: nested, public
pub const TYPE_VIS_NESTED_PUBLIC: u32 = 0x2;
/// `TypeAttributes` visibility: nested, private
pub const TYPE_VIS_NESTED_PRIVATE: u32 = 0x3;
/// `TypeAttributes` visibility: nested, family
pub const TYPE_VIS_NESTED_FAMILY: u32 = 0x4;
/// `TypeAttributes` visibility: nested, assembly
pub const TYPE_VIS_NESTED_ASSEMBLY: u32 = 0x5;
/// `TypeAttributes` visibility: nested, family AND assembly
pub const TYPE_VIS_NESTED_FAM_AND_ASSEM: u32 = 0x6;
/// `TypeAttributes` visibility: nested, family OR assembly
pub const TYPE_VIS_NESTED_FAM_OR_ASSEM: u32 = 0x7;

/// Bitmask for `TypeAttributes` visibility extraction
pub const TYPE_VISIBILITY_MASK: u32 = 0x0000_0007;

/// The `TypeAttributes` bits that contribute to a type's surface hash:
/// visibility, class semantics (interface), Abstract, Sealed, SpecialName
/// and RTSpecialName.
pub const TYPE_HASHED_ATTRIBUTES: u32 = 0x0000_0DA7;

/// Bitmask for member access extraction (`MethodAttributes` / `FieldAttributes`)
pub const MEMBER_ACCESS_MASK: u32 = 0x0007;

/// Member access: family AND assembly
pub const MEMBER_ACCESS_FAM_AND_ASSEM: u32 = 0x2;
/// Member access: assembly
pub const MEMBER_ACCESS_ASSEMBLY: u32 = 0x3;
/// Member access: family
pub const MEMBER_ACCESS_FAMILY: u32 = 0x4;
/// Member access: family OR assembly
pub const MEMBER_ACCESS_FAM_OR_ASSEM: u32 = 0x5;
/// Member access: public
pub const MEMBER_ACCESS_PUBLIC: u32 = 0x6;

/// The `FieldAttributes` bits that contribute to a field's surface hash:
/// access, Static, InitOnly, Literal, SpecialName.
pub const FIELD_HASHED_ATTRIBUTES: u32 = 0x0277;

/// `FieldAttributes`: the field is static
pub const FIELD_STATIC: u32 = 0x0010;
/// `FieldAttributes`: the field value is a compile-time constant
pub const FIELD_LITERAL: u32 = 0x0040;

/// The `MethodAttributes` bits that contribute to a method's surface hash:
/// access, Static, Final, Virtual, Abstract, SpecialName.
pub const METHOD_HASHED_ATTRIBUTES: u32 = 0x0C77;

/// `MethodAttributes`: the method is special (accessor, operator, ctor)
pub const METHOD_SPECIAL_NAME: u32 = 0x0800;

/// The `ParamAttributes` bits that contribute to a parameter's surface hash:
/// In, Out, Retval, Optional, HasDefault.
pub const PARAM_HASHED_ATTRIBUTES: u32 = 0x101B;

/// `ManifestResourceAttributes`: the resource is exported from the assembly
pub const RESOURCE_PUBLIC: u32 = 0x0001;

/// Resource-name prefixes under which the F# compiler embeds signature
/// metadata of the assembly and of everything it references.
const FSHARP_SIGNATURE_PREFIXES: [&str; 3] = [
    "FSharpSignatureInfo.",
    "FSharpSignatureData.",
    "FSharpSignatureCompressedData.",
];

/// Returns true if a name marks a compiler-generated entity.
///
/// Covers `<Module>`, `<PrivateImplementationDetails>`, C# file-local types
/// of the form `<Program>F9627...__A`, and similar mangled names. The CLS
/// forbids a leading `<` for user-visible identifiers, so the first byte is
/// a reliable discriminator.
#[must_use]
pub fn is_compiler_generated_name(name: &str) -> bool {
    name.as_bytes().first() == Some(&b'<')
}

/// Decides whether a type definition row belongs to the API surface, based
/// on its own visibility only. Nested types additionally require every
/// enclosing type to be in surface, which the caller resolves.
///
/// ## Arguments
/// * 'flags' - The raw `TypeAttributes` of the row
/// * 'name' - The type name (for the compiler-generated exclusion)
/// * '`internals_visible`' - Whether the assembly grants `InternalsVisibleTo`
#[must_use]
pub fn type_in_surface(flags: u32, name: &str, internals_visible: bool) -> bool {
    match flags & TYPE_VISIBILITY_MASK {
        TYPE_VIS_PUBLIC
        | TYPE_VIS_NESTED_PUBLIC
        | TYPE_VIS_NESTED_FAMILY
        | TYPE_VIS_NESTED_FAM_OR_ASSEM => true,
        TYPE_VIS_NOT_PUBLIC | TYPE_VIS_NESTED_ASSEMBLY | TYPE_VIS_NESTED_FAM_AND_ASSEM => {
            internals_visible && !is_compiler_generated_name(name)
        }
        _ => false,
    }
}

/// Returns true if a type visibility denotes a nested type.
#[must_use]
pub fn is_nested_visibility(flags: u32) -> bool {
    (flags & TYPE_VISIBILITY_MASK) >= TYPE_VIS_NESTED_PUBLIC
}

/// Decides whether a member (method or field) belongs to the API surface.
///
/// ## Arguments
/// * 'flags' - The raw `MethodAttributes` or `FieldAttributes` of the row
/// * '`internals_visible`' - Whether the assembly grants `InternalsVisibleTo`
#[must_use]
pub fn member_in_surface(flags: u32, internals_visible: bool) -> bool {
    match flags & MEMBER_ACCESS_MASK {
        MEMBER_ACCESS_PUBLIC | MEMBER_ACCESS_FAMILY | MEMBER_ACCESS_FAM_OR_ASSEM => true,
        MEMBER_ACCESS_ASSEMBLY | MEMBER_ACCESS_FAM_AND_ASSEM => internals_visible,
        _ => false,
    }
}

/// Decides whether a manifest resource belongs to the API surface.
///
/// Public resources are in surface. F# signature resources embed metadata
/// for referenced assemblies as well; only the entries named after the
/// current assembly matter for its consumers.
///
/// ## Arguments
/// * 'flags' - The raw `ManifestResourceAttributes` of the row
/// * 'name' - The resource name
/// * '`assembly_name`' - The simple name of the current assembly
#[must_use]
pub fn resource_in_surface(flags: u32, name: &str, assembly_name: &str) -> bool {
    if flags & RESOURCE_PUBLIC == 0 {
        return false;
    }

    for prefix in FSHARP_SIGNATURE_PREFIXES {
        if name.starts_with(prefix) {
            return name.ends_with(assembly_name);
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_types_always_in_surface() {
        assert!(type_in_surface(TYPE_VIS_PUBLIC, "Widget", false));
        assert!(type_in_surface(TYPE_VIS_NESTED_PUBLIC, "Inner", false));
        assert!(type_in_surface(TYPE_VIS_NESTED_FAMILY, "Inner", false));
        assert!(type_in_surface(TYPE_VIS_NESTED_FAM_OR_ASSEM, "Inner", false));
    }

    #[test]
    fn internal_types_gated_by_ivt() {
        assert!(!type_in_surface(TYPE_VIS_NOT_PUBLIC, "Helper", false));
        assert!(type_in_surface(TYPE_VIS_NOT_PUBLIC, "Helper", true));

        assert!(!type_in_surface(TYPE_VIS_NESTED_ASSEMBLY, "Inner", false));
        assert!(type_in_surface(TYPE_VIS_NESTED_ASSEMBLY, "Inner", true));
    }

    #[test]
    fn private_nested_never_in_surface() {
        assert!(!type_in_surface(TYPE_VIS_NESTED_PRIVATE, "Inner", false));
        assert!(!type_in_surface(TYPE_VIS_NESTED_PRIVATE, "Inner", true));
    }

    #[test]
    fn compiler_generated_excluded_even_with_ivt() {
        assert!(!type_in_surface(TYPE_VIS_NOT_PUBLIC, "<Module>", true));
        assert!(!type_in_surface(
            TYPE_VIS_NOT_PUBLIC,
            "<PrivateImplementationDetails>",
            true
        ));
        assert!(!type_in_surface(
            TYPE_VIS_NOT_PUBLIC,
            "<Program>F9627BF276F09F6D272E6C4A9D1F22E6A8C14084A06296A1F2DB27117B3EB960__A",
            true
        ));

        // But a public type with such a name stays in (visibility wins)
        assert!(type_in_surface(TYPE_VIS_PUBLIC, "<Odd>", true));
    }

    #[test]
    fn member_access_levels() {
        assert!(member_in_surface(MEMBER_ACCESS_PUBLIC, false));
        assert!(member_in_surface(MEMBER_ACCESS_FAMILY, false));
        assert!(member_in_surface(MEMBER_ACCESS_FAM_OR_ASSEM, false));

        assert!(!member_in_surface(MEMBER_ACCESS_ASSEMBLY, false));
        assert!(member_in_surface(MEMBER_ACCESS_ASSEMBLY, true));
        assert!(!member_in_surface(MEMBER_ACCESS_FAM_AND_ASSEM, false));
        assert!(member_in_surface(MEMBER_ACCESS_FAM_AND_ASSEM, true));

        // Private / compiler-controlled stay out regardless
        assert!(!member_in_surface(0x1, true));
        assert!(!member_in_surface(0x0, true));
    }

    #[test]
    fn resources_require_public_flag() {
        assert!(resource_in_surface(1, "app.config", "MyLib"));
        assert!(!resource_in_surface(2, "app.config", "MyLib"));
    }

    #[test]
    fn fsharp_signature_resources_match_own_assembly() {
        assert!(resource_in_surface(1, "FSharpSignatureData.MyLib", "MyLib"));
        assert!(!resource_in_surface(1, "FSharpSignatureData.Other", "MyLib"));
        assert!(resource_in_surface(
            1,
            "FSharpSignatureCompressedData.MyLib",
            "MyLib"
        ));
        assert!(!resource_in_surface(1, "FSharpSignatureInfo.Dep", "MyLib"));
    }
}
