//! Well-known-type registry.
//!
//! Populated as a side effect of type-reference and type-definition usage
//! hashing: whenever a type whose namespace matches one of the well-known
//! namespaces flows through the hasher, its token is classified here. The
//! namespace comparison runs the interned string hash as a quick filter
//! first, then confirms with a real string compare; a hash collision must
//! not silently misclassify a type.

use rustc_hash::FxHashSet;

use crate::{hashing, metadata::token::Token};

/// Registry of attribute classification and `System.ValueType` discovery,
/// filled lazily during traversal.
pub struct WellKnownTypes {
    /// Attribute types stripped from the surface hash
    /// (`CompilerGeneratedAttribute`).
    pub ignored_attribute_types: FxHashSet<Token>,
    /// Attribute types that are always surface-relevant, even when the type
    /// itself is internal.
    pub included_attribute_types: FxHashSet<Token>,
    /// The token of `System.ValueType`, once sighted. Used to distinguish
    /// structs from classes.
    pub system_value_type: Option<Token>,

    hash_system: u64,
    hash_compiler_services: u64,
    hash_code_analysis: u64,
}

/// Namespace of runtime compiler-behavior attributes.
pub const NS_COMPILER_SERVICES: &str = "System.Runtime.CompilerServices";
/// Namespace of nullable-analysis attributes.
pub const NS_CODE_ANALYSIS: &str = "System.Diagnostics.CodeAnalysis";
/// The root namespace.
pub const NS_SYSTEM: &str = "System";

/// The attribute stripped from the surface hash: it marks compiler plumbing
/// that consumers cannot observe.
pub const COMPILER_GENERATED_ATTRIBUTE: &str = "CompilerGeneratedAttribute";

/// The attribute whose presence widens the assembly's surface to internals.
pub const INTERNALS_VISIBLE_TO_ATTRIBUTE: &str = "InternalsVisibleToAttribute";

/// `System` types that are surface-relevant attributes.
const SYSTEM_INCLUDED_ATTRIBUTES: [&str; 4] = [
    "ObsoleteAttribute",
    "AttributeUsageAttribute",
    "FlagsAttribute",
    "ParamArrayAttribute",
];

impl WellKnownTypes {
    /// Create an empty registry with the namespace filter hashes
    /// precomputed.
    #[must_use]
    pub fn new() -> Self {
        WellKnownTypes {
            ignored_attribute_types: FxHashSet::default(),
            included_attribute_types: FxHashSet::default(),
            system_value_type: None,
            hash_system: hashing::from_utf8(NS_SYSTEM),
            hash_compiler_services: hashing::from_utf8(NS_COMPILER_SERVICES),
            hash_code_analysis: hashing::from_utf8(NS_CODE_ANALYSIS),
        }
    }

    /// Classify a sighted type by namespace and name.
    ///
    /// Called for every type reference and type definition flowing through
    /// usage hashing. `namespace_hash` must be the interned hash of
    /// `namespace`; it acts as the quick filter before the confirming string
    /// comparison.
    pub fn observe(&mut self, token: Token, namespace_hash: u64, namespace: &str, name: &str) {
        if namespace_hash == self.hash_compiler_services && namespace == NS_COMPILER_SERVICES {
            if name == COMPILER_GENERATED_ATTRIBUTE {
                self.ignored_attribute_types.insert(token);
            } else {
                self.included_attribute_types.insert(token);
            }
            return;
        }

        if namespace_hash == self.hash_system && namespace == NS_SYSTEM {
            if name == "ValueType" {
                if self.system_value_type.is_none() {
                    self.system_value_type = Some(token);
                }
            } else if SYSTEM_INCLUDED_ATTRIBUTES.contains(&name) {
                self.included_attribute_types.insert(token);
            }
            return;
        }

        if namespace_hash == self.hash_code_analysis && namespace == NS_CODE_ANALYSIS {
            self.included_attribute_types.insert(token);
        }
    }

    /// Returns true if attributes of this type are stripped from the
    /// surface hash.
    #[must_use]
    pub fn is_ignored_attribute(&self, token: Token) -> bool {
        self.ignored_attribute_types.contains(&token)
    }

    /// Returns true if the given namespace/name pair denotes
    /// `System.Runtime.CompilerServices.InternalsVisibleToAttribute`.
    /// `namespace_hash` is the quick filter; the string compare confirms.
    #[must_use]
    pub fn is_internals_visible_to(&self, namespace_hash: u64, namespace: &str, name: &str) -> bool {
        namespace_hash == self.hash_compiler_services
            && namespace == NS_COMPILER_SERVICES
            && name == INTERNALS_VISIBLE_TO_ATTRIBUTE
    }
}

impl Default for WellKnownTypes {
    fn default() -> Self {
        Self::new()
    }
}
