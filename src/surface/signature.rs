//! Streaming signature hashing for ECMA-335 §II.23.2 blobs.
//!
//! [`SignatureHasher`] decodes method, field and type-spec signatures
//! directly into a single `u64` without materializing a signature tree.
//! Resolution of `TypeDef`/`TypeRef` tokens embedded in the blob is
//! delegated to a [`TypeHashResolver`]; the decoder is generic over the
//! resolver and monomorphized per caller, so the two resolution strategies
//! (identity hashing and struct-layout hashing) share one decoder.
//!
//! The per-element hash derivation uses small numeric markers to keep
//! distinct constructors distinct (`T[]` vs `T*` vs `T&`); the markers have
//! no metadata meaning.
//!
//! ## Notes:
//! - Besides ECMA-335, it's also worth looking at <https://github.com/dotnet/runtime/blob/main/docs/design/coreclr/profiling/davbr-blog-archive/samples/sigparse.cpp>
//! - A `SignatureHasher` instance decodes exactly one signature; do not
//!   re-use it.

use crate::{
    file::parser::Parser,
    hashing,
    metadata::tables::TableId,
    Error::RecursionLimit,
    Result,
};

/// Maximum recursion depth for signature decoding
const MAX_RECURSION_DEPTH: usize = 50;

/// Constants representing .NET metadata element types as defined in
/// ECMA-335 §II.23.1.16.
#[allow(non_snake_case, dead_code, missing_docs)]
pub mod ELEMENT_TYPE {
    /// Marks the end of a list in signatures
    pub const END: u8 = 0x00;
    /// Void type (no return value)
    pub const VOID: u8 = 0x01;
    /// Boolean type (true/false)
    pub const BOOLEAN: u8 = 0x02;
    /// 16-bit Unicode character
    pub const CHAR: u8 = 0x03;
    /// Signed 8-bit integer
    pub const I1: u8 = 0x04;
    /// Unsigned 8-bit integer
    pub const U1: u8 = 0x05;
    /// Signed 16-bit integer
    pub const I2: u8 = 0x06;
    /// Unsigned 16-bit integer
    pub const U2: u8 = 0x07;
    /// Signed 32-bit integer
    pub const I4: u8 = 0x08;
    /// Unsigned 32-bit integer
    pub const U4: u8 = 0x09;
    /// Signed 64-bit integer
    pub const I8: u8 = 0x0a;
    /// Unsigned 64-bit integer
    pub const U8: u8 = 0x0b;
    /// 32-bit floating point
    pub const R4: u8 = 0x0c;
    /// 64-bit floating point
    pub const R8: u8 = 0x0d;
    /// String type
    pub const STRING: u8 = 0x0e;
    /// Unmanaged pointer (followed by type)
    pub const PTR: u8 = 0x0f;
    /// Managed reference (followed by type)
    pub const BYREF: u8 = 0x10;
    /// Value type (followed by `TypeDef` or `TypeRef` token)
    pub const VALUETYPE: u8 = 0x11;
    /// Reference type/class (followed by `TypeDef` or `TypeRef` token)
    pub const CLASS: u8 = 0x12;
    /// Generic parameter in a generic type definition (by position)
    pub const VAR: u8 = 0x13;
    /// Multi-dimensional array (type rank boundsCount bound1 ... loCount lo1 ...)
    pub const ARRAY: u8 = 0x14;
    /// Generic type instantiation (type type-arg-count type-1 ... type-n)
    pub const GENERICINST: u8 = 0x15;
    /// Typed reference type
    pub const TYPEDBYREF: u8 = 0x16;
    /// Native integer type (System.IntPtr)
    pub const I: u8 = 0x18;
    /// Native unsigned integer type (System.UIntPtr)
    pub const U: u8 = 0x19;
    /// Function pointer (followed by full method signature)
    pub const FNPTR: u8 = 0x1b;
    /// Object type (System.Object)
    pub const OBJECT: u8 = 0x1c;
    /// Single-dimension array with 0 lower bound
    pub const SZARRAY: u8 = 0x1d;
    /// Generic parameter in a generic method definition (by position)
    pub const MVAR: u8 = 0x1e;
    /// Required modifier (followed by a `TypeDef` or `TypeRef` token)
    pub const CMOD_REQD: u8 = 0x1f;
    /// Optional modifier (followed by a `TypeDef` or `TypeRef` token)
    pub const CMOD_OPT: u8 = 0x20;
    /// Sentinel for vararg method signature
    pub const SENTINEL: u8 = 0x41;
    /// Denotes a local variable that points at a pinned object
    pub const PINNED: u8 = 0x45;
}

/// Disambiguation marker folded after an SZArray element type
const MARKER_SZARRAY: u64 = 1;
/// Disambiguation marker folded after a ByRef element type
const MARKER_BYREF: u64 = 2;
/// Disambiguation marker folded after a Pointer element type
const MARKER_PTR: u64 = 3;
/// Disambiguation marker folded after a Pinned element type
const MARKER_PINNED: u64 = 4;
/// Disambiguation marker for required custom modifiers
const MARKER_MODREQ: u64 = 42;
/// Base offset separating generic type parameters from primitive codes
const MARKER_VAR: u64 = 1_000;
/// Base offset separating generic method parameters from type parameters
const MARKER_MVAR: u64 = 1_000_000;

/// Hook for resolving the `TypeDef`/`TypeRef`/`TypeSpec` tokens a signature
/// blob embeds.
///
/// The surface hasher provides two implementations: one producing identity
/// ("usage") hashes and one recursing into struct layouts.
pub trait TypeHashResolver {
    /// Hash a `TypeDef` row referenced from a signature.
    ///
    /// # Errors
    /// Returns an error if the row does not exist or resolution fails.
    fn hash_type_def(&mut self, rid: u32) -> Result<u64>;

    /// Hash a `TypeRef` row referenced from a signature.
    ///
    /// # Errors
    /// Returns an error if the row does not exist or resolution fails.
    fn hash_type_ref(&mut self, rid: u32) -> Result<u64>;

    /// Hash a `TypeSpec` row referenced from a signature. Only reachable
    /// when the decoder was constructed with `allow_type_specs`.
    ///
    /// # Errors
    /// Returns an error if the row does not exist or resolution fails.
    fn hash_type_spec(&mut self, rid: u32) -> Result<u64>;
}

/// The hashes of one decoded method signature.
pub struct MethodSigHash {
    /// `combine(combine_seq(param_hashes), return_hash)`
    pub params_and_return: u64,
    /// Generic parameter count from the signature header
    pub generic_param_count: u32,
    /// The full hash used for member identity: parameters, return type and
    /// generic parameter count
    pub full: u64,
}

/// Streaming hasher over one signature blob.
pub struct SignatureHasher<'a, 'r, R: TypeHashResolver> {
    parser: Parser<'a>,
    resolver: &'r mut R,
    allow_type_specs: bool,
    depth: usize,
}

impl<'a, 'r, R: TypeHashResolver> SignatureHasher<'a, 'r, R> {
    /// Create a new `SignatureHasher` over a signature blob.
    ///
    /// ## Arguments
    /// * 'data' - The signature blob bytes
    /// * 'resolver' - Resolution callback for embedded type tokens
    pub fn new(data: &'a [u8], resolver: &'r mut R) -> Self {
        SignatureHasher {
            parser: Parser::new(data),
            resolver,
            allow_type_specs: false,
            depth: 0,
        }
    }

    /// Like [`SignatureHasher::new`], but permits `TypeSpec` tokens after
    /// Class/ValueType tags. The signature grammar reserves this for the
    /// LocalConstantSig contexts of the portable PDB format; ordinary
    /// signatures reject such tokens as malformed.
    pub fn with_type_specs(data: &'a [u8], resolver: &'r mut R) -> Self {
        SignatureHasher {
            parser: Parser::new(data),
            resolver,
            allow_type_specs: true,
            depth: 0,
        }
    }

    /// Hash a `MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig`
    /// (II.23.2.1-3), honoring the IsGeneric bit and the vararg sentinel.
    ///
    /// # Errors
    /// Returns an error if the blob is malformed or truncated.
    pub fn hash_method_signature(&mut self) -> Result<MethodSigHash> {
        let convention = self.parser.read_le::<u8>()?;

        let generic_param_count = if convention & 0x10 != 0 {
            self.parser.read_compressed_uint()?
        } else {
            0
        };

        let param_count = self.parser.read_compressed_uint()?;
        let return_hash = self.hash_type()?;

        let mut param_hashes = Vec::with_capacity(param_count as usize);
        let mut parsed = 0;
        while parsed < param_count {
            if self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                // Vararg boundary; folded so a moved boundary changes the hash
                self.parser.read_le::<u8>()?;
                param_hashes.push(u64::from(ELEMENT_TYPE::SENTINEL));
                continue;
            }

            param_hashes.push(self.hash_type()?);
            parsed += 1;
        }

        let params_and_return =
            hashing::combine2(hashing::combine_seq(&param_hashes), return_hash);

        Ok(MethodSigHash {
            params_and_return,
            generic_param_count,
            full: hashing::combine2(params_and_return, u64::from(generic_param_count)),
        })
    }

    /// Hash a `FieldSig` (II.23.2.4).
    ///
    /// # Errors
    /// Returns an error if the header kind is not FIELD or the type is
    /// malformed.
    pub fn hash_field_signature(&mut self) -> Result<u64> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != 0x06 {
            // 0x06 == FIELD
            return Err(malformed_error!(
                "FieldSig - invalid start - {}",
                head_byte
            ));
        }

        self.hash_type()
    }

    /// Hash a `TypeSpecSig` (II.23.2.14): a bare type.
    ///
    /// # Errors
    /// Returns an error if the type is malformed.
    pub fn hash_type_spec_signature(&mut self) -> Result<u64> {
        self.hash_type()
    }

    /// Hash a single type from the signature blob
    fn hash_type(&mut self) -> Result<u64> {
        self.depth += 1;
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let result = self.hash_type_unchecked();
        self.depth -= 1;
        result
    }

    fn hash_type_unchecked(&mut self) -> Result<u64> {
        let current_byte = self.parser.read_le::<u8>()?;
        match current_byte {
            ELEMENT_TYPE::VOID
            | ELEMENT_TYPE::BOOLEAN
            | ELEMENT_TYPE::CHAR
            | ELEMENT_TYPE::I1
            | ELEMENT_TYPE::U1
            | ELEMENT_TYPE::I2
            | ELEMENT_TYPE::U2
            | ELEMENT_TYPE::I4
            | ELEMENT_TYPE::U4
            | ELEMENT_TYPE::I8
            | ELEMENT_TYPE::U8
            | ELEMENT_TYPE::R4
            | ELEMENT_TYPE::R8
            | ELEMENT_TYPE::STRING
            | ELEMENT_TYPE::TYPEDBYREF
            | ELEMENT_TYPE::I
            | ELEMENT_TYPE::U
            | ELEMENT_TYPE::OBJECT => Ok(u64::from(current_byte)),

            ELEMENT_TYPE::PTR => Ok(hashing::combine2(self.hash_type()?, MARKER_PTR)),
            ELEMENT_TYPE::BYREF => Ok(hashing::combine2(self.hash_type()?, MARKER_BYREF)),
            ELEMENT_TYPE::PINNED => Ok(hashing::combine2(self.hash_type()?, MARKER_PINNED)),
            ELEMENT_TYPE::SZARRAY => Ok(hashing::combine2(self.hash_type()?, MARKER_SZARRAY)),

            ELEMENT_TYPE::VALUETYPE | ELEMENT_TYPE::CLASS => self.hash_typedef_or_ref(),

            ELEMENT_TYPE::VAR => Ok(hashing::combine2(
                u64::from(self.parser.read_compressed_uint()?),
                MARKER_VAR,
            )),
            ELEMENT_TYPE::MVAR => Ok(hashing::combine2(
                u64::from(self.parser.read_compressed_uint()?),
                MARKER_MVAR,
            )),

            ELEMENT_TYPE::ARRAY => {
                let elem_hash = self.hash_type()?;
                let rank = self.parser.read_compressed_uint()?;

                let num_sizes = self.parser.read_compressed_uint()?;
                let mut sizes = Vec::with_capacity(num_sizes as usize);
                for _ in 0..num_sizes {
                    sizes.push(u64::from(self.parser.read_compressed_uint()?));
                }

                let num_lo_bounds = self.parser.read_compressed_uint()?;
                let mut lo_bounds = Vec::with_capacity(num_lo_bounds as usize);
                for _ in 0..num_lo_bounds {
                    #[allow(clippy::cast_sign_loss)]
                    lo_bounds.push(self.parser.read_compressed_int()? as u64);
                }

                Ok(hashing::combine4(
                    elem_hash,
                    u64::from(rank),
                    hashing::combine_seq(&lo_bounds),
                    hashing::combine_seq(&sizes),
                ))
            }

            ELEMENT_TYPE::GENERICINST => {
                let peek_byte = self.parser.peek_byte()?;
                if peek_byte != ELEMENT_TYPE::CLASS && peek_byte != ELEMENT_TYPE::VALUETYPE {
                    return Err(malformed_error!(
                        "GENERICINST - Next byte is not TYPE_CLASS or TYPE_VALUE - {}",
                        peek_byte
                    ));
                }

                let base_hash = self.hash_type()?;
                let arg_count = self.parser.read_compressed_uint()?;
                if arg_count == 0 {
                    return Err(malformed_error!(
                        "GENERICINST - empty type argument sequence"
                    ));
                }

                let mut arg_hashes = Vec::with_capacity(arg_count as usize);
                for _ in 0..arg_count {
                    arg_hashes.push(self.hash_type()?);
                }

                Ok(hashing::combine2(
                    base_hash,
                    hashing::combine_seq(&arg_hashes),
                ))
            }

            ELEMENT_TYPE::FNPTR => {
                let method = self.hash_fnptr_signature()?;
                Ok(method)
            }

            ELEMENT_TYPE::CMOD_REQD | ELEMENT_TYPE::CMOD_OPT => {
                let modifier_hash = self.hash_typedef_or_ref()?;
                let modified_hash = self.hash_type()?;

                let marker = if current_byte == ELEMENT_TYPE::CMOD_REQD {
                    MARKER_MODREQ
                } else {
                    0
                };

                Ok(hashing::combine3(modified_hash, modifier_hash, marker))
            }

            _ => Err(malformed_error!(
                "Unsupported ELEMENT_TYPE - {}",
                current_byte
            )),
        }
    }

    /// Hash a compressed `TypeDefOrRef` token via the resolver.
    fn hash_typedef_or_ref(&mut self) -> Result<u64> {
        let token = self.parser.read_compressed_token()?;
        match token.table() {
            table if table == TableId::TypeDef as u8 => self.resolver.hash_type_def(token.row()),
            table if table == TableId::TypeRef as u8 => self.resolver.hash_type_ref(token.row()),
            _ => {
                if self.allow_type_specs {
                    self.resolver.hash_type_spec(token.row())
                } else {
                    Err(malformed_error!(
                        "TypeSpec token not allowed in this signature context - {}",
                        token
                    ))
                }
            }
        }
    }

    /// Hash the method signature embedded in an FNPTR element. Unlike
    /// top-level method signatures, the calling convention participates in
    /// the hash; `void (*)(int)` and `int (__stdcall*)(int)` differ.
    fn hash_fnptr_signature(&mut self) -> Result<u64> {
        let convention = self.parser.read_le::<u8>()?;

        let generic_param_count = if convention & 0x10 != 0 {
            self.parser.read_compressed_uint()?
        } else {
            0
        };

        let param_count = self.parser.read_compressed_uint()?;
        let return_hash = self.hash_type()?;

        let mut param_hashes = Vec::with_capacity(param_count as usize);
        let mut parsed = 0;
        while parsed < param_count {
            if self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                self.parser.read_le::<u8>()?;
                param_hashes.push(u64::from(ELEMENT_TYPE::SENTINEL));
                continue;
            }

            param_hashes.push(self.hash_type()?);
            parsed += 1;
        }

        Ok(hashing::combine4(
            return_hash,
            hashing::combine_seq(&param_hashes),
            u64::from(generic_param_count),
            u64::from(convention),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::{combine2, combine3, combine4, combine_seq};

    /// Resolver returning distinguishable constants per table and row.
    struct StubResolver;

    impl TypeHashResolver for StubResolver {
        fn hash_type_def(&mut self, rid: u32) -> Result<u64> {
            Ok(0x0200_0000_0000 + u64::from(rid))
        }

        fn hash_type_ref(&mut self, rid: u32) -> Result<u64> {
            Ok(0x0100_0000_0000 + u64::from(rid))
        }

        fn hash_type_spec(&mut self, rid: u32) -> Result<u64> {
            Ok(0x1B00_0000_0000 + u64::from(rid))
        }
    }

    fn hash_type(data: &[u8]) -> Result<u64> {
        let mut resolver = StubResolver;
        SignatureHasher::new(data, &mut resolver).hash_type_spec_signature()
    }

    #[test]
    fn primitives_hash_to_their_codes() {
        for code in [0x01_u8, 0x02, 0x08, 0x0E, 0x18, 0x1C] {
            assert_eq!(hash_type(&[code]).unwrap(), u64::from(code));
        }
    }

    #[test]
    fn constructed_type_markers() {
        // int* -> combine(I4, 3)
        assert_eq!(hash_type(&[0x0F, 0x08]).unwrap(), combine2(8, 3));
        // ref int -> combine(I4, 2)
        assert_eq!(hash_type(&[0x10, 0x08]).unwrap(), combine2(8, 2));
        // int[] -> combine(I4, 1)
        assert_eq!(hash_type(&[0x1D, 0x08]).unwrap(), combine2(8, 1));
        // pinned int -> combine(I4, 4)
        assert_eq!(hash_type(&[0x45, 0x08]).unwrap(), combine2(8, 4));
    }

    #[test]
    fn byref_and_ptr_disambiguated() {
        assert_ne!(
            hash_type(&[0x0F, 0x08]).unwrap(),
            hash_type(&[0x10, 0x08]).unwrap()
        );
    }

    #[test]
    fn generic_parameters_by_position() {
        // !0 and !!0 must differ; !0 and !1 must differ
        assert_eq!(hash_type(&[0x13, 0x00]).unwrap(), combine2(0, 1_000));
        assert_eq!(hash_type(&[0x1E, 0x00]).unwrap(), combine2(0, 1_000_000));
        assert_ne!(
            hash_type(&[0x13, 0x00]).unwrap(),
            hash_type(&[0x13, 0x01]).unwrap()
        );
    }

    #[test]
    fn class_and_valuetype_resolve_through_callback() {
        // CLASS, compressed token tag 1 (TypeRef), row 1 -> 0x05
        assert_eq!(hash_type(&[0x12, 0x05]).unwrap(), 0x0100_0000_0001);
        // VALUETYPE, compressed token tag 0 (TypeDef), row 2 -> 0x08
        assert_eq!(hash_type(&[0x11, 0x08]).unwrap(), 0x0200_0000_0002);
    }

    #[test]
    fn typespec_token_rejected_by_default() {
        // CLASS, compressed token tag 2 (TypeSpec), row 1
        assert!(hash_type(&[0x12, 0x06]).is_err());

        // ...but resolves when explicitly allowed
        let mut resolver = StubResolver;
        let mut hasher = SignatureHasher::with_type_specs(&[0x12, 0x06], &mut resolver);
        assert_eq!(hasher.hash_type_spec_signature().unwrap(), 0x1B00_0000_0001);
    }

    #[test]
    fn generic_instance() {
        // List<int> where List = TypeRef row 1: GENERICINST CLASS tok 1 I4
        let hash = hash_type(&[0x15, 0x12, 0x05, 0x01, 0x08]).unwrap();
        assert_eq!(hash, combine2(0x0100_0000_0001, combine_seq(&[8])));

        // Zero type arguments is malformed
        assert!(hash_type(&[0x15, 0x12, 0x05, 0x00]).is_err());
    }

    #[test]
    fn array_shape() {
        // int[2,3]: ARRAY I4 rank=2 numSizes=2 2 3 numLo=0
        let hash = hash_type(&[0x14, 0x08, 0x02, 0x02, 0x02, 0x03, 0x00]).unwrap();
        assert_eq!(
            hash,
            combine4(8, 2, combine_seq(&[]), combine_seq(&[2, 3]))
        );

        // Same rank, different sizes -> different hash
        let other = hash_type(&[0x14, 0x08, 0x02, 0x02, 0x02, 0x04, 0x00]).unwrap();
        assert_ne!(hash, other);
    }

    #[test]
    fn custom_modifiers() {
        // modreq(TypeRef row 1) int
        let required = hash_type(&[0x1F, 0x05, 0x08]).unwrap();
        assert_eq!(required, combine3(8, 0x0100_0000_0001, 42));

        // modopt(TypeRef row 1) int
        let optional = hash_type(&[0x20, 0x05, 0x08]).unwrap();
        assert_eq!(optional, combine3(8, 0x0100_0000_0001, 0));

        assert_ne!(required, optional);
    }

    #[test]
    fn method_signature() {
        // static int M(string, object): conv 0, 2 params, ret I4
        let mut resolver = StubResolver;
        let mut hasher =
            SignatureHasher::new(&[0x00, 0x02, 0x08, 0x0E, 0x1C], &mut resolver);
        let sig = hasher.hash_method_signature().unwrap();

        assert_eq!(sig.generic_param_count, 0);
        assert_eq!(
            sig.params_and_return,
            combine2(combine_seq(&[0x0E, 0x1C]), 0x08)
        );
        assert_eq!(sig.full, combine2(sig.params_and_return, 0));
    }

    #[test]
    fn method_signature_generic_count_in_full_hash() {
        // void M<T>(!!0): conv GENERIC(0x10), 1 generic param, 1 param
        let mut resolver = StubResolver;
        let mut hasher =
            SignatureHasher::new(&[0x30, 0x01, 0x01, 0x01, 0x1E, 0x00], &mut resolver);
        let sig = hasher.hash_method_signature().unwrap();

        assert_eq!(sig.generic_param_count, 1);
        assert_ne!(sig.full, sig.params_and_return);
    }

    #[test]
    fn method_signature_vararg_sentinel() {
        // vararg void M(int, ..., string): conv VARARG(0x5), 2 params,
        // ret VOID, I4, SENTINEL, STRING
        let mut resolver = StubResolver;
        let mut hasher = SignatureHasher::new(
            &[0x05, 0x02, 0x01, 0x08, 0x41, 0x0E],
            &mut resolver,
        );
        let with_sentinel = hasher.hash_method_signature().unwrap();

        let mut resolver = StubResolver;
        let mut hasher = SignatureHasher::new(&[0x05, 0x02, 0x01, 0x08, 0x0E], &mut resolver);
        let without_sentinel = hasher.hash_method_signature().unwrap();

        // Moving the vararg boundary is a surface change
        assert_ne!(with_sentinel.full, without_sentinel.full);
    }

    #[test]
    fn field_signature() {
        let mut resolver = StubResolver;
        let mut hasher = SignatureHasher::new(&[0x06, 0x08], &mut resolver);
        assert_eq!(hasher.hash_field_signature().unwrap(), 0x08);

        // Wrong header kind
        let mut resolver = StubResolver;
        let mut hasher = SignatureHasher::new(&[0x07, 0x08], &mut resolver);
        assert!(hasher.hash_field_signature().is_err());
    }

    #[test]
    fn invalid_element_code() {
        assert!(hash_type(&[0xFF]).is_err());
        // Sentinel outside a parameter list
        assert!(hash_type(&[0x41]).is_err());
    }

    #[test]
    fn recursion_limit() {
        // 60 nested pointers exceeds the depth limit
        let mut data = vec![0x0F; 60];
        data.push(0x08);
        assert!(matches!(
            hash_type(&data),
            Err(crate::Error::RecursionLimit(_))
        ));
    }

    #[test]
    fn function_pointer() {
        // method void *(int): FNPTR conv 0, 1 param, ret VOID, I4
        let hash = hash_type(&[0x1B, 0x00, 0x01, 0x01, 0x08]).unwrap();
        assert_eq!(hash, combine4(0x01, combine_seq(&[0x08]), 0, 0));

        // A different calling convention changes the hash
        let stdcall = hash_type(&[0x1B, 0x02, 0x01, 0x01, 0x08]).unwrap();
        assert_ne!(hash, stdcall);
    }
}
