//! FNV-1a style 64-bit hash folding.
//!
//! All hashes produced by this crate are built from the single mixing step
//! `h = (h * PRIME) ^ x` in wrapping arithmetic. The combinators here are the
//! only way hash values are merged; every caller picks either a positional
//! fold ([`combine_seq`]) or an order-independent fold ([`combine_sorted`])
//! depending on whether metadata row order carries meaning.
//!
//! The combine functions deliberately do *not* restart from [`OFFSET`]: they
//! left-fold starting from their first argument, because combines are
//! routinely nested and re-seeding would collapse distinct shapes onto the
//! same value.

/// FNV-1a 64-bit offset basis. Also the hash of the empty byte string and of
/// the empty sequence.
pub const OFFSET: u64 = 14_695_981_039_346_656_037;

/// FNV-1a 64-bit prime.
pub const PRIME: u64 = 1_099_511_628_211;

/// The core mixing step: `(h * PRIME) ^ x` in wrapping arithmetic.
#[inline]
#[must_use]
pub fn fold(h: u64, x: u64) -> u64 {
    h.wrapping_mul(PRIME) ^ x
}

/// Hash a UTF-8 string byte-by-byte. Empty input returns [`OFFSET`].
#[must_use]
pub fn from_utf8(text: &str) -> u64 {
    from_bytes(text.as_bytes())
}

/// Hash an arbitrary byte blob byte-by-byte. Empty input returns [`OFFSET`].
#[must_use]
pub fn from_bytes(data: &[u8]) -> u64 {
    let mut hash = OFFSET;
    for byte in data {
        hash = fold(hash, u64::from(*byte));
    }
    hash
}

/// Left-fold two values, starting from `a`.
#[inline]
#[must_use]
pub fn combine2(a: u64, b: u64) -> u64 {
    fold(a, b)
}

/// Left-fold three values, starting from `a`.
#[inline]
#[must_use]
pub fn combine3(a: u64, b: u64, c: u64) -> u64 {
    fold(fold(a, b), c)
}

/// Left-fold four values, starting from `a`.
#[inline]
#[must_use]
pub fn combine4(a: u64, b: u64, c: u64, d: u64) -> u64 {
    fold(fold(fold(a, b), c), d)
}

/// Left-fold five values, starting from `a`.
#[inline]
#[must_use]
pub fn combine5(a: u64, b: u64, c: u64, d: u64, e: u64) -> u64 {
    fold(fold(fold(fold(a, b), c), d), e)
}

/// Fold a sequence of values in order, starting from [`OFFSET`].
///
/// Use this for positional collections only (method parameters, array
/// bounds, generic argument lists). Collections whose metadata order is an
/// emission artifact go through [`combine_sorted`] instead.
#[must_use]
pub fn combine_seq(values: &[u64]) -> u64 {
    let mut hash = OFFSET;
    for value in values {
        hash = fold(hash, *value);
    }
    hash
}

/// Sort ascending, then fold like [`combine_seq`].
///
/// This is the canonicalization mechanism for every set where table-row
/// order is an artifact of emission: type definitions in an assembly,
/// members within a type, interface implementations, generic-parameter
/// constraints, custom attributes.
#[must_use]
pub fn combine_sorted(values: &mut Vec<u64>) -> u64 {
    values.sort_unstable();
    combine_seq(values)
}
