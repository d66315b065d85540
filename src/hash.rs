//! Domain-separated hashing of heterogeneous cryptographic values.
//!
//! Every hash in the system reduces to [`hash_elems`]: the arguments are
//! canonicalized to a `|`-delimited UTF-8 transcript, fed through SHA-256,
//! and reduced modulo `q`. The canonicalization is part of the public
//! interface; a verifier reproduces every hash from the election record byte
//! for byte.

use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::constants::small_prime;
use crate::group::{ElementModP, ElementModQ};

/// Anything that folds its fields into a single `ElementModQ`.
pub trait CryptoHashable {
    fn crypto_hash(&self) -> ElementModQ;
}

/// One canonicalized argument to [`hash_elems`].
///
/// - field elements contribute their minimal even-length uppercase hex
/// - strings contribute themselves
/// - plain integers contribute their decimal rendering
/// - absent values and empty sequences contribute the literal `null`
/// - non-empty sequences contribute the hex of their recursive hash
#[derive(Debug, Clone)]
pub enum HashInput {
    Token(String),
    Absent,
    Sequence(Vec<HashInput>),
}

impl From<&ElementModP> for HashInput {
    fn from(value: &ElementModP) -> Self {
        HashInput::Token(value.to_hash_hex())
    }
}

impl From<&ElementModQ> for HashInput {
    fn from(value: &ElementModQ) -> Self {
        HashInput::Token(value.to_hash_hex())
    }
}

impl From<&str> for HashInput {
    fn from(value: &str) -> Self {
        HashInput::Token(value.to_string())
    }
}

impl From<&String> for HashInput {
    fn from(value: &String) -> Self {
        HashInput::Token(value.clone())
    }
}

impl From<u32> for HashInput {
    fn from(value: u32) -> Self {
        HashInput::Token(value.to_string())
    }
}

impl From<u64> for HashInput {
    fn from(value: u64) -> Self {
        HashInput::Token(value.to_string())
    }
}

impl From<Vec<HashInput>> for HashInput {
    fn from(value: Vec<HashInput>) -> Self {
        HashInput::Sequence(value)
    }
}

impl<'a, T> From<Option<&'a T>> for HashInput
where
    HashInput: From<&'a T>,
{
    fn from(value: Option<&'a T>) -> Self {
        match value {
            Some(inner) => HashInput::from(inner),
            None => HashInput::Absent,
        }
    }
}

/// Hash together zero or more canonicalized values, producing an element of
/// `Z_q`. See [`HashInput`] for the canonicalization rules.
pub fn hash_elems(elems: &[HashInput]) -> ElementModQ {
    let mut hasher = Sha256::new();
    hasher.update(b"|");
    for elem in elems {
        let token = match elem {
            HashInput::Token(token) => token.clone(),
            HashInput::Absent => "null".to_string(),
            HashInput::Sequence(items) if items.is_empty() => "null".to_string(),
            HashInput::Sequence(items) => hash_elems(items).to_hash_hex(),
        };
        hasher.update(token.as_bytes());
        hasher.update(b"|");
    }
    let digest = BigUint::from_bytes_be(&hasher.finalize());
    ElementModQ(digest % small_prime())
}

/// Hash together the given values after converting each to a [`HashInput`].
#[macro_export]
macro_rules! hash_elems {
    ($($x:expr),+ $(,)?) => {
        $crate::hash::hash_elems(&[$($crate::hash::HashInput::from($x)),+])
    };
}
