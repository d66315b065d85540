//! Modular arithmetic in `Z_p` and `Z_q`.
//!
//! Two distinct element types keep the two moduli apart at the type level:
//! reducing an intended-mod-p value modulo q is a compile error, not a silent
//! bug. All results are held in canonical reduced form.

use std::fmt;

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{g_pow_radix, large_prime, p_hex_width, q_hex_width, small_prime};
use crate::error::Error;

/// An element of the larger mod-`p` space, i.e. in `[0, P)`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ElementModP(pub(crate) BigUint);

/// An element of the smaller mod-`q` space, i.e. in `[0, Q)`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ElementModQ(pub(crate) BigUint);

impl ElementModP {
    /// Construct from an integer already in `[0, P)`.
    pub fn new(value: BigUint) -> Result<Self, Error> {
        if &value < large_prime() {
            Ok(ElementModP(value))
        } else {
            Err(Error::InvalidElement(format!(
                "{} is out of range for mod p",
                value.to_str_radix(16)
            )))
        }
    }

    pub fn from_hex(input: &str) -> Result<Self, Error> {
        let value = BigUint::parse_bytes(input.as_bytes(), 16)
            .ok_or_else(|| Error::InvalidElement(format!("invalid hex: {input}")))?;
        Self::new(value)
    }

    pub fn one() -> Self {
        ElementModP(BigUint::one())
    }

    /// Lowercase hex, zero-padded to the full field width. The wire form.
    pub fn to_hex(&self) -> String {
        format!("{:0>width$}", self.0.to_str_radix(16), width = p_hex_width())
    }

    /// Uppercase, minimal even-length hex. The hash-transcript form.
    pub fn to_hash_hex(&self) -> String {
        int_to_hash_hex(&self.0)
    }

    /// Big-endian bytes of the hash-transcript form.
    pub fn to_hash_bytes(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    pub fn is_in_bounds(&self) -> bool {
        &self.0 < large_prime()
    }

    /// True when the element is a member of the order-`q` subgroup.
    pub fn is_valid_residue(&self) -> bool {
        self.is_in_bounds() && self.0.modpow(small_prime(), large_prime()) == BigUint::one()
    }
}

impl ElementModQ {
    /// Construct from an integer already in `[0, Q)`.
    pub fn new(value: BigUint) -> Result<Self, Error> {
        if &value < small_prime() {
            Ok(ElementModQ(value))
        } else {
            Err(Error::InvalidElement(format!(
                "{} is out of range for mod q",
                value.to_str_radix(16)
            )))
        }
    }

    pub fn from_hex(input: &str) -> Result<Self, Error> {
        let value = BigUint::parse_bytes(input.as_bytes(), 16)
            .ok_or_else(|| Error::InvalidElement(format!("invalid hex: {input}")))?;
        Self::new(value)
    }

    /// Construct from a small integer, reduced mod `q`.
    pub fn from_u64_reduced(value: u64) -> Self {
        ElementModQ(BigUint::from(value) % small_prime())
    }

    pub fn zero() -> Self {
        ElementModQ(BigUint::zero())
    }

    pub fn one() -> Self {
        ElementModQ(BigUint::one())
    }

    /// Lowercase hex, zero-padded to the full field width. The wire form.
    pub fn to_hex(&self) -> String {
        format!("{:0>width$}", self.0.to_str_radix(16), width = q_hex_width())
    }

    /// Uppercase, minimal even-length hex. The hash-transcript form.
    pub fn to_hash_hex(&self) -> String {
        int_to_hash_hex(&self.0)
    }

    /// Big-endian bytes, zero-padded to the field width.
    pub fn to_padded_bytes(&self) -> Vec<u8> {
        let width = q_hex_width() / 2;
        let bytes = self.0.to_bytes_be();
        let mut padded = vec![0u8; width.saturating_sub(bytes.len())];
        padded.extend_from_slice(&bytes);
        padded
    }

    /// Big-endian bytes of the hash-transcript form.
    pub fn to_hash_bytes(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    pub fn is_in_bounds(&self) -> bool {
        &self.0 < small_prime()
    }

    pub fn is_in_bounds_no_zero(&self) -> bool {
        !self.0.is_zero() && self.is_in_bounds()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

/// Uppercase hex with an even number of digits and no redundant leading
/// zeros, matching the transcript canonicalization.
pub(crate) fn int_to_hash_hex(value: &BigUint) -> String {
    let hex = format!("{:X}", value);
    if hex.len() % 2 == 1 {
        format!("0{hex}")
    } else {
        hex
    }
}

impl fmt::Debug for ElementModP {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementModP({})", self.to_hash_hex())
    }
}

impl fmt::Debug for ElementModQ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementModQ({})", self.to_hash_hex())
    }
}

impl Serialize for ElementModP {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ElementModP {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ElementModP::from_hex(&text).map_err(de::Error::custom)
    }
}

impl Serialize for ElementModQ {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ElementModQ {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ElementModQ::from_hex(&text).map_err(de::Error::custom)
    }
}

/// Add together one or more elements in `Z_q`.
pub fn add_q(elems: &[&ElementModQ]) -> ElementModQ {
    let q = small_prime();
    let mut sum = BigUint::zero();
    for e in elems {
        sum = (sum + &e.0) % q;
    }
    ElementModQ(sum)
}

/// Compute `(a - b) mod q`.
pub fn a_minus_b_q(a: &ElementModQ, b: &ElementModQ) -> ElementModQ {
    let q = small_prime();
    ElementModQ((q + &a.0 - &b.0) % q)
}

/// Compute `(q - a) mod q`.
pub fn negate_q(a: &ElementModQ) -> ElementModQ {
    let q = small_prime();
    ElementModQ((q - &a.0) % q)
}

/// Compute `(a + b * c) mod q`.
pub fn a_plus_bc_q(a: &ElementModQ, b: &ElementModQ, c: &ElementModQ) -> ElementModQ {
    let q = small_prime();
    ElementModQ((&a.0 + &b.0 * &c.0) % q)
}

/// Compute the product mod `q` of all elements.
pub fn mult_q(elems: &[&ElementModQ]) -> ElementModQ {
    let q = small_prime();
    let mut product = BigUint::one();
    for e in elems {
        product = product * &e.0 % q;
    }
    ElementModQ(product)
}

/// Compute `b^e mod q`.
pub fn pow_q(b: &ElementModQ, e: &ElementModQ) -> ElementModQ {
    ElementModQ(b.0.modpow(&e.0, small_prime()))
}

/// Compute `a / b mod q`. The modulus is prime, so any non-zero `b` has an
/// inverse.
pub fn div_q(a: &ElementModQ, b: &ElementModQ) -> Result<ElementModQ, Error> {
    if b.0.is_zero() {
        return Err(Error::InvalidElement("division by zero mod q".to_string()));
    }
    let q = small_prime();
    let exponent = q - BigUint::from(2u8);
    let inverse = b.0.modpow(&exponent, q);
    Ok(ElementModQ(&a.0 * inverse % q))
}

/// Compute the product mod `p` of all elements.
pub fn mult_p(elems: &[&ElementModP]) -> ElementModP {
    let p = large_prime();
    let mut product = BigUint::one();
    for e in elems {
        product = product * &e.0 % p;
    }
    ElementModP(product)
}

/// Compute the multiplicative inverse mod `p` of a non-zero element.
pub fn mult_inv_p(e: &ElementModP) -> Result<ElementModP, Error> {
    if e.0.is_zero() {
        return Err(Error::InvalidElement(
            "no multiplicative inverse for zero".to_string(),
        ));
    }
    let p = large_prime();
    let exponent = p - BigUint::from(2u8);
    Ok(ElementModP(e.0.modpow(&exponent, p)))
}

/// Compute `a / b mod p`.
pub fn div_p(a: &ElementModP, b: &ElementModP) -> Result<ElementModP, Error> {
    let inverse = mult_inv_p(b)?;
    Ok(mult_p(&[a, &inverse]))
}

/// Compute `b^e mod p`. Variable-time; for public inputs only.
pub fn pow_p(b: &ElementModP, e: &ElementModQ) -> ElementModP {
    ElementModP(b.0.modpow(&e.0, large_prime()))
}

/// Compute `b^e mod p` with a fixed-length square-and-multiply-always
/// ladder. Used wherever the exponent is a secret (keys, nonces, polynomial
/// coordinates); the multiplication count does not depend on the exponent.
pub fn pow_p_secret(b: &ElementModP, e: &ElementModQ) -> ElementModP {
    let p = large_prime();
    let bits = small_prime().bits();
    let factors = [BigUint::one(), b.0.clone()];
    let mut acc = BigUint::one();
    for i in (0..bits).rev() {
        acc = &acc * &acc % p;
        acc = acc * &factors[e.0.bit(i) as usize] % p;
    }
    ElementModP(acc)
}

/// Compute `g^e mod p` through the precomputed fixed-base table.
pub fn g_pow_p(e: &ElementModQ) -> ElementModP {
    ElementModP(g_pow_radix().pow(&e.0))
}

/// Generate a uniformly random element in `[0, Q)`.
pub fn rand_q() -> ElementModQ {
    let mut csprng = rand::rngs::OsRng {};
    ElementModQ(csprng.gen_biguint_below(small_prime()))
}

/// Generate a uniformly random element in `[start, Q)`.
pub fn rand_range_q(start: &ElementModQ) -> ElementModQ {
    let mut csprng = rand::rngs::OsRng {};
    loop {
        let candidate = csprng.gen_biguint_below(small_prime());
        if candidate >= start.0 {
            return ElementModQ(candidate);
        }
    }
}
