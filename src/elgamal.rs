//! Exponential ElGamal encryption over the order-`q` subgroup.
//!
//! The plaintext rides in the exponent (`data = K^r * g^m`), which makes
//! ciphertexts additively homomorphic: multiplying pairs component-wise adds
//! the plaintexts. Decryption recovers the exponent through the bounded
//! discrete log.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::dlog::{discrete_log, discrete_log_default};
use crate::error::Error;
use crate::group::{
    g_pow_p, mult_inv_p, mult_p, pow_p_secret, rand_range_q, ElementModP, ElementModQ,
};
use crate::hash::CryptoHashable;
use crate::hash_elems;

pub type ElGamalSecretKey = ElementModQ;
pub type ElGamalPublicKey = ElementModP;

const BLOCK_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// A tuple of an ElGamal secret key and public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElGamalKeyPair {
    pub secret_key: ElGamalSecretKey,
    pub public_key: ElGamalPublicKey,
}

/// An exponential ElGamal ciphertext. Create one with [`elgamal_encrypt`],
/// add them with [`elgamal_add`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElGamalCiphertext {
    /// pad or alpha: `g^r`
    pub pad: ElementModP,
    /// encrypted data or beta: `K^r * g^m`
    pub data: ElementModP,
}

impl ElGamalCiphertext {
    /// Both components are members of the order-`q` subgroup.
    pub fn is_valid_residue_pair(&self) -> bool {
        self.pad.is_valid_residue() && self.data.is_valid_residue()
    }

    /// Decrypt with a known blinding factor `M = pad^s`.
    pub fn decrypt_known_product(&self, product: &ElementModP) -> Result<u64, Error> {
        let inverse = mult_inv_p(product)?;
        discrete_log_default(&mult_p(&[&self.data, &inverse]))
    }

    /// Decrypt with the ElGamal secret key.
    pub fn decrypt(&self, secret_key: &ElGamalSecretKey) -> Result<u64, Error> {
        self.decrypt_known_product(&pow_p_secret(&self.pad, secret_key))
    }

    /// Decrypt with the nonce used at encryption time and the public key.
    pub fn decrypt_known_nonce(
        &self,
        public_key: &ElGamalPublicKey,
        nonce: &ElementModQ,
    ) -> Result<u64, Error> {
        self.decrypt_known_product(&pow_p_secret(public_key, nonce))
    }

    /// Decrypt with a bounded search ceiling instead of the default.
    pub fn decrypt_known_product_bounded(
        &self,
        product: &ElementModP,
        max_exponent: u64,
    ) -> Result<u64, Error> {
        let inverse = mult_inv_p(product)?;
        discrete_log(&mult_p(&[&self.data, &inverse]), max_exponent)
    }

    /// The share `M_i = A^s mod p` this key holder contributes to a
    /// cooperative decryption.
    pub fn partial_decrypt(&self, secret_key: &ElGamalSecretKey) -> ElementModP {
        pow_p_secret(&self.pad, secret_key)
    }
}

impl CryptoHashable for ElGamalCiphertext {
    fn crypto_hash(&self) -> ElementModQ {
        hash_elems![&self.pad, &self.data]
    }
}

/// Given an ElGamal secret key in `[2, Q)`, returns the keypair with public
/// key `g^secret`.
pub fn elgamal_keypair_from_secret(secret_key: ElGamalSecretKey) -> Result<ElGamalKeyPair, Error> {
    if secret_key.0 < num_bigint::BigUint::from(2u8) {
        return Err(Error::WeakSecret);
    }
    let public_key = g_pow_p(&secret_key);
    Ok(ElGamalKeyPair {
        secret_key,
        public_key,
    })
}

/// Create a random ElGamal keypair.
pub fn elgamal_keypair_random() -> ElGamalKeyPair {
    let secret_key = rand_range_q(&ElementModQ::from_u64_reduced(2));
    // The sampled secret is in [2, Q) by construction.
    elgamal_keypair_from_secret(secret_key).expect("sampled secret is in range")
}

/// Combine multiple ElGamal public keys into a joint key.
pub fn elgamal_combine_public_keys(keys: &[&ElGamalPublicKey]) -> ElGamalPublicKey {
    mult_p(keys)
}

/// Encrypt a small message with a given nonce and an ElGamal public key.
///
/// The message must be a small non-negative integer; the nonce must be
/// non-zero, since a zero nonce publishes `g^m` in the clear.
pub fn elgamal_encrypt(
    message: u64,
    nonce: &ElementModQ,
    public_key: &ElGamalPublicKey,
) -> Result<ElGamalCiphertext, Error> {
    if nonce.is_zero() {
        return Err(Error::BadNonce);
    }
    let pad = g_pow_p(nonce);
    let g_pow_m = g_pow_p(&ElementModQ::from_u64_reduced(message));
    let pubkey_pow_n = pow_p_secret(public_key, nonce);
    let data = mult_p(&[&g_pow_m, &pubkey_pow_n]);
    Ok(ElGamalCiphertext { pad, data })
}

/// Homomorphically accumulate one or more ElGamal ciphertexts by pairwise
/// multiplication. The exponents of vote counters add.
pub fn elgamal_add(ciphertexts: &[&ElGamalCiphertext]) -> Result<ElGamalCiphertext, Error> {
    if ciphertexts.is_empty() {
        return Err(Error::InvariantViolation(
            "elgamal_add requires at least one ciphertext".to_string(),
        ));
    }
    let pads: Vec<&ElementModP> = ciphertexts.iter().map(|c| &c.pad).collect();
    let datas: Vec<&ElementModP> = ciphertexts.iter().map(|c| &c.data).collect();
    Ok(ElGamalCiphertext {
        pad: mult_p(&pads),
        data: mult_p(&datas),
    })
}

/// A hashed ElGamal ciphertext: variable-length data encrypted with an
/// HMAC-SHA256 keystream keyed from an ElGamal pad, with a MAC over the
/// whole message. Used to move partial-key backups between guardians.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedElGamalCiphertext {
    /// pad or alpha: `g^r`
    pub pad: ElementModP,
    /// hex-encoded ciphertext blocks
    pub data: String,
    /// hex-encoded message authentication code
    pub mac: String,
}

impl HashedElGamalCiphertext {
    /// Decrypt and authenticate. Returns the plaintext bytes, or an error if
    /// the MAC does not match.
    pub fn decrypt(
        &self,
        secret_key: &ElGamalSecretKey,
        encryption_seed: &ElementModQ,
    ) -> Result<Vec<u8>, Error> {
        let session_key = hash_elems![&self.pad, &pow_p_secret(&self.pad, secret_key)];
        let data_bytes = hex::decode(&self.data)
            .map_err(|_| Error::InvalidElement("invalid ciphertext hex".to_string()))?;
        let bit_length = (data_bytes.len() * 8) as u32;

        let mac_key = kdf_block(&session_key, encryption_seed, bit_length, 0);
        let mut to_mac = self.pad.to_hash_bytes();
        to_mac.extend_from_slice(&data_bytes);
        let mac = hex::encode(hmac_digest(&mac_key, &to_mac));
        if mac != self.mac {
            return Err(Error::ProofVerificationFailed(
                "MAC verification failed in decryption".to_string(),
            ));
        }

        let mut plaintext = Vec::with_capacity(data_bytes.len());
        for (i, block) in data_bytes.chunks(BLOCK_SIZE).enumerate() {
            let key_block = kdf_block(&session_key, encryption_seed, bit_length, (i + 1) as u32);
            plaintext.extend(block.iter().zip(key_block.iter()).map(|(a, b)| a ^ b));
        }
        Ok(plaintext)
    }
}

/// Encrypt a variable-length byte message with a given nonce, an ElGamal
/// public key, and a domain-separating encryption seed.
pub fn hashed_elgamal_encrypt(
    message: &[u8],
    nonce: &ElementModQ,
    public_key: &ElGamalPublicKey,
    encryption_seed: &ElementModQ,
) -> Result<HashedElGamalCiphertext, Error> {
    if nonce.is_zero() {
        return Err(Error::BadNonce);
    }
    let pad = g_pow_p(nonce);
    let pubkey_pow_n = pow_p_secret(public_key, nonce);
    let session_key = hash_elems![&pad, &pubkey_pow_n];

    let mut padded = message.to_vec();
    let remainder = padded.len() % BLOCK_SIZE;
    if remainder != 0 {
        padded.resize(padded.len() + BLOCK_SIZE - remainder, 0);
    }
    let bit_length = (padded.len() * 8) as u32;

    let mut data = Vec::with_capacity(padded.len());
    for (i, block) in padded.chunks(BLOCK_SIZE).enumerate() {
        let key_block = kdf_block(&session_key, encryption_seed, bit_length, (i + 1) as u32);
        data.extend(block.iter().zip(key_block.iter()).map(|(a, b)| a ^ b));
    }

    let mac_key = kdf_block(&session_key, encryption_seed, bit_length, 0);
    let mut to_mac = pad.to_hash_bytes();
    to_mac.extend_from_slice(&data);
    let mac = hex::encode(hmac_digest(&mac_key, &to_mac));

    Ok(HashedElGamalCiphertext {
        pad,
        data: hex::encode(data),
        mac,
    })
}

/// One 32-byte block of the HMAC counter-mode KDF. The counter and total
/// bit length bracket the seed so no block can be replayed at another
/// position or length.
fn kdf_block(
    session_key: &ElementModQ,
    encryption_seed: &ElementModQ,
    bit_length: u32,
    counter: u32,
) -> Vec<u8> {
    let mut message = counter.to_le_bytes().to_vec();
    message.extend(encryption_seed.to_hash_bytes());
    message.extend(bit_length.to_le_bytes());
    hmac_digest(&session_key.to_hash_bytes(), &message)
}

fn hmac_digest(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::use_test_constants;
    use crate::group::rand_q;

    fn keypair() -> ElGamalKeyPair {
        use_test_constants();
        elgamal_keypair_random()
    }

    #[test]
    fn weak_secrets_are_rejected() {
        use_test_constants();
        assert!(matches!(
            elgamal_keypair_from_secret(ElementModQ::zero()),
            Err(Error::WeakSecret)
        ));
        assert!(matches!(
            elgamal_keypair_from_secret(ElementModQ::one()),
            Err(Error::WeakSecret)
        ));
        assert!(elgamal_keypair_from_secret(ElementModQ::from_u64_reduced(2)).is_ok());
    }

    #[test]
    fn zero_nonce_is_rejected() {
        let keys = keypair();
        assert!(matches!(
            elgamal_encrypt(1, &ElementModQ::zero(), &keys.public_key),
            Err(Error::BadNonce)
        ));
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let keys = keypair();
        for message in [0u64, 1, 2, 17] {
            let nonce = rand_range_q(&ElementModQ::one());
            let ciphertext = elgamal_encrypt(message, &nonce, &keys.public_key).unwrap();
            assert_eq!(ciphertext.decrypt(&keys.secret_key).unwrap(), message);
            assert_eq!(
                ciphertext
                    .decrypt_known_nonce(&keys.public_key, &nonce)
                    .unwrap(),
                message
            );
        }
    }

    #[test]
    fn ciphertexts_are_subgroup_pairs() {
        let keys = keypair();
        let nonce = rand_range_q(&ElementModQ::one());
        let ciphertext = elgamal_encrypt(3, &nonce, &keys.public_key).unwrap();
        assert!(ciphertext.is_valid_residue_pair());
    }

    #[test]
    fn addition_is_homomorphic() {
        let keys = keypair();
        let n1 = rand_range_q(&ElementModQ::one());
        let n2 = rand_range_q(&ElementModQ::one());
        let c1 = elgamal_encrypt(2, &n1, &keys.public_key).unwrap();
        let c2 = elgamal_encrypt(3, &n2, &keys.public_key).unwrap();
        let sum = elgamal_add(&[&c1, &c2]).unwrap();
        assert_eq!(sum.decrypt(&keys.secret_key).unwrap(), 5);
    }

    #[test]
    fn adding_nothing_is_an_error() {
        use_test_constants();
        assert!(elgamal_add(&[]).is_err());
    }

    #[test]
    fn hashed_encryption_round_trips() {
        let keys = keypair();
        let seed = rand_q();
        let nonce = rand_range_q(&ElementModQ::one());
        let message = b"a coordinate on somebody's polynomial".to_vec();
        let ciphertext =
            hashed_elgamal_encrypt(&message, &nonce, &keys.public_key, &seed).unwrap();
        let decrypted = ciphertext.decrypt(&keys.secret_key, &seed).unwrap();
        assert_eq!(&decrypted[..message.len()], &message[..]);
    }

    #[test]
    fn hashed_encryption_detects_tampering() {
        let keys = keypair();
        let seed = rand_q();
        let nonce = rand_range_q(&ElementModQ::one());
        let mut ciphertext =
            hashed_elgamal_encrypt(b"backup", &nonce, &keys.public_key, &seed).unwrap();
        let mut data = hex::decode(&ciphertext.data).unwrap();
        data[0] ^= 1;
        ciphertext.data = hex::encode(data);
        assert!(ciphertext.decrypt(&keys.secret_key, &seed).is_err());
    }
}
