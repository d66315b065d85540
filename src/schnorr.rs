//! Schnorr proofs of possession of an ElGamal secret key.

use serde::{Deserialize, Serialize};

use crate::elgamal::ElGamalKeyPair;
use crate::group::{a_plus_bc_q, g_pow_p, mult_p, pow_p, ElementModP, ElementModQ};
use crate::hash_elems;

/// A non-interactive proof of knowledge of the secret key behind
/// `public_key = g^secret`, with the challenge derived by Fiat-Shamir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrProof {
    /// `K` in the protocol
    pub public_key: ElementModP,
    /// `U = g^u`, the one-time commitment
    pub commitment: ElementModP,
    /// `c = H(K, U)`
    pub challenge: ElementModQ,
    /// `v = u + c * s mod q`
    pub response: ElementModQ,
}

impl SchnorrProof {
    /// Check validity of the proof for possession of the private key
    /// corresponding to `public_key`.
    pub fn is_valid(&self) -> bool {
        let k = &self.public_key;
        let u = &self.commitment;
        let v = &self.response;

        let valid_public_key = k.is_valid_residue();
        let in_bounds_u = u.is_in_bounds();
        let in_bounds_v = v.is_in_bounds();

        let c = hash_elems![k, u];
        let valid_challenge = c == self.challenge;
        let valid_response = g_pow_p(v) == mult_p(&[u, &pow_p(k, &c)]);

        let success =
            valid_public_key && in_bounds_u && in_bounds_v && valid_challenge && valid_response;
        if !success {
            log::warn!(
                "found an invalid Schnorr proof: valid_public_key={} in_bounds_u={} in_bounds_v={} valid_challenge={} valid_response={}",
                valid_public_key,
                in_bounds_u,
                in_bounds_v,
                valid_challenge,
                valid_response
            );
        }
        success
    }
}

/// Given an ElGamal keypair and a one-time nonce, generate a proof that the
/// prover knows the secret key without revealing it.
pub fn make_schnorr_proof(keypair: &ElGamalKeyPair, nonce: &ElementModQ) -> SchnorrProof {
    let k = keypair.public_key.clone();
    let u = g_pow_p(nonce);
    let c = hash_elems![&k, &u];
    let v = a_plus_bc_q(nonce, &keypair.secret_key, &c);

    SchnorrProof {
        public_key: k,
        commitment: u,
        challenge: c,
        response: v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::use_test_constants;
    use crate::elgamal::elgamal_keypair_random;
    use crate::group::rand_q;

    #[test]
    fn honest_proofs_verify() {
        use_test_constants();
        let keypair = elgamal_keypair_random();
        let proof = make_schnorr_proof(&keypair, &rand_q());
        assert!(proof.is_valid());
    }

    #[test]
    fn tampered_commitment_fails() {
        use_test_constants();
        let keypair = elgamal_keypair_random();
        let mut proof = make_schnorr_proof(&keypair, &rand_q());
        proof.commitment = g_pow_p(&rand_q());
        assert!(!proof.is_valid());
    }

    #[test]
    fn proof_does_not_transfer_to_another_key() {
        use_test_constants();
        let keypair = elgamal_keypair_random();
        let other = elgamal_keypair_random();
        let mut proof = make_schnorr_proof(&keypair, &rand_q());
        proof.public_key = other.public_key;
        assert!(!proof.is_valid());
    }
}
