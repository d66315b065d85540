//! The cryptographic context shared by everything in one election.

use serde::{Deserialize, Serialize};

use crate::constants::get_constants;
use crate::error::Error;
use crate::group::{ElementModP, ElementModQ};
use crate::hash_elems;

/// The ciphertext election context: the joint public key, the guardian
/// parameters, and the base and extended hashes folded into every
/// Fiat-Shamir challenge in the election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextElectionContext {
    /// The number of guardians that participated in the key ceremony
    pub number_of_guardians: usize,

    /// The quorum of guardians required to decrypt
    pub quorum: usize,

    /// The joint public key `K` of the election
    pub elgamal_public_key: ElementModP,

    /// The hash of the guardians' coefficient commitments
    pub commitment_hash: ElementModQ,

    /// The hash of the election manifest
    pub manifest_hash: ElementModQ,

    /// The base hash `Q = H(P, Q, G, n, k, manifest_hash)`
    pub crypto_base_hash: ElementModQ,

    /// The extended base hash `Q' = H(Q, K)`
    pub crypto_extended_base_hash: ElementModQ,
}

/// Make a ciphertext election context.
///
/// The base hash binds the group constants and ceremony parameters; the
/// extended base hash additionally binds the joint public key, so every
/// proof challenge in the election commits to both.
pub fn make_ciphertext_election_context(
    number_of_guardians: usize,
    quorum: usize,
    elgamal_public_key: ElementModP,
    commitment_hash: ElementModQ,
    manifest_hash: ElementModQ,
) -> Result<CiphertextElectionContext, Error> {
    if quorum == 0 || quorum > number_of_guardians {
        return Err(Error::InvariantViolation(format!(
            "quorum {quorum} is invalid for {number_of_guardians} guardians"
        )));
    }
    if !elgamal_public_key.is_valid_residue() {
        return Err(Error::SubgroupViolation);
    }
    let constants = get_constants();
    let crypto_base_hash = hash_elems![
        &hex_token(&constants.large_prime),
        &hex_token(&constants.small_prime),
        &hex_token(&constants.generator),
        number_of_guardians as u64,
        quorum as u64,
        &manifest_hash
    ];
    let crypto_extended_base_hash = hash_elems![&crypto_base_hash, &elgamal_public_key];
    Ok(CiphertextElectionContext {
        number_of_guardians,
        quorum,
        elgamal_public_key,
        commitment_hash,
        manifest_hash,
        crypto_base_hash,
        crypto_extended_base_hash,
    })
}

/// The constants themselves exceed the element ranges, so they enter the
/// transcript directly in element notation.
fn hex_token(value: &num_bigint::BigUint) -> String {
    crate::group::int_to_hash_hex(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::use_test_constants;
    use crate::group::{g_pow_p, rand_q};

    #[test]
    fn context_hashes_bind_the_joint_key() {
        use_test_constants();
        let manifest_hash = rand_q();
        let commitment_hash = rand_q();
        let key_a = g_pow_p(&rand_q());
        let key_b = g_pow_p(&rand_q());
        let a = make_ciphertext_election_context(
            3,
            2,
            key_a,
            commitment_hash.clone(),
            manifest_hash.clone(),
        )
        .unwrap();
        let b =
            make_ciphertext_election_context(3, 2, key_b, commitment_hash, manifest_hash).unwrap();
        assert_eq!(a.crypto_base_hash, b.crypto_base_hash);
        assert_ne!(a.crypto_extended_base_hash, b.crypto_extended_base_hash);
    }

    #[test]
    fn invalid_quorum_is_rejected() {
        use_test_constants();
        let key = g_pow_p(&rand_q());
        assert!(make_ciphertext_election_context(3, 4, key.clone(), rand_q(), rand_q()).is_err());
        assert!(make_ciphertext_election_context(3, 0, key, rand_q(), rand_q()).is_err());
    }

    #[test]
    fn non_residue_joint_key_is_rejected() {
        use_test_constants();
        let outside_subgroup =
            ElementModP::new(num_bigint::BigUint::from(2u8)).unwrap();
        assert!(matches!(
            make_ciphertext_election_context(3, 2, outside_subgroup, rand_q(), rand_q()),
            Err(Error::SubgroupViolation)
        ));
    }

    #[test]
    fn context_round_trips_through_json() {
        use_test_constants();
        let context =
            make_ciphertext_election_context(5, 3, g_pow_p(&rand_q()), rand_q(), rand_q())
                .unwrap();
        let json = serde_json::to_string(&context).unwrap();
        let back: CiphertextElectionContext = serde_json::from_str(&json).unwrap();
        assert_eq!(context, back);
    }
}
