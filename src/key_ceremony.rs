//! Key ceremony records and operations.
//!
//! Each guardian publishes its election public key with per-coefficient
//! commitments and proofs, sends every other guardian an encrypted backup
//! (a coordinate on its secret polynomial), and verifies the backups it
//! receives against the published commitments. Once every backup checks
//! out, the joint key is the product of the guardian public keys.

use serde::{Deserialize, Serialize};

use crate::elgamal::{
    elgamal_combine_public_keys, hashed_elgamal_encrypt, ElGamalKeyPair, ElGamalPublicKey,
    HashedElGamalCiphertext,
};
use crate::error::Error;
use crate::group::ElementModQ;
use crate::hash::HashInput;
use crate::hash_elems;
use crate::nonces::Nonces;
use crate::polynomial::{
    compute_polynomial_coordinate, generate_polynomial, verify_polynomial_coordinate,
    ElectionPolynomial, PublicCommitment,
};
use crate::schnorr::SchnorrProof;

pub type GuardianId = String;

/// Details of a key ceremony: how many guardians, and how many are needed
/// to decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyDetails {
    pub number_of_guardians: usize,
    pub quorum: usize,
}

/// A guardian's published election public key: the key itself, the
/// commitment to every polynomial coefficient, and a possession proof for
/// each. The first commitment is the public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionPublicKey {
    pub owner_id: GuardianId,
    pub sequence_order: u32,
    pub key: ElGamalPublicKey,
    pub coefficient_commitments: Vec<PublicCommitment>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

impl ElectionPublicKey {
    /// Every coefficient proof must hold, and the first commitment must be
    /// the public key itself.
    pub fn is_valid(&self) -> bool {
        self.coefficient_commitments.first() == Some(&self.key)
            && !self.coefficient_proofs.is_empty()
            && self.coefficient_proofs.iter().all(SchnorrProof::is_valid)
    }
}

/// A guardian's full election key material: the keypair and the polynomial
/// behind it. Private; never published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionKeyPair {
    pub owner_id: GuardianId,
    pub sequence_order: u32,
    pub key_pair: ElGamalKeyPair,
    pub polynomial: ElectionPolynomial,
}

impl ElectionKeyPair {
    /// The publishable part of the key material.
    pub fn share(&self) -> ElectionPublicKey {
        ElectionPublicKey {
            owner_id: self.owner_id.clone(),
            sequence_order: self.sequence_order,
            key: self.key_pair.public_key.clone(),
            coefficient_commitments: self.polynomial.get_commitments(),
            coefficient_proofs: self.polynomial.get_proofs(),
        }
    }
}

/// Generate a guardian's election key pair: a fresh polynomial of degree
/// `quorum - 1` whose constant term is the guardian's secret.
pub fn generate_election_key_pair(
    owner_id: &str,
    sequence_order: u32,
    quorum: usize,
) -> Result<ElectionKeyPair, Error> {
    let polynomial = generate_polynomial(quorum)?;
    let key_pair = ElGamalKeyPair {
        secret_key: polynomial.coefficients[0].value.clone(),
        public_key: polynomial.coefficients[0].commitment.clone(),
    };
    Ok(ElectionKeyPair {
        owner_id: owner_id.to_string(),
        sequence_order,
        key_pair,
        polynomial,
    })
}

/// An encrypted backup of one coordinate of a guardian's polynomial,
/// destined for the designated guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPartialKeyBackup {
    /// The guardian that generated this backup
    pub owner_id: GuardianId,

    /// The guardian to receive this backup
    pub designated_id: GuardianId,

    /// The sequence order of the designated guardian
    pub designated_sequence_order: u32,

    /// The polynomial coordinate, encrypted to the designated guardian's
    /// election public key
    pub encrypted_coordinate: HashedElGamalCiphertext,
}

/// The seed binding a backup's encryption to its endpoints.
pub(crate) fn backup_encryption_seed(
    owner_id: &str,
    designated_id: &str,
    designated_sequence_order: u32,
) -> ElementModQ {
    hash_elems![owner_id, designated_id, designated_sequence_order]
}

/// Generate a partial key backup for the designated guardian: evaluate the
/// polynomial at its sequence order and encrypt the coordinate to its key.
pub fn generate_election_partial_key_backup(
    owner_id: &str,
    polynomial: &ElectionPolynomial,
    designated_key: &ElectionPublicKey,
) -> Result<ElectionPartialKeyBackup, Error> {
    let coordinate = compute_polynomial_coordinate(designated_key.sequence_order, polynomial);
    let seed = backup_encryption_seed(
        owner_id,
        &designated_key.owner_id,
        designated_key.sequence_order,
    );
    let nonce = Nonces::with_string_header(
        &hash_elems![owner_id, &designated_key.owner_id],
        "partial-key-backup",
    )
    .get(0);
    let encrypted_coordinate = hashed_elgamal_encrypt(
        &coordinate.to_padded_bytes(),
        &nonce,
        &designated_key.key,
        &seed,
    )?;
    Ok(ElectionPartialKeyBackup {
        owner_id: owner_id.to_string(),
        designated_id: designated_key.owner_id.clone(),
        designated_sequence_order: designated_key.sequence_order,
        encrypted_coordinate,
    })
}

/// Decrypt the coordinate inside a backup with the designated guardian's
/// secret key.
pub fn decrypt_backup(
    backup: &ElectionPartialKeyBackup,
    receiver_keys: &ElectionKeyPair,
) -> Result<ElementModQ, Error> {
    let seed = backup_encryption_seed(
        &backup.owner_id,
        &backup.designated_id,
        backup.designated_sequence_order,
    );
    let bytes = backup
        .encrypted_coordinate
        .decrypt(&receiver_keys.key_pair.secret_key, &seed)?;
    let width = crate::constants::q_hex_width() / 2;
    let value = num_bigint::BigUint::from_bytes_be(&bytes[..width.min(bytes.len())]);
    ElementModQ::new(value)
}

/// A record of one guardian's verdict on a backup it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPartialKeyVerification {
    pub owner_id: GuardianId,
    pub designated_id: GuardianId,
    pub verifier_id: GuardianId,
    pub verified: bool,
}

/// A challenge to a disputed backup: the coordinate is published in the
/// clear so every guardian can verify it against the commitments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionPartialKeyChallenge {
    pub owner_id: GuardianId,
    pub designated_id: GuardianId,
    pub designated_sequence_order: u32,
    pub coordinate: ElementModQ,
    pub commitments: Vec<PublicCommitment>,
    pub proofs: Vec<SchnorrProof>,
}

/// Verify that a received backup's coordinate lies on the owner's committed
/// polynomial.
pub fn verify_election_partial_key_backup(
    verifier_id: &str,
    backup: &ElectionPartialKeyBackup,
    owner_public_key: &ElectionPublicKey,
    receiver_keys: &ElectionKeyPair,
) -> Result<ElectionPartialKeyVerification, Error> {
    let coordinate = decrypt_backup(backup, receiver_keys)?;
    Ok(ElectionPartialKeyVerification {
        owner_id: backup.owner_id.clone(),
        designated_id: backup.designated_id.clone(),
        verifier_id: verifier_id.to_string(),
        verified: verify_polynomial_coordinate(
            &coordinate,
            backup.designated_sequence_order,
            &owner_public_key.coefficient_commitments,
        ),
    })
}

/// Generate a challenge answering a dispute over a backup this guardian
/// issued: the coordinate in the clear, with the commitments to check it
/// against.
pub fn generate_election_partial_key_challenge(
    backup: &ElectionPartialKeyBackup,
    polynomial: &ElectionPolynomial,
) -> ElectionPartialKeyChallenge {
    ElectionPartialKeyChallenge {
        owner_id: backup.owner_id.clone(),
        designated_id: backup.designated_id.clone(),
        designated_sequence_order: backup.designated_sequence_order,
        coordinate: compute_polynomial_coordinate(backup.designated_sequence_order, polynomial),
        commitments: polynomial.get_commitments(),
        proofs: polynomial.get_proofs(),
    }
}

/// Publicly verify a challenge: anyone can run this, no private material
/// needed.
pub fn verify_election_partial_key_challenge(
    verifier_id: &str,
    challenge: &ElectionPartialKeyChallenge,
) -> ElectionPartialKeyVerification {
    ElectionPartialKeyVerification {
        owner_id: challenge.owner_id.clone(),
        designated_id: challenge.designated_id.clone(),
        verifier_id: verifier_id.to_string(),
        verified: verify_polynomial_coordinate(
            &challenge.coordinate,
            challenge.designated_sequence_order,
            &challenge.commitments,
        ),
    }
}

/// The joint election key: the product of the guardian public keys, and the
/// hash of all coefficient commitments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionJointKey {
    /// `K = prod_i K_i mod p`
    pub joint_public_key: ElGamalPublicKey,

    /// `H(K_{1,0}, K_{1,1}, ..., K_{n,k-1})`
    pub commitment_hash: ElementModQ,
}

/// Combine the announced guardian public keys into the joint election key.
pub fn combine_election_public_keys(
    guardian_public_keys: &[ElectionPublicKey],
) -> ElectionJointKey {
    let keys: Vec<&ElGamalPublicKey> = guardian_public_keys.iter().map(|k| &k.key).collect();
    let commitments: Vec<HashInput> = guardian_public_keys
        .iter()
        .flat_map(|k| k.coefficient_commitments.iter().map(HashInput::from))
        .collect();
    ElectionJointKey {
        joint_public_key: elgamal_combine_public_keys(&keys),
        commitment_hash: hash_elems![commitments],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::use_test_constants;
    use crate::group::{g_pow_p, pow_p_secret, rand_q};

    fn key_pair(id: &str, order: u32) -> ElectionKeyPair {
        generate_election_key_pair(id, order, 3).unwrap()
    }

    #[test]
    fn published_keys_validate() {
        use_test_constants();
        let keys = key_pair("guardian-1", 1);
        assert!(keys.share().is_valid());
    }

    #[test]
    fn backups_round_trip_and_verify() {
        use_test_constants();
        let sender = key_pair("guardian-1", 1);
        let receiver = key_pair("guardian-2", 2);
        let backup = generate_election_partial_key_backup(
            "guardian-1",
            &sender.polynomial,
            &receiver.share(),
        )
        .unwrap();
        let verification = verify_election_partial_key_backup(
            "guardian-2",
            &backup,
            &sender.share(),
            &receiver,
        )
        .unwrap();
        assert!(verification.verified);

        let coordinate = decrypt_backup(&backup, &receiver).unwrap();
        assert_eq!(
            coordinate,
            compute_polynomial_coordinate(2, &sender.polynomial)
        );
    }

    #[test]
    fn backup_encrypted_to_the_wrong_key_fails_to_decrypt() {
        use_test_constants();
        let sender = key_pair("guardian-1", 1);
        let receiver = key_pair("guardian-2", 2);
        let interloper = key_pair("guardian-3", 3);
        let backup = generate_election_partial_key_backup(
            "guardian-1",
            &sender.polynomial,
            &receiver.share(),
        )
        .unwrap();
        assert!(decrypt_backup(&backup, &interloper).is_err());
    }

    #[test]
    fn challenges_settle_disputes_in_public() {
        use_test_constants();
        let sender = key_pair("guardian-1", 1);
        let receiver = key_pair("guardian-2", 2);
        let backup = generate_election_partial_key_backup(
            "guardian-1",
            &sender.polynomial,
            &receiver.share(),
        )
        .unwrap();
        let challenge = generate_election_partial_key_challenge(&backup, &sender.polynomial);
        let verification = verify_election_partial_key_challenge("observer", &challenge);
        assert!(verification.verified);

        // A forged coordinate in a challenge fails the public check.
        let mut forged = challenge;
        forged.coordinate = rand_q();
        assert!(!verify_election_partial_key_challenge("observer", &forged).verified);
    }

    #[test]
    fn joint_key_is_the_product_of_guardian_keys() {
        use_test_constants();
        let first = key_pair("guardian-1", 1);
        let second = key_pair("guardian-2", 2);
        let joint = combine_election_public_keys(&[first.share(), second.share()]);

        // Encrypting to the joint key decrypts under the summed secrets.
        let nonce = rand_q();
        let pad = g_pow_p(&nonce);
        let share_one = pow_p_secret(&pad, &first.key_pair.secret_key);
        let share_two = pow_p_secret(&pad, &second.key_pair.secret_key);
        let combined_shares = crate::group::mult_p(&[&share_one, &share_two]);
        assert_eq!(
            pow_p_secret(&joint.joint_public_key, &nonce),
            combined_shares
        );
    }
}
