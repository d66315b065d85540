//! The guardian: key-ceremony participant and decryption share producer.
//!
//! A guardian owns its polynomial and every backup it has received; nothing
//! private ever leaves except encrypted backups and, under challenge, a
//! single coordinate. Cross-guardian relationships exist only through
//! published records indexed by id and sequence order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chaum_pedersen::{make_chaum_pedersen, ChaumPedersenProof};
use crate::elgamal::ElGamalCiphertext;
use crate::error::Error;
use crate::group::{pow_p, pow_p_secret, pow_q, rand_q, ElementModP, ElementModQ};
use crate::key_ceremony::{
    decrypt_backup, generate_election_key_pair, generate_election_partial_key_backup,
    generate_election_partial_key_challenge, verify_election_partial_key_backup,
    CeremonyDetails, ElectionKeyPair, ElectionPartialKeyBackup, ElectionPartialKeyChallenge,
    ElectionPartialKeyVerification, ElectionPublicKey, GuardianId,
};
use crate::group::mult_p;
use crate::polynomial::PublicCommitment;
use crate::schnorr::SchnorrProof;

/// The ceremony phases a guardian moves through, strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GuardianState {
    Init,
    KeysGenerated,
    PublicKeysReceived,
    BackupsGenerated,
    BackupsDistributed,
    BackupsVerified,
    JointKeyReady,
}

/// Published record containing all required information per guardian for
/// the election record used in verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianRecord {
    /// Unique identifier of the guardian
    pub guardian_id: GuardianId,

    /// Unique sequence order of the guardian
    pub sequence_order: u32,

    /// The guardian's election public key
    pub election_public_key: ElementModP,

    /// Commitment to each coefficient of the guardian's secret polynomial.
    /// The first commitment is the public key.
    pub election_commitments: Vec<PublicCommitment>,

    /// Possession proofs, one per commitment.
    pub election_proofs: Vec<SchnorrProof>,
}

/// Unpublishable private record of a guardian's ceremony state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateGuardianRecord {
    pub guardian_id: GuardianId,
    pub election_keys: ElectionKeyPair,
    pub backups_to_share: BTreeMap<GuardianId, ElectionPartialKeyBackup>,
    pub guardian_election_public_keys: BTreeMap<GuardianId, ElectionPublicKey>,
    pub guardian_election_partial_key_backups: BTreeMap<GuardianId, ElectionPartialKeyBackup>,
    pub guardian_election_partial_key_verifications:
        BTreeMap<GuardianId, ElectionPartialKeyVerification>,
}

/// Guardian of the election, responsible for safeguarding a share of the
/// election secret and producing decryption shares.
pub struct Guardian {
    election_keys: ElectionKeyPair,
    pub ceremony_details: CeremonyDetails,
    state: GuardianState,

    backups_to_share: BTreeMap<GuardianId, ElectionPartialKeyBackup>,
    guardian_public_keys: BTreeMap<GuardianId, ElectionPublicKey>,
    guardian_backups: BTreeMap<GuardianId, ElectionPartialKeyBackup>,
    backup_verifications: BTreeMap<GuardianId, ElectionPartialKeyVerification>,
}

impl Guardian {
    /// Create a guardian with freshly generated key material.
    pub fn new(
        id: &str,
        sequence_order: u32,
        number_of_guardians: usize,
        quorum: usize,
    ) -> Result<Self, Error> {
        if sequence_order == 0 {
            return Err(Error::InvariantViolation(
                "guardian sequence orders start at 1".to_string(),
            ));
        }
        let election_keys = generate_election_key_pair(id, sequence_order, quorum)?;
        let mut guardian = Guardian {
            election_keys,
            ceremony_details: CeremonyDetails {
                number_of_guardians,
                quorum,
            },
            state: GuardianState::KeysGenerated,
            backups_to_share: BTreeMap::new(),
            guardian_public_keys: BTreeMap::new(),
            guardian_backups: BTreeMap::new(),
            backup_verifications: BTreeMap::new(),
        };
        let own_key = guardian.election_keys.share();
        guardian
            .guardian_public_keys
            .insert(own_key.owner_id.clone(), own_key);
        if guardian.all_guardian_keys_received() {
            guardian.advance(GuardianState::PublicKeysReceived)?;
        }
        Ok(guardian)
    }

    /// Restore a guardian from its exported private record.
    pub fn from_private_record(
        record: PrivateGuardianRecord,
        number_of_guardians: usize,
        quorum: usize,
        state: GuardianState,
    ) -> Self {
        Guardian {
            election_keys: record.election_keys,
            ceremony_details: CeremonyDetails {
                number_of_guardians,
                quorum,
            },
            state,
            backups_to_share: record.backups_to_share,
            guardian_public_keys: record.guardian_election_public_keys,
            guardian_backups: record.guardian_election_partial_key_backups,
            backup_verifications: record.guardian_election_partial_key_verifications,
        }
    }

    pub fn id(&self) -> &str {
        &self.election_keys.owner_id
    }

    pub fn sequence_order(&self) -> u32 {
        self.election_keys.sequence_order
    }

    pub fn state(&self) -> GuardianState {
        self.state
    }

    /// Move to a later ceremony phase. Backward transitions are a bug in
    /// the caller, never a reachable state.
    fn advance(&mut self, to: GuardianState) -> Result<(), Error> {
        if to < self.state {
            return Err(Error::InvariantViolation(format!(
                "guardian {} cannot move backward from {:?} to {:?}",
                self.id(),
                self.state,
                to
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Publish the record of this guardian for the election record.
    pub fn publish(&self) -> GuardianRecord {
        let key = self.election_keys.share();
        GuardianRecord {
            guardian_id: key.owner_id,
            sequence_order: key.sequence_order,
            election_public_key: key.key,
            election_commitments: key.coefficient_commitments,
            election_proofs: key.coefficient_proofs,
        }
    }

    /// Export private data. Cannot be published.
    pub fn export_private_data(&self) -> PrivateGuardianRecord {
        PrivateGuardianRecord {
            guardian_id: self.id().to_string(),
            election_keys: self.election_keys.clone(),
            backups_to_share: self.backups_to_share.clone(),
            guardian_election_public_keys: self.guardian_public_keys.clone(),
            guardian_election_partial_key_backups: self.guardian_backups.clone(),
            guardian_election_partial_key_verifications: self.backup_verifications.clone(),
        }
    }

    /// Share this guardian's election public key.
    pub fn share_key(&self) -> ElectionPublicKey {
        self.election_keys.share()
    }

    /// Save another guardian's announced public key, verifying its Schnorr
    /// proofs first.
    pub fn save_guardian_key(&mut self, key: ElectionPublicKey) -> Result<(), Error> {
        if !key.is_valid() {
            return Err(Error::ProofVerificationFailed(format!(
                "coefficient proofs for guardian {}",
                key.owner_id
            )));
        }
        self.guardian_public_keys.insert(key.owner_id.clone(), key);
        if self.all_guardian_keys_received() {
            self.advance(GuardianState::PublicKeysReceived)?;
        }
        Ok(())
    }

    pub fn all_guardian_keys_received(&self) -> bool {
        self.guardian_public_keys.len() == self.ceremony_details.number_of_guardians
    }

    /// Generate a partial key backup for every announced guardian.
    pub fn generate_election_partial_key_backups(&mut self) -> Result<(), Error> {
        if self.state < GuardianState::PublicKeysReceived {
            return Err(Error::InvariantViolation(format!(
                "guardian {} cannot generate backups before receiving all keys",
                self.id()
            )));
        }
        for key in self.guardian_public_keys.values() {
            let backup = generate_election_partial_key_backup(
                self.id(),
                &self.election_keys.polynomial,
                key,
            )?;
            self.backups_to_share.insert(key.owner_id.clone(), backup);
        }
        self.advance(GuardianState::BackupsGenerated)
    }

    /// Share the backup designated for another guardian.
    pub fn share_election_partial_key_backup(
        &self,
        designated_id: &str,
    ) -> Option<&ElectionPartialKeyBackup> {
        self.backups_to_share.get(designated_id)
    }

    /// Share every backup this guardian generated.
    pub fn share_election_partial_key_backups(&mut self) -> Vec<ElectionPartialKeyBackup> {
        let backups = self.backups_to_share.values().cloned().collect();
        // Sharing is what distributes them; the phase reflects that.
        let _ = self.advance(GuardianState::BackupsDistributed);
        backups
    }

    /// Save a backup received from another guardian.
    pub fn save_election_partial_key_backup(&mut self, backup: ElectionPartialKeyBackup) {
        self.guardian_backups.insert(backup.owner_id.clone(), backup);
    }

    pub fn all_election_partial_key_backups_received(&self) -> bool {
        self.guardian_backups.len() == self.ceremony_details.number_of_guardians - 1
    }

    /// Verify the backup received from the given guardian against its
    /// published commitments.
    pub fn verify_election_partial_key_backup(
        &self,
        owner_id: &str,
    ) -> Result<ElectionPartialKeyVerification, Error> {
        let backup = self.guardian_backups.get(owner_id).ok_or_else(|| {
            Error::InvariantViolation(format!("no backup exists for {owner_id}"))
        })?;
        let public_key = self.guardian_public_keys.get(owner_id).ok_or_else(|| {
            Error::InvariantViolation(format!("no public key exists for {owner_id}"))
        })?;
        verify_election_partial_key_backup(self.id(), backup, public_key, &self.election_keys)
    }

    /// Answer a challenge over a backup this guardian issued by revealing
    /// the coordinate.
    pub fn publish_election_backup_challenge(
        &self,
        designated_id: &str,
    ) -> Result<ElectionPartialKeyChallenge, Error> {
        let backup = self.backups_to_share.get(designated_id).ok_or_else(|| {
            Error::InvariantViolation(format!("no backup was issued to {designated_id}"))
        })?;
        Ok(generate_election_partial_key_challenge(
            backup,
            &self.election_keys.polynomial,
        ))
    }

    /// Save a verification another guardian published for one of this
    /// guardian's backups.
    pub fn save_election_partial_key_verification(
        &mut self,
        verification: ElectionPartialKeyVerification,
    ) {
        self.backup_verifications
            .insert(verification.designated_id.clone(), verification);
    }

    pub fn all_election_partial_key_backups_verified(&mut self) -> bool {
        let required = self.ceremony_details.number_of_guardians - 1;
        let verified = self
            .backup_verifications
            .values()
            .filter(|v| v.verified && v.designated_id != self.id())
            .count();
        if verified == required {
            let _ = self.advance(GuardianState::BackupsVerified);
            true
        } else {
            false
        }
    }

    /// The joint key, once every key is received and every backup of this
    /// guardian's is verified.
    pub fn publish_joint_key(&mut self) -> Option<ElementModP> {
        if !self.all_guardian_keys_received() {
            return None;
        }
        if !self.all_election_partial_key_backups_verified() {
            return None;
        }
        let keys: Vec<&ElementModP> =
            self.guardian_public_keys.values().map(|k| &k.key).collect();
        let joint_key = mult_p(&keys);
        let _ = self.advance(GuardianState::JointKeyReady);
        Some(joint_key)
    }

    /// Compute a decryption share `M_i = A^{s_i}` for a ciphertext, with a
    /// proof of equality of discrete logs.
    pub fn partially_decrypt(
        &self,
        ciphertext: &ElGamalCiphertext,
        extended_base_hash: &ElementModQ,
    ) -> (ElementModP, ChaumPedersenProof) {
        let share = pow_p_secret(&ciphertext.pad, &self.election_keys.key_pair.secret_key);
        let proof = make_chaum_pedersen(
            ciphertext,
            &self.election_keys.key_pair.secret_key,
            &share,
            &rand_q(),
            extended_base_hash,
        );
        (share, proof)
    }

    /// The coordinate `P_l(i)` this guardian holds of a missing guardian's
    /// polynomial, decrypted from the backup received in the ceremony.
    pub fn missing_guardian_coordinate(
        &self,
        missing_guardian_id: &str,
    ) -> Result<ElementModQ, Error> {
        let backup = self
            .guardian_backups
            .get(missing_guardian_id)
            .ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "no backup was received from {missing_guardian_id}"
                ))
            })?;
        decrypt_backup(backup, &self.election_keys)
    }

    /// The public key against which this guardian's compensated shares for
    /// the missing guardian verify: `g^{P_l(i)}` recomputed from the
    /// missing guardian's public commitments.
    pub fn recovery_public_key_for(
        &self,
        missing_guardian_id: &str,
    ) -> Result<ElementModP, Error> {
        let missing_key = self
            .guardian_public_keys
            .get(missing_guardian_id)
            .ok_or_else(|| {
                Error::InvariantViolation(format!("no public key exists for {missing_guardian_id}"))
            })?;
        let x = ElementModQ::from_u64_reduced(self.sequence_order() as u64);
        let mut recovery_key = ElementModP::one();
        for (j, commitment) in missing_key.coefficient_commitments.iter().enumerate() {
            let exponent = pow_q(&x, &ElementModQ::from_u64_reduced(j as u64));
            recovery_key = mult_p(&[&recovery_key, &pow_p(commitment, &exponent)]);
        }
        Ok(recovery_key)
    }

    /// Compute a compensated decryption share `M_{i,l} = A^{P_l(i)}` on
    /// behalf of a missing guardian, with a proof against the recovery key.
    pub fn compensate_decrypt(
        &self,
        missing_guardian_id: &str,
        ciphertext: &ElGamalCiphertext,
        extended_base_hash: &ElementModQ,
    ) -> Result<(ElementModP, ChaumPedersenProof), Error> {
        let coordinate = self.missing_guardian_coordinate(missing_guardian_id)?;
        let share = pow_p_secret(&ciphertext.pad, &coordinate);
        let proof = make_chaum_pedersen(
            ciphertext,
            &coordinate,
            &share,
            &rand_q(),
            extended_base_hash,
        );
        Ok((share, proof))
    }
}
