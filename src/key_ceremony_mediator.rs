//! The key ceremony mediator.
//!
//! A trusted conduit holding no private material: it collects guardian
//! announcements, routes encrypted backups, tracks verifications, runs the
//! public challenge protocol for disputed backups, and publishes the joint
//! key once every backup has been verified. Guardians never hold references
//! to each other; everything moves through these messages.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::key_ceremony::{
    combine_election_public_keys, verify_election_partial_key_challenge, CeremonyDetails,
    ElectionJointKey, ElectionPartialKeyBackup, ElectionPartialKeyChallenge,
    ElectionPartialKeyVerification, ElectionPublicKey, GuardianId,
};

/// The opaque messages guardians exchange through the mediator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KeyCeremonyMessage {
    PublicKeyAnnounce(ElectionPublicKey),
    BackupSend(ElectionPartialKeyBackup),
    BackupVerify(ElectionPartialKeyVerification),
    BackupChallenge {
        owner_id: GuardianId,
        designated_id: GuardianId,
    },
    BackupReveal(ElectionPartialKeyChallenge),
}

/// A guardian's standing in the ceremony as the mediator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardianStatus {
    Active,
    Disputed,
    Evicted,
}

/// Mediates the key ceremony.
pub struct KeyCeremonyMediator {
    pub id: String,
    pub ceremony_details: CeremonyDetails,

    announced: BTreeMap<GuardianId, ElectionPublicKey>,
    statuses: BTreeMap<GuardianId, GuardianStatus>,
    // (owner, designated) -> backup
    backups: BTreeMap<(GuardianId, GuardianId), ElectionPartialKeyBackup>,
    // (owner, designated) -> verification
    verifications: BTreeMap<(GuardianId, GuardianId), ElectionPartialKeyVerification>,
    open_challenges: BTreeSet<(GuardianId, GuardianId)>,
}

impl KeyCeremonyMediator {
    pub fn new(id: &str, ceremony_details: CeremonyDetails) -> Self {
        KeyCeremonyMediator {
            id: id.to_string(),
            ceremony_details,
            announced: BTreeMap::new(),
            statuses: BTreeMap::new(),
            backups: BTreeMap::new(),
            verifications: BTreeMap::new(),
            open_challenges: BTreeSet::new(),
        }
    }

    /// Route one protocol message.
    pub fn receive(&mut self, message: KeyCeremonyMessage) -> Result<(), Error> {
        match message {
            KeyCeremonyMessage::PublicKeyAnnounce(key) => self.announce(key),
            KeyCeremonyMessage::BackupSend(backup) => self.receive_backup(backup),
            KeyCeremonyMessage::BackupVerify(verification) => {
                self.receive_verification(verification)
            }
            KeyCeremonyMessage::BackupChallenge {
                owner_id,
                designated_id,
            } => self.receive_challenge_request(&owner_id, &designated_id),
            KeyCeremonyMessage::BackupReveal(challenge) => self.receive_challenge_response(challenge),
        }
    }

    pub fn guardian_status(&self, guardian_id: &str) -> Option<GuardianStatus> {
        self.statuses.get(guardian_id).copied()
    }

    /// Accept a guardian's announced public key. Duplicate ids and
    /// duplicate sequence orders abort ceremony setup.
    pub fn announce(&mut self, key: ElectionPublicKey) -> Result<(), Error> {
        if self.announced.contains_key(&key.owner_id) {
            return Err(Error::DuplicateGuardianId(key.owner_id));
        }
        if self
            .announced
            .values()
            .any(|existing| existing.sequence_order == key.sequence_order)
        {
            return Err(Error::DuplicateSequenceOrder(key.sequence_order));
        }
        if key.sequence_order == 0 {
            return Err(Error::InvariantViolation(
                "guardian sequence orders start at 1".to_string(),
            ));
        }
        if !key.is_valid() {
            return Err(Error::ProofVerificationFailed(format!(
                "coefficient proofs for guardian {}",
                key.owner_id
            )));
        }
        self.statuses
            .insert(key.owner_id.clone(), GuardianStatus::Active);
        self.announced.insert(key.owner_id.clone(), key);
        Ok(())
    }

    pub fn all_guardians_announced(&self) -> bool {
        self.announced.len() == self.ceremony_details.number_of_guardians
    }

    /// All announced keys, for a guardian catching up.
    pub fn share_announced(&self) -> Vec<ElectionPublicKey> {
        self.announced.values().cloned().collect()
    }

    fn require_announced(&self, guardian_id: &str) -> Result<(), Error> {
        if self.announced.contains_key(guardian_id) {
            Ok(())
        } else {
            Err(Error::InvariantViolation(format!(
                "guardian {guardian_id} has not announced"
            )))
        }
    }

    /// Accept an encrypted backup in transit from its owner to its
    /// designated guardian.
    pub fn receive_backup(&mut self, backup: ElectionPartialKeyBackup) -> Result<(), Error> {
        self.require_announced(&backup.owner_id)?;
        self.require_announced(&backup.designated_id)?;
        self.backups.insert(
            (backup.owner_id.clone(), backup.designated_id.clone()),
            backup,
        );
        Ok(())
    }

    /// Every guardian has sent a backup to every other guardian.
    pub fn all_backups_available(&self) -> bool {
        let n = self.ceremony_details.number_of_guardians;
        self.all_guardians_announced() && self.backups.len() >= n * n.saturating_sub(1)
    }

    /// The backups addressed to the given guardian.
    pub fn share_backups(&self, designated_id: &str) -> Vec<ElectionPartialKeyBackup> {
        self.backups
            .values()
            .filter(|b| b.designated_id == designated_id && b.owner_id != designated_id)
            .cloned()
            .collect()
    }

    /// Accept a guardian's verdict on a backup it received. A failed
    /// verification moves the backup's owner to `Disputed`; the dispute
    /// resolves only through the challenge protocol.
    pub fn receive_verification(
        &mut self,
        verification: ElectionPartialKeyVerification,
    ) -> Result<(), Error> {
        self.require_announced(&verification.owner_id)?;
        self.require_announced(&verification.designated_id)?;
        if !verification.verified {
            log::warn!(
                "backup from {} to {} failed verification; dispute opened",
                verification.owner_id,
                verification.designated_id
            );
            self.statuses
                .insert(verification.owner_id.clone(), GuardianStatus::Disputed);
            self.open_challenges.insert((
                verification.owner_id.clone(),
                verification.designated_id.clone(),
            ));
        }
        self.verifications.insert(
            (
                verification.owner_id.clone(),
                verification.designated_id.clone(),
            ),
            verification,
        );
        Ok(())
    }

    /// A recipient formally raises a challenge; the owner is now required
    /// to reveal the coordinate.
    pub fn receive_challenge_request(
        &mut self,
        owner_id: &str,
        designated_id: &str,
    ) -> Result<(), Error> {
        self.require_announced(owner_id)?;
        self.require_announced(designated_id)?;
        self.statuses
            .insert(owner_id.to_string(), GuardianStatus::Disputed);
        self.open_challenges
            .insert((owner_id.to_string(), designated_id.to_string()));
        Ok(())
    }

    /// The owner reveals the disputed coordinate; every observer can now
    /// verify it against the public commitments. Success clears the
    /// dispute (that coordinate's confidentiality is gone, which is
    /// acceptable); failure evicts the owner.
    pub fn receive_challenge_response(
        &mut self,
        challenge: ElectionPartialKeyChallenge,
    ) -> Result<(), Error> {
        self.require_announced(&challenge.owner_id)?;
        let verification = verify_election_partial_key_challenge(&self.id, &challenge);
        let key = (challenge.owner_id.clone(), challenge.designated_id.clone());
        if !verification.verified {
            self.statuses
                .insert(challenge.owner_id.clone(), GuardianStatus::Evicted);
            return Err(Error::BackupVerificationFailed {
                owner_id: challenge.owner_id,
                designated_id: challenge.designated_id,
            });
        }
        self.open_challenges.remove(&key);
        self.verifications.insert(key, verification);
        if !self
            .open_challenges
            .iter()
            .any(|(owner, _)| owner == &challenge.owner_id)
        {
            self.statuses
                .insert(challenge.owner_id, GuardianStatus::Active);
        }
        Ok(())
    }

    /// Every pair of distinct guardians has a successful verification and
    /// no dispute is open.
    pub fn all_backups_verified(&self) -> bool {
        if !self.all_guardians_announced() || !self.open_challenges.is_empty() {
            return false;
        }
        if self
            .statuses
            .values()
            .any(|status| *status != GuardianStatus::Active)
        {
            return false;
        }
        let ids: Vec<&GuardianId> = self.announced.keys().collect();
        for owner in &ids {
            for designated in &ids {
                if owner == designated {
                    continue;
                }
                match self
                    .verifications
                    .get(&((*owner).clone(), (*designated).clone()))
                {
                    Some(v) if v.verified => {}
                    _ => return false,
                }
            }
        }
        true
    }

    /// Publish the joint election key, or `None` until the ceremony is
    /// complete.
    pub fn publish_joint_key(&self) -> Option<ElectionJointKey> {
        if !self.all_backups_verified() {
            return None;
        }
        let keys: Vec<ElectionPublicKey> = self.announced.values().cloned().collect();
        Some(combine_election_public_keys(&keys))
    }
}
