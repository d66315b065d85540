//! The decryption mediator.
//!
//! Collects decryption shares from available guardians and compensated
//! shares for missing ones, enforces the quorum, and composes the plaintext
//! tally and the decrypted spoiled ballots. Shares are proof-verified when
//! announced; a share that fails verification is rejected outright, so its
//! guardian counts as missing.

use std::collections::BTreeMap;

use crate::ballot::{BallotId, SubmittedBallot};
use crate::decryption::{
    compute_lagrange_coefficients_for_guardians, decrypt_ballot, decrypt_tally,
    reconstruct_decryption_share, CompensatedDecryptionShare, DecryptionShare,
    LagrangeCoefficientsRecord, PlaintextTally,
};
use crate::election::CiphertextElectionContext;
use crate::error::Error;
use crate::key_ceremony::{ElectionPublicKey, GuardianId};
use crate::tally::CiphertextTally;

/// Composes partial decryptions from each guardian into the decrypted
/// representation of the tally and of every spoiled ballot.
pub struct DecryptionMediator {
    pub id: String,
    context: CiphertextElectionContext,

    available_guardians: BTreeMap<GuardianId, ElectionPublicKey>,
    missing_guardians: BTreeMap<GuardianId, ElectionPublicKey>,

    tally_shares: BTreeMap<GuardianId, DecryptionShare>,
    ballot_shares: BTreeMap<GuardianId, BTreeMap<BallotId, DecryptionShare>>,

    // missing guardian -> available guardian -> share
    compensated_tally_shares:
        BTreeMap<GuardianId, BTreeMap<GuardianId, CompensatedDecryptionShare>>,
    compensated_ballot_shares: BTreeMap<
        GuardianId,
        BTreeMap<GuardianId, BTreeMap<BallotId, CompensatedDecryptionShare>>,
    >,
}

impl DecryptionMediator {
    pub fn new(id: &str, context: CiphertextElectionContext) -> Self {
        DecryptionMediator {
            id: id.to_string(),
            context,
            available_guardians: BTreeMap::new(),
            missing_guardians: BTreeMap::new(),
            tally_shares: BTreeMap::new(),
            ballot_shares: BTreeMap::new(),
            compensated_tally_shares: BTreeMap::new(),
            compensated_ballot_shares: BTreeMap::new(),
        }
    }

    /// Announce that a guardian is present and submit its shares: one for
    /// the tally and one per spoiled ballot. The shares are verified
    /// against the tally and ballots before acceptance.
    pub fn announce(
        &mut self,
        guardian_key: ElectionPublicKey,
        tally: &CiphertextTally,
        spoiled_ballots: &[SubmittedBallot],
        tally_share: DecryptionShare,
        ballot_shares: BTreeMap<BallotId, DecryptionShare>,
    ) -> Result<(), Error> {
        if self.available_guardians.contains_key(&guardian_key.owner_id) {
            return Err(Error::DuplicateGuardianId(guardian_key.owner_id));
        }
        if tally_share.guardian_id != guardian_key.owner_id {
            return Err(Error::InvariantViolation(format!(
                "tally share from {} announced for {}",
                tally_share.guardian_id, guardian_key.owner_id
            )));
        }

        self.validate_tally_share(&guardian_key, tally, &tally_share)?;
        for ballot in spoiled_ballots {
            let share = ballot_shares.get(ballot.object_id()).ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "guardian {} did not provide a share for spoiled ballot {}",
                    guardian_key.owner_id,
                    ballot.object_id()
                ))
            })?;
            self.validate_ballot_share(&guardian_key, ballot, share)?;
        }

        self.missing_guardians.remove(&guardian_key.owner_id);
        self.tally_shares
            .insert(guardian_key.owner_id.clone(), tally_share);
        self.ballot_shares
            .insert(guardian_key.owner_id.clone(), ballot_shares);
        self.available_guardians
            .insert(guardian_key.owner_id.clone(), guardian_key);
        Ok(())
    }

    /// Register a guardian that will not participate; its share will be
    /// reconstructed from compensated shares.
    pub fn announce_missing(&mut self, guardian_key: ElectionPublicKey) -> Result<(), Error> {
        if self.available_guardians.contains_key(&guardian_key.owner_id) {
            return Err(Error::DuplicateGuardianId(guardian_key.owner_id));
        }
        self.missing_guardians
            .insert(guardian_key.owner_id.clone(), guardian_key);
        Ok(())
    }

    /// Accept an available guardian's compensated shares for one missing
    /// guardian.
    pub fn receive_compensated_shares(
        &mut self,
        tally_share: CompensatedDecryptionShare,
        ballot_shares: BTreeMap<BallotId, CompensatedDecryptionShare>,
    ) -> Result<(), Error> {
        if !self
            .available_guardians
            .contains_key(&tally_share.guardian_id)
        {
            return Err(Error::InvariantViolation(format!(
                "compensating guardian {} has not announced",
                tally_share.guardian_id
            )));
        }
        if !self
            .missing_guardians
            .contains_key(&tally_share.missing_guardian_id)
        {
            return Err(Error::InvariantViolation(format!(
                "guardian {} is not missing",
                tally_share.missing_guardian_id
            )));
        }
        let missing_id = tally_share.missing_guardian_id.clone();
        let available_id = tally_share.guardian_id.clone();
        self.compensated_tally_shares
            .entry(missing_id.clone())
            .or_default()
            .insert(available_id.clone(), tally_share);
        self.compensated_ballot_shares
            .entry(missing_id)
            .or_default()
            .insert(available_id, ballot_shares);
        Ok(())
    }

    pub fn available_guardian_count(&self) -> usize {
        self.available_guardians.len()
    }

    /// The Lagrange coefficients over the full available set, published
    /// with the record when compensation happened.
    pub fn lagrange_coefficients(&self) -> Result<LagrangeCoefficientsRecord, Error> {
        let keys: Vec<ElectionPublicKey> = self.available_guardians.values().cloned().collect();
        Ok(LagrangeCoefficientsRecord {
            coefficients: compute_lagrange_coefficients_for_guardians(&keys)?,
        })
    }

    /// Everyone announced (present or missing) and every missing guardian
    /// has compensated shares from every available guardian.
    fn validate_missing_guardians(&self) -> Result<(), Error> {
        let announced = self.available_guardians.len() + self.missing_guardians.len();
        if announced != self.context.number_of_guardians {
            return Err(Error::InvariantViolation(format!(
                "{announced} of {} guardians accounted for",
                self.context.number_of_guardians
            )));
        }
        for missing_id in self.missing_guardians.keys() {
            let provided = self
                .compensated_tally_shares
                .get(missing_id)
                .map(BTreeMap::len)
                .unwrap_or(0);
            if provided != self.available_guardians.len() {
                return Err(Error::QuorumUnmet {
                    available: provided,
                    quorum: self.available_guardians.len(),
                });
            }
        }
        Ok(())
    }

    fn check_quorum(&self) -> Result<(), Error> {
        if self.available_guardians.len() < self.context.quorum {
            return Err(Error::QuorumUnmet {
                available: self.available_guardians.len(),
                quorum: self.context.quorum,
            });
        }
        Ok(())
    }

    /// All shares for the tally: the available guardians' own, plus a
    /// reconstructed share per missing guardian.
    fn collect_tally_shares(
        &self,
    ) -> Result<BTreeMap<GuardianId, DecryptionShare>, Error> {
        let mut shares = self.tally_shares.clone();
        if !self.missing_guardians.is_empty() {
            let lagrange = self.lagrange_coefficients()?;
            for (missing_id, missing_key) in &self.missing_guardians {
                let compensated = self
                    .compensated_tally_shares
                    .get(missing_id)
                    .ok_or_else(|| Error::QuorumUnmet {
                        available: 0,
                        quorum: self.available_guardians.len(),
                    })?;
                let reconstructed = reconstruct_decryption_share(
                    missing_key,
                    compensated,
                    &lagrange.coefficients,
                )?;
                shares.insert(missing_id.clone(), reconstructed);
            }
        }
        Ok(shares)
    }

    /// Decrypt the tally. Fails with `QuorumUnmet` when fewer than the
    /// quorum of guardians announced; when more than the quorum announced,
    /// every one of them participates.
    pub fn get_plaintext_tally(&self, tally: &CiphertextTally) -> Result<PlaintextTally, Error> {
        self.check_quorum()?;
        self.validate_missing_guardians()?;
        let shares = self.collect_tally_shares()?;
        decrypt_tally(tally, &shares, &self.context.crypto_extended_base_hash)
    }

    /// Decrypt every spoiled ballot individually.
    pub fn get_plaintext_ballots(
        &self,
        spoiled_ballots: &[SubmittedBallot],
    ) -> Result<BTreeMap<BallotId, PlaintextTally>, Error> {
        self.check_quorum()?;
        self.validate_missing_guardians()?;

        let lagrange = if self.missing_guardians.is_empty() {
            None
        } else {
            Some(self.lagrange_coefficients()?)
        };

        let mut plaintexts = BTreeMap::new();
        for ballot in spoiled_ballots {
            let mut shares: BTreeMap<GuardianId, DecryptionShare> = BTreeMap::new();
            for (guardian_id, per_ballot) in &self.ballot_shares {
                let share = per_ballot.get(ballot.object_id()).ok_or_else(|| {
                    Error::InvariantViolation(format!(
                        "guardian {guardian_id} has no share for ballot {}",
                        ballot.object_id()
                    ))
                })?;
                shares.insert(guardian_id.clone(), share.clone());
            }
            if let Some(lagrange) = &lagrange {
                for (missing_id, missing_key) in &self.missing_guardians {
                    let per_available = self
                        .compensated_ballot_shares
                        .get(missing_id)
                        .ok_or_else(|| Error::QuorumUnmet {
                            available: 0,
                            quorum: self.available_guardians.len(),
                        })?;
                    let mut compensated = BTreeMap::new();
                    for (available_id, per_ballot) in per_available {
                        let share =
                            per_ballot.get(ballot.object_id()).ok_or_else(|| {
                                Error::InvariantViolation(format!(
                                    "guardian {available_id} has no compensated share for ballot {}",
                                    ballot.object_id()
                                ))
                            })?;
                        compensated.insert(available_id.clone(), share.clone());
                    }
                    let reconstructed = reconstruct_decryption_share(
                        missing_key,
                        &compensated,
                        &lagrange.coefficients,
                    )?;
                    shares.insert(missing_id.clone(), reconstructed);
                }
            }
            let plaintext =
                decrypt_ballot(ballot, &shares, &self.context.crypto_extended_base_hash)?;
            plaintexts.insert(ballot.object_id().to_string(), plaintext);
        }
        Ok(plaintexts)
    }

    fn validate_tally_share(
        &self,
        guardian_key: &ElectionPublicKey,
        tally: &CiphertextTally,
        share: &DecryptionShare,
    ) -> Result<(), Error> {
        for contest in tally.contests.values() {
            let share_contest =
                share.contests.get(&contest.object_id).ok_or_else(|| {
                    Error::InvariantViolation(format!(
                        "share from {} is missing contest {}",
                        guardian_key.owner_id, contest.object_id
                    ))
                })?;
            for selection in contest.selections.values() {
                let share_selection = share_contest
                    .selections
                    .get(&selection.object_id)
                    .ok_or_else(|| {
                        Error::InvariantViolation(format!(
                            "share from {} is missing selection {}",
                            guardian_key.owner_id, selection.object_id
                        ))
                    })?;
                if !share_selection.is_valid(
                    &selection.ciphertext,
                    &guardian_key.key,
                    &self.context.crypto_extended_base_hash,
                ) {
                    return Err(Error::ProofVerificationFailed(format!(
                        "tally share from {} for selection {}",
                        guardian_key.owner_id, selection.object_id
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_ballot_share(
        &self,
        guardian_key: &ElectionPublicKey,
        ballot: &SubmittedBallot,
        share: &DecryptionShare,
    ) -> Result<(), Error> {
        for contest in &ballot.ballot.contests {
            let share_contest =
                share.contests.get(&contest.object_id).ok_or_else(|| {
                    Error::InvariantViolation(format!(
                        "ballot share from {} is missing contest {}",
                        guardian_key.owner_id, contest.object_id
                    ))
                })?;
            for selection in &contest.ballot_selections {
                let share_selection = share_contest
                    .selections
                    .get(&selection.object_id)
                    .ok_or_else(|| {
                        Error::InvariantViolation(format!(
                            "ballot share from {} is missing selection {}",
                            guardian_key.owner_id, selection.object_id
                        ))
                    })?;
                if !share_selection.is_valid(
                    &selection.ciphertext,
                    &guardian_key.key,
                    &self.context.crypto_extended_base_hash,
                ) {
                    return Err(Error::ProofVerificationFailed(format!(
                        "ballot share from {} for selection {}",
                        guardian_key.owner_id, selection.object_id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballot::BallotBoxState;
    use crate::decryption::tests::{cast_ballot, run_ceremony};
    use crate::decryption::{
        compute_compensated_decryption_share, compute_compensated_decryption_share_for_ballot,
        compute_decryption_share, compute_decryption_share_for_ballot,
    };
    use crate::tally::tally_ballots;

    #[test]
    fn quorum_shortfall_refuses_to_decrypt() {
        // n=5, k=3, only 2 guardians announce.
        let election = run_ceremony(5, 3);
        let ballots = vec![cast_ballot(
            &election,
            "ballot-1",
            "council-alice",
            BallotBoxState::Cast,
        )];
        let tally = tally_ballots(&ballots, &election.internal, &election.context).unwrap();

        let mut mediator = DecryptionMediator::new("mediator", election.context.clone());
        for guardian in election.guardians.iter().take(2) {
            let share = compute_decryption_share(guardian, &tally, &election.context);
            mediator
                .announce(
                    guardian.share_key(),
                    &tally,
                    &[],
                    share,
                    BTreeMap::new(),
                )
                .unwrap();
        }
        assert!(matches!(
            mediator.get_plaintext_tally(&tally),
            Err(Error::QuorumUnmet {
                available: 2,
                quorum: 3
            })
        ));
    }

    #[test]
    fn over_quorum_everyone_participates() {
        // n=3, k=2, all 3 announce; all three shares are used.
        let election = run_ceremony(3, 2);
        let ballots = vec![
            cast_ballot(&election, "ballot-1", "council-alice", BallotBoxState::Cast),
            cast_ballot(&election, "ballot-2", "council-bob", BallotBoxState::Cast),
        ];
        let tally = tally_ballots(&ballots, &election.internal, &election.context).unwrap();

        let mut mediator = DecryptionMediator::new("mediator", election.context.clone());
        for guardian in &election.guardians {
            let share = compute_decryption_share(guardian, &tally, &election.context);
            mediator
                .announce(guardian.share_key(), &tally, &[], share, BTreeMap::new())
                .unwrap();
        }
        let plaintext = mediator.get_plaintext_tally(&tally).unwrap();
        let council = &plaintext.contests["council"];
        assert_eq!(council.selections["council-alice"].tally, 1);
        assert_eq!(council.selections["council-bob"].tally, 1);
        for selection in council.selections.values() {
            assert_eq!(selection.shares.len(), 3);
        }
    }

    #[test]
    fn missing_guardian_is_compensated_end_to_end() {
        let election = run_ceremony(3, 2);
        let ballots = vec![
            cast_ballot(&election, "ballot-1", "council-alice", BallotBoxState::Cast),
            cast_ballot(&election, "ballot-2", "council-bob", BallotBoxState::Cast),
            cast_ballot(
                &election,
                "ballot-3",
                "council-carol",
                BallotBoxState::Spoiled,
            ),
        ];
        let tally = tally_ballots(&ballots, &election.internal, &election.context).unwrap();
        let spoiled: Vec<_> = ballots
            .iter()
            .filter(|b| b.state == BallotBoxState::Spoiled)
            .cloned()
            .collect();

        let available = [&election.guardians[0], &election.guardians[2]];
        let missing = &election.guardians[1];

        let mut mediator = DecryptionMediator::new("mediator", election.context.clone());
        for guardian in available {
            let tally_share = compute_decryption_share(guardian, &tally, &election.context);
            let mut ballot_shares = BTreeMap::new();
            for ballot in &spoiled {
                ballot_shares.insert(
                    ballot.object_id().to_string(),
                    compute_decryption_share_for_ballot(guardian, ballot, &election.context),
                );
            }
            mediator
                .announce(
                    guardian.share_key(),
                    &tally,
                    &spoiled,
                    tally_share,
                    ballot_shares,
                )
                .unwrap();
        }
        mediator.announce_missing(missing.share_key()).unwrap();

        for guardian in available {
            let tally_share = compute_compensated_decryption_share(
                guardian,
                missing.id(),
                &tally,
                &election.context,
            )
            .unwrap();
            let mut ballot_shares = BTreeMap::new();
            for ballot in &spoiled {
                ballot_shares.insert(
                    ballot.object_id().to_string(),
                    compute_compensated_decryption_share_for_ballot(
                        guardian,
                        missing.id(),
                        ballot,
                        &election.context,
                    )
                    .unwrap(),
                );
            }
            mediator
                .receive_compensated_shares(tally_share, ballot_shares)
                .unwrap();
        }

        let plaintext = mediator.get_plaintext_tally(&tally).unwrap();
        let council = &plaintext.contests["council"];
        assert_eq!(council.selections["council-alice"].tally, 1);
        assert_eq!(council.selections["council-bob"].tally, 1);
        assert_eq!(council.selections["council-carol"].tally, 0);

        let spoiled_plaintexts = mediator.get_plaintext_ballots(&spoiled).unwrap();
        let ballot_plaintext = &spoiled_plaintexts["ballot-3"];
        assert_eq!(
            ballot_plaintext.contests["council"].selections["council-carol"].tally,
            1
        );
    }

    #[test]
    fn a_quorum_of_one_lets_any_single_guardian_decrypt() {
        let election = run_ceremony(2, 1);
        let ballots = vec![cast_ballot(
            &election,
            "ballot-1",
            "council-bob",
            BallotBoxState::Cast,
        )];
        let tally = tally_ballots(&ballots, &election.internal, &election.context).unwrap();

        // Only guardian 1 announces; it compensates for guardian 2 alone.
        let present = &election.guardians[0];
        let missing = &election.guardians[1];
        let mut mediator = DecryptionMediator::new("mediator", election.context.clone());
        let share = compute_decryption_share(present, &tally, &election.context);
        mediator
            .announce(present.share_key(), &tally, &[], share, BTreeMap::new())
            .unwrap();
        mediator.announce_missing(missing.share_key()).unwrap();
        let compensated = compute_compensated_decryption_share(
            present,
            missing.id(),
            &tally,
            &election.context,
        )
        .unwrap();
        mediator
            .receive_compensated_shares(compensated, BTreeMap::new())
            .unwrap();

        let plaintext = mediator.get_plaintext_tally(&tally).unwrap();
        assert_eq!(
            plaintext.contests["council"].selections["council-bob"].tally,
            1
        );
    }

    #[test]
    fn corrupted_share_is_rejected_at_announcement() {
        let election = run_ceremony(2, 2);
        let ballots = vec![cast_ballot(
            &election,
            "ballot-1",
            "council-alice",
            BallotBoxState::Cast,
        )];
        let tally = tally_ballots(&ballots, &election.internal, &election.context).unwrap();

        let guardian = &election.guardians[0];
        let mut share = compute_decryption_share(guardian, &tally, &election.context);
        let contest = share.contests.get_mut("council").unwrap();
        let selection = contest.selections.get_mut("council-alice").unwrap();
        selection.share = crate::group::g_pow_p(&crate::group::rand_q());

        let mut mediator = DecryptionMediator::new("mediator", election.context.clone());
        assert!(matches!(
            mediator.announce(guardian.share_key(), &tally, &[], share, BTreeMap::new()),
            Err(Error::ProofVerificationFailed(_))
        ));
        assert_eq!(mediator.available_guardian_count(), 0);
    }
}
