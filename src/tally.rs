//! The homomorphic ciphertext tally.
//!
//! Cast ballots are folded selection-by-selection into running ciphertext
//! products; spoiled ballots are only remembered for individual decryption.
//! Ballot order never affects the result, and a ballot id can be added
//! exactly once.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ballot::{BallotBoxState, BallotId, SubmittedBallot};
use crate::election::CiphertextElectionContext;
use crate::elgamal::{elgamal_add, ElGamalCiphertext};
use crate::error::Error;
use crate::group::{ElementModP, ElementModQ};
use crate::manifest::InternalManifest;

/// The running homomorphic total for one selection across all cast ballots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextTallySelection {
    pub object_id: String,
    pub sequence_order: u32,
    pub description_hash: ElementModQ,
    pub ciphertext: ElGamalCiphertext,
}

impl CiphertextTallySelection {
    /// Homomorphically add the given ciphertext into the total.
    pub fn elgamal_accumulate(&mut self, ciphertext: &ElGamalCiphertext) -> Result<(), Error> {
        self.ciphertext = elgamal_add(&[&self.ciphertext, ciphertext])?;
        Ok(())
    }
}

/// The per-selection totals for one contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextTallyContest {
    pub object_id: String,
    pub sequence_order: u32,
    pub description_hash: ElementModQ,
    pub selections: BTreeMap<String, CiphertextTallySelection>,
}

impl CiphertextTallyContest {
    /// Accumulate the real (non-placeholder) selections of one ballot's
    /// contest into this tally contest.
    fn accumulate_contest(
        &mut self,
        contest_selections: &[crate::ballot::CiphertextBallotSelection],
    ) -> Result<(), Error> {
        let ballot_selection_ids: BTreeSet<&str> = contest_selections
            .iter()
            .filter(|s| !s.is_placeholder_selection)
            .map(|s| s.object_id.as_str())
            .collect();
        for tally_selection_id in self.selections.keys() {
            if !ballot_selection_ids.contains(tally_selection_id.as_str()) {
                return Err(Error::InvariantViolation(format!(
                    "ballot contest {} is missing selection {}",
                    self.object_id, tally_selection_id
                )));
            }
        }
        for selection in contest_selections {
            if selection.is_placeholder_selection {
                continue;
            }
            let tally_selection = self
                .selections
                .get_mut(&selection.object_id)
                .ok_or_else(|| Error::UnknownSelection(selection.object_id.clone()))?;
            tally_selection.elgamal_accumulate(&selection.ciphertext)?;
        }
        Ok(())
    }
}

/// The published form of the tally: just the totals, no bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedCiphertextTally {
    pub object_id: String,
    pub contests: BTreeMap<String, CiphertextTallyContest>,
}

/// A `CiphertextTally` accepts cast and spoiled ballots and accumulates a
/// tally on the cast ballots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiphertextTally {
    pub object_id: String,

    /// Ballot ids already cast into the tally
    pub cast_ballot_ids: BTreeSet<BallotId>,

    /// Ballot ids spoiled and held out for individual decryption
    pub spoiled_ballot_ids: BTreeSet<BallotId>,

    pub contests: BTreeMap<String, CiphertextTallyContest>,
}

impl CiphertextTally {
    /// Build an empty tally over every real selection in the manifest; the
    /// empty total for a selection is the pair `(1, 1)`.
    pub fn new(object_id: &str, manifest: &InternalManifest) -> Self {
        let mut contests = BTreeMap::new();
        for contest in &manifest.contests {
            let mut selections = BTreeMap::new();
            for selection in &contest.contest.ballot_selections {
                selections.insert(
                    selection.object_id.clone(),
                    CiphertextTallySelection {
                        object_id: selection.object_id.clone(),
                        sequence_order: selection.sequence_order,
                        description_hash: crate::hash::CryptoHashable::crypto_hash(selection),
                        ciphertext: ElGamalCiphertext {
                            pad: ElementModP::one(),
                            data: ElementModP::one(),
                        },
                    },
                );
            }
            contests.insert(
                contest.contest.object_id.clone(),
                CiphertextTallyContest {
                    object_id: contest.contest.object_id.clone(),
                    sequence_order: contest.contest.sequence_order,
                    description_hash: crate::hash::CryptoHashable::crypto_hash(contest),
                    selections,
                },
            );
        }
        CiphertextTally {
            object_id: object_id.to_string(),
            cast_ballot_ids: BTreeSet::new(),
            spoiled_ballot_ids: BTreeSet::new(),
            contests,
        }
    }

    pub fn len(&self) -> usize {
        self.cast_ballot_ids.len() + self.spoiled_ballot_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, ballot_id: &str) -> bool {
        self.cast_ballot_ids.contains(ballot_id) || self.spoiled_ballot_ids.contains(ballot_id)
    }

    /// Append a submitted ballot, optionally validating its full
    /// encryption state against the election context first.
    ///
    /// Appending is idempotent per ballot id: a second attempt fails with
    /// `DuplicateBallot` and leaves the tally unchanged.
    pub fn append(
        &mut self,
        ballot: &SubmittedBallot,
        should_validate: bool,
        manifest: &InternalManifest,
        context: &CiphertextElectionContext,
    ) -> Result<(), Error> {
        if ballot.state == BallotBoxState::Unknown {
            return Err(Error::InvariantViolation(format!(
                "cannot tally ballot {} in an unknown state",
                ballot.object_id()
            )));
        }
        if self.contains(ballot.object_id()) {
            return Err(Error::DuplicateBallot(ballot.object_id().to_string()));
        }
        if should_validate
            && !ballot.ballot.is_valid_encryption(
                &manifest.manifest_hash,
                &context.elgamal_public_key,
                &context.crypto_extended_base_hash,
            )
        {
            return Err(Error::ProofVerificationFailed(format!(
                "ballot {}",
                ballot.object_id()
            )));
        }

        match ballot.state {
            BallotBoxState::Cast => self.add_cast(ballot),
            BallotBoxState::Spoiled => {
                self.spoiled_ballot_ids
                    .insert(ballot.object_id().to_string());
                Ok(())
            }
            BallotBoxState::Unknown => unreachable!("rejected above"),
        }
    }

    fn add_cast(&mut self, ballot: &SubmittedBallot) -> Result<(), Error> {
        // Stage the accumulation so a failure leaves the tally untouched.
        let mut staged = self.contests.clone();
        for contest in &ballot.ballot.contests {
            let tally_contest = staged.get_mut(&contest.object_id).ok_or_else(|| {
                Error::UnknownSelection(contest.object_id.clone())
            })?;
            tally_contest.accumulate_contest(&contest.ballot_selections)?;
        }
        self.contests = staged;
        self.cast_ballot_ids
            .insert(ballot.object_id().to_string());
        Ok(())
    }

    /// The publishable form of this tally.
    pub fn publish(&self) -> PublishedCiphertextTally {
        PublishedCiphertextTally {
            object_id: self.object_id.clone(),
            contests: self.contests.clone(),
        }
    }
}

/// Accumulate a batch of submitted ballots into a fresh tally.
pub fn tally_ballots(
    ballots: &[SubmittedBallot],
    manifest: &InternalManifest,
    context: &CiphertextElectionContext,
) -> Result<CiphertextTally, Error> {
    let mut tally = CiphertextTally::new("election-results", manifest);
    for ballot in ballots {
        tally.append(ballot, true, manifest, context)?;
    }
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballot::{PlaintextBallot, PlaintextBallotContest, PlaintextBallotSelection};
    use crate::constants::use_test_constants;
    use crate::election::make_ciphertext_election_context;
    use crate::elgamal::elgamal_keypair_random;
    use crate::encrypt::encrypt_ballot;
    use crate::group::rand_q;
    use crate::manifest::test_manifests::simple_manifest;
    use crate::manifest::Manifest;

    fn setup(
        manifest: &Manifest,
    ) -> (
        InternalManifest,
        CiphertextElectionContext,
        crate::elgamal::ElGamalKeyPair,
    ) {
        use_test_constants();
        let internal = InternalManifest::new(manifest);
        let keys = elgamal_keypair_random();
        let context = make_ciphertext_election_context(
            1,
            1,
            keys.public_key.clone(),
            rand_q(),
            internal.manifest_hash.clone(),
        )
        .unwrap();
        (internal, context, keys)
    }

    fn ballot_for(ballot_id: &str, selection_id: &str) -> PlaintextBallot {
        PlaintextBallot {
            object_id: ballot_id.to_string(),
            style_id: "style-1".to_string(),
            contests: vec![PlaintextBallotContest {
                object_id: "council".to_string(),
                ballot_selections: vec![PlaintextBallotSelection {
                    object_id: selection_id.to_string(),
                    vote: 1,
                    is_placeholder_selection: false,
                }],
            }],
        }
    }

    fn submit(
        ballot: &PlaintextBallot,
        internal: &InternalManifest,
        context: &CiphertextElectionContext,
        state: BallotBoxState,
    ) -> SubmittedBallot {
        let encrypted = encrypt_ballot(ballot, internal, context, &rand_q(), None).unwrap();
        SubmittedBallot::from_ciphertext_ballot(encrypted, state)
    }

    #[test]
    fn cast_ballots_accumulate_and_decrypt() {
        let manifest = simple_manifest();
        let (internal, context, keys) = setup(&manifest);
        let mut tally = CiphertextTally::new("tally", &internal);

        for (i, choice) in ["council-alice", "council-alice", "council-bob"]
            .iter()
            .enumerate()
        {
            let submitted = submit(
                &ballot_for(&format!("ballot-{i}"), choice),
                &internal,
                &context,
                BallotBoxState::Cast,
            );
            tally.append(&submitted, true, &internal, &context).unwrap();
        }

        let contest = &tally.contests["council"];
        let alice = &contest.selections["council-alice"];
        let bob = &contest.selections["council-bob"];
        let carol = &contest.selections["council-carol"];
        assert_eq!(alice.ciphertext.decrypt(&keys.secret_key).unwrap(), 2);
        assert_eq!(bob.ciphertext.decrypt(&keys.secret_key).unwrap(), 1);
        assert_eq!(carol.ciphertext.decrypt(&keys.secret_key).unwrap(), 0);
    }

    #[test]
    fn an_empty_tally_holds_the_identity_pair() {
        let manifest = simple_manifest();
        let (internal, _context, _keys) = setup(&manifest);
        let tally = CiphertextTally::new("tally", &internal);
        for contest in tally.contests.values() {
            for selection in contest.selections.values() {
                assert_eq!(selection.ciphertext.pad, crate::group::ElementModP::one());
                assert_eq!(selection.ciphertext.data, crate::group::ElementModP::one());
            }
        }
    }

    #[test]
    fn duplicate_ballots_are_rejected_and_leave_the_tally_unchanged() {
        let manifest = simple_manifest();
        let (internal, context, _keys) = setup(&manifest);
        let mut tally = CiphertextTally::new("tally", &internal);
        let submitted = submit(
            &ballot_for("ballot-1", "council-alice"),
            &internal,
            &context,
            BallotBoxState::Cast,
        );
        tally.append(&submitted, true, &internal, &context).unwrap();
        let before = tally.contests.clone();
        assert!(matches!(
            tally.append(&submitted, true, &internal, &context),
            Err(Error::DuplicateBallot(_))
        ));
        assert_eq!(tally.contests, before);
    }

    #[test]
    fn spoiled_ballots_are_not_accumulated() {
        let manifest = simple_manifest();
        let (internal, context, keys) = setup(&manifest);
        let mut tally = CiphertextTally::new("tally", &internal);
        let submitted = submit(
            &ballot_for("ballot-1", "council-alice"),
            &internal,
            &context,
            BallotBoxState::Spoiled,
        );
        tally.append(&submitted, true, &internal, &context).unwrap();
        assert!(tally.spoiled_ballot_ids.contains("ballot-1"));
        let alice = &tally.contests["council"].selections["council-alice"];
        assert_eq!(alice.ciphertext.decrypt(&keys.secret_key).unwrap(), 0);
    }

    #[test]
    fn ballot_order_does_not_change_the_tally() {
        let manifest = simple_manifest();
        let (internal, context, _keys) = setup(&manifest);
        let ballots: Vec<SubmittedBallot> = ["council-alice", "council-bob", "council-carol"]
            .iter()
            .enumerate()
            .map(|(i, choice)| {
                submit(
                    &ballot_for(&format!("ballot-{i}"), choice),
                    &internal,
                    &context,
                    BallotBoxState::Cast,
                )
            })
            .collect();

        let mut forward = CiphertextTally::new("tally", &internal);
        for ballot in &ballots {
            forward.append(ballot, false, &internal, &context).unwrap();
        }
        let mut reverse = CiphertextTally::new("tally", &internal);
        for ballot in ballots.iter().rev() {
            reverse.append(ballot, false, &internal, &context).unwrap();
        }
        assert_eq!(forward.contests, reverse.contests);
    }

    #[test]
    fn tampered_ballots_fail_validation_on_append() {
        let manifest = simple_manifest();
        let (internal, context, _keys) = setup(&manifest);
        let mut tally = CiphertextTally::new("tally", &internal);
        let mut submitted = submit(
            &ballot_for("ballot-1", "council-alice"),
            &internal,
            &context,
            BallotBoxState::Cast,
        );
        submitted.ballot.contests[0].ballot_selections[0]
            .ciphertext
            .data = crate::group::g_pow_p(&rand_q());
        assert!(matches!(
            tally.append(&submitted, true, &internal, &context),
            Err(Error::ProofVerificationFailed(_))
        ));
    }
}
