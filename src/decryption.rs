//! Decryption shares and cooperative decryption.
//!
//! Each available guardian contributes `M_i = A^{s_i}` per ciphertext with
//! a Chaum-Pedersen proof. For a missing guardian, every available guardian
//! contributes `M_{i,l} = A^{P_l(i)}` from the backup it verified during
//! the ceremony, and the missing share is reconstructed by Lagrange
//! interpolation at zero. Every proof is verified before its share is
//! combined.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ballot::{BallotId, SubmittedBallot};
use crate::chaum_pedersen::ChaumPedersenProof;
use crate::dlog::discrete_log;
use crate::election::CiphertextElectionContext;
use crate::elgamal::ElGamalCiphertext;
use crate::error::Error;
use crate::group::{div_p, mult_p, pow_p, ElementModP, ElementModQ};
use crate::guardian::Guardian;
use crate::key_ceremony::{ElectionPublicKey, GuardianId};
use crate::polynomial::compute_lagrange_coefficient;
use crate::tally::CiphertextTally;

/// One guardian's piece of a missing guardian's decryption share for a
/// single selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextCompensatedDecryptionSelection {
    pub object_id: String,

    /// The available guardian that computed this piece
    pub guardian_id: GuardianId,

    /// The missing guardian it compensates for
    pub missing_guardian_id: GuardianId,

    /// `M_{i,l} = A^{P_l(i)}`
    pub share: ElementModP,

    /// `g^{P_l(i)}`, recomputed from the missing guardian's commitments
    pub recovery_key: ElementModP,

    pub proof: ChaumPedersenProof,
}

/// One guardian's decryption share for a single selection: either computed
/// directly with a proof, or reconstructed from compensated pieces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextDecryptionSelection {
    pub object_id: String,
    pub guardian_id: GuardianId,

    /// `M_i = A^{s_i}`
    pub share: ElementModP,

    /// Present when the guardian computed the share itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<ChaumPedersenProof>,

    /// Present when the share was reconstructed for a missing guardian
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered_parts:
        Option<BTreeMap<GuardianId, CiphertextCompensatedDecryptionSelection>>,
}

impl CiphertextDecryptionSelection {
    /// Verify this share against the ciphertext it decrypts. A direct
    /// share verifies its own proof against the guardian's public key; a
    /// reconstructed share verifies every compensated piece against its
    /// recovery key.
    pub fn is_valid(
        &self,
        message: &ElGamalCiphertext,
        guardian_public_key: &ElementModP,
        extended_base_hash: &ElementModQ,
    ) -> bool {
        match (&self.proof, &self.recovered_parts) {
            (Some(proof), _) => {
                proof.is_valid(message, guardian_public_key, &self.share, extended_base_hash)
            }
            (None, Some(parts)) => parts.values().all(|part| {
                part.proof.is_valid(
                    message,
                    &part.recovery_key,
                    &part.share,
                    extended_base_hash,
                )
            }),
            (None, None) => false,
        }
    }
}

/// A guardian's decryption shares for every selection in one contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextDecryptionContest {
    pub object_id: String,
    pub guardian_id: GuardianId,
    pub description_hash: ElementModQ,
    pub selections: BTreeMap<String, CiphertextDecryptionSelection>,
}

/// A guardian's compensated shares for every selection in one contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextCompensatedDecryptionContest {
    pub object_id: String,
    pub guardian_id: GuardianId,
    pub missing_guardian_id: GuardianId,
    pub description_hash: ElementModQ,
    pub selections: BTreeMap<String, CiphertextCompensatedDecryptionSelection>,
}

/// A guardian's decryption share of a tally or of a single ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionShare {
    /// The tally or ballot this share decrypts
    pub object_id: String,
    pub guardian_id: GuardianId,

    /// The guardian's election public key, for share verification
    pub public_key: ElementModP,

    pub contests: BTreeMap<String, CiphertextDecryptionContest>,
}

/// An available guardian's full compensated share on behalf of one missing
/// guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensatedDecryptionShare {
    pub object_id: String,
    pub guardian_id: GuardianId,
    pub missing_guardian_id: GuardianId,
    pub public_key: ElementModP,
    pub contests: BTreeMap<String, CiphertextCompensatedDecryptionContest>,
}

/// The Lagrange coefficients used during compensation, published with the
/// election record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagrangeCoefficientsRecord {
    pub coefficients: BTreeMap<GuardianId, ElementModQ>,
}

/// The decrypted counts for one selection, with everything needed to
/// re-verify them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextTallySelection {
    pub object_id: String,

    /// The decrypted count
    pub tally: u64,

    /// `g^tally`, or `M` in the protocol
    pub value: ElementModP,

    /// The ciphertext the count was recovered from
    pub message: ElGamalCiphertext,

    /// Every guardian's share, with proofs
    pub shares: Vec<CiphertextDecryptionSelection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextTallyContest {
    pub object_id: String,
    pub selections: BTreeMap<String, PlaintextTallySelection>,
}

/// The plaintext representation of all contests: the decrypted tally, or a
/// decrypted spoiled ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextTally {
    pub object_id: String,
    pub contests: BTreeMap<String, PlaintextTallyContest>,
}

/// Compute a guardian's decryption share for the whole tally.
pub fn compute_decryption_share(
    guardian: &Guardian,
    tally: &CiphertextTally,
    context: &CiphertextElectionContext,
) -> DecryptionShare {
    let mut contests = BTreeMap::new();
    for contest in tally.contests.values() {
        let mut selections = BTreeMap::new();
        for selection in contest.selections.values() {
            let (share, proof) = guardian.partially_decrypt(
                &selection.ciphertext,
                &context.crypto_extended_base_hash,
            );
            selections.insert(
                selection.object_id.clone(),
                CiphertextDecryptionSelection {
                    object_id: selection.object_id.clone(),
                    guardian_id: guardian.id().to_string(),
                    share,
                    proof: Some(proof),
                    recovered_parts: None,
                },
            );
        }
        contests.insert(
            contest.object_id.clone(),
            CiphertextDecryptionContest {
                object_id: contest.object_id.clone(),
                guardian_id: guardian.id().to_string(),
                description_hash: contest.description_hash.clone(),
                selections,
            },
        );
    }
    DecryptionShare {
        object_id: tally.object_id.clone(),
        guardian_id: guardian.id().to_string(),
        public_key: guardian.share_key().key,
        contests,
    }
}

/// Compute a guardian's decryption share for a single (spoiled) ballot.
pub fn compute_decryption_share_for_ballot(
    guardian: &Guardian,
    ballot: &SubmittedBallot,
    context: &CiphertextElectionContext,
) -> DecryptionShare {
    let mut contests = BTreeMap::new();
    for contest in &ballot.ballot.contests {
        let mut selections = BTreeMap::new();
        for selection in &contest.ballot_selections {
            let (share, proof) = guardian.partially_decrypt(
                &selection.ciphertext,
                &context.crypto_extended_base_hash,
            );
            selections.insert(
                selection.object_id.clone(),
                CiphertextDecryptionSelection {
                    object_id: selection.object_id.clone(),
                    guardian_id: guardian.id().to_string(),
                    share,
                    proof: Some(proof),
                    recovered_parts: None,
                },
            );
        }
        contests.insert(
            contest.object_id.clone(),
            CiphertextDecryptionContest {
                object_id: contest.object_id.clone(),
                guardian_id: guardian.id().to_string(),
                description_hash: contest.description_hash.clone(),
                selections,
            },
        );
    }
    DecryptionShare {
        object_id: ballot.object_id().to_string(),
        guardian_id: guardian.id().to_string(),
        public_key: guardian.share_key().key,
        contests,
    }
}

/// Compute a guardian's compensated decryption share of the tally on
/// behalf of a missing guardian.
pub fn compute_compensated_decryption_share(
    guardian: &Guardian,
    missing_guardian_id: &str,
    tally: &CiphertextTally,
    context: &CiphertextElectionContext,
) -> Result<CompensatedDecryptionShare, Error> {
    let recovery_key = guardian.recovery_public_key_for(missing_guardian_id)?;
    let mut contests = BTreeMap::new();
    for contest in tally.contests.values() {
        let mut selections = BTreeMap::new();
        for selection in contest.selections.values() {
            let (share, proof) = guardian.compensate_decrypt(
                missing_guardian_id,
                &selection.ciphertext,
                &context.crypto_extended_base_hash,
            )?;
            selections.insert(
                selection.object_id.clone(),
                CiphertextCompensatedDecryptionSelection {
                    object_id: selection.object_id.clone(),
                    guardian_id: guardian.id().to_string(),
                    missing_guardian_id: missing_guardian_id.to_string(),
                    share,
                    recovery_key: recovery_key.clone(),
                    proof,
                },
            );
        }
        contests.insert(
            contest.object_id.clone(),
            CiphertextCompensatedDecryptionContest {
                object_id: contest.object_id.clone(),
                guardian_id: guardian.id().to_string(),
                missing_guardian_id: missing_guardian_id.to_string(),
                description_hash: contest.description_hash.clone(),
                selections,
            },
        );
    }
    Ok(CompensatedDecryptionShare {
        object_id: tally.object_id.clone(),
        guardian_id: guardian.id().to_string(),
        missing_guardian_id: missing_guardian_id.to_string(),
        public_key: guardian.share_key().key,
        contests,
    })
}

/// Compute a guardian's compensated decryption share of a single ballot on
/// behalf of a missing guardian.
pub fn compute_compensated_decryption_share_for_ballot(
    guardian: &Guardian,
    missing_guardian_id: &str,
    ballot: &SubmittedBallot,
    context: &CiphertextElectionContext,
) -> Result<CompensatedDecryptionShare, Error> {
    let recovery_key = guardian.recovery_public_key_for(missing_guardian_id)?;
    let mut contests = BTreeMap::new();
    for contest in &ballot.ballot.contests {
        let mut selections = BTreeMap::new();
        for selection in &contest.ballot_selections {
            let (share, proof) = guardian.compensate_decrypt(
                missing_guardian_id,
                &selection.ciphertext,
                &context.crypto_extended_base_hash,
            )?;
            selections.insert(
                selection.object_id.clone(),
                CiphertextCompensatedDecryptionSelection {
                    object_id: selection.object_id.clone(),
                    guardian_id: guardian.id().to_string(),
                    missing_guardian_id: missing_guardian_id.to_string(),
                    share,
                    recovery_key: recovery_key.clone(),
                    proof,
                },
            );
        }
        contests.insert(
            contest.object_id.clone(),
            CiphertextCompensatedDecryptionContest {
                object_id: contest.object_id.clone(),
                guardian_id: guardian.id().to_string(),
                missing_guardian_id: missing_guardian_id.to_string(),
                description_hash: contest.description_hash.clone(),
                selections,
            },
        );
    }
    Ok(CompensatedDecryptionShare {
        object_id: ballot.object_id().to_string(),
        guardian_id: guardian.id().to_string(),
        missing_guardian_id: missing_guardian_id.to_string(),
        public_key: guardian.share_key().key,
        contests,
    })
}

/// Produce the Lagrange coefficient for every available guardian, over the
/// full available set.
pub fn compute_lagrange_coefficients_for_guardians(
    available_guardian_keys: &[ElectionPublicKey],
) -> Result<BTreeMap<GuardianId, ElementModQ>, Error> {
    let mut coefficients = BTreeMap::new();
    for key in available_guardian_keys {
        let other_orders: Vec<u32> = available_guardian_keys
            .iter()
            .filter(|other| other.owner_id != key.owner_id)
            .map(|other| other.sequence_order)
            .collect();
        coefficients.insert(
            key.owner_id.clone(),
            compute_lagrange_coefficient(key.sequence_order, &other_orders)?,
        );
    }
    Ok(coefficients)
}

/// Reconstruct the missing guardian's decryption share from the
/// compensated shares of every available guardian:
/// `M_l = prod_i M_{i,l}^{lambda_i}`.
pub fn reconstruct_decryption_share(
    missing_guardian_key: &ElectionPublicKey,
    shares: &BTreeMap<GuardianId, CompensatedDecryptionShare>,
    lagrange_coefficients: &BTreeMap<GuardianId, ElementModQ>,
) -> Result<DecryptionShare, Error> {
    let mut object_id = None;
    let mut contests: BTreeMap<String, CiphertextDecryptionContest> = BTreeMap::new();

    for (guardian_id, compensated) in shares {
        object_id.get_or_insert_with(|| compensated.object_id.clone());
        let lagrange = lagrange_coefficients.get(guardian_id).ok_or_else(|| {
            Error::InvariantViolation(format!("no lagrange coefficient for {guardian_id}"))
        })?;
        for contest in compensated.contests.values() {
            let reconstructed_contest =
                contests
                    .entry(contest.object_id.clone())
                    .or_insert_with(|| CiphertextDecryptionContest {
                        object_id: contest.object_id.clone(),
                        guardian_id: missing_guardian_key.owner_id.clone(),
                        description_hash: contest.description_hash.clone(),
                        selections: BTreeMap::new(),
                    });
            for selection in contest.selections.values() {
                let entry = reconstructed_contest
                    .selections
                    .entry(selection.object_id.clone())
                    .or_insert_with(|| CiphertextDecryptionSelection {
                        object_id: selection.object_id.clone(),
                        guardian_id: missing_guardian_key.owner_id.clone(),
                        share: ElementModP::one(),
                        proof: None,
                        recovered_parts: Some(BTreeMap::new()),
                    });
                entry.share = mult_p(&[&entry.share, &pow_p(&selection.share, lagrange)]);
                if let Some(parts) = entry.recovered_parts.as_mut() {
                    parts.insert(guardian_id.clone(), selection.clone());
                }
            }
        }
    }

    Ok(DecryptionShare {
        object_id: object_id.ok_or_else(|| {
            Error::InvariantViolation("no compensated shares to reconstruct from".to_string())
        })?,
        guardian_id: missing_guardian_key.owner_id.clone(),
        public_key: missing_guardian_key.key.clone(),
        contests,
    })
}

/// Decrypt one selection from the collection of all guardians' shares.
/// The shares must already be verified; `M = prod M_i`, `g^t = B / M`.
pub fn decrypt_selection_with_shares(
    object_id: &str,
    message: &ElGamalCiphertext,
    shares: &[&CiphertextDecryptionSelection],
    max_exponent: u64,
) -> Result<PlaintextTallySelection, Error> {
    if shares.is_empty() {
        return Err(Error::InvariantViolation(format!(
            "no decryption shares for selection {object_id}"
        )));
    }

    let share_values: Vec<&ElementModP> = shares.iter().map(|s| &s.share).collect();
    let all_shares_product = mult_p(&share_values);
    let value = div_p(&message.data, &all_shares_product)?;
    let tally = discrete_log(&value, max_exponent)?;

    Ok(PlaintextTallySelection {
        object_id: object_id.to_string(),
        tally,
        value,
        message: message.clone(),
        shares: shares.iter().map(|s| (*s).clone()).collect(),
    })
}

/// Gather each guardian's share for one selection, verifying it against
/// that guardian's public key.
fn collect_selection_shares<'a>(
    contest_id: &str,
    selection_id: &str,
    message: &ElGamalCiphertext,
    shares: &'a BTreeMap<GuardianId, DecryptionShare>,
    extended_base_hash: &ElementModQ,
) -> Result<Vec<&'a CiphertextDecryptionSelection>, Error> {
    let mut collected = Vec::with_capacity(shares.len());
    for share in shares.values() {
        let contest = share.contests.get(contest_id).ok_or_else(|| {
            Error::InvariantViolation(format!(
                "share from {} is missing contest {contest_id}",
                share.guardian_id
            ))
        })?;
        let selection = contest.selections.get(selection_id).ok_or_else(|| {
            Error::InvariantViolation(format!(
                "share from {} is missing selection {selection_id}",
                share.guardian_id
            ))
        })?;
        if !selection.is_valid(message, &share.public_key, extended_base_hash) {
            return Err(Error::ProofVerificationFailed(format!(
                "decryption share from {} for selection {selection_id}",
                share.guardian_id
            )));
        }
        collected.push(selection);
    }
    Ok(collected)
}

/// Decrypt the tally from the decryption shares of all guardians (direct
/// and reconstructed). The bounded discrete log is capped at the number of
/// cast ballots.
pub fn decrypt_tally(
    tally: &CiphertextTally,
    shares: &BTreeMap<GuardianId, DecryptionShare>,
    extended_base_hash: &ElementModQ,
) -> Result<PlaintextTally, Error> {
    let max_exponent = tally.cast_ballot_ids.len() as u64;
    let mut contests = BTreeMap::new();
    for contest in tally.contests.values() {
        let mut selections = BTreeMap::new();
        for selection in contest.selections.values() {
            let selection_shares = collect_selection_shares(
                &contest.object_id,
                &selection.object_id,
                &selection.ciphertext,
                shares,
                extended_base_hash,
            )?;
            let plaintext = decrypt_selection_with_shares(
                &selection.object_id,
                &selection.ciphertext,
                &selection_shares,
                max_exponent,
            )?;
            selections.insert(selection.object_id.clone(), plaintext);
        }
        contests.insert(
            contest.object_id.clone(),
            PlaintextTallyContest {
                object_id: contest.object_id.clone(),
                selections,
            },
        );
    }
    Ok(PlaintextTally {
        object_id: tally.object_id.clone(),
        contests,
    })
}

/// Decrypt a single (spoiled) ballot from the guardians' ballot shares.
/// Placeholder selections are dropped from the plaintext.
pub fn decrypt_ballot(
    ballot: &SubmittedBallot,
    shares: &BTreeMap<GuardianId, DecryptionShare>,
    extended_base_hash: &ElementModQ,
) -> Result<PlaintextTally, Error> {
    let mut contests = BTreeMap::new();
    for contest in &ballot.ballot.contests {
        let mut selections = BTreeMap::new();
        for selection in &contest.ballot_selections {
            if selection.is_placeholder_selection {
                continue;
            }
            let selection_shares = collect_selection_shares(
                &contest.object_id,
                &selection.object_id,
                &selection.ciphertext,
                shares,
                extended_base_hash,
            )?;
            let plaintext = decrypt_selection_with_shares(
                &selection.object_id,
                &selection.ciphertext,
                &selection_shares,
                1,
            )?;
            selections.insert(selection.object_id.clone(), plaintext);
        }
        contests.insert(
            contest.object_id.clone(),
            PlaintextTallyContest {
                object_id: contest.object_id.clone(),
                selections,
            },
        );
    }
    Ok(PlaintextTally {
        object_id: ballot.object_id().to_string(),
        contests,
    })
}

/// The decryption shares of ballots, keyed by ballot id.
pub type BallotShares = BTreeMap<BallotId, BTreeMap<GuardianId, DecryptionShare>>;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ballot::{
        BallotBoxState, PlaintextBallot, PlaintextBallotContest, PlaintextBallotSelection,
    };
    use crate::constants::use_test_constants;
    use crate::election::make_ciphertext_election_context;
    use crate::encrypt::encrypt_ballot;
    use crate::group::rand_q;
    use crate::key_ceremony_mediator::{KeyCeremonyMediator, KeyCeremonyMessage};
    use crate::manifest::test_manifests::simple_manifest;
    use crate::manifest::InternalManifest;
    use crate::key_ceremony::CeremonyDetails;

    pub(crate) struct Election {
        pub guardians: Vec<Guardian>,
        pub internal: InternalManifest,
        pub context: CiphertextElectionContext,
    }

    /// Run a complete key ceremony and build the election context.
    pub(crate) fn run_ceremony(n: usize, k: usize) -> Election {
        use_test_constants();
        let internal = InternalManifest::new(&simple_manifest());
        let mut mediator = KeyCeremonyMediator::new(
            "mediator",
            CeremonyDetails {
                number_of_guardians: n,
                quorum: k,
            },
        );
        let mut guardians: Vec<Guardian> = (1..=n)
            .map(|i| Guardian::new(&format!("guardian-{i}"), i as u32, n, k).unwrap())
            .collect();

        for guardian in &guardians {
            mediator
                .receive(KeyCeremonyMessage::PublicKeyAnnounce(guardian.share_key()))
                .unwrap();
        }
        for guardian in guardians.iter_mut() {
            for key in mediator.share_announced() {
                if key.owner_id != guardian.id() {
                    guardian.save_guardian_key(key).unwrap();
                }
            }
        }
        for guardian in guardians.iter_mut() {
            guardian.generate_election_partial_key_backups().unwrap();
            for backup in guardian.share_election_partial_key_backups() {
                if backup.designated_id != backup.owner_id {
                    mediator
                        .receive(KeyCeremonyMessage::BackupSend(backup))
                        .unwrap();
                }
            }
        }
        for guardian in guardians.iter_mut() {
            for backup in mediator.share_backups(guardian.id()) {
                guardian.save_election_partial_key_backup(backup);
            }
        }
        for guardian in &guardians {
            for other_id in (1..=n).map(|i| format!("guardian-{i}")) {
                if other_id != guardian.id() {
                    let verification = guardian
                        .verify_election_partial_key_backup(&other_id)
                        .unwrap();
                    mediator
                        .receive(KeyCeremonyMessage::BackupVerify(verification))
                        .unwrap();
                }
            }
        }
        let joint_key = mediator.publish_joint_key().unwrap();
        let context = make_ciphertext_election_context(
            n,
            k,
            joint_key.joint_public_key,
            joint_key.commitment_hash,
            internal.manifest_hash.clone(),
        )
        .unwrap();
        Election {
            guardians,
            internal,
            context,
        }
    }

    pub(crate) fn cast_ballot(
        election: &Election,
        ballot_id: &str,
        selection_id: &str,
        state: BallotBoxState,
    ) -> SubmittedBallot {
        let ballot = PlaintextBallot {
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
        };
        let encrypted = encrypt_ballot(
            &ballot,
            &election.internal,
            &election.context,
            &rand_q(),
            None,
        )
        .unwrap();
        SubmittedBallot::from_ciphertext_ballot(encrypted, state)
    }

    #[test]
    fn all_guardians_present_decrypts_the_tally() {
        let election = run_ceremony(3, 2);
        let ballots = vec![
            cast_ballot(&election, "ballot-1", "council-alice", BallotBoxState::Cast),
            cast_ballot(&election, "ballot-2", "council-alice", BallotBoxState::Cast),
            cast_ballot(&election, "ballot-3", "council-bob", BallotBoxState::Cast),
        ];
        let tally =
            crate::tally::tally_ballots(&ballots, &election.internal, &election.context).unwrap();

        let shares: BTreeMap<GuardianId, DecryptionShare> = election
            .guardians
            .iter()
            .map(|g| {
                (
                    g.id().to_string(),
                    compute_decryption_share(g, &tally, &election.context),
                )
            })
            .collect();

        let plaintext =
            decrypt_tally(&tally, &shares, &election.context.crypto_extended_base_hash).unwrap();
        let council = &plaintext.contests["council"];
        assert_eq!(council.selections["council-alice"].tally, 2);
        assert_eq!(council.selections["council-bob"].tally, 1);
        assert_eq!(council.selections["council-carol"].tally, 0);
    }

    #[test]
    fn lagrange_reconstruction_replaces_a_missing_guardian() {
        let election = run_ceremony(3, 2);
        let ballots = vec![
            cast_ballot(&election, "ballot-1", "council-alice", BallotBoxState::Cast),
            cast_ballot(&election, "ballot-2", "council-bob", BallotBoxState::Cast),
        ];
        let tally =
            crate::tally::tally_ballots(&ballots, &election.internal, &election.context).unwrap();

        // Guardian 2 is missing; guardians 1 and 3 decrypt.
        let available = [&election.guardians[0], &election.guardians[2]];
        let missing = &election.guardians[1];

        let mut shares: BTreeMap<GuardianId, DecryptionShare> = available
            .iter()
            .map(|g| {
                (
                    g.id().to_string(),
                    compute_decryption_share(g, &tally, &election.context),
                )
            })
            .collect();

        let available_keys: Vec<ElectionPublicKey> =
            available.iter().map(|g| g.share_key()).collect();
        let lagrange = compute_lagrange_coefficients_for_guardians(&available_keys).unwrap();

        let compensated: BTreeMap<GuardianId, CompensatedDecryptionShare> = available
            .iter()
            .map(|g| {
                (
                    g.id().to_string(),
                    compute_compensated_decryption_share(
                        g,
                        missing.id(),
                        &tally,
                        &election.context,
                    )
                    .unwrap(),
                )
            })
            .collect();

        let reconstructed =
            reconstruct_decryption_share(&missing.share_key(), &compensated, &lagrange).unwrap();
        shares.insert(missing.id().to_string(), reconstructed);

        let plaintext =
            decrypt_tally(&tally, &shares, &election.context.crypto_extended_base_hash).unwrap();
        let council = &plaintext.contests["council"];
        assert_eq!(council.selections["council-alice"].tally, 1);
        assert_eq!(council.selections["council-bob"].tally, 1);
    }

    #[test]
    fn tampered_share_is_rejected_before_combination() {
        let election = run_ceremony(2, 2);
        let ballots = vec![cast_ballot(
            &election,
            "ballot-1",
            "council-carol",
            BallotBoxState::Cast,
        )];
        let tally =
            crate::tally::tally_ballots(&ballots, &election.internal, &election.context).unwrap();

        let mut shares: BTreeMap<GuardianId, DecryptionShare> = election
            .guardians
            .iter()
            .map(|g| {
                (
                    g.id().to_string(),
                    compute_decryption_share(g, &tally, &election.context),
                )
            })
            .collect();

        // Corrupt one share value; its proof no longer verifies.
        let share = shares.get_mut("guardian-1").unwrap();
        let contest = share.contests.get_mut("council").unwrap();
        let selection = contest.selections.get_mut("council-carol").unwrap();
        selection.share = crate::group::g_pow_p(&rand_q());

        assert!(matches!(
            decrypt_tally(&tally, &shares, &election.context.crypto_extended_base_hash),
            Err(Error::ProofVerificationFailed(_))
        ));
    }

    #[test]
    fn spoiled_ballot_decrypts_to_its_plaintext() {
        let election = run_ceremony(2, 2);
        let spoiled = cast_ballot(
            &election,
            "ballot-1",
            "council-alice",
            BallotBoxState::Spoiled,
        );

        let shares: BTreeMap<GuardianId, DecryptionShare> = election
            .guardians
            .iter()
            .map(|g| {
                (
                    g.id().to_string(),
                    compute_decryption_share_for_ballot(g, &spoiled, &election.context),
                )
            })
            .collect();

        let plaintext =
            decrypt_ballot(&spoiled, &shares, &election.context.crypto_extended_base_hash)
                .unwrap();
        let council = &plaintext.contests["council"];
        assert_eq!(council.selections["council-alice"].tally, 1);
        assert_eq!(council.selections["council-bob"].tally, 0);
        // Placeholders don't appear in the decrypted ballot.
        assert!(!council
            .selections
            .contains_key("council-placeholder-0"));
    }
}
