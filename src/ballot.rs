//! Plaintext and encrypted ballots.
//!
//! A ballot moves through three representations: the voter's plaintext
//! selections, the ciphertext ballot produced by encryption (selections,
//! proofs, and chained hashes), and the submitted ballot, which is the
//! ciphertext ballot frozen with a cast-or-spoiled tag and its nonces
//! stripped.

use serde::{Deserialize, Serialize};

use crate::chaum_pedersen::{
    make_constant_chaum_pedersen, make_disjunctive_chaum_pedersen, ConstantChaumPedersenProof,
    DisjunctiveChaumPedersenProof,
};
use crate::elgamal::{elgamal_add, ElGamalCiphertext};
use crate::error::Error;
use crate::group::{add_q, ElementModP, ElementModQ};
use crate::hash::{CryptoHashable, HashInput};
use crate::hash_elems;

pub type BallotId = String;

/// An individual selection on a plaintext ballot: 1 for chosen, 0 for not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextBallotSelection {
    pub object_id: String,
    pub vote: u32,
    #[serde(default)]
    pub is_placeholder_selection: bool,
}

impl PlaintextBallotSelection {
    pub fn is_valid(&self, expected_object_id: &str) -> bool {
        if self.object_id != expected_object_id {
            log::warn!(
                "invalid object_id: expected({}) actual({})",
                expected_object_id,
                self.object_id
            );
            return false;
        }
        self.vote <= 1
    }
}

/// The selections a voter made in one contest. A partial representation is
/// fine: missing selections encrypt as zeros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextBallotContest {
    pub object_id: String,
    pub ballot_selections: Vec<PlaintextBallotSelection>,
}

/// A voter's selections for a given ballot style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextBallot {
    pub object_id: BallotId,
    pub style_id: String,
    pub contests: Vec<PlaintextBallotContest>,
}

/// An encrypted selection, its disjunctive proof, and its chained hash.
///
/// The `nonce` is sensitive: with it (or the ballot's master nonce) the
/// encryption and proof can be regenerated bit for bit, which is what makes
/// spoiled-ballot audits possible. It never survives submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextBallotSelection {
    pub object_id: String,
    pub sequence_order: u32,
    pub description_hash: ElementModQ,
    pub ciphertext: ElGamalCiphertext,
    pub crypto_hash: ElementModQ,
    #[serde(default)]
    pub is_placeholder_selection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<ElementModQ>,
    pub proof: DisjunctiveChaumPedersenProof,
}

impl CiphertextBallotSelection {
    /// The rolled-up hash: the description hash and the ciphertext, but not
    /// the proof, so proofs can be regenerated without changing the chain.
    pub fn crypto_hash_with(
        seed_hash: &ElementModQ,
        ciphertext: &ElGamalCiphertext,
    ) -> ElementModQ {
        hash_elems![seed_hash, &ciphertext.crypto_hash()]
    }

    /// Validate the encryption against a seed hash and the election keys.
    pub fn is_valid_encryption(
        &self,
        seed_hash: &ElementModQ,
        elgamal_public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        if *seed_hash != self.description_hash {
            log::warn!(
                "mismatching selection hash for {}: expected({:?}) actual({:?})",
                self.object_id,
                seed_hash,
                self.description_hash
            );
            return false;
        }
        let recalculated = Self::crypto_hash_with(seed_hash, &self.ciphertext);
        if self.crypto_hash != recalculated {
            log::warn!("mismatching selection crypto hash for {}", self.object_id);
            return false;
        }
        self.proof.is_valid(
            &self.ciphertext,
            elgamal_public_key,
            crypto_extended_base_hash,
        )
    }
}

/// Construct a `CiphertextBallotSelection`, filling in the chained hash and
/// the disjunctive proof.
#[allow(clippy::too_many_arguments)]
pub fn make_ciphertext_ballot_selection(
    object_id: String,
    sequence_order: u32,
    description_hash: ElementModQ,
    ciphertext: ElGamalCiphertext,
    elgamal_public_key: &ElementModP,
    crypto_extended_base_hash: &ElementModQ,
    proof_seed: &ElementModQ,
    selection_representation: u32,
    is_placeholder_selection: bool,
    nonce: ElementModQ,
) -> Result<CiphertextBallotSelection, Error> {
    let crypto_hash = CiphertextBallotSelection::crypto_hash_with(&description_hash, &ciphertext);
    let proof = make_disjunctive_chaum_pedersen(
        &ciphertext,
        &nonce,
        elgamal_public_key,
        crypto_extended_base_hash,
        proof_seed,
        selection_representation,
    )?;
    Ok(CiphertextBallotSelection {
        object_id,
        sequence_order,
        description_hash,
        ciphertext,
        crypto_hash,
        is_placeholder_selection,
        nonce: Some(nonce),
        proof,
    })
}

/// An encrypted contest: every selection (real and placeholder), the
/// constant proof over their homomorphic sum, and the chained hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextBallotContest {
    pub object_id: String,
    pub sequence_order: u32,
    pub description_hash: ElementModQ,
    pub ballot_selections: Vec<CiphertextBallotSelection>,
    pub crypto_hash: ElementModQ,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<ElementModQ>,
    pub proof: ConstantChaumPedersenProof,
}

impl CiphertextBallotContest {
    pub fn crypto_hash_with(
        seed_hash: &ElementModQ,
        ballot_selections: &[CiphertextBallotSelection],
    ) -> ElementModQ {
        let selection_hashes: Vec<HashInput> = ballot_selections
            .iter()
            .map(|s| HashInput::from(&s.crypto_hash))
            .collect();
        hash_elems![seed_hash, selection_hashes]
    }

    /// The sum of the selection nonces, usable to regenerate the constant
    /// proof. Available only while the selections still carry their nonces.
    pub fn aggregate_nonce(&self) -> Result<ElementModQ, Error> {
        let mut nonces = Vec::with_capacity(self.ballot_selections.len());
        for selection in &self.ballot_selections {
            nonces.push(selection.nonce.as_ref().ok_or_else(|| {
                Error::InvariantViolation(
                    "cannot aggregate nonces after they have been discarded".to_string(),
                )
            })?);
        }
        Ok(add_q(&nonces))
    }

    /// The homomorphic sum of all selections, placeholders included.
    pub fn elgamal_accumulate(&self) -> Result<ElGamalCiphertext, Error> {
        let ciphertexts: Vec<&ElGamalCiphertext> = self
            .ballot_selections
            .iter()
            .map(|s| &s.ciphertext)
            .collect();
        elgamal_add(&ciphertexts)
    }

    /// Validate the contest: hash chain and the constant proof over the
    /// accumulated sum. Individual selection proofs are checked at the
    /// ballot level.
    pub fn is_valid_encryption(
        &self,
        seed_hash: &ElementModQ,
        elgamal_public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        if *seed_hash != self.description_hash {
            log::warn!("mismatching contest hash for {}", self.object_id);
            return false;
        }
        let recalculated = Self::crypto_hash_with(seed_hash, &self.ballot_selections);
        if self.crypto_hash != recalculated {
            log::warn!("mismatching contest crypto hash for {}", self.object_id);
            return false;
        }
        let accumulation = match self.elgamal_accumulate() {
            Ok(accumulation) => accumulation,
            Err(_) => return false,
        };
        self.proof.is_valid(
            &accumulation,
            elgamal_public_key,
            crypto_extended_base_hash,
        )
    }
}

/// Construct a `CiphertextBallotContest`, accumulating the selections and
/// attaching the constant proof that they sum to the selection limit.
#[allow(clippy::too_many_arguments)]
pub fn make_ciphertext_ballot_contest(
    object_id: String,
    sequence_order: u32,
    description_hash: ElementModQ,
    ballot_selections: Vec<CiphertextBallotSelection>,
    elgamal_public_key: &ElementModP,
    crypto_extended_base_hash: &ElementModQ,
    proof_seed: &ElementModQ,
    selection_limit: u32,
    nonce: ElementModQ,
) -> Result<CiphertextBallotContest, Error> {
    let crypto_hash =
        CiphertextBallotContest::crypto_hash_with(&description_hash, &ballot_selections);
    let contest = CiphertextBallotContest {
        object_id,
        sequence_order,
        description_hash,
        ballot_selections,
        crypto_hash,
        nonce: Some(nonce),
        proof: ConstantChaumPedersenProof {
            // replaced below once the aggregate is known
            pad: ElementModP::one(),
            data: ElementModP::one(),
            challenge: ElementModQ::zero(),
            response: ElementModQ::zero(),
            constant: selection_limit,
        },
    };
    let aggregate = contest.elgamal_accumulate()?;
    let aggregate_nonce = contest.aggregate_nonce()?;
    let proof = make_constant_chaum_pedersen(
        &aggregate,
        selection_limit,
        &aggregate_nonce,
        elgamal_public_key,
        proof_seed,
        crypto_extended_base_hash,
    );
    Ok(CiphertextBallotContest { proof, ..contest })
}

/// An encrypted ballot: its contests, the chained ballot hash, and the
/// tracking code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextBallot {
    pub object_id: BallotId,
    pub style_id: String,
    pub manifest_hash: ElementModQ,
    pub code_seed: ElementModQ,
    pub contests: Vec<CiphertextBallotContest>,
    pub code: ElementModQ,
    pub crypto_hash: ElementModQ,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<ElementModQ>,
}

impl CiphertextBallot {
    /// The seed all of a ballot's nonces derive from: binds the manifest,
    /// the external ballot id, and the master nonce.
    pub fn nonce_seed(
        manifest_hash: &ElementModQ,
        object_id: &str,
        nonce: &ElementModQ,
    ) -> ElementModQ {
        hash_elems![manifest_hash, object_id, nonce]
    }

    pub fn crypto_hash_with(
        style_id: &str,
        manifest_hash: &ElementModQ,
        contests: &[CiphertextBallotContest],
    ) -> ElementModQ {
        let contest_hashes: Vec<HashInput> = contests
            .iter()
            .map(|c| HashInput::from(&c.crypto_hash))
            .collect();
        hash_elems![style_id, manifest_hash, contest_hashes]
    }

    /// Validate the full encryption state: every selection proof and every
    /// contest proof on the ballot.
    pub fn is_valid_encryption(
        &self,
        manifest_hash: &ElementModQ,
        elgamal_public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        if *manifest_hash != self.manifest_hash {
            log::warn!("mismatching ballot manifest hash for {}", self.object_id);
            return false;
        }
        let recalculated =
            Self::crypto_hash_with(&self.style_id, manifest_hash, &self.contests);
        if self.crypto_hash != recalculated {
            log::warn!("mismatching ballot crypto hash for {}", self.object_id);
            return false;
        }
        for contest in &self.contests {
            for selection in &contest.ballot_selections {
                if !selection.is_valid_encryption(
                    &selection.description_hash,
                    elgamal_public_key,
                    crypto_extended_base_hash,
                ) {
                    return false;
                }
            }
            if !contest.is_valid_encryption(
                &contest.description_hash,
                elgamal_public_key,
                crypto_extended_base_hash,
            ) {
                return false;
            }
        }
        true
    }
}

/// Construct a `CiphertextBallot`, computing the chained hash and the
/// tracking code.
pub fn make_ciphertext_ballot(
    object_id: BallotId,
    style_id: String,
    manifest_hash: ElementModQ,
    code_seed: ElementModQ,
    contests: Vec<CiphertextBallotContest>,
    nonce: ElementModQ,
) -> CiphertextBallot {
    let crypto_hash = CiphertextBallot::crypto_hash_with(&style_id, &manifest_hash, &contests);
    let code = hash_elems![&code_seed, &crypto_hash];
    CiphertextBallot {
        object_id,
        style_id,
        manifest_hash,
        code_seed,
        contests,
        code,
        crypto_hash,
        nonce: Some(nonce),
    }
}

/// The state of a submitted ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BallotBoxState {
    Cast,
    Spoiled,
    Unknown,
}

/// A ballot that has been explicitly cast or spoiled. Immutable after
/// submission; the state is a tag, and the master nonce and every derived
/// nonce are removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedBallot {
    #[serde(flatten)]
    pub ballot: CiphertextBallot,
    pub state: BallotBoxState,
}

impl SubmittedBallot {
    pub fn object_id(&self) -> &str {
        &self.ballot.object_id
    }

    /// Freeze a ciphertext ballot into a submitted ballot, stripping the
    /// master nonce and every per-contest and per-selection nonce.
    pub fn from_ciphertext_ballot(ballot: CiphertextBallot, state: BallotBoxState) -> Self {
        let mut ballot = ballot;
        ballot.nonce = None;
        for contest in &mut ballot.contests {
            contest.nonce = None;
            for selection in &mut contest.ballot_selections {
                selection.nonce = None;
            }
        }
        SubmittedBallot { ballot, state }
    }
}

impl CryptoHashable for CiphertextBallot {
    fn crypto_hash(&self) -> ElementModQ {
        self.crypto_hash.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::use_test_constants;
    use crate::elgamal::{elgamal_encrypt, elgamal_keypair_random};
    use crate::group::{rand_q, rand_range_q};

    fn selection(
        object_id: &str,
        sequence_order: u32,
        vote: u32,
        k: &ElementModP,
        q_bar: &ElementModQ,
    ) -> CiphertextBallotSelection {
        let description_hash = rand_q();
        let nonce = rand_range_q(&ElementModQ::one());
        let ciphertext = elgamal_encrypt(vote as u64, &nonce, k).unwrap();
        make_ciphertext_ballot_selection(
            object_id.to_string(),
            sequence_order,
            description_hash,
            ciphertext,
            k,
            q_bar,
            &rand_q(),
            vote,
            false,
            nonce,
        )
        .unwrap()
    }

    #[test]
    fn selections_validate_and_detect_tampering() {
        use_test_constants();
        let keys = elgamal_keypair_random();
        let q_bar = rand_q();
        let mut encrypted = selection("s1", 0, 1, &keys.public_key, &q_bar);
        let seed = encrypted.description_hash.clone();
        assert!(encrypted.is_valid_encryption(&seed, &keys.public_key, &q_bar));

        // Flip the data component; the proof and hash chain both break.
        encrypted.ciphertext.data = crate::group::g_pow_p(&rand_q());
        assert!(!encrypted.is_valid_encryption(&seed, &keys.public_key, &q_bar));
    }

    #[test]
    fn contest_sum_proof_covers_placeholders() {
        use_test_constants();
        let keys = elgamal_keypair_random();
        let q_bar = rand_q();
        // One real affirmative vote plus a zero placeholder, limit 1.
        let selections = vec![
            selection("s1", 0, 1, &keys.public_key, &q_bar),
            selection("s1-placeholder-0", 1, 0, &keys.public_key, &q_bar),
        ];
        let description_hash = rand_q();
        let contest = make_ciphertext_ballot_contest(
            "c1".to_string(),
            0,
            description_hash.clone(),
            selections,
            &keys.public_key,
            &q_bar,
            &rand_q(),
            1,
            rand_q(),
        )
        .unwrap();
        assert!(contest.is_valid_encryption(&description_hash, &keys.public_key, &q_bar));
    }

    #[test]
    fn submission_strips_nonces() {
        use_test_constants();
        let keys = elgamal_keypair_random();
        let q_bar = rand_q();
        let selections = vec![selection("s1", 0, 1, &keys.public_key, &q_bar)];
        let description_hash = rand_q();
        let contest = make_ciphertext_ballot_contest(
            "c1".to_string(),
            0,
            description_hash,
            selections,
            &keys.public_key,
            &q_bar,
            &rand_q(),
            1,
            rand_q(),
        )
        .unwrap();
        let ballot = make_ciphertext_ballot(
            "ballot-1".to_string(),
            "style-1".to_string(),
            rand_q(),
            rand_q(),
            vec![contest],
            rand_q(),
        );
        let submitted = SubmittedBallot::from_ciphertext_ballot(ballot, BallotBoxState::Cast);
        assert!(submitted.ballot.nonce.is_none());
        for contest in &submitted.ballot.contests {
            assert!(contest.nonce.is_none());
            for selection in &contest.ballot_selections {
                assert!(selection.nonce.is_none());
            }
        }
    }

    #[test]
    fn submitted_ballots_round_trip_through_json() {
        use_test_constants();
        let keys = elgamal_keypair_random();
        let q_bar = rand_q();
        let selections = vec![selection("s1", 0, 0, &keys.public_key, &q_bar)];
        let contest = make_ciphertext_ballot_contest(
            "c1".to_string(),
            0,
            rand_q(),
            selections,
            &keys.public_key,
            &q_bar,
            &rand_q(),
            0,
            rand_q(),
        )
        .unwrap();
        let ballot = make_ciphertext_ballot(
            "ballot-1".to_string(),
            "style-1".to_string(),
            rand_q(),
            rand_q(),
            vec![contest],
            rand_q(),
        );
        let submitted = SubmittedBallot::from_ciphertext_ballot(ballot, BallotBoxState::Spoiled);
        let json = serde_json::to_string(&submitted).unwrap();
        let back: SubmittedBallot = serde_json::from_str(&json).unwrap();
        assert_eq!(submitted, back);
    }
}
