//! Ballot encryption.
//!
//! Every nonce on a ballot derives deterministically from one master nonce
//! and the description hashes of the things being encrypted, so a ballot can
//! be re-encrypted bit for bit for an audit. Each contest gains one
//! placeholder selection per seat, set so that real plus placeholder votes
//! always sum to the selection limit; one constant proof per contest then
//! enforces the limit.

use serde::{Deserialize, Serialize};

use crate::ballot::{
    make_ciphertext_ballot, make_ciphertext_ballot_contest, make_ciphertext_ballot_selection,
    CiphertextBallot, CiphertextBallotContest, CiphertextBallotSelection, PlaintextBallot,
    PlaintextBallotContest, PlaintextBallotSelection,
};
use crate::election::CiphertextElectionContext;
use crate::elgamal::elgamal_encrypt;
use crate::error::Error;
use crate::group::{rand_q, ElementModQ};
use crate::hash::CryptoHashable;
use crate::hash_elems;
use crate::manifest::{
    ContestDescriptionWithPlaceholders, InternalManifest, SelectionDescription,
};
use crate::nonces::Nonces;

/// Metadata for the device performing encryption; its hash seeds the ballot
/// code chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionDevice {
    /// Unique identifier for the device
    pub device_id: u64,

    /// Identifies the session on the device
    pub session_id: u64,

    /// Election initialization value
    pub launch_code: u64,

    /// Arbitrary string designating the location of the device
    pub location: String,
}

impl EncryptionDevice {
    pub fn get_hash(&self) -> ElementModQ {
        hash_elems![
            self.device_id,
            self.session_id,
            self.launch_code,
            &self.location
        ]
    }
}

/// Caches election state and chains each encrypted ballot's tracking code
/// into the next ballot's encryption seed.
pub struct EncryptionMediator<'a> {
    internal_manifest: &'a InternalManifest,
    context: &'a CiphertextElectionContext,
    encryption_seed: ElementModQ,
}

impl<'a> EncryptionMediator<'a> {
    pub fn new(
        internal_manifest: &'a InternalManifest,
        context: &'a CiphertextElectionContext,
        encryption_device: &EncryptionDevice,
    ) -> Self {
        EncryptionMediator {
            internal_manifest,
            context,
            encryption_seed: encryption_device.get_hash(),
        }
    }

    /// Encrypt the given ballot with a fresh master nonce.
    pub fn encrypt(&mut self, ballot: &PlaintextBallot) -> Result<CiphertextBallot, Error> {
        let encrypted = encrypt_ballot(
            ballot,
            self.internal_manifest,
            self.context,
            &self.encryption_seed,
            None,
        )?;
        self.encryption_seed = encrypted.code.clone();
        Ok(encrypted)
    }
}

/// Construct a `PlaintextBallotSelection` from its description, for filling
/// unvoted selections and placeholders.
pub fn selection_from(
    description: &SelectionDescription,
    is_placeholder: bool,
    is_affirmative: bool,
) -> PlaintextBallotSelection {
    PlaintextBallotSelection {
        object_id: description.object_id.clone(),
        vote: u32::from(is_affirmative),
        is_placeholder_selection: is_placeholder,
    }
}

/// Construct an all-false `PlaintextBallotContest` from its description, for
/// contests the voter skipped entirely.
pub fn contest_from(description: &ContestDescriptionWithPlaceholders) -> PlaintextBallotContest {
    PlaintextBallotContest {
        object_id: description.contest.object_id.clone(),
        ballot_selections: description
            .contest
            .ballot_selections
            .iter()
            .map(|selection| selection_from(selection, false, false))
            .collect(),
    }
}

/// Encrypt a single selection: derive its nonce from the description hash
/// and the contest nonce, encrypt, and attach the disjunctive proof.
pub fn encrypt_selection(
    selection: &PlaintextBallotSelection,
    description: &SelectionDescription,
    context: &CiphertextElectionContext,
    nonce_seed: &ElementModQ,
    is_placeholder: bool,
) -> Result<CiphertextBallotSelection, Error> {
    if !selection.is_valid(&description.object_id) {
        return Err(Error::UnknownSelection(selection.object_id.clone()));
    }

    let description_hash = description.crypto_hash();
    let nonce_sequence = Nonces::with_element_header(&description_hash, nonce_seed);
    let selection_nonce = nonce_sequence.get(description.sequence_order as u64);
    let proof_seed = nonce_sequence.get(0);

    log::info!(
        "encrypt_selection: for {} hash: {}",
        description.object_id,
        description_hash.to_hex()
    );

    let ciphertext = elgamal_encrypt(
        selection.vote as u64,
        &selection_nonce,
        &context.elgamal_public_key,
    )?;

    make_ciphertext_ballot_selection(
        selection.object_id.clone(),
        description.sequence_order,
        description_hash,
        ciphertext,
        &context.elgamal_public_key,
        &context.crypto_extended_base_hash,
        &proof_seed,
        selection.vote,
        is_placeholder,
        selection_nonce,
    )
}

/// Encrypt a single contest: every described selection (explicit false for
/// anything unvoted), placeholders filled so the total equals the selection
/// limit, and the constant proof over the sum.
pub fn encrypt_contest(
    contest: &PlaintextBallotContest,
    description: &ContestDescriptionWithPlaceholders,
    context: &CiphertextElectionContext,
    nonce_seed: &ElementModQ,
) -> Result<CiphertextBallotContest, Error> {
    // Reject selections that don't belong to this contest, and over-votes,
    // before any encryption happens.
    let mut votes = 0u32;
    for selection in &contest.ballot_selections {
        if description.selection_for(&selection.object_id).is_none() {
            return Err(Error::UnknownSelection(selection.object_id.clone()));
        }
        if selection.vote > 1 {
            return Err(Error::OverVote {
                contest_id: contest.object_id.clone(),
                votes: selection.vote,
                limit: 1,
            });
        }
        votes += selection.vote;
    }
    let limit = description.contest.selection_limit;
    if votes > limit {
        return Err(Error::OverVote {
            contest_id: contest.object_id.clone(),
            votes,
            limit,
        });
    }

    let contest_description_hash = description.crypto_hash();
    let nonce_sequence = Nonces::with_element_header(&contest_description_hash, nonce_seed);
    let contest_nonce = nonce_sequence.get(description.contest.sequence_order as u64);
    let proof_seed = nonce_sequence.get(0);

    let mut encrypted_selections = Vec::new();
    let mut selection_count = 0u32;

    for selection_description in &description.contest.ballot_selections {
        let voted = contest
            .ballot_selections
            .iter()
            .find(|s| s.object_id == selection_description.object_id);
        let plaintext = match voted {
            Some(selection) => {
                selection_count += selection.vote;
                selection.clone()
            }
            None => selection_from(selection_description, false, false),
        };
        encrypted_selections.push(encrypt_selection(
            &plaintext,
            selection_description,
            context,
            &contest_nonce,
            false,
        )?);
    }

    // One placeholder per seat; affirmative until the limit is reached, so
    // real plus placeholder votes always sum to the limit.
    for placeholder in &description.placeholder_selections {
        let select_placeholder = selection_count < limit;
        if select_placeholder {
            selection_count += 1;
        }
        encrypted_selections.push(encrypt_selection(
            &selection_from(placeholder, true, select_placeholder),
            placeholder,
            context,
            &contest_nonce,
            true,
        )?);
    }

    make_ciphertext_ballot_contest(
        contest.object_id.clone(),
        description.contest.sequence_order,
        contest_description_hash,
        encrypted_selections,
        &context.elgamal_public_key,
        &context.crypto_extended_base_hash,
        &proof_seed,
        limit,
        contest_nonce,
    )
}

/// Encrypt a ballot.
///
/// The ballot may be partial: contests the voter skipped are filled with
/// explicit false selections. Passing the same `nonce` re-produces the
/// identical ciphertext ballot.
pub fn encrypt_ballot(
    ballot: &PlaintextBallot,
    internal_manifest: &InternalManifest,
    context: &CiphertextElectionContext,
    encryption_seed: &ElementModQ,
    nonce: Option<ElementModQ>,
) -> Result<CiphertextBallot, Error> {
    let style = internal_manifest
        .get_ballot_style(&ballot.style_id)
        .ok_or_else(|| Error::WrongStyle {
            expected: "a style defined in the manifest".to_string(),
            actual: ballot.style_id.clone(),
        })?;
    let style_contests = internal_manifest.get_contests_for(&style.object_id)?;

    // Contests on the ballot must belong to its style.
    for contest in &ballot.contests {
        if !style_contests
            .iter()
            .any(|c| c.object_id() == contest.object_id)
        {
            return Err(Error::UnknownSelection(contest.object_id.clone()));
        }
    }

    let master_nonce = nonce.unwrap_or_else(rand_q);
    let nonce_seed = CiphertextBallot::nonce_seed(
        &internal_manifest.manifest_hash,
        &ballot.object_id,
        &master_nonce,
    );

    log::info!(
        "encrypt_ballot: {} seed: {}",
        ballot.object_id,
        encryption_seed.to_hex()
    );

    let mut encrypted_contests = Vec::new();
    for description in style_contests {
        let use_contest = ballot
            .contests
            .iter()
            .find(|c| c.object_id == description.object_id())
            .cloned()
            .unwrap_or_else(|| contest_from(description));
        encrypted_contests.push(encrypt_contest(
            &use_contest,
            description,
            context,
            &nonce_seed,
        )?);
    }

    Ok(make_ciphertext_ballot(
        ballot.object_id.clone(),
        ballot.style_id.clone(),
        internal_manifest.manifest_hash.clone(),
        encryption_seed.clone(),
        encrypted_contests,
        master_nonce,
    ))
}
