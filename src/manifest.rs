//! The internal election manifest.
//!
//! The full election manifest is an external input; the core consumes only
//! the structure that encryption and tallying need: contests with ordered
//! selections and a selection limit, ballot styles naming the contests they
//! carry, and the description hashes that chain into every ballot hash.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::group::ElementModQ;
use crate::hash::{CryptoHashable, HashInput};
use crate::hash_elems;

/// A single option a voter can select within a contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDescription {
    pub object_id: String,
    pub sequence_order: u32,
}

impl CryptoHashable for SelectionDescription {
    fn crypto_hash(&self) -> ElementModQ {
        hash_elems![&self.object_id, self.sequence_order]
    }
}

/// A contest: an ordered list of selections and the number of votes a voter
/// may distribute across them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestDescription {
    pub object_id: String,
    pub sequence_order: u32,
    pub selection_limit: u32,
    pub ballot_selections: Vec<SelectionDescription>,
}

impl CryptoHashable for ContestDescription {
    fn crypto_hash(&self) -> ElementModQ {
        let selection_hashes: Vec<HashInput> = self
            .ballot_selections
            .iter()
            .map(|s| HashInput::from(&s.crypto_hash()))
            .collect();
        hash_elems![
            &self.object_id,
            self.sequence_order,
            self.selection_limit,
            selection_hashes
        ]
    }
}

/// A ballot style, naming the contests that appear on ballots of the style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotStyle {
    pub object_id: String,
    pub contest_ids: Vec<String>,
}

impl CryptoHashable for BallotStyle {
    fn crypto_hash(&self) -> ElementModQ {
        let contest_ids: Vec<HashInput> =
            self.contest_ids.iter().map(HashInput::from).collect();
        hash_elems![&self.object_id, contest_ids]
    }
}

/// The election structure as provided by the external manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub election_scope_id: String,
    pub contests: Vec<ContestDescription>,
    pub ballot_styles: Vec<BallotStyle>,
}

impl CryptoHashable for Manifest {
    fn crypto_hash(&self) -> ElementModQ {
        let contest_hashes: Vec<HashInput> = self
            .contests
            .iter()
            .map(|c| HashInput::from(&c.crypto_hash()))
            .collect();
        let style_hashes: Vec<HashInput> = self
            .ballot_styles
            .iter()
            .map(|s| HashInput::from(&s.crypto_hash()))
            .collect();
        hash_elems![&self.election_scope_id, contest_hashes, style_hashes]
    }
}

/// A contest extended with the placeholder selections that let one constant
/// proof cover the whole contest: real plus placeholder votes always sum to
/// the selection limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestDescriptionWithPlaceholders {
    #[serde(flatten)]
    pub contest: ContestDescription,
    pub placeholder_selections: Vec<SelectionDescription>,
}

impl ContestDescriptionWithPlaceholders {
    pub fn object_id(&self) -> &str {
        &self.contest.object_id
    }

    pub fn selection_for(&self, selection_id: &str) -> Option<&SelectionDescription> {
        self.contest
            .ballot_selections
            .iter()
            .find(|s| s.object_id == selection_id)
    }
}

impl CryptoHashable for ContestDescriptionWithPlaceholders {
    fn crypto_hash(&self) -> ElementModQ {
        self.contest.crypto_hash()
    }
}

/// Add one placeholder selection per seat in the contest.
pub fn generate_placeholder_selections(
    contest: &ContestDescription,
) -> ContestDescriptionWithPlaceholders {
    let max_sequence_order = contest
        .ballot_selections
        .iter()
        .map(|s| s.sequence_order)
        .max()
        .unwrap_or(0);
    let placeholders = (0..contest.selection_limit)
        .map(|i| SelectionDescription {
            object_id: format!("{}-placeholder-{}", contest.object_id, i),
            sequence_order: max_sequence_order + 1 + i,
        })
        .collect();
    ContestDescriptionWithPlaceholders {
        contest: contest.clone(),
        placeholder_selections: placeholders,
    }
}

/// The manifest form the encryption and tally paths consume: contests carry
/// their placeholders and the manifest hash is precomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalManifest {
    pub manifest_hash: ElementModQ,
    pub ballot_styles: Vec<BallotStyle>,
    pub contests: Vec<ContestDescriptionWithPlaceholders>,
}

impl InternalManifest {
    pub fn new(manifest: &Manifest) -> Self {
        InternalManifest {
            manifest_hash: manifest.crypto_hash(),
            ballot_styles: manifest.ballot_styles.clone(),
            contests: manifest
                .contests
                .iter()
                .map(generate_placeholder_selections)
                .collect(),
        }
    }

    pub fn get_ballot_style(&self, style_id: &str) -> Option<&BallotStyle> {
        self.ballot_styles.iter().find(|s| s.object_id == style_id)
    }

    /// The contests on ballots of the given style, in manifest order.
    pub fn get_contests_for(&self, style_id: &str) -> Result<Vec<&ContestDescriptionWithPlaceholders>, Error> {
        let style = self
            .get_ballot_style(style_id)
            .ok_or_else(|| Error::WrongStyle {
                expected: "a style defined in the manifest".to_string(),
                actual: style_id.to_string(),
            })?;
        Ok(self
            .contests
            .iter()
            .filter(|c| style.contest_ids.contains(&c.contest.object_id))
            .collect())
    }

    pub fn get_contest(&self, contest_id: &str) -> Option<&ContestDescriptionWithPlaceholders> {
        self.contests.iter().find(|c| c.contest.object_id == contest_id)
    }
}

#[cfg(test)]
pub(crate) mod test_manifests {
    use super::*;

    /// A one-contest election with three candidates and a single vote.
    pub(crate) fn simple_manifest() -> Manifest {
        Manifest {
            election_scope_id: "county-council-2024".to_string(),
            contests: vec![ContestDescription {
                object_id: "council".to_string(),
                sequence_order: 0,
                selection_limit: 1,
                ballot_selections: vec![
                    SelectionDescription {
                        object_id: "council-alice".to_string(),
                        sequence_order: 0,
                    },
                    SelectionDescription {
                        object_id: "council-bob".to_string(),
                        sequence_order: 1,
                    },
                    SelectionDescription {
                        object_id: "council-carol".to_string(),
                        sequence_order: 2,
                    },
                ],
            }],
            ballot_styles: vec![BallotStyle {
                object_id: "style-1".to_string(),
                contest_ids: vec!["council".to_string()],
            }],
        }
    }

    /// A two-contest election; the second contest elects two of three.
    pub(crate) fn two_contest_manifest() -> Manifest {
        let mut manifest = simple_manifest();
        manifest.contests.push(ContestDescription {
            object_id: "school-board".to_string(),
            sequence_order: 1,
            selection_limit: 2,
            ballot_selections: vec![
                SelectionDescription {
                    object_id: "school-dan".to_string(),
                    sequence_order: 0,
                },
                SelectionDescription {
                    object_id: "school-erin".to_string(),
                    sequence_order: 1,
                },
                SelectionDescription {
                    object_id: "school-frank".to_string(),
                    sequence_order: 2,
                },
            ],
        });
        manifest.ballot_styles[0]
            .contest_ids
            .push("school-board".to_string());
        manifest
    }
}
