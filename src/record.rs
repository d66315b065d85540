//! The election record.
//!
//! The single collection of public artifacts from which any third party can
//! verify the election: constants, manifest, context, guardian records,
//! every submitted ballot, the ciphertext tally, the plaintext tally with
//! all shares and proofs, and the decrypted spoiled ballots. Serialized as
//! canonical JSON: UTF-8, object keys in lexicographic order.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ballot::{BallotId, SubmittedBallot};
use crate::constants::ElectionConstants;
use crate::decryption::{LagrangeCoefficientsRecord, PlaintextTally};
use crate::election::CiphertextElectionContext;
use crate::error::Error;
use crate::guardian::GuardianRecord;
use crate::manifest::Manifest;
use crate::tally::PublishedCiphertextTally;

/// Everything a verifier needs, in one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionRecord {
    pub constants: ElectionConstants,
    pub manifest: Manifest,
    pub context: CiphertextElectionContext,
    pub guardian_records: Vec<GuardianRecord>,
    pub submitted_ballots: Vec<SubmittedBallot>,
    pub ciphertext_tally: PublishedCiphertextTally,

    /// Present when missing guardians were compensated during decryption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lagrange_coefficients: Option<LagrangeCoefficientsRecord>,

    pub plaintext_tally: PlaintextTally,
    pub spoiled_ballots: BTreeMap<BallotId, PlaintextTally>,
}

impl ElectionRecord {
    /// Serialize to canonical JSON: keys sorted within every object.
    pub fn to_canonical_json(&self) -> Result<String, Error> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string(&value)?)
    }

    pub fn from_json(input: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(input)?)
    }

    /// Write the record to a directory as its constituent files.
    pub fn publish(&self, directory: &Path) -> Result<(), Error> {
        fs::create_dir_all(directory)?;
        write_json(&directory.join("manifest.json"), &self.manifest)?;
        write_json(&directory.join("constants.json"), &self.constants)?;
        write_json(&directory.join("context.json"), &self.context)?;
        for record in &self.guardian_records {
            write_json(
                &directory.join(format!("guardian_record.{}.json", record.guardian_id)),
                record,
            )?;
        }
        for ballot in &self.submitted_ballots {
            write_json(
                &directory.join(format!("encrypted_ballot.{}.json", ballot.object_id())),
                ballot,
            )?;
        }
        write_json(&directory.join("encrypted_tally.json"), &self.ciphertext_tally)?;
        if let Some(coefficients) = &self.lagrange_coefficients {
            write_json(&directory.join("lagrange_coefficients.json"), coefficients)?;
        }
        write_json(&directory.join("plaintext_tally.json"), &self.plaintext_tally)?;
        for (ballot_id, plaintext) in &self.spoiled_ballots {
            write_json(
                &directory.join(format!("spoiled_ballot.{ballot_id}.json")),
                plaintext,
            )?;
        }
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let canonical = serde_json::to_value(value)?;
    fs::write(path, serde_json::to_string_pretty(&canonical)?)?;
    Ok(())
}
