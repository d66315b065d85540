use thiserror::Error;

/// Error types
///
/// Every operation that can fail on adversarial input returns one of these
/// variants; none of them are signalled by panicking.
#[derive(Debug, Error)]
pub enum Error {
    #[error("electionguard: invalid element: {0}")]
    InvalidElement(String),

    #[error("electionguard: element is not a member of the order-q subgroup")]
    SubgroupViolation,

    #[error("electionguard: elgamal secret keys must be in [2, Q)")]
    WeakSecret,

    #[error("electionguard: elgamal encryption requires a non-zero nonce")]
    BadNonce,

    #[error("electionguard: unknown selection or contest: {0}")]
    UnknownSelection(String),

    #[error("electionguard: contest {contest_id} is over-voted: {votes} votes for a limit of {limit}")]
    OverVote {
        contest_id: String,
        votes: u32,
        limit: u32,
    },

    #[error("electionguard: ballot style mismatch: expected {expected}, got {actual}")]
    WrongStyle { expected: String, actual: String },

    #[error("electionguard: proof verification failed: {0}")]
    ProofVerificationFailed(String),

    #[error("electionguard: partial key backup from {owner_id} to {designated_id} failed verification")]
    BackupVerificationFailed {
        owner_id: String,
        designated_id: String,
    },

    #[error("electionguard: duplicate guardian sequence order: {0}")]
    DuplicateSequenceOrder(u32),

    #[error("electionguard: duplicate guardian id: {0}")]
    DuplicateGuardianId(String),

    #[error("electionguard: quorum unmet: {available} guardians available, {quorum} required")]
    QuorumUnmet { available: usize, quorum: usize },

    #[error("electionguard: ballot {0} has already been tallied")]
    DuplicateBallot(String),

    #[error("electionguard: discrete log exceeds the maximum of {0}")]
    TallyOutOfRange(u64),

    #[error("electionguard: invariant violation: {0}")]
    InvariantViolation(String),

    #[error("electionguard: JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("electionguard: io error: {0}")]
    Io(#[from] std::io::Error),
}
