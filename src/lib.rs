//! ElectionGuard: a cryptographic toolkit for end-to-end verifiable
//! elections.
//!
//! Voters' selections are encrypted with an additively-homomorphic ElGamal
//! scheme over a large prime-order subgroup; encrypted ballots are
//! homomorphically summed and cooperatively decrypted by a threshold quorum
//! of guardians without ever decrypting an individual cast ballot. Every
//! artifact carries non-interactive zero-knowledge proofs, so any third
//! party can verify the tally from the published election record.

pub mod ballot;
pub mod chaum_pedersen;
pub mod constants;
pub mod decryption;
pub mod decryption_mediator;
pub mod dlog;
pub mod election;
pub mod elgamal;
pub mod encrypt;
pub mod error;
pub mod group;
pub mod guardian;
pub mod hash;
pub mod key_ceremony;
pub mod key_ceremony_mediator;
pub mod manifest;
pub mod nonces;
pub mod polynomial;
pub mod record;
pub mod schnorr;
pub mod tally;

pub use ballot::*;
pub use chaum_pedersen::*;
pub use constants::{get_constants, use_test_constants, ElectionConstants, PrimeOption};
pub use decryption::*;
pub use decryption_mediator::*;
pub use dlog::{discrete_log, discrete_log_default, effective_max_exponent};
pub use election::*;
pub use elgamal::*;
pub use encrypt::*;
pub use error::Error;
pub use group::*;
pub use guardian::*;
pub use hash::{hash_elems, CryptoHashable, HashInput};
pub use key_ceremony::*;
pub use key_ceremony_mediator::*;
pub use manifest::*;
pub use nonces::Nonces;
pub use polynomial::*;
pub use record::*;
pub use schnorr::*;
pub use tally::*;
