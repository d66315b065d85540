//! Chaum-Pedersen zero-knowledge proofs.
//!
//! Three variants cover everything the system publishes: the generic proof
//! of equal discrete logs backs decryption shares, the disjunctive proof
//! shows a selection encrypts 0 or 1, and the constant proof shows a contest
//! sums to exactly its selection limit. All are non-interactive with
//! Fiat-Shamir challenges over prescribed transcripts.

use serde::{Deserialize, Serialize};

use crate::elgamal::ElGamalCiphertext;
use crate::group::{
    a_minus_b_q, a_plus_bc_q, add_q, g_pow_p, mult_p, mult_q, negate_q, pow_p, pow_p_secret,
    ElementModP, ElementModQ,
};
use crate::hash_elems;
use crate::nonces::Nonces;

/// A disjunctive Chaum-Pedersen proof that a ciphertext encrypts zero or
/// one: the branch for the actual plaintext is proven, the other branch is
/// simulated, and the two challenges are bound by `c0 + c1 = c`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisjunctiveChaumPedersenProof {
    /// `a0`, commitment pad for the zero branch
    pub proof_zero_pad: ElementModP,
    /// `b0`, commitment data for the zero branch
    pub proof_zero_data: ElementModP,
    /// `a1`, commitment pad for the one branch
    pub proof_one_pad: ElementModP,
    /// `b1`, commitment data for the one branch
    pub proof_one_data: ElementModP,
    /// `c0`, the zero-branch challenge
    pub proof_zero_challenge: ElementModQ,
    /// `c1`, the one-branch challenge
    pub proof_one_challenge: ElementModQ,
    /// `c = H(Q̄, A, B, a0, b0, a1, b1)`
    pub challenge: ElementModQ,
    /// `v0`, the zero-branch response
    pub proof_zero_response: ElementModQ,
    /// `v1`, the one-branch response
    pub proof_one_response: ElementModQ,
}

impl DisjunctiveChaumPedersenProof {
    /// Validate the proof against a ciphertext, the election public key
    /// `k`, and the extended base hash `q_bar`.
    pub fn is_valid(
        &self,
        message: &ElGamalCiphertext,
        k: &ElementModP,
        q_bar: &ElementModQ,
    ) -> bool {
        let alpha = &message.pad;
        let beta = &message.data;
        let a0 = &self.proof_zero_pad;
        let b0 = &self.proof_zero_data;
        let a1 = &self.proof_one_pad;
        let b1 = &self.proof_one_data;
        let c0 = &self.proof_zero_challenge;
        let c1 = &self.proof_one_challenge;
        let c = &self.challenge;
        let v0 = &self.proof_zero_response;
        let v1 = &self.proof_one_response;

        let in_bounds_alpha = alpha.is_valid_residue();
        let in_bounds_beta = beta.is_valid_residue();
        let in_bounds_a0 = a0.is_valid_residue();
        let in_bounds_b0 = b0.is_valid_residue();
        let in_bounds_a1 = a1.is_valid_residue();
        let in_bounds_b1 = b1.is_valid_residue();
        let in_bounds_c0 = c0.is_in_bounds();
        let in_bounds_c1 = c1.is_in_bounds();
        let in_bounds_v0 = v0.is_in_bounds();
        let in_bounds_v1 = v1.is_in_bounds();

        let consistent_c = add_q(&[c0, c1]) == *c
            && *c == hash_elems![q_bar, alpha, beta, a0, b0, a1, b1];
        let consistent_gv0 = g_pow_p(v0) == mult_p(&[a0, &pow_p(alpha, c0)]);
        let consistent_gv1 = g_pow_p(v1) == mult_p(&[a1, &pow_p(alpha, c1)]);
        let consistent_kv0 = pow_p(k, v0) == mult_p(&[b0, &pow_p(beta, c0)]);
        let consistent_gc1kv1 =
            mult_p(&[&g_pow_p(c1), &pow_p(k, v1)]) == mult_p(&[b1, &pow_p(beta, c1)]);

        let success = in_bounds_alpha
            && in_bounds_beta
            && in_bounds_a0
            && in_bounds_b0
            && in_bounds_a1
            && in_bounds_b1
            && in_bounds_c0
            && in_bounds_c1
            && in_bounds_v0
            && in_bounds_v1
            && consistent_c
            && consistent_gv0
            && consistent_gv1
            && consistent_kv0
            && consistent_gc1kv1;

        if !success {
            log::warn!(
                "found an invalid disjunctive Chaum-Pedersen proof: consistent_c={} gv0={} gv1={} kv0={} gc1kv1={}",
                consistent_c,
                consistent_gv0,
                consistent_gv1,
                consistent_kv0,
                consistent_gc1kv1
            );
        }
        success
    }
}

/// A generic Chaum-Pedersen proof of equal discrete logs:
/// `log_g K = log_A M`, where `M` is a decryption share of `(A, B)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaumPedersenProof {
    /// `a = g^u`, the commitment against the generator
    pub pad: ElementModP,
    /// `b = A^u`, the commitment against the ciphertext pad
    pub data: ElementModP,
    /// `c = H(Q̄, A, B, a, b, M)`
    pub challenge: ElementModQ,
    /// `v = u + c * s mod q`
    pub response: ElementModQ,
}

impl ChaumPedersenProof {
    /// Validate the proof: `m` is the share being checked, `k` the public
    /// key whose secret produced it, `q_bar` the extended base hash.
    pub fn is_valid(
        &self,
        message: &ElGamalCiphertext,
        k: &ElementModP,
        m: &ElementModP,
        q_bar: &ElementModQ,
    ) -> bool {
        let alpha = &message.pad;
        let beta = &message.data;
        let a = &self.pad;
        let b = &self.data;
        let c = &self.challenge;
        let v = &self.response;

        let in_bounds_alpha = alpha.is_valid_residue();
        let in_bounds_beta = beta.is_valid_residue();
        let in_bounds_k = k.is_valid_residue();
        let in_bounds_m = m.is_valid_residue();
        let in_bounds_a = a.is_valid_residue();
        let in_bounds_b = b.is_valid_residue();
        let in_bounds_c = c.is_in_bounds();
        let in_bounds_v = v.is_in_bounds();

        let same_c = *c == hash_elems![q_bar, alpha, beta, a, b, m];
        let consistent_gv = g_pow_p(v) == mult_p(&[a, &pow_p(k, c)]);
        let consistent_av = pow_p(alpha, v) == mult_p(&[b, &pow_p(m, c)]);

        let success = in_bounds_alpha
            && in_bounds_beta
            && in_bounds_k
            && in_bounds_m
            && in_bounds_a
            && in_bounds_b
            && in_bounds_c
            && in_bounds_v
            && same_c
            && consistent_gv
            && consistent_av;

        if !success {
            log::warn!(
                "found an invalid Chaum-Pedersen proof: same_c={} consistent_gv={} consistent_av={} in_bounds_m={}",
                same_c,
                consistent_gv,
                consistent_av,
                in_bounds_m
            );
        }
        success
    }
}

/// A constant Chaum-Pedersen proof that a ciphertext encrypts a specific
/// declared constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantChaumPedersenProof {
    /// `a = g^u`
    pub pad: ElementModP,
    /// `b = K^u`
    pub data: ElementModP,
    /// `c = H(Q̄, A, B, a, b)`
    pub challenge: ElementModQ,
    /// `v = u + c * r mod q`
    pub response: ElementModQ,
    /// the declared constant `L`
    pub constant: u32,
}

impl ConstantChaumPedersenProof {
    /// Validate the proof against a ciphertext, the election public key
    /// `k`, and the extended base hash `q_bar`.
    pub fn is_valid(
        &self,
        message: &ElGamalCiphertext,
        k: &ElementModP,
        q_bar: &ElementModQ,
    ) -> bool {
        let alpha = &message.pad;
        let beta = &message.data;
        let a = &self.pad;
        let b = &self.data;
        let c = &self.challenge;
        let v = &self.response;
        let constant_q = ElementModQ::from_u64_reduced(self.constant as u64);

        let in_bounds_alpha = alpha.is_valid_residue();
        let in_bounds_beta = beta.is_valid_residue();
        let in_bounds_a = a.is_valid_residue();
        let in_bounds_b = b.is_valid_residue();
        let in_bounds_c = c.is_in_bounds();
        let in_bounds_v = v.is_in_bounds();

        let same_c = *c == hash_elems![q_bar, alpha, beta, a, b];
        let consistent_gv = g_pow_p(v) == mult_p(&[a, &pow_p(alpha, c)]);
        // g^(c * L) * K^v = b * B^c
        let consistent_kv = mult_p(&[&g_pow_p(&mult_q(&[c, &constant_q])), &pow_p(k, v)])
            == mult_p(&[b, &pow_p(beta, c)]);

        let success = in_bounds_alpha
            && in_bounds_beta
            && in_bounds_a
            && in_bounds_b
            && in_bounds_c
            && in_bounds_v
            && same_c
            && consistent_gv
            && consistent_kv;

        if !success {
            log::warn!(
                "found an invalid constant Chaum-Pedersen proof: same_c={} consistent_gv={} consistent_kv={} constant={}",
                same_c,
                consistent_gv,
                consistent_kv,
                self.constant
            );
        }
        success
    }
}

/// Produce a disjunctive proof that an encryption of `plaintext` (zero or
/// one) is an encryption of zero or one.
pub fn make_disjunctive_chaum_pedersen(
    message: &ElGamalCiphertext,
    r: &ElementModQ,
    k: &ElementModP,
    q_bar: &ElementModQ,
    seed: &ElementModQ,
    plaintext: u32,
) -> Result<DisjunctiveChaumPedersenProof, crate::error::Error> {
    match plaintext {
        0 => Ok(make_disjunctive_chaum_pedersen_zero(message, r, k, q_bar, seed)),
        1 => Ok(make_disjunctive_chaum_pedersen_one(message, r, k, q_bar, seed)),
        other => Err(crate::error::Error::InvariantViolation(format!(
            "disjunctive proofs support plaintexts of 0 or 1, got {other}"
        ))),
    }
}

/// Produce a disjunctive proof for an encryption of zero: the one branch is
/// simulated, the zero branch is proven.
pub fn make_disjunctive_chaum_pedersen_zero(
    message: &ElGamalCiphertext,
    r: &ElementModQ,
    k: &ElementModP,
    q_bar: &ElementModQ,
    seed: &ElementModQ,
) -> DisjunctiveChaumPedersenProof {
    let alpha = &message.pad;
    let beta = &message.data;

    let nonces = Nonces::with_string_header(seed, "disjoint-chaum-pedersen-proof");
    let c1 = nonces.get(0);
    let v1 = nonces.get(1);
    let u0 = nonces.get(2);

    let a0 = g_pow_p(&u0);
    let b0 = pow_p_secret(k, &u0);
    let q_minus_c1 = negate_q(&c1);
    let a1 = mult_p(&[&g_pow_p(&v1), &pow_p(alpha, &q_minus_c1)]);
    let b1 = mult_p(&[&pow_p_secret(k, &v1), &g_pow_p(&c1), &pow_p(beta, &q_minus_c1)]);
    let c = hash_elems![q_bar, alpha, beta, &a0, &b0, &a1, &b1];
    let c0 = a_minus_b_q(&c, &c1);
    let v0 = a_plus_bc_q(&u0, &c0, r);

    DisjunctiveChaumPedersenProof {
        proof_zero_pad: a0,
        proof_zero_data: b0,
        proof_one_pad: a1,
        proof_one_data: b1,
        proof_zero_challenge: c0,
        proof_one_challenge: c1,
        challenge: c,
        proof_zero_response: v0,
        proof_one_response: v1,
    }
}

/// Produce a disjunctive proof for an encryption of one: the zero branch is
/// simulated, the one branch is proven.
pub fn make_disjunctive_chaum_pedersen_one(
    message: &ElGamalCiphertext,
    r: &ElementModQ,
    k: &ElementModP,
    q_bar: &ElementModQ,
    seed: &ElementModQ,
) -> DisjunctiveChaumPedersenProof {
    let alpha = &message.pad;
    let beta = &message.data;

    let nonces = Nonces::with_string_header(seed, "disjoint-chaum-pedersen-proof");
    let c0 = nonces.get(0);
    let v0 = nonces.get(1);
    let u1 = nonces.get(2);

    let q_minus_c0 = negate_q(&c0);
    let a0 = mult_p(&[&g_pow_p(&v0), &pow_p(alpha, &q_minus_c0)]);
    let b0 = mult_p(&[&pow_p_secret(k, &v0), &pow_p(beta, &q_minus_c0)]);
    let a1 = g_pow_p(&u1);
    let b1 = pow_p_secret(k, &u1);
    let c = hash_elems![q_bar, alpha, beta, &a0, &b0, &a1, &b1];
    let c1 = a_minus_b_q(&c, &c0);
    let v1 = a_plus_bc_q(&u1, &c1, r);

    DisjunctiveChaumPedersenProof {
        proof_zero_pad: a0,
        proof_zero_data: b0,
        proof_one_pad: a1,
        proof_one_data: b1,
        proof_zero_challenge: c0,
        proof_one_challenge: c1,
        challenge: c,
        proof_zero_response: v0,
        proof_one_response: v1,
    }
}

/// Produce a proof that a decryption share corresponds to a ciphertext:
/// `m = A^s` for the secret `s` behind the public key `g^s`.
pub fn make_chaum_pedersen(
    message: &ElGamalCiphertext,
    s: &ElementModQ,
    m: &ElementModP,
    seed: &ElementModQ,
    q_bar: &ElementModQ,
) -> ChaumPedersenProof {
    let alpha = &message.pad;
    let beta = &message.data;

    let u = Nonces::with_string_header(seed, "constant-chaum-pedersen-proof").get(0);
    let a = g_pow_p(&u);
    let b = pow_p_secret(alpha, &u);
    let c = hash_elems![q_bar, alpha, beta, &a, &b, m];
    let v = a_plus_bc_q(&u, &c, s);

    ChaumPedersenProof {
        pad: a,
        data: b,
        challenge: c,
        response: v,
    }
}

/// Produce a proof that a ciphertext encrypts the declared constant, given
/// the aggregate nonce `r` used to create it.
pub fn make_constant_chaum_pedersen(
    message: &ElGamalCiphertext,
    constant: u32,
    r: &ElementModQ,
    k: &ElementModP,
    seed: &ElementModQ,
    q_bar: &ElementModQ,
) -> ConstantChaumPedersenProof {
    let alpha = &message.pad;
    let beta = &message.data;

    let u = Nonces::with_string_header(seed, "constant-chaum-pedersen-proof").get(0);
    let a = g_pow_p(&u);
    let b = pow_p_secret(k, &u);
    let c = hash_elems![q_bar, alpha, beta, &a, &b];
    let v = a_plus_bc_q(&u, &c, r);

    ConstantChaumPedersenProof {
        pad: a,
        data: b,
        challenge: c,
        response: v,
        constant,
    }
}
