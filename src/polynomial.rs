//! Secret-sharing polynomials over `Z_q`.
//!
//! Each guardian samples a polynomial of degree `quorum - 1`; the constant
//! term is its election secret. Coordinates at other guardians' sequence
//! orders become backups, and the per-coefficient commitments `K_j = g^{a_j}`
//! let anyone check a coordinate without learning the polynomial.

use serde::{Deserialize, Serialize};

use crate::elgamal::ElGamalKeyPair;
use crate::error::Error;
use crate::group::{
    a_minus_b_q, add_q, div_q, g_pow_p, mult_p, mult_q, pow_p, pow_q, rand_q, ElementModP,
    ElementModQ,
};
use crate::schnorr::{make_schnorr_proof, SchnorrProof};

/// Secret coefficient of an election polynomial.
pub type SecretCoefficient = ElementModQ;

/// Public commitment to a coefficient of an election polynomial.
pub type PublicCommitment = ElementModP;

/// A coefficient of an election polynomial: the secret value, its public
/// commitment, and a proof of possession of the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coefficient {
    /// The secret coefficient `a_ij`
    pub value: SecretCoefficient,

    /// The public commitment `K_ij = g^{a_ij}`
    pub commitment: PublicCommitment,

    /// A proof of possession of the secret coefficient
    pub proof: SchnorrProof,
}

/// A polynomial defined by coefficients.
///
/// The 0-index coefficient is the secret key which a quorum of guardians can
/// jointly reconstruct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionPolynomial {
    pub coefficients: Vec<Coefficient>,
}

impl ElectionPolynomial {
    pub fn get_commitments(&self) -> Vec<PublicCommitment> {
        self.coefficients.iter().map(|c| c.commitment.clone()).collect()
    }

    pub fn get_proofs(&self) -> Vec<SchnorrProof> {
        self.coefficients.iter().map(|c| c.proof.clone()).collect()
    }
}

/// Generate a polynomial with uniformly random coefficients, a commitment
/// and a Schnorr proof for each.
pub fn generate_polynomial(number_of_coefficients: usize) -> Result<ElectionPolynomial, Error> {
    if number_of_coefficients == 0 {
        return Err(Error::InvariantViolation(
            "a polynomial requires at least one coefficient".to_string(),
        ));
    }
    let mut coefficients = Vec::with_capacity(number_of_coefficients);
    for _ in 0..number_of_coefficients {
        let value = rand_q();
        let commitment = g_pow_p(&value);
        let proof = make_schnorr_proof(
            &ElGamalKeyPair {
                secret_key: value.clone(),
                public_key: commitment.clone(),
            },
            &rand_q(),
        );
        coefficients.push(Coefficient {
            value,
            commitment,
            proof,
        });
    }
    Ok(ElectionPolynomial { coefficients })
}

/// Evaluate the polynomial at a coordinate (usually a guardian's sequence
/// order), by Horner's rule mod `q`.
pub fn compute_polynomial_coordinate(
    exponent_modifier: u32,
    polynomial: &ElectionPolynomial,
) -> ElementModQ {
    let x = ElementModQ::from_u64_reduced(exponent_modifier as u64);
    let mut value = ElementModQ::zero();
    for coefficient in polynomial.coefficients.iter().rev() {
        value = add_q(&[&mult_q(&[&value, &x]), &coefficient.value]);
    }
    value
}

/// Verify that a coordinate value is on the polynomial committed to by
/// `commitments`: `g^value = prod_j K_j^(x^j)`.
pub fn verify_polynomial_coordinate(
    coordinate: &ElementModQ,
    exponent_modifier: u32,
    commitments: &[PublicCommitment],
) -> bool {
    let x = ElementModQ::from_u64_reduced(exponent_modifier as u64);
    let mut commitment_output = ElementModP::one();
    for (j, commitment) in commitments.iter().enumerate() {
        let exponent = pow_q(&x, &ElementModQ::from_u64_reduced(j as u64));
        let factor = pow_p(commitment, &exponent);
        commitment_output = mult_p(&[&commitment_output, &factor]);
    }
    g_pow_p(coordinate) == commitment_output
}

/// Compute the Lagrange coefficient at zero for `coordinate` against the
/// other available coordinates:
/// `prod_j x_j / prod_j (x_j - coordinate) mod q`.
pub fn compute_lagrange_coefficient(
    coordinate: u32,
    degrees: &[u32],
) -> Result<ElementModQ, Error> {
    let coordinate_q = ElementModQ::from_u64_reduced(coordinate as u64);
    let mut numerator = ElementModQ::one();
    let mut denominator = ElementModQ::one();
    for &degree in degrees {
        let degree_q = ElementModQ::from_u64_reduced(degree as u64);
        numerator = mult_q(&[&numerator, &degree_q]);
        denominator = mult_q(&[&denominator, &a_minus_b_q(&degree_q, &coordinate_q)]);
    }
    div_q(&numerator, &denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::use_test_constants;
    use crate::group::a_plus_bc_q;

    #[test]
    fn coordinates_lie_on_the_committed_curve() {
        use_test_constants();
        let polynomial = generate_polynomial(3).unwrap();
        let commitments = polynomial.get_commitments();
        for sequence_order in 1u32..=5 {
            let coordinate = compute_polynomial_coordinate(sequence_order, &polynomial);
            assert!(verify_polynomial_coordinate(
                &coordinate,
                sequence_order,
                &commitments
            ));
        }
    }

    #[test]
    fn forged_coordinates_fail_verification() {
        use_test_constants();
        let polynomial = generate_polynomial(3).unwrap();
        let commitments = polynomial.get_commitments();
        let coordinate = compute_polynomial_coordinate(2, &polynomial);
        let forged = a_plus_bc_q(&coordinate, &ElementModQ::one(), &ElementModQ::one());
        assert!(!verify_polynomial_coordinate(&forged, 2, &commitments));
    }

    #[test]
    fn coefficient_proofs_verify() {
        use_test_constants();
        let polynomial = generate_polynomial(2).unwrap();
        for proof in polynomial.get_proofs() {
            assert!(proof.is_valid());
        }
    }

    #[test]
    fn lagrange_interpolation_recovers_the_secret() {
        use_test_constants();
        let quorum = 3;
        let polynomial = generate_polynomial(quorum).unwrap();
        let secret = &polynomial.coefficients[0].value;

        // Any `quorum`-sized set of distinct coordinates reconstructs P(0).
        for points in [[1u32, 2, 3], [2, 4, 5], [1, 3, 5]] {
            let mut reconstructed = ElementModQ::zero();
            for &x_i in &points {
                let others: Vec<u32> = points.iter().copied().filter(|&x| x != x_i).collect();
                let lagrange = compute_lagrange_coefficient(x_i, &others).unwrap();
                let value = compute_polynomial_coordinate(x_i, &polynomial);
                reconstructed = a_plus_bc_q(&reconstructed, &lagrange, &value);
            }
            assert_eq!(&reconstructed, secret);
        }
    }

    #[test]
    fn empty_polynomial_is_rejected() {
        use_test_constants();
        assert!(generate_polynomial(0).is_err());
    }
}
