//! Deterministic sequences of elements in `[0, Q)`.

use crate::group::ElementModQ;
use crate::hash_elems;

/// A sequence of derived nonces, seeded from an element of `Z_q`.
///
/// The same seed always yields the same sequence, and indexing is constant
/// time in the index. Headers bind the seed to a purpose, keeping nonces for
/// different uses out of each other's domains.
#[derive(Debug, Clone)]
pub struct Nonces {
    seed: ElementModQ,
}

impl Nonces {
    pub fn new(seed: &ElementModQ) -> Self {
        Nonces { seed: seed.clone() }
    }

    pub fn with_string_header(seed: &ElementModQ, header: &str) -> Self {
        Nonces {
            seed: hash_elems![seed, header],
        }
    }

    pub fn with_element_header(seed: &ElementModQ, header: &ElementModQ) -> Self {
        Nonces {
            seed: hash_elems![seed, header],
        }
    }

    pub fn get(&self, index: u64) -> ElementModQ {
        hash_elems![&self.seed, index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::use_test_constants;
    use crate::group::rand_q;

    #[test]
    fn sequences_are_deterministic() {
        use_test_constants();
        let seed = rand_q();
        let a = Nonces::with_string_header(&seed, "proof");
        let b = Nonces::with_string_header(&seed, "proof");
        assert_eq!(a.get(0), b.get(0));
        assert_eq!(a.get(17), b.get(17));
    }

    #[test]
    fn headers_separate_domains() {
        use_test_constants();
        let seed = rand_q();
        let a = Nonces::with_string_header(&seed, "one");
        let b = Nonces::with_string_header(&seed, "two");
        assert_ne!(a.get(0), b.get(0));
    }

    #[test]
    fn indexes_are_distinct() {
        use_test_constants();
        let sequence = Nonces::new(&rand_q());
        assert_ne!(sequence.get(0), sequence.get(1));
    }
}
