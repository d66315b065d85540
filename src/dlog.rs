//! Bounded discrete-log recovery with a shared memoization table.
//!
//! Plaintexts live in the exponent, so decryption ends with recovering a
//! small `t` from `g^t`. The table maps subgroup elements to exponents and
//! only ever grows; extension happens under the write lock, so readers never
//! observe a partially inserted entry.

use std::collections::HashMap;
use std::env;
use std::sync::{OnceLock, RwLock};

use num_bigint::BigUint;
use num_traits::One;

use crate::constants::{generator, large_prime};
use crate::error::Error;
use crate::group::ElementModP;

const DEFAULT_MAX_EXPONENT: u64 = 100_000_000;

struct DlogState {
    cache: HashMap<BigUint, u64>,
    frontier: BigUint,
    frontier_exponent: u64,
}

static STATE: OnceLock<RwLock<DlogState>> = OnceLock::new();
static ENV_MAX: OnceLock<Option<u64>> = OnceLock::new();

fn state() -> &'static RwLock<DlogState> {
    STATE.get_or_init(|| {
        let mut cache = HashMap::new();
        cache.insert(BigUint::one(), 0);
        RwLock::new(DlogState {
            cache,
            frontier: BigUint::one(),
            frontier_exponent: 0,
        })
    })
}

fn env_max_override() -> Option<u64> {
    *ENV_MAX.get_or_init(|| {
        env::var("EG_BOUNDED_DLOG_MAX")
            .ok()
            .and_then(|value| value.parse().ok())
    })
}

/// The effective search ceiling: the caller's bound, unless the
/// `EG_BOUNDED_DLOG_MAX` environment variable overrides it.
pub fn effective_max_exponent(requested: u64) -> u64 {
    env_max_override().unwrap_or(requested)
}

/// Recover `t` such that `g^t = element`, searching no further than
/// `max_exponent`. Results are memoized process-wide.
pub fn discrete_log(element: &ElementModP, max_exponent: u64) -> Result<u64, Error> {
    let max_exponent = effective_max_exponent(max_exponent);

    {
        let guard = state().read().expect("dlog lock poisoned");
        if let Some(&exponent) = guard.cache.get(&element.0) {
            return Ok(exponent);
        }
    }

    let mut guard = state().write().expect("dlog lock poisoned");
    // Another writer may have gotten here first.
    if let Some(&exponent) = guard.cache.get(&element.0) {
        return Ok(exponent);
    }

    let g = generator();
    let p = large_prime();
    while guard.frontier != element.0 {
        if guard.frontier_exponent >= max_exponent {
            return Err(Error::TallyOutOfRange(max_exponent));
        }
        let next = &guard.frontier * g % p;
        let exponent = guard.frontier_exponent + 1;
        guard.cache.insert(next.clone(), exponent);
        guard.frontier = next;
        guard.frontier_exponent = exponent;
    }
    Ok(guard.frontier_exponent)
}

/// Recover a discrete log with the default ceiling.
pub fn discrete_log_default(element: &ElementModP) -> Result<u64, Error> {
    discrete_log(element, DEFAULT_MAX_EXPONENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::use_test_constants;
    use crate::group::{g_pow_p, ElementModQ};

    #[test]
    fn recovers_small_exponents() {
        use_test_constants();
        for t in [0u64, 1, 2, 5, 40, 41] {
            let element = g_pow_p(&ElementModQ::from_u64_reduced(t));
            assert_eq!(discrete_log(&element, 1000).unwrap(), t);
        }
    }

    #[test]
    fn rejects_out_of_range_values() {
        use_test_constants();
        let element = g_pow_p(&ElementModQ::from_u64_reduced(5000));
        match discrete_log(&element, 10) {
            Err(Error::TallyOutOfRange(10)) => {}
            other => panic!("expected TallyOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn cache_is_shared_across_calls() {
        use_test_constants();
        let element = g_pow_p(&ElementModQ::from_u64_reduced(30));
        assert_eq!(discrete_log(&element, 1000).unwrap(), 30);
        // Second lookup hits the cache even with a ceiling below the answer.
        assert_eq!(discrete_log(&element, 1).unwrap(), 30);
    }
}
