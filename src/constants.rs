//! Group constants for the election.
//!
//! The standard constants pin a 4096-bit safe prime `P`, the 256-bit prime
//! `Q = 2^256 - 189` dividing `P - 1`, the cofactor `R = (P - 1) / Q`, and
//! the generator `G` of the order-`Q` subgroup. Alternate, much smaller
//! primes are available for tests via the `PRIME_OPTION` environment
//! variable; they keep every algebraic property and make the arithmetic
//! cheap enough to exercise whole elections in unit tests.

use std::env;
use std::sync::OnceLock;

use num_bigint::BigUint;
use num_traits::One;
use serde::{Deserialize, Serialize};

const STANDARD_LARGE_PRIME_HEX: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF93C467E37DB0C7A4D1BE3F810152CB56A1CECC3AF65CC0190C03DF34709AFFBD8E4B59FA03A9F0EED0649CCB621057D11056AE9132135A08E43B4673D74BAFEA58DEB878CC86D733DBE7BF38154B36CF8A96D1567899AAAE0C09D4C8B6B7B86FD2A1EA1DE62FF8643EC7C271827977225E6AC2F0BD61C746961542A3CE3BEA5DB54FE70E63E6D09F8FC28658E80567A47CFDE60EE741E5D85A7BD46931CED8220365594964B839896FCAABCCC9B31959C083F22AD3EE591C32FAB2C7448F2A057DB2DB49EE52E0182741E53865F004CC8E704B7C5C40BF304C4D8C4F13EDF6047C555302D2238D8CE11DF2424F1B66C2C5D238D0744DB679AF2890487031F9C0AEA1C4BB6FE9554EE528FDF1B05E5B256223B2F09215F3719F9C7CCC69DDF172D0D6234217FCC0037F18B93EF5389130B7A661E5C26E54214068BBCAFEA32A67818BD3075AD1F5C7E9CC3D1737FB28171BAF84DBB6612B7881C1A48E439CD03A92BF52225A2B38E6542E9F722BCE15A381B5753EA842763381CCAE83512B30511B32E5E8D80362149AD030AABA5F3A5798BB22AA7EC1B6D0F17903F4E22D840734AA85973F79A93FFB82A75C47C03D43D2F9CA02D03199BACEDDD4533A52566AFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF";

const STANDARD_SMALL_PRIME_HEX: &str =
    "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF43";

const STANDARD_GENERATOR_HEX: &str = "1D41E49C477E15EAEEF0C5E4AC08D4A46C268CD3424FC01D13769BDB43673218587BC86C4C1448D006A03699F3ABAE5FEB19E296F5D143CC5E4A3FC89088C9F4523D166EE3AE9D5FB03C0BDD77ADD5C017F6C55E2EC92C226FEF5C6C1DF2E7C36D90E7EAADE098241D3409983BCCD2B5379E9391FBC62F9F8D939D1208B160367C134264122189595EC85C8CDBE5F9D307F46912C04932F8C16815A76B4682BD6BDC0ED52B00D8D30F59C731D5A7FFAE8165D53CF96649AAC2B743DA56F14F19DACC5236F29B1AB9F9BEFC69697293D5DEAD8B5BF5DE9BAB6DE67C45719E56344A3CBDF3609824B1B578E34EAEB6DD3190AB3571D6D671C512282C1DA7BD36B4251D2584FADEA80B9E141423074DD9B5FB83ACBDEAD4C87A58FFF517F977A83080370A3B0CF98A1BC2978C47AAC29611FD6C40E2F9875C35D50443A9AA3F49611DCD3A0D6FF3CB3FACF31471BDB61860B92C594D4E46569BB39FEEADFF1FD64C836A6D6DB85C6BA7241766B7AB56BF739633B054147F7170921412E948D9E47402D15BB1C257318612C121C36B80EB8433C08E7D0B7149E3AB0A8735A92EDCE8FF943E28A2DCEACFCC69EC318909CB047BE1C5858844B5AD44F22EEB289E4CC554F7A5E2F3DEA026877FF92851816071CE028EB868D965CCB2D2295A8C55BD1C070B39B09AE06B37D29343B9D8997DC244C468B980970731736EE018BBADB987";

const STANDARD_COFACTOR_HEX: &str = "0100000000000000000000000000000000000000000000000000000000000000BC93C467E37DB0C7A4D1BE3F810152CB56A1CECC3AF65CC0190C03DF34709B8AF6A64C0CEDCF2D559DA9D97F095C3076C686037619148D2C86C317102AFA2148031F04440AC0FF0C9A417A89212512E7607B2501DAA4D38A2C1410C4836149E2BDB8C8260E627C4646963EFFE9E16E495D48BD215C6D8EC9D1667657A2A1C8506F2113FFAD19A6B2BC7C45760456719183309F874BC9ACE570FFDA877AA2B23A2D6F291C1554CA2EB12F12CD009B8B8734A64AD51EB893BD891750B85162241D908F0C9709879758E7E8233EAB3BF2D6AB53AFA32AA153AD6682E5A0648897C9BE18A0D50BECE030C3432336AD9163E33F8E7DAF498F14BB2852AFFA814841EB18DD5F0E89516D557776285C16071D211194EE1C3F34642036AB886E3EC28882CE4003DEA335B4D935BAE4B58235B9FB2BAB713C8F705A1C7DE42220209D6BBCACC467318601565272E4A63E38E2499754AE493AC1A8E83469EEF35CA27C271BC792EEE21156E617B922EA8F713C22CF282DC5D6385BB12868EB781278FA0AB2A8958FCCB5FFE2E5C361FC174420122B0163CA4A46308C8C46C91EA7457C136A7D9FD4A7F529FD4A7F529FD4A7F529FD4A7F529FD4A7F529FD4A7F529FD4A7F52A";

// 64-bit prime set with the same algebraic structure as the standard set.
const TEST_LARGE_PRIME_HEX: &str = "FFFFFFFFFFB43EA5";
const TEST_SMALL_PRIME_HEX: &str = "FFF1";
const TEST_GENERATOR_HEX: &str = "D6982759F3D5107E";
const TEST_COFACTOR_HEX: &str = "01000F00E10CE4";

/// Which set of primes the process is running with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimeOption {
    Standard,
    TestOnly,
}

/// The constants for mathematical functions during the election.
///
/// This is the snapshot published in the election record; a verifier checks
/// it against the values pinned here before trusting anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionConstants {
    /// large prime or `p`
    #[serde(with = "hex_biguint")]
    pub large_prime: BigUint,

    /// small prime or `q`
    #[serde(with = "hex_biguint")]
    pub small_prime: BigUint,

    /// cofactor or `r`, equal to `(p - 1) / q`
    #[serde(with = "hex_biguint")]
    pub cofactor: BigUint,

    /// generator or `g` of the order-`q` subgroup
    #[serde(with = "hex_biguint")]
    pub generator: BigUint,
}

impl ElectionConstants {
    fn from_hex(p: &str, q: &str, r: &str, g: &str) -> Self {
        ElectionConstants {
            large_prime: parse_hex(p),
            small_prime: parse_hex(q),
            cofactor: parse_hex(r),
            generator: parse_hex(g),
        }
    }

    pub fn standard() -> Self {
        Self::from_hex(
            STANDARD_LARGE_PRIME_HEX,
            STANDARD_SMALL_PRIME_HEX,
            STANDARD_COFACTOR_HEX,
            STANDARD_GENERATOR_HEX,
        )
    }

    pub fn test_only() -> Self {
        Self::from_hex(
            TEST_LARGE_PRIME_HEX,
            TEST_SMALL_PRIME_HEX,
            TEST_COFACTOR_HEX,
            TEST_GENERATOR_HEX,
        )
    }

    /// Checks the group structure: `q | p - 1`, `g != 1`, `g^q = 1 mod p`.
    pub fn is_valid(&self) -> bool {
        let p_minus_one = &self.large_prime - BigUint::one();
        &p_minus_one % &self.small_prime == BigUint::from(0u8)
            && &self.small_prime * &self.cofactor == p_minus_one
            && self.generator != BigUint::one()
            && self
                .generator
                .modpow(&self.small_prime, &self.large_prime)
                == BigUint::one()
    }
}

fn parse_hex(input: &str) -> BigUint {
    // The pinned constants are compiled in; a parse failure is a build defect.
    BigUint::parse_bytes(input.as_bytes(), 16).expect("pinned group constant is valid hex")
}

mod hex_biguint {
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(16))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let text = String::deserialize(deserializer)?;
        BigUint::parse_bytes(text.as_bytes(), 16)
            .ok_or_else(|| de::Error::custom("invalid hex integer"))
    }
}

struct ConstantInternals {
    constants: ElectionConstants,
    p_hex_width: usize,
    q_hex_width: usize,
    g_pow_radix: PowRadix,
}

static INTERNALS: OnceLock<ConstantInternals> = OnceLock::new();

fn build_internals(option: PrimeOption) -> ConstantInternals {
    let constants = match option {
        PrimeOption::Standard => ElectionConstants::standard(),
        PrimeOption::TestOnly => ElectionConstants::test_only(),
    };
    // A bad constant set means the binary itself is corrupt; refuse to start.
    assert!(constants.is_valid(), "group constants failed validation");

    let p_hex_width = constants.large_prime.to_bytes_be().len() * 2;
    let q_hex_width = constants.small_prime.to_bytes_be().len() * 2;
    let g_pow_radix = PowRadix::new(
        &constants.generator,
        &constants.small_prime,
        &constants.large_prime,
    );
    ConstantInternals {
        constants,
        p_hex_width,
        q_hex_width,
        g_pow_radix,
    }
}

fn prime_option_from_environment() -> PrimeOption {
    match env::var("PRIME_OPTION") {
        Ok(value) if value == "TestOnly" => PrimeOption::TestOnly,
        _ => PrimeOption::Standard,
    }
}

fn internals() -> &'static ConstantInternals {
    INTERNALS.get_or_init(|| build_internals(prime_option_from_environment()))
}

/// Get the constants the process is running with.
pub fn get_constants() -> &'static ElectionConstants {
    &internals().constants
}

/// Force the small test-only primes for this process.
///
/// Must be called before the first use of any group operation; later calls
/// are no-ops. Intended for tests.
pub fn use_test_constants() {
    let _ = INTERNALS.get_or_init(|| build_internals(PrimeOption::TestOnly));
}

pub(crate) fn large_prime() -> &'static BigUint {
    &internals().constants.large_prime
}

pub(crate) fn small_prime() -> &'static BigUint {
    &internals().constants.small_prime
}

pub(crate) fn generator() -> &'static BigUint {
    &internals().constants.generator
}

pub(crate) fn p_hex_width() -> usize {
    internals().p_hex_width
}

pub(crate) fn q_hex_width() -> usize {
    internals().q_hex_width
}

pub(crate) fn g_pow_radix() -> &'static PowRadix {
    &internals().g_pow_radix
}

/// Fixed-base exponentiation acceleration.
///
/// Precomputes `basis^(b * 256^i)` for every byte value `b` and byte
/// position `i` of a reduced exponent, so that `pow` is one modular
/// multiplication per exponent byte.
pub(crate) struct PowRadix {
    table: Vec<Vec<BigUint>>,
    small_prime: BigUint,
    large_prime: BigUint,
}

impl PowRadix {
    fn new(basis: &BigUint, small_prime: &BigUint, large_prime: &BigUint) -> Self {
        let table_length = ((small_prime.bits() + 7) / 8) as usize;
        let mut table = Vec::with_capacity(table_length);
        let mut row_basis = basis.clone();
        for _ in 0..table_length {
            let mut row = Vec::with_capacity(256);
            let mut running = BigUint::one();
            for _ in 0..256 {
                row.push(running.clone());
                running = running * &row_basis % large_prime;
            }
            row_basis = running;
            table.push(row);
        }
        PowRadix {
            table,
            small_prime: small_prime.clone(),
            large_prime: large_prime.clone(),
        }
    }

    pub(crate) fn pow(&self, exponent: &BigUint) -> BigUint {
        let exponent = exponent % &self.small_prime;
        let bytes = exponent.to_bytes_le();
        let mut result = BigUint::one();
        for (i, row) in self.table.iter().enumerate() {
            let byte = bytes.get(i).copied().unwrap_or(0);
            result = result * &row[byte as usize] % &self.large_prime;
        }
        result
    }
}
