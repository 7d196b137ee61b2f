//! Gas limit policy for the mint transaction.

use thiserror::Error;

/// Upper bound on the gas limit of a submitted mint.
pub const GAS_LIMIT_CAP: u64 = 50_000_000;

/// The node's estimate is already above [`GAS_LIMIT_CAP`]; submitting would be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("gas estimate {estimate} exceeds the limit cap of {cap}")]
pub struct GasLimitExceeded {
    pub estimate: u64,
    pub cap: u64,
}

/// Scale an estimate by 1.5 (rounded down) and clamp to [`GAS_LIMIT_CAP`].
///
/// Estimates in `0..=GAS_LIMIT_CAP` always succeed; those whose 1.5× would exceed the cap
/// get exactly the cap. An estimate strictly above the cap (`GAS_LIMIT_CAP + 1..`) is not
/// clamped: the transaction would run out of gas, so it fails with [`GasLimitExceeded`].
pub fn gas_limit_for(estimate: u64) -> Result<u64, GasLimitExceeded> {
    if estimate > GAS_LIMIT_CAP {
        return Err(GasLimitExceeded {
            estimate,
            cap: GAS_LIMIT_CAP,
        });
    }
    // estimate <= cap, so neither step can overflow.
    let scaled = estimate * 3 / 2;
    Ok(scaled.min(GAS_LIMIT_CAP))
}
