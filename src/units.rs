//! Unit Conversion
//!
//! On-chain amounts are `U256` in the token's smallest unit. Everything the
//! planner and the ledger reason about is a `Decimal` in whole units (ether for
//! the native coin). Conversion happens once, where a balance is observed.
//!
//! Created: 2026-10-19

use alloy::primitives::U256;
use rust_decimal::Decimal;

/// Native coin decimals
pub const ETHER_DECIMALS: u8 = 18;

/// Largest scale `Decimal` can represent
const MAX_DECIMAL_SCALE: u32 = 28;

/// Largest `Decimal` mantissa (96 bits)
const MAX_MANTISSA: u128 = (1u128 << 96) - 1;

/// Convert a raw on-chain amount to whole units.
///
/// Amounts wider than a `Decimal` mantissa lose their lowest digits first
/// (scale is lowered one digit at a time). Returns `None` only when even the
/// whole-unit part does not fit, e.g. a max-uint allowance.
pub fn to_units(raw: U256, decimals: u8) -> Option<Decimal> {
    let mut scale = u32::from(decimals);
    if scale > MAX_DECIMAL_SCALE {
        return None;
    }

    let ten = U256::from(10u8);
    let mut raw = raw;
    while raw > U256::from(MAX_MANTISSA) {
        if scale == 0 {
            return None;
        }
        raw /= ten;
        scale -= 1;
    }

    let raw: u128 = raw.try_into().ok()?;
    let raw = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(raw, scale)
        .ok()
        .map(|d| d.normalize())
}

/// Convert whole units back to a raw on-chain amount, truncating anything
/// finer than `decimals`. Negative inputs map to zero.
pub fn from_units(amount: Decimal, decimals: u8) -> U256 {
    if amount.is_sign_negative() || amount.is_zero() {
        return U256::ZERO;
    }
    let truncated = amount.trunc_with_scale(u32::from(decimals));
    let mantissa = truncated.mantissa().unsigned_abs();
    let scale = truncated.scale();
    let shift = u32::from(decimals).saturating_sub(scale);
    U256::from(mantissa) * U256::from(10u8).pow(U256::from(shift))
}

pub fn wei_to_ether(wei: U256) -> Option<Decimal> {
    to_units(wei, ETHER_DECIMALS)
}

pub fn ether_to_wei(ether: Decimal) -> U256 {
    from_units(ether, ETHER_DECIMALS)
}

/// Like `wei_to_ether`, but saturates to `Decimal::MAX` for display/ledger use.
pub fn wei_to_ether_lossy(wei: U256) -> Decimal {
    wei_to_ether(wei).unwrap_or(Decimal::MAX)
}
