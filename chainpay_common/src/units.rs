//! Conversions between on-chain base units (integers, e.g. wei) and human-readable token amounts.
//!
//! All arithmetic is integer based. Raw amounts are carried as 256-bit unsigned integers and token amounts as
//! [`Decimal`]s, which hold 96 bits of mantissa. Anything that does not fit exactly is an error rather than a rounded
//! value.
use alloy_primitives::U256;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use thiserror::Error;

/// The largest scale a [`Decimal`] can represent.
pub const MAX_DECIMALS: u8 = 28;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitConversionError {
    #[error("{0} decimal places exceeds the maximum supported precision of {MAX_DECIMALS}")]
    TooManyDecimals(u8),
    #[error("{0} base units cannot be represented exactly as a decimal amount")]
    Overflow(U256),
    #[error("{0} cannot be expressed in whole base units with {1} decimals")]
    FractionalUnits(Decimal, u8),
    #[error("Negative amounts have no base unit representation: {0}")]
    Negative(Decimal),
    #[error("'{0}' is not an unsigned integer")]
    InvalidInteger(String),
}

/// Parses an unsigned integer amount given either in decimal or in `0x`-prefixed hexadecimal.
pub fn parse_base_units(s: &str) -> Result<U256, UnitConversionError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => U256::from_str_radix(hex, 16),
        Some(_) => return Err(UnitConversionError::InvalidInteger(s.to_string())),
        None if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => U256::from_str_radix(s, 10),
        None => return Err(UnitConversionError::InvalidInteger(s.to_string())),
    };
    parsed.map_err(|_| UnitConversionError::InvalidInteger(s.to_string()))
}

/// Computes `units / 10^decimals` exactly.
pub fn decimal_from_units(units: U256, decimals: u8) -> Result<Decimal, UnitConversionError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitConversionError::TooManyDecimals(decimals));
    }
    let value = u128::try_from(units)
        .ok()
        .and_then(|v| i128::try_from(v).ok())
        .ok_or(UnitConversionError::Overflow(units))?;
    Decimal::try_from_i128_with_scale(value, u32::from(decimals)).map_err(|_| UnitConversionError::Overflow(units))
}

/// Computes `amount * 10^decimals`, failing if the result is not a whole number of base units.
pub fn units_from_decimal(amount: Decimal, decimals: u8) -> Result<U256, UnitConversionError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitConversionError::TooManyDecimals(decimals));
    }
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(UnitConversionError::Negative(amount));
    }
    let factor = Decimal::from_i128_with_scale(10i128.pow(u32::from(decimals)), 0);
    let scaled = amount.checked_mul(factor).ok_or(UnitConversionError::FractionalUnits(amount, decimals))?;
    if !scaled.fract().is_zero() {
        return Err(UnitConversionError::FractionalUnits(amount, decimals));
    }
    scaled.trunc().to_u128().map(U256::from).ok_or(UnitConversionError::FractionalUnits(amount, decimals))
}
