mod secret;
pub mod units;

pub use secret::Secret;
pub use units::{decimal_from_units, parse_base_units, units_from_decimal, UnitConversionError, MAX_DECIMALS};
