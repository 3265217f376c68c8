//! Decimal ↔ f64 conversions for the `NUMERIC` columns.
//!
//! Weather readings are stored at one decimal place; coordinates keep full
//! precision so history entries can be plotted back onto a map. Non-finite
//! inputs become `Decimal::ZERO` (providers occasionally send NaN for missing
//! readings, and Postgres `NUMERIC` rejects it).

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Convert a weather reading to Decimal, rounded to 1 decimal place.
pub(crate) fn reading_to_decimal(v: f64) -> Decimal {
    if !v.is_finite() {
        tracing::warn!(
            "reading_to_decimal received non-finite value {}, storing 0",
            v
        );
        return Decimal::ZERO;
    }
    Decimal::from_str_exact(&format!("{:.1}", v)).unwrap_or_default()
}

pub(crate) fn opt_reading_to_decimal(v: Option<f64>) -> Option<Decimal> {
    v.map(reading_to_decimal)
}

/// Convert a coordinate to Decimal preserving full precision.
pub(crate) fn coordinate_to_decimal(v: f64) -> Decimal {
    if !v.is_finite() {
        tracing::warn!(
            "coordinate_to_decimal received non-finite value {}, storing 0",
            v
        );
        return Decimal::ZERO;
    }
    Decimal::from_f64(v).unwrap_or_else(|| Decimal::new(v as i64, 0))
}

pub(crate) fn opt_coordinate_to_decimal(v: Option<f64>) -> Option<Decimal> {
    v.map(coordinate_to_decimal)
}

/// Convert a Decimal to f64, defaulting to 0.0 for values that can't be represented.
pub(crate) fn dec_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

pub(crate) fn opt_dec_to_f64(d: Option<Decimal>) -> Option<f64> {
    d.and_then(|v| v.to_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_reading_rounds_to_one_place() {
        assert_eq!(
            reading_to_decimal(24.96),
            Decimal::from_str("25.0").unwrap()
        );
        assert_eq!(
            reading_to_decimal(-3.14),
            Decimal::from_str("-3.1").unwrap()
        );
    }

    #[test]
    fn test_reading_non_finite_is_zero() {
        assert_eq!(reading_to_decimal(f64::NAN), Decimal::ZERO);
        assert_eq!(reading_to_decimal(f64::NEG_INFINITY), Decimal::ZERO);
    }

    #[test]
    fn test_coordinate_keeps_precision() {
        let d = coordinate_to_decimal(-23.5505);
        assert!((dec_to_f64(d) + 23.5505).abs() < 1e-9);
    }

    #[test]
    fn test_coordinate_non_finite_is_zero() {
        assert_eq!(coordinate_to_decimal(f64::INFINITY), Decimal::ZERO);
    }

    #[test]
    fn test_optional_conversions() {
        assert_eq!(opt_reading_to_decimal(None), None);
        assert_eq!(opt_coordinate_to_decimal(None), None);
        assert_eq!(opt_dec_to_f64(None), None);
        let d = Decimal::from_str("1013.2").unwrap();
        assert!((opt_dec_to_f64(Some(d)).unwrap() - 1013.2).abs() < 1e-10);
    }
}
