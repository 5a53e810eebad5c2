//! Dynamically-typed values reported by the boiler controller.
//!
//! The controller answers every read with a flat list of `key=value` pairs
//! in plain text.  Nothing on the wire says whether `65.0` is a temperature or
//! `5` is a state code, so the value type is inferred from the text:
//!
//! | wire text           | decoded as              |
//! |---------------------|-------------------------|
//! | `true` / `false`    | [`Value::Bool`]         |
//! | `-12`, `2500`       | [`Value::Int`]          |
//! | `65.0`, `-0.5`      | [`Value::Float`]        |
//! | anything else       | [`Value::Str`]          |
//!
//! # Why not store an `f64`? (for beginners)
//!
//! The controller displays every decimal reading with one digit after the
//! point.  A binary `f64` cannot represent `0.1` exactly, so two readings
//! that the device considers identical (`65.0` and `65.04`) would compare as
//! different and trigger a change notification that nobody asked for.
//! [`RoundedFloat`] stores the value as an integer number of tenths instead,
//! which makes equality exact and `Hash`/`Eq` derivable.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A mapping from key to typed value, as carried in a response payload.
///
/// A `BTreeMap` keeps the keys sorted so encoding is deterministic.
pub type Payload = BTreeMap<String, Value>;

/// A decimal number fixed to the controller's reporting precision (one decimal place).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoundedFloat {
    tenths: i64,
}

impl RoundedFloat {
    /// Number of digits after the decimal point the controller reports.
    pub const DECIMALS: u32 = 1;

    const SCALE: f64 = 10.0;

    /// Rounds `value` to one decimal place.
    ///
    /// ```rust
    /// use nbe_core::RoundedFloat;
    ///
    /// assert_eq!(RoundedFloat::new(65.04), RoundedFloat::new(65.0));
    /// assert_ne!(RoundedFloat::new(65.0), RoundedFloat::new(66.0));
    /// ```
    pub fn new(value: f64) -> Self {
        Self {
            tenths: (value * Self::SCALE).round() as i64,
        }
    }

    /// Builds a value directly from a count of tenths (`655` is `65.5`).
    pub const fn from_tenths(tenths: i64) -> Self {
        Self { tenths }
    }

    /// The value as an integer count of tenths.
    pub const fn tenths(self) -> i64 {
        self.tenths
    }

    /// The value as a floating-point number, for arithmetic and display only.
    pub fn as_f64(self) -> f64 {
        self.tenths as f64 / Self::SCALE
    }
}

impl From<f64> for RoundedFloat {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for RoundedFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.tenths < 0 { "-" } else { "" };
        let magnitude = self.tenths.unsigned_abs();
        write!(f, "{sign}{}.{}", magnitude / 10, magnitude % 10)
    }
}

impl FromStr for RoundedFloat {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<f64>().map(Self::new)
    }
}

/// A single typed value from a response payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(RoundedFloat),
    Str(String),
}

impl Value {
    /// Infers the type of a value from its wire text.
    ///
    /// Never fails: text that is not a boolean or a number is kept as a string.
    pub fn from_wire(text: &str) -> Self {
        match text {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(i) = text.parse::<i64>() {
            return Value::Int(i);
        }
        if looks_decimal(text) {
            if let Ok(f) = text.parse::<RoundedFloat>() {
                return Value::Float(f);
            }
        }
        Value::Str(text.to_string())
    }

    /// Returns the wire text for this value.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }

    /// Returns the string contents if this is a [`Value::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// `true` for `[-]digits.digits`; keeps `inf`, `NaN` and `1e5` as strings.
fn looks_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    match unsigned.split_once('.') {
        Some((whole, frac)) => {
            !whole.is_empty()
                && !frac.is_empty()
                && whole.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(r) => write!(f, "{r}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<RoundedFloat> for Value {
    fn from(r: RoundedFloat) -> Self {
        Value::Float(r)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_float_ignores_noise_below_precision() {
        // Arrange
        let stored = RoundedFloat::new(65.0);

        // Act
        let observed = RoundedFloat::new(65.04);

        // Assert
        assert_eq!(stored, observed);
    }

    #[test]
    fn test_rounded_float_detects_change_at_precision() {
        assert_ne!(RoundedFloat::new(65.0), RoundedFloat::new(65.1));
    }

    #[test]
    fn test_rounded_float_display_always_has_one_decimal() {
        assert_eq!(RoundedFloat::new(65.0).to_string(), "65.0");
        assert_eq!(RoundedFloat::new(125.26).to_string(), "125.3");
        assert_eq!(RoundedFloat::new(-0.5).to_string(), "-0.5");
        assert_eq!(RoundedFloat::new(-12.3).to_string(), "-12.3");
    }

    #[test]
    fn test_rounded_float_from_tenths_matches_new() {
        assert_eq!(RoundedFloat::from_tenths(625), RoundedFloat::new(62.5));
        assert_eq!(RoundedFloat::new(62.5).tenths(), 625);
    }

    #[test]
    fn test_value_from_wire_infers_types() {
        assert_eq!(Value::from_wire("true"), Value::Bool(true));
        assert_eq!(Value::from_wire("false"), Value::Bool(false));
        assert_eq!(Value::from_wire("2500"), Value::Int(2500));
        assert_eq!(Value::from_wire("-3"), Value::Int(-3));
        assert_eq!(
            Value::from_wire("62.5"),
            Value::Float(RoundedFloat::new(62.5))
        );
        assert_eq!(Value::from_wire("ABC123"), Value::Str("ABC123".into()));
    }

    #[test]
    fn test_value_from_wire_keeps_non_decimal_floats_as_strings() {
        assert_eq!(Value::from_wire("NaN"), Value::Str("NaN".into()));
        assert_eq!(Value::from_wire("1e5"), Value::Str("1e5".into()));
        assert_eq!(Value::from_wire(".5"), Value::Str(".5".into()));
    }

    #[test]
    fn test_value_from_wire_rounds_extra_decimals() {
        assert_eq!(
            Value::from_wire("65.04"),
            Value::Float(RoundedFloat::new(65.0))
        );
    }

    #[test]
    fn test_value_to_wire_round_trips_every_variant() {
        let values = [
            Value::Bool(false),
            Value::Int(-42),
            Value::Float(RoundedFloat::new(48.5)),
            Value::Str("Power".into()),
        ];
        for value in values {
            assert_eq!(Value::from_wire(&value.to_wire()), value);
        }
    }

    #[test]
    fn test_value_as_str_only_for_strings() {
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from(1_i64).as_str(), None);
    }
}
