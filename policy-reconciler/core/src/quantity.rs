//! Kubernetes resource quantities.
//!
//! The API server canonicalizes the quantities it stores (`0.5` comes back as
//! `500m`, `1024Mi` as `1Gi`), so desired and observed values have to be
//! compared by magnitude rather than by their text.

use std::{fmt, str::FromStr};

/// A quantity held as a signed count of nano-units.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity {
    nanos: i128,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid quantity: {0:?}")]
pub struct InvalidQuantity(pub String);

const NANOS_PER_UNIT: i128 = 1_000_000_000;

// Decimal exponents outside this range cannot be represented in nanos
// without overflowing.
const MAX_EXPONENT: i32 = 27;
const MIN_EXPONENT: i32 = -30;

// The largest number of significant digits accepted in the numeric part.
const MAX_DIGITS: usize = 30;

// === impl Quantity ===

impl Quantity {
    pub fn from_nanos(nanos: i128) -> Self {
        Self { nanos }
    }

    pub fn nanos(&self) -> i128 {
        self.nanos
    }

    /// Returns the value in milli-units, rounded up.
    pub fn as_millis(&self) -> i128 {
        div_ceil(self.nanos, 1_000_000)
    }
}

impl FromStr for Quantity {
    type Err = InvalidQuantity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidQuantity(s.to_string());

        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let split = body
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(body.len());
        let (number, suffix) = body.split_at(split);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if frac_part.contains('.') {
            return Err(invalid());
        }

        let digits = format!("{int_part}{frac_part}");
        let digits = digits.trim_start_matches('0');
        if digits.len() > MAX_DIGITS {
            return Err(invalid());
        }
        let mantissa = if digits.is_empty() {
            0
        } else {
            digits.parse::<i128>().map_err(|_| invalid())?
        };

        let frac_len = u32::try_from(frac_part.len()).map_err(|_| invalid())?;
        let scale = 10i128.checked_pow(frac_len).ok_or_else(invalid)?;

        let (num, den) = multiplier(suffix).ok_or_else(invalid)?;
        let numerator = mantissa.checked_mul(num).ok_or_else(invalid)?;
        let denominator = scale.checked_mul(den).ok_or_else(invalid)?;
        let magnitude = div_ceil(numerator, denominator);

        Ok(Self {
            nanos: if negative { -magnitude } else { magnitude },
        })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos % NANOS_PER_UNIT == 0 {
            return write!(f, "{}", self.nanos / NANOS_PER_UNIT);
        }
        if self.nanos % 1_000_000 == 0 {
            return write!(f, "{}m", self.nanos / 1_000_000);
        }
        if self.nanos % 1_000 == 0 {
            return write!(f, "{}u", self.nanos / 1_000);
        }
        write!(f, "{}n", self.nanos)
    }
}

/// Compares two quantity strings by magnitude.
///
/// Values that do not parse are compared textually.
pub fn same_quantity(a: &str, b: &str) -> bool {
    match (a.parse::<Quantity>(), b.parse::<Quantity>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Returns the (numerator, denominator) that converts one suffixed unit into
/// nanos.
fn multiplier(suffix: &str) -> Option<(i128, i128)> {
    let binary = |shift: u32| Some((NANOS_PER_UNIT << shift, 1));
    let decimal = |exp: i32| {
        let exp = exp + 9;
        if exp >= 0 {
            Some((10i128.checked_pow(exp as u32)?, 1))
        } else {
            Some((1, 10i128.checked_pow(exp.unsigned_abs())?))
        }
    };

    match suffix {
        "" => decimal(0),
        "Ki" => binary(10),
        "Mi" => binary(20),
        "Gi" => binary(30),
        "Ti" => binary(40),
        "Pi" => binary(50),
        "Ei" => binary(60),
        "n" => decimal(-9),
        "u" => decimal(-6),
        "m" => decimal(-3),
        "k" => decimal(3),
        "M" => decimal(6),
        "G" => decimal(9),
        "T" => decimal(12),
        "P" => decimal(15),
        "E" => decimal(18),
        _ => {
            let exp = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))?
                .parse::<i32>()
                .ok()?;
            if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exp) {
                return None;
            }
            decimal(exp)
        }
    }
}

fn div_ceil(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    if numerator % denominator > 0 {
        quotient + 1
    } else {
        quotient
    }
}
