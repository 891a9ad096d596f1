//! Fixed-point arbitrary-precision decimal numbers
//!
//! Values are stored as an integer scaled by `10^DECIMAL_DIGITS`, so every
//! operation is exact up to the last fractional digit and truncation happens
//! at the same place on every platform. This is the precise backend for the
//! chaotic generator and the canonical textual form of key material.

use crate::error::{CryptoError, Result};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;
use std::sync::OnceLock;

/// Number of fractional decimal digits carried by every [`Decimal`].
pub const DECIMAL_DIGITS: u32 = 500;

// Keeps `10^shift` within a sane size while parsing exponents.
const MAX_EXPONENT: u64 = 4096;

fn scale() -> &'static BigInt {
    static SCALE: OnceLock<BigInt> = OnceLock::new();
    SCALE.get_or_init(|| BigInt::from(10u32).pow(DECIMAL_DIGITS))
}

fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}

/// Decimal number with a fixed number of fractional digits
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Decimal {
    scaled: BigInt,
}

impl Decimal {
    pub fn zero() -> Self {
        Self { scaled: BigInt::zero() }
    }

    pub fn one() -> Self {
        Self { scaled: scale().clone() }
    }

    pub fn from_i64(value: i64) -> Self {
        Self { scaled: BigInt::from(value) * scale() }
    }

    /// Largest integer not greater than `self`.
    pub fn floor(&self) -> BigInt {
        self.scaled.div_floor(scale())
    }

    /// `floor(self) mod modulus`, always in `0..modulus`.
    pub fn floor_mod(&self, modulus: u32) -> u32 {
        if modulus == 0 {
            return 0;
        }
        self.floor()
            .mod_floor(&BigInt::from(modulus))
            .to_u32()
            .unwrap_or(0)
    }

    /// Nearest `f64`; only meant for diagnostics and range checks.
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(f64::NAN)
    }
}

impl FromStr for Decimal {
    type Err = CryptoError;

    /// Accepts `[+-]digits[.digits][(e|E)[+-]digits]`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CryptoError::InvalidDecimal(s.to_string());
        let text = s.trim();

        let (negative, body) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        let (mantissa, exponent) = match body.find(|c| c == 'e' || c == 'E') {
            Some(pos) => {
                let exp: i64 = body[pos + 1..].parse().map_err(|_| invalid())?;
                (&body[..pos], exp)
            }
            None => (body, 0),
        };
        if exponent.unsigned_abs() > MAX_EXPONENT {
            return Err(invalid());
        }

        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(int_part) || !is_digits(frac_part) {
            return Err(invalid());
        }

        let digits = format!("{int_part}{frac_part}");
        let mut scaled = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(invalid)?;

        let shift = exponent - frac_part.len() as i64 + DECIMAL_DIGITS as i64;
        match shift.cmp(&0) {
            Ordering::Greater => scaled *= pow10(shift as u32),
            Ordering::Less => {
                let down = u32::try_from(-shift).map_err(|_| invalid())?;
                scaled /= pow10(down);
            }
            Ordering::Equal => {}
        }

        if negative {
            scaled = -scaled;
        }
        Ok(Self { scaled })
    }
}

impl fmt::Display for Decimal {
    /// Fixed notation with exactly [`DECIMAL_DIGITS`] fractional digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (int_part, frac_part) = self.scaled.abs().div_rem(scale());
        let sign = if self.scaled.is_negative() { "-" } else { "" };
        write!(
            f,
            "{sign}{int_part}.{:0>width$}",
            frac_part.to_string(),
            width = DECIMAL_DIGITS as usize
        )
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.scaled.cmp(&other.scaled)
    }
}

impl Add for &Decimal {
    type Output = Decimal;

    fn add(self, rhs: &Decimal) -> Decimal {
        Decimal { scaled: &self.scaled + &rhs.scaled }
    }
}

impl Sub for &Decimal {
    type Output = Decimal;

    fn sub(self, rhs: &Decimal) -> Decimal {
        Decimal { scaled: &self.scaled - &rhs.scaled }
    }
}

impl Mul for &Decimal {
    type Output = Decimal;

    // Truncates toward zero after the last fractional digit.
    fn mul(self, rhs: &Decimal) -> Decimal {
        Decimal { scaled: (&self.scaled * &rhs.scaled) / scale() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_plain_and_scientific() {
        assert_eq!(dec("0.555"), dec("5.55e-1"));
        assert_eq!(dec("3.577777777777777777e0"), dec("3.577777777777777777"));
        assert_eq!(dec("+12"), Decimal::from_i64(12));
        assert_eq!(dec("-0.25"), &Decimal::zero() - &dec("0.25"));
        assert_eq!(dec(".5"), dec("0.5"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "abc", "1.2.3", "e5", "1e", "--1", "1,5", "0x10", "1e99999"] {
            assert!(bad.parse::<Decimal>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_display_has_fixed_width() {
        let text = dec("0.5").to_string();
        assert!(text.starts_with("0.5000"));
        assert_eq!(text.len(), 2 + DECIMAL_DIGITS as usize);

        let negative = dec("-1.25").to_string();
        assert!(negative.starts_with("-1.25000"));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(&dec("0.5") * &dec("0.5"), dec("0.25"));
        assert_eq!(&dec("3.57") * &dec("0.25"), dec("0.8925"));
        assert_eq!(&dec("1") - &dec("0.8925"), dec("0.1075"));
        assert_eq!(&dec("1.5") + &dec("2.25"), dec("3.75"));
        assert!(dec("0.3") < dec("0.31"));
    }

    #[test]
    fn test_floor_mod() {
        assert_eq!(dec("300.9").floor_mod(256), 44);
        assert_eq!(dec("-0.5").floor_mod(256), 255);
        assert_eq!(dec("255.999").floor_mod(256), 255);
        assert_eq!(dec("7").floor_mod(0), 0);
    }

    #[test]
    fn test_to_f64() {
        assert!((dec("0.8925").to_f64() - 0.8925).abs() < 1e-12);
    }
}
