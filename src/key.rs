//! Secret key material and derived sub-keys
//!
//! A key is two decimal strings, `x0` and `mu`. They are kept as text so the
//! precise backend sees every digit the caller supplied. The diffusion
//! parameters `alpha` and `beta` are re-read from the digits at the tail of
//! each string.

use crate::chaos::ChaosBackend;
use crate::decimal::Decimal;
use crate::error::{CryptoError, Result};
use rand::Rng;
use std::fmt;
use zeroize::Zeroize;

/// Digits copied from the key tail into `alpha`/`beta`
pub const SUBKEY_WINDOW: usize = 16;
/// Shortest key string accepted for sub-key derivation
pub const MIN_KEY_LEN: usize = 19;
/// Fewest significant digits [`CryptoKey::generate`] will produce
pub const MIN_GENERATED_DIGITS: usize = 18;

const SUBKEY_PREFIX: &str = "3.9";
const SUBKEY_EXPONENT: &str = "e0";

/// The secret pair `(x0, mu)`
#[derive(Clone, PartialEq, Eq)]
pub struct CryptoKey {
    x0: String,
    mu: String,
}

impl CryptoKey {
    /// Both values must be non-empty decimal literals.
    pub fn new(x0: impl Into<String>, mu: impl Into<String>) -> Result<Self> {
        let key = Self {
            x0: x0.into(),
            mu: mu.into(),
        };
        for (name, value) in [("x0", &key.x0), ("mu", &key.mu)] {
            if value.trim().is_empty() {
                return Err(CryptoError::KeyDerivation(format!("{name} cannot be empty")));
            }
            value.parse::<Decimal>()?;
        }
        Ok(key)
    }

    /// Fixed key for tests and demos. Never use it to protect real images.
    pub fn test_key() -> Self {
        Self {
            x0: "5.55555555555555555556e-1".to_string(),
            mu: "3.577777777777777777e0".to_string(),
        }
    }

    /// Fresh random key from the OS RNG.
    pub fn generate(x0_digits: usize, mu_digits: usize) -> Self {
        Self::generate_with(&mut rand::rngs::OsRng, x0_digits, mu_digits)
    }

    /// Random key with `x0 ∈ [0.5, 1.0)` and `mu ∈ [3.6, 4.0)`.
    ///
    /// Digit counts below [`MIN_GENERATED_DIGITS`] are raised so the result
    /// always supports sub-key derivation.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, x0_digits: usize, mu_digits: usize) -> Self {
        let x0_digits = x0_digits.max(MIN_GENERATED_DIGITS);
        let mu_digits = mu_digits.max(MIN_GENERATED_DIGITS);

        // x0 = d.ddd…e-1 with a leading digit in 5..=9
        let mut x0 = String::with_capacity(x0_digits + 4);
        x0.push(char::from(b'0' + rng.gen_range(5..=9u8)));
        x0.push('.');
        for _ in 1..x0_digits {
            x0.push(char::from(b'0' + rng.gen_range(0..=9u8)));
        }
        x0.push_str("e-1");

        // mu = 3.ddd…e0 with a first fractional digit in 6..=9
        let mut mu = String::with_capacity(mu_digits + 3);
        mu.push_str("3.");
        mu.push(char::from(b'0' + rng.gen_range(6..=9u8)));
        for _ in 2..mu_digits {
            mu.push(char::from(b'0' + rng.gen_range(0..=9u8)));
        }
        mu.push_str("e0");

        Self { x0, mu }
    }

    pub fn x0(&self) -> &str {
        &self.x0
    }

    pub fn mu(&self) -> &str {
        &self.mu
    }

    pub fn alpha(&self) -> Result<String> {
        construct_alpha_beta(&self.x0)
    }

    pub fn beta(&self) -> Result<String> {
        construct_alpha_beta(&self.mu)
    }

    /// Parse every value a pipeline run needs with backend `B`.
    ///
    /// Fails before any coefficient is touched when a key string is too short
    /// or malformed.
    pub fn subkeys<B: ChaosBackend>(&self) -> Result<SubKeys<B>> {
        let alpha = self.alpha()?;
        let beta = self.beta()?;
        Ok(SubKeys {
            x0: B::parse_value(&self.x0)?,
            mu: B::parse_value(&self.mu)?,
            alpha: B::parse_value(&alpha)?,
            beta: B::parse_value(&beta)?,
            x0_decimal: self.x0.parse()?,
            mu_decimal: self.mu.parse()?,
        })
    }
}

impl fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoKey")
            .field("x0", &"<redacted>")
            .field("mu", &"<redacted>")
            .finish()
    }
}

impl Drop for CryptoKey {
    fn drop(&mut self) {
        self.x0.zeroize();
        self.mu.zeroize();
    }
}

/// Key values parsed for one backend, plus their precise forms
#[derive(Debug, Clone)]
pub struct SubKeys<B> {
    pub x0: B,
    pub mu: B,
    pub alpha: B,
    pub beta: B,
    /// Precise `x0`, the input of the hash-derived sign streams
    pub x0_decimal: Decimal,
    /// Precise `mu`, the input of the hash-derived sign streams
    pub mu_decimal: Decimal,
}

/// Build `"3.9" + <16 key digits> + "e0"`.
///
/// The 16 digits end one character before the end of the key's mantissa;
/// an exponent suffix (`e0`, `e-1`, …) is not part of the mantissa.
pub fn construct_alpha_beta(key: &str) -> Result<String> {
    if key.len() < MIN_KEY_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "key string has {} characters, need at least {}",
            key.len(),
            MIN_KEY_LEN
        )));
    }

    let mantissa_len = key.find(|c| c == 'e' || c == 'E').unwrap_or(key.len());
    let end = mantissa_len.checked_sub(1).ok_or_else(|| {
        CryptoError::KeyDerivation("key string has an empty mantissa".to_string())
    })?;
    let start = end.checked_sub(SUBKEY_WINDOW).ok_or_else(|| {
        CryptoError::KeyDerivation(format!(
            "mantissa has {} characters, need at least {}",
            mantissa_len,
            SUBKEY_WINDOW + 1
        ))
    })?;

    let window = key.get(start..end).ok_or_else(|| {
        CryptoError::KeyDerivation("sub-key window is not on a character boundary".to_string())
    })?;
    if !window.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CryptoError::KeyDerivation(format!(
            "sub-key window {window:?} is not all digits"
        )));
    }

    Ok(format!("{SUBKEY_PREFIX}{window}{SUBKEY_EXPONENT}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_alpha_beta_from_test_key() {
        let key = CryptoKey::test_key();
        assert_eq!(key.alpha().unwrap(), format!("3.9{}e0", "5".repeat(16)));
        assert_eq!(key.beta().unwrap(), format!("3.9{}e0", "7".repeat(16)));
    }

    #[test]
    fn test_alpha_window_position() {
        // mantissa "0.1234567890123456789": window drops the final '9'
        let alpha = construct_alpha_beta("0.1234567890123456789").unwrap();
        assert_eq!(alpha, "3.93456789012345678e0");
    }

    #[test]
    fn test_short_keys_rejected() {
        for short in ["", "0.5", "0.123456789012345", "0.1234567890123456"] {
            assert!(short.len() < MIN_KEY_LEN);
            assert!(matches!(
                construct_alpha_beta(short),
                Err(CryptoError::KeyDerivation(_))
            ));
        }
    }

    #[test]
    fn test_window_with_dot_rejected() {
        // long enough overall, but the window would include the decimal point
        assert!(construct_alpha_beta("1.234567890123456e-100").is_err());
        assert!(construct_alpha_beta("12345678901234567.8e0").is_err());
    }

    #[test]
    fn test_multibyte_key_does_not_panic() {
        assert!(construct_alpha_beta("0.1234567890123456789é").is_err());
        assert!(construct_alpha_beta("ééééééééééééééééééééé").is_err());
    }

    #[test]
    fn test_new_validates() {
        assert!(CryptoKey::new("", "3.7").is_err());
        assert!(CryptoKey::new("0.5", "three").is_err());
        assert!(CryptoKey::new("0.5", "3.7").is_ok());
    }

    #[test]
    fn test_subkeys_parse() {
        let keys = CryptoKey::test_key().subkeys::<f32>().unwrap();
        assert!((keys.x0 - 0.555_555_6).abs() < 1e-6);
        assert!((keys.mu - 3.577_777_7).abs() < 1e-6);
        assert!((keys.alpha - 3.955_555_5).abs() < 1e-6);

        let short = CryptoKey::new("0.5", "3.57").unwrap();
        assert!(short.subkeys::<Decimal>().is_err());
    }

    #[test]
    fn test_generated_keys_are_usable() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..20 {
            let key = CryptoKey::generate_with(&mut rng, 20, 20);
            let keys = key.subkeys::<Decimal>().unwrap();
            let x0 = keys.x0_decimal.to_f64();
            let mu = keys.mu_decimal.to_f64();
            assert!((0.5..1.0).contains(&x0), "x0 = {x0}");
            assert!((3.6..4.0).contains(&mu), "mu = {mu}");
        }

        // too few digits are raised to the minimum
        let key = CryptoKey::generate_with(&mut rng, 3, 3);
        assert!(key.subkeys::<f32>().is_ok());
    }

    #[test]
    fn test_debug_redacts() {
        let text = format!("{:?}", CryptoKey::test_key());
        assert!(!text.contains("5555"));
    }
}
