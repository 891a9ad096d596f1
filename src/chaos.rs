/// Chaotic sequence generation using the Logistic Map
/// Produces keyed, reproducible sequences whose sort order yields permutations
use crate::decimal::Decimal;
use crate::error::{CryptoError, Result};
use std::cmp::Ordering;
use std::fmt;
use tracing::warn;

/// Lower bound of `mu` for chaotic behaviour
pub const MU_MIN: f64 = 3.57;
/// Upper bound of `mu`; larger values diverge
pub const MU_MAX: f64 = 4.0;

/// Numeric backend for the logistic map.
///
/// Encryption and decryption must run the same backend: the two
/// implementations round differently and produce different permutations.
pub trait ChaosBackend: Clone + fmt::Debug + fmt::Display {
    /// Short name used in log output
    const NAME: &'static str;

    fn parse_value(text: &str) -> Result<Self>;
    fn from_i64(value: i64) -> Self;
    fn one() -> Self;
    fn add(&self, rhs: &Self) -> Self;
    fn sub(&self, rhs: &Self) -> Self;
    fn mul(&self, rhs: &Self) -> Self;
    /// `floor(self) mod modulus`, in `0..modulus`
    fn floor_mod(&self, modulus: u32) -> u32;
    /// Total order used for sorting chaos values
    fn total_cmp(&self, other: &Self) -> Ordering;
    fn to_f64(&self) -> f64;

    /// One logistic step: `mu * x * (1 - x)`
    fn logistic(&self, mu: &Self) -> Self {
        mu.mul(self).mul(&Self::one().sub(self))
    }
}

impl ChaosBackend for f32 {
    const NAME: &'static str = "f32";

    fn parse_value(text: &str) -> Result<Self> {
        text.trim()
            .parse::<f32>()
            .map_err(|_| CryptoError::InvalidDecimal(text.to_string()))
    }

    fn from_i64(value: i64) -> Self {
        value as f32
    }

    fn one() -> Self {
        1.0
    }

    fn add(&self, rhs: &Self) -> Self {
        self + rhs
    }

    fn sub(&self, rhs: &Self) -> Self {
        self - rhs
    }

    fn mul(&self, rhs: &Self) -> Self {
        self * rhs
    }

    fn floor_mod(&self, modulus: u32) -> u32 {
        let floor = self.floor();
        if modulus == 0 || !floor.is_finite() {
            return 0;
        }
        (floor as i64).rem_euclid(modulus as i64) as u32
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        f32::total_cmp(self, other)
    }

    fn to_f64(&self) -> f64 {
        *self as f64
    }
}

impl ChaosBackend for Decimal {
    const NAME: &'static str = "decimal";

    fn parse_value(text: &str) -> Result<Self> {
        text.parse()
    }

    fn from_i64(value: i64) -> Self {
        Decimal::from_i64(value)
    }

    fn one() -> Self {
        Decimal::one()
    }

    fn add(&self, rhs: &Self) -> Self {
        self + rhs
    }

    fn sub(&self, rhs: &Self) -> Self {
        self - rhs
    }

    fn mul(&self, rhs: &Self) -> Self {
        self * rhs
    }

    fn floor_mod(&self, modulus: u32) -> u32 {
        Decimal::floor_mod(self, modulus)
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn to_f64(&self) -> f64 {
        Decimal::to_f64(self)
    }
}

/// A generated chaotic value tagged with its generation index
#[derive(Debug, Clone)]
pub struct ChaosValue<B> {
    pub value: B,
    pub original_index: usize,
    pub sign_flip: bool,
}

/// Logistic Map chaos generator
/// x(n+1) = mu * x(n) * (1 - x(n))
/// where mu ∈ [3.57, 4.0] for chaotic behavior
#[derive(Debug, Clone)]
pub struct LogisticMap<B: ChaosBackend> {
    state: B,
    mu: B,
    iteration: usize,
}

impl<B: ChaosBackend> LogisticMap<B> {
    /// Start a map at `x0`. The first value produced is `mu * x0 * (1 - x0)`.
    ///
    /// `mu` is not range checked here; see [`warn_if_not_chaotic`].
    pub fn new(x0: B, mu: B) -> Self {
        Self {
            state: x0,
            mu,
            iteration: 0,
        }
    }

    /// Generate next chaotic value
    pub fn next_value(&mut self) -> B {
        self.state = self.state.logistic(&self.mu);
        self.iteration += 1;
        self.state.clone()
    }

    /// Last value produced, or `x0` before the first step
    pub fn current(&self) -> &B {
        &self.state
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Run `steps` iterations without keeping the values
    pub fn advance(&mut self, steps: usize) {
        for _ in 0..steps {
            self.state = self.state.logistic(&self.mu);
        }
        self.iteration += steps;
    }

    /// Next `n` values in generation order, indexed from 0
    pub fn take_unsorted(&mut self, n: usize) -> Result<Vec<ChaosValue<B>>> {
        if n == 0 {
            return Err(CryptoError::InvalidLength);
        }
        Ok((0..n)
            .map(|original_index| ChaosValue {
                value: self.next_value(),
                original_index,
                sign_flip: false,
            })
            .collect())
    }

    /// Next `n` values sorted ascending (ties by generation index)
    pub fn take_sorted(&mut self, n: usize) -> Result<Vec<ChaosValue<B>>> {
        let mut seq = self.take_unsorted(n)?;
        sort_chaos(&mut seq);
        Ok(seq)
    }

    /// Permutation derived from the next `n` values
    pub fn take_permutation(&mut self, n: usize) -> Result<Vec<usize>> {
        Ok(permutation_of(&self.take_sorted(n)?))
    }
}

impl<B: ChaosBackend> Iterator for LogisticMap<B> {
    type Item = B;

    fn next(&mut self) -> Option<B> {
        Some(self.next_value())
    }
}

/// Whether `mu` lies in `[3.57, 4.0]`.
pub fn is_chaotic<B: ChaosBackend>(mu: &B) -> bool {
    (MU_MIN..=MU_MAX).contains(&mu.to_f64())
}

/// Log a warning when `mu` is outside the chaotic range.
///
/// Such a `mu` is accepted, but the sequence is then periodic or divergent
/// and makes a poor permutation source.
pub fn warn_if_not_chaotic<B: ChaosBackend>(mu: &B) {
    if !is_chaotic(mu) {
        warn!(mu = mu.to_f64(), "mu outside the chaotic range [3.57, 4.0]");
    }
}

/// Stable ascending sort by value, ties broken by `original_index`.
pub fn sort_chaos<B: ChaosBackend>(seq: &mut [ChaosValue<B>]) {
    seq.sort_by(|a, b| {
        a.value
            .total_cmp(&b.value)
            .then(a.original_index.cmp(&b.original_index))
    });
}

/// `sorted_index -> original_index` for a sorted sequence.
pub fn permutation_of<B>(sorted: &[ChaosValue<B>]) -> Vec<usize> {
    sorted.iter().map(|c| c.original_index).collect()
}

/// `n` chaos values starting from `x0`, sorted.
pub fn generate<B: ChaosBackend>(n: usize, x0: &B, mu: &B) -> Result<Vec<ChaosValue<B>>> {
    warn_if_not_chaotic(mu);
    LogisticMap::new(x0.clone(), mu.clone()).take_sorted(n)
}

/// `n` chaos values starting from `x0`, in generation order.
pub fn generate_unsorted<B: ChaosBackend>(
    n: usize,
    x0: &B,
    mu: &B,
) -> Result<Vec<ChaosValue<B>>> {
    warn_if_not_chaotic(mu);
    LogisticMap::new(x0.clone(), mu.clone()).take_unsorted(n)
}

/// Continue a chain from the last value of a previous run.
///
/// Identical to [`generate`] with `x0 = last_value`; the name documents the
/// intent at row-chaining call sites.
pub fn generate_continuing<B: ChaosBackend>(
    n: usize,
    last_value: &B,
    mu: &B,
) -> Result<Vec<ChaosValue<B>>> {
    generate(n, last_value, mu)
}
