//! Key-derived pseudorandom bit streams for sign flipping
//!
//! Both streams start from `H = SHA512(dec(x0)) || SHA512(dec(mu))`, where
//! `dec()` is the fixed 500-digit rendering of [`Decimal`]. Formatting is part
//! of the key: a different rendering yields a different stream.

use crate::decimal::Decimal;
use rand::{RngCore, SeedableRng};
use rand_isaac::IsaacRng;
use sha2::{Digest, Sha256, Sha512};

/// Words drawn from ISAAC per refill
pub const ISAAC_BLOCK_WORDS: usize = 256;
const ISAAC_BLOCK_BYTES: usize = ISAAC_BLOCK_WORDS * 4;
/// Bits consumed before the next block is drawn
pub const ISAAC_BLOCK_BITS: usize = 2048;
// Bytes addressed by the cursor, from the front of the block
const ISAAC_INDEXED_BYTES: usize = 256;

/// Sequential bit source consumed by sign-flip diffusion
pub trait SignBitStream {
    fn next_bit(&mut self) -> bool;
}

/// Initial 128 bytes of the SHA-512 chain
pub fn key_hash(x0: &Decimal, mu: &Decimal) -> Vec<u8> {
    let mut hash = Vec::with_capacity(128);
    hash.extend_from_slice(&Sha512::digest(x0.to_string().as_bytes()));
    hash.extend_from_slice(&Sha512::digest(mu.to_string().as_bytes()));
    hash
}

/// Parity of each byte of the SHA-512 chain; `n` flags.
pub fn derive_sign_flips(x0: &Decimal, mu: &Decimal, n: usize) -> Vec<bool> {
    let mut stream = ShaBitStream::new(x0, mu);
    (0..n).map(|_| stream.next_bit()).collect()
}

/// Bit `i` is `popcount(H[i]) mod 2` over the growing chain
/// `H ← H || SHA512(H)`.
pub struct ShaBitStream {
    chain: Vec<u8>,
    // Running hash over all of `chain`, so each extension costs one digest
    hasher: Sha512,
    cursor: usize,
}

impl ShaBitStream {
    pub fn new(x0: &Decimal, mu: &Decimal) -> Self {
        let chain = key_hash(x0, mu);
        let mut hasher = Sha512::new();
        hasher.update(&chain);
        Self {
            chain,
            hasher,
            cursor: 0,
        }
    }

    fn extend(&mut self) {
        let digest = self.hasher.clone().finalize();
        self.hasher.update(digest);
        self.chain.extend_from_slice(&digest);
    }

    /// Bytes of the chain materialized so far
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }
}

impl SignBitStream for ShaBitStream {
    fn next_bit(&mut self) -> bool {
        while self.cursor >= self.chain.len() {
            self.extend();
        }
        let bit = self.chain[self.cursor].count_ones() % 2 == 1;
        self.cursor += 1;
        bit
    }
}

/// ISAAC generator seeded from a SHA-256 digest of the whole key hash.
///
/// A 256-word block is drawn every [`ISAAC_BLOCK_BITS`] bits. Bit `i` of the
/// block tests bit `i mod 8` of byte `i mod 256` of the block serialized
/// little-endian.
pub struct IsaacBitStream {
    rng: IsaacRng,
    block: [u8; ISAAC_BLOCK_BYTES],
    cursor: usize,
}

impl IsaacBitStream {
    pub fn new(x0: &Decimal, mu: &Decimal) -> Self {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&Sha256::digest(key_hash(x0, mu)));
        let mut stream = Self {
            rng: IsaacRng::from_seed(seed),
            block: [0u8; ISAAC_BLOCK_BYTES],
            cursor: 0,
        };
        stream.refill();
        stream
    }

    fn refill(&mut self) {
        for word in self.block.chunks_exact_mut(4) {
            word.copy_from_slice(&self.rng.next_u32().to_le_bytes());
        }
        self.cursor = 0;
    }
}

impl SignBitStream for IsaacBitStream {
    fn next_bit(&mut self) -> bool {
        if self.cursor == ISAAC_BLOCK_BITS {
            self.refill();
        }
        let byte = self.block[self.cursor % ISAAC_INDEXED_BYTES];
        let bit = (byte >> (self.cursor % 8)) & 1 == 1;
        self.cursor += 1;
        bit
    }
}
