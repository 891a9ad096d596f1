/// AC coefficient diffusion
/// Both transforms are their own inverse and leave zero coefficients alone
use crate::chaos::{ChaosBackend, LogisticMap};
use crate::coefficients::{BlockAccess, DCTSIZE2};
use crate::error::Result;
use crate::signs::SignBitStream;
use tracing::debug;

/// Range of the XOR key byte
pub const XOR_MODULUS: u32 = 256;

const AC_PER_BLOCK: usize = DCTSIZE2 - 1;

/// `floor(dc * alpha * c + beta * c) mod 256`
pub fn xor_key<B: ChaosBackend>(dc: i16, alpha: &B, beta: &B, c: &B) -> u8 {
    let dc_alpha = B::from_i64(dc as i64).mul(alpha);
    keyed_byte(&dc_alpha, beta, c)
}

fn keyed_byte<B: ChaosBackend>(dc_alpha: &B, beta: &B, c: &B) -> u8 {
    dc_alpha.mul(c).add(&beta.mul(c)).floor_mod(XOR_MODULUS) as u8
}

/// XOR the magnitude bits below the leading one with `key`.
///
/// Sign and bit length survive, so a non-zero value stays non-zero and
/// within `i16`. `i16::MIN` has no positive counterpart and is returned as is.
pub fn xor_magnitude(value: i16, key: u8) -> i16 {
    if value == 0 || value == i16::MIN {
        return value;
    }
    let magnitude = value.unsigned_abs();
    let top = u16::BITS - 1 - magnitude.leading_zeros();
    let mask = (1u16 << top) - 1;
    let mixed = (magnitude ^ (u16::from(key) & mask)) as i16;
    if value < 0 {
        -mixed
    } else {
        mixed
    }
}

/// Key every AC coefficient with the block's DC and one chaos value.
///
/// Each block row draws `63 * width` unsorted values from `map`, which keeps
/// running across rows and components. DC is read, never written.
pub fn diffuse_xor<S, B>(store: &mut S, map: &mut LogisticMap<B>, alpha: &B, beta: &B) -> Result<()>
where
    S: BlockAccess + ?Sized,
    B: ChaosBackend,
{
    for component in 0..store.num_components() {
        let (width, height) = store.dimensions(component);
        if width == 0 {
            continue;
        }
        for y in 0..height {
            let chaos = map.take_unsorted(AC_PER_BLOCK * width)?;
            let row = store.row_mut(component, y);
            for (block, values) in row.iter_mut().zip(chaos.chunks_exact(AC_PER_BLOCK)) {
                let dc_alpha = B::from_i64(block[0] as i64).mul(alpha);
                for (coef, c) in block[1..].iter_mut().zip(values) {
                    if *coef != 0 {
                        *coef = xor_magnitude(*coef, keyed_byte(&dc_alpha, beta, &c.value));
                    }
                }
            }
        }
        debug!(component, backend = B::NAME, "XOR diffusion applied");
    }
    Ok(())
}

/// Negate non-zero AC coefficients where the stream yields a set bit.
///
/// One bit is consumed per AC position, zero or not, so the stream position
/// depends only on the image geometry.
pub fn diffuse_sign_flip<S, R>(store: &mut S, stream: &mut R)
where
    S: BlockAccess + ?Sized,
    R: SignBitStream + ?Sized,
{
    for component in 0..store.num_components() {
        let (_, height) = store.dimensions(component);
        for y in 0..height {
            for block in store.row_mut(component, y).iter_mut() {
                for coef in block[1..].iter_mut() {
                    if stream.next_bit() && *coef != 0 {
                        *coef = coef.wrapping_neg();
                    }
                }
            }
        }
        debug!(component, "sign flips applied");
    }
}
