/// Channel-split ("Etc") variant
/// Shuffles 8x8 pixel blocks of a colour image and stores each channel as a
/// separate grayscale JPEG. The shuffle comes from ChaCha20, not the chaotic
/// generator, seeded from the key through HKDF-SHA256.
use crate::error::{CryptoError, Result};
use crate::key::CryptoKey;
use crate::permute::{apply_inverse, apply_permutation, PermuteMode};
use hkdf::Hkdf;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, RgbImage};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;
use std::io::{Read, Write};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Edge length of a shuffled pixel block
pub const BLOCK_SIZE: u32 = 8;

const SHUFFLE_INFO: &[u8] = b"jpeg-chaos-etc-shuffle-v1";

/// ChaCha20 seed derived from `x0 || 0x00 || mu`
fn shuffle_seed(key: &CryptoKey) -> Result<Zeroizing<[u8; 32]>> {
    let mut ikm = Zeroizing::new(Vec::with_capacity(key.x0().len() + key.mu().len() + 1));
    ikm.extend_from_slice(key.x0().as_bytes());
    ikm.push(0);
    ikm.extend_from_slice(key.mu().as_bytes());

    let hk = Hkdf::<Sha256>::new(None, &ikm);
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(SHUFFLE_INFO, &mut okm[..])
        .map_err(|_| CryptoError::KeyDerivation("HKDF expand failed".to_string()))?;
    Ok(okm)
}

/// Fisher-Yates shuffle of `0..count`; entry `i` names the source of block `i`.
pub fn block_shuffle(key: &CryptoKey, count: usize) -> Result<Vec<usize>> {
    let seed = shuffle_seed(key)?;
    let mut rng = ChaCha20Rng::from_seed(*seed);
    let mut perm: Vec<usize> = (0..count).collect();
    perm.shuffle(&mut rng);
    Ok(perm)
}

/// Full blocks across and down; edge strips are not counted
pub fn block_grid(width: u32, height: u32) -> (u32, u32) {
    (width / BLOCK_SIZE, height / BLOCK_SIZE)
}

fn copy_block(src: &RgbImage, dst: &mut RgbImage, from: (u32, u32), to: (u32, u32)) {
    for dy in 0..BLOCK_SIZE {
        for dx in 0..BLOCK_SIZE {
            let pixel = *src.get_pixel(from.0 + dx, from.1 + dy);
            dst.put_pixel(to.0 + dx, to.1 + dy, pixel);
        }
    }
}

fn rearrange(image: &RgbImage, key: &CryptoKey, inverse: bool) -> Result<RgbImage> {
    let (cols, rows) = block_grid(image.width(), image.height());
    let count = (cols * rows) as usize;
    let perm = block_shuffle(key, count)?;

    // Shuffle block indices, then move pixels by the resulting mapping
    let mut sources: Vec<usize> = (0..count).collect();
    if inverse {
        apply_inverse(&mut sources, &perm, PermuteMode::Gather)?;
    } else {
        apply_permutation(&mut sources, &perm, PermuteMode::Gather)?;
    }

    let origin = |index: usize| {
        let index = index as u32;
        ((index % cols) * BLOCK_SIZE, (index / cols) * BLOCK_SIZE)
    };
    let mut out = image.clone();
    for (dst, &src) in sources.iter().enumerate() {
        copy_block(image, &mut out, origin(src), origin(dst));
    }
    debug!(blocks = count, inverse, "pixel blocks rearranged");
    Ok(out)
}

/// Shuffle the full 8x8 blocks of `image`.
pub fn scramble_blocks(image: &RgbImage, key: &CryptoKey) -> Result<RgbImage> {
    rearrange(image, key, false)
}

/// Inverse of [`scramble_blocks`].
pub fn unscramble_blocks(image: &RgbImage, key: &CryptoKey) -> Result<RgbImage> {
    rearrange(image, key, true)
}

fn validate_quality(quality: u8) -> Result<()> {
    if !(1..=100).contains(&quality) {
        return Err(CryptoError::InvalidQuality(quality));
    }
    Ok(())
}

fn encode_jpeg(raw: &[u8], width: u32, height: u32, color: ExtendedColorType, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).write_image(raw, width, height, color)?;
    Ok(buf)
}

fn read_all<R: Read>(mut input: R) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Split a colour JPEG into three scrambled grayscale JPEGs.
///
/// Nothing is written unless all three channels encode successfully.
pub fn encrypt_jpeg_etc<R, WR, WG, WB>(
    input: R,
    mut red: WR,
    mut green: WG,
    mut blue: WB,
    key: &CryptoKey,
    quality: u8,
) -> Result<()>
where
    R: Read,
    WR: Write,
    WG: Write,
    WB: Write,
{
    validate_quality(quality)?;
    let bytes = read_all(input)?;
    let rgb = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)?.to_rgb8();
    let (width, height) = rgb.dimensions();

    let scrambled = scramble_blocks(&rgb, key)?;

    let mut planes = [Vec::new(), Vec::new(), Vec::new()];
    for plane in planes.iter_mut() {
        plane.reserve((width * height) as usize);
    }
    for pixel in scrambled.pixels() {
        for (plane, value) in planes.iter_mut().zip(pixel.0) {
            plane.push(value);
        }
    }

    let mut encoded = Vec::with_capacity(3);
    for plane in &planes {
        encoded.push(encode_jpeg(plane, width, height, ExtendedColorType::L8, quality)?);
    }

    red.write_all(&encoded[0])?;
    green.write_all(&encoded[1])?;
    blue.write_all(&encoded[2])?;
    red.flush()?;
    green.flush()?;
    blue.flush()?;

    info!(width, height, quality, "image split into scrambled channels");
    Ok(())
}

/// Merge three scrambled grayscale JPEGs back into one colour JPEG.
pub fn decrypt_jpeg_etc<RR, RG, RB, W>(
    red: RR,
    green: RG,
    blue: RB,
    mut output: W,
    key: &CryptoKey,
    quality: u8,
) -> Result<()>
where
    RR: Read,
    RG: Read,
    RB: Read,
    W: Write,
{
    validate_quality(quality)?;
    let mut planes = Vec::with_capacity(3);
    for input in [read_all(red)?, read_all(green)?, read_all(blue)?] {
        planes.push(image::load_from_memory_with_format(&input, ImageFormat::Jpeg)?.to_luma8());
    }

    let (width, height) = planes[0].dimensions();
    for (name, plane) in ["green", "blue"].iter().zip(&planes[1..]) {
        if plane.dimensions() != (width, height) {
            return Err(CryptoError::DimensionMismatch(format!(
                "red is {}x{}, {} is {}x{}",
                width,
                height,
                name,
                plane.width(),
                plane.height()
            )));
        }
    }

    let merged = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            planes[0].get_pixel(x, y)[0],
            planes[1].get_pixel(x, y)[0],
            planes[2].get_pixel(x, y)[0],
        ])
    });
    let restored = unscramble_blocks(&merged, key)?;

    let encoded = encode_jpeg(restored.as_raw(), width, height, ExtendedColorType::Rgb8, quality)?;
    output.write_all(&encoded)?;
    output.flush()?;

    info!(width, height, quality, "channels merged");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 3) as u8, (y * 4) as u8, ((x + y) * 2) as u8])
        })
    }

    fn jpeg_bytes(image: &RgbImage, quality: u8) -> Vec<u8> {
        encode_jpeg(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8, quality).unwrap()
    }

    #[test]
    fn test_shuffle_deterministic_and_key_dependent() {
        let key = CryptoKey::test_key();
        let a = block_shuffle(&key, 100).unwrap();
        assert_eq!(a, block_shuffle(&key, 100).unwrap());

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..100).collect::<Vec<_>>());

        let other = CryptoKey::new("0.6", "3.8").unwrap();
        assert_ne!(a, block_shuffle(&other, 100).unwrap());
    }

    #[test]
    fn test_scramble_round_trip_is_exact() {
        let key = CryptoKey::test_key();
        // 8-pixel edge strips on the right and bottom stay put
        let image = gradient(45, 35);
        let scrambled = scramble_blocks(&image, &key).unwrap();
        assert_ne!(scrambled, image);

        for y in 0..35 {
            for x in 40..45 {
                assert_eq!(scrambled.get_pixel(x, y), image.get_pixel(x, y));
            }
        }
        for x in 0..45 {
            for y in 32..35 {
                assert_eq!(scrambled.get_pixel(x, y), image.get_pixel(x, y));
            }
        }

        assert_eq!(unscramble_blocks(&scrambled, &key).unwrap(), image);
    }

    #[test]
    fn test_scramble_moves_whole_blocks() {
        let key = CryptoKey::test_key();
        let image = gradient(32, 16);
        let scrambled = scramble_blocks(&image, &key).unwrap();
        let perm = block_shuffle(&key, 8).unwrap();

        for (dst, &src) in perm.iter().enumerate() {
            let (dx, dy) = ((dst as u32 % 4) * 8, (dst as u32 / 4) * 8);
            let (sx, sy) = ((src as u32 % 4) * 8, (src as u32 / 4) * 8);
            assert_eq!(scrambled.get_pixel(dx + 3, dy + 5), image.get_pixel(sx + 3, sy + 5));
        }
    }

    #[test]
    fn test_etc_end_to_end() {
        let key = CryptoKey::test_key();
        let image = gradient(64, 48);
        let input = jpeg_bytes(&image, 95);

        let (mut red, mut green, mut blue) = (Vec::new(), Vec::new(), Vec::new());
        encrypt_jpeg_etc(Cursor::new(&input), &mut red, &mut green, &mut blue, &key, 95).unwrap();
        assert!(!red.is_empty() && !green.is_empty() && !blue.is_empty());

        let mut output = Vec::new();
        decrypt_jpeg_etc(
            Cursor::new(&red),
            Cursor::new(&green),
            Cursor::new(&blue),
            &mut output,
            &key,
            95,
        )
        .unwrap();

        let restored = image::load_from_memory(&output).unwrap().to_rgb8();
        assert_eq!(restored.dimensions(), (64, 48));

        let total: u64 = restored
            .as_raw()
            .iter()
            .zip(image.as_raw())
            .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs() as u64)
            .sum();
        let mean = total as f64 / image.as_raw().len() as f64;
        assert!(mean < 10.0, "mean error {mean}");
    }

    #[test]
    fn test_invalid_quality_writes_nothing() {
        let key = CryptoKey::test_key();
        let input = jpeg_bytes(&gradient(16, 16), 90);
        let (mut red, mut green, mut blue) = (Vec::new(), Vec::new(), Vec::new());

        for quality in [0u8, 101] {
            let err = encrypt_jpeg_etc(Cursor::new(&input), &mut red, &mut green, &mut blue, &key, quality)
                .unwrap_err();
            assert!(matches!(err, CryptoError::InvalidQuality(q) if q == quality));
        }
        assert!(red.is_empty());
    }

    #[test]
    fn test_mismatched_channels_rejected() {
        let key = CryptoKey::test_key();
        let gray = |w: u32, h: u32| {
            let plane = vec![128u8; (w * h) as usize];
            encode_jpeg(&plane, w, h, ExtendedColorType::L8, 90).unwrap()
        };
        let (r, g, b) = (gray(16, 16), gray(16, 16), gray(24, 16));

        let mut output = Vec::new();
        let err = decrypt_jpeg_etc(Cursor::new(r), Cursor::new(g), Cursor::new(b), &mut output, &key, 90)
            .unwrap_err();
        assert!(matches!(err, CryptoError::DimensionMismatch(_)));
        assert!(output.is_empty());
    }

    #[test]
    fn test_garbage_input_is_image_error() {
        let key = CryptoKey::test_key();
        let (mut red, mut green, mut blue) = (Vec::new(), Vec::new(), Vec::new());
        let err = encrypt_jpeg_etc(Cursor::new(b"not a jpeg"), &mut red, &mut green, &mut blue, &key, 90)
            .unwrap_err();
        assert!(matches!(err, CryptoError::Image(_)));
    }
}
