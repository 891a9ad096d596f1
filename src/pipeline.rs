//! Encryption and decryption pipelines
//!
//! Encrypt runs `DC → diffusion → [AC] → MCU`; decrypt runs the inverses in
//! the opposite order. Every stage starts its own logistic map at `(x0, mu)`
//! so the two directions draw identical chaos values per stage.

use crate::chaos::{warn_if_not_chaotic, ChaosBackend, LogisticMap};
use crate::coefficients::BlockAccess;
use crate::decimal::Decimal;
use crate::diffusion::{diffuse_sign_flip, diffuse_xor};
use crate::error::Result;
use crate::key::{CryptoKey, SubKeys};
use crate::permute::{
    permute_dc_global, permute_dc_windows, permute_mcu_columns, permute_mcu_rows,
    permute_mcu_whole, permute_nonzero_acs, row_permutation_len, Direction,
};
use crate::signs::{IsaacBitStream, ShaBitStream, SignBitStream};
use std::io::{Read, Write};
use tracing::{debug, info};

/// Numeric backend of the chaotic generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Single-precision floats
    #[default]
    Fast,
    /// 500-digit fixed-point decimals
    Precise,
}

/// How DC coefficients are scrambled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DcMode {
    /// Permute within runs of equal sign in each block row
    #[default]
    SameSignWindows,
    /// Permute a whole component and flip signs from the SHA-512 stream
    Global,
    Off,
}

/// AC diffusion applied between the DC and MCU stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Diffusion {
    Xor,
    #[default]
    SignFlip,
    /// XOR, then sign flip (reversed on decrypt)
    Both,
    Off,
}

/// Which block permutations run in the MCU stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum McuScope {
    Rows,
    #[default]
    RowsAndColumns,
    /// All blocks of a component in raster order
    Whole,
    Off,
}

/// Bit source for sign-flip diffusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignSource {
    #[default]
    Isaac,
    Sha512,
}

/// Feature toggles for a pipeline run.
///
/// Decryption must use exactly the options of the matching encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineOptions {
    pub backend: Backend,
    pub dc_mode: DcMode,
    pub diffusion: Diffusion,
    pub mcu_scope: McuScope,
    pub permute_acs: bool,
    pub sign_source: SignSource,
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_dc_mode(mut self, dc_mode: DcMode) -> Self {
        self.dc_mode = dc_mode;
        self
    }

    pub fn with_diffusion(mut self, diffusion: Diffusion) -> Self {
        self.diffusion = diffusion;
        self
    }

    pub fn with_mcu_scope(mut self, mcu_scope: McuScope) -> Self {
        self.mcu_scope = mcu_scope;
        self
    }

    pub fn with_permute_acs(mut self, permute_acs: bool) -> Self {
        self.permute_acs = permute_acs;
        self
    }

    pub fn with_sign_source(mut self, sign_source: SignSource) -> Self {
        self.sign_source = sign_source;
        self
    }
}

/// A JPEG coefficient codec.
///
/// `read_coefficients` decodes entropy-coded data into quantized blocks and
/// `write_coefficients` re-encodes them, copying every other parameter
/// (quantization tables, sampling factors, markers) from the source.
pub trait CoefficientCodec {
    type Image: BlockAccess;

    fn read_coefficients(&self, input: &[u8]) -> Result<Self::Image>;

    fn write_coefficients(&self, image: &Self::Image) -> Result<Vec<u8>>;
}

/// Scramble a coefficient store in place.
pub fn encrypt_coefficients<S: BlockAccess + ?Sized>(
    store: &mut S,
    key: &CryptoKey,
    options: PipelineOptions,
) -> Result<()> {
    run_pipeline(store, key, options, Direction::Encrypt)
}

/// Undo [`encrypt_coefficients`] with the same key and options.
pub fn decrypt_coefficients<S: BlockAccess + ?Sized>(
    store: &mut S,
    key: &CryptoKey,
    options: PipelineOptions,
) -> Result<()> {
    run_pipeline(store, key, options, Direction::Decrypt)
}

/// Read a JPEG, scramble its coefficients, write the result.
///
/// Nothing is written to `output` unless every stage succeeds.
pub fn encrypt_jpeg<C, R, W>(
    codec: &C,
    input: R,
    output: W,
    key: &CryptoKey,
    options: PipelineOptions,
) -> Result<()>
where
    C: CoefficientCodec,
    R: Read,
    W: Write,
{
    transcode(codec, input, output, key, options, Direction::Encrypt)
}

/// Inverse of [`encrypt_jpeg`].
pub fn decrypt_jpeg<C, R, W>(
    codec: &C,
    input: R,
    output: W,
    key: &CryptoKey,
    options: PipelineOptions,
) -> Result<()>
where
    C: CoefficientCodec,
    R: Read,
    W: Write,
{
    transcode(codec, input, output, key, options, Direction::Decrypt)
}

fn transcode<C, R, W>(
    codec: &C,
    mut input: R,
    mut output: W,
    key: &CryptoKey,
    options: PipelineOptions,
    direction: Direction,
) -> Result<()>
where
    C: CoefficientCodec,
    R: Read,
    W: Write,
{
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;

    let mut image = codec.read_coefficients(&bytes)?;
    run_pipeline(&mut image, key, options, direction)?;
    let encoded = codec.write_coefficients(&image)?;

    output.write_all(&encoded)?;
    output.flush()?;
    info!(bytes_in = bytes.len(), bytes_out = encoded.len(), ?direction, "JPEG transcoded");
    Ok(())
}

fn run_pipeline<S: BlockAccess + ?Sized>(
    store: &mut S,
    key: &CryptoKey,
    options: PipelineOptions,
    direction: Direction,
) -> Result<()> {
    match options.backend {
        Backend::Fast => run::<f32, S>(store, key, options, direction),
        Backend::Precise => run::<Decimal, S>(store, key, options, direction),
    }
}

fn run<B: ChaosBackend, S: BlockAccess + ?Sized>(
    store: &mut S,
    key: &CryptoKey,
    options: PipelineOptions,
    direction: Direction,
) -> Result<()> {
    // Key errors must surface before any coefficient changes
    let keys = key.subkeys::<B>()?;
    warn_if_not_chaotic(&keys.mu);
    debug!(backend = B::NAME, ?direction, ?options, "pipeline started");

    match direction {
        Direction::Encrypt => {
            permute_dc(store, &keys, options.dc_mode, direction)?;
            diffuse(store, &keys, options, direction)?;
            if options.permute_acs {
                permute_nonzero_acs(store, &mut fresh_map(&keys), direction)?;
            }
            permute_mcu(store, &keys, options.mcu_scope, direction)?;
        }
        Direction::Decrypt => {
            permute_mcu(store, &keys, options.mcu_scope, direction)?;
            if options.permute_acs {
                permute_nonzero_acs(store, &mut fresh_map(&keys), direction)?;
            }
            diffuse(store, &keys, options, direction)?;
            permute_dc(store, &keys, options.dc_mode, direction)?;
        }
    }

    debug!(?direction, "pipeline finished");
    Ok(())
}

fn fresh_map<B: ChaosBackend>(keys: &SubKeys<B>) -> LogisticMap<B> {
    LogisticMap::new(keys.x0.clone(), keys.mu.clone())
}

fn permute_dc<B: ChaosBackend, S: BlockAccess + ?Sized>(
    store: &mut S,
    keys: &SubKeys<B>,
    mode: DcMode,
    direction: Direction,
) -> Result<()> {
    match mode {
        DcMode::SameSignWindows => permute_dc_windows(store, &mut fresh_map(keys), direction),
        DcMode::Global => permute_dc_global(
            store,
            &mut fresh_map(keys),
            &keys.x0_decimal,
            &keys.mu_decimal,
            direction,
        ),
        DcMode::Off => Ok(()),
    }
}

fn diffuse<B: ChaosBackend, S: BlockAccess + ?Sized>(
    store: &mut S,
    keys: &SubKeys<B>,
    options: PipelineOptions,
    direction: Direction,
) -> Result<()> {
    let xor = |store: &mut S| diffuse_xor(store, &mut fresh_map(keys), &keys.alpha, &keys.beta);
    let flip = |store: &mut S| {
        let mut stream: Box<dyn SignBitStream> = match options.sign_source {
            SignSource::Isaac => Box::new(IsaacBitStream::new(&keys.x0_decimal, &keys.mu_decimal)),
            SignSource::Sha512 => Box::new(ShaBitStream::new(&keys.x0_decimal, &keys.mu_decimal)),
        };
        diffuse_sign_flip(store, stream.as_mut());
    };

    match (options.diffusion, direction) {
        (Diffusion::Off, _) => {}
        (Diffusion::Xor, _) => xor(&mut *store)?,
        (Diffusion::SignFlip, _) => flip(&mut *store),
        (Diffusion::Both, Direction::Encrypt) => {
            xor(&mut *store)?;
            flip(&mut *store);
        }
        (Diffusion::Both, Direction::Decrypt) => {
            flip(&mut *store);
            xor(&mut *store)?;
        }
    }
    Ok(())
}

fn permute_mcu<B: ChaosBackend, S: BlockAccess + ?Sized>(
    store: &mut S,
    keys: &SubKeys<B>,
    scope: McuScope,
    direction: Direction,
) -> Result<()> {
    match scope {
        McuScope::Off => Ok(()),
        McuScope::Rows => permute_mcu_rows(store, &mut fresh_map(keys), direction),
        McuScope::Whole => permute_mcu_whole(store, &mut fresh_map(keys), direction),
        McuScope::RowsAndColumns => {
            // Columns continue the sequence where the rows left off
            let mut rows = fresh_map(keys);
            let mut columns = fresh_map(keys);
            columns.advance(row_permutation_len(&*store));

            match direction {
                Direction::Encrypt => {
                    permute_mcu_rows(store, &mut rows, direction)?;
                    permute_mcu_columns(store, &mut columns, direction)
                }
                Direction::Decrypt => {
                    permute_mcu_columns(store, &mut columns, direction)?;
                    permute_mcu_rows(store, &mut rows, direction)
                }
            }
        }
    }
}
