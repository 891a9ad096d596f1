//! # jpeg-chaos
//!
//! Reversible, format-preserving scrambling of JPEG images in the DCT domain.
//! Quantized coefficients are permuted and diffused with keys drawn from the
//! logistic map, so the output is still a valid JPEG and decrypting with the
//! same key restores every coefficient exactly.
//!
//! ## Quick Start
//!
//! ```no_run
//! use jpeg_chaos::{decrypt_coefficients, encrypt_coefficients, CoefficientImage, Component};
//! use jpeg_chaos::{CryptoKey, PipelineOptions};
//!
//! # fn main() -> jpeg_chaos::Result<()> {
//! // Coefficients normally come from a `CoefficientCodec`
//! let mut image = CoefficientImage::new(vec![Component::new(40, 30)]);
//!
//! let key = CryptoKey::generate(24, 24);
//! let options = PipelineOptions::default();
//!
//! encrypt_coefficients(&mut image, &key, options)?;
//! decrypt_coefficients(&mut image, &key, options)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `chaos`: logistic map generator with `f32` and `Decimal` backends
//! - `signs`: SHA-512 and ISAAC bit streams for sign flipping
//! - `permute`: block, column, DC and AC permutations with exact inverses
//! - `diffusion`: XOR and sign-flip diffusion of AC coefficients
//! - `pipeline`: encrypt/decrypt stage ordering and the codec seam
//! - `channels`: pixel-block shuffle stored as three grayscale JPEGs

pub mod channels;
pub mod chaos;
pub mod coefficients;
pub mod decimal;
pub mod diffusion;
pub mod error;
pub mod key;
pub mod permute;
pub mod pipeline;
pub mod signs;

// Re-export main types for convenience
pub use channels::{decrypt_jpeg_etc, encrypt_jpeg_etc};
pub use chaos::{generate, generate_continuing, generate_unsorted, ChaosBackend, ChaosValue, LogisticMap};
pub use coefficients::{Block, BlockAccess, CoefficientImage, Component, DCTSIZE2};
pub use decimal::Decimal;
pub use error::{CryptoError, Result};
pub use key::CryptoKey;
pub use permute::{apply_inverse, apply_permutation, PermuteMode};
pub use pipeline::{
    decrypt_coefficients, decrypt_jpeg, encrypt_coefficients, encrypt_jpeg, Backend, CoefficientCodec,
    DcMode, Diffusion, McuScope, PipelineOptions, SignSource,
};
pub use signs::derive_sign_flips;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
