use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Invalid decimal literal: {0:?}")]
    InvalidDecimal(String),

    #[error("Chaotic sequence length must be > 0")]
    InvalidLength,

    #[error("Invalid permutation: {0}")]
    InvalidPermutation(String),

    #[error("Scratch buffer allocation failed ({len} elements)")]
    ScratchAlloc { len: usize },

    #[error("JPEG quality must be in 1..=100, got {0}")]
    InvalidQuality(u8),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Coefficient codec error: {0}")]
    Codec(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Wrap an error raised by an external coefficient codec.
    pub fn codec<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        CryptoError::Codec(err.into())
    }
}

pub type Result<T> = std::result::Result<T, CryptoError>;
