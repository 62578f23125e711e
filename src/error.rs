use thiserror::Error;

/// Everything that can go wrong while building, training, querying or
/// persisting a model.
#[derive(Debug, Error)]
pub enum Error {
    /// No token survived the `min_count` frequency filter.
    #[error("no tokens survived frequency filtering")]
    EmptyVocabulary,

    /// The vocabulary is too small for negative sampling to function.
    #[error("vocabulary of size {0} is too small for negative sampling")]
    DegenerateVocabulary(usize),

    /// A query referenced a token outside the store's vocabulary.
    #[error("unknown token: {0:?}")]
    UnknownToken(String),

    /// Invalid hyperparameters were supplied before training started.
    #[error("invalid configuration: {0}")]
    NotConfigured(String),

    /// I/O failure or format mismatch while saving or loading a model.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// A dot product in the hot loop produced NaN or infinity. The run is
    /// aborted rather than continuing with a poisoned matrix.
    #[error("training produced a non-finite score")]
    NonFiniteScore,

    /// The injected classifier capability failed.
    #[error("external classifier failed: {0}")]
    ExternalCapability(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
