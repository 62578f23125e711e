//! Word2vec-family embedding trainer plus the downstream pipeline that turns
//! word vectors into document-level predictions.
//!
//! The pieces compose in dependency order: [`vocab::Vocabulary`] counts and
//! prunes tokens, [`sampling::NegativeSamplingTable`] turns the counts into a
//! unigram^0.75 draw, [`window::WindowSampler`] produces (center, context)
//! training items, [`train::TrainingEngine`] runs CBOW or skip-gram with
//! negative sampling and hands the learned input matrix to
//! [`store::EmbeddingStore`], which [`eval`] aggregates into document vectors
//! for an injected classifier.
//!
//! The crate consumes pre-tokenized sentences; tokenization and dataset
//! loading live with the caller.

pub mod error;
pub mod eval;
pub mod sampling;
pub mod store;
pub mod train;
pub mod vocab;
pub mod window;

pub use error::{Error, Result};
pub use eval::{
    document_vector, evaluate, evaluate_analogies, read_analogies, vectorize_documents,
    Aggregation, AnalogyReport, AnalogySection, Classifier,
};
pub use sampling::NegativeSamplingTable;
pub use store::EmbeddingStore;
pub use train::{ModelKind, TrainParams, TrainingEngine};
pub use vocab::Vocabulary;
pub use window::{WindowSample, WindowSampler};
