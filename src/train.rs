use std::ops::Neg;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::{Error, Result};
use crate::sampling::NegativeSamplingTable;
use crate::store::EmbeddingStore;
use crate::vocab::{Vocabulary, DEFAULT_SAMPLE_THRESHOLD};
use crate::window::{WindowSample, WindowSampler};

/// Which of the two word2vec architectures to train.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Predict the center word from its mean-pooled context.
    Cbow,
    /// Predict each context word from the center word.
    SkipGram,
}

/// Training hyperparameters, builder style.
#[derive(Debug, Clone)]
pub struct TrainParams {
    vector_size: usize,
    window: usize,
    negative: usize,
    epochs: usize,
    learning_rate: f32,
    min_learning_rate: f32,
    sample_threshold: f32,
    min_count: u64,
    model: ModelKind,
    seed: Option<u64>,
    workers: usize,
    shuffle: bool,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            vector_size: 100,
            window: 5,
            negative: 5,
            epochs: 5,
            learning_rate: 0.025,
            min_learning_rate: 1e-4,
            sample_threshold: DEFAULT_SAMPLE_THRESHOLD,
            min_count: 5,
            model: ModelKind::Cbow,
            seed: None,
            workers: 1,
            shuffle: true,
        }
    }
}

impl TrainParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_vector_size(mut self, vector_size: usize) -> Self {
        self.vector_size = vector_size;
        self
    }

    pub fn set_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn set_negative(mut self, negative: usize) -> Self {
        self.negative = negative;
        self
    }

    pub fn set_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn set_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn set_min_learning_rate(mut self, min_learning_rate: f32) -> Self {
        self.min_learning_rate = min_learning_rate;
        self
    }

    /// Subsampling threshold `t`; pass 0.0 to keep every occurrence.
    pub fn set_sample_threshold(mut self, sample_threshold: f32) -> Self {
        self.sample_threshold = sample_threshold;
        self
    }

    pub fn set_min_count(mut self, min_count: u64) -> Self {
        self.min_count = min_count;
        self
    }

    pub fn set_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    /// Fixed seed for reproducible runs. Only honored by the single-worker
    /// path; hogwild workers draw from thread-local entropy.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn set_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn set_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    fn validate(&self) -> Result<()> {
        if self.vector_size == 0 {
            return Err(Error::NotConfigured("vector_size must be positive".into()));
        }
        if self.epochs == 0 {
            return Err(Error::NotConfigured("epochs must be positive".into()));
        }
        if self.window == 0 {
            return Err(Error::NotConfigured("window must be positive".into()));
        }
        Ok(())
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Owns all mutable training state: vocabulary, sampling table and the two
/// embedding matrices. Consumed by `train`, which freezes the input matrix
/// into an `EmbeddingStore`.
#[derive(Debug)]
pub struct TrainingEngine {
    params: TrainParams,
    vocab: Vocabulary,
    table: NegativeSamplingTable,
    input: Vec<f32>,
    output: Vec<f32>,
}

impl TrainingEngine {
    /// Builds the vocabulary and sampling table from `sentences` and
    /// initializes the matrices: input rows uniform in [-0.5/D, 0.5/D],
    /// output rows zero.
    pub fn new<S: AsRef<str>>(sentences: &[Vec<S>], params: TrainParams) -> Result<Self> {
        params.validate()?;
        let vocab = Vocabulary::build(
            sentences.iter().map(|s| s.iter().map(|t| t.as_ref())),
            params.min_count,
            params.sample_threshold,
        )?;
        let table = NegativeSamplingTable::new(&vocab)?;

        let dim = params.vector_size;
        let mut rng = params.rng();
        let bound = 0.5 / dim as f32;
        let init = Uniform::new(-bound, bound);
        let input: Vec<f32> = (0..vocab.len() * dim)
            .map(|_| init.sample(&mut rng))
            .collect();
        let output = vec![0.0; vocab.len() * dim];

        Ok(Self {
            params,
            vocab,
            table,
            input,
            output,
        })
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Runs the full epoch loop over `sentences` and returns the finished
    /// embedding store. The corpus must be the one the engine was built from;
    /// tokens unknown to the vocabulary are silently dropped.
    pub fn train<S: AsRef<str>>(mut self, sentences: &[Vec<S>]) -> Result<EmbeddingStore> {
        let indexed: Vec<Vec<usize>> = sentences
            .iter()
            .map(|s| {
                let tokens: Vec<&str> = s.iter().map(|t| t.as_ref()).collect();
                self.vocab.to_indices(&tokens)
            })
            .collect();

        // Planned work drives the linear learning-rate decay; it has to be
        // known before the first pair is processed.
        let planned = (self.vocab.surviving_tokens() * self.params.epochs as u64).max(1);

        if self.params.workers <= 1 {
            self.train_single(&indexed, planned)?;
        } else {
            self.train_hogwild(&indexed, planned)?;
        }

        let dim = self.params.vector_size;
        Ok(EmbeddingStore::from_training(self.vocab, self.input, dim))
    }

    fn train_single(&mut self, sentences: &[Vec<usize>], planned: u64) -> Result<()> {
        let dim = self.params.vector_size;
        let mut rng = self.params.rng();
        let mut neu1 = vec![0.0f32; dim];
        let mut neu1e = vec![0.0f32; dim];
        let mut order: Vec<usize> = (0..sentences.len()).collect();
        let mut processed = 0u64;

        for epoch in 0..self.params.epochs {
            if self.params.shuffle {
                order.shuffle(&mut rng);
            }
            let mut epoch_loss = 0.0f32;
            for &si in &order {
                let sentence = &sentences[si];
                processed += sentence.len() as u64;
                let alpha = decayed_alpha(&self.params, processed, planned);

                let samples: Vec<WindowSample> =
                    WindowSampler::new(sentence, &self.vocab, self.params.window, &mut rng)
                        .collect();
                for sample in &samples {
                    pass(
                        sample,
                        self.params.model,
                        &self.table,
                        &mut self.input,
                        &mut self.output,
                        dim,
                        self.params.negative,
                        alpha,
                        &mut neu1,
                        &mut neu1e,
                        &mut epoch_loss,
                        &mut rng,
                    )?;
                }
            }
            tracing::info!(epoch, epoch_loss, "training epoch finished");
        }
        Ok(())
    }

    /// Hogwild-style parallel epochs: workers update the shared matrices
    /// through raw pointers without synchronization. Lost updates between
    /// racing rows are expected and tolerated; the matrices are never resized,
    /// so the races are confined to individual float values.
    fn train_hogwild(&mut self, sentences: &[Vec<usize>], planned: u64) -> Result<()> {
        struct UnsafePtr<T>(*mut T);
        unsafe impl<T> Sync for UnsafePtr<T> {}

        let dim = self.params.vector_size;
        let input_ptr = UnsafePtr(self.input.as_mut_ptr());
        let output_ptr = UnsafePtr(self.output.as_mut_ptr());
        let input_len = self.input.len();
        let output_len = self.output.len();
        let processed = AtomicU64::new(0);

        for epoch in 0..self.params.epochs {
            sentences.par_iter().try_for_each(|sentence| -> Result<()> {
                let mut rng = rand::thread_rng();
                let mut neu1 = vec![0.0f32; dim];
                let mut neu1e = vec![0.0f32; dim];
                let mut loss = 0.0f32;

                // inside of the closure to avoid the smarter new fine-grained
                // closure capturing.
                let _ = &input_ptr;
                let _ = &output_ptr;

                let n = processed.fetch_add(sentence.len() as u64, Ordering::Relaxed)
                    + sentence.len() as u64;
                let alpha = decayed_alpha(&self.params, n, planned);

                let samples: Vec<WindowSample> =
                    WindowSampler::new(sentence, &self.vocab, self.params.window, &mut rng)
                        .collect();

                // SAFETY: "Hogwild!" style, races on individual floats may
                // occur and are accepted.
                let (input, output) = unsafe {
                    (
                        std::slice::from_raw_parts_mut(input_ptr.0, input_len),
                        std::slice::from_raw_parts_mut(output_ptr.0, output_len),
                    )
                };
                for sample in &samples {
                    pass(
                        sample,
                        self.params.model,
                        &self.table,
                        input,
                        output,
                        dim,
                        self.params.negative,
                        alpha,
                        &mut neu1,
                        &mut neu1e,
                        &mut loss,
                        &mut rng,
                    )?;
                }
                Ok(())
            })?;
            tracing::info!(epoch, "hogwild epoch finished");
        }
        Ok(())
    }
}

fn decayed_alpha(params: &TrainParams, processed: u64, planned: u64) -> f32 {
    let remaining = 1.0 - processed as f32 / planned as f32;
    (params.learning_rate * remaining).max(params.min_learning_rate)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + x.neg().exp())
}

#[allow(clippy::too_many_arguments)]
fn pass(
    sample: &WindowSample,
    model: ModelKind,
    table: &NegativeSamplingTable,
    input: &mut [f32],
    output: &mut [f32],
    dim: usize,
    negative: usize,
    alpha: f32,
    neu1: &mut [f32],
    neu1e: &mut [f32],
    epoch_loss: &mut f32,
    rng: &mut impl Rng,
) -> Result<()> {
    match model {
        ModelKind::Cbow => cbow_pass(
            sample, table, input, output, dim, negative, alpha, neu1, neu1e, epoch_loss, rng,
        ),
        ModelKind::SkipGram => skipgram_pass(
            sample, table, input, output, dim, negative, alpha, neu1e, epoch_loss, rng,
        ),
    }
}

/// One CBOW update: mean-pool the context rows, contrast the center against
/// `negative` sampled targets, then hand the accumulated input-side gradient
/// back to every contributing context row.
#[allow(clippy::too_many_arguments)]
fn cbow_pass(
    sample: &WindowSample,
    table: &NegativeSamplingTable,
    input: &mut [f32],
    output: &mut [f32],
    dim: usize,
    negative: usize,
    alpha: f32,
    neu1: &mut [f32],
    neu1e: &mut [f32],
    epoch_loss: &mut f32,
    rng: &mut impl Rng,
) -> Result<()> {
    let center = sample.center;
    let context = &sample.context;

    // === FORWARD PASS ===
    for position in 0..dim {
        let mut f = 0.0;
        for &context_index in context {
            f += input[position + context_index * dim];
        }
        neu1[position] = f / context.len() as f32;
    }

    // positive target
    let target_l2 = center * dim;
    let f = neu1
        .iter()
        .enumerate()
        .map(|(i, v)| v * output[i + target_l2])
        .sum::<f32>();
    if !f.is_finite() {
        return Err(Error::NonFiniteScore);
    }
    let sig = sigmoid(f);
    *epoch_loss += -sig.ln();
    let g = (1.0 - sig) * alpha;
    for c in 0..dim {
        neu1e[c] = g * output[c + target_l2];
        output[c + target_l2] += g * neu1[c];
    }

    // negative targets, center excluded by the table
    for negative_target in table.sample(negative, center, rng)? {
        let l2 = negative_target * dim;
        let f = neu1
            .iter()
            .enumerate()
            .map(|(i, v)| v * output[i + l2])
            .sum::<f32>();
        if !f.is_finite() {
            return Err(Error::NonFiniteScore);
        }
        let sig = sigmoid(f);
        *epoch_loss += -(1.0 - sig).ln();
        let g = (0.0 - sig) * alpha;
        for c in 0..dim {
            neu1e[c] += g * output[c + l2];
            output[c + l2] += g * neu1[c];
        }
    }

    // === BACKPROPAGATION ===
    // The pooled-input gradient goes to each contributing context row.
    for &context_index in context {
        for (k, v) in neu1e.iter().enumerate() {
            input[k + context_index * dim] += v;
        }
    }
    Ok(())
}

/// One skip-gram update: the center row predicts each context word in turn,
/// each contrasted against freshly sampled negatives.
#[allow(clippy::too_many_arguments)]
fn skipgram_pass(
    sample: &WindowSample,
    table: &NegativeSamplingTable,
    input: &mut [f32],
    output: &mut [f32],
    dim: usize,
    negative: usize,
    alpha: f32,
    neu1e: &mut [f32],
    epoch_loss: &mut f32,
    rng: &mut impl Rng,
) -> Result<()> {
    let center = sample.center;
    let l1 = center * dim;

    for &context_target in &sample.context {
        neu1e.fill(0.0);

        let targets = std::iter::once((context_target, 1.0f32));
        let negatives = table
            .sample(negative, center, rng)?
            .into_iter()
            .map(|t| (t, 0.0f32));
        for (target, label) in targets.chain(negatives) {
            let l2 = target * dim;
            let f = (0..dim).map(|c| input[l1 + c] * output[l2 + c]).sum::<f32>();
            if !f.is_finite() {
                return Err(Error::NonFiniteScore);
            }
            let sig = sigmoid(f);
            *epoch_loss += if label > 0.0 {
                -sig.ln()
            } else {
                -(1.0 - sig).ln()
            };
            let g = (label - sig) * alpha;
            for c in 0..dim {
                neu1e[c] += g * output[l2 + c];
                output[l2 + c] += g * input[l1 + c];
            }
        }

        for c in 0..dim {
            input[l1 + c] += neu1e[c];
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn sentences() -> Vec<Vec<&'static str>> {
        vec![
            vec!["good", "great", "movie", "really", "good"],
            vec!["bad", "terrible", "film", "really", "bad"],
            vec!["great", "movie", "good", "film"],
        ]
    }

    fn params() -> TrainParams {
        TrainParams::new()
            .set_vector_size(8)
            .set_min_count(1)
            .set_sample_threshold(0.0)
            .set_epochs(3)
            .set_seed(11)
    }

    #[test]
    fn invalid_hyperparameters_are_rejected() {
        for bad in [
            TrainParams::new().set_vector_size(0),
            TrainParams::new().set_epochs(0),
            TrainParams::new().set_window(0),
        ] {
            let err = TrainingEngine::new(&sentences(), bad.set_min_count(1)).unwrap_err();
            assert!(matches!(err, Error::NotConfigured(_)));
        }
    }

    #[test]
    fn cbow_training_produces_finite_vectors() {
        let engine = TrainingEngine::new(&sentences(), params()).unwrap();
        let store = engine.train(&sentences()).unwrap();
        let sim = store.similarity("good", "great").unwrap();
        assert!(sim.is_finite());
        assert!((-1.0..=1.0).contains(&sim));
    }

    #[test]
    fn skipgram_training_produces_finite_vectors() {
        let engine =
            TrainingEngine::new(&sentences(), params().set_model(ModelKind::SkipGram)).unwrap();
        let store = engine.train(&sentences()).unwrap();
        let sim = store.similarity("bad", "terrible").unwrap();
        assert!(sim.is_finite());
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let first = TrainingEngine::new(&sentences(), params())
            .unwrap()
            .train(&sentences())
            .unwrap();
        let second = TrainingEngine::new(&sentences(), params())
            .unwrap()
            .train(&sentences())
            .unwrap();
        assert_eq!(
            first.vector("good").unwrap(),
            second.vector("good").unwrap()
        );
    }

    #[test]
    fn hogwild_training_completes() {
        let engine = TrainingEngine::new(&sentences(), params().set_workers(4)).unwrap();
        let store = engine.train(&sentences()).unwrap();
        assert!(store.similarity("movie", "film").unwrap().is_finite());
    }

    #[test]
    fn non_finite_score_aborts_the_pass() {
        let corpus = sentences();
        let engine = TrainingEngine::new(&corpus, params()).unwrap();
        let table = engine.table;
        let dim = 8;
        let mut input = vec![f32::INFINITY; engine.vocab.len() * dim];
        let mut output = vec![1.0f32; engine.vocab.len() * dim];
        let mut neu1 = vec![0.0; dim];
        let mut neu1e = vec![0.0; dim];
        let mut loss = 0.0;
        let mut rng = StdRng::seed_from_u64(1);

        let sample = WindowSample {
            center: 0,
            context: vec![1],
        };
        let err = cbow_pass(
            &sample, &table, &mut input, &mut output, dim, 2, 0.025, &mut neu1, &mut neu1e,
            &mut loss, &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NonFiniteScore));
    }
}
