use rand::Rng;

use crate::error::{Error, Result};
use crate::vocab::Vocabulary;

/// Approximates the canonical 10^8-slot unigram table at a tenth of the
/// memory; empirical draw frequencies are indistinguishable for vocabularies
/// well below the table size.
pub const DEFAULT_TABLE_SIZE: usize = 10_000_000;

const UNIGRAM_POWER: f64 = 0.75;
const MAX_RETRIES: usize = 64;

/// Precomputed discrete distribution over vocabulary indices, weighted by
/// count^0.75. Built once after the vocabulary is finalized, immutable
/// afterward, freely shareable across worker threads.
#[derive(Debug)]
pub struct NegativeSamplingTable {
    table: Vec<u32>,
    vocab_len: usize,
}

impl NegativeSamplingTable {
    pub fn new(vocab: &Vocabulary) -> Result<Self> {
        Self::with_size(vocab, DEFAULT_TABLE_SIZE)
    }

    pub fn with_size(vocab: &Vocabulary, table_size: usize) -> Result<Self> {
        if vocab.len() <= 1 {
            return Err(Error::DegenerateVocabulary(vocab.len()));
        }

        let norm: f64 = vocab
            .words()
            .iter()
            .map(|w| (w.count as f64).powf(UNIGRAM_POWER))
            .sum();

        let mut table = Vec::with_capacity(table_size);
        let mut index = 0usize;
        let mut cumulative = (vocab.word(0).count as f64).powf(UNIGRAM_POWER) / norm;
        for slot in 0..table_size {
            table.push(index as u32);
            if slot as f64 / table_size as f64 > cumulative {
                index = (index + 1).min(vocab.len() - 1);
                cumulative += (vocab.word(index).count as f64).powf(UNIGRAM_POWER) / norm;
            }
        }

        Ok(Self {
            table,
            vocab_len: vocab.len(),
        })
    }

    /// One draw from the count^0.75 distribution.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> usize {
        self.table[rng.gen_range(0..self.table.len())] as usize
    }

    /// `k` indices drawn with replacement, none equal to `exclude`. Each
    /// colliding draw is retried a bounded number of times so a lopsided
    /// distribution cannot spin forever.
    pub fn sample<R: Rng>(&self, k: usize, exclude: usize, rng: &mut R) -> Result<Vec<usize>> {
        let mut out = Vec::with_capacity(k);
        for _ in 0..k {
            let mut retries = 0;
            loop {
                let index = self.draw(rng);
                if index != exclude {
                    out.push(index);
                    break;
                }
                retries += 1;
                if retries >= MAX_RETRIES {
                    return Err(Error::DegenerateVocabulary(self.vocab_len));
                }
            }
        }
        Ok(out)
    }
}
