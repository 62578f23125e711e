use std::collections::HashMap;

use crate::error::{Error, Result};

pub const DEFAULT_SAMPLE_THRESHOLD: f32 = 1e-3;

/// One surviving vocabulary entry: the token, its raw corpus count and the
/// derived subsampling keep-probability.
#[derive(Debug, Clone)]
pub struct VocabWord {
    pub token: String,
    pub count: u64,
    pub keep_prob: f32,
}

/// Bidirectional token <-> dense index mapping, frozen once built.
///
/// Indices are assigned by descending frequency with ties broken by ascending
/// token string. This ordering is deterministic for a fixed corpus; anything
/// downstream that mixes indices into random draws inherits that determinism.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: Vec<VocabWord>,
    index: HashMap<String, usize>,
    total_tokens: u64,
}

impl Vocabulary {
    /// Counts every token occurrence across `sentences`, drops tokens seen
    /// fewer than `min_count` times and assigns dense indices to the rest.
    ///
    /// `total_tokens` records the pre-filter occurrence count, which is what
    /// the subsampling formula divides by.
    pub fn build<I, S, T>(sentences: I, min_count: u64, sample_threshold: f32) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut counts: HashMap<String, u64> = HashMap::new();
        let mut total_tokens = 0u64;
        for sentence in sentences {
            for token in sentence {
                total_tokens += 1;
                *counts.entry(token.as_ref().to_string()).or_insert(0) += 1;
            }
        }

        let mut surviving: Vec<(String, u64)> = counts
            .into_iter()
            .filter(|(_, count)| *count >= min_count)
            .collect();
        if surviving.is_empty() {
            return Err(Error::EmptyVocabulary);
        }
        surviving.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut index = HashMap::with_capacity(surviving.len());
        let words = surviving
            .into_iter()
            .enumerate()
            .map(|(i, (token, count))| {
                index.insert(token.clone(), i);
                let keep_prob = keep_probability(count, total_tokens, sample_threshold);
                VocabWord {
                    token,
                    count,
                    keep_prob,
                }
            })
            .collect();

        Ok(Self {
            words,
            index,
            total_tokens,
        })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn position(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn word(&self, index: usize) -> &VocabWord {
        &self.words[index]
    }

    pub fn words(&self) -> &[VocabWord] {
        &self.words
    }

    /// Pre-filter occurrence count of the whole corpus.
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// Sum of counts of surviving tokens, the work unit for learning-rate
    /// decay.
    pub fn surviving_tokens(&self) -> u64 {
        self.words.iter().map(|w| w.count).sum()
    }

    /// Maps a tokenized sentence to vocabulary indices, silently dropping
    /// tokens that were filtered out.
    pub fn to_indices<T: AsRef<str>>(&self, sentence: &[T]) -> Vec<usize> {
        sentence
            .iter()
            .filter_map(|t| self.position(t.as_ref()))
            .collect()
    }
}

fn keep_probability(count: u64, total: u64, threshold: f32) -> f32 {
    // threshold <= 0 disables subsampling, matching the original tool.
    if threshold <= 0.0 {
        return 1.0;
    }
    let ratio = count as f32 / total as f32;
    (((ratio / threshold).sqrt() + 1.0) * (threshold / ratio)).clamp(0.0, 1.0)
}
