use std::io::BufRead;

use crate::error::{Error, Result};
use crate::store::EmbeddingStore;

/// How per-word vectors are combined into one document vector. All four are
/// interchangeable strategies picked by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Mean,
    Sum,
    /// Per-dimension minimum.
    Min,
    /// Per-dimension maximum.
    Max,
}

/// Aggregates the store rows of every in-vocabulary token in `document`.
///
/// Out-of-vocabulary tokens are skipped, not zero-filled. A document with no
/// in-vocabulary tokens at all yields the zero vector of the store's
/// dimensionality; callers get a well-defined sentinel instead of an error.
pub fn document_vector<T: AsRef<str>>(
    document: &[T],
    store: &EmbeddingStore,
    method: Aggregation,
) -> Vec<f32> {
    let mut rows = document
        .iter()
        .filter_map(|token| store.vector(token.as_ref()).ok());

    let Some(first) = rows.next() else {
        return vec![0.0; store.dim()];
    };
    let mut acc = first.to_vec();
    let mut count = 1usize;

    for row in rows {
        count += 1;
        for (a, &v) in acc.iter_mut().zip(row) {
            match method {
                Aggregation::Mean | Aggregation::Sum => *a += v,
                Aggregation::Min => *a = a.min(v),
                Aggregation::Max => *a = a.max(v),
            }
        }
    }
    if method == Aggregation::Mean {
        for a in &mut acc {
            *a /= count as f32;
        }
    }
    acc
}

/// Vectorizes a whole labeled corpus with one aggregation strategy.
pub fn vectorize_documents<T: AsRef<str>>(
    documents: &[Vec<T>],
    store: &EmbeddingStore,
    method: Aggregation,
) -> Vec<Vec<f32>> {
    documents
        .iter()
        .map(|doc| document_vector(doc, store, method))
        .collect()
}

/// The minimal capability the evaluator needs from an external classifier.
/// Labels are opaque comparable categories; nothing here assumes a binary
/// domain.
pub trait Classifier<L> {
    fn fit(&mut self, features: &[Vec<f32>], labels: &[L]) -> Result<()>;

    /// Mean accuracy on the given features, in [0, 1].
    fn score(&self, features: &[Vec<f32>], labels: &[L]) -> Result<f32>;
}

/// Fits the injected classifier on the training split and returns its test
/// accuracy. Model fitting and scoring are delegated entirely; an accuracy
/// outside [0, 1] is treated as a capability failure.
pub fn evaluate<L, C: Classifier<L>>(
    classifier: &mut C,
    train_vectors: &[Vec<f32>],
    train_labels: &[L],
    test_vectors: &[Vec<f32>],
    test_labels: &[L],
) -> Result<f32> {
    classifier.fit(train_vectors, train_labels)?;
    let accuracy = classifier.score(test_vectors, test_labels)?;
    if !(0.0..=1.0).contains(&accuracy) {
        return Err(Error::ExternalCapability(format!(
            "classifier reported accuracy {accuracy} outside [0, 1]"
        )));
    }
    Ok(accuracy)
}

/// A named group of `a : b :: c : d` questions.
#[derive(Debug, Clone)]
pub struct AnalogySection {
    pub name: String,
    pub questions: Vec<[String; 4]>,
}

/// Per-section tally for an analogy run.
#[derive(Debug, Clone)]
pub struct SectionAccuracy {
    pub name: String,
    pub correct: usize,
    pub answered: usize,
}

impl SectionAccuracy {
    pub fn accuracy(&self) -> f32 {
        if self.answered == 0 {
            0.0
        } else {
            self.correct as f32 / self.answered as f32
        }
    }
}

/// Aggregate result of an analogy evaluation, including how many questions
/// were dropped because a token was out of vocabulary.
#[derive(Debug, Clone, Default)]
pub struct AnalogyReport {
    pub sections: Vec<SectionAccuracy>,
    pub correct: usize,
    pub answered: usize,
    pub skipped_oov: usize,
}

impl AnalogyReport {
    pub fn accuracy(&self) -> f32 {
        if self.answered == 0 {
            0.0
        } else {
            self.correct as f32 / self.answered as f32
        }
    }

    /// Fraction of all questions skipped for out-of-vocabulary tokens.
    pub fn oov_rate(&self) -> f32 {
        let total = self.answered + self.skipped_oov;
        if total == 0 {
            0.0
        } else {
            self.skipped_oov as f32 / total as f32
        }
    }
}

/// Parses the standard analogy file format: `: section-name` headers followed
/// by whitespace-separated 4-tuples of tokens.
pub fn read_analogies<R: BufRead>(reader: R) -> Result<Vec<AnalogySection>> {
    let mut sections: Vec<AnalogySection> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = line.strip_prefix(':') {
            sections.push(AnalogySection {
                name: name.trim().to_string(),
                questions: Vec::new(),
            });
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 4 {
            return Err(Error::Persistence(format!(
                "analogy line has {} tokens, expected 4: {line:?}",
                tokens.len()
            )));
        }
        let question = [
            tokens[0].to_string(),
            tokens[1].to_string(),
            tokens[2].to_string(),
            tokens[3].to_string(),
        ];
        match sections.last_mut() {
            Some(section) => section.questions.push(question),
            None => sections.push(AnalogySection {
                name: "default".to_string(),
                questions: vec![question],
            }),
        }
    }
    Ok(sections)
}

/// Scores `most_similar(positive=[b, c], negative=[a])` recovering `d` for
/// every question.
///
/// Questions with any out-of-vocabulary token are skipped and excluded from
/// the accuracy denominator entirely; the skip count is reported separately
/// so callers can judge coverage. (The alternative convention of counting
/// skipped questions as wrong would deflate accuracy on small vocabularies.)
pub fn evaluate_analogies(store: &EmbeddingStore, sections: &[AnalogySection]) -> AnalogyReport {
    let mut report = AnalogyReport::default();

    for section in sections {
        let mut tally = SectionAccuracy {
            name: section.name.clone(),
            correct: 0,
            answered: 0,
        };
        for [a, b, c, d] in &section.questions {
            if [a, b, c, d].iter().any(|t| !store.contains(t.as_str())) {
                report.skipped_oov += 1;
                continue;
            }
            let prediction = match store.most_similar(&[b.as_str(), c.as_str()], &[a.as_str()], 1) {
                Ok(p) => p,
                Err(_) => {
                    report.skipped_oov += 1;
                    continue;
                }
            };
            tally.answered += 1;
            if prediction.first().map(|(t, _)| t.as_str()) == Some(d.as_str()) {
                tally.correct += 1;
            }
        }
        report.correct += tally.correct;
        report.answered += tally.answered;
        report.sections.push(tally);
    }

    tracing::info!(
        accuracy = report.accuracy(),
        answered = report.answered,
        skipped_oov = report.skipped_oov,
        "analogy evaluation finished"
    );
    report
}
