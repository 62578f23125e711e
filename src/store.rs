use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::vocab::Vocabulary;

/// Bumped whenever the persisted layout changes; `load` refuses anything else.
const FORMAT_VERSION: u32 = 1;

/// Immutable mapping from token to dense vector, the artifact a finished
/// training run produces. Also the interface for externally trained vector
/// sets, so downstream code never cares where the vectors came from.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmbeddingStore {
    version: u32,
    tokens: Vec<String>,
    matrix: Vec<f32>,
    dim: usize,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl EmbeddingStore {
    pub(crate) fn from_training(vocab: Vocabulary, matrix: Vec<f32>, dim: usize) -> Self {
        let tokens = vocab.words().iter().map(|w| w.token.clone()).collect();
        Self::assemble(tokens, matrix, dim)
    }

    /// Wraps an arbitrary token list and row-major matrix, e.g. vectors
    /// produced by another toolkit.
    pub fn from_parts(tokens: Vec<String>, matrix: Vec<f32>, dim: usize) -> Result<Self> {
        if matrix.len() != tokens.len() * dim {
            return Err(Error::Persistence(format!(
                "matrix of {} floats does not match {} tokens x {} dims",
                matrix.len(),
                tokens.len(),
                dim
            )));
        }
        Ok(Self::assemble(tokens, matrix, dim))
    }

    fn assemble(tokens: Vec<String>, matrix: Vec<f32>, dim: usize) -> Self {
        let index = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self {
            version: FORMAT_VERSION,
            tokens,
            matrix,
            dim,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    pub fn position(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    fn row(&self, index: usize) -> &[f32] {
        &self.matrix[index * self.dim..][..self.dim]
    }

    pub fn vector(&self, token: &str) -> Result<&[f32]> {
        self.index
            .get(token)
            .map(|&i| self.row(i))
            .ok_or_else(|| Error::UnknownToken(token.to_string()))
    }

    /// Cosine similarity between two in-vocabulary tokens; symmetric, in
    /// [-1, 1].
    pub fn similarity(&self, a: &str, b: &str) -> Result<f32> {
        Ok(cosine_similarity(self.vector(a)?, self.vector(b)?))
    }

    /// Ranks the whole vocabulary against `sum(unit(positive)) -
    /// sum(unit(negative))`. The literal query tokens never appear in the
    /// result; ties break toward the lower index so results are
    /// deterministic.
    pub fn most_similar(
        &self,
        positive: &[&str],
        negative: &[&str],
        top_n: usize,
    ) -> Result<Vec<(String, f32)>> {
        let mut query = vec![0.0f32; self.dim];
        let mut exclude = HashSet::new();

        for &token in positive {
            let i = self
                .position(token)
                .ok_or_else(|| Error::UnknownToken(token.to_string()))?;
            exclude.insert(i);
            accumulate_unit(&mut query, self.row(i), 1.0);
        }
        for &token in negative {
            let i = self
                .position(token)
                .ok_or_else(|| Error::UnknownToken(token.to_string()))?;
            exclude.insert(i);
            accumulate_unit(&mut query, self.row(i), -1.0);
        }

        let mut ranked: Vec<(usize, f32)> = (0..self.len())
            .filter(|i| !exclude.contains(i))
            .map(|i| (i, cosine_similarity(&query, self.row(i))))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(top_n);

        Ok(ranked
            .into_iter()
            .map(|(i, score)| (self.tokens[i].clone(), score))
            .collect())
    }

    /// Persists the store with bincode. The file handle is scoped to this
    /// function and released on every exit path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let encoded = bincode::serialize(self)?;
        writer.write_all(&encoded)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        let mut store: Self = bincode::deserialize(&buffer)?;
        if store.version != FORMAT_VERSION {
            return Err(Error::Persistence(format!(
                "unsupported model format version {} (expected {})",
                store.version, FORMAT_VERSION
            )));
        }
        store.index = store
            .tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Ok(store)
    }

    /// Reads the word2vec text format: a `<vocab_size> <dim>` header followed
    /// by one `word v1 .. vD` line per token.
    pub fn load_word2vec_text<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut header = String::new();
        reader.read_line(&mut header)?;
        let mut fields = header.split_whitespace();
        let vocab_size: usize = parse_header_field(fields.next())?;
        let dim: usize = parse_header_field(fields.next())?;

        let mut tokens = Vec::with_capacity(vocab_size);
        let mut matrix = Vec::with_capacity(vocab_size * dim);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let word = parts
                .next()
                .ok_or_else(|| Error::Persistence("missing word on vector line".into()))?;
            let values: Vec<f32> = parts
                .map(|v| {
                    v.parse::<f32>()
                        .map_err(|e| Error::Persistence(format!("bad float {v:?}: {e}")))
                })
                .collect::<Result<_>>()?;
            if values.len() != dim {
                return Err(Error::Persistence(format!(
                    "vector for {word:?} has {} dims, header says {dim}",
                    values.len()
                )));
            }
            tokens.push(word.to_string());
            matrix.extend(values);
        }
        if tokens.len() != vocab_size {
            return Err(Error::Persistence(format!(
                "read {} vectors, header says {vocab_size}",
                tokens.len()
            )));
        }
        Ok(Self::assemble(tokens, matrix, dim))
    }

    /// Writes the word2vec text format so external tooling can consume the
    /// vectors.
    pub fn save_word2vec_text<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{} {}", self.len(), self.dim)?;
        for (i, token) in self.tokens.iter().enumerate() {
            write!(writer, "{token}")?;
            for value in self.row(i) {
                write!(writer, " {value}")?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn parse_header_field(field: Option<&str>) -> Result<usize> {
    field
        .ok_or_else(|| Error::Persistence("truncated header".into()))?
        .parse()
        .map_err(|e| Error::Persistence(format!("bad header field: {e}")))
}

fn accumulate_unit(query: &mut [f32], row: &[f32], sign: f32) {
    let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for (q, v) in query.iter_mut().zip(row) {
        *q += sign * v / norm;
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
