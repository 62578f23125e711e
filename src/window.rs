use rand::Rng;

use crate::vocab::Vocabulary;

/// One training item: a center word and the surviving context around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSample {
    pub center: usize,
    pub context: Vec<usize>,
}

/// Lazy, one-shot iterator of (center, context) samples for a single sentence
/// already mapped to vocabulary indices.
///
/// Subsampling happens up front: each occurrence is independently dropped with
/// probability `1 - keep_prob`. Per surviving position an effective window is
/// drawn uniformly from `1..=window`, which weights nearby words more heavily
/// than a fixed window would. Centers whose context ends up empty are skipped.
///
/// The iterator is cheap to rebuild, so the trainer regenerates it per
/// sentence per epoch.
pub struct WindowSampler<'r, R: Rng> {
    kept: Vec<usize>,
    position: usize,
    window: usize,
    rng: &'r mut R,
}

impl<'r, R: Rng> WindowSampler<'r, R> {
    pub fn new(sentence: &[usize], vocab: &Vocabulary, window: usize, rng: &'r mut R) -> Self {
        let kept = sentence
            .iter()
            .copied()
            .filter(|&index| rng.gen::<f32>() < vocab.word(index).keep_prob)
            .collect();
        Self {
            kept,
            position: 0,
            window,
            rng,
        }
    }
}

impl<R: Rng> Iterator for WindowSampler<'_, R> {
    type Item = WindowSample;

    fn next(&mut self) -> Option<WindowSample> {
        while self.position < self.kept.len() {
            let position = self.position;
            self.position += 1;

            let center = self.kept[position];
            let shrunk = self.rng.gen_range(1..=self.window);
            let start = position.saturating_sub(shrunk);
            let end = (position + shrunk + 1).min(self.kept.len());

            let context: Vec<usize> = (start..end)
                .filter(|&p| p != position)
                .map(|p| self.kept[p])
                .collect();
            if context.is_empty() {
                continue;
            }
            return Some(WindowSample { center, context });
        }
        None
    }
}
