use std::collections::HashMap;

use sentivec::{
    document_vector, evaluate, evaluate_analogies, vectorize_documents, Aggregation,
    AnalogySection, Classifier, EmbeddingStore, ModelKind, Result, TrainParams, TrainingEngine,
};

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Minimal stand-in for the external classifier capability: a two-class
/// nearest-centroid rule, which is linear for this purpose.
#[derive(Default)]
struct NearestCentroid {
    centroids: Vec<(i32, Vec<f32>)>,
}

impl Classifier<i32> for NearestCentroid {
    fn fit(&mut self, features: &[Vec<f32>], labels: &[i32]) -> Result<()> {
        let mut grouped: HashMap<i32, (Vec<f32>, usize)> = HashMap::new();
        for (x, &y) in features.iter().zip(labels) {
            let entry = grouped
                .entry(y)
                .or_insert_with(|| (vec![0.0; x.len()], 0));
            for (a, v) in entry.0.iter_mut().zip(x) {
                *a += v;
            }
            entry.1 += 1;
        }
        self.centroids = grouped
            .into_iter()
            .map(|(label, (mut sum, n))| {
                for v in &mut sum {
                    *v /= n as f32;
                }
                (label, sum)
            })
            .collect();
        Ok(())
    }

    fn score(&self, features: &[Vec<f32>], labels: &[i32]) -> Result<f32> {
        let mut correct = 0usize;
        for (x, &y) in features.iter().zip(labels) {
            let predicted = self
                .centroids
                .iter()
                .min_by(|(_, a), (_, b)| {
                    distance(a, x).total_cmp(&distance(b, x))
                })
                .map(|(label, _)| *label);
            if predicted == Some(y) {
                correct += 1;
            }
        }
        Ok(correct as f32 / features.len() as f32)
    }
}

fn distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

#[test]
fn tiny_sentiment_corpus_trains_without_error() {
    let corpus = [("good great movie", 1), ("bad terrible film", 0)];
    let sentences: Vec<Vec<String>> = corpus.iter().map(|(text, _)| tokenize(text)).collect();

    let params = TrainParams::new()
        .set_vector_size(8)
        .set_min_count(1)
        .set_sample_threshold(0.0)
        .set_epochs(5)
        .set_seed(3);
    let store = TrainingEngine::new(&sentences, params)
        .unwrap()
        .train(&sentences)
        .unwrap();

    let sim = store.similarity("good", "great").unwrap();
    assert!(sim.is_finite());
    assert!((-1.0..=1.0).contains(&sim));
}

#[test]
fn trained_store_survives_a_save_load_round_trip() {
    let sentences: Vec<Vec<String>> = [
        "good great movie really good",
        "bad terrible film really bad",
        "great movie good film",
    ]
    .iter()
    .map(|t| tokenize(t))
    .collect();

    let params = TrainParams::new()
        .set_vector_size(12)
        .set_min_count(1)
        .set_sample_threshold(0.0)
        .set_epochs(4)
        .set_seed(21);
    let store = TrainingEngine::new(&sentences, params)
        .unwrap()
        .train(&sentences)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trained.bin");
    store.save(&path).unwrap();
    let loaded = EmbeddingStore::load(&path).unwrap();

    assert_eq!(loaded.tokens(), store.tokens());
    for token in store.tokens() {
        assert_eq!(loaded.vector(token).unwrap(), store.vector(token).unwrap());
    }
}

fn analogy_store() -> EmbeddingStore {
    // Hand-constructed so paris:france :: tokyo:japan holds exactly,
    // independent of training randomness. Filler tokens sit on an unrelated
    // axis and pad the vocabulary past ten entries.
    let mut tokens: Vec<String> = vec![
        "paris".into(),
        "france".into(),
        "tokyo".into(),
        "japan".into(),
    ];
    let mut matrix = vec![
        1.0, 0.0, 0.0, 0.0, //
        1.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 1.0, 1.0, 0.0, //
    ];
    for i in 0..7 {
        tokens.push(format!("filler{i}"));
        matrix.extend([0.0, 0.0, 0.0, 1.0 + i as f32]);
    }
    EmbeddingStore::from_parts(tokens, matrix, 4).unwrap()
}

#[test]
fn analogy_arithmetic_recovers_the_expected_token() {
    let store = analogy_store();
    assert!(store.len() >= 10);

    let results = store.most_similar(&["france", "tokyo"], &["paris"], 1).unwrap();
    assert_eq!(results[0].0, "japan");
}

#[test]
fn analogy_evaluation_reports_accuracy_and_oov_rate() {
    let store = analogy_store();
    let sections = vec![AnalogySection {
        name: "capitals".into(),
        questions: vec![
            [
                "paris".into(),
                "france".into(),
                "tokyo".into(),
                "japan".into(),
            ],
            [
                "paris".into(),
                "france".into(),
                "berlin".into(),
                "germany".into(),
            ],
        ],
    }];

    let report = evaluate_analogies(&store, &sections);
    assert_eq!(report.answered, 1);
    assert_eq!(report.correct, 1);
    assert_eq!(report.skipped_oov, 1);
    assert_eq!(report.accuracy(), 1.0);
    assert_eq!(report.oov_rate(), 0.5);
    assert_eq!(report.sections[0].accuracy(), 1.0);
}

#[test]
fn separable_documents_reach_full_accuracy_with_mean_aggregation() {
    // Positive and negative documents use disjoint vocabularies with
    // well-separated vectors, so a linear rule must get all four right.
    let store = EmbeddingStore::from_parts(
        vec![
            "wonderful".into(),
            "amazing".into(),
            "awful".into(),
            "dreadful".into(),
        ],
        vec![
            1.0, 0.2, //
            0.8, 0.4, //
            -1.0, -0.2, //
            -0.8, -0.4, //
        ],
        2,
    )
    .unwrap();

    let documents: Vec<Vec<String>> = [
        "wonderful amazing",
        "amazing wonderful amazing",
        "awful dreadful",
        "dreadful awful dreadful",
    ]
    .iter()
    .map(|t| tokenize(t))
    .collect();
    let labels = vec![1, 1, 0, 0];

    let vectors = vectorize_documents(&documents, &store, Aggregation::Mean);
    let mut classifier = NearestCentroid::default();
    let accuracy = evaluate(&mut classifier, &vectors, &labels, &vectors, &labels).unwrap();
    assert_eq!(accuracy, 1.0);
}

#[test]
fn full_pipeline_from_training_to_classification() {
    let corpus: Vec<(&str, i32)> = vec![
        ("good great movie good fun", 1),
        ("great good film fun great", 1),
        ("good fun movie great good", 1),
        ("bad terrible film boring bad", 0),
        ("terrible bad boring film terrible", 0),
        ("bad boring terrible bad film", 0),
    ];
    let sentences: Vec<Vec<String>> = corpus.iter().map(|(t, _)| tokenize(t)).collect();
    let labels: Vec<i32> = corpus.iter().map(|(_, l)| *l).collect();

    let params = TrainParams::new()
        .set_vector_size(16)
        .set_window(2)
        .set_min_count(1)
        .set_sample_threshold(0.0)
        .set_epochs(30)
        .set_model(ModelKind::SkipGram)
        .set_seed(5);
    let store = TrainingEngine::new(&sentences, params)
        .unwrap()
        .train(&sentences)
        .unwrap();

    let vectors = vectorize_documents(&sentences, &store, Aggregation::Mean);
    assert!(vectors.iter().all(|v| v.len() == 16));
    assert!(vectors.iter().flatten().all(|v| v.is_finite()));

    let mut classifier = NearestCentroid::default();
    let accuracy = evaluate(&mut classifier, &vectors, &labels, &vectors, &labels).unwrap();
    assert!((0.0..=1.0).contains(&accuracy));
}

#[test]
fn empty_document_aggregates_to_the_zero_sentinel() {
    let store = analogy_store();
    let empty: Vec<String> = vec![];
    assert_eq!(document_vector(&empty, &store, Aggregation::Max), vec![0.0; 4]);
    assert_eq!(
        document_vector(&["unseen"], &store, Aggregation::Sum),
        vec![0.0; 4]
    );
}
