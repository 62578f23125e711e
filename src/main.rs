use std::fs::OpenOptions;
use std::io::Write;

use serde_json::{json, Value};

use sentivec::{Aggregation, Result, TrainParams, TrainingEngine};

const REVIEWS: &[(&str, u8)] = &[
    ("what a good movie with a great cast and a good story", 1),
    ("great acting and a really good script make a great film", 1),
    ("a good film with great moments and a good ending", 1),
    ("bad writing and a terrible plot make a bad movie", 0),
    ("terrible acting in a bad film with a terrible ending", 0),
    ("a bad story with terrible pacing and a bad script", 0),
];

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn save_embeddings(file_path: &str, values: &[Value]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(file_path)?;
    let encoded = serde_json::to_string_pretty(values)
        .map_err(|e| sentivec::Error::Persistence(e.to_string()))?;
    file.write_all(encoded.as_bytes())?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let sentences: Vec<Vec<String>> = REVIEWS.iter().map(|(text, _)| tokenize(text)).collect();

    let params = TrainParams::new()
        .set_vector_size(50)
        .set_window(3)
        .set_min_count(1)
        .set_sample_threshold(0.0)
        .set_epochs(80)
        .set_seed(42);
    let engine = TrainingEngine::new(&sentences, params)?;
    let store = engine.train(&sentences)?;

    for (word, score) in store.most_similar(&["good"], &[], 5)? {
        println!("good ~ {word}: {score:.4}");
    }
    println!(
        "similarity(good, bad) = {:.4}",
        store.similarity("good", "bad")?
    );

    for (text, label) in REVIEWS {
        let doc_vec = sentivec::document_vector(&tokenize(text), &store, Aggregation::Mean);
        println!("label {label}: doc vector starts {:?}", &doc_vec[..3.min(doc_vec.len())]);
    }

    let values: Vec<Value> = store
        .tokens()
        .iter()
        .map(|token| {
            let embedding = store.vector(token)?;
            Ok(json!({ "word": token, "embedding": embedding }))
        })
        .collect::<Result<_>>()?;
    save_embeddings("embeddings.json", &values)?;

    store.save("model.bin")?;
    Ok(())
}
