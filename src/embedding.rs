//! Concrete `EmbeddingProvider` backed by `model2vec-rs` (spec §1, §6):
//! the one real embedding-model implementation this crate ships, grounded
//! on the teacher's `StaticModel` usage in `vector_store.rs`.

use model2vec_rs::model::StaticModel;

use crate::capability::EmbeddingProvider;
use crate::error::{RaggrepError, Result};

/// Wraps a loaded `model2vec` static model and exposes it through the
/// `EmbeddingProvider` capability trait (spec §6).
pub struct Model2VecProvider {
    model: StaticModel,
    model_id: String,
    dimension: usize,
}

impl Model2VecProvider {
    /// Loads `model_id` (a local path or a HuggingFace repo id, per
    /// `model2vec-rs`'s own resolution rules) and probes its output
    /// dimension with a throwaway encode.
    pub fn load(model_id: &str) -> Result<Self> {
        let model = StaticModel::from_pretrained(model_id, None, None, None)
            .map_err(|e| RaggrepError::Embedding(format!("failed to load model {model_id}: {e}")))?;
        let probe = model.encode_single("dimension probe");
        let dimension = probe.len();
        Ok(Self {
            model,
            model_id: model_id.to_string(),
            dimension,
        })
    }
}

impl EmbeddingProvider for Model2VecProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(normalize(self.model.encode_single(text)))
    }

    // `model2vec-rs`'s public surface only exposes `encode_single` (per the
    // teacher's usage); batching falls back to the trait's default
    // one-at-a-time loop rather than guessing at an unverified bulk API.
}

/// `model2vec-rs` does not guarantee unit-normalized output; the
/// `EmbeddingProvider` contract (spec §6) does, so we normalize here once
/// rather than asking every caller to.
fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
