//! Face embedding extraction via ONNX Runtime.
//!
//! Runs a pre-trained FaceNet-style model over canonically aligned 160×160
//! RGB crops, producing 512-dimensional L2-normalized embedding vectors.
//! The network itself is a black box; only its input/output contract
//! matters here.

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

use crate::types::{AlignedFace, Embedding, ALIGNED_CHANNELS, ALIGNED_SIZE};

const EMBEDDER_MEAN: f32 = 127.5;
const EMBEDDER_STD: f32 = 128.0;
const EMBEDDING_DIM: usize = 512;
const EMBEDDER_MODEL_FILE: &str = "facenet.onnx";

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding model not found: {0} — place facenet.onnx in the model directory")]
    ModelNotFound(String),
    #[error("failed to load embedding model: {0}")]
    ModelLoad(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

/// FaceNet-style embedding extractor, loaded once per run.
#[derive(Debug)]
pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    /// Load the embedding model from `model_dir`. Fatal on failure.
    pub fn load(model_dir: &Path) -> Result<Self, EmbedderError> {
        let model_path = model_dir.join(EMBEDDER_MODEL_FILE);
        if !model_path.exists() {
            return Err(EmbedderError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()
            .and_then(|b| Ok(b.with_intra_threads(2)?))
            .and_then(|mut b| b.commit_from_file(&model_path))
            .map_err(|e| EmbedderError::ModelLoad(e.to_string()))?;

        tracing::info!(path = %model_path.display(), "loaded embedding model");

        Ok(Self { session })
    }

    /// Extract an embedding from an aligned face crop.
    pub fn extract(&mut self, face: &AlignedFace) -> Result<Embedding, EmbedderError> {
        let input = preprocess(face);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())
                .map_err(|e| EmbedderError::InferenceFailed(e.to_string()))?])
            .map_err(|e| EmbedderError::InferenceFailed(e.to_string()))?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();

        if raw.len() != EMBEDDING_DIM {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        // L2-normalize so Euclidean distances are comparable across crops
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw
        };

        Ok(Embedding { values })
    }
}

/// Preprocess an aligned RGB crop into a NCHW float tensor.
fn preprocess(face: &AlignedFace) -> Array4<f32> {
    let size = ALIGNED_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, ALIGNED_CHANNELS, size, size));

    for y in 0..size {
        for x in 0..size {
            let off = (y * size + x) * ALIGNED_CHANNELS;
            for c in 0..ALIGNED_CHANNELS {
                let pixel = face.pixels.get(off + c).copied().unwrap_or(0) as f32;
                tensor[[0, c, y, x]] = (pixel - EMBEDDER_MEAN) / EMBEDDER_STD;
            }
        }
    }

    tensor
}
