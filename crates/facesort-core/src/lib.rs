//! facesort-core — face clustering engine.
//!
//! Detects and canonically aligns faces (SCRFD via ONNX Runtime), extracts
//! embeddings with a FaceNet-style model, builds a similarity graph over
//! the embeddings, and clusters it with chinese-whispers label propagation.
//! No cluster count is configured anywhere; it emerges from the graph.

pub mod alignment;
pub mod cluster;
pub mod detector;
pub mod embedder;
pub mod graph;
pub mod normalizer;
pub mod store;
pub mod types;

use std::path::PathBuf;

pub use cluster::ClusterParams;
pub use graph::FaceGraph;
pub use normalizer::FaceNormalizer;
pub use types::{AlignedFace, BoundingBox, DetectorMode, Embedding};

/// Default directory for ONNX model files.
///
/// `FACESORT_MODEL_DIR` overrides; otherwise `$XDG_DATA_HOME/facesort/models`
/// or `~/.local/share/facesort/models`.
pub fn default_model_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FACESORT_MODEL_DIR") {
        return PathBuf::from(dir);
    }

    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facesort/models")
}
