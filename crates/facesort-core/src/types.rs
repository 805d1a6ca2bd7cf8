use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Side length of the canonical aligned face crop.
pub const ALIGNED_SIZE: usize = 160;

/// Number of interleaved color channels in an aligned crop.
pub const ALIGNED_CHANNELS: usize = 3;

/// Configuration errors. All of these are detected before any image is
/// touched and abort the run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("detector must be either HOG or CNN, got {0:?}")]
    InvalidDetectorMode(String),
    #[error("threshold must be a finite value greater than zero, got {0}")]
    InvalidThreshold(f32),
    #[error("iterations must be at least 1")]
    InvalidIterations,
}

/// Face detection profile.
///
/// `Hog` selects the small, fast detection model; `Cnn` the large,
/// accurate one. Parses case-insensitively from "HOG" / "CNN".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorMode {
    Hog,
    Cnn,
}

impl DetectorMode {
    /// File name of the ONNX detection model for this mode.
    pub fn model_file(&self) -> &'static str {
        match self {
            DetectorMode::Hog => "det_500m.onnx",
            DetectorMode::Cnn => "det_10g.onnx",
        }
    }
}

impl FromStr for DetectorMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HOG" => Ok(DetectorMode::Hog),
            "CNN" => Ok(DetectorMode::Cnn),
            _ => Err(ConfigError::InvalidDetectorMode(s.to_string())),
        }
    }
}

impl fmt::Display for DetectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorMode::Hog => write!(f, "HOG"),
            DetectorMode::Cnn => write!(f, "CNN"),
        }
    }
}

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// A canonically aligned 160×160 RGB face crop.
///
/// Every crop produced by the normalizer has identical dimensions, so a
/// batch of crops can be fed to the embedding model without per-image
/// shape handling.
#[derive(Debug, Clone)]
pub struct AlignedFace {
    /// Interleaved RGB pixels, `ALIGNED_SIZE * ALIGNED_SIZE * ALIGNED_CHANNELS` bytes.
    pub pixels: Vec<u8>,
}

impl AlignedFace {
    pub fn new(pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), ALIGNED_SIZE * ALIGNED_SIZE * ALIGNED_CHANNELS);
        Self { pixels }
    }
}

/// Face embedding vector (512-dimensional, L2-normalized).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Compute Euclidean distance between two embeddings.
    ///
    /// The embedding network is trained so that smaller distance implies
    /// higher likelihood of the same identity.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance_identical() {
        let a = Embedding { values: vec![1.0, 2.0, 3.0] };
        assert!(a.euclidean_distance(&a).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_unit_apart() {
        let a = Embedding { values: vec![0.0, 0.0] };
        let b = Embedding { values: vec![3.0, 4.0] };
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_symmetric() {
        let a = Embedding { values: vec![0.1, 0.9, -0.3] };
        let b = Embedding { values: vec![-0.4, 0.2, 0.7] };
        assert!((a.euclidean_distance(&b) - b.euclidean_distance(&a)).abs() < 1e-6);
    }

    #[test]
    fn test_detector_mode_parses_case_insensitive() {
        assert_eq!("HOG".parse::<DetectorMode>().unwrap(), DetectorMode::Hog);
        assert_eq!("hog".parse::<DetectorMode>().unwrap(), DetectorMode::Hog);
        assert_eq!("CNN".parse::<DetectorMode>().unwrap(), DetectorMode::Cnn);
        assert_eq!("cnn".parse::<DetectorMode>().unwrap(), DetectorMode::Cnn);
    }

    #[test]
    fn test_detector_mode_rejects_unknown() {
        let err = "yolo".parse::<DetectorMode>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDetectorMode(_)));
    }

    #[test]
    fn test_detector_mode_model_files_differ() {
        assert_ne!(DetectorMode::Hog.model_file(), DetectorMode::Cnn.model_file());
    }
}
