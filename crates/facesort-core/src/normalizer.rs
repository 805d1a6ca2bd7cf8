//! Face normalizer: raw image in, canonically aligned 160×160 crops out.
//!
//! Detection runs on the luminance plane, upsampled by a fixed factor for
//! sensitivity to small faces; alignment warps the full-color image so the
//! output crops keep their color fidelity.

use std::path::Path;

use thiserror::Error;

use crate::alignment;
use crate::detector::{self, DetectorError, FaceDetector};
use crate::types::{AlignedFace, DetectorMode, ALIGNED_SIZE};

/// Images with either dimension below this yield no faces. A face smaller
/// than the canonical crop cannot be aligned without upsampling artifacts.
pub const MIN_IMAGE_DIM: u32 = ALIGNED_SIZE as u32;

/// Fixed luminance upsampling factor applied before detection.
const DETECTION_UPSAMPLE: u32 = 2;

#[derive(Error, Debug)]
pub enum NormalizerError {
    /// Per-item failure: the image could not be read or decoded.
    #[error("failed to load image {path}: {source}")]
    ImageLoad {
        path: String,
        #[source]
        source: image::ImageError,
    },
    /// Fatal: the detection model could not be loaded.
    #[error(transparent)]
    Model(#[from] DetectorError),
}

/// Whether an image is large enough to produce meaningful aligned crops.
pub fn meets_minimum_resolution(width: u32, height: u32) -> bool {
    width >= MIN_IMAGE_DIM && height >= MIN_IMAGE_DIM
}

/// Face normalizer holding the detection model for the whole run.
///
/// Loading the model is the expensive one-time cost; the normalizer is
/// constructed once and passed by reference across all images.
#[derive(Debug)]
pub struct FaceNormalizer {
    detector: FaceDetector,
}

impl FaceNormalizer {
    /// Load the detection model for `mode` from `model_dir`.
    ///
    /// Fails fast: a missing or corrupt model aborts the batch before any
    /// image is processed.
    pub fn new(model_dir: &Path, mode: DetectorMode) -> Result<Self, NormalizerError> {
        let detector = FaceDetector::load(model_dir, mode)?;
        Ok(Self { detector })
    }

    /// Load an image from disk and produce zero or more aligned face crops.
    ///
    /// Returns an empty vector for images below the minimum resolution or
    /// without any detectable face. Crops come back in detector-reported
    /// (confidence-descending) order.
    pub fn normalize_path(&mut self, path: &Path) -> Result<Vec<AlignedFace>, NormalizerError> {
        let img = image::open(path).map_err(|source| NormalizerError::ImageLoad {
            path: path.display().to_string(),
            source,
        })?;
        self.normalize(&img)
    }

    /// Produce aligned crops from an already-decoded image.
    pub fn normalize(
        &mut self,
        img: &image::DynamicImage,
    ) -> Result<Vec<AlignedFace>, NormalizerError> {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        // Low-resolution discard, not an error.
        if !meets_minimum_resolution(width, height) {
            tracing::debug!(width, height, "image below minimum resolution, discarding");
            return Ok(Vec::new());
        }

        // Detection sees only luminance, upsampled for small faces.
        let luma = img.to_luma8();
        let up_w = width * DETECTION_UPSAMPLE;
        let up_h = height * DETECTION_UPSAMPLE;
        let upsampled = detector::resize_bilinear_luma(
            luma.as_raw(),
            width as usize,
            height as usize,
            up_w as usize,
            up_h as usize,
        );

        let faces = self.detector.detect(&upsampled, up_w, up_h)?;
        tracing::debug!(count = faces.len(), "faces detected");

        let mut aligned = Vec::with_capacity(faces.len());
        for face in &faces {
            let Some(landmarks) = face.landmarks.as_ref() else {
                tracing::warn!("detection without landmarks, skipping face");
                continue;
            };

            // Map landmarks from the upsampled luminance plane back to the
            // original frame before warping the color image.
            let inv = 1.0 / DETECTION_UPSAMPLE as f32;
            let mut lms = [(0.0f32, 0.0f32); 5];
            for (dst, &(lx, ly)) in lms.iter_mut().zip(landmarks.iter()) {
                *dst = (lx * inv, ly * inv);
            }

            aligned.push(alignment::align_face(rgb.as_raw(), width, height, &lms));
        }

        Ok(aligned)
    }
}
