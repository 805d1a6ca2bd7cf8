use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use facesort_core::store::{self, EmbeddingRecord};
use facesort_core::{cluster, embedder::FaceEmbedder, ClusterParams, DetectorMode, FaceGraph, FaceNormalizer};

mod sorter;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Parser)]
#[command(name = "facesort", about = "Sort face photos into per-identity directories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect, align, and embed every face in a directory of photos
    Embed {
        /// Directory of input photos
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Detector profile: HOG (fast) or CNN (accurate)
        #[arg(short, long, default_value = "HOG")]
        detector: String,

        /// Directory containing the ONNX model files
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Output embedding store
        #[arg(short, long, default_value = "embeddings.json")]
        output: PathBuf,
    },
    /// Cluster saved embeddings and copy photos into per-cluster directories
    Sort {
        /// Embedding store written by `facesort embed`
        #[arg(short, long, default_value = "embeddings.json")]
        embeddings: PathBuf,

        /// Minimum distance between face embeddings to form an edge
        #[arg(short, long, default_value_t = facesort_core::graph::DEFAULT_THRESHOLD)]
        threshold: f32,

        /// Number of iterations for the chinese whispers algorithm
        #[arg(long, default_value_t = cluster::DEFAULT_ITERATIONS)]
        iterations: usize,

        /// Seed for the propagation pass order (same seed, same clustering)
        #[arg(long, default_value_t = cluster::DEFAULT_SEED)]
        seed: u64,

        /// Root directory for the sorted output
        #[arg(short, long, default_value = "sorted-pictures")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Embed { input_dir, detector, model_dir, output } => {
            run_embed(&input_dir, &detector, model_dir, &output)
        }
        Commands::Sort { embeddings, threshold, iterations, seed, output_dir } => {
            run_sort(&embeddings, ClusterParams { threshold, iterations, seed }, &output_dir)
        }
    }
}

/// Walk the input directory, normalize each photo, and persist one
/// embedding record per detected face. Per-image failures are logged and
/// skipped; model-load failures abort before any image is touched.
fn run_embed(
    input_dir: &Path,
    detector: &str,
    model_dir: Option<PathBuf>,
    output: &Path,
) -> Result<()> {
    let mode: DetectorMode = detector.parse()?;
    let model_dir = model_dir.unwrap_or_else(facesort_core::default_model_dir);

    let mut normalizer = FaceNormalizer::new(&model_dir, mode)
        .context("loading face detection model")?;
    let mut embedder = FaceEmbedder::load(&model_dir)
        .context("loading face embedding model")?;

    let images = collect_images(input_dir)?;
    if images.is_empty() {
        bail!("no images found in {}", input_dir.display());
    }
    tracing::info!(count = images.len(), dir = %input_dir.display(), "embedding photos");

    let mut records = Vec::new();
    for path in &images {
        let faces = match normalizer.normalize_path(path) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable image");
                continue;
            }
        };

        if faces.is_empty() {
            tracing::debug!(path = %path.display(), "no usable face, skipping");
            continue;
        }

        for face in &faces {
            match embedder.extract(face) {
                Ok(embedding) => records.push(EmbeddingRecord::new(path.clone(), embedding)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "embedding failed, skipping face");
                }
            }
        }
    }

    store::save_records(output, &records)?;
    println!("embedded {} faces from {} photos into {}", records.len(), images.len(), output.display());
    Ok(())
}

/// Load the embedding store, cluster it, and materialize the result.
fn run_sort(embeddings: &Path, params: ClusterParams, output_dir: &Path) -> Result<()> {
    // Configuration errors fail before any I/O.
    params.validate()?;

    let records = store::load_records(embeddings)?;

    let mut graph = FaceGraph::build(&records, params.threshold)?;
    tracing::info!(nodes = graph.len(), edges = graph.edge_count(), "similarity graph built");

    let passes = cluster::propagate(&mut graph, params.iterations, params.seed);
    tracing::info!(passes, "label propagation finished");

    let clusters = graph.clusters();
    let summary = sorter::materialize(&clusters, output_dir)
        .with_context(|| format!("materializing clusters under {}", output_dir.display()))?;

    println!(
        "sorted {} faces into {} clusters under {} ({} missing sources skipped)",
        summary.copied,
        summary.clusters,
        output_dir.display(),
        summary.skipped
    );
    Ok(())
}

/// Image files directly inside `dir`, sorted by path for a stable order.
fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading input directory {}", dir.display()))?;

    let mut images: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    images.sort();
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.JPG", "a.png", "notes.txt", "c.webp", "noext"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let images = collect_images(dir.path()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG", "c.webp"]);
    }

    #[test]
    fn test_collect_images_missing_dir() {
        assert!(collect_images(Path::new("/nonexistent/facesort-test")).is_err());
    }
}
