//! Cluster materializer: one directory per cluster, source images copied in.
//!
//! Clustering has already finished by the time this runs, so every failure
//! here is local: a missing source file is logged and skipped, never fatal.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Outcome of a materialization run.
#[derive(Debug, Default)]
pub struct SortSummary {
    pub clusters: usize,
    pub copied: usize,
    pub skipped: usize,
}

/// Copy each cluster's source images into `out_root/cluster_<label>/`.
///
/// Directory creation failures are fatal (the whole output tree is a shared
/// prerequisite); individual copy failures are logged and counted.
pub fn materialize(
    clusters: &BTreeMap<usize, Vec<PathBuf>>,
    out_root: &Path,
) -> io::Result<SortSummary> {
    fs::create_dir_all(out_root)?;

    let mut summary = SortSummary { clusters: clusters.len(), ..Default::default() };

    for (label, sources) in clusters {
        let cluster_dir = out_root.join(format!("cluster_{label}"));
        fs::create_dir_all(&cluster_dir)?;

        for source in sources {
            let Some(file_name) = source.file_name() else {
                tracing::warn!(source = %source.display(), "source has no file name, skipping");
                summary.skipped += 1;
                continue;
            };

            match fs::copy(source, cluster_dir.join(file_name)) {
                Ok(_) => summary.copied += 1,
                Err(e) => {
                    tracing::warn!(
                        source = %source.display(),
                        error = %e,
                        "failed to copy source image, skipping"
                    );
                    summary.skipped += 1;
                }
            }
        }
    }

    Ok(summary)
}
