//! Persisted embedding store.
//!
//! One JSON array of records, written by `facesort embed` and read back by
//! `facesort sort`. A missing store at sort time is a fatal, user-visible
//! error, distinct from per-image skips during embedding.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Embedding;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no saved embeddings found at {0} — run `facesort embed` first")]
    NotFound(String),
    #[error("failed to read embedding store {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed embedding store {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One embedded face: the source image path plus its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub source: PathBuf,
    pub values: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn new(source: PathBuf, embedding: Embedding) -> Self {
        Self { source, values: embedding.values }
    }

    pub fn embedding(&self) -> Embedding {
        Embedding { values: self.values.clone() }
    }
}

/// Load all records from a JSON store file.
pub fn load_records(path: &Path) -> Result<Vec<EmbeddingRecord>, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.display().to_string()));
    }

    let data = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let records: Vec<EmbeddingRecord> =
        serde_json::from_str(&data).map_err(|source| StoreError::Malformed {
            path: path.display().to_string(),
            source,
        })?;

    tracing::info!(count = records.len(), path = %path.display(), "loaded embedding store");
    Ok(records)
}

/// Write all records to a JSON store file, replacing any existing content.
pub fn save_records(path: &Path, records: &[EmbeddingRecord]) -> Result<(), StoreError> {
    let data = serde_json::to_string(records).map_err(|source| StoreError::Malformed {
        path: path.display().to_string(),
        source,
    })?;

    fs::write(path, data).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;

    tracing::info!(count = records.len(), path = %path.display(), "saved embedding store");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.json");

        let records = vec![
            EmbeddingRecord { source: PathBuf::from("a.jpg"), values: vec![0.1, 0.2] },
            EmbeddingRecord { source: PathBuf::from("b.jpg"), values: vec![-0.3, 0.4] },
        ];

        save_records(&path, &records).unwrap();
        let loaded = load_records(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].source, PathBuf::from("a.jpg"));
        assert_eq!(loaded[0].values, vec![0.1, 0.2]);
        assert_eq!(loaded[1].source, PathBuf::from("b.jpg"));
    }

    #[test]
    fn test_missing_store_is_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_records(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_malformed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_records(&path).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[test]
    fn test_empty_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.json");
        save_records(&path, &[]).unwrap();
        assert!(load_records(&path).unwrap().is_empty());
    }
}
