//! Similarity graph over face embeddings.
//!
//! Index-based storage: a flat node array plus adjacency lists keyed by
//! node index. The graph is undirected and simple — no self-edges, no
//! duplicate edges — and every input node is present even when it has no
//! qualifying edge (isolated nodes become singleton clusters downstream).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::store::EmbeddingRecord;
use crate::types::{ConfigError, Embedding};

/// Default Euclidean distance cutoff for edge creation.
pub const DEFAULT_THRESHOLD: f32 = 0.67;

/// One face in the graph: source path, embedding, and current cluster label.
#[derive(Debug, Clone)]
pub struct EmbeddingNode {
    pub source: PathBuf,
    pub embedding: Embedding,
    /// Cluster label. Starts as the node's own index (singleton cluster).
    pub label: usize,
}

/// Undirected weighted similarity graph over embedding nodes.
#[derive(Debug, Clone)]
pub struct FaceGraph {
    nodes: Vec<EmbeddingNode>,
    /// Per-node list of (neighbor index, edge weight).
    adjacency: Vec<Vec<(usize, f32)>>,
}

impl FaceGraph {
    /// Build the graph from embedding records.
    ///
    /// For every unordered pair of distinct nodes, an edge exists iff the
    /// Euclidean distance between their embeddings is strictly below
    /// `threshold`; its weight is `threshold - distance`. This is the O(n²)
    /// stage: n(n-1)/2 distance evaluations.
    pub fn build(records: &[EmbeddingRecord], threshold: f32) -> Result<Self, ConfigError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }

        let n = records.len();
        let mut nodes = Vec::with_capacity(n);
        for (i, record) in records.iter().enumerate() {
            nodes.push(EmbeddingNode {
                source: record.source.clone(),
                embedding: record.embedding(),
                label: i,
            });
        }

        let mut adjacency: Vec<Vec<(usize, f32)>> = vec![Vec::new(); n];
        let mut edges = 0usize;

        for i in 0..n {
            for j in (i + 1)..n {
                let distance = nodes[i].embedding.euclidean_distance(&nodes[j].embedding);
                if distance < threshold {
                    let weight = threshold - distance;
                    adjacency[i].push((j, weight));
                    adjacency[j].push((i, weight));
                    edges += 1;
                }
            }
        }

        tracing::debug!(nodes = n, edges, threshold, "similarity graph built");

        Ok(Self { nodes, adjacency })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(|a| a.len()).sum::<usize>() / 2
    }

    pub fn node(&self, index: usize) -> &EmbeddingNode {
        &self.nodes[index]
    }

    /// Neighbors of a node as (neighbor index, edge weight) pairs.
    pub fn neighbors(&self, index: usize) -> &[(usize, f32)] {
        &self.adjacency[index]
    }

    pub fn label(&self, index: usize) -> usize {
        self.nodes[index].label
    }

    pub fn set_label(&mut self, index: usize, label: usize) {
        self.nodes[index].label = label;
    }

    /// Snapshot of all current labels, indexed by node.
    pub fn labels(&self) -> Vec<usize> {
        self.nodes.iter().map(|n| n.label).collect()
    }

    /// Iterate (source path, label) for every node.
    pub fn assignments(&self) -> impl Iterator<Item = (&Path, usize)> {
        self.nodes.iter().map(|n| (n.source.as_path(), n.label))
    }

    /// Group node sources by final cluster label.
    ///
    /// Ordered by label; within a cluster, sources appear in node order, so
    /// the result is deterministic for a given labeling.
    pub fn clusters(&self) -> BTreeMap<usize, Vec<PathBuf>> {
        let mut clusters: BTreeMap<usize, Vec<PathBuf>> = BTreeMap::new();
        for node in &self.nodes {
            clusters.entry(node.label).or_default().push(node.source.clone());
        }
        clusters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, values: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord { source: PathBuf::from(name), values }
    }

    /// Bridging layout on a line: A=0.0, B=0.3, C=0.9, so
    /// d(A,B)=0.3, d(B,C)=0.6, d(A,C)=0.9. With threshold 0.67 the edges
    /// (A,B) and (B,C) exist but (A,C) does not; B bridges the cluster.
    fn bridge_records() -> Vec<EmbeddingRecord> {
        vec![
            record("a.jpg", vec![0.0]),
            record("b.jpg", vec![0.3]),
            record("c.jpg", vec![0.9]),
        ]
    }

    #[test]
    fn test_edge_iff_distance_below_threshold() {
        // d(A,B)=0.3 < 0.67, d(B,C)=0.6 < 0.67, d(A,C)=0.9 >= 0.67
        let graph = FaceGraph::build(&bridge_records(), 0.67).unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.neighbors(0).iter().any(|&(j, _)| j == 1));
        assert!(graph.neighbors(1).iter().any(|&(j, _)| j == 2));
        assert!(!graph.neighbors(0).iter().any(|&(j, _)| j == 2));
    }

    #[test]
    fn test_edge_symmetry_and_weight() {
        let graph = FaceGraph::build(&bridge_records(), 0.67).unwrap();

        let (_, w_ab) = graph.neighbors(0).iter().find(|&&(j, _)| j == 1).copied().unwrap();
        let (_, w_ba) = graph.neighbors(1).iter().find(|&&(j, _)| j == 0).copied().unwrap();
        assert_eq!(w_ab, w_ba);
        // weight = threshold - distance
        assert!((w_ab - (0.67 - 0.3)).abs() < 1e-6);
    }

    #[test]
    fn test_no_self_edges() {
        let graph = FaceGraph::build(&bridge_records(), 10.0).unwrap();
        for i in 0..graph.len() {
            assert!(!graph.neighbors(i).iter().any(|&(j, _)| j == i));
        }
    }

    #[test]
    fn test_isolated_node_present() {
        let records = vec![record("d.jpg", vec![0.0, 0.0])];
        let graph = FaceGraph::build(&records, 0.67).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.neighbors(0).is_empty());
    }

    #[test]
    fn test_initial_labels_are_singletons() {
        let graph = FaceGraph::build(&bridge_records(), 0.67).unwrap();
        assert_eq!(graph.labels(), vec![0, 1, 2]);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let records = bridge_records();
        assert!(matches!(
            FaceGraph::build(&records, 0.0),
            Err(ConfigError::InvalidThreshold(_))
        ));
        assert!(matches!(
            FaceGraph::build(&records, -1.0),
            Err(ConfigError::InvalidThreshold(_))
        ));
        assert!(matches!(
            FaceGraph::build(&records, f32::NAN),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        let graph = FaceGraph::build(&[], 0.67).unwrap();
        assert!(graph.is_empty());
        assert!(graph.clusters().is_empty());
    }

    #[test]
    fn test_assignments_cover_every_node() {
        let graph = FaceGraph::build(&bridge_records(), 0.67).unwrap();
        let pairs: Vec<(&Path, usize)> = graph.assignments().collect();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], (Path::new("a.jpg"), 0));
        assert_eq!(pairs[2], (Path::new("c.jpg"), 2));
    }

    #[test]
    fn test_clusters_group_by_label() {
        let mut graph = FaceGraph::build(&bridge_records(), 0.67).unwrap();
        graph.set_label(0, 7);
        graph.set_label(1, 7);
        graph.set_label(2, 9);

        let clusters = graph.clusters();
        assert_eq!(clusters.len(), 2);
        assert_eq!(
            clusters[&7],
            vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")]
        );
        assert_eq!(clusters[&9], vec![PathBuf::from("c.jpg")]);
    }
}
