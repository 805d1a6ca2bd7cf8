//! Chinese-whispers label propagation over the similarity graph.
//!
//! Each pass visits every node in a freshly shuffled random order and gives
//! it the neighbor label with the highest summed edge weight. The cluster
//! count is emergent: the run converges on however many labels survive.
//!
//! Two reference-semantics decisions are fixed here deliberately:
//! - neighbor lookups observe already-updated labels within the same pass
//!   (sequential fresh reads), and
//! - ties in weighted support break to the lowest label id.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use std::collections::HashMap;

use crate::graph::{FaceGraph, DEFAULT_THRESHOLD};
use crate::types::ConfigError;

/// Default pass budget.
pub const DEFAULT_ITERATIONS: usize = 30;

/// Default RNG seed for the pass-order shuffle.
pub const DEFAULT_SEED: u64 = 1;

/// Validated clustering parameters.
#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    /// Euclidean distance cutoff for edge creation.
    pub threshold: f32,
    /// Maximum number of propagation passes.
    pub iterations: usize,
    /// Seed for the pass-order shuffle; same seed, same final labeling.
    pub seed: u64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            iterations: DEFAULT_ITERATIONS,
            seed: DEFAULT_SEED,
        }
    }
}

impl ClusterParams {
    /// Fail fast on out-of-range values, before any processing begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if self.iterations == 0 {
            return Err(ConfigError::InvalidIterations);
        }
        Ok(())
    }
}

/// Run chinese-whispers label propagation until a fixed point or until the
/// pass budget is exhausted, whichever comes first.
///
/// Returns the number of passes actually performed. Isolated nodes keep
/// their initial singleton label and are never visited usefully, but they
/// remain in the graph's final assignment.
pub fn propagate(graph: &mut FaceGraph, iterations: usize, seed: u64) -> usize {
    let n = graph.len();
    if n == 0 {
        return 0;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n).collect();

    for pass in 0..iterations {
        order.shuffle(&mut rng);
        let mut changed = 0usize;

        for &v in &order {
            let neighbors = graph.neighbors(v);
            if neighbors.is_empty() {
                continue;
            }

            // Weighted support per distinct neighbor label, reading labels
            // as already updated earlier in this pass.
            let mut support: HashMap<usize, f32> = HashMap::with_capacity(neighbors.len());
            for &(u, weight) in neighbors {
                *support.entry(graph.label(u)).or_insert(0.0) += weight;
            }

            // Maximum summed weight; ties break to the lowest label id.
            let mut best_label = graph.label(v);
            let mut best_weight = f32::NEG_INFINITY;
            for (&label, &weight) in &support {
                if weight > best_weight || (weight == best_weight && label < best_label) {
                    best_label = label;
                    best_weight = weight;
                }
            }

            if best_label != graph.label(v) {
                graph.set_label(v, best_label);
                changed += 1;
            }
        }

        tracing::debug!(pass = pass + 1, changed, "propagation pass complete");

        // Fixed point: a full pass with no label changes ends the run.
        if changed == 0 {
            return pass + 1;
        }
    }

    iterations
}

/// Validate parameters, then run propagation with their budget and seed.
pub fn propagate_with_params(graph: &mut FaceGraph, params: &ClusterParams) -> Result<usize, ConfigError> {
    params.validate()?;
    Ok(propagate(graph, params.iterations, params.seed))
}
