// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod knn;
mod metric;
mod optimize;
mod split;

use std::fmt::{Display, Formatter};

use chemmap_model::{CoordinateBlock, EmbeddingParams, ExecutionMode, FingerprintMatrix, Metric};
use ndarray::Array2;
use tracing::{debug, info};
use umap_rs::{
    EuclideanMetric, GraphParams, LearnedManifold, ManifoldParams, Metric as _,
    OptimizationParams, Optimizer, Umap, UmapConfig,
};

pub const CRATE_NAME: &str = "chemmap-embed";

pub use knn::{exact_knn, knn_graph, nn_descent, KnnGraph, KnnStrategy, EXACT_KNN_MAX_ROWS};
pub use metric::jaccard_distance;
pub use optimize::{optimize_layout, random_init, EdgeList, LayoutParams};
pub use split::{row_ranges, split_by_row_counts, SplitError};

#[derive(Debug)]
pub struct EmbedError(pub String);
impl Display for EmbedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for EmbedError {}

/// Reduces fingerprint rows to 2-D points; output row `i` belongs to input
/// row `i`.
pub trait EmbeddingEngine {
    fn embed(&self, fingerprints: &FingerprintMatrix) -> Result<CoordinateBlock, EmbedError>;
}

/// UMAP over Jaccard neighbours. The `umap-rs` crate builds the fuzzy graph
/// and fits the curve; parallel mode also runs its multi-threaded layout.
/// Deterministic mode lays the same graph out on one thread with a seeded
/// sampler, because the crate's own sampler is not seedable.
#[derive(Debug, Clone)]
pub struct UmapEngine {
    params: EmbeddingParams,
    mode: ExecutionMode,
    workers: usize,
}

impl UmapEngine {
    /// `workers` sizes the pool in parallel mode; deterministic mode always
    /// uses one thread.
    pub fn new(
        params: EmbeddingParams,
        mode: ExecutionMode,
        workers: usize,
    ) -> Result<Self, EmbedError> {
        params.validate().map_err(|e| EmbedError(e.0))?;
        if workers == 0 {
            return Err(EmbedError("worker count must be >= 1".to_string()));
        }
        Ok(Self {
            params,
            mode,
            workers,
        })
    }

    #[must_use]
    pub fn params(&self) -> &EmbeddingParams {
        &self.params
    }

    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    fn pool(&self) -> Result<rayon::ThreadPool, EmbedError> {
        let threads = match self.mode {
            ExecutionMode::Deterministic => 1,
            ExecutionMode::Parallel => self.workers,
        };
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("chemmap-embed-{i}"))
            .build()
            .map_err(|e| EmbedError(format!("cannot start embedding pool: {e}")))
    }

    fn umap_config(&self, n_neighbors: usize, n_epochs: usize) -> UmapConfig {
        let p = &self.params;
        UmapConfig {
            n_components: 2,
            manifold: ManifoldParams {
                min_dist: p.min_dist as f32,
                spread: p.spread as f32,
                a: None,
                b: None,
            },
            graph: GraphParams {
                n_neighbors,
                ..GraphParams::default()
            },
            optimization: OptimizationParams {
                n_epochs: Some(n_epochs),
                learning_rate: p.learning_rate as f32,
                negative_sample_rate: p.negative_sample_rate,
                ..OptimizationParams::default()
            },
        }
    }
}

/// Smallest input the manifold step accepts: it needs at least two
/// neighbours per row, the row itself included, and more rows than that.
const MIN_MANIFOLD_ROWS: usize = 3;

impl EmbeddingEngine for UmapEngine {
    fn embed(&self, fingerprints: &FingerprintMatrix) -> Result<CoordinateBlock, EmbedError> {
        let n = fingerprints.n_rows();
        if n < MIN_MANIFOLD_ROWS {
            return Ok(CoordinateBlock::new(
                (0..n).map(|i| [i as f64, 0.0]).collect(),
            ));
        }
        if u32::try_from(n).is_err() {
            return Err(EmbedError(format!("{n} rows exceed the embedding index range")));
        }
        let p = &self.params;
        let n_epochs = p.effective_epochs(n);
        // n_neighbors counts the row itself.
        let n_neighbors = p.n_neighbors.min(n - 1);
        let strategy = KnnStrategy::for_rows(n, p.seed);
        info!(
            rows = n,
            n_neighbors,
            min_dist = p.min_dist,
            epochs = n_epochs,
            mode = ?self.mode,
            knn = ?strategy,
            "embedding fingerprints"
        );
        let pool = self.pool()?;

        let knn = match p.metric {
            Metric::Jaccard => knn_graph(fingerprints, n_neighbors - 1, strategy, &pool),
        };
        debug!(k = knn.k(), "neighbour graph built");
        let (knn_indices, knn_dists) = knn_arrays(&knn, n_neighbors)?;

        let config = self.umap_config(n_neighbors, n_epochs);
        let umap = Umap::new(config.clone());
        // learn_manifold reads only the row count of `data`.
        let data = Array2::<f32>::zeros((n, 1));
        let manifold = pool.install(|| {
            umap.learn_manifold(data.view(), knn_indices.view(), knn_dists.view())
        });
        let (a, b) = manifold.curve_params();
        debug!(a, b, "manifold learned");

        let init = random_init(n, p.seed);
        let embedding = match self.mode {
            ExecutionMode::Deterministic => {
                let mut points = init;
                optimize_layout(
                    &mut points,
                    &manifold_edges(&manifold),
                    &LayoutParams {
                        n_epochs,
                        learning_rate: p.learning_rate,
                        negative_sample_rate: p.negative_sample_rate,
                        seed: p.seed,
                        a: f64::from(a),
                        b: f64::from(b),
                    },
                );
                points
            }
            ExecutionMode::Parallel => {
                let start = Array2::from_shape_vec(
                    (n, 2),
                    init.iter().flat_map(|pt| pt.map(|v| v as f32)).collect(),
                )
                .map_err(|e| EmbedError(format!("initial layout shape: {e}")))?;
                let fitted = pool.install(|| {
                    let metric = EuclideanMetric;
                    let mut optimizer =
                        Optimizer::new(manifold, start, n_epochs, &config, metric.metric_type());
                    optimizer.step_epochs(n_epochs, &metric);
                    optimizer.into_fitted(config)
                });
                fitted
                    .embedding()
                    .rows()
                    .into_iter()
                    .map(|row| [f64::from(row[0]), f64::from(row[1])])
                    .collect()
            }
        };
        if embedding.iter().flatten().any(|v| !v.is_finite()) {
            return Err(EmbedError("layout diverged to non-finite coordinates".to_string()));
        }
        info!(rows = n, "embedding complete");
        Ok(CoordinateBlock::new(embedding))
    }
}

/// Neighbour table in the layout the manifold step expects: the row itself
/// first at distance zero, then its `n_neighbors - 1` nearest other rows.
fn knn_arrays(
    knn: &KnnGraph,
    n_neighbors: usize,
) -> Result<(Array2<u32>, Array2<f32>), EmbedError> {
    let n = knn.n_vertices();
    let mut indices = Vec::with_capacity(n * n_neighbors);
    let mut distances = Vec::with_capacity(n * n_neighbors);
    for i in 0..n {
        indices.push(i as u32);
        distances.push(0.0);
        indices.extend(knn.neighbors(i).iter().map(|j| *j as u32));
        distances.extend(knn.distances(i).iter().map(|d| *d as f32));
    }
    let shape = (n, n_neighbors);
    let indices = Array2::from_shape_vec(shape, indices)
        .map_err(|e| EmbedError(format!("neighbour index table: {e}")))?;
    let distances = Array2::from_shape_vec(shape, distances)
        .map_err(|e| EmbedError(format!("neighbour distance table: {e}")))?;
    Ok((indices, distances))
}

fn manifold_edges(manifold: &LearnedManifold) -> EdgeList {
    let mut edges = EdgeList::default();
    for (head, row) in manifold.graph().outer_iterator().enumerate() {
        for (tail, weight) in row.iter() {
            edges.heads.push(head);
            edges.tails.push(tail);
            edges.weights.push(f64::from(*weight));
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use chemmap_model::Fingerprint;

    #[test]
    fn neighbour_table_puts_each_row_first() {
        let fps: Vec<Fingerprint> = [[1_u32, 2], [1, 3], [7, 8], [7, 9]]
            .iter()
            .map(|bits| Fingerprint::from_on_bits(16, bits.iter().copied()).expect("fp"))
            .collect();
        let m = FingerprintMatrix::from_fingerprints(16, fps.iter()).expect("matrix");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .expect("pool");
        let knn = exact_knn(&m, 2, &pool);
        let (indices, distances) = knn_arrays(&knn, 3).expect("tables");
        assert_eq!(indices.shape(), &[4, 3]);
        assert_eq!(indices.row(2).to_vec(), vec![2, 3, 0]);
        assert_eq!(distances[(2, 0)], 0.0);
        assert!(distances[(2, 1)] < distances[(2, 2)]);
    }
}
