// SPDX-License-Identifier: Apache-2.0

use chemmap_model::FingerprintMatrix;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::debug;

use crate::metric::jaccard_distance;

/// Inputs up to this many rows are searched exhaustively; larger ones use
/// [`nn_descent`].
pub const EXACT_KNN_MAX_ROWS: usize = 8_000;

const MAX_CANDIDATES: usize = 60;
const MIN_DESCENT_ROUNDS: usize = 5;
/// A round that changes fewer than this share of the `n * k` slots ends the
/// descent.
const CONVERGENCE_DELTA: f64 = 0.001;
/// Rows joined per parallel step; bounds the proposal buffer.
const JOIN_BLOCK: usize = 512;

/// `k` nearest other rows of every row, nearest first. Ties resolve to the
/// lower row index so the graph never depends on thread scheduling.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnGraph {
    k: usize,
    indices: Vec<usize>,
    distances: Vec<f64>,
}

impl KnnGraph {
    fn empty() -> Self {
        Self {
            k: 0,
            indices: Vec::new(),
            distances: Vec::new(),
        }
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub fn n_vertices(&self) -> usize {
        if self.k == 0 {
            0
        } else {
            self.indices.len() / self.k
        }
    }

    #[must_use]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.indices[i * self.k..(i + 1) * self.k]
    }

    #[must_use]
    pub fn distances(&self, i: usize) -> &[f64] {
        &self.distances[i * self.k..(i + 1) * self.k]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnnStrategy {
    Exact,
    /// Seeded neighbour descent; the result depends on the seed only.
    Descent { seed: u64 },
}

impl KnnStrategy {
    #[must_use]
    pub fn for_rows(n_rows: usize, seed: u64) -> Self {
        if n_rows <= EXACT_KNN_MAX_ROWS {
            Self::Exact
        } else {
            Self::Descent { seed }
        }
    }
}

#[must_use]
pub fn knn_graph(
    matrix: &FingerprintMatrix,
    k: usize,
    strategy: KnnStrategy,
    pool: &rayon::ThreadPool,
) -> KnnGraph {
    match strategy {
        KnnStrategy::Exact => exact_knn(matrix, k, pool),
        KnnStrategy::Descent { seed } => nn_descent(matrix, k, seed, pool),
    }
}

/// Brute-force search; every row is scored against every other row.
#[must_use]
pub fn exact_knn(matrix: &FingerprintMatrix, k: usize, pool: &rayon::ThreadPool) -> KnnGraph {
    let n = matrix.n_rows();
    let k = k.min(n.saturating_sub(1));
    if k == 0 {
        return KnnGraph::empty();
    }
    let rows: Vec<Vec<(f64, usize)>> = pool.install(|| {
        (0..n)
            .into_par_iter()
            .map(|i| nearest_of(matrix, i, k))
            .collect()
    });
    let mut indices = Vec::with_capacity(n * k);
    let mut distances = Vec::with_capacity(n * k);
    for row in rows {
        for (d, j) in row {
            distances.push(d);
            indices.push(j);
        }
    }
    KnnGraph {
        k,
        indices,
        distances,
    }
}

fn nearest_of(matrix: &FingerprintMatrix, i: usize, k: usize) -> Vec<(f64, usize)> {
    let query = matrix.row(i);
    let mut scored: Vec<(f64, usize)> = (0..matrix.n_rows())
        .filter(|j| *j != i)
        .map(|j| (jaccard_distance(query, matrix.row(j)), j))
        .collect();
    let order = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, order);
        scored.truncate(k);
    }
    scored.sort_unstable_by(order);
    scored
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    distance: f64,
    index: usize,
    fresh: bool,
}

impl Entry {
    fn precedes(&self, distance: f64, index: usize) -> bool {
        self.distance
            .total_cmp(&distance)
            .then(self.index.cmp(&index))
            .is_lt()
    }
}

/// Current best `k` candidates of one row, sorted nearest first.
#[derive(Debug, Clone)]
struct NeighborList {
    entries: Vec<Entry>,
}

impl NeighborList {
    fn worst(&self) -> f64 {
        self.entries.last().map_or(f64::INFINITY, |e| e.distance)
    }

    /// `true` when `index` displaced the current worst entry.
    fn push(&mut self, distance: f64, index: usize) -> bool {
        let Some(last) = self.entries.last() else {
            return false;
        };
        let improves = distance
            .total_cmp(&last.distance)
            .then(index.cmp(&last.index))
            .is_lt();
        if !improves || self.entries.iter().any(|e| e.index == index) {
            return false;
        }
        let pos = self.entries.partition_point(|e| e.precedes(distance, index));
        self.entries.insert(
            pos,
            Entry {
                distance,
                index,
                fresh: true,
            },
        );
        self.entries.pop();
        true
    }
}

#[derive(Debug, Default)]
struct Candidates {
    fresh: Vec<usize>,
    old: Vec<usize>,
}

/// Approximate kNN by neighbour descent: start from random neighbours and
/// repeatedly let the neighbours of each row propose each other. The random
/// start is seeded per row and proposals are applied in row order, so the
/// graph is the same for any worker count.
#[must_use]
pub fn nn_descent(
    matrix: &FingerprintMatrix,
    k: usize,
    seed: u64,
    pool: &rayon::ThreadPool,
) -> KnnGraph {
    let n = matrix.n_rows();
    let k = k.min(n.saturating_sub(1));
    if k == 0 {
        return KnnGraph::empty();
    }
    let dist = |a: usize, b: usize| jaccard_distance(matrix.row(a), matrix.row(b));
    let mut lists: Vec<NeighborList> = pool.install(|| {
        (0..n)
            .into_par_iter()
            .map(|i| random_neighbors(i, n, k, seed, &dist))
            .collect()
    });

    let max_candidates = k.min(MAX_CANDIDATES);
    let rounds = ((n as f64).log2().round() as usize).max(MIN_DESCENT_ROUNDS);
    for round in 0..rounds {
        let salt = mix(seed, round as u64 + 1);
        let candidates = sample_candidates(&mut lists, max_candidates, salt);
        let mut updates = 0_usize;
        for start in (0..n).step_by(JOIN_BLOCK) {
            let end = (start + JOIN_BLOCK).min(n);
            let proposals: Vec<Vec<(usize, usize, f64)>> = pool.install(|| {
                (start..end)
                    .into_par_iter()
                    .map(|i| local_join(&candidates[i], &lists, &dist))
                    .collect()
            });
            for (a, b, d) in proposals.into_iter().flatten() {
                updates += usize::from(lists[a].push(d, b));
                updates += usize::from(lists[b].push(d, a));
            }
        }
        debug!(round, updates, "neighbour descent round");
        if (updates as f64) <= CONVERGENCE_DELTA * (n * k) as f64 {
            break;
        }
    }

    let mut indices = Vec::with_capacity(n * k);
    let mut distances = Vec::with_capacity(n * k);
    for list in lists {
        for e in list.entries {
            indices.push(e.index);
            distances.push(e.distance);
        }
    }
    KnnGraph {
        k,
        indices,
        distances,
    }
}

fn random_neighbors(
    i: usize,
    n: usize,
    k: usize,
    seed: u64,
    dist: &impl Fn(usize, usize) -> f64,
) -> NeighborList {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(i as u64);
    let mut entries: Vec<Entry> = rand::seq::index::sample(&mut rng, n - 1, k)
        .into_iter()
        .map(|j| if j >= i { j + 1 } else { j })
        .map(|j| Entry {
            distance: dist(i, j),
            index: j,
            fresh: true,
        })
        .collect();
    entries.sort_unstable_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)));
    NeighborList { entries }
}

/// Forward and reverse candidates of every row for one round. At most
/// `max_candidates` of each kind are kept, chosen by a seeded hash; sampled
/// fresh entries become old.
fn sample_candidates(
    lists: &mut [NeighborList],
    max_candidates: usize,
    salt: u64,
) -> Vec<Candidates> {
    let n = lists.len();
    let mut forward: Vec<Candidates> = (0..n).map(|_| Candidates::default()).collect();
    let mut reverse_fresh: Vec<Vec<(u64, usize)>> = vec![Vec::new(); n];
    let mut reverse_old: Vec<Vec<(u64, usize)>> = vec![Vec::new(); n];

    for (i, list) in lists.iter_mut().enumerate() {
        let mut fresh: Vec<(u64, usize)> = list
            .entries
            .iter()
            .filter(|e| e.fresh)
            .map(|e| (mix(mix(salt, i as u64), e.index as u64), e.index))
            .collect();
        fresh.sort_unstable();
        fresh.truncate(max_candidates);
        for e in &mut list.entries {
            let sampled = fresh.iter().any(|(_, j)| *j == e.index);
            if sampled {
                e.fresh = false;
                forward[i].fresh.push(e.index);
                reverse_fresh[e.index].push((mix(mix(salt, e.index as u64), i as u64), i));
            } else if !e.fresh {
                forward[i].old.push(e.index);
                reverse_old[e.index].push((mix(mix(salt, e.index as u64), i as u64), i));
            }
        }
    }

    forward
        .into_iter()
        .zip(reverse_fresh.into_iter().zip(reverse_old))
        .map(|(mut c, (mut rf, mut ro))| {
            for (reverse, into) in [(&mut rf, &mut c.fresh), (&mut ro, &mut c.old)] {
                reverse.sort_unstable();
                reverse.truncate(max_candidates);
                into.extend(reverse.iter().map(|(_, j)| *j));
                into.sort_unstable();
                into.dedup();
            }
            let fresh = &c.fresh;
            c.old.retain(|j| fresh.binary_search(j).is_err());
            c
        })
        .collect()
}

/// Pairs among one row's candidates that would improve either list.
fn local_join(
    candidates: &Candidates,
    lists: &[NeighborList],
    dist: &impl Fn(usize, usize) -> f64,
) -> Vec<(usize, usize, f64)> {
    let mut out = Vec::new();
    for (x, &a) in candidates.fresh.iter().enumerate() {
        for &b in candidates.fresh[x + 1..].iter().chain(&candidates.old) {
            if a == b {
                continue;
            }
            let d = dist(a, b);
            if d <= lists[a].worst() || d <= lists[b].worst() {
                out.push((a, b, d));
            }
        }
    }
    out
}

/// SplitMix64 finaliser over two words.
fn mix(a: u64, b: u64) -> u64 {
    let mut z = a ^ b.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chemmap_model::Fingerprint;

    fn matrix(rows: &[&[u32]]) -> FingerprintMatrix {
        let fps: Vec<Fingerprint> = rows
            .iter()
            .map(|r| Fingerprint::from_on_bits(16, r.iter().copied()).expect("fp"))
            .collect();
        FingerprintMatrix::from_fingerprints(16, fps.iter()).expect("matrix")
    }

    fn pool(threads: usize) -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("pool")
    }

    /// Six families of 100 rows; members share most of a 12-bit core and
    /// add 8 random bits.
    fn families() -> FingerprintMatrix {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut fps = Vec::new();
        for _ in 0..6 {
            let core: Vec<u32> = rand::seq::index::sample(&mut rng, 2048, 12)
                .into_iter()
                .map(|b| b as u32)
                .collect();
            for _ in 0..100 {
                let kept = rand::seq::index::sample(&mut rng, 12, 8)
                    .into_iter()
                    .map(|i| core[i]);
                let noise = rand::seq::index::sample(&mut rng, 2048, 8)
                    .into_iter()
                    .map(|b| b as u32);
                fps.push(Fingerprint::from_on_bits(2048, kept.chain(noise)).expect("fp"));
            }
        }
        FingerprintMatrix::from_fingerprints(2048, fps.iter()).expect("matrix")
    }

    #[test]
    fn nearest_first_and_self_excluded() {
        let m = matrix(&[&[1, 2, 3], &[1, 2, 3, 4], &[9, 10], &[1, 2]]);
        let g = exact_knn(&m, 2, &pool(2));
        assert_eq!(g.k(), 2);
        assert_eq!(g.n_vertices(), 4);
        assert_eq!(g.neighbors(0), &[1, 3]);
        assert!(g.distances(0)[0] <= g.distances(0)[1]);
        assert!(!g.neighbors(2).contains(&2));
    }

    #[test]
    fn ties_break_by_row_index() {
        let m = matrix(&[&[1], &[1], &[1], &[1]]);
        let g = exact_knn(&m, 2, &pool(2));
        assert_eq!(g.neighbors(3), &[0, 1]);
        assert_eq!(g.neighbors(0), &[1, 2]);
    }

    #[test]
    fn k_is_clamped_to_other_rows() {
        let m = matrix(&[&[1], &[2], &[3]]);
        assert_eq!(exact_knn(&m, 50, &pool(2)).k(), 2);
        assert_eq!(nn_descent(&m, 50, 1, &pool(2)).k(), 2);
        let single = matrix(&[&[1]]);
        assert_eq!(exact_knn(&single, 50, &pool(2)).n_vertices(), 0);
        assert_eq!(nn_descent(&single, 50, 1, &pool(2)).n_vertices(), 0);
    }

    #[test]
    fn strategy_switches_to_descent_above_exact_limit() {
        assert_eq!(KnnStrategy::for_rows(0, 9), KnnStrategy::Exact);
        assert_eq!(KnnStrategy::for_rows(EXACT_KNN_MAX_ROWS, 9), KnnStrategy::Exact);
        assert_eq!(
            KnnStrategy::for_rows(EXACT_KNN_MAX_ROWS + 1, 9),
            KnnStrategy::Descent { seed: 9 }
        );
        let m = matrix(&[&[1, 2], &[1, 3], &[4], &[4, 5], &[2, 3]]);
        assert_eq!(
            knn_graph(&m, 2, KnnStrategy::Exact, &pool(1)),
            exact_knn(&m, 2, &pool(1))
        );
    }

    #[test]
    fn descent_recovers_most_exact_neighbours() {
        let m = families();
        let k = 10;
        let exact = exact_knn(&m, k, &pool(4));
        let approx = nn_descent(&m, k, 42, &pool(4));
        assert_eq!(approx.n_vertices(), m.n_rows());
        let mut hits = 0;
        for i in 0..m.n_rows() {
            let kth = exact.distances(i)[k - 1];
            assert!(!approx.neighbors(i).contains(&i));
            assert!(approx.distances(i).windows(2).all(|w| w[0] <= w[1]));
            hits += approx.distances(i).iter().filter(|d| **d <= kth).count();
        }
        let recall = hits as f64 / (m.n_rows() * k) as f64;
        assert!(recall >= 0.9, "recall {recall}");
    }

    #[test]
    fn descent_ignores_worker_count() {
        let m = families();
        let one = nn_descent(&m, 8, 3, &pool(1));
        assert_eq!(one, nn_descent(&m, 8, 3, &pool(4)));
        assert_eq!(one, nn_descent(&m, 8, 3, &pool(1)));
    }
}
