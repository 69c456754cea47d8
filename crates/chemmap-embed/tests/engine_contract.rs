// SPDX-License-Identifier: Apache-2.0

use chemmap_embed::{EmbeddingEngine, UmapEngine};
use chemmap_model::{CoordinateBlock, EmbeddingParams, ExecutionMode, Fingerprint, FingerprintMatrix};

/// Two families with disjoint bit ranges; members of a family share a core.
fn two_clusters(per_cluster: usize) -> FingerprintMatrix {
    let mut fps = Vec::new();
    for offset in [0_u32, 200] {
        for r in 0..per_cluster as u32 {
            let core = (0..6).map(move |t| offset + t);
            let bits = core.chain((0..6).map(move |t| offset + 10 + (r * 7 + t * 3) % 30));
            fps.push(Fingerprint::from_on_bits(256, bits).expect("fp"));
        }
    }
    FingerprintMatrix::from_fingerprints(256, fps.iter()).expect("matrix")
}

fn params() -> EmbeddingParams {
    EmbeddingParams {
        n_neighbors: 8,
        n_epochs: Some(120),
        ..EmbeddingParams::default()
    }
}

fn engine(mode: ExecutionMode, workers: usize) -> UmapEngine {
    UmapEngine::new(params(), mode, workers).expect("engine")
}

/// Rows of the block that sit closer to their own family's centroid than to
/// the other family's; the first `half` rows form one family.
fn rows_with_their_family(block: &CoordinateBlock, half: usize) -> usize {
    let points = block.points();
    let centroid = |rows: std::ops::Range<usize>| {
        let n = rows.len() as f64;
        let (sx, sy) = rows.fold((0.0, 0.0), |(sx, sy), i| {
            (sx + points[i][0], sy + points[i][1])
        });
        [sx / n, sy / n]
    };
    let (ca, cb) = (centroid(0..half), centroid(half..2 * half));
    let dist = |p: [f64; 2], c: [f64; 2]| ((p[0] - c[0]).powi(2) + (p[1] - c[1]).powi(2)).sqrt();
    (0..2 * half)
        .filter(|i| {
            let p = points[*i];
            let (own, other) = if *i < half { (ca, cb) } else { (cb, ca) };
            dist(p, own) < dist(p, other)
        })
        .count()
}

#[test]
fn one_point_per_row_in_input_order() {
    let m = two_clusters(15);
    let block = engine(ExecutionMode::Deterministic, 1)
        .embed(&m)
        .expect("embed");
    assert_eq!(block.len(), 30);
    assert!(block.points().iter().flatten().all(|v| v.is_finite()));
    let correct = rows_with_their_family(&block, 15);
    assert!(correct >= 27, "only {correct} of 30 rows sit with their family");
}

#[test]
fn deterministic_mode_is_bit_identical_across_runs() {
    let m = two_clusters(10);
    let e = engine(ExecutionMode::Deterministic, 4);
    assert_eq!(e.embed(&m).expect("first"), e.embed(&m).expect("second"));
}

#[test]
fn deterministic_mode_ignores_worker_count() {
    let m = two_clusters(10);
    let a = engine(ExecutionMode::Deterministic, 1).embed(&m).expect("one worker");
    let b = engine(ExecutionMode::Deterministic, 4).embed(&m).expect("four workers");
    assert_eq!(a, b);
}

#[test]
fn parallel_mode_separates_families() {
    let m = two_clusters(15);
    let block = engine(ExecutionMode::Parallel, 4).embed(&m).expect("embed");
    assert_eq!(block.len(), 30);
    assert!(block.points().iter().flatten().all(|v| v.is_finite()));
    let correct = rows_with_their_family(&block, 15);
    assert!(correct >= 27, "only {correct} of 30 rows sit with their family");
}

#[test]
fn degenerate_inputs() {
    let e = engine(ExecutionMode::Deterministic, 1);
    assert!(e.embed(&FingerprintMatrix::empty(256)).expect("empty").is_empty());

    let one = FingerprintMatrix::from_fingerprints(
        256,
        [Fingerprint::from_on_bits(256, [1, 2]).expect("fp")].iter(),
    )
    .expect("matrix");
    assert_eq!(e.embed(&one).expect("single").points(), &[[0.0, 0.0]]);

    let two = two_clusters(1);
    assert_eq!(e.embed(&two).expect("pair").points(), &[[0.0, 0.0], [1.0, 0.0]]);

    let few = two_clusters(2);
    let block = e.embed(&few).expect("fewer rows than neighbours");
    assert_eq!(block.len(), 4);
    assert!(block.points().iter().flatten().all(|v| v.is_finite()));
}

#[test]
fn invalid_parameters_are_rejected() {
    let bad = EmbeddingParams {
        n_neighbors: 1,
        ..EmbeddingParams::default()
    };
    assert!(UmapEngine::new(bad, ExecutionMode::Deterministic, 1).is_err());
    assert!(UmapEngine::new(EmbeddingParams::default(), ExecutionMode::Parallel, 0).is_err());
}
