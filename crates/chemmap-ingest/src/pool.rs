// SPDX-License-Identifier: Apache-2.0

use chemmap_model::Fingerprint;
use rayon::prelude::*;

use crate::encoder::StructureEncoder;
use crate::IngestError;

/// Half of the available cores, never less than one.
#[must_use]
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

/// Bounded pool that encodes one chunk at a time. Each worker runs the
/// encoder on its own records; results come back in submission order.
pub struct EncodePool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl EncodePool {
    pub fn new(workers: usize) -> Result<Self, IngestError> {
        if workers == 0 {
            return Err(IngestError("worker count must be >= 1".to_string()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("chemmap-encode-{i}"))
            .build()
            .map_err(|e| IngestError(format!("cannot start encode pool: {e}")))?;
        Ok(Self { pool, workers })
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Encodes every record of `chunk`; entry `i` of the result belongs to
    /// record `i`. Returns once all workers have finished the chunk.
    pub fn encode_chunk<E>(&self, encoder: &E, chunk: &[String]) -> Vec<Option<Fingerprint>>
    where
        E: StructureEncoder + ?Sized,
    {
        self.pool.install(|| {
            chunk
                .par_iter()
                .map(|structure| encoder.encode(structure))
                .collect()
        })
    }
}

impl std::fmt::Debug for EncodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodePool")
            .field("workers", &self.workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::MorganEncoder;

    #[test]
    fn results_keep_submission_order() {
        let pool = EncodePool::new(4).expect("pool");
        let encoder = MorganEncoder::default();
        let chunk: Vec<String> = ["CCO", "bad(", "c1ccccc1", "N", "C1CC"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        let out = pool.encode_chunk(&encoder, &chunk);
        let expected: Vec<Option<Fingerprint>> = chunk.iter().map(|s| encoder.encode(s)).collect();
        assert_eq!(out, expected);
        assert_eq!(
            out.iter().map(Option::is_some).collect::<Vec<_>>(),
            vec![true, false, true, true, false]
        );
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(EncodePool::new(0).is_err());
        assert!(default_worker_count() >= 1);
    }
}
