// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod encoder;
mod hashing;
mod logging;
mod pool;
mod reader;
pub mod smiles;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::io::BufRead;
use std::path::{Path, PathBuf};

use chemmap_model::FingerprintMatrix;
use tracing::{debug, info};

pub const CRATE_NAME: &str = "chemmap-ingest";

pub use encoder::{MorganEncoder, StructureEncoder};
pub use hashing::hash_file;
pub use logging::{IngestEvent, IngestLog, IngestStage};
pub use pool::{default_worker_count, EncodePool};
pub use reader::{
    delimiter_for_path, open_structure_source, StructureChunkReader, DEFAULT_STRUCTURE_COLUMN,
};

#[derive(Debug)]
pub struct IngestError(pub String);
impl Display for IngestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for IngestError {}

pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub source: PathBuf,
    pub smiles_column: String,
    pub chunk_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            smiles_column: DEFAULT_STRUCTURE_COLUMN.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IngestStats {
    pub records_read: usize,
    pub encoded: usize,
    pub rejected: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone)]
pub struct DatasetFingerprints {
    pub matrix: FingerprintMatrix,
    pub stats: IngestStats,
    pub events: Vec<IngestEvent>,
}

/// Streams `opts.source` chunk by chunk, encodes each chunk on `pool` and
/// keeps the successful fingerprints in read order.
pub fn build_dataset_fingerprints(
    opts: &IngestOptions,
    encoder: &dyn StructureEncoder,
    pool: &EncodePool,
) -> Result<DatasetFingerprints, IngestError> {
    let reader = open_structure_source(&opts.source, &opts.smiles_column)?;
    build_from_reader(reader, &opts.source, opts.chunk_size, encoder, pool)
}

/// Same as [`build_dataset_fingerprints`] over an already opened reader;
/// `origin` only labels log lines and events.
pub fn build_from_reader<R: BufRead>(
    mut reader: StructureChunkReader<R>,
    origin: &Path,
    chunk_size: usize,
    encoder: &dyn StructureEncoder,
    pool: &EncodePool,
) -> Result<DatasetFingerprints, IngestError> {
    if chunk_size == 0 {
        return Err(IngestError("chunk size must be >= 1".to_string()));
    }
    let params = encoder.params();
    let mut log = IngestLog::default();
    log.emit(
        IngestStage::Prepare,
        "ingest.start",
        logging::fields([
            ("source", origin.display().to_string()),
            ("radius", params.radius.to_string()),
            ("n_bits", params.n_bits.to_string()),
            ("workers", pool.workers().to_string()),
        ]),
    );

    let mut matrix = FingerprintMatrix::empty(params.n_bits);
    let mut stats = IngestStats::default();
    while let Some(chunk) = reader.next_chunk(chunk_size)? {
        stats.chunks += 1;
        info!(
            source = %origin.display(),
            chunk = stats.chunks,
            rows = chunk.len(),
            "processing chunk"
        );
        log.emit(
            IngestStage::Read,
            "ingest.chunk.read",
            logging::fields([
                ("chunk", stats.chunks.to_string()),
                ("rows", chunk.len().to_string()),
            ]),
        );

        let encoded = pool.encode_chunk(encoder, &chunk);
        let mut rejected = 0usize;
        for (structure, fp) in chunk.iter().zip(&encoded) {
            match fp {
                Some(fp) => matrix
                    .push(fp)
                    .map_err(|e| IngestError(format!("encoder output rejected: {e}")))?,
                None => {
                    rejected += 1;
                    debug!(source = %origin.display(), structure = %structure, "unparseable structure skipped");
                }
            }
        }
        stats.records_read += chunk.len();
        stats.rejected += rejected;
        stats.encoded += chunk.len() - rejected;
        log.emit(
            IngestStage::Encode,
            "ingest.chunk.encoded",
            logging::fields([
                ("chunk", stats.chunks.to_string()),
                ("encoded", (chunk.len() - rejected).to_string()),
                ("rejected", rejected.to_string()),
            ]),
        );
    }

    log.emit(
        IngestStage::Assemble,
        "ingest.matrix.assembled",
        logging::fields([
            ("rows", matrix.n_rows().to_string()),
            ("nnz", matrix.nnz().to_string()),
        ]),
    );
    info!(
        source = %origin.display(),
        records = stats.records_read,
        encoded = stats.encoded,
        rejected = stats.rejected,
        "dataset fingerprints built"
    );
    log.emit(IngestStage::Finalize, "ingest.done", BTreeMap::new());

    Ok(DatasetFingerprints {
        matrix,
        stats,
        events: log.into_events(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build(text: &str, chunk_size: usize, workers: usize) -> DatasetFingerprints {
        let reader = StructureChunkReader::new(Cursor::new(text.as_bytes().to_vec()), ',', "smiles")
            .expect("reader");
        let pool = EncodePool::new(workers).expect("pool");
        build_from_reader(
            reader,
            Path::new("inline.csv"),
            chunk_size,
            &MorganEncoder::default(),
            &pool,
        )
        .expect("build")
    }

    #[test]
    fn stats_count_chunks_and_rejections() {
        let out = build("smiles\nCCO\nxx(\nc1ccccc1\n\nC1CC\nN\n", 2, 2);
        assert_eq!(
            out.stats,
            IngestStats {
                records_read: 5,
                encoded: 3,
                rejected: 2,
                chunks: 3,
            }
        );
        assert_eq!(out.matrix.n_rows(), 3);
    }

    #[test]
    fn events_bracket_the_run() {
        let out = build("smiles\nC\n", 10, 1);
        let names: Vec<&str> = out.events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"ingest.start"));
        assert_eq!(names.last(), Some(&"ingest.done"));
        assert!(names.contains(&"ingest.chunk.encoded"));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let reader =
            StructureChunkReader::new(Cursor::new(b"smiles\nC\n".to_vec()), ',', "smiles")
                .expect("reader");
        let pool = EncodePool::new(1).expect("pool");
        let err = build_from_reader(reader, Path::new("x"), 0, &MorganEncoder::default(), &pool)
            .expect_err("zero chunk");
        assert!(err.0.contains("chunk size"));
    }
}
