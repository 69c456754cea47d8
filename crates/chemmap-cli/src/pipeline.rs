// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use chemmap_core::ExitCode;
use chemmap_embed::{split_by_row_counts, EmbedError, EmbeddingEngine, SplitError};
use chemmap_ingest::{
    build_dataset_fingerprints, default_worker_count, hash_file, EncodePool, IngestError,
    IngestOptions, IngestStats, StructureEncoder, DEFAULT_CHUNK_SIZE, DEFAULT_STRUCTURE_COLUMN,
};
use chemmap_model::{
    CacheKeyStrategy, CombinedFingerprints, CoordinateBlock, DatasetSpec, EmbeddingParams,
    ExecutionMode, FingerprintMatrix, FingerprintParams, RunDatasets, ValidationError,
};
use chemmap_render::{render_run, FigureRenderer, RenderError};
use chemmap_store::{ArtifactCache, EmbeddingKey, FingerprintKey, StoreError};
use serde::Serialize;
use tracing::info;

/// Validated settings of one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub datasets: RunDatasets,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub fingerprint: FingerprintParams,
    pub embedding: EmbeddingParams,
    pub mode: ExecutionMode,
    pub workers: usize,
    pub chunk_size: usize,
    pub smiles_column: String,
    pub cache_keys: CacheKeyStrategy,
}

impl RunConfig {
    /// Defaults for everything except the datasets; the cache shares the
    /// output directory.
    #[must_use]
    pub fn new(datasets: RunDatasets, output_dir: PathBuf) -> Self {
        Self {
            datasets,
            cache_dir: output_dir.clone(),
            output_dir,
            fingerprint: FingerprintParams::default(),
            embedding: EmbeddingParams::default(),
            mode: ExecutionMode::default(),
            workers: default_worker_count(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            smiles_column: DEFAULT_STRUCTURE_COLUMN.to_string(),
            cache_keys: CacheKeyStrategy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.fingerprint.validate()?;
        self.embedding.validate()?;
        if self.workers == 0 {
            return Err(ValidationError("worker count must be >= 1".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(ValidationError("chunk size must be >= 1".to_string()));
        }
        if self.smiles_column.trim().is_empty() {
            return Err(ValidationError(
                "structure column name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run-scoped state handed to every stage: the validated config and the
/// encode pool built from it.
#[derive(Debug)]
pub struct RunContext {
    config: RunConfig,
    pool: EncodePool,
}

impl RunContext {
    pub fn new(config: RunConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let pool = EncodePool::new(config.workers)?;
        Ok(Self { config, pool })
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    #[must_use]
    pub fn pool(&self) -> &EncodePool {
        &self.pool
    }
}

/// Collaborators of one run.
#[derive(Clone, Copy)]
pub struct PipelineStages<'a> {
    pub encoder: &'a dyn StructureEncoder,
    pub cache: &'a dyn ArtifactCache,
    pub engine: &'a dyn EmbeddingEngine,
    pub renderer: &'a dyn FigureRenderer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOutcome {
    pub base_name: String,
    pub label: String,
    pub rows: usize,
    pub fingerprint_key: String,
    pub from_cache: bool,
    /// Present only when the fingerprints were computed in this run.
    pub stats: Option<IngestStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub datasets: Vec<DatasetOutcome>,
    pub embedding_key: String,
    pub embedding_from_cache: bool,
    pub images: Vec<PathBuf>,
    #[serde(skip)]
    pub blocks: Vec<CoordinateBlock>,
}

#[derive(Debug)]
pub enum PipelineError {
    Validation(ValidationError),
    Ingest(IngestError),
    Store(StoreError),
    Embed(EmbedError),
    Split(SplitError),
    Render(RenderError),
}

impl PipelineError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Validation(_) => ExitCode::Validation,
            Self::Ingest(_) | Self::Store(_) | Self::Render(_) => ExitCode::DependencyFailure,
            Self::Embed(_) | Self::Split(_) => ExitCode::Internal,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Ingest(_) => "ingest_error",
            Self::Store(e) => e.code.as_str(),
            Self::Embed(_) => "embedding_error",
            Self::Split(_) => "cache_inconsistency",
            Self::Render(_) => "render_error",
        }
    }
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{e}"),
            Self::Ingest(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
            Self::Embed(e) => write!(f, "{e}"),
            Self::Split(e) => write!(f, "{e}"),
            Self::Render(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(e) => Some(e),
            Self::Ingest(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Embed(e) => Some(e),
            Self::Split(e) => Some(e),
            Self::Render(e) => Some(e),
        }
    }
}

impl From<ValidationError> for PipelineError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<IngestError> for PipelineError {
    fn from(e: IngestError) -> Self {
        Self::Ingest(e)
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<EmbedError> for PipelineError {
    fn from(e: EmbedError) -> Self {
        Self::Embed(e)
    }
}

impl From<SplitError> for PipelineError {
    fn from(e: SplitError) -> Self {
        Self::Split(e)
    }
}

impl From<RenderError> for PipelineError {
    fn from(e: RenderError) -> Self {
        Self::Render(e)
    }
}

struct LoadedDataset {
    matrix: FingerprintMatrix,
    key: FingerprintKey,
    outcome: DatasetOutcome,
}

/// Fingerprints every dataset (or loads them), embeds the combined matrix
/// (or loads it), splits the coordinates back per dataset and renders the
/// figures. Any stage failure ends the run; nothing is rendered unless every
/// earlier stage succeeded.
pub fn run_pipeline(
    ctx: &RunContext,
    stages: &PipelineStages<'_>,
) -> Result<PipelineReport, PipelineError> {
    let cfg = ctx.config();
    info!(
        datasets = cfg.datasets.len(),
        output = %cfg.output_dir.display(),
        cache = %cfg.cache_dir.display(),
        mode = ?cfg.mode,
        workers = cfg.workers,
        "run started"
    );

    let mut matrices = Vec::with_capacity(cfg.datasets.len());
    let mut keys = Vec::with_capacity(cfg.datasets.len());
    let mut outcomes = Vec::with_capacity(cfg.datasets.len());
    for spec in cfg.datasets.iter() {
        let loaded = dataset_fingerprints(ctx, stages, spec)?;
        matrices.push(loaded.matrix);
        keys.push(loaded.key);
        outcomes.push(loaded.outcome);
    }
    let combined = CombinedFingerprints::concat(&matrices)?;
    drop(matrices);
    info!(
        rows = combined.matrix().n_rows(),
        n_bits = combined.matrix().n_cols(),
        "combined fingerprint matrix"
    );

    let embedding_key = match cfg.cache_keys {
        CacheKeyStrategy::DatasetName => EmbeddingKey::by_name(),
        CacheKeyStrategy::ContentHash => {
            EmbeddingKey::by_content(&keys, &cfg.embedding, cfg.mode)?
        }
    };
    let (coords, embedding_from_cache) = match stages.cache.load_embedding(&embedding_key)? {
        Some(block) => {
            info!(key = embedding_key.as_str(), rows = block.len(), "loading combined embedding");
            (block, true)
        }
        None => {
            info!(
                key = embedding_key.as_str(),
                n_neighbors = cfg.embedding.n_neighbors,
                min_dist = cfg.embedding.min_dist,
                "running embedding"
            );
            let block = stages.engine.embed(combined.matrix())?;
            if block.len() != combined.matrix().n_rows() {
                return Err(PipelineError::Embed(EmbedError(format!(
                    "engine returned {} points for {} fingerprints",
                    block.len(),
                    combined.matrix().n_rows()
                ))));
            }
            stages.cache.store_embedding(&embedding_key, &block)?;
            (block, false)
        }
    };

    let blocks = split_by_row_counts(&coords, combined.row_counts())?;
    let images = render_run(stages.renderer, &cfg.datasets, &blocks, &cfg.output_dir)?;
    info!(images = images.len(), "run finished");

    Ok(PipelineReport {
        datasets: outcomes,
        embedding_key: embedding_key.as_str().to_string(),
        embedding_from_cache,
        images,
        blocks,
    })
}

fn fingerprint_key(
    strategy: CacheKeyStrategy,
    spec: &DatasetSpec,
    params: &FingerprintParams,
) -> Result<FingerprintKey, PipelineError> {
    Ok(match strategy {
        CacheKeyStrategy::DatasetName => FingerprintKey::by_name(&spec.base_name),
        CacheKeyStrategy::ContentHash => {
            let digest = hash_file(&spec.source)?;
            FingerprintKey::by_content(&spec.base_name, &digest, params)?
        }
    })
}

fn dataset_fingerprints(
    ctx: &RunContext,
    stages: &PipelineStages<'_>,
    spec: &DatasetSpec,
) -> Result<LoadedDataset, PipelineError> {
    let cfg = ctx.config();
    let key = fingerprint_key(cfg.cache_keys, spec, &stages.encoder.params())?;
    let describe = |rows: usize, from_cache: bool, stats: Option<IngestStats>| DatasetOutcome {
        base_name: spec.base_name.as_str().to_string(),
        label: spec.label.clone(),
        rows,
        fingerprint_key: key.as_str().to_string(),
        from_cache,
        stats,
    };

    if let Some(matrix) = stages.cache.load_fingerprints(&key)? {
        info!(
            dataset = %spec.base_name,
            key = key.as_str(),
            rows = matrix.n_rows(),
            "loading fingerprints"
        );
        let outcome = describe(matrix.n_rows(), true, None);
        return Ok(LoadedDataset {
            matrix,
            key,
            outcome,
        });
    }

    info!(dataset = %spec.base_name, source = %spec.source.display(), "generating fingerprints");
    let built = build_dataset_fingerprints(
        &IngestOptions {
            source: spec.source.clone(),
            smiles_column: cfg.smiles_column.clone(),
            chunk_size: cfg.chunk_size,
        },
        stages.encoder,
        ctx.pool(),
    )?;
    stages.cache.store_fingerprints(&key, &built.matrix)?;
    let outcome = describe(built.matrix.n_rows(), false, Some(built.stats));
    Ok(LoadedDataset {
        matrix: built.matrix,
        key,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datasets() -> RunDatasets {
        RunDatasets::from_lists(
            vec![PathBuf::from("a.csv")],
            vec!["A".to_string()],
            vec!["red".to_string()],
        )
        .expect("datasets")
    }

    #[test]
    fn new_config_keeps_cache_next_to_outputs() {
        let cfg = RunConfig::new(datasets(), PathBuf::from("out"));
        assert_eq!(cfg.cache_dir, PathBuf::from("out"));
        assert_eq!(cfg.cache_keys, CacheKeyStrategy::DatasetName);
        assert!(cfg.workers >= 1);
        cfg.validate().expect("defaults validate");
    }

    #[test]
    fn zero_sized_settings_are_rejected() {
        let mut cfg = RunConfig::new(datasets(), PathBuf::from("out"));
        cfg.workers = 0;
        assert!(cfg.validate().is_err());
        cfg.workers = 1;
        cfg.chunk_size = 0;
        assert!(cfg.validate().is_err());
        cfg.chunk_size = 10;
        cfg.smiles_column = "  ".to_string();
        assert!(RunContext::new(cfg).is_err());
    }

    #[test]
    fn error_kinds_map_to_exit_codes() {
        let validation = PipelineError::from(ValidationError("bad".to_string()));
        assert_eq!(validation.exit_code(), ExitCode::Validation);
        let io = PipelineError::from(IngestError("missing".to_string()));
        assert_eq!(io.exit_code(), ExitCode::DependencyFailure);
        let split = PipelineError::from(SplitError("stale".to_string()));
        assert_eq!(split.exit_code(), ExitCode::Internal);
        assert_eq!(split.code(), "cache_inconsistency");
        assert_eq!(split.to_string(), "stale");
    }
}
