// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chemmap_model::{CoordinateBlock, FingerprintMatrix};
use tracing::debug;

use crate::codec::{
    decode_embedding_csv, decode_fingerprints, encode_embedding_csv, encode_fingerprints,
};
use crate::keys::{EmbeddingKey, FingerprintKey};
use crate::paths::{embedding_path, fingerprint_path, tmp_path};
use crate::{StoreError, StoreErrorCode};

/// Key to artifact store with two independent key spaces. A same-named
/// artifact is returned as-is; whether it still matches its source is
/// decided by the key, not by the cache.
pub trait ArtifactCache {
    fn load_fingerprints(&self, key: &FingerprintKey)
        -> Result<Option<FingerprintMatrix>, StoreError>;
    fn store_fingerprints(
        &self,
        key: &FingerprintKey,
        matrix: &FingerprintMatrix,
    ) -> Result<(), StoreError>;
    fn load_embedding(&self, key: &EmbeddingKey) -> Result<Option<CoordinateBlock>, StoreError>;
    fn store_embedding(&self, key: &EmbeddingKey, block: &CoordinateBlock)
        -> Result<(), StoreError>;
}

/// Flat directory of `fp_*.bin` blobs and `umap_combined*.csv` tables.
#[derive(Debug, Clone)]
pub struct LocalFsCache {
    pub root: PathBuf,
}

impl LocalFsCache {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ArtifactCache for LocalFsCache {
    fn load_fingerprints(
        &self,
        key: &FingerprintKey,
    ) -> Result<Option<FingerprintMatrix>, StoreError> {
        let path = fingerprint_path(&self.root, key);
        let Some(bytes) = read_if_present(&path)? else {
            debug!(path = %path.display(), "fingerprint cache miss");
            return Ok(None);
        };
        let matrix = decode_fingerprints(&bytes)
            .map_err(|e| StoreError::new(e.code, format!("{}: {}", path.display(), e.message)))?;
        debug!(path = %path.display(), rows = matrix.n_rows(), "fingerprint cache hit");
        Ok(Some(matrix))
    }

    fn store_fingerprints(
        &self,
        key: &FingerprintKey,
        matrix: &FingerprintMatrix,
    ) -> Result<(), StoreError> {
        let bytes = encode_fingerprints(matrix)?;
        write_atomic(&fingerprint_path(&self.root, key), &bytes)
    }

    fn load_embedding(&self, key: &EmbeddingKey) -> Result<Option<CoordinateBlock>, StoreError> {
        let path = embedding_path(&self.root, key);
        let Some(bytes) = read_if_present(&path)? else {
            debug!(path = %path.display(), "embedding cache miss");
            return Ok(None);
        };
        let text = String::from_utf8(bytes).map_err(|e| {
            StoreError::new(
                StoreErrorCode::Corrupt,
                format!("{}: {e}", path.display()),
            )
        })?;
        let block = decode_embedding_csv(&text)
            .map_err(|e| StoreError::new(e.code, format!("{}: {}", path.display(), e.message)))?;
        debug!(path = %path.display(), rows = block.len(), "embedding cache hit");
        Ok(Some(block))
    }

    fn store_embedding(
        &self,
        key: &EmbeddingKey,
        block: &CoordinateBlock,
    ) -> Result<(), StoreError> {
        write_atomic(
            &embedding_path(&self.root, key),
            encode_embedding_csv(block).as_bytes(),
        )
    }
}

fn read_if_present(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::new(
            StoreErrorCode::Io,
            format!("cannot read {}: {e}", path.display()),
        )),
    }
}

/// Writes to `<path>.tmp`, syncs, then renames over `path`; readers never
/// observe a partially written artifact.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io = |e: std::io::Error| {
        StoreError::new(
            StoreErrorCode::Io,
            format!("cannot write {}: {e}", path.display()),
        )
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(io)?;
    let tmp = tmp_path(path);
    {
        let mut f = fs::File::create(&tmp).map_err(io)?;
        f.write_all(bytes).map_err(io)?;
        f.sync_all().map_err(io)?;
    }
    fs::rename(&tmp, path).map_err(io)?;
    sync_dir(dir)?;
    debug!(path = %path.display(), bytes = bytes.len(), "cache artifact written");
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    let f = OpenOptions::new()
        .read(true)
        .open(dir)
        .map_err(|e| StoreError::new(StoreErrorCode::Io, e.to_string()))?;
    f.sync_all()
        .map_err(|e| StoreError::new(StoreErrorCode::Io, e.to_string()))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}
