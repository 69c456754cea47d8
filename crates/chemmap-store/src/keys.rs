// SPDX-License-Identifier: Apache-2.0

//! Cache artifact names.
//!
//! `by_name` keys reproduce the historical layout (`fp_<base>`,
//! `umap_combined`) and are reused whenever a file of that name exists, even
//! if the source changed. `by_content` keys append a digest of the source
//! bytes and every parameter that shapes the artifact, so an edited dataset
//! or a different parameter set lands in a fresh file.

use chemmap_core::canonical::stable_json_hash_hex;
use chemmap_model::{DatasetBaseName, EmbeddingParams, ExecutionMode, FingerprintParams};
use serde::Serialize;

use crate::{StoreError, StoreErrorCode};

const DIGEST_CHARS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FingerprintKey(String);

impl FingerprintKey {
    #[must_use]
    pub fn by_name(base: &DatasetBaseName) -> Self {
        Self(format!("fp_{}", base.as_str()))
    }

    pub fn by_content(
        base: &DatasetBaseName,
        source_sha256: &str,
        params: &FingerprintParams,
    ) -> Result<Self, StoreError> {
        #[derive(Serialize)]
        struct Scope<'a> {
            source_sha256: &'a str,
            params: &'a FingerprintParams,
        }
        let digest = short_digest(&Scope {
            source_sha256,
            params,
        })?;
        Ok(Self(format!("fp_{}_{digest}", base.as_str())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmbeddingKey(String);

impl EmbeddingKey {
    #[must_use]
    pub fn by_name() -> Self {
        Self("umap_combined".to_string())
    }

    /// Digest over the ordered fingerprint keys; reordering the datasets
    /// changes the combined row order and therefore the key.
    pub fn by_content(
        fingerprint_keys: &[FingerprintKey],
        params: &EmbeddingParams,
        mode: ExecutionMode,
    ) -> Result<Self, StoreError> {
        #[derive(Serialize)]
        struct Scope<'a> {
            fingerprints: Vec<&'a str>,
            params: &'a EmbeddingParams,
            mode: ExecutionMode,
        }
        let digest = short_digest(&Scope {
            fingerprints: fingerprint_keys.iter().map(FingerprintKey::as_str).collect(),
            params,
            mode,
        })?;
        Ok(Self(format!("umap_combined_{digest}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn short_digest<T: Serialize>(scope: &T) -> Result<String, StoreError> {
    let mut hex = stable_json_hash_hex(scope)
        .map_err(|e| StoreError::new(StoreErrorCode::Codec, format!("cache key: {e}")))?;
    hex.truncate(DIGEST_CHARS);
    Ok(hex)
}
