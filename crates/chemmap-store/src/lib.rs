// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod cache;
mod codec;
mod keys;
mod paths;

use std::fmt::{Display, Formatter};

pub const CRATE_NAME: &str = "chemmap-store";

pub use cache::{ArtifactCache, LocalFsCache};
pub use codec::{
    decode_embedding_csv, decode_fingerprints, encode_embedding_csv, encode_fingerprints,
    EMBEDDING_CSV_HEADER, FINGERPRINT_FORMAT_VERSION,
};
pub use keys::{EmbeddingKey, FingerprintKey};
pub use paths::{embedding_path, fingerprint_path, EMBEDDING_EXT, FINGERPRINT_EXT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorCode {
    Io,
    Corrupt,
    Codec,
}

impl StoreErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Io => "io_error",
            Self::Corrupt => "corrupt_artifact",
            Self::Codec => "codec_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub code: StoreErrorCode,
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for StoreError {}
