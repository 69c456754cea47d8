// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use crate::keys::{EmbeddingKey, FingerprintKey};

pub const FINGERPRINT_EXT: &str = "bin";
pub const EMBEDDING_EXT: &str = "csv";
pub(crate) const TMP_SUFFIX: &str = ".tmp";

#[must_use]
pub fn fingerprint_path(root: &Path, key: &FingerprintKey) -> PathBuf {
    root.join(format!("{}.{FINGERPRINT_EXT}", key.as_str()))
}

#[must_use]
pub fn embedding_path(root: &Path, key: &EmbeddingKey) -> PathBuf {
    root.join(format!("{}.{EMBEDDING_EXT}", key.as_str()))
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}
