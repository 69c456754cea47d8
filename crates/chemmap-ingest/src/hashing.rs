// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io::BufReader;
use std::path::Path;

use chemmap_core::sha256_hex_reader;

use crate::IngestError;

/// SHA-256 of a dataset source, streamed so large libraries never load whole.
pub fn hash_file(path: &Path) -> Result<String, IngestError> {
    let file = fs::File::open(path)
        .map_err(|e| IngestError(format!("cannot open {}: {e}", path.display())))?;
    sha256_hex_reader(BufReader::new(file)).map_err(|e| IngestError(e.to_string()))
}
