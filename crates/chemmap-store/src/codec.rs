// SPDX-License-Identifier: Apache-2.0

use chemmap_core::sha256_hex;
use chemmap_model::{CoordinateBlock, FingerprintMatrix};
use serde::{Deserialize, Serialize};

use crate::{StoreError, StoreErrorCode};

pub const FINGERPRINT_FORMAT_VERSION: u32 = 1;
pub const EMBEDDING_CSV_HEADER: &str = "Component1,Component2";

/// On-disk wrapper of a fingerprint blob; `sha256` covers `payload`.
#[derive(Serialize, Deserialize)]
struct FingerprintEnvelope {
    format_version: u32,
    sha256: String,
    payload: Vec<u8>,
}

pub fn encode_fingerprints(matrix: &FingerprintMatrix) -> Result<Vec<u8>, StoreError> {
    let payload = bincode::serialize(matrix)
        .map_err(|e| StoreError::new(StoreErrorCode::Codec, e.to_string()))?;
    let envelope = FingerprintEnvelope {
        format_version: FINGERPRINT_FORMAT_VERSION,
        sha256: sha256_hex(&payload),
        payload,
    };
    bincode::serialize(&envelope).map_err(|e| StoreError::new(StoreErrorCode::Codec, e.to_string()))
}

pub fn decode_fingerprints(bytes: &[u8]) -> Result<FingerprintMatrix, StoreError> {
    let envelope: FingerprintEnvelope = bincode::deserialize(bytes).map_err(|e| {
        StoreError::new(
            StoreErrorCode::Corrupt,
            format!("fingerprint blob is not readable: {e}"),
        )
    })?;
    if envelope.format_version != FINGERPRINT_FORMAT_VERSION {
        return Err(StoreError::new(
            StoreErrorCode::Corrupt,
            format!(
                "fingerprint blob format {} is not supported (expected {FINGERPRINT_FORMAT_VERSION})",
                envelope.format_version
            ),
        ));
    }
    if sha256_hex(&envelope.payload) != envelope.sha256 {
        return Err(StoreError::new(
            StoreErrorCode::Corrupt,
            "fingerprint blob checksum mismatch",
        ));
    }
    let matrix: FingerprintMatrix = bincode::deserialize(&envelope.payload)
        .map_err(|e| StoreError::new(StoreErrorCode::Corrupt, e.to_string()))?;
    matrix
        .validate()
        .map_err(|e| StoreError::new(StoreErrorCode::Corrupt, e.to_string()))?;
    Ok(matrix)
}

/// Two columns, one row per point, no index column. `f64` formatting is
/// shortest round-trip, so a reload is bit-exact.
#[must_use]
pub fn encode_embedding_csv(block: &CoordinateBlock) -> String {
    let mut out = String::with_capacity(EMBEDDING_CSV_HEADER.len() + 1 + block.len() * 40);
    out.push_str(EMBEDDING_CSV_HEADER);
    out.push('\n');
    for [x, y] in block.points() {
        out.push_str(&format!("{x},{y}\n"));
    }
    out
}

pub fn decode_embedding_csv(text: &str) -> Result<CoordinateBlock, StoreError> {
    let mut lines = text.lines().enumerate();
    match lines.next() {
        Some((_, header)) if header.trim_start_matches('\u{feff}').trim() == EMBEDDING_CSV_HEADER => {}
        Some((_, header)) => {
            return Err(StoreError::new(
                StoreErrorCode::Corrupt,
                format!("embedding header {header:?} != {EMBEDDING_CSV_HEADER:?}"),
            ))
        }
        None => {
            return Err(StoreError::new(
                StoreErrorCode::Corrupt,
                "embedding artifact is empty",
            ))
        }
    }
    let mut points = Vec::new();
    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let corrupt = || {
            StoreError::new(
                StoreErrorCode::Corrupt,
                format!("embedding line {}: expected two numbers, got {line:?}", idx + 1),
            )
        };
        let mut cells = line.split(',');
        let (Some(x), Some(y), None) = (cells.next(), cells.next(), cells.next()) else {
            return Err(corrupt());
        };
        let x: f64 = x.trim().parse().map_err(|_| corrupt())?;
        let y: f64 = y.trim().parse().map_err(|_| corrupt())?;
        points.push([x, y]);
    }
    Ok(CoordinateBlock::new(points))
}
