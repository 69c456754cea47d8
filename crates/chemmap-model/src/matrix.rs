// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{Fingerprint, ValidationError};

/// Row-compressed binary matrix: row `i` holds the set bits
/// `indices[indptr[i]..indptr[i + 1]]`, sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintMatrix {
    n_cols: u32,
    indptr: Vec<usize>,
    indices: Vec<u32>,
}

impl FingerprintMatrix {
    #[must_use]
    pub fn empty(n_cols: u32) -> Self {
        Self {
            n_cols,
            indptr: vec![0],
            indices: Vec::new(),
        }
    }

    pub fn from_parts(
        n_cols: u32,
        indptr: Vec<usize>,
        indices: Vec<u32>,
    ) -> Result<Self, ValidationError> {
        let matrix = Self {
            n_cols,
            indptr,
            indices,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn from_fingerprints<'a>(
        n_cols: u32,
        fingerprints: impl IntoIterator<Item = &'a Fingerprint>,
    ) -> Result<Self, ValidationError> {
        let mut matrix = Self::empty(n_cols);
        for fp in fingerprints {
            matrix.push(fp)?;
        }
        Ok(matrix)
    }

    /// Checks the structural invariants; used after decoding untrusted bytes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.indptr.first() != Some(&0) {
            return Err(ValidationError("row pointer must start at 0".to_string()));
        }
        if self.indptr.last() != Some(&self.indices.len()) {
            return Err(ValidationError(format!(
                "row pointer ends at {:?} but {} indices are stored",
                self.indptr.last(),
                self.indices.len()
            )));
        }
        if self.indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(ValidationError("row pointer must be non-decreasing".to_string()));
        }
        for w in self.indptr.windows(2) {
            let row = &self.indices[w[0]..w[1]];
            if row.windows(2).any(|p| p[0] >= p[1]) {
                return Err(ValidationError(
                    "row indices must be strictly increasing".to_string(),
                ));
            }
            if row.last().is_some_and(|&b| b >= self.n_cols) {
                return Err(ValidationError(format!(
                    "column index out of range for {} columns",
                    self.n_cols
                )));
            }
        }
        Ok(())
    }

    pub fn push(&mut self, fp: &Fingerprint) -> Result<(), ValidationError> {
        if fp.n_bits() != self.n_cols {
            return Err(ValidationError(format!(
                "fingerprint length {} does not match matrix width {}",
                fp.n_bits(),
                self.n_cols
            )));
        }
        self.indices.extend_from_slice(fp.on_bits());
        self.indptr.push(self.indices.len());
        Ok(())
    }

    /// Appends `other` below `self`. A zero-row `other` is a no-op.
    pub fn append(&mut self, other: &FingerprintMatrix) -> Result<(), ValidationError> {
        if other.n_cols != self.n_cols {
            return Err(ValidationError(format!(
                "cannot stack matrices of width {} and {}",
                self.n_cols, other.n_cols
            )));
        }
        let offset = self.indices.len();
        self.indices.extend_from_slice(&other.indices);
        self.indptr
            .extend(other.indptr.iter().skip(1).map(|p| p + offset));
        Ok(())
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.indptr.len() - 1
    }

    #[must_use]
    pub fn n_cols(&self) -> u32 {
        self.n_cols
    }

    #[must_use]
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn row(&self, i: usize) -> &[u32] {
        &self.indices[self.indptr[i]..self.indptr[i + 1]]
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[u32]> + '_ {
        self.indptr
            .windows(2)
            .map(move |w| &self.indices[w[0]..w[1]])
    }

    #[must_use]
    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

/// Row-wise concatenation of every dataset matrix, in dataset order, plus the
/// per-dataset row counts needed to split the embedding back apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedFingerprints {
    matrix: FingerprintMatrix,
    row_counts: Vec<usize>,
}

impl CombinedFingerprints {
    pub fn concat(blocks: &[FingerprintMatrix]) -> Result<Self, ValidationError> {
        let first = blocks
            .first()
            .ok_or_else(|| ValidationError("no fingerprint matrices to combine".to_string()))?;
        let mut matrix = FingerprintMatrix::empty(first.n_cols());
        let mut row_counts = Vec::with_capacity(blocks.len());
        for block in blocks {
            matrix.append(block)?;
            row_counts.push(block.n_rows());
        }
        Ok(Self { matrix, row_counts })
    }

    #[must_use]
    pub fn matrix(&self) -> &FingerprintMatrix {
        &self.matrix
    }

    #[must_use]
    pub fn row_counts(&self) -> &[usize] {
        &self.row_counts
    }

    #[must_use]
    pub fn into_parts(self) -> (FingerprintMatrix, Vec<usize>) {
        (self.matrix, self.row_counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(bits: &[u32]) -> Fingerprint {
        Fingerprint::from_on_bits(32, bits.iter().copied()).expect("fingerprint")
    }

    #[test]
    fn zero_row_blocks_stack_as_no_op() {
        let a = FingerprintMatrix::from_fingerprints(32, &[fp(&[1, 2]), fp(&[5])]).expect("a");
        let empty = FingerprintMatrix::empty(32);
        let combined = CombinedFingerprints::concat(&[empty.clone(), a.clone(), empty])
            .expect("combine");
        assert_eq!(combined.matrix(), &a);
        assert_eq!(combined.row_counts(), &[0, 2, 0]);
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let mut a = FingerprintMatrix::empty(32);
        let b = FingerprintMatrix::empty(64);
        assert!(a.append(&b).is_err());
        assert!(a.push(&Fingerprint::from_on_bits(64, [1]).expect("fp")).is_err());
    }

    #[test]
    fn validate_rejects_unsorted_rows() {
        let err = FingerprintMatrix::from_parts(8, vec![0, 2], vec![3, 1]).expect_err("unsorted");
        assert!(err.0.contains("strictly increasing"));
        assert!(FingerprintMatrix::from_parts(8, vec![0, 1], vec![8]).is_err());
        assert!(FingerprintMatrix::from_parts(8, vec![0, 3], vec![1]).is_err());
    }
}
