// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::ValidationError;

pub const DEFAULT_RADIUS: u32 = 2;
pub const DEFAULT_N_BITS: u32 = 2048;

/// Derivation parameters shared by every fingerprint of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FingerprintParams {
    pub radius: u32,
    pub n_bits: u32,
}

impl Default for FingerprintParams {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            n_bits: DEFAULT_N_BITS,
        }
    }
}

impl FingerprintParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.n_bits == 0 {
            return Err(ValidationError("fingerprint length must be >= 1".to_string()));
        }
        if self.radius > 8 {
            return Err(ValidationError(format!(
                "fingerprint radius {} exceeds max 8",
                self.radius
            )));
        }
        Ok(())
    }
}

/// Fixed-length binary vector stored as its sorted, unique set bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    n_bits: u32,
    on_bits: Vec<u32>,
}

impl Fingerprint {
    pub fn from_on_bits(
        n_bits: u32,
        bits: impl IntoIterator<Item = u32>,
    ) -> Result<Self, ValidationError> {
        let mut on_bits: Vec<u32> = bits.into_iter().collect();
        on_bits.sort_unstable();
        on_bits.dedup();
        if let Some(&last) = on_bits.last() {
            if last >= n_bits {
                return Err(ValidationError(format!(
                    "bit {last} out of range for fingerprint length {n_bits}"
                )));
            }
        }
        Ok(Self { n_bits, on_bits })
    }

    #[must_use]
    pub fn n_bits(&self) -> u32 {
        self.n_bits
    }

    #[must_use]
    pub fn on_bits(&self) -> &[u32] {
        &self.on_bits
    }

    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.on_bits.len()
    }

    #[must_use]
    pub fn contains(&self, bit: u32) -> bool {
        self.on_bits.binary_search(&bit).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_bits_are_sorted_and_deduplicated() {
        let fp = Fingerprint::from_on_bits(16, [9, 3, 9, 0]).expect("fingerprint");
        assert_eq!(fp.on_bits(), &[0, 3, 9]);
        assert!(fp.contains(3));
        assert!(!fp.contains(4));
        assert_eq!(fp.count_ones(), 3);
    }

    #[test]
    fn out_of_range_bit_is_rejected() {
        assert!(Fingerprint::from_on_bits(8, [8]).is_err());
    }
}
