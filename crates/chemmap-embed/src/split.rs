// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};
use std::ops::Range;

use chemmap_model::CoordinateBlock;

/// Row counts and coordinate rows disagree; the cached state is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitError(pub String);

impl Display for SplitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SplitError {}

/// Contiguous row ranges from cumulative counts, left to right.
#[must_use]
pub fn row_ranges(row_counts: &[usize]) -> Vec<Range<usize>> {
    let mut start = 0;
    row_counts
        .iter()
        .map(|count| {
            let range = start..start + count;
            start = range.end;
            range
        })
        .collect()
}

/// Cuts the combined block back into one block per dataset, in dataset order.
pub fn split_by_row_counts(
    block: &CoordinateBlock,
    row_counts: &[usize],
) -> Result<Vec<CoordinateBlock>, SplitError> {
    let total = row_counts
        .iter()
        .try_fold(0_usize, |acc, c| acc.checked_add(*c))
        .ok_or_else(|| SplitError("row counts overflow".to_string()))?;
    if total != block.len() {
        return Err(SplitError(format!(
            "row counts {row_counts:?} sum to {total} but the embedding has {} rows; \
             the cached embedding does not match the cached fingerprints",
            block.len()
        )));
    }
    Ok(row_ranges(row_counts)
        .into_iter()
        .map(|range| block.slice(range))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_follow_counts() {
        let block = CoordinateBlock::new((0..6).map(|i| [f64::from(i), 0.0]).collect());
        let parts = split_by_row_counts(&block, &[2, 0, 4]).expect("split");
        assert_eq!(parts.iter().map(CoordinateBlock::len).collect::<Vec<_>>(), vec![2, 0, 4]);
        assert_eq!(parts[2].points()[0], [2.0, 0.0]);
    }

    #[test]
    fn mismatched_total_is_fatal() {
        let block = CoordinateBlock::new(vec![[0.0, 0.0]; 3]);
        let err = split_by_row_counts(&block, &[1, 1]).expect_err("mismatch");
        assert!(err.0.contains("sum to 2"));
        assert!(split_by_row_counts(&block, &[usize::MAX, 1]).is_err());
    }
}
