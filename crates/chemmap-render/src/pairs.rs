// SPDX-License-Identifier: Apache-2.0

/// Every ordered pair `(i, j)` with `i != j`, row-major.
#[must_use]
pub fn ordered_pairs(n: usize) -> Vec<(usize, usize)> {
    (0..n)
        .flat_map(|i| (0..n).filter(move |j| *j != i).map(move |j| (i, j)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_datasets() {
        assert_eq!(
            ordered_pairs(3),
            vec![(0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1)]
        );
        assert!(ordered_pairs(1).is_empty());
        assert!(ordered_pairs(0).is_empty());
    }
}
