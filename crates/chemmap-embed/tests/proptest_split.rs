// SPDX-License-Identifier: Apache-2.0

use chemmap_embed::split_by_row_counts;
use chemmap_model::CoordinateBlock;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn split_then_concat_reconstructs_block(counts in prop::collection::vec(0_usize..40, 1..8)) {
        let total: usize = counts.iter().sum();
        let block = CoordinateBlock::new(
            (0..total).map(|i| [i as f64, -(i as f64) * 0.5]).collect(),
        );
        let parts = split_by_row_counts(&block, &counts).expect("split");
        prop_assert_eq!(parts.len(), counts.len());
        for (part, count) in parts.iter().zip(&counts) {
            prop_assert_eq!(part.len(), *count);
        }
        prop_assert_eq!(CoordinateBlock::concat(&parts), block);
    }

    #[test]
    fn any_other_total_is_rejected(
        counts in prop::collection::vec(0_usize..40, 1..8),
        delta in 1_usize..5,
    ) {
        let total: usize = counts.iter().sum();
        let block = CoordinateBlock::new(vec![[0.0, 0.0]; total + delta]);
        prop_assert!(split_by_row_counts(&block, &counts).is_err());
    }
}
