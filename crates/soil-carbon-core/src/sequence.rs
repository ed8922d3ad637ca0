use crate::PedonIndex;

/// Positional horizon numbers, `1..=k` within each pedon group in row order.
/// Depth values are not consulted.
#[must_use]
pub fn number_horizons(index: &PedonIndex) -> Vec<u32> {
    let mut numbers = vec![0_u32; index.row_count()];
    for group in index.groups() {
        for (number, row) in (1_u32..).zip(&group.rows) {
            numbers[*row] = number;
        }
    }
    tracing::debug!(rows = numbers.len(), groups = index.len(), "numbered horizons");
    numbers
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::PedonKey;

    #[test]
    fn numbers_follow_row_order_within_each_group() {
        let keys = vec![
            PedonKey::new("A", "1"),
            PedonKey::new("A", "2"),
            PedonKey::new("A", "1"),
            PedonKey::new("A", "1"),
            PedonKey::new("A", "2"),
        ];
        let index = PedonIndex::build(&keys);
        assert_eq!(number_horizons(&index), vec![1, 1, 2, 3, 2]);
    }

    #[test]
    fn empty_table_has_no_numbers() {
        assert!(number_horizons(&PedonIndex::default()).is_empty());
    }

    proptest! {
        #[test]
        fn property_numbers_are_contiguous_per_group(ids in proptest::collection::vec(0_u8..6, 0..80)) {
            let keys: Vec<PedonKey> = ids.iter().map(|id| PedonKey::new("S", id.to_string())).collect();
            let index = PedonIndex::build(&keys);
            let numbers = number_horizons(&index);

            for group in index.groups() {
                let got: Vec<u32> = group.rows.iter().map(|row| numbers[*row]).collect();
                let expected: Vec<u32> = (1..=u32::try_from(group.rows.len()).unwrap_or(u32::MAX)).collect();
                prop_assert_eq!(got, expected);
            }

            prop_assert_eq!(number_horizons(&index), numbers);
        }
    }
}
