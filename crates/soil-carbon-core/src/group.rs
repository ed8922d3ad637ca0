use std::collections::HashMap;

use crate::PedonKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PedonGroup {
    pub key: PedonKey,
    /// Row positions in original table order.
    pub rows: Vec<usize>,
}

/// Pedon groups of a table, in order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PedonIndex {
    groups: Vec<PedonGroup>,
    row_count: usize,
}

impl PedonIndex {
    pub fn build<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a PedonKey>,
    {
        let mut positions: HashMap<&'a PedonKey, usize> = HashMap::new();
        let mut groups: Vec<PedonGroup> = Vec::new();
        let mut row_count = 0;

        for (row, key) in keys.into_iter().enumerate() {
            let group = *positions.entry(key).or_insert_with(|| {
                groups.push(PedonGroup { key: key.clone(), rows: Vec::new() });
                groups.len() - 1
            });
            groups[group].rows.push(row);
            row_count = row + 1;
        }

        Self { groups, row_count }
    }

    #[must_use]
    pub fn groups(&self) -> &[PedonGroup] {
        &self.groups
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
