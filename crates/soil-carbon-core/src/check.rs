use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{MasterRow, PedonIndex, PedonKey};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MasterRowAnomaly {
    pub source: String,
    pub pedon_id: String,
    pub count: usize,
}

impl Display for MasterRowAnomaly {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "source {} pedon {} has {} master rows",
            self.source, self.pedon_id, self.count
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConsistencyReport {
    pub groups_checked: usize,
    pub anomaly_count: usize,
    pub anomalies: Vec<MasterRowAnomaly>,
}

impl ConsistencyReport {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// Reports every pedon group whose master-row count is not exactly one.
#[must_use]
pub fn check_master_rows(pedon_start: &[bool], index: &PedonIndex) -> ConsistencyReport {
    let anomalies: Vec<MasterRowAnomaly> = index
        .groups()
        .iter()
        .filter_map(|group| {
            let count = group
                .rows
                .iter()
                .filter(|row| pedon_start.get(**row).copied().unwrap_or(false))
                .count();
            (count != 1).then(|| MasterRowAnomaly {
                source: group.key.source.clone(),
                pedon_id: group.key.pedon_id.clone(),
                count,
            })
        })
        .collect();

    for anomaly in &anomalies {
        tracing::warn!("{anomaly}");
    }

    ConsistencyReport { groups_checked: index.len(), anomaly_count: anomalies.len(), anomalies }
}

/// Same check over an already written master table.
#[must_use]
pub fn check_master_table(master: &[MasterRow]) -> ConsistencyReport {
    let keys: Vec<PedonKey> =
        master.iter().map(|row| PedonKey::new(row.source.clone(), row.pedon_id.clone())).collect();
    let pedon_start: Vec<bool> = master.iter().map(|row| row.pedon_start).collect();
    check_master_rows(&pedon_start, &PedonIndex::build(&keys))
}
