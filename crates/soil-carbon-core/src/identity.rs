use std::collections::HashMap;

use crate::{PedonKey, PipelineConfig, RawRecord};

/// Resolves an explicit pedon key for every row, in input order.
///
/// A missing source becomes `config.unknown_source`. A missing pedon id takes
/// the last id seen earlier in the same source, or `config.unknown_pedon_id`
/// when the source has not shown one yet. Reordering the input changes the
/// result.
#[must_use]
pub fn resolve_pedon_keys(records: &[RawRecord], config: &PipelineConfig) -> Vec<PedonKey> {
    let mut last_seen: HashMap<String, String> = HashMap::new();
    let mut sentinel_rows = 0_usize;

    let keys: Vec<PedonKey> = records
        .iter()
        .map(|record| {
            let source = record
                .source
                .as_deref()
                .map(str::trim)
                .filter(|source| !source.is_empty())
                .unwrap_or(config.unknown_source.as_str())
                .to_string();

            let pedon_id = match record.pedon_id.as_deref() {
                Some(id) => {
                    last_seen.insert(source.clone(), id.to_string());
                    id.to_string()
                }
                None => last_seen.get(&source).cloned().unwrap_or_else(|| {
                    sentinel_rows += 1;
                    config.unknown_pedon_id.clone()
                }),
            };

            PedonKey { source, pedon_id }
        })
        .collect();

    if sentinel_rows > 0 {
        tracing::warn!(
            rows = sentinel_rows,
            sentinel = %config.unknown_pedon_id,
            "rows without a preceding pedon id were assigned the sentinel id"
        );
    }
    tracing::debug!(rows = keys.len(), "resolved pedon identities");
    keys
}
