use crate::PedonIndex;

/// Designates the master (site) row of every pedon group.
///
/// `seeds[row]` is true for rows already known to be site rows: rows carrying
/// a source-provided site anchor on a first run, or the previous output on a
/// rerun. Groups without any seed get their first row promoted. Groups with
/// several seeds are left as they are; the consistency check reports them.
#[must_use]
pub fn mark_pedon_starts(seeds: &[bool], index: &PedonIndex) -> Vec<bool> {
    let mut pedon_start = seeds.to_vec();
    pedon_start.resize(index.row_count(), false);

    let mut promoted = 0_usize;
    for group in index.groups() {
        if group.rows.iter().any(|row| pedon_start[*row]) {
            continue;
        }
        if let Some(first) = group.rows.first() {
            pedon_start[*first] = true;
            promoted += 1;
        }
    }

    tracing::debug!(
        groups = index.len(),
        seeded = index.len() - promoted,
        promoted,
        "marked pedon master rows"
    );
    pedon_start
}
