use serde::{Deserialize, Serialize};

use crate::{
    bucket_location_quality, check_master_rows, compute_carbon, default_provenance,
    mark_pedon_starts, number_horizons, resolve_pedon_keys, ConsistencyReport, HorizonRecord,
    MasterRow, PedonIndex, PipelineConfig, RawRecord, ReconcileError, ReconciledTables,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Reconciliation {
    pub tables: ReconciledTables,
    pub consistency: ConsistencyReport,
}

/// Runs every stage over the full input table, in input order.
///
/// Only an invalid `config` fails. Data problems end up in the consistency
/// report or as `None` cells.
///
/// # Errors
/// Returns [`ReconcileError::Config`] when `config` fails
/// [`PipelineConfig::validate`].
pub fn reconcile(
    raw: Vec<RawRecord>,
    config: &PipelineConfig,
) -> Result<Reconciliation, ReconcileError> {
    config.validate()?;

    let keys = resolve_pedon_keys(&raw, config);
    let records: Vec<HorizonRecord> =
        raw.into_iter().zip(keys).map(|(raw, key)| HorizonRecord::from_raw(raw, key)).collect();
    let index = PedonIndex::build(records.iter().map(|record| &record.key));

    let seeds: Vec<bool> = records.iter().map(|record| record.site_anchor).collect();
    let pedon_start = mark_pedon_starts(&seeds, &index);
    let horizon_number = number_horizons(&index);
    let provenance = default_provenance(&records, config);
    let latlon_q = bucket_location_quality(&records);
    let carbon = compute_carbon(&records, &provenance, &index, &pedon_start, config);
    let consistency = check_master_rows(&pedon_start, &index);

    let master: Vec<MasterRow> = records
        .into_iter()
        .enumerate()
        .zip(latlon_q)
        .map(|((id, record), latlon_q)| {
            let provenance = provenance[id];
            MasterRow {
                id,
                source: record.key.source,
                pedon_id: record.key.pedon_id,
                order: record.order,
                lat: record.lat,
                lon: record.lon,
                latlon_q,
                horizon_number: horizon_number[id],
                horizon: record.horizon,
                horizon_type: record.horizon_type,
                depth2: record.depth2,
                depth1: record.depth1,
                depth: record.depth,
                bulk_density: record.bulk_density,
                bd_method: provenance.bd_method,
                cf: provenance.cf,
                cf_method: provenance.cf_method,
                cconc: record.cconc,
                cconc_method: provenance.cconc_method,
                mineral_d: record.mineral_d,
                ff_d: record.ff_d,
                total_d: record.total_d,
                ccontent: carbon.ccontent[id],
                total_c: carbon.total_c[id],
                ccontent_1m: carbon.ccontent_1m[id],
                total_c_1m: carbon.total_c_1m[id],
                horizon_start: horizon_number[id] == 1,
                pedon_start: pedon_start[id],
            }
        })
        .collect();

    tracing::info!(
        rows = master.len(),
        pedons = index.len(),
        anomalies = consistency.anomaly_count,
        "reconciled soil carbon table"
    );
    Ok(Reconciliation { tables: ReconciledTables::from_master(master), consistency })
}
