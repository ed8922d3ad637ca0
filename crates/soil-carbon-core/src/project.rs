//! Fixed column contracts of the four output tables.
//!
//! Field order is the serialized column order.

use serde::{Deserialize, Serialize};

use crate::{HorizonType, MethodCode};

/// Every column of every row, keyed by a synthetic row id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MasterRow {
    pub id: usize,
    pub source: String,
    pub pedon_id: String,
    pub order: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub latlon_q: Option<String>,
    pub horizon_number: u32,
    pub horizon: Option<String>,
    pub horizon_type: Option<HorizonType>,
    pub depth2: Option<f64>,
    pub depth1: Option<f64>,
    pub depth: Option<f64>,
    pub bulk_density: Option<f64>,
    pub bd_method: MethodCode,
    pub cf: f64,
    pub cf_method: MethodCode,
    pub cconc: Option<f64>,
    pub cconc_method: MethodCode,
    pub mineral_d: Option<f64>,
    pub ff_d: Option<f64>,
    pub total_d: Option<f64>,
    pub ccontent: Option<f64>,
    pub total_c: Option<f64>,
    pub ccontent_1m: Option<f64>,
    pub total_c_1m: Option<f64>,
    pub horizon_start: bool,
    pub pedon_start: bool,
}

/// Site-level columns of master rows. Ids are renumbered from zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PedonRow {
    pub id: usize,
    pub source: String,
    pub pedon_id: String,
    pub order: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub latlon_q: Option<String>,
    pub mineral_d: Option<f64>,
    pub ff_d: Option<f64>,
    pub total_d: Option<f64>,
    pub total_c: Option<f64>,
    pub total_c_1m: Option<f64>,
}

/// Horizon-level columns of every row, keeping the master id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HorizonRow {
    pub id: usize,
    pub source: String,
    pub pedon_id: String,
    pub order: Option<String>,
    pub horizon_number: u32,
    pub horizon: Option<String>,
    pub horizon_type: Option<HorizonType>,
    pub depth2: Option<f64>,
    pub depth1: Option<f64>,
    pub depth: Option<f64>,
    pub bulk_density: Option<f64>,
    pub bd_method: MethodCode,
    pub cf: f64,
    pub cf_method: MethodCode,
    pub cconc: Option<f64>,
    pub cconc_method: MethodCode,
    pub ccontent: Option<f64>,
    pub ccontent_1m: Option<f64>,
}

/// Horizon and pedon carbon totals side by side, keeping the master id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryRow {
    pub id: usize,
    pub source: String,
    pub pedon_id: String,
    pub order: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub horizon_number: u32,
    pub horizon: Option<String>,
    pub ccontent: Option<f64>,
    pub total_c: Option<f64>,
    pub ccontent_1m: Option<f64>,
    pub total_c_1m: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReconciledTables {
    pub master: Vec<MasterRow>,
    pub pedon: Vec<PedonRow>,
    pub horizon: Vec<HorizonRow>,
    pub summary: Vec<SummaryRow>,
}

impl ReconciledTables {
    #[must_use]
    pub fn from_master(master: Vec<MasterRow>) -> Self {
        let pedon = pedon_view(&master);
        let horizon = horizon_view(&master);
        let summary = summary_view(&master);
        Self { master, pedon, horizon, summary }
    }
}

#[must_use]
pub fn pedon_view(master: &[MasterRow]) -> Vec<PedonRow> {
    master
        .iter()
        .filter(|row| row.pedon_start)
        .enumerate()
        .map(|(id, row)| PedonRow {
            id,
            source: row.source.clone(),
            pedon_id: row.pedon_id.clone(),
            order: row.order.clone(),
            lat: row.lat,
            lon: row.lon,
            latlon_q: row.latlon_q.clone(),
            mineral_d: row.mineral_d,
            ff_d: row.ff_d,
            total_d: row.total_d,
            total_c: row.total_c,
            total_c_1m: row.total_c_1m,
        })
        .collect()
}

#[must_use]
pub fn horizon_view(master: &[MasterRow]) -> Vec<HorizonRow> {
    master
        .iter()
        .map(|row| HorizonRow {
            id: row.id,
            source: row.source.clone(),
            pedon_id: row.pedon_id.clone(),
            order: row.order.clone(),
            horizon_number: row.horizon_number,
            horizon: row.horizon.clone(),
            horizon_type: row.horizon_type,
            depth2: row.depth2,
            depth1: row.depth1,
            depth: row.depth,
            bulk_density: row.bulk_density,
            bd_method: row.bd_method,
            cf: row.cf,
            cf_method: row.cf_method,
            cconc: row.cconc,
            cconc_method: row.cconc_method,
            ccontent: row.ccontent,
            ccontent_1m: row.ccontent_1m,
        })
        .collect()
}

#[must_use]
pub fn summary_view(master: &[MasterRow]) -> Vec<SummaryRow> {
    master
        .iter()
        .map(|row| SummaryRow {
            id: row.id,
            source: row.source.clone(),
            pedon_id: row.pedon_id.clone(),
            order: row.order.clone(),
            lat: row.lat,
            lon: row.lon,
            horizon_number: row.horizon_number,
            horizon: row.horizon.clone(),
            ccontent: row.ccontent,
            total_c: row.total_c,
            ccontent_1m: row.ccontent_1m,
            total_c_1m: row.total_c_1m,
        })
        .collect()
}
