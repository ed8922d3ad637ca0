use std::collections::HashMap;

use crate::{HorizonRecord, MethodCode, PedonKey, PipelineConfig};

/// Cleaned coarse-fragment value and provenance flags of one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Provenance {
    pub cf: f64,
    pub cf_method: MethodCode,
    pub bd_method: MethodCode,
    pub cconc_method: MethodCode,
}

/// Fills the provenance flags and the coarse-fragment default of every row.
///
/// A missing `cf` means no coarse fragments were reported: it becomes `0`
/// flagged [`MethodCode::Inferred`], which wins over any source flag.
#[must_use]
pub fn default_provenance(records: &[HorizonRecord], config: &PipelineConfig) -> Vec<Provenance> {
    let lists = |sources: &[String], record: &HorizonRecord| {
        PipelineConfig::lists(sources, &record.key.source)
    };

    let provenance: Vec<Provenance> = records
        .iter()
        .map(|record| {
            let (cf, cf_method) = match record.cf {
                None => (0.0, MethodCode::Inferred),
                Some(cf) if lists(&config.estimated_cf_sources, record) => {
                    (cf, MethodCode::Estimated)
                }
                Some(cf) => (cf, record.cf_method.unwrap_or_default()),
            };

            let cconc_method = if lists(&config.derived_cconc_sources, record)
                || record.depth_of_mean.is_some()
            {
                MethodCode::Inferred
            } else {
                record.cconc_method.unwrap_or_default()
            };

            let bd_method = if record.bulk_density_meas == Some(0.0)
                || lists(&config.estimated_bd_sources, record)
            {
                MethodCode::Estimated
            } else {
                record.bd_method.unwrap_or_default()
            };

            Provenance { cf, cf_method, bd_method, cconc_method }
        })
        .collect();

    let inferred_cf = provenance.iter().filter(|row| row.cf_method == MethodCode::Inferred).count();
    tracing::debug!(rows = provenance.len(), inferred_cf, "defaulted provenance flags");
    provenance
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LocationTier {
    Low,
    High,
}

impl LocationTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::High => "HIGH",
        }
    }

    fn classify(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("no") {
            Some(Self::Low)
        } else if trimmed.eq_ignore_ascii_case("yes") || trimmed.eq_ignore_ascii_case("high") {
            Some(Self::High)
        } else {
            None
        }
    }
}

/// Normalizes `latlon_q` to a per-pedon tier.
///
/// Any `NO` in a pedon makes the whole pedon `LOW`; any `YES`/`HIGH` makes it
/// `HIGH`, which wins over `LOW`. Pedons with neither keep their values.
#[must_use]
pub fn bucket_location_quality(records: &[HorizonRecord]) -> Vec<Option<String>> {
    let mut tiers: HashMap<&PedonKey, LocationTier> = HashMap::new();
    for record in records {
        if let Some(tier) = record.latlon_q.as_deref().and_then(LocationTier::classify) {
            tiers
                .entry(&record.key)
                .and_modify(|current| *current = (*current).max(tier))
                .or_insert(tier);
        }
    }

    records
        .iter()
        .map(|record| match tiers.get(&record.key) {
            Some(tier) => Some(tier.as_str().to_string()),
            None => record.latlon_q.clone(),
        })
        .collect()
}
