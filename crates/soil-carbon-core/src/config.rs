use serde::{Deserialize, Serialize};

use crate::ReconcileError;

const BEC_SOURCE: &str = "BEC (Meidinger and Pojar, 1991)";

/// Knobs of the reconciliation pipeline. Missing keys in a config file fall
/// back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reference depth the `*_1m` columns are normalized to, in cm.
    pub reference_depth_cm: f64,
    pub unknown_pedon_id: String,
    pub unknown_source: String,
    /// Sources whose coarse-fragment values are estimates.
    pub estimated_cf_sources: Vec<String>,
    /// Sources whose carbon concentrations were derived rather than measured.
    pub derived_cconc_sources: Vec<String>,
    /// Sources whose bulk densities are estimates.
    pub estimated_bd_sources: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference_depth_cm: 100.0,
            unknown_pedon_id: "Unknown".to_string(),
            unknown_source: "Unknown Source".to_string(),
            estimated_cf_sources: [
                BEC_SOURCE,
                "Shaw et al. 2005",
                "Siltanen et al. 1997",
                "Moon &  Selby 1988 Rep 64",
                "Van Vliet et al. 1987 Rep bc43-1",
                "Kenney et al. 1988 Rep bc43-2",
                "Oswald 1973 Rep BC-43",
                "Inselberg et al. 1982 Land Mgmt Rep. 12",
                "LEWIS 1976",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            derived_cconc_sources: vec![
                BEC_SOURCE.to_string(),
                "D'Amore & Lynn (2002)".to_string(),
            ],
            estimated_bd_sources: vec![BEC_SOURCE.to_string()],
        }
    }
}

impl PipelineConfig {
    /// Checks the settings before any stage runs.
    ///
    /// # Errors
    /// Returns [`ReconcileError::Config`] when the reference depth is not a
    /// positive finite number or a sentinel is blank.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        if !self.reference_depth_cm.is_finite() || self.reference_depth_cm <= 0.0 {
            return Err(ReconcileError::Config(format!(
                "reference_depth_cm must be a positive finite number, got {}",
                self.reference_depth_cm
            )));
        }
        if self.unknown_pedon_id.trim().is_empty() {
            return Err(ReconcileError::Config("unknown_pedon_id must be non-empty".to_string()));
        }
        if self.unknown_source.trim().is_empty() {
            return Err(ReconcileError::Config("unknown_source must be non-empty".to_string()));
        }
        Ok(())
    }

    pub(crate) fn lists(sources: &[String], source: &str) -> bool {
        sources.iter().any(|candidate| candidate == source)
    }
}
