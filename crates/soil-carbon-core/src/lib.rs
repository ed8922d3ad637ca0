use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize};

mod carbon;
mod check;
mod config;
mod group;
mod identity;
mod pipeline;
mod project;
mod provenance;
mod segment;
mod sequence;

pub use carbon::{
    clip_to_reference_depth, compute_carbon, horizon_carbon_content, pedon_total,
    pedon_total_to_reference, round2, round_half_even, CarbonColumns,
};
pub use check::{check_master_rows, check_master_table, ConsistencyReport, MasterRowAnomaly};
pub use config::PipelineConfig;
pub use group::{PedonGroup, PedonIndex};
pub use identity::resolve_pedon_keys;
pub use pipeline::{reconcile, Reconciliation};
pub use project::{
    horizon_view, pedon_view, summary_view, HorizonRow, MasterRow, PedonRow, ReconciledTables,
    SummaryRow,
};
pub use provenance::{bucket_location_quality, default_provenance, LocationTier, Provenance};
pub use segment::mark_pedon_starts;
pub use sequence::number_horizons;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ReconcileError {
    #[error("invalid horizon type: {0}")]
    HorizonType(String),
    #[error("invalid method code: {0}")]
    MethodCode(String),
    #[error("invalid pipeline config: {0}")]
    Config(String),
}

/// Composite key of a pedon group. `pedon_id` alone is not unique across sources.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PedonKey {
    pub source: String,
    pub pedon_id: String,
}

impl PedonKey {
    #[must_use]
    pub fn new(source: impl Into<String>, pedon_id: impl Into<String>) -> Self {
        Self { source: source.into(), pedon_id: pedon_id.into() }
    }
}

impl Display for PedonKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.source, self.pedon_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum HorizonType {
    Organic,
    Mineral,
}

impl HorizonType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Organic => "Organic",
            Self::Mineral => "Mineral",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("organic") {
            Some(Self::Organic)
        } else if trimmed.eq_ignore_ascii_case("mineral") {
            Some(Self::Mineral)
        } else {
            None
        }
    }
}

impl TryFrom<String> for HorizonType {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(ReconcileError::HorizonType(value))
    }
}

impl From<HorizonType> for String {
    fn from(value: HorizonType) -> Self {
        value.as_str().to_string()
    }
}

/// Provenance flag shared by `bd_method`, `cf_method` and `cconc_method`.
///
/// Serialized as its integer code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum MethodCode {
    #[default]
    Measured,
    Estimated,
    /// Value was filled in or derived rather than reported by the source.
    Inferred,
}

impl MethodCode {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Measured => 0,
            Self::Estimated => 1,
            Self::Inferred => 2,
        }
    }

    /// Accepts the labels some sources ship instead of codes.
    #[must_use]
    pub fn parse_label(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("measured") {
            Some(Self::Measured)
        } else if trimmed.eq_ignore_ascii_case("estimated") {
            Some(Self::Estimated)
        } else {
            trimmed.parse::<u8>().ok().and_then(|code| Self::try_from(code).ok())
        }
    }
}

impl TryFrom<u8> for MethodCode {
    type Error = ReconcileError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Measured),
            1 => Ok(Self::Estimated),
            2 => Ok(Self::Inferred),
            other => Err(ReconcileError::MethodCode(other.to_string())),
        }
    }
}

impl From<MethodCode> for u8 {
    fn from(value: MethodCode) -> Self {
        value.code()
    }
}

/// One row of the unified input table, before any reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RawRecord {
    pub source: Option<String>,
    #[serde(alias = "id", deserialize_with = "deserialize_identifier")]
    pub pedon_id: Option<String>,
    pub order: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub latlon_q: Option<String>,
    pub horizon: Option<String>,
    #[serde(deserialize_with = "deserialize_horizon_type")]
    pub horizon_type: Option<HorizonType>,
    pub depth1: Option<f64>,
    pub depth2: Option<f64>,
    pub depth: Option<f64>,
    pub bulk_density: Option<f64>,
    #[serde(deserialize_with = "deserialize_method")]
    pub bd_method: Option<MethodCode>,
    pub cf: Option<f64>,
    #[serde(deserialize_with = "deserialize_method")]
    pub cf_method: Option<MethodCode>,
    pub cconc: Option<f64>,
    #[serde(deserialize_with = "deserialize_method")]
    pub cconc_method: Option<MethodCode>,
    pub mineral_d: Option<f64>,
    pub ff_d: Option<f64>,
    pub total_d: Option<f64>,
    /// The source's own 1 m carbon total. Only its presence is used: it marks
    /// the rows some sources already designate as site rows.
    pub total_c_1m: Option<f64>,
    pub depth_of_mean: Option<f64>,
    pub bulk_density_meas: Option<f64>,
}

/// A row after identity resolution: every record has an explicit pedon key.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonRecord {
    pub key: PedonKey,
    pub order: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub latlon_q: Option<String>,
    pub horizon: Option<String>,
    pub horizon_type: Option<HorizonType>,
    pub depth1: Option<f64>,
    pub depth2: Option<f64>,
    pub depth: Option<f64>,
    pub bulk_density: Option<f64>,
    pub bd_method: Option<MethodCode>,
    pub cf: Option<f64>,
    pub cf_method: Option<MethodCode>,
    pub cconc: Option<f64>,
    pub cconc_method: Option<MethodCode>,
    pub mineral_d: Option<f64>,
    pub ff_d: Option<f64>,
    pub total_d: Option<f64>,
    pub site_anchor: bool,
    pub depth_of_mean: Option<f64>,
    pub bulk_density_meas: Option<f64>,
}

impl HorizonRecord {
    #[must_use]
    pub fn from_raw(raw: RawRecord, key: PedonKey) -> Self {
        Self {
            key,
            order: raw.order,
            lat: raw.lat,
            lon: raw.lon,
            latlon_q: raw.latlon_q,
            horizon: raw.horizon,
            horizon_type: raw.horizon_type,
            depth1: raw.depth1,
            depth2: raw.depth2,
            depth: raw.depth,
            bulk_density: raw.bulk_density,
            bd_method: raw.bd_method,
            cf: raw.cf,
            cf_method: raw.cf_method,
            cconc: raw.cconc,
            cconc_method: raw.cconc_method,
            mineral_d: raw.mineral_d,
            ff_d: raw.ff_d,
            total_d: raw.total_d,
            site_anchor: raw.total_c_1m.is_some(),
            depth_of_mean: raw.depth_of_mean,
            bulk_density_meas: raw.bulk_density_meas,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdentifierValue {
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MethodValue {
    Code(f64),
    Label(String),
}

// Largest magnitude below which every integral f64 is an exact integer.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

// Spreadsheet exports write integer ids as floats (`158.0`), as a number or as
// text; every spelling of the same integer lands in the same pedon group.
#[allow(clippy::cast_possible_truncation)]
fn canonical_float_id(id: f64) -> String {
    if id.is_finite() && id.fract() == 0.0 && id.abs() < EXACT_INTEGER_LIMIT {
        (id as i64).to_string()
    } else {
        id.to_string()
    }
}

// `158.0` and `-4.00` become `158` and `-4`; other text is kept as written.
fn canonical_text_id(id: &str) -> String {
    if let Some((whole, fraction)) = id.split_once('.') {
        let digits = whole.strip_prefix('-').unwrap_or(whole);
        if !digits.is_empty()
            && digits.bytes().all(|byte| byte.is_ascii_digit())
            && !fraction.is_empty()
            && fraction.bytes().all(|byte| byte == b'0')
        {
            return whole.to_string();
        }
    }
    id.to_string()
}

fn deserialize_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<IdentifierValue>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        IdentifierValue::Integer(id) => Some(id.to_string()),
        IdentifierValue::Unsigned(id) => Some(id.to_string()),
        IdentifierValue::Float(id) => Some(canonical_float_id(id)),
        IdentifierValue::Text(id) => {
            let trimmed = id.trim();
            (!trimmed.is_empty()).then(|| canonical_text_id(trimmed))
        }
    }))
}

fn deserialize_horizon_type<'de, D>(deserializer: D) -> Result<Option<HorizonType>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => HorizonType::try_from(value).map(Some).map_err(serde::de::Error::custom),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn deserialize_method<'de, D>(deserializer: D) -> Result<Option<MethodCode>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<MethodValue>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(MethodValue::Code(code)) => {
            if code.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&code) {
                return Err(serde::de::Error::custom(ReconcileError::MethodCode(code.to_string())));
            }
            MethodCode::try_from(code as u8).map(Some).map_err(serde::de::Error::custom)
        }
        Some(MethodValue::Label(label)) if label.trim().is_empty() => Ok(None),
        Some(MethodValue::Label(label)) => MethodCode::parse_label(&label)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(ReconcileError::MethodCode(label))),
    }
}
