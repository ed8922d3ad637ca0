//! Carbon stock arithmetic.
//!
//! Horizon contents are areal masses (`cconc`% × bulk density × thickness ×
//! fine-earth fraction × 10 000). Pedon totals are written on master rows
//! only; every other row carries `None`.

use crate::{HorizonRecord, PedonIndex, PipelineConfig, Provenance};

const AREAL_SCALE: f64 = 10_000.0;
const REFERENCE_TOTAL_SCALE: f64 = 0.01;

/// Carbon columns of a table, indexed by row position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CarbonColumns {
    pub ccontent: Vec<Option<f64>>,
    pub ccontent_1m: Vec<Option<f64>>,
    pub total_c: Vec<Option<f64>>,
    pub total_c_1m: Vec<Option<f64>>,
}

/// Round half to even, the rounding the source datasets were produced with.
#[must_use]
pub fn round_half_even(value: f64) -> f64 {
    value.round_ties_even()
}

#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Carbon content of one horizon; `None` when any operand is missing.
#[must_use]
pub fn horizon_carbon_content(
    cconc: Option<f64>,
    bulk_density: Option<f64>,
    depth: Option<f64>,
    cf: Option<f64>,
) -> Option<f64> {
    let content =
        (cconc? / 100.0) * bulk_density? * depth? * ((100.0 - cf?) / 100.0) * AREAL_SCALE;
    Some(round_half_even(content))
}

/// Clips a horizon's content to the part lying above `reference_cm`.
///
/// `depth1` is the bound compared against the reference. Horizons with
/// `|depth1| < reference_cm` keep their full content. Past that, the excluded
/// share `(|depth1| - reference) / (|depth1| - |depth2|)` is removed and the
/// result floored at zero. A zero-width interval yields `Some(0.0)`.
#[must_use]
pub fn clip_to_reference_depth(
    ccontent: Option<f64>,
    depth1: Option<f64>,
    depth2: Option<f64>,
    reference_cm: f64,
) -> Option<f64> {
    let ccontent = ccontent?;
    let lower = match depth1 {
        Some(depth1) if depth1.abs() >= reference_cm => depth1.abs(),
        _ => return Some(ccontent),
    };
    let upper = depth2?.abs();

    let width = lower - upper;
    if width == 0.0 {
        return Some(0.0);
    }

    let excluded = (lower - reference_cm) / width;
    let candidate = round_half_even(ccontent - ccontent * excluded);
    Some(candidate.max(0.0))
}

/// Sum of the present contents, rounded to two decimals.
pub fn pedon_total<I>(contents: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    round2(contents.into_iter().flatten().sum())
}

/// `0.01 ×` the sum of the present clipped contents, rounded to two decimals.
pub fn pedon_total_to_reference<I>(contents: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    let sum: f64 = contents.into_iter().flatten().sum();
    round2(REFERENCE_TOTAL_SCALE * sum)
}

/// Computes all carbon columns. `provenance` supplies the cleaned `cf`,
/// `pedon_start` decides which rows receive the pedon totals.
#[must_use]
pub fn compute_carbon(
    records: &[HorizonRecord],
    provenance: &[Provenance],
    index: &PedonIndex,
    pedon_start: &[bool],
    config: &PipelineConfig,
) -> CarbonColumns {
    let ccontent: Vec<Option<f64>> = records
        .iter()
        .zip(provenance)
        .map(|(record, provenance)| {
            horizon_carbon_content(
                record.cconc,
                record.bulk_density,
                record.depth,
                Some(provenance.cf),
            )
        })
        .collect();

    let mut degenerate = 0_usize;
    let ccontent_1m: Vec<Option<f64>> = records
        .iter()
        .zip(&ccontent)
        .map(|(record, content)| {
            if let (Some(_), Some(depth1), Some(depth2)) = (content, record.depth1, record.depth2) {
                if depth1.abs() >= config.reference_depth_cm && depth1.abs() == depth2.abs() {
                    degenerate += 1;
                }
            }
            clip_to_reference_depth(*content, record.depth1, record.depth2, config.reference_depth_cm)
        })
        .collect();
    if degenerate > 0 {
        tracing::warn!(rows = degenerate, "zero-width horizons below the reference depth clipped to 0");
    }

    let mut total_c = vec![None; records.len()];
    let mut total_c_1m = vec![None; records.len()];
    for group in index.groups() {
        let total = pedon_total(group.rows.iter().map(|row| ccontent[*row]));
        let total_1m = pedon_total_to_reference(group.rows.iter().map(|row| ccontent_1m[*row]));
        for row in group.rows.iter().filter(|row| pedon_start.get(**row).copied().unwrap_or(false)) {
            total_c[*row] = Some(total);
            total_c_1m[*row] = Some(total_1m);
        }
    }

    let missing = ccontent.iter().filter(|content| content.is_none()).count();
    tracing::debug!(rows = records.len(), missing_ccontent = missing, "computed carbon stocks");
    CarbonColumns { ccontent, ccontent_1m, total_c, total_c_1m }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{PedonKey, RawRecord};

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap_or_else(|| panic!("expected {expected}, got None"));
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn horizon_content_follows_the_areal_formula() {
        // 5% C, 1.2 g/cm3, 10 cm, 20% coarse fragments
        assert_close(horizon_carbon_content(Some(5.0), Some(1.2), Some(10.0), Some(20.0)), 4800.0);
        assert_close(horizon_carbon_content(Some(5.0), Some(1.2), Some(10.0), Some(0.0)), 6000.0);
    }

    #[test]
    fn missing_operand_yields_none_not_zero() {
        assert_eq!(horizon_carbon_content(None, Some(1.2), Some(10.0), Some(0.0)), None);
        assert_eq!(horizon_carbon_content(Some(5.0), None, Some(10.0), Some(0.0)), None);
        assert_eq!(horizon_carbon_content(Some(5.0), Some(1.2), None, Some(0.0)), None);
        assert_eq!(horizon_carbon_content(Some(5.0), Some(1.2), Some(10.0), None), None);
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert!((round_half_even(2.5) - 2.0).abs() < f64::EPSILON);
        assert!((round_half_even(3.5) - 4.0).abs() < f64::EPSILON);
        assert!((round2(205.499_999) - 205.5).abs() < 1e-9);
    }

    #[test]
    fn horizon_within_reference_depth_is_unchanged() {
        assert_close(clip_to_reference_depth(Some(1234.0), Some(40.0), Some(20.0), 100.0), 1234.0);
        assert_close(clip_to_reference_depth(Some(1234.0), Some(-99.9), Some(-80.0), 100.0), 1234.0);
        assert_close(clip_to_reference_depth(Some(1234.0), None, Some(80.0), 100.0), 1234.0);
    }

    #[test]
    fn straddling_horizon_is_clipped_proportionally() {
        assert_close(clip_to_reference_depth(Some(1000.0), Some(120.0), Some(80.0), 100.0), 500.0);
        assert_close(clip_to_reference_depth(Some(1000.0), Some(-120.0), Some(-80.0), 100.0), 500.0);
        assert_close(clip_to_reference_depth(Some(1000.0), Some(100.0), Some(90.0), 100.0), 1000.0);
    }

    #[test]
    fn horizon_fully_below_reference_is_floored_at_zero() {
        // excluded share is 2.0, raw candidate is -1000
        assert_close(clip_to_reference_depth(Some(1000.0), Some(200.0), Some(150.0), 100.0), 0.0);
    }

    #[test]
    fn zero_width_interval_past_reference_yields_zero() {
        assert_close(clip_to_reference_depth(Some(1000.0), Some(150.0), Some(150.0), 100.0), 0.0);
        assert_close(clip_to_reference_depth(Some(1000.0), Some(-150.0), Some(150.0), 100.0), 0.0);
    }

    #[test]
    fn clipping_propagates_missing_values() {
        assert_eq!(clip_to_reference_depth(None, Some(150.0), Some(100.0), 100.0), None);
        assert_eq!(clip_to_reference_depth(Some(10.0), Some(150.0), None, 100.0), None);
    }

    #[test]
    fn pedon_total_sums_present_contents_to_two_decimals() {
        assert!((pedon_total([Some(120.0), Some(85.5), Some(0.0)]) - 205.50).abs() < 1e-9);
        assert!((pedon_total([Some(120.0), None, Some(85.5)]) - 205.50).abs() < 1e-9);
        assert!(pedon_total([None, None]).abs() < f64::EPSILON);
        assert!((pedon_total_to_reference([Some(12_000.0), Some(8_550.0), None]) - 205.50).abs() < 1e-9);
    }

    #[test]
    fn totals_land_on_master_rows_only() {
        let key = PedonKey::new("Calvert", "12");
        let horizon = |cconc: f64, depth1: f64, depth2: f64| {
            HorizonRecord::from_raw(
                RawRecord {
                    cconc: Some(cconc),
                    bulk_density: Some(1.0),
                    depth: Some(depth1 - depth2),
                    depth1: Some(depth1),
                    depth2: Some(depth2),
                    ..RawRecord::default()
                },
                key.clone(),
            )
        };
        let records = vec![horizon(2.0, 30.0, 0.0), horizon(1.0, 80.0, 30.0), horizon(0.5, 140.0, 80.0)];
        let provenance = vec![
            Provenance {
                cf: 0.0,
                cf_method: crate::MethodCode::Inferred,
                bd_method: crate::MethodCode::Measured,
                cconc_method: crate::MethodCode::Measured,
            };
            3
        ];
        let index = PedonIndex::build(records.iter().map(|record| &record.key));
        let columns = compute_carbon(
            &records,
            &provenance,
            &index,
            &[true, false, false],
            &PipelineConfig::default(),
        );

        assert_eq!(columns.ccontent, vec![Some(6000.0), Some(5000.0), Some(3000.0)]);
        assert_eq!(columns.ccontent_1m, vec![Some(6000.0), Some(5000.0), Some(1000.0)]);
        assert_close(columns.total_c[0], 14_000.0);
        assert_close(columns.total_c_1m[0], 120.0);
        assert_eq!(&columns.total_c[1..], &[None, None]);
        assert_eq!(&columns.total_c_1m[1..], &[None, None]);
    }

    proptest! {
        #[test]
        fn property_clipped_content_is_never_negative(
            content in 0.0_f64..1.0e6,
            depth1 in -400.0_f64..400.0,
            depth2 in -400.0_f64..400.0,
        ) {
            let clipped = clip_to_reference_depth(Some(content), Some(depth1), Some(depth2), 100.0);
            let clipped = clipped.unwrap_or(-1.0);
            prop_assert!(clipped >= 0.0);
            if depth1.abs() < 100.0 {
                prop_assert!((clipped - content).abs() < f64::EPSILON);
            }
        }
    }
}
