//! Daily feature derivation
//!
//! This module derives per-day metrics from merged raw measurements:
//! - Sleep efficiency
//! - High-intensity activity minutes
//! - Composite lifestyle score
//!
//! Missing inputs never fail a record; each metric degrades to its documented
//! fallback instead.

use crate::types::{DailyRecord, DerivedMetrics};
use tracing::debug;

/// Daily step count that maps to a steps sub-score of 1.0
const STEPS_REFERENCE: f64 = 10_000.0;

/// High-intensity minutes that map to an activity sub-score of 1.0
const ACTIVITY_REFERENCE_MINUTES: f64 = 60.0;

/// Resting HR at or above which the heart-rate sub-score is 0
const RESTING_HR_CEILING: f64 = 75.0;

/// Resting HR span over which the heart-rate sub-score rises from 0 to 1
const RESTING_HR_SPAN: f64 = 20.0;

const STEPS_WEIGHT: f64 = 0.30;
const SLEEP_WEIGHT: f64 = 0.25;
const ACTIVITY_WEIGHT: f64 = 0.25;
const RESTING_HR_WEIGHT: f64 = 0.20;

/// Feature deriver for daily records
pub struct FeatureDeriver;

impl FeatureDeriver {
    /// Derive features for a single record
    pub fn derive(mut record: DailyRecord) -> DailyRecord {
        let sleep_efficiency = compute_sleep_efficiency(&record);
        let high_intensity_minutes = compute_high_intensity_minutes(&record);
        let lifestyle_score = compute_lifestyle_score(
            record.activity.steps,
            sleep_efficiency,
            high_intensity_minutes,
            record.heart_rate.avg_resting_hr,
        );

        record.derived = DerivedMetrics {
            sleep_efficiency,
            high_intensity_minutes,
            lifestyle_score: Some(lifestyle_score),
        };
        record
    }

    /// Derive features for every record, preserving order
    pub fn derive_all(records: Vec<DailyRecord>) -> Vec<DailyRecord> {
        records.into_iter().map(Self::derive).collect()
    }
}

/// Calculate sleep efficiency: sleep duration / time in bed
///
/// Zero or missing time in bed yields 0.0 rather than a division by zero.
/// Records without any duration fall back to the vendor-reported efficiency.
fn compute_sleep_efficiency(record: &DailyRecord) -> Option<f64> {
    let sleep = &record.sleep;

    match (sleep.sleep_duration_minutes, sleep.time_in_bed_minutes) {
        (Some(sleep_min), Some(bed_min)) if bed_min > 0.0 => {
            Some((sleep_min / bed_min).clamp(0.0, 1.0))
        }
        (None, None) => sleep.reported_efficiency.map(|e| e.clamp(0.0, 1.0)),
        _ => {
            debug!(
                user_id = %record.user_id,
                date = %record.date,
                "time in bed is zero or missing, sleep efficiency set to 0"
            );
            Some(0.0)
        }
    }
}

/// Calculate high-intensity minutes: very active + half of moderately active
fn compute_high_intensity_minutes(record: &DailyRecord) -> Option<f64> {
    let activity = &record.activity;

    match (activity.very_active_minutes, activity.moderately_active_minutes) {
        (Some(very), Some(moderate)) => Some(very + moderate * 0.5),
        _ => None,
    }
}

/// Calculate the composite lifestyle score
///
/// Weighted sum of up to four sub-scores; an absent input contributes 0.
fn compute_lifestyle_score(
    steps: Option<f64>,
    sleep_efficiency: Option<f64>,
    high_intensity_minutes: Option<f64>,
    resting_hr: Option<f64>,
) -> f64 {
    let steps_score = steps
        .map(|s| (s / STEPS_REFERENCE).clamp(0.0, 2.0))
        .unwrap_or(0.0);

    // 0-2 scale
    let sleep_score = sleep_efficiency.map(|e| e * 2.0).unwrap_or(0.0);

    let activity_score = high_intensity_minutes
        .map(|m| (m / ACTIVITY_REFERENCE_MINUTES).clamp(0.0, 2.0))
        .unwrap_or(0.0);

    // Lower resting HR scores higher: 55 bpm -> 1.0, 75 bpm -> 0.0
    let hr_score = resting_hr
        .map(|hr| ((RESTING_HR_CEILING - hr) / RESTING_HR_SPAN).clamp(0.0, 1.0))
        .unwrap_or(0.0);

    steps_score * STEPS_WEIGHT
        + sleep_score * SLEEP_WEIGHT
        + activity_score * ACTIVITY_WEIGHT
        + hr_score * RESTING_HR_WEIGHT
}
