//! User aggregation
//!
//! Reduces each user's daily records into a single feature vector of
//! arithmetic means. Absent values are skipped rather than counted as zero.

use crate::types::{DailyRecord, Feature, UserFeatureVector};
use std::collections::BTreeMap;

/// Aggregator from daily records to per-user feature vectors
pub struct UserAggregator;

impl UserAggregator {
    /// Aggregate daily records into one vector per user, ordered by user id
    pub fn aggregate(records: &[DailyRecord]) -> Vec<UserFeatureVector> {
        let mut by_user: BTreeMap<&str, Vec<&DailyRecord>> = BTreeMap::new();
        for record in records {
            by_user.entry(record.user_id.as_str()).or_default().push(record);
        }

        by_user
            .into_iter()
            .map(|(user_id, days)| aggregate_user(user_id, &days))
            .collect()
    }
}

fn aggregate_user(user_id: &str, days: &[&DailyRecord]) -> UserFeatureVector {
    let mut vector = UserFeatureVector::new(user_id);
    vector.days = days.len();

    for feature in Feature::ALL {
        let mean = mean_of(days.iter().filter_map(|record| daily_value(record, feature)));
        vector.set(feature, mean);
    }

    vector
}

/// Daily metric that feeds a user-level feature
fn daily_value(record: &DailyRecord, feature: Feature) -> Option<f64> {
    match feature {
        Feature::AvgSteps => record.activity.steps,
        Feature::AvgSedentaryMinutes => record.activity.sedentary_minutes,
        Feature::AvgCaloriesBurned => record.activity.calories_burned,
        Feature::AvgSleepEfficiency => record.derived.sleep_efficiency,
        Feature::AvgTimeInBed => record.sleep.time_in_bed_minutes,
        Feature::AvgRestingHr => record.heart_rate.avg_resting_hr,
        Feature::AvgHighIntensityMinutes => record.derived.high_intensity_minutes,
        Feature::AvgLifestyleScore => record.derived.lifestyle_score,
    }
}

/// Arithmetic mean, `None` for an empty sequence
fn mean_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return None;
    }
    Some(sum / count as f64)
}
