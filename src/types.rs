//! Core types for the Synheart Cohort pipeline
//!
//! This module defines the records that flow between stages: merged daily
//! records (raw measurements plus derived metrics), per-user feature vectors,
//! cluster assignments, and per-cluster profiles.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A group of numeric measurements that arrive together from one source table.
///
/// Column order in [`MetricGroup::COLUMNS`] matches the order of
/// [`MetricGroup::values`] and [`MetricGroup::values_mut`].
pub trait MetricGroup: Clone + Default {
    /// Source column names, in value order
    const COLUMNS: &'static [&'static str];

    /// Current values, one per column
    fn values(&self) -> Vec<Option<f64>>;

    /// Mutable slots, one per column
    fn values_mut(&mut self) -> Vec<&mut Option<f64>>;
}

/// Daily activity measurements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityMetrics {
    /// Step count
    pub steps: Option<f64>,
    /// Total calories burned (kcal)
    pub calories_burned: Option<f64>,
    /// Sedentary time (minutes)
    pub sedentary_minutes: Option<f64>,
    /// Lightly active time (minutes)
    pub lightly_active_minutes: Option<f64>,
    /// Moderately active time (minutes)
    pub moderately_active_minutes: Option<f64>,
    /// Very active time (minutes)
    pub very_active_minutes: Option<f64>,
}

impl MetricGroup for ActivityMetrics {
    const COLUMNS: &'static [&'static str] = &[
        "steps",
        "calories_burned",
        "sedentary_minutes",
        "lightly_active_minutes",
        "moderately_active_minutes",
        "very_active_minutes",
    ];

    fn values(&self) -> Vec<Option<f64>> {
        vec![
            self.steps,
            self.calories_burned,
            self.sedentary_minutes,
            self.lightly_active_minutes,
            self.moderately_active_minutes,
            self.very_active_minutes,
        ]
    }

    fn values_mut(&mut self) -> Vec<&mut Option<f64>> {
        vec![
            &mut self.steps,
            &mut self.calories_burned,
            &mut self.sedentary_minutes,
            &mut self.lightly_active_minutes,
            &mut self.moderately_active_minutes,
            &mut self.very_active_minutes,
        ]
    }
}

/// Nightly sleep measurements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepMetrics {
    /// Total time in bed (minutes)
    pub time_in_bed_minutes: Option<f64>,
    /// Total sleep duration (minutes)
    pub sleep_duration_minutes: Option<f64>,
    /// Vendor-reported sleep efficiency (0-1), if the source provides one
    #[serde(alias = "sleep_efficiency")]
    pub reported_efficiency: Option<f64>,
    /// Deep sleep duration (minutes)
    pub deep_sleep_minutes: Option<f64>,
    /// REM sleep duration (minutes)
    pub rem_sleep_minutes: Option<f64>,
    /// Light sleep duration (minutes)
    pub light_sleep_minutes: Option<f64>,
}

impl MetricGroup for SleepMetrics {
    const COLUMNS: &'static [&'static str] = &[
        "time_in_bed_minutes",
        "sleep_duration_minutes",
        "sleep_efficiency",
        "deep_sleep_minutes",
        "rem_sleep_minutes",
        "light_sleep_minutes",
    ];

    fn values(&self) -> Vec<Option<f64>> {
        vec![
            self.time_in_bed_minutes,
            self.sleep_duration_minutes,
            self.reported_efficiency,
            self.deep_sleep_minutes,
            self.rem_sleep_minutes,
            self.light_sleep_minutes,
        ]
    }

    fn values_mut(&mut self) -> Vec<&mut Option<f64>> {
        vec![
            &mut self.time_in_bed_minutes,
            &mut self.sleep_duration_minutes,
            &mut self.reported_efficiency,
            &mut self.deep_sleep_minutes,
            &mut self.rem_sleep_minutes,
            &mut self.light_sleep_minutes,
        ]
    }
}

/// Daily heart-rate summary (bpm)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartRateMetrics {
    pub avg_resting_hr: Option<f64>,
    pub avg_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub min_hr: Option<f64>,
    /// Calories burned as estimated by the heart-rate sensor (kcal)
    pub calories_burned_hr: Option<f64>,
}

impl MetricGroup for HeartRateMetrics {
    const COLUMNS: &'static [&'static str] = &[
        "avg_resting_hr",
        "avg_hr",
        "max_hr",
        "min_hr",
        "calories_burned_hr",
    ];

    fn values(&self) -> Vec<Option<f64>> {
        vec![
            self.avg_resting_hr,
            self.avg_hr,
            self.max_hr,
            self.min_hr,
            self.calories_burned_hr,
        ]
    }

    fn values_mut(&mut self) -> Vec<&mut Option<f64>> {
        vec![
            &mut self.avg_resting_hr,
            &mut self.avg_hr,
            &mut self.max_hr,
            &mut self.min_hr,
            &mut self.calories_burned_hr,
        ]
    }
}

/// Metrics derived from the raw measurements of a single day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Sleep duration / time in bed, clipped to 0-1
    pub sleep_efficiency: Option<f64>,
    /// Very active minutes plus half of moderately active minutes
    pub high_intensity_minutes: Option<f64>,
    /// Weighted composite of steps, sleep, activity and resting HR (roughly 0-2)
    pub lifestyle_score: Option<f64>,
}

/// One merged row per (user, day)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub activity: ActivityMetrics,
    pub sleep: SleepMetrics,
    pub heart_rate: HeartRateMetrics,
    /// Populated by the feature deriver
    #[serde(default)]
    pub derived: DerivedMetrics,
}

impl DailyRecord {
    /// Create an empty record for a user and day
    pub fn new(user_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            date,
            activity: ActivityMetrics::default(),
            sleep: SleepMetrics::default(),
            heart_rate: HeartRateMetrics::default(),
            derived: DerivedMetrics::default(),
        }
    }

    /// Raw measurement slots across all source groups
    pub fn raw_values_mut(&mut self) -> Vec<&mut Option<f64>> {
        let mut slots = self.activity.values_mut();
        slots.extend(self.sleep.values_mut());
        slots.extend(self.heart_rate.values_mut());
        slots
    }
}

/// User-level feature names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AvgSteps,
    AvgSedentaryMinutes,
    AvgCaloriesBurned,
    AvgSleepEfficiency,
    AvgTimeInBed,
    AvgRestingHr,
    AvgHighIntensityMinutes,
    AvgLifestyleScore,
}

impl Feature {
    /// Every aggregated user feature
    pub const ALL: [Feature; 8] = [
        Feature::AvgSteps,
        Feature::AvgSedentaryMinutes,
        Feature::AvgCaloriesBurned,
        Feature::AvgSleepEfficiency,
        Feature::AvgTimeInBed,
        Feature::AvgRestingHr,
        Feature::AvgHighIntensityMinutes,
        Feature::AvgLifestyleScore,
    ];

    /// Features eligible for clustering, in preference order
    pub const CLUSTERING: [Feature; 7] = [
        Feature::AvgSteps,
        Feature::AvgSedentaryMinutes,
        Feature::AvgCaloriesBurned,
        Feature::AvgSleepEfficiency,
        Feature::AvgRestingHr,
        Feature::AvgHighIntensityMinutes,
        Feature::AvgLifestyleScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::AvgSteps => "avg_steps",
            Feature::AvgSedentaryMinutes => "avg_sedentary_minutes",
            Feature::AvgCaloriesBurned => "avg_calories_burned",
            Feature::AvgSleepEfficiency => "avg_sleep_efficiency",
            Feature::AvgTimeInBed => "avg_time_in_bed",
            Feature::AvgRestingHr => "avg_resting_hr",
            Feature::AvgHighIntensityMinutes => "avg_high_intensity_minutes",
            Feature::AvgLifestyleScore => "avg_lifestyle_score",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean of each daily metric across a user's available days
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserFeatureVector {
    pub user_id: String,
    /// Number of daily records aggregated
    pub days: usize,
    pub avg_steps: Option<f64>,
    pub avg_sedentary_minutes: Option<f64>,
    pub avg_calories_burned: Option<f64>,
    pub avg_sleep_efficiency: Option<f64>,
    pub avg_time_in_bed: Option<f64>,
    pub avg_resting_hr: Option<f64>,
    pub avg_high_intensity_minutes: Option<f64>,
    pub avg_lifestyle_score: Option<f64>,
}

impl UserFeatureVector {
    /// Create a vector with no feature values
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::AvgSteps => self.avg_steps,
            Feature::AvgSedentaryMinutes => self.avg_sedentary_minutes,
            Feature::AvgCaloriesBurned => self.avg_calories_burned,
            Feature::AvgSleepEfficiency => self.avg_sleep_efficiency,
            Feature::AvgTimeInBed => self.avg_time_in_bed,
            Feature::AvgRestingHr => self.avg_resting_hr,
            Feature::AvgHighIntensityMinutes => self.avg_high_intensity_minutes,
            Feature::AvgLifestyleScore => self.avg_lifestyle_score,
        }
    }

    pub fn set(&mut self, feature: Feature, value: Option<f64>) {
        let slot = match feature {
            Feature::AvgSteps => &mut self.avg_steps,
            Feature::AvgSedentaryMinutes => &mut self.avg_sedentary_minutes,
            Feature::AvgCaloriesBurned => &mut self.avg_calories_burned,
            Feature::AvgSleepEfficiency => &mut self.avg_sleep_efficiency,
            Feature::AvgTimeInBed => &mut self.avg_time_in_bed,
            Feature::AvgRestingHr => &mut self.avg_resting_hr,
            Feature::AvgHighIntensityMinutes => &mut self.avg_high_intensity_minutes,
            Feature::AvgLifestyleScore => &mut self.avg_lifestyle_score,
        };
        *slot = value;
    }

    /// Builder-style [`UserFeatureVector::set`]
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.set(feature, Some(value));
        self
    }
}

/// Mapping from user to cluster label in `0..n_clusters`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub n_clusters: usize,
    /// User ids, parallel to `labels`
    pub user_ids: Vec<String>,
    pub labels: Vec<usize>,
}

impl ClusterAssignment {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label assigned to a user, if the user was clustered
    pub fn label_of(&self, user_id: &str) -> Option<usize> {
        self.user_ids
            .iter()
            .position(|id| id == user_id)
            .map(|idx| self.labels[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.user_ids
            .iter()
            .map(String::as_str)
            .zip(self.labels.iter().copied())
    }

    /// Member count per label
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in &self.labels {
            if label < sizes.len() {
                sizes[label] += 1;
            }
        }
        sizes
    }
}

/// A user feature vector with its cluster label appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteredUser {
    #[serde(flatten)]
    pub features: UserFeatureVector,
    pub cluster: usize,
}

/// Mean of one feature among the members of a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMean {
    pub feature: Feature,
    pub mean: f64,
}

/// Summary of one cluster in original (unstandardized) units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub cluster: usize,
    pub n_users: usize,
    pub feature_means: Vec<FeatureMean>,
}

impl ClusterProfile {
    pub fn mean(&self, feature: Feature) -> Option<f64> {
        self.feature_means
            .iter()
            .find(|m| m.feature == feature)
            .map(|m| m.mean)
    }
}
