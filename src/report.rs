//! Report encoding
//!
//! This module encodes a segmentation run into a JSON summary and writes the
//! report directory: the summary plus CSV tables for daily features, user
//! clusters and cluster profiles.

use crate::error::ComputeError;
use crate::pipeline::SegmentationReport;
use crate::preprocess::CleaningReport;
use crate::scaler::StandardScaler;
use crate::types::{
    ActivityMetrics, ClusterProfile, DailyRecord, Feature, HeartRateMetrics, MetricGroup,
    SleepMetrics,
};
use crate::{COHORT_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Current summary schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// JSON summary file name
pub const SUMMARY_FILE: &str = "segmentation.json";

/// Daily feature table file name
pub const DAILY_FEATURES_FILE: &str = "daily_features.csv";

/// User feature table with cluster labels
pub const USER_CLUSTERS_FILE: &str = "user_clusters.csv";

/// Cluster profile table file name
pub const CLUSTER_PROFILES_FILE: &str = "cluster_profiles.csv";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Parameters and convergence facts of the partitioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringParams {
    pub n_clusters: usize,
    pub random_state: u64,
    pub n_init: usize,
    pub max_iter: usize,
    pub n_users: usize,
    /// Iterations of the winning restart
    pub n_iter: usize,
    pub best_restart: usize,
}

/// JSON summary of one segmentation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationSummary {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub params: ClusteringParams,
    pub features: Vec<Feature>,
    pub scaler: StandardScaler,
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
    pub restart_inertias: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaning: Option<CleaningReport>,
    pub profiles: Vec<ClusterProfile>,
    /// User id to cluster label
    pub clusters: BTreeMap<String, usize>,
}

/// Encoder for segmentation summaries
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Encode a segmentation run into a summary
    pub fn encode(&self, report: &SegmentationReport) -> SegmentationSummary {
        let partition = &report.partition;

        SegmentationSummary {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: COHORT_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            params: ClusteringParams {
                n_clusters: report.config.n_clusters,
                random_state: report.config.seed,
                n_init: report.config.n_init,
                max_iter: report.config.max_iter,
                n_users: report.users.len(),
                n_iter: partition.n_iter,
                best_restart: partition.best_restart,
            },
            features: report.features.clone(),
            scaler: report.scaler.clone(),
            centroids: partition.centroids.clone(),
            inertia: partition.inertia,
            restart_inertias: partition.restart_inertias.clone(),
            cleaning: report.cleaning.clone(),
            profiles: report.profiles.clone(),
            clusters: report
                .assignment
                .iter()
                .map(|(user_id, label)| (user_id.to_string(), label))
                .collect(),
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, report: &SegmentationReport) -> Result<String, ComputeError> {
        let summary = self.encode(report);
        serde_json::to_string_pretty(&summary).map_err(ComputeError::JsonError)
    }

    /// Write the summary and CSV tables into `dir`, creating it if needed
    pub fn write_report_dir(
        &self,
        report: &SegmentationReport,
        dir: &Path,
    ) -> Result<SegmentationSummary, ComputeError> {
        std::fs::create_dir_all(dir)?;

        let summary = self.encode(report);
        std::fs::write(
            dir.join(SUMMARY_FILE),
            serde_json::to_string_pretty(&summary)?,
        )?;
        write_daily_csv(&report.daily, File::create(dir.join(DAILY_FEATURES_FILE))?)?;
        write_user_clusters_csv(report, File::create(dir.join(USER_CLUSTERS_FILE))?)?;
        write_profiles_csv(
            &report.profiles,
            &report.features,
            File::create(dir.join(CLUSTER_PROFILES_FILE))?,
        )?;

        info!(dir = %dir.display(), "wrote report directory");
        Ok(summary)
    }
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Daily records with raw and derived metrics
pub fn write_daily_csv<W: Write>(records: &[DailyRecord], writer: W) -> Result<(), ComputeError> {
    let mut wtr = csv::Writer::from_writer(writer);

    // Vendor efficiency is renamed apart from the derived column
    let mut header = vec!["user_id", "date"];
    header.extend(ActivityMetrics::COLUMNS);
    header.extend(SleepMetrics::COLUMNS.iter().map(|&c| {
        if c == "sleep_efficiency" {
            "reported_sleep_efficiency"
        } else {
            c
        }
    }));
    header.extend(HeartRateMetrics::COLUMNS);
    header.extend(["sleep_efficiency", "high_intensity_minutes", "lifestyle_score"]);
    wtr.write_record(&header)?;

    for record in records {
        let mut fields = vec![
            record.user_id.clone(),
            record.date.format("%Y-%m-%d").to_string(),
        ];
        let values = record
            .activity
            .values()
            .into_iter()
            .chain(record.sleep.values())
            .chain(record.heart_rate.values())
            .chain([
                record.derived.sleep_efficiency,
                record.derived.high_intensity_minutes,
                record.derived.lifestyle_score,
            ]);
        fields.extend(values.map(cell));
        wtr.write_record(&fields)?;
    }

    wtr.flush()?;
    Ok(())
}

/// User feature vectors with their cluster label
pub fn write_user_clusters_csv<W: Write>(
    report: &SegmentationReport,
    writer: W,
) -> Result<(), ComputeError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["user_id", "days"];
    header.extend(Feature::ALL.iter().map(Feature::as_str));
    header.push("cluster");
    wtr.write_record(&header)?;

    for user in &report.users {
        let mut fields = vec![user.features.user_id.clone(), user.features.days.to_string()];
        fields.extend(Feature::ALL.iter().map(|&f| cell(user.features.get(f))));
        fields.push(user.cluster.to_string());
        wtr.write_record(&fields)?;
    }

    wtr.flush()?;
    Ok(())
}

/// One row per cluster with member count and feature means
pub fn write_profiles_csv<W: Write>(
    profiles: &[ClusterProfile],
    features: &[Feature],
    writer: W,
) -> Result<(), ComputeError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["cluster", "n_users"];
    header.extend(features.iter().map(Feature::as_str));
    wtr.write_record(&header)?;

    for profile in profiles {
        let mut fields = vec![profile.cluster.to_string(), profile.n_users.to_string()];
        fields.extend(features.iter().map(|&f| cell(profile.mean(f))));
        wtr.write_record(&fields)?;
    }

    wtr.flush()?;
    Ok(())
}
