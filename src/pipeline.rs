//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Cohort.
//! It runs the full pipeline from merged daily records to cluster profiles.

use crate::aggregate::UserAggregator;
use crate::error::ComputeError;
use crate::features::FeatureDeriver;
use crate::kmeans::{KMeans, KMeansConfig, Partition};
use crate::preprocess::{CleaningReport, Preprocessor};
use crate::profile::ProfileSummarizer;
use crate::scaler::{FeatureSelector, StandardScaler};
use crate::sources::SourceTables;
use crate::types::{
    ClusterAssignment, ClusterProfile, ClusteredUser, DailyRecord, Feature, UserFeatureVector,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Daily and user-level feature tables, before clustering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTables {
    /// Daily records with derived metrics
    pub daily: Vec<DailyRecord>,
    /// One feature vector per user, ordered by user id
    pub users: Vec<UserFeatureVector>,
}

/// Everything a segmentation run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationReport {
    /// Parameters the partitioner ran with
    pub config: KMeansConfig,
    /// Cleaning summary, when the run started from source tables
    pub cleaning: Option<CleaningReport>,
    /// Daily records with derived metrics
    pub daily: Vec<DailyRecord>,
    /// User feature vectors with cluster labels
    pub users: Vec<ClusteredUser>,
    /// Features used for clustering, in column order
    pub features: Vec<Feature>,
    /// Fitted standardization parameters
    pub scaler: StandardScaler,
    /// Standardized matrix, rows parallel to `users`
    pub standardized: Vec<Vec<f64>>,
    pub assignment: ClusterAssignment,
    /// Winning restart: labels, centroids and inertia
    pub partition: Partition,
    /// One profile per cluster, ordered by label
    pub profiles: Vec<ClusterProfile>,
}

impl SegmentationReport {
    /// Final centroids in standardized feature space
    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.partition.centroids
    }

    pub fn inertia(&self) -> f64 {
        self.partition.inertia
    }
}

/// Derive daily features and aggregate them per user
pub fn features_only(records: Vec<DailyRecord>) -> FeatureTables {
    let daily = FeatureDeriver::derive_all(records);
    let users = UserAggregator::aggregate(&daily);
    FeatureTables { daily, users }
}

/// Segment users from merged daily records with default restarts.
///
/// # Example
/// ```ignore
/// let report = segment_daily_records(records, 3, 42)?;
/// for profile in &report.profiles {
///     println!("cluster {}: {} users", profile.cluster, profile.n_users);
/// }
/// ```
pub fn segment_daily_records(
    records: Vec<DailyRecord>,
    n_clusters: usize,
    seed: u64,
) -> Result<SegmentationReport, ComputeError> {
    SegmentationPipeline::new(KMeansConfig::new(n_clusters).with_seed(seed)).run(records)
}

/// Segmentation pipeline.
///
/// Pipeline stages:
/// 1. FeatureDeriver - Per-day derived metrics
/// 2. UserAggregator - Per-user means
/// 3. FeatureSelector / StandardScaler - Feature subset, standardized
/// 4. KMeans - Partition users
/// 5. ProfileSummarizer - Per-cluster means in original units
#[derive(Debug, Clone, Default)]
pub struct SegmentationPipeline {
    config: KMeansConfig,
}

impl SegmentationPipeline {
    pub fn new(config: KMeansConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    /// Run every stage on an already cleaned and merged daily table
    pub fn run(&self, records: Vec<DailyRecord>) -> Result<SegmentationReport, ComputeError> {
        // Stages 1-2: derive daily features and aggregate per user
        let FeatureTables { daily, users } = features_only(records);
        info!(
            records = daily.len(),
            users = users.len(),
            "derived daily and user features"
        );

        // Stage 3: select and standardize
        let matrix = FeatureSelector::select(&users)?;
        let (scaler, standardized) = StandardScaler::fit_transform(&matrix)?;
        info!(
            features = ?matrix.features.iter().map(Feature::as_str).collect::<Vec<_>>(),
            "selected and standardized features"
        );

        // Stage 4: partition
        let partition = KMeans::new(self.config.clone()).fit(&standardized)?;
        let assignment = ClusterAssignment {
            n_clusters: self.config.n_clusters,
            user_ids: matrix.user_ids,
            labels: partition.labels.clone(),
        };
        info!(
            n_clusters = self.config.n_clusters,
            inertia = partition.inertia,
            sizes = ?assignment.cluster_sizes(),
            "partitioned users"
        );

        // Stage 5: summarize in original units
        let profiles = ProfileSummarizer::summarize(&users, &assignment, &matrix.features);

        let users = users
            .into_iter()
            .zip(&partition.labels)
            .map(|(features, &cluster)| ClusteredUser { features, cluster })
            .collect();

        Ok(SegmentationReport {
            config: self.config.clone(),
            cleaning: None,
            daily,
            users,
            features: matrix.features,
            scaler,
            standardized,
            assignment,
            partition,
            profiles,
        })
    }

    /// Clean and merge source tables, then run every stage
    pub fn run_from_sources(
        &self,
        tables: SourceTables,
    ) -> Result<SegmentationReport, ComputeError> {
        let (records, cleaning) = Preprocessor::merge(tables);
        let mut report = self.run(records)?;
        report.cleaning = Some(cleaning);
        Ok(report)
    }
}
