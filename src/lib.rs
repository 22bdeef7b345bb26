//! Synheart Cohort - Lifestyle segmentation for wearable daily records
//!
//! Cohort turns per-user daily activity, sleep and heart-rate records into
//! lifestyle segments through a deterministic pipeline: cleaning and merging
//! → daily feature derivation → per-user aggregation → feature selection and
//! standardization → k-means partitioning → cluster profiles.
//!
//! ## Modules
//!
//! - **Sources**: CSV source tables, cleaning and merging, sample data
//! - **Segmentation**: derivation, aggregation, scaling, clustering, profiles
//! - **Report**: JSON summary and CSV tables of a run

pub mod aggregate;
pub mod config;
pub mod error;
pub mod features;
pub mod kmeans;
pub mod pipeline;
pub mod preprocess;
pub mod profile;
pub mod report;
pub mod sample;
pub mod scaler;
pub mod sources;
pub mod types;

pub use config::{Config, ConfigError};
pub use error::ComputeError;
pub use kmeans::{KMeans, KMeansConfig, Partition};
pub use pipeline::{features_only, segment_daily_records, SegmentationPipeline, SegmentationReport};
pub use report::{ReportEncoder, SegmentationSummary};
pub use scaler::StandardScaler;
pub use sources::SourceTables;
pub use types::{ClusterProfile, DailyRecord, Feature, UserFeatureVector};

/// Cohort version embedded in every report
pub const COHORT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "synheart-cohort";
