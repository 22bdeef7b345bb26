//! Integration tests for the segmentation pipeline

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use synheart_cohort::features::FeatureDeriver;
use synheart_cohort::kmeans::{KMeans, KMeansConfig};
use synheart_cohort::report::{ReportEncoder, SUMMARY_FILE, USER_CLUSTERS_FILE};
use synheart_cohort::sample::{SampleConfig, SampleGenerator};
use synheart_cohort::scaler::{FeatureSelector, StandardScaler};
use synheart_cohort::types::{
    ActivityMetrics, DailyRecord, Feature, HeartRateMetrics, SleepMetrics, UserFeatureVector,
};
use synheart_cohort::{segment_daily_records, ComputeError, SegmentationPipeline, SourceTables};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

/// A record with every metric at a mid-range value except steps
fn midrange_record(user: &str, date: NaiveDate, steps: f64) -> DailyRecord {
    let mut record = DailyRecord::new(user, date);
    record.activity = ActivityMetrics {
        steps: Some(steps),
        calories_burned: Some(2200.0),
        sedentary_minutes: Some(600.0),
        lightly_active_minutes: Some(200.0),
        moderately_active_minutes: Some(30.0),
        very_active_minutes: Some(20.0),
    };
    record.sleep = SleepMetrics {
        time_in_bed_minutes: Some(480.0),
        sleep_duration_minutes: Some(420.0),
        deep_sleep_minutes: Some(90.0),
        rem_sleep_minutes: Some(110.0),
        light_sleep_minutes: Some(220.0),
        ..Default::default()
    };
    record.heart_rate = HeartRateMetrics {
        avg_resting_hr: Some(62.0),
        avg_hr: Some(72.0),
        max_hr: Some(150.0),
        min_hr: Some(55.0),
        calories_burned_hr: Some(2300.0),
    };
    record
}

fn active_and_sedentary_users() -> Vec<DailyRecord> {
    let mut records = Vec::new();
    for user in ["a1", "a2", "a3"] {
        records.push(midrange_record(user, day(1), 10000.0));
        records.push(midrange_record(user, day(2), 10000.0));
    }
    for user in ["b1", "b2", "b3"] {
        records.push(midrange_record(user, day(1), 2000.0));
        records.push(midrange_record(user, day(2), 2000.0));
    }
    records
}

#[test]
fn test_steps_split_active_from_sedentary() {
    for seed in [0, 1, 42, 1234] {
        let report = segment_daily_records(active_and_sedentary_users(), 2, seed).unwrap();
        let label = |id: &str| report.assignment.label_of(id).unwrap();

        assert_eq!(label("a1"), label("a2"));
        assert_eq!(label("a1"), label("a3"));
        assert_eq!(label("b1"), label("b2"));
        assert_eq!(label("b1"), label("b3"));
        assert_ne!(label("a1"), label("b1"), "seed {seed}");
        assert!(report.inertia().abs() < 1e-9);
    }
}

#[test]
fn test_constant_features_standardize_to_zero() {
    let report = segment_daily_records(active_and_sedentary_users(), 2, 42).unwrap();
    let calories = report
        .features
        .iter()
        .position(|&f| f == Feature::AvgCaloriesBurned)
        .unwrap();

    assert!(report.standardized.iter().all(|row| row[calories] == 0.0));
}

#[test]
fn test_two_features_are_insufficient() {
    let users = vec![
        UserFeatureVector::new("u1")
            .with(Feature::AvgSteps, 8000.0)
            .with(Feature::AvgRestingHr, 60.0),
        UserFeatureVector::new("u2")
            .with(Feature::AvgSteps, 3000.0)
            .with(Feature::AvgRestingHr, 70.0),
    ];

    let result = FeatureSelector::select(&users);

    assert!(matches!(
        result,
        Err(ComputeError::InsufficientFeatures {
            available: 2,
            required: 3
        })
    ));
}

#[test]
fn test_more_clusters_than_users() {
    let records: Vec<DailyRecord> = (1..=5)
        .map(|i| midrange_record(&format!("u{i}"), day(1), 1000.0 * i as f64))
        .collect();

    let result = segment_daily_records(records, 10, 42);

    assert!(matches!(
        result,
        Err(ComputeError::InvalidClusterCount {
            requested: 10,
            users: 5
        })
    ));
}

#[test]
fn test_zero_clusters_rejected() {
    let result = segment_daily_records(active_and_sedentary_users(), 0, 42);
    assert!(matches!(
        result,
        Err(ComputeError::InvalidClusterCount { requested: 0, .. })
    ));
}

#[test]
fn test_zero_time_in_bed_gives_zero_efficiency() {
    let mut record = midrange_record("u1", day(1), 5000.0);
    record.sleep.time_in_bed_minutes = Some(0.0);

    let derived = FeatureDeriver::derive(record);

    assert_eq!(derived.derived.sleep_efficiency, Some(0.0));
}

#[test]
fn test_single_day_user_matches_record() {
    let records = vec![midrange_record("solo", day(3), 7321.0)];
    let tables = synheart_cohort::features_only(records);
    let user = &tables.users[0];
    let daily = &tables.daily[0];

    assert_eq!(user.days, 1);
    assert_eq!(user.avg_steps, daily.activity.steps);
    assert_eq!(user.avg_time_in_bed, daily.sleep.time_in_bed_minutes);
    assert_eq!(user.avg_sleep_efficiency, daily.derived.sleep_efficiency);
    assert_eq!(user.avg_lifestyle_score, daily.derived.lifestyle_score);
}

fn sample_tables() -> SourceTables {
    SampleGenerator::new(SampleConfig {
        n_users: 12,
        n_days: 10,
        ..Default::default()
    })
    .generate()
}

#[test]
fn test_sample_data_end_to_end() {
    let report = SegmentationPipeline::new(KMeansConfig::new(3))
        .run_from_sources(sample_tables())
        .unwrap();

    assert_eq!(report.users.len(), 12);
    assert_eq!(report.daily.len(), 120);
    assert_eq!(report.features, Feature::CLUSTERING.to_vec());

    // Every label in range and every cluster used
    assert!(report.users.iter().all(|u| u.cluster < 3));
    assert_eq!(report.profiles.len(), 3);
    assert_eq!(report.profiles.iter().map(|p| p.n_users).sum::<usize>(), 12);
    assert!(report.assignment.cluster_sizes().iter().all(|&n| n > 0));

    for record in &report.daily {
        let efficiency = record.derived.sleep_efficiency.unwrap();
        assert!((0.0..=1.0).contains(&efficiency));
    }

    // Winning restart has the lowest inertia
    let best = report.partition.inertia;
    assert!(report
        .partition
        .restart_inertias
        .iter()
        .all(|&inertia| best <= inertia));
}

#[test]
fn test_standardized_columns_have_zero_mean_unit_std() {
    let report = SegmentationPipeline::default()
        .run_from_sources(sample_tables())
        .unwrap();
    let n = report.standardized.len() as f64;

    for column in 0..report.features.len() {
        let values: Vec<f64> = report.standardized.iter().map(|row| row[column]).collect();
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

        assert!(mean.abs() < 1e-9);
        assert!((std - 1.0).abs() < 1e-9 || std == 0.0);
    }
}

#[test]
fn test_same_seed_same_segmentation() {
    let config = KMeansConfig::new(4).with_seed(99);
    let first = SegmentationPipeline::new(config.clone())
        .run_from_sources(sample_tables())
        .unwrap();
    let second = SegmentationPipeline::new(config)
        .run_from_sources(sample_tables())
        .unwrap();

    assert_eq!(first.assignment, second.assignment);
    assert_eq!(first.centroids(), second.centroids());
}

#[test]
fn test_fitted_scaler_and_centroids_apply_to_new_data() {
    let report = SegmentationPipeline::default()
        .run_from_sources(sample_tables())
        .unwrap();
    let scaler = &report.scaler;
    let restored = StandardScaler::from_json(&scaler.to_json().unwrap()).unwrap();
    assert_eq!(restored.features, report.features);

    // Re-scaling the raw user rows reproduces the fitted matrix and labels
    let raw: Vec<Vec<f64>> = report
        .users
        .iter()
        .map(|u| {
            report
                .features
                .iter()
                .map(|&f| u.features.get(f).unwrap())
                .collect()
        })
        .collect();
    let rescaled = scaler.transform(&raw).unwrap();

    for (user, row) in report.users.iter().zip(&rescaled) {
        assert_eq!(report.partition.predict(row), user.cluster);
    }
}

#[test]
fn test_kmeans_directly_on_matrix() {
    let data = vec![
        vec![0.0, 0.0],
        vec![0.1, 0.0],
        vec![5.0, 5.0],
        vec![5.1, 5.0],
    ];
    let partition = KMeans::new(KMeansConfig::new(2)).fit(&data).unwrap();

    assert_eq!(partition.labels[0], partition.labels[1]);
    assert_eq!(partition.labels[2], partition.labels[3]);
    assert_ne!(partition.labels[0], partition.labels[2]);
}

#[test]
fn test_csv_directory_round_trip_and_report() {
    let base = std::env::temp_dir().join(format!("synheart-cohort-it-{}", std::process::id()));
    let data_dir = base.join("data");
    let output_dir = base.join("reports");

    sample_tables().write_dir(&data_dir).unwrap();
    let loaded = SourceTables::load_dir(&data_dir).unwrap();
    assert_eq!(loaded, sample_tables());

    let report = SegmentationPipeline::default()
        .run_from_sources(loaded)
        .unwrap();
    let summary = ReportEncoder::new()
        .write_report_dir(&report, &output_dir)
        .unwrap();

    assert_eq!(summary.clusters.len(), 12);
    assert!(output_dir.join(SUMMARY_FILE).exists());
    let user_csv = std::fs::read_to_string(output_dir.join(USER_CLUSTERS_FILE)).unwrap();
    assert_eq!(user_csv.lines().count(), 13);

    std::fs::remove_dir_all(&base).unwrap();
}
