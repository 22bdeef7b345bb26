//! Synthetic sample data
//!
//! Seeded generator for the three source tables. Each user gets stable base
//! levels (steps, calories, sleep hours, resting HR) and every day is drawn
//! around them, so the population contains genuinely different lifestyles.

use crate::sources::{SourceRow, SourceTable, SourceTables};
use crate::types::{ActivityMetrics, HeartRateMetrics, SleepMetrics};
use chrono::NaiveDate;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Shape of the generated population
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleConfig {
    pub n_users: usize,
    pub n_days: usize,
    pub start_date: NaiveDate,
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            n_users: 33,
            n_days: 30,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            seed: 42,
        }
    }
}

/// Generator for sample source tables
pub struct SampleGenerator {
    config: SampleConfig,
}

impl Default for SampleGenerator {
    fn default() -> Self {
        Self::new(SampleConfig::default())
    }
}

impl SampleGenerator {
    pub fn new(config: SampleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SampleConfig {
        &self.config
    }

    /// Generate all three tables; the same config always yields the same data
    pub fn generate(&self) -> SourceTables {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let users = self.user_ids();
        let dates: Vec<NaiveDate> = self
            .config
            .start_date
            .iter_days()
            .take(self.config.n_days)
            .collect();

        let tables = SourceTables {
            activity: SourceTable::new("activity", activity_rows(&mut rng, &users, &dates)),
            sleep: SourceTable::new("sleep", sleep_rows(&mut rng, &users, &dates)),
            heart_rate: SourceTable::new("heart_rate", heart_rate_rows(&mut rng, &users, &dates)),
        };

        info!(
            users = users.len(),
            days = dates.len(),
            seed = self.config.seed,
            "generated sample tables"
        );
        tables
    }

    fn user_ids(&self) -> Vec<String> {
        (1..=self.config.n_users)
            .map(|i| format!("user_{i:02}"))
            .collect()
    }
}

fn activity_rows<R: Rng>(
    rng: &mut R,
    users: &[String],
    dates: &[NaiveDate],
) -> Vec<SourceRow<ActivityMetrics>> {
    let mut rows = Vec::with_capacity(users.len() * dates.len());
    for user in users {
        let base_steps = rng.random_range(5000.0..12000.0);
        let base_calories = rng.random_range(1800.0..2600.0);

        for &date in dates {
            let metrics = ActivityMetrics {
                steps: Some(whole(normal(rng, base_steps, base_steps * 0.3), 0.0)),
                calories_burned: Some(whole(normal(rng, base_calories, base_calories * 0.2), 0.0)),
                sedentary_minutes: Some(whole(normal(rng, 600.0, 120.0), 0.0)),
                lightly_active_minutes: Some(whole(normal(rng, 200.0, 50.0), 0.0)),
                moderately_active_minutes: Some(whole(normal(rng, 30.0, 15.0), 0.0)),
                very_active_minutes: Some(whole(normal(rng, 20.0, 10.0), 0.0)),
            };
            rows.push(SourceRow::new(user.clone(), date, metrics));
        }
    }
    rows
}

fn sleep_rows<R: Rng>(
    rng: &mut R,
    users: &[String],
    dates: &[NaiveDate],
) -> Vec<SourceRow<SleepMetrics>> {
    let mut rows = Vec::with_capacity(users.len() * dates.len());
    for user in users {
        let base_sleep_hours = rng.random_range(6.0..9.0);

        for &date in dates {
            let duration = whole(normal(rng, base_sleep_hours * 60.0, 60.0), 300.0);
            let time_in_bed = duration + rng.random_range(10..60) as f64;
            let efficiency: f64 = rng.random_range(0.75..0.95);
            let deep = whole(normal(rng, 90.0, 30.0), 0.0);
            let rem = whole(normal(rng, 120.0, 40.0), 0.0);

            let metrics = SleepMetrics {
                time_in_bed_minutes: Some(time_in_bed),
                sleep_duration_minutes: Some(duration),
                reported_efficiency: Some((efficiency * 1000.0).round() / 1000.0),
                deep_sleep_minutes: Some(deep),
                rem_sleep_minutes: Some(rem),
                light_sleep_minutes: Some((duration - deep - rem).max(0.0)),
            };
            rows.push(SourceRow::new(user.clone(), date, metrics));
        }
    }
    rows
}

fn heart_rate_rows<R: Rng>(
    rng: &mut R,
    users: &[String],
    dates: &[NaiveDate],
) -> Vec<SourceRow<HeartRateMetrics>> {
    let mut rows = Vec::with_capacity(users.len() * dates.len());
    for user in users {
        let base_resting_hr = rng.random_range(55.0..75.0);

        for &date in dates {
            let metrics = HeartRateMetrics {
                avg_resting_hr: Some(whole(normal(rng, base_resting_hr, 5.0), 40.0)),
                avg_hr: Some(whole(normal(rng, base_resting_hr + 10.0, 8.0), 50.0)),
                max_hr: Some(whole(normal(rng, base_resting_hr + 40.0, 15.0), 70.0)),
                min_hr: Some(whole(normal(rng, base_resting_hr - 5.0, 5.0), 40.0)),
                calories_burned_hr: Some(whole(normal(rng, 2200.0, 400.0), 0.0)),
            };
            rows.push(SourceRow::new(user.clone(), date, metrics));
        }
    }
    rows
}

/// One normal draw; a degenerate spread yields the mean
fn normal<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    match Normal::new(mean, std_dev) {
        Ok(dist) => dist.sample(rng),
        Err(_) => mean,
    }
}

/// Truncate to a whole number, floored at `floor`
fn whole(value: f64, floor: f64) -> f64 {
    value.trunc().max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SampleGenerator {
        SampleGenerator::new(SampleConfig {
            n_users: 4,
            n_days: 5,
            ..Default::default()
        })
    }

    #[test]
    fn test_default_shape() {
        let tables = SampleGenerator::default().generate();

        assert_eq!(tables.activity.rows.len(), 33 * 30);
        assert_eq!(tables.sleep.rows.len(), 33 * 30);
        assert_eq!(tables.heart_rate.rows.len(), 33 * 30);
        assert_eq!(tables.activity.rows[0].user_id, "user_01");
        assert_eq!(tables.activity.rows.last().unwrap().user_id, "user_33");
        assert_eq!(
            tables.sleep.rows[29].date,
            NaiveDate::from_ymd_opt(2024, 1, 30).unwrap()
        );
    }

    #[test]
    fn test_same_seed_same_data() {
        assert_eq!(small().generate(), small().generate());
    }

    #[test]
    fn test_different_seed_different_data() {
        let other = SampleGenerator::new(SampleConfig {
            seed: 7,
            ..small().config().clone()
        });
        assert_ne!(small().generate().activity, other.generate().activity);
    }

    #[test]
    fn test_values_respect_floors() {
        let tables = SampleGenerator::default().generate();

        for row in &tables.sleep.rows {
            let sleep = &row.metrics;
            let duration = sleep.sleep_duration_minutes.unwrap();
            let in_bed = sleep.time_in_bed_minutes.unwrap();
            assert!(duration >= 300.0);
            assert!(in_bed - duration >= 10.0 && in_bed - duration < 60.0);
            assert!(sleep.light_sleep_minutes.unwrap() >= 0.0);
            let efficiency = sleep.reported_efficiency.unwrap();
            assert!((0.75..=0.95).contains(&efficiency));
        }
        for row in &tables.heart_rate.rows {
            assert!(row.metrics.avg_resting_hr.unwrap() >= 40.0);
            assert!(row.metrics.max_hr.unwrap() >= 70.0);
            let calories = row.metrics.calories_burned_hr.unwrap();
            assert!(calories >= 0.0);
            assert_eq!(calories, calories.trunc());
        }
        for row in &tables.activity.rows {
            let steps = row.metrics.steps.unwrap();
            assert!(steps >= 0.0);
            assert_eq!(steps, steps.trunc());
        }
    }

    #[test]
    fn test_whole() {
        assert_eq!(whole(12.9, 0.0), 12.0);
        assert_eq!(whole(-3.2, 0.0), 0.0);
        assert_eq!(whole(250.0, 300.0), 300.0);
    }
}
