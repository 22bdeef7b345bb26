//! Feature selection and standardization
//!
//! Selects the clustering features available in the user table and scales
//! each one to zero mean and unit variance. The fitted parameters are kept on
//! [`StandardScaler`] so the same transform can be reapplied to new data.

use crate::error::ComputeError;
use crate::types::{Feature, UserFeatureVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Minimum number of usable features for clustering
pub const MIN_CLUSTERING_FEATURES: usize = 3;

/// Dense user × feature matrix in original units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    /// Row labels, in user table order
    pub user_ids: Vec<String>,
    /// Column labels
    pub features: Vec<Feature>,
    pub rows: Vec<Vec<f64>>,
}

/// Selector for the clustering feature subset
pub struct FeatureSelector;

impl FeatureSelector {
    /// Clustering features present for every user, in preference order.
    ///
    /// Fails with [`ComputeError::InsufficientFeatures`] when fewer than
    /// [`MIN_CLUSTERING_FEATURES`] remain.
    pub fn available_features(users: &[UserFeatureVector]) -> Result<Vec<Feature>, ComputeError> {
        let mut available = Vec::new();

        for feature in Feature::CLUSTERING {
            let present = users.iter().filter(|u| u.get(feature).is_some()).count();
            if present == 0 {
                continue;
            }
            if present < users.len() {
                warn!(
                    feature = %feature,
                    present,
                    users = users.len(),
                    "feature missing for some users, excluded from clustering"
                );
                continue;
            }
            available.push(feature);
        }

        if available.len() < MIN_CLUSTERING_FEATURES {
            return Err(ComputeError::InsufficientFeatures {
                available: available.len(),
                required: MIN_CLUSTERING_FEATURES,
            });
        }

        Ok(available)
    }

    /// Select the available clustering features into a matrix
    pub fn select(users: &[UserFeatureVector]) -> Result<FeatureMatrix, ComputeError> {
        let features = Self::available_features(users)?;

        let rows = users
            .iter()
            .map(|user| {
                features
                    .iter()
                    .map(|&f| user.get(f).ok_or_else(|| ComputeError::MissingField(f.to_string())))
                    .collect::<Result<Vec<f64>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeatureMatrix {
            user_ids: users.iter().map(|u| u.user_id.clone()).collect(),
            features,
            rows,
        })
    }
}

/// Fitted per-feature standardization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub features: Vec<Feature>,
    /// Column means
    pub means: Vec<f64>,
    /// Column standard deviations (population form, divide by N)
    pub std_devs: Vec<f64>,
}

impl StandardScaler {
    /// Fit means and standard deviations column-wise
    pub fn fit(matrix: &FeatureMatrix) -> Result<Self, ComputeError> {
        let width = matrix.features.len();
        check_widths(&matrix.rows, width)?;

        let n = matrix.rows.len() as f64;
        let mut means = vec![0.0; width];
        let mut std_devs = vec![0.0; width];

        if !matrix.rows.is_empty() {
            for (col, mean) in means.iter_mut().enumerate() {
                *mean = matrix.rows.iter().map(|row| row[col]).sum::<f64>() / n;
            }
            for (col, std_dev) in std_devs.iter_mut().enumerate() {
                let variance = matrix
                    .rows
                    .iter()
                    .map(|row| (row[col] - means[col]).powi(2))
                    .sum::<f64>()
                    / n;
                *std_dev = variance.sqrt();
            }
        }

        for ((feature, &mean), &std_dev) in matrix.features.iter().zip(&means).zip(&std_devs) {
            if is_constant(mean, std_dev) {
                debug!(feature = %feature, mean, "constant feature, standardized to zeros");
            }
        }

        Ok(Self {
            features: matrix.features.clone(),
            means,
            std_devs,
        })
    }

    /// Standardize rows with the fitted parameters
    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ComputeError> {
        check_widths(rows, self.features.len())?;

        Ok(rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.std_devs))
                    .map(|(&x, (&mean, &std_dev))| {
                        if is_constant(mean, std_dev) {
                            0.0
                        } else {
                            (x - mean) / std_dev
                        }
                    })
                    .collect()
            })
            .collect())
    }

    /// Fit on a matrix and return the scaler with the standardized rows
    pub fn fit_transform(matrix: &FeatureMatrix) -> Result<(Self, Vec<Vec<f64>>), ComputeError> {
        let scaler = Self::fit(matrix)?;
        let scaled = scaler.transform(&matrix.rows)?;
        Ok((scaler, scaled))
    }

    /// Map standardized rows back to original units.
    /// Constant columns map back to their mean.
    pub fn inverse_transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ComputeError> {
        check_widths(rows, self.features.len())?;

        Ok(rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.std_devs))
                    .map(|(&z, (&mean, &std_dev))| {
                        if is_constant(mean, std_dev) {
                            mean
                        } else {
                            z * std_dev + mean
                        }
                    })
                    .collect()
            })
            .collect())
    }

    /// Load a fitted scaler from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the fitted scaler to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Treat numerically negligible spread as zero variance
fn is_constant(mean: f64, std_dev: f64) -> bool {
    std_dev <= 10.0 * f64::EPSILON * mean.abs().max(1.0)
}

fn check_widths(rows: &[Vec<f64>], expected: usize) -> Result<(), ComputeError> {
    match rows.iter().find(|row| row.len() != expected) {
        Some(row) => Err(ComputeError::DimensionMismatch {
            expected,
            found: row.len(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_users() -> Vec<UserFeatureVector> {
        let values = [
            (4000.0, 700.0, 1900.0, 0.82, 68.0, 20.0, 0.9),
            (9000.0, 550.0, 2400.0, 0.90, 58.0, 45.0, 1.4),
            (6500.0, 620.0, 2100.0, 0.86, 63.0, 30.0, 1.1),
            (12000.0, 480.0, 2700.0, 0.93, 55.0, 60.0, 1.7),
        ];
        values
            .iter()
            .enumerate()
            .map(|(i, &(steps, sed, cal, eff, rhr, hi, score))| {
                UserFeatureVector::new(format!("user_{i:02}"))
                    .with(Feature::AvgSteps, steps)
                    .with(Feature::AvgSedentaryMinutes, sed)
                    .with(Feature::AvgCaloriesBurned, cal)
                    .with(Feature::AvgSleepEfficiency, eff)
                    .with(Feature::AvgTimeInBed, 470.0)
                    .with(Feature::AvgRestingHr, rhr)
                    .with(Feature::AvgHighIntensityMinutes, hi)
                    .with(Feature::AvgLifestyleScore, score)
            })
            .collect()
    }

    fn column(rows: &[Vec<f64>], col: usize) -> Vec<f64> {
        rows.iter().map(|r| r[col]).collect()
    }

    #[test]
    fn test_select_all_seven_in_order() {
        let matrix = FeatureSelector::select(&make_users()).unwrap();

        assert_eq!(matrix.features, Feature::CLUSTERING.to_vec());
        assert_eq!(matrix.rows.len(), 4);
        assert_eq!(matrix.rows[1][0], 9000.0);
        assert_eq!(matrix.user_ids[3], "user_03");
    }

    #[test]
    fn test_select_preserves_preference_order_with_gaps() {
        let users: Vec<_> = make_users()
            .into_iter()
            .map(|mut u| {
                u.set(Feature::AvgSedentaryMinutes, None);
                u.set(Feature::AvgRestingHr, None);
                u
            })
            .collect();
        let features = FeatureSelector::available_features(&users).unwrap();

        assert_eq!(
            features,
            vec![
                Feature::AvgSteps,
                Feature::AvgCaloriesBurned,
                Feature::AvgSleepEfficiency,
                Feature::AvgHighIntensityMinutes,
                Feature::AvgLifestyleScore,
            ]
        );
    }

    #[test]
    fn test_insufficient_features() {
        let users = vec![
            UserFeatureVector::new("a")
                .with(Feature::AvgSteps, 5000.0)
                .with(Feature::AvgRestingHr, 60.0),
            UserFeatureVector::new("b")
                .with(Feature::AvgSteps, 9000.0)
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
    fn test_partially_present_feature_is_dropped() {
        let mut users = make_users();
        users[2].set(Feature::AvgRestingHr, None);
        let features = FeatureSelector::available_features(&users).unwrap();

        assert!(!features.contains(&Feature::AvgRestingHr));
        assert_eq!(features.len(), 6);
    }

    #[test]
    fn test_standardized_columns_have_zero_mean_unit_std() {
        let matrix = FeatureSelector::select(&make_users()).unwrap();
        let (_, scaled) = StandardScaler::fit_transform(&matrix).unwrap();

        for col in 0..matrix.features.len() {
            let values = column(&scaled, col);
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            assert!(mean.abs() < 1e-9, "column {col} mean {mean}");
            assert!((std - 1.0).abs() < 1e-9, "column {col} std {std}");
        }
    }

    #[test]
    fn test_constant_column_becomes_zeros() {
        let mut users = make_users();
        for user in &mut users {
            user.set(Feature::AvgSleepEfficiency, Some(0.1));
        }
        let matrix = FeatureSelector::select(&users).unwrap();
        let (scaler, scaled) = StandardScaler::fit_transform(&matrix).unwrap();

        let col = matrix
            .features
            .iter()
            .position(|&f| f == Feature::AvgSleepEfficiency)
            .unwrap();
        assert!(column(&scaled, col).iter().all(|&v| v == 0.0));
        assert!(scaler.std_devs[col] < 1e-12);
    }

    #[test]
    fn test_inverse_transform_restores_values() {
        let matrix = FeatureSelector::select(&make_users()).unwrap();
        let (scaler, scaled) = StandardScaler::fit_transform(&matrix).unwrap();
        let restored = scaler.inverse_transform(&scaled).unwrap();

        for (orig, back) in matrix.rows.iter().zip(&restored) {
            for (a, b) in orig.iter().zip(back) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_transform_rejects_wrong_width() {
        let matrix = FeatureSelector::select(&make_users()).unwrap();
        let scaler = StandardScaler::fit(&matrix).unwrap();
        let result = scaler.transform(&[vec![1.0, 2.0]]);

        assert!(matches!(
            result,
            Err(ComputeError::DimensionMismatch {
                expected: 7,
                found: 2
            })
        ));
    }

    #[test]
    fn test_scaler_serialization() {
        let matrix = FeatureSelector::select(&make_users()).unwrap();
        let scaler = StandardScaler::fit(&matrix).unwrap();

        let json = scaler.to_json().unwrap();
        let loaded = StandardScaler::from_json(&json).unwrap();

        assert_eq!(scaler.features, loaded.features);
        let original = scaler.transform(&matrix.rows).unwrap();
        let reloaded = loaded.transform(&matrix.rows).unwrap();
        for (a, b) in original.iter().flatten().zip(reloaded.iter().flatten()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
