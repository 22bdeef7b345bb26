//! Cluster profile summarization
//!
//! Profiles are computed from the unstandardized user table so that means are
//! reported in original units (steps, minutes, bpm).

use crate::types::{ClusterAssignment, ClusterProfile, Feature, FeatureMean, UserFeatureVector};
use std::collections::BTreeMap;

/// Summarizer producing one profile per cluster label
pub struct ProfileSummarizer;

impl ProfileSummarizer {
    /// Summarize each label present in the assignment, ordered by label.
    ///
    /// Users are joined to labels by user id; users without a label are
    /// skipped. A feature with no values among a cluster's members is omitted
    /// from that cluster's profile.
    pub fn summarize(
        users: &[UserFeatureVector],
        assignment: &ClusterAssignment,
        features: &[Feature],
    ) -> Vec<ClusterProfile> {
        let labels: BTreeMap<&str, usize> = assignment.iter().collect();

        let mut members: BTreeMap<usize, Vec<&UserFeatureVector>> = BTreeMap::new();
        for user in users {
            if let Some(&label) = labels.get(user.user_id.as_str()) {
                members.entry(label).or_default().push(user);
            }
        }

        members
            .into_iter()
            .map(|(cluster, members)| ClusterProfile {
                cluster,
                n_users: members.len(),
                feature_means: features
                    .iter()
                    .filter_map(|&feature| {
                        member_mean(&members, feature).map(|mean| FeatureMean { feature, mean })
                    })
                    .collect(),
            })
            .collect()
    }
}

fn member_mean(members: &[&UserFeatureVector], feature: Feature) -> Option<f64> {
    let values: Vec<f64> = members.iter().filter_map(|u| u.get(feature)).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_users() -> Vec<UserFeatureVector> {
        vec![
            UserFeatureVector::new("a")
                .with(Feature::AvgSteps, 10000.0)
                .with(Feature::AvgRestingHr, 58.0),
            UserFeatureVector::new("b")
                .with(Feature::AvgSteps, 2000.0)
                .with(Feature::AvgRestingHr, 72.0),
            UserFeatureVector::new("c")
                .with(Feature::AvgSteps, 12000.0)
                .with(Feature::AvgRestingHr, 60.0),
        ]
    }

    fn make_assignment() -> ClusterAssignment {
        ClusterAssignment {
            n_clusters: 2,
            user_ids: vec!["a".into(), "b".into(), "c".into()],
            labels: vec![1, 0, 1],
        }
    }

    #[test]
    fn test_profiles_sorted_with_counts() {
        let profiles = ProfileSummarizer::summarize(
            &make_users(),
            &make_assignment(),
            &[Feature::AvgSteps, Feature::AvgRestingHr],
        );

        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].cluster, 0);
        assert_eq!(profiles[0].n_users, 1);
        assert_eq!(profiles[1].cluster, 1);
        assert_eq!(profiles[1].n_users, 2);
        assert_eq!(
            profiles.iter().map(|p| p.n_users).sum::<usize>(),
            make_users().len()
        );
    }

    #[test]
    fn test_means_in_original_units() {
        let profiles = ProfileSummarizer::summarize(
            &make_users(),
            &make_assignment(),
            &[Feature::AvgSteps, Feature::AvgRestingHr],
        );

        assert_eq!(profiles[1].mean(Feature::AvgSteps), Some(11000.0));
        assert_eq!(profiles[1].mean(Feature::AvgRestingHr), Some(59.0));
        assert_eq!(profiles[0].mean(Feature::AvgSteps), Some(2000.0));
    }

    #[test]
    fn test_absent_feature_is_omitted() {
        let profiles = ProfileSummarizer::summarize(
            &make_users(),
            &make_assignment(),
            &[Feature::AvgSteps, Feature::AvgLifestyleScore],
        );

        assert_eq!(profiles[0].feature_means.len(), 1);
        assert_eq!(profiles[0].mean(Feature::AvgLifestyleScore), None);
    }

    #[test]
    fn test_feature_order_follows_selection() {
        let profiles = ProfileSummarizer::summarize(
            &make_users(),
            &make_assignment(),
            &[Feature::AvgRestingHr, Feature::AvgSteps],
        );
        let order: Vec<Feature> = profiles[0].feature_means.iter().map(|m| m.feature).collect();

        assert_eq!(order, vec![Feature::AvgRestingHr, Feature::AvgSteps]);
    }
}
