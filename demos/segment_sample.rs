//! Segment generated sample data and print the cluster profiles

use synheart_cohort::sample::SampleGenerator;
use synheart_cohort::{KMeansConfig, SegmentationPipeline};

fn main() {
    let tables = SampleGenerator::default().generate();

    match SegmentationPipeline::new(KMeansConfig::new(3)).run_from_sources(tables) {
        Ok(report) => {
            for profile in &report.profiles {
                println!("cluster {}: {} users", profile.cluster, profile.n_users);
                for mean in &profile.feature_means {
                    println!("  {}: {:.2}", mean.feature, mean.mean);
                }
            }
        }
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
