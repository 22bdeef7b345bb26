//! Cohort CLI - Command-line interface for Synheart Cohort
//!
//! Commands:
//! - segment: Run the full pipeline on a data directory and write a report
//! - features: Print daily and user feature tables as JSON
//! - sample: Generate sample source tables
//! - doctor: Diagnose configuration and input files

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use synheart_cohort::config::{Config, ConfigError};
use synheart_cohort::pipeline::{features_only, SegmentationPipeline, SegmentationReport};
use synheart_cohort::preprocess::Preprocessor;
use synheart_cohort::report::ReportEncoder;
use synheart_cohort::sample::{SampleConfig, SampleGenerator};
use synheart_cohort::sources::{
    SourceTable, SourceTables, ACTIVITY_FILE, HEART_RATE_FILE, SLEEP_FILE,
};
use synheart_cohort::types::{ActivityMetrics, HeartRateMetrics, MetricGroup, SleepMetrics};
use synheart_cohort::{ComputeError, COHORT_VERSION, PRODUCER_NAME};

/// Cohort - Lifestyle segmentation for wearable daily records
#[derive(Parser)]
#[command(name = "cohort")]
#[command(author = "Synheart AI Inc")]
#[command(version = COHORT_VERSION)]
#[command(about = "Segment wearable users into lifestyle clusters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the report directory
    Segment {
        #[command(flatten)]
        run: RunArgs,

        /// Number of clusters
        #[arg(short = 'k', long)]
        n_clusters: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Number of k-means restarts
        #[arg(long)]
        n_init: Option<usize>,

        /// Iteration cap per restart
        #[arg(long)]
        max_iter: Option<usize>,

        /// Report output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print daily and user feature tables as JSON
    Features {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Generate sample source tables
    Sample {
        /// Output directory
        #[arg(short, long, default_value = "data")]
        output_dir: PathBuf,

        /// Number of users
        #[arg(long, default_value = "33")]
        users: usize,

        /// Number of days per user
        #[arg(long, default_value = "30")]
        days: usize,

        /// First day (YYYY-MM-DD)
        #[arg(long, default_value = "2024-01-01")]
        start_date: NaiveDate,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Diagnose configuration and input files
    Doctor {
        #[command(flatten)]
        run: RunArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Config file and data directory shared by data-reading commands
#[derive(clap::Args)]
struct RunArgs {
    /// Configuration file (defaults apply if it does not exist)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Directory with activity.csv, sleep.csv and heart_rate.csv
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

impl RunArgs {
    fn load(&self) -> Result<Config, CohortCliError> {
        let mut config = Config::load(&self.config)?;
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CohortCliError> {
    match cli.command {
        Commands::Segment {
            run,
            n_clusters,
            seed,
            n_init,
            max_iter,
            output_dir,
            json,
        } => {
            let mut config = run.load()?;
            if let Some(k) = n_clusters {
                config.n_clusters = k;
            }
            if let Some(seed) = seed {
                config.random_state = seed;
            }
            if let Some(n_init) = n_init {
                config.n_init = n_init;
            }
            if let Some(max_iter) = max_iter {
                config.max_iter = max_iter;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            cmd_segment(&config, json)
        }

        Commands::Features { run } => cmd_features(&run.load()?),

        Commands::Sample {
            output_dir,
            users,
            days,
            start_date,
            seed,
        } => cmd_sample(
            &output_dir,
            SampleConfig {
                n_users: users,
                n_days: days,
                start_date,
                seed,
            },
        ),

        Commands::Doctor { run, json } => cmd_doctor(&run, json),
    }
}

fn cmd_segment(config: &Config, json: bool) -> Result<(), CohortCliError> {
    let tables = SourceTables::load_dir(&config.data_dir)?;
    let report = SegmentationPipeline::new(config.clustering()).run_from_sources(tables)?;

    let summary = ReportEncoder::new().write_report_dir(&report, &config.output_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&report, &config.output_dir);
    }
    Ok(())
}

fn print_summary(report: &SegmentationReport, output_dir: &Path) {
    let features: Vec<&str> = report.features.iter().map(|f| f.as_str()).collect();

    println!("Cohort Segmentation");
    println!("===================");
    println!("Users:    {}", report.users.len());
    println!("Clusters: {}", report.config.n_clusters);
    println!("Features: {}", features.join(", "));
    println!("Inertia:  {:.4}", report.inertia());

    for profile in &report.profiles {
        println!("\nCluster {} ({} users)", profile.cluster, profile.n_users);
        for mean in &profile.feature_means {
            println!("  {:<28} {:>10.2}", mean.feature.as_str(), mean.mean);
        }
    }

    println!("\nReport written to {}", output_dir.display());
}

fn cmd_features(config: &Config) -> Result<(), CohortCliError> {
    let tables = SourceTables::load_dir(&config.data_dir)?;
    let (records, _) = Preprocessor::merge(tables);
    let features = features_only(records);

    println!("{}", serde_json::to_string_pretty(&features)?);
    Ok(())
}

fn cmd_sample(output_dir: &Path, config: SampleConfig) -> Result<(), CohortCliError> {
    let tables = SampleGenerator::new(config).generate();
    tables.write_dir(output_dir)?;

    println!(
        "Wrote {} activity, {} sleep, {} heart rate rows to {}",
        tables.activity.rows.len(),
        tables.sleep.rows.len(),
        tables.heart_rate.rows.len(),
        output_dir.display()
    );
    Ok(())
}

fn cmd_doctor(run: &RunArgs, json: bool) -> Result<(), CohortCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "cohort_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Cohort version {}", COHORT_VERSION),
    });

    // Config file
    let config = if run.config.exists() {
        match Config::load(&run.config) {
            Ok(config) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config valid (n_clusters = {}, random_state = {})",
                        config.n_clusters, config.random_state
                    ),
                });
                config
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {}", e),
                });
                Config::default()
            }
        }
    } else {
        checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Config file does not exist, using defaults".to_string(),
        });
        Config::default()
    };
    let data_dir = run.data_dir.clone().unwrap_or(config.data_dir);

    // Source tables
    checks.push(check_table::<ActivityMetrics>(&data_dir, "activity", ACTIVITY_FILE));
    checks.push(check_table::<SleepMetrics>(&data_dir, "sleep", SLEEP_FILE));
    checks.push(check_table::<HeartRateMetrics>(&data_dir, "heart_rate", HEART_RATE_FILE));

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: COHORT_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Cohort Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CohortCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_table<M>(data_dir: &Path, name: &str, file: &str) -> DoctorCheck
where
    M: MetricGroup + serde::de::DeserializeOwned,
{
    let path = data_dir.join(file);
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: format!("{} does not exist", path.display()),
        };
    }

    match SourceTable::<M>::from_path(name, &path) {
        Ok(table) if table.rows.is_empty() => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} has no rows", path.display()),
        },
        Ok(table) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: format!("{} rows", table.rows.len()),
        },
        Err(e) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read {}: {}", path.display(), e),
        },
    }
}

// Error types

#[derive(Debug)]
enum CohortCliError {
    Io(io::Error),
    Compute(ComputeError),
    Config(ConfigError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for CohortCliError {
    fn from(e: io::Error) -> Self {
        CohortCliError::Io(e)
    }
}

impl From<ComputeError> for CohortCliError {
    fn from(e: ComputeError) -> Self {
        CohortCliError::Compute(e)
    }
}

impl From<ConfigError> for CohortCliError {
    fn from(e: ConfigError) -> Self {
        CohortCliError::Config(e)
    }
}

impl From<serde_json::Error> for CohortCliError {
    fn from(e: serde_json::Error) -> Self {
        CohortCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CohortCliError> for CliError {
    fn from(e: CohortCliError) -> Self {
        match e {
            CohortCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CohortCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InsufficientFeatures { .. } => (
                        "INSUFFICIENT_FEATURES",
                        "Provide more metric columns for every user",
                    ),
                    ComputeError::InvalidClusterCount { .. } => (
                        "INVALID_CLUSTER_COUNT",
                        "Use a cluster count between 1 and the number of users",
                    ),
                    ComputeError::Csv(_) | ComputeError::MissingField(_) => (
                        "INPUT_ERROR",
                        "Run 'cohort doctor' to check the input files",
                    ),
                    _ => ("COMPUTE_ERROR", "Check input data"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CohortCliError::Config(e) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the configuration file syntax".to_string()),
            },
            CohortCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            CohortCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
