//! Source tables
//!
//! Activity, sleep and heart-rate tables as read from CSV. Loading is
//! header-driven: unknown columns are ignored and absent metric columns load
//! as missing values. `user_id` and `date` (YYYY-MM-DD) are required.

use crate::error::ComputeError;
use crate::types::{ActivityMetrics, HeartRateMetrics, MetricGroup, SleepMetrics};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Activity table file name inside a data directory
pub const ACTIVITY_FILE: &str = "activity.csv";

/// Sleep table file name inside a data directory
pub const SLEEP_FILE: &str = "sleep.csv";

/// Heart-rate table file name inside a data directory
pub const HEART_RATE_FILE: &str = "heart_rate.csv";

/// Key columns every source row must carry
const KEY_COLUMNS: [&str; 2] = ["user_id", "date"];

/// One row of a source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow<M> {
    pub user_id: String,
    pub date: NaiveDate,
    pub metrics: M,
}

impl<M> SourceRow<M> {
    pub fn new(user_id: impl Into<String>, date: NaiveDate, metrics: M) -> Self {
        Self {
            user_id: user_id.into(),
            date,
            metrics,
        }
    }
}

#[derive(Deserialize)]
struct RowKey {
    user_id: String,
    date: NaiveDate,
}

/// A named table of rows sharing one metric group
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable<M> {
    pub name: String,
    pub rows: Vec<SourceRow<M>>,
}

impl<M: MetricGroup + DeserializeOwned> SourceTable<M> {
    pub fn new(name: impl Into<String>, rows: Vec<SourceRow<M>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Parse a table from CSV text
    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self, ComputeError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();

        for column in KEY_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(ComputeError::MissingField(format!("{name}.{column}")));
            }
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let key: RowKey = record.deserialize(Some(&headers))?;
            let metrics: M = record.deserialize(Some(&headers))?;
            rows.push(SourceRow::new(key.user_id, key.date, metrics));
        }

        info!(table = name, rows = rows.len(), "loaded source table");
        Ok(Self::new(name, rows))
    }

    /// Read a table from a CSV file
    pub fn from_path(name: &str, path: &Path) -> Result<Self, ComputeError> {
        let file = File::open(path)?;
        Self::from_reader(name, file)
    }

    /// Write the table as CSV with every metric column
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ComputeError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(KEY_COLUMNS.iter().chain(M::COLUMNS.iter()))?;

        for row in &self.rows {
            let mut fields = vec![row.user_id.clone(), row.date.format("%Y-%m-%d").to_string()];
            fields.extend(
                row.metrics
                    .values()
                    .into_iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
            );
            wtr.write_record(&fields)?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Write the table to a CSV file
    pub fn write_path(&self, path: &Path) -> Result<(), ComputeError> {
        let file = File::create(path)?;
        self.write_csv(file)
    }
}

/// The three source tables of a data directory
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTables {
    pub activity: SourceTable<ActivityMetrics>,
    pub sleep: SourceTable<SleepMetrics>,
    pub heart_rate: SourceTable<HeartRateMetrics>,
}

impl SourceTables {
    /// Load `activity.csv`, `sleep.csv` and `heart_rate.csv` from a directory
    pub fn load_dir(dir: &Path) -> Result<Self, ComputeError> {
        Ok(Self {
            activity: SourceTable::from_path("activity", &dir.join(ACTIVITY_FILE))?,
            sleep: SourceTable::from_path("sleep", &dir.join(SLEEP_FILE))?,
            heart_rate: SourceTable::from_path("heart_rate", &dir.join(HEART_RATE_FILE))?,
        })
    }

    /// Write all three tables into a directory, creating it if needed
    pub fn write_dir(&self, dir: &Path) -> Result<(), ComputeError> {
        std::fs::create_dir_all(dir)?;
        self.activity.write_path(&dir.join(ACTIVITY_FILE))?;
        self.sleep.write_path(&dir.join(SLEEP_FILE))?;
        self.heart_rate.write_path(&dir.join(HEART_RATE_FILE))?;
        Ok(())
    }
}
