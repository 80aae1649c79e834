use chrono::{DateTime, Utc};
use pawtrack_triage::{ConditionTag, Coordinates, TriageResult};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Errors raised by the report store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Report store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Report store is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A persisted stray animal report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Photo as submitted (base64 or data URI)
    pub image_data: String,
    pub gps_coordinates: Coordinates,
    #[serde(deserialize_with = "deserialize_stored_tags")]
    pub triage_tags: Vec<ConditionTag>,
    pub priority_score: u8,
    pub readable_address: String,
}

/// Read stored tag labels, skipping any outside the vocabulary.
///
/// Older files hold the vision model's raw species string (`"dog"`,
/// `"Rabbit"`); those reports already carry the sentinel tag.
fn deserialize_stored_tags<'de, D>(deserializer: D) -> Result<Vec<ConditionTag>, D::Error>
where
    D: Deserializer<'de>,
{
    let labels = Vec::<String>::deserialize(deserializer)?;
    Ok(labels
        .iter()
        .filter_map(|label| {
            let tag = ConditionTag::from_label(label);
            if tag.is_none() {
                debug!(label = %label, "Skipping unknown stored tag");
            }
            tag
        })
        .collect())
}

/// Report contents before an identifier and timestamp are assigned
#[derive(Debug, Clone)]
pub struct NewReport {
    pub image_data: String,
    pub gps_coordinates: Coordinates,
    pub triage: TriageResult,
}

/// Flat-file report store: one pretty-printed JSON array on disk.
///
/// Every operation reads the whole file; writers are serialized by an
/// async mutex and replace the file atomically.
pub struct FileReportStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileReportStore {
    /// Open the store, creating the directory and an empty file if needed
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            lock: Mutex::new(()),
        };
        store.initialize().await?;

        info!(path = %store.path.display(), "Report store ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        match tokio::fs::metadata(&self.path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => self.write_all(&[]).await,
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Persist a new report with a generated identifier and timestamp
    #[instrument(skip(self, report), fields(priority = report.triage.priority_score))]
    pub async fn create(&self, report: NewReport) -> Result<Report, StoreError> {
        let _guard = self.lock.lock().await;

        let mut reports = self.read_all().await?;
        let now = Utc::now();
        let created = Report {
            id: generate_report_id(now),
            timestamp: now,
            image_data: report.image_data,
            gps_coordinates: report.gps_coordinates,
            triage_tags: report.triage.triage_tags,
            priority_score: report.triage.priority_score,
            readable_address: report.triage.readable_address,
        };

        reports.push(created.clone());
        self.write_all(&reports).await?;

        metrics::counter!("reports.created").increment(1);
        debug!(report_id = %created.id, "Report saved");

        Ok(created)
    }

    /// All reports in insertion order
    pub async fn list(&self) -> Result<Vec<Report>, StoreError> {
        self.read_all().await
    }

    /// All reports, highest priority first; ties keep insertion order
    pub async fn list_by_priority(&self) -> Result<Vec<Report>, StoreError> {
        let mut reports = self.read_all().await?;
        reports.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
        Ok(reports)
    }

    /// Delete a report; `false` when no report has this identifier
    #[instrument(skip(self))]
    pub async fn delete(&self, report_id: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;

        let mut reports = self.read_all().await?;
        let initial_len = reports.len();
        reports.retain(|r| r.id != report_id);

        if reports.len() == initial_len {
            return Ok(false);
        }

        self.write_all(&reports).await?;
        metrics::counter!("reports.deleted").increment(1);
        debug!(report_id, "Report deleted");

        Ok(true)
    }

    async fn read_all(&self) -> Result<Vec<Report>, StoreError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_slice(&data)?)
    }

    async fn write_all(&self, reports: &[Report]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(reports)?;
        let tmp_path = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// `report-{unix millis}-{9 base36 chars}`
fn generate_report_id(now: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();

    format!("report-{}-{}", now.timestamp_millis(), suffix)
}
