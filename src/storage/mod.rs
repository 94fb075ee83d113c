//! Record store: users, enrollments and course schedules loaded from JSON files.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::models::{EnrollmentRecord, ScheduleRecord, User};
use crate::status::StatusService;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed records in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable snapshot of everything a run needs.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub users: Vec<User>,
    pub enrollments: IndexMap<String, Vec<EnrollmentRecord>>,
    pub schedules: Vec<ScheduleRecord>,
}

impl Dataset {
    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.user_id == user_id)
    }

    /// Enrollments for `user_id`; empty when the user has none on file.
    pub fn enrollments_for(&self, user_id: &str) -> &[EnrollmentRecord] {
        self.enrollments
            .get(user_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn total_enrollments(&self) -> usize {
        self.enrollments.values().map(Vec::len).sum()
    }

    pub fn status_service(&self) -> StatusService {
        StatusService::new(self.schedules.iter().cloned())
    }
}

/// Anything that can produce a full [`Dataset`] before a run starts.
pub trait RecordStore: Send + Sync {
    fn load(&self) -> Result<Dataset, StoreError>;
}

/// On-disk layout of `course_enrollments.json`.
#[derive(Debug, Deserialize)]
struct UserEnrollments {
    user_id: String,
    #[serde(default)]
    enrollments: Vec<EnrollmentRecord>,
}

/// Reads the three JSON record files from disk.
#[derive(Debug, Clone)]
pub struct JsonRecordStore {
    users_path: PathBuf,
    enrollments_path: PathBuf,
    schedules_path: PathBuf,
}

impl JsonRecordStore {
    pub fn new(
        users_path: impl Into<PathBuf>,
        enrollments_path: impl Into<PathBuf>,
        schedules_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            users_path: users_path.into(),
            enrollments_path: enrollments_path.into(),
            schedules_path: schedules_path.into(),
        }
    }

    /// Standard file names inside one data directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(
            dir.join("users.json"),
            dir.join("course_enrollments.json"),
            dir.join("course_schedules.json"),
        )
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl RecordStore for JsonRecordStore {
    fn load(&self) -> Result<Dataset, StoreError> {
        let users: Vec<User> = read_json(&self.users_path)?;
        info!(count = users.len(), "Loaded users");

        let schedules: Vec<ScheduleRecord> = read_json(&self.schedules_path)?;
        info!(count = schedules.len(), "Loaded course schedules");

        let rows: Vec<UserEnrollments> = read_json(&self.enrollments_path)?;
        let mut enrollments: IndexMap<String, Vec<EnrollmentRecord>> = IndexMap::new();
        for row in rows {
            // a user listed twice keeps the later list
            enrollments.insert(row.user_id, row.enrollments);
        }
        info!(users = enrollments.len(), "Loaded enrollments");

        Ok(Dataset {
            users,
            enrollments,
            schedules,
        })
    }
}
