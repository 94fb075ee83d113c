use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::jobs::ReminderJob;
use crate::storage::Dataset;

/// Shared handler state: the current data snapshot plus the job behind
/// the manual trigger.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub data: Arc<RwLock<Arc<Dataset>>>,
    pub job: Arc<ReminderJob>,
}

impl AppState {
    pub fn new(config: Config, data: Dataset, job: ReminderJob) -> Self {
        Self {
            config: Arc::new(config),
            data: Arc::new(RwLock::new(Arc::new(data))),
            job: Arc::new(job),
        }
    }

    /// Cheap handle to the current snapshot.
    pub async fn snapshot(&self) -> Arc<Dataset> {
        self.data.read().await.clone()
    }

    pub async fn replace(&self, data: Dataset) {
        *self.data.write().await = Arc::new(data);
    }
}
