use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::db::DatabaseProxy;
use crate::services::passage_provider::PassageProvider;
use crate::services::speech_provider::SpeechProvider;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    db_proxy: Option<Arc<DatabaseProxy>>,
    speech_provider: Arc<SpeechProvider>,
    passage_provider: Arc<PassageProvider>,
}

impl AppState {
    pub fn new(db_proxy: Option<Arc<DatabaseProxy>>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            db_proxy,
            speech_provider: Arc::new(SpeechProvider::from_env()),
            passage_provider: Arc::new(PassageProvider::from_env()),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db_proxy(&self) -> Option<Arc<DatabaseProxy>> {
        self.db_proxy.clone()
    }

    pub fn speech_provider(&self) -> Arc<SpeechProvider> {
        Arc::clone(&self.speech_provider)
    }

    pub fn passage_provider(&self) -> Arc<PassageProvider> {
        Arc::clone(&self.passage_provider)
    }
}
