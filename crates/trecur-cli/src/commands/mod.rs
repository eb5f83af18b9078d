use anyhow::{Context as _, Result};
use trecur_core::recurrence::{RecurrenceConfig, RecurrenceProcessor};
use trecur_core::store::{SqliteStore, TaskStore, TaskwarriorStore};

use crate::config::{Backend, Config};

pub mod import;
pub mod on_add;
pub mod on_exit;
pub mod regenerate;

/// The store and recurrence settings a command runs against.
pub struct Context {
    store: Box<dyn TaskStore>,
    recurrence: RecurrenceConfig,
}

impl Context {
    pub async fn open(config: &Config) -> Result<Self> {
        let settings = &config.store;
        let store: Box<dyn TaskStore> = match settings.backend {
            Backend::Taskwarrior => Box::new(
                TaskwarriorStore::new(settings.task_binary.clone())
                    .with_taskrc(settings.taskrc.clone())
                    .with_data_location(settings.data_location.clone()),
            ),
            Backend::Sqlite => Box::new(
                SqliteStore::open(&settings.database)
                    .await
                    .with_context(|| format!("cannot open {}", settings.database.display()))?,
            ),
        };
        Ok(Self {
            store,
            recurrence: config.recurrence_config()?,
        })
    }

    pub fn store(&self) -> &dyn TaskStore {
        self.store.as_ref()
    }

    pub fn processor(&self) -> RecurrenceProcessor<'_> {
        RecurrenceProcessor::new(self.store.as_ref(), self.recurrence.clone())
    }
}
