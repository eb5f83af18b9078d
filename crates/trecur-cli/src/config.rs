use clap::ValueEnum;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use trecur_core::error::CoreError;
use trecur_core::recurrence::{RecurrenceConfig, DEFAULT_MAX_BACKFILL};
use trecur_core::timezone::{detect_system_timezone, parse_timezone};

use crate::hooks::HookArgs;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// Default tracing filter when `TRECUR_LOG` is unset.
    pub log_level: String,
    #[serde(default)]
    pub recurrence: RecurrenceSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RecurrenceSettings {
    /// IANA zone for calendar arithmetic; the system zone when unset.
    pub timezone: Option<String>,
    pub max_backfill: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Taskwarrior,
    Sqlite,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub backend: Backend,
    pub task_binary: PathBuf,
    pub database: PathBuf,
    pub taskrc: Option<PathBuf>,
    pub data_location: Option<PathBuf>,
}

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub backend: Option<Backend>,
    pub database: Option<PathBuf>,
    pub task_binary: Option<PathBuf>,
    pub timezone: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            recurrence: RecurrenceSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl Default for RecurrenceSettings {
    fn default() -> Self {
        Self {
            timezone: None,
            max_backfill: DEFAULT_MAX_BACKFILL,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        let database = dirs::data_dir()
            .map(|dir| dir.join("trecur").join("tasks.db"))
            .unwrap_or_else(|| PathBuf::from("trecur.db"));
        Self {
            backend: Backend::Taskwarrior,
            task_binary: PathBuf::from("task"),
            database,
            taskrc: None,
            data_location: None,
        }
    }
}

/// `TRECUR_CONFIG`, else `config.toml` under the user's config directory.
pub fn config_file_path() -> Option<PathBuf> {
    std::env::var_os("TRECUR_CONFIG")
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|dir| dir.join("trecur").join("config.toml")))
}

impl Config {
    /// Defaults, then the config file, then `TRECUR_*` variables.
    pub fn figment(config_file: Option<PathBuf>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("TRECUR_").split("__"))
    }

    /// Full configuration for one invocation. Command-line flags win over
    /// the environment; a hook's `rc:`/`data:` win over everything.
    pub fn load(overrides: &Overrides, hook: Option<&HookArgs>) -> Result<Self, figment::Error> {
        let mut figment = Self::figment(config_file_path());
        if let Some(backend) = overrides.backend {
            figment = figment.merge(Serialized::default("store.backend", backend));
        }
        if let Some(database) = &overrides.database {
            figment = figment.merge(Serialized::default("store.database", database));
        }
        if let Some(binary) = &overrides.task_binary {
            figment = figment.merge(Serialized::default("store.task_binary", binary));
        }
        if let Some(timezone) = &overrides.timezone {
            figment = figment.merge(Serialized::default("recurrence.timezone", timezone));
        }

        let mut config: Config = figment.extract()?;
        if let Some(hook) = hook {
            config.apply_hook(hook);
        }
        Ok(config)
    }

    pub fn apply_hook(&mut self, hook: &HookArgs) {
        if let Some(rc) = &hook.rc {
            self.store.taskrc = Some(rc.clone());
        }
        if let Some(data) = &hook.data {
            self.store.data_location = Some(data.clone());
        }
    }

    pub fn recurrence_config(&self) -> Result<RecurrenceConfig, CoreError> {
        let timezone = match &self.recurrence.timezone {
            Some(name) => parse_timezone(name)?,
            None => parse_timezone(&detect_system_timezone())?,
        };
        Ok(RecurrenceConfig::new(timezone).with_max_backfill(self.recurrence.max_backfill))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Config {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.recurrence.max_backfill, DEFAULT_MAX_BACKFILL);
        assert_eq!(config.store.backend, Backend::Taskwarrior);
        assert_eq!(config.store.task_binary, PathBuf::from("task"));
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = from_toml(
            r#"
            log_level = "debug"
            [recurrence]
            timezone = "Europe/Madrid"
            [store]
            backend = "sqlite"
            database = "/tmp/trecur.db"
            "#,
        );
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.recurrence.timezone.as_deref(), Some("Europe/Madrid"));
        assert_eq!(config.recurrence.max_backfill, DEFAULT_MAX_BACKFILL);
        assert_eq!(config.store.backend, Backend::Sqlite);
        assert_eq!(config.store.database, PathBuf::from("/tmp/trecur.db"));
        assert_eq!(config.store.task_binary, PathBuf::from("task"));
    }

    #[test]
    fn test_hook_paths_take_precedence() {
        let mut config = from_toml(
            r#"
            [store]
            taskrc = "/etc/taskrc"
            "#,
        );
        config.apply_hook(&HookArgs::parse(["rc:/home/u/.taskrc", "data:/home/u/.task"]));
        assert_eq!(config.store.taskrc, Some(PathBuf::from("/home/u/.taskrc")));
        assert_eq!(config.store.data_location, Some(PathBuf::from("/home/u/.task")));
    }

    #[test]
    fn test_invalid_timezone_is_rejected() {
        let config = from_toml(
            r#"
            [recurrence]
            timezone = "Mars/Olympus_Mons"
            "#,
        );
        assert!(matches!(
            config.recurrence_config(),
            Err(CoreError::InvalidTimezone(_))
        ));
    }
}
