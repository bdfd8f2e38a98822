use std::env;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannerConfig {
    pub emulator_host: Option<String>,
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl SpannerConfig {
    pub fn database_path(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Sqlite { path: PathBuf },
    Spanner(SpannerConfig),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub service_port: u16,
    pub service_host: String,
    pub shell_document: Option<PathBuf>,
    pub recorder_flush_interval: Duration,
    pub playback_start_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let storage = match env::var("SPANNER_PROJECT") {
            Ok(project) => {
                let instance = env::var("SPANNER_INSTANCE")
                    .context("SPANNER_INSTANCE environment variable is required when SPANNER_PROJECT is set")?;
                let database = env::var("SPANNER_DATABASE")
                    .context("SPANNER_DATABASE environment variable is required when SPANNER_PROJECT is set")?;
                StorageConfig::Spanner(SpannerConfig {
                    emulator_host: env::var("SPANNER_EMULATOR_HOST").ok(),
                    project,
                    instance,
                    database,
                })
            }
            Err(_) => StorageConfig::Sqlite {
                path: env::var("RECORDINGS_DB_PATH")
                    .unwrap_or_else(|_| "recordings.db".to_string())
                    .into(),
            },
        };

        let service_port = env::var("SERVICE_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("SERVICE_PORT must be a valid port number (0-65535)")?;

        let service_host = env::var("SERVICE_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let shell_document = env::var("SHELL_DOCUMENT").ok().map(PathBuf::from);

        let recorder_flush_interval = millis_var("RECORDER_FLUSH_INTERVAL_MS", 500)?;
        let playback_start_delay = millis_var("PLAYBACK_START_DELAY_MS", 3000)?;

        Ok(Config {
            storage,
            service_port,
            service_host,
            shell_document,
            recorder_flush_interval,
            playback_start_delay,
        })
    }

    pub fn log_startup(&self) {
        tracing::info!("Configuration loaded:");
        match &self.storage {
            StorageConfig::Sqlite { path } => {
                tracing::info!("  Storage: SQLite at {}", path.display());
            }
            StorageConfig::Spanner(spanner) => {
                tracing::info!("  Storage: Spanner {}", spanner.database_path());
                tracing::info!("  Spanner emulator: {}",
                    spanner.emulator_host.as_deref().unwrap_or("disabled (using production)"));
            }
        }
        tracing::info!("  Shell document: {}",
            self.shell_document.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "built-in".to_string()));
        tracing::info!("  Recorder flush interval: {:?}", self.recorder_flush_interval);
        tracing::info!("  Playback start delay: {:?}", self.playback_start_delay);
        tracing::info!("  Service listening on: {}:{}", self.service_host, self.service_port);
    }
}

fn millis_var(name: &str, default: u64) -> Result<Duration> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .with_context(|| format!("{} must be a whole number of milliseconds", name)),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn lock_env() -> MutexGuard<'static, ()> {
        let guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        guard
    }

    fn clear_env_vars() {
        unsafe {
            env::remove_var("SPANNER_PROJECT");
            env::remove_var("SPANNER_INSTANCE");
            env::remove_var("SPANNER_DATABASE");
            env::remove_var("RECORDINGS_DB_PATH");
            env::remove_var("SERVICE_PORT");
            env::remove_var("SERVICE_HOST");
            env::remove_var("SHELL_DOCUMENT");
            env::remove_var("RECORDER_FLUSH_INTERVAL_MS");
            env::remove_var("PLAYBACK_START_DELAY_MS");
        }
    }

    #[test]
    fn test_config_with_defaults() {
        let _guard = lock_env();

        let config = Config::from_env().unwrap();

        assert_eq!(config.storage, StorageConfig::Sqlite { path: PathBuf::from("recordings.db") });
        assert_eq!(config.service_port, 3000);
        assert_eq!(config.service_host, "0.0.0.0");
        assert_eq!(config.shell_document, None);
        assert_eq!(config.recorder_flush_interval, Duration::from_millis(500));
        assert_eq!(config.playback_start_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_config_with_all_vars() {
        let _guard = lock_env();
        unsafe {
            env::set_var("RECORDINGS_DB_PATH", "/tmp/rec.db");
            env::set_var("SERVICE_PORT", "8080");
            env::set_var("SERVICE_HOST", "127.0.0.1");
            env::set_var("SHELL_DOCUMENT", "static/index.html");
            env::set_var("RECORDER_FLUSH_INTERVAL_MS", "50");
            env::set_var("PLAYBACK_START_DELAY_MS", "0");
        }

        let config = Config::from_env().unwrap();
        clear_env_vars();

        assert_eq!(config.storage, StorageConfig::Sqlite { path: PathBuf::from("/tmp/rec.db") });
        assert_eq!(config.service_port, 8080);
        assert_eq!(config.service_host, "127.0.0.1");
        assert_eq!(config.shell_document, Some(PathBuf::from("static/index.html")));
        assert_eq!(config.recorder_flush_interval, Duration::from_millis(50));
        assert_eq!(config.playback_start_delay, Duration::ZERO);
    }

    #[test]
    fn test_spanner_selected_by_project() {
        let _guard = lock_env();
        unsafe {
            env::set_var("SPANNER_PROJECT", "test-project");
            env::set_var("SPANNER_INSTANCE", "test-instance");
            env::set_var("SPANNER_DATABASE", "test-database");
        }

        let config = Config::from_env().unwrap();
        clear_env_vars();

        match config.storage {
            StorageConfig::Spanner(spanner) => {
                assert_eq!(spanner.project, "test-project");
                assert_eq!(
                    spanner.database_path(),
                    "projects/test-project/instances/test-instance/databases/test-database"
                );
            }
            other => panic!("expected Spanner storage, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_spanner_database() {
        let _guard = lock_env();
        unsafe {
            env::set_var("SPANNER_PROJECT", "test-project");
            env::set_var("SPANNER_INSTANCE", "test-instance");
        }
        // Missing SPANNER_DATABASE

        let result = Config::from_env();
        clear_env_vars();

        let error = result.unwrap_err();
        assert!(error.to_string().contains("SPANNER_DATABASE"));
    }

    #[test]
    fn test_invalid_port() {
        let _guard = lock_env();
        unsafe {
            env::set_var("SERVICE_PORT", "not-a-number");
        }

        let result = Config::from_env();
        clear_env_vars();

        let error = result.unwrap_err();
        assert!(error.to_string().contains("SERVICE_PORT"));
    }

    #[test]
    fn test_port_out_of_range() {
        let _guard = lock_env();
        unsafe {
            env::set_var("SERVICE_PORT", "99999");
        }

        let result = Config::from_env();
        clear_env_vars();

        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_flush_interval() {
        let _guard = lock_env();
        unsafe {
            env::set_var("RECORDER_FLUSH_INTERVAL_MS", "-5");
        }

        let result = Config::from_env();
        clear_env_vars();

        let error = result.unwrap_err();
        assert!(error.to_string().contains("RECORDER_FLUSH_INTERVAL_MS"));
    }
}
