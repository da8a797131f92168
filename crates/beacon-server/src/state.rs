//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;

use beacon_core::{
    AdvertisingController, Config, ConfigError, EventLog, ProximityEngine, RangingLog,
    TransmissionLog,
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Engine wired to in-memory collaborators. The HTTP layer plays the sensor.
pub type Engine = ProximityEngine<RangingLog, EventLog>;

/// Advertising controller wired to an in-memory transmitter.
pub type Transmitter = AdvertisingController<TransmissionLog>;

/// State handle passed to every handler.
pub type SharedState = Arc<RwLock<AppState>>;

/// Errors building the application state.
#[derive(Debug, Error)]
pub enum StateError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Application state.
#[derive(Debug)]
pub struct AppState {
    /// Active configuration.
    pub config: Config,
    /// Where the configuration was loaded from.
    pub config_path: PathBuf,
    /// The detection pipeline.
    pub engine: Engine,
    /// The advertising pass-through.
    pub advertising: Transmitter,
    /// When the state was built.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build state from a configuration.
    ///
    /// Starts monitoring the configured region when `monitoring.auto_start` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured monitoring region is invalid.
    pub fn new(config: Config, config_path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let mut engine = ProximityEngine::new(
            &config,
            RangingLog::new(),
            EventLog::new(config.publisher.event_buffer_capacity),
        );

        if config.monitoring.auto_start {
            let region = config.monitoring.region()?;
            info!(region_id = %region.identifier, "Auto-starting monitoring");
            engine.start_monitoring(region);
        }

        Ok(Self {
            config,
            config_path: config_path.into(),
            engine,
            advertising: AdvertisingController::new(TransmissionLog::new()),
            started_at: Utc::now(),
        })
    }

    /// Load configuration from `path` (defaults if missing) and build state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed or validated.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let config = Config::load_or_default(&path)?;
        Self::new(config, path)
    }

    /// Validate, persist and adopt a new configuration.
    ///
    /// The advertising section applies to the next transmit request. The
    /// other sections size the engine, so they take effect on restart.
    /// Returns whether a restart is needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or cannot be written.
    /// The active configuration is unchanged on error.
    pub fn save_config(&mut self, config: Config) -> Result<bool, ConfigError> {
        config.validate()?;
        config.save(&self.config_path)?;
        Ok(self.adopt_config(config))
    }

    /// Re-read the configuration file and adopt it.
    ///
    /// Returns whether a restart is needed, as for [`Self::save_config`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed or invalid.
    pub fn reload_config(&mut self) -> Result<bool, ConfigError> {
        let config = Config::load(&self.config_path)?;
        Ok(self.adopt_config(config))
    }

    fn adopt_config(&mut self, config: Config) -> bool {
        let restart_required = requires_restart(&self.config, &config);
        info!(
            path = %self.config_path.display(),
            restart_required,
            "Configuration updated"
        );
        self.config = config;
        restart_required
    }

    /// Wrap the state for sharing across handlers.
    #[must_use]
    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }
}

fn requires_restart(active: &Config, next: &Config) -> bool {
    active.ingest != next.ingest
        || active.classifier != next.classifier
        || active.publisher != next.publisher
        || active.monitoring != next.monitoring
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::RegionTrackingState;

    #[test]
    fn test_auto_start_monitors_configured_region() {
        let state = AppState::new(Config::default(), "/tmp/beacon.toml").unwrap();
        let identifier = &state.config.monitoring.identifier;
        assert_eq!(state.engine.state(identifier), RegionTrackingState::Entered);
    }

    #[test]
    fn test_auto_start_disabled() {
        let mut config = Config::default();
        config.monitoring.auto_start = false;
        let state = AppState::new(config, "/tmp/beacon.toml").unwrap();
        assert_eq!(state.engine.regions().count(), 0);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let state = AppState::load(&path).unwrap();
        assert_eq!(state.config, Config::default());
        assert_eq!(state.config_path, path);
    }

    #[test]
    fn test_save_config_persists_and_reports_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut state = AppState::new(Config::default(), &path).unwrap();

        let mut config = Config::default();
        config.advertising.minor = 10;
        assert!(!state.save_config(config.clone()).unwrap());
        assert_eq!(state.config.advertising.minor, 10);
        assert_eq!(Config::load(&path).unwrap(), config);

        config.classifier.window_capacity = 9;
        assert!(state.save_config(config).unwrap());
    }

    #[test]
    fn test_save_config_keeps_active_config_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::new(Config::default(), dir.path().join("config.toml")).unwrap();

        let mut config = Config::default();
        config.classifier.window_capacity = 0;
        assert!(state.save_config(config).is_err());
        assert_eq!(state.config, Config::default());
    }

    #[test]
    fn test_reload_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::new(Config::default(), dir.path().join("absent.toml")).unwrap();
        assert!(matches!(state.reload_config(), Err(ConfigError::NotFound(_))));
    }
}
