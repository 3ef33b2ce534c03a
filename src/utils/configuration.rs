use crate::assembly::PruneSettings;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Prefix for environment overrides, e.g. `PRUNE__PRUNING__MAX_EXTS=20`
pub const ENV_PREFIX: &str = "PRUNE";

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Full configuration of the pruning tool
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PruneConfiguration {
    pub general: GeneralConfig,
    /// Pruning thresholds and switches
    pub pruning: PruneSettings,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Worker threads for branch analysis (0 = rayon default)
    pub num_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log output format (json, pretty, compact)
    pub format: String,
    /// Daily-rolled log file; logs go to stderr when unset
    pub file_path: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: "prune-forge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Configuration and input errors surfaced to the command line
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Input/Output error: {message}")]
    IOError { message: String },

    #[error("Validation error: {field} is invalid: {reason}")]
    ValidationError { field: String, reason: String },
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::ConfigurationError {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::IOError {
            message: err.to_string(),
        }
    }
}

fn invalid(field: &str, reason: &str) -> PipelineError {
    PipelineError::ValidationError {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Layered configuration: built-in defaults, then an optional TOML file,
/// then `PRUNE__*` environment variables
pub struct ConfigurationManager {
    config: PruneConfiguration,
    config_path: Option<PathBuf>,
}

impl ConfigurationManager {
    /// Defaults overlaid with environment variables
    pub fn new() -> Result<Self, PipelineError> {
        Self::load(None)
    }

    /// Pure defaults, no file or environment lookup
    pub fn new_with_defaults() -> Result<Self, PipelineError> {
        let manager = Self {
            config: PruneConfiguration::default(),
            config_path: None,
        };
        manager.validate_configuration()?;
        Ok(manager)
    }

    /// Defaults overlaid with `config_path`, then environment variables
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, PipelineError> {
        Self::load(Some(config_path.as_ref()))
    }

    fn load(config_path: Option<&Path>) -> Result<Self, PipelineError> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&PruneConfiguration::default())?);

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(PipelineError::IOError {
                    message: format!("Configuration file not found: {}", path.display()),
                });
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: PruneConfiguration = builder.build()?.try_deserialize()?;
        let manager = Self {
            config,
            config_path: config_path.map(Path::to_path_buf),
        };
        manager.validate_configuration()?;
        Ok(manager)
    }

    fn load_config_from_file(path: &Path) -> Result<PruneConfiguration, PipelineError> {
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Validate configuration parameters
    pub fn validate_configuration(&self) -> Result<(), PipelineError> {
        let pruning = &self.config.pruning;

        if pruning.max_exts == 0 {
            return Err(invalid("pruning.max_exts", "must be greater than 0"));
        }
        if pruning.max_read_len == 0 {
            return Err(invalid("pruning.max_read_len", "must be greater than 0"));
        }
        if pruning.thresholds.min_win == 0 {
            return Err(invalid(
                "pruning.thresholds.min_win",
                "must be greater than 0, otherwise empty branches decide",
            ));
        }
        if pruning.verbosity > 2 {
            return Err(invalid("pruning.verbosity", "must be 0, 1 or 2"));
        }

        let level = self.config.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(invalid(
                "logging.level",
                "must be one of error, warn, info, debug, trace",
            ));
        }
        if !LOG_FORMATS.contains(&self.config.logging.format.as_str()) {
            return Err(invalid(
                "logging.format",
                "must be one of pretty, compact, json",
            ));
        }

        let available_threads = num_cpus::get();
        if self.config.performance.num_threads > available_threads * 2 {
            warn!(
                "Configured threads ({}) exceeds available cores ({})",
                self.config.performance.num_threads, available_threads
            );
        }

        Ok(())
    }

    /// Install the global tracing subscriber described by the logging section.
    ///
    /// The returned guard flushes the log file on drop and must be held for
    /// the lifetime of the program. `RUST_LOG` overrides the configured level.
    pub fn setup_logging(&self) -> Result<Option<WorkerGuard>, PipelineError> {
        use tracing_appender::rolling;
        use tracing_subscriber::fmt::writer::BoxMakeWriter;
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if tracing::dispatcher::has_been_set() {
            info!("⏭️  Logging already initialized, skipping setup");
            return Ok(None);
        }

        let level = &self.config.logging.level;
        let format = &self.config.logging.format;

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        let (writer, guard) = match &self.config.logging.file_path {
            Some(file_path) => {
                let file_appender = rolling::daily(
                    file_path.parent().unwrap_or(Path::new(".")),
                    file_path
                        .file_name()
                        .unwrap_or(std::ffi::OsStr::new("prune-forge.log")),
                );
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                (BoxMakeWriter::new(non_blocking), Some(guard))
            }
            None => (BoxMakeWriter::new(std::io::stderr), None),
        };

        let subscriber = tracing_subscriber::registry().with(env_filter);
        let installed = match format.as_str() {
            "json" => subscriber
                .with(fmt::layer().json().with_thread_ids(true).with_writer(writer))
                .try_init(),
            "compact" => subscriber
                .with(fmt::layer().compact().with_writer(writer))
                .try_init(),
            _ => subscriber
                .with(
                    fmt::layer()
                        .without_time()
                        .with_target(false)
                        .with_writer(writer),
                )
                .try_init(),
        };

        if installed.is_err() {
            return Ok(None);
        }

        info!(
            "📝 Logging initialized with level: {}, format: {}",
            level, format
        );
        Ok(guard)
    }

    pub fn config(&self) -> &PruneConfiguration {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PruneConfiguration {
        &mut self.config
    }

    /// File the configuration was loaded from, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Save current configuration to file
    pub fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<(), PipelineError> {
        write_toml(&self.config, path.as_ref())?;
        info!("💾 Configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self {
            config: PruneConfiguration::default(),
            config_path: None,
        }
    }
}

fn write_toml(config: &PruneConfiguration, path: &Path) -> Result<(), PipelineError> {
    let toml_string =
        toml::to_string_pretty(config).map_err(|e| PipelineError::ConfigurationError {
            message: format!("Failed to serialize configuration: {e}"),
        })?;

    std::fs::write(path, toml_string).map_err(|e| PipelineError::IOError {
        message: format!("Failed to write configuration file {}: {e}", path.display()),
    })
}

/// Utility functions for configuration management
pub mod config_utils {
    use super::*;

    /// Parse and validate a configuration file without touching the environment
    pub fn validate_config_file<P: AsRef<Path>>(path: P) -> Result<(), PipelineError> {
        let config = ConfigurationManager::load_config_from_file(path.as_ref())?;
        ConfigurationManager {
            config,
            config_path: Some(path.as_ref().to_path_buf()),
        }
        .validate_configuration()
    }

    /// Write the default configuration as a TOML template
    pub fn generate_config_template<P: AsRef<Path>>(path: P) -> Result<(), PipelineError> {
        write_toml(&PruneConfiguration::default(), path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{BoundaryScan, BranchMode};
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let manager = ConfigurationManager::new_with_defaults().unwrap();
        let config = manager.config();

        assert_eq!(config.general.name, "prune-forge");
        assert_eq!(config.pruning.max_exts, 10);
        assert_eq!(config.pruning.max_read_len, 250);
        assert_eq!(config.pruning.thresholds.max_del, 15);
        assert_eq!(config.pruning.mode, BranchMode::SoloEntry);
        assert!(config.pruning.remove_tiny);
        assert!(manager.config_path().is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut manager = ConfigurationManager::default();
        manager.config_mut().pruning.max_exts = 0;
        assert!(matches!(
            manager.validate_configuration(),
            Err(PipelineError::ValidationError { ref field, .. }) if field == "pruning.max_exts"
        ));

        let mut manager = ConfigurationManager::default();
        manager.config_mut().logging.format = "xml".to_string();
        assert!(manager.validate_configuration().is_err());

        let mut manager = ConfigurationManager::default();
        manager.config_mut().pruning.verbosity = 3;
        assert!(manager.validate_configuration().is_err());
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("prune.toml");
        std::fs::write(
            &config_path,
            r#"
[pruning]
max_exts = 20
mode = "any-entry"

[pruning.thresholds]
scan = "permissive"
min_win = 80
"#,
        )
        .unwrap();

        let manager = ConfigurationManager::from_file(&config_path).unwrap();
        let pruning = &manager.config().pruning;
        assert_eq!(pruning.max_exts, 20);
        assert_eq!(pruning.mode, BranchMode::AnyEntry);
        assert_eq!(pruning.thresholds.scan, BoundaryScan::Permissive);
        assert_eq!(pruning.thresholds.min_win, 80);
        assert_eq!(pruning.thresholds.max_lose, 50);
        assert_eq!(pruning.max_read_len, 250);
        assert_eq!(manager.config_path(), Some(config_path.as_path()));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let result = ConfigurationManager::from_file(temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(PipelineError::IOError { .. })));
    }

    #[test]
    fn test_template_round_trip() {
        let temp_dir = tempdir().unwrap();
        let template = temp_dir.path().join("template.toml");

        config_utils::generate_config_template(&template).unwrap();
        config_utils::validate_config_file(&template).unwrap();

        let loaded = ConfigurationManager::load_config_from_file(&template).unwrap();
        assert_eq!(loaded, PruneConfiguration::default());
    }

    #[test]
    fn test_save_config() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("saved.toml");

        let mut manager = ConfigurationManager::default();
        manager.config_mut().pruning.tiny_max_kmers = 75;
        manager.save_config(&path).unwrap();

        let loaded = ConfigurationManager::load_config_from_file(&path).unwrap();
        assert_eq!(loaded.pruning.tiny_max_kmers, 75);
    }
}
