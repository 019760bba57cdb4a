use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub brightness: BrightnessConfig,
    #[serde(default)]
    pub sharpness: SharpnessConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrightnessConfig {
    /// Frames whose brightness is not above this level are flagged as too dark.
    #[serde(default = "default_brightness_threshold")]
    pub threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SharpnessConfig {
    #[serde(default = "default_kernel")]
    pub kernel: KernelKind,
    /// Allocation budget for the compute backend. Unlimited when absent.
    #[serde(default)]
    pub memory_limit_bytes: Option<usize>,
    /// Laplacian variance below which a capture should be retaken.
    /// No default: without it every capture is accepted.
    #[serde(default)]
    pub min_variance: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    FourNeighbor,
    EightNeighbor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Frame sequence numbers at which the shutter is pressed.
    #[serde(default)]
    pub capture_on_frames: Vec<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Print one JSON line per reading on stdout.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            threshold: default_brightness_threshold(),
        }
    }
}

impl Default for SharpnessConfig {
    fn default() -> Self {
        Self {
            kernel: default_kernel(),
            memory_limit_bytes: None,
            min_variance: None,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            capture_on_frames: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.brightness.threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "brightness.threshold must be a non-negative number, got {threshold}"
            )));
        }
        if let Some(min) = self.sharpness.min_variance {
            if !min.is_finite() || min < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "sharpness.min_variance must be a non-negative number, got {min}"
                )));
            }
        }
        if self.monitor.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "monitor.channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_brightness_threshold() -> f64 {
    40.0
}
fn default_kernel() -> KernelKind {
    KernelKind::FourNeighbor
}
fn default_channel_capacity() -> usize {
    8
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.brightness.threshold, 40.0);
        assert_eq!(config.sharpness.kernel, KernelKind::FourNeighbor);
        assert!(config.sharpness.min_variance.is_none());
        assert!(config.sharpness.memory_limit_bytes.is_none());
        assert_eq!(config.monitor.channel_capacity, 8);
        assert!(config.monitor.capture_on_frames.is_empty());
        assert!(config.source.paths.is_empty());
        assert!(!config.output.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn full_config_parses() {
        let config = Config::parse(
            r#"
            [brightness]
            threshold = 55.5

            [sharpness]
            kernel = "eight_neighbor"
            memory_limit_bytes = 1048576
            min_variance = 120.0

            [monitor]
            channel_capacity = 2
            capture_on_frames = [3, 9]

            [source]
            paths = ["a.jpg", "b.png"]

            [output]
            json = true

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.brightness.threshold, 55.5);
        assert_eq!(config.sharpness.kernel, KernelKind::EightNeighbor);
        assert_eq!(config.sharpness.memory_limit_bytes, Some(1048576));
        assert_eq!(config.sharpness.min_variance, Some(120.0));
        assert_eq!(config.monitor.capture_on_frames, vec![3, 9]);
        assert_eq!(config.source.paths.len(), 2);
        assert!(config.output.json);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn negative_threshold_is_invalid() {
        let err = Config::parse("[brightness]\nthreshold = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_channel_capacity_is_invalid() {
        let err = Config::parse("[monitor]\nchannel_capacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_kernel_fails_to_parse() {
        let err = Config::parse("[sharpness]\nkernel = \"sobel\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::load(Path::new("/nonexistent/lumacheck.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(..)));
    }
}
