use crate::hardware::{BusConfig, ChannelTable};
use crate::processing::HopTiming;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Longest burst interval any ISS uses, with generous margin
const MAX_PACKET_INTERVAL_MS: u64 = 60_000;
/// Longest silence tiered retry may chase before resync hops take over
const MAX_TIERED_SPAN_MS: u64 = 600_000;
/// Longest statistics report interval (one day)
const MAX_REPORT_INTERVAL_S: u64 = 86_400;

/// Receiver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Transceiver wiring
    pub bus: BusConfig,
    /// ISS burst timing used by the hop scheduler
    pub timing: HopTiming,
    /// Channel to listen on after start-up
    pub initial_channel: usize,
    /// Added to the chip temperature reading
    pub temperature_calibration: u8,
    /// Log filter directive, e.g. "info" or "info,rfm=debug"
    pub log_level: String,
    /// How often statistics are reported (seconds)
    pub report_interval_s: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            timing: HopTiming::default(),
            initial_channel: 0,
            temperature_calibration: 0,
            log_level: "info".to_string(),
            report_interval_s: 60,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Invalid parameter value
    InvalidParameter { parameter: String, value: String, reason: String },
    /// Configuration file I/O error
    IoError { message: String },
    /// JSON serialization/deserialization error
    SerializationError { message: String },
}

/// Configuration validation result
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether configuration is valid
    pub is_valid: bool,
    /// Validation errors
    pub errors: Vec<ConfigError>,
    /// Validation warnings
    pub warnings: Vec<String>,
}

/// Configuration manager for loading, validating and adjusting settings
#[derive(Debug)]
pub struct ConfigurationManager {
    config: ReceiverConfig,
    channels: &'static ChannelTable,
    config_file_path: Option<String>,
    is_modified: bool,
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationManager {
    /// Create a new configuration manager with default settings
    pub fn new() -> Self {
        Self::with_channels(ChannelTable::compiled())
    }

    /// Manager that validates channels against `channels`
    pub fn with_channels(channels: &'static ChannelTable) -> Self {
        Self {
            config: ReceiverConfig::default(),
            channels,
            config_file_path: None,
            is_modified: false,
        }
    }

    /// Create configuration manager and load from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    pub fn get_config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Replace the configuration after validating it
    pub fn update_config(&mut self, config: ReceiverConfig) -> Result<(), ConfigError> {
        let validation = self.validate_config(&config);
        if let Some(error) = validation.errors.into_iter().next() {
            return Err(error);
        }

        self.config = config;
        self.is_modified = true;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: ReceiverConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
                message: format!("Failed to parse config file '{}': {}", path_str, e),
            })?;

        // Validate before applying
        let validation = self.validate_config(&config);
        if let Some(error) = validation.errors.into_iter().next() {
            return Err(error);
        }

        self.config = config;
        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(&self.config).map_err(|e| {
            ConfigError::SerializationError {
                message: format!("Failed to serialize config: {}", e),
            }
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })?;

        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save to the file the configuration was loaded from
    pub fn save(&mut self) -> Result<(), ConfigError> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(ConfigError::IoError {
                message: "No configuration file path set".to_string(),
            }),
        }
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Change the start-up channel. Returns the previous value.
    pub fn set_initial_channel(&mut self, channel: usize) -> Result<usize, ConfigError> {
        if channel >= self.channels.len() {
            return Err(ConfigError::InvalidParameter {
                parameter: "initial_channel".to_string(),
                value: channel.to_string(),
                reason: format!(
                    "{} hop table has {} channels",
                    self.channels.region,
                    self.channels.len()
                ),
            });
        }

        let old = self.config.initial_channel;
        self.config.initial_channel = channel;
        self.is_modified = true;
        Ok(old)
    }

    /// Change the chip temperature calibration. Returns the previous value.
    pub fn set_temperature_calibration(&mut self, calibration: u8) -> u8 {
        let old = self.config.temperature_calibration;
        self.config.temperature_calibration = calibration;
        self.is_modified = true;
        old
    }

    pub fn validate_config(&self, config: &ReceiverConfig) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let timing = &config.timing;

        if let Err(e) = config.bus.validate() {
            errors.push(ConfigError::InvalidParameter {
                parameter: "bus".to_string(),
                value: config.bus.device.clone(),
                reason: e.to_string(),
            });
        }

        if timing.packet_interval_ms == 0 {
            errors.push(ConfigError::InvalidParameter {
                parameter: "timing.packet_interval_ms".to_string(),
                value: timing.packet_interval_ms.to_string(),
                reason: "Packet interval must be positive".to_string(),
            });
        } else if timing.packet_interval_ms > MAX_PACKET_INTERVAL_MS {
            errors.push(ConfigError::InvalidParameter {
                parameter: "timing.packet_interval_ms".to_string(),
                value: timing.packet_interval_ms.to_string(),
                reason: format!("Packet interval must not exceed {} ms", MAX_PACKET_INTERVAL_MS),
            });
        } else if timing.packet_offset_ms >= timing.packet_interval_ms {
            errors.push(ConfigError::InvalidParameter {
                parameter: "timing.packet_offset_ms".to_string(),
                value: timing.packet_offset_ms.to_string(),
                reason: "Offset must be shorter than the packet interval".to_string(),
            });
        }

        if timing.long_hop_ms <= timing.packet_interval_ms {
            errors.push(ConfigError::InvalidParameter {
                parameter: "timing.long_hop_ms".to_string(),
                value: timing.long_hop_ms.to_string(),
                reason: "Resync interval must exceed the packet interval".to_string(),
            });
        }

        if timing.max_missed_packets == 0 {
            errors.push(ConfigError::InvalidParameter {
                parameter: "timing.max_missed_packets".to_string(),
                value: timing.max_missed_packets.to_string(),
                reason: "At least one tiered retry is required".to_string(),
            });
        } else if timing.tiered_deadline_ms(timing.max_missed_packets) > MAX_TIERED_SPAN_MS {
            errors.push(ConfigError::InvalidParameter {
                parameter: "timing.max_missed_packets".to_string(),
                value: timing.max_missed_packets.to_string(),
                reason: format!("Tiered retry would chase silence past {} ms", MAX_TIERED_SPAN_MS),
            });
        } else if (timing.max_missed_packets as usize) < self.channels.len() {
            warnings.push(
                "Tiered retry gives up before visiting every channel once".to_string(),
            );
        }

        if config.initial_channel >= self.channels.len() {
            errors.push(ConfigError::InvalidParameter {
                parameter: "initial_channel".to_string(),
                value: config.initial_channel.to_string(),
                reason: format!("{} hop table has {} channels", self.channels.region, self.channels.len()),
            });
        }

        if let Err(e) = EnvFilter::try_new(&config.log_level) {
            errors.push(ConfigError::InvalidParameter {
                parameter: "log_level".to_string(),
                value: config.log_level.clone(),
                reason: e.to_string(),
            });
        }

        if config.report_interval_s > MAX_REPORT_INTERVAL_S {
            errors.push(ConfigError::InvalidParameter {
                parameter: "report_interval_s".to_string(),
                value: config.report_interval_s.to_string(),
                reason: format!("Report interval must not exceed {} s", MAX_REPORT_INTERVAL_S),
            });
        } else if config.report_interval_s == 0 {
            warnings.push("Statistics reporting disabled".to_string());
        } else if config.report_interval_s < 10 {
            warnings.push("Very short report interval will flood the log".to_string());
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidParameter { parameter, value, reason } => {
                write!(f, "Invalid parameter '{}' = '{}': {}", parameter, value, reason)
            }
            ConfigError::IoError { message } => {
                write!(f, "I/O error: {}", message)
            }
            ConfigError::SerializationError { message } => {
                write!(f, "Serialization error: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
