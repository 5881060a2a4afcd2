//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.defcon.toml` files.

use crate::analysis::{ScoringModel, Weights};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".defcon.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Escalation scoring settings.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Auto-scan settings.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default dashboard report path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Path of the shared state document.
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            state_path: default_state_path(),
        }
    }
}

fn default_output() -> String {
    "defcon_report.md".to_string()
}

fn default_state_path() -> String {
    ".defcon_state.json".to_string()
}

/// Generative model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model used for sweeps and SITREPs.
    #[serde(default = "default_model")]
    pub name: String,

    /// Model used for the voice briefing.
    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    /// Prebuilt voice for the briefing.
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Base URL of the generative language API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Language the SITREP is written in.
    #[serde(default = "default_sitrep_language")]
    pub sitrep_language: String,

    /// Sample rate of the PCM returned by the speech model.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            tts_model: default_tts_model(),
            voice: default_voice(),
            api_url: default_api_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            sitrep_language: default_sitrep_language(),
            sample_rate: default_sample_rate(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.5-flash-preview-09-2025".to_string()
}

fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_voice() -> String {
    "Puck".to_string()
}

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_temperature() -> f64 {
    0.2
}

fn default_timeout() -> u64 {
    120
}

fn default_sitrep_language() -> String {
    "Hebrew".to_string()
}

fn default_sample_rate() -> u32 {
    24_000
}

/// Category weights, amplification and threat bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Multiplier applied to the weighted category sum.
    #[serde(default = "default_amplification")]
    pub amplification: f64,

    /// Scores strictly above this are Critical.
    #[serde(default = "default_critical_above")]
    pub critical_above: u8,

    /// Scores strictly above this are Elevated.
    #[serde(default = "default_elevated_above")]
    pub elevated_above: u8,

    /// Per-category weights.
    #[serde(default)]
    pub weights: WeightsConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            amplification: default_amplification(),
            critical_above: default_critical_above(),
            elevated_above: default_elevated_above(),
            weights: WeightsConfig::default(),
        }
    }
}

fn default_amplification() -> f64 {
    1.3
}

fn default_critical_above() -> u8 {
    75
}

fn default_elevated_above() -> u8 {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_military_weight")]
    pub military: f64,
    #[serde(default = "default_maritime_weight")]
    pub maritime: f64,
    #[serde(default = "default_minor_weight")]
    pub aviation: f64,
    #[serde(default = "default_minor_weight")]
    pub cyber: f64,
    #[serde(default = "default_minor_weight")]
    pub diplomacy: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            military: default_military_weight(),
            maritime: default_maritime_weight(),
            aviation: default_minor_weight(),
            cyber: default_minor_weight(),
            diplomacy: default_minor_weight(),
        }
    }
}

fn default_military_weight() -> f64 {
    0.35
}

fn default_maritime_weight() -> f64 {
    0.20
}

fn default_minor_weight() -> f64 {
    0.15
}

impl From<&ScoringConfig> for ScoringModel {
    fn from(config: &ScoringConfig) -> Self {
        Self {
            weights: Weights {
                military: config.weights.military,
                maritime: config.weights.maritime,
                aviation: config.weights.aviation,
                cyber: config.weights.cyber,
                diplomacy: config.weights.diplomacy,
            },
            amplification: config.amplification,
            critical_above: config.critical_above,
            elevated_above: config.elevated_above,
        }
    }
}

/// Auto-scan settings for watch mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between automatic OSINT sweeps.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_seconds: u64,

    /// Seconds between state document polls in watch mode.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,

    /// Number of analysis log entries to keep.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            scan_interval_seconds: default_scan_interval(),
            sync_interval_seconds: default_sync_interval(),
            log_capacity: default_log_capacity(),
        }
    }
}

fn default_scan_interval() -> u64 {
    1200 // 20 min
}

fn default_sync_interval() -> u64 {
    30
}

fn default_log_capacity() -> usize {
    5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Reject settings watch mode and the HTTP client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.schedule.scan_interval_seconds == 0 {
            bail!("[schedule] scan_interval_seconds must be at least 1");
        }
        if self.schedule.sync_interval_seconds == 0 {
            bail!("[schedule] sync_interval_seconds must be at least 1");
        }
        if self.model.timeout_seconds == 0 {
            bail!("[model] timeout_seconds must be at least 1");
        }
        if !self.model.temperature.is_finite() || self.model.temperature < 0.0 {
            bail!(
                "[model] temperature must be a non-negative number, got {}",
                self.model.temperature
            );
        }
        Ok(())
    }

    /// Scoring model described by this configuration, validated.
    pub fn scoring_model(&self) -> Result<ScoringModel> {
        let model = ScoringModel::from(&self.scoring);
        model.validate().context("Invalid [scoring] configuration")?;
        Ok(model)
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref api_url) = args.api_url {
            self.model.api_url = api_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(ref language) = args.language {
            self.model.sitrep_language = language.clone();
        }

        if let Some(interval) = args.interval {
            self.schedule.scan_interval_seconds = interval;
        }

        if let Some(ref state) = args.state {
            self.general.state_path = state.display().to_string();
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
