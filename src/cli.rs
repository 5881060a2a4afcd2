//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Defcon Tracker - OSINT escalation indicator tracker
///
/// Tracks a fixed matrix of escalation indicators across five categories,
/// combines them into a single escalation probability and optionally asks a
/// hosted model to refresh the matrix, write a SITREP or read it aloud.
///
/// Examples:
///   defcon-tracker
///   defcon-tracker --set military.ussGeorgia=95 --set cyber.gpsJamming=80
///   defcon-tracker --analyze --sitrep --voice briefing.wav
///   defcon-tracker --watch --interval 600
///   defcon-tracker --format json --output -
///   defcon-tracker --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Set an indicator, as CATEGORY.KEY=VALUE (repeatable)
    ///
    /// Values outside 0-100 are clamped.
    #[arg(long = "set", value_name = "CATEGORY.KEY=VALUE", value_parser = parse_assignment)]
    pub set: Vec<Assignment>,

    /// Merge indicator values from a JSON file of the snapshot shape
    #[arg(long, value_name = "FILE")]
    pub import: Option<PathBuf>,

    /// Reset every indicator to its baseline value
    #[arg(long)]
    pub reset: bool,

    /// Run one OSINT sweep through the model and merge the result
    #[arg(long)]
    pub analyze: bool,

    /// Generate a strategic SITREP for the current matrix
    #[arg(long)]
    pub sitrep: bool,

    /// Write a spoken briefing of the SITREP to this WAV file
    #[arg(long, value_name = "FILE", requires = "sitrep")]
    pub voice: Option<PathBuf>,

    /// Keep running and sweep on a schedule until interrupted
    #[arg(long)]
    pub watch: bool,

    /// Seconds between scheduled sweeps in watch mode
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model to use for sweeps and SITREPs
    #[arg(short, long, env = "DEFCON_MODEL")]
    pub model: Option<String>,

    /// Generative language API base URL
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Language of the SITREP
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .defcon.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the shared state document
    #[arg(long, value_name = "FILE", env = "DEFCON_STATE")]
    pub state: Option<PathBuf>,

    /// Do not read or write the state document
    #[arg(long)]
    pub no_sync: bool,

    /// Output file for the dashboard report ("-" for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Exit with code 2 when the threat level is Critical
    #[arg(long)]
    pub fail_on_critical: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .defcon.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// One `--set` edit.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub category: String,
    pub key: String,
    pub value: f64,
}

/// Parse `CATEGORY.KEY=VALUE`. Names are checked later against the taxonomy.
pub fn parse_assignment(s: &str) -> Result<Assignment, String> {
    let (target, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY.KEY=VALUE, got '{}'", s))?;

    let (category, key) = target
        .trim()
        .split_once('.')
        .ok_or_else(|| format!("expected CATEGORY.KEY before '=', got '{}'", target))?;

    if category.is_empty() || key.is_empty() {
        return Err(format!("empty category or key in '{}'", s));
    }

    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;

    Ok(Assignment {
        category: category.to_string(),
        key: key.to_string(),
        value,
    })
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether this run talks to the model.
    pub fn needs_model(&self) -> bool {
        self.analyze || self.sitrep || self.watch
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(interval) = self.interval {
            if interval == 0 {
                return Err("Interval must be at least 1 second".to_string());
            }
        }

        if self.needs_model() && self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(
                "A Gemini API key is required for --analyze, --sitrep and --watch \
                 (set GEMINI_API_KEY or --api-key)"
                    .to_string(),
            );
        }

        if let Some(ref import) = self.import {
            if !import.is_file() {
                return Err(format!("Import file does not exist: {}", import.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            set: vec![],
            import: None,
            reset: false,
            analyze: false,
            sitrep: false,
            voice: None,
            watch: false,
            interval: None,
            api_key: None,
            model: None,
            api_url: None,
            timeout: None,
            language: None,
            config: None,
            state: None,
            no_sync: false,
            output: None,
            format: OutputFormat::Markdown,
            fail_on_critical: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("military.ussGeorgia=95").unwrap(),
            Assignment {
                category: "military".to_string(),
                key: "ussGeorgia".to_string(),
                value: 95.0,
            }
        );
        assert_eq!(parse_assignment("cyber.gpsJamming = 12.5").unwrap().value, 12.5);
        assert!(parse_assignment("military.ussGeorgia").is_err());
        assert!(parse_assignment("ussGeorgia=95").is_err());
        assert!(parse_assignment("military.=95").is_err());
        assert!(parse_assignment("military.ussGeorgia=high").is_err());
    }

    #[test]
    fn test_cli_parses_repeated_set() {
        let args = Args::try_parse_from([
            "defcon-tracker",
            "--set",
            "military.ussGeorgia=95",
            "--set",
            "cyber.gpsJamming=10",
        ])
        .unwrap();
        assert_eq!(args.set.len(), 2);
        assert_eq!(args.set[1].key, "gpsJamming");
    }

    #[test]
    fn test_voice_requires_sitrep() {
        let result = Args::try_parse_from(["defcon-tracker", "--voice", "out.wav"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_requires_api_key() {
        let mut args = make_args();
        args.analyze = true;
        assert!(args.validate().is_err());

        args.api_key = Some("  ".to_string());
        assert!(args.validate().is_err());

        args.api_key = Some("secret".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.api_url = Some("generativelanguage.googleapis.com".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_interval() {
        let mut args = make_args();
        args.interval = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
