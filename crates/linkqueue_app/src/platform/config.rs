//! `linkqueue.ron` loading. Every field has a default, so an empty or
//! missing file yields a usable configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use engine_logging::{engine_info, LogDestination};
use linkqueue_engine::{BreakSettings, ChannelSettings, PacingSettings, UploadSettings};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "linkqueue.ron";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum LogTarget {
    File,
    #[default]
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub destination: LogTarget,
    pub level: String,
    pub file: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            destination: LogTarget::Terminal,
            level: "info".to_string(),
            file: PathBuf::from("./linkqueue.log"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    /// Chrome profile directory; keeps the site login between sessions.
    pub profile_dir: Option<PathBuf>,
    pub start_url: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            profile_dir: None,
            start_url: "https://www.linkedin.com/feed/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub state_dir: PathBuf,
    pub site_host: String,
    pub log: LogConfig,
    pub browser: BrowserConfig,
    pub channel: ChannelSettings,
    pub pacing: PacingSettings,
    pub breaks: BreakSettings,
    pub upload: UploadSettings,
    /// How often the console polls for a status snapshot, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("./linkqueue_state"),
            site_host: "linkedin.com".to_string(),
            log: LogConfig::default(),
            browser: BrowserConfig::default(),
            channel: ChannelSettings::default(),
            pacing: PacingSettings::default(),
            breaks: BreakSettings::default(),
            upload: UploadSettings::default(),
            poll_interval_ms: 2_000,
        }
    }
}

impl AppConfig {
    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join("state.json")
    }
}

/// Reads the config at `path`. A missing file is not an error.
pub fn load(path: &Path) -> anyhow::Result<AppConfig> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(AppConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("reading config {}", path.display()));
        }
    };
    let config = parse(&content).with_context(|| format!("parsing config {}", path.display()))?;
    engine_info!("Loaded config from {:?}", path);
    Ok(config)
}

pub fn parse(content: &str) -> Result<AppConfig, ron::error::SpannedError> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    ron::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = parse(
            r#"(
                state_dir: "/tmp/lq",
                browser: (headless: true),
                breaks: (min: 60000, max: 120000),
            )"#,
        )
        .unwrap();

        assert_eq!(config.state_dir, PathBuf::from("/tmp/lq"));
        assert!(config.browser.headless);
        assert_eq!(config.breaks.min, Duration::from_secs(60));
        assert_eq!(config.breaks.poll_interval, Duration::from_secs(5));
        assert_eq!(config.pacing, PacingSettings::default());
        assert_eq!(config.site_host, "linkedin.com");
    }

    #[test]
    fn empty_and_missing_files_use_defaults() {
        assert_eq!(parse("  \n").unwrap(), AppConfig::default());

        let dir = tempfile::tempdir().unwrap();
        let loaded = load(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "(state_dir: 42)").unwrap();

        assert!(load(&path).is_err());
    }
}
