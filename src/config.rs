use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::harness::expectation::Expectation;
use crate::harness::registry::DEFAULT_SLOT_CEILING;
use crate::harness::timeouts::TimeoutPolicy;
use crate::probe::Probe;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file '{}': {}", .path.display(), .source)]
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    #[error("failed to parse config file '{}': {}", .path.display(), .source)]
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Invalid regex pattern.
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidRegex { pattern: String, source: regex::Error },
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Deserialize)]
struct ConfigFile {
    telegram_bot_token: String,
    /// Private chat with the peer under test. Must be a user who has started
    /// the controlling bot; Telegram never delivers bot messages to bots, and
    /// groups or channels (negative ids) hide other bots' replies.
    peer_chat_id: i64,
    #[serde(default = "default_max_wait_secs")]
    max_wait_secs: f64,
    /// Extra wait for follow-up messages. `null` disables it.
    #[serde(default = "default_wait_consecutive_secs")]
    wait_consecutive_secs: Option<f64>,
    #[serde(default = "default_true")]
    raise_on_timeout: bool,
    /// Minimum spacing between interactions with the peer.
    #[serde(default = "default_global_action_delay_secs")]
    global_action_delay_secs: f64,
    #[serde(default = "default_fault_cooldown_secs")]
    fault_cooldown_secs: f64,
    #[serde(default = "default_slot_ceiling")]
    slot_ceiling: i32,
    /// Directory for logs. Defaults to current directory.
    data_dir: Option<String>,
    #[serde(default)]
    probes: Vec<ProbeFile>,
}

#[derive(Deserialize)]
struct ProbeFile {
    send: String,
    /// Shorthand for equal min and max.
    expect_count: Option<usize>,
    expect_min: Option<usize>,
    expect_max: Option<usize>,
    /// Regex the full response text must match.
    expect_pattern: Option<String>,
    max_wait_secs: Option<f64>,
}

fn default_max_wait_secs() -> f64 {
    20.0
}

fn default_wait_consecutive_secs() -> Option<f64> {
    Some(2.0)
}

fn default_true() -> bool {
    true
}

fn default_global_action_delay_secs() -> f64 {
    0.8
}

fn default_fault_cooldown_secs() -> f64 {
    60.0
}

fn default_slot_ceiling() -> i32 {
    DEFAULT_SLOT_CEILING
}

pub struct Config {
    /// Path the config was loaded from.
    pub config_path: PathBuf,
    pub telegram_bot_token: String,
    pub peer_chat_id: i64,
    /// Default timeouts for every interaction.
    pub policy: TimeoutPolicy,
    pub global_action_delay: Duration,
    pub fault_cooldown: Duration,
    pub slot_ceiling: i32,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
    pub probes: Vec<Probe>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }
        if file.peer_chat_id == 0 {
            return Err(ConfigError::Validation("peer_chat_id is required".into()));
        }
        if file.peer_chat_id < 0 {
            return Err(ConfigError::Validation(
                "peer_chat_id must be a private chat with a user (positive id), not a group or channel".into()
            ));
        }
        if file.slot_ceiling >= 0 {
            return Err(ConfigError::Validation("slot_ceiling must be negative".into()));
        }

        let policy = TimeoutPolicy {
            max_wait: positive_secs("max_wait_secs", file.max_wait_secs)?,
            wait_consecutive: file
                .wait_consecutive_secs
                .map(|s| secs("wait_consecutive_secs", s))
                .transpose()?,
            raise_on_timeout: file.raise_on_timeout,
        };

        let probes = file
            .probes
            .into_iter()
            .map(|p| build_probe(p, &policy))
            .collect::<Result<Vec<_>, _>>()?;

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            config_path,
            telegram_bot_token: file.telegram_bot_token,
            peer_chat_id: file.peer_chat_id,
            policy,
            global_action_delay: secs("global_action_delay_secs", file.global_action_delay_secs)?,
            fault_cooldown: secs("fault_cooldown_secs", file.fault_cooldown_secs)?,
            slot_ceiling: file.slot_ceiling,
            data_dir,
            probes,
        })
    }
}

fn secs(field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ConfigError::Validation(format!("{field} must be a non-negative number of seconds: {e}")))
}

fn positive_secs(field: &str, value: f64) -> Result<Duration, ConfigError> {
    let duration = secs(field, value)?;
    if duration.is_zero() {
        return Err(ConfigError::Validation(format!("{field} must be greater than zero")));
    }
    Ok(duration)
}

fn build_probe(file: ProbeFile, defaults: &TimeoutPolicy) -> Result<Probe, ConfigError> {
    if file.send.trim().is_empty() {
        return Err(ConfigError::Validation("probe text must not be empty".into()));
    }

    let expectation = match (file.expect_count, file.expect_min, file.expect_max) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            return Err(ConfigError::Validation(format!(
                "probe '{}': expect_count cannot be combined with expect_min/expect_max",
                file.send
            )));
        }
        (Some(count), None, None) => Expectation::exactly(count),
        (None, min, max) => Expectation { min_messages: min, max_messages: max },
    };
    if let (Some(min), Some(max)) = (expectation.min_messages, expectation.max_messages)
        && min > max
    {
        return Err(ConfigError::Validation(format!(
            "probe '{}': expect_min ({min}) exceeds expect_max ({max})",
            file.send
        )));
    }

    let pattern = file
        .expect_pattern
        .map(|p| Regex::new(&p).map_err(|e| ConfigError::InvalidRegex { pattern: p, source: e }))
        .transpose()?;

    let mut policy = defaults.clone();
    if let Some(max_wait) = file.max_wait_secs {
        policy.max_wait = positive_secs("max_wait_secs", max_wait)?;
    }

    Ok(Probe {
        send: file.send,
        expectation,
        pattern,
        policy,
    })
}
