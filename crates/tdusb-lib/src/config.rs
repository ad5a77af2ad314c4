//! Application configuration — TOML-based, platform-aware paths.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::protocol::{LISTEN_TIMEOUT_MS, MAX_RETRIES, SOFT_DEADLINE_MS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Model used when a command omits one (e.g. `"IWT120"`). Empty = none.
    #[serde(default)]
    pub default_model: String,

    /// Per-receive HID timeout in milliseconds.
    #[serde(default = "default_listen_timeout_ms")]
    pub listen_timeout_ms: u64,

    /// Register reads give up an attempt after this long if only unrelated
    /// packets arrive.
    #[serde(default = "default_soft_deadline_ms")]
    pub soft_deadline_ms: u64,

    /// GET attempts per register read.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_listen_timeout_ms() -> u64 {
    LISTEN_TIMEOUT_MS
}
fn default_soft_deadline_ms() -> u64 {
    SOFT_DEADLINE_MS
}
fn default_max_retries() -> u32 {
    MAX_RETRIES
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_model: String::new(),
            listen_timeout_ms: default_listen_timeout_ms(),
            soft_deadline_ms: default_soft_deadline_ms(),
            max_retries: default_max_retries(),
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `default_model` names no supported device.
    UnknownModel(String),
    ZeroRetries,
    /// The transport timeout would always fire before the soft deadline.
    TimeoutNotBelowDeadline { listen_ms: u64, deadline_ms: u64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownModel(m) => write!(f, "Unknown default_model: {m}"),
            ValidationError::ZeroRetries => write!(f, "max_retries must be at least 1"),
            ValidationError::TimeoutNotBelowDeadline {
                listen_ms,
                deadline_ms,
            } => write!(
                f,
                "listen_timeout_ms ({listen_ms}) must be less than soft_deadline_ms ({deadline_ms})"
            ),
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("td-usb"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Check all fields, returning every problem found.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let model = self.default_model.trim();
        if !model.is_empty() && crate::models::find_model(model).is_none() {
            errors.push(ValidationError::UnknownModel(model.to_string()));
        }
        if self.max_retries == 0 {
            errors.push(ValidationError::ZeroRetries);
        }
        if self.listen_timeout_ms >= self.soft_deadline_ms {
            errors.push(ValidationError::TimeoutNotBelowDeadline {
                listen_ms: self.listen_timeout_ms,
                deadline_ms: self.soft_deadline_ms,
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding all problems into one [`TdError::Config`](crate::error::TdError).
    pub fn checked(self) -> crate::error::Result<Self> {
        match self.validate() {
            Ok(()) => Ok(self),
            Err(errors) => {
                let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                Err(crate::error::TdError::Config(msgs.join("; ")))
            }
        }
    }

    /// `default_model` if set.
    pub fn default_model(&self) -> Option<&str> {
        let m = self.default_model.trim();
        (!m.is_empty()).then_some(m)
    }
}
