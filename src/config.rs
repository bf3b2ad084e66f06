//! Tracker configuration, optionally read from the environment.
//!
//! | variable                 | values                              | default |
//! |--------------------------|-------------------------------------|---------|
//! | `ALLOCHECK_COLOR`        | `auto`, `always`, `never`           | `auto`  |
//! | `ALLOCHECK_WARN_UNKNOWN` | `1`/`0`, `true`/`false`, `on`/`off` | on      |
//! | `ALLOCHECK_HISTORY`      | as above                            | on      |

use std::{env, str::FromStr};

use thiserror::Error;

pub const COLOR_VAR: &str = "ALLOCHECK_COLOR";
pub const WARN_UNKNOWN_VAR: &str = "ALLOCHECK_WARN_UNKNOWN";
pub const HISTORY_VAR: &str = "ALLOCHECK_HISTORY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is not one of `auto`, `always` or `never`")]
    InvalidColor { key: &'static str, value: String },
    #[error("{key}={value:?} is not a boolean")]
    InvalidFlag { key: &'static str, value: String },
    #[error("{key} is not valid unicode")]
    NotUnicode { key: &'static str },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorChoice {
    /// Color only when writing to a terminal
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub const fn enabled(self, is_terminal: bool) -> bool {
        match self {
            Self::Auto => is_terminal,
            Self::Always => true,
            Self::Never => false,
        }
    }
}

impl FromStr for ColorChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            _ => Err(()),
        }
    }
}

fn parse_flag(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { key, value }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub color: ColorChoice,
    /// Log a warning when a resize or release names an address the tracker
    /// never handed out
    pub warn_unknown: bool,
    /// List every lost block's full event history in reports
    pub show_history: bool,
}

impl Config {
    pub const DEFAULT: Self = Self {
        color: ColorChoice::Auto,
        warn_unknown: true,
        show_history: true,
    };

    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    pub const fn with_warn_unknown(mut self, warn_unknown: bool) -> Self {
        self.warn_unknown = warn_unknown;
        self
    }

    pub const fn with_show_history(mut self, show_history: bool) -> Self {
        self.show_history = show_history;
        self
    }

    /// Read the `ALLOCHECK_*` variables, using defaults for any that are
    /// unset
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode { key }),
        })
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<Option<String>, ConfigError>,
    {
        let mut config = Self::DEFAULT;
        if let Some(value) = lookup(COLOR_VAR)? {
            config.color = value.parse().map_err(|()| ConfigError::InvalidColor {
                key: COLOR_VAR,
                value,
            })?;
        }
        if let Some(value) = lookup(WARN_UNKNOWN_VAR)? {
            config.warn_unknown = parse_flag(WARN_UNKNOWN_VAR, value)?;
        }
        if let Some(value) = lookup(HISTORY_VAR)? {
            config.show_history = parse_flag(HISTORY_VAR, value)?;
        }
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
