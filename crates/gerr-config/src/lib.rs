// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration for status-code tables.
//!
//! A [`StatusMapConfig`] names a fallback transport code and a table from
//! application status codes to transport codes. It is read from TOML:
//!
//! ```toml
//! fallback = "internal"
//!
//! [codes]
//! 404 = "not_found"
//! 409 = "ALREADY_EXISTS"
//! 429 = "8"
//! ```
//!
//! Transport codes may be spelled in `snake_case`, `SCREAMING_SNAKE_CASE`,
//! `CamelCase`, or as their numeric value. [`StatusMapConfig::to_status_map`]
//! turns a validated config into a [`StatusCodeMap`] for
//! `gerr_handler::combinators::map_status_code`.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use gerr_handler::StatusCodeMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hash;
use std::path::Path;
use std::str::FromStr;
use tonic::Code;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or applying a status-map config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file could not be read.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file is not valid TOML or does not match the expected shape.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Parser detail.
        reason: String,
    },

    /// Semantic validation failed.
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// One message per problem found.
        reasons: Vec<String>,
    },

    /// A table key is not a valid application status code.
    #[error("invalid application status code '{key}': {reason}")]
    InvalidKey {
        /// The offending key as written.
        key: String,
        /// Why it did not parse.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Issues that do not stop the table from working but are probably mistakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// An application code maps to `OK`, so clients see success for a failed
    /// call.
    OkTarget {
        /// The application status code.
        key: String,
    },
    /// The fallback is `OK`.
    OkFallback,
    /// No codes are configured, so every error gets the fallback.
    EmptyTable,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::OkTarget { key } => {
                write!(f, "application code '{key}' maps to ok")
            }
            ConfigWarning::OkFallback => f.write_str("fallback code is ok"),
            ConfigWarning::EmptyTable => {
                f.write_str("no codes configured; every error uses the fallback")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config type
// ---------------------------------------------------------------------------

/// Env var overriding [`StatusMapConfig::fallback`].
pub const FALLBACK_ENV: &str = "GERR_FALLBACK_CODE";

const DEFAULT_FALLBACK: &str = "internal";

fn default_fallback() -> String {
    DEFAULT_FALLBACK.into()
}

/// Status-code table as written in configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StatusMapConfig {
    /// Transport code for application codes missing from `codes`.
    #[serde(default = "default_fallback")]
    pub fallback: String,

    /// Application status code to transport code name.
    #[serde(default)]
    pub codes: BTreeMap<String, String>,
}

impl Default for StatusMapConfig {
    fn default() -> Self {
        Self {
            fallback: default_fallback(),
            codes: BTreeMap::new(),
        }
    }
}

impl StatusMapConfig {
    /// Build the runtime table.
    ///
    /// Keys are parsed with `C::from_str` after trimming. Call
    /// [`validate_config`] first; unknown code names and keys that parse to
    /// the same application code (`"7"` and `" 7"`, or `"7"` and `"07"` for
    /// integers) are reported here as a [`ConfigError::ValidationError`] as
    /// well.
    pub fn to_status_map<C>(&self) -> Result<StatusCodeMap<C>, ConfigError>
    where
        C: FromStr + Eq + Hash,
        C::Err: std::fmt::Display,
    {
        let fallback = parse_code(&self.fallback).ok_or_else(|| ConfigError::ValidationError {
            reasons: vec![unknown_code("fallback", &self.fallback)],
        })?;
        let mut map = StatusCodeMap::new(fallback);
        let mut reasons = Vec::new();
        for (key, name) in &self.codes {
            let code = parse_code(name).ok_or_else(|| ConfigError::ValidationError {
                reasons: vec![unknown_code(&format!("codes.{key}"), name)],
            })?;
            let app = key.trim().parse::<C>().map_err(|e| ConfigError::InvalidKey {
                key: key.clone(),
                reason: e.to_string(),
            })?;
            if map.insert(app, code).is_some() {
                reasons.push(format!(
                    "codes: '{key}' names an application status code already in the table"
                ));
            }
        }
        if reasons.is_empty() {
            Ok(map)
        } else {
            Err(ConfigError::ValidationError { reasons })
        }
    }
}

// ---------------------------------------------------------------------------
// Code names
// ---------------------------------------------------------------------------

const CODES: &[(&str, Code)] = &[
    ("ok", Code::Ok),
    ("cancelled", Code::Cancelled),
    ("unknown", Code::Unknown),
    ("invalid_argument", Code::InvalidArgument),
    ("deadline_exceeded", Code::DeadlineExceeded),
    ("not_found", Code::NotFound),
    ("already_exists", Code::AlreadyExists),
    ("permission_denied", Code::PermissionDenied),
    ("resource_exhausted", Code::ResourceExhausted),
    ("failed_precondition", Code::FailedPrecondition),
    ("aborted", Code::Aborted),
    ("out_of_range", Code::OutOfRange),
    ("unimplemented", Code::Unimplemented),
    ("internal", Code::Internal),
    ("unavailable", Code::Unavailable),
    ("data_loss", Code::DataLoss),
    ("unauthenticated", Code::Unauthenticated),
];

fn squash(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Parse a transport code name or number.
///
/// ```
/// use gerr_config::parse_code;
/// use tonic::Code;
///
/// assert_eq!(parse_code("not_found"), Some(Code::NotFound));
/// assert_eq!(parse_code("NOT_FOUND"), Some(Code::NotFound));
/// assert_eq!(parse_code("NotFound"), Some(Code::NotFound));
/// assert_eq!(parse_code("5"), Some(Code::NotFound));
/// assert_eq!(parse_code("17"), None);
/// ```
pub fn parse_code(name: &str) -> Option<Code> {
    let name = name.trim();
    if let Ok(n) = name.parse::<usize>() {
        return CODES.get(n).map(|(_, code)| *code);
    }
    let wanted = squash(name);
    CODES
        .iter()
        .find(|(known, _)| squash(known) == wanted)
        .map(|(_, code)| *code)
}

/// Canonical `snake_case` name of a transport code.
pub fn code_name(code: Code) -> &'static str {
    CODES
        .iter()
        .find(|(_, known)| *known == code)
        .map_or("unknown", |(name, _)| name)
}

fn unknown_code(field: &str, value: &str) -> String {
    format!("{field}: unknown status code '{value}'")
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`StatusMapConfig`] from an optional TOML file.
///
/// * `Some(path)` reads and parses the file.
/// * `None` starts from [`StatusMapConfig::default()`].
///
/// Environment overrides are applied in both cases.
pub fn load_config(path: Option<&Path>) -> Result<StatusMapConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => StatusMapConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`StatusMapConfig`].
pub fn parse_toml(content: &str) -> Result<StatusMapConfig, ConfigError> {
    toml::from_str::<StatusMapConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `GERR_FALLBACK_CODE`
pub fn apply_env_overrides(config: &mut StatusMapConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

fn apply_overrides_from(config: &mut StatusMapConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup(FALLBACK_ENV) {
        config.fallback = val;
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a configuration, returning advisory warnings.
///
/// Unknown code names, empty keys, and keys that collide once surrounding
/// whitespace is trimmed are errors.
pub fn validate_config(config: &StatusMapConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    match parse_code(&config.fallback) {
        None => errors.push(unknown_code("fallback", &config.fallback)),
        Some(Code::Ok) => warnings.push(ConfigWarning::OkFallback),
        Some(_) => {}
    }

    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for (key, name) in &config.codes {
        let trimmed = key.trim();
        if trimmed.is_empty() {
            errors.push("codes: application status code must not be empty".into());
            continue;
        }
        if let Some(first) = seen.insert(trimmed, key) {
            errors.push(format!(
                "codes: '{first}' and '{key}' name the same application status code"
            ));
        }
        match parse_code(name) {
            None => errors.push(unknown_code(&format!("codes.{key}"), name)),
            Some(Code::Ok) => warnings.push(ConfigWarning::OkTarget {
                key: trimmed.to_string(),
            }),
            Some(_) => {}
        }
    }

    if config.codes.is_empty() {
        warnings.push(ConfigWarning::EmptyTable);
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
