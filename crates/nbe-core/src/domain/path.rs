//! Setting paths: the `category.key` addressing scheme.
//!
//! ```text
//! *              every key of every category
//! boiler.*       every key of the `boiler` category
//! boiler.temp    one key
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when a path does not follow the `category.key` scheme.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid setting path {path:?}: {reason}")]
pub struct InvalidPath {
    pub path: String,
    pub reason: &'static str,
}

/// A parsed setting path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SettingPath {
    /// `*`
    All,
    /// `category.*`
    Category(String),
    /// `category.key`
    Key { category: String, key: String },
}

impl SettingPath {
    /// Builds a concrete `category.key` path.
    pub fn key(category: impl Into<String>, key: impl Into<String>) -> Self {
        SettingPath::Key {
            category: category.into(),
            key: key.into(),
        }
    }

    /// `true` for `*` and `category.*`.
    pub fn is_bulk(&self) -> bool {
        !matches!(self, SettingPath::Key { .. })
    }

    /// The category, if the path names one.
    pub fn category(&self) -> Option<&str> {
        match self {
            SettingPath::All => None,
            SettingPath::Category(c) | SettingPath::Key { category: c, .. } => Some(c),
        }
    }
}

impl FromStr for SettingPath {
    type Err = InvalidPath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| InvalidPath {
            path: s.to_string(),
            reason,
        };

        if s == "*" {
            return Ok(SettingPath::All);
        }
        let (category, key) = s
            .split_once('.')
            .ok_or_else(|| invalid("expected \"category.key\""))?;
        if category.is_empty() || category == "*" {
            return Err(invalid("category must not be empty or a wildcard"));
        }
        match key {
            "" => Err(invalid("key must not be empty")),
            "*" => Ok(SettingPath::Category(category.to_string())),
            _ => Ok(SettingPath::key(category, key)),
        }
    }
}

impl fmt::Display for SettingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingPath::All => f.write_str("*"),
            SettingPath::Category(c) => write!(f, "{c}.*"),
            SettingPath::Key { category, key } => write!(f, "{category}.{key}"),
        }
    }
}
