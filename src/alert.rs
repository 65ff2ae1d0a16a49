//! Alert identities.
//!
//! An [`AlertKey`] names one instance of an alert: the alert name plus the tag
//! group that distinguishes it from other instances, written `name{k=v,k2=v2}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::TagSet;

/// Errors produced while parsing an alert key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertKeyError {
    /// The key is missing its `{...}` group.
    #[error("alert key {0:?} must have the form name{{k=v,...}}")]
    MissingGroup(String),
    /// The group is not a list of `k=v` pairs.
    #[error("alert key {0:?} has an invalid tag group")]
    InvalidGroup(String),
}

/// Identity of one alert instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlertKey {
    name: String,
    group: TagSet,
}

impl AlertKey {
    /// Create an alert key from its parts.
    pub fn new(name: impl Into<String>, group: TagSet) -> Self {
        Self { name: name.into(), group }
    }

    /// Parse `name{k=v,...}`. The name may be empty; the braces may not.
    ///
    /// # Errors
    ///
    /// Returns `AlertKeyError` if the braces are missing or a pair lacks `=`.
    pub fn parse(s: &str) -> Result<Self, AlertKeyError> {
        let s = s.trim();
        let open = s.find('{').ok_or_else(|| AlertKeyError::MissingGroup(s.to_string()))?;
        if !s.ends_with('}') {
            return Err(AlertKeyError::MissingGroup(s.to_string()));
        }
        let name = s[..open].trim();
        if name.contains('}') {
            return Err(AlertKeyError::InvalidGroup(s.to_string()));
        }
        let group: TagSet =
            s[open..].parse().map_err(|_| AlertKeyError::InvalidGroup(s.to_string()))?;
        Ok(Self::new(name, group))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &TagSet {
        &self.group
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.group)
    }
}

impl FromStr for AlertKey {
    type Err = AlertKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AlertKey {
    type Error = AlertKeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<AlertKey> for String {
    fn from(ak: AlertKey) -> Self {
        ak.to_string()
    }
}
