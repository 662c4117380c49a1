//! MIME types and the matching rules converters are selected by.
//!
//! A [`MimeType`] is a base type (`image/jpeg`) plus optional parameters
//! (`text/x-uri;accept-url`). Parameters without a value are flags. The base
//! type is compared case-insensitively.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{BrokerError, Result};

/// A string holding a URL.
pub const URL: &str = "text/x-uri";
/// A URL reachable from the local machine only.
pub const LOCAL_URL: &str = "text/x-local-uri";
/// A local URL served without TLS.
pub const INSECURE_LOCAL_URL: &str = "text/x-insecure-local-uri";
/// JSON-encoded [`crate::engine::FFmpegInput`].
pub const FFMPEG_INPUT: &str = "x-scrypted/x-ffmpeg-input";
/// Flag meaning "fetch and convert the resource at this URL".
pub const ACCEPT_URL_PARAMETER: &str = "accept-url";
/// Request wildcard: any produced type is acceptable.
pub const ANY: &str = "*";
/// Conventional spelling of [`ANY`].
pub const ANY_SUBTYPE: &str = "*/*";

const ACCEPT_PREFIX: &str = "accept-";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Param {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeType {
    essence: String,
    params: Vec<Param>,
}

/// Which rule made a pattern accept a concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Wildcard,
    AcceptParameter,
}

impl MimeType {
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(';');
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        if essence.is_empty() || essence.contains(char::is_whitespace) {
            return Err(BrokerError::InvalidMimeType(s.to_string()));
        }

        let params = parts
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| match p.split_once('=') {
                Some((name, value)) => Param {
                    name: name.trim().to_ascii_lowercase(),
                    value: Some(value.trim().to_string()),
                },
                None => Param {
                    name: p.to_ascii_lowercase(),
                    value: None,
                },
            })
            .collect();

        Ok(Self { essence, params })
    }

    /// The Url type flagged with the accept-url parameter.
    pub fn accept_url() -> Self {
        Self::from_static(URL).with_flag(ACCEPT_URL_PARAMETER)
    }

    /// Build from a constant known to be well formed.
    pub(crate) fn from_static(s: &'static str) -> Self {
        Self::parse(s).unwrap_or_else(|_| Self {
            essence: s.to_string(),
            params: Vec::new(),
        })
    }

    pub fn essence(&self) -> &str {
        &self.essence
    }

    pub fn with_flag(mut self, name: &str) -> Self {
        if !self.has_param(name) {
            self.params.push(Param {
                name: name.to_ascii_lowercase(),
                value: None,
            });
        }
        self
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .and_then(|p| p.value.as_deref())
    }

    fn accept_parameters(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.name.starts_with(ACCEPT_PREFIX))
            .map(|p| p.name.as_str())
    }

    /// `*` or `*/*`
    pub fn is_any(&self) -> bool {
        self.essence == ANY || self.essence == ANY_SUBTYPE
    }

    pub fn is_wildcard(&self) -> bool {
        self.is_any() || self.essence.ends_with("/*")
    }
}

/// Decide which rule, if any, lets `pattern` accept `concrete`.
///
/// Rules are tried in priority order: exact equality, wildcard suffix, then a
/// shared accept-parameter flag. Anything else is a non-match.
pub fn match_kind(pattern: &MimeType, concrete: &MimeType) -> Option<MatchKind> {
    if pattern == concrete {
        return Some(MatchKind::Exact);
    }

    if pattern.is_any() {
        return Some(MatchKind::Wildcard);
    }
    if let Some(prefix) = pattern.essence.strip_suffix('*') {
        if concrete.essence.starts_with(prefix) {
            return Some(MatchKind::Wildcard);
        }
    }

    if pattern
        .accept_parameters()
        .any(|flag| concrete.has_param(flag))
    {
        return Some(MatchKind::AcceptParameter);
    }

    None
}

pub fn accepts(pattern: &MimeType, concrete: &MimeType) -> bool {
    match_kind(pattern, concrete).is_some()
}

/// Whether a produced type fulfills a requested destination type.
pub fn satisfies(produced: &MimeType, requested: &MimeType) -> bool {
    requested.is_any() || accepts(requested, produced)
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)?;
        for param in &self.params {
            match &param.value {
                Some(value) => write!(f, ";{}={}", param.name, value)?,
                None => write!(f, ";{}", param.name)?,
            }
        }
        Ok(())
    }
}

impl FromStr for MimeType {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for MimeType {
    type Error = BrokerError;

    fn try_from(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for MimeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MimeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
