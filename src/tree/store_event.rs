use derive_more::Display;
use serde::{Deserialize, Deserializer};
use snafu::prelude::*;

/// Opaque version of an entry as reported by the store.
///
/// Depending on the server this is a CAS id or a revision number. It is only
/// ever displayed, never compared or interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Display, Deserialize)]
#[serde(untagged)]
pub enum VersionToken {
    #[display("{_0}")]
    Number(serde_json::Number),
    #[display("{_0}")]
    Text(String),
    #[default]
    #[display("")]
    Missing,
}

impl From<i64> for VersionToken {
    fn from(value: i64) -> Self {
        VersionToken::Number(value.into())
    }
}

impl From<&str> for VersionToken {
    fn from(value: &str) -> Self {
        VersionToken::Text(value.to_string())
    }
}

/// A single upsert pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreEvent {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Rev", alias = "Cas", default)]
    pub version: VersionToken,
    #[serde(rename = "Body", default, deserialize_with = "nullable_body")]
    pub body: String,
}

fn nullable_body<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl StoreEvent {
    pub fn new(
        path: impl Into<String>,
        version: impl Into<VersionToken>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
            body: body.into(),
        }
    }
}

impl TryFrom<&str> for StoreEvent {
    type Error = EventDecodeError;

    fn try_from(payload: &str) -> Result<Self, Self::Error> {
        serde_json::from_str(payload).context(JsonSnafu)
    }
}

#[derive(Debug, Snafu)]
pub enum EventDecodeError {
    #[snafu(display("Event payload is not a valid event record"))]
    JsonError { source: serde_json::Error },
}

/// The addressable part of an event path: the directory chain leading to
/// the entry and the entry's own name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPath<'a> {
    pub directories: Vec<&'a str>,
    pub basename: &'a str,
}

impl<'a> EventPath<'a> {
    /// Splits `path` on `/`, dropping the leading segment.
    ///
    /// Returns `None` when the path carries no basename.
    pub fn parse(path: &'a str) -> Option<Self> {
        let mut parts: Vec<&str> = path.split('/').collect();
        if parts.len() < 2 {
            return None;
        }

        let basename = parts.pop()?;
        if basename.is_empty() {
            return None;
        }
        let directories = parts.split_off(1);

        Some(EventPath {
            directories,
            basename,
        })
    }
}
