use std::fmt;

/// Stable, unique identity of a tracked site (spec §3 "Site (primary
/// entity)"). A thin newtype so call sites can't accidentally pass a
/// `RunId` or a raw scraper label where a subdomain is expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Subdomain(String);

impl Subdomain {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subdomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Subdomain {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Subdomain {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Correlation id threaded through every job spawned by one fetch (spec §3
/// "Run"). Opaque besides its `{subdomain}_{timestamp}` convention and the
/// `_recovered` suffix the reconciler appends when it rescues a stuck site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RunId(String);

impl RunId {
    pub fn new(subdomain: &Subdomain, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        Self(format!("{}_{}", subdomain.as_str(), timestamp.timestamp()))
    }

    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A fresh run id derived from this one, marked as reconciler-recovered
    /// (spec §4.5 "enqueue a fresh ocr-coordinator with a synthetic run_id
    /// marked recovered").
    pub fn recovered(&self) -> Self {
        Self(format!("{}_recovered", self.0))
    }

    pub fn is_recovered(&self) -> bool {
        self.0.ends_with("_recovered")
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
