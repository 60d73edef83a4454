//! Configuration of a catalog endpoint.
//!
//! This module provides the [`CatalogConfig`] struct which names the catalog
//! to talk to and bounds how much of a result set is read from it.

use crate::error::{OpcError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;
use url::Url;

/// Default catalog base URL (GBV union catalog).
pub const DEFAULT_URL: &str = "http://gso.gbv.de/";

/// Default database identifier.
pub const DEFAULT_DATABASE: &str = "2.1";

/// Default index key for unqualified free-text searches ("all words").
pub const DEFAULT_INDEX_KEY: &str = "1016";

/// Configuration for a catalog endpoint.
///
/// # Examples
///
/// ```
/// use opc_connector::CatalogConfig;
/// use std::time::Duration;
///
/// let config = CatalogConfig::new("https://opac.example.org/", "1")
///     .with_max_hits(100)
///     .with_max_read(50)
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.database, "1");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog base URL.
    pub url: String,

    /// Database identifier (`DB=` path segment).
    pub database: String,

    /// Maximum number of records ever returned for one search/family call.
    pub max_hits: usize,

    /// Number of records requested per network round trip.
    pub max_read: usize,

    /// Timeout applied to every individual HTTP request.
    #[serde(
        rename = "timeout_ms",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub timeout: Duration,

    /// Accept self-signed or otherwise unverifiable TLS certificates.
    ///
    /// Only affects the HTTP agent owned by the client built from this
    /// configuration.
    pub accept_invalid_certs: bool,

    /// Index key used by [`OpcClient::search_all`](crate::OpcClient::search_all).
    pub default_index_key: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            max_hits: 500,
            max_read: 250,
            timeout: Duration::from_millis(10_000),
            accept_invalid_certs: true,
            default_index_key: DEFAULT_INDEX_KEY.to_string(),
        }
    }
}

impl CatalogConfig {
    /// Creates a configuration for the given URL and database with default limits.
    #[must_use]
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Sets the maximum number of records returned per operation.
    #[must_use]
    pub const fn with_max_hits(mut self, max_hits: usize) -> Self {
        self.max_hits = max_hits;
        self
    }

    /// Sets the number of records read per request.
    #[must_use]
    pub const fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables acceptance of unverifiable TLS certificates.
    #[must_use]
    pub const fn with_accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    /// Sets the index key used for unqualified searches.
    #[must_use]
    pub fn with_default_index_key(mut self, key: impl Into<String>) -> Self {
        self.default_index_key = key.into();
        self
    }

    /// Checks the configuration and returns the parsed base URL.
    ///
    /// # Errors
    ///
    /// Returns [`OpcError::Config`] if the URL is empty, unparseable or has no
    /// host, or if the page size or the result cap is zero.
    pub fn validate(&self) -> Result<Url> {
        if self.url.trim().is_empty() {
            return Err(OpcError::Config("No OPC URL was set.".to_string()));
        }
        let url = Url::parse(self.url.trim())
            .map_err(|e| OpcError::Config(format!("Invalid url: {} ({e})", self.url)))?;
        if url.host_str().is_none() {
            return Err(OpcError::Config(format!("Invalid url: {} (no host)", self.url)));
        }
        if self.max_read == 0 {
            return Err(OpcError::Config("max_read must be greater than zero".to_string()));
        }
        if self.max_hits == 0 {
            return Err(OpcError::Config("max_hits must be greater than zero".to_string()));
        }
        Ok(url)
    }

    /// The base URL without trailing slashes, ready for path suffixes.
    pub(crate) fn base(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

fn deserialize_millis<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}
