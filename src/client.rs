//! The catalog session client.
//!
//! [`OpcClient`] talks to a PICA OPC through its hidden XML interface and the
//! plain PICA+ record view. All operations are blocking and safe to call from
//! many threads at once; results are memoized in a [`ResponseCache`] so that
//! repeated lookups inside the session window do not hit the network again.
//!
//! # Pagination
//!
//! The first search/family response carries the total hit count `H`, up to
//! `max_read` short titles and, when `H > max_read`, a session fragment. The
//! client derives `pages = H / max_read + (H % max_read > 0)` from the
//! server-reported `H` and requests the remaining pages by replaying the
//! session fragment with an advancing `FRST` cursor. It stops once `max_hits`
//! records are collected. A continuation page that fails is logged and
//! skipped; only a failing first page fails the operation.
//!
//! # Examples
//!
//! ```no_run
//! use opc_connector::{CatalogConfig, OpcClient};
//!
//! let client = OpcClient::new(CatalogConfig::new("https://opac.k10plus.de/", "2.1"))?;
//! let result = client.search("goethe faust", "1016")?;
//! println!("{} hits", result.total_hits());
//! for record in &result {
//!     println!("{}: {:?}", record.ppn(), record.title()?);
//! }
//! # Ok::<(), opc_connector::OpcError>(())
//! ```

use crate::cache::ResponseCache;
use crate::config::CatalogConfig;
use crate::encoding::decode_latin1;
use crate::error::{OpcError, Result, TransportError};
use crate::reader::parse_pica_plain;
use crate::record::{Field, Record, RecordLoader};
use crate::result::{HitSet, SearchResult};
use crate::transport::{HttpTransport, Transport};
use crate::xml::{decode_body, parse_index_keys, parse_result_page, IndexKey};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};
use url::Url;

/// A value memoized by the client.
#[derive(Debug, Clone)]
pub enum CachedResponse {
    /// Index-key menu
    IndexKeys(Arc<Vec<IndexKey>>),
    /// Hit list of a search or family operation
    Hits(Arc<HitSet>),
    /// Parsed fields of a raw record
    Fields(Arc<Vec<Field>>),
}

/// Builder for [`OpcClient`].
pub struct OpcClientBuilder {
    config: CatalogConfig,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<ResponseCache<CachedResponse>>>,
}

impl OpcClientBuilder {
    /// Use a custom transport instead of the default HTTP agent.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use (and possibly share) an existing cache.
    #[must_use]
    pub fn cache(mut self, cache: Arc<ResponseCache<CachedResponse>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the client.
    ///
    /// The configuration is validated lazily, per operation, so a client can
    /// be built before its endpoint is known.
    ///
    /// # Errors
    ///
    /// Returns [`OpcError::Config`] if the default HTTP transport cannot be
    /// set up.
    pub fn build(self) -> Result<OpcClient> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::for_trust(self.config.accept_invalid_certs)?),
        };
        let cache = self.cache.unwrap_or_default();

        Ok(OpcClient {
            inner: Arc::new(ClientInner {
                config: RwLock::new(Arc::new(self.config)),
                transport,
                cache,
            }),
        })
    }
}

impl fmt::Debug for OpcClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcClientBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Blocking client for a PICA online public catalog.
///
/// Cloning is cheap; clones share configuration, transport and cache.
#[derive(Clone)]
pub struct OpcClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: RwLock<Arc<CatalogConfig>>,
    transport: Arc<dyn Transport>,
    cache: Arc<ResponseCache<CachedResponse>>,
}

impl OpcClient {
    /// Create a client with the default transport and a private cache.
    ///
    /// # Errors
    ///
    /// See [`OpcClientBuilder::build`].
    pub fn new(config: CatalogConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start building a client.
    #[must_use]
    pub fn builder(config: CatalogConfig) -> OpcClientBuilder {
        OpcClientBuilder {
            config,
            transport: None,
            cache: None,
        }
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> Arc<CatalogConfig> {
        let guard = self.inner.config.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the configuration.
    ///
    /// Operations already running keep the configuration they started with.
    /// The TLS trust setting of the default transport is fixed at build time.
    pub fn set_config(&self, config: CatalogConfig) {
        let mut guard = self.inner.config.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(config);
    }

    /// Modify a copy of the configuration and install it.
    pub fn update_config<F>(&self, update: F)
    where
        F: FnOnce(&mut CatalogConfig),
    {
        let mut guard = self.inner.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut config = CatalogConfig::clone(&guard);
        update(&mut config);
        *guard = Arc::new(config);
    }

    /// The cache used by this client.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache<CachedResponse>> {
        &self.inner.cache
    }

    /// List the searchable index keys of the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`OpcError::Protocol`] if no usable endpoint is configured, the
    /// catalog cannot be reached, or the answer lacks the key list.
    pub fn index_keys(&self) -> Result<Vec<IndexKey>> {
        let config = self.config();
        let url = config
            .validate()
            .map_err(|e| OpcError::Protocol(format!("list index keys: {e}")))?;
        let key = cache_key(&url, &config, "iktlist");

        let cached = self.inner.cache.get_or_try_insert_with(&key, || {
            let page_url = format!("{}/XML=1.0/MENUIKTLIST", config.base());
            let body = self
                .request(&config, &page_url)
                .map_err(|e| OpcError::transport("list index keys", config.base(), &e))?;
            let keys = parse_index_keys(&decode_body(&body))
                .map_err(|e| OpcError::Protocol(format!("list index keys: {e}")))?;
            Ok(CachedResponse::IndexKeys(Arc::new(keys)))
        })?;

        match cached {
            CachedResponse::IndexKeys(keys) => Ok(keys.as_ref().clone()),
            other => Err(mismatch(&key, &other)),
        }
    }

    /// Search for `term` within the index `index_key`.
    ///
    /// # Errors
    ///
    /// Returns [`OpcError::Config`] if the endpoint configuration is unusable
    /// and [`OpcError::Protocol`] if the first page cannot be fetched or is
    /// malformed.
    pub fn search(&self, term: &str, index_key: &str) -> Result<SearchResult> {
        let config = self.config();
        let url = config.validate()?;
        let key = cache_key(&url, &config, &format!("{term}_{index_key}"));

        let hits = self.cached_hits(&key, || {
            info!(term, index_key, "Search OPC");
            let encoded: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
            let first = format!(
                "{}/XML=1.0/DB={}/SET=1/TTL=1/CMD?ACT=SRCHA&IKT={}&SRT=YOP&SHRTST={}&TRM={}",
                config.base(),
                config.database,
                index_key,
                config.max_read,
                encoded
            );
            self.collect_pages(&config, "search", term, &first)
        })?;

        Ok(SearchResult::from_hits(&hits, &self.loader()))
    }

    /// Search for `term` within the configured default index.
    ///
    /// # Errors
    ///
    /// See [`OpcClient::search`].
    pub fn search_all(&self, term: &str) -> Result<SearchResult> {
        let index_key = self.config().default_index_key.clone();
        self.search(term, &index_key)
    }

    /// Enumerate the records related to `ppn` (volumes, parts, editions).
    ///
    /// # Errors
    ///
    /// See [`OpcClient::search`].
    pub fn family(&self, ppn: &str) -> Result<SearchResult> {
        let config = self.config();
        let url = config.validate()?;
        let key = cache_key(&url, &config, &format!("fam_{ppn}"));

        let hits = self.cached_hits(&key, || {
            info!(ppn, "Enumerate member publications");
            let encoded: String = url::form_urlencoded::byte_serialize(ppn.as_bytes()).collect();
            let first = format!(
                "{}/XML=1.0/DB={}/FAM?PPN={}&SHRTST={}",
                config.base(),
                config.database,
                encoded,
                config.max_read
            );
            self.collect_pages(&config, "family", ppn, &first)
        })?;

        Ok(SearchResult::from_hits(&hits, &self.loader()))
    }

    /// Fetch and parse the record `ppn`.
    ///
    /// # Errors
    ///
    /// Returns [`OpcError::NotFound`] if the catalog has no data for `ppn`,
    /// [`OpcError::Config`] for an unusable endpoint configuration and
    /// [`OpcError::Protocol`] if the catalog cannot be reached.
    pub fn fetch_record(&self, ppn: &str) -> Result<Record> {
        let fields = self.fetch_fields(ppn)?;
        Ok(Record::with_fields(ppn, fields))
    }

    /// Fetch the parsed PICA+ fields of `ppn`.
    ///
    /// # Errors
    ///
    /// See [`OpcClient::fetch_record`].
    pub fn fetch_fields(&self, ppn: &str) -> Result<Vec<Field>> {
        let config = self.config();
        let url = config.validate()?;
        let key = cache_key(&url, &config, &format!("raw_{ppn}"));

        let cached = self.inner.cache.get_or_try_insert_with(&key, || {
            let encoded: String = url::form_urlencoded::byte_serialize(ppn.as_bytes()).collect();
            let raw_url = format!(
                "{}/DB={}/PPN?PLAIN=ON&PPN={}",
                config.base(),
                config.database,
                encoded
            );
            let body = self.request(&config, &raw_url).map_err(|e| {
                if e.is_not_found() {
                    OpcError::NotFound(format!("record {ppn} ({})", e.url()))
                } else {
                    OpcError::transport("fetch record", ppn, &e)
                }
            })?;

            let fields = parse_pica_plain(&decode_latin1(&body));
            if fields.is_empty() {
                return Err(OpcError::NotFound(format!("no PICA+ data for record {ppn}")));
            }
            Ok(CachedResponse::Fields(Arc::new(fields)))
        })?;

        match cached {
            CachedResponse::Fields(fields) => Ok(fields.as_ref().clone()),
            other => Err(mismatch(&key, &other)),
        }
    }

    fn cached_hits<F>(&self, key: &str, compute: F) -> Result<Arc<HitSet>>
    where
        F: FnOnce() -> Result<HitSet>,
    {
        let cached = self
            .inner
            .cache
            .get_or_try_insert_with(key, || compute().map(|hits| CachedResponse::Hits(Arc::new(hits))))?;
        match cached {
            CachedResponse::Hits(hits) => Ok(hits),
            other => Err(mismatch(key, &other)),
        }
    }

    /// Fetch the first page at `first_url` and every continuation page.
    fn collect_pages(
        &self,
        config: &CatalogConfig,
        operation: &str,
        subject: &str,
        first_url: &str,
    ) -> Result<HitSet> {
        let body = self
            .request(config, first_url)
            .map_err(|e| OpcError::transport(operation, subject, &e))?;
        let page = parse_result_page(&decode_body(&body))
            .map_err(|e| OpcError::Protocol(format!("{operation} \"{subject}\": {e}")))?;
        let total_hits = page.hits.ok_or_else(|| {
            OpcError::Protocol(format!("{operation} \"{subject}\": result set without hit count"))
        })?;

        let cap = config.max_hits;
        let read = config.max_read;
        let mut ppns = page.ppns;

        if total_hits > read {
            let pages = total_hits / read + usize::from(total_hits % read > 0);
            info!(
                hits = total_hits,
                reads = pages - 1,
                max_read = read,
                "found entries, reading remaining pages"
            );

            let session = page
                .session
                .ok_or_else(|| {
                    OpcError::Protocol(format!(
                        "{operation} \"{subject}\": {total_hits} hits but no session to continue"
                    ))
                })?
                .to_path();

            let mut pos = 1;
            for part in 1..pages {
                if ppns.len() >= cap {
                    break;
                }
                pos += read;
                info!(
                    part,
                    of = pages - 1,
                    from = pos,
                    to = (pos + read - 1).min(total_hits),
                    "read part"
                );

                let next_url = format!(
                    "{}{}/XML=1.0/NXT?FRST={}&SHRTST={}&NORND=ON",
                    config.base(),
                    session,
                    pos,
                    read
                );
                let next = self
                    .request(config, &next_url)
                    .map_err(|e| OpcError::transport(operation, subject, &e))
                    .and_then(|body| parse_result_page(&decode_body(&body)));
                match next {
                    Ok(next) => ppns.extend(next.ppns),
                    Err(err) => warn!(part, url = %next_url, error = %err, "skipping continuation page"),
                }
            }
        } else {
            info!(hits = total_hits, "found entries");
        }

        ppns.truncate(cap);
        Ok(HitSet { total_hits, ppns })
    }

    fn request(&self, config: &CatalogConfig, url: &str) -> std::result::Result<Vec<u8>, TransportError> {
        self.inner.transport.get(url, config.timeout)
    }

    fn loader(&self) -> Arc<dyn RecordLoader> {
        Arc::new(self.clone())
    }
}

impl RecordLoader for OpcClient {
    fn load_fields(&self, ppn: &str) -> Result<Vec<Field>> {
        self.fetch_fields(ppn)
    }
}

impl fmt::Debug for OpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcClient")
            .field("config", &self.config())
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

/// Cache key namespaced by catalog host and database.
fn cache_key(url: &Url, config: &CatalogConfig, payload: &str) -> String {
    format!(
        "{}_{}-{}",
        url.host_str().unwrap_or_default(),
        config.database,
        payload
    )
}

fn mismatch(key: &str, found: &CachedResponse) -> OpcError {
    OpcError::Protocol(format!("unexpected cache entry for {key}: {found:?}"))
}
