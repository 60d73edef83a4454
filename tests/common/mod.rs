//! Common test helpers shared across the integration test suite.
//!
//! [`StubTransport`] serves canned bodies per URL and records every request,
//! so client tests can assert on the exact URLs and request counts without
//! network access.

#![allow(dead_code)]

use opc_connector::{CatalogConfig, OpcClient, Transport, TransportError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Base URL of the stub catalog.
pub const BASE: &str = "http://opc.test";

/// Database of the stub catalog.
pub const DB: &str = "1";

/// Session fragment issued by the stub catalog.
pub const SESSION: &str = "/COOKIE=abc";

/// Canned answer for one URL.
#[derive(Debug, Clone)]
pub enum Reply {
    Body(Vec<u8>),
    Fail(u16),
}

/// In-memory [`Transport`] answering from a URL table.
///
/// URLs without an entry answer with HTTP 404.
#[derive(Debug, Default)]
pub struct StubTransport {
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every answer, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn reply(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.into(), Reply::Body(body.into()));
    }

    pub fn fail(&self, url: impl Into<String>, status: u16) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.into(), Reply::Fail(status));
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for StubTransport {
    fn get(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        match self.replies.lock().unwrap().get(url) {
            Some(Reply::Body(body)) => Ok(body.clone()),
            Some(Reply::Fail(status)) => Err(TransportError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Install a test log subscriber once (honours `RUST_LOG`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration pointing at the stub catalog.
pub fn stub_config(max_read: usize, max_hits: usize) -> CatalogConfig {
    CatalogConfig::new(format!("{BASE}/"), DB)
        .with_max_read(max_read)
        .with_max_hits(max_hits)
        .with_accept_invalid_certs(false)
}

/// A client over `transport`.
pub fn stub_client(transport: &Arc<StubTransport>, config: CatalogConfig) -> OpcClient {
    init_tracing();
    OpcClient::builder(config)
        .transport(Arc::clone(transport) as Arc<dyn Transport>)
        .build()
        .expect("client with stub transport")
}

pub fn encode(term: &str) -> String {
    url::form_urlencoded::byte_serialize(term.as_bytes()).collect()
}

pub fn search_url(term: &str, index_key: &str, max_read: usize) -> String {
    format!(
        "{BASE}/XML=1.0/DB={DB}/SET=1/TTL=1/CMD?ACT=SRCHA&IKT={index_key}&SRT=YOP&SHRTST={max_read}&TRM={}",
        encode(term)
    )
}

pub fn family_url(ppn: &str, max_read: usize) -> String {
    format!("{BASE}/XML=1.0/DB={DB}/FAM?PPN={ppn}&SHRTST={max_read}")
}

pub fn next_url(pos: usize, max_read: usize) -> String {
    format!("{BASE}{SESSION}/XML=1.0/NXT?FRST={pos}&SHRTST={max_read}&NORND=ON")
}

pub fn raw_url(ppn: &str) -> String {
    format!("{BASE}/DB={DB}/PPN?PLAIN=ON&PPN={ppn}")
}

pub fn ikt_url() -> String {
    format!("{BASE}/XML=1.0/MENUIKTLIST")
}

/// PPNs `"{prefix}{n}"` for `n` in `range`.
pub fn ppns(prefix: &str, range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|n| format!("{prefix}{n}")).collect()
}

/// A result page; the session block is included when `with_session` is set.
pub fn page_xml(hits: Option<usize>, ppns: &[String], with_session: bool) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<RESULT>\n");
    match hits {
        Some(hits) => xml.push_str(&format!("  <SET hits=\"{hits}\">\n")),
        None => xml.push_str("  <SET>\n"),
    }
    for (nr, ppn) in ppns.iter().enumerate() {
        xml.push_str(&format!(
            "    <SHORTTITLE nr=\"{}\" PPN=\"{ppn}\">Titel {ppn}</SHORTTITLE>\n",
            nr + 1
        ));
    }
    xml.push_str("  </SET>\n");
    if with_session {
        xml.push_str("  <SESSION><SESSIONVAR name=\"COOKIE\">abc</SESSIONVAR></SESSION>\n");
    }
    xml.push_str("</RESULT>\n");
    xml
}

/// A plain PICA+ record from `(tag, [(code, value)])` pairs.
pub fn raw_record(fields: &[(&str, &[(char, &str)])]) -> Vec<u8> {
    let mut raw = String::new();
    for (tag, subfields) in fields {
        raw.push_str(tag);
        raw.push(' ');
        for (code, value) in *subfields {
            raw.push('\u{1F}');
            raw.push(*code);
            raw.push_str(value);
        }
        raw.push('\u{1E}');
    }
    raw.into_bytes()
}
