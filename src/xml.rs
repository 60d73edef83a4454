//! Parsing of OPC XML responses.
//!
//! The catalog's hidden XML interface (`/XML=1.0/...`) answers with small
//! documents whose root element holds a handful of well-known children:
//!
//! ```xml
//! <RESULT>
//!   <SET hits="237">
//!     <SHORTTITLE nr="1" PPN="123456789">...</SHORTTITLE>
//!   </SET>
//!   <SESSION>
//!     <SESSIONVAR name="COOKIE">1.1,E5f3</SESSIONVAR>
//!   </SESSION>
//! </RESULT>
//! ```
//!
//! The index-key menu answers with an `IKTLIST` child instead, each entry
//! carrying the key as text and `mnemonic`/`description` attributes.

use crate::error::{OpcError, Result};
use lazy_static::lazy_static;
use quick_xml::de::from_str as xml_from_str;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref XML_ENCODING: Regex =
        Regex::new(r#"^\s*<\?xml[^>]*encoding\s*=\s*["']([A-Za-z0-9._-]+)["']"#).unwrap();
}

/// A searchable index of the catalog (IKT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKey {
    /// Numeric index key (`IKT=` parameter)
    pub key: String,
    /// Search mnemonic usable in query strings (e.g. `tit`, `sgn`)
    pub mnemonic: String,
    /// Human readable description
    pub description: String,
}

/// One page of a search or family result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPage {
    /// Total hits reported by the server, if the page carries the attribute
    pub hits: Option<usize>,
    /// PPNs of the short titles on this page, in server order
    pub ppns: Vec<String>,
    /// Session continuation state, if the server sent one
    pub session: Option<SessionState>,
}

/// Server-issued session variables that must be replayed on continuation
/// requests.
///
/// The values are opaque; they are only re-serialized, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    vars: Vec<(String, String)>,
}

impl SessionState {
    /// Create a session state from name/value pairs in server order.
    #[must_use]
    pub fn new(vars: Vec<(String, String)>) -> Self {
        SessionState { vars }
    }

    /// The session variables in server order.
    #[must_use]
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    /// Serialize as path segments: `/name=value` per variable, values form-encoded.
    ///
    /// # Examples
    ///
    /// ```
    /// use opc_connector::xml::SessionState;
    ///
    /// let session = SessionState::new(vec![
    ///     ("COOKIE".to_string(), "1.1,E5 f3".to_string()),
    ///     ("SID".to_string(), "42".to_string()),
    /// ]);
    /// assert_eq!(session.to_path(), "/COOKIE=1.1%2CE5+f3/SID=42");
    /// ```
    #[must_use]
    pub fn to_path(&self) -> String {
        self.vars
            .iter()
            .map(|(name, value)| {
                let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
                format!("/{name}={encoded}")
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct XmlDocument {
    #[serde(rename = "SET", default)]
    sets: Vec<XmlSet>,
    #[serde(rename = "SESSION", default)]
    sessions: Vec<XmlSession>,
}

#[derive(Debug, Deserialize)]
struct XmlSet {
    #[serde(rename = "@hits")]
    hits: Option<String>,
    #[serde(rename = "SHORTTITLE", default)]
    short_titles: Vec<XmlShortTitle>,
}

#[derive(Debug, Deserialize)]
struct XmlShortTitle {
    #[serde(rename = "@PPN")]
    ppn: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlSession {
    #[serde(rename = "SESSIONVAR", default)]
    vars: Vec<XmlSessionVar>,
}

#[derive(Debug, Deserialize)]
struct XmlSessionVar {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "$text", default)]
    value: String,
}

/// Decode an XML response body using the encoding named in its declaration.
///
/// Falls back to UTF-8 when no (known) encoding is declared. Malformed
/// sequences are replaced rather than rejected.
#[must_use]
pub fn decode_body(bytes: &[u8]) -> String {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    let encoding = XML_ENCODING
        .captures(&head)
        .and_then(|caps| encoding_rs::Encoding::for_label(caps[1].as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Parse a search, family or continuation page.
///
/// # Errors
///
/// Returns [`OpcError::Protocol`] if the document is not well-formed, does not
/// contain exactly one `SET` element, or carries a non-numeric `hits` value.
pub fn parse_result_page(xml: &str) -> Result<ResultPage> {
    let doc: XmlDocument = xml_from_str(xml)
        .map_err(|e| OpcError::Protocol(format!("malformed result document: {e}")))?;

    let mut sets = doc.sets;
    if sets.len() != 1 {
        return Err(OpcError::Protocol(format!(
            "expected one SET element, found {}",
            sets.len()
        )));
    }
    let set = sets.remove(0);

    let hits = set
        .hits
        .map(|h| {
            h.trim()
                .parse::<usize>()
                .map_err(|_| OpcError::Protocol(format!("invalid hit count: {h:?}")))
        })
        .transpose()?;

    let ppns = set
        .short_titles
        .into_iter()
        .filter_map(|t| t.ppn)
        .filter(|ppn| !ppn.is_empty())
        .collect();

    let session = doc.sessions.into_iter().next().map(|s| {
        SessionState::new(s.vars.into_iter().map(|v| (v.name, v.value)).collect())
    });

    Ok(ResultPage {
        hits,
        ppns,
        session,
    })
}

fn attribute(start: &BytesStart<'_>, name: &[u8]) -> String {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
        .unwrap_or_default()
}

/// Parse the index-key menu (`MENUIKTLIST`).
///
/// # Errors
///
/// Returns [`OpcError::Protocol`] if the document is not well-formed or the
/// root does not contain exactly one `IKTLIST` element.
pub fn parse_index_keys(xml: &str) -> Result<Vec<IndexKey>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut depth = 0usize;
    let mut lists = 0usize;
    let mut in_list = false;
    let mut current: Option<IndexKey> = None;
    let mut keys = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                if depth == 2 && e.name().as_ref() == b"IKTLIST" {
                    lists += 1;
                    in_list = true;
                } else if depth == 3 && in_list {
                    current = Some(IndexKey {
                        key: String::new(),
                        mnemonic: attribute(&e, b"mnemonic"),
                        description: attribute(&e, b"description"),
                    });
                }
            },
            Ok(Event::Empty(e)) => {
                if depth == 1 && e.name().as_ref() == b"IKTLIST" {
                    lists += 1;
                } else if depth == 2 && in_list {
                    keys.push(IndexKey {
                        key: String::new(),
                        mnemonic: attribute(&e, b"mnemonic"),
                        description: attribute(&e, b"description"),
                    });
                }
            },
            Ok(Event::Text(t)) => {
                if let Some(ikt) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| OpcError::Protocol(format!("malformed index key list: {e}")))?;
                    ikt.key.push_str(&text);
                }
            },
            Ok(Event::End(_)) => {
                if depth == 3 {
                    if let Some(ikt) = current.take() {
                        keys.push(ikt);
                    }
                } else if depth == 2 {
                    in_list = false;
                }
                depth = depth.saturating_sub(1);
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(OpcError::Protocol(format!(
                    "malformed index key list at position {}: {e}",
                    reader.buffer_position()
                )))
            },
            Ok(_) => {},
        }
    }

    if lists != 1 {
        return Err(OpcError::Protocol(format!(
            "expected one IKTLIST element, found {lists}"
        )));
    }

    Ok(keys)
}
