#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Modules
//!
//! - [`client`] - The catalog session client (`OpcClient`)
//! - [`lookup`] - Identifier lookups by barcode and shelf mark
//! - [`config`] - Catalog endpoint configuration
//! - [`record`] - PICA+ record structures (`Record`, `Field`, `Subfield`)
//! - [`result`] - Search and family results
//! - [`reader`] - Parsing of plain PICA+ record views
//! - [`encoding`] - Legacy PICA character decoding
//! - [`xml`] - Parsing of the OPC XML interface
//! - [`transport`] - HTTP transport seam
//! - [`cache`] - Bounded, expiring response cache
//! - [`error`] - Error types and result type

pub mod cache;
pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod lookup;
pub mod reader;
pub mod record;
pub mod result;
pub mod transport;
pub mod xml;

pub use cache::ResponseCache;
pub use client::{CachedResponse, OpcClient, OpcClientBuilder};
pub use config::CatalogConfig;
pub use error::{OpcError, Result, TransportError};
pub use record::{Field, FieldBuilder, Record, RecordLoader, Subfield};
pub use result::{HitSet, SearchResult};
pub use transport::{HttpTransport, Transport};
pub use xml::IndexKey;
