//! Identifier lookups composed from searches and record inspection.
//!
//! Each helper answers "which PPN is this?" for a piece of data found on a
//! physical item. `Ok(None)` covers both "nothing found" and "ambiguous";
//! only failures of the underlying searches are errors.

use crate::client::OpcClient;
use crate::error::{OpcError, Result};
use crate::record::Record;
use crate::result::SearchResult;
use tracing::debug;

impl OpcClient {
    /// Find the record carrying the item barcode `barcode`.
    ///
    /// Returns the PPN only if the catalog reports exactly one hit.
    ///
    /// # Errors
    ///
    /// Propagates errors of [`OpcClient::search_all`].
    pub fn lookup_by_barcode(&self, barcode: &str) -> Result<Option<String>> {
        let result = self.search_all(&format!("bar {barcode}"))?;
        if result.total_hits() == 1 && result.len() == 1 {
            return Ok(Some(result.records()[0].ppn().to_string()));
        }
        debug!(barcode, hits = result.total_hits(), "barcode does not identify one record");
        Ok(None)
    }

    /// Find the record whose shelf mark (`209A$a`) equals `shelf_mark`.
    ///
    /// With `with_location`, a leading `location:` prefix is stripped from the
    /// search term. Candidates are searched by the part of the mark before the
    /// first `(` and loaded one by one; the first candidate holding the mark
    /// (or its short form) without location prefix wins.
    ///
    /// # Errors
    ///
    /// Propagates search errors and candidate load errors other than
    /// [`OpcError::NotFound`].
    pub fn lookup_by_shelf_mark(&self, shelf_mark: &str, with_location: bool) -> Result<Option<String>> {
        let mark = ShelfMark::new(shelf_mark, with_location);
        let result = self.search_all(&format!("num {short}* or sgn {short}*", short = mark.query_short))?;
        mark.first_match(&result)
    }

    /// Like [`OpcClient::lookup_by_shelf_mark`], but candidates must also
    /// match `title` (cut at the first `": "`).
    ///
    /// # Errors
    ///
    /// See [`OpcClient::lookup_by_shelf_mark`].
    pub fn lookup_by_shelf_mark_and_title(
        &self,
        shelf_mark: &str,
        with_location: bool,
        title: &str,
    ) -> Result<Option<String>> {
        let mark = ShelfMark::new(shelf_mark, with_location);
        let result = self.search_all(&format!("sgn \"{}\" and tit {}", mark.query, short_title(title)))?;
        mark.first_match(&result)
    }

    /// Like [`OpcClient::lookup_by_shelf_mark_and_title`], but candidates may
    /// match either the shelf mark or the title.
    ///
    /// # Errors
    ///
    /// See [`OpcClient::lookup_by_shelf_mark`].
    pub fn lookup_by_shelf_mark_or_title(
        &self,
        shelf_mark: &str,
        with_location: bool,
        title: &str,
    ) -> Result<Option<String>> {
        let mark = ShelfMark::new(shelf_mark, with_location);
        let result = self.search_all(&format!("sgn \"{}\" or tit {}", mark.query, short_title(title)))?;
        mark.first_match(&result)
    }
}

/// A shelf mark prepared for searching and comparison.
///
/// The query forms keep the location prefix unless asked to strip it; the
/// stored forms, compared against `209A$a`, never carry it.
#[derive(Debug)]
struct ShelfMark<'a> {
    query: &'a str,
    query_short: &'a str,
    stored: &'a str,
    stored_short: &'a str,
}

impl<'a> ShelfMark<'a> {
    fn new(shelf_mark: &'a str, with_location: bool) -> Self {
        let stored = strip_location(shelf_mark);
        let query = if with_location { stored } else { shelf_mark };
        ShelfMark {
            query,
            query_short: short_form(query),
            stored,
            stored_short: short_form(stored),
        }
    }

    fn matches(&self, record: &Record) -> Result<bool> {
        match record.shelf_marks() {
            Ok(marks) => Ok(marks
                .iter()
                .any(|mark| *mark == self.stored || *mark == self.stored_short)),
            Err(OpcError::NotFound(reason)) => {
                debug!(ppn = record.ppn(), reason = %reason, "skipping candidate without data");
                Ok(false)
            },
            Err(err) => Err(err),
        }
    }

    fn first_match(&self, result: &SearchResult) -> Result<Option<String>> {
        for record in result {
            if self.matches(record)? {
                return Ok(Some(record.ppn().to_string()));
            }
        }
        debug!(shelf_mark = self.stored, candidates = result.len(), "no candidate holds shelf mark");
        Ok(None)
    }
}

/// Drop everything up to and including the first `:`.
fn strip_location(shelf_mark: &str) -> &str {
    shelf_mark.split_once(':').map_or(shelf_mark, |(_, rest)| rest)
}

/// The part before the first `(`, trimmed.
fn short_form(shelf_mark: &str) -> &str {
    shelf_mark.split_once('(').map_or(shelf_mark, |(head, _)| head).trim()
}

fn short_title(title: &str) -> &str {
    title.split_once(": ").map_or(title, |(head, _)| head)
}
