//! PICA+ record structures.
//!
//! This module provides the record types returned by the catalog:
//! - [`Record`] - Bibliographic record identified by its PPN, loaded lazily
//! - [`Field`] - PICA+ field (`tag` or `tag/occurrence`)
//! - [`Subfield`] - Coded data element within a field
//!
//! A [`Record`] starts out as a bare identifier (a search hit). Its fields are
//! fetched through the [`RecordLoader`] it was created with on first access,
//! exactly once; a failed load leaves the record unloaded so it can be retried.
//!
//! # Examples
//!
//! ```
//! use opc_connector::{Field, Record};
//!
//! let field = Field::builder("209A")
//!     .occurrence("01")
//!     .subfield_str('a', "2004 A 1234")
//!     .build();
//! let record = Record::with_fields("123456789", vec![field]);
//!
//! let shelf_marks = record.shelf_marks()?;
//! assert_eq!(shelf_marks, vec!["2004 A 1234"]);
//! # Ok::<(), opc_connector::OpcError>(())
//! ```

use crate::error::{OpcError, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Tag of the title field.
pub const TITLE_TAG: &str = "021A";

/// Tag of the local shelf mark (call number) field.
pub const SHELF_MARK_TAG: &str = "209A";

/// A PICA+ field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field tag (e.g. `021A`)
    pub tag: String,
    /// Occurrence (the part after `/` in `209A/01`)
    pub occurrence: Option<String>,
    /// Subfields in server order
    pub subfields: SmallVec<[Subfield; 4]>,
}

/// A subfield within a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Decoded subfield value
    pub value: String,
}

impl Field {
    /// Create a new field without occurrence
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Field {
            tag: tag.into(),
            occurrence: None,
            subfields: SmallVec::new(),
        }
    }

    /// Create a builder for constructing fields fluently
    ///
    /// # Examples
    ///
    /// ```
    /// use opc_connector::Field;
    ///
    /// let field = Field::builder("021A")
    ///     .subfield_str('a', "Faust")
    ///     .subfield_str('h', "Goethe")
    ///     .build();
    /// assert_eq!(field.get_subfield('h'), Some("Goethe"));
    /// ```
    #[must_use]
    pub fn builder(tag: impl Into<String>) -> FieldBuilder {
        FieldBuilder {
            field: Field::new(tag),
        }
    }

    /// Add a subfield
    pub fn add_subfield(&mut self, code: char, value: String) {
        self.subfields.push(Subfield { code, value });
    }

    /// Add a subfield using a string slice
    pub fn add_subfield_str(&mut self, code: char, value: &str) {
        self.add_subfield(code, value.to_string());
    }

    /// First subfield with the given code, if any.
    ///
    /// A missing subfield is a normal data-quality condition, not an error.
    #[must_use]
    pub fn subfield_by_code(&self, code: char) -> Option<&Subfield> {
        self.subfields.iter().find(|sf| sf.code == code)
    }

    /// Get first value for a subfield code
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfield_by_code(code).map(|sf| sf.value.as_str())
    }

    /// Iterate over all subfields
    pub fn subfields(&self) -> impl Iterator<Item = &Subfield> {
        self.subfields.iter()
    }

    /// Iterate over subfield values with a specific code
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Concatenate all subfield values with spaces
    #[must_use]
    pub fn value(&self) -> String {
        self.subfields
            .iter()
            .map(|sf| sf.value.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)?;
        if let Some(occurrence) = &self.occurrence {
            write!(f, "/{occurrence}")?;
        }
        write!(f, " ")?;
        for subfield in &self.subfields {
            write!(f, "${}{}", subfield.code, subfield.value)?;
        }
        Ok(())
    }
}

/// Builder for fluently constructing fields
#[derive(Debug)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    /// Set the occurrence
    #[must_use]
    pub fn occurrence(mut self, occurrence: impl Into<String>) -> Self {
        self.field.occurrence = Some(occurrence.into());
        self
    }

    /// Add a subfield to the field being built
    #[must_use]
    pub fn subfield(mut self, code: char, value: String) -> Self {
        self.field.add_subfield(code, value);
        self
    }

    /// Add a subfield using a string slice
    #[must_use]
    pub fn subfield_str(mut self, code: char, value: &str) -> Self {
        self.field.add_subfield_str(code, value);
        self
    }

    /// Build the field
    #[must_use]
    pub fn build(self) -> Field {
        self.field
    }
}

/// Capability to fetch the fields of a record by its PPN.
///
/// [`OpcClient`](crate::OpcClient) implements this; a [`Record`] created from a
/// search hit carries the client that produced it.
pub trait RecordLoader: Send + Sync {
    /// Load all fields of the record `ppn`.
    ///
    /// # Errors
    ///
    /// Returns [`OpcError::NotFound`] if the catalog has no data for `ppn`,
    /// or [`OpcError::Protocol`] if it could not be queried.
    fn load_fields(&self, ppn: &str) -> Result<Vec<Field>>;
}

/// A bibliographic record identified by its PPN (catalog number).
///
/// Cloning a record shares the loader; already loaded fields are copied.
#[derive(Clone)]
pub struct Record {
    ppn: String,
    loader: Option<Arc<dyn RecordLoader>>,
    fields: OnceCell<Vec<Field>>,
}

impl Record {
    /// Create an unloaded record bound to `loader`.
    #[must_use]
    pub fn new(ppn: impl Into<String>, loader: Arc<dyn RecordLoader>) -> Self {
        Record {
            ppn: ppn.into(),
            loader: Some(loader),
            fields: OnceCell::new(),
        }
    }

    /// Create a record whose fields are already known.
    #[must_use]
    pub fn with_fields(ppn: impl Into<String>, fields: Vec<Field>) -> Self {
        Record {
            ppn: ppn.into(),
            loader: None,
            fields: OnceCell::with_value(fields),
        }
    }

    /// The PPN of this record.
    #[must_use]
    pub fn ppn(&self) -> &str {
        &self.ppn
    }

    /// Returns `true` once the fields have been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.fields.get().is_some()
    }

    /// Load the fields if that has not happened yet.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error; the record stays unloaded in that case.
    pub fn load(&self) -> Result<()> {
        self.fields().map(|_| ())
    }

    /// All fields in server order, loading them on first access.
    ///
    /// # Errors
    ///
    /// Returns [`OpcError::NotFound`] if the catalog has no data for this PPN,
    /// [`OpcError::Protocol`] if the catalog could not be queried, and
    /// [`OpcError::Config`] if the record is not bound to any catalog.
    pub fn fields(&self) -> Result<&[Field]> {
        self.fields
            .get_or_try_init(|| match &self.loader {
                Some(loader) => loader.load_fields(&self.ppn),
                None => Err(OpcError::Config(format!(
                    "record {} is not bound to a catalog",
                    self.ppn
                ))),
            })
            .map(Vec::as_slice)
    }

    /// All fields with the given tag.
    ///
    /// # Errors
    ///
    /// See [`Record::fields`].
    pub fn fields_by_tag(&self, tag: &str) -> Result<Vec<&Field>> {
        Ok(self.fields()?.iter().filter(|f| f.tag == tag).collect())
    }

    /// The field with the given tag and occurrence.
    ///
    /// # Errors
    ///
    /// See [`Record::fields`].
    pub fn field_by_occurrence(&self, tag: &str, occurrence: &str) -> Result<Option<&Field>> {
        Ok(self
            .fields()?
            .iter()
            .find(|f| f.tag == tag && f.occurrence.as_deref() == Some(occurrence)))
    }

    /// Main title from `021A$a`.
    ///
    /// # Errors
    ///
    /// See [`Record::fields`].
    pub fn title(&self) -> Result<Option<&str>> {
        Ok(self
            .fields_by_tag(TITLE_TAG)?
            .into_iter()
            .find_map(|f| f.get_subfield('a')))
    }

    /// All shelf marks from `209A$a`, one per copy.
    ///
    /// # Errors
    ///
    /// See [`Record::fields`].
    pub fn shelf_marks(&self) -> Result<Vec<&str>> {
        Ok(self
            .fields_by_tag(SHELF_MARK_TAG)?
            .into_iter()
            .filter_map(|f| f.get_subfield('a'))
            .collect())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("ppn", &self.ppn)
            .field("bound", &self.loader.is_some())
            .field("fields", &self.fields.get())
            .finish()
    }
}
