//! Parsing of plain-text PICA+ records.
//!
//! The raw-record endpoint answers with a flat blob instead of XML:
//!
//! ```text
//! 003@ \x1F0123456789\x1E021A \x1FaDer @Titel\x1FhAutor\x1E209A/01 \x1FaA 1234\x1E
//! ```
//!
//! Fields are separated by `0x1E`. The header (`tag` or `tag/occurrence`) is
//! split from the body on the first space; the body holds subfields, each
//! introduced by `0x1F` and a one-character code. Subfield text is decoded
//! with [`decode_pica`](crate::encoding::decode_pica).

use crate::encoding::decode_pica;
use crate::record::Field;
use lazy_static::lazy_static;
use regex::Regex;

const FIELD_SEPARATOR: char = '\u{1E}';

lazy_static! {
    static ref SUBFIELD: Regex = Regex::new("\x1F([a-zA-Z0-9])([^\x1F]+)").unwrap();
}

/// Parse a plain PICA+ blob into fields.
///
/// Line breaks are not part of the format and are removed first. Entries
/// without a header/body separator are dropped silently, as are subfields
/// with an empty value.
///
/// # Examples
///
/// ```
/// use opc_connector::reader::parse_pica_plain;
///
/// let fields = parse_pica_plain("021A \u{1F}aFaust\u{1E}209A/01 \u{1F}aGE 1234\u{1E}");
/// assert_eq!(fields.len(), 2);
/// assert_eq!(fields[1].tag, "209A");
/// assert_eq!(fields[1].occurrence.as_deref(), Some("01"));
/// assert_eq!(fields[1].get_subfield('a'), Some("GE 1234"));
/// ```
#[must_use]
pub fn parse_pica_plain(raw: &str) -> Vec<Field> {
    let raw = raw.replace(|c| c == '\r' || c == '\n', "");
    raw.split(FIELD_SEPARATOR).filter_map(parse_field).collect()
}

fn parse_field(entry: &str) -> Option<Field> {
    let (header, body) = entry.split_once(' ')?;

    let mut field = match header.split_once('/') {
        Some((tag, occurrence)) => {
            let mut field = Field::new(tag);
            field.occurrence = Some(occurrence.to_string());
            field
        },
        None => Field::new(header),
    };

    for caps in SUBFIELD.captures_iter(body) {
        let Some(code) = caps[1].chars().next() else {
            continue;
        };
        field.add_subfield(code, decode_pica(&caps[2]));
    }

    Some(field)
}
