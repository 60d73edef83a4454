//! Character decoding for PICA+ data.
//!
//! The plain PICA+ output of an OPC is delivered in the catalog's internal
//! single-byte character set, an ISO 5426 derivative:
//! - bytes `0x00-0x7F` are ASCII
//! - bytes `0xC0-0xDF` are **non-spacing diacritics** that precede the base
//!   letter they modify (`0xC8` + `u` is `ü`)
//! - the remaining high bytes are spacing special characters (`Ł`, `Ø`, `Œ`,
//!   `ß`, typographic quotes, ...)
//!
//! Transport bodies are first read as ISO-8859-1 with [`decode_latin1`] so each
//! legacy byte becomes one `char` in `U+0000..=U+00FF`; [`decode_pica`] then maps
//! those chars to Unicode and composes diacritics with their base letters (NFC).
//!
//! Decoding is total: characters without a mapping pass through unchanged.

use lazy_static::lazy_static;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    /// Legacy byte -> (Unicode code point, is non-spacing diacritic).
    static ref PICA_TABLE: HashMap<u8, (u32, bool)> = {
        let mut m = HashMap::new();

        // Spacing graphic characters
        m.insert(0xA1, (0x00A1, false)); // inverted exclamation mark
        m.insert(0xA2, (0x201E, false)); // double low-9 quotation mark
        m.insert(0xA3, (0x00A3, false)); // pound sign
        m.insert(0xA4, (0x0024, false)); // dollar sign
        m.insert(0xA5, (0x00A5, false)); // yen sign
        m.insert(0xA6, (0x2020, false)); // dagger
        m.insert(0xA7, (0x00A7, false)); // section sign
        m.insert(0xA8, (0x2030, false)); // per mille sign
        m.insert(0xA9, (0x2018, false)); // left single quotation mark
        m.insert(0xAA, (0x201C, false)); // left double quotation mark
        m.insert(0xAB, (0x00AB, false)); // left-pointing double angle quotation mark
        m.insert(0xAC, (0x266D, false)); // music flat sign
        m.insert(0xAD, (0x00A9, false)); // copyright sign
        m.insert(0xAE, (0x2117, false)); // sound recording copyright
        m.insert(0xAF, (0x00AE, false)); // registered sign
        m.insert(0xB0, (0x02BB, false)); // ayn
        m.insert(0xB1, (0x02BC, false)); // alif
        m.insert(0xB2, (0x201A, false)); // single low-9 quotation mark
        m.insert(0xB6, (0x2021, false)); // double dagger
        m.insert(0xB7, (0x00B7, false)); // middle dot
        m.insert(0xB9, (0x2019, false)); // right single quotation mark
        m.insert(0xBA, (0x201D, false)); // right double quotation mark
        m.insert(0xBB, (0x00BB, false)); // right-pointing double angle quotation mark
        m.insert(0xBC, (0x266F, false)); // music sharp sign
        m.insert(0xBD, (0x02B9, false)); // modifier letter prime
        m.insert(0xBE, (0x02BA, false)); // modifier letter double prime
        m.insert(0xBF, (0x00BF, false)); // inverted question mark

        // Non-spacing diacritics (precede the base letter)
        m.insert(0xC0, (0x0309, true)); // hook above
        m.insert(0xC1, (0x0300, true)); // grave
        m.insert(0xC2, (0x0301, true)); // acute
        m.insert(0xC3, (0x0302, true)); // circumflex
        m.insert(0xC4, (0x0303, true)); // tilde
        m.insert(0xC5, (0x0304, true)); // macron
        m.insert(0xC6, (0x0306, true)); // breve
        m.insert(0xC7, (0x0307, true)); // dot above
        m.insert(0xC8, (0x0308, true)); // umlaut
        m.insert(0xC9, (0x0308, true)); // diaeresis
        m.insert(0xCA, (0x030A, true)); // ring above
        m.insert(0xCB, (0x0313, true)); // comma above
        m.insert(0xCC, (0x0315, true)); // comma above right
        m.insert(0xCD, (0x030B, true)); // double acute
        m.insert(0xCE, (0x031B, true)); // horn
        m.insert(0xCF, (0x030C, true)); // caron
        m.insert(0xD0, (0x0327, true)); // cedilla
        m.insert(0xD1, (0x0328, true)); // ogonek
        m.insert(0xD2, (0x0323, true)); // dot below
        m.insert(0xD3, (0x0324, true)); // double dot below
        m.insert(0xD4, (0x0325, true)); // ring below
        m.insert(0xD5, (0x0333, true)); // double underline
        m.insert(0xD6, (0x0332, true)); // underline
        m.insert(0xD7, (0x0326, true)); // comma below
        m.insert(0xD8, (0x031C, true)); // left half ring below
        m.insert(0xD9, (0x032E, true)); // breve below
        m.insert(0xDA, (0x0361, true)); // double inverted breve (ligature)
        m.insert(0xDB, (0x0360, true)); // double tilde

        // Special Latin letters
        m.insert(0xE1, (0x00C6, false)); // AE
        m.insert(0xE2, (0x0110, false)); // D with stroke
        m.insert(0xE6, (0x0132, false)); // IJ
        m.insert(0xE8, (0x0141, false)); // L with stroke
        m.insert(0xE9, (0x00D8, false)); // O with stroke
        m.insert(0xEA, (0x0152, false)); // OE
        m.insert(0xEC, (0x00DE, false)); // thorn
        m.insert(0xF1, (0x00E6, false)); // ae
        m.insert(0xF2, (0x0111, false)); // d with stroke
        m.insert(0xF3, (0x00F0, false)); // eth
        m.insert(0xF5, (0x0131, false)); // dotless i
        m.insert(0xF6, (0x0133, false)); // ij
        m.insert(0xF8, (0x0142, false)); // l with stroke
        m.insert(0xF9, (0x00F8, false)); // o with stroke
        m.insert(0xFA, (0x0153, false)); // oe
        m.insert(0xFB, (0x00DF, false)); // sharp s
        m.insert(0xFC, (0x00FE, false)); // thorn (small)

        m
    };
}

/// Look up a legacy character in the PICA table.
///
/// Returns the mapped character and whether it is a non-spacing diacritic.
fn lookup(c: char) -> Option<(char, bool)> {
    let byte = u8::try_from(u32::from(c)).ok()?;
    PICA_TABLE
        .get(&byte)
        .and_then(|&(point, combining)| char::from_u32(point).map(|ch| (ch, combining)))
}

/// Decode legacy PICA text to Unicode.
///
/// Each input `char` in `U+0080..=U+00FF` is treated as one legacy byte.
/// Diacritics are moved behind their base letter and the result is composed
/// to NFC. Unmapped characters are copied unchanged, and diacritics with no
/// following base letter are emitted as bare combining marks.
///
/// # Examples
///
/// ```
/// use opc_connector::encoding::decode_pica;
///
/// assert_eq!(decode_pica("M\u{00C8}uller"), "Müller");
/// assert_eq!(decode_pica("\u{00E8}\u{00C2}od\u{00C2}z"), "Łódź");
/// assert_eq!(decode_pica("plain ascii"), "plain ascii");
/// ```
#[must_use]
pub fn decode_pica(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut pending: Vec<char> = Vec::new();

    for c in text.chars() {
        match lookup(c) {
            Some((mark, true)) => pending.push(mark),
            Some((ch, false)) => {
                result.push(ch);
                result.extend(pending.drain(..));
            },
            None => {
                result.push(c);
                result.extend(pending.drain(..));
            },
        }
    }

    result.extend(pending);

    result.nfc().collect()
}

/// Decode a transport body as ISO-8859-1, one `char` per byte.
///
/// This keeps every legacy byte addressable for [`decode_pica`]; unlike a
/// Windows-1252 decode, bytes `0x80-0x9F` are not remapped.
#[must_use]
pub fn decode_latin1(bytes: &[u8]) -> String {
    encoding_rs::mem::decode_latin1(bytes).into_owned()
}
