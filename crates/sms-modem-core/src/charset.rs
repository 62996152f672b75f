//! GSM 7-bit character set
//!
//! Transcodes between host text and the byte stream a modem produces when its
//! character set is `AT+CSCS="GSM"`. Every byte is a 7-bit code from the GSM
//! default alphabet (3GPP TS 23.038). Most codes coincide with ASCII; the rest
//! are reassigned to national glyphs, and a small extension set is reached
//! through the escape byte `0x1B` followed by a code byte.
//!
//! All mappings live in one ordered table ([`GSM_TABLE`]). The decode and
//! encode lookups are derived from it once: decode takes the first entry for a
//! byte pattern, encode takes the last entry for a glyph.

use std::collections::HashMap;
use std::sync::OnceLock;

use thiserror::Error;

/// Escape byte introducing an extension-table code
pub const ESCAPE: u8 = 0x1B;

/// Byte values at or above this are outside the alphabet
const SEPTET_LIMIT: usize = 0x80;

/// Errors raised while transcoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CharsetError {
    #[error("invalid encoding: byte {byte:#04x} at offset {offset} is outside the 7-bit range")]
    InvalidEncoding { byte: u8, offset: usize },

    #[error("invalid encoding: unknown escape sequence 0x1b {code:#04x} at offset {offset}")]
    InvalidEscape { code: u8, offset: usize },

    #[error("invalid encoding: escape byte at end of input")]
    TruncatedEscape,

    #[error("character {ch:?} cannot be encoded in the GSM 7-bit alphabet")]
    UnencodableCharacter { ch: char },
}

/// Modem-side byte pattern for a glyph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    /// One byte from the default alphabet
    Single(u8),
    /// Escape byte followed by this extension code
    Escape(u8),
}

impl Code {
    /// Number of bytes (septets) this pattern occupies on the wire
    pub fn len(&self) -> usize {
        match self {
            Code::Single(_) => 1,
            Code::Escape(_) => 2,
        }
    }

    fn push_to(&self, out: &mut Vec<u8>) {
        match *self {
            Code::Single(b) => out.push(b),
            Code::Escape(b) => {
                out.push(ESCAPE);
                out.push(b);
            }
        }
    }
}

/// Canonical GSM mapping, restricted to glyphs whose code differs from ASCII.
///
/// Codes absent from this table decode to the ASCII character with the same value.
pub const GSM_TABLE: &[(char, Code)] = &[
    ('@', Code::Single(0x00)),
    ('£', Code::Single(0x01)),
    ('$', Code::Single(0x02)),
    ('¥', Code::Single(0x03)),
    ('è', Code::Single(0x04)),
    ('é', Code::Single(0x05)),
    ('ù', Code::Single(0x06)),
    ('ì', Code::Single(0x07)),
    ('ò', Code::Single(0x08)),
    ('Ç', Code::Single(0x09)),
    ('Ø', Code::Single(0x0B)),
    ('ø', Code::Single(0x0C)),
    ('Å', Code::Single(0x0E)),
    ('å', Code::Single(0x0F)),
    ('Δ', Code::Single(0x10)),
    ('_', Code::Single(0x11)),
    ('Φ', Code::Single(0x12)),
    ('Γ', Code::Single(0x13)),
    ('Λ', Code::Single(0x14)),
    ('Ω', Code::Single(0x15)),
    ('Π', Code::Single(0x16)),
    ('Ψ', Code::Single(0x17)),
    ('Σ', Code::Single(0x18)),
    ('Θ', Code::Single(0x19)),
    ('Ξ', Code::Single(0x1A)),
    ('Æ', Code::Single(0x1C)),
    ('æ', Code::Single(0x1D)),
    ('ß', Code::Single(0x1E)),
    ('É', Code::Single(0x1F)),
    ('¤', Code::Single(0x24)),
    ('¡', Code::Single(0x40)),
    ('Ä', Code::Single(0x5B)),
    ('Ö', Code::Single(0x5C)),
    ('Ñ', Code::Single(0x5D)),
    ('Ü', Code::Single(0x5E)),
    ('§', Code::Single(0x5F)),
    ('¿', Code::Single(0x60)),
    ('ä', Code::Single(0x7B)),
    ('ö', Code::Single(0x7C)),
    ('ñ', Code::Single(0x7D)),
    ('ü', Code::Single(0x7E)),
    ('à', Code::Single(0x7F)),
    // Extension table
    ('\u{0C}', Code::Escape(0x0A)),
    ('^', Code::Escape(0x14)),
    ('{', Code::Escape(0x28)),
    ('}', Code::Escape(0x29)),
    ('\\', Code::Escape(0x2F)),
    ('[', Code::Escape(0x3C)),
    ('~', Code::Escape(0x3D)),
    (']', Code::Escape(0x3E)),
    ('|', Code::Escape(0x40)),
    ('€', Code::Escape(0x65)),
];

/// Lookup structures derived from an ordered mapping table
#[derive(Debug, Clone)]
pub struct CharsetMapping {
    entries: Vec<(char, Code)>,
    single: [Option<char>; SEPTET_LIMIT],
    extension: [Option<char>; SEPTET_LIMIT],
    reverse: HashMap<char, Code>,
}

impl CharsetMapping {
    /// Build the lookups from an ordered table
    pub fn new(table: &[(char, Code)]) -> Self {
        let mut single = [None; SEPTET_LIMIT];
        let mut extension = [None; SEPTET_LIMIT];

        for &(glyph, code) in table {
            let slot = match code {
                Code::Single(b) => single.get_mut(b as usize),
                Code::Escape(b) => extension.get_mut(b as usize),
            };
            if let Some(slot) = slot.filter(|s| s.is_none()) {
                *slot = Some(glyph);
            }
        }

        let mut reverse = HashMap::with_capacity(table.len());
        for &(glyph, code) in table.iter().rev() {
            reverse.entry(glyph).or_insert(code);
        }

        Self {
            entries: table.to_vec(),
            single,
            extension,
            reverse,
        }
    }

    /// The GSM default alphabet with its extension table
    pub fn gsm() -> &'static CharsetMapping {
        static GSM: OnceLock<CharsetMapping> = OnceLock::new();
        GSM.get_or_init(|| CharsetMapping::new(GSM_TABLE))
    }

    /// The ordered table this mapping was built from
    pub fn entries(&self) -> &[(char, Code)] {
        &self.entries
    }

    /// Modem byte pattern for a host character
    pub fn code_for(&self, ch: char) -> Result<Code, CharsetError> {
        if let Some(code) = self.reverse.get(&ch) {
            return Ok(*code);
        }

        // Plain 7-bit characters pass through when their slot isn't claimed
        let value = ch as u32;
        if (value as usize) < SEPTET_LIMIT {
            let byte = value as u8;
            if byte != ESCAPE && self.single[byte as usize].is_none() {
                return Ok(Code::Single(byte));
            }
        }

        Err(CharsetError::UnencodableCharacter { ch })
    }

    /// Decode modem bytes into host text
    pub fn decode(&self, bytes: &[u8]) -> Result<String, CharsetError> {
        let mut text = String::with_capacity(bytes.len());
        let mut i = 0;

        while i < bytes.len() {
            let byte = bytes[i];
            if byte as usize >= SEPTET_LIMIT {
                return Err(CharsetError::InvalidEncoding { byte, offset: i });
            }

            if byte == ESCAPE {
                let code = *bytes.get(i + 1).ok_or(CharsetError::TruncatedEscape)?;
                let glyph = self
                    .extension
                    .get(code as usize)
                    .copied()
                    .flatten()
                    .ok_or(CharsetError::InvalidEscape { code, offset: i })?;
                text.push(glyph);
                i += 2;
                continue;
            }

            text.push(self.single[byte as usize].unwrap_or(byte as char));
            i += 1;
        }

        Ok(text)
    }

    /// Encode host text into modem bytes
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, CharsetError> {
        let mut bytes = Vec::with_capacity(text.len());
        for ch in text.chars() {
            self.code_for(ch)?.push_to(&mut bytes);
        }
        Ok(bytes)
    }

    /// Whether every character of `text` has a modem representation
    pub fn is_encodable(&self, text: &str) -> bool {
        text.chars().all(|ch| self.code_for(ch).is_ok())
    }

    /// Septets needed to carry `text`; extension glyphs count twice
    pub fn encoded_len(&self, text: &str) -> Result<usize, CharsetError> {
        text.chars()
            .try_fold(0, |total, ch| Ok(total + self.code_for(ch)?.len()))
    }
}

/// Decode with the GSM mapping
pub fn decode(bytes: &[u8]) -> Result<String, CharsetError> {
    CharsetMapping::gsm().decode(bytes)
}

/// Encode with the GSM mapping
pub fn encode(text: &str) -> Result<Vec<u8>, CharsetError> {
    CharsetMapping::gsm().encode(text)
}
