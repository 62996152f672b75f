//! Response parsing
//!
//! Classifies terminal status lines and splits `+CMGL` record headers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::charset::{CharsetError, CharsetMapping};

/// Prefix of each record header in a `+CMGL` listing
pub const LIST_PREFIX: &str = "+CMGL:";

/// Prompt the modem prints when it is ready for a message body
pub const BODY_PROMPT: &str = ">";

/// Number of comma-separated fields in a text-mode header with `AT+CSDH=1`
pub const HEADER_FIELDS: usize = 7;

/// Terminal status ending a command response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalStatus {
    /// `OK`
    Ok,
    /// `ERROR`, or `+CMS ERROR: n` / `+CME ERROR: n` carrying the full line
    Error(Option<String>),
    /// `NO CARRIER`
    NoCarrier,
}

impl FinalStatus {
    /// Classify a response line, returning `None` for informational lines
    pub fn parse(line: &str) -> Option<FinalStatus> {
        let line = line.trim();
        match line {
            "OK" => Some(FinalStatus::Ok),
            "ERROR" => Some(FinalStatus::Error(None)),
            "NO CARRIER" => Some(FinalStatus::NoCarrier),
            _ if line.starts_with("+CMS ERROR") || line.starts_with("+CME ERROR") => {
                Some(FinalStatus::Error(Some(line.to_string())))
            }
            _ => None,
        }
    }

    /// True for `OK`
    pub fn is_success(&self) -> bool {
        matches!(self, FinalStatus::Ok)
    }
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalStatus::Ok => f.write_str("OK"),
            FinalStatus::Error(Some(detail)) => f.write_str(detail),
            FinalStatus::Error(None) => f.write_str("ERROR"),
            FinalStatus::NoCarrier => f.write_str("NO CARRIER"),
        }
    }
}

/// Why a `+CMGL` header could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("expected {expected} header fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("unterminated quoted field")]
    UnterminatedQuote,

    #[error("no message index in {0:?}")]
    InvalidIndex(String),

    #[error("payload length {0:?} is not a number")]
    InvalidLength(String),
}

/// One parsed `+CMGL` header line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListHeader {
    pub index: u32,
    pub status: String,
    pub address: String,
    pub name: String,
    pub timestamp: String,
    pub address_type: String,
    /// Bytes of payload following the header line
    pub length: usize,
}

impl ListHeader {
    /// Parse a header line such as
    /// `+CMGL: 1,"REC UNREAD","+491234567","","23/01/01,10:00:00+04",145,4`
    pub fn parse(line: &str) -> Result<ListHeader, HeaderError> {
        let fields = split_csv_fields(line.trim())?;
        if fields.len() != HEADER_FIELDS {
            return Err(HeaderError::FieldCount {
                expected: HEADER_FIELDS,
                found: fields.len(),
            });
        }

        // The slot index is the numeric suffix of "+CMGL: N"
        let label = &fields[0];
        let suffix = label
            .rsplit(|c: char| !c.is_ascii_digit())
            .next()
            .unwrap_or_default();
        let index = suffix
            .parse::<u32>()
            .map_err(|_| HeaderError::InvalidIndex(label.clone()))?;

        let length = fields[6]
            .parse::<usize>()
            .map_err(|_| HeaderError::InvalidLength(fields[6].clone()))?;

        let mut fields = fields.into_iter().skip(1);
        let mut next = || fields.next().unwrap_or_default();
        Ok(ListHeader {
            index,
            status: next(),
            address: next(),
            name: next(),
            timestamp: next(),
            address_type: next(),
            length,
        })
    }

    /// Decode the address and name, which the modem sends in its current
    /// character set like the payload
    pub fn decode_text_fields(
        mut self,
        mapping: &CharsetMapping,
    ) -> Result<ListHeader, CharsetError> {
        self.address = decode_field(mapping, &self.address)?;
        self.name = decode_field(mapping, &self.name)?;
        Ok(self)
    }
}

/// Header lines arrive as text; each char below 0x80 is one modem byte
fn decode_field(mapping: &CharsetMapping, field: &str) -> Result<String, CharsetError> {
    let bytes: Vec<u8> = field
        .chars()
        .map(|c| u8::try_from(c).unwrap_or(u8::MAX))
        .collect();
    mapping.decode(&bytes)
}

/// Split a line into comma-separated fields using standard CSV quoting.
///
/// Quoted fields may contain commas and doubled quotes. Unquoted fields are
/// trimmed of surrounding whitespace.
pub fn split_csv_fields(line: &str) -> Result<Vec<String>, HeaderError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;
    let mut in_quotes = false;

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => current.push(ch),
            }
            continue;
        }

        match ch {
            '"' if current.trim().is_empty() && !quoted => {
                current.clear();
                quoted = true;
                in_quotes = true;
            }
            ',' => {
                fields.push(finish_field(&mut current, quoted));
                quoted = false;
            }
            _ => current.push(ch),
        }
    }

    if in_quotes {
        return Err(HeaderError::UnterminatedQuote);
    }
    fields.push(finish_field(&mut current, quoted));
    Ok(fields)
}

fn finish_field(current: &mut String, quoted: bool) -> String {
    let field = std::mem::take(current);
    if quoted {
        field
    } else {
        field.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_final_status_classification() {
        assert_eq!(FinalStatus::parse("OK"), Some(FinalStatus::Ok));
        assert_eq!(FinalStatus::parse("  OK \r"), Some(FinalStatus::Ok));
        assert_eq!(FinalStatus::parse("ERROR"), Some(FinalStatus::Error(None)));
        assert_eq!(FinalStatus::parse("NO CARRIER"), Some(FinalStatus::NoCarrier));
        assert_eq!(
            FinalStatus::parse("+CMS ERROR: 321"),
            Some(FinalStatus::Error(Some("+CMS ERROR: 321".into())))
        );
        assert_eq!(FinalStatus::parse("+CMGS: 12"), None);
        assert_eq!(FinalStatus::parse("> all OK"), None);
        assert_eq!(FinalStatus::parse(""), None);
    }

    #[test]
    fn test_split_plain_and_quoted() {
        let fields = split_csv_fields(r#"+CMGL: 1,"REC READ","+4912","","23/01/01,10:00:00+04",145,4"#)
            .unwrap();
        assert_eq!(
            fields,
            vec![
                "+CMGL: 1",
                "REC READ",
                "+4912",
                "",
                "23/01/01,10:00:00+04",
                "145",
                "4"
            ]
        );
    }

    #[test]
    fn test_split_escaped_quotes_and_empty_fields() {
        let fields = split_csv_fields(r#"a,"say ""hi"", bob",,c"#).unwrap();
        assert_eq!(fields, vec!["a", "say \"hi\", bob", "", "c"]);
    }

    #[test]
    fn test_split_unterminated_quote() {
        assert_eq!(
            split_csv_fields(r#"a,"open"#),
            Err(HeaderError::UnterminatedQuote)
        );
    }

    #[test]
    fn test_header_parse() {
        let header = ListHeader::parse(
            r#"+CMGL: 12,"REC UNREAD","+491234567","Smith, J.","23/01/01,10:00:00+04",145,4"#,
        )
        .unwrap();
        assert_eq!(
            header,
            ListHeader {
                index: 12,
                status: "REC UNREAD".into(),
                address: "+491234567".into(),
                name: "Smith, J.".into(),
                timestamp: "23/01/01,10:00:00+04".into(),
                address_type: "145".into(),
                length: 4,
            }
        );
    }

    #[test]
    fn test_header_unquoted_empty_name() {
        let header =
            ListHeader::parse(r#"+CMGL: 3,"REC READ","+4912",,"23/01/01,10:00:00+04",145,0"#)
                .unwrap();
        assert_eq!(header.index, 3);
        assert_eq!(header.name, "");
        assert_eq!(header.length, 0);
    }

    #[test]
    fn test_header_text_fields_use_gsm_alphabet() {
        let header = ListHeader::parse(
            "+CMGL: 4,\"REC READ\",\"+4912\",\"M\x7eller\",\"23/01/01,10:00:00+04\",145,0",
        )
        .unwrap()
        .decode_text_fields(CharsetMapping::gsm())
        .unwrap();
        assert_eq!(header.name, "Müller");
        assert_eq!(header.address, "+4912");
        assert_eq!(header.status, "REC READ");
    }

    #[test]
    fn test_header_text_fields_reject_high_bytes() {
        let header =
            ListHeader::parse("+CMGL: 4,\"REC READ\",\"+4912\",\"Mé\",\"23/01/01,10:00:00+04\",145,0")
                .unwrap();
        assert!(matches!(
            header.decode_text_fields(CharsetMapping::gsm()),
            Err(CharsetError::InvalidEncoding { byte: 0xe9, offset: 1 })
        ));
    }

    #[test]
    fn test_header_errors() {
        assert_eq!(
            ListHeader::parse(r#"+CMGL: 1,"REC READ","+4912""#),
            Err(HeaderError::FieldCount {
                expected: 7,
                found: 3
            })
        );
        assert!(matches!(
            ListHeader::parse(r#"+CMGL: 1,"REC READ","+4912","","23/01/01,10:00:00+04",145,four"#),
            Err(HeaderError::InvalidLength(_))
        ));
        assert!(matches!(
            ListHeader::parse(r#"+CMGL: x,"REC READ","+4912","","23/01/01,10:00:00+04",145,4"#),
            Err(HeaderError::InvalidIndex(_))
        ));
    }
}
