use pretty_assertions::assert_eq;
use sms_modem_core::charset::{decode, encode, CharsetError, CharsetMapping, Code, ESCAPE};

#[test]
fn test_table_glyphs_round_trip() {
    for &(glyph, _) in CharsetMapping::gsm().entries() {
        let text = glyph.to_string();
        assert_eq!(decode(&encode(&text).unwrap()).unwrap(), text);
    }
}

#[test]
fn test_printable_ascii_round_trips() {
    // Backtick has no GSM representation; its slot decodes to '¿'
    let ascii: String = (0x20u8..0x7F)
        .map(char::from)
        .filter(|&c| c != '`')
        .collect();
    let encoded = encode(&ascii).unwrap();
    assert!(encoded.iter().all(|&b| b < 0x80));
    assert_eq!(decode(&encoded).unwrap(), ascii);
}

#[test]
fn test_extension_glyphs_use_escape() {
    let gsm = CharsetMapping::gsm();
    for &(glyph, code) in gsm.entries() {
        if let Code::Escape(b) = code {
            assert_eq!(encode(&glyph.to_string()).unwrap(), vec![ESCAPE, b]);
        }
    }
}

#[test]
fn test_every_high_byte_is_rejected() {
    for byte in 0x80u8..=0xFF {
        assert_eq!(
            decode(&[b'x', byte]),
            Err(CharsetError::InvalidEncoding { byte, offset: 1 })
        );
    }
}

#[test]
fn test_unencodable_reports_character() {
    let err = encode("Ünïcode").unwrap_err();
    assert_eq!(err, CharsetError::UnencodableCharacter { ch: 'ï' });
    assert!(err.to_string().contains('ï'));
}
