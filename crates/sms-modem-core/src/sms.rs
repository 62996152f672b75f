//! Stored SMS records

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::protocol::ListHeader;

/// One message slot as reported by `AT+CMGL`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsRecord {
    /// Storage slot assigned by the modem
    pub index: u32,
    /// Raw status token, e.g. "REC UNREAD"
    pub status: String,
    /// Sender or recipient number
    pub address: String,
    /// Phonebook name, often empty
    pub name: String,
    /// Raw service-centre timestamp, `yy/MM/dd,hh:mm:ss±zz`
    pub timestamp: String,
    /// Raw type-of-address token, e.g. "145" for international numbers
    pub address_type: String,
    /// Decoded message body
    pub text: String,
}

impl SmsRecord {
    pub(crate) fn from_header(header: ListHeader, text: String) -> Self {
        Self {
            index: header.index,
            status: header.status,
            address: header.address,
            name: header.name,
            timestamp: header.timestamp,
            address_type: header.address_type,
            text,
        }
    }

    /// Interpret the timestamp; the zone suffix counts quarter hours.
    ///
    /// Returns `None` if the modem reported something else.
    pub fn parsed_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.timestamp.trim();
        let split = raw.rfind(&['+', '-'][..])?;
        let (local, zone) = raw.split_at(split);

        let quarters: i32 = zone.parse().ok()?;
        let offset = FixedOffset::east_opt(quarters * 15 * 60)?;
        let naive = NaiveDateTime::parse_from_str(local, "%y/%m/%d,%H:%M:%S").ok()?;
        offset.from_local_datetime(&naive).single()
    }
}
