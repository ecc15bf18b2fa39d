//! Document Info updates and PDF date strings.

use crate::document::{Document, DocumentInfo};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use std::fmt::Display;

/// `/Producer` written on every metadata update.
pub const PRODUCER: &str = "MiniTools pdfEngine";

/// Format a timestamp as a PDF date string (`D:YYYYMMDDHHmmSS+HH'mm'`).
pub fn pdf_date<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let offset = time.offset().fix().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.abs() / 60;
    format!(
        "D:{}{}{:02}'{:02}'",
        time.format("%Y%m%d%H%M%S"),
        sign,
        minutes / 60,
        minutes % 60
    )
}

/// Parse a PDF date string. Every field after the year is optional; a
/// missing offset or `Z` means UTC.
pub fn parse_pdf_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    let value = value.strip_prefix("D:").unwrap_or(value);
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    let field = |start: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + len) {
            Some(s) => s.parse().ok(),
            None if digits.len() <= start => Some(default),
            None => None,
        }
    };
    let year = digits[..4].parse::<i32>().ok()?;
    let month = field(4, 2, 1)?;
    let day = field(6, 2, 1)?;
    let hour = field(8, 2, 0)?;
    let minute = field(10, 2, 0)?;
    let second = field(12, 2, 0)?;

    let rest = &value[digits.len()..];
    let offset_seconds = match rest.chars().next() {
        Some(sign @ ('+' | '-')) => {
            let tz: String = rest[1..].chars().filter(|c| c.is_ascii_digit()).collect();
            let hours: i32 = tz.get(..2)?.parse().ok()?;
            let mins: i32 = tz.get(2..4).map(|m| m.parse().ok()).unwrap_or(Some(0))?;
            let total = hours * 3600 + mins * 60;
            if sign == '-' { -total } else { total }
        },
        _ => 0,
    };

    let offset = FixedOffset::east_opt(offset_seconds)?;
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    offset.from_local_datetime(&naive).single()
}

/// Merge `info` into the document's Info dictionary and stamp `ModDate` and `Producer`.
///
/// Fields left `None` in `info` keep their current values.
pub fn update_metadata(doc: &mut Document, info: &DocumentInfo) {
    let mut stamped = info.clone();
    stamped.producer = Some(PRODUCER.to_string());
    stamped.mod_date = Some(pdf_date(&Utc::now()));
    if doc.info().creation_date.is_none() && stamped.creation_date.is_none() {
        stamped.creation_date = stamped.mod_date.clone();
    }
    doc.set_info(&stamped);
    log::debug!("Updated document metadata");
}
