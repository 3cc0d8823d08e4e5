//! PDF date strings (`D:YYYYMMDDHHmmSSOHH'mm'`).

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};

/// Parse a PDF date. Missing trailing fields default to their minimum and
/// a missing offset means UTC.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);

    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    let field = |start: usize, len: usize, default: u32| -> u32 {
        digits
            .get(start..start + len)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    };

    let year: i32 = digits[..4].parse().ok()?;
    let month = field(4, 2, 1);
    let day = field(6, 2, 1);
    let hour = field(8, 2, 0);
    let minute = field(10, 2, 0);
    let second = field(12, 2, 0);

    let offset = parse_offset(&s[digits.len()..])?;
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    offset.from_local_datetime(&naive).single()
}

fn parse_offset(rest: &str) -> Option<FixedOffset> {
    let mut chars = rest.chars();
    let sign = match chars.next() {
        None | Some('Z') => return FixedOffset::east_opt(0),
        Some('+') => 1,
        Some('-') => -1,
        Some(_) => return FixedOffset::east_opt(0),
    };
    let digits: String = chars.filter(|c| c.is_ascii_digit()).collect();
    let hours: i32 = digits.get(..2).and_then(|v| v.parse().ok()).unwrap_or(0);
    let minutes: i32 = digits.get(2..4).and_then(|v| v.parse().ok()).unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_date_with_offset() {
        let dt = parse_pdf_date("D:20230415103000+02'00'").unwrap();
        assert_eq!(dt.to_rfc3339(), "2023-04-15T10:30:00+02:00");
    }

    #[test]
    fn test_utc_and_partial() {
        assert_eq!(
            parse_pdf_date("D:20200101120000Z").unwrap().to_rfc3339(),
            "2020-01-01T12:00:00+00:00"
        );
        assert_eq!(
            parse_pdf_date("D:2019").unwrap().to_rfc3339(),
            "2019-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_negative_offset() {
        let dt = parse_pdf_date("D:20211231235959-05'30").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -(5 * 3600 + 30 * 60));
    }

    #[test]
    fn test_garbage() {
        assert!(parse_pdf_date("yesterday").is_none());
        assert!(parse_pdf_date("D:20231340").is_none());
    }
}
