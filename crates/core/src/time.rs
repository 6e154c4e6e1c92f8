use chrono::{NaiveDate, NaiveDateTime};

/// Accepted timestamp layouts, tried in order. SCADA exports are day-first.
const FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

/// Parse a timestamp in any supported layout. A bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_first_and_iso() {
        let a = parse_timestamp("14/01/2019 23:55").unwrap();
        let b = parse_timestamp("2019-01-14 23:55").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("2019-01-14").is_some());
        assert!(parse_timestamp("not a time").is_none());
    }
}
