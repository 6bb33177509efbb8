//! Line formats read and written at the process boundary.

pub mod catalog;
pub mod dtcc;
pub mod hypodd;
pub mod reloc;
pub mod station;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub use catalog::{format_event_header, format_merged_header, parse_catalog, write_catalog};
pub use dtcc::{group_pairs, parse_data_line, parse_header, read_pairs, write_pairs, RawPair};
pub use hypodd::{format_event_dat_line, render_control_file};
pub use reloc::{normalize_seconds, parse_reloc, parse_reloc_line};
pub use station::parse_stations;

/// Parse an absolute timestamp as written in catalog and station files
///
/// Accepts RFC 3339 (`2019-07-04T17:33:49.12Z`), naive ISO forms with a
/// `T` or space separator and the compact `20190704173349.12` form. Naive
/// times are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y%m%d%H%M%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parse a `YYYYMMDD` day into its midnight
pub fn parse_day(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s.trim(), "%Y%m%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Timestamp in the catalog's output form
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2019, 7, 4, 17, 33, 49).unwrap();

        assert_eq!(parse_timestamp("2019-07-04T17:33:49Z"), Some(expected));
        assert_eq!(parse_timestamp("2019-07-04T17:33:49"), Some(expected));
        assert_eq!(parse_timestamp("2019-07-04 17:33:49"), Some(expected));
        assert_eq!(parse_timestamp("20190704173349"), Some(expected));

        let frac = parse_timestamp("2019-07-04T17:33:49.120000Z").unwrap();
        assert_eq!(frac.nanosecond(), 120_000_000);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("-1").is_none());
        assert!(parse_timestamp("CI.CLC").is_none());
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(
            parse_day("20190710"),
            Some(Utc.with_ymd_and_hms(2019, 7, 10, 0, 0, 0).unwrap())
        );
        assert!(parse_day("2019-07-10").is_none());
    }

    #[test]
    fn test_format_timestamp() {
        let t = Utc.with_ymd_and_hms(2019, 7, 6, 3, 19, 53).unwrap();
        assert_eq!(format_timestamp(&t), "2019-07-06T03:19:53.000000Z");
    }
}
