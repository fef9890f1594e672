use std::path::Path;

use chrono::NaiveDateTime;

use super::{field, lines, parse_power, record};
use crate::config::Reading;
use crate::error::ParseError;

const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

/// Parse a directly timestamped log: `timestamp,power[,ignored...]` per row, no header.
pub fn parse_power_log(path: &Path, input: &str) -> Result<Vec<Reading>, ParseError> {
    let mut out = Vec::with_capacity(input.len() / 28);

    for (line_no, line) in lines(input) {
        if line.trim().is_empty() {
            continue;
        }

        let rec = record(line);
        let raw_ts = field(&rec, 0).unwrap_or_default();
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| ParseError::Timestamp {
            path: path.to_path_buf(),
            line: line_no,
            value: raw_ts.to_string(),
        })?;

        let raw_power = field(&rec, 1).ok_or_else(|| ParseError::MissingColumn {
            path: path.to_path_buf(),
            line: line_no,
            column: 2,
        })?;
        let power = parse_power(raw_power).ok_or_else(|| ParseError::Power {
            path: path.to_path_buf(),
            line: line_no,
            value: raw_power.to_string(),
        })?;

        out.push(Reading::new(timestamp, power));
    }

    Ok(out)
}

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn parse_sample() {
        let input = "2024-01-01 10:00:00,5.0\n2024-01-01 10:00:01,6.0\n";
        let v = parse_power_log(Path::new("power_log_1.csv"), input).unwrap();
        assert_eq!(
            v,
            vec![
                Reading::new(ts(10, 0, 0), 5.0),
                Reading::new(ts(10, 0, 1), 6.0),
            ]
        );
    }

    #[test]
    fn extra_columns_and_blank_lines_are_ignored() {
        let input = "\r\n2024-01-01 10:00:00,5.5,foo,bar\r\n\r\n2024-01-01T10:00:02,7\r\n";
        let v = parse_power_log(Path::new("power_log_1.csv"), input).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].power, 5.5);
        assert_eq!(v[1].timestamp, ts(10, 0, 2));
    }

    #[test]
    fn keeps_fractional_seconds() {
        let v = parse_power_log(Path::new("p.csv"), "2024-01-01 10:00:00.250000,1.0\n").unwrap();
        assert_eq!(v[0].timestamp, ts(10, 0, 0) + chrono::TimeDelta::milliseconds(250));
    }

    #[test]
    fn bad_power_reports_line() {
        let input = "2024-01-01 10:00:00,5.0\n2024-01-01 10:00:01,n/a\n";
        let err = parse_power_log(Path::new("power_log_1.csv"), input).unwrap_err();
        match err {
            ParseError::Power { line, value, .. } => {
                assert_eq!(line, 2);
                assert_eq!(value, "n/a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_timestamp_reports_line() {
        let err = parse_power_log(Path::new("p.csv"), "yesterday,5.0\n").unwrap_err();
        assert!(matches!(err, ParseError::Timestamp { line: 1, .. }));
    }

    #[test]
    fn missing_power_column() {
        let err = parse_power_log(Path::new("p.csv"), "2024-01-01 10:00:00\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingColumn { line: 1, column: 2, .. }));
    }

    #[test]
    fn quoted_columns() {
        let input = "\"2024-01-01 10:00:00\",\"5.0\",\"note, with comma\"\n";
        let v = parse_power_log(Path::new("p.csv"), input).unwrap();
        assert_eq!(v, vec![Reading::new(ts(10, 0, 0), 5.0)]);
    }

    #[test]
    fn non_finite_power_is_rejected() {
        for bad in ["NaN", "inf", "-infinity"] {
            let input = format!("2024-01-01 10:00:00,1.0\n2024-01-01 10:00:01,{bad}\n");
            let err = parse_power_log(Path::new("p.csv"), &input).unwrap_err();
            match err {
                ParseError::Power { line, value, .. } => {
                    assert_eq!(line, 2);
                    assert_eq!(value, bad);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn empty_file_has_no_readings() {
        assert!(parse_power_log(Path::new("p.csv"), "").unwrap().is_empty());
    }
}
