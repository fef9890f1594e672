//! Header-timestamped recorder logs.
//!
//! ```text
//! line 1-3  recorder metadata (ignored)
//! line 4    <label>,YYYY-MM-DD        start date
//! line 5    <label>,HH:MM:SS          start time
//! line 6-7  more metadata (ignored)
//! line 8..  <index>,<power>           one reading per sample period
//! ```

use std::path::Path;

use chrono::{NaiveDateTime, TimeDelta};

use super::{field, lines, parse_power, record};
use crate::config::Reading;
use crate::error::ParseError;

/// Lines before the first reading.
pub const HEADER_LINES: usize = 7;
/// The header is unusable without at least the date and time lines.
const REQUIRED_HEADER_LINES: usize = 5;
const DATE_LINE: usize = 4;
const TIME_LINE: usize = 5;
const START_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_legacy(
    path: &Path,
    input: &str,
    sample_period: TimeDelta,
) -> Result<Vec<Reading>, ParseError> {
    let mut rows = lines(input);

    let header: Vec<&str> = rows.by_ref().take(HEADER_LINES).map(|(_, l)| l).collect();
    let start = parse_start(path, &header)?;

    let mut powers = Vec::with_capacity(input.len() / 12);
    for (line_no, line) in rows {
        if line.trim().is_empty() {
            continue;
        }
        let rec = record(line);
        let raw = field(&rec, 1).ok_or_else(|| ParseError::MissingColumn {
            path: path.to_path_buf(),
            line: line_no,
            column: 2,
        })?;
        let power = parse_power(raw).ok_or_else(|| ParseError::Power {
            path: path.to_path_buf(),
            line: line_no,
            value: raw.to_string(),
        })?;
        powers.push((line_no, power));
    }

    synthesize(path, start, sample_period, powers)
}

fn parse_start(path: &Path, header: &[&str]) -> Result<NaiveDateTime, ParseError> {
    if header.len() < REQUIRED_HEADER_LINES {
        return Err(ParseError::ShortHeader {
            path: path.to_path_buf(),
            found: header.len(),
            needed: REQUIRED_HEADER_LINES,
        });
    }

    let date_rec = record(header[DATE_LINE - 1]);
    let time_rec = record(header[TIME_LINE - 1]);
    let date = field(&date_rec, 1).unwrap_or_default();
    let time = field(&time_rec, 1).unwrap_or_default();
    let joined = format!("{date} {time}");

    NaiveDateTime::parse_from_str(&joined, START_FORMAT).map_err(|_| ParseError::HeaderTimestamp {
        path: path.to_path_buf(),
        value: joined,
    })
}

/// Pair the k-th value with `start + k * period`.
fn synthesize(
    path: &Path,
    start: NaiveDateTime,
    period: TimeDelta,
    powers: Vec<(usize, f64)>,
) -> Result<Vec<Reading>, ParseError> {
    powers
        .into_iter()
        .zip(0i32..)
        .map(|((line, power), k)| {
            period
                .checked_mul(k)
                .and_then(|offset| start.checked_add_signed(offset))
                .map(|ts| Reading::new(ts, power))
                .ok_or_else(|| ParseError::TimeRange {
                    path: path.to_path_buf(),
                    line,
                })
        })
        .collect()
}
