pub mod legacy;
pub mod power_log;

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use csv::StringRecord;
use log::{debug, warn};
use memchr::memchr_iter;
use regex::Regex;
use serde::Serialize;

use crate::config::{Config, DetectMode, Reading};
use crate::error::ParseError;

/// File names containing this are directly timestamped power logs.
const POWER_LOG_MARKER: &str = "power_log";

static POWER_LOG_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^"?\d{4}[-/]\d{1,2}[-/]\d{1,2}[ T]\d{1,2}:\d{2}:\d{2}(\.\d+)?"?\s*,\s*"?[-+]?(\d+(\.\d*)?|\.\d+)([eE][-+]?\d+)?"?\s*(,|$)"#,
    )
    .expect("power log row pattern")
});
static HEADER_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("header date pattern"));
static HEADER_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}:\d{2}$").expect("header time pattern"));

/// The two recorder formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// `timestamp,power` on every row.
    PowerLog,
    /// Start time in a 7-line preamble, then one reading per sample period.
    Legacy,
}

impl LogFormat {
    /// Classify by the `power_log` naming convention.
    pub fn from_name(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if name.contains(POWER_LOG_MARKER) {
            LogFormat::PowerLog
        } else {
            LogFormat::Legacy
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::PowerLog => write!(f, "power-log"),
            LogFormat::Legacy => write!(f, "legacy"),
        }
    }
}

/// Guess the format from the shape of the content. `None` when neither shape fits.
pub fn sniff(text: &str) -> Option<LogFormat> {
    let first = lines(text).map(|(_, l)| l).find(|l| !l.trim().is_empty())?;
    if POWER_LOG_ROW.is_match(first.trim()) {
        return Some(LogFormat::PowerLog);
    }

    let head: Vec<&str> = lines(text).take(5).map(|(_, l)| l).collect();
    if head.len() < 5 {
        return None;
    }
    let (date_rec, time_rec) = (record(head[3]), record(head[4]));
    let date = field(&date_rec, 1)?;
    let time = field(&time_rec, 1)?;
    if HEADER_DATE.is_match(date) && HEADER_TIME.is_match(time) {
        Some(LogFormat::Legacy)
    } else {
        None
    }
}

/// Decide which parser handles `path`.
pub fn select_format(path: &Path, text: &str, mode: DetectMode) -> Result<LogFormat, ParseError> {
    match mode {
        DetectMode::PowerLog => Ok(LogFormat::PowerLog),
        DetectMode::Legacy => Ok(LogFormat::Legacy),
        DetectMode::Name => {
            let named = LogFormat::from_name(path);
            match sniff(text) {
                Some(detected) if detected != named => Err(ParseError::FormatMismatch {
                    path: path.to_path_buf(),
                    named,
                    detected,
                }),
                _ => Ok(named),
            }
        }
        DetectMode::Auto => match sniff(text) {
            Some(detected) => Ok(detected),
            None => {
                let named = LogFormat::from_name(path);
                warn!(
                    "{}: content does not identify the format, assuming {} from its name",
                    path.display(),
                    named
                );
                Ok(named)
            }
        },
    }
}

pub fn parse(
    format: LogFormat,
    path: &Path,
    text: &str,
    config: &Config,
) -> Result<Vec<Reading>, ParseError> {
    debug!("parsing {} as {}", path.display(), format);
    match format {
        LogFormat::PowerLog => power_log::parse_power_log(path, text),
        LogFormat::Legacy => legacy::parse_legacy(path, text, config.sample_period),
    }
}

/// Lines with their 1-based numbers, `\r` stripped. No empty line is produced
/// for a trailing newline.
pub(crate) fn lines(text: &str) -> impl Iterator<Item = (usize, &str)> + '_ {
    let bytes = text.as_bytes();
    let mut start = 0usize;
    memchr_iter(b'\n', bytes)
        .map(Some)
        .chain(std::iter::once(None))
        .filter_map(move |nl| {
            if nl.is_none() && start >= bytes.len() {
                return None;
            }
            let end = nl.unwrap_or(bytes.len());
            let line = &text[start..end];
            start = end + 1;
            Some(line.strip_suffix('\r').unwrap_or(line))
        })
        .enumerate()
        .map(|(i, line)| (i + 1, line))
}

/// Split one line into CSV fields. Quoted fields may contain commas.
pub(crate) fn record(line: &str) -> StringRecord {
    let mut rec = StringRecord::new();
    if !line.contains('"') {
        for f in line.split(',') {
            rec.push_field(f.trim());
        }
        return rec;
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    match reader.read_record(&mut rec) {
        Ok(true) => rec,
        _ => StringRecord::new(),
    }
}

/// Zero-based field of a record, trimmed of whitespace and stray quotes.
pub(crate) fn field(rec: &StringRecord, index: usize) -> Option<&str> {
    rec.get(index).map(|f| f.trim().trim_matches('"').trim())
}

/// A finite power value. `NaN` and infinities are rejected.
pub(crate) fn parse_power(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
