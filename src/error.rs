use std::path::PathBuf;

use thiserror::Error;

use crate::parsers::LogFormat;

/// Failure to turn one input file into readings. Always fatal for the run.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid UTF-8", .path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("{}:{line}: invalid timestamp '{value}'", .path.display())]
    Timestamp {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("{}:{line}: invalid power value '{value}'", .path.display())]
    Power {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("{}:{line}: missing column {column}", .path.display())]
    MissingColumn {
        path: PathBuf,
        line: usize,
        column: usize,
    },

    #[error("{}: header ends after {found} lines, need at least {needed}", .path.display())]
    ShortHeader {
        path: PathBuf,
        found: usize,
        needed: usize,
    },

    #[error("{}: invalid start time '{value}' in header", .path.display())]
    HeaderTimestamp { path: PathBuf, value: String },

    #[error("{}:{line}: reading falls outside the representable time range", .path.display())]
    TimeRange { path: PathBuf, line: usize },

    #[error("{}: named as a {named} log but its content looks like a {detected} log", .path.display())]
    FormatMismatch {
        path: PathBuf,
        named: LogFormat,
        detected: LogFormat,
    },
}
