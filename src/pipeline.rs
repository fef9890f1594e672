use std::path::{Path, PathBuf};

use log::info;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{Config, LogFile, Reading};
use crate::error::ParseError;
use crate::input::LogContents;
use crate::normalizer::{self, MergeStats, MergedSeries};
use crate::parsers;

pub struct Parsed {
    pub file: LogFile,
    pub bytes: usize,
    pub readings: Vec<Reading>,
}

pub struct Combined {
    pub files: Vec<LogFile>,
    pub bytes: usize,
    pub series: MergedSeries,
    pub stats: MergeStats,
}

/// Read one file, pick its format and parse it.
pub fn parse_file(path: &Path, config: &Config) -> Result<Parsed, ParseError> {
    let contents = LogContents::open(path)?;
    let text = contents.text(path)?;
    let format = parsers::select_format(path, text, config.detect)?;
    info!("working on {}, {} format", path.display(), format);

    let readings = parsers::parse(format, path, text, config)?;
    info!("added {} ({} readings)", path.display(), readings.len());

    Ok(Parsed {
        file: LogFile {
            path: path.to_path_buf(),
            format,
        },
        bytes: contents.len(),
        readings,
    })
}

/// Parse every file, then merge. The first failure aborts the whole run.
pub fn combine_logs(paths: &[PathBuf], config: &Config) -> Result<Combined, ParseError> {
    let parsed = parse_all(paths, config)?;

    let mut files = Vec::with_capacity(parsed.len());
    let mut parts = Vec::with_capacity(parsed.len());
    let mut bytes = 0;
    for p in parsed {
        files.push(p.file);
        parts.push(p.readings);
        bytes += p.bytes;
    }

    let (series, stats) = normalizer::merge(parts, config);
    Ok(Combined {
        files,
        bytes,
        series,
        stats,
    })
}

#[cfg(feature = "parallel")]
fn parse_all(paths: &[PathBuf], config: &Config) -> Result<Vec<Parsed>, ParseError> {
    // collect() joins every task and keeps input order
    paths.par_iter().map(|p| parse_file(p, config)).collect()
}

#[cfg(not(feature = "parallel"))]
fn parse_all(paths: &[PathBuf], config: &Config) -> Result<Vec<Parsed>, ParseError> {
    paths.iter().map(|p| parse_file(p, config)).collect()
}
