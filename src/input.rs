use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::debug;
use memmap2::Mmap;
use regex::Regex;

use crate::error::ParseError;

/// Default pattern for files picked up from an input directory.
pub const DEFAULT_PATTERN: &str = r"(?i)\.csv$";

/// Expand the given paths into the list of log files to combine.
///
/// Files are taken as given. Directories contribute the regular files whose
/// name matches `pattern`, in path order. Nested directories are not walked.
pub fn discover(inputs: &[PathBuf], pattern: &Regex) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        let meta = std::fs::metadata(input)
            .with_context(|| format!("cannot access input {}", input.display()))?;

        if meta.is_file() {
            files.push(input.clone());
            continue;
        }
        if !meta.is_dir() {
            bail!("{} is neither a file nor a directory", input.display());
        }

        let mut found = Vec::new();
        for entry in std::fs::read_dir(input)
            .with_context(|| format!("reading directory {}", input.display()))?
        {
            let entry = entry.with_context(|| format!("reading directory {}", input.display()))?;
            let path = entry.path();
            let name = entry.file_name();
            if path.is_file() && pattern.is_match(&name.to_string_lossy()) {
                found.push(path);
            }
        }
        found.sort();
        debug!("{}: {} matching files", input.display(), found.len());
        files.extend(found);
    }

    Ok(files)
}

/// A log file mapped into memory.
pub struct LogContents {
    map: Option<Mmap>,
}

impl LogContents {
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        let io_err = |source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let len = file.metadata().map_err(io_err)?.len();
        if len == 0 {
            return Ok(Self { map: None });
        }
        // the file is only read, and only for the duration of one parse
        let map = unsafe { Mmap::map(&file) }.map_err(io_err)?;
        Ok(Self { map: Some(map) })
    }

    pub fn len(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.len())
    }

    pub fn text(&self, path: &Path) -> Result<&str, ParseError> {
        let bytes: &[u8] = self.map.as_deref().unwrap_or_default();
        let text = std::str::from_utf8(bytes).map_err(|source| ParseError::Encoding {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn discovers_matching_files_in_order() {
        let dir = TempDir::new().unwrap();
        for name in ["power_log_2.csv", "21-04-07.CSV", "power_log_1.csv", "notes.txt"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let pattern = Regex::new(DEFAULT_PATTERN).unwrap();
        let files = discover(&[dir.path().to_path_buf()], &pattern).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["21-04-07.CSV", "power_log_1.csv", "power_log_2.csv"]);

        let only_power = Regex::new(r"^power_log.*\.csv$").unwrap();
        assert_eq!(discover(&[dir.path().to_path_buf()], &only_power).unwrap().len(), 2);
    }

    #[test]
    fn explicit_files_bypass_pattern() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "x").unwrap();
        let files = discover(&[file.clone()], &Regex::new(DEFAULT_PATTERN).unwrap()).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn missing_input_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(discover(&[missing], &Regex::new(DEFAULT_PATTERN).unwrap()).is_err());
    }

    #[test]
    fn reads_empty_and_bom_files() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.csv");
        fs::write(&empty, "").unwrap();
        let contents = LogContents::open(&empty).unwrap();
        assert_eq!(contents.len(), 0);
        assert_eq!(contents.text(&empty).unwrap(), "");

        let bom = dir.path().join("bom.csv");
        fs::write(&bom, "\u{feff}a,b\n").unwrap();
        let contents = LogContents::open(&bom).unwrap();
        assert_eq!(contents.text(&bom).unwrap(), "a,b\n");
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad.csv");
        fs::write(&bad, [0xffu8, 0xfe, 0x00]).unwrap();
        let contents = LogContents::open(&bad).unwrap();
        assert!(matches!(contents.text(&bad), Err(ParseError::Encoding { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = LogContents::open(Path::new("/definitely/not/here.csv")).err().unwrap();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
