use crate::config::{Reading, TIMESTAMP_FORMAT};
use crate::gaps::Gap;
use crate::normalizer::MergedSeries;
use crate::parsers::parse_power;
use crate::parsers::power_log::parse_timestamp;
use anyhow::{Context, Result, anyhow, bail};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const HEADER: [&str; 2] = ["datetime", "power"];

pub enum Writer {
    Stdout(csv::Writer<Box<dyn Write>>, bool), // bool tracks if we've written headers
    CsvFile(csv::Writer<BufWriter<File>>, bool),
}

impl Writer {
    pub fn write_batch(&mut self, readings: &[Reading]) -> Result<()> {
        match self {
            Writer::Stdout(writer, headers_written) => {
                write_rows(writer, headers_written, readings)?;
            }
            Writer::CsvFile(writer, headers_written) => {
                write_rows(writer, headers_written, readings)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // an empty series still gets its header row
        self.write_batch(&[])?;
        match self {
            Writer::Stdout(ref mut writer, _) => writer.flush()?,
            Writer::CsvFile(ref mut writer, _) => writer.flush()?,
        }
        Ok(())
    }
}

fn write_rows<W: Write>(
    writer: &mut csv::Writer<W>,
    headers_written: &mut bool,
    readings: &[Reading],
) -> Result<()> {
    if !*headers_written {
        writer.write_record(HEADER)?;
        *headers_written = true;
    }

    for reading in readings {
        let datetime = reading.timestamp.format(TIMESTAMP_FORMAT).to_string();
        writer.write_record([datetime, reading.power.to_string()])?;
    }
    Ok(())
}

pub fn create_writer(output_arg: &str) -> Result<Writer> {
    match output_arg {
        "stdout" | "-" => {
            let out: Box<dyn Write> = Box::new(io::stdout());
            Ok(Writer::Stdout(csv::Writer::from_writer(out), false))
        }
        path if path.to_ascii_lowercase().ends_with(".csv") => {
            create_parent_dirs(path)?;
            let file = File::create(path).with_context(|| format!("creating {path}"))?;
            let writer = BufWriter::new(file);
            Ok(Writer::CsvFile(csv::Writer::from_writer(writer), false))
        }
        _ => Err(anyhow!(
            "Unsupported output: {}. Use 'stdout' or a .csv file path",
            output_arg
        )),
    }
}

fn create_parent_dirs(file_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(file_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub fn write(output_arg: &str, series: &MergedSeries) -> Result<()> {
    let mut writer = create_writer(output_arg)?;
    writer.write_batch(series.readings())?;
    writer.finish()
}

/// Load a table previously written by [`write`].
pub fn load_combined(path: &Path) -> Result<MergedSeries> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers = reader.headers().context("reading CSV headers")?;
    if headers.iter().map(str::trim).ne(HEADER) {
        bail!(
            "{}: expected columns {:?}, found {:?}",
            path.display(),
            HEADER,
            headers
        );
    }

    let mut readings = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let raw_ts = record.get(0).unwrap_or("");
        let raw_power = record.get(1).unwrap_or("");

        let timestamp = parse_timestamp(raw_ts.trim())
            .with_context(|| format!("Row {row_no}: '{raw_ts}' is not a timestamp"))?;
        let power = parse_power(raw_power.trim())
            .with_context(|| format!("Row {row_no}: '{raw_power}' is not a number"))?;
        readings.push(Reading::new(timestamp, power));
    }

    MergedSeries::new(readings)
        .with_context(|| format!("{}: timestamps are not strictly increasing", path.display()))
}

pub fn write_gap_report(path: &Path, gaps: &[Gap]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, gaps)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gaps::detect_gaps;
    use crate::normalizer::merge;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn t(s: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + TimeDelta::seconds(s)
    }

    #[test]
    fn round_trip() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out/combined.csv");
        let out_str = out.to_str().unwrap();

        let (series, _) = merge(
            vec![
                vec![
                    Reading::new(t(0), 1.0 / 3.0),
                    Reading::new(t(1) + TimeDelta::microseconds(250_000), -2.5),
                ],
                vec![Reading::new(t(3), 1e-7), Reading::new(t(0), 4.0)],
            ],
            &Config::default(),
        );
        write(out_str, &series).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("datetime,power"));
        assert!(lines.next().unwrap().starts_with("2024-01-01 10:00:00,"));
        assert!(lines.next().unwrap().starts_with("2024-01-01 10:00:01.250"));

        let loaded = load_combined(&out).unwrap();
        assert_eq!(loaded, series);
    }

    #[test]
    fn empty_series_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("empty.csv");
        write(out.to_str().unwrap(), &MergedSeries::default()).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "datetime,power\n");
        assert!(load_combined(&out).unwrap().is_empty());
    }

    #[test]
    fn rejects_other_formats() {
        assert!(create_writer("out.json").is_err());
        assert!(create_writer("parquet").is_err());
    }

    #[test]
    fn load_rejects_unsorted_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "datetime,power\n2024-01-01 10:00:01,1\n2024-01-01 10:00:00,2\n",
        )
        .unwrap();
        assert!(load_combined(&path).is_err());

        std::fs::write(&path, "time,watts\n2024-01-01 10:00:00,2\n").unwrap();
        assert!(load_combined(&path).is_err());
    }

    #[test]
    fn load_rejects_non_finite_power() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nan.csv");
        std::fs::write(
            &path,
            "datetime,power\n2024-01-01 10:00:00,1\n2024-01-01 10:00:01,NaN\n",
        )
        .unwrap();
        let err = load_combined(&path).unwrap_err();
        assert!(err.to_string().contains("'NaN' is not a number"), "{err}");
    }

    #[test]
    fn gap_report_is_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gaps.json");
        let series = MergedSeries::new(vec![Reading::new(t(0), 1.0), Reading::new(t(4), 1.0)])
            .unwrap();
        let gaps = detect_gaps(&series, &Config::default());
        write_gap_report(&path, &gaps).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["missing_samples"], 3);
    }
}
