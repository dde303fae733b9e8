//! Daily station records in CSV, one row per day.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ByteRecord, Trim};
use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::warn;

use crate::{
    error::{Error, Result},
    series::NativeSeries,
};

/// Header names of the date columns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StationColumns {
    pub year: String,
    pub month: String,
    pub day: String,
}

impl Default for StationColumns {
    fn default() -> Self {
        StationColumns {
            year: "agno".to_string(),
            month: "mes".to_string(),
            day: "dia".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StationReading {
    date: Option<NaiveDate>,
    value: Option<f64>,
}

impl StationReading {
    /// Fields that are not UTF-8 parse as absent, like any other non-numeric text.
    fn from_record(record: &ByteRecord, idx: &ColumnIndex) -> Self {
        let text = |i: usize| record.get(i).and_then(|b| std::str::from_utf8(b).ok());
        let int = |i: usize| text(i).and_then(|s| s.parse::<i64>().ok());
        let date = match (int(idx.year), int(idx.month), int(idx.day)) {
            (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(
                i32::try_from(y).unwrap_or(i32::MAX),
                u32::try_from(m).unwrap_or(0),
                u32::try_from(d).unwrap_or(0),
            ),
            _ => None,
        };
        let value = text(idx.value)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite());

        StationReading { date, value }
    }
}

struct ColumnIndex {
    year: usize,
    month: usize,
    day: usize,
    value: usize,
}

impl ColumnIndex {
    fn locate(headers: &ByteRecord, columns: &StationColumns, value: &str) -> std::result::Result<Self, String> {
        let find = |name: &str| {
            headers.iter().position(|h| h == name.as_bytes()).ok_or_else(|| {
                let names: Vec<_> = headers.iter().map(String::from_utf8_lossy).collect();
                format!("no column `{}` in header {:?}", name, names)
            })
        };
        Ok(ColumnIndex {
            year: find(&columns.year)?,
            month: find(&columns.month)?,
            day: find(&columns.day)?,
            value: find(value)?,
        })
    }
}

/// Reads `value_column` against the date columns of a station CSV, gzipped
/// when the file name ends in `.gz`.
///
/// Empty or non-numeric values are missing. Rows whose date does not parse
/// are skipped with a warning; two rows for the same date are an error.
pub fn read_station_csv(path: &Path, columns: &StationColumns, value_column: &str) -> Result<NativeSeries> {
    let reader_error = |reason: String| Error::Reader {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path)?;
    let input: Box<dyn Read> = match path.extension().and_then(|e| e.to_str()) {
        Some("gz") => Box::new(GzDecoder::new(BufReader::new(file))),
        _ => Box::new(BufReader::new(file)),
    };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input);

    let headers = rdr.byte_headers().map_err(|e| reader_error(e.to_string()))?.clone();
    let idx = ColumnIndex::locate(&headers, columns, value_column).map_err(reader_error)?;

    let mut rows: Vec<(NaiveDate, Option<f64>)> = Vec::new();
    let mut skipped = 0usize;
    for (line, record) in rdr.byte_records().enumerate() {
        let record = record.map_err(|e| reader_error(e.to_string()))?;
        let reading = StationReading::from_record(&record, &idx);
        match reading.date {
            Some(date) => rows.push((date, reading.value)),
            None => {
                skipped += 1;
                warn!(file = %path.display(), row = line + 2, "skipping row with invalid date");
            }
        }
    }
    if skipped > 0 {
        warn!(file = %path.display(), skipped, "rows without a valid date");
    }

    rows.sort_by_key(|(date, _)| *date);
    if let Some(pair) = rows.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(Error::CalendarMismatch(format!(
            "{} lists {} more than once",
            path.display(),
            pair[0].0
        )));
    }

    let (times, values): (Vec<NaiveDateTime>, Vec<Option<f64>>) = rows
        .into_iter()
        .map(|(date, value)| (date.and_time(NaiveTime::MIN), value))
        .unzip();

    NativeSeries::new(value_column, times, values)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};
    use tempfile::TempDir;

    use super::*;

    const CSV: &str = "agno, mes, dia, valor\n\
                       1979, 1, 2, 0.0\n\
                       1979, 1, 1, 3.5\n\
                       1979, 2, 30, 1.0\n\
                       1979, 1, 3, \n\
                       1979, 1, 4, s/d\n";

    fn write(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(1979, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn should_read_sorted_series_with_missing_values() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "QN_daily_precip.csv", CSV.as_bytes());

        let s = read_station_csv(&path, &StationColumns::default(), "valor").unwrap();

        assert_eq!(s.name(), "valor");
        assert_eq!(s.times(), &[day(1), day(2), day(3), day(4)]);
        assert_eq!(s.values(), &[Some(3.5), Some(0.0), None, None]);
    }

    #[test]
    fn should_read_gzipped_csv() {
        let tmp = TempDir::new().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(CSV.as_bytes()).unwrap();
        let path = write(&tmp, "QN_daily_precip.csv.gz", &encoder.finish().unwrap());

        let s = read_station_csv(&path, &StationColumns::default(), "valor").unwrap();

        assert_eq!(s.len(), 4);
    }

    #[test]
    fn should_treat_latin1_text_as_missing() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "latin1.csv",
            b"agno,mes,dia,valor\n1979,1,1,1.0\n1979,1,2,s/d\xe9\n1979,1,3,2.0\n1979,1,\xe9,4.0\n",
        );

        let s = read_station_csv(&path, &StationColumns::default(), "valor").unwrap();

        assert_eq!(s.times(), &[day(1), day(2), day(3)]);
        assert_eq!(s.values(), &[Some(1.0), None, Some(2.0)]);
    }

    #[test]
    fn should_reject_duplicate_dates() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "dup.csv", b"agno,mes,dia,valor\n1979,1,1,1.0\n1979,1,1,2.0\n");

        assert!(matches!(
            read_station_csv(&path, &StationColumns::default(), "valor"),
            Err(Error::CalendarMismatch(_))
        ));
    }

    #[test]
    fn should_report_missing_column() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "qn.csv", CSV.as_bytes());

        assert!(matches!(
            read_station_csv(&path, &StationColumns::default(), "pp"),
            Err(Error::Reader { .. })
        ));
    }
}
