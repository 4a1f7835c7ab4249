//! File-backed audit sinks

use super::{AuditEntry, AuditOpenError};
use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Header row of the audit table
pub const TABLE_HEADER: &str = "timestamp,features,prediction";

/// Append-only destination for audit entries
pub trait AuditSink: Send {
    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    /// Append one complete entry
    fn append(&mut self, entry: &AuditEntry) -> io::Result<()>;
}

fn open_append(path: &Path) -> Result<File, AuditOpenError> {
    let open = || -> io::Result<File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    };
    open().map_err(|source| AuditOpenError {
        path: path.to_path_buf(),
        source,
    })
}

/// Human-readable line log
pub struct LineLogSink {
    path: PathBuf,
    file: File,
}

impl LineLogSink {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditOpenError> {
        let path = path.into();
        let file = open_append(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for LineLogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn append(&mut self, entry: &AuditEntry) -> io::Result<()> {
        let line = format!(
            "{} features={} prediction={}\n",
            entry.timestamp_string(),
            entry.features,
            entry.prediction
        );
        // One write per line keeps rows whole even if the process dies mid-append.
        self.file.write_all(line.as_bytes())?;
        self.file.flush()
    }
}

/// CSV table with columns `timestamp,features,prediction`
pub struct TableSink {
    path: PathBuf,
    file: File,
}

impl TableSink {
    /// Open the table, writing the header when the file is new or empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditOpenError> {
        let path = path.into();
        let mut file = open_append(&path)?;
        ensure_header(&mut file, &path).map_err(|source| AuditOpenError {
            path: path.clone(),
            source,
        })?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for TableSink {
    fn name(&self) -> &'static str {
        "table"
    }

    fn append(&mut self, entry: &AuditEntry) -> io::Result<()> {
        let row = format!(
            "{},{},{}\n",
            quote(&entry.timestamp_string()),
            quote(&entry.features),
            entry.prediction
        );
        self.file.write_all(row.as_bytes())?;
        self.file.flush()
    }
}

fn ensure_header(file: &mut File, path: &Path) -> io::Result<()> {
    if file.metadata()?.len() == 0 {
        writeln!(file, "{TABLE_HEADER}")?;
        file.flush()?;
        tracing::debug!("Created audit table '{}'", path.display());
    }
    Ok(())
}

/// Quote a CSV field when it contains a delimiter, quote or line break
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split one CSV row into fields
fn split_row(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }

    if in_quotes {
        return None;
    }
    fields.push(current);
    Some(fields)
}

fn parse_row(line: &str) -> Option<AuditEntry> {
    let fields = split_row(line)?;
    let [timestamp, features, prediction] = <[String; 3]>::try_from(fields).ok()?;

    serde_json::from_str::<serde_json::Value>(&features).ok()?;
    Some(AuditEntry {
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .ok()?
            .with_timezone(&Utc),
        features,
        prediction: prediction.parse().ok()?,
    })
}

/// Read every row of an audit table.
///
/// Fails with `InvalidData` on a missing header or any malformed row.
pub fn read_table(path: impl AsRef<Path>) -> io::Result<Vec<AuditEntry>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut lines = reader.lines();

    match lines.next().transpose()? {
        Some(header) if header == TABLE_HEADER => {}
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "missing audit table header",
            ))
        }
    }

    let mut entries = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line = line?;
        let entry = parse_row(&line).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed audit row {}: {}", idx + 1, line),
            )
        })?;
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::validate;
    use serde_json::json;

    fn entry(prediction: f64) -> AuditEntry {
        let record = validate(&json!({
            "MedInc": 8.3252,
            "HouseAge": 41.0,
            "AveRooms": 6.984127,
            "AveBedrms": 1.02381,
            "Population": 322.0,
            "AveOccup": 2.555556,
            "Latitude": 37.88,
            "Longitude": -122.23
        }))
        .unwrap();
        AuditEntry::new(Utc::now(), &record, prediction)
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("a,b"), "\"a,b\"");
        assert_eq!(quote("{\"a\":1}"), "\"{\"\"a\"\":1}\"");
    }

    #[test]
    fn test_split_row_handles_quoted_json() {
        let fields = split_row("t,\"{\"\"a\"\":1,\"\"b\"\":2}\",4.5").unwrap();
        assert_eq!(fields, vec!["t", "{\"a\":1,\"b\":2}", "4.5"]);
        assert!(split_row("t,\"unterminated,4.5").is_none());
    }

    #[test]
    fn test_table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("predictions.csv");

        let mut sink = TableSink::open(&path).unwrap();
        let first = entry(4.526);
        let second = entry(3.585);
        sink.append(&first).unwrap();
        sink.append(&second).unwrap();

        let rows = read_table(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].features, first.features);
        assert_eq!(rows[0].prediction, 4.526);
        assert_eq!(rows[1].prediction, 3.585);
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");

        TableSink::open(&path).unwrap().append(&entry(1.0)).unwrap();
        TableSink::open(&path).unwrap().append(&entry(2.0)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches(TABLE_HEADER).count(), 1);
        assert_eq!(read_table(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_log_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.log");

        let mut sink = LineLogSink::open(&path).unwrap();
        let e = entry(4.526);
        sink.append(&e).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            format!(
                "{} features={} prediction=4.526\n",
                e.timestamp_string(),
                e.features
            )
        );
    }

    #[test]
    fn test_read_table_rejects_garbled_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        fs::write(&path, format!("{TABLE_HEADER}\nnot,a row\n")).unwrap();

        let err = read_table(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
