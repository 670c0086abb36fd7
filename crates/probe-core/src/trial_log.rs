use crate::model::Trial;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");
const SEQUENCE_COLUMN: usize = 1;
const STATUS_COLUMN: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum TrialLogError {
    #[error("trial log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("trial log {path} line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("format trial timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

pub trait TrialLog: Send + Sync {
    fn append(&self, trial: &Trial) -> Result<(), TrialLogError>;

    /// Highest sequence recorded so far, 0 when nothing was logged yet.
    fn last_sequence(&self) -> Result<u64, TrialLogError>;
}

/// Append-only CSV log: `pid,trial,timestamp,status,address,subject,body`.
#[derive(Debug)]
pub struct CsvTrialLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvTrialLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status_counts(&self) -> Result<BTreeMap<u16, u64>, TrialLogError> {
        let mut counts = BTreeMap::new();
        for (line, fields) in self.rows()? {
            let status = parse_column::<u16>(&fields, STATUS_COLUMN, "status")
                .map_err(|reason| self.corrupt(line, reason))?;
            *counts.entry(status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn rows(&self) -> Result<Vec<(usize, Vec<String>)>, TrialLogError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        let mut rows = Vec::new();
        for (index, raw) in data.lines().enumerate() {
            let raw = raw.trim_end_matches('\r');
            if raw.trim().is_empty() {
                continue;
            }
            let line = index + 1;
            let fields =
                parse_row(raw).ok_or_else(|| self.corrupt(line, "unterminated quote".into()))?;
            rows.push((line, fields));
        }
        Ok(rows)
    }

    fn io_error(&self, source: io::Error) -> TrialLogError {
        TrialLogError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, line: usize, reason: String) -> TrialLogError {
        TrialLogError::Corrupt {
            path: self.path.clone(),
            line,
            reason,
        }
    }
}

impl TrialLog for CsvTrialLog {
    fn append(&self, trial: &Trial) -> Result<(), TrialLogError> {
        let line = format_row(trial)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        file.write_all(line.as_bytes())
            .map_err(|source| self.io_error(source))
    }

    fn last_sequence(&self) -> Result<u64, TrialLogError> {
        let mut last = 0;
        for (line, fields) in self.rows()? {
            let sequence = parse_column::<u64>(&fields, SEQUENCE_COLUMN, "trial number")
                .map_err(|reason| self.corrupt(line, reason))?;
            last = last.max(sequence);
        }
        Ok(last)
    }
}

pub fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, TrialLogError> {
    Ok(timestamp.format(TIMESTAMP_FORMAT)?)
}

fn format_row(trial: &Trial) -> Result<String, TrialLogError> {
    let fields = [
        trial.pid.to_string(),
        trial.sequence.to_string(),
        format_timestamp(trial.started_at)?,
        trial.status.to_string(),
        trial.message.recipient.clone(),
        trial.message.subject.clone(),
        trial.message.body.clone(),
    ];
    let mut line = fields
        .iter()
        .map(|field| quote_field(field))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    Ok(line)
}

fn parse_column<T: std::str::FromStr>(
    fields: &[String],
    column: usize,
    name: &str,
) -> Result<T, String> {
    let raw = fields
        .get(column)
        .ok_or_else(|| format!("missing {name} column"))?;
    raw.trim()
        .parse()
        .map_err(|_| format!("invalid {name} {raw:?}"))
}

fn quote_field(value: &str) -> String {
    let needs_quoting =
        value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r');
    if needs_quoting {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn parse_row(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        let mut field = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        closed = true;
                        break;
                    }
                } else {
                    field.push(c);
                }
            }
            if !closed {
                return None;
            }
            fields.push(field);
            match chars.next() {
                Some(',') => continue,
                None => return Some(fields),
                Some(_) => return None,
            }
        }
        loop {
            match chars.next() {
                Some(',') => break,
                Some(c) => field.push(c),
                None => {
                    fields.push(field);
                    return Some(fields);
                }
            }
        }
        fields.push(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrialMessage;
    use std::sync::Arc;
    use tempfile::TempDir;
    use time::macros::datetime;

    fn trial(sequence: u64, status: u16) -> Trial {
        Trial {
            pid: 4242,
            sequence,
            started_at: datetime!(2024-03-01 12:30:45.123456 UTC),
            message: TrialMessage::for_sequence(sequence),
            status,
        }
    }

    #[test]
    fn missing_log_starts_at_zero() {
        let tmp = TempDir::new().unwrap();
        let log = CsvTrialLog::new(tmp.path().join("send_log.csv"));
        assert_eq!(log.last_sequence().unwrap(), 0);
        assert!(log.status_counts().unwrap().is_empty());
    }

    #[test]
    fn append_writes_one_line_per_trial() {
        let tmp = TempDir::new().unwrap();
        let log = CsvTrialLog::new(tmp.path().join("send_log.csv"));
        log.append(&trial(1, 200)).unwrap();
        let contents = fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            contents,
            "4242,1,2024-03-01 12:30:45.123456,200,test1@example.com,Test email 1,This is test email #1\n"
        );
    }

    #[test]
    fn timestamp_keeps_six_subsecond_digits() {
        assert_eq!(
            format_timestamp(datetime!(2024-03-01 07:05:09 UTC)).unwrap(),
            "2024-03-01 07:05:09.000000"
        );
        assert_eq!(
            format_timestamp(datetime!(2024-12-31 23:59:59.000042 UTC)).unwrap(),
            "2024-12-31 23:59:59.000042"
        );
    }

    #[test]
    fn last_sequence_is_the_maximum_not_the_last_row() {
        let tmp = TempDir::new().unwrap();
        let log = CsvTrialLog::new(tmp.path().join("send_log.csv"));
        for sequence in [3, 1, 5, 4, 2] {
            log.append(&trial(sequence, 200)).unwrap();
        }
        assert_eq!(log.last_sequence().unwrap(), 5);
    }

    #[test]
    fn reads_rows_with_crlf_and_quotes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("send_log.csv");
        fs::write(
            &path,
            "1,7,2024-01-01 00:00:00.000000,429,a@example.com,\"Hi, there\",\"say \"\"hi\"\"\"\r\n\r\n",
        )
        .unwrap();
        let log = CsvTrialLog::new(&path);
        assert_eq!(log.last_sequence().unwrap(), 7);
        assert_eq!(log.status_counts().unwrap().get(&429), Some(&1));
    }

    #[test]
    fn corrupt_row_reports_line_number() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("send_log.csv");
        fs::write(
            &path,
            "1,1,2024-01-01 00:00:00.000000,200,a,b,c\n1,oops,2024-01-01 00:00:00.000000,200,a,b,c\n",
        )
        .unwrap();
        let err = CsvTrialLog::new(&path).last_sequence().unwrap_err();
        match err {
            TrialLogError::Corrupt { line, ref reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("oops"));
            }
            other => panic!("expected corrupt error, got {other:?}"),
        }
    }

    #[test]
    fn status_counts_group_by_code() {
        let tmp = TempDir::new().unwrap();
        let log = CsvTrialLog::new(tmp.path().join("send_log.csv"));
        log.append(&trial(1, 200)).unwrap();
        log.append(&trial(2, 429)).unwrap();
        log.append(&trial(3, 200)).unwrap();
        let counts = log.status_counts().unwrap();
        assert_eq!(counts.get(&200), Some(&2));
        assert_eq!(counts.get(&429), Some(&1));
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let tmp = TempDir::new().unwrap();
        let log = Arc::new(CsvTrialLog::new(tmp.path().join("send_log.csv")));
        std::thread::scope(|scope| {
            for worker in 0..8u64 {
                let log = Arc::clone(&log);
                scope.spawn(move || {
                    for i in 0..25u64 {
                        log.append(&trial(worker * 100 + i + 1, 200)).unwrap();
                    }
                });
            }
        });
        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 200);
        for line in lines {
            assert_eq!(parse_row(line).unwrap().len(), 7);
        }
    }

    #[test]
    fn quoting_round_trips_through_parser() {
        let fields = ["plain", "a,b", "with \"quote\""];
        let line = fields
            .iter()
            .map(|field| quote_field(field))
            .collect::<Vec<_>>()
            .join(",");
        assert_eq!(parse_row(&line).unwrap(), fields);
        assert!(parse_row("\"open").is_none());
    }
}
