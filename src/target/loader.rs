// ABOUTME: Loads targets from a CSV text file.
// ABOUTME: Bad lines are skipped with a diagnostic instead of failing the batch.

use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::warn;

use super::Target;
use crate::error::LoadError;

/// A line that was not turned into a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the source.
    pub line: usize,
    pub reason: String,
}

/// Result of parsing a target list.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub targets: Vec<Target>,
    pub skipped: Vec<SkippedLine>,
}

/// Read and parse a target file.
///
/// Each record is comma-separated `phone,message,count,delay`. Columns after
/// the fourth are ignored. Fields follow CSV quoting, so a quoted message may
/// contain commas and `""` stands for one quote. Blank lines and lines
/// starting with `#` are skipped silently.
pub fn load_targets(path: &Path) -> Result<LoadReport, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Io(e),
    })?;
    Ok(parse_targets(&contents))
}

/// Parse target records from a string. See [`load_targets`] for the format.
pub fn parse_targets(contents: &str) -> LoadReport {
    let mut report = LoadReport::default();
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(contents.as_bytes());

    for (idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(idx + 1, |p| p.line() as usize);
                report_skip(&mut report.skipped, line, e.to_string());
                continue;
            }
        };
        if is_blank_or_comment(&record) {
            continue;
        }

        let line = record.position().map_or(idx + 1, |p| p.line() as usize);
        match parse_record(&record) {
            Ok(target) => report.targets.push(target),
            Err(reason) => report_skip(&mut report.skipped, line, reason),
        }
    }

    report
}

fn report_skip(skipped: &mut Vec<SkippedLine>, line: usize, reason: String) {
    warn!(line, %reason, "skipping target line");
    skipped.push(SkippedLine { line, reason });
}

/// Whitespace-only rows and comments indented past the first column.
fn is_blank_or_comment(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty) || record.get(0).is_some_and(|f| f.starts_with('#'))
}

fn parse_record(record: &StringRecord) -> Result<Target, String> {
    let (Some(phone), Some(message), Some(count), Some(delay)) =
        (record.get(0), record.get(1), record.get(2), record.get(3))
    else {
        return Err("expected 4 fields: phone,message,count,delay".to_string());
    };

    let count: u32 = count
        .parse()
        .map_err(|_| format!("invalid count '{}'", count))?;
    let delay: f64 = delay
        .parse()
        .map_err(|_| format!("invalid delay '{}'", delay))?;

    Target::new(phone, message, count, delay).map_err(|e| e.to_string())
}
