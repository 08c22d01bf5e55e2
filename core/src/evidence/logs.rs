use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const NO_LOGS_FOUND: &str = "NO_LOGS_FOUND";
pub const SOURCE_FILE_COLUMN: &str = "source_file";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Rows from every matched CSV file; columns are the union of all headers in
/// first-seen order, followed by `source_file`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogTable {
    pub columns: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
    pub skipped: Vec<SkippedFile>,
}

impl LogTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `col=value; col=value` per row, at most `cap` rows; the
    /// `NO_LOGS_FOUND` sentinel when there are no rows.
    pub fn render_for_prompt(&self, cap: usize) -> String {
        if self.rows.is_empty() {
            return NO_LOGS_FOUND.to_string();
        }
        self.rows
            .iter()
            .take(cap)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| format!("{}={}", c, row.get(c).map(String::as_str).unwrap_or("")))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Tabular log source. Absence of matches is an empty table, never an error.
pub trait LogLoader {
    fn load(&self, pattern: &str) -> CoreResult<LogTable>;
}

/// Loads CSV files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvLogLoader;

impl LogLoader for CsvLogLoader {
    fn load(&self, pattern: &str) -> CoreResult<LogTable> {
        load_logs(pattern)
    }
}

/// Load every CSV matching the glob `pattern`. Unreadable files are skipped
/// and recorded.
pub fn load_logs(pattern: &str) -> CoreResult<LogTable> {
    let paths = expand_glob(pattern);
    if paths.is_empty() {
        debug!(pattern, "no log files matched");
        return Ok(LogTable::empty());
    }

    let mut table = LogTable::empty();
    for path in paths {
        let key = path.to_string_lossy().to_string();
        match read_csv_rows(&path) {
            Ok((headers, rows)) => {
                for h in headers {
                    if h != SOURCE_FILE_COLUMN && !table.columns.contains(&h) {
                        table.columns.push(h);
                    }
                }
                for mut row in rows {
                    row.insert(SOURCE_FILE_COLUMN.to_string(), key.clone());
                    table.rows.push(row);
                }
            }
            Err(e) => {
                warn!(path = %key, error = %e, "failed to read log file; skipping");
                table.skipped.push(SkippedFile {
                    path: key,
                    reason: e.to_string(),
                });
            }
        }
    }
    if !table.rows.is_empty() || !table.columns.is_empty() {
        table.columns.push(SOURCE_FILE_COLUMN.to_string());
    }
    Ok(table)
}

type CsvRows = (Vec<String>, Vec<BTreeMap<String, String>>);

fn read_csv_rows(path: &Path) -> CoreResult<CsvRows> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok((headers, rows))
}

/// Matching file paths in sorted order. Wildcards and character classes
/// may appear in any path component. A malformed pattern matches nothing.
pub fn expand_glob(pattern: &str) -> Vec<PathBuf> {
    let entries = match glob::glob(pattern) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(pattern, error = %e, "invalid log glob; treating as no match");
            return Vec::new();
        }
    };
    let mut out: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(path = %e.path().display(), error = %e, "unreadable glob entry; skipping");
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_is_anchored_and_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["log1.csv", "log12.csv", "security.csv.bak"] {
            std::fs::write(dir.path().join(name), "a\n1\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("log2.csv")).unwrap();
        let found = expand_glob(&dir.path().join("log?.csv").to_string_lossy());
        assert_eq!(found, vec![dir.path().join("log1.csv")]);
        assert!(expand_glob(&dir.path().join("[.csv").to_string_lossy()).is_empty());
    }

    #[test]
    fn empty_table_renders_sentinel() {
        assert_eq!(LogTable::empty().render_for_prompt(500), NO_LOGS_FOUND);
    }
}
