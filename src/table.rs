// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! In-memory tabular dataset and its CSV persistence
//!
//! Values are kept as strings exactly as read; stages interpret the columns they
//! own. Every persisted table has a header row.

use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};

/// Ordered rows under a named header
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table; every row must have one value per column
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    /// Convenience constructor for literals
    pub fn from_rows<const N: usize>(columns: &[&str; N], rows: &[[&str; N]]) -> Self {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column the caller cannot do without
    pub fn require_column(&self, name: &str, op: &'static str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::schema(op, name))
    }

    /// Values of one column, in row order
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |r| r[idx].as_str())
    }

    /// Replace every value of a column in place
    pub fn map_column<F>(&mut self, idx: usize, mut f: F)
    where
        F: FnMut(&str) -> String,
    {
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
    }

    /// Keep only the rows whose index satisfies `keep`, preserving order
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(usize, &[String]) -> bool,
    {
        let mut idx = 0;
        self.rows.retain(|row| {
            let k = keep(idx, row);
            idx += 1;
            k
        });
    }

    /// Rows picked by index, in the order given
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Remove the named columns that exist; returns the names that did not
    pub fn drop_columns(&mut self, names: &[String]) -> Vec<String> {
        let mut missing = Vec::new();
        for name in names {
            match self.column_index(name) {
                Some(idx) => {
                    self.columns.remove(idx);
                    for row in &mut self.rows {
                        row.remove(idx);
                    }
                }
                None => missing.push(name.clone()),
            }
        }
        missing
    }

    pub fn rename_column(&mut self, from: &str, to: &str, op: &'static str) -> Result<()> {
        let idx = self.require_column(from, op)?;
        self.columns[idx] = to.to_string();
        Ok(())
    }

    /// Parse CSV bytes with a header row.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, and short rows are padded
    /// with empty fields. Rows wider than the header are an error. Blank header
    /// fields are named `Unnamed: <index>`.
    pub fn parse_csv(bytes: &[u8]) -> std::result::Result<Table, String> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let header: Vec<String> = reader
            .byte_headers()
            .map_err(|e| format!("failed to read header: {}", e))?
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        if header.iter().all(|name| name.is_empty()) {
            return Err("no columns found in header".to_string());
        }
        let columns: Vec<String> = header
            .into_iter()
            .enumerate()
            .map(|(idx, name)| if name.is_empty() { unnamed_column(idx) } else { name })
            .collect();

        let mut rows = Vec::new();
        for (idx, record) in reader.byte_records().enumerate() {
            let record = record.map_err(|e| format!("failed to read record {}: {}", idx, e))?;
            if record.len() > columns.len() {
                return Err(format!(
                    "record {} has {} fields, header has {}",
                    idx,
                    record.len(),
                    columns.len()
                ));
            }
            let mut row: Vec<String> = record
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Table { columns, rows })
    }

    /// Load a CSV file written by an earlier stage
    pub fn read_csv(path: &Path, op: &'static str) -> Result<Table> {
        let bytes = std::fs::read(path).map_err(|e| PipelineError::io(op, path, e))?;
        let table = Self::parse_csv(&bytes)
            .map_err(|detail| PipelineError::data_source(op, &path.display().to_string(), detail))?;
        tracing::debug!("Data loaded from {} ({} rows)", path.display(), table.len());
        Ok(table)
    }

    /// Serialize to CSV with `\n` record terminators
    pub fn to_csv_bytes(&self) -> std::result::Result<Vec<u8>, String> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(&self.columns).map_err(|e| e.to_string())?;
        for row in &self.rows {
            writer.write_record(row).map_err(|e| e.to_string())?;
        }
        writer.into_inner().map_err(|e| e.to_string())
    }
}

/// Name given to a blank header field at `idx`
fn unnamed_column(idx: usize) -> String {
    format!("Unnamed: {}", idx)
}

/// Write several tables into `dir` so that either all land or none do.
///
/// Each table is serialized and written to a temporary sibling first. Existing
/// targets are moved aside before the temporaries are renamed into place, and
/// restored if any rename fails.
pub fn persist_all(dir: &Path, files: &[(&str, &Table)], op: &'static str) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(op, dir, e))?;

    let mut staged: Vec<Staged> = Vec::with_capacity(files.len());
    let outcome = (|| -> Result<()> {
        for (name, table) in files {
            let target = dir.join(name);
            let tmp = dir.join(format!(".{}.tmp", name));
            let bytes = table.to_csv_bytes().map_err(|detail| {
                PipelineError::io(op, &target, std::io::Error::new(std::io::ErrorKind::Other, detail))
            })?;
            std::fs::write(&tmp, bytes).map_err(|e| PipelineError::io(op, &tmp, e))?;
            staged.push(Staged {
                tmp,
                backup: dir.join(format!(".{}.bak", name)),
                target,
            });
        }
        Ok(())
    })();

    if let Err(err) = outcome {
        for file in &staged {
            let _ = std::fs::remove_file(&file.tmp);
        }
        return Err(err);
    }

    // (staged entry, whether a previous target was moved to its backup)
    let mut placed: Vec<(&Staged, bool)> = Vec::with_capacity(staged.len());
    let mut failure = None;
    for file in &staged {
        let had_previous = file.target.is_file();
        if had_previous {
            if let Err(e) = std::fs::rename(&file.target, &file.backup) {
                failure = Some(PipelineError::io(op, &file.target, e));
                break;
            }
        }
        if let Err(e) = std::fs::rename(&file.tmp, &file.target) {
            if had_previous {
                let _ = std::fs::rename(&file.backup, &file.target);
            }
            failure = Some(PipelineError::io(op, &file.target, e));
            break;
        }
        placed.push((file, had_previous));
    }

    if let Some(err) = failure {
        for (file, had_previous) in placed.iter().rev() {
            if *had_previous {
                let _ = std::fs::rename(&file.backup, &file.target);
            } else {
                let _ = std::fs::remove_file(&file.target);
            }
        }
        for file in &staged {
            let _ = std::fs::remove_file(&file.tmp);
        }
        return Err(err);
    }

    for (file, had_previous) in &placed {
        if *had_previous {
            let _ = std::fs::remove_file(&file.backup);
        }
    }
    Ok(staged.into_iter().map(|file| file.target).collect())
}

/// Paths involved in placing one file
struct Staged {
    tmp: PathBuf,
    backup: PathBuf,
    target: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_pads_short_rows_and_replaces_bad_utf8() {
        let mut bytes = b"v1,v2,extra\nham,hello,\nspam,caf".to_vec();
        bytes.push(0xe9); // latin-1 e-acute
        bytes.extend_from_slice(b"\n");

        let table = Table::parse_csv(&bytes).unwrap();
        assert_eq!(table.columns(), &["v1", "v2", "extra"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1][2], "");
        assert!(table.rows()[1][1].starts_with("caf"));
    }

    #[test]
    fn test_parse_rejects_wide_rows() {
        let err = Table::parse_csv(b"a,b\n1,2,3\n").unwrap_err();
        assert!(err.contains("3 fields"));
    }

    #[test]
    fn test_drop_and_rename() {
        let mut table = Table::from_rows(&["v1", "v2", "junk"], &[["ham", "hi", "x"]]);
        let missing = table.drop_columns(&["junk".to_string(), "absent".to_string()]);
        assert_eq!(missing, vec!["absent".to_string()]);
        table.rename_column("v1", "target", "test").unwrap();
        assert_eq!(table.columns(), &["target", "v2"]);
        assert_eq!(table.rows()[0], vec!["ham".to_string(), "hi".to_string()]);

        let err = table.rename_column("v9", "text", "test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_csv_roundtrip_with_quotes_and_newlines() {
        let table = Table::from_rows(
            &["target", "text"],
            &[["0", "hello, \"world\""], ["1", "line one\nline two"], ["0", ""]],
        );
        let bytes = table.to_csv_bytes().unwrap();
        assert_eq!(Table::parse_csv(&bytes).unwrap(), table);
    }

    #[test]
    fn test_persist_all_overwrites_and_leaves_no_temporaries() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("raw");
        let a = Table::from_rows(&["x"], &[["1"]]);
        let b = Table::from_rows(&["x"], &[["2"]]);

        persist_all(&out, &[("train.csv", &a), ("test.csv", &b)], "test").unwrap();
        persist_all(&out, &[("train.csv", &b), ("test.csv", &a)], "test").unwrap();

        assert_eq!(std::fs::read_to_string(out.join("train.csv")).unwrap(), "x\n2\n");
        assert_eq!(std::fs::read_to_string(out.join("test.csv")).unwrap(), "x\n1\n");
        let names: Vec<_> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_blank_header_fields_are_named_by_position() {
        let table = Table::parse_csv(b"v1,v2,,,\nham,hello there,,,\n").unwrap();
        assert_eq!(table.columns(), &["v1", "v2", "Unnamed: 2", "Unnamed: 3", "Unnamed: 4"]);
        assert!(Table::parse_csv(b",,\n1,2,3\n").is_err());
        assert!(Table::parse_csv(b"").is_err());
    }

    #[test]
    fn test_persist_all_restores_earlier_files_when_a_rename_fails() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("raw");
        let old = Table::from_rows(&["x"], &[["old"]]);
        let new = Table::from_rows(&["x"], &[["new"]]);
        persist_all(&out, &[("train.csv", &old)], "test").unwrap();
        // a non-empty directory where the second file should go blocks its rename
        std::fs::create_dir_all(out.join("test.csv").join("occupied")).unwrap();

        let err = persist_all(&out, &[("train.csv", &new), ("test.csv", &new)], "test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(std::fs::read_to_string(out.join("train.csv")).unwrap(), "x\nold\n");

        let mut names: Vec<_> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["test.csv".to_string(), "train.csv".to_string()]);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Table::read_csv(&dir.path().join("nope.csv"), "load").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
