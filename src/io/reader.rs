//! Streaming reader over scenario rows
//!
//! `OperationReader` wraps a `csv::Reader`, converting one row at a time and
//! tagging each with its line number so failures can be reported against
//! the input file.
//!
//! ```no_run
//! use points_ledger::io::OperationReader;
//! use std::path::Path;
//!
//! let reader = OperationReader::new(Path::new("scenario.csv")).unwrap();
//! for row in reader {
//!     match row {
//!         Ok(row) => println!("line {}: {:?}", row.line, row.operation),
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found) are returned from `new()`
//! - Individual row errors are yielded as Err variants in the iterator

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, Trim};

use crate::io::csv_format::{convert_csv_record, CsvRecord, Operation};

/// A converted row and the input line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioRow {
    /// 1-based line number in the input file, header included
    pub line: usize,
    pub operation: Operation,
}

/// Synchronous scenario reader
#[derive(Debug)]
pub struct OperationReader {
    reader: csv::Reader<File>,
    line_num: usize,
}

impl OperationReader {
    /// Open a scenario file
    ///
    /// Fields are trimmed and short rows are accepted, so trailing optional
    /// columns may be left out entirely.
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
        })
    }
}

impl Iterator for OperationReader {
    type Item = Result<ScenarioRow, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CsvRecord>();
        let next = deserializer.next()?;
        self.line_num += 1;
        let line = self.line_num;

        Some(match next {
            Ok(csv_record) => convert_csv_record(csv_record)
                .map(|operation| ScenarioRow { line, operation })
                .map_err(|e| format!("Line {}: {}", line, e)),
            Err(e) => Err(format!("Line {}: CSV parse error: {}", line, e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "op,account,target,quantity,amount\n";

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_missing_file() {
        let result = OperationReader::new(Path::new("nonexistent.csv"));
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_rows_carry_line_numbers() {
        let file = create_temp_csv(&format!(
            "{}open,alice,,,\nproduct,,P1,5,200\ntopup,alice,,,1000\n",
            HEADER
        ));

        let rows: Vec<_> = OperationReader::new(file.path())
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        let lines: Vec<usize> = rows.iter().map(|row| row.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
        assert!(rows[1].operation.is_catalog());
    }

    #[test]
    fn test_continues_after_bad_row() {
        let file = create_temp_csv(&format!(
            "{}open,alice,,,\nteleport,alice,,,\ntopup,alice,,,1000\n",
            HEADER
        ));

        let rows: Vec<_> = OperationReader::new(file.path()).unwrap().collect();

        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        let error = rows[1].as_ref().unwrap_err();
        assert!(error.contains("Line 3"));
        assert!(error.contains("Invalid operation"));
        assert!(rows[2].is_ok());
    }

    #[test]
    fn test_short_rows_and_whitespace() {
        let file = create_temp_csv(&format!("{}  open , alice \nretire,,P1\n", HEADER));

        let rows: Vec<_> = OperationReader::new(file.path()).unwrap().collect();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(Result::is_ok), "{:?}", rows);
    }

    #[test]
    fn test_header_only() {
        let file = create_temp_csv(HEADER);
        assert_eq!(OperationReader::new(file.path()).unwrap().count(), 0);
    }
}
