//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - Scenario row conversion and state serialization
//! - `reader` - Streaming scenario reader with iterator interface
//! - `export` - JSON account export

pub mod csv_format;
pub mod export;
pub mod reader;

pub use csv_format::{convert_csv_record, parse_line_items, write_state_csv, CsvRecord, Operation};
pub use export::{write_export_json, AccountExport};
pub use reader::{OperationReader, ScenarioRow};
