//! Fatal conditions raised by the conversion engine.
//!
//! Every variant aborts the run. They travel through `anyhow::Result` like
//! any other failure, so callers that need to tell them apart can
//! `downcast_ref::<ConversionError>()`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    /// The configured encoding has no Oracle character set counterpart.
    #[error("Encoding '{encoding}' is not supported here; use \"windows-1252\" or \"UTF-8\"")]
    UnsupportedEncoding { encoding: String },

    /// The extractor met a cell it cannot turn into a value.
    #[error("Cell type {cell_type} of cell {position} is not supported")]
    UnsupportedCellType { position: String, cell_type: String },

    /// A later sheet's header disagrees with the columns already established.
    #[error(
        "Header of column {position} in sheet '{sheet}' is '{found}' but table {table} expects '{expected}'"
    )]
    HeaderMismatch {
        table: String,
        sheet: String,
        position: String,
        expected: String,
        found: String,
    },

    #[error("Table {0} is already defined by another sheet")]
    DuplicateTable(String),

    #[error("Could not find table {0} defined by the first workbook")]
    TableNotFound(String),

    /// Row serialization produced a different number of fields than the table has columns.
    #[error("Row {row} of table {table} has {found} field(s) but the table has {expected} column(s)")]
    FieldCountMismatch {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Header rows {from}..{till} are invalid (use 0 for both to disable the header)")]
    InvalidHeaderRows { from: usize, till: usize },

    /// Without an enclosure, values holding the separator would shift later fields.
    #[error("Enclosure string cannot be empty")]
    EmptyEnclosure,
}
