//! Serializes buffered rows to CSV and renders the SQL scripts.
//!
//! Runs only after every workbook has been scanned, so each record is laid out
//! against the table's final column list.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use encoding_rs::UTF_8;
use itertools::Itertools;
use log::{info, warn};

use crate::{
    assemble::AssembledRow,
    config::{Dialect, Settings, TableFormat},
    error::ConversionError,
    io_utils,
    registry::TableEntry,
    schema::{NL, Table, directory_preamble},
};

pub const TABLES_SCRIPT: &str = "tables.sql";
pub const LOAD_SCRIPT: &str = "load.sql";
pub const DELETE_SCRIPT: &str = "delete.sql";

/// Record terminator inside CSV files.
pub const RECORD_TERMINATOR: &str = "\r\n";

/// Encloses `value` when it contains the separator, the enclosure string or a
/// line break. Embedded enclosure strings are doubled.
pub fn quote_field(value: &str, format: &TableFormat) -> String {
    let enclosure = format.enclosure.as_str();
    if enclosure.is_empty() {
        return value.to_string();
    }
    let needs_enclosure = value.contains(enclosure)
        || value.contains(['\r', '\n'])
        || (!format.separator.is_empty() && value.contains(&format.separator));
    if !needs_enclosure {
        return value.to_string();
    }
    let doubled = value.replace(enclosure, &enclosure.repeat(2));
    format!("{enclosure}{doubled}{enclosure}")
}

pub fn serialize_header(table: &Table) -> String {
    let format = table.format();
    table
        .columns()
        .iter()
        .map(|column| quote_field(column.name(), format))
        .join(&format.separator)
}

/// One CSV record: metadata values (when present) then every data column.
pub fn serialize_row(table: &Table, row: &AssembledRow) -> Result<String, ConversionError> {
    let data_columns = table.data_column_count();
    let widest = row
        .values
        .keys()
        .next_back()
        .map_or(data_columns, |last| data_columns.max(last + 1));
    let leading = table.column_count() - data_columns;
    if widest != data_columns {
        return Err(ConversionError::FieldCountMismatch {
            table: table.quoted_name(),
            row: row.row_number,
            expected: table.column_count(),
            found: leading + widest,
        });
    }

    let mut fields = Vec::with_capacity(table.column_count());
    if table.has_metadata_columns() {
        fields.push(row.sheet.clone());
        fields.push(row.row_number.to_string());
    }
    fields.extend(
        (0..data_columns).map(|idx| row.values.get(&idx).cloned().unwrap_or_default()),
    );

    let format = table.format();
    Ok(fields
        .iter()
        .map(|field| quote_field(field, format))
        .join(&format.separator))
}

/// Header record plus every row, joined by CRLF without a trailing terminator.
pub fn render_csv(table: &Table, rows: &[AssembledRow]) -> Result<String> {
    let mut records = Vec::with_capacity(rows.len() + 1);
    records.push(serialize_header(table));
    for row in rows {
        records.push(serialize_row(table, row)?);
    }
    Ok(records.join(RECORD_TERMINATOR))
}

/// Script contents; `load`/`delete` exist for PostgreSQL only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scripts {
    pub tables: String,
    pub load: Option<String>,
    pub delete: Option<String>,
}

/// Renders the scripts for `tables`, whose CSV files live in `output_dir`.
pub fn render_scripts(tables: &[&Table], dialect: Dialect, output_dir: &Path) -> Result<Scripts> {
    let mut scripts = Scripts::default();
    if dialect == Dialect::Oracle {
        scripts.tables.push_str(&directory_preamble(output_dir));
    }
    for table in tables {
        scripts.tables.push_str(&table.ddl(dialect)?);
        scripts.tables.push_str(NL);
    }
    if dialect == Dialect::Postgresql {
        let mut load = String::new();
        let mut delete = String::new();
        for table in tables {
            load.push_str(&table.load_statement(&output_dir.join(table.location()))?);
            delete.push_str(&table.delete_statement());
        }
        scripts.load = Some(load);
        scripts.delete = Some(delete);
    }
    Ok(scripts)
}

/// Files written by [`write_outputs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmittedFiles {
    pub csv_files: Vec<PathBuf>,
    pub scripts: Vec<PathBuf>,
    pub skipped_tables: Vec<String>,
}

/// Writes one CSV per non-empty table and the scripts covering them.
pub fn write_outputs(entries: &[TableEntry], settings: &Settings) -> Result<EmittedFiles> {
    let output_dir = std::path::absolute(&settings.output_dir)
        .with_context(|| format!("Resolving output directory {:?}", settings.output_dir))?;
    let mut emitted = EmittedFiles::default();
    let mut written = Vec::new();

    for entry in entries {
        let table = &entry.table;
        if entry.rows.is_empty() {
            warn!(
                "Table {} has no data rows; skipping its CSV and SQL",
                table.quoted_name()
            );
            emitted.skipped_tables.push(table.name().to_string());
            continue;
        }
        let path = output_dir.join(table.location());
        let csv = render_csv(table, &entry.rows)
            .with_context(|| format!("Serializing table {}", table.quoted_name()))?;
        io_utils::write_text(&path, &csv, table.format().encoding, settings.emits_bom())?;
        info!(
            "Wrote {} row(s) of table {} ({} column(s))",
            entry.rows.len(),
            table.quoted_name(),
            table.column_count()
        );
        emitted.csv_files.push(path);
        written.push(table);
    }

    if written.is_empty() {
        warn!("No table has data; no SQL scripts written");
        return Ok(emitted);
    }
    let scripts = render_scripts(&written, settings.format.dialect, &output_dir)?;
    let targets = [
        (TABLES_SCRIPT, Some(scripts.tables)),
        (LOAD_SCRIPT, scripts.load),
        (DELETE_SCRIPT, scripts.delete),
    ];
    for (file_name, content) in targets {
        let Some(content) = content else { continue };
        let path = output_dir.join(file_name);
        io_utils::write_text(&path, &content, UTF_8, false)?;
        emitted.scripts.push(path);
    }
    Ok(emitted)
}
