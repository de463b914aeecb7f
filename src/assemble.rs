//! Rebuilds ordered columns and sparse rows from one sheet.
//!
//! Rows come in physical order. Rows inside the header region feed a
//! [`HeaderAccumulator`]; when the first data row arrives (or the sheet ends)
//! the accumulated names either define the table's columns or, when the
//! table already has columns, are checked against them. Data rows become
//! [`AssembledRow`]s that only hold the cells actually present.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    column::{Column, normalize_name},
    config::Settings,
    error::ConversionError,
    extract::{extract, header_text},
    schema::Table,
    workbook::{Sheet, SheetRow, cell_position},
};

/// Column index → value for the cells present in one row.
pub type SparseRow = BTreeMap<usize, String>;

/// A data row waiting to be serialized once its table's schema is final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledRow {
    pub sheet: String,
    /// 1-based physical row number within the sheet.
    pub row_number: usize,
    pub values: SparseRow,
}

impl AssembledRow {
    pub fn is_blank(&self) -> bool {
        self.values.values().all(|value| value.is_empty())
    }
}

/// Spreadsheet letter name of a 0-based column index (`0 → A`, `26 → AA`).
pub fn column_letter_name(index: usize) -> String {
    let mut remaining = index + 1;
    let mut name = String::new();
    while remaining > 0 {
        let digit = (remaining - 1) % 26;
        name.insert(0, char::from(b'A' + digit as u8));
        remaining = (remaining - 1) / 26;
    }
    name
}

/// Header text per column index, concatenated across header rows.
#[derive(Debug, Clone, Default)]
pub struct HeaderAccumulator {
    texts: BTreeMap<usize, String>,
}

impl HeaderAccumulator {
    pub fn push(&mut self, column: usize, text: &str) {
        self.texts
            .entry(column)
            .and_modify(|existing| {
                existing.push(' ');
                existing.push_str(text);
            })
            .or_insert_with(|| text.to_string());
    }

    /// Names for every index up to the last named one; gaps get letter names.
    pub fn column_names(&self) -> Vec<String> {
        let Some(&last) = self.texts.keys().next_back() else {
            return Vec::new();
        };
        (0..=last)
            .map(|idx| {
                self.texts
                    .get(&idx)
                    .cloned()
                    .unwrap_or_else(|| column_letter_name(idx))
            })
            .collect()
    }
}

/// Scans `sheet` into `table`, returning its non-blank data rows.
pub fn assemble_sheet(
    sheet: &Sheet,
    table: &mut Table,
    settings: &Settings,
) -> Result<Vec<AssembledRow>> {
    let mut header = HeaderAccumulator::default();
    let mut header_applied = settings.header.is_none();
    let mut rows = Vec::new();

    for row in &sheet.rows {
        let row_number = row.index + 1;
        if settings.header.is_before(row_number) {
            debug!("Skipping row {row_number} of '{}' above the header", sheet.name);
            continue;
        }
        if settings.header.contains(row_number) {
            for cell in &row.cells {
                let text = header_text(cell);
                if !text.is_empty() {
                    header.push(cell.column, &text);
                }
            }
            continue;
        }
        if !header_applied {
            apply_header(&header, table, &sheet.name)?;
            header_applied = true;
        }
        match assemble_row(row, table, settings, &sheet.name)? {
            Some(assembled) => {
                rows.push(assembled);
                if rows.len() % 10_000 == 0 {
                    info!("Processed {} row(s) of sheet '{}'", rows.len(), sheet.name);
                }
            }
            None => debug!("Skipping row {row_number} of '{}' since it is empty", sheet.name),
        }
    }
    if !header_applied {
        apply_header(&header, table, &sheet.name)?;
    }
    Ok(rows)
}

/// Defines the table's columns from `header`, or verifies them when already defined.
pub fn apply_header(header: &HeaderAccumulator, table: &mut Table, sheet: &str) -> Result<()> {
    let names = header.column_names();
    if table.data_column_count() > 0 {
        verify_header(&names, table, sheet)?;
        debug!("Header of sheet '{sheet}' matches table {}", table.quoted_name());
        return Ok(());
    }
    if names.is_empty() {
        warn!("Sheet '{sheet}' has no header text; its data cells will be ignored");
    }
    for (idx, name) in names.iter().enumerate() {
        info!("Scanning heading {}: {name}", idx + 1);
        table.add_column(Column::new(name));
    }
    Ok(())
}

fn verify_header(names: &[String], table: &Table, sheet: &str) -> Result<(), ConversionError> {
    let established = table.data_columns();
    for (idx, name) in names.iter().enumerate() {
        let found = normalize_name(name);
        let expected = established.get(idx).map(|column| column.name());
        if expected != Some(found.as_str()) {
            return Err(ConversionError::HeaderMismatch {
                table: table.quoted_name(),
                sheet: sheet.to_string(),
                position: column_letter_name(idx),
                expected: expected.unwrap_or_default().to_string(),
                found,
            });
        }
    }
    Ok(())
}

fn assemble_row(
    row: &SheetRow,
    table: &mut Table,
    settings: &Settings,
    sheet: &str,
) -> Result<Option<AssembledRow>> {
    let mut values = SparseRow::new();
    for cell in &row.cells {
        if cell.column >= table.data_column_count() {
            if settings.header.is_none() {
                table.ensure_data_columns(cell.column + 1);
            } else {
                debug!(
                    "Ignoring cell {} of '{sheet}' beyond the last heading",
                    cell.position(row.index)
                );
                continue;
            }
        }
        let Some(column) = table.data_column_mut(cell.column) else {
            continue;
        };
        let value = extract(cell, row.index, column.widths_mut()).with_context(|| {
            format!(
                "Sheet '{sheet}' cell {}",
                cell_position(row.index, cell.column)
            )
        })?;
        values.insert(cell.column, value);
    }
    let assembled = AssembledRow {
        sheet: sheet.to_string(),
        row_number: row.index + 1,
        values,
    };
    Ok((!assembled.is_blank()).then_some(assembled))
}
