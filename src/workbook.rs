//! Input model: workbooks → sheets → rows → cells.
//!
//! The engine only sees [`Workbook`] values. [`Workbook::open`] fills them
//! from any format calamine understands; tests build them by hand.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calamine::{Data, DataType, Range, Reader, open_workbook_auto};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use log::{debug, info};

use crate::assemble::column_letter_name;

/// Format code attached to cells that the reader already recognised as dates.
pub const ISO_DATE_FORMAT: &str = "yyyy-mm-dd";

/// Explicit cell type tag, as reported by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    String,
    Numeric,
    Boolean,
    Formula,
    Blank,
    Error,
}

impl CellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::String => "STRING",
            CellType::Numeric => "NUMERIC",
            CellType::Boolean => "BOOLEAN",
            CellType::Formula => "FORMULA",
            CellType::Blank => "BLANK",
            CellType::Error => "ERROR",
        }
    }
}

/// Raw content of a cell; for formulas this is the evaluated result.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawCell {
    pub column: usize,
    pub cell_type: CellType,
    pub content: CellContent,
    /// Display format code; `None` means General.
    pub number_format: Option<String>,
}

impl RawCell {
    pub fn text(column: usize, value: impl Into<String>) -> Self {
        Self {
            column,
            cell_type: CellType::String,
            content: CellContent::Text(value.into()),
            number_format: None,
        }
    }

    pub fn number(column: usize, value: f64) -> Self {
        Self {
            column,
            cell_type: CellType::Numeric,
            content: CellContent::Number(value),
            number_format: None,
        }
    }

    pub fn formatted_number(column: usize, value: f64, format: impl Into<String>) -> Self {
        Self {
            number_format: Some(format.into()),
            ..Self::number(column, value)
        }
    }

    pub fn date(column: usize, date: NaiveDate) -> Self {
        Self::formatted_number(
            column,
            date_to_serial(date.and_time(NaiveTime::default())),
            ISO_DATE_FORMAT,
        )
    }

    pub fn boolean(column: usize, value: bool) -> Self {
        Self {
            column,
            cell_type: CellType::Boolean,
            content: CellContent::Bool(value),
            number_format: None,
        }
    }

    pub fn blank(column: usize) -> Self {
        Self {
            column,
            cell_type: CellType::Blank,
            content: CellContent::Empty,
            number_format: None,
        }
    }

    pub fn error(column: usize, code: impl Into<String>) -> Self {
        Self {
            column,
            cell_type: CellType::Error,
            content: CellContent::Error(code.into()),
            number_format: None,
        }
    }

    /// Turns this cell into a formula cell whose cached result is its current content.
    pub fn into_formula(mut self) -> Self {
        self.cell_type = CellType::Formula;
        self
    }

    /// Spreadsheet-style address such as `C12` for the given 0-based row.
    pub fn position(&self, row_index: usize) -> String {
        cell_position(row_index, self.column)
    }
}

pub fn cell_position(row_index: usize, column: usize) -> String {
    format!("{}{}", column_letter_name(column), row_index + 1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    /// 0-based physical row index.
    pub index: usize,
    /// Present cells in ascending column order.
    pub cells: Vec<RawCell>,
}

impl SheetRow {
    pub fn new(index: usize, mut cells: Vec<RawCell>) -> Self {
        cells.sort_by_key(|cell| cell.column);
        Self { index, cells }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<SheetRow>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<SheetRow>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub path: PathBuf,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(path: impl Into<PathBuf>, sheets: Vec<Sheet>) -> Self {
        Self {
            path: path.into(),
            sheets,
        }
    }

    /// Reads every sheet of the workbook at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        info!("Reading workbook {}", path.display());
        let mut reader =
            open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
        let names = reader.sheet_names().to_vec();
        let mut sheets = Vec::with_capacity(names.len());
        for name in names {
            let range = reader
                .worksheet_range(&name)
                .with_context(|| format!("Reading sheet '{name}' of {path:?}"))?;
            // Formula ranges are optional; some formats cannot provide them.
            let formulas = match reader.worksheet_formula(&name) {
                Ok(formulas) => Some(formulas),
                Err(err) => {
                    debug!("No formulas for sheet '{name}': {err}");
                    None
                }
            };
            let rows = collect_rows(&range, formulas.as_ref());
            debug!("Sheet '{name}' has {} non-empty row(s)", rows.len());
            sheets.push(Sheet { name, rows });
        }
        Ok(Self {
            path: path.to_path_buf(),
            sheets,
        })
    }
}

fn collect_rows(range: &Range<Data>, formulas: Option<&Range<String>>) -> Vec<SheetRow> {
    let Some((row_offset, column_offset)) = range.start() else {
        return Vec::new();
    };
    let mut rows: Vec<SheetRow> = Vec::new();
    for (row, column, data) in range.used_cells() {
        let row_index = row_offset as usize + row;
        let column_index = column_offset as usize + column;
        let Some(mut cell) = convert_cell(column_index, data) else {
            continue;
        };
        if let Some(formulas) = formulas
            && formulas
                .get_value((row_index as u32, column_index as u32))
                .is_some_and(|formula| !formula.trim().is_empty())
        {
            cell = cell.into_formula();
        }
        match rows.last_mut() {
            Some(last) if last.index == row_index => last.cells.push(cell),
            _ => rows.push(SheetRow {
                index: row_index,
                cells: vec![cell],
            }),
        }
    }
    rows
}

fn convert_cell(column: usize, data: &Data) -> Option<RawCell> {
    let cell = match data {
        Data::Empty => return None,
        Data::String(value) => RawCell::text(column, value.clone()),
        Data::Float(value) => RawCell::number(column, *value),
        Data::Int(value) => RawCell::number(column, *value as f64),
        Data::Bool(value) => RawCell::boolean(column, *value),
        Data::DateTime(value) if value.is_duration() => RawCell::number(column, value.as_f64()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match data.as_datetime() {
            Some(datetime) => {
                RawCell::formatted_number(column, date_to_serial(datetime), ISO_DATE_FORMAT)
            }
            None => RawCell::text(column, data.to_string()),
        },
        Data::DurationIso(value) => RawCell::text(column, value.clone()),
        Data::Error(err) => RawCell::error(column, err.to_string()),
    };
    Some(cell)
}

/// Whether a number format code displays a date.
///
/// Quoted literals, backslash/underscore escapes and bracketed sections such as
/// colours or locales are skipped; a `y` or `d` outside them marks a date.
pub fn is_date_format(format: &str) -> bool {
    let mut is_escaped = false;
    let mut is_literal = false;
    let mut is_bracket = false;
    for character in format.chars() {
        match character {
            _ if is_escaped => is_escaped = false,
            '_' | '\\' if !is_literal => is_escaped = true,

            '"' if is_literal => is_literal = false,
            '"' if !is_bracket => is_literal = true,

            ']' if is_bracket => is_bracket = false,
            '[' if !is_literal => is_bracket = true,
            _ if is_literal || is_bracket => (),

            'Y' | 'y' | 'D' | 'd' => return true,
            _ => (),
        }
    }
    false
}

/// `num_days_from_ce` of 1899-12-30, day zero of the 1900 date system.
const SERIAL_EPOCH_DAYS_FROM_CE: i64 = 693_594;

/// Converts a 1900-system serial into a calendar date, dropping the time of day.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let mut days = serial.floor() as i64;
    // Serial 60 is the non-existent 1900-02-29; everything before it is one day late.
    if days < 61 {
        days += 1;
    }
    let days_from_ce = i32::try_from(SERIAL_EPOCH_DAYS_FROM_CE + days).ok()?;
    NaiveDate::from_num_days_from_ce_opt(days_from_ce)
}

pub fn date_to_serial(datetime: NaiveDateTime) -> f64 {
    let days = i64::from(datetime.date().num_days_from_ce()) - SERIAL_EPOCH_DAYS_FROM_CE;
    let seconds = datetime.time().num_seconds_from_midnight();
    let mut serial = days as f64 + f64::from(seconds) / 86_400.0;
    if serial < 61.0 {
        serial -= 1.0;
    }
    serial
}
