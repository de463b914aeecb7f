//! Turns raw cells into canonical text and reports their widths.
//!
//! Each typed attempt ([`numeric_value`], [`string_value`], [`boolean_value`])
//! returns `None` when the cell content does not fit it. Formula cells walk the
//! attempts in a fixed order and keep the first hit.

use std::str::FromStr;

use anyhow::Result;
use log::debug;
use rust_decimal::Decimal;

use crate::{
    column::{ColumnWidths, Observation},
    error::ConversionError,
    workbook::{CellContent, CellType, RawCell, is_date_format, serial_to_date},
};

/// Canonical text of a cell plus what it tells about the column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub value: String,
    pub observation: Observation,
}

type Attempt = fn(&RawCell) -> Option<Extracted>;

/// Numbers first, text next, booleans last.
const FORMULA_ATTEMPTS: [Attempt; 3] = [numeric_value, string_value, boolean_value];

/// Extracts the value of `cell` (found at 0-based `row_index`) and widens `widths`.
pub fn extract(cell: &RawCell, row_index: usize, widths: &mut ColumnWidths) -> Result<String> {
    let extracted = match cell.cell_type {
        CellType::Numeric => numeric_value(cell),
        CellType::String | CellType::Blank => string_value(cell),
        CellType::Boolean => boolean_value(cell),
        CellType::Formula => FORMULA_ATTEMPTS.iter().find_map(|attempt| attempt(cell)),
        CellType::Error => None,
    };
    let Some(Extracted { value, observation }) = extracted else {
        return Err(ConversionError::UnsupportedCellType {
            position: cell.position(row_index),
            cell_type: describe_cell(cell),
        }
        .into());
    };
    debug!(
        "Cell {} ({}): '{value}' {observation:?}",
        cell.position(row_index),
        cell.cell_type.as_str()
    );
    widths.widen(observation);
    Ok(value)
}

fn describe_cell(cell: &RawCell) -> String {
    match &cell.content {
        CellContent::Error(code) => format!("{} ({code})", cell.cell_type.as_str()),
        _ => cell.cell_type.as_str().to_string(),
    }
}

pub fn numeric_value(cell: &RawCell) -> Option<Extracted> {
    let CellContent::Number(number) = cell.content else {
        return None;
    };
    let format = cell.number_format.as_deref();
    if format.is_some_and(is_date_format) {
        let value = serial_to_date(number)?.format("%Y-%m-%d").to_string();
        let observation = Observation::Date(value.chars().count());
        return Some(Extracted { value, observation });
    }

    let mut value = render_number(number, format).replace(',', "");
    if let Some(percent) = value.strip_suffix('%') {
        value = divide_by_hundred(percent)?;
    }
    let (integer, fraction) = value.split_once('.').unwrap_or((value.as_str(), ""));
    let observation = Observation::Numeric {
        length: integer.len() + fraction.len(),
        precision: fraction.len(),
    };
    Some(Extracted { value, observation })
}

pub fn string_value(cell: &RawCell) -> Option<Extracted> {
    let value = match &cell.content {
        CellContent::Text(text) => text.clone(),
        CellContent::Empty => String::new(),
        _ => return None,
    };
    let observation = Observation::String(value.chars().count());
    Some(Extracted { value, observation })
}

pub fn boolean_value(cell: &RawCell) -> Option<Extracted> {
    let CellContent::Bool(flag) = cell.content else {
        return None;
    };
    let value = flag.to_string();
    let observation = Observation::String(value.len());
    Some(Extracted { value, observation })
}

/// Text shown for a cell inside the header region.
pub fn header_text(cell: &RawCell) -> String {
    match &cell.content {
        CellContent::Empty => String::new(),
        CellContent::Text(text) => text.clone(),
        CellContent::Bool(flag) => flag.to_string(),
        CellContent::Error(code) => code.clone(),
        CellContent::Number(_) => numeric_value(cell)
            .map(|extracted| extracted.value)
            .unwrap_or_default(),
    }
}

/// Exact decimal division; magnitudes past `Decimal::MAX` fall back to `f64`.
fn divide_by_hundred(number: &str) -> Option<String> {
    let number = number.trim();
    if let Ok(parsed) = Decimal::from_str(number) {
        return Some((parsed / Decimal::ONE_HUNDRED).normalize().to_string());
    }
    let parsed = number.parse::<f64>().ok()?;
    Some(format!("{}", parsed / 100.0))
}

/// Renders `value` the way a spreadsheet displays it under `format`.
///
/// Only the first format section matters: the number of decimal placeholders
/// after `.`, `,` grouping and a trailing `%`. Without a format (General)
/// integers lose their fraction and other values keep 15 significant digits.
pub fn render_number(value: f64, format: Option<&str>) -> String {
    let Some(layout) = format.and_then(NumberFormat::parse) else {
        return render_general(value);
    };
    let scaled = if layout.percent { value * 100.0 } else { value };
    let mut rendered = format!("{:.*}", layout.decimals, scaled);
    if layout.grouping {
        rendered = group_thousands(&rendered);
    }
    if layout.percent {
        rendered.push('%');
    }
    rendered
}

fn render_general(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let rounded = format!("{value:.14e}").parse::<f64>().unwrap_or(value);
    format!("{rounded}")
}

fn group_thousands(rendered: &str) -> String {
    let (sign, unsigned) = match rendered.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rendered),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };
    let mut grouped = String::with_capacity(rendered.len() + integer.len() / 3);
    for (idx, digit) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NumberFormat {
    decimals: usize,
    grouping: bool,
    percent: bool,
}

impl NumberFormat {
    /// `None` for General or for codes without any digit placeholder.
    fn parse(code: &str) -> Option<Self> {
        if code.trim().eq_ignore_ascii_case("general") {
            return None;
        }
        let mut layout = NumberFormat {
            decimals: 0,
            grouping: false,
            percent: false,
        };
        let mut placeholders = 0usize;
        let mut after_point = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_escaped = false;
        for character in code.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '\\' | '_' | '*' if !is_literal => is_escaped = true,
                '"' => is_literal = !is_literal,
                _ if is_literal => (),
                '[' => is_bracket = true,
                ']' => is_bracket = false,
                _ if is_bracket => (),
                ';' => break,
                '0' | '#' | '?' => {
                    placeholders += 1;
                    if after_point {
                        layout.decimals += 1;
                    }
                }
                '.' => after_point = true,
                ',' if !after_point => layout.grouping = true,
                '%' => layout.percent = true,
                _ => (),
            }
        }
        (placeholders > 0).then_some(layout)
    }
}
