//! Column descriptors and their running width accumulators.


use serde::Serialize;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::config::Dialect;

/// One width observation reported by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    String(usize),
    Numeric { length: usize, precision: usize },
    Date(usize),
}

/// Running maxima for one column. Fields only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnWidths {
    string_length: usize,
    numeric_length: usize,
    numeric_precision: usize,
    date_length: usize,
}

impl ColumnWidths {
    pub fn widen(&mut self, observation: Observation) {
        match observation {
            Observation::String(length) => {
                self.string_length = self.string_length.max(length);
            }
            Observation::Numeric { length, precision } => {
                self.numeric_length = self.numeric_length.max(length);
                self.numeric_precision = self.numeric_precision.max(precision);
            }
            Observation::Date(length) => {
                self.date_length = self.date_length.max(length);
            }
        }
    }

    pub fn string_length(&self) -> usize {
        self.string_length
    }

    pub fn numeric_length(&self) -> usize {
        self.numeric_length
    }

    pub fn numeric_precision(&self) -> usize {
        self.numeric_precision
    }

    pub fn date_length(&self) -> usize {
        self.date_length
    }

    /// True when the column never observed a value.
    pub fn is_unobserved(&self) -> bool {
        self.string_length == 0
            && self.numeric_length == 0
            && self.numeric_precision == 0
            && self.date_length == 0
    }

    /// Maps the accumulated widths to a SQL type.
    ///
    /// Text wins as soon as one string was seen, or when the column mixed
    /// numbers and dates. `fixed_string_size` replaces every computed string length.
    pub fn resolve(&self, fixed_string_size: Option<usize>) -> SqlType {
        if self.is_unobserved() {
            SqlType::Text(fixed_string_size.unwrap_or(1))
        } else if self.string_length > 0 || (self.numeric_length > 0 && self.date_length > 0) {
            let widest = self
                .string_length
                .max(self.numeric_length)
                .max(self.date_length);
            SqlType::Text(fixed_string_size.unwrap_or(widest))
        } else if self.numeric_length > 0 {
            SqlType::Decimal
        } else {
            SqlType::Date
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text(usize),
    Decimal,
    Date,
}

impl SqlType {
    pub fn render(&self, dialect: Dialect) -> String {
        match self {
            SqlType::Text(length) => format!("{}({length})", dialect.string_keyword()),
            SqlType::Decimal => "DECIMAL".to_string(),
            SqlType::Date => "DATE".to_string(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, SqlType::Text(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    widths: ColumnWidths,
}

impl Column {
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_name(name),
            widths: ColumnWidths::default(),
        }
    }

    pub fn with_observation(name: &str, observation: Observation) -> Self {
        let mut column = Self::new(name);
        column.widths.widen(observation);
        column
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quoted_name(&self) -> String {
        quote_identifier(&self.name)
    }

    pub fn widths(&self) -> &ColumnWidths {
        &self.widths
    }

    pub fn widths_mut(&mut self) -> &mut ColumnWidths {
        &mut self.widths
    }

    pub fn sql_type(&self, fixed_string_size: Option<usize>) -> SqlType {
        self.widths.resolve(fixed_string_size)
    }
}

/// Strips diacritics (canonical decomposition minus combining marks) and trims.
pub fn normalize_name(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
