//! Immutable run configuration.
//!
//! [`Settings`] is built once from the command line and handed to every
//! component by reference. [`TableFormat`] is the slice of it each table keeps
//! for rendering its CSV and DDL.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ValueEnum;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::{cli::ConversionArgs, error::ConversionError, io_utils};

/// Target SQL system for generated scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Default)]
#[value(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Oracle,
    #[value(alias = "postgres")]
    Postgresql,
}

impl Dialect {
    pub fn string_keyword(self) -> &'static str {
        match self {
            Dialect::Oracle => "VARCHAR2",
            Dialect::Postgresql => "VARCHAR",
        }
    }
}

/// Which physical rows (1-based, inclusive) hold column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRows {
    None,
    Range { from: usize, till: usize },
}

impl HeaderRows {
    pub fn new(from: usize, till: usize) -> Result<Self, ConversionError> {
        match (from, till) {
            (0, 0) => Ok(HeaderRows::None),
            (from, till) if from == 0 || till == 0 || from > till => {
                Err(ConversionError::InvalidHeaderRows { from, till })
            }
            (from, till) => Ok(HeaderRows::Range { from, till }),
        }
    }

    /// Returns true when there is no header region at all.
    pub fn is_none(&self) -> bool {
        matches!(self, HeaderRows::None)
    }

    pub fn contains(&self, row_number: usize) -> bool {
        match self {
            HeaderRows::None => false,
            HeaderRows::Range { from, till } => (*from..=*till).contains(&row_number),
        }
    }

    pub fn is_before(&self, row_number: usize) -> bool {
        match self {
            HeaderRows::None => false,
            HeaderRows::Range { from, .. } => row_number < *from,
        }
    }
}

/// Per-table formatting configuration.
#[derive(Debug, Clone)]
pub struct TableFormat {
    pub separator: String,
    pub enclosure: String,
    pub encoding: &'static Encoding,
    pub dialect: Dialect,
    pub fixed_string_size: Option<usize>,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            separator: ",".to_string(),
            enclosure: "\"".to_string(),
            encoding: WINDOWS_1252,
            dialect: Dialect::Oracle,
            fixed_string_size: None,
        }
    }
}

impl TableFormat {
    pub fn oracle_character_set(&self) -> Result<&'static str, ConversionError> {
        if self.encoding == WINDOWS_1252 {
            Ok("WE8MSWIN1252")
        } else if self.encoding == UTF_8 {
            Ok("AL32UTF8")
        } else {
            Err(self.unsupported_encoding())
        }
    }

    pub fn postgres_encoding(&self) -> Result<&'static str, ConversionError> {
        match self.encoding.name() {
            "UTF-8" => Ok("UTF8"),
            "windows-1250" => Ok("WIN1250"),
            "windows-1251" => Ok("WIN1251"),
            "windows-1252" => Ok("WIN1252"),
            "windows-1253" => Ok("WIN1253"),
            "windows-1254" => Ok("WIN1254"),
            "windows-1255" => Ok("WIN1255"),
            "windows-1256" => Ok("WIN1256"),
            "windows-1257" => Ok("WIN1257"),
            "windows-1258" => Ok("WIN1258"),
            "ISO-8859-2" => Ok("LATIN2"),
            "ISO-8859-15" => Ok("LATIN9"),
            _ => Err(self.unsupported_encoding()),
        }
    }

    fn unsupported_encoding(&self) -> ConversionError {
        ConversionError::UnsupportedEncoding {
            encoding: self.encoding.name().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub sheet_filter: Regex,
    pub table_names: Vec<String>,
    pub format: TableFormat,
    pub write_bom: bool,
    pub header: HeaderRows,
    pub one_table: bool,
    pub add_metadata: bool,
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sheet_filter: Regex::new("^(?:.*)$").expect("static regex"),
            table_names: Vec::new(),
            format: TableFormat::default(),
            write_bom: false,
            header: HeaderRows::Range { from: 1, till: 1 },
            one_table: false,
            add_metadata: false,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    pub fn from_args(args: &ConversionArgs, output_dir: Option<PathBuf>) -> Result<Self> {
        let sheet_filter = full_match_regex(&args.sheet_name_expression)?;
        let encoding = io_utils::resolve_encoding(Some(&args.encoding))?;
        let header = HeaderRows::new(args.header_row_from, args.header_row_till)?;
        if args.enclosure_string.is_empty() {
            return Err(ConversionError::EmptyEnclosure.into());
        }
        let format = TableFormat {
            separator: args.column_separator.clone(),
            enclosure: args.enclosure_string.clone(),
            encoding,
            dialect: args.sql_database,
            fixed_string_size: args.string_column_size,
        };
        // Fail before reading any workbook when the scripts could never be rendered.
        match format.dialect {
            Dialect::Oracle => format.oracle_character_set().map(|_| ())?,
            Dialect::Postgresql => format.postgres_encoding().map(|_| ())?,
        }
        let settings = Settings {
            sheet_filter,
            table_names: args.sql_table_names.clone(),
            format,
            write_bom: args.write_bom,
            header,
            one_table: args.one_table,
            add_metadata: args.add_metadata,
            output_dir: output_dir.unwrap_or_else(|| PathBuf::from(".")),
        };
        debug!("Settings: {settings:?}");
        Ok(settings)
    }

    /// Whether a BOM goes in front of CSV output (UTF-8 only).
    pub fn emits_bom(&self) -> bool {
        self.write_bom && self.format.encoding == UTF_8
    }
}

/// Anchors `expression` so that it must match a whole sheet name.
pub fn full_match_regex(expression: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{expression})$"))
        .with_context(|| format!("Invalid sheet name expression '{expression}'"))
}
