use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Dialect;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Convert spreadsheets into CSV files plus SQL scripts that load them",
    long_about = None
)]
pub struct Cli {
    /// Verbosity: 0 warnings only, 1 progress, 2 or more debug output (RUST_LOG overrides)
    #[arg(short, long, global = true, default_value_t = 1)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write one CSV file per table plus tables.sql (and load.sql/delete.sql for PostgreSQL)
    Generate(GenerateArgs),
    /// Scan spreadsheets and print the inferred table schemas without writing files
    Describe(DescribeArgs),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Spreadsheets to convert; the first one defines the tables
    #[arg(required = true)]
    pub spreadsheets: Vec<PathBuf>,
    /// Directory receiving the CSV files and SQL scripts
    #[arg(short, long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,
    #[command(flatten)]
    pub conversion: ConversionArgs,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    /// Spreadsheets to scan; the first one defines the tables
    #[arg(required = true)]
    pub spreadsheets: Vec<PathBuf>,
    /// Print the schemas as JSON instead of a table
    #[arg(long)]
    pub json: bool,
    #[command(flatten)]
    pub conversion: ConversionArgs,
}

/// Options shared by every command that scans spreadsheets.
#[derive(Debug, Clone, Args)]
pub struct ConversionArgs {
    /// Regular expression a sheet name must fully match to be processed
    #[arg(long = "sheet-name-expression", default_value = ".*")]
    pub sheet_name_expression: String,
    /// Table name for the sheet at the same position (repeatable; defaults to the sheet name)
    #[arg(long = "sql-table-name", action = clap::ArgAction::Append)]
    pub sql_table_names: Vec<String>,
    /// CSV field separator (supports ',', 'tab', ';', '|' or any other text)
    #[arg(long = "column-separator", default_value = ",", value_parser = parse_separator)]
    pub column_separator: String,
    /// Text enclosing fields that contain the separator or the enclosure itself
    #[arg(long = "enclosure-string", default_value = "\"")]
    pub enclosure_string: String,
    /// Character encoding of the CSV files
    #[arg(long, default_value = "windows-1252")]
    pub encoding: String,
    /// Start CSV files with a byte order mark (UTF-8 only)
    #[arg(long = "write-bom")]
    pub write_bom: bool,
    /// First 1-based row holding column names (0 together with --header-row-till 0: no header)
    #[arg(long = "header-row-from", default_value_t = 1)]
    pub header_row_from: usize,
    /// Last 1-based row holding column names
    #[arg(long = "header-row-till", default_value_t = 1)]
    pub header_row_till: usize,
    /// Target database for the generated SQL
    #[arg(long = "sql-database", value_enum, ignore_case = true, default_value_t = Dialect::Oracle)]
    pub sql_database: Dialect,
    /// Merge every selected sheet into a single table
    #[arg(long = "one-table")]
    pub one_table: bool,
    /// Prepend SHEET and ROW columns identifying where each row came from
    #[arg(long = "add-metadata")]
    pub add_metadata: bool,
    /// Use this size for every string column instead of the widest value seen
    #[arg(long = "string-column-size")]
    pub string_column_size: Option<usize>,
}

pub fn parse_separator(value: &str) -> Result<String, String> {
    match value {
        "tab" | "\t" => Ok("\t".to_string()),
        "comma" | "," => Ok(",".to_string()),
        "|" | "pipe" => Ok("|".to_string()),
        ";" | "semicolon" => Ok(";".to_string()),
        "" => Err("Separator cannot be empty".to_string()),
        other if other.contains(['\r', '\n']) => {
            Err("Separator cannot contain line breaks".to_string())
        }
        other => Ok(other.to_string()),
    }
}
