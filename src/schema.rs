//! Table descriptors and the SQL they render to.

use std::path::Path;

use itertools::Itertools;

use crate::{
    assemble::column_letter_name,
    column::{Column, Observation, normalize_name, quote_identifier},
    config::{Dialect, TableFormat},
    error::ConversionError,
};

/// Line terminator used in every generated SQL script.
pub const NL: &str = "\r\n";

pub const SHEET_COLUMN: &str = "SHEET";
pub const ROW_COLUMN: &str = "ROW";
const SHEET_COLUMN_WIDTH: usize = 100;
const ROW_COLUMN_WIDTH: usize = 12;

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    /// Columns added in front that do not map to a sheet column index.
    leading_columns: usize,
    has_metadata: bool,
    sheets: Vec<String>,
    format: TableFormat,
}

impl Table {
    pub fn new(name: &str, format: TableFormat) -> Self {
        Self {
            name: normalize_name(name),
            columns: Vec::new(),
            leading_columns: 0,
            has_metadata: false,
            sheets: Vec::new(),
            format,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quoted_name(&self) -> String {
        quote_identifier(&self.name)
    }

    pub fn format(&self) -> &TableFormat {
        &self.format
    }

    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Prepends a column that carries no sheet data of its own.
    pub fn add_column_first(&mut self, column: Column) {
        self.columns.insert(0, column);
        self.leading_columns += 1;
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Columns fed by sheet cells, indexed like the sheet.
    pub fn data_columns(&self) -> &[Column] {
        &self.columns[self.leading_columns..]
    }

    pub fn data_column_count(&self) -> usize {
        self.columns.len() - self.leading_columns
    }

    pub fn data_column_mut(&mut self, index: usize) -> Option<&mut Column> {
        self.columns.get_mut(self.leading_columns + index)
    }

    /// Appends letter-named columns until `count` data columns exist.
    pub fn ensure_data_columns(&mut self, count: usize) {
        while self.data_column_count() < count {
            let name = column_letter_name(self.data_column_count());
            self.add_column(Column::new(&name));
        }
    }

    /// Prepends `SHEET` and `ROW`; calling it again is a no-op.
    pub fn add_metadata_columns(&mut self) {
        if self.has_metadata {
            return;
        }
        self.add_column_first(Column::with_observation(
            ROW_COLUMN,
            Observation::Numeric {
                length: ROW_COLUMN_WIDTH,
                precision: 0,
            },
        ));
        self.add_column_first(Column::with_observation(
            SHEET_COLUMN,
            Observation::String(SHEET_COLUMN_WIDTH),
        ));
        self.has_metadata = true;
    }

    pub fn has_metadata_columns(&self) -> bool {
        self.has_metadata
    }

    pub fn record_sheet(&mut self, sheet: &str) {
        if !self.sheets.iter().any(|known| known == sheet) {
            self.sheets.push(sheet.to_string());
        }
    }

    /// Sheets that contributed rows, in the order they were read.
    pub fn sheets(&self) -> &[String] {
        &self.sheets
    }

    pub fn location(&self) -> String {
        format!("{}.csv", self.name)
    }

    pub fn bad_file_name(&self) -> String {
        format!("{}.bad", self.name)
    }

    pub fn discard_file_name(&self) -> String {
        format!("{}.dsc", self.name)
    }

    pub fn log_file_name(&self) -> String {
        format!("{}.log", self.name)
    }

    fn column_list(&self) -> String {
        self.columns.iter().map(Column::quoted_name).join(", ")
    }

    /// `CREATE TABLE` statement for `dialect`, terminated by a `;` line.
    pub fn ddl(&self, dialect: Dialect) -> Result<String, ConversionError> {
        let fixed = self.format.fixed_string_size;
        let columns = self
            .columns
            .iter()
            .map(|column| {
                format!(
                    "  {}  {}",
                    column.quoted_name(),
                    column.sql_type(fixed).render(dialect)
                )
            })
            .join(&format!(",{NL}"));
        let if_not_exists = match dialect {
            Dialect::Oracle => "",
            Dialect::Postgresql => "IF NOT EXISTS ",
        };
        let mut ddl = format!(
            "CREATE TABLE {if_not_exists}{}{NL}({NL}{columns}{NL})",
            self.quoted_name()
        );
        if dialect == Dialect::Oracle {
            ddl.push_str(NL);
            ddl.push_str(&self.external_organization()?);
        }
        ddl.push_str(NL);
        ddl.push(';');
        ddl.push_str(NL);
        Ok(ddl)
    }

    fn external_organization(&self) -> Result<String, ConversionError> {
        let lines = [
            "ORGANIZATION EXTERNAL".to_string(),
            "(".to_string(),
            "  TYPE oracle_loader".to_string(),
            "  DEFAULT DIRECTORY load_dir".to_string(),
            "  ACCESS PARAMETERS".to_string(),
            "  (".to_string(),
            "    RECORDS DELIMITED BY X'0D0A'".to_string(),
            format!("    CHARACTERSET {}", self.format.oracle_character_set()?),
            "    STRING SIZES ARE IN BYTES".to_string(),
            "    FIELD NAMES ALL FILES IGNORE".to_string(),
            format!("    BADFILE load_dir:{}", sql_literal(&self.bad_file_name())),
            format!(
                "    DISCARDFILE load_dir:{}",
                sql_literal(&self.discard_file_name())
            ),
            format!("    LOGFILE load_dir:{}", sql_literal(&self.log_file_name())),
            format!(
                "    FIELDS TERMINATED BY {} OPTIONALLY ENCLOSED BY {} DATE_FORMAT DATE MASK \"yyyy-mm-dd\"",
                sql_literal(&self.format.separator),
                sql_literal(&self.format.enclosure)
            ),
            "    MISSING FIELD VALUES ARE NULL".to_string(),
            "  )".to_string(),
            format!("  LOCATION ({})", sql_literal(&self.location())),
            ") REJECT LIMIT 0".to_string(),
        ];
        Ok(lines.join(NL))
    }

    /// PostgreSQL `COPY` of the CSV at `csv_path` into this table.
    pub fn load_statement(&self, csv_path: &Path) -> Result<String, ConversionError> {
        Ok(format!(
            "COPY {} ({}) FROM {} WITH (FORMAT csv, HEADER true, DELIMITER {}, QUOTE {}, ENCODING {}){NL};{NL}",
            self.quoted_name(),
            self.column_list(),
            sql_literal(&csv_path.display().to_string()),
            sql_literal(&self.format.separator),
            sql_literal(&self.format.enclosure),
            sql_literal(self.format.postgres_encoding()?),
        ))
    }

    /// Removes previously loaded rows; only this run's sheets when metadata is on.
    pub fn delete_statement(&self) -> String {
        if self.has_metadata && !self.sheets.is_empty() {
            format!(
                "DELETE FROM {} WHERE {} IN ({}){NL};{NL}",
                self.quoted_name(),
                quote_identifier(SHEET_COLUMN),
                self.sheets.iter().map(|sheet| sql_literal(sheet)).join(", ")
            )
        } else {
            format!("TRUNCATE TABLE {}{NL};{NL}", self.quoted_name())
        }
    }
}

/// Single-quoted SQL string literal.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// First statement of the Oracle `tables.sql` script.
pub fn directory_preamble(output_dir: &Path) -> String {
    format!(
        "CREATE /*OR REPLACE*/ DIRECTORY load_dir AS {}{NL};{NL}{NL}",
        sql_literal(&output_dir.display().to_string())
    )
}
