//! The `generate` pipeline: scan every workbook, then write CSV and SQL.

use std::{collections::HashSet, path::PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    assemble::assemble_sheet,
    cli::GenerateArgs,
    config::Settings,
    emit::{self, EmittedFiles},
    error::ConversionError,
    registry::TableRegistry,
    workbook::Workbook,
};

/// Table name used by `--one-table` unless a table name is given.
pub const ONE_TABLE_NAME: &str = "tables";

/// Scans workbooks one after another into a shared [`TableRegistry`].
///
/// The first workbook defines the tables; later workbooks must map every
/// selected sheet onto one of them. Outside one-table mode a table takes at
/// most one sheet per workbook.
pub struct Generator<'a> {
    settings: &'a Settings,
    registry: TableRegistry,
    workbooks: usize,
}

impl<'a> Generator<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            registry: TableRegistry::new(),
            workbooks: 0,
        }
    }

    pub fn process_workbook(&mut self, workbook: &Workbook) -> Result<()> {
        let first = self.workbooks == 0;
        info!("Processing workbook {}", workbook.path.display());
        if first && self.settings.one_table {
            let name = self.one_table_name();
            self.registry.claim(&name, &self.settings.format)?;
        }
        let mut used = HashSet::new();

        for (position, sheet) in workbook.sheets.iter().enumerate() {
            if !self.settings.sheet_filter.is_match(&sheet.name) {
                info!(
                    "Skipping sheet {position}: {} since it does not match {}",
                    sheet.name,
                    self.settings.sheet_filter.as_str()
                );
                continue;
            }
            info!("Processing sheet {position}: {}", sheet.name);

            let table_name = self.table_name(position, &sheet.name);
            let entry = if first && !self.settings.one_table {
                self.registry.claim(&table_name, &self.settings.format)?
            } else {
                let entry = self.registry.get_mut(&table_name)?;
                if !self.settings.one_table && !used.insert(entry.table.name().to_string()) {
                    return Err(ConversionError::DuplicateTable(entry.table.quoted_name()).into());
                }
                entry
            };
            let rows = assemble_sheet(sheet, &mut entry.table, self.settings).with_context(|| {
                format!(
                    "Processing sheet '{}' of {}",
                    sheet.name,
                    workbook.path.display()
                )
            })?;
            debug!(
                "Sheet '{}' added {} row(s) to table {}",
                sheet.name,
                rows.len(),
                entry.table.quoted_name()
            );
            if rows.is_empty() {
                warn!(
                    "Sheet '{}' of {} has no data rows",
                    sheet.name,
                    workbook.path.display()
                );
            } else {
                entry.table.record_sheet(&sheet.name);
            }
            entry.rows.extend(rows);
        }
        self.workbooks += 1;
        Ok(())
    }

    /// Completes every schema and hands over the registry.
    pub fn finish(mut self) -> TableRegistry {
        if self.settings.add_metadata {
            for entry in self.registry.iter_mut() {
                entry.table.add_metadata_columns();
            }
        }
        for entry in self.registry.iter() {
            info!(
                "Table {} processed: {} column(s), {} row(s)",
                entry.table.quoted_name(),
                entry.table.column_count(),
                entry.rows.len()
            );
        }
        self.registry
    }

    fn one_table_name(&self) -> String {
        self.settings
            .table_names
            .first()
            .cloned()
            .unwrap_or_else(|| ONE_TABLE_NAME.to_string())
    }

    fn table_name(&self, position: usize, sheet_name: &str) -> String {
        if self.settings.one_table {
            return self.one_table_name();
        }
        self.settings
            .table_names
            .get(position)
            .cloned()
            .unwrap_or_else(|| sheet_name.to_string())
    }
}

/// Phase one: reads and scans every workbook in order.
pub fn scan_workbooks(paths: &[PathBuf], settings: &Settings) -> Result<TableRegistry> {
    let mut generator = Generator::new(settings);
    for path in paths {
        let workbook = Workbook::open(path)?;
        generator.process_workbook(&workbook)?;
    }
    Ok(generator.finish())
}

pub fn execute(args: &GenerateArgs) -> Result<()> {
    let settings = Settings::from_args(&args.conversion, Some(args.output_dir.clone()))?;
    info!("Begin processing {} workbook(s)", args.spreadsheets.len());
    let registry = scan_workbooks(&args.spreadsheets, &settings)?;
    let EmittedFiles {
        csv_files,
        scripts,
        skipped_tables,
    } = emit::write_outputs(&registry.into_entries(), &settings)?;
    info!(
        "Processing complete: {} CSV file(s), {} script(s), {} empty table(s) skipped",
        csv_files.len(),
        scripts.len(),
        skipped_tables.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::HeaderRows,
        error::ConversionError,
        workbook::{RawCell, Sheet, SheetRow},
    };

    fn sheet(name: &str, header: &str, value: &str) -> Sheet {
        Sheet::new(
            name,
            vec![
                SheetRow::new(0, vec![RawCell::text(0, header)]),
                SheetRow::new(1, vec![RawCell::text(0, value)]),
            ],
        )
    }

    fn conversion_error(err: &anyhow::Error) -> Option<&ConversionError> {
        err.downcast_ref::<ConversionError>()
    }

    #[test]
    fn sheets_become_tables_named_by_position_or_sheet() {
        let settings = Settings {
            table_names: vec!["first".to_string()],
            ..Settings::default()
        };
        let mut generator = Generator::new(&settings);
        let workbook = Workbook::new(
            "a.xlsx",
            vec![sheet("One", "Id", "1"), sheet("Two", "Id", "2")],
        );
        generator.process_workbook(&workbook).unwrap();
        let registry = generator.finish();
        let names: Vec<&str> = registry.iter().map(|e| e.table.name()).collect();
        assert_eq!(names, vec!["first", "Two"]);
    }

    #[test]
    fn filtered_sheets_are_skipped() {
        let settings = Settings {
            sheet_filter: crate::config::full_match_regex("Data.*").unwrap(),
            ..Settings::default()
        };
        let mut generator = Generator::new(&settings);
        let workbook = Workbook::new(
            "a.xlsx",
            vec![sheet("Notes", "Id", "1"), sheet("Data1", "Id", "2")],
        );
        generator.process_workbook(&workbook).unwrap();
        let registry = generator.finish();
        assert_eq!(registry.len(), 1);
        assert!(registry.find("Data1").is_some());
    }

    #[test]
    fn one_table_merges_matching_sheets() {
        let settings = Settings {
            one_table: true,
            add_metadata: true,
            ..Settings::default()
        };
        let mut generator = Generator::new(&settings);
        let workbook = Workbook::new(
            "a.xlsx",
            vec![sheet("Jan", "Id", "1"), sheet("Feb", "Id", "2")],
        );
        generator.process_workbook(&workbook).unwrap();
        let registry = generator.finish();
        let entry = registry.find(ONE_TABLE_NAME).unwrap();
        assert_eq!(entry.rows.len(), 2);
        assert_eq!(entry.table.sheets(), ["Jan", "Feb"]);
        assert_eq!(entry.table.column_count(), 3);
    }

    #[test]
    fn one_table_rejects_differing_headers() {
        let settings = Settings {
            one_table: true,
            ..Settings::default()
        };
        let mut generator = Generator::new(&settings);
        let workbook = Workbook::new(
            "a.xlsx",
            vec![sheet("Jan", "Id", "1"), sheet("Feb", "Name", "x")],
        );
        let err = generator.process_workbook(&workbook).unwrap_err();
        assert!(matches!(
            conversion_error(&err),
            Some(ConversionError::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn later_workbooks_must_reuse_existing_tables() {
        let settings = Settings::default();
        let mut generator = Generator::new(&settings);
        generator
            .process_workbook(&Workbook::new("a.xlsx", vec![sheet("Sales", "Id", "1")]))
            .unwrap();
        generator
            .process_workbook(&Workbook::new("b.xlsx", vec![sheet("Sales", "Id", "22")]))
            .unwrap();
        let err = generator
            .process_workbook(&Workbook::new("c.xlsx", vec![sheet("Stock", "Id", "3")]))
            .unwrap_err();
        assert_eq!(
            conversion_error(&err),
            Some(&ConversionError::TableNotFound("\"Stock\"".to_string()))
        );
        let registry = generator.finish();
        let entry = registry.find("Sales").unwrap();
        assert_eq!(entry.rows.len(), 2);
        assert_eq!(entry.table.data_columns()[0].widths().string_length(), 2);
    }

    #[test]
    fn duplicate_sheet_tables_in_first_workbook_fail() {
        let settings = Settings {
            table_names: vec!["same".to_string(), "same".to_string()],
            header: HeaderRows::None,
            ..Settings::default()
        };
        let mut generator = Generator::new(&settings);
        let workbook = Workbook::new(
            "a.xlsx",
            vec![sheet("One", "Id", "1"), sheet("Two", "Id", "2")],
        );
        let err = generator.process_workbook(&workbook).unwrap_err();
        assert_eq!(
            conversion_error(&err),
            Some(&ConversionError::DuplicateTable("\"same\"".to_string()))
        );
    }

    #[test]
    fn later_workbooks_cannot_map_two_sheets_onto_one_table() {
        let settings = Settings::default();
        let mut generator = Generator::new(&settings);
        generator
            .process_workbook(&Workbook::new("a.xlsx", vec![sheet("Cafe", "Id", "1")]))
            .unwrap();
        let err = generator
            .process_workbook(&Workbook::new(
                "b.xlsx",
                vec![sheet("Café", "Id", "2"), sheet("Cafe", "Id", "3")],
            ))
            .unwrap_err();
        assert_eq!(
            conversion_error(&err),
            Some(&ConversionError::DuplicateTable("\"Cafe\"".to_string()))
        );
    }

    #[test]
    fn sheets_without_rows_are_not_recorded() {
        let settings = Settings {
            one_table: true,
            ..Settings::default()
        };
        let header_only = Sheet::new("Feb", vec![SheetRow::new(0, vec![RawCell::text(0, "Id")])]);
        let mut generator = Generator::new(&settings);
        generator
            .process_workbook(&Workbook::new(
                "a.xlsx",
                vec![sheet("Jan", "Id", "1"), header_only],
            ))
            .unwrap();
        let registry = generator.finish();
        let entry = registry.find(ONE_TABLE_NAME).unwrap();
        assert_eq!(entry.table.sheets(), ["Jan"]);
        assert_eq!(entry.rows.len(), 1);
    }
}
