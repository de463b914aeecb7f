//! The `describe` command: scan only, then report inferred schemas.

use std::{borrow::Cow, fmt::Write as _};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::{
    cli::DescribeArgs,
    column::ColumnWidths,
    config::{Dialect, Settings},
    generate::scan_workbooks,
    registry::TableRegistry,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub dialect: Dialect,
    pub sheets: Vec<String>,
    pub rows: usize,
    pub columns: Vec<ColumnSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub sql_type: String,
    #[serde(flatten)]
    pub widths: ColumnWidths,
}

pub fn summarize(registry: &TableRegistry, settings: &Settings) -> Vec<TableSummary> {
    let dialect = settings.format.dialect;
    let fixed = settings.format.fixed_string_size;
    registry
        .iter()
        .map(|entry| TableSummary {
            name: entry.table.name().to_string(),
            dialect,
            sheets: entry.table.sheets().to_vec(),
            rows: entry.rows.len(),
            columns: entry
                .table
                .columns()
                .iter()
                .map(|column| ColumnSummary {
                    name: column.name().to_string(),
                    sql_type: column.sql_type(fixed).render(dialect),
                    widths: *column.widths(),
                })
                .collect(),
        })
        .collect()
}

pub fn render_text(summaries: &[TableSummary]) -> String {
    let headers = ["#", "column", "type", "string", "numeric", "precision", "date"]
        .map(String::from)
        .to_vec();
    let mut output = String::new();
    for summary in summaries {
        let sheets = if summary.sheets.is_empty() {
            "no sheet".to_string()
        } else {
            summary.sheets.iter().join(", ")
        };
        let _ = writeln!(
            output,
            "Table \"{}\": {} row(s) from {sheets}",
            summary.name, summary.rows
        );
        let rows = summary
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                vec![
                    (idx + 1).to_string(),
                    column.name.clone(),
                    column.sql_type.clone(),
                    column.widths.string_length().to_string(),
                    column.widths.numeric_length().to_string(),
                    column.widths.numeric_precision().to_string(),
                    column.widths.date_length().to_string(),
                ]
            })
            .collect::<Vec<_>>();
        output.push_str(&render_table(&headers, &rows));
        output.push('\n');
    }
    output
}

fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count())
        .collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(padding))
        })
        .join("  ");
    line.trim_end().to_string()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

pub fn execute(args: &DescribeArgs) -> Result<()> {
    let settings = Settings::from_args(&args.conversion, None)?;
    let registry = scan_workbooks(&args.spreadsheets, &settings)?;
    let summaries = summarize(&registry, &settings);
    info!("Describing {} table(s)", summaries.len());
    if args.json {
        let json =
            serde_json::to_string_pretty(&summaries).context("Serializing table summaries")?;
        println!("{json}");
    } else {
        print!("{}", render_text(&summaries));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        generate::Generator,
        workbook::{RawCell, Sheet, SheetRow, Workbook},
    };
    use chrono::NaiveDate;

    fn summaries(settings: &Settings) -> Vec<TableSummary> {
        let workbook = Workbook::new(
            "book.xlsx",
            vec![Sheet::new(
                "Orders",
                vec![
                    SheetRow::new(
                        0,
                        vec![
                            RawCell::text(0, "Id"),
                            RawCell::text(1, "Amount"),
                            RawCell::text(2, "Day"),
                        ],
                    ),
                    SheetRow::new(
                        1,
                        vec![
                            RawCell::number(0, 1.0),
                            RawCell::number(1, 12.75),
                            RawCell::date(2, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
                        ],
                    ),
                ],
            )],
        );
        let mut generator = Generator::new(settings);
        generator.process_workbook(&workbook).unwrap();
        summarize(&generator.finish(), settings)
    }

    #[test]
    fn summaries_report_types_and_widths() {
        let settings = Settings::default();
        let summaries = summaries(&settings);
        assert_eq!(summaries.len(), 1);
        let table = &summaries[0];
        assert_eq!(table.name, "Orders");
        assert_eq!(table.rows, 1);
        let types: Vec<&str> = table.columns.iter().map(|c| c.sql_type.as_str()).collect();
        assert_eq!(types, vec!["DECIMAL", "DECIMAL", "DATE"]);
        assert_eq!(table.columns[1].widths.numeric_precision(), 2);
        assert_eq!(table.columns[2].widths.date_length(), 10);
    }

    #[test]
    fn text_rendering_is_aligned() {
        let rendered = render_text(&summaries(&Settings::default()));
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Table \"Orders\": 1 row(s) from Orders");
        assert!(lines[1].starts_with("#  column  type     string"));
        assert!(lines[2].starts_with("-  ------  -------"));
        assert!(lines[4].starts_with("2  Amount  DECIMAL  0       4        2"));
    }

    #[test]
    fn json_flattens_widths() {
        let json = serde_json::to_value(summaries(&Settings::default())).unwrap();
        let amount = &json[0]["columns"][1];
        assert_eq!(amount["name"], "Amount");
        assert_eq!(amount["numeric_length"], 4);
        assert_eq!(amount["numeric_precision"], 2);
        assert_eq!(json[0]["dialect"], "Oracle");
    }
}
