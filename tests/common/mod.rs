#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};
use zip::{ZipWriter, write::SimpleFileOptions};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes a workbook made of `sheets` and returns its path.
    pub fn write_xlsx(&self, name: &str, sheets: &[FixtureSheet]) -> PathBuf {
        let path = self.join(name);
        write_xlsx(&path, sheets);
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.join(name)).expect("read output file")
    }

    pub fn read_bytes(&self, name: &str) -> Vec<u8> {
        fs::read(self.join(name)).expect("read output file")
    }
}

/// A cell of a generated fixture workbook.
#[derive(Debug, Clone)]
pub enum FixtureCell {
    Text(String),
    Number(f64),
    /// 1900-system serial shown with the built-in date format.
    Date(u32),
    Bool(bool),
    /// Formula text plus its cached numeric result.
    Formula(String, f64),
    Error(String),
}

pub fn text(value: &str) -> Option<FixtureCell> {
    Some(FixtureCell::Text(value.to_string()))
}

pub fn number(value: f64) -> Option<FixtureCell> {
    Some(FixtureCell::Number(value))
}

pub fn date(serial: u32) -> Option<FixtureCell> {
    Some(FixtureCell::Date(serial))
}

pub fn boolean(value: bool) -> Option<FixtureCell> {
    Some(FixtureCell::Bool(value))
}

pub fn formula(expression: &str, cached: f64) -> Option<FixtureCell> {
    Some(FixtureCell::Formula(expression.to_string(), cached))
}

pub fn error(code: &str) -> Option<FixtureCell> {
    Some(FixtureCell::Error(code.to_string()))
}

#[derive(Debug, Clone)]
pub struct FixtureSheet {
    pub name: String,
    /// Rows from row 1 downwards; `None` leaves a cell absent.
    pub rows: Vec<Vec<Option<FixtureCell>>>,
}

impl FixtureSheet {
    pub fn new(name: &str, rows: Vec<Vec<Option<FixtureCell>>>) -> Self {
        Self {
            name: name.to_string(),
            rows,
        }
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn column_name(index: usize) -> String {
    let mut remaining = index + 1;
    let mut name = String::new();
    while remaining > 0 {
        let digit = (remaining - 1) % 26;
        name.insert(0, char::from(b'A' + digit as u8));
        remaining = (remaining - 1) / 26;
    }
    name
}

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Writes a minimal `.xlsx` package: inline strings, one date style.
pub fn write_xlsx(path: &Path, sheets: &[FixtureSheet]) {
    let file = File::create(path).expect("create xlsx");
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    let overrides = (1..=sheets.len())
        .map(|idx| {
            format!(
                "<Override PartName=\"/xl/worksheets/sheet{idx}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>"
            )
        })
        .collect::<String>();
    let content_types = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
<Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>\
{overrides}</Types>"
    );
    add_entry(&mut zip, options, "[Content_Types].xml", &content_types);

    let root_rels = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"{PKG_REL_NS}\">\
<Relationship Id=\"rId1\" Type=\"{REL_NS}/officeDocument\" Target=\"xl/workbook.xml\"/>\
</Relationships>"
    );
    add_entry(&mut zip, options, "_rels/.rels", &root_rels);

    let sheet_entries = sheets
        .iter()
        .enumerate()
        .map(|(idx, sheet)| {
            format!(
                "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>",
                escape(&sheet.name),
                idx + 1,
                idx + 1
            )
        })
        .collect::<String>();
    let workbook = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<workbook xmlns=\"{MAIN_NS}\" xmlns:r=\"{REL_NS}\"><sheets>{sheet_entries}</sheets></workbook>"
    );
    add_entry(&mut zip, options, "xl/workbook.xml", &workbook);

    let sheet_rels = (1..=sheets.len())
        .map(|idx| {
            format!(
                "<Relationship Id=\"rId{idx}\" Type=\"{REL_NS}/worksheet\" Target=\"worksheets/sheet{idx}.xml\"/>"
            )
        })
        .collect::<String>();
    let style_id = sheets.len() + 1;
    let workbook_rels = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"{PKG_REL_NS}\">{sheet_rels}\
<Relationship Id=\"rId{style_id}\" Type=\"{REL_NS}/styles\" Target=\"styles.xml\"/>\
</Relationships>"
    );
    add_entry(&mut zip, options, "xl/_rels/workbook.xml.rels", &workbook_rels);

    let styles = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<styleSheet xmlns=\"{MAIN_NS}\">\
<cellXfs count=\"2\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/>\
<xf numFmtId=\"14\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\" applyNumberFormat=\"1\"/></cellXfs>\
</styleSheet>"
    );
    add_entry(&mut zip, options, "xl/styles.xml", &styles);

    for (idx, sheet) in sheets.iter().enumerate() {
        let name = format!("xl/worksheets/sheet{}.xml", idx + 1);
        add_entry(&mut zip, options, &name, &worksheet_xml(sheet));
    }
    zip.finish().expect("finish xlsx");
}

fn worksheet_xml(sheet: &FixtureSheet) -> String {
    let mut rows = String::new();
    for (row_idx, row) in sheet.rows.iter().enumerate() {
        let row_number = row_idx + 1;
        let mut cells = String::new();
        for (col_idx, cell) in row.iter().enumerate() {
            let Some(cell) = cell else { continue };
            let reference = format!("{}{row_number}", column_name(col_idx));
            let xml = match cell {
                FixtureCell::Text(value) => format!(
                    "<c r=\"{reference}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                    escape(value)
                ),
                FixtureCell::Number(value) => format!("<c r=\"{reference}\"><v>{value}</v></c>"),
                FixtureCell::Date(serial) => {
                    format!("<c r=\"{reference}\" s=\"1\"><v>{serial}</v></c>")
                }
                FixtureCell::Bool(value) => format!(
                    "<c r=\"{reference}\" t=\"b\"><v>{}</v></c>",
                    u8::from(*value)
                ),
                FixtureCell::Formula(expression, cached) => format!(
                    "<c r=\"{reference}\"><f>{}</f><v>{cached}</v></c>",
                    escape(expression)
                ),
                FixtureCell::Error(code) => {
                    format!("<c r=\"{reference}\" t=\"e\"><v>{}</v></c>", escape(code))
                }
            };
            cells.push_str(&xml);
        }
        if !cells.is_empty() {
            rows.push_str(&format!("<row r=\"{row_number}\">{cells}</row>"));
        }
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<worksheet xmlns=\"{MAIN_NS}\"><sheetData>{rows}</sheetData></worksheet>"
    )
}

fn add_entry(zip: &mut ZipWriter<File>, options: SimpleFileOptions, name: &str, content: &str) {
    zip.start_file(name, options).expect("start zip entry");
    zip.write_all(content.as_bytes()).expect("write zip entry");
}
