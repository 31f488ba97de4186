//! Tabular input reader: workbooks and delimited text into typed cells.
//!
//! Workbooks (`.xlsx`, `.xlsm`, `.xls`, `.ods`) are read with calamine,
//! delimited files with the `csv` crate after encoding and delimiter
//! auto-detection. No EFS-specific logic here.

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use crate::error::{SourceError, SourceResult};
use crate::transform::rules::format_number;

/// Text layouts accepted for date cells stored as strings.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric value; text may carry thousands separators.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    /// Date value from a native date, an Excel serial number or text.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            Cell::Number(n) => excel_serial_to_datetime(*n),
            Cell::Text(s) => parse_datetime_text(s.trim()),
            _ => None,
        }
    }

    /// Render the cell as the text written into a form field.
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format_number(*n),
            Cell::Bool(b) => b.to_string(),
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(_) | Data::DateTimeIso(_) => match data.as_datetime() {
                Some(dt) => Cell::DateTime(dt),
                None => Cell::Text(data.to_string()),
            },
            Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => Cell::Text(format!("#{:?}", e)),
        }
    }
}

/// Convert an Excel serial day number (1900 date system) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(chrono::Duration::milliseconds(millis))
}

fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// How the source was decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceFormat {
    Workbook,
    Delimited { encoding: String, delimiter: char },
}

/// A data row with its spreadsheet row number (header = row 1).
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub number: usize,
    pub cells: Vec<Cell>,
}

/// Parsed input: header row plus non-blank data rows.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<SourceRow>,
    pub format: SourceFormat,
}

/// Rows rendered as strings for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
    pub format: SourceFormat,
}

impl SourceTable {
    /// First `limit` rows rendered as strings.
    pub fn preview(&self, limit: usize) -> PreviewTable {
        PreviewTable {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .take(limit)
                .map(|r| r.cells.iter().map(Cell::display).collect())
                .collect(),
            row_count: self.rows.len(),
            format: self.format.clone(),
        }
    }

    /// `header_row` is the 1-based sheet row holding the headers.
    fn from_grid(
        mut grid: impl Iterator<Item = Vec<Cell>>,
        header_row: usize,
        format: SourceFormat,
    ) -> SourceResult<Self> {
        let header_cells = grid.next().ok_or(SourceError::EmptyFile)?;
        let headers: Vec<String> = header_cells.iter().map(|c| c.display()).collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(SourceError::NoHeaders);
        }

        let rows = grid
            .enumerate()
            .map(|(idx, mut cells)| {
                cells.resize(headers.len(), Cell::Empty);
                SourceRow {
                    number: header_row + idx + 1,
                    cells,
                }
            })
            .filter(|row| !row.cells.iter().all(Cell::is_empty))
            .collect();

        Ok(Self {
            headers,
            rows,
            format,
        })
    }
}

/// Read a workbook or delimited file from disk.
pub fn read_source<P: AsRef<Path>>(path: P) -> SourceResult<SourceTable> {
    let bytes = std::fs::read(path.as_ref())?;
    let extension = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    read_source_bytes(&bytes, extension)
}

/// Read an input already in memory. `extension` is a hint used only when
/// the content itself does not identify a workbook.
pub fn read_source_bytes(bytes: &[u8], extension: &str) -> SourceResult<SourceTable> {
    if bytes.is_empty() {
        return Err(SourceError::EmptyFile);
    }
    if is_workbook(bytes, extension) {
        let workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| SourceError::WorkbookError(e.to_string()))?;
        read_workbook(workbook)
    } else {
        parse_delimited_auto(bytes)
    }
}

/// Zip (xlsx/xlsm/ods) and OLE (xls) signatures, then the extension.
pub fn is_workbook(bytes: &[u8], extension: &str) -> bool {
    const ZIP: &[u8] = b"PK\x03\x04";
    const OLE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

    if bytes.starts_with(ZIP) || bytes.starts_with(OLE) {
        return true;
    }
    matches!(
        extension.to_lowercase().as_str(),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods"
    )
}

fn read_workbook<RS: Read + Seek>(mut workbook: Sheets<RS>) -> SourceResult<SourceTable> {
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SourceError::NoWorksheet)?
        .map_err(|e| SourceError::WorkbookError(e.to_string()))?;

    // the range begins at the first used cell, not necessarily A1
    let header_row = range.start().map_or(1, |(row, _)| row as usize + 1);
    let grid = range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    SourceTable::from_grid(grid.into_iter(), header_row, SourceFormat::Workbook)
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "iso-8859-15" | "latin-9" => "iso-8859-15".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        // WHATWG decodes the latin-1 labels as windows-1252
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.to_string()
        }
        "iso-8859-15" | "latin-9" => encoding_rs::ISO_8859_15.decode(bytes).0.to_string(),
        _ => {
            let (text, _, _) = encoding_rs::UTF_8.decode(bytes);
            text.to_string()
        }
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited bytes with auto-detection of encoding and delimiter.
pub fn parse_delimited_auto(bytes: &[u8]) -> SourceResult<SourceTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_delimited(&content, delimiter, encoding)
}

/// Parse delimited text with an explicit delimiter.
pub fn parse_delimited(
    content: &str,
    delimiter: char,
    encoding: String,
) -> SourceResult<SourceTable> {
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(SourceError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter as u8)
        .from_reader(content.as_bytes());

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SourceError::ParseError(e.to_string()))?;
        let cells = record
            .iter()
            .map(|v| {
                if v.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(v.to_string())
                }
            })
            .collect();
        grid.push(cells);
    }

    SourceTable::from_grid(
        grid.into_iter(),
        1,
        SourceFormat::Delimited {
            encoding,
            delimiter,
        },
    )
}
