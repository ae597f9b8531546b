//! Recipient Records
//!
//! One record per certificate. Records come from CSV, spreadsheets, or a
//! plain list of names, and are never modified by rendering.

use calamine::{open_workbook_auto, Data, ExcelDateTime, Reader};
use chrono::Timelike;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Workbook has no sheets: {0}")]
    EmptySheet(String),
}

/// Field name -> textual value for one recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    values: BTreeMap<String, String>,
}

/// Accepts any JSON scalar as a value; `null` leaves the field absent.
impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let values = raw
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::Null => None,
                Value::String(s) => Some((k, s)),
                other => Some((k, other.to_string())),
            })
            .collect();
        Ok(Self { values })
    }
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: ToString,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        }
    }

    /// The field's text, or `""` when the field is absent.
    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl ToString) {
        self.values.insert(field.into(), value.to_string());
    }

    /// Name used for output files; `fallback` when the field is absent or blank.
    pub fn display_name<'a>(&'a self, field: &str, fallback: &'a str) -> &'a str {
        let name = self.get(field).trim();
        if name.is_empty() {
            fallback
        } else {
            name
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Where a batch of records is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Csv,
    Workbook,
    NameList,
}

impl RecordFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Self::Csv,
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Self::Workbook,
            _ => Self::NameList,
        }
    }
}

/// Load every record in `path`. `name_field` is the field a bare name list
/// fills in.
pub fn load_records(path: &Path, name_field: &str) -> Result<Vec<Record>, RecordError> {
    let format = RecordFormat::from_path(path);
    tracing::debug!(path = %path.display(), ?format, "loading records");
    let records = match format {
        RecordFormat::Csv => parse_csv(&fs::read(path)?)?,
        RecordFormat::Workbook => read_workbook(path)?,
        RecordFormat::NameList => parse_name_list(&decode_text(fs::read(path)?), name_field),
    };
    tracing::info!(path = %path.display(), count = records.len(), "records loaded");
    Ok(records)
}

/// Header row names the fields; column names are stripped of surrounding
/// whitespace, cell values are kept verbatim.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<Record>, RecordError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| decode_text(h.to_vec()).trim().to_string())
        .collect();

    let mut records = vec![];
    for row in reader.byte_records() {
        let row = row?;
        let record = Record::from_pairs(
            headers
                .iter()
                .zip(row.iter())
                .filter(|(h, _)| !h.is_empty())
                .map(|(h, cell)| (h.clone(), decode_text(cell.to_vec()))),
        );
        records.push(record);
    }
    Ok(records)
}

/// First sheet, first row as headers. Fully empty rows are skipped.
pub fn read_workbook(path: &Path) -> Result<Vec<Record>, RecordError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| RecordError::Workbook(e.to_string()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| RecordError::EmptySheet(path.display().to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| RecordError::Workbook(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(|c| cell_to_string(c).trim().to_string()).collect(),
        None => return Ok(vec![]),
    };

    let records = rows
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| {
            Record::from_pairs(
                headers
                    .iter()
                    .zip(row.iter())
                    .filter(|(h, _)| !h.is_empty())
                    .map(|(h, c)| (h.clone(), cell_to_string(c))),
            )
        })
        .collect();
    Ok(records)
}

/// One name per line; blank lines are skipped.
pub fn parse_name_list(text: &str, name_field: &str) -> Vec<Record> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|name| Record::from_pairs([(name_field, name)]))
        .collect()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERROR: {:?}", e),
        Data::DateTime(dt) => excel_datetime_to_string(dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Dates as `YYYY-MM-DD`, plus the time of day when it isn't midnight.
/// Duration-formatted cells print as `H:MM:SS`.
fn excel_datetime_to_string(dt: &ExcelDateTime) -> String {
    if dt.is_duration() {
        return match dt.as_duration() {
            Some(d) => {
                let secs = d.num_seconds();
                format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
            }
            None => dt.to_string(),
        };
    }
    match dt.as_datetime() {
        Some(d) if d.time().num_seconds_from_midnight() == 0 => d.format("%Y-%m-%d").to_string(),
        Some(d) => d.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => dt.to_string(),
    }
}

/// Code points for bytes 0x80..=0x9F in Windows-1252. The five bytes the
/// code page leaves undefined keep their own value.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// UTF-8 when valid, otherwise Windows-1252. Spreadsheets exported from
/// older office suites are commonly cp1252 encoded.
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| cp1252_char(b)).collect(),
    }
}

fn cp1252_char(byte: u8) -> char {
    match byte {
        0x80..=0x9F => CP1252_HIGH[usize::from(byte - 0x80)],
        _ => char::from(byte),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_field_reads_empty() {
        let record = Record::from_pairs([("Name", "Asha")]);
        assert_eq!(record.get("Name"), "Asha");
        assert_eq!(record.get("Surname"), "");
        assert!(!record.contains("Surname"));
    }

    #[test]
    fn test_display_name_fallback() {
        let blank = Record::from_pairs([("Name", "   ")]);
        assert_eq!(blank.display_name("Name", "certificate"), "certificate");
        assert_eq!(Record::new().display_name("Name", "certificate"), "certificate");
        let named = Record::from_pairs([("Name", " Ravi ")]);
        assert_eq!(named.display_name("Name", "certificate"), "Ravi");
    }

    #[test]
    fn test_from_pairs_stringifies() {
        let record = Record::from_pairs([("Std", 10), ("GR.No.", 4411)]);
        assert_eq!(record.get("Std"), "10");
        assert_eq!(record.get("GR.No."), "4411");
    }

    #[test]
    fn test_csv_strips_header_whitespace_only() {
        let csv = b" Name ,Surname\n Asha ,Patil\n";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("Name"), " Asha ");
        assert_eq!(records[0].get("Surname"), "Patil");
    }

    #[test]
    fn test_csv_short_rows_leave_fields_absent() {
        let csv = b"Name,Surname,Remark\nAsha,Patil\nRavi,Kale,Good\n";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].contains("Remark"));
        assert_eq!(records[1].get("Remark"), "Good");
    }

    #[test]
    fn test_csv_cp1252_fallback() {
        let csv = b"Name\nJos\xe9\n";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records[0].get("Name"), "Jos\u{e9}");

        let csv = b"Name,Remark\nD\x92Souza,\x93Good\x94 \x96 \x80100\n";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records[0].get("Name"), "D\u{2019}Souza");
        assert_eq!(records[0].get("Remark"), "\u{201C}Good\u{201D} \u{2013} \u{20AC}100");
    }

    #[test]
    fn test_cp1252_table() {
        assert_eq!(cp1252_char(0x80), '\u{20AC}');
        assert_eq!(cp1252_char(0x85), '\u{2026}');
        assert_eq!(cp1252_char(0x9F), '\u{0178}');
        assert_eq!(cp1252_char(0x81), '\u{0081}');
        assert_eq!(cp1252_char(0x41), 'A');
        assert_eq!(cp1252_char(0xA0), '\u{00A0}');
        assert_eq!(cp1252_char(0xFF), '\u{00FF}');
    }

    #[test]
    fn test_csv_quoted_values() {
        let csv = b"Name,In Words\n\"Doe, Jane\",\"First of May\"\n";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records[0].get("Name"), "Doe, Jane");
    }

    #[test]
    fn test_record_from_json_scalars() {
        let record: Record =
            serde_json::from_str(r#"{"Name": "Asha", "Std": 10, "Remark": null}"#).unwrap();
        assert_eq!(record.get("Name"), "Asha");
        assert_eq!(record.get("Std"), "10");
        assert!(!record.contains("Remark"));
    }

    #[test]
    fn test_name_list() {
        let records = parse_name_list("Asha\n\n  Ravi Kale \n", "Name");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("Name"), "Ravi Kale");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(RecordFormat::from_path(Path::new("a.CSV")), RecordFormat::Csv);
        assert_eq!(RecordFormat::from_path(Path::new("a.xlsx")), RecordFormat::Workbook);
        assert_eq!(RecordFormat::from_path(Path::new("names.txt")), RecordFormat::NameList);
        assert_eq!(RecordFormat::from_path(Path::new("names")), RecordFormat::NameList);
    }

    #[test]
    fn test_load_records_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("students.csv");
        fs::write(&path, "Name,Std\nAsha,10\nRavi,9\n").unwrap();
        let records = load_records(&path, "Name").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("Std"), "9");

        let names = dir.path().join("names.txt");
        fs::write(&names, "Asha\nRavi\n").unwrap();
        let records = load_records(&names, "Student").unwrap();
        assert_eq!(records[0].get("Student"), "Asha");
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::Float(10.0)), "10");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
    }

    #[test]
    fn test_date_cells_print_as_dates() {
        use calamine::ExcelDateTimeType;

        let date = Data::DateTime(ExcelDateTime::new(45413.0, ExcelDateTimeType::DateTime, false));
        assert_eq!(cell_to_string(&date), "2024-05-01");

        let noon = Data::DateTime(ExcelDateTime::new(45413.5, ExcelDateTimeType::DateTime, false));
        assert_eq!(cell_to_string(&noon), "2024-05-01 12:00:00");

        let span = Data::DateTime(ExcelDateTime::new(1.5, ExcelDateTimeType::TimeDelta, false));
        assert_eq!(cell_to_string(&span), "36:00:00");
    }

    #[test]
    fn test_unreadable_workbook() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, b"not a zip").unwrap();
        assert!(matches!(read_workbook(&path), Err(RecordError::Workbook(_))));
    }
}
