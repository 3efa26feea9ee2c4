use std::collections::HashMap;
use std::path::Path;

use calamine::{Data, Reader};
use regex::Regex;

use crate::error::{Result, RetenError};
use crate::models::ServiceRow;

/// Columns the HIS ledger export must carry. Everything else is optional.
pub const REQUIRED_COLUMNS: &[&str] = &["cod_seri", "fecha", "hora", "importe"];

const OPTIONAL_COLUMNS: &[&str] = &[
    "servicio", "descripcion", "paciente", "segus", "cia", "cod_seg",
    "comprobante", "area", "tipoate", "admision",
];

// Noise-row exclusion: a system-generated placeholder line the HIS emits per
// admission. Threshold pending confirmation with billing staff.
pub const NOISE_TARIFF_CODE: &str = "00.19.27";
pub const NOISE_AMOUNT_MAX: f64 = 0.05;

// ---------------------------------------------------------------------------
// Value conversion helpers
// ---------------------------------------------------------------------------

/// Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug).
/// Serials outside 1900-01-01..=9999-12-31 are corrupt cells, not dates.
pub fn excel_serial_to_date(serial: f64) -> Option<String> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = base.checked_add_signed(chrono::Duration::try_days(serial as i64)?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Excel stores times as a fraction of a day. Round to whole seconds so
/// 0.4375 comes back as exactly 10:30:00 regardless of binary representation.
pub fn excel_fraction_to_time(value: f64) -> String {
    let secs = (value.fract() * 86_400.0).round() as u32 % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Accept ISO (YYYY-MM-DD) or DD/MM/YYYY and normalize to ISO.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        return Some(d.format("%Y-%m-%d").to_string());
    }
    None
}

/// Accept H:MM, HH:MM, HH:MM:SS (also with '.' separators) and normalize to
/// HH:MM:SS.
pub fn normalize_time(raw: &str) -> Option<String> {
    let re = Regex::new(r"^(\d{1,2})[:.](\d{2})(?:[:.](\d{2}))?$").ok()?;
    let caps = re.captures(raw.trim())?;
    let h: u32 = caps.get(1)?.as_str().parse().ok()?;
    let m: u32 = caps.get(2)?.as_str().parse().ok()?;
    let s: u32 = caps.get(3).map_or(0, |c| c.as_str().parse().unwrap_or(0));
    if h > 23 || m > 59 || s > 59 {
        return None;
    }
    Some(format!("{h:02}:{m:02}:{s:02}"))
}

pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace(',', "").replace('"', "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                format!("{f}")
            }
        }
        Data::Int(i) => format!("{i}"),
        Data::Bool(b) => format!("{b}"),
        _ => String::new(),
    }
}

fn cell_to_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => parse_amount(s),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Header mapping
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ColumnMap {
    idx: HashMap<&'static str, usize>,
}

impl ColumnMap {
    fn get<'a, T>(&self, cells: &'a [T], column: &str) -> Option<&'a T> {
        self.idx.get(column).and_then(|&i| cells.get(i))
    }
}

fn normalize_header(cell: &str) -> String {
    cell.trim().to_lowercase()
}

/// A header row is any row carrying at least one required column name;
/// exports often lead with title/junk rows before it.
fn looks_like_header(cells: &[String]) -> bool {
    cells
        .iter()
        .any(|c| REQUIRED_COLUMNS.contains(&normalize_header(c).as_str()))
}

fn build_column_map(cells: &[String]) -> Result<ColumnMap> {
    let mut idx = HashMap::new();
    for (i, cell) in cells.iter().enumerate() {
        let name = normalize_header(cell);
        for col in REQUIRED_COLUMNS.iter().chain(OPTIONAL_COLUMNS) {
            if name == *col {
                idx.entry(*col).or_insert(i);
            }
        }
    }
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !idx.contains_key(**c))
        .copied()
        .collect();
    if missing.is_empty() {
        Ok(ColumnMap { idx })
    } else {
        Err(RetenError::MissingColumns(missing.join(", ")))
    }
}

fn opt(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn map_xlsx_row(cells: &[Data], map: &ColumnMap) -> Option<ServiceRow> {
    let doctor_code = map.get(cells, "cod_seri").map(cell_to_string)?;
    if doctor_code.is_empty() {
        return None;
    }
    let date = match map.get(cells, "fecha")? {
        Data::Float(f) => excel_serial_to_date(*f)?,
        Data::Int(i) => excel_serial_to_date(*i as f64)?,
        Data::String(s) => normalize_date(s)?,
        _ => return None,
    };
    let time = match map.get(cells, "hora")? {
        Data::Float(f) => excel_fraction_to_time(*f),
        Data::Int(i) => excel_fraction_to_time(*i as f64),
        Data::String(s) => normalize_time(s)?,
        _ => return None,
    };
    let amount = map.get(cells, "importe").and_then(cell_to_f64)?;

    let text = |col: &str| map.get(cells, col).map(cell_to_string).and_then(opt);
    Some(ServiceRow {
        doctor_code,
        date,
        time,
        amount,
        service: text("servicio"),
        description: text("descripcion"),
        patient: text("paciente"),
        insurance_id: text("segus"),
        company: text("cia"),
        tariff_code: text("cod_seg"),
        receipt: map.get(cells, "comprobante").map(cell_to_string),
        area: text("area"),
        attention_type: text("tipoate"),
        admission: text("admision"),
    })
}

fn map_csv_row(cells: &[String], map: &ColumnMap) -> Option<ServiceRow> {
    let doctor_code = map.get(cells, "cod_seri")?.trim().to_string();
    if doctor_code.is_empty() {
        return None;
    }
    let date = normalize_date(map.get(cells, "fecha")?)?;
    let time = normalize_time(map.get(cells, "hora")?)?;
    let amount = parse_amount(map.get(cells, "importe")?)?;

    let text = |col: &str| map.get(cells, col).map(|s| s.trim().to_string()).and_then(opt);
    Some(ServiceRow {
        doctor_code,
        date,
        time,
        amount,
        service: text("servicio"),
        description: text("descripcion"),
        patient: text("paciente"),
        insurance_id: text("segus"),
        company: text("cia"),
        tariff_code: text("cod_seg"),
        receipt: map.get(cells, "comprobante").map(|s| s.trim().to_string()),
        area: text("area"),
        attention_type: text("tipoate"),
        admission: text("admision"),
    })
}

// ---------------------------------------------------------------------------
// Noise-row exclusion
// ---------------------------------------------------------------------------

fn is_placeholder_receipt(receipt: Option<&str>) -> bool {
    match receipt {
        None => true,
        Some(r) => {
            let r = r.trim();
            r.is_empty() || r == "-"
        }
    }
}

/// Exclusion rules applied before classification. Returns the audit reason
/// when a row should be dropped.
pub fn exclusion_reason(row: &ServiceRow) -> Option<&'static str> {
    let particular = row
        .company
        .as_deref()
        .map(|c| c.trim().eq_ignore_ascii_case(crate::commission::PARTICULAR))
        .unwrap_or(false);
    if particular && is_placeholder_receipt(row.receipt.as_deref()) {
        return Some("private service without receipt");
    }
    if row.tariff_code.as_deref().map(str::trim) == Some(NOISE_TARIFF_CODE)
        && row.amount.abs() <= NOISE_AMOUNT_MAX
    {
        return Some("admission placeholder row");
    }
    None
}

// ---------------------------------------------------------------------------
// File format dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatKind {
    Xlsx,
    Csv,
}

impl FormatKind {
    pub fn get_by_key(key: &str) -> Option<Self> {
        match key {
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn for_file(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xlsx" | "xls" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn parse(&self, path: &Path) -> Result<ParseOutput> {
        match self {
            Self::Xlsx => parse_xlsx(path),
            Self::Csv => parse_csv(path),
        }
    }
}

#[derive(Debug, Default)]
pub struct ParseOutput {
    pub rows: Vec<ServiceRow>,
    pub excluded: usize,
    pub malformed: usize,
}

impl ParseOutput {
    fn push(&mut self, row: Option<ServiceRow>) {
        match row {
            Some(row) => {
                if exclusion_reason(&row).is_some() {
                    self.excluded += 1;
                } else {
                    self.rows.push(row);
                }
            }
            None => self.malformed += 1,
        }
    }
}

fn parse_xlsx(path: &Path) -> Result<ParseOutput> {
    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| RetenError::Xlsx(format!("failed to open workbook: {e}")))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| RetenError::Xlsx("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| RetenError::Xlsx(format!("failed to read sheet '{sheet}': {e}")))?;

    let mut map: Option<ColumnMap> = None;
    let mut out = ParseOutput::default();
    for row in range.rows() {
        if map.is_none() {
            let cells: Vec<String> = row.iter().map(cell_to_string).collect();
            if looks_like_header(&cells) {
                map = Some(build_column_map(&cells)?);
            }
            continue;
        }
        let cmap = match &map {
            Some(m) => m,
            None => continue,
        };
        if row.iter().all(|c| cell_to_string(c).is_empty()) {
            continue;
        }
        out.push(map_xlsx_row(row, cmap));
    }
    if map.is_none() {
        return Err(RetenError::MissingColumns(REQUIRED_COLUMNS.join(", ")));
    }
    Ok(out)
}

fn parse_csv(path: &Path) -> Result<ParseOutput> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));

    let mut map: Option<ColumnMap> = None;
    let mut out = ParseOutput::default();
    for result in rdr.records() {
        let record = result?;
        let cells: Vec<String> = record.iter().map(|f| f.to_string()).collect();
        if map.is_none() {
            if looks_like_header(&cells) {
                map = Some(build_column_map(&cells)?);
            }
            continue;
        }
        let cmap = match &map {
            Some(m) => m,
            None => continue,
        };
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        out.push(map_csv_row(&cells, cmap));
    }
    if map.is_none() {
        return Err(RetenError::MissingColumns(REQUIRED_COLUMNS.join(", ")));
    }
    Ok(out)
}
