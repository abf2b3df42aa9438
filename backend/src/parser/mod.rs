//! Layoffs CSV reader with encoding and delimiter auto-detection.
//!
//! Headers are matched case-insensitively after trimming, extra columns are
//! ignored and a missing expected column is a [`SchemaError`] raised before
//! any row is read. Nullable cells that are empty or equal to a null token
//! ([`DEFAULT_NULL_TOKENS`] unless configured) become `None`.

pub mod writer;

use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;

use crate::error::{CsvError, CsvResult, SchemaError};
use crate::models::{
    LayoffEvent, RawLayoff, SourceRow, COLUMNS, COMPANY, COUNTRY, DATE, FUNDS_RAISED_MILLIONS,
    INDUSTRY, LOCATION, PERCENTAGE_LAID_OFF, STAGE, TOTAL_LAID_OFF,
};

pub use writer::{to_csv_string, write_csv, write_csv_file};

/// Null tokens used when neither the rules file nor the caller sets any.
pub const DEFAULT_NULL_TOKENS: [&str; 2] = ["NULL", "N/A"];

/// Reader settings
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Field delimiter (auto-detect if `None`)
    pub delimiter: Option<char>,
    /// Cell values read as null, case-insensitively
    pub null_tokens: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            null_tokens: DEFAULT_NULL_TOKENS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed rows, tagged with their source line
    pub rows: Vec<SourceRow<RawLayoff>>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers as read
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding, dropping a UTF-8 BOM.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let text = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .map_err(|e| CsvError::Encoding(e.to_string()))?,
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // Unknown charset: best effort
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    Ok(text
        .strip_prefix('\u{feff}')
        .map(str::to_string)
        .unwrap_or(text))
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
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

/// Parse a CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let result = parse_csv_file_auto("layoffs.csv", &ParseOptions::default())?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Rows: {}", result.rows.len());
/// ```
pub fn parse_csv_file_auto<P: AsRef<Path>>(
    path: P,
    options: &ParseOptions,
) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes, options)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], options: &ParseOptions) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(&content));

    let (headers, rows) = parse_str(&content, delimiter, &options.null_tokens)?;

    Ok(ParseResult {
        rows,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse CSV text with an explicit delimiter.
///
/// Returns the header row and the parsed rows.
pub fn parse_str(
    content: &str,
    delimiter: char,
    null_tokens: &[String],
) -> CsvResult<(Vec<String>, Vec<SourceRow<RawLayoff>>)> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }
    if !delimiter.is_ascii() {
        return Err(CsvError::Encoding(format!(
            "delimiter '{}' is not a single-byte character",
            delimiter
        )));
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(Trim::None)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let columns = ColumnIndex::locate(&headers)?;

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let raw = columns.read(&record, line, null_tokens)?;
        rows.push(SourceRow::new(line, raw));
    }

    Ok((headers, rows))
}

/// Read a table written by [`write_csv`] (ISO dates, empty cells as null).
pub fn read_cleaned_csv<P: AsRef<Path>>(path: P) -> CsvResult<Vec<LayoffEvent>> {
    let bytes = std::fs::read(path.as_ref())?;
    let content = decode_content(&bytes, &detect_encoding(&bytes))?;
    read_cleaned_str(&content)
}

/// In-memory form of [`read_cleaned_csv`].
pub fn read_cleaned_str(content: &str) -> CsvResult<Vec<LayoffEvent>> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(detect_delimiter(content) as u8)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    ColumnIndex::locate(&headers)?;

    let mut events = Vec::new();
    for result in reader.deserialize::<LayoffEvent>() {
        events.push(result?);
    }
    Ok(events)
}

/// Position of each expected column in the header row.
struct ColumnIndex {
    positions: [usize; COLUMNS.len()],
}

impl ColumnIndex {
    fn locate(headers: &[String]) -> Result<Self, SchemaError> {
        let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut positions = [0; COLUMNS.len()];
        let mut missing = Vec::new();

        for (slot, column) in COLUMNS.iter().enumerate() {
            match normalized.iter().position(|h| h == column) {
                Some(pos) => positions[slot] = pos,
                None => missing.push(column.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(Self { positions })
        } else {
            Err(SchemaError {
                missing,
                found: headers.to_vec(),
            })
        }
    }

    fn cell<'r>(&self, record: &'r StringRecord, column: &str) -> &'r str {
        COLUMNS
            .iter()
            .position(|c| *c == column)
            .and_then(|slot| record.get(self.positions[slot]))
            .unwrap_or("")
    }

    fn read(
        &self,
        record: &StringRecord,
        line: usize,
        null_tokens: &[String],
    ) -> CsvResult<RawLayoff> {
        let text = |column: &str| self.cell(record, column).to_string();
        let nullable = |column: &str| {
            let value = self.cell(record, column);
            (!is_null(value, null_tokens)).then(|| value.to_string())
        };
        let integer = |column: &str| {
            let value = self.cell(record, column);
            if is_null(value, null_tokens) {
                Ok(None)
            } else {
                parse_integer(value)
                    .map(Some)
                    .ok_or_else(|| CsvError::invalid_cell(line, column, value, "not a number"))
            }
        };

        Ok(RawLayoff {
            company: text(COMPANY),
            location: text(LOCATION),
            industry: nullable(INDUSTRY),
            total_laid_off: integer(TOTAL_LAID_OFF)?,
            percentage_laid_off: nullable(PERCENTAGE_LAID_OFF),
            date: nullable(DATE),
            stage: nullable(STAGE),
            country: text(COUNTRY),
            funds_raised_millions: integer(FUNDS_RAISED_MILLIONS)?,
        })
    }
}

/// Empty, whitespace-only, or a null token.
pub fn is_null(value: &str, null_tokens: &[String]) -> bool {
    let value = value.trim();
    value.is_empty() || null_tokens.iter().any(|t| t.eq_ignore_ascii_case(value))
}

/// Integer text, or decimal text rounded half away from zero.
pub fn parse_integer(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
            .map(|f| f.round() as i64)
    })
}
