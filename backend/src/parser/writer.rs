//! CSV output for the cleaned table.
//!
//! The header row is always written, even for an empty table. Dates are
//! ISO `YYYY-MM-DD`; nulls are empty cells.

use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;

use crate::error::{CsvError, CsvResult};
use crate::models::COLUMNS;
use crate::transform::CleanedTable;

/// Write the table as CSV.
pub fn write_csv<W: Write>(table: &CleanedTable, writer: W) -> CsvResult<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(COLUMNS)?;
    for event in table {
        wtr.serialize(event)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the table to a CSV file.
pub fn write_csv_file(table: &CleanedTable, path: impl AsRef<Path>) -> CsvResult<()> {
    let file = std::fs::File::create(path)?;
    write_csv(table, std::io::BufWriter::new(file))
}

/// Render the table as a CSV string.
pub fn to_csv_string(table: &CleanedTable) -> CsvResult<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).map_err(|e| CsvError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawLayoff, SourceRow};
    use crate::parser::read_cleaned_str;
    use crate::transform::pipeline::clean;
    use crate::transform::rules::CompiledRules;

    fn table() -> CleanedTable {
        let rows = SourceRow::numbered(vec![RawLayoff {
            company: "Acme, Inc.".into(),
            location: "Boston".into(),
            industry: None,
            total_laid_off: Some(12),
            percentage_laid_off: None,
            date: Some("3/6/2023".into()),
            stage: Some("Seed".into()),
            country: "United States.".into(),
            funds_raised_millions: None,
        }]);
        clean(rows, &CompiledRules::builtin()).unwrap().table
    }

    #[test]
    fn test_csv_layout() {
        let csv = to_csv_string(&table()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "\"Acme, Inc.\",Boston,,12,,2023-03-06,Seed,United States,"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_read_back() {
        let original = table();
        let events = read_cleaned_str(&to_csv_string(&original).unwrap()).unwrap();
        assert_eq!(events.as_slice(), original.rows());
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let empty = clean(Vec::new(), &CompiledRules::builtin()).unwrap().table;
        let csv = to_csv_string(&empty).unwrap();
        assert_eq!(csv.trim_end(), COLUMNS.join(","));
    }
}
