//! CSV emission and export packaging.
//!
//! - [`generate`] - Rows → CSV text for a dialect
//! - [`generate_csv`] - Full export: filter, transform, reorder, emit
//! - [`generate_multiple`] / [`export_batch`] - Several configurations at once
//! - [`generate_filename`] - Timestamped, filesystem-safe file names

use chrono::NaiveDateTime;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::ExportResult;
use crate::models::{CsvDialect, CsvExportConfig, Row};
use crate::structure::records;
use crate::transform::mapper::{apply_filters, reorder_columns, transform_data};
use crate::transform::value::string_form;
use crate::validation::validate_dialect;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("static pattern"));

/// File name used when a configuration has no name.
pub const DEFAULT_EXPORT_NAME: &str = "export";

/// One generated CSV document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvFile {
    pub name: String,
    pub filename: String,
    pub content: String,
    /// Content length in bytes
    pub size: usize,
}

/// Result of exporting one or more configurations.
///
/// A bundle lists the files that belong in `archive_name`; packaging them is
/// left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchExport {
    Single(CsvFile),
    Bundle {
        archive_name: String,
        files: Vec<CsvFile>,
    },
}

impl BatchExport {
    pub fn files(&self) -> Vec<&CsvFile> {
        match self {
            BatchExport::Single(file) => vec![file],
            BatchExport::Bundle { files, .. } => files.iter().collect(),
        }
    }
}

fn writer_builder(dialect: &CsvDialect) -> ExportResult<WriterBuilder> {
    validate_dialect(dialect)?;

    let mut builder = WriterBuilder::new();
    builder
        .delimiter(dialect.delimiter as u8)
        .quote(dialect.enclosure as u8)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true);

    if dialect.escape == '\\' || dialect.escape == dialect.enclosure {
        builder.double_quote(true);
    } else {
        builder.double_quote(false).escape(dialect.escape as u8);
    }
    Ok(builder)
}

/// Serialize rows. The header is the first row's columns.
///
/// Zero rows always produce an empty string, headers or not.
pub fn generate(rows: &[Row], include_headers: bool, dialect: &CsvDialect) -> ExportResult<String> {
    let Some(first) = rows.first() else {
        return Ok(String::new());
    };

    let mut writer = writer_builder(dialect)?.from_writer(Vec::new());
    if include_headers {
        writer.write_record(first.columns())?;
    }
    for row in rows {
        writer.write_record(row.values().map(string_form))?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Rows of an export, before emission: filter → transform → reorder.
pub fn export_rows(data: &Value, config: &CsvExportConfig) -> Vec<Row> {
    let kept = apply_filters(records(data), &config.filters);
    let rows = transform_data(kept, &config.field_mappings, &config.transformations);
    match &config.column_order {
        Some(order) => reorder_columns(rows, order),
        None => rows,
    }
}

/// Run one export configuration against a document.
pub fn generate_csv(data: &Value, config: &CsvExportConfig) -> ExportResult<String> {
    let rows = export_rows(data, config);
    generate(&rows, config.include_headers, &config.dialect)
}

/// `<sanitized name>_<Y-m-d_H-i-s>.csv`
pub fn generate_filename(name: &str, timestamp: &NaiveDateTime) -> String {
    let sanitized = UNSAFE_FILENAME_CHARS.replace_all(name, "_");
    format!("{}_{}.csv", sanitized, timestamp.format("%Y-%m-%d_%H-%M-%S"))
}

/// Export every configuration, in order.
pub fn generate_multiple(
    data: &Value,
    configs: &[CsvExportConfig],
    timestamp: &NaiveDateTime,
) -> ExportResult<Vec<CsvFile>> {
    configs
        .iter()
        .map(|config| {
            let name = config.name.clone().unwrap_or_else(|| DEFAULT_EXPORT_NAME.to_string());
            let content = generate_csv(data, config)?;
            Ok(CsvFile {
                filename: generate_filename(&name, timestamp),
                size: content.len(),
                name,
                content,
            })
        })
        .collect()
}

/// One configuration yields its file; several yield a bundle.
pub fn export_batch(
    data: &Value,
    configs: &[CsvExportConfig],
    timestamp: &NaiveDateTime,
) -> ExportResult<BatchExport> {
    let mut files = generate_multiple(data, configs, timestamp)?;
    if files.len() == 1 {
        if let Some(file) = files.pop() {
            return Ok(BatchExport::Single(file));
        }
    }
    Ok(BatchExport::Bundle {
        archive_name: format!("csv_export_{}.zip", timestamp.format("%Y-%m-%d_%H-%M-%S")),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldMapping, FilterPredicate};
    use crate::transform::predicate::Operator;
    use chrono::NaiveDate;
    use serde_json::json;

    fn people() -> Value {
        json!([{"name": "Ann", "age": 30}, {"name": "Bo", "age": 25}])
    }

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap()
    }

    fn row(cells: &[(&str, Value)]) -> Row {
        cells.iter().map(|(c, v)| (c.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_simple_export() {
        let config = CsvExportConfig::new(FieldMapping::new().with("Name", "name").with("Age", "age"));
        let csv = generate_csv(&people(), &config).unwrap();
        assert_eq!(csv, "Name,Age\nAnn,30\nBo,25\n");
    }

    #[test]
    fn test_without_headers() {
        let config = CsvExportConfig::new(FieldMapping::new().with("Name", "name")).without_headers();
        assert_eq!(generate_csv(&people(), &config).unwrap(), "Ann\nBo\n");
    }

    #[test]
    fn test_no_rows_no_output() {
        assert_eq!(generate(&[], true, &CsvDialect::default()).unwrap(), "");

        let config = CsvExportConfig::new(FieldMapping::new().with("Name", "name"))
            .with_filter(FilterPredicate::new("age", Operator::Gt, json!(100)));
        assert_eq!(generate_csv(&people(), &config).unwrap(), "");
    }

    #[test]
    fn test_quoting() {
        let rows = vec![row(&[
            ("a", json!("x,y")),
            ("b", json!("say \"hi\"")),
            ("c", json!("two\nlines")),
            ("d", json!(null)),
            ("e", json!(true)),
        ])];
        let csv = generate(&rows, false, &CsvDialect::default()).unwrap();
        assert_eq!(csv, "\"x,y\",\"say \"\"hi\"\"\",\"two\nlines\",,true\n");
    }

    #[test]
    fn test_custom_dialect() {
        let dialect = CsvDialect {
            delimiter: ';',
            enclosure: '\'',
            escape: '\\',
        };
        let rows = vec![row(&[("a", json!("it's")), ("b", json!("1;2")), ("c", json!("x,y"))])];
        let csv = generate(&rows, true, &dialect).unwrap();
        assert_eq!(csv, "a;b;c\n'it''s';'1;2';x,y\n");
    }

    #[test]
    fn test_escape_character_prefixes_enclosure() {
        let dialect = CsvDialect {
            delimiter: ',',
            enclosure: '"',
            escape: '~',
        };
        let rows = vec![row(&[("a", json!("a\"b"))])];
        assert_eq!(generate(&rows, false, &dialect).unwrap(), "\"a~\"b\"\n");
    }

    #[test]
    fn test_non_ascii_dialect_rejected() {
        let dialect = CsvDialect {
            delimiter: '§',
            ..CsvDialect::default()
        };
        assert!(generate(&[row(&[("a", json!(1))])], true, &dialect).is_err());
    }

    #[test]
    fn test_round_trip_with_dialect() {
        let data = json!([
            {"t": "semi;colon", "n": 1.5},
            {"t": "quote \" inside", "n": null},
            {"t": "multi\nline", "n": -2}
        ]);
        let dialect = CsvDialect {
            delimiter: ';',
            ..CsvDialect::default()
        };
        let config = CsvExportConfig::new(FieldMapping::new().with("T", "t").with("N", "n"))
            .with_dialect(dialect);
        let rows = export_rows(&data, &config);
        let csv = generate(&rows, true, &dialect).unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .from_reader(csv.as_bytes());
        let parsed: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();
        let expected: Vec<Vec<String>> = rows
            .iter()
            .map(|r| r.values().map(string_form).collect())
            .collect();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_generate_filename() {
        assert_eq!(
            generate_filename("Sales Report (Q1)", &timestamp()),
            "Sales_Report__Q1__2024-05-06_07-08-09.csv"
        );
        assert_eq!(generate_filename("ok-name_1", &timestamp()), "ok-name_1_2024-05-06_07-08-09.csv");
    }

    #[test]
    fn test_batch_single_and_bundle() {
        let a = CsvExportConfig::new(FieldMapping::new().with("Name", "name")).with_name("names");
        let b = CsvExportConfig::new(FieldMapping::new().with("Age", "age")).with_name("ages");

        match export_batch(&people(), &[a.clone()], &timestamp()).unwrap() {
            BatchExport::Single(file) => {
                assert_eq!(file.name, "names");
                assert_eq!(file.content, "Name\nAnn\nBo\n");
                assert_eq!(file.size, file.content.len());
            }
            other => panic!("expected single file, got {:?}", other),
        }

        match export_batch(&people(), &[a, b], &timestamp()).unwrap() {
            BatchExport::Bundle { archive_name, files } => {
                assert_eq!(archive_name, "csv_export_2024-05-06_07-08-09.zip");
                assert_eq!(files.len(), 2);
                assert_eq!(files[1].filename, "ages_2024-05-06_07-08-09.csv");
            }
            other => panic!("expected bundle, got {:?}", other),
        }
    }
}
