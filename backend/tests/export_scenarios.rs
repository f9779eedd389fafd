//! End-to-end exports through the public pipeline.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use jsoncsv::pipeline::{load_config, preview, profile_columns};
use jsoncsv::{
    analyze_structure, are_compatible, check_reupload, count_records, export_batch, export_csv,
    extract_field_paths, ingest, ingest_str, BatchExport, PipelineError, ValidationError,
};
use serde_json::{json, Value};

const LIMIT: usize = 1 << 20;

fn people() -> Value {
    json!([
        {"name": "Ann", "age": 30, "address": {"city": "Lyon"}},
        {"name": "Bo", "age": 17, "address": {"city": "Oslo"}},
        {"name": "Cy", "age": 18, "address": {"city": "Rome"}},
        {"name": "Di", "age": 19}
    ])
}

#[test]
fn test_simple_export() {
    let doc = ingest_str(r#"[{"name":"Ann","age":30},{"name":"Bo","age":25}]"#, LIMIT).unwrap();
    let config = load_config(&json!({"field_mappings": {"Name": "name", "Age": "age"}})).unwrap();

    let csv = export_csv(&doc.value, &config).unwrap();
    assert_eq!(csv, "Name,Age\nAnn,30\nBo,25\n");
}

#[test]
fn test_uniform_records_expose_their_keys() {
    let flat = json!([{"a": 1, "b": "x"}, {"a": 2, "b": "y"}, {"a": 3, "b": "z"}]);
    assert_eq!(count_records(&flat), 3);
    assert_eq!(extract_field_paths(&flat), vec!["a", "b"]);
}

#[test]
fn test_no_rows_means_empty_output() {
    let doc = ingest_str("[]", LIMIT).unwrap();
    let config = load_config(&json!({"field_mappings": {"Name": "name"}})).unwrap();
    // an empty document has no paths to map
    assert!(export_csv(&doc.value, &config).is_err());

    let config = load_config(&json!({
        "field_mappings": {"Name": "name"},
        "include_headers": true,
        "filters": [{"field": "age", "operator": ">", "value": 100}]
    }))
    .unwrap();
    assert_eq!(export_csv(&people(), &config).unwrap(), "");
}

#[test]
fn test_filters_keep_matching_records() {
    let config = load_config(&json!({
        "field_mappings": {"Name": "name"},
        "filters": [{"field": "age", "operator": ">=", "value": 18}]
    }))
    .unwrap();

    assert_eq!(export_csv(&people(), &config).unwrap(), "Name\nAnn\nCy\nDi\n");
}

#[test]
fn test_preview_ignores_filters_and_order() {
    let config = load_config(&json!({
        "field_mappings": {"Name": "name", "Age": "age"},
        "column_order": ["Age"],
        "filters": [{"field": "age", "operator": ">=", "value": 18}]
    }))
    .unwrap();

    let result = preview(&people(), &config.field_mappings, &config.transformations, Some(2)).unwrap();
    assert_eq!(result.headers, vec!["Name", "Age"]);
    assert_eq!(result.rows, vec![vec![json!("Ann"), json!(30)], vec![json!("Bo"), json!(17)]]);
    assert_eq!(result.total_records, 4);
    assert_eq!(result.preview_records, 2);
}

#[test]
fn test_column_order_moves_named_columns_first() {
    let config = load_config(&json!({
        "field_mappings": {"a": "name", "b": "age", "c": "address.city"},
        "column_order": ["b", "a"]
    }))
    .unwrap();

    let csv = export_csv(&json!([{"name": "Ann", "age": 30, "address": {"city": "Lyon"}}]), &config)
        .unwrap();
    assert_eq!(csv, "b,a,c\n30,Ann,Lyon\n");
}

#[test]
fn test_failing_callback_only_affects_its_cell() {
    let config = load_config(&json!({
        "field_mappings": {"Name": "name", "Ratio": "age", "Double": "age"},
        "transformations": {
            "Ratio": {"type": "callback", "function": "value / 0"},
            "Double": {"type": "callback", "function": "function(value) { return value * 2; }"}
        }
    }))
    .unwrap();

    let csv = export_csv(&json!([{"name": "Ann", "age": 30}]), &config).unwrap();
    let mut reader = ReaderBuilder::new().from_reader(csv.as_bytes());
    let row = reader.records().next().unwrap().unwrap();
    assert_eq!(&row[0], "Ann");
    assert!(row[1].starts_with("ERROR: "));
    assert_eq!(&row[2], "60");
}

#[test]
fn test_transformations_and_nested_paths() {
    let config = load_config(&json!({
        "name": "people",
        "field_mappings": [
            {"column": "Who", "field": "name"},
            {"column": "City", "field": "address.city"},
            {"column": "Born", "field": "born"}
        ],
        "transformations": {
            "Who": {"type": "string_case", "case": "upper"},
            "Born": {"type": "format_date", "format": "d/m/Y"}
        },
        "delimiter": ";"
    }))
    .unwrap();

    let data = json!([{"name": "ann", "address": {"city": "Lyon"}, "born": "1990-04-02"}]);
    let csv = export_csv(&data, &config).unwrap();
    assert_eq!(csv, "Who;City;Born\nANN;Lyon;02/04/1990\n");
}

#[test]
fn test_round_trip_with_dialect() {
    let config = load_config(&json!({
        "field_mappings": {"Text": "text", "Count": "count"},
        "delimiter": "|",
        "enclosure": "'"
    }))
    .unwrap();
    let data = json!([
        {"text": "pipe | inside", "count": 1},
        {"text": "it's quoted", "count": 2.5},
        {"text": "multi\nline", "count": null}
    ]);

    let csv = export_csv(&data, &config).unwrap();
    let mut reader = ReaderBuilder::new()
        .delimiter(b'|')
        .quote(b'\'')
        .from_reader(csv.as_bytes());
    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();

    assert_eq!(
        rows,
        vec![
            vec!["pipe | inside".to_string(), "1".to_string()],
            vec!["it's quoted".to_string(), "2.5".to_string()],
            vec!["multi\nline".to_string(), String::new()],
        ]
    );
}

#[test]
fn test_invalid_configuration_is_rejected_with_messages() {
    let config = load_config(&json!({"field_mappings": {"Name": "missing"}})).unwrap();

    match export_csv(&people(), &config) {
        Err(PipelineError::Validation(ValidationError::InvalidConfiguration { errors })) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("missing"));
        }
        other => panic!("expected invalid configuration, got {:?}", other),
    }
}

#[test]
fn test_pair_without_field_reports_empty_source() {
    let config = load_config(&json!({
        "field_mappings": [{"column": "Name", "field": "name"}, {"column": "Who"}, {"column": "Age", "field": null}]
    }))
    .unwrap();

    match export_csv(&people(), &config) {
        Err(PipelineError::Validation(ValidationError::InvalidConfiguration { errors })) => {
            assert_eq!(
                errors,
                vec![
                    "Source field for column 'Who' cannot be empty",
                    "Source field for column 'Age' cannot be empty",
                ]
            );
        }
        other => panic!("expected invalid configuration, got {:?}", other),
    }
}

#[test]
fn test_config_document_shape_errors() {
    let err = load_config(&json!({"field_mappings": {}})).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validation(ValidationError::InvalidDocument { .. })
    ));
}

#[test]
fn test_batch_export() {
    let timestamp = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap();
    let names = load_config(&json!({"name": "Names", "field_mappings": {"Name": "name"}})).unwrap();
    let ages = load_config(&json!({"name": "Ages", "field_mappings": {"Age": "age"}})).unwrap();

    match export_batch(&people(), &[names.clone()], &timestamp).unwrap() {
        BatchExport::Single(file) => {
            assert_eq!(file.filename, "Names_2024-01-02_03-04-05.csv");
            assert_eq!(file.content, "Name\nAnn\nBo\nCy\nDi\n");
        }
        other => panic!("expected a single file, got {:?}", other),
    }

    match export_batch(&people(), &[names, ages], &timestamp).unwrap() {
        BatchExport::Bundle { archive_name, files } => {
            assert_eq!(archive_name, "csv_export_2024-01-02_03-04-05.zip");
            assert_eq!(files.len(), 2);
            assert_eq!(files[1].content, "Age\n30\n17\n18\n19\n");
        }
        other => panic!("expected a bundle, got {:?}", other),
    }
}

#[test]
fn test_reupload_compatibility() {
    let old = analyze_structure(&json!([{"a": 1, "b": 2}]));
    let report = are_compatible(&old, &analyze_structure(&json!([{"a": 1, "b": 2, "c": 3}])));
    assert!(report.compatible);
    assert_eq!(report.added_paths, vec!["c"]);

    let wider = analyze_structure(&json!([{"a": 1, "b": 2, "c": 3}]));
    let err = check_reupload(&wider, br#"[{"a": 1, "b": 2}]"#, LIMIT).unwrap_err();
    match err {
        PipelineError::Incompatible(report) => assert_eq!(report.missing_paths, vec!["c"]),
        other => panic!("expected incompatibility, got {:?}", other),
    }
}

#[test]
fn test_ingest_and_profile() {
    let doc = ingest(br#"{"id": 7, "price": "9.50", "ok": true}"#, LIMIT).unwrap();
    assert_eq!(doc.record_count, 1);

    let config = load_config(&json!({"field_mappings": {"Id": "id", "Price": "price", "Ok": "ok"}}))
        .unwrap();
    let analysis = profile_columns(&doc.value, &config.field_mappings);
    assert_eq!(analysis.total_records, 1);
    assert_eq!(analysis.columns, vec!["Id", "Price", "Ok"]);
}
