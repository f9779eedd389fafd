//! JSON upload ingestion with encoding auto-detection.
//!
//! Raw bytes are decoded (BOM sniffing, then `chardet` for legacy
//! encodings), parsed with `serde_json` and described: structure, record
//! count and field paths. Either the whole document ingests or nothing does.

use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::error::{IngestError, IngestResult};
use crate::structure::{analyze_structure, count_records, extract_field_paths, StructureNode};

/// Largest accepted upload, in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A parsed and described JSON document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ingested {
    pub value: Value,
    pub structure: StructureNode,
    pub record_count: usize,
    pub field_paths: Vec<String>,
    /// Detected source encoding
    pub encoding: String,
}

/// Detect the encoding of raw bytes.
///
/// A byte order mark wins, then valid UTF-8, then `chardet`'s guess.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if let Some((encoding, _)) = encoding_rs::Encoding::for_bom(bytes) {
        return encoding.name().to_lowercase();
    }
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        "" => "utf-8".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to text with the given encoding label, dropping any BOM.
pub fn decode_content(bytes: &[u8], encoding: &str) -> IngestResult<String> {
    let label = match encoding.to_lowercase().as_str() {
        "latin-1" | "latin1" => "iso-8859-1".to_string(),
        other => other.to_string(),
    };
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| IngestError::Encoding(format!("unsupported encoding '{}'", label)))?;

    let (text, actual, had_errors) = encoding.decode(bytes);
    if had_errors && actual == encoding_rs::UTF_8 {
        return Err(IngestError::Encoding("input is not valid UTF-8".to_string()));
    }
    Ok(text.into_owned())
}

/// Ingest JSON text.
pub fn ingest_str(text: &str, max_bytes: usize) -> IngestResult<Ingested> {
    ingest_text(text, max_bytes, "utf-8".to_string())
}

/// Ingest raw upload bytes, detecting their encoding.
pub fn ingest_bytes(bytes: &[u8], max_bytes: usize) -> IngestResult<Ingested> {
    check_size(bytes.len(), max_bytes)?;
    let encoding = detect_encoding(bytes);
    let text = decode_content(bytes, &encoding)?;
    ingest_text(&text, max_bytes, encoding)
}

/// Ingest a JSON file from disk.
pub fn ingest_file<P: AsRef<Path>>(path: P, max_bytes: usize) -> IngestResult<Ingested> {
    let bytes = std::fs::read(path.as_ref())?;
    ingest_bytes(&bytes, max_bytes)
}

fn check_size(size: usize, limit: usize) -> IngestResult<()> {
    if size > limit {
        return Err(IngestError::TooLarge { size, limit });
    }
    Ok(())
}

fn ingest_text(text: &str, max_bytes: usize, encoding: String) -> IngestResult<Ingested> {
    check_size(text.len(), max_bytes)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let value: Value =
        serde_json::from_str(text).map_err(|e| IngestError::InvalidJson(e.to_string()))?;

    Ok(Ingested {
        structure: analyze_structure(&value),
        record_count: count_records(&value),
        field_paths: extract_field_paths(&value),
        value,
        encoding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_ingest_array() {
        let ingested = ingest_str(
            r#"[{"name": "Ann", "age": 30}, {"name": "Bo", "age": 25}]"#,
            DEFAULT_MAX_UPLOAD_BYTES,
        )
        .unwrap();
        assert_eq!(ingested.record_count, 2);
        assert_eq!(ingested.field_paths, vec!["name", "age"]);
        assert_eq!(ingested.structure.kind(), "array");
    }

    #[test]
    fn test_ingest_single_object() {
        let ingested = ingest_str(r#"{"user": {"id": 1}}"#, DEFAULT_MAX_UPLOAD_BYTES).unwrap();
        assert_eq!(ingested.record_count, 1);
        assert_eq!(ingested.field_paths, vec!["user", "user.id"]);
        assert_eq!(ingested.value, json!({"user": {"id": 1}}));
    }

    #[test]
    fn test_invalid_json() {
        let err = ingest_str("{\"a\": ", DEFAULT_MAX_UPLOAD_BYTES).unwrap_err();
        assert!(matches!(err, IngestError::InvalidJson(_)));
        assert!(err.to_string().starts_with("Invalid JSON: "));
    }

    #[test]
    fn test_too_large() {
        let err = ingest_str("[1, 2, 3]", 4).unwrap_err();
        assert!(matches!(err, IngestError::TooLarge { size: 9, limit: 4 }));
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(br#"{"a": 1}"#);
        let ingested = ingest_bytes(&bytes, DEFAULT_MAX_UPLOAD_BYTES).unwrap();
        assert_eq!(ingested.encoding, "utf-8");
        assert_eq!(ingested.value, json!({"a": 1}));
    }

    #[test]
    fn test_utf16_upload() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in r#"{"k": "é"}"#.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let ingested = ingest_bytes(&bytes, DEFAULT_MAX_UPLOAD_BYTES).unwrap();
        assert_eq!(ingested.encoding, "utf-16le");
        assert_eq!(ingested.value, json!({"k": "é"}));
    }

    #[test]
    fn test_latin1_decoding() {
        // {"n":"Société"} in ISO-8859-1
        let mut bytes = br#"{"n":"Soci"#.to_vec();
        bytes.extend_from_slice(&[0xE9, 0x74, 0xE9]);
        bytes.extend_from_slice(br#""}"#);
        let decoded = decode_content(&bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "{\"n\":\"Société\"}");
    }

    #[test]
    fn test_ingest_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"id": 1}}]"#).unwrap();
        let ingested = ingest_file(file.path(), DEFAULT_MAX_UPLOAD_BYTES).unwrap();
        assert_eq!(ingested.record_count, 1);
    }
}
