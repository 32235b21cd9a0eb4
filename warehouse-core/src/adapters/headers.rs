//! Header normalization for information-schema introspection rows.

use super::HeaderNormalizer;
use crate::dialect::ColumnTypes;
use crate::models::{Dialect, HeaderSet, Row};
use serde_json::Value as JsonValue;

const COLUMN_NAME_FIELD: &str = "column_name";
const DATA_TYPE_FIELD: &str = "data_type";

/// Reads column names from `column_name` fields of information-schema rows.
///
/// Field lookup is case-insensitive (MySQL reports `COLUMN_NAME`). A row with a
/// single field is taken as the column name regardless of the field's name.
/// Names are trimmed of whitespace and identifier quotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct InformationSchemaNormalizer;

fn field<'r>(row: &'r Row, name: &str) -> Option<&'r JsonValue> {
    row.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn clean(value: &JsonValue) -> Option<String> {
    let raw = match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => return None,
        other => other.to_string(),
    };
    let cleaned = raw
        .trim()
        .trim_matches(|c| c == '`' || c == '"')
        .trim()
        .to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

impl HeaderNormalizer for InformationSchemaNormalizer {
    fn normalize(&self, _dialect: &Dialect, rows: &[Row]) -> HeaderSet {
        rows.iter()
            .filter_map(|row| {
                let value = field(row, COLUMN_NAME_FIELD).or_else(|| {
                    if row.len() == 1 {
                        row.values().next()
                    } else {
                        None
                    }
                })?;
                clean(value)
            })
            .collect()
    }

    fn column_types(&self, _dialect: &Dialect, rows: &[Row]) -> ColumnTypes {
        rows.iter()
            .filter_map(|row| {
                let name = clean(field(row, COLUMN_NAME_FIELD)?)?;
                let data_type = clean(field(row, DATA_TYPE_FIELD)?)?;
                Some((name, data_type))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: JsonValue) -> Vec<Row> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_normalize_mysql_uppercase_field() {
        let rows = rows(json!([
            {"COLUMN_NAME": "id", "DATA_TYPE": "int"},
            {"COLUMN_NAME": " value ", "DATA_TYPE": "decimal"},
        ]));
        let headers = InformationSchemaNormalizer.normalize(&Dialect::MySql, &rows);
        assert_eq!(
            headers.into_iter().collect::<Vec<_>>(),
            vec!["id".to_string(), "value".to_string()]
        );
    }

    #[test]
    fn test_normalize_single_field_rows_and_quotes() {
        let rows = rows(json!([{"name": "`ts`"}, {"name": "\"id\""}, {"name": null}]));
        let headers = InformationSchemaNormalizer.normalize(&Dialect::Postgres, &rows);
        assert_eq!(headers.len(), 2);
        assert!(headers.contains("ts"));
        assert!(headers.contains("id"));
    }

    #[test]
    fn test_normalize_skips_unrecognized_rows() {
        let rows = rows(json!([{"a": "x", "b": "y"}]));
        assert!(
            InformationSchemaNormalizer
                .normalize(&Dialect::MySql, &rows)
                .is_empty()
        );
    }

    #[test]
    fn test_column_types() {
        let rows = rows(json!([
            {"column_name": "id", "data_type": "int4"},
            {"column_name": "ts", "data_type": "timestamptz"},
            {"column_name": "value"},
        ]));
        let types = InformationSchemaNormalizer.column_types(&Dialect::Postgres, &rows);
        assert_eq!(types.len(), 2);
        assert_eq!(types.get("ts").map(String::as_str), Some("timestamptz"));
    }
}
