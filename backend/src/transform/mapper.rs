//! Record → row mapping, record filtering and column reordering.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;

use super::extract::extract_value;
use super::operations::TransformationSpec;
use super::predicate::evaluate;
use crate::models::{FieldMapping, FilterPredicate, Row};

/// Map every record to a row.
///
/// Cells follow the declared order of `mapping`. A column with a
/// transformation gets the transformed value, computed with the original
/// record as context; absent values become `null`.
pub fn transform_data<'a, I>(
    records: I,
    mapping: &FieldMapping,
    transformations: &IndexMap<String, TransformationSpec>,
) -> Vec<Row>
where
    I: IntoIterator<Item = &'a Value>,
{
    records
        .into_iter()
        .map(|record| transform_record(record, mapping, transformations))
        .collect()
}

/// Map one record to a row.
pub fn transform_record(
    record: &Value,
    mapping: &FieldMapping,
    transformations: &IndexMap<String, TransformationSpec>,
) -> Row {
    let mut row = Row::with_capacity(mapping.len());
    for entry in mapping {
        let value = extract_value(record, &entry.field);
        let cell = match transformations.get(&entry.column) {
            Some(spec) => spec.apply(value, record),
            None => value.cloned().unwrap_or(Value::Null),
        };
        row.push(entry.column.clone(), cell);
    }
    row
}

/// Whether a record satisfies every filter. An empty list always passes.
pub fn passes_filters(record: &Value, filters: &[FilterPredicate]) -> bool {
    filters
        .iter()
        .all(|f| evaluate(extract_value(record, &f.field), f.operator, &f.value))
}

/// Keep the records that pass all filters, in their original order.
pub fn apply_filters<'a>(records: Vec<&'a Value>, filters: &[FilterPredicate]) -> Vec<&'a Value> {
    if filters.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|record| passes_filters(record, filters))
        .collect()
}

/// Move the named columns to the front of every row.
///
/// Names not present in a row are skipped, as are repeated names. Remaining
/// columns keep their relative order.
pub fn reorder_columns(rows: Vec<Row>, column_order: &[String]) -> Vec<Row> {
    if column_order.is_empty() {
        return rows;
    }
    rows.into_iter()
        .map(|row| reorder_row(row, column_order))
        .collect()
}

fn reorder_row(row: Row, column_order: &[String]) -> Row {
    let mut remaining: Vec<Option<(String, Value)>> = row.into_cells().into_iter().map(Some).collect();
    let mut ordered = Row::with_capacity(remaining.len());
    let mut placed: HashSet<&str> = HashSet::new();

    for name in column_order {
        if !placed.insert(name.as_str()) {
            continue;
        }
        let found = remaining
            .iter_mut()
            .find(|cell| cell.as_ref().is_some_and(|(c, _)| c == name))
            .and_then(Option::take);
        if let Some((column, value)) = found {
            ordered.push(column, value);
        }
    }

    for (column, value) in remaining.into_iter().flatten() {
        ordered.push(column, value);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::predicate::Operator;
    use serde_json::json;

    fn people() -> Value {
        json!([
            {"name": "Ann", "age": 17, "address": {"city": "Oslo"}},
            {"name": "Bo", "age": 18},
            {"name": "Cy", "age": 19, "address": {"city": "Rome"}}
        ])
    }

    #[test]
    fn test_transform_data_follows_mapping_order() {
        let data = people();
        let mapping = FieldMapping::new().with("City", "address.city").with("Name", "name");
        let rows = transform_data(data.as_array().unwrap(), &mapping, &IndexMap::new());

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["City", "Name"]);
        assert_eq!(rows[0].get("City"), Some(&json!("Oslo")));
        assert_eq!(rows[1].get("City"), Some(&Value::Null));
    }

    #[test]
    fn test_transformation_sees_original_record() {
        let data = people();
        let mapping = FieldMapping::new().with("Label", "name");
        let mut transformations = IndexMap::new();
        transformations.insert(
            "Label".to_string(),
            TransformationSpec::Callback {
                function: "value + ' (' + age + ')'".into(),
            },
        );
        let rows = transform_data(data.as_array().unwrap(), &mapping, &transformations);
        assert_eq!(rows[2].get("Label"), Some(&json!("Cy (19)")));
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let data = people();
        let filters = vec![FilterPredicate::new("age", Operator::Ge, json!(18))];
        let kept = apply_filters(data.as_array().unwrap().iter().collect(), &filters);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0]["name"], "Bo");

        let filters = vec![
            FilterPredicate::new("age", Operator::Ge, json!(18)),
            FilterPredicate::new("address.city", Operator::NotEmpty, Value::Null),
        ];
        let kept = apply_filters(data.as_array().unwrap().iter().collect(), &filters);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["name"], "Cy");
    }

    #[test]
    fn test_empty_filters_keep_everything() {
        let data = people();
        let kept = apply_filters(data.as_array().unwrap().iter().collect(), &[]);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_reorder_columns() {
        let row: Row = vec![
            ("a".to_string(), json!(1)),
            ("b".to_string(), json!(2)),
            ("c".to_string(), json!(3)),
        ]
        .into_iter()
        .collect();

        let order = vec!["b".to_string(), "zz".to_string(), "a".to_string(), "b".to_string()];
        let rows = reorder_columns(vec![row.clone()], &order);
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(rows[0].get("b"), Some(&json!(2)));

        let unchanged = reorder_columns(vec![row.clone()], &[]);
        assert_eq!(unchanged[0], row);
    }
}
