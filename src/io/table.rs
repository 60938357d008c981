use anyhow::Result;
use polars::prelude::*;
use serde_json::{json, Value};

/// Attribute columns of `df` as JSON values, keeping integer, float and boolean types.
/// Every other type is written as a string.
pub(crate) fn json_columns(df: &DataFrame) -> Result<Vec<(String, Vec<Value>)>> {
    df.get_columns().iter()
        .map(|column| {
            let values = match column.dtype() {
                DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
                | DataType::UInt8 | DataType::UInt16 | DataType::UInt32 => {
                    column.cast(&DataType::Int64)?.i64()?.into_iter()
                        .map(|v| v.map_or(Value::Null, |v| json!(v)))
                        .collect()
                }
                DataType::UInt64 => {
                    column.u64()?.into_iter()
                        .map(|v| v.map_or(Value::Null, |v| json!(v)))
                        .collect()
                }
                DataType::Float32 | DataType::Float64 => {
                    column.cast(&DataType::Float64)?.f64()?.into_iter()
                        .map(|v| v.filter(|v| v.is_finite()).map_or(Value::Null, |v| json!(v)))
                        .collect()
                }
                DataType::Boolean => {
                    column.bool()?.into_iter()
                        .map(|v| v.map_or(Value::Null, |v| json!(v)))
                        .collect()
                }
                _ => {
                    column.cast(&DataType::String)?.str()?.into_iter()
                        .map(|v| v.map_or(Value::Null, |v| json!(v)))
                        .collect()
                }
            };
            Ok((column.name().to_string(), values))
        })
        .collect()
}

/// Render a JSON attribute value as a CSV field. Nulls become empty fields.
pub(crate) fn csv_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_are_preserved() {
        let df = DataFrame::new(vec![
            Column::new("cell_id".into(), &[3u32, 4]),
            Column::new("event_score".into(), &[Some(0.5), None]),
            Column::new("name".into(), &["Main Library", "Oak Hall"]),
        ]).unwrap();

        let columns = json_columns(&df).unwrap();
        assert_eq!(columns[0], ("cell_id".to_string(), vec![json!(3), json!(4)]));
        assert_eq!(columns[1].1, vec![json!(0.5), Value::Null]);
        assert_eq!(columns[2].1[0], json!("Main Library"));
    }

    #[test]
    fn csv_fields() {
        assert_eq!(csv_field(&Value::Null), "");
        assert_eq!(csv_field(&json!("a,b")), "a,b");
        assert_eq!(csv_field(&json!(2.5)), "2.5");
        assert_eq!(csv_field(&json!(7)), "7");
    }
}
