use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgRow, PgValueRef};
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Convert one text-format cell into JSON using its Postgres type name.
pub fn text_to_json(type_name: &str, text: Option<&str>) -> Value {
    let Some(text) = text else {
        return Value::Null;
    };

    match type_name {
        "INT2" | "INT4" | "INT8" | "OID" => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        "FLOAT4" | "FLOAT8" | "NUMERIC" | "MONEY" => text
            .trim_start_matches('$')
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(text.to_string())),
        "BOOL" => match text {
            "t" | "true" => Value::Bool(true),
            "f" | "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        },
        "JSON" | "JSONB" => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        }
        _ => Value::String(text.to_string()),
    }
}

fn cell_text(value: PgValueRef<'_>) -> Option<String> {
    if value.is_null() {
        return None;
    }
    value.as_str().ok().map(str::to_string)
}

/// Column names of a row, in select order
pub fn column_names(row: &PgRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Convert a row fetched over the simple query protocol into a JSON object.
pub fn row_to_json(row: &PgRow) -> Value {
    let mut object = Map::with_capacity(row.columns().len());

    for column in row.columns() {
        let type_name = column.type_info().name().to_string();
        let text = row
            .try_get_raw(column.ordinal())
            .ok()
            .and_then(cell_text);

        object.insert(
            column.name().to_string(),
            text_to_json(&type_name, text.as_deref()),
        );
    }

    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_and_booleans_are_typed() {
        assert_eq!(text_to_json("INT8", Some("42")), json!(42));
        assert_eq!(text_to_json("NUMERIC", Some("1250.50")), json!(1250.5));
        assert_eq!(text_to_json("MONEY", Some("$1,200.00")), json!(1200.0));
        assert_eq!(text_to_json("BOOL", Some("t")), json!(true));
    }

    #[test]
    fn nulls_and_unknown_types() {
        assert_eq!(text_to_json("TEXT", None), Value::Null);
        assert_eq!(text_to_json("DATE", Some("2024-01-31")), json!("2024-01-31"));
        assert_eq!(text_to_json("NUMERIC", Some("NaN")), json!("NaN"));
        assert_eq!(text_to_json("JSONB", Some(r#"{"a": 1}"#)), json!({"a": 1}));
    }
}
