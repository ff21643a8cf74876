//! Cell values and per-column type coercion for imports.
//!
//! Raw text fields are coerced according to the declared ClickHouse type of
//! their column. A field that does not parse is kept as its raw string; the
//! server decides later whether it can store it.

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use super::clickhouse::Column;

/// Date pattern accepted for `Date` and `DateTime` columns.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single typed cell of an imported row.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Int64(i64),
    /// Unsigned values above `i64::MAX`.
    UInt64(u64),
    Float64(f64),
    Date(NaiveDate),
    String(String),
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Int64(v) => serializer.serialize_i64(*v),
            CellValue::UInt64(v) => serializer.serialize_u64(*v),
            // JSON has no literal for these; ClickHouse reads the quoted forms.
            CellValue::Float64(v) if v.is_nan() => serializer.serialize_str("nan"),
            CellValue::Float64(v) if v.is_infinite() => {
                serializer.serialize_str(if *v > 0.0 { "inf" } else { "-inf" })
            }
            CellValue::Float64(v) => serializer.serialize_f64(*v),
            CellValue::Date(d) => serializer.collect_str(&d.format(DATE_FORMAT)),
            CellValue::String(s) => serializer.serialize_str(s),
        }
    }
}

/// Coercion family of a declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Float,
    Date,
    Other,
}

impl TypeFamily {
    /// Classifies a ClickHouse type name. `Nullable(T)` classifies as `T`.
    pub fn of(type_name: &str) -> Self {
        match strip_nullable(type_name.trim()) {
            "Int8" | "Int16" | "Int32" | "Int64" | "UInt8" | "UInt16" | "UInt32" | "UInt64" => {
                TypeFamily::Integer
            }
            "Float32" | "Float64" => TypeFamily::Float,
            "Date" | "DateTime" => TypeFamily::Date,
            _ => TypeFamily::Other,
        }
    }
}

/// Returns `T` for `Nullable(T)`, otherwise the input.
pub fn strip_nullable(type_name: &str) -> &str {
    type_name
        .strip_prefix("Nullable(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(type_name)
}

impl CellValue {
    /// Coerces a raw text field for the given column.
    ///
    /// Fields without a column (the row is wider than the column list) stay strings.
    pub fn coerce(raw: &str, column: Option<&Column>) -> Self {
        let Some(column) = column else {
            return CellValue::String(raw.to_string());
        };
        let family = TypeFamily::of(&column.column_type);
        if column.nullable && raw.is_empty() && family != TypeFamily::Other {
            return CellValue::Null;
        }
        match family {
            TypeFamily::Integer => raw
                .parse::<i64>()
                .map(CellValue::Int64)
                .or_else(|_| raw.parse::<u64>().map(CellValue::UInt64))
                .unwrap_or_else(|_| CellValue::String(raw.to_string())),
            TypeFamily::Float => raw
                .parse::<f64>()
                .map(CellValue::Float64)
                .unwrap_or_else(|_| CellValue::String(raw.to_string())),
            TypeFamily::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map(CellValue::Date)
                .unwrap_or_else(|_| CellValue::String(raw.to_string())),
            TypeFamily::Other => CellValue::String(raw.to_string()),
        }
    }

    /// Converts an inline JSON cell. Strings go through [`CellValue::coerce`].
    pub fn from_json(value: &serde_json::Value, column: Option<&Column>) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Null,
            serde_json::Value::String(s) => CellValue::coerce(s, column),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CellValue::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    CellValue::UInt64(u)
                } else if is_integer_literal(&n.to_string()) {
                    // 128/256-bit integers; sent quoted so no digit is lost.
                    CellValue::String(n.to_string())
                } else {
                    n.as_f64()
                        .map(CellValue::Float64)
                        .unwrap_or_else(|| CellValue::String(n.to_string()))
                }
            }
            serde_json::Value::Bool(b) => CellValue::String(b.to_string()),
            other => CellValue::String(other.to_string()),
        }
    }
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Coerces every field of a text row against the column list.
pub fn coerce_row(fields: &[String], columns: &[Column]) -> Vec<CellValue> {
    fields
        .iter()
        .enumerate()
        .map(|(i, raw)| CellValue::coerce(raw, columns.get(i)))
        .collect()
}

/// Converts every cell of an inline JSON row against the column list.
pub fn convert_json_row(values: &[serde_json::Value], columns: &[Column]) -> Vec<CellValue> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| CellValue::from_json(v, columns.get(i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Vec<Column> {
        vec![
            Column::new("id", "Int32", false),
            Column::new("name", "String", false),
            Column::new("day", "Date", false),
        ]
    }

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> CellValue {
        CellValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_mixed_rows_fall_back_to_strings() {
        let columns = cols();

        let first = coerce_row(&row(&["1", "Alice", "2024-01-01"]), &columns);
        assert_eq!(
            first,
            vec![CellValue::Int64(1), CellValue::String("Alice".into()), date(2024, 1, 1)]
        );

        let second = coerce_row(&row(&["2", "Bob", "bad-date"]), &columns);
        assert_eq!(second[0], CellValue::Int64(2));
        assert_eq!(second[2], CellValue::String("bad-date".into()));

        let third = coerce_row(&row(&["x", "Carol", "2024-01-03"]), &columns);
        assert_eq!(third[0], CellValue::String("x".into()));
        assert_eq!(third[2], date(2024, 1, 3));
    }

    #[test]
    fn test_type_families() {
        assert_eq!(TypeFamily::of("UInt64"), TypeFamily::Integer);
        assert_eq!(TypeFamily::of("Nullable(Int32)"), TypeFamily::Integer);
        assert_eq!(TypeFamily::of("Float32"), TypeFamily::Float);
        assert_eq!(TypeFamily::of("DateTime"), TypeFamily::Date);
        assert_eq!(TypeFamily::of("Decimal(10, 2)"), TypeFamily::Other);
        assert_eq!(TypeFamily::of("LowCardinality(String)"), TypeFamily::Other);
    }

    #[test]
    fn test_float_coercion() {
        let col = Column::new("v", "Float64", false);
        assert_eq!(CellValue::coerce("2.5", Some(&col)), CellValue::Float64(2.5));
        assert_eq!(
            CellValue::coerce("n/a", Some(&col)),
            CellValue::String("n/a".into())
        );
    }

    #[test]
    fn test_extra_fields_stay_strings() {
        let out = coerce_row(&row(&["1", "a", "2024-01-01", "7"]), &cols());
        assert_eq!(out.len(), 4);
        assert_eq!(out[3], CellValue::String("7".into()));
    }

    #[test]
    fn test_empty_field_in_nullable_column_is_null() {
        let col = Column::new("v", "Int32", true);
        assert_eq!(CellValue::coerce("", Some(&col)), CellValue::Null);

        let col = Column::new("v", "Int32", false);
        assert_eq!(CellValue::coerce("", Some(&col)), CellValue::String(String::new()));
    }

    #[test]
    fn test_empty_string_in_nullable_text_column_is_kept() {
        let col = Column::new("note", "String", true);
        assert_eq!(CellValue::coerce("", Some(&col)), CellValue::String(String::new()));
        assert_eq!(
            CellValue::from_json(&serde_json::json!(""), Some(&col)),
            CellValue::String(String::new())
        );

        let col = Column::new("note", "Nullable(String)", true);
        assert_eq!(CellValue::coerce("", Some(&col)), CellValue::String(String::new()));

        let col = Column::new("day", "Date", true);
        assert_eq!(CellValue::coerce("", Some(&col)), CellValue::Null);
    }

    #[test]
    fn test_non_finite_floats_serialize_as_quoted_words() {
        let col = Column::new("v", "Float64", false);
        let cells: Vec<CellValue> = ["NaN", "inf", "-inf"]
            .iter()
            .map(|raw| CellValue::coerce(raw, Some(&col)))
            .collect();
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, r#"["nan","inf","-inf"]"#);
    }

    #[test]
    fn test_unsigned_values_beyond_i64_keep_every_digit() {
        let col = Column::new("id", "UInt64", false);
        let cell = CellValue::from_json(&serde_json::json!(u64::MAX), Some(&col));
        assert_eq!(cell, CellValue::UInt64(u64::MAX));
        assert_eq!(serde_json::to_string(&cell).unwrap(), "18446744073709551615");

        assert_eq!(
            CellValue::coerce("18446744073709551615", Some(&col)),
            CellValue::UInt64(u64::MAX)
        );
    }

    #[test]
    fn test_wide_integers_are_carried_as_text() {
        let col = Column::new("id", "Int128", false);
        let value: serde_json::Value =
            serde_json::from_str("170141183460469231731687303715884105727").unwrap();
        assert_eq!(
            CellValue::from_json(&value, Some(&col)),
            CellValue::String("170141183460469231731687303715884105727".into())
        );
    }

    #[test]
    fn test_integer_rejects_surrounding_whitespace() {
        let col = Column::new("v", "Int64", false);
        assert_eq!(
            CellValue::coerce(" 5", Some(&col)),
            CellValue::String(" 5".into())
        );
    }

    #[test]
    fn test_serialization() {
        let cells = vec![
            CellValue::Int64(3),
            CellValue::Float64(1.5),
            date(2024, 2, 29),
            CellValue::String("x".into()),
            CellValue::Null,
        ];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, r#"[3,1.5,"2024-02-29","x",null]"#);
    }

    #[test]
    fn test_json_cells() {
        let columns = cols();
        let values = serde_json::json!([7, "Dora", "2024-05-06"]);
        let out = convert_json_row(values.as_array().unwrap(), &columns);
        assert_eq!(out[0], CellValue::Int64(7));
        assert_eq!(out[1], CellValue::String("Dora".into()));
        assert_eq!(out[2], date(2024, 5, 6));

        let values = serde_json::json!(["12", 1.25, null]);
        let out = convert_json_row(values.as_array().unwrap(), &columns);
        assert_eq!(out[0], CellValue::Int64(12));
        assert_eq!(out[1], CellValue::Float64(1.25));
        assert_eq!(out[2], CellValue::Null);
    }
}
