//! 字段值模型
//!
//! `Value` 是记录字段与绑定参数的统一表示，`Row` 是一行数据（列名 -> 值，保持列顺序）。

use crate::error::{Result, SqlxActiveError};
use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

/// 一行数据：列名到值的有序映射
pub type Row = IndexMap<String, Value>;

/// 构造一行数据
///
/// ```rust,ignore
/// let fields = row! { "username" => "alice", "age" => 30 };
/// ```
#[macro_export]
macro_rules! row {
    () => {
        $crate::value::Row::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::value::Row::new();
        $(
            row.insert(::std::string::String::from($key), $crate::value::Value::from($value));
        )+
        row
    }};
}

/// 字段值 / 绑定值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    /// 数组列，或 has_many 关联的结果
    Array(Vec<Value>),
    /// 嵌套的一行，belongs_to 关联的结果
    Row(Row),
}

impl Value {
    /// 值类型名称，用于错误信息
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
            Value::Json(_) => "json",
            Value::Array(_) => "array",
            Value::Row(_) => "row",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// 主键是否为"空"：NULL、0 或空字符串都表示记录尚未持久化
    pub fn is_blank_id(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Int(i) => *i == 0,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_row(&self) -> Option<&Row> {
        match self {
            Value::Row(row) => Some(row),
            _ => None,
        }
    }

    fn mismatch(expected: &'static str, found: &Value) -> SqlxActiveError {
        SqlxActiveError::TypeMismatch {
            expected,
            found: found.type_name().to_string(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i16> for Value {
    fn from(i: i16) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f as f64)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self {
        Value::Timestamp(t.and_utc())
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

impl From<Row> for Value {
    fn from(row: Row) -> Self {
        Value::Row(row)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

/// 从 `Value` 解码为具体的 Rust 类型，由 derive(Model) 生成的 `set_field` 使用
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(Value::mismatch("bool", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(Value::mismatch("i64", &other)),
        }
    }
}

macro_rules! impl_from_value_narrow_int {
    ($ty:ty, $name:literal) => {
        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Int(i) => <$ty>::try_from(i).map_err(|_| SqlxActiveError::TypeMismatch {
                        expected: $name,
                        found: format!("int {} out of range", i),
                    }),
                    other => Err(Value::mismatch($name, &other)),
                }
            }
        }
    };
}

impl_from_value_narrow_int!(i32, "i32");
impl_from_value_narrow_int!(i16, "i16");

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(Value::mismatch("f64", &other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(Value::mismatch("String", &other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(t) => Ok(t),
            other => Err(Value::mismatch("DateTime<Utc>", &other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(t) => Ok(t.naive_utc()),
            other => Err(Value::mismatch("NaiveDateTime", &other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Json(j) => Ok(j),
            Value::Null => Ok(serde_json::Value::Null),
            other => Err(Value::mismatch("serde_json::Value", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(Value::mismatch("array", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_id() {
        assert!(Value::Null.is_blank_id());
        assert!(Value::Int(0).is_blank_id());
        assert!(Value::from("").is_blank_id());
        assert!(!Value::Int(7).is_blank_id());
        assert!(!Value::from("abc").is_blank_id());
    }

    #[test]
    fn test_option_conversion() {
        let none: Option<i64> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some(3i32)), Value::Int(3));

        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(Value::from("a")).unwrap(),
            Some("a".to_string())
        );
    }

    #[test]
    fn test_narrowing_is_range_checked() {
        assert_eq!(i32::from_value(Value::Int(42)).unwrap(), 42);
        assert!(matches!(
            i16::from_value(Value::Int(i64::MAX)),
            Err(SqlxActiveError::TypeMismatch { expected: "i16", .. })
        ));
    }

    #[test]
    fn test_null_only_decodes_into_option() {
        assert!(String::from_value(Value::Null).is_err());
        assert!(i64::from_value(Value::from("1")).is_err());
    }

    #[test]
    fn test_int_widens_to_float() {
        assert_eq!(f64::from_value(Value::Int(2)).unwrap(), 2.0);
    }

    #[test]
    fn test_serialize_row_as_plain_json() {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::Int(1));
        row.insert("username".to_string(), Value::from("alice"));
        row.insert("bio".to_string(), Value::Null);
        row.insert("articles".to_string(), Value::Array(vec![]));
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 1, "username": "alice", "bio": null, "articles": []})
        );
    }
}
