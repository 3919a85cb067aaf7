use crate::error::MssqlError;
use crate::types::{AttributeType, Value};

#[inline]
pub(crate) fn attribute_type_from_str(type_name: &str) -> AttributeType {
    let s = type_name.trim();
    // Strip a length/precision suffix such as `nvarchar(255)` or `decimal(10,2)`.
    let base = s.split_once('(').map_or(s, |(base, _)| base).trim();

    if base.eq_ignore_ascii_case("char")
        || base.eq_ignore_ascii_case("varchar")
        || base.eq_ignore_ascii_case("text")
        || base.eq_ignore_ascii_case("nchar")
        || base.eq_ignore_ascii_case("nvarchar")
        || base.eq_ignore_ascii_case("ntext")
        || base.eq_ignore_ascii_case("uniqueidentifier")
        || base.eq_ignore_ascii_case("date")
        || base.eq_ignore_ascii_case("datetime")
        || base.eq_ignore_ascii_case("datetime2")
        || base.eq_ignore_ascii_case("smalldatetime")
        || base.eq_ignore_ascii_case("datetimeoffset")
        || base.eq_ignore_ascii_case("time")
    {
        AttributeType::String
    } else if base.eq_ignore_ascii_case("bit")
        || base.eq_ignore_ascii_case("tinyint")
        || base.eq_ignore_ascii_case("smallint")
        || base.eq_ignore_ascii_case("int")
        || base.eq_ignore_ascii_case("bigint")
    {
        AttributeType::Integer
    } else if base.eq_ignore_ascii_case("float")
        || base.eq_ignore_ascii_case("real")
        || base.eq_ignore_ascii_case("decimal")
        || base.eq_ignore_ascii_case("numeric")
        || base.eq_ignore_ascii_case("money")
        || base.eq_ignore_ascii_case("smallmoney")
    {
        AttributeType::Double
    } else if base.eq_ignore_ascii_case("geometry") {
        AttributeType::Geometry
    } else if base.eq_ignore_ascii_case("geography") {
        AttributeType::Geography
    } else {
        AttributeType::Unknown(s.to_string())
    }
}

impl AttributeType {
    /// Map a SQL Server type name (as reported by `INFORMATION_SCHEMA.COLUMNS`)
    /// to the attribute type the cursor reads it as.
    pub fn from_sql_type_name(type_name: &str) -> Self {
        attribute_type_from_str(type_name)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl TryFrom<Value> for String {
    type Error = MssqlError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(value) => Ok(value),
            other => Err(MssqlError::ValueTypeMismatch {
                expected: "string",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = MssqlError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Integer(value) => Ok(value),
            other => Err(MssqlError::ValueTypeMismatch {
                expected: "integer",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = MssqlError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Double(value) => Ok(value),
            Value::Integer(value) => Ok(value as f64),
            other => Err(MssqlError::ValueTypeMismatch {
                expected: "double",
                actual: other.type_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::attribute_type_from_str;
    use crate::types::{AttributeType, Value};

    #[test]
    fn maps_sql_server_type_names() {
        assert_eq!(attribute_type_from_str("nvarchar(255)"), AttributeType::String);
        assert_eq!(attribute_type_from_str("INT"), AttributeType::Integer);
        assert_eq!(attribute_type_from_str("bigint"), AttributeType::Integer);
        assert_eq!(attribute_type_from_str("decimal(10, 2)"), AttributeType::Double);
        assert_eq!(attribute_type_from_str("geometry"), AttributeType::Geometry);
        assert_eq!(attribute_type_from_str("Geography"), AttributeType::Geography);
        assert_eq!(
            attribute_type_from_str("varbinary(max)"),
            AttributeType::Unknown("varbinary(max)".to_string())
        );
    }

    #[test]
    fn value_conversions_check_types() {
        let name: String = Value::from("alpha").try_into().expect("string");
        assert_eq!(name, "alpha");

        let widened: f64 = Value::from(3_i64).try_into().expect("integer widens");
        assert_eq!(widened, 3.0);

        let err = i64::try_from(Value::from(1.5)).expect_err("double is not integer");
        assert!(matches!(
            err,
            crate::MssqlError::ValueTypeMismatch {
                expected: "integer",
                actual: "double"
            }
        ));
    }
}
