//! Decoding of SQL Server column values into JSON-friendly scalars.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tiberius::{Column, ColumnType, FromSql, Row};
use uuid::Uuid;

/// One cell of a result row.
///
/// Serialization is untagged, so rows render as plain JSON scalars. Decimals
/// are emitted as JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(#[serde(with = "rust_decimal::serde::float")] Decimal),
    String(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

/// Text used by the markdown and CSV renderings.
impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::String(v) => f.write_str(v),
            SqlValue::Uuid(v) => write!(f, "{}", v),
            SqlValue::Date(v) => write!(f, "{}", v),
            SqlValue::Time(v) => write!(f, "{}", v),
            SqlValue::DateTime(v) => write!(f, "{}", v),
            SqlValue::DateTimeUtc(v) => f.write_str(&v.to_rfc3339()),
            SqlValue::Bytes(v) => {
                f.write_str("0x")?;
                v.iter().try_for_each(|b| write!(f, "{:02X}", b))
            }
        }
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

/// Read column `idx` as `T`, treating NULL and conversion failures alike.
fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Option<T> {
    row.try_get::<T, _>(idx).ok().flatten()
}

/// Nullable integer columns carry their width on the wire, not in the metadata.
fn integer(row: &Row, idx: usize) -> Option<i64> {
    get::<i32>(row, idx)
        .map(i64::from)
        .or_else(|| get::<i64>(row, idx))
        .or_else(|| get::<i16>(row, idx).map(i64::from))
        .or_else(|| get::<u8>(row, idx).map(i64::from))
}

/// Decode one column of `row`, choosing the conversion from the column's wire type.
///
/// Types without a natural scalar (XML, SQL_VARIANT) are read as text when the
/// driver allows it and become [`SqlValue::Null`] otherwise; the diagnostic
/// queries CAST such values themselves.
pub fn decode_column(row: &Row, idx: usize) -> SqlValue {
    let Some(column) = row.columns().get(idx) else {
        return SqlValue::Null;
    };

    let value = match column.column_type() {
        ColumnType::Null => None,
        ColumnType::Bit | ColumnType::Bitn => get::<bool>(row, idx).map(SqlValue::Bool),
        ColumnType::Int1
        | ColumnType::Int2
        | ColumnType::Int4
        | ColumnType::Int8
        | ColumnType::Intn => integer(row, idx).map(SqlValue::Int),
        ColumnType::Float4 => get::<f32>(row, idx).map(|v| SqlValue::Float(v.into())),
        ColumnType::Float8 | ColumnType::Floatn | ColumnType::Money | ColumnType::Money4 => {
            get::<f64>(row, idx)
                .or_else(|| get::<f32>(row, idx).map(f64::from))
                .map(SqlValue::Float)
        }
        ColumnType::Decimaln | ColumnType::Numericn => {
            get::<Decimal>(row, idx).map(SqlValue::Decimal)
        }
        ColumnType::Guid => get::<Uuid>(row, idx).map(SqlValue::Uuid),
        ColumnType::Daten => get::<NaiveDate>(row, idx).map(SqlValue::Date),
        ColumnType::Timen => get::<NaiveTime>(row, idx).map(SqlValue::Time),
        ColumnType::Datetime
        | ColumnType::Datetime4
        | ColumnType::Datetimen
        | ColumnType::Datetime2 => get::<NaiveDateTime>(row, idx).map(SqlValue::DateTime),
        ColumnType::DatetimeOffsetn => get::<DateTime<Utc>>(row, idx).map(SqlValue::DateTimeUtc),
        ColumnType::BigVarBin | ColumnType::BigBinary | ColumnType::Image => {
            get::<&[u8]>(row, idx).map(|v| SqlValue::Bytes(v.to_vec()))
        }
        _ => get::<&str>(row, idx).map(|v| SqlValue::String(v.to_string())),
    };

    value.unwrap_or(SqlValue::Null)
}

/// SQL type name reported for a result column.
pub fn type_name(column: &Column) -> &'static str {
    match column.column_type() {
        ColumnType::Null => "NULL",
        ColumnType::Bit | ColumnType::Bitn => "BIT",
        ColumnType::Int1 => "TINYINT",
        ColumnType::Int2 => "SMALLINT",
        ColumnType::Int4 | ColumnType::Intn => "INT",
        ColumnType::Int8 => "BIGINT",
        ColumnType::Float4 => "REAL",
        ColumnType::Float8 | ColumnType::Floatn => "FLOAT",
        ColumnType::Money => "MONEY",
        ColumnType::Money4 => "SMALLMONEY",
        ColumnType::Decimaln => "DECIMAL",
        ColumnType::Numericn => "NUMERIC",
        ColumnType::Guid => "UNIQUEIDENTIFIER",
        ColumnType::Daten => "DATE",
        ColumnType::Timen => "TIME",
        ColumnType::Datetime | ColumnType::Datetimen => "DATETIME",
        ColumnType::Datetime4 => "SMALLDATETIME",
        ColumnType::Datetime2 => "DATETIME2",
        ColumnType::DatetimeOffsetn => "DATETIMEOFFSET",
        ColumnType::BigVarBin => "VARBINARY",
        ColumnType::BigBinary => "BINARY",
        ColumnType::Image => "IMAGE",
        ColumnType::BigVarChar => "VARCHAR",
        ColumnType::BigChar => "CHAR",
        ColumnType::NVarchar => "NVARCHAR",
        ColumnType::NChar => "NCHAR",
        ColumnType::Text => "TEXT",
        ColumnType::NText => "NTEXT",
        ColumnType::Xml => "XML",
        ColumnType::SSVariant => "SQL_VARIANT",
        _ => "UNKNOWN",
    }
}
