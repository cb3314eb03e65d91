//! Reading driver rows as strings, integers and booleans.
//!
//! # Architecture
//!
//! Decoding uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders extract the value for that category
//!
//! Row transformers only ever see the [`RowReader`] trait, so they work the
//! same across drivers. A value of a known type that fails to decode is a
//! [`StoreError::DataDecode`]. A column type with no text form (arrays,
//! geometric types, ...) is read as NULL with a warning.

use crate::error::{StoreError, StoreResult};
use crate::models::Dialect;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::warn;

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Timestamp,
    TimestampTz,
    Date,
    Time,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, dialect: Dialect) -> TypeCategory {
    let lower = type_name.to_lowercase();
    let base = lower.trim_end_matches(" unsigned");

    match base {
        "bool" | "boolean" => TypeCategory::Boolean,
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2" | "int4"
        | "int8" | "serial" | "smallserial" | "bigserial" => TypeCategory::Integer,
        "real" | "float" | "float4" | "float8" | "double" | "double precision" => {
            TypeCategory::Float
        }
        // SQLite's NUMERIC affinity stores floats
        "decimal" | "numeric" if dialect == Dialect::SQLite => TypeCategory::Float,
        "decimal" | "numeric" => TypeCategory::Decimal,
        "json" | "jsonb" => TypeCategory::Json,
        "uuid" => TypeCategory::Uuid,
        "bytea" | "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
            TypeCategory::Binary
        }
        "timestamptz" => TypeCategory::TimestampTz,
        "timestamp" | "datetime" => TypeCategory::Timestamp,
        "date" => TypeCategory::Date,
        "time" => TypeCategory::Time,
        _ => TypeCategory::Text,
    }
}

// =============================================================================
// Value Parsing
// =============================================================================

/// Render binary data as text: UTF-8 when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> String {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => STANDARD.encode(bytes),
    }
}

/// Parse a textual value as an integer. Integral floats ("5.0") are accepted.
pub fn parse_int(value: &str) -> StoreResult<i64> {
    let trimmed = value.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(v);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(v as i64),
        _ => Err(StoreError::data_decode(format!(
            "'{}' is not an integer",
            value
        ))),
    }
}

/// Parse a textual value as a boolean.
pub fn parse_bool(value: &str) -> StoreResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err(StoreError::data_decode(format!(
            "'{}' is not a boolean",
            value
        ))),
    }
}

// =============================================================================
// Row Reader Trait
// =============================================================================

/// Uniform, index-based access to a result row.
///
/// The required methods read non-NULL values; the provided `read_*` methods
/// check for NULL first and convert across categories.
pub trait RowReader {
    /// Column labels in result-set order.
    fn column_labels(&self) -> Vec<String>;

    fn is_null(&self, idx: usize) -> StoreResult<bool>;

    fn category(&self, idx: usize) -> StoreResult<TypeCategory>;

    fn integer(&self, idx: usize) -> StoreResult<i64>;

    fn boolean(&self, idx: usize) -> StoreResult<bool>;

    /// Text form of a non-NULL value; `None` when the type has none.
    fn text(&self, idx: usize) -> StoreResult<Option<String>>;

    fn read_string(&self, idx: usize) -> StoreResult<Option<String>> {
        if self.is_null(idx)? {
            return Ok(None);
        }
        self.text(idx)
    }

    fn read_int(&self, idx: usize) -> StoreResult<Option<i64>> {
        if self.is_null(idx)? {
            return Ok(None);
        }
        let value = match self.category(idx)? {
            TypeCategory::Integer => self.integer(idx)?,
            TypeCategory::Boolean => i64::from(self.boolean(idx)?),
            _ => match self.text(idx)? {
                Some(text) => parse_int(&text)?,
                None => return Ok(None),
            },
        };
        Ok(Some(value))
    }

    fn read_bool(&self, idx: usize) -> StoreResult<Option<bool>> {
        if self.is_null(idx)? {
            return Ok(None);
        }
        let value = match self.category(idx)? {
            TypeCategory::Boolean => self.boolean(idx)?,
            TypeCategory::Integer => self.integer(idx)? != 0,
            _ => match self.text(idx)? {
                Some(text) => parse_bool(&text)?,
                None => return Ok(None),
            },
        };
        Ok(Some(value))
    }
}

impl_row_reader!(PgRow, postgres);
impl_row_reader!(MySqlRow, mysql);
impl_row_reader!(SqliteRow, sqlite);

fn column_type_name<R: Row>(row: &R, idx: usize) -> StoreResult<String> {
    row.columns()
        .get(idx)
        .map(|col| col.type_info().name().to_string())
        .ok_or_else(|| {
            StoreError::data_decode(format!(
                "Column index {} out of bounds (len: {})",
                idx,
                row.len()
            ))
        })
}

/// Fallback for types outside the known categories: their `String` decoding,
/// or `None` when the driver has no text form for them.
fn text_or_unreadable<R>(row: &R, idx: usize) -> Option<String>
where
    R: Row,
    usize: sqlx::ColumnIndex<R>,
    String: for<'r> sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    match row.try_get::<String, _>(idx) {
        Ok(value) => Some(value),
        Err(e) => {
            let type_name = row
                .columns()
                .get(idx)
                .map(|col| col.type_info().name().to_string())
                .unwrap_or_default();
            warn!(
                column = idx,
                type_name = %type_name,
                error = %e,
                "Column type has no text form, reading as NULL"
            );
            None
        }
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod postgres {
    use super::*;
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use ipnet::IpNet;
    use rust_decimal::Decimal;
    use sqlx::postgres::PgTypeKind;
    use sqlx::postgres::types::{PgInterval, PgMoney, PgTimeTz};

    /// `lc_monetary` in the C locale uses two fractional digits.
    const MONEY_FRACTION_DIGITS: u32 = 2;

    pub fn category(row: &PgRow, idx: usize) -> StoreResult<TypeCategory> {
        Ok(categorize_type(
            &column_type_name(row, idx)?,
            Dialect::PostgreSQL,
        ))
    }

    pub fn integer(row: &PgRow, idx: usize) -> StoreResult<i64> {
        let value = match column_type_name(row, idx)?.as_str() {
            "INT2" => i64::from(row.try_get::<i16, _>(idx)?),
            "INT4" => i64::from(row.try_get::<i32, _>(idx)?),
            _ => row.try_get::<i64, _>(idx)?,
        };
        Ok(value)
    }

    pub fn boolean(row: &PgRow, idx: usize) -> StoreResult<bool> {
        Ok(row.try_get::<bool, _>(idx)?)
    }

    pub fn text(row: &PgRow, idx: usize) -> StoreResult<Option<String>> {
        let type_name = column_type_name(row, idx)?;
        let value = match categorize_type(&type_name, Dialect::PostgreSQL) {
            TypeCategory::Integer => integer(row, idx)?.to_string(),
            TypeCategory::Boolean => boolean(row, idx)?.to_string(),
            TypeCategory::Float => match type_name.as_str() {
                "FLOAT4" => row.try_get::<f32, _>(idx)?.to_string(),
                _ => row.try_get::<f64, _>(idx)?.to_string(),
            },
            TypeCategory::Decimal => row.try_get::<Decimal, _>(idx)?.to_string(),
            TypeCategory::Binary => decode_binary_value(&row.try_get::<Vec<u8>, _>(idx)?),
            TypeCategory::Json => row.try_get::<serde_json::Value, _>(idx)?.to_string(),
            TypeCategory::Uuid => row.try_get::<uuid::Uuid, _>(idx)?.to_string(),
            TypeCategory::Timestamp => row.try_get::<NaiveDateTime, _>(idx)?.to_string(),
            TypeCategory::TimestampTz => row.try_get::<DateTime<Utc>, _>(idx)?.to_rfc3339(),
            TypeCategory::Date => row.try_get::<NaiveDate, _>(idx)?.to_string(),
            TypeCategory::Time => row.try_get::<NaiveTime, _>(idx)?.to_string(),
            TypeCategory::Text => return other_text(row, idx, &type_name),
        };
        Ok(Some(value))
    }

    /// Text columns plus the PostgreSQL types without a category of their own.
    fn other_text(row: &PgRow, idx: usize, type_name: &str) -> StoreResult<Option<String>> {
        let value = match type_name {
            "INET" => {
                // Host addresses print without their full-length prefix.
                let net = row.try_get::<IpNet, _>(idx)?;
                if net.prefix_len() == net.max_prefix_len() {
                    net.addr().to_string()
                } else {
                    net.to_string()
                }
            }
            "CIDR" => row.try_get::<IpNet, _>(idx)?.to_string(),
            "INTERVAL" => format_interval(&row.try_get::<PgInterval, _>(idx)?),
            "MONEY" => row
                .try_get::<PgMoney, _>(idx)?
                .to_decimal(MONEY_FRACTION_DIGITS)
                .to_string(),
            "TIMETZ" => {
                let value = row.try_get::<PgTimeTz<NaiveTime, FixedOffset>, _>(idx)?;
                format!("{}{}", value.time, value.offset)
            }
            // Enum labels travel as UTF-8 text.
            _ if is_enum(row, idx) => row.try_get_unchecked::<String, _>(idx)?,
            _ => return Ok(text_or_unreadable(row, idx)),
        };
        Ok(Some(value))
    }

    fn is_enum(row: &PgRow, idx: usize) -> bool {
        row.columns()
            .get(idx)
            .is_some_and(|col| matches!(col.type_info().kind(), PgTypeKind::Enum(_)))
    }

    /// Render an interval the way PostgreSQL's default output style does.
    pub(super) fn format_interval(interval: &PgInterval) -> String {
        let mut parts = Vec::new();
        let years = interval.months / 12;
        let months = interval.months % 12;
        if years != 0 {
            parts.push(plural(years.into(), "year", "years"));
        }
        if months != 0 {
            parts.push(plural(months.into(), "mon", "mons"));
        }
        if interval.days != 0 {
            parts.push(plural(interval.days.into(), "day", "days"));
        }

        let micros = interval.microseconds;
        if micros != 0 || parts.is_empty() {
            let sign = if micros < 0 { "-" } else { "" };
            let abs = micros.unsigned_abs();
            let secs = abs / 1_000_000;
            let frac = abs % 1_000_000;
            let mut clock = format!(
                "{}{:02}:{:02}:{:02}",
                sign,
                secs / 3600,
                (secs / 60) % 60,
                secs % 60
            );
            if frac != 0 {
                let digits = format!("{:06}", frac);
                clock.push('.');
                clock.push_str(digits.trim_end_matches('0'));
            }
            parts.push(clock);
        }
        parts.join(" ")
    }

    fn plural(n: i64, one: &str, many: &str) -> String {
        format!("{} {}", n, if n == 1 { one } else { many })
    }
}

mod mysql {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use rust_decimal::Decimal;

    pub fn category(row: &MySqlRow, idx: usize) -> StoreResult<TypeCategory> {
        Ok(categorize_type(&column_type_name(row, idx)?, Dialect::MySQL))
    }

    fn is_unsigned(row: &MySqlRow, idx: usize) -> StoreResult<bool> {
        Ok(column_type_name(row, idx)?.ends_with("UNSIGNED"))
    }

    pub fn integer(row: &MySqlRow, idx: usize) -> StoreResult<i64> {
        if is_unsigned(row, idx)? {
            let value = row.try_get::<u64, _>(idx)?;
            return i64::try_from(value).map_err(|_| {
                StoreError::data_decode(format!("Unsigned value {} does not fit in i64", value))
            });
        }
        Ok(row.try_get::<i64, _>(idx)?)
    }

    pub fn boolean(row: &MySqlRow, idx: usize) -> StoreResult<bool> {
        Ok(row.try_get::<bool, _>(idx)?)
    }

    pub fn text(row: &MySqlRow, idx: usize) -> StoreResult<Option<String>> {
        let value = match category(row, idx)? {
            TypeCategory::Integer if is_unsigned(row, idx)? => {
                row.try_get::<u64, _>(idx)?.to_string()
            }
            TypeCategory::Integer => row.try_get::<i64, _>(idx)?.to_string(),
            TypeCategory::Boolean => boolean(row, idx)?.to_string(),
            TypeCategory::Float => match column_type_name(row, idx)?.as_str() {
                "FLOAT" => row.try_get::<f32, _>(idx)?.to_string(),
                _ => row.try_get::<f64, _>(idx)?.to_string(),
            },
            TypeCategory::Decimal => row.try_get::<Decimal, _>(idx)?.to_string(),
            // Binary collations report VARCHAR/TEXT columns as VARBINARY/BLOB
            TypeCategory::Binary => decode_binary_value(&row.try_get::<Vec<u8>, _>(idx)?),
            TypeCategory::Json => row.try_get::<serde_json::Value, _>(idx)?.to_string(),
            TypeCategory::Timestamp | TypeCategory::TimestampTz => {
                row.try_get::<NaiveDateTime, _>(idx)?.to_string()
            }
            TypeCategory::Date => row.try_get::<NaiveDate, _>(idx)?.to_string(),
            TypeCategory::Time => row.try_get::<NaiveTime, _>(idx)?.to_string(),
            TypeCategory::Uuid | TypeCategory::Text => return Ok(text_or_unreadable(row, idx)),
        };
        Ok(Some(value))
    }
}

mod sqlite {
    use super::*;

    /// SQLite is dynamically typed; classify by the value's storage class.
    pub fn category(row: &SqliteRow, idx: usize) -> StoreResult<TypeCategory> {
        let raw = row.try_get_raw(idx)?;
        Ok(categorize_type(raw.type_info().name(), Dialect::SQLite))
    }

    pub fn integer(row: &SqliteRow, idx: usize) -> StoreResult<i64> {
        Ok(row.try_get::<i64, _>(idx)?)
    }

    pub fn boolean(row: &SqliteRow, idx: usize) -> StoreResult<bool> {
        Ok(row.try_get::<bool, _>(idx)?)
    }

    pub fn text(row: &SqliteRow, idx: usize) -> StoreResult<Option<String>> {
        let value = match category(row, idx)? {
            TypeCategory::Integer | TypeCategory::Boolean => integer(row, idx)?.to_string(),
            TypeCategory::Float | TypeCategory::Decimal => row.try_get::<f64, _>(idx)?.to_string(),
            TypeCategory::Binary => decode_binary_value(&row.try_get::<Vec<u8>, _>(idx)?),
            _ => return Ok(text_or_unreadable(row, idx)),
        };
        Ok(Some(value))
    }
}
