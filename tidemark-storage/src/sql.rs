//! SQL rendering and value conversion.
//!
//! Identifiers are validated before interpolation and every literal is
//! bound as a statement parameter, so no caller-supplied text ever reaches
//! the SQL layer unescaped.

use chrono::NaiveDateTime;
use rusqlite::types::{Value as SqlValue, ValueRef};

use tidemark_core::errors::StorageError;
use tidemark_core::predicate::{CompareOp, Condition, Predicate};
use tidemark_core::schema::{LogicalType, Schema, Value, TIMESTAMP_FORMAT};

/// Reject anything that is not a bare SQL identifier.
pub(crate) fn check_identifier(name: &str) -> Result<(), StorageError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

/// Declared column type. The declaration drives decoding on the way back
/// out, so timestamps and bools keep their logical type across a round
/// trip even though SQLite stores them as TEXT and INTEGER.
pub(crate) fn column_type(ty: LogicalType) -> &'static str {
    match ty {
        LogicalType::Integer => "INTEGER",
        LogicalType::Real => "REAL",
        LogicalType::Text => "TEXT",
        LogicalType::Timestamp => "TIMESTAMP",
        LogicalType::Bool => "BOOLEAN",
    }
}

pub(crate) fn create_table_sql(
    name: &str,
    schema: &Schema,
    primary_key: Option<&[String]>,
) -> Result<String, StorageError> {
    check_identifier(name)?;
    let mut columns = Vec::with_capacity(schema.len());
    for column in schema.columns() {
        check_identifier(&column.name)?;
        columns.push(format!("{} {}", column.name, column_type(column.ty)));
    }
    let mut body = columns.join(", ");
    if let Some(key) = primary_key {
        if !key.is_empty() {
            for column in key {
                check_identifier(column)?;
            }
            body.push_str(&format!(", PRIMARY KEY ({})", key.join(", ")));
        }
    }
    Ok(format!("CREATE TABLE IF NOT EXISTS {name} ({body})"))
}

pub(crate) fn insert_sql(name: &str, columns: &[String]) -> Result<String, StorageError> {
    check_identifier(name)?;
    for column in columns {
        check_identifier(column)?;
    }
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "INSERT INTO {name} ({}) VALUES ({placeholders})",
        columns.join(", ")
    ))
}

fn op_symbol(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Ne => "<>",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
    }
}

/// Render conditions as `col op ?N` fragments, numbering parameters from
/// `start_index`. `qualifier` prefixes column references for joins.
pub(crate) fn render_conditions(
    conditions: &[Condition],
    qualifier: Option<&str>,
    start_index: usize,
) -> Result<(Vec<String>, Vec<SqlValue>), StorageError> {
    let mut fragments = Vec::with_capacity(conditions.len());
    let mut params = Vec::with_capacity(conditions.len());
    for (offset, condition) in conditions.iter().enumerate() {
        check_identifier(&condition.column)?;
        let column = match qualifier {
            Some(alias) => format!("{alias}.{}", condition.column),
            None => condition.column.clone(),
        };
        fragments.push(format!(
            "{column} {} ?{}",
            op_symbol(condition.op),
            start_index + offset
        ));
        params.push(to_sql_value(&condition.value));
    }
    Ok((fragments, params))
}

/// Render a full `WHERE` clause (empty predicate renders nothing).
pub(crate) fn where_clause(
    predicate: &Predicate,
) -> Result<(String, Vec<SqlValue>), StorageError> {
    if predicate.is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let (fragments, params) = render_conditions(predicate.conditions(), None, 1)?;
    Ok((format!(" WHERE {}", fragments.join(" AND ")), params))
}

pub(crate) fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Real(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Timestamp(v) => SqlValue::Text(v.format(TIMESTAMP_FORMAT).to_string()),
        Value::Bool(v) => SqlValue::Integer(i64::from(*v)),
    }
}

/// Decode a raw SQLite value using the column's declared type.
pub(crate) fn decode_value(raw: ValueRef<'_>, declared: Option<&str>) -> Value {
    match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => match declared {
            Some("BOOLEAN") => Value::Bool(v != 0),
            _ => Value::Integer(v),
        },
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if declared == Some("TIMESTAMP") {
                if let Ok(ts) = NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT) {
                    return Value::Timestamp(ts);
                }
            }
            Value::Text(text)
        }
        ValueRef::Blob(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Map a rusqlite error, distinguishing constraint and contention failures.
pub(crate) fn map_sqlite_error(table: &str, error: rusqlite::Error) -> StorageError {
    use rusqlite::ErrorCode;

    if let rusqlite::Error::SqliteFailure(code, ref message) = error {
        match code.code {
            ErrorCode::ConstraintViolation => {
                return StorageError::UniqueViolation {
                    table: table.to_string(),
                    message: message.clone().unwrap_or_else(|| error.to_string()),
                };
            }
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                return StorageError::Transient {
                    message: error.to_string(),
                };
            }
            _ => {}
        }
    }
    StorageError::Sqlite {
        message: error.to_string(),
    }
}

/// Plain error mapping for statements with no constraint semantics.
pub(crate) fn sqe(error: rusqlite::Error) -> StorageError {
    map_sqlite_error("", error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_strict() {
        check_identifier("eod_prices").unwrap();
        check_identifier("_t0").unwrap();
        assert!(check_identifier("1table").is_err());
        assert!(check_identifier("drop table;--").is_err());
        assert!(check_identifier("").is_err());
    }

    #[test]
    fn create_table_renders_primary_key() {
        let schema = Schema::new([
            ("ticker", LogicalType::Text),
            ("domain", LogicalType::Text),
            ("collected_items", LogicalType::Integer),
        ]);
        let sql =
            create_table_sql("eod_metadata", &schema, Some(&["ticker".to_string()])).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS eod_metadata \
             (ticker TEXT, domain TEXT, collected_items INTEGER, PRIMARY KEY (ticker))"
        );
    }

    #[test]
    fn where_clause_numbers_parameters() {
        let predicate = tidemark_core::Predicate::equals("ticker", "SPY").and(
            "volume",
            CompareOp::Ge,
            100i64,
        );
        let (clause, params) = where_clause(&predicate).unwrap();
        assert_eq!(clause, " WHERE ticker = ?1 AND volume >= ?2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn timestamps_round_trip_through_text() {
        let ts = NaiveDateTime::parse_from_str("2021-01-05T00:00:00", TIMESTAMP_FORMAT).unwrap();
        let encoded = to_sql_value(&Value::Timestamp(ts));
        let SqlValue::Text(text) = encoded else {
            panic!("timestamp must encode as text");
        };
        let decoded = decode_value(ValueRef::Text(text.as_bytes()), Some("TIMESTAMP"));
        assert_eq!(decoded, Value::Timestamp(ts));
    }

    #[test]
    fn bools_decode_by_declared_type() {
        assert_eq!(
            decode_value(ValueRef::Integer(1), Some("BOOLEAN")),
            Value::Bool(true)
        );
        assert_eq!(decode_value(ValueRef::Integer(1), Some("INTEGER")), Value::Integer(1));
    }
}
