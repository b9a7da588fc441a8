//! Schema descriptors and validated row batches.
//!
//! A `Schema` is an ordered map of column names to logical types plus an
//! optional uniqueness key. Batches crossing the ingestion boundary are
//! validated once here; downstream code only ever sees conforming rows.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::SchemaError;

/// Timestamp rendering used on the storage boundary. Fixed-width so that
/// lexicographic comparison in the store matches chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The logical column types a schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Integer,
    Real,
    Text,
    Timestamp,
    Bool,
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalType::Integer => "integer",
            LogicalType::Real => "real",
            LogicalType::Text => "text",
            LogicalType::Timestamp => "timestamp",
            LogicalType::Bool => "bool",
        };
        write!(f, "{name}")
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Bool(bool),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
            Value::Bool(_) => "bool",
        }
    }

    /// Whether this value may live in a column of the given type.
    /// `Null` conforms to every column type.
    pub fn conforms_to(&self, ty: LogicalType) -> bool {
        matches!(
            (self, ty),
            (Value::Null, _)
                | (Value::Integer(_), LogicalType::Integer)
                | (Value::Real(_), LogicalType::Real)
                | (Value::Text(_), LogicalType::Text)
                | (Value::Timestamp(_), LogicalType::Timestamp)
                | (Value::Bool(_), LogicalType::Bool)
        )
    }

    /// Canonical encoding used for uniqueness keys and parameter-tuple keys.
    /// Distinct values encode distinctly; reals encode by bit pattern.
    pub fn key_repr(&self) -> String {
        match self {
            Value::Null => "n".to_string(),
            Value::Integer(v) => format!("i:{v}"),
            Value::Real(v) => format!("r:{:016x}", v.to_bits()),
            Value::Text(v) => format!("t:{v}"),
            Value::Timestamp(v) => format!("ts:{}", v.format(TIMESTAMP_FORMAT)),
            Value::Bool(v) => format!("b:{v}"),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Timestamp(v.and_time(NaiveTime::MIN))
    }
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: LogicalType,
}

/// An ordered set of typed columns plus an optional uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
    unique_constraint: Option<Vec<String>>,
}

impl Schema {
    pub fn new<S, I>(columns: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, LogicalType)>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, ty)| Column {
                    name: name.into(),
                    ty,
                })
                .collect(),
            unique_constraint: None,
        }
    }

    pub fn with_unique_constraint<S, I>(mut self, columns: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        self.unique_constraint = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Type of a column, if declared.
    pub fn get(&self, name: &str) -> Option<LogicalType> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.ty)
    }

    pub fn unique_constraint(&self) -> Option<&[String]> {
        self.unique_constraint.as_deref()
    }

    /// Reject duplicate column names and constraints over unknown columns.
    pub fn ensure_well_formed(&self) -> Result<(), SchemaError> {
        let mut seen = FxHashSet::default();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::Conflict {
                    column: column.name.clone(),
                });
            }
        }
        if let Some(constraint) = &self.unique_constraint {
            for name in constraint {
                if self.get(name).is_none() {
                    return Err(SchemaError::MissingColumn {
                        column: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Concatenate two schemas, left columns first. Any column name shared
    /// by both sides is a configuration error. The uniqueness key is taken
    /// from the left side when declared there, else from the right.
    pub fn concat(&self, other: &Schema) -> Result<Schema, SchemaError> {
        let mut columns = self.columns.clone();
        let names: FxHashSet<&str> = self.column_names().collect();
        for column in &other.columns {
            if names.contains(column.name.as_str()) {
                return Err(SchemaError::Conflict {
                    column: column.name.clone(),
                });
            }
            columns.push(column.clone());
        }
        let combined = Schema {
            columns,
            unique_constraint: self
                .unique_constraint
                .clone()
                .or_else(|| other.unique_constraint.clone()),
        };
        combined.ensure_well_formed()?;
        Ok(combined)
    }

    /// Validate a batch: exact column match, per-cell type conformance,
    /// and no duplicate tuples on the uniqueness key. The first offending
    /// column/row is reported. Empty batches pass trivially.
    pub fn validate(&self, batch: &Batch) -> Result<(), SchemaError> {
        let expected: Vec<&str> = self.column_names().collect();
        if batch.columns().len() != expected.len()
            || !batch.columns().iter().zip(&expected).all(|(a, b)| a == b)
        {
            return Err(SchemaError::ColumnSet {
                expected: expected.iter().map(|s| s.to_string()).collect(),
                found: batch.columns().to_vec(),
            });
        }

        for (row_index, row) in batch.rows().iter().enumerate() {
            for (column, value) in self.columns.iter().zip(row) {
                if !value.conforms_to(column.ty) {
                    return Err(SchemaError::Mismatch {
                        column: column.name.clone(),
                        row: row_index,
                        expected: column.ty.to_string(),
                        found: value.type_name().to_string(),
                    });
                }
            }
        }

        if let Some(constraint) = &self.unique_constraint {
            let indices: Vec<usize> = constraint
                .iter()
                .filter_map(|name| batch.column_index(name))
                .collect();
            if indices.len() == constraint.len() {
                let mut seen: FxHashMap<String, usize> = FxHashMap::default();
                for (row_index, row) in batch.rows().iter().enumerate() {
                    let key = indices
                        .iter()
                        .map(|&i| row[i].key_repr())
                        .collect::<Vec<_>>()
                        .join("\u{1f}");
                    if seen.insert(key, row_index).is_some() {
                        let display = indices
                            .iter()
                            .map(|&i| row[i].to_string())
                            .collect::<Vec<_>>()
                            .join(", ");
                        return Err(SchemaError::DuplicateKey {
                            key: display,
                            row: row_index,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

/// An ordered batch of rows, all sharing one column list.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Batch {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// An empty batch shaped like `schema`.
    pub fn for_schema(schema: &Schema) -> Self {
        Self::new(schema.column_names().map(str::to_string).collect())
    }

    /// Build a batch from pre-assembled rows, checking arity.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, SchemaError> {
        let mut batch = Self::new(columns);
        for row in rows {
            batch.push(row)?;
        }
        Ok(batch)
    }

    /// Append one row; its arity must match the column list.
    pub fn push(&mut self, row: Vec<Value>) -> Result<(), SchemaError> {
        if row.len() != self.columns.len() {
            return Err(SchemaError::RowArity {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell lookup by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }

    /// A new batch with the given columns prepended to every row. Used by
    /// the processor to stamp parameter values onto collector output.
    pub fn prepend_columns(&self, prefix: &[(String, Value)]) -> Batch {
        let mut columns: Vec<String> = prefix.iter().map(|(name, _)| name.clone()).collect();
        columns.extend(self.columns.iter().cloned());
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut out: Vec<Value> = prefix.iter().map(|(_, value)| value.clone()).collect();
                out.extend(row.iter().cloned());
                out
            })
            .collect();
        Batch { columns, rows }
    }
}
