//! `SqliteStore` — the SQLite implementation of the tabular store contract.
//!
//! One write-serialized connection per store. Every trait operation runs in
//! a scoped transaction: committed on success, rolled back on any error,
//! with the error propagated unchanged.

use std::sync::Mutex;

use rusqlite::{params_from_iter, Connection, Transaction};
use tracing::debug;

use tidemark_core::errors::StorageError;
use tidemark_core::predicate::Predicate;
use tidemark_core::schema::{Batch, Schema};
use tidemark_core::traits::store::TabularStore;

use crate::pragmas;
use crate::sql;

/// SQLite-backed tabular store.
pub struct SqliteStore {
    url: String,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a store for `url`: `:memory:`, a filesystem path, or an
    /// `sqlite://` URL wrapping either.
    pub fn open(url: &str) -> Result<Self, StorageError> {
        let target = url.strip_prefix("sqlite://").unwrap_or(url);
        let conn = if target == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(target)
        }
        .map_err(sql::sqe)?;
        pragmas::configure_connection(&conn)?;
        Ok(Self {
            url: url.to_string(),
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::open(":memory:")
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Scoped transaction: `f` runs against an open transaction which is
    /// committed when it returns `Ok` and rolled back on every other path.
    fn with_txn<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self.conn.lock().map_err(|_| StorageError::Transient {
            message: "store connection lock poisoned".to_string(),
        })?;
        let tx = guard.transaction().map_err(sql::sqe)?;
        let result = f(&tx)?;
        tx.commit().map_err(sql::sqe)?;
        Ok(result)
    }
}

// ─── Transaction-scoped operations ──────────────────────────────────────────

fn table_exists(tx: &Transaction<'_>, name: &str) -> Result<bool, StorageError> {
    let count: i64 = tx
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .map_err(sql::sqe)?;
    Ok(count > 0)
}

/// Declared columns of a table, in definition order, with uppercased
/// declared types. Decoding keys off the declaration.
fn table_columns(tx: &Transaction<'_>, name: &str) -> Result<Vec<(String, String)>, StorageError> {
    let mut stmt = tx
        .prepare_cached("SELECT name, type FROM pragma_table_info(?1)")
        .map_err(sql::sqe)?;
    let rows = stmt
        .query_map([name], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(sql::sqe)?;

    let mut columns = Vec::new();
    for row in rows {
        let (column, declared) = row.map_err(sql::sqe)?;
        columns.push((column, declared.to_uppercase()));
    }
    if columns.is_empty() {
        return Err(StorageError::TableMissing {
            table: name.to_string(),
        });
    }
    Ok(columns)
}

fn append_rows(tx: &Transaction<'_>, name: &str, rows: &Batch) -> Result<usize, StorageError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let insert = sql::insert_sql(name, rows.columns())?;
    let mut stmt = tx
        .prepare_cached(&insert)
        .map_err(|e| sql::map_sqlite_error(name, e))?;

    let mut count = 0;
    for row in rows.rows() {
        stmt.execute(params_from_iter(row.iter().map(sql::to_sql_value)))
            .map_err(|e| sql::map_sqlite_error(name, e))?;
        count += 1;
    }
    Ok(count)
}

fn replace_rows(tx: &Transaction<'_>, name: &str, rows: &Batch) -> Result<(), StorageError> {
    sql::check_identifier(name)?;
    tx.execute(&format!("DELETE FROM {name}"), [])
        .map_err(|e| sql::map_sqlite_error(name, e))?;
    append_rows(tx, name, rows)?;
    Ok(())
}

fn query_rows(
    tx: &Transaction<'_>,
    name: &str,
    predicate: &Predicate,
) -> Result<Batch, StorageError> {
    sql::check_identifier(name)?;
    let columns = table_columns(tx, name)?;
    let (clause, params) = sql::where_clause(predicate)?;
    let select_list = columns
        .iter()
        .map(|(column, _)| column.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let select = format!("SELECT {select_list} FROM {name}{clause}");

    let mut stmt = tx.prepare_cached(&select).map_err(sql::sqe)?;
    let mut sql_rows = stmt
        .query(params_from_iter(params))
        .map_err(sql::sqe)?;

    let mut batch = Batch::new(columns.iter().map(|(column, _)| column.clone()).collect());
    while let Some(row) = sql_rows.next().map_err(sql::sqe)? {
        let mut values = Vec::with_capacity(columns.len());
        for (index, (_, declared)) in columns.iter().enumerate() {
            let raw = row.get_ref(index).map_err(sql::sqe)?;
            values.push(sql::decode_value(raw, Some(declared.as_str())));
        }
        batch.push(values).map_err(|e| StorageError::Sqlite {
            message: e.to_string(),
        })?;
    }
    Ok(batch)
}

fn delete_rows(
    tx: &Transaction<'_>,
    name: &str,
    predicate: &Predicate,
) -> Result<usize, StorageError> {
    sql::check_identifier(name)?;
    let (clause, params) = sql::where_clause(predicate)?;
    tx.execute(
        &format!("DELETE FROM {name}{clause}"),
        params_from_iter(params),
    )
    .map_err(|e| sql::map_sqlite_error(name, e))
}

// ─── TabularStore implementation ────────────────────────────────────────────

impl TabularStore for SqliteStore {
    fn has_table(&self, name: &str) -> Result<bool, StorageError> {
        self.with_txn(|tx| table_exists(tx, name))
    }

    fn create_table(
        &self,
        name: &str,
        schema: &Schema,
        primary_key: Option<&[String]>,
    ) -> Result<(), StorageError> {
        let ddl = sql::create_table_sql(name, schema, primary_key)?;
        self.with_txn(|tx| {
            debug!(table = name, "creating table");
            tx.execute(&ddl, [])
                .map_err(|e| sql::map_sqlite_error(name, e))?;
            Ok(())
        })
    }

    fn append(&self, name: &str, rows: &Batch) -> Result<usize, StorageError> {
        self.with_txn(|tx| append_rows(tx, name, rows))
    }

    fn replace(&self, name: &str, rows: &Batch) -> Result<(), StorageError> {
        self.with_txn(|tx| replace_rows(tx, name, rows))
    }

    fn query(&self, name: &str, predicate: &Predicate) -> Result<Batch, StorageError> {
        self.with_txn(|tx| query_rows(tx, name, predicate))
    }

    fn delete(&self, name: &str, predicate: &Predicate) -> Result<usize, StorageError> {
        self.with_txn(|tx| delete_rows(tx, name, predicate))
    }

    fn drop_table(&self, name: &str) -> Result<(), StorageError> {
        sql::check_identifier(name)?;
        self.with_txn(|tx| {
            tx.execute(&format!("DROP TABLE IF EXISTS {name}"), [])
                .map_err(|e| sql::map_sqlite_error(name, e))?;
            Ok(())
        })
    }

    fn join(
        &self,
        names: &[String],
        on: &str,
        predicates: &[Predicate],
    ) -> Result<Batch, StorageError> {
        if names.is_empty() {
            return Err(StorageError::Sqlite {
                message: "join requires at least one table".to_string(),
            });
        }
        for name in names {
            sql::check_identifier(name)?;
        }
        sql::check_identifier(on)?;

        self.with_txn(|tx| {
            // Output columns: every column of the first table, then the
            // non-join columns of each subsequent table.
            let mut select_list = Vec::new();
            let mut output: Vec<(String, String)> = Vec::new();
            for (index, name) in names.iter().enumerate() {
                for (column, declared) in table_columns(tx, name)? {
                    if index > 0 && column == on {
                        continue;
                    }
                    select_list.push(format!("t{index}.{column}"));
                    output.push((column, declared));
                }
            }

            let mut from = format!("{} AS t0", names[0]);
            for (index, name) in names.iter().enumerate().skip(1) {
                from.push_str(&format!(
                    " LEFT OUTER JOIN {name} AS t{index} ON t0.{on} = t{index}.{on}"
                ));
            }

            let mut fragments = Vec::new();
            let mut params = Vec::new();
            for (index, predicate) in predicates.iter().enumerate().take(names.len()) {
                let alias = format!("t{index}");
                let (table_fragments, table_params) = sql::render_conditions(
                    predicate.conditions(),
                    Some(&alias),
                    params.len() + 1,
                )?;
                fragments.extend(table_fragments);
                params.extend(table_params);
            }
            let clause = if fragments.is_empty() {
                String::new()
            } else {
                format!(" WHERE {}", fragments.join(" AND "))
            };

            let select = format!("SELECT {} FROM {from}{clause}", select_list.join(", "));
            let mut stmt = tx.prepare(&select).map_err(sql::sqe)?;
            let mut sql_rows = stmt.query(params_from_iter(params)).map_err(sql::sqe)?;

            let mut batch =
                Batch::new(output.iter().map(|(column, _)| column.clone()).collect());
            while let Some(row) = sql_rows.next().map_err(sql::sqe)? {
                let mut values = Vec::with_capacity(output.len());
                for (index, (_, declared)) in output.iter().enumerate() {
                    let raw = row.get_ref(index).map_err(sql::sqe)?;
                    values.push(sql::decode_value(raw, Some(declared.as_str())));
                }
                batch.push(values).map_err(|e| StorageError::Sqlite {
                    message: e.to_string(),
                })?;
            }
            Ok(batch)
        })
    }

    fn append_with_meta(
        &self,
        name: &str,
        rows: &Batch,
        meta_name: &str,
        meta: &Batch,
    ) -> Result<usize, StorageError> {
        self.with_txn(|tx| {
            let appended = append_rows(tx, name, rows)?;
            replace_rows(tx, meta_name, meta)?;
            Ok(appended)
        })
    }
}
