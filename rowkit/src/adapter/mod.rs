mod hooks;
mod options;

pub use hooks::Interceptor;
pub use options::{ConnectOptions, FindOptions};

use crate::criteria::Condition;
use crate::error::{Result, ResultExt, RowkitError};
use crate::schema::{normalize_name, ColumnDescriptor, ColumnType, TableSchema, ROWID};
use crate::statement::{self, bind_token, param_name};
use crate::value::{Params, Row, Value};
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Statement};
use std::collections::HashMap;

/// Column stamped on insert when the caller leaves it unset.
pub const CREATED_AT: &str = "CREATED_AT";
/// Column stamped on update when the caller leaves it unset.
pub const UPDATED_AT: &str = "UPDATED_AT";

type BoundParams = Vec<(String, SqlValue)>;

/// Persistence adapter over a single SQLite connection.
///
/// Starts disconnected. Every operation other than `connect`/`disconnect`
/// fails with [`RowkitError::NotConnected`] until `connect` succeeds. Calls are
/// synchronous and the adapter is not `Sync`; share it across threads only
/// behind a mutex.
pub struct Adapter {
    conn: Option<Connection>,
    logging: bool,
}

impl Default for Adapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter {
    pub fn new() -> Self {
        Adapter {
            conn: None,
            logging: false,
        }
    }

    /// Create an adapter and connect it in one step.
    pub fn open(options: &ConnectOptions) -> Result<Self> {
        let mut adapter = Adapter::new();
        adapter.connect(options)?;
        Ok(adapter)
    }

    /// Open the storage file. On failure the adapter stays disconnected.
    pub fn connect(&mut self, options: &ConnectOptions) -> Result<()> {
        let path = options.path.display().to_string();
        let connect_err = |source| RowkitError::Connect {
            path: path.clone(),
            source,
        };

        let conn = Connection::open(&options.path).map_err(connect_err)?;
        if let Some(key) = &options.key {
            if let Some(cipher) = &options.cipher {
                conn.pragma_update(None, "cipher", cipher.as_str())
                    .map_err(connect_err)?;
            }
            conn.pragma_update(None, "key", key.as_str())
                .map_err(connect_err)?;
        }

        if self.conn.is_some() {
            self.disconnect();
        }
        self.conn = Some(conn);
        self.logging = options.logging;
        log::debug!("Connected to {path}");
        Ok(())
    }

    /// Close the connection. Always leaves the adapter disconnected.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                log::warn!("Error while closing connection: {e}");
            }
            log::debug!("Disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn set_logging(&mut self, logging: bool) {
        self.logging = logging;
    }

    fn conn(&self, operation: &'static str) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or(RowkitError::NotConnected { operation })
    }

    fn log_statement(&self, operation: &str, sql: &str, params: &BoundParams) {
        if self.logging {
            log::info!(target: "rowkit::sql", "{operation}: {sql} {params:?}");
        }
    }

    // ── Statement execution ──────────────────────────────────────────

    fn run(&self, operation: &'static str, sql: &str, params: &BoundParams) -> Result<usize> {
        let conn = self.conn(operation)?;
        self.log_statement(operation, sql, params);
        let mut stmt = conn.prepare(sql).during(operation)?;
        bind_params(&mut stmt, params).during(operation)?;
        stmt.raw_execute().during(operation)
    }

    fn fetch<'a, F>(
        &self,
        operation: &'static str,
        sql: &str,
        params: &BoundParams,
        lookup: F,
    ) -> Result<Vec<Row>>
    where
        F: Fn(&str) -> Option<&'a ColumnDescriptor>,
    {
        let conn = self.conn(operation)?;
        self.log_statement(operation, sql, params);
        let mut stmt = conn.prepare(sql).during(operation)?;
        bind_params(&mut stmt, params).during(operation)?;

        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let columns: Vec<Option<&ColumnDescriptor>> = names.iter().map(|n| lookup(n.as_str())).collect();

        let mut rows = stmt.raw_query();
        let mut results = Vec::new();
        while let Some(raw) = rows.next().during(operation)? {
            let mut row = Row::new();
            for (i, (name, column)) in names.iter().zip(&columns).enumerate() {
                let value = raw.get::<_, SqlValue>(i).during(operation)?;
                let key = match column {
                    Some(c) => c.name.clone(),
                    None if name.eq_ignore_ascii_case(ROWID) => ROWID.to_string(),
                    None => name.clone(),
                };
                row.insert(key, Value::from_storage(value, column.map(|c| c.column_type)));
            }
            results.push(row);
        }
        Ok(results)
    }

    fn fetch_by_id(
        &self,
        operation: &'static str,
        schema: &TableSchema,
        id: &Value,
    ) -> Result<Option<Row>> {
        let sql = statement::find_by_id(schema);
        let params = vec![(param_name(schema.identifier()), id.to_storage())];
        let rows = self.fetch(operation, &sql, &params, |name| schema.column(name))?;
        Ok(rows.into_iter().next())
    }

    // ── Table lifecycle ──────────────────────────────────────────────

    /// Create the table and its indexes if they do not exist yet.
    pub fn create_table(&self, schema: &TableSchema) -> Result<()> {
        for sql in statement::create_table(schema) {
            self.run("create_table", &sql, &Vec::new())?;
        }
        Ok(())
    }

    pub fn drop_table(&self, schema: &TableSchema) -> Result<()> {
        self.run("drop_table", &statement::drop_table(schema), &Vec::new())?;
        Ok(())
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Insert a row and return it as stored, including engine-assigned values.
    pub fn insert(
        &self,
        schema: &TableSchema,
        values: Row,
        mut hooks: Option<&mut dyn Interceptor>,
    ) -> Result<Row> {
        const OP: &str = "insert";
        let conn = self.conn(OP)?;

        let mut values = values;
        if let Some(h) = hooks.as_mut() {
            h.before_insert(&mut values).map_err(|e| vetoed(OP, e))?;
        }

        let mut values = known_columns(schema, values);
        stamp(schema, &mut values, CREATED_AT);
        for column in schema.columns().iter().filter(|c| c.is_auto_timestamp()) {
            stamp(schema, &mut values, &column.name);
        }

        let sql = statement::insert(schema, &values)?;
        let affected = self.run(OP, &sql, &bound(&values))?;
        if affected != 1 {
            return Err(RowkitError::InsertFailed {
                table: schema.name().to_string(),
                affected,
            });
        }

        let id = match schema.primary_key().and_then(|pk| values.get(&pk.name)) {
            Some(id) if !id.is_null() => id.clone(),
            _ => Value::Integer(conn.last_insert_rowid()),
        };
        let row = self.fetch_by_id(OP, schema, &id)?.ok_or_else(|| RowkitError::InsertFailed {
            table: schema.name().to_string(),
            affected: 0,
        })?;

        if let Some(h) = hooks.as_mut() {
            h.after_insert(&row);
        }
        Ok(row)
    }

    /// Update the row selected by the identifier in `values` and return it
    /// as stored.
    pub fn update(
        &self,
        schema: &TableSchema,
        values: Row,
        mut hooks: Option<&mut dyn Interceptor>,
    ) -> Result<Row> {
        const OP: &str = "update";
        self.conn(OP)?;

        let mut values = values;
        if let Some(h) = hooks.as_mut() {
            h.before_update(&mut values).map_err(|e| vetoed(OP, e))?;
        }

        let id = values
            .get(schema.identifier())
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| RowkitError::MissingIdentifier {
                table: schema.name().to_string(),
                column: schema.identifier().to_string(),
            })?;

        let mut values = known_columns(schema, values);
        values.insert(schema.identifier(), id.clone());
        stamp(schema, &mut values, UPDATED_AT);

        let sql = statement::update(schema, &values)?;
        let affected = self.run(OP, &sql, &bound(&values))?;
        if affected != 1 {
            return Err(RowkitError::UpdateFailed {
                table: schema.name().to_string(),
                affected,
            });
        }

        let row = self
            .fetch_by_id(OP, schema, &id)?
            .ok_or_else(|| RowkitError::UpdateFailed {
                table: schema.name().to_string(),
                affected: 0,
            })?;

        if let Some(h) = hooks.as_mut() {
            h.after_update(&row);
        }
        Ok(row)
    }

    /// Delete one row by identifier. Returns whether exactly one row went away.
    pub fn delete(
        &self,
        schema: &TableSchema,
        id: impl Into<Value>,
        mut hooks: Option<&mut dyn Interceptor>,
    ) -> Result<bool> {
        const OP: &str = "delete";
        self.conn(OP)?;

        let id = id.into();
        if let Some(h) = hooks.as_mut() {
            h.before_delete(&id).map_err(|e| vetoed(OP, e))?;
        }

        let sql = statement::delete(schema);
        let params = vec![(param_name(schema.identifier()), id.to_storage())];
        let deleted = self.run(OP, &sql, &params)? == 1;

        if let Some(h) = hooks.as_mut() {
            h.after_delete(deleted);
        }
        Ok(deleted)
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn find_by_id(&self, schema: &TableSchema, id: impl Into<Value>) -> Result<Option<Row>> {
        self.fetch_by_id("find_by_id", schema, &id.into())
    }

    /// First row whose `column` equals `value`.
    pub fn find_by_column(
        &self,
        schema: &TableSchema,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Row>> {
        let options = FindOptions::new().filter(&Condition::eq(column, value))?;
        self.find_one(schema, options)
    }

    /// Like `find_many` with `LIMIT 1`. Zero matches is `Ok(None)`.
    pub fn find_one(&self, schema: &TableSchema, options: FindOptions) -> Result<Option<Row>> {
        let options = FindOptions {
            limit: Some(1),
            ..options
        };
        Ok(self.find_many(schema, &options)?.into_iter().next())
    }

    pub fn find_many(&self, schema: &TableSchema, options: &FindOptions) -> Result<Vec<Row>> {
        const OP: &str = "find_many";
        self.conn(OP)?;
        let sql = statement::select(
            schema,
            options.where_clause.as_deref(),
            &options.order_by,
            options.limit,
            options.offset,
        )?;
        self.fetch(OP, &sql, &bound_params(&options.params), |name| {
            schema.column(name)
        })
    }

    // ── Escape hatches ───────────────────────────────────────────────

    /// Run an arbitrary statement and return the affected-row count.
    pub fn execute(&self, sql: &str, params: &Params) -> Result<usize> {
        self.run("execute", sql, &bound_params(params))
    }

    /// Run an arbitrary query, coercing result columns found in `columns`.
    pub fn query(
        &self,
        sql: &str,
        params: &Params,
        columns: &[ColumnDescriptor],
    ) -> Result<Vec<Row>> {
        let by_name: HashMap<String, &ColumnDescriptor> =
            columns.iter().map(|c| (c.sql_name(), c)).collect();
        self.fetch("query", sql, &bound_params(params), |name| {
            by_name.get(&normalize_name(name)).copied()
        })
    }
}

impl Drop for Adapter {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn bind_params(stmt: &mut Statement<'_>, params: &BoundParams) -> rusqlite::Result<()> {
    for (name, value) in params {
        let token = bind_token(name);
        let index = stmt
            .parameter_index(&token)?
            .ok_or_else(|| rusqlite::Error::InvalidParameterName(token.clone()))?;
        stmt.raw_bind_parameter(index, value)?;
    }
    Ok(())
}

fn bound_params(params: &Params) -> BoundParams {
    params
        .iter()
        .map(|(name, value)| (param_name(name), value.to_storage()))
        .collect()
}

fn bound(values: &Row) -> BoundParams {
    values
        .iter()
        .map(|(name, value)| (param_name(name), value.to_storage()))
        .collect()
}

fn vetoed(operation: &str, err: RowkitError) -> RowkitError {
    log::warn!("{operation} vetoed by interceptor: {err}");
    err
}

/// Keep only keys naming a declared column, renamed to the declared column
/// name. Unknown keys are dropped.
fn known_columns(schema: &TableSchema, values: Row) -> Row {
    values
        .into_iter()
        .filter_map(|(key, value)| match schema.column(&key) {
            Some(column) => Some((column.name.clone(), value)),
            None => {
                log::trace!("Ignoring unknown column '{key}' for {}", schema.name());
                None
            }
        })
        .collect()
}

/// Set a column to the current time when the table has it and the caller
/// left it unset.
fn stamp(schema: &TableSchema, values: &mut Row, column: &str) {
    let Some(column) = schema.column(column) else {
        return;
    };
    if values.get(&column.name).is_some_and(|v| !v.is_null()) {
        return;
    }
    let now = Utc::now();
    let value = match column.column_type {
        ColumnType::Date => Value::Date(now.date_naive()),
        ColumnType::Time => Value::Time(now.time()),
        _ => Value::Timestamp(now),
    };
    values.insert(column.name.clone(), value);
}
