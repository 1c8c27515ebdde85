//! SQL text generation from table metadata.
//!
//! All identifiers and bind tokens are emitted uppercase, so `emailAddress`,
//! `EmailAddress` and `EMAILADDRESS` always resolve to `EMAILADDRESS` and
//! `@EMAILADDRESS`.

use crate::error::{Result, RowkitError};
use crate::schema::{normalize_name, ColumnDescriptor, TableSchema};
use crate::value::Row;
use std::fmt;

/// Bind token for a column or derived parameter name, e.g. `@EMAIL`.
pub fn bind_token(name: &str) -> String {
    format!("@{}", normalize_name(name))
}

/// Name under which a value is bound, i.e. the token without its prefix.
pub fn param_name(name: &str) -> String {
    normalize_name(name)
}

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Asc => f.write_str("ASC"),
            Order::Desc => f.write_str("DESC"),
        }
    }
}

/// DDL for a table: one `CREATE TABLE`, then one `CREATE INDEX` per indexed column.
pub fn create_table(schema: &TableSchema) -> Vec<String> {
    let table = schema.sql_name();
    let mut defs = Vec::new();

    if let Some(pk) = schema.primary_key() {
        let mut def = format!("{} {} PRIMARY KEY", pk.sql_name(), pk.storage_type());
        if pk.auto {
            def.push_str(" AUTOINCREMENT");
        } else {
            def.push_str(" NOT NULL");
        }
        defs.push(def);
    }

    for column in schema.columns().iter().filter(|c| !c.primary_key) {
        defs.push(column_definition(column));
    }

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {table} ({})",
        defs.join(", ")
    )];

    for column in schema.columns().iter().filter(|c| c.indexed) {
        let name = column.sql_name();
        let unique = if column.unique { "UNIQUE " } else { "" };
        statements.push(format!(
            "CREATE {unique}INDEX IF NOT EXISTS {} ON {table} ({name})",
            index_name(&table, &name)
        ));
    }

    statements
}

fn column_definition(column: &ColumnDescriptor) -> String {
    let mut def = format!("{} {}", column.sql_name(), column.storage_type());
    if column.required {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = column.effective_default() {
        def.push_str(" DEFAULT ");
        def.push_str(&default.to_sql());
    }
    if column.unique {
        def.push_str(" UNIQUE");
    }
    def
}

/// Deterministic index name for a table/column pair.
pub fn index_name(table: &str, column: &str) -> String {
    format!("IDX_{}_{}", normalize_name(table), normalize_name(column))
}

pub fn drop_table(schema: &TableSchema) -> String {
    format!("DROP TABLE IF EXISTS {}", schema.sql_name())
}

/// `INSERT` naming every key of `values` as both column and bind token.
pub fn insert(schema: &TableSchema, values: &Row) -> Result<String> {
    if values.is_empty() {
        return Err(RowkitError::NoColumns {
            table: schema.name().to_string(),
        });
    }

    let columns: Vec<String> = values.iter().map(|(k, _)| normalize_name(k)).collect();
    let tokens: Vec<String> = values.iter().map(|(k, _)| bind_token(k)).collect();
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        schema.sql_name(),
        columns.join(", "),
        tokens.join(", ")
    ))
}

/// `UPDATE ... SET` every non-identifier key, keyed by the identifier.
pub fn update(schema: &TableSchema, values: &Row) -> Result<String> {
    let id = schema.identifier();
    if !values.contains(id) {
        return Err(RowkitError::MissingIdentifier {
            table: schema.name().to_string(),
            column: id.to_string(),
        });
    }

    let id_name = normalize_name(id);
    let assignments: Vec<String> = values
        .iter()
        .map(|(k, _)| normalize_name(k))
        .filter(|k| *k != id_name)
        .map(|k| format!("{k} = @{k}"))
        .collect();
    if assignments.is_empty() {
        return Err(RowkitError::NoColumns {
            table: schema.name().to_string(),
        });
    }

    Ok(format!(
        "UPDATE {} SET {} WHERE {id_name} = @{id_name}",
        schema.sql_name(),
        assignments.join(", ")
    ))
}

pub fn delete(schema: &TableSchema) -> String {
    let id = normalize_name(schema.identifier());
    format!("DELETE FROM {} WHERE {id} = @{id}", schema.sql_name())
}

pub fn find_by_id(schema: &TableSchema) -> String {
    let id = normalize_name(schema.identifier());
    format!(
        "SELECT {} FROM {} WHERE {id} = @{id}",
        projection(schema),
        schema.sql_name()
    )
}

/// Result columns for reads. Without a primary key the ROWID is the row
/// identifier, so it is selected alongside the declared columns.
fn projection(schema: &TableSchema) -> &'static str {
    if schema.primary_key().is_some() {
        "*"
    } else {
        "ROWID, *"
    }
}

/// Base `SELECT` with optional filter fragment, ordering and paging.
pub fn select(
    schema: &TableSchema,
    filter: Option<&str>,
    order_by: &[(String, Order)],
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<String> {
    let mut sql = format!("SELECT {} FROM {}", projection(schema), schema.sql_name());

    if let Some(fragment) = filter.filter(|f| !f.trim().is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(fragment);
    }

    if !order_by.is_empty() {
        let mut terms = Vec::with_capacity(order_by.len());
        for (column, order) in order_by {
            let column = schema.column(column).ok_or_else(|| {
                RowkitError::Schema(format!("Unknown column '{column}' in {}", schema.name()))
            })?;
            terms.push(format!("{} {order}", column.sql_name()));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }

    match (limit, offset) {
        (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
        (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
        // SQLite only accepts OFFSET after a LIMIT
        (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
        (None, None) => {}
    }

    Ok(sql)
}
