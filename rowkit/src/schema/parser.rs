use crate::error::Result;
use super::types::{ColumnDescriptor, TableSchema};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level layout of a tables YAML file.
#[derive(Debug, Deserialize)]
struct TablesFile {
    #[serde(default)]
    tables: BTreeMap<String, TableDefinition>,
}

#[derive(Debug, Deserialize)]
struct TableDefinition {
    #[serde(default)]
    columns: Vec<ColumnDescriptor>,
}

/// Parse a tables YAML file into validated schemas.
pub fn parse_tables(path: &Path) -> Result<Vec<TableSchema>> {
    let content = std::fs::read_to_string(path)?;
    parse_tables_str(&content)
}

/// Parse a tables YAML string into validated schemas, ordered by table name.
pub fn parse_tables_str(content: &str) -> Result<Vec<TableSchema>> {
    let file: TablesFile = serde_yaml::from_str(content)?;
    file.tables
        .into_iter()
        .map(|(name, def)| TableSchema::new(name, def.columns))
        .collect()
}
