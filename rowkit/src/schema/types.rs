use crate::error::{Result, RowkitError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Normalize a table, column or bind-token name for use in generated SQL.
/// Every component that matches or emits names goes through this function.
pub fn normalize_name(name: &str) -> String {
    name.to_uppercase()
}

/// Row identifier key for tables without a primary key.
pub const ROWID: &str = "rowid";

/// Whether `name` can be interpolated into SQL as a bare identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Logical column type, independent of how the engine stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    Integer,
    String,
    Blob,
    Boolean,
    Date,
    Float,
    Time,
    Timestamp,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::String => "STRING",
            ColumnType::Blob => "BLOB",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATE",
            ColumnType::Float => "FLOAT",
            ColumnType::Time => "TIME",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }

    /// Storage type keyword for this logical type.
    pub fn storage_type(&self, size: Option<u32>) -> String {
        match self {
            ColumnType::Integer | ColumnType::Boolean => "INTEGER".into(),
            ColumnType::String => match size {
                Some(n) => format!("VARCHAR({n})"),
                None => "TEXT".into(),
            },
            ColumnType::Blob => "BLOB".into(),
            ColumnType::Date => "VARCHAR(10)".into(),
            ColumnType::Float => "REAL".into(),
            ColumnType::Time => "VARCHAR(12)".into(),
            ColumnType::Timestamp => "VARCHAR(23)".into(),
        }
    }

    /// Types that accept a `size` attribute.
    pub fn is_sized(&self) -> bool {
        matches!(
            self,
            ColumnType::String | ColumnType::Date | ColumnType::Time | ColumnType::Timestamp
        )
    }
}

impl FromStr for ColumnType {
    type Err = RowkitError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_name(s.trim()).as_str() {
            "INTEGER" => Ok(ColumnType::Integer),
            "STRING" => Ok(ColumnType::String),
            "BLOB" => Ok(ColumnType::Blob),
            "BOOLEAN" => Ok(ColumnType::Boolean),
            "DATE" => Ok(ColumnType::Date),
            "FLOAT" => Ok(ColumnType::Float),
            "TIME" => Ok(ColumnType::Time),
            "TIMESTAMP" => Ok(ColumnType::Timestamp),
            _ => Err(RowkitError::UnsupportedType(s.to_string())),
        }
    }
}

impl TryFrom<String> for ColumnType {
    type Error = RowkitError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(t: ColumnType) -> String {
        t.as_str().to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a logical type name (any casing) plus optional size to a storage type.
pub fn map_type(logical_type: &str, size: Option<u32>) -> Result<String> {
    let column_type: ColumnType = logical_type.parse()?;
    Ok(column_type.storage_type(size))
}

/// Column default: the `now`/`today` sentinels or a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DefaultLiteral", into = "String")]
pub enum DefaultValue {
    Now,
    Today,
    Literal(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefaultLiteral {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<DefaultLiteral> for DefaultValue {
    fn from(lit: DefaultLiteral) -> Self {
        match lit {
            DefaultLiteral::Bool(b) => DefaultValue::Literal(if b { "1" } else { "0" }.into()),
            DefaultLiteral::Int(n) => DefaultValue::Literal(n.to_string()),
            DefaultLiteral::Float(f) => DefaultValue::Literal(f.to_string()),
            DefaultLiteral::Text(s) => DefaultValue::from(s.as_str()),
        }
    }
}

impl From<&str> for DefaultValue {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "now" => DefaultValue::Now,
            "today" => DefaultValue::Today,
            _ => DefaultValue::Literal(s.to_string()),
        }
    }
}

impl From<DefaultValue> for String {
    fn from(d: DefaultValue) -> String {
        match d {
            DefaultValue::Now => "now".into(),
            DefaultValue::Today => "today".into(),
            DefaultValue::Literal(s) => s,
        }
    }
}

impl DefaultValue {
    /// The expression placed after `DEFAULT` in a column definition.
    pub fn to_sql(&self) -> String {
        match self {
            DefaultValue::Now => "(strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))".into(),
            DefaultValue::Today => "(date('now'))".into(),
            DefaultValue::Literal(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

/// Declarative metadata for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto: bool,
    #[serde(rename = "default", default)]
    pub default_value: Option<DefaultValue>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnDescriptor {
            name: name.into(),
            column_type,
            size: None,
            required: false,
            indexed: false,
            unique: false,
            primary_key: false,
            auto: false,
            default_value: None,
        }
    }

    /// Auto-incrementing INTEGER primary key.
    pub fn primary_integer(name: impl Into<String>) -> Self {
        let mut column = Self::new(name, ColumnType::Integer);
        column.primary_key = true;
        column.auto = true;
        column
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn string(name: impl Into<String>, size: Option<u32>) -> Self {
        let mut column = Self::new(name, ColumnType::String);
        column.size = size;
        column
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Date)
    }

    pub fn time(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Time)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Timestamp)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Float)
    }

    pub fn blob(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Blob)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn auto(mut self) -> Self {
        self.auto = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<DefaultValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Uppercase name as it appears in generated SQL.
    pub fn sql_name(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn storage_type(&self) -> String {
        self.column_type.storage_type(self.size)
    }

    fn check(&self) -> Result<()> {
        if !is_identifier(&self.name) {
            return Err(RowkitError::Schema(format!(
                "Invalid column name '{}'",
                self.name
            )));
        }
        if self.size.is_some() && !self.column_type.is_sized() {
            return Err(RowkitError::Schema(format!(
                "Column '{}': size is not allowed on {}",
                self.name, self.column_type
            )));
        }
        if self.size == Some(0) {
            return Err(RowkitError::Schema(format!(
                "Column '{}': size must be positive",
                self.name
            )));
        }
        if self.auto {
            let auto_ok = match self.column_type {
                ColumnType::Integer => self.primary_key,
                ColumnType::Timestamp => !self.primary_key,
                _ => false,
            };
            if !auto_ok {
                return Err(RowkitError::Schema(format!(
                    "Column '{}': auto requires an INTEGER primary key or a non-key TIMESTAMP",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Whether the column is filled with the current time when left unset.
    pub fn is_auto_timestamp(&self) -> bool {
        self.auto && self.column_type == ColumnType::Timestamp
    }

    /// The `DEFAULT` applied in DDL. An auto timestamp without an explicit
    /// default gets the current time.
    pub fn effective_default(&self) -> Option<DefaultValue> {
        match &self.default_value {
            Some(default) => Some(default.clone()),
            None if self.is_auto_timestamp() => Some(DefaultValue::Now),
            None => None,
        }
    }
}

/// A table name plus its ordered column metadata. Immutable once built.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnDescriptor>,
    by_name: HashMap<String, usize>,
    primary_key: Option<usize>,
}

impl TableSchema {
    /// Build a schema, validating column names and attribute combinations.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Result<Self> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(RowkitError::Schema(format!("Invalid table name '{name}'")));
        }

        let mut by_name = HashMap::new();
        let mut primary_key = None;
        for (i, column) in columns.iter().enumerate() {
            column.check()?;
            if by_name.insert(column.sql_name(), i).is_some() {
                return Err(RowkitError::Schema(format!(
                    "Duplicate column '{}' in {name}",
                    column.name
                )));
            }
            if column.primary_key {
                if primary_key.is_some() {
                    return Err(RowkitError::Schema(format!(
                        "Table {name} declares more than one primary key"
                    )));
                }
                primary_key = Some(i);
            }
        }
        if primary_key.is_none() && by_name.contains_key(&normalize_name(ROWID)) {
            return Err(RowkitError::Schema(format!(
                "Column name '{ROWID}' is reserved in {name}, which has no primary key"
            )));
        }

        Ok(TableSchema {
            name,
            columns,
            by_name,
            primary_key,
        })
    }

    /// Table name as declared by the caller.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uppercase table name as it appears in generated SQL.
    pub fn sql_name(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Look up a column by name, ignoring case.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.by_name
            .get(&normalize_name(name))
            .map(|&i| &self.columns[i])
    }

    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.primary_key.map(|i| &self.columns[i])
    }

    /// Key carrying the row identifier: the primary key's name, or the
    /// engine's `rowid` when the table declares no primary key.
    pub fn identifier(&self) -> &str {
        self.primary_key().map(|c| c.name.as_str()).unwrap_or(ROWID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_type_table() {
        assert_eq!(map_type("integer", None).unwrap(), "INTEGER");
        assert_eq!(map_type("String", Some(60)).unwrap(), "VARCHAR(60)");
        assert_eq!(map_type("STRING", None).unwrap(), "TEXT");
        assert_eq!(map_type("blob", None).unwrap(), "BLOB");
        assert_eq!(map_type("boolean", None).unwrap(), "INTEGER");
        assert_eq!(map_type("date", None).unwrap(), "VARCHAR(10)");
        assert_eq!(map_type("float", None).unwrap(), "REAL");
        assert_eq!(map_type("time", None).unwrap(), "VARCHAR(12)");
        assert_eq!(map_type("TimeStamp", None).unwrap(), "VARCHAR(23)");
    }

    #[test]
    fn test_map_type_unsupported() {
        let err = map_type("decimal", None).unwrap_err();
        assert!(matches!(err, RowkitError::UnsupportedType(ref t) if t == "decimal"));
        assert!(map_type("", None).is_err());
    }

    #[test]
    fn test_default_value_sql() {
        assert_eq!(DefaultValue::from("today").to_sql(), "(date('now'))");
        assert!(DefaultValue::from("now").to_sql().contains("strftime"));
        assert_eq!(DefaultValue::from("it's").to_sql(), "'it''s'");
    }

    #[test]
    fn test_schema_lookup_is_case_insensitive() {
        let schema = TableSchema::new(
            "users",
            vec![
                ColumnDescriptor::primary_integer("id"),
                ColumnDescriptor::string("emailAddress", Some(60)),
            ],
        )
        .unwrap();

        assert_eq!(schema.sql_name(), "USERS");
        assert_eq!(schema.column("EMAILADDRESS").unwrap().name, "emailAddress");
        assert_eq!(schema.identifier(), "id");
        assert!(schema.column("missing").is_none());
    }

    #[test]
    fn test_identifier_defaults_to_rowid() {
        let schema = TableSchema::new("notes", vec![ColumnDescriptor::string("body", None)]).unwrap();
        assert!(schema.primary_key().is_none());
        assert_eq!(schema.identifier(), "rowid");

        let err = TableSchema::new("notes", vec![ColumnDescriptor::integer("RowId")]).unwrap_err();
        assert!(matches!(err, RowkitError::Schema(_)));
        let keyed = TableSchema::new(
            "notes",
            vec![ColumnDescriptor::primary_integer("id"), ColumnDescriptor::integer("rowid")],
        );
        assert!(keyed.is_ok());
    }

    #[test]
    fn test_default_sentinels_ignore_case() {
        assert_eq!(DefaultValue::from("NOW"), DefaultValue::Now);
        assert_eq!(DefaultValue::from("Today"), DefaultValue::Today);
        assert_eq!(DefaultValue::from("Nowhere"), DefaultValue::Literal("Nowhere".into()));
    }

    #[test]
    fn test_auto_timestamp_defaults_to_now() {
        let seen = ColumnDescriptor::timestamp("seen_at").auto();
        assert!(seen.is_auto_timestamp());
        assert_eq!(seen.effective_default(), Some(DefaultValue::Now));

        let explicit = ColumnDescriptor::timestamp("seen_at").auto().default_value("1970-01-01");
        assert_eq!(
            explicit.effective_default(),
            Some(DefaultValue::Literal("1970-01-01".into()))
        );
        assert_eq!(ColumnDescriptor::timestamp("seen_at").effective_default(), None);
    }

    #[test]
    fn test_schema_rejects_two_primary_keys() {
        let err = TableSchema::new(
            "t",
            vec![
                ColumnDescriptor::primary_integer("a"),
                ColumnDescriptor::primary_integer("b"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, RowkitError::Schema(_)));
    }

    #[test]
    fn test_schema_rejects_duplicate_names() {
        let err = TableSchema::new(
            "t",
            vec![ColumnDescriptor::integer("Age"), ColumnDescriptor::integer("AGE")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_schema_rejects_misplaced_attributes() {
        let sized_int = ColumnDescriptor {
            size: Some(4),
            ..ColumnDescriptor::integer("n")
        };
        assert!(TableSchema::new("t", vec![sized_int]).is_err());

        let auto_string = ColumnDescriptor::string("s", None).auto();
        assert!(TableSchema::new("t", vec![auto_string]).is_err());

        let auto_stamp = ColumnDescriptor::timestamp("created_at").auto();
        assert!(TableSchema::new("t", vec![auto_stamp]).is_ok());

        let auto_stamp_key = ColumnDescriptor::timestamp("at").primary_key().auto();
        assert!(TableSchema::new("t", vec![auto_stamp_key]).is_err());
    }

    #[test]
    fn test_schema_rejects_bad_identifiers() {
        assert!(TableSchema::new("users; DROP", vec![]).is_err());
        assert!(TableSchema::new("t", vec![ColumnDescriptor::integer("1st")]).is_err());
    }
}
