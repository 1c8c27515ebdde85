use thiserror::Error;

#[derive(Error, Debug)]
pub enum RowkitError {
    #[error("Unsupported column type: {0}")]
    UnsupportedType(String),

    #[error("Unsupported criteria operator: {0}")]
    UnsupportedOperator(String),

    #[error("Not connected: cannot {operation}")]
    NotConnected { operation: &'static str },

    #[error("Missing identifier '{column}' for update on {table}")]
    MissingIdentifier { table: String, column: String },

    #[error("No columns to insert into {table}")]
    NoColumns { table: String },

    #[error("Insert into {table} affected {affected} rows, expected 1")]
    InsertFailed { table: String, affected: usize },

    #[error("Update of {table} affected {affected} rows, expected 1")]
    UpdateFailed { table: String, affected: usize },

    #[error("Failed to open {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{operation} failed: {source}")]
    Engine {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("Rejected by interceptor: {0}")]
    Rejected(String),

    #[error("Column '{column}' is not a valid {expected}")]
    Decode { column: String, expected: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, RowkitError>;

/// Attach the attempted operation's name to a raw engine error.
pub(crate) trait ResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T>;
}

impl<T> ResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn during(self, operation: &'static str) -> Result<T> {
        self.map_err(|source| RowkitError::Engine { operation, source })
    }
}
