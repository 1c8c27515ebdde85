use crate::criteria::{self, Condition};
use crate::error::Result;
use crate::statement::Order;
use crate::value::Params;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where and how to open the storage file.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub path: PathBuf,
    /// Cipher identifier forwarded to the engine as `PRAGMA cipher`.
    #[serde(default)]
    pub cipher: Option<String>,
    /// Encryption key forwarded to the engine as `PRAGMA key`.
    #[serde(default)]
    pub key: Option<String>,
    /// Log every statement before it runs.
    #[serde(default)]
    pub logging: bool,
}

impl ConnectOptions {
    pub fn new(path: impl AsRef<Path>) -> Self {
        ConnectOptions {
            path: path.as_ref().to_path_buf(),
            cipher: None,
            key: None,
            logging: false,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    pub fn with_cipher(mut self, cipher: impl Into<String>, key: impl Into<String>) -> Self {
        self.cipher = Some(cipher.into());
        self.key = Some(key.into());
        self
    }

    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("path", &self.path)
            .field("cipher", &self.cipher)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("logging", &self.logging)
            .finish()
    }
}

/// Filter, ordering and paging for `find_many` / `find_one`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// WHERE fragment without the keyword.
    pub where_clause: Option<String>,
    /// Values for every token in `where_clause`.
    pub params: Params,
    pub order_by: Vec<(String, Order)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-written fragment and its bind values.
    pub fn filter_sql(mut self, fragment: impl Into<String>, params: Params) -> Self {
        self.where_clause = Some(fragment.into());
        self.params = params;
        self
    }

    /// Compile a condition and bind its values.
    pub fn filter(mut self, condition: &Condition) -> Result<Self> {
        self.where_clause = Some(criteria::compile(condition)?);
        self.params = criteria::bindings(condition)?;
        Ok(self)
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}
