pub mod adapter;
pub mod criteria;
pub mod error;
pub mod record;
pub mod schema;
pub mod statement;
pub mod value;

pub use adapter::{Adapter, ConnectOptions, FindOptions, Interceptor};
pub use criteria::Condition;
pub use error::{Result, RowkitError};
pub use record::{Record, RowExt};
pub use schema::{ColumnDescriptor, ColumnType, TableSchema};
pub use value::{Params, Row, Value};
