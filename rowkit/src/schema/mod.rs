pub mod parser;
pub mod types;

pub use parser::{parse_tables, parse_tables_str};
pub use types::{
    is_identifier, map_type, normalize_name, ColumnDescriptor, ColumnType, DefaultValue,
    TableSchema, ROWID,
};
