pub mod atomic;
pub mod sql;

pub use atomic::write_bytes_atomic;
pub use sql::{create_table_statement, insert_statement, render_sql};
