pub mod connection;
pub mod migrations;

pub use connection::{open_connection, open_read_connection};
pub use migrations::{run_migrations, schema_version};
