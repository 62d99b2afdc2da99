// ABOUTME: Library crate for mysql-stream-dump
// ABOUTME: Streaming MySQL logical dumps with bounded memory per chunk

pub mod config;
pub mod connection;
pub mod dump;
pub mod error;

pub use config::{Destination, DumpConfig, Modifier};
pub use connection::{ConnectOptions, Connection, MySqlConnection, Row, RowStream, Value};
pub use dump::{dump, CatalogObject, DumpSequencer, DumpStream, Fragment, ObjectKind};
pub use error::{DumpError, Result};
