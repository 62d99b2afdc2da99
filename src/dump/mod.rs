// ABOUTME: Streaming logical-dump engine module
// ABOUTME: Exposes the fragment sequence, output pipeline, and dump() entry point

pub mod catalog;
pub mod rows;
pub mod schema;
pub mod sequencer;
pub mod stream;

pub use catalog::{CatalogObject, ObjectKind};
pub use sequencer::DumpSequencer;
pub use stream::DumpStream;

use crate::config::DumpConfig;
use crate::connection::Connection;
use crate::error::Result;

/// One self-contained unit of dump output: a DDL statement or one batched
/// `INSERT`. Consumed exactly once; never retained after being flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// A normalized `CREATE TABLE`/`CREATE VIEW` statement.
    Schema { object: String, sql: String },
    /// One `INSERT` statement of at most `max_chunk_size` rows.
    Data { table: String, sql: String },
}

impl Fragment {
    pub fn as_sql(&self) -> &str {
        match self {
            Fragment::Schema { sql, .. } | Fragment::Data { sql, .. } => sql,
        }
    }

    pub fn into_sql(self) -> String {
        match self {
            Fragment::Schema { sql, .. } | Fragment::Data { sql, .. } => sql,
        }
    }
}

/// Run a whole dump over `conn` and drive it to completion.
///
/// The returned string is empty unless `return_output` is set; accumulating
/// a large database in memory is deliberately opt-in. Output goes to
/// `config.destination` as the dump progresses.
///
/// Rows are read without a wrapping transaction: a data dump is not a
/// point-in-time snapshot across tables, and concurrent writes may be
/// visible between one table and the next.
///
/// ```no_run
/// # use mysql_stream_dump::{dump, ConnectOptions, DumpConfig, Destination, MySqlConnection};
/// # async fn example() -> mysql_stream_dump::Result<()> {
/// let conn = MySqlConnection::connect(ConnectOptions {
///     database: Some("shop".into()),
///     ..ConnectOptions::default()
/// });
/// dump(
///     &conn,
///     DumpConfig {
///         export_data: true,
///         destination: Some(Destination::Path("shop.sql".into())),
///         ..DumpConfig::default()
///     },
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn dump<C: Connection + ?Sized>(conn: &C, config: DumpConfig) -> Result<String> {
    let mut stream = DumpStream::new(conn, config)?;
    let accumulate = stream.accumulates_output();
    let mut output = String::new();
    while let Some(chunk) = stream.next_chunk().await? {
        if accumulate {
            output.push_str(&chunk);
        }
    }
    Ok(output)
}
