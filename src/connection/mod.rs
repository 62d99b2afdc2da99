// ABOUTME: Connection collaborator trait plus the row/value data model
// ABOUTME: The dump engine talks SQL text and consumes ordered rows back

pub mod mysql;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

pub use mysql::{ConnectOptions, MySqlConnection};

/// One scalar cell as it travels from the cursor into an `INSERT` literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    /// A numeric literal carried verbatim (DECIMAL and friends), rendered
    /// unquoted without a round-trip through floating point.
    Number(String),
    Text(String),
    Json(serde_json::Value),
}

/// An ordered column-name → value record from one cursor row.
///
/// Order matters: the column list of a generated `INSERT` follows the key
/// order of the first row in the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pairs: Vec<(String, Value)>,
}

impl Row {
    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Column names in row order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(name, _)| name.as_str())
    }

    /// Values in row order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.pairs.iter().map(|(_, value)| value)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.pairs
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// The text content of a column, if present and textual.
    pub fn text(&self, column: &str) -> Option<&str> {
        match self.get(column) {
            Some(Value::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// A server-side cursor: rows arrive one at a time, on demand.
pub type RowStream<'a> = BoxStream<'a, Result<Row>>;

/// The database connection as the dump engine sees it.
///
/// One dump invocation owns its connection exclusively for the duration;
/// nothing here is meant for concurrent dumps over a shared handle. Any
/// failure from these methods aborts the dump.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Run a metadata query and buffer all of its result rows.
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Open a streaming cursor over a `SELECT`; the full result set is never
    /// materialized on the client.
    async fn query_stream<'a>(&'a self, sql: &str) -> Result<RowStream<'a>>;

    /// Escape a scalar into a quoted SQL string literal.
    fn escape(&self, value: &str) -> String;

    /// The schema currently selected on this connection, if any.
    async fn current_database(&self) -> Result<Option<String>>;
}
