// ABOUTME: mysql_async-backed implementation of the Connection trait
// ABOUTME: Bridges the driver's borrowing cursor to an owned row stream

use async_trait::async_trait;
use futures::stream::StreamExt;
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::prelude::*;
use mysql_async::{Column, Opts, OptsBuilder, Pool, Row as MySqlRow};
use tokio::sync::mpsc;

use super::{Connection, Row, RowStream, Value};
use crate::error::Result;

/// Connection parameters for [`MySqlConnection::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Initially selected database. A dump needs one selected, either here
    /// or via `USE` before dumping.
    pub database: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3306,
            user: "root".into(),
            password: String::new(),
            database: None,
        }
    }
}

/// A live MySQL connection usable by the dump engine.
///
/// Holds a `mysql_async` pool; one connection is checked out per metadata
/// query and one per open cursor, so a schema fragment and its data cursor
/// never contend on the same wire.
pub struct MySqlConnection {
    pool: Pool,
}

impl MySqlConnection {
    /// Connect to a MySQL server.
    pub fn connect(options: ConnectOptions) -> Self {
        let builder = OptsBuilder::default()
            .ip_or_hostname(options.host)
            .tcp_port(options.port)
            .user(Some(options.user))
            .pass(Some(options.password))
            .db_name(options.database)
            // Full Unicode support for everything we read back as text
            .init(vec!["SET NAMES utf8mb4"]);
        Self {
            pool: Pool::new(Opts::from(builder)),
        }
    }

    /// Wrap a pool the caller already owns. The caller keeps ownership;
    /// [`MySqlConnection::disconnect`] on a wrapped pool clone is a no-op
    /// until the last clone disconnects.
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Close the pool, waiting for checked-out connections to come back.
    pub async fn disconnect(self) -> Result<()> {
        self.pool.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        tracing::debug!("query: {}", sql);
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<MySqlRow> = conn.query(sql).await?;
        Ok(rows.into_iter().map(convert_row).collect())
    }

    async fn query_stream<'a>(&'a self, sql: &str) -> Result<RowStream<'a>> {
        tracing::debug!("cursor: {}", sql);
        let mut conn = self.pool.get_conn().await?;
        let sql = sql.to_string();
        // The driver's result stream borrows the connection, so the cursor
        // is drained by a task that owns it and hands rows over a bounded
        // channel. A dropped receiver stops the task on its next send and
        // returns the connection to the pool.
        let (tx, rx) = mpsc::channel::<Result<Row>>(1);
        tokio::spawn(async move {
            let outcome: std::result::Result<(), mysql_async::Error> = async {
                let mut result = conn.query_iter(sql.as_str()).await?;
                let Some(mut stream) = result.stream::<MySqlRow>().await? else {
                    return Ok(());
                };
                while let Some(row) = stream.next().await {
                    let row = row?;
                    if tx.send(Ok(convert_row(row))).await.is_err() {
                        break;
                    }
                }
                Ok(())
            }
            .await;
            if let Err(err) = outcome {
                let _ = tx.send(Err(err.into())).await;
            }
        });
        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }

    fn escape(&self, value: &str) -> String {
        escape_literal(value)
    }

    async fn current_database(&self) -> Result<Option<String>> {
        let rows = self.query("SELECT DATABASE()").await?;
        Ok(rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(|value| match value {
                Value::Text(name) => Some(name.clone()),
                _ => None,
            }))
    }
}

/// Quote and escape a scalar into a MySQL string literal.
pub fn escape_literal(value: &str) -> String {
    mysql_async::Value::from(value).as_sql(false)
}

fn convert_row(row: MySqlRow) -> Row {
    let columns = row.columns();
    let mut pairs = Vec::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        let value = row
            .as_ref(index)
            .cloned()
            .unwrap_or(mysql_async::Value::NULL);
        pairs.push((column.name_str().into_owned(), convert_value(column, value)));
    }
    Row::from_pairs(pairs)
}

/// Map a driver value onto the engine's value model. Text-protocol results
/// arrive as raw bytes, so numeric and JSON columns are recognized by their
/// column type rather than by the wire value.
fn convert_value(column: &Column, value: mysql_async::Value) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Int(i) => Value::Int(i),
        mysql_async::Value::UInt(u) => Value::UInt(u),
        mysql_async::Value::Float(f) => Value::Float(f64::from(f)),
        mysql_async::Value::Double(d) => Value::Float(d),
        mysql_async::Value::Bytes(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            match column.column_type() {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_YEAR => {
                    if column.flags().contains(ColumnFlags::UNSIGNED_FLAG) {
                        text.parse().map(Value::UInt).unwrap_or(Value::Number(text))
                    } else {
                        text.parse().map(Value::Int).unwrap_or(Value::Number(text))
                    }
                }
                ColumnType::MYSQL_TYPE_DECIMAL
                | ColumnType::MYSQL_TYPE_NEWDECIMAL
                | ColumnType::MYSQL_TYPE_FLOAT
                | ColumnType::MYSQL_TYPE_DOUBLE => Value::Number(text),
                ColumnType::MYSQL_TYPE_JSON => serde_json::from_str(&text)
                    .map(Value::Json)
                    .unwrap_or(Value::Text(text)),
                _ => Value::Text(text),
            }
        }
        date_or_time @ (mysql_async::Value::Date(..) | mysql_async::Value::Time(..)) => {
            Value::Text(date_or_time.as_sql(true).trim_matches('\'').to_string())
        }
    }
}
