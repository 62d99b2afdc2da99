// ABOUTME: Streams one table's rows and groups them into INSERT batches
// ABOUTME: Resolves live columns, renders scalar literals, bounds memory per chunk

use std::collections::BTreeSet;

use futures::stream::StreamExt;

use crate::config::DumpConfig;
use crate::connection::{Connection, Row, RowStream, Value};
use crate::error::Result;

/// Pulls rows from one open cursor and hands back `INSERT` statements of at
/// most `max_chunk_size` rows each. At most one chunk of rows is buffered at
/// any time; a batch is never retained after being handed out.
pub struct RowBatcher<'a, C: Connection + ?Sized> {
    conn: &'a C,
    table: String,
    max_chunk_size: usize,
    stream: RowStream<'a>,
    buffer: Vec<Row>,
    exhausted: bool,
}

impl<'a, C: Connection + ?Sized> RowBatcher<'a, C> {
    /// Resolve the table's column list and open the data cursor.
    ///
    /// Returns `None` when exclusions leave no column to export; the table
    /// then contributes no data fragments.
    pub async fn open(conn: &'a C, table: &str, config: &DumpConfig) -> Result<Option<Self>> {
        let excluded = config.exclude_columns.get(table);
        let columns = resolve_columns(
            conn,
            table,
            excluded,
            config.export_generated_columns_data,
        )
        .await?;
        if columns.is_empty() {
            tracing::warn!("no exportable columns for {}, skipping data", table);
            return Ok(None);
        }

        let sql = select_sql(
            table,
            &columns,
            config.filter_rows.get(table).map(String::as_str),
            config.order_by.get(table).map(String::as_str),
        );
        let stream = conn.query_stream(&sql).await?;

        Ok(Some(Self {
            conn,
            table: table.to_string(),
            max_chunk_size: config.max_chunk_size,
            stream,
            buffer: Vec::new(),
            exhausted: false,
        }))
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The next `INSERT` statement, or `None` once the cursor is drained.
    /// A table with zero matching rows yields no statement at all.
    pub async fn next_batch(&mut self) -> Result<Option<String>> {
        if self.exhausted {
            return Ok(None);
        }
        while let Some(row) = self.stream.next().await {
            self.buffer.push(row?);
            if self.buffer.len() >= self.max_chunk_size {
                let batch = std::mem::take(&mut self.buffer);
                return Ok(Some(build_insert(self.conn, &self.table, &batch)));
            }
        }
        self.exhausted = true;
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let batch = std::mem::take(&mut self.buffer);
        Ok(Some(build_insert(self.conn, &self.table, &batch)))
    }
}

/// The live column list for a table, honoring exclusions and the
/// generated-column policy.
async fn resolve_columns<C: Connection + ?Sized>(
    conn: &C,
    table: &str,
    excluded: Option<&BTreeSet<String>>,
    export_generated: bool,
) -> Result<Vec<String>> {
    let mut sql = format!("SHOW COLUMNS FROM `{}` WHERE 1", table);
    if !export_generated {
        sql.push_str(" AND Extra != 'VIRTUAL GENERATED'");
    }
    if let Some(excluded) = excluded.filter(|set| !set.is_empty()) {
        let list = excluded
            .iter()
            .map(|name| format!("\"{}\"", name))
            .collect::<Vec<_>>()
            .join(",");
        sql.push_str(&format!(" AND Field NOT IN ({})", list));
    }

    let rows = conn.query(&sql).await?;
    Ok(rows
        .iter()
        .filter_map(|row| row.text("Field"))
        .map(str::to_string)
        .collect())
}

fn select_sql(table: &str, columns: &[String], filter: Option<&str>, order_by: Option<&str>) -> String {
    let column_list = columns
        .iter()
        .map(|name| format!("`{}`", name))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("SELECT {} FROM `{}` WHERE 1", column_list, table);
    if let Some(filter) = filter {
        sql.push_str(&format!(" AND ({})", filter));
    }
    if let Some(order_by) = order_by {
        sql.push_str(&format!(" ORDER BY {}", order_by));
    }
    sql
}

/// Render one batch as a multi-row `INSERT`. The column list follows the key
/// order of the first row.
fn build_insert<C: Connection + ?Sized>(conn: &C, table: &str, rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let columns = first
        .columns()
        .map(|name| format!("`{}`", name))
        .collect::<Vec<_>>()
        .join(", ");
    let values = rows
        .iter()
        .map(|row| render_row(conn, row))
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "INSERT INTO `{}` ({}) VALUES\n{};\n\n",
        table, columns, values
    )
}

fn render_row<C: Connection + ?Sized>(conn: &C, row: &Row) -> String {
    let values = row
        .values()
        .map(|value| render_value(conn, value))
        .collect::<Vec<_>>()
        .join(", ");
    format!("({})", values)
}

/// Literal rendering rules: `NULL` unquoted, numbers as-is, everything else
/// escaped by the connection. JSON serialization backslash-escapes double
/// quotes, but the engine accepts a bare `"` inside single-quoted literals,
/// so those escapes are restored afterwards.
fn render_value<C: Connection + ?Sized>(conn: &C, value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Number(raw) => raw.clone(),
        Value::Text(text) => conn.escape(text).replace("\\\"", "\""),
        Value::Json(json) => conn.escape(&json.to_string()).replace("\\\"", "\""),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::connection::RowStream;

    /// Escapes like the MySQL driver, queries nothing.
    struct EscapeOnly;

    #[async_trait]
    impl Connection for EscapeOnly {
        async fn query(&self, _sql: &str) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn query_stream<'b>(&'b self, _sql: &str) -> Result<RowStream<'b>> {
            Ok(futures::stream::empty().boxed())
        }

        fn escape(&self, value: &str) -> String {
            let escaped = value
                .replace('\\', "\\\\")
                .replace('\'', "\\'")
                .replace('"', "\\\"");
            format!("'{}'", escaped)
        }

        async fn current_database(&self) -> Result<Option<String>> {
            Ok(None)
        }
    }

    #[test]
    fn renders_null_numbers_strings_and_json() {
        let conn = EscapeOnly;
        let row = Row::from_pairs(vec![
            ("id".into(), Value::Int(5)),
            ("name".into(), Value::Text("O'Brien".into())),
            ("meta".into(), Value::Null),
            ("tags".into(), Value::Json(serde_json::json!(["a", "b"]))),
        ]);
        assert_eq!(
            render_row(&conn, &row),
            r#"(5, 'O\'Brien', NULL, '["a","b"]')"#
        );
    }

    #[test]
    fn renders_raw_numeric_literals_unquoted() {
        let conn = EscapeOnly;
        assert_eq!(render_value(&conn, &Value::Number("12.50".into())), "12.50");
        assert_eq!(render_value(&conn, &Value::UInt(7)), "7");
        assert_eq!(render_value(&conn, &Value::Float(1.5)), "1.5");
    }

    #[test]
    fn builds_multi_row_insert() {
        let conn = EscapeOnly;
        let rows = vec![
            Row::from_pairs(vec![
                ("id".into(), Value::Int(1)),
                ("name".into(), Value::Text("alice".into())),
            ]),
            Row::from_pairs(vec![
                ("id".into(), Value::Int(2)),
                ("name".into(), Value::Text("bob".into())),
            ]),
        ];
        assert_eq!(
            build_insert(&conn, "users", &rows),
            "INSERT INTO `users` (`id`, `name`) VALUES\n(1, 'alice'),\n(2, 'bob');\n\n"
        );
    }

    #[test]
    fn select_sql_appends_filter_and_order() {
        let columns = vec!["id".to_string(), "name".to_string()];
        assert_eq!(
            select_sql("users", &columns, None, None),
            "SELECT `id`, `name` FROM `users` WHERE 1"
        );
        assert_eq!(
            select_sql("users", &columns, Some("active = 1"), Some("id DESC")),
            "SELECT `id`, `name` FROM `users` WHERE 1 AND (active = 1) ORDER BY id DESC"
        );
    }
}
