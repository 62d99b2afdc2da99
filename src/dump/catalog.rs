// ABOUTME: Resolves the ordered list of tables and views to export
// ABOUTME: Applies include/exclude filtering against information_schema

use std::collections::BTreeSet;

use crate::connection::Connection;
use crate::error::{DumpError, Result};

/// A table or view, as listed in schema metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogObject {
    pub name: String,
    pub kind: ObjectKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    View,
}

/// List the objects to export, partitioned into `(tables, views)`, each
/// sorted by name. Deterministic for a fixed catalog state.
pub async fn resolve<C: Connection + ?Sized>(
    conn: &C,
    database: &str,
    include_tables: &BTreeSet<String>,
    exclude_tables: &BTreeSet<String>,
) -> Result<(Vec<CatalogObject>, Vec<CatalogObject>)> {
    if !include_tables.is_empty() && !exclude_tables.is_empty() {
        return Err(DumpError::Configuration(
            "include_tables and exclude_tables are mutually exclusive; set only one".into(),
        ));
    }

    let sql = catalog_sql(database, include_tables, exclude_tables);
    let rows = conn.query(&sql).await?;

    let mut tables = Vec::new();
    let mut views = Vec::new();
    for row in rows {
        let Some(name) = row.text("TABLE_NAME") else {
            continue;
        };
        let kind = if row.text("TABLE_TYPE") == Some("VIEW") {
            ObjectKind::View
        } else {
            ObjectKind::Table
        };
        let object = CatalogObject {
            name: name.to_string(),
            kind,
        };
        match kind {
            ObjectKind::Table => tables.push(object),
            ObjectKind::View => views.push(object),
        }
    }
    Ok((tables, views))
}

fn catalog_sql(
    database: &str,
    include_tables: &BTreeSet<String>,
    exclude_tables: &BTreeSet<String>,
) -> String {
    let filter = if !exclude_tables.is_empty() {
        format!("AND TABLE_NAME NOT IN ({})", quoted_list(exclude_tables))
    } else if !include_tables.is_empty() {
        format!("AND TABLE_NAME IN ({})", quoted_list(include_tables))
    } else {
        String::new()
    };

    format!(
        "SELECT TABLE_TYPE, TABLE_NAME FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = '{}' {} \
         ORDER BY TABLE_SCHEMA ASC, TABLE_NAME ASC",
        database, filter
    )
}

fn quoted_list(names: &BTreeSet<String>) -> String {
    names
        .iter()
        .map(|name| format!("'{}'", name))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_sql_orders_by_schema_and_name() {
        let sql = catalog_sql("shop", &BTreeSet::new(), &BTreeSet::new());
        assert!(sql.contains("WHERE TABLE_SCHEMA = 'shop'"));
        assert!(sql.contains("ORDER BY TABLE_SCHEMA ASC, TABLE_NAME ASC"));
        assert!(!sql.contains("TABLE_NAME IN"));
        assert!(!sql.contains("TABLE_NAME NOT IN"));
    }

    #[test]
    fn exclude_filter_becomes_not_in() {
        let exclude = BTreeSet::from(["logs".to_string(), "audit".to_string()]);
        let sql = catalog_sql("shop", &BTreeSet::new(), &exclude);
        assert!(sql.contains("AND TABLE_NAME NOT IN ('audit','logs')"));
    }

    #[test]
    fn include_filter_becomes_in() {
        let include = BTreeSet::from(["users".to_string()]);
        let sql = catalog_sql("shop", &include, &BTreeSet::new());
        assert!(sql.contains("AND TABLE_NAME IN ('users')"));
    }
}
