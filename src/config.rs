// ABOUTME: Dump configuration with explicit defaults for every option
// ABOUTME: Validates mutually exclusive settings before any I/O happens

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::AsyncWrite;

use crate::error::{DumpError, Result};

/// A text post-processing step applied to every emitted fragment, in order.
pub type Modifier = Arc<dyn Fn(String) -> String + Send + Sync>;

/// Where the dump output is written, in addition to (or instead of) being
/// returned to the caller.
pub enum Destination {
    /// Create (truncating) a file at this path and write the dump into it.
    Path(PathBuf),
    /// Pipe the dump into a caller-supplied writer.
    Writer(Box<dyn AsyncWrite + Send + Unpin>),
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Destination::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

/// Options for one dump invocation.
///
/// Construct with struct-update syntax over [`DumpConfig::default`]:
///
/// ```
/// use mysql_stream_dump::DumpConfig;
///
/// let config = DumpConfig {
///     export_data: true,
///     max_chunk_size: 500,
///     ..DumpConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
pub struct DumpConfig {
    /// Emit `CREATE TABLE` / `CREATE VIEW` statements.
    pub export_schema: bool,
    /// Emit `INSERT` statements for base tables.
    pub export_data: bool,
    /// Emit `INSERT` statements for views as well.
    pub export_view_data: bool,
    /// Include virtual/generated columns in exported data.
    pub export_generated_columns_data: bool,
    /// Reorder `KEY` clauses so primary/unique keys come first.
    pub sort_keys: bool,
    /// Maximum number of rows per `INSERT` statement.
    pub max_chunk_size: usize,
    /// Optional file path or writer the output is teed into.
    pub destination: Option<Destination>,
    /// Text transforms applied to each fragment, in order.
    pub modifiers: Vec<Modifier>,
    /// Tables and views to skip. Mutually exclusive with `include_tables`.
    pub exclude_tables: BTreeSet<String>,
    /// Restrict the dump to these tables and views.
    pub include_tables: BTreeSet<String>,
    /// Per-table columns to leave out of exported data.
    pub exclude_columns: BTreeMap<String, BTreeSet<String>>,
    /// Per-table `ORDER BY` expression for exported data.
    pub order_by: BTreeMap<String, String>,
    /// Per-table `WHERE` fragment restricting exported rows.
    pub filter_rows: BTreeMap<String, String>,
    /// Accumulate the whole dump in memory and return it from `dump()`.
    /// Memory-heavy on large databases; opt-in only.
    pub return_output: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            export_schema: true,
            export_data: false,
            export_view_data: false,
            export_generated_columns_data: false,
            sort_keys: false,
            max_chunk_size: 1000,
            destination: None,
            modifiers: Vec::new(),
            exclude_tables: BTreeSet::new(),
            include_tables: BTreeSet::new(),
            exclude_columns: BTreeMap::new(),
            order_by: BTreeMap::new(),
            filter_rows: BTreeMap::new(),
            return_output: false,
        }
    }
}

impl DumpConfig {
    /// Check option consistency. Runs before any query is issued.
    pub fn validate(&self) -> Result<()> {
        if !self.include_tables.is_empty() && !self.exclude_tables.is_empty() {
            return Err(DumpError::Configuration(
                "include_tables and exclude_tables are mutually exclusive; set only one".into(),
            ));
        }
        if self.max_chunk_size == 0 {
            return Err(DumpError::Configuration(
                "max_chunk_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for DumpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpConfig")
            .field("export_schema", &self.export_schema)
            .field("export_data", &self.export_data)
            .field("export_view_data", &self.export_view_data)
            .field(
                "export_generated_columns_data",
                &self.export_generated_columns_data,
            )
            .field("sort_keys", &self.sort_keys)
            .field("max_chunk_size", &self.max_chunk_size)
            .field("destination", &self.destination)
            .field("modifiers", &self.modifiers.len())
            .field("exclude_tables", &self.exclude_tables)
            .field("include_tables", &self.include_tables)
            .field("exclude_columns", &self.exclude_columns)
            .field("order_by", &self.order_by)
            .field("filter_rows", &self.filter_rows)
            .field("return_output", &self.return_output)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = DumpConfig::default();
        assert!(config.export_schema);
        assert!(!config.export_data);
        assert!(!config.export_view_data);
        assert!(!config.export_generated_columns_data);
        assert!(!config.sort_keys);
        assert_eq!(config.max_chunk_size, 1000);
        assert!(config.destination.is_none());
        assert!(config.modifiers.is_empty());
        assert!(config.exclude_tables.is_empty());
        assert!(config.include_tables.is_empty());
        assert!(!config.return_output);
    }

    #[test]
    fn include_and_exclude_together_fail_validation() {
        let config = DumpConfig {
            include_tables: ["orders".to_string()].into(),
            exclude_tables: ["orders".to_string()].into(),
            ..DumpConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DumpError::Configuration(_))
        ));
    }

    #[test]
    fn zero_chunk_size_fails_validation() {
        let config = DumpConfig {
            max_chunk_size: 0,
            ..DumpConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DumpError::Configuration(_))
        ));
    }

    #[test]
    fn either_filter_alone_is_fine() {
        let include_only = DumpConfig {
            include_tables: ["users".to_string()].into(),
            ..DumpConfig::default()
        };
        assert!(include_only.validate().is_ok());

        let exclude_only = DumpConfig {
            exclude_tables: ["logs".to_string()].into(),
            ..DumpConfig::default()
        };
        assert!(exclude_only.validate().is_ok());
    }
}
