// ABOUTME: Pull-based fragment sequence driving one dump invocation
// ABOUTME: Resolves the catalog once, then yields schema and data per object

use std::collections::VecDeque;

use super::catalog::{self, CatalogObject, ObjectKind};
use super::rows::RowBatcher;
use super::schema::SchemaExtractor;
use super::Fragment;
use crate::config::DumpConfig;
use crate::connection::Connection;
use crate::error::{DumpError, Result};

/// A one-shot, lazily evaluated sequence of dump fragments.
///
/// Nothing touches the database until the first [`next_fragment`] call; from
/// then on each call performs just enough I/O to produce one fragment. The
/// consumer drives progress, so at most one fragment (and one open cursor)
/// exists ahead of consumption. Objects are visited tables first, then
/// views, each group in name order, schema before data per object.
///
/// Dropping the sequencer mid-iteration releases the open cursor; output
/// produced so far stays wherever it was written.
///
/// [`next_fragment`]: DumpSequencer::next_fragment
pub struct DumpSequencer<'a, C: Connection + ?Sized> {
    conn: &'a C,
    config: DumpConfig,
    extractor: Option<SchemaExtractor>,
    queue: VecDeque<CatalogObject>,
    pending_data: Option<CatalogObject>,
    batcher: Option<RowBatcher<'a, C>>,
    started: bool,
}

impl<'a, C: Connection + ?Sized> DumpSequencer<'a, C> {
    /// Validates the configuration eagerly; no I/O happens here.
    pub fn new(conn: &'a C, config: DumpConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            conn,
            config,
            extractor: None,
            queue: VecDeque::new(),
            pending_data: None,
            batcher: None,
            started: false,
        })
    }

    /// The next schema or data fragment, or `None` at end of dump.
    ///
    /// Any connection or cursor failure terminates the sequence; calling
    /// again after an error is not supported.
    pub async fn next_fragment(&mut self) -> Result<Option<Fragment>> {
        if !self.started {
            self.start().await?;
        }

        loop {
            if let Some(batcher) = self.batcher.as_mut() {
                if let Some(sql) = batcher.next_batch().await? {
                    let table = batcher.table().to_string();
                    return Ok(Some(Fragment::Data { table, sql }));
                }
                self.batcher = None;
            }

            if let Some(object) = self.pending_data.take() {
                self.batcher = RowBatcher::open(self.conn, &object.name, &self.config).await?;
                continue;
            }

            let Some(object) = self.queue.pop_front() else {
                return Ok(None);
            };
            tracing::info!(" - {}", object.name);

            let wants_data = match object.kind {
                ObjectKind::Table => self.config.export_data,
                ObjectKind::View => self.config.export_view_data,
            };
            if wants_data {
                self.pending_data = Some(object.clone());
            }

            if let Some(extractor) = self.extractor.as_ref() {
                if let Some(sql) = extractor.extract(self.conn, &object).await? {
                    return Ok(Some(Fragment::Schema {
                        object: object.name,
                        sql,
                    }));
                }
            }
        }
    }

    async fn start(&mut self) -> Result<()> {
        self.started = true;
        tracing::debug!("dump options: {:?}", self.config);

        let database = self
            .conn
            .current_database()
            .await?
            .filter(|name| !name.is_empty())
            .ok_or(DumpError::MissingDatabase)?;

        let (tables, views) = catalog::resolve(
            self.conn,
            &database,
            &self.config.include_tables,
            &self.config.exclude_tables,
        )
        .await?;
        tracing::info!(
            "found {} tables and {} views in {}",
            tables.len(),
            views.len(),
            database
        );

        self.queue = tables.into_iter().chain(views).collect();
        if self.config.export_schema {
            self.extractor = Some(SchemaExtractor::new(&database, self.config.sort_keys));
        }
        Ok(())
    }
}
