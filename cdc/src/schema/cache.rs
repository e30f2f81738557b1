use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::replication::dialect::SourceDialect;
use crate::schema::reconciler::RowReconciler;
use crate::types::{ChangeTable, ColumnType, ResultColumn, TableId, TableSchema};

/// Identifies a reconciler: the capture instance, the schema columns, the result columns and the
/// source layout it was built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ReconcilerKey {
    table_id: TableId,
    capture_instance: String,
    schema_columns: Vec<String>,
    columns: Vec<(String, ColumnType)>,
    dialect: SourceDialect,
}

impl ReconcilerKey {
    fn new(table: &ChangeTable, columns: &[ResultColumn], dialect: &SourceDialect) -> Self {
        Self {
            table_id: table.table_id,
            capture_instance: table.capture_instance.clone(),
            schema_columns: table.schema.column_names().map(str::to_string).collect(),
            columns: columns.iter().map(|c| (c.name.clone(), c.typ)).collect(),
            dialect: *dialect,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    table_schemas: HashMap<TableId, Arc<TableSchema>>,
    change_tables: BTreeMap<String, Arc<ChangeTable>>,
    reconcilers: HashMap<ReconcilerKey, Arc<RowReconciler>>,
}

/// Shared store of authoritative table schemas and the reconcilers built against them.
///
/// Replacing the schema of a table drops every reconciler built for that table.
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    inner: Arc<Mutex<Inner>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the schema of a table.
    pub async fn add_table_schema(&self, table_schema: TableSchema) {
        let mut inner = self.inner.lock().await;
        Self::insert_schema(&mut inner, table_schema);
    }

    /// Adds or replaces several schemas under a single lock acquisition.
    pub async fn add_table_schemas(&self, table_schemas: Vec<TableSchema>) {
        let mut inner = self.inner.lock().await;
        for table_schema in table_schemas {
            Self::insert_schema(&mut inner, table_schema);
        }
    }

    pub async fn get_table_schema(&self, table_id: &TableId) -> Option<Arc<TableSchema>> {
        let inner = self.inner.lock().await;
        inner.table_schemas.get(table_id).cloned()
    }

    /// Describes a capture instance of a cached table.
    pub async fn change_table(
        &self,
        capture_instance: impl Into<String>,
        table_id: TableId,
        captured_columns: Vec<String>,
    ) -> CdcResult<ChangeTable> {
        let Some(schema) = self.get_table_schema(&table_id).await else {
            bail!(
                ErrorKind::MissingTableSchema,
                "Table schema not found in cache",
                format!("table id {table_id}")
            );
        };

        Ok(ChangeTable::new(capture_instance, schema, captured_columns))
    }

    /// Registers a capture instance. Its table schema is cached too unless one is already present.
    pub async fn add_change_table(&self, change_table: ChangeTable) {
        let mut inner = self.inner.lock().await;
        inner
            .table_schemas
            .entry(change_table.table_id)
            .or_insert_with(|| change_table.schema.clone());
        inner.change_tables.insert(
            change_table.capture_instance.clone(),
            Arc::new(change_table),
        );
    }

    /// Returns the registered capture instances named in `names`, in that order, or every
    /// registered capture instance by name when `names` is empty.
    ///
    /// Returned capture instances carry the schema currently cached for their table.
    pub async fn resolve_change_tables(
        &self,
        names: &[String],
    ) -> CdcResult<Vec<Arc<ChangeTable>>> {
        let inner = self.inner.lock().await;

        let mut resolved: Vec<Arc<ChangeTable>> = Vec::new();
        if names.is_empty() {
            for change_table in inner.change_tables.values() {
                resolved.push(Self::with_current_schema(&inner, change_table));
            }

            return Ok(resolved);
        }

        for name in names {
            let Some(change_table) = inner.change_tables.get(name) else {
                bail!(
                    ErrorKind::UnknownCaptureInstance,
                    "Capture instance is not registered",
                    format!("capture instance {name}")
                );
            };

            if resolved
                .iter()
                .all(|table| table.capture_instance != change_table.capture_instance)
            {
                resolved.push(Self::with_current_schema(&inner, change_table));
            }
        }

        Ok(resolved)
    }

    /// Returns the reconciler previously stored for `table` and `columns` under `dialect`.
    pub async fn get_reconciler(
        &self,
        table: &ChangeTable,
        columns: &[ResultColumn],
        dialect: &SourceDialect,
    ) -> Option<Arc<RowReconciler>> {
        let inner = self.inner.lock().await;
        inner
            .reconcilers
            .get(&ReconcilerKey::new(table, columns, dialect))
            .cloned()
    }

    /// Stores a reconciler built for `table` and `columns` under `dialect`.
    pub async fn put_reconciler(
        &self,
        table: &ChangeTable,
        columns: &[ResultColumn],
        dialect: &SourceDialect,
        reconciler: Arc<RowReconciler>,
    ) {
        let mut inner = self.inner.lock().await;
        inner
            .reconcilers
            .insert(ReconcilerKey::new(table, columns, dialect), reconciler);
    }

    /// Number of stored reconcilers.
    pub async fn reconciler_count(&self) -> usize {
        self.inner.lock().await.reconcilers.len()
    }

    fn insert_schema(inner: &mut Inner, table_schema: TableSchema) {
        let table_id = table_schema.id;
        if inner
            .table_schemas
            .insert(table_id, Arc::new(table_schema))
            .is_some()
        {
            inner.reconcilers.retain(|key, _| key.table_id != table_id);
        }
    }

    fn with_current_schema(inner: &Inner, change_table: &Arc<ChangeTable>) -> Arc<ChangeTable> {
        match inner.table_schemas.get(&change_table.table_id) {
            Some(schema) if !Arc::ptr_eq(schema, &change_table.schema) => Arc::new(ChangeTable {
                schema: schema.clone(),
                ..change_table.as_ref().clone()
            }),
            _ => change_table.clone(),
        }
    }
}
