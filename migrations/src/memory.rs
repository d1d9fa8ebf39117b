//! An in-process database with the same migration semantics as the
//! PostgreSQL backend: transactional DDL, a revision marker and a lock.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    backend::SchemaBackend,
    error::BackendError,
    schema::{Column, Index, Literal, Primitive, TableDefinition},
};

pub type Row = BTreeMap<String, Option<Literal>>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl Table {
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|column| column.name == name)
    }
}

/// Tables and indexes. Index names share one namespace, as in PostgreSQL.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    pub tables: BTreeMap<String, Table>,
    pub indexes: BTreeMap<String, Index>,
}

impl Schema {
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, BackendError> {
        self.tables.get_mut(name).ok_or_else(|| {
            BackendError::Rejected(format!("relation \"{}\" does not exist", name))
        })
    }

    /// Applies a single primitive in place.
    pub fn apply(&mut self, primitive: &Primitive) -> Result<(), BackendError> {
        match primitive {
            Primitive::CreateTable(TableDefinition { name, columns }) => {
                if self.tables.contains_key(name) {
                    return Err(BackendError::AlreadyExists(format!(
                        "relation \"{}\" already exists",
                        name
                    )));
                }
                self.tables.insert(
                    name.clone(),
                    Table {
                        columns: columns.clone(),
                        rows: Vec::new(),
                    },
                );
            }
            Primitive::DropTable(TableDefinition { name, .. }) => {
                if self.tables.remove(name).is_none() {
                    return Err(BackendError::Rejected(format!(
                        "table \"{}\" does not exist",
                        name
                    )));
                }
                self.indexes.retain(|_, index| &index.table != name);
            }
            Primitive::AddColumn { table, column } => {
                let target = self.table_mut(table)?;
                if target.column(&column.name).is_some() {
                    return Err(BackendError::AlreadyExists(format!(
                        "column \"{}\" of relation \"{}\" already exists",
                        column.name, table
                    )));
                }
                if !column.nullable && column.default.is_none() && !target.rows.is_empty() {
                    return Err(BackendError::Rejected(format!(
                        "column \"{}\" of relation \"{}\" contains null values",
                        column.name, table
                    )));
                }
                for row in &mut target.rows {
                    row.insert(column.name.clone(), column.default.clone());
                }
                target.columns.push(column.clone());
            }
            Primitive::DropColumn { table, column } => {
                let target = self.table_mut(table)?;
                let position = target
                    .columns
                    .iter()
                    .position(|existing| existing.name == column.name)
                    .ok_or_else(|| {
                        BackendError::Rejected(format!(
                            "column \"{}\" of relation \"{}\" does not exist",
                            column.name, table
                        ))
                    })?;
                target.columns.remove(position);
                for row in &mut target.rows {
                    row.remove(&column.name);
                }
                // Dependent indexes go with the column.
                self.indexes.retain(|_, index| {
                    &index.table != table || !index.columns.contains(&column.name)
                });
            }
            Primitive::CreateIndex(index) => {
                if self.indexes.contains_key(&index.name) {
                    return Err(BackendError::AlreadyExists(format!(
                        "relation \"{}\" already exists",
                        index.name
                    )));
                }
                let target = self.table_mut(&index.table)?;
                if let Some(missing) = index
                    .columns
                    .iter()
                    .find(|name| target.column(name).is_none())
                {
                    return Err(BackendError::Rejected(format!(
                        "column \"{}\" does not exist",
                        missing
                    )));
                }
                self.indexes.insert(index.name.clone(), index.clone());
            }
            Primitive::DropIndex(index) => {
                if self.indexes.remove(&index.name).is_none() {
                    return Err(BackendError::Rejected(format!(
                        "index \"{}\" does not exist",
                        index.name
                    )));
                }
            }
            Primitive::SetDefault {
                table,
                column,
                default,
                ..
            } => {
                let target = self.table_mut(table)?;
                let target = target.column_mut(column).ok_or_else(|| {
                    BackendError::Rejected(format!(
                        "column \"{}\" of relation \"{}\" does not exist",
                        column, table
                    ))
                })?;
                target.default = default.clone();
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    schema: Schema,
    revision: Option<String>,
    lock_holder: Option<u64>,
}

/// A shared in-memory database. Each [`Self::connect`] returns a backend
/// handle with its own lock identity.
#[derive(Clone, Debug, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
    next_session: Arc<AtomicU64>,
}

impl MemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn connect(&self) -> MemoryBackend {
        MemoryBackend {
            database: self.clone(),
            session: self.next_session.fetch_add(1, Ordering::SeqCst),
        }
    }

    pub async fn schema(&self) -> Schema {
        self.state.lock().await.schema.clone()
    }

    pub async fn revision(&self) -> Option<String> {
        self.state.lock().await.revision.clone()
    }

    /// Inserts `count` rows into `table`, filling each column from its
    /// default.
    pub async fn insert_rows(&self, table: &str, count: usize) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        let table = state.schema.table_mut(table)?;
        let row = table
            .columns
            .iter()
            .map(|column| (column.name.clone(), column.default.clone()))
            .collect::<Row>();
        table.rows.extend(std::iter::repeat(row).take(count));
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryBackend {
    database: MemoryDatabase,
    session: u64,
}

#[async_trait]
impl SchemaBackend for MemoryBackend {
    async fn try_lock(&mut self) -> Result<bool, BackendError> {
        let mut state = self.database.state.lock().await;
        match state.lock_holder {
            Some(holder) => Ok(holder == self.session),
            None => {
                state.lock_holder = Some(self.session);
                Ok(true)
            }
        }
    }

    async fn unlock(&mut self) -> Result<(), BackendError> {
        let mut state = self.database.state.lock().await;
        if state.lock_holder == Some(self.session) {
            state.lock_holder = None;
        }
        Ok(())
    }

    async fn current_revision(&mut self) -> Result<Option<String>, BackendError> {
        Ok(self.database.state.lock().await.revision.clone())
    }

    async fn apply(
        &mut self,
        primitives: &[Primitive],
        marker: Option<&str>,
    ) -> Result<(), BackendError> {
        let mut state = self.database.state.lock().await;
        let mut schema = state.schema.clone();
        for primitive in primitives {
            schema.apply(primitive)?;
        }
        state.schema = schema;
        state.revision = marker.map(ToString::to_string);
        Ok(())
    }
}
