//! PostgreSQL backend.
//!
//! The marker lives in `schema_revision`, a table holding at most one row.
//! Each step runs in its own transaction together with the marker update,
//! and a session advisory lock keeps concurrent runs out.

use async_trait::async_trait;
use sqlx::{pool::PoolConnection, Connection as _, PgConnection, PgPool, Postgres};

use crate::{
    backend::{Direction, SchemaBackend},
    chain::Chain,
    error::BackendError,
    schema::{Column, Primitive},
};

/// Advisory lock key shared by every migration run.
const LOCK_KEY: i64 = 0x6d69_6772_6174_696f;

const CREATE_MARKER_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS schema_revision (revision TEXT NOT NULL)";

/// Runs migrations over one pooled connection.
///
/// Dropping a backend that still holds the lock detaches its connection from
/// the pool and closes it, which ends the session and with it the lock.
pub struct PgBackend {
    connection: Option<PoolConnection<Postgres>>,
    locked: bool,
}

impl PgBackend {
    /// Checks a connection out of `pool` for the lifetime of the backend.
    /// Advisory locks belong to a session, so every statement of a run goes
    /// through this one connection.
    pub async fn connect(pool: &PgPool) -> Result<Self, BackendError> {
        Ok(Self {
            connection: Some(pool.acquire().await?),
            locked: false,
        })
    }

    fn connection(&mut self) -> Result<&mut PgConnection, BackendError> {
        self.connection
            .as_deref_mut()
            .ok_or(BackendError::Sql(sqlx::Error::PoolClosed))
    }
}

impl Drop for PgBackend {
    fn drop(&mut self) {
        if self.locked {
            if let Some(connection) = self.connection.take() {
                warn!("closing a migration connection that still holds the lock");
                drop(connection.detach());
            }
        }
    }
}

#[async_trait]
impl SchemaBackend for PgBackend {
    async fn try_lock(&mut self) -> Result<bool, BackendError> {
        if self.locked {
            return Ok(true);
        }

        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(LOCK_KEY)
            .fetch_one(self.connection()?)
            .await?;
        self.locked = acquired;
        Ok(acquired)
    }

    async fn unlock(&mut self) -> Result<(), BackendError> {
        if self.locked {
            sqlx::query("SELECT pg_advisory_unlock($1)")
                .bind(LOCK_KEY)
                .execute(self.connection()?)
                .await?;
            self.locked = false;
        }
        Ok(())
    }

    async fn current_revision(&mut self) -> Result<Option<String>, BackendError> {
        let exists: bool =
            sqlx::query_scalar("SELECT to_regclass('schema_revision') IS NOT NULL")
                .fetch_one(self.connection()?)
                .await?;
        if !exists {
            return Ok(None);
        }

        Ok(
            sqlx::query_scalar::<_, String>("SELECT revision FROM schema_revision")
                .fetch_optional(self.connection()?)
                .await?,
        )
    }

    async fn apply(
        &mut self,
        primitives: &[Primitive],
        marker: Option<&str>,
    ) -> Result<(), BackendError> {
        let mut tx = self.connection()?.begin().await?;
        for primitive in primitives {
            sqlx::query(&render(primitive)).execute(&mut tx).await?;
        }

        sqlx::query(CREATE_MARKER_TABLE).execute(&mut tx).await?;
        sqlx::query("DELETE FROM schema_revision")
            .execute(&mut tx)
            .await?;
        if let Some(marker) = marker {
            sqlx::query("INSERT INTO schema_revision (revision) VALUES ($1)")
                .bind(marker)
                .execute(&mut tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn column_definition(column: &Column) -> String {
    let mut definition = format!("{} {}", quote(&column.name), column.ty.sql());
    if column.primary_key {
        definition.push_str(" PRIMARY KEY");
    } else if !column.nullable {
        definition.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        definition.push_str(&format!(" DEFAULT {}", default));
    }
    definition
}

/// The DDL statement for `primitive`.
#[must_use]
pub fn render(primitive: &Primitive) -> String {
    match primitive {
        Primitive::CreateTable(table) => format!(
            "CREATE TABLE {} ({})",
            quote(&table.name),
            table
                .columns
                .iter()
                .map(column_definition)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Primitive::DropTable(table) => format!("DROP TABLE {}", quote(&table.name)),
        Primitive::AddColumn { table, column } => format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote(table),
            column_definition(column)
        ),
        Primitive::DropColumn { table, column } => format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote(table),
            quote(&column.name)
        ),
        Primitive::CreateIndex(index) => format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            quote(&index.name),
            quote(&index.table),
            index
                .columns
                .iter()
                .map(|column| quote(column))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Primitive::DropIndex(index) => format!("DROP INDEX {}", quote(&index.name)),
        Primitive::SetDefault {
            table,
            column,
            default,
            ..
        } => match default {
            Some(default) => format!(
                "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
                quote(table),
                quote(column),
                default
            ),
            None => format!(
                "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
                quote(table),
                quote(column)
            ),
        },
    }
}

/// The SQL a run from depth `from` to depth `to` would execute, for review
/// or for applying by hand. Each step is its own transaction.
#[must_use]
pub fn script(chain: &Chain, direction: Direction, from: usize, to: usize) -> Vec<String> {
    let steps = chain.steps();
    let ordered: Vec<_> = match direction {
        Direction::Upgrade => steps[from.min(to)..to.max(from)].iter().collect(),
        Direction::Downgrade => steps[to.min(from)..from.max(to)].iter().rev().collect(),
    };

    let mut statements = Vec::new();
    for step in ordered {
        let (primitives, marker) = match direction {
            Direction::Upgrade => (step.upgrade().to_vec(), Some(step.revision())),
            Direction::Downgrade => (step.downgrade(), step.down_revision()),
        };

        statements.push(format!("-- {} {}", direction, step.revision()));
        statements.push(String::from("BEGIN;"));
        statements.extend(
            primitives
                .iter()
                .map(|primitive| format!("{};", render(primitive))),
        );
        statements.push(format!("{};", CREATE_MARKER_TABLE));
        statements.push(String::from("DELETE FROM schema_revision;"));
        if let Some(marker) = marker {
            statements.push(format!(
                "INSERT INTO schema_revision (revision) VALUES ('{}');",
                marker.replace('\'', "''")
            ));
        }
        statements.push(String::from("COMMIT;"));
    }
    statements
}
