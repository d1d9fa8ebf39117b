use crate::{
    chain::Chain,
    config::Configuration,
    connection::pool,
    error::MigrationError,
    migrator::Migrator,
    postgres::PgBackend,
    step::Step,
};

mod migration_0001_baseline;
mod migration_0002_lesson_text_direction;
mod migration_0003_active_diagnostic_sessions;
mod migration_0004_user_activity;
mod migration_0005_flashcard_time_spent;

/// Every known revision. New revisions are appended after the current head.
#[must_use]
pub fn migrations() -> Vec<Step> {
    vec![
        migration_0001_baseline::migration(),
        migration_0002_lesson_text_direction::migration(),
        migration_0003_active_diagnostic_sessions::migration(),
        migration_0004_user_activity::migration(),
        migration_0005_flashcard_time_spent::migration(),
    ]
}

pub fn chain() -> Result<Chain, MigrationError> {
    Chain::resolve(migrations())
}

/// A migrator over the shared pool. [`crate::initialize`] must have been
/// called first.
pub async fn migrator(
    configuration: &Configuration,
) -> Result<Migrator<PgBackend>, MigrationError> {
    let backend = PgBackend::connect(pool()).await?;
    Ok(Migrator::new(chain()?, backend).with_lock_timeout(configuration.lock_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::SchemaBackend,
        chain::Target,
        memory::{MemoryDatabase, Schema},
        schema::{ColumnType, Literal},
    };

    #[test]
    fn history_is_linear() -> Result<(), MigrationError> {
        let chain = chain()?;
        assert_eq!(chain.steps().len(), migrations().len());
        assert_eq!(chain.steps()[0].down_revision(), None);
        assert_eq!(chain.head(), Some("dffdc5ac1334"));
        Ok(())
    }

    #[tokio::test]
    async fn every_step_reverts_exactly() -> Result<(), MigrationError> {
        let chain = chain()?;
        let database = MemoryDatabase::new();
        let mut backend = database.connect();

        for step in chain.steps() {
            let before = database.schema().await;
            backend.apply(step.upgrade(), Some(step.revision())).await?;
            assert_ne!(database.schema().await, before, "{} changed nothing", step.revision());

            backend.apply(&step.downgrade(), step.down_revision()).await?;
            assert_eq!(database.schema().await, before, "{} did not revert", step.revision());

            backend.apply(step.upgrade(), Some(step.revision())).await?;
            // Rows written between steps must survive the round trip too.
            for table in ["users", "lessons", "diagnostic_sessions", "daily_flashcard_progress"] {
                database.insert_rows(table, 1).await?;
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn full_upgrade_and_downgrade() -> Result<(), MigrationError> {
        let database = MemoryDatabase::new();
        let mut migrator = Migrator::new(chain()?, database.connect());

        assert_eq!(
            migrator.upgrade(&Target::Head).await?.as_deref(),
            Some("dffdc5ac1334")
        );
        assert_eq!(
            migrator.upgrade(&"latest".parse()?).await?.as_deref(),
            Some("dffdc5ac1334")
        );

        migrator.downgrade(&Target::Base).await?;
        assert_eq!(database.schema().await, Schema::default());
        assert_eq!(database.revision().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn time_spent_revision() -> Result<(), MigrationError> {
        let database = MemoryDatabase::new();
        let mut migrator = Migrator::new(chain()?, database.connect());
        migrator
            .upgrade(&Target::Revision(String::from("c52a7d9e1b04")))
            .await?;
        database.insert_rows("daily_flashcard_progress", 2).await?;
        let before = database.schema().await;

        migrator.upgrade(&Target::Head).await?;
        let schema = database.schema().await;
        let progress = schema.table("daily_flashcard_progress").unwrap();
        let time_spent = progress.column("time_spent").unwrap();
        assert_eq!(time_spent.ty, ColumnType::Double);
        assert!(time_spent.nullable);
        assert_eq!(time_spent.default, Some(Literal::Float(0.0)));
        assert!(progress
            .rows
            .iter()
            .all(|row| row["time_spent"] == Some(Literal::Float(0.0))));

        migrator.downgrade(&Target::Relative(-1)).await?;
        assert_eq!(database.schema().await, before);
        assert_eq!(database.revision().await.as_deref(), Some("c52a7d9e1b04"));
        Ok(())
    }
}
