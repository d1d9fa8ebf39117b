use std::time::{Duration, Instant};

use tracing_futures::Instrument as _;

use crate::{
    backend::{Direction, SchemaBackend},
    chain::{Chain, Target},
    error::MigrationError,
    step::Step,
};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs a resolved [`Chain`] against a [`SchemaBackend`].
pub struct Migrator<B> {
    chain: Chain,
    backend: B,
    lock_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub revision: String,
    pub down_revision: Option<String>,
    pub message: String,
    pub applied: bool,
    pub current: bool,
}

impl<B: SchemaBackend> Migrator<B> {
    pub fn new(chain: Chain, backend: B) -> Self {
        Self {
            chain,
            backend,
            lock_timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub async fn current(&mut self) -> Result<Option<String>, MigrationError> {
        let current = self.backend.current_revision().await?;
        // Reject markers from a history this binary doesn't know.
        self.chain.depth(current.as_deref())?;
        Ok(current)
    }

    pub async fn history(&mut self) -> Result<Vec<HistoryEntry>, MigrationError> {
        let current = self.current().await?;
        let applied = self.chain.depth(current.as_deref())?;
        Ok(self
            .chain
            .steps()
            .iter()
            .enumerate()
            .map(|(index, step)| HistoryEntry {
                revision: step.revision().to_string(),
                down_revision: step.down_revision().map(ToString::to_string),
                message: step.message().to_string(),
                applied: index < applied,
                current: index + 1 == applied,
            })
            .collect())
    }

    /// Applies every step between the current revision and `target`.
    /// Returns the revision the database ends up at.
    pub async fn upgrade(&mut self, target: &Target) -> Result<Option<String>, MigrationError> {
        self.locked(Direction::Upgrade, target).await
    }

    /// Reverts every step between the current revision and `target`.
    /// Returns the revision the database ends up at.
    pub async fn downgrade(&mut self, target: &Target) -> Result<Option<String>, MigrationError> {
        self.locked(Direction::Downgrade, target).await
    }

    async fn locked(
        &mut self,
        direction: Direction,
        target: &Target,
    ) -> Result<Option<String>, MigrationError> {
        self.acquire_lock().await?;
        let result = self.run(direction, target).await;
        if let Err(err) = self.backend.unlock().await {
            error!("Error releasing migration lock: {:?}", err);
            if result.is_ok() {
                return Err(err.into());
            }
        }
        result
    }

    async fn acquire_lock(&mut self) -> Result<(), MigrationError> {
        let started = Instant::now();
        loop {
            if self.backend.try_lock().await? {
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= self.lock_timeout {
                return Err(MigrationError::MigrationLocked { waited });
            }
            debug!("migration lock is held, retrying");
            tokio::time::sleep(LOCK_POLL_INTERVAL.min(self.lock_timeout - waited)).await;
        }
    }

    async fn run(
        &mut self,
        direction: Direction,
        target: &Target,
    ) -> Result<Option<String>, MigrationError> {
        let current = self.current().await?;
        let from = self.chain.depth(current.as_deref())?;
        let to = self.chain.resolve_target(target, current.as_deref())?;

        let wrong_direction = match direction {
            Direction::Upgrade => to < from,
            Direction::Downgrade => to > from,
        };
        if wrong_direction {
            return Err(MigrationError::WrongDirection {
                direction,
                from: current,
                to: self.chain.revision_at(to).map(ToString::to_string),
            });
        }

        if from == to {
            info!(
                "database already at {}, nothing to {}",
                current.as_deref().unwrap_or("base"),
                direction
            );
            return Ok(current);
        }

        let steps = match direction {
            Direction::Upgrade => self.chain.steps()[from..to].to_vec(),
            Direction::Downgrade => self.chain.steps()[to..from].iter().rev().cloned().collect(),
        };

        info!(
            "running {} step(s) to {} from {} to {}",
            steps.len(),
            direction,
            current.as_deref().unwrap_or("base"),
            self.chain.revision_at(to).unwrap_or("base")
        );

        for step in &steps {
            let span = info_span!("step", revision = step.revision(), direction = %direction);
            self.apply_step(step, direction).instrument(span).await?;
        }

        Ok(self.chain.revision_at(to).map(ToString::to_string))
    }

    async fn apply_step(&mut self, step: &Step, direction: Direction) -> Result<(), MigrationError> {
        let (primitives, marker) = match direction {
            Direction::Upgrade => (step.upgrade().to_vec(), Some(step.revision())),
            Direction::Downgrade => (step.downgrade(), step.down_revision()),
        };

        for primitive in &primitives {
            debug!("{}", primitive);
        }

        let started = Instant::now();
        match self.backend.apply(&primitives, marker).await {
            Ok(()) => {
                info!(
                    "{} {} completed in {:.2}s",
                    direction,
                    step.revision(),
                    started.elapsed().as_secs_f64()
                );
                Ok(())
            }
            Err(err) => {
                error!("{} {} failed: {}", direction, step.revision(), err);
                Err(MigrationError::for_step(step.revision(), err))
            }
        }
    }
}
