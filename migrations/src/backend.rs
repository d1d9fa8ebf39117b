use std::fmt::{self, Display};

use async_trait::async_trait;

use crate::{error::BackendError, schema::Primitive};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Upgrade,
    Downgrade,
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upgrade => f.write_str("upgrade"),
            Self::Downgrade => f.write_str("downgrade"),
        }
    }
}

/// Storage that a [`Migrator`](crate::Migrator) drives.
#[async_trait]
pub trait SchemaBackend: Send {
    /// Attempts to take the migration lock without waiting.
    async fn try_lock(&mut self) -> Result<bool, BackendError>;

    async fn unlock(&mut self) -> Result<(), BackendError>;

    /// The stored revision marker, `None` at base.
    async fn current_revision(&mut self) -> Result<Option<String>, BackendError>;

    /// Applies `primitives` and moves the marker to `marker` as one atomic
    /// unit. On error nothing is changed.
    async fn apply(
        &mut self,
        primitives: &[Primitive],
        marker: Option<&str>,
    ) -> Result<(), BackendError>;
}
