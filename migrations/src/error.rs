use std::time::Duration;

use crate::backend::Direction;

#[derive(thiserror::Error, Debug)]
pub enum MigrationError {
    #[error("unknown revision '{0}'")]
    UnknownRevision(String),

    #[error("revision prefix '{prefix}' is ambiguous: {}", .candidates.join(", "))]
    AmbiguousRevision {
        prefix: String,
        candidates: Vec<String>,
    },

    #[error("relative target {offset:+} from {} is outside of the history", .from.as_deref().unwrap_or("base"))]
    RelativeOutOfRange { from: Option<String>, offset: i64 },

    #[error("revisions {} all declare down revision {}", .revisions.join(", "), .down_revision.as_deref().unwrap_or("<root>"))]
    MigrationConflict {
        down_revision: Option<String>,
        revisions: Vec<String>,
    },

    #[error("revision '{0}' is defined more than once")]
    DuplicateRevision(String),

    #[error("revision '{revision}' follows unknown revision '{down_revision}'")]
    MissingPredecessor {
        revision: String,
        down_revision: String,
    },

    #[error("revisions {} are not reachable from the root", .0.join(", "))]
    CyclicHistory(Vec<String>),

    #[error("cannot {direction} from {} to {}", .from.as_deref().unwrap_or("base"), .to.as_deref().unwrap_or("base"))]
    WrongDirection {
        direction: Direction,
        from: Option<String>,
        to: Option<String>,
    },

    #[error("another migration holds the lock (waited {waited:?})")]
    MigrationLocked { waited: Duration },

    #[error("revision {revision} failed: {source}")]
    StepApplicationFailed {
        revision: String,
        #[source]
        source: BackendError,
    },

    #[error("revision {revision} is already applied: {reason}")]
    StepAlreadyApplied { revision: String, reason: String },

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl MigrationError {
    /// Attributes a failure raised while applying `revision`.
    #[must_use]
    pub fn for_step(revision: &str, error: BackendError) -> Self {
        match error {
            BackendError::AlreadyExists(reason) => Self::StepAlreadyApplied {
                revision: revision.to_string(),
                reason,
            },
            other => Self::StepApplicationFailed {
                revision: revision.to_string(),
                source: other,
            },
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Sql(sqlx::Error),
}

impl From<sqlx::Error> for BackendError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(database_error) = &error {
            // duplicate_column, duplicate_table (also raised for indexes), duplicate_object
            if database_error
                .code()
                .map(|c| c == "42701" || c == "42P07" || c == "42710")
                .unwrap_or_default()
            {
                return Self::AlreadyExists(database_error.message().to_string());
            }
        }

        Self::Sql(error)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_errors_are_attributed() {
        let error = MigrationError::for_step(
            "dffdc5ac1334",
            BackendError::AlreadyExists(String::from("column \"time_spent\" already exists")),
        );
        assert!(matches!(
            &error,
            MigrationError::StepAlreadyApplied { revision, .. } if revision == "dffdc5ac1334"
        ));

        let error = MigrationError::for_step(
            "dffdc5ac1334",
            BackendError::Rejected(String::from("relation \"daily_flashcard_progress\" does not exist")),
        );
        let message = error.to_string();
        assert!(message.contains("dffdc5ac1334"));
        assert!(message.contains("does not exist"));
    }

    #[test]
    fn conflict_lists_revisions() {
        let error = MigrationError::MigrationConflict {
            down_revision: None,
            revisions: vec![String::from("a"), String::from("b")],
        };
        assert_eq!(error.to_string(), "revisions a, b all declare down revision <root>");
    }
}
