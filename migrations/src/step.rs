use crate::schema::Primitive;

/// One revision of the schema history.
///
/// Only the upgrade is written down. The downgrade is the upgrade with each
/// primitive inverted, in reverse order.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    revision: String,
    down_revision: Option<String>,
    message: String,
    upgrade: Vec<Primitive>,
}

impl Step {
    /// A root revision. Use [`Self::after`] to link it to its predecessor.
    pub fn new(revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            down_revision: None,
            message: String::new(),
            upgrade: Vec::new(),
        }
    }

    #[must_use]
    pub fn after(mut self, down_revision: impl Into<String>) -> Self {
        self.down_revision = Some(down_revision.into());
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_up(mut self, primitive: Primitive) -> Self {
        self.upgrade.push(primitive);
        self
    }

    #[must_use]
    pub fn revision(&self) -> &str {
        &self.revision
    }

    #[must_use]
    pub fn down_revision(&self) -> Option<&str> {
        self.down_revision.as_deref()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn upgrade(&self) -> &[Primitive] {
        &self.upgrade
    }

    #[must_use]
    pub fn downgrade(&self) -> Vec<Primitive> {
        self.upgrade.iter().rev().map(Primitive::inverse).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType, Index, Literal};

    #[test]
    fn downgrade_reverses_and_inverts() {
        let step = Step::new("c52a7d9e1b04")
            .after("7e19b4c2d860")
            .with_up(Primitive::add_column(
                "users",
                Column::new("last_active_at", ColumnType::Timestamp),
            ))
            .with_up(Primitive::CreateIndex(Index::new(
                "ix_users_last_active_at",
                "users",
                ["last_active_at"],
            )));

        let downgrade = step.downgrade();
        assert_eq!(downgrade.len(), 2);
        assert!(matches!(&downgrade[0], Primitive::DropIndex(index) if index.name == "ix_users_last_active_at"));
        assert!(matches!(&downgrade[1], Primitive::DropColumn { column, .. } if column.name == "last_active_at"));
        assert_eq!(step.down_revision(), Some("7e19b4c2d860"));
    }

    #[test]
    fn root_has_no_down_revision() {
        let step = Step::new("4b6f0e2a9c31").with_up(Primitive::set_default(
            "users",
            "locale",
            Some(Literal::Text(String::from("en"))),
            None,
        ));
        assert_eq!(step.down_revision(), None);
        assert_eq!(step.downgrade(), vec![step.upgrade()[0].inverse()]);
    }
}
