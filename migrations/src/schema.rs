//! Schema-change primitives.
//!
//! Every primitive carries enough of the schema it touches to be inverted
//! without looking at the database, which is how a [`Step`](crate::Step)
//! derives its downgrade.

use std::fmt::{self, Display};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    BigSerial,
    BigInt,
    Integer,
    Double,
    Boolean,
    Text,
    Timestamp,
}

impl ColumnType {
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::BigSerial => "BIGSERIAL",
            Self::BigInt => "BIGINT",
            Self::Integer => "INTEGER",
            Self::Double => "DOUBLE PRECISION",
            Self::Boolean => "BOOLEAN",
            Self::Text => "TEXT",
            Self::Timestamp => "TIMESTAMPTZ",
        }
    }
}

/// A literal usable as a column default, and as a stored value in the
/// in-memory schema.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Boolean(bool),
    Float(f64),
    Integer(i64),
    Text(String),
    CurrentTimestamp,
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{}", value),
            // Debug keeps the trailing `.0` so the literal stays a float.
            Self::Float(value) => write!(f, "{:?}", value),
            Self::Integer(value) => write!(f, "{}", value),
            Self::Text(value) => write!(f, "'{}'", value.replace('\'', "''")),
            Self::CurrentTimestamp => f.write_str("now()"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: Option<Literal>,
    pub primary_key: bool,
}

impl Column {
    /// A nullable column without a default.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            default: None,
            primary_key: false,
        }
    }

    /// A `BIGSERIAL PRIMARY KEY` column.
    pub fn primary_key(name: impl Into<String>) -> Self {
        Self {
            primary_key: true,
            nullable: false,
            ..Self::new(name, ColumnType::BigSerial)
        }
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn default(mut self, value: Literal) -> Self {
        self.default = Some(value);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl Index {
    pub fn new<I, S>(name: impl Into<String>, table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<Column>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    CreateTable(TableDefinition),
    DropTable(TableDefinition),
    AddColumn {
        table: String,
        column: Column,
    },
    DropColumn {
        table: String,
        column: Column,
    },
    CreateIndex(Index),
    DropIndex(Index),
    SetDefault {
        table: String,
        column: String,
        default: Option<Literal>,
        previous: Option<Literal>,
    },
}

impl Primitive {
    pub fn create_table(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self::CreateTable(TableDefinition {
            name: name.into(),
            columns,
        })
    }

    /// Adds `column` to `table`. Rows that exist when the step runs receive
    /// the column's default (or NULL); later inserts rely on the column default
    /// like any other insert.
    pub fn add_column(table: impl Into<String>, column: Column) -> Self {
        Self::AddColumn {
            table: table.into(),
            column,
        }
    }

    pub fn set_default(
        table: impl Into<String>,
        column: impl Into<String>,
        default: Option<Literal>,
        previous: Option<Literal>,
    ) -> Self {
        Self::SetDefault {
            table: table.into(),
            column: column.into(),
            default,
            previous,
        }
    }

    /// The primitive that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::CreateTable(table) => Self::DropTable(table.clone()),
            Self::DropTable(table) => Self::CreateTable(table.clone()),
            Self::AddColumn { table, column } => Self::DropColumn {
                table: table.clone(),
                column: column.clone(),
            },
            Self::DropColumn { table, column } => Self::AddColumn {
                table: table.clone(),
                column: column.clone(),
            },
            Self::CreateIndex(index) => Self::DropIndex(index.clone()),
            Self::DropIndex(index) => Self::CreateIndex(index.clone()),
            Self::SetDefault {
                table,
                column,
                default,
                previous,
            } => Self::SetDefault {
                table: table.clone(),
                column: column.clone(),
                default: previous.clone(),
                previous: default.clone(),
            },
        }
    }
}

impl Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable(table) => write!(f, "create table {}", table.name),
            Self::DropTable(table) => write!(f, "drop table {}", table.name),
            Self::AddColumn { table, column } => {
                write!(f, "add column {}.{}", table, column.name)
            }
            Self::DropColumn { table, column } => {
                write!(f, "drop column {}.{}", table, column.name)
            }
            Self::CreateIndex(index) => write!(f, "create index {}", index.name),
            Self::DropIndex(index) => write!(f, "drop index {}", index.name),
            Self::SetDefault { table, column, .. } => {
                write!(f, "set default on {}.{}", table, column)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_is_involutive() {
        let primitives = vec![
            Primitive::create_table("lessons", vec![Column::primary_key("id")]),
            Primitive::add_column(
                "daily_flashcard_progress",
                Column::new("time_spent", ColumnType::Double).default(Literal::Float(0.0)),
            ),
            Primitive::CreateIndex(Index::new("ix_users_email", "users", ["email"]).unique()),
            Primitive::set_default("users", "is_active", Some(Literal::Boolean(true)), None),
        ];

        for primitive in primitives {
            assert_ne!(primitive.inverse(), primitive);
            assert_eq!(primitive.inverse().inverse(), primitive);
        }
    }

    #[test]
    fn set_default_inverse_swaps_values() {
        let primitive =
            Primitive::set_default("users", "locale", Some(Literal::Text(String::from("en"))), None);
        assert_eq!(
            primitive.inverse(),
            Primitive::set_default("users", "locale", None, Some(Literal::Text(String::from("en"))))
        );
    }

    #[test]
    fn literals_render_as_sql() {
        assert_eq!(Literal::Float(0.0).to_string(), "0.0");
        assert_eq!(Literal::Boolean(true).to_string(), "true");
        assert_eq!(Literal::Text(String::from("it's")).to_string(), "'it''s'");
        assert_eq!(Literal::CurrentTimestamp.to_string(), "now()");
    }
}
