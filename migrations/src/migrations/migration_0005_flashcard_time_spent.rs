use crate::{
    schema::{Column, ColumnType, Literal, Primitive},
    step::Step,
};

pub const REVISION: &str = "dffdc5ac1334";

pub fn migration() -> Step {
    Step::new(REVISION)
        .after(super::migration_0004_user_activity::REVISION)
        .with_message("add time_spent to daily flashcard progress")
        .with_up(Primitive::add_column(
            "daily_flashcard_progress",
            Column::new("time_spent", ColumnType::Double).default(Literal::Float(0.0)),
        ))
}
