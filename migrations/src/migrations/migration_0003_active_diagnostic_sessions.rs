use crate::{
    schema::{Column, ColumnType, Index, Literal, Primitive},
    step::Step,
};

pub const REVISION: &str = "7e19b4c2d860";

pub fn migration() -> Step {
    Step::new(REVISION)
        .after(super::migration_0002_lesson_text_direction::REVISION)
        .with_message("track active diagnostic sessions")
        .with_up(Primitive::add_column(
            "diagnostic_sessions",
            Column::new("is_active", ColumnType::Boolean)
                .not_null()
                .default(Literal::Boolean(true)),
        ))
        .with_up(Primitive::CreateIndex(Index::new(
            "ix_diagnostic_sessions_user_active",
            "diagnostic_sessions",
            ["user_id", "is_active"],
        )))
        .with_up(Primitive::set_default(
            "diagnostic_sessions",
            "score",
            Some(Literal::Float(0.0)),
            None,
        ))
}
