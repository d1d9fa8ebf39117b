use crate::{
    schema::{Column, ColumnType, Index, Literal, Primitive},
    step::Step,
};

pub const REVISION: &str = "4b6f0e2a9c31";

pub fn migration() -> Step {
    Step::new(REVISION)
        .with_message("learning platform baseline")
        .with_up(Primitive::create_table(
            "users",
            vec![
                Column::primary_key("id"),
                Column::new("email", ColumnType::Text).not_null(),
                Column::new("display_name", ColumnType::Text),
                Column::new("created_at", ColumnType::Timestamp)
                    .not_null()
                    .default(Literal::CurrentTimestamp),
            ],
        ))
        .with_up(Primitive::CreateIndex(
            Index::new("ix_users_email", "users", ["email"]).unique(),
        ))
        .with_up(Primitive::create_table(
            "lessons",
            vec![
                Column::primary_key("id"),
                Column::new("title", ColumnType::Text).not_null(),
                Column::new("language", ColumnType::Text)
                    .not_null()
                    .default(Literal::Text(String::from("en"))),
                Column::new("position", ColumnType::Integer)
                    .not_null()
                    .default(Literal::Integer(0)),
            ],
        ))
        .with_up(Primitive::create_table(
            "diagnostic_sessions",
            vec![
                Column::primary_key("id"),
                Column::new("user_id", ColumnType::BigInt).not_null(),
                Column::new("started_at", ColumnType::Timestamp)
                    .not_null()
                    .default(Literal::CurrentTimestamp),
                Column::new("score", ColumnType::Double),
            ],
        ))
        .with_up(Primitive::create_table(
            "daily_flashcard_progress",
            vec![
                Column::primary_key("id"),
                Column::new("user_id", ColumnType::BigInt).not_null(),
                Column::new("day", ColumnType::Timestamp).not_null(),
                Column::new("cards_reviewed", ColumnType::Integer)
                    .not_null()
                    .default(Literal::Integer(0)),
            ],
        ))
        .with_up(Primitive::CreateIndex(
            Index::new(
                "ix_daily_flashcard_progress_user_day",
                "daily_flashcard_progress",
                ["user_id", "day"],
            )
            .unique(),
        ))
}
