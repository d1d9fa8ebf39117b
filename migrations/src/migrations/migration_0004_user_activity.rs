use crate::{
    schema::{Column, ColumnType, Index, Primitive},
    step::Step,
};

pub const REVISION: &str = "c52a7d9e1b04";

pub fn migration() -> Step {
    Step::new(REVISION)
        .after(super::migration_0003_active_diagnostic_sessions::REVISION)
        .with_message("record when users were last active")
        .with_up(Primitive::add_column(
            "users",
            Column::new("last_active_at", ColumnType::Timestamp),
        ))
        .with_up(Primitive::CreateIndex(Index::new(
            "ix_users_last_active_at",
            "users",
            ["last_active_at"],
        )))
}
