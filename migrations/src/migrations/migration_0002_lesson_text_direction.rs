use crate::{
    schema::{Column, ColumnType, Literal, Primitive},
    step::Step,
};

pub const REVISION: &str = "1f9a3e6b7c20";

pub fn migration() -> Step {
    Step::new(REVISION)
        .after(super::migration_0001_baseline::REVISION)
        .with_message("lessons carry their text direction")
        .with_up(Primitive::add_column(
            "lessons",
            Column::new("text_direction", ColumnType::Text)
                .not_null()
                .default(Literal::Text(String::from("ltr"))),
        ))
}
