use once_cell::sync::OnceCell;
use sqlx::PgPool;

use crate::config::Configuration;

static POOL: OnceCell<PgPool> = OnceCell::new();

#[must_use]
pub fn pool() -> &'static PgPool {
    POOL.get().expect("uninitialized pool access")
}

pub async fn initialize(configuration: &Configuration) -> Result<(), sqlx::Error> {
    if POOL.get().is_none() {
        let pool = PgPool::connect(&configuration.database_url).await?;
        POOL.set(pool).ok();
    }
    Ok(())
}
