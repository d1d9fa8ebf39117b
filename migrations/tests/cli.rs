use assert_cmd::prelude::*;
use migrations::{backend::SchemaBackend as _, postgres::PgBackend, Configuration};
use std::{env, process::Command};

fn migrations_bin() -> anyhow::Result<Command> {
    let mut command = Command::cargo_bin("migrations")?;
    command.env_remove("DATABASE_URL");
    Ok(command)
}

fn stdout(command: &mut Command) -> anyhow::Result<String> {
    let assert = command.assert().success();
    Ok(String::from_utf8(assert.get_output().stdout.clone())?)
}

#[test]
fn history_needs_no_database() -> anyhow::Result<()> {
    let output = stdout(migrations_bin()?.arg("history"))?;
    let baseline = output.find("4b6f0e2a9c31").expect("baseline listed");
    let head = output.find("dffdc5ac1334").expect("head listed");
    assert!(baseline < head);
    Ok(())
}

#[test]
fn offline_upgrade_sql() -> anyhow::Result<()> {
    let output = stdout(migrations_bin()?.args(&["upgrade", "--sql"]))?;
    assert!(output.contains(
        r#"ALTER TABLE "daily_flashcard_progress" ADD COLUMN "time_spent" DOUBLE PRECISION DEFAULT 0.0;"#
    ));
    assert_eq!(output.matches("BEGIN;").count(), 5);

    let output = stdout(migrations_bin()?.args(&["upgrade", "--sql", "--from", "c52a7d9e1b04"]))?;
    assert_eq!(output.matches("BEGIN;").count(), 1);
    Ok(())
}

#[test]
fn offline_downgrade_sql_reverts_only_the_head() -> anyhow::Result<()> {
    let output = stdout(migrations_bin()?.args(&["downgrade", "--sql"]))?;
    assert!(output.contains(r#"ALTER TABLE "daily_flashcard_progress" DROP COLUMN "time_spent";"#));
    assert_eq!(output.matches("DROP").count(), 1);
    assert!(output.contains("VALUES ('c52a7d9e1b04');"));

    let output = stdout(migrations_bin()?.args(&["downgrade", "-2", "--sql"]))?;
    assert_eq!(output.matches("BEGIN;").count(), 2);
    Ok(())
}

#[test]
fn offline_sql_rejects_unknown_targets() -> anyhow::Result<()> {
    migrations_bin()?
        .args(&["upgrade", "0000aaaa", "--sql"])
        .assert()
        .failure();
    migrations_bin()?
        .args(&["upgrade", "base", "--sql", "--from", "dffdc5ac1334"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn offline_sql_rejects_overflowing_offsets() -> anyhow::Result<()> {
    let assert = migrations_bin()?
        .args(&["upgrade", "+9223372036854775807", "--sql", "--from", "c52a7d9e1b04"])
        .assert()
        .failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
    assert!(!stderr.contains("panicked"));
    Ok(())
}

#[test]
fn database_url_is_required() -> anyhow::Result<()> {
    let assert = migrations_bin()?.arg("upgrade").assert().failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
    assert!(stderr.contains("DATABASE_URL not set"));
    Ok(())
}

#[tokio::test]
async fn postgres_round_trip() -> anyhow::Result<()> {
    let database_url = match env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => return Ok(()),
    };

    let run = |args: &[&str]| -> anyhow::Result<String> {
        stdout(
            migrations_bin()?
                .arg("--database-url")
                .arg(&database_url)
                .arg("--lock-timeout-ms")
                .arg("300")
                .args(args),
        )
    };

    assert_eq!(run(&["downgrade", "base"])?.trim(), "base");
    assert_eq!(run(&["upgrade", "c52a7d9e1b04"])?.trim(), "c52a7d9e1b04");
    assert_eq!(run(&["current"])?.trim(), "c52a7d9e1b04");
    assert_eq!(run(&["upgrade"])?.trim(), "dffdc5ac1334");
    assert_eq!(run(&["upgrade", "latest"])?.trim(), "dffdc5ac1334");
    assert_eq!(run(&["downgrade"])?.trim(), "c52a7d9e1b04");

    // A run blocked by someone else's lock fails instead of waiting forever.
    let configuration = Configuration::load(Some(database_url.clone()), None)?;
    migrations::initialize(&configuration).await?;
    let mut holder = PgBackend::connect(migrations::pool()).await?;
    assert!(holder.try_lock().await?);
    let assert = migrations_bin()?
        .arg("--database-url")
        .arg(&database_url)
        .arg("--lock-timeout-ms")
        .arg("300")
        .arg("upgrade")
        .assert()
        .failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
    assert!(stderr.contains("lock"));
    holder.unlock().await?;

    // Dropping a backend mid-run closes its session, so the lock goes with it.
    migrations::initialize(&configuration).await?;
    let mut abandoned = PgBackend::connect(migrations::pool()).await?;
    assert!(abandoned.try_lock().await?);
    drop(abandoned);
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let mut next = PgBackend::connect(migrations::pool()).await?;
    assert!(next.try_lock().await?);
    next.unlock().await?;
    drop(next);
    assert_eq!(run(&["upgrade"])?.trim(), "dffdc5ac1334");

    assert_eq!(run(&["downgrade", "base"])?.trim(), "base");
    Ok(())
}
