#![forbid(unsafe_code)]

#[macro_use]
extern crate tracing;

use std::time::Duration;

use cli_table::{Table, WithTitle as _};
use migrations::{
    postgres::{self, PgBackend},
    Chain, Configuration, Direction, MigrationError, Migrator, Target,
};
use structopt::{clap::AppSettings, StructOpt};

#[derive(StructOpt, Debug)]
#[structopt(
    name = "migrations",
    about = "Applies and reverts the learning platform's schema revisions"
)]
/// the command line interface for the executable
struct Cli {
    /// Connection string, overriding DATABASE_URL
    #[structopt(long)]
    database_url: Option<String>,

    /// How long to wait for a concurrent run to release its lock, overriding
    /// MIGRATION_LOCK_TIMEOUT_MS
    #[structopt(long)]
    lock_timeout_ms: Option<u64>,

    /// The command to execute
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt, Debug)]
#[structopt(about = "commands to execute")]
enum Command {
    /// Applies revisions up to TARGET: head, a revision, a unique prefix or +N
    Upgrade {
        #[structopt(default_value = "head")]
        target: Target,

        #[structopt(flatten)]
        offline: Offline,
    },
    /// Reverts revisions down to TARGET: base, a revision, a unique prefix or -N
    #[structopt(setting = AppSettings::AllowNegativeNumbers)]
    Downgrade {
        #[structopt(default_value = "-1")]
        target: Target,

        #[structopt(flatten)]
        offline: Offline,
    },
    /// Prints the database's current revision
    Current,
    /// Lists the known revisions, oldest first, with what the database has applied
    Status,
    /// Lists the known revisions, oldest first, without connecting
    History,
}

#[derive(StructOpt, Debug)]
struct Offline {
    /// Print the SQL instead of running it
    #[structopt(long)]
    sql: bool,

    /// Revision the printed SQL starts from (defaults to base for upgrades, head for downgrades)
    #[structopt(long, requires = "sql")]
    from: Option<String>,
}

#[derive(Table)]
struct Revision {
    #[table(title = "Revision")]
    revision: String,
    #[table(title = "Down revision")]
    down_revision: String,
    #[table(title = "Applied")]
    applied: &'static str,
    #[table(title = "Message")]
    message: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    initialize_logging()?;

    let cli = Cli::from_args();
    let chain = migrations::migrations::chain()?;
    match cli.command {
        Command::History => print_history(&chain, None),
        Command::Upgrade { target, offline } if offline.sql => {
            print_script(&chain, Direction::Upgrade, &target, offline.from)
        }
        Command::Downgrade { target, offline } if offline.sql => {
            print_script(&chain, Direction::Downgrade, &target, offline.from)
        }
        Command::Upgrade { target, .. } => {
            let mut migrator = connect(cli.database_url, cli.lock_timeout_ms).await?;
            print_revision(migrator.upgrade(&target).await?);
            Ok(())
        }
        Command::Downgrade { target, .. } => {
            let mut migrator = connect(cli.database_url, cli.lock_timeout_ms).await?;
            print_revision(migrator.downgrade(&target).await?);
            Ok(())
        }
        Command::Current => {
            let mut migrator = connect(cli.database_url, cli.lock_timeout_ms).await?;
            print_revision(migrator.current().await?);
            Ok(())
        }
        Command::Status => {
            let mut migrator = connect(cli.database_url, cli.lock_timeout_ms).await?;
            let history = migrator.history().await?;
            print_history(&chain, Some(history.as_slice()))
        }
    }
}

async fn connect(
    database_url: Option<String>,
    lock_timeout_ms: Option<u64>,
) -> anyhow::Result<Migrator<PgBackend>> {
    let configuration =
        Configuration::load(database_url, lock_timeout_ms.map(Duration::from_millis))?;
    migrations::initialize(&configuration).await?;
    Ok(migrations::migrations::migrator(&configuration).await?)
}

fn print_revision(revision: Option<String>) {
    println!("{}", revision.as_deref().unwrap_or("base"));
}

fn initialize_logging() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
}

fn print_history(
    chain: &Chain,
    history: Option<&[migrations::HistoryEntry]>,
) -> anyhow::Result<()> {
    let rows = chain
        .steps()
        .iter()
        .enumerate()
        .map(|(index, step)| Revision {
            revision: step.revision().to_string(),
            down_revision: step.down_revision().unwrap_or("").to_string(),
            applied: match history.and_then(|history| history.get(index)) {
                Some(entry) if entry.current => "current",
                Some(entry) if entry.applied => "yes",
                Some(_) => "no",
                None => "-",
            },
            message: step.message().to_string(),
        })
        .collect::<Vec<_>>();
    cli_table::print_stdout(rows.with_title())?;
    Ok(())
}

fn print_script(
    chain: &Chain,
    direction: Direction,
    target: &Target,
    from: Option<String>,
) -> anyhow::Result<()> {
    let from = match (from, direction) {
        (Some(from), _) => Some(from),
        (None, Direction::Upgrade) => None,
        (None, Direction::Downgrade) => chain.head().map(ToString::to_string),
    };
    let from_depth = chain.depth(from.as_deref())?;
    let to_depth = chain.resolve_target(target, from.as_deref())?;

    let backwards = match direction {
        Direction::Upgrade => to_depth < from_depth,
        Direction::Downgrade => to_depth > from_depth,
    };
    if backwards {
        return Err(MigrationError::WrongDirection {
            direction,
            from,
            to: chain.revision_at(to_depth).map(ToString::to_string),
        }
        .into());
    }

    info!(
        "rendering {} from {} to {}",
        direction,
        from.as_deref().unwrap_or("base"),
        chain.revision_at(to_depth).unwrap_or("base")
    );
    for statement in postgres::script(chain, direction, from_depth, to_depth) {
        println!("{}", statement);
    }
    Ok(())
}
