//! rowkeep CLI
//!
//! Opens a database with the store's connection options and inspects it.

use clap::{Parser, Subcommand};
use rowkeep_core::builder::{Parameters, SqlValue, Table};
use rowkeep_sqlite::SqliteQueryBuilder;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rowkeep_store::query::{execute_raw, fetch_records};
use rowkeep_store::store::where_equal;
use rowkeep_store::{ConnectOptions, Database, JournalMode, Writer};

/// Inspect a SQLite database through rowkeep.
#[derive(Parser)]
#[command(name = "rowkeep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database file, `:memory:` or `sqlite:` URL.
    #[arg(short, long, env = "DATABASE_URL", default_value = "db.sqlite3")]
    database: String,

    /// Journal mode to set on open.
    #[arg(long, default_value = "wal")]
    journal_mode: JournalMode,

    /// Do not enforce foreign keys.
    #[arg(long)]
    no_foreign_keys: bool,

    /// Do not issue pragmas on open.
    #[arg(long)]
    no_initialize: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the journal mode and foreign-key setting.
    Pragmas,

    /// Run SQL statements in one write scope.
    Exec {
        /// Statements, run in order.
        #[arg(required = true)]
        sql: Vec<String>,
    },

    /// Print matching rows as JSON lines.
    Select {
        /// Table to read.
        #[arg(short, long)]
        table: String,

        /// Column to return (repeatable).
        #[arg(short, long = "column", required = true)]
        columns: Vec<String>,

        /// Equality filter as `column=value` (repeatable).
        #[arg(short, long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, SqlValue)>,

        /// Maximum number of rows.
        #[arg(short, long)]
        limit: Option<u64>,
    },
}

fn parse_filter(s: &str) -> Result<(String, SqlValue), String> {
    let Some((column, value)) = s.split_once('=') else {
        return Err(format!("expected column=value, got '{s}'"));
    };
    let value = if let Ok(i) = value.parse::<i64>() {
        SqlValue::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        SqlValue::Float(f)
    } else if value.eq_ignore_ascii_case("null") {
        SqlValue::Null
    } else {
        SqlValue::Text(value.to_owned())
    };
    Ok((column.to_owned(), value))
}

async fn exec_all(writer: &Writer<'_>, statements: &[String]) -> rowkeep_store::Result<u64> {
    let mut conn = writer.connection().await?;
    let mut total = 0;
    for statement in statements {
        total += execute_raw(&mut conn, statement).await?;
    }
    Ok(total)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = ConnectOptions::new(cli.database)
        .journal_mode(cli.journal_mode)
        .enforce_foreign_keys(!cli.no_foreign_keys)
        .initialize(!cli.no_initialize);
    let db = Database::open(&options).await?;

    match cli.command {
        Commands::Pragmas => {
            println!("journal_mode: {}", db.journal_mode().await?);
            println!("foreign_keys: {}", db.foreign_keys_enabled().await?);
        }

        Commands::Exec { sql } => {
            let writer = db.writer().await?;
            let result = exec_all(&writer, &sql).await;
            let affected = writer.finish(result).await?;
            info!(statements = sql.len(), affected, "Executed SQL");
        }

        Commands::Select {
            table,
            columns,
            filters,
            limit,
        } => {
            let table = Table::new(table);
            let mut query = SqliteQueryBuilder::new()
                .from_(table.clone())
                .select(columns.iter().map(|c| table.field(c.as_str())));
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            let filters: Parameters = filters.into_iter().collect();
            let query = where_equal(query, &table, &filters)?;

            let records = {
                let reader = db.reader().await?;
                let mut conn = reader.connection().await?;
                fetch_records(&mut conn, &query).await?
            };
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
            info!(rows = records.len(), "Selected rows");
        }
    }

    db.close().await?;
    Ok(())
}
