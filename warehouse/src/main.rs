//! Pipeline table provisioning tool.
//!
//! Loads a datasource definition, makes sure its table exists with the
//! declared columns, and reads or writes rows through it.
//!
//! # Security Guarantees
//! - Datasource files never hold credentials; pass them via `DATABASE_URL`
//! - Connection URLs are redacted in every log line and error

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use warehouse_core::{
    DatasourceConfig, Row, SqlxConnectionFactory, TableConnection, error::redact_database_url,
    logging::init_logging,
};

#[derive(Parser)]
#[command(name = "warehouse")]
#[command(about = "Provision, validate and query pipeline storage tables")]
#[command(version)]
#[command(long_about = "
Warehouse - pipeline table lifecycle

Every command first makes sure the datasource's table is usable:
- the table is created from its create script when absent
- its live columns must equal the declared primary and data keys

SUPPORTED DIALECTS:
- MySQL (mysql://)
- PostgreSQL (postgres://)

EXAMPLES:
  warehouse ensure --config prices.json
  warehouse get --config prices.json --filter id=1 --column value
  warehouse put --config prices.json --set id=1 --set value=4.2
")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the table if absent and validate its columns
    Ensure(TableArgs),
    /// Read rows matching primary-key filters
    Get(GetArgs),
    /// Write one row, upserting on the primary keys
    Put(PutArgs),
}

#[derive(Args)]
struct TableArgs {
    /// Datasource definition file
    #[arg(short, long, help = "Datasource definition (JSON)")]
    config: PathBuf,

    /// Database connection URL
    #[arg(
        long,
        env = "DATABASE_URL",
        help = "Database connection string (credentials will be sanitized in logs)"
    )]
    database_url: Option<String>,

    /// Per-statement timeout override
    #[arg(long, value_name = "SECS", help = "Per-statement timeout in seconds")]
    query_timeout: Option<u64>,
}

#[derive(Args)]
struct GetArgs {
    #[command(flatten)]
    table: TableArgs,

    /// Primary-key filters
    #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    filters: Vec<(String, Value)>,

    /// Columns to return (default: all declared columns)
    #[arg(long = "column", value_name = "COLUMN")]
    columns: Vec<String>,
}

#[derive(Args)]
struct PutArgs {
    #[command(flatten)]
    table: TableArgs,

    /// Column values to write
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment, required = true)]
    values: Vec<(String, Value)>,
}

#[derive(Args)]
struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all logs except errors")]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, help = "Write logs as JSON lines to stderr")]
    log_json: bool,
}

/// Parses `key=value`; the value is read as JSON when it parses, else as text.
fn parse_assignment(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing column name in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn to_row(assignments: &[(String, Value)]) -> Row {
    assignments.iter().cloned().collect()
}

/// Loads the datasource and applies command-line connection overrides.
fn load_config(args: &TableArgs) -> Result<DatasourceConfig> {
    let config = DatasourceConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    Ok(match args.query_timeout {
        Some(secs) => {
            let connection = config
                .connection
                .clone()
                .with_query_timeout(Duration::from_secs(secs));
            config.with_connection(connection)
        }
        None => config,
    })
}

async fn open_table(args: &TableArgs) -> Result<TableConnection> {
    let config = load_config(args)?;

    let factory = match &args.database_url {
        Some(url) => {
            info!("Target: {}", redact_database_url(url));
            SqlxConnectionFactory::with_url(url.clone())
        }
        None => SqlxConnectionFactory::new(),
    };

    let table = TableConnection::open(&config, &factory).await?;
    info!("{}: {} is {}", table, table.table(), table.state());
    Ok(table)
}

async fn ensure(args: &TableArgs) -> Result<()> {
    let mut table = open_table(args).await?;
    let report = table.report();
    let summary = serde_json::json!({
        "datasource": table.name(),
        "table": table.table().to_string(),
        "dialect": table.dialect().name(),
        "created": report.created,
        "statements_executed": report.statements_executed,
        "columns": report.columns,
    });
    table.close().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn get(args: &GetArgs) -> Result<()> {
    let mut table = open_table(&args.table).await?;
    let columns: Vec<&str> = args.columns.iter().map(String::as_str).collect();
    let rows = table.get_data(&to_row(&args.filters), &columns).await?;
    table.close().await?;

    info!("{}: {} rows", table, rows.len());
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

async fn put(args: &PutArgs) -> Result<()> {
    let payload = to_row(&args.values);
    if payload.len() != args.values.len() {
        bail!("a column was assigned more than once");
    }

    let mut table = open_table(&args.table).await?;
    table.put_data(&payload).await?;
    table.close().await?;

    info!("{}: wrote 1 row", table);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_json)?;

    match &cli.command {
        Command::Ensure(args) => ensure(args).await,
        Command::Get(args) => get(args).await,
        Command::Put(args) => put(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_assignment_json_and_text() {
        assert_eq!(
            parse_assignment("id=1").unwrap(),
            ("id".to_string(), json!(1))
        );
        assert_eq!(
            parse_assignment("value=4.2").unwrap(),
            ("value".to_string(), json!(4.2))
        );
        assert_eq!(
            parse_assignment("name=jita").unwrap(),
            ("name".to_string(), json!("jita"))
        );
        assert_eq!(
            parse_assignment("region=null").unwrap(),
            ("region".to_string(), Value::Null)
        );
        assert_eq!(
            parse_assignment("expr=a=b").unwrap(),
            ("expr".to_string(), json!("a=b"))
        );
    }

    #[test]
    fn test_parse_assignment_rejects_malformed() {
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_get_arguments() {
        let cli = Cli::try_parse_from([
            "warehouse",
            "-v",
            "get",
            "--config",
            "prices.json",
            "--filter",
            "id=1",
            "--column",
            "value",
            "--column",
            "ts",
        ])
        .unwrap();

        assert_eq!(cli.global.verbose, 1);
        match cli.command {
            Command::Get(args) => {
                assert_eq!(args.table.config, PathBuf::from("prices.json"));
                assert_eq!(args.filters, vec![("id".to_string(), json!(1))]);
                assert_eq!(args.columns, vec!["value".to_string(), "ts".to_string()]);
            }
            _ => panic!("expected get"),
        }
    }

    #[test]
    fn test_query_timeout_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{
                "name": "prices",
                "dialect": "mysql",
                "schema_name": "prosper",
                "table_name": "prices",
                "primary_keys": ["id"],
                "data_keys": ["value"]
            }"#,
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let cli = Cli::try_parse_from([
            "warehouse",
            "ensure",
            "--config",
            path,
            "--query-timeout",
            "5",
        ])
        .unwrap();
        let Command::Ensure(args) = cli.command else {
            panic!("expected ensure");
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.connection.query_timeout(), Duration::from_secs(5));

        let cli = Cli::try_parse_from(["warehouse", "ensure", "--config", path]).unwrap();
        let Command::Ensure(args) = cli.command else {
            panic!("expected ensure");
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.connection.query_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_put_requires_values() {
        assert!(Cli::try_parse_from(["warehouse", "put", "--config", "prices.json"]).is_err());
    }

    #[test]
    fn test_to_row_keeps_last_assignment() {
        let row = to_row(&[
            ("id".to_string(), json!(1)),
            ("id".to_string(), json!(2)),
        ]);
        assert_eq!(row.len(), 1);
        assert_eq!(row["id"], json!(2));
    }
}
