//! Forneria CLI - sales and stock for a bakery counter.
//!
//! # Usage
//!
//! ```bash
//! # Populate a development database
//! forneria seed
//!
//! # Record a sale (NewSale JSON from a file or stdin)
//! echo '{"cart":[{"productRef":"PAN-MARR","quantity":3}]}' | forneria sale create
//!
//! # Print a receipt
//! forneria sale show <SALE_ID>
//!
//! # Inventory
//! forneria stock in PAN-MARR 50
//! forneria stock out PAS-KUCH 2
//! forneria stock bulk --kind out --quantity 5 PAN-MARR PAN-HALL
//! forneria stock history --product PAN-MARR
//! ```
//!
//! Results are printed to stdout as JSON. Failures print
//! `{"code": ..., "message": ...}` to stderr and exit with status 1.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use forneria_core::MovementKind;
use forneria_db::Database;

mod commands;
mod config;
mod error;

use config::AppConfig;
use error::ApiError;

#[derive(Parser)]
#[command(name = "forneria")]
#[command(author, version, about = "Forneria bakery sales and stock")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record, change and inspect sales
    Sale {
        #[command(subcommand)]
        action: SaleAction,
    },
    /// Inventory movements
    Stock {
        #[command(subcommand)]
        action: StockAction,
    },
    /// Insert development data into an empty database
    Seed,
}

#[derive(Subcommand)]
enum SaleAction {
    /// Create a sale from NewSale JSON
    Create {
        /// JSON file; reads stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Replace a sale's cart from EditSale JSON
    Edit {
        sale_id: String,
        /// JSON file; reads stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Delete a sale and restore its stock
    Delete { sale_id: String },
    /// Print a sale receipt
    Show { sale_id: String },
    /// List recent sales
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Compare stored totals with totals recomputed from the lines
    Verify { sale_id: String },
}

#[derive(Subcommand)]
enum StockAction {
    /// Add units (ENTRY)
    In { product: String, quantity: i64 },
    /// Remove units (EXIT), at most what is on hand
    Out { product: String, quantity: i64 },
    /// Move the same quantity for several products
    Bulk {
        #[arg(short, long, value_enum)]
        kind: KindArg,
        #[arg(short, long)]
        quantity: i64,
        #[arg(required = true)]
        products: Vec<String>,
    },
    /// Show movements, newest first
    History {
        #[arg(short, long)]
        product: Option<String>,
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    In,
    Out,
}

impl From<KindArg> for MovementKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::In => MovementKind::Entry,
            KindArg::Out => MovementKind::Exit,
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => println!("{output}"),
        Err(e) => {
            tracing::error!("Command failed: {e}");
            let body = serde_json::to_string(&e).unwrap_or_else(|_| e.message.clone());
            eprintln!("{body}");
            std::process::exit(1);
        }
    }
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default `info,forneria=debug,sqlx=warn`. Logs go
/// to stderr so stdout stays pure JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,forneria=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<String, ApiError> {
    let config = AppConfig::from_env()?;
    info!(db_path = %config.db_path.display(), store = %config.store_name, "Starting");

    let db = Database::new(config.db_config()).await?;
    execute(db, &config, cli.command).await
}

/// Runs one command and closes the pool whether or not it succeeded.
async fn execute(db: Database, config: &AppConfig, command: Commands) -> Result<String, ApiError> {
    let output = dispatch(&db, config, command).await;
    db.close().await;
    output
}

async fn dispatch(
    db: &Database,
    config: &AppConfig,
    command: Commands,
) -> Result<String, ApiError> {
    match command {
        Commands::Sale { action } => match action {
            SaleAction::Create { file } => {
                let input = commands::read_json(file.as_deref())?;
                render(&commands::sale::create(db, config, &input).await?)
            }
            SaleAction::Edit { sale_id, file } => {
                let input = commands::read_json(file.as_deref())?;
                render(&commands::sale::edit(db, config, &sale_id, &input).await?)
            }
            SaleAction::Delete { sale_id } => {
                render(&commands::sale::delete(db, config, &sale_id).await?)
            }
            SaleAction::Show { sale_id } => {
                render(&commands::sale::show(db, config, &sale_id).await?)
            }
            SaleAction::List { limit } => render(&commands::sale::list(db, config, limit).await?),
            SaleAction::Verify { sale_id } => {
                render(&commands::sale::verify(db, config, &sale_id).await?)
            }
        },
        Commands::Stock { action } => match action {
            StockAction::In { product, quantity } => {
                let kind = MovementKind::Entry;
                render(&commands::stock::adjust(db, config, &product, kind, quantity).await?)
            }
            StockAction::Out { product, quantity } => {
                let kind = MovementKind::Exit;
                render(&commands::stock::adjust(db, config, &product, kind, quantity).await?)
            }
            StockAction::Bulk {
                kind,
                quantity,
                products,
            } => render(
                &commands::stock::bulk(db, config, &products, kind.into(), quantity).await?,
            ),
            StockAction::History { product, limit } => {
                render(&commands::stock::history(db, config, product.as_deref(), limit).await?)
            }
        },
        Commands::Seed => render(&commands::seed::run(db).await?),
    }
}

fn render<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::internal(format!("Failed to render output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_stock_bulk() {
        let cli = Cli::try_parse_from([
            "forneria", "stock", "bulk", "--kind", "out", "--quantity", "5", "PAN-MARR", "PAN-HALL",
        ])
        .unwrap();

        match cli.command {
            Commands::Stock {
                action: StockAction::Bulk { kind, quantity, products },
            } => {
                assert_eq!(MovementKind::from(kind), MovementKind::Exit);
                assert_eq!(quantity, 5);
                assert_eq!(products, vec!["PAN-MARR", "PAN-HALL"]);
            }
            _ => panic!("expected stock bulk"),
        }
    }

    #[tokio::test]
    async fn test_pool_closed_after_failed_command() {
        let db = Database::new(forneria_db::DbConfig::in_memory()).await.unwrap();
        let command = Commands::Sale {
            action: SaleAction::Show {
                sale_id: "ghost".to_string(),
            },
        };

        let err = execute(db.clone(), &AppConfig::default(), command).await.unwrap_err();
        assert_eq!(err.code, error::ErrorCode::NotFound);
        assert!(db.pool().is_closed());
    }

    #[test]
    fn test_bulk_requires_products() {
        let parsed =
            Cli::try_parse_from(["forneria", "stock", "bulk", "--kind", "in", "--quantity", "1"]);
        assert!(parsed.is_err());
    }
}
