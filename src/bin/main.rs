//! colscout CLI - discover joins and search columns of a database
//!
//! Usage:
//!   colscout init <db> [--force]
//!   colscout state <db>
//!   colscout search <db> <type> [--anchor <table>] [--name <query>] [--limit <n>] [--json]
//!   colscout graph <db>
//!   colscout explore <db> <table> [--first <n>]
//!   colscout schema <db>
//!
//! Examples:
//!   colscout init mimic
//!   colscout search mimic code --anchor patients --name gender
//!   RUST_LOG=colscout=debug colscout init mimic --force

use clap::{Parser, Subcommand};
use colscout::config::Settings;
use colscout::engine::{EngineConfig, EngineRegistry, SettingsConnector};
use colscout::ranking::SearchQuery;
use colscout::store::EngineStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "colscout")]
#[command(about = "colscout - join discovery and column search for relational databases")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to the standard lookup)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or load) the engine of a database
    Init {
        /// Database id from the config
        database: String,

        /// Rebuild even if a stored engine exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show whether a database engine is trained
    State {
        database: String,
    },

    /// Search columns by resource type
    Search {
        database: String,

        /// Resource type, e.g. code, date, id
        resource_type: String,

        /// Favour columns close to this table
        #[arg(short, long)]
        anchor: Option<String>,

        /// Favour columns whose name resembles this
        #[arg(short, long)]
        name: Option<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the discovered dependency graph
    Graph {
        database: String,
    },

    /// Print the first rows of a table
    Explore {
        database: String,

        table: String,

        /// Number of rows
        #[arg(short, long, default_value_t = 10)]
        first: usize,
    },

    /// Print table and column names as JSON
    Schema {
        database: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("colscout=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let registry = match open_registry(cli.config.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        match cli.command {
            Commands::Init { database, force } => cmd_init(&registry, &database, force).await,
            Commands::State { database } => cmd_state(&registry, &database),
            Commands::Search {
                database,
                resource_type,
                anchor,
                name,
                limit,
                json,
            } => {
                let mut query = SearchQuery::new(resource_type);
                query.anchor_table = anchor;
                query.name_query = name;
                query.max_results = limit;
                cmd_search(&registry, &database, &query, json)
            }
            Commands::Graph { database } => cmd_graph(&registry, &database),
            Commands::Explore {
                database,
                table,
                first,
            } => cmd_explore(&registry, &database, &table, first).await,
            Commands::Schema { database } => cmd_schema(&registry, &database).await,
        }
    })
}

fn open_registry(
    config: Option<&std::path::Path>,
) -> Result<EngineRegistry, Box<dyn std::error::Error>> {
    let settings = match config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };
    let engine_config = EngineConfig::from_settings(&settings)?;

    let store = match settings.storage.resolved_path()? {
        Some(path) => EngineStore::open_at(&path)?,
        None => EngineStore::open()?,
    };

    let connector = Arc::new(SettingsConnector::new(settings.databases.clone()));
    Ok(EngineRegistry::new(connector, engine_config).with_store(store))
}

async fn cmd_init(registry: &EngineRegistry, database: &str, force: bool) -> ExitCode {
    match registry.build_or_load(database, force).await {
        Ok(status) => {
            println!("{}: {}", database, status);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Build failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_state(registry: &EngineRegistry, database: &str) -> ExitCode {
    match registry.status(database) {
        Ok(status) => {
            println!("{}", status);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_search(
    registry: &EngineRegistry,
    database: &str,
    query: &SearchQuery,
    json: bool,
) -> ExitCode {
    let results = match registry.search(database, query) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Search failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if json {
        return match serde_json::to_string_pretty(&results) {
            Ok(s) => {
                println!("{}", s);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error serializing results: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    if results.is_empty() {
        println!("No matching columns.");
        return ExitCode::SUCCESS;
    }
    for (i, result) in results.iter().enumerate() {
        let preview: Vec<&str> = result.data.iter().take(5).map(String::as_str).collect();
        println!(
            "{:>2}. {:<40} {:.4}  [{}]",
            i + 1,
            result.column,
            result.score,
            preview.join(", ")
        );
    }
    ExitCode::SUCCESS
}

fn cmd_graph(registry: &EngineRegistry, database: &str) -> ExitCode {
    match registry.engine(database) {
        Ok(engine) => {
            print!("{}", engine.graph());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn cmd_explore(
    registry: &EngineRegistry,
    database: &str,
    table: &str,
    first: usize,
) -> ExitCode {
    let sample = match registry.explore(database, table, first).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("{}", sample.fields.join("\t"));
    for row in &sample.rows {
        let cells: Vec<String> = row.iter().map(|v| v.to_sample_string()).collect();
        println!("{}", cells.join("\t"));
    }
    ExitCode::SUCCESS
}

async fn cmd_schema(registry: &EngineRegistry, database: &str) -> ExitCode {
    let schema = match registry.schema(database).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&schema) {
        Ok(s) => {
            println!("{}", s);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing schema: {}", e);
            ExitCode::FAILURE
        }
    }
}
