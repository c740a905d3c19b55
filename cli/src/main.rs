mod commands;
mod config;
mod logging;
mod remote;
mod server;

use std::process;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{cmd_browse, cmd_list, cmd_show, cmd_sync, cmd_tags};
use crate::config::Config;
use crate::remote::RemoteClient;
use recipebox_core::filter::FilterState;
use recipebox_core::service::RecipeService;

/// Rows shown per screen in `browse`.
const BROWSE_WINDOW: usize = 10;

#[derive(Parser)]
#[command(
    name = "recipebox",
    version,
    about = "Browse a remote recipe catalogue from a local cache"
)]
struct Cli {
    /// Base URL of the recipe API (overrides RECIPEBOX_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch tags and recipe pages into the local store
    Sync {
        /// Offset of the first page to fetch
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Maximum number of pages to fetch (stops early at the last page)
        #[arg(short, long, default_value = "1")]
        pages: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored recipes, optionally filtered
    List {
        /// Only recipes carrying any of these tag IDs (repeatable)
        #[arg(short, long = "tag", value_name = "ID")]
        tags: Vec<i64>,
        /// Case-insensitive title search
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one recipe with steps and ingredients
    Show {
        /// Recipe ID or title
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List known tags with recipe counts
    Tags {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive list that loads more pages as you scroll
    Browse {
        /// Start with these tag IDs selected (repeatable)
        #[arg(short, long = "tag", value_name = "ID")]
        tags: Vec<i64>,
        /// Start with this title search
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Start the read-only REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if matches!(cli.command, Commands::Serve { .. }) {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    logging::init(level);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.api_url)?;
    let mut svc = RecipeService::new(&config.db_path)?;
    tracing::debug!(db = %config.db_path.display(), api = %config.api_base_url, "config loaded");

    match cli.command {
        Commands::Sync {
            offset,
            pages,
            json,
        } => {
            let client = RemoteClient::new(&config)?;
            cmd_sync(&mut svc, &client, offset, pages, json)
        }
        Commands::List { tags, search, json } => cmd_list(&svc, &tags, search.as_deref(), json),
        Commands::Show { recipe, json } => cmd_show(&svc, &recipe, json),
        Commands::Tags { json } => cmd_tags(&svc, json),
        Commands::Browse { tags, search } => {
            let client = RemoteClient::new(&config)?;
            let filter = FilterState::new()
                .with_tags(tags)
                .with_search(search.as_deref());
            cmd_browse(
                Arc::new(Mutex::new(svc)),
                Arc::new(client),
                filter,
                BROWSE_WINDOW,
            )
            .await
        }
        Commands::Serve { port, bind } => server::start_server(svc, port, &bind).await,
    }
}
