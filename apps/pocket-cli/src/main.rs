//! pocket - sync Pocket bookmarks into a local SQLite database
//!
//! Credentials come from `POCKET_CONSUMER_KEY` / `POCKET_ACCESS_TOKEN`;
//! store and API settings from an optional TOML file.

mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use pocket_client::PocketClient;
use pocket_core::{
    ConfigError, SearchParams, SqliteDatabase, StoreError, SyncConfig, SyncOptions,
    SyncOrchestrator, DEFAULT_DAYS, DEFAULT_SEARCH_LIMIT, DEFAULT_TAG_REFRESH_LIMIT, FULL_LIMIT,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use progress::LogProgress;

#[derive(Parser, Debug)]
#[command(name = "pocket", version)]
#[command(about = "Sync Pocket bookmarks and tags into SQLite", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/pocket-connector/config.toml)
    #[arg(long, global = true, env = "POCKET_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database, overrides `store.database`
    #[arg(long, global = true, env = "POCKET_DATABASE")]
    database: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the items and tags tables with their indexes
    Init,
    /// Import items (and their tags)
    Items(ItemsArgs),
    /// Rebuild the tags table from the newest items
    Tags {
        /// Assign user_id to records; only this user's tags are replaced
        #[arg(long)]
        user: Option<String>,
        /// How many of the newest items to read tags from
        #[arg(long, default_value_t = DEFAULT_TAG_REFRESH_LIMIT)]
        limit: u32,
    },
    /// Search stored items; prints one JSON object per line
    Search(SearchArgs),
}

#[derive(Args, Debug)]
struct ItemsArgs {
    /// Assign user_id to records
    #[arg(long)]
    user: Option<String>,
    /// Import last n days
    #[arg(long, default_value_t = DEFAULT_DAYS)]
    days: u32,
    /// How many items to import in a full sync (from new to old)
    #[arg(long, default_value_t = FULL_LIMIT)]
    limit: u32,
    /// Make a full sync
    #[arg(long)]
    full: bool,
    /// Wipe both tables before inserting
    #[arg(long)]
    wipe: bool,
}

impl From<ItemsArgs> for SyncOptions {
    fn from(args: ItemsArgs) -> Self {
        SyncOptions {
            user_id: args.user,
            days: args.days,
            full: args.full,
            limit: args.limit,
            wipe: args.wipe,
        }
    }
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Text contained in either title
    #[arg(long)]
    text: Option<String>,
    /// Required tag; repeat or comma separate for several
    #[arg(long = "tag")]
    tags: Vec<String>,
    /// Text contained in either domain
    #[arg(long)]
    domain: Option<String>,
    #[arg(long)]
    user: Option<String>,
    #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    limit: usize,
}

impl From<SearchArgs> for SearchParams {
    fn from(args: SearchArgs) -> Self {
        let params = SearchParams {
            text: args.text,
            domain: args.domain,
            user_id: args.user,
            limit: args.limit,
            ..Default::default()
        };
        args.tags
            .iter()
            .fold(params, |params, csv| params.tags_from_csv(csv))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> pocket_core::Result<()> {
    let mut config = SyncConfig::load(cli.config.as_deref(), std::env::vars())?;
    if let Some(database) = cli.database {
        config.store.database = database;
    }

    match cli.command {
        Command::Init => init(&config),
        Command::Items(args) => items(&config, args.into()).await,
        Command::Tags { user, limit } => tags(&config, user.as_deref(), limit).await,
        Command::Search(args) => search(&config, args.into()),
    }
}

fn init(config: &SyncConfig) -> pocket_core::Result<()> {
    let db = SqliteDatabase::open(&config.store.database)?;
    db.bootstrap(&config.store.items_table, &config.store.tags_table)?;
    info!(database = %config.store.database.display(), "ready");
    Ok(())
}

async fn items(config: &SyncConfig, options: SyncOptions) -> pocket_core::Result<()> {
    options.validate()?;
    config.validate()?;

    let db = SqliteDatabase::open_existing(&config.store.database)?;
    let items = db.items(&config.store.items_table)?;
    let tags = db.tags(&config.store.tags_table)?;
    let client = PocketClient::new(&config.api)?;

    let orchestrator = SyncOrchestrator::new(config, &client, &items, &tags);
    let report = orchestrator.run(&options, &mut LogProgress::default()).await?;

    if report.no_new_items() {
        info!("There are no new items");
    }
    info!("Process finished");
    Ok(())
}

async fn tags(config: &SyncConfig, user: Option<&str>, limit: u32) -> pocket_core::Result<()> {
    config.validate()?;

    let db = SqliteDatabase::open_existing(&config.store.database)?;
    let items = db.items(&config.store.items_table)?;
    let tags = db.tags(&config.store.tags_table)?;
    let client = PocketClient::new(&config.api)?;

    let orchestrator = SyncOrchestrator::new(config, &client, &items, &tags);
    orchestrator
        .refresh_tags(limit, user, &mut LogProgress::default())
        .await?;
    info!("Process finished");
    Ok(())
}

fn search(config: &SyncConfig, params: SearchParams) -> pocket_core::Result<()> {
    if params.limit == 0 {
        return Err(ConfigError::Invalid("limit must be positive".to_string()).into());
    }
    let db = SqliteDatabase::open_existing(&config.store.database)?;
    let items = db.items(&config.store.items_table)?;
    for item in items.search(&params)? {
        println!("{}", serde_json::to_string(&item).map_err(StoreError::from)?);
    }
    Ok(())
}
