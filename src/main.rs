use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use storypager::{FilterValue, ListingSnapshot, PagerConfig, PagedListing, Story, StoryQuery};
use tracing::{debug, info};

/// Page through story listings the way the reader app does
#[derive(Parser)]
#[command(name = "storypager")]
#[command(version)]
#[command(about = "Page through story listings with batched, prefetching fetches", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Stories listing URL (overrides config file)
    #[arg(short, long, value_name = "URL", global = true)]
    endpoint: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, value_name = "TOKEN", global = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one page as JSON
    Page {
        /// 1-based page number
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        #[arg(short = 's', long, value_name = "N")]
        page_size: Option<u32>,

        #[command(flatten)]
        query: QueryArgs,
    },
    /// Step through pages from the first, reporting read-ahead
    Walk {
        #[arg(short = 's', long, value_name = "N")]
        page_size: Option<u32>,

        #[arg(short, long, value_name = "N", default_value_t = 5)]
        max_pages: u32,

        #[command(flatten)]
        query: QueryArgs,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// Only stories by this author id
    #[arg(long, value_name = "ID")]
    author: Option<String>,

    #[arg(long)]
    category: Option<String>,

    /// Free-text search
    #[arg(short = 'q', long, value_name = "TEXT")]
    search: Option<String>,

    /// The signed-in user's own stories (needs --token)
    #[arg(long)]
    mine: bool,

    /// Extra request filter, repeatable
    #[arg(short, long = "filter", value_name = "KEY=VALUE", value_parser = parse_filter)]
    filters: Vec<(String, String)>,
}

impl QueryArgs {
    fn story_query(&self) -> Result<StoryQuery> {
        let mut presets = Vec::new();
        if let Some(author) = &self.author {
            presets.push(StoryQuery::by_author(author));
        }
        if let Some(category) = &self.category {
            presets.push(StoryQuery::in_category(category));
        }
        if let Some(text) = &self.search {
            presets.push(StoryQuery::search(text));
        }
        if self.mine {
            presets.push(StoryQuery::mine());
        }

        match presets.len() {
            0 => Ok(StoryQuery::all()),
            1 => Ok(presets.remove(0)),
            _ => bail!("--author, --category, --search and --mine are mutually exclusive"),
        }
    }
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Numbers go on the wire unquoted either way; typing them keeps config and
/// CLI filters comparable.
fn filter_value(raw: &str) -> FilterValue {
    if let Ok(int) = raw.parse::<i64>() {
        FilterValue::Int(int)
    } else if let Ok(float) = raw.parse::<f64>() {
        FilterValue::Float(float)
    } else {
        FilterValue::Text(raw.to_string())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Step 1: Load base configuration
    let mut config = if let Some(config_path) = &cli.config {
        PagerConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        PagerConfig::load().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli)?;
    config.validate().context("Invalid configuration")?;

    // Step 3: Initialize tracing
    storypager::init_tracing(&config.log);
    debug!(endpoint = %config.listing.endpoint, "configuration loaded");

    match &cli.command {
        Commands::Page { page, query, .. } => run_page(&config, query, *page).await,
        Commands::Walk {
            max_pages, query, ..
        } => run_walk(&config, query, *max_pages).await,
    }
}

fn apply_cli_overrides(config: &mut PagerConfig, cli: &Cli) -> Result<()> {
    if let Some(endpoint) = &cli.endpoint {
        config.listing.endpoint = endpoint.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    if let Some(token) = &cli.token {
        config.auth.bearer_token = Some(token.clone());
    }

    let (page_size, query) = match &cli.command {
        Commands::Page {
            page_size, query, ..
        }
        | Commands::Walk {
            page_size, query, ..
        } => (page_size, query),
    };
    if let Some(page_size) = page_size {
        config.listing.page_size = *page_size;
    }
    for (key, value) in &query.filters {
        config.listing.filters.set(key.clone(), filter_value(value));
    }
    config
        .listing
        .filters
        .validate()
        .context("Invalid --filter")?;

    Ok(())
}

async fn run_page(config: &PagerConfig, query: &QueryArgs, page: u32) -> Result<()> {
    let listing = storypager::open_stories(config, &query.story_query()?).await?;
    if page != 1 {
        listing.set_page(page).await;
    }

    let snapshot = listing.snapshot();
    check_snapshot(&snapshot)?;

    let output =
        serde_json::to_string_pretty(&snapshot).context("Failed to serialize listing page")?;
    println!("{}", output);

    listing.close();
    Ok(())
}

async fn run_walk(config: &PagerConfig, query: &QueryArgs, max_pages: u32) -> Result<()> {
    let listing = storypager::open_stories(config, &query.story_query()?).await?;
    check_snapshot(&listing.snapshot())?;

    let mut visited = 0;
    loop {
        let snapshot = listing.snapshot();
        check_snapshot(&snapshot)?;
        print_page(&snapshot);
        visited += 1;

        if visited >= max_pages || !snapshot.has_next_page() {
            break;
        }
        listing.next_page().await;
    }

    listing.settle().await;
    report_buffer(&listing);
    listing.close();
    Ok(())
}

fn check_snapshot(snapshot: &ListingSnapshot<Story>) -> Result<()> {
    if snapshot.unauthorized {
        bail!("Listing requires sign-in; pass --token or set STORYPAGER_TOKEN");
    }
    if let Some(err) = &snapshot.last_error {
        return Err(err.clone()).context(format!("Failed to load page {}", snapshot.page));
    }
    Ok(())
}

fn print_page(snapshot: &ListingSnapshot<Story>) {
    let read_ahead = if snapshot.is_prefetching {
        " (reading ahead)"
    } else {
        ""
    };
    println!(
        "page {}/{} ({} stories total){}",
        snapshot.page, snapshot.total_pages, snapshot.total, read_ahead
    );
    for story in &snapshot.items_for_page {
        match &story.author {
            Some(author) => println!("  {}  {} by {}", story.id, story.title, author.display_name()),
            None => println!("  {}  {}", story.id, story.title),
        }
    }
}

fn report_buffer(listing: &PagedListing<Story>) {
    info!(
        page = listing.page(),
        page_size = listing.page_size(),
        batch_size = listing.batch_size(),
        total = listing.total(),
        "walk finished"
    );
}
