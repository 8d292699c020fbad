use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use shared::{
    BestTacoSummarizer, Checkpoint, Config, Ingestor, LlmProvider, SearchConfig, TacoDb,
    YelpClient, DEFAULT_DB_PATH,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    Openrouter,
    Openai,
}

impl From<Provider> for LlmProvider {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Openrouter => LlmProvider::OpenRouter,
            Provider::Openai => LlmProvider::OpenAi,
        }
    }
}

#[derive(Parser)]
#[command(name = "find-tacos")]
#[command(about = "Find taco restaurants on Yelp and ask an LLM for the best taco at each")]
struct Args {
    /// Search term
    #[arg(long, default_value = "taco")]
    term: String,

    /// City or neighborhood to search
    #[arg(long, default_value = "Austin, TX")]
    location: String,

    /// Results per search page (max 50)
    #[arg(long, default_value = "50")]
    page_size: u32,

    /// Stop paging once the offset reaches this value
    #[arg(long, default_value = "1000")]
    max_offset: u32,

    /// Reviews to fetch per restaurant
    #[arg(long, default_value = "3")]
    review_limit: u32,

    /// Pause between restaurants, in milliseconds
    #[arg(long, default_value = "500")]
    delay_ms: u64,

    /// SQLite database file
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// LLM provider used to pick the best taco
    #[arg(long, value_enum, default_value = "openrouter")]
    provider: Provider,

    /// Re-fetch restaurants that are already in the database
    #[arg(long)]
    refresh: bool,

    /// Ignore the saved offset and start from the first page
    #[arg(long)]
    reset_checkpoint: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("shared={0},find_tacos={0}", default_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let search = SearchConfig {
        term: args.term,
        location: args.location,
        page_size: args.page_size,
        max_offset: args.max_offset,
        review_limit: args.review_limit,
        request_delay: Duration::from_millis(args.delay_ms),
        refresh: args.refresh,
        ..SearchConfig::default()
    };
    search.validate()?;

    let config = Config::from_env(args.provider.into())?;

    let db = TacoDb::open(&args.db)?;
    let checkpoint = Checkpoint::new(&db);
    if args.reset_checkpoint {
        checkpoint.reset()?;
    }

    println!(
        "🌮 Searching for '{}' in {} ({} restaurants already saved)",
        search.term,
        search.location,
        db.business_count()?
    );
    println!("   Starting from offset {}", checkpoint.load()?);

    let yelp = YelpClient::new(config.yelp_api_key)?;
    let summarizer = BestTacoSummarizer::new(config.llm)?;

    let stats = Ingestor::new(&yelp, &summarizer, &db, search)
        .run()
        .await
        .context("Ingestion stopped; rerun to resume from the last saved page")?;

    if stats.processed > 0 {
        println!(
            "\n✓ Processed and saved {} new restaurants to {}",
            stats.processed,
            args.db.display()
        );
    } else {
        println!("\nNo new taco restaurants found.");
    }
    println!("  Best taco identified for {}", stats.summarized);
    if stats.skipped_existing > 0 {
        println!("  Skipped {} already saved", stats.skipped_existing);
    }
    if stats.skipped_failed > 0 {
        println!("  ⚠ Skipped {} that could not be fetched", stats.skipped_failed);
    }
    println!(
        "  {} search calls, next run starts at offset {}",
        stats.search_calls, stats.next_offset
    );
    println!("\n✅ Total restaurants in database: {}", db.business_count()?);

    Ok(())
}
