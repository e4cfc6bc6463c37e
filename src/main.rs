//! musicmeta CLI - fetch cover art, artist info, similar songs and relations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use musicmeta::{
    Fetcher, GetType, HttpTransport, ProviderTable, Query, ResultItem, ResultList, TableEntry,
};

/// musicmeta - music metadata fetcher
#[derive(Parser)]
#[command(name = "musicmeta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// last.fm API key
    #[arg(long, global = true, env = "LASTFM_API_KEY")]
    lastfm_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch album cover art
    Cover(FetchArgs),

    /// Fetch an artist biography
    Ainfo(FetchArgs),

    /// Fetch songs similar to a track
    Similar(FetchArgs),

    /// Fetch links related to an artist or album
    Relations(FetchArgs),

    /// List providers and their groups
    Providers,
}

#[derive(Args)]
struct FetchArgs {
    /// Artist name
    #[arg(short, long)]
    artist: Option<String>,

    /// Album name
    #[arg(short = 'b', long)]
    album: Option<String>,

    /// Song title
    #[arg(short, long)]
    title: Option<String>,

    /// Number of items to fetch
    #[arg(short, long, default_value = "1")]
    number: usize,

    /// Maximum number of concurrent downloads
    #[arg(long, default_value = "4")]
    parallel: usize,

    /// Per-download timeout in seconds
    #[arg(long, default_value = "20")]
    timeout: u64,

    /// Maximum number of providers to try
    #[arg(long)]
    plugmax: Option<usize>,

    /// Providers or groups to use (comma-separated, e.g. "safe" or "last.fm,w")
    #[arg(long, value_delimiter = ',')]
    from: Option<Vec<String>>,

    /// Language for localized text
    #[arg(long, default_value = "en")]
    lang: String,

    /// Print image URLs instead of downloading them
    #[arg(long)]
    no_download: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Write each item into this directory
    #[arg(short, long)]
    write: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let key = cli.lastfm_key;
    match cli.command {
        Commands::Cover(args) => run_fetch(GetType::Cover, args, key).await,
        Commands::Ainfo(args) => run_fetch(GetType::ArtistInfo, args, key).await,
        Commands::Similar(args) => run_fetch(GetType::SimilarSongs, args, key).await,
        Commands::Relations(args) => run_fetch(GetType::Relations, args, key).await,
        Commands::Providers => list_providers(key),
    }
}

impl FetchArgs {
    fn query(&self) -> Query {
        let mut query = Query::new()
            .with_number(self.number)
            .with_parallel(self.parallel)
            .with_timeout(self.timeout)
            .with_lang(self.lang.clone())
            .with_download(!self.no_download)
            .with_from(self.from.clone().unwrap_or_default());
        if let Some(plugmax) = self.plugmax {
            query = query.with_plugmax(plugmax);
        }
        query.artist = self.artist.clone();
        query.album = self.album.clone();
        query.title = self.title.clone();
        query
    }
}

fn fetcher(key: Option<String>, redirects: usize) -> Result<Fetcher> {
    let transport = Arc::new(HttpTransport::new(redirects)?);
    let fetcher = Fetcher::new(transport);
    Ok(match key {
        Some(key) => fetcher.with_lastfm_key(key),
        None => fetcher,
    })
}

fn list_providers(key: Option<String>) -> Result<()> {
    let fetcher = fetcher(key, 1)?;
    for get_type in GetType::ALL {
        println!("{}:", get_type);
        print_table(&fetcher.table(get_type));
        println!();
    }
    println!("Usage: musicmeta cover -a \"Metallica\" -b \"Load\" --from safe");
    Ok(())
}

fn print_table(table: &ProviderTable) {
    for entry in table.entries() {
        match entry {
            TableEntry::Provider { provider, enabled } => {
                println!(
                    "    {:<10} [{}]{}",
                    provider.name(),
                    provider.key(),
                    if *enabled { "" } else { " (disabled)" }
                );
            }
            TableEntry::Boundary(label) => println!("  -- {} --", label),
        }
    }
}

async fn run_fetch(get_type: GetType, args: FetchArgs, key: Option<String>) -> Result<()> {
    let query = args.query();
    let binary = get_type == GetType::Cover && query.download;
    let fetcher = fetcher(key, query.redirects)?.with_download_callback(Arc::new(|item: &ResultItem| {
        eprintln!(
            "downloaded {} ({} bytes)",
            item.source.as_deref().unwrap_or("-"),
            item.size()
        );
    }));
    let results = fetcher.get(get_type, query).await?;

    if results.is_empty() {
        anyhow::bail!("No {} found", get_type);
    }

    if let Some(dir) = &args.write {
        write_items(dir, get_type, &results, binary).await?;
    }

    match args.format {
        OutputFormat::Text => {
            for (i, item) in results.items().iter().enumerate() {
                println!("{}. {}", i + 1, item.source.as_deref().unwrap_or("-"));
                if binary {
                    println!("   <{} bytes>", item.size());
                } else {
                    println!("   {}", item.text().replace('\n', "\n   "));
                }
                println!();
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = results
                .items()
                .iter()
                .map(|item| {
                    let data = if binary {
                        serde_json::Value::Null
                    } else {
                        serde_json::Value::String(item.text().into_owned())
                    };
                    serde_json::json!({
                        "source": item.source,
                        "size": item.size(),
                        "data": data,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

async fn write_items(dir: &Path, get_type: GetType, results: &ResultList, binary: bool) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let ext = if binary { "img" } else { "txt" };
    for (i, item) in results.items().iter().enumerate() {
        let path = dir.join(format!("{}_{}.{}", get_type, i + 1, ext));
        tokio::fs::write(&path, &item.data).await?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}
