use std::error::Error;
#[cfg(feature = "serve")]
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use obscura_core::fetch::{FetchConfig, FetchOutcome, PageFetcher};
use obscura_core::search::{SearchClient, SearchConfig, SearchEngine, SearchResult};
use obscura_core::{PolicyBundle, PrivacyMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "obscura", about = "Privacy-enforcing fetch and search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a URL and print the sanitized HTML
    Fetch {
        /// The URL to fetch
        url: String,

        /// Privacy mode: lite, standard or tor
        #[arg(long, default_value = "lite")]
        mode: PrivacyMode,

        /// Output as JSON ({"html", "requiresScript"})
        #[arg(long)]
        json: bool,

        /// Also print the response headers that survived filtering
        #[arg(long)]
        headers: bool,
    },
    /// Search the web
    Search {
        /// The search query
        query: String,

        /// Privacy mode: lite, standard or tor
        #[arg(long, default_value = "lite")]
        mode: PrivacyMode,

        /// Aggregator engine to include (repeatable)
        #[arg(long = "engine")]
        engines: Vec<SearchEngine>,

        /// Try the local metasearch aggregator before DuckDuckGo
        #[arg(long)]
        searxng: bool,

        /// Base URL of the metasearch aggregator
        #[arg(long)]
        searxng_url: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what a privacy mode allows
    Mode {
        /// Mode to describe (all modes when omitted)
        mode: Option<PrivacyMode>,
    },
    /// Run the loopback REST service
    #[cfg(feature = "serve")]
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value = "8765")]
        port: u16,

        /// Base URL of the metasearch aggregator
        #[arg(long)]
        searxng_url: Option<String>,

        /// Preferences file (default: ~/.obscura/preferences.json)
        #[arg(long)]
        preferences: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Fetch {
            url,
            mode,
            json,
            headers,
        } => {
            let fetcher = PageFetcher::new(PolicyBundle::for_mode(mode), FetchConfig::default());
            let outcome = runtime.block_on(fetcher.fetch(&url))?;
            print_outcome(&outcome, json, headers)?;
        }
        Commands::Search {
            query,
            mode,
            engines,
            searxng,
            searxng_url,
            json,
        } => {
            let mut config = SearchConfig::default().with_policy(&PolicyBundle::for_mode(mode));
            if let Some(url) = searxng_url {
                config.primary_url = url;
            }
            config.validate()?;

            let client = SearchClient::new(config, searxng);
            let engines = (!engines.is_empty()).then_some(engines.as_slice());
            let results = runtime.block_on(client.search(&query, engines));
            print_results(&results, json)?;
        }
        Commands::Mode { mode } => {
            let modes = match mode {
                Some(mode) => vec![mode],
                None => PrivacyMode::ALL.to_vec(),
            };
            for mode in modes {
                print_policy(mode);
            }
        }
        #[cfg(feature = "serve")]
        Commands::Serve {
            host,
            port,
            searxng_url,
            preferences,
        } => {
            let mut config = obscura_server::ServerConfig {
                host,
                port,
                ..Default::default()
            };
            if let Some(url) = searxng_url {
                config.search.primary_url = url;
            }
            if preferences.is_some() {
                config.preferences_path = preferences;
            }
            config.search.validate()?;

            eprintln!("obscura listening on http://{}", config.addr());
            runtime.block_on(obscura_server::serve(config))?;
        }
    }

    Ok(())
}

fn print_outcome(outcome: &FetchOutcome, as_json: bool, with_headers: bool) -> Result<(), Box<dyn Error>> {
    if with_headers {
        for (name, value) in &outcome.headers {
            eprintln!("{}: {}", name, value);
        }
        eprintln!();
    }
    if as_json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        if outcome.requires_script {
            eprintln!("note: this page appears to require JavaScript");
        }
        println!("{}", outcome.html);
    }
    Ok(())
}

fn print_results(results: &[SearchResult], as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    for (i, result) in results.iter().enumerate() {
        println!("{}. {}", i + 1, result.title);
        if !result.url.is_empty() {
            println!("   {}", result.url);
        }
        if !result.snippet.is_empty() {
            println!("   {}", result.snippet);
        }
    }
    Ok(())
}

fn print_policy(mode: PrivacyMode) {
    let policy = PolicyBundle::for_mode(mode);
    let flag = |allowed: bool| if allowed { "allowed" } else { "blocked" };
    println!("{}", mode);
    println!("  javascript: {}", flag(policy.javascript));
    println!("  cookies:    {}", flag(policy.cookies));
    println!("  images:     {}", flag(policy.images));
    println!(
        "  headers:    {}",
        if policy.minimal_headers { "minimal" } else { "standard" }
    );
    println!("  proxy:      {}", policy.proxy_url.as_deref().unwrap_or("none"));
}
