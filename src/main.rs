use anyhow::{Context, Result};
use blogroll_rank::config::Config;
use blogroll_rank::feed::{crawl_client, export_to_file, Fetcher, HttpSource};
use blogroll_rank::greader::GReaderClient;
use blogroll_rank::report::Report;
use blogroll_rank::util::UrlPolicy;
use blogroll_rank::walk::crawl;
use clap::Parser;
use secrecy::SecretString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "blogroll-rank",
    about = "Follow blogrolls outward from a feed and rank every feed they mention"
)]
struct Args {
    /// Path to the configuration file
    #[arg(long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Seed feed URL (overrides [feed] url)
    #[arg(long, value_name = "URL")]
    feed: Option<String>,

    /// Blogroll hops to follow (overrides [crawl] max_depth)
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Write the ranking as an OPML file
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Subscribe the N highest-ranked feeds via [greader]
    #[arg(long, value_name = "N")]
    subscribe: Option<usize>,

    /// Label to subscribe feeds under
    #[arg(long, value_name = "LABEL", default_value = "Blogroll")]
    category: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let seed_url = args
        .feed
        .clone()
        .or_else(|| config.feed.as_ref().map(|f| f.url.clone()))
        .context("No seed feed: pass --feed or set [feed] url in the config file")?;
    let max_depth = args.max_depth.unwrap_or(config.crawl.max_depth);

    // Fail before crawling if subscribing was asked for but cannot work
    let greader = match (args.subscribe, &config.greader) {
        (Some(_), Some(greader)) => Some(
            GReaderClient::new(
                reqwest::Client::new(),
                &greader.url,
                SecretString::from(greader.api_key.clone()),
            )
            .context("Invalid [greader] configuration")?,
        ),
        (Some(_), None) => anyhow::bail!("--subscribe needs a [greader] section in the config file"),
        (None, _) => None,
    };

    let policy = UrlPolicy {
        allow_private_hosts: config.crawl.allow_private_hosts,
    };
    let client = crawl_client(policy).context("Failed to build HTTP client")?;
    let source = HttpSource::new(Fetcher::new(client, policy, config.crawl.timeout()));

    tracing::info!(seed = %seed_url, max_depth, "Starting blogroll crawl");
    let Some(outcome) = crawl(&source, &seed_url, max_depth)
        .await
        .context("Blogroll crawl failed")?
    else {
        println!("No blogroll found for {seed_url}");
        return Ok(());
    };

    let report = Report::from_crawl(&outcome);

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{json}");
    } else {
        print!("{}", report.render_text());
    }

    if let Some(path) = &args.export {
        let title = format!("Blogroll ranking for {}", report.seed);
        export_to_file(&title, &report.to_opml_feeds(), path)
            .with_context(|| format!("Failed to export OPML to {}", path.display()))?;
        eprintln!("Exported {} feeds to {}", report.scores.len(), path.display());
    }

    if let (Some(n), Some(greader)) = (args.subscribe, greader) {
        for feed in report.top(n) {
            greader
                .subscribe(&feed.url, &args.category)
                .await
                .with_context(|| format!("Failed to subscribe {}", feed.url))?;
            eprintln!("Subscribed {} under {}", feed.url, args.category);
        }
    }

    Ok(())
}
