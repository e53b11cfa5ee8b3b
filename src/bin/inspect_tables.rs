use anyhow::{Context, Result};
use clap::Parser;
use selicscraper::{
    config::load_settings,
    fetch::{list_tables, HttpSource, StaticSource, TableSource},
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// List every table on the rate page with its id, size and header, to help
/// pick `table.id` / `table.index` / `table.keywords` in the settings file.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    url: Option<String>,

    #[arg(long)]
    html_file: Option<PathBuf>,

    /// Print summaries as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = args.url {
        settings.url = url;
    }

    let source: Box<dyn TableSource> = match &args.html_file {
        Some(path) => Box::new(StaticSource::from_file(path)?),
        None => Box::new(HttpSource::from_settings(&settings)?),
    };
    let html = source
        .fetch_html()
        .await
        .with_context(|| format!("fetching {}", source.describe()))?;

    let tables = list_tables(&html);
    info!(count = tables.len(), "tables found");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tables)?);
        return Ok(());
    }

    println!("=== {} ===", source.describe());
    for t in &tables {
        println!(
            "[{}] id={:<20} rows={:<4} header: {}",
            t.index,
            t.id.as_deref().unwrap_or("-"),
            t.rows,
            t.header.join(" | ")
        );
    }
    Ok(())
}
