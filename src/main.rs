use anyhow::Result;
use chrono::Local;
use clap::Parser;
use rust_decimal::Decimal;
use selicscraper::{
    config::{load_settings, ModeSetting, Settings},
    correction::{CorrectionRequest, CorrectionResult, Corrector},
    error::{CorrectionError, ErrorKind},
    fetch::{HttpSource, StaticSource, TableSource},
    format::{format_currency, format_percent, Locale},
    resolve::StartPolicy,
    table::{labels::month_from_number, labels::month_label, numbers::parse_amount as parse_number},
};
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn parse_amount(s: &str) -> Result<Decimal, String> {
    parse_number(s).ok_or_else(|| format!("not a number: {s:?}"))
}

/// Correct a monetary amount by the SELIC rate published for a month.
#[derive(Parser, Debug)]
#[command(name = "selicscraper", version)]
struct Args {
    /// Amount to correct, e.g. 1000.00, 1.000,00 or 1.000 (one thousand)
    #[arg(long, value_parser = parse_amount)]
    amount: Decimal,

    /// Reference year
    #[arg(long)]
    year: i32,

    /// Reference month, 1-12
    #[arg(long)]
    month: u32,

    /// single, cumulative or multi-year
    #[arg(long)]
    mode: Option<ModeSetting>,

    /// inclusive or exclusive of the reference month (cumulative modes)
    #[arg(long)]
    start: Option<StartPolicy>,

    /// Percentage points added to a cumulative sum
    #[arg(long, value_parser = parse_amount)]
    surcharge: Option<Decimal>,

    /// Report a resolved zero rate as unavailable
    #[arg(long)]
    reject_zero: bool,

    /// pt-BR or en-US
    #[arg(long)]
    locale: Option<Locale>,

    /// YAML settings file (defaults to $SELIC_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the rate page URL
    #[arg(long)]
    url: Option<String>,

    /// Read the page from a saved HTML file instead of fetching it
    #[arg(long)]
    html_file: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn print_result(res: &CorrectionResult, locale: Locale) {
    let month = month_from_number(res.reference_month)
        .map(month_label)
        .unwrap_or("?");
    println!("Reference:        {}/{}", month, res.reference_year);
    println!("Amount:           {}", format_currency(res.base_amount, locale));
    println!(
        "SELIC rate:       {}",
        format_percent(res.resolved_rate_percent, locale)
    );
    if res.resolution.months.len() > 1 || !res.resolution.surcharge.is_zero() {
        println!(
            "Months summed:    {} (stopped: {:?}), surcharge {}",
            res.resolution.months.len(),
            res.resolution.stop,
            format_percent(res.resolution.surcharge, locale)
        );
    }
    println!(
        "Corrected amount: {}",
        format_currency(res.corrected_amount, locale)
    );
}

/// Bad input or settings exit with 2, everything else with 1.
fn exit_code(err: &CorrectionError) -> ExitCode {
    match err.kind() {
        ErrorKind::InvalidInput | ErrorKind::Config => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn build_source(args: &Args, settings: &Settings) -> Result<Box<dyn TableSource>, CorrectionError> {
    let source: Box<dyn TableSource> = match &args.html_file {
        Some(path) => Box::new(StaticSource::from_file(path)?),
        None => Box::new(HttpSource::from_settings(settings)?),
    };
    Ok(source)
}

fn report_failure(err: &CorrectionError, json: bool) {
    error!(kind = ?err.kind(), error = %err, "correction failed");
    if json {
        println!(
            "{}",
            serde_json::json!({ "error": err.kind(), "message": err.to_string() })
        );
    } else {
        eprintln!("Error: {err}");
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // ─── 2) settings: file, then flags ───────────────────────────────
    let mut settings = match load_settings(args.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            let err = CorrectionError::Config(format!("loading settings: {e:#}"));
            report_failure(&err, args.json);
            return Ok(exit_code(&err));
        }
    };
    if let Some(url) = &args.url {
        settings.url = url.clone();
    }
    if let Some(mode) = args.mode {
        settings.mode = mode;
    }
    if let Some(start) = args.start {
        settings.start = start;
    }
    if let Some(surcharge) = args.surcharge {
        settings.surcharge = surcharge;
    }
    if let Some(locale) = args.locale {
        settings.locale = locale;
    }
    settings.reject_zero_rate |= args.reject_zero;
    if let Err(e) = settings.validate() {
        report_failure(&e, args.json);
        return Ok(exit_code(&e));
    }
    info!(mode = ?settings.mode, start = ?settings.start, url = %settings.url, "settings");

    // ─── 3) request ──────────────────────────────────────────────────
    let today = Local::now().date_naive();
    let request = match CorrectionRequest::new(args.amount, args.year, args.month, today) {
        Ok(r) => r,
        Err(e) => {
            report_failure(&e, args.json);
            return Ok(exit_code(&e));
        }
    };

    // ─── 4) source + run ─────────────────────────────────────────────
    let source = match build_source(&args, &settings) {
        Ok(s) => s,
        Err(e) => {
            report_failure(&e, args.json);
            return Ok(exit_code(&e));
        }
    };
    let corrector = Corrector::new(
        source,
        settings.table.clone(),
        settings.correction_options(),
    );

    match corrector.run(&request, today).await {
        Ok(res) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&res)?);
            } else {
                print_result(&res, settings.locale);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            report_failure(&e, args.json);
            Ok(exit_code(&e))
        }
    }
}
