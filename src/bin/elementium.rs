//! Elementium CLI.
//!
//! Opens a page in a local (or attached) Chromium and runs a single
//! collection query against it.
//!
//! Usage examples:
//!   $ ELEMENTIUM_CHROME_BIN=/path/to/chrome \
//!     cargo run --bin elementium -- text https://example.com h1
//!   $ ELEMENTIUM_CDP_URL=ws://127.0.0.1:9222/devtools/browser/... \
//!     cargo run --bin elementium -- click https://example.com "a" --index 0

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use elementium_rs::ElementiumBrowser;
use elementium_rs::adapter::chromiumoxide::ChromiumoxideDriver;
use elementium_rs::config::{ElementiumConfig, ElementiumConfigOverrides, Verbosity};
use elementium_rs::elements::{Elements, FindOptions};
use elementium_rs::logging::{LogCallback, LogLevel};
use elementium_rs::runtime::ChromiumoxideRuntime;
use log::info;

type Page = Elements<ChromiumoxideDriver>;

#[derive(Parser)]
#[command(
    name = "elementium",
    author,
    version,
    about = "Query and drive page elements with automatic retries"
)]
struct Cli {
    /// Increase log verbosity (pass multiple times for DEBUG).
    #[arg(long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Show the launched browser window.
    #[arg(long, global = true)]
    show_browser: bool,

    /// Chrome/Chromium binary to launch (overrides ELEMENTIUM_CHROME_BIN).
    #[arg(long, global = true)]
    chrome: Option<PathBuf>,

    /// Retry budget in seconds for every operation (overrides ELEMENTIUM_TTL).
    #[arg(long, global = true)]
    ttl: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print how many elements match a CSS selector.
    Count(QueryArgs),
    /// Print the text of every element matching a CSS selector.
    Text(QueryArgs),
    /// Click the element matching a CSS selector.
    Click(ClickArgs),
    /// Print the page title.
    Title(PageArgs),
}

#[derive(Args)]
struct PageArgs {
    /// Page URL to open.
    url: String,
}

#[derive(Args)]
struct QueryArgs {
    url: String,
    /// CSS selector resolved from the document root.
    selector: String,
    /// Include matches that are not displayed.
    #[arg(long)]
    include_hidden: bool,
    /// Wait until at least one element matches.
    #[arg(long)]
    wait: bool,
}

#[derive(Args)]
struct ClickArgs {
    #[command(flatten)]
    query: QueryArgs,
    /// Which match to click.
    #[arg(long, default_value_t = 0)]
    index: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_env_logger();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let browser = ElementiumBrowser::new(config, ChromiumoxideRuntime::new())
        .context("invalid configuration")?;

    browser
        .launch()
        .await
        .context("failed to launch browser")?;

    let outcome = run(&browser, cli.command).await;

    if let Err(err) = browser.shutdown().await {
        log::warn!("browser shutdown failed: {err}");
    }
    outcome
}

async fn run(browser: &ElementiumBrowser<ChromiumoxideRuntime>, command: Command) -> Result<()> {
    match command {
        Command::Title(args) => {
            let root = open(browser, &args.url).await?;
            println!("{}", root.title(None).await?);
        }
        Command::Count(args) => {
            let found = query(browser, &args).await?;
            println!("{}", found.len().await?);
        }
        Command::Text(args) => {
            let found = query(browser, &args).await?;
            let texts = found
                .foreach_collect(
                    |element: Page| async move { element.text(Some(0.0)).await },
                    Default::default(),
                )
                .await?;
            for text in texts.into_iter().flatten() {
                println!("{text}");
            }
        }
        Command::Click(args) => {
            let found = query(browser, &args.query).await?;
            found
                .get(args.index)
                .await?
                .click(None, None)
                .await
                .with_context(|| format!("failed to click {}[{}]", args.query.selector, args.index))?;
            info!("Clicked {}[{}]", args.query.selector, args.index);
        }
    }
    Ok(())
}

async fn open(browser: &ElementiumBrowser<ChromiumoxideRuntime>, url: &str) -> Result<Page> {
    let root = browser
        .open(url)
        .await
        .with_context(|| format!("failed to open {url}"))?;
    info!("Opened {url}");
    Ok(root)
}

async fn query(browser: &ElementiumBrowser<ChromiumoxideRuntime>, args: &QueryArgs) -> Result<Page> {
    let root = open(browser, &args.url).await?;
    let mut options = FindOptions::default();
    options.wait = args.wait;
    if args.include_hidden {
        options = options.include_hidden();
    }
    root.find(args.selector.as_str(), options)
        .await
        .with_context(|| format!("failed to find {}", args.selector))
}

fn build_config(cli: &Cli) -> Result<ElementiumConfig> {
    let config = ElementiumConfig::from_env().context("failed to read ELEMENTIUM_* variables")?;
    let overrides = ElementiumConfigOverrides {
        ttl: cli.ttl,
        verbose: Some(verbosity_from_count(cli.verbose)),
        logger: Some(Some(make_logger_callback())),
        headless: cli.show_browser.then_some(false),
        chrome_executable: cli.chrome.clone().map(Some),
        ..Default::default()
    };
    Ok(config.with_overrides(overrides))
}

fn make_logger_callback() -> LogCallback {
    Arc::new(|record: &elementium_rs::logging::ElementiumLogRecord| {
        let line = match &record.category {
            Some(category) => format!("[{category}] {}", record.message),
            None => record.message.clone(),
        };
        match record.level {
            LogLevel::Error => log::error!("{line}"),
            LogLevel::Info => log::info!("{line}"),
            LogLevel::Debug => log::debug!("{line}"),
        }
    })
}

fn verbosity_from_count(count: u8) -> Verbosity {
    match count {
        0 => Verbosity::Medium,
        _ => Verbosity::Detailed,
    }
}

fn init_env_logger() {
    if env::var("RUST_LOG").is_err() {
        unsafe {
            env::set_var("RUST_LOG", "info");
        }
    }

    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp_secs()
        .try_init();
}
