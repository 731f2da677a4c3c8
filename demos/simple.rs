//! Run with:
//! `ELEMENTIUM_CHROME_BIN=/path/to/chrome cargo run --example simple`
//!
//! Opens example.com in a visible Chromium window, reads the heading and
//! paragraph texts through chained collections, follows the "More
//! information" link, and prints the resulting page title.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use elementium_rs::config::{ElementiumConfig, Verbosity};
use elementium_rs::elements::FindOptions;
use elementium_rs::runtime::ChromiumoxideRuntime;
use elementium_rs::waiters::Condition;
use elementium_rs::{ElementiumBrowser, ForEachOptions};
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<()> {
    let chrome_bin = env::var("ELEMENTIUM_CHROME_BIN")
        .map_err(|_| anyhow!("ELEMENTIUM_CHROME_BIN must point to a Chrome/Chromium binary"))?;

    let mut config = ElementiumConfig::default();
    config.headless = false;
    config.verbose = Verbosity::Detailed;
    config.chrome_executable = Some(chrome_bin.into());
    config.ttl = 10.0;

    let browser = ElementiumBrowser::new(config, ChromiumoxideRuntime::new())
        .context("failed to construct browser")?;
    browser.launch().await.context("failed to launch browser")?;

    let page = browser
        .open("https://example.com")
        .await
        .context("failed to open example.com")?;

    let heading = page.find("h1", FindOptions::waiting()).await?;
    println!("heading: {}", heading.text(None).await?.unwrap_or_default());

    // Each paragraph is read through its own single-element child.
    let paragraphs = page
        .find("div", FindOptions::default())
        .await?
        .find("p", FindOptions::default())
        .await?
        .until(&Condition::count(2), None)
        .await?;
    let texts = paragraphs
        .foreach_collect(
            |paragraph| async move { paragraph.text(None).await },
            ForEachOptions::default(),
        )
        .await?;
    for (index, text) in texts.into_iter().enumerate() {
        println!("paragraph {index}: {}", text.unwrap_or_default());
    }

    page.find_link("More information", false, FindOptions::waiting())
        .await?
        .click(None, None)
        .await
        .context("failed to follow the link")?;

    sleep(Duration::from_secs(2)).await;
    println!("now at: {}", page.title(None).await?);
    if let Some(url) = page.current_url().await? {
        println!("url: {url}");
    }

    browser.shutdown().await.context("failed to close browser")?;
    Ok(())
}
