//! Subreddit title sweep.

use anyhow::{Context, bail};
use phoenix_browser::StealthSession;
use phoenix_core::oracle::SelectorOracle;
use phoenix_core::resolver::{Resolution, Resolver};
use std::time::Duration;
use tracing::info;

pub async fn run<O: SelectorOracle>(
    session: &StealthSession,
    resolver: &Resolver<O>,
    subreddit: &str,
    limit: usize,
) -> anyhow::Result<()> {
    let url = format!("https://www.reddit.com/r/{subreddit}/");
    session.goto(&url).await?;
    session
        .random_delay(Duration::from_secs(2), Duration::from_secs(4))
        .await;

    // Resolve once so a broken selector gets healed, then sweep the whole
    // list with whatever selector the table now holds.
    if let Resolution::Failed(failure) = resolver.resolve(session, "reddit", "post_title").await {
        bail!("could not resolve post titles: {failure}");
    }
    let selectors = resolver.store().load().await;
    let selector = selectors
        .get("reddit", "post_title")
        .context("post_title missing from the selector table")?
        .to_string();

    let posts = session.find_all(&selector).await?;
    info!(count = posts.len(), subreddit, "posts found");

    println!("Found {} posts on r/{}:", posts.len(), subreddit);
    for (i, post) in posts.iter().take(limit).enumerate() {
        if let Ok(Some(text)) = post.inner_text().await {
            println!("  {}. {}", i + 1, text.trim());
        }
    }
    Ok(())
}
