use crate::config::{FeedGroup, FeedSource};
use crate::error::{AppError, Result};
use crate::image::resolve_image;
use crate::models::{Article, Language};
use crate::parser::{parse_feed, FeedItem};
use crate::proxy::ProxyFetcher;
use crate::source_name::clean_source_name;
use crate::summary::summarize;
use futures::future::join_all;
use tracing::{info, warn};

/// Normalize one parsed item into an [`Article`].
pub fn to_article(item: FeedItem, source: &str, language: Language, summary_len: usize) -> Article {
    let image = resolve_image(&item, source);
    let summary = item
        .description
        .as_deref()
        .or(item.content.as_deref())
        .map(|html| summarize(html, summary_len))
        .unwrap_or_default();

    Article {
        id: item.guid,
        title: item.title,
        source: source.to_string(),
        publication_date: item.published,
        summary,
        link: item.link,
        image_url: image.image_url,
        needs_scraping: image.needs_scraping,
        language,
    }
}

/// Fetch and parse a single RSS/Atom feed into articles.
pub async fn fetch_feed(
    fetcher: &ProxyFetcher,
    feed: &FeedSource,
    summary_len: usize,
) -> Result<Vec<Article>> {
    info!(url = %feed.url, language = %feed.language, "Fetching feed");

    let body = fetcher.fetch(&feed.url).await?;
    let parsed = parse_feed(&body, &feed.url)?;
    let source = clean_source_name(parsed.feed_title.as_deref(), &feed.url);

    let articles: Vec<Article> = parsed
        .items
        .into_iter()
        .map(|item| to_article(item, &source, feed.language, summary_len))
        .collect();

    info!(
        url = %feed.url,
        source = %source,
        count = articles.len(),
        "Parsed feed"
    );

    Ok(articles)
}

/// Fetch every feed of a group concurrently.
///
/// A failing feed is logged and skipped. The group only fails with
/// [`AppError::AggregationExhausted`] when it has feeds and all of them failed.
pub async fn load_feeds(
    fetcher: &ProxyFetcher,
    group: &FeedGroup,
    summary_len: usize,
) -> Result<Vec<Article>> {
    if group.sources.is_empty() {
        return Ok(Vec::new());
    }

    let futures: Vec<_> = group
        .sources
        .iter()
        .map(|feed| fetch_feed(fetcher, feed, summary_len))
        .collect();

    let results = join_all(futures).await;
    let mut all_articles = Vec::new();
    let mut succeeded = 0usize;

    for (feed, result) in group.sources.iter().zip(results) {
        match result {
            Ok(articles) => {
                succeeded += 1;
                all_articles.extend(articles);
            }
            Err(e) => warn!(url = %feed.url, error = %e, "Failed to fetch feed, skipping"),
        }
    }

    if succeeded == 0 {
        return Err(AppError::AggregationExhausted {
            group: group.name.clone(),
        });
    }

    info!(
        group = %group.name,
        feeds = group.sources.len(),
        succeeded,
        articles = all_articles.len(),
        "Loaded feed group"
    );

    Ok(all_articles)
}
