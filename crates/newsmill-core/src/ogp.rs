use crate::models::Article;
use crate::proxy::ProxyFetcher;
use futures::future::join_all;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Meta keys checked in order. Each may appear as `property` or `name`.
const META_KEYS: &[&str] = &["og:image", "og:image:url", "twitter:image"];

/// The image meta tags live in `<head>`; the rest of the page is ignored.
const HEAD_BYTES: usize = 65536;

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[content]").expect("valid meta selector"));

/// Extract the preview image from a page, resolved against `page_url`.
pub fn extract_og_image(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(truncate_head(html));
    let metas: Vec<_> = document.select(&META_SELECTOR).collect();

    let content = META_KEYS.iter().find_map(|key| {
        metas.iter().find_map(|meta| {
            let el = meta.value();
            let named = el.attr("property").or_else(|| el.attr("name"))?;
            if !named.trim().eq_ignore_ascii_case(key) {
                return None;
            }
            el.attr("content")
                .map(str::trim)
                .filter(|c| !c.is_empty())
        })
    })?;

    let resolved = match Url::parse(content) {
        Ok(url) => url,
        Err(_) => Url::parse(page_url).ok()?.join(content).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn truncate_head(html: &str) -> &str {
    if html.len() <= HEAD_BYTES {
        return html;
    }
    let mut end = HEAD_BYTES;
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    &html[..end]
}

/// Fetch a page through the page proxies and extract its preview image.
/// Returns None on any failure.
pub async fn scrape_og_image(fetcher: &ProxyFetcher, page_url: &str) -> Option<String> {
    let html = match fetcher.fetch(page_url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(url = %page_url, error = %e, "Failed to fetch page for OGP");
            return None;
        }
    };

    let image = extract_og_image(&html, page_url);
    if image.is_none() {
        debug!(url = %page_url, "No preview image meta tag");
    }
    image
}

/// Scrape preview images for `targets`, `batch_size` pages at a time with
/// `pause` between batches.
///
/// Returns updated copies of the articles whose image was found, with
/// `needs_scraping` cleared. Articles that could not be improved are left out.
pub async fn scrape_in_batches(
    fetcher: &ProxyFetcher,
    targets: &[Article],
    batch_size: usize,
    pause: Duration,
) -> Vec<Article> {
    let mut improved = Vec::new();
    let batch_size = batch_size.max(1);
    let batches = targets.chunks(batch_size).count();

    for (index, batch) in targets.chunks(batch_size).enumerate() {
        let futures = batch.iter().map(|article| async move {
            scrape_og_image(fetcher, &article.link)
                .await
                .map(|image_url| Article {
                    image_url,
                    needs_scraping: false,
                    ..article.clone()
                })
        });
        improved.extend(join_all(futures).await.into_iter().flatten());

        if index + 1 < batches {
            tokio::time::sleep(pause).await;
        }
    }

    info!(
        attempted = targets.len(),
        improved = improved.len(),
        "OGP scraping complete"
    );
    improved
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://www.gamestar.de/artikel/test,123.html";

    #[test]
    fn extract_standard_og_image() {
        let html = r#"
        <html><head>
        <meta property="og:image" content="https://example.com/image.jpg">
        </head></html>
        "#;
        assert_eq!(
            extract_og_image(html, PAGE),
            Some("https://example.com/image.jpg".into())
        );
    }

    #[test]
    fn extract_content_before_property() {
        let html = r#"<meta content="https://example.com/photo.png" property="og:image" />"#;
        assert_eq!(
            extract_og_image(html, PAGE),
            Some("https://example.com/photo.png".into())
        );
    }

    #[test]
    fn og_image_wins_over_twitter_regardless_of_order() {
        let html = r#"
        <meta name="twitter:image" content="https://example.com/tw.jpg">
        <meta property="og:image:url" content="https://example.com/og-url.jpg">
        <meta property="og:image" content="https://example.com/og.jpg">
        "#;
        assert_eq!(
            extract_og_image(html, PAGE),
            Some("https://example.com/og.jpg".into())
        );
    }

    #[test]
    fn falls_back_to_twitter_image_by_name() {
        let html = r#"<meta name="twitter:image" content="https://example.com/tw.jpg">"#;
        assert_eq!(
            extract_og_image(html, PAGE),
            Some("https://example.com/tw.jpg".into())
        );
    }

    #[test]
    fn og_image_as_name_attribute() {
        let html = r#"<meta name="og:image" content="https://example.com/n.jpg">"#;
        assert_eq!(
            extract_og_image(html, PAGE),
            Some("https://example.com/n.jpg".into())
        );
    }

    #[test]
    fn relative_url_resolved_against_page() {
        let html = r#"<meta property="og:image" content="/images/local.jpg">"#;
        assert_eq!(
            extract_og_image(html, PAGE),
            Some("https://www.gamestar.de/images/local.jpg".into())
        );
    }

    #[test]
    fn no_og_image() {
        let html = r#"<html><head><title>Test</title></head></html>"#;
        assert_eq!(extract_og_image(html, PAGE), None);
    }

    #[test]
    fn empty_content_skipped() {
        let html = r#"
        <meta property="og:image" content="  ">
        <meta name="twitter:image" content="https://example.com/tw.jpg">
        "#;
        assert_eq!(
            extract_og_image(html, PAGE),
            Some("https://example.com/tw.jpg".into())
        );
    }

    #[test]
    fn truncate_head_respects_char_boundary() {
        let html = "ä".repeat(HEAD_BYTES);
        let head = truncate_head(&html);
        assert!(head.len() <= HEAD_BYTES);
        assert!(head.chars().all(|c| c == 'ä'));
    }
}
