//! RSS 2.0 / Atom parsing into [`FeedItem`]s.
//!
//! Every field has its own extraction step below, so the preference order
//! (alternate link before first link, `published` before `updated`,
//! `content:encoded` before `description`) is explicit.

use crate::error::{AppError, Result};
use crate::xml::{parse_document, XmlElement};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: Option<String>,
}

/// Intermediate item, before normalization into an [`crate::Article`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub published: DateTime<Utc>,
    pub guid: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub media_thumbnail: Option<String>,
    pub thumbnail: Option<String>,
    pub enclosures: Vec<Enclosure>,
}

#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub format: FeedFormat,
    pub feed_title: Option<String>,
    pub items: Vec<FeedItem>,
}

/// Parse a raw feed document.
///
/// Items without a title, link or parseable date are dropped. A document that
/// has item nodes but yields none is logged and still returned as a success.
pub fn parse_feed(raw_xml: &str, feed_url: &str) -> Result<ParsedFeed> {
    let root = parse_document(raw_xml)?;
    if root.contains_local("parsererror") {
        return Err(AppError::MalformedXml(
            "document contains a parser error marker".into(),
        ));
    }

    let format = detect_format(&root);
    let (feed_title, nodes) = match format {
        FeedFormat::Atom => (
            root.child_text("title"),
            root.children.iter().filter(|c| c.local_name() == "entry").collect::<Vec<_>>(),
        ),
        FeedFormat::Rss => (
            root.child("channel").and_then(|c| c.child_text("title")),
            root.descendants_named("item"),
        ),
    };

    let base = Url::parse(feed_url).ok();
    let mut items = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let extracted = match format {
            FeedFormat::Rss => rss_item(node, base.as_ref()),
            FeedFormat::Atom => atom_entry(node, base.as_ref()),
        };
        match extracted {
            Ok(item) => items.push(item),
            Err(e) => debug!(feed = %feed_url, reason = %e, "Skipping item"),
        }
    }

    if items.is_empty() && !nodes.is_empty() {
        warn!(
            feed = %feed_url,
            nodes = nodes.len(),
            "Feed has entries but none were usable"
        );
    }

    Ok(ParsedFeed {
        format,
        feed_title: feed_title.map(collapse_whitespace),
        items,
    })
}

fn detect_format(root: &XmlElement) -> FeedFormat {
    if root.local_name() == "feed" {
        FeedFormat::Atom
    } else {
        FeedFormat::Rss
    }
}

fn rss_item(node: &XmlElement, base: Option<&Url>) -> Result<FeedItem> {
    let title = item_title(node)?;
    let link = node
        .child_text("link")
        .and_then(|l| absolutize(l, base))
        .ok_or(AppError::MissingRequiredField("link"))?;
    let published = node
        .child_text("pubDate")
        .or_else(|| node.child_text("dc:date"))
        .and_then(parse_date)
        .ok_or(AppError::MissingRequiredField("publication date"))?;
    let guid = node
        .child_text("guid")
        .map(str::to_string)
        .unwrap_or_else(|| link.clone());
    let description = node.child_text("description").map(str::to_string);
    let content = node
        .child_text("content:encoded")
        .map(str::to_string)
        .or_else(|| description.clone());

    Ok(FeedItem {
        title,
        link,
        published,
        guid,
        description,
        content,
        media_thumbnail: media_thumbnail(node),
        thumbnail: plain_thumbnail(node),
        enclosures: enclosures(node),
    })
}

fn atom_entry(node: &XmlElement, base: Option<&Url>) -> Result<FeedItem> {
    let title = item_title(node)?;
    let link = atom_link(node)
        .and_then(|l| absolutize(l, base))
        .ok_or(AppError::MissingRequiredField("link"))?;
    let published = node
        .child_text("published")
        .or_else(|| node.child_text("updated"))
        .and_then(parse_date)
        .ok_or(AppError::MissingRequiredField("publication date"))?;
    let guid = node
        .child_text("id")
        .map(str::to_string)
        .unwrap_or_else(|| link.clone());
    let description = node.child_text("summary").map(str::to_string);
    let content = node
        .child_text("content")
        .map(str::to_string)
        .or_else(|| description.clone());

    Ok(FeedItem {
        title,
        link,
        published,
        guid,
        description,
        content,
        media_thumbnail: media_thumbnail(node),
        thumbnail: plain_thumbnail(node),
        enclosures: enclosures(node),
    })
}

fn item_title(node: &XmlElement) -> Result<String> {
    node.child_text("title")
        .map(collapse_whitespace)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::MissingRequiredField("title"))
}

/// `rel="alternate"` first, then the first link carrying an `href`.
fn atom_link(node: &XmlElement) -> Option<&str> {
    node.children_named("link")
        .find(|l| l.attr("rel") == Some("alternate") && l.attr("href").is_some())
        .or_else(|| node.children_named("link").find(|l| l.attr("href").is_some()))
        .and_then(|l| l.attr("href"))
}

fn media_thumbnail(node: &XmlElement) -> Option<String> {
    let scopes = std::iter::once(node).chain(node.child("media:group"));
    for scope in scopes {
        if let Some(url) = scope.child("media:thumbnail").and_then(|t| t.attr("url")) {
            return Some(url.to_string());
        }
        let image_content = scope.children_named("media:content").find(|c| {
            c.attr("medium") == Some("image")
                || c.attr("type").is_some_and(|t| t.starts_with("image"))
        });
        if let Some(url) = image_content.and_then(|c| c.attr("url")) {
            return Some(url.to_string());
        }
    }
    None
}

fn plain_thumbnail(node: &XmlElement) -> Option<String> {
    ["thumbnail", "image"].iter().find_map(|name| {
        let el = node.child(name)?;
        el.attr("url")
            .or_else(|| el.child_text("url"))
            .or_else(|| Some(el.text()).filter(|t| !t.is_empty()))
            .map(str::to_string)
    })
}

fn enclosures(node: &XmlElement) -> Vec<Enclosure> {
    node.children_named("enclosure")
        .filter_map(|e| {
            Some(Enclosure {
                url: e.attr("url")?.to_string(),
                mime_type: e.attr("type").map(str::to_string),
            })
        })
        .collect()
}

fn absolutize(link: &str, base: Option<&Url>) -> Option<String> {
    if let Ok(url) = Url::parse(link) {
        return Some(url.to_string());
    }
    base.and_then(|b| b.join(link).ok()).map(|u| u.to_string())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse the date formats seen in the wild: RFC 2822, RFC 3339 and a few
/// near misses. Zone-less timestamps are taken as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const ZONED: &[&str] = &[
        "%a, %d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%d %H:%M:%S %z",
    ];
    for fmt in ZONED {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    const NAIVE: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    NAIVE
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
