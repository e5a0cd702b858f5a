//! Picks a representative image for a feed item.
//!
//! Candidates are tried in a fixed order (image enclosure, explicit
//! thumbnail, media thumbnail, `<img>` scan of the HTML body), resolved to an
//! absolute URL against the item link, and passed through [`REWRITE_RULES`].
//! When nothing survives, a placeholder naming the source is used.

use crate::parser::FeedItem;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

pub const PLACEHOLDER_BASE: &str = "https://placehold.co/600x400/1f2937/e5e7eb";
const PLACEHOLDER_NAME_LEN: usize = 20;

/// Sources whose feeds rarely carry images; their placeholders are worth
/// replacing by scraping the article page.
const SCRAPE_REQUIRED_SOURCES: &[&str] = &[
    "GameStar",
    "GamePro",
    "PC Games",
    "PC Games Hardware",
    "GamesWirtschaft",
    "Mein-MMO",
    "4Players",
    "Eurogamer",
    "Rock Paper Shotgun",
];

const TRACKER_DOMAINS: &[&str] = &[
    "feedburner.com",
    "feedsportal.com",
    "pixel.wp.com",
    "stats.wordpress.com",
    "doubleclick.net",
    "google-analytics.com",
    "scorecardresearch.com",
    "vgwort.de",
    "ioam.de",
    "pixel.",
    "tracking.",
];

const LAZY_ATTRIBUTES: &[&str] = &["data-src", "data-lazy-src"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub image_url: String,
    pub needs_scraping: bool,
}

/// Why an `<img>` element was skipped during the HTML scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRejection {
    MissingSource,
    TrackerDomain,
    SubPixel,
}

impl std::fmt::Display for ImageRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::MissingSource => "no-src",
            Self::TrackerDomain => "tracker-domain",
            Self::SubPixel => "sub-pixel-dimensions",
        })
    }
}

pub fn resolve_image(item: &FeedItem, source_name: &str) -> ResolvedImage {
    let resolved = image_candidate(item)
        .and_then(|candidate| absolutize(&candidate, &item.link))
        .map(|url| apply_rewrites(url, source_name));

    match resolved {
        Some(image_url) => ResolvedImage {
            image_url,
            needs_scraping: false,
        },
        None => ResolvedImage {
            image_url: placeholder_url(source_name),
            needs_scraping: requires_scraping(source_name),
        },
    }
}

fn image_candidate(item: &FeedItem) -> Option<String> {
    item.enclosures
        .iter()
        .find(|e| {
            e.mime_type
                .as_deref()
                .is_some_and(|t| t.to_ascii_lowercase().starts_with("image"))
        })
        .map(|e| e.url.clone())
        .or_else(|| item.thumbnail.clone())
        .or_else(|| item.media_thumbnail.clone())
        .or_else(|| item.content.as_deref().and_then(first_image_in_html))
        .or_else(|| item.description.as_deref().and_then(first_image_in_html))
}

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid img selector"));

/// First `<img>` in `html` that passes [`check_img`].
pub fn first_image_in_html(html: &str) -> Option<String> {
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&IMG_SELECTOR)
        .find_map(|img| match check_img(&img) {
            Ok(src) => Some(src),
            Err(reason) => {
                debug!(%reason, "Rejected inline image");
                None
            }
        })
}

/// Predicate chain for one `<img>`: it needs a source, must not come from a
/// tracker, and must not declare a width or height of 1px or less. Images
/// without declared dimensions pass.
pub fn check_img(img: &ElementRef<'_>) -> Result<String, ImageRejection> {
    let el = img.value();
    let src = LAZY_ATTRIBUTES
        .iter()
        .chain(std::iter::once(&"src"))
        .filter_map(|attr| el.attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .ok_or(ImageRejection::MissingSource)?;

    let lowered = src.to_lowercase();
    if TRACKER_DOMAINS.iter().any(|d| lowered.contains(d)) {
        return Err(ImageRejection::TrackerDomain);
    }

    let sub_pixel = ["width", "height"]
        .iter()
        .filter_map(|attr| el.attr(attr))
        .filter_map(declared_dimension)
        .any(|v| v <= 1.0);
    if sub_pixel {
        return Err(ImageRejection::SubPixel);
    }

    Ok(src.to_string())
}

fn declared_dimension(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches("px").trim().parse().ok()
}

fn absolutize(candidate: &str, base: &str) -> Option<Url> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    Url::parse(candidate)
        .or_else(|_| Url::parse(base).and_then(|b| b.join(candidate)))
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
}

/// One row of the per-host rewrite table.
pub struct RewriteRule {
    pub name: &'static str,
    matches: fn(host: &str, source: &str) -> bool,
    rewrite: Option<fn(path: &str) -> String>,
}

/// Ordered; the first matching row decides. Rows without a rewrite exempt
/// their hosts from the broader rows below them.
pub static REWRITE_RULES: &[RewriteRule] = &[
    RewriteRule {
        name: "gamespot-original",
        matches: is_gamespot,
        rewrite: Some(gamespot_original),
    },
    RewriteRule {
        name: "pcgameshardware-keep",
        matches: is_pcgameshardware,
        rewrite: None,
    },
    RewriteRule {
        name: "pcgames-keep",
        matches: is_pcgames,
        rewrite: None,
    },
    RewriteRule {
        name: "cgames-upscale",
        matches: is_cgames_or_webedia,
        rewrite: Some(upscale_to_800),
    },
    RewriteRule {
        name: "gameswirtschaft-full-size",
        matches: is_gameswirtschaft,
        rewrite: Some(strip_size_suffix),
    },
];

fn is_gamespot(host: &str, _source: &str) -> bool {
    host.contains("gamespot.com")
}

fn is_pcgameshardware(host: &str, _source: &str) -> bool {
    host.contains("pcgameshardware.de")
}

fn is_pcgames(host: &str, _source: &str) -> bool {
    host.contains("pcgames.de")
}

fn is_cgames_or_webedia(host: &str, source: &str) -> bool {
    host.contains("cgames.de") || source == "GameStar" || source == "GamePro"
}

fn is_gameswirtschaft(_host: &str, source: &str) -> bool {
    source == "GamesWirtschaft"
}

static GAMESPOT_RESOLUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/uploads/[^/]+/").expect("valid gamespot pattern"));
static SIZE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d{2,4}/").expect("valid size segment pattern"));
static SIZE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d+x\d+(\.[A-Za-z0-9]+)$").expect("valid size suffix pattern"));

fn gamespot_original(path: &str) -> String {
    GAMESPOT_RESOLUTION
        .replacen(path, 1, "/uploads/original/")
        .into_owned()
}

fn upscale_to_800(path: &str) -> String {
    SIZE_SEGMENT.replacen(path, 1, "/800/").into_owned()
}

fn strip_size_suffix(path: &str) -> String {
    SIZE_SUFFIX.replace(path, "$1").into_owned()
}

pub fn apply_rewrites(mut url: Url, source_name: &str) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    if let Some(rule) = REWRITE_RULES.iter().find(|r| (r.matches)(&host, source_name)) {
        if let Some(rewrite) = rule.rewrite {
            let path = rewrite(url.path());
            url.set_path(&path);
            debug!(rule = rule.name, url = %url, "Rewrote image URL");
        }
    }
    url.to_string()
}

/// Placeholder image labelled with (up to 20 chars of) the source name.
pub fn placeholder_url(source_name: &str) -> String {
    let label: String = source_name.trim().chars().take(PLACEHOLDER_NAME_LEN).collect();
    let label = if label.is_empty() { "News".to_string() } else { label };
    format!(
        "{PLACEHOLDER_BASE}?text={}",
        utf8_percent_encode(&label, NON_ALPHANUMERIC)
    )
}

pub fn is_placeholder(image_url: &str) -> bool {
    image_url.starts_with(PLACEHOLDER_BASE)
}

/// Loose match against [`SCRAPE_REQUIRED_SOURCES`]: case and punctuation are
/// ignored and the source name must contain a listed name. A short generic
/// name like "Games" never matches a longer entry.
pub fn requires_scraping(source_name: &str) -> bool {
    let name = fold(source_name);
    if name.is_empty() {
        return false;
    }
    SCRAPE_REQUIRED_SOURCES.iter().any(|known| {
        let known = fold(known);
        name.contains(&known)
    })
}

fn fold(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Enclosure;
    use chrono::Utc;

    fn item(link: &str) -> FeedItem {
        FeedItem {
            title: "Title".into(),
            link: link.into(),
            published: Utc::now(),
            guid: link.into(),
            description: None,
            content: None,
            media_thumbnail: None,
            thumbnail: None,
            enclosures: vec![],
        }
    }

    #[test]
    fn gamespot_uses_original_resolution() {
        let mut it = item("https://www.gamespot.com/articles/x/");
        it.media_thumbnail =
            Some("https://www.gamespot.com/a/uploads/square_small/123/image.jpg".into());
        let resolved = resolve_image(&it, "GameSpot");
        assert_eq!(
            resolved.image_url,
            "https://www.gamespot.com/a/uploads/original/123/image.jpg"
        );
        assert!(!resolved.needs_scraping);
    }

    #[test]
    fn tracking_pixel_falls_back_to_placeholder() {
        let mut it = item("https://www.gamestar.de/artikel/1.html");
        it.content = Some(r#"<p>Text</p><img src="track.gif" width="1" height="1">"#.into());

        let resolved = resolve_image(&it, "GameStar");
        assert!(is_placeholder(&resolved.image_url));
        assert!(resolved.image_url.contains("text=GameStar"));
        assert!(resolved.needs_scraping);

        let resolved = resolve_image(&it, "Some Blog");
        assert!(resolved.image_url.contains("text=Some%20Blog"));
        assert!(!resolved.needs_scraping);
    }

    #[test]
    fn enclosure_image_beats_thumbnails() {
        let mut it = item("https://example.com/a");
        it.enclosures = vec![
            Enclosure {
                url: "https://example.com/a.mp3".into(),
                mime_type: Some("audio/mpeg".into()),
            },
            Enclosure {
                url: "https://example.com/enc.jpg".into(),
                mime_type: Some("image/jpeg".into()),
            },
        ];
        it.thumbnail = Some("https://example.com/thumb.jpg".into());
        it.media_thumbnail = Some("https://example.com/media.jpg".into());
        assert_eq!(resolve_image(&it, "X").image_url, "https://example.com/enc.jpg");

        it.enclosures.clear();
        assert_eq!(resolve_image(&it, "X").image_url, "https://example.com/thumb.jpg");

        it.thumbnail = None;
        assert_eq!(resolve_image(&it, "X").image_url, "https://example.com/media.jpg");
    }

    #[test]
    fn html_scan_resolves_relative_and_prefers_lazy_src() {
        let mut it = item("https://example.com/news/a.html");
        it.content = Some(
            r#"<img width="1" height="1" src="https://example.com/spacer.gif">
               <img src="placeholder.gif" data-src="/img/real.jpg">"#
                .into(),
        );
        assert_eq!(resolve_image(&it, "X").image_url, "https://example.com/img/real.jpg");
    }

    #[test]
    fn description_scanned_after_content() {
        let mut it = item("https://example.com/a");
        it.content = Some("<p>no images</p>".into());
        it.description = Some(r#"<img src="https://example.com/d.png">"#.into());
        assert_eq!(resolve_image(&it, "X").image_url, "https://example.com/d.png");
    }

    #[test]
    fn check_img_named_rejections() {
        let html = Html::parse_fragment(
            r#"<img alt="x">
               <img src="https://pixel.wp.com/g.gif">
               <img src="a.jpg" width="0">
               <img src="b.jpg">"#,
        );
        let results: Vec<_> = html.select(&IMG_SELECTOR).map(|i| check_img(&i)).collect();
        assert_eq!(results[0], Err(ImageRejection::MissingSource));
        assert_eq!(results[1], Err(ImageRejection::TrackerDomain));
        assert_eq!(results[2], Err(ImageRejection::SubPixel));
        assert_eq!(results[3], Ok("b.jpg".to_string()));
    }

    #[test]
    fn undeclared_dimensions_are_accepted() {
        assert_eq!(
            first_image_in_html(r#"<img src="https://example.com/tiny.gif">"#),
            Some("https://example.com/tiny.gif".into())
        );
    }

    #[test]
    fn cgames_images_are_upscaled() {
        let url = Url::parse("https://images.cgames.de/images/gamestar/226/some-image.jpg").unwrap();
        assert_eq!(
            apply_rewrites(url, "GameStar"),
            "https://images.cgames.de/images/gamestar/800/some-image.jpg"
        );
    }

    #[test]
    fn pcgames_hosts_are_left_alone() {
        for raw in [
            "https://www.pcgames.de/screenshots/308/2024/05/a.jpg",
            "https://www.pcgameshardware.de/screenshots/308/2024/05/a.jpg",
        ] {
            let url = Url::parse(raw).unwrap();
            assert_eq!(apply_rewrites(url, "PC Games"), raw);
        }
    }

    #[test]
    fn gameswirtschaft_strips_size_suffix() {
        let url =
            Url::parse("https://www.gameswirtschaft.de/wp-content/uploads/2024/05/bild-1024x576.jpg")
                .unwrap();
        assert_eq!(
            apply_rewrites(url, "GamesWirtschaft"),
            "https://www.gameswirtschaft.de/wp-content/uploads/2024/05/bild.jpg"
        );
    }

    #[test]
    fn unresolvable_candidate_uses_placeholder() {
        let mut it = item("not a url");
        it.thumbnail = Some("relative/only.jpg".into());
        let resolved = resolve_image(&it, "PC Games");
        assert!(is_placeholder(&resolved.image_url));
        assert!(resolved.needs_scraping);
    }

    #[test]
    fn placeholder_truncates_and_encodes() {
        let url = placeholder_url("A Very Long Source Name That Goes On");
        assert_eq!(url, format!("{PLACEHOLDER_BASE}?text=A%20Very%20Long%20Source%20N"));
        assert!(placeholder_url("").ends_with("text=News"));
    }

    #[test]
    fn scrape_list_matching_is_fuzzy() {
        assert!(requires_scraping("gamestar"));
        assert!(requires_scraping("PC Games Hardware"));
        assert!(requires_scraping("MeinMMO"));
        assert!(!requires_scraping("GameSpot"));
        assert!(!requires_scraping(""));
    }

    #[test]
    fn short_generic_names_do_not_require_scraping() {
        assert!(!requires_scraping("Games"));
        assert!(!requires_scraping("PC"));
        assert!(!requires_scraping("MMO"));
        assert!(requires_scraping("GameStar Plus"));
    }
}
