use regex::Regex;
use std::sync::LazyLock;
use url::Url;

pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// Host fragment → display name. Checked in order, first match wins, so more
/// specific hosts (`pcgameshardware.de`) sit above their prefixes.
const KNOWN_SOURCES: &[(&str, &str)] = &[
    ("gamestar.de", "GameStar"),
    ("gamepro.de", "GamePro"),
    ("pcgameshardware.de", "PC Games Hardware"),
    ("pcgames.de", "PC Games"),
    ("gameswirtschaft.de", "GamesWirtschaft"),
    ("mein-mmo.de", "Mein-MMO"),
    ("4players.de", "4Players"),
    ("computerbase.de", "ComputerBase"),
    ("gamespot.com", "GameSpot"),
    ("eurogamer.net", "Eurogamer"),
    ("polygon.com", "Polygon"),
    ("rockpapershotgun.com", "Rock Paper Shotgun"),
    ("pcgamer.com", "PC Gamer"),
    ("vg247.com", "VG247"),
    ("nintendolife.com", "Nintendo Life"),
    ("kotaku.com", "Kotaku"),
    ("theverge.com", "The Verge"),
    ("ign.com", "IGN"),
];

static JUNK_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:latest articles feed|all content|mashup|alles|news|feed|rss|uk)\b")
        .expect("valid junk phrase pattern")
});

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+[-|]\s+|:\s+").expect("valid separator pattern"));

/// Canonical display name for a feed.
///
/// Known hosts map straight to their name. Otherwise the feed title is
/// cleaned: junk phrases are dropped, the title is split on ` - `, ` | ` and
/// `: `, and the shortest remaining segment is title-cased. A title like
/// "News: X" therefore becomes "X".
pub fn clean_source_name(raw_title: Option<&str>, feed_url: &str) -> String {
    if let Some(name) = known_source(feed_url) {
        return name.to_string();
    }

    let raw = raw_title.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return UNKNOWN_SOURCE.to_string();
    }

    let stripped = JUNK_PHRASES.replace_all(raw, " ");
    let stripped = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    let shortest = SEPARATORS
        .split(&stripped)
        .map(|segment| segment.trim_matches(|c: char| c.is_whitespace() || "-|:".contains(c)))
        .filter(|segment| !segment.is_empty())
        .min_by_key(|segment| segment.chars().count());

    match shortest {
        Some(segment) => title_case(segment),
        None => raw.to_string(),
    }
}

fn known_source(feed_url: &str) -> Option<&'static str> {
    let lowered = feed_url.to_lowercase();
    let host = Url::parse(&lowered)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));

    let lookup = |haystack: &str| {
        KNOWN_SOURCES
            .iter()
            .find(|(fragment, _)| haystack.contains(fragment))
            .map(|(_, name)| *name)
    };

    host.as_deref().and_then(lookup).or_else(|| lookup(&lowered))
}

/// Upper-cases the first letter of every word and leaves the rest alone, so
/// acronyms like "IGN" survive.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
