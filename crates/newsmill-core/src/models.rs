use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two feed languages. Every configured feed belongs to exactly one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    De,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::De => "de",
            Self::En => "en",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "de" => Some(Self::De),
            "en" => Some(Self::En),
            _ => None,
        }
    }

    pub fn all() -> &'static [Language] {
        &[Self::De, Self::En]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized news article.
///
/// Field names serialize in camelCase so the persisted cache envelope and the
/// static `news-cache.json` snapshot share one schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub source: String,
    pub publication_date: DateTime<Utc>,
    pub summary: String,
    pub link: String,
    pub image_url: String,
    pub needs_scraping: bool,
    pub language: Language,
}

/// One entry of the derived (source, language) list handed to consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceInfo {
    pub name: String,
    pub language: Language,
}
