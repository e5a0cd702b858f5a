use crate::models::{Article, Language, SourceInfo};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Consumer-side article filter. Empty sets mean "no restriction".
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub languages: HashSet<Language>,
    pub sources: HashSet<String>,
    /// Case-insensitive substring match on title and summary.
    pub query: Option<String>,
    pub favorites_only: bool,
}

impl ArticleFilter {
    pub fn matches(&self, article: &Article, favorites: &HashSet<String>) -> bool {
        if !self.languages.is_empty() && !self.languages.contains(&article.language) {
            return false;
        }
        if !self.sources.is_empty() && !self.sources.contains(&article.source) {
            return false;
        }
        if self.favorites_only && !favorites.contains(&article.id) {
            return false;
        }
        match self.query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let q = q.to_lowercase();
                article.title.to_lowercase().contains(&q)
                    || article.summary.to_lowercase().contains(&q)
            }
            _ => true,
        }
    }

    pub fn apply<'a>(&self, articles: &'a [Article], favorites: &HashSet<String>) -> Vec<&'a Article> {
        articles
            .iter()
            .filter(|a| self.matches(a, favorites))
            .collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<'a> {
    pub items: Vec<&'a Article>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub has_more: bool,
}

/// Slice out page `page` (1-based; 0 is treated as 1).
pub fn paginate<'a>(articles: &[&'a Article], page: usize, per_page: usize) -> Page<'a> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let offset = (page - 1).saturating_mul(per_page);
    let items: Vec<&Article> = articles.iter().skip(offset).take(per_page).copied().collect();
    Page {
        has_more: offset + items.len() < articles.len(),
        items,
        page,
        per_page,
        total: articles.len(),
    }
}

/// Unique (source, language) pairs, sorted by name.
pub fn unique_sources(articles: &[Article]) -> Vec<SourceInfo> {
    articles
        .iter()
        .map(|a| SourceInfo {
            name: a.source.clone(),
            language: a.language,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Drop favorite ids that no longer refer to an available article.
pub fn reconcile_favorites(favorites: &HashSet<String>, available: &HashSet<String>) -> HashSet<String> {
    favorites.intersection(available).cloned().collect()
}
