use crate::image::is_placeholder;
use crate::models::Article;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Collapse duplicate ids. The last occurrence wins but keeps the position of
/// the first, so the output is stable for a given input.
///
/// A real image is never replaced by a placeholder: feeds re-deliver items
/// without the image that was scraped for them earlier.
pub fn dedupe_last_wins(articles: impl IntoIterator<Item = Article>) -> Vec<Article> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Article> = Vec::new();

    for mut article in articles {
        match index.get(&article.id) {
            Some(&pos) => {
                let previous = &out[pos];
                if is_placeholder(&article.image_url) && !is_placeholder(&previous.image_url) {
                    article.image_url = previous.image_url.clone();
                    article.needs_scraping = false;
                }
                out[pos] = article;
            }
            None => {
                index.insert(article.id.clone(), out.len());
                out.push(article);
            }
        }
    }
    out
}

/// Drop articles published before `now - retention`.
pub fn prune_older_than(articles: Vec<Article>, now: DateTime<Utc>, retention: Duration) -> Vec<Article> {
    let cutoff = now - retention;
    articles
        .into_iter()
        .filter(|a| a.publication_date >= cutoff)
        .collect()
}

/// Newest first. Ties are broken by id so repeated sorts agree.
pub fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| {
        b.publication_date
            .cmp(&a.publication_date)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Merge `incoming` over `existing`: dedupe by id with incoming winning, prune
/// by age, sort newest first.
pub fn merge(
    existing: Vec<Article>,
    incoming: Vec<Article>,
    now: DateTime<Utc>,
    retention: Duration,
) -> Vec<Article> {
    let merged = dedupe_last_wins(existing.into_iter().chain(incoming));
    let mut pruned = prune_older_than(merged, now, retention);
    sort_newest_first(&mut pruned);
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::placeholder_url;
    use crate::models::Language;

    fn article(id: &str, hours_ago: i64, now: DateTime<Utc>) -> Article {
        Article {
            id: id.into(),
            title: format!("Title {id}"),
            source: "GameStar".into(),
            publication_date: now - Duration::hours(hours_ago),
            summary: String::new(),
            link: format!("https://example.com/{id}"),
            image_url: "https://example.com/i.jpg".into(),
            needs_scraping: false,
            language: Language::De,
        }
    }

    #[test]
    fn last_write_wins() {
        let now = Utc::now();
        let mut newer = article("a", 1, now);
        newer.title = "Updated".into();
        let out = dedupe_last_wins(vec![article("a", 1, now), article("b", 2, now), newer]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "Updated");
        assert_eq!(out[1].id, "b");
    }

    #[test]
    fn placeholder_does_not_replace_scraped_image() {
        let now = Utc::now();
        let mut scraped = article("a", 1, now);
        scraped.image_url = "https://img.example.com/og.jpg".into();

        let mut refetched = article("a", 1, now);
        refetched.title = "Edited title".into();
        refetched.image_url = placeholder_url("GameStar");
        refetched.needs_scraping = true;

        let out = merge(vec![scraped], vec![refetched], now, Duration::days(7));
        assert_eq!(out[0].title, "Edited title");
        assert_eq!(out[0].image_url, "https://img.example.com/og.jpg");
        assert!(!out[0].needs_scraping);
    }

    #[test]
    fn real_image_still_replaces_placeholder() {
        let now = Utc::now();
        let mut old = article("a", 1, now);
        old.image_url = placeholder_url("GameStar");
        old.needs_scraping = true;

        let out = merge(vec![old], vec![article("a", 1, now)], now, Duration::days(7));
        assert_eq!(out[0].image_url, "https://example.com/i.jpg");
        assert!(!out[0].needs_scraping);
    }

    #[test]
    fn prune_drops_old_articles() {
        let now = Utc::now();
        let out = prune_older_than(
            vec![article("fresh", 24, now), article("old", 24 * 8, now)],
            now,
            Duration::days(7),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "fresh");
    }

    #[test]
    fn prune_is_idempotent() {
        let now = Utc::now();
        let input = vec![
            article("a", 1, now),
            article("b", 24 * 7 + 1, now),
            article("c", 24 * 6, now),
        ];
        let once = prune_older_than(input, now, Duration::days(7));
        let twice = prune_older_than(once.clone(), now, Duration::days(7));
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_with_itself_is_identity() {
        let now = Utc::now();
        let a = merge(
            vec![],
            vec![article("x", 5, now), article("y", 1, now), article("z", 3, now)],
            now,
            Duration::days(7),
        );
        let again = merge(a.clone(), a.clone(), now, Duration::days(7));
        assert_eq!(a, again);
    }

    #[test]
    fn merge_sorts_newest_first_and_prefers_incoming() {
        let now = Utc::now();
        let mut incoming_x = article("x", 5, now);
        incoming_x.image_url = "https://example.com/better.jpg".into();

        let out = merge(
            vec![article("x", 5, now), article("old", 24 * 30, now)],
            vec![article("y", 1, now), incoming_x],
            now,
            Duration::days(7),
        );
        let ids: Vec<_> = out.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "x"]);
        assert_eq!(out[1].image_url, "https://example.com/better.jpg");
    }

    #[test]
    fn equal_dates_ordered_by_id() {
        let now = Utc::now();
        let mut v = vec![article("b", 1, now), article("a", 1, now)];
        sort_newest_first(&mut v);
        assert_eq!(v[0].id, "a");
    }
}
