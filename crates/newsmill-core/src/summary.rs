use scraper::{ElementRef, Html, Node};
use std::collections::HashSet;

pub const DEFAULT_SUMMARY_LEN: usize = 150;

const ELLIPSIS: &str = "...";
const BOILERPLATE_LINKS: &[&str] = &["read more", "continue reading"];

/// Plain-text summary of an HTML description.
///
/// `script`/`style` subtrees are dropped, as are "read more" links together
/// with their enclosing paragraph. Text longer than `max_len` characters is cut
/// at the last whitespace within range and gets `...` appended, so the result
/// is never longer than `max_len + 3`.
pub fn summarize(html: &str, max_len: usize) -> String {
    let fragment = Html::parse_fragment(html);

    let mut excluded = HashSet::new();
    for node in fragment.tree.root().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        match element.value().name() {
            "script" | "style" => {
                excluded.insert(node.id());
            }
            "a" if is_boilerplate_link(&element) => {
                let paragraph = node
                    .ancestors()
                    .find(|a| ElementRef::wrap(*a).is_some_and(|e| e.value().name() == "p"));
                excluded.insert(paragraph.map_or(node.id(), |p| p.id()));
            }
            _ => {}
        }
    }

    let mut text = String::new();
    for node in fragment.tree.root().descendants() {
        let Node::Text(chunk) = node.value() else {
            continue;
        };
        if node.ancestors().any(|a| excluded.contains(&a.id())) {
            continue;
        }
        text.push_str(chunk);
    }

    let text = text.replace(['<', '>'], "");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text == ELLIPSIS {
        return String::new();
    }
    truncate_at_word(&text, max_len)
}

fn is_boilerplate_link(anchor: &ElementRef<'_>) -> bool {
    let text = anchor.text().collect::<String>().to_lowercase();
    BOILERPLATE_LINKS.iter().any(|phrase| text.contains(phrase))
}

fn truncate_at_word(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    // One extra char so a space right after the limit counts as a boundary.
    let window: String = text.chars().take(max_len + 1).collect();
    let head = match window.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => &window[..idx],
        _ => {
            let end = window
                .char_indices()
                .nth(max_len)
                .map_or(window.len(), |(i, _)| i);
            &window[..end]
        }
    };
    format!("{}{ELLIPSIS}", head.trim_end())
}
