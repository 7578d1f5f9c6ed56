use super::dom::{ClickAction, Element};
use crate::types::{SearchResult, DEFAULT_BASE_URL, DEFAULT_PORT};

pub const RESULT_CLASS: &str = "omnisearch-result";

/// Header line shown above the hits, e.g. `Found 2 notes for "rust"`.
pub fn count_line(count: usize, query: &str) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("Found {count} note{plural} for \"{query}\"")
}

pub fn empty_notice(query: &str) -> Element {
    Element::new("div")
        .with_class("omnisearch-empty")
        .with_text(format!("No notes found for \"{query}\""))
}

/// Children for the content container: a count header followed by one entry
/// per hit, or the empty-state notice.
pub fn results_view(results: &[SearchResult], query: &str) -> Vec<Element> {
    if results.is_empty() {
        return vec![empty_notice(query)];
    }
    let mut nodes = Vec::with_capacity(results.len() + 1);
    nodes.push(
        Element::new("div")
            .with_class("omnisearch-count")
            .with_text(count_line(results.len(), query)),
    );
    nodes.extend(
        results
            .iter()
            .enumerate()
            .map(|(index, result)| result_entry(index, result)),
    );
    nodes
}

/// One clickable hit. Entries without a path get no path line and no click action.
pub fn result_entry(index: usize, result: &SearchResult) -> Element {
    let path = result.path.as_deref().filter(|p| !p.is_empty());
    let title = result.basename.as_deref().unwrap_or("Untitled");
    let excerpt = result
        .excerpt
        .as_deref()
        .or(result.content.as_deref())
        .unwrap_or("");

    let mut entry = Element::new("div")
        .with_id(&result_element_id(index))
        .with_class(RESULT_CLASS)
        .with_attr("title", format!("Path: {}", path.unwrap_or("N/A")))
        .with_child(Element::new("div").with_class("omnisearch-title").with_text(title));

    if let Some(path) = path {
        entry = entry
            .with_attr("data-path", path)
            .with_child(Element::new("div").with_class("omnisearch-path").with_text(path))
            .with_click(ClickAction::OpenNote {
                path: path.to_string(),
            });
    }
    entry.append(Element::new("div").with_class("omnisearch-excerpt").with_text(excerpt));
    entry
}

pub fn result_element_id(index: usize) -> String {
    format!("omnisearch-result-{index}")
}

/// Inline error notice shown when the relay could not reach Omnisearch.
pub fn error_view(error: &str) -> Element {
    let host = DEFAULT_BASE_URL
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    Element::new("div")
        .with_class("omnisearch-error")
        .with_text(format!("Error: {error}"))
        .with_child(Element::new("br"))
        .with_child(Element::new("br"))
        .with_child(Element::new("small").with_text(format!(
            "Make sure Omnisearch is running (default: {host}:{DEFAULT_PORT}) and the \
             Kagi-Obsidian Bridge settings are correct."
        )))
}
