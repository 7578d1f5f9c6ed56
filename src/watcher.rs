use url::Url;

/// Query parameter Kagi uses for the search terms.
pub const QUERY_PARAM: &str = "q";

/// Pull the search query out of a results-page URL.
/// Returns None when `q` is missing, blank, or the URL does not parse.
pub fn extract_query(page_url: &str) -> Option<String> {
    let url = Url::parse(page_url).ok()?;
    let raw = url
        .query_pairs()
        .find(|(key, _)| *key == QUERY_PARAM)
        .map(|(_, value)| value.into_owned())?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Detects URL changes on single-page navigations. The page reports every
/// structural mutation; only mutations that coincide with a new URL count.
#[derive(Debug, Clone)]
pub struct NavigationWatcher {
    last_url: String,
}

impl NavigationWatcher {
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            last_url: initial_url.into(),
        }
    }

    pub fn last_url(&self) -> &str {
        &self.last_url
    }

    /// Called on each DOM mutation. Returns the new URL if it differs from the
    /// last one seen.
    pub fn observe(&mut self, current_url: &str) -> Option<String> {
        if current_url == self.last_url {
            return None;
        }
        self.last_url = current_url.to_string();
        Some(self.last_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trimmed_query() {
        assert_eq!(
            extract_query("https://kagi.com/search?q=%20%20rust%20lifetimes%20"),
            Some("rust lifetimes".to_string())
        );
        assert_eq!(
            extract_query("https://kagi.com/search?q=rust+lifetimes&r=us"),
            Some("rust lifetimes".to_string())
        );
    }

    #[test]
    fn missing_or_blank_query_is_none() {
        assert_eq!(extract_query("https://kagi.com/search"), None);
        assert_eq!(extract_query("https://kagi.com/search?r=us"), None);
        assert_eq!(extract_query("https://kagi.com/search?q="), None);
        assert_eq!(extract_query("https://kagi.com/search?q=%20%09%20"), None);
        assert_eq!(extract_query("not a url"), None);
    }

    #[test]
    fn first_q_wins() {
        assert_eq!(
            extract_query("https://kagi.com/search?q=first&q=second"),
            Some("first".to_string())
        );
    }

    #[test]
    fn extraction_preserves_arbitrary_trimmed_queries() {
        for query in ["a", "notes about <b>tags</b>", "c++ & rust", "ünïcødé 日本"] {
            let url = format!("https://kagi.com/search?q={}", urlencoding::encode(query));
            assert_eq!(extract_query(&url).as_deref(), Some(query), "query {query:?}");
        }
    }

    #[test]
    fn watcher_reports_only_changes() {
        let mut watcher = NavigationWatcher::new("https://kagi.com/search?q=a");
        assert_eq!(watcher.observe("https://kagi.com/search?q=a"), None);
        assert_eq!(
            watcher.observe("https://kagi.com/search?q=b").as_deref(),
            Some("https://kagi.com/search?q=b")
        );
        assert_eq!(watcher.observe("https://kagi.com/search?q=b"), None);
        assert_eq!(watcher.last_url(), "https://kagi.com/search?q=b");
    }
}
