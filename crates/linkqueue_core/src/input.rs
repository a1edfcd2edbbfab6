use url::Url;

use crate::QueueItem;

const PROFILE_MARKER: &str = "/in/";

/// Parses pasted text into queue items: one URL per line, trimmed, blank lines
/// dropped, only lines mentioning `site_host` kept.
pub fn parse_queue_input(raw: &str, site_host: &str) -> Vec<QueueItem> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.contains(site_host))
        .map(|line| {
            let is_profile_url = line.contains(PROFILE_MARKER);
            let source_name = if is_profile_url {
                profile_name_from_url(line)
            } else {
                source_from_search_url(line)
            };
            QueueItem::new(line, is_profile_url, Some(source_name))
        })
        .collect()
}

/// Provisional display name from a profile slug: `jane-doe-1234` → `Jane Doe`.
pub fn profile_name_from_url(url: &str) -> String {
    let Some(start) = url.find(PROFILE_MARKER).map(|pos| pos + PROFILE_MARKER.len()) else {
        return "Profile".to_string();
    };
    let slug = url[start..]
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();

    let words: Vec<String> = slug
        .replace('-', " ")
        .chars()
        .filter(|c| !c.is_ascii_digit())
        .collect::<String>()
        .split_whitespace()
        .map(capitalize)
        .collect();

    if words.is_empty() {
        "Profile".to_string()
    } else {
        words.join(" ")
    }
}

/// Display name for a search URL: the connection facet when present.
pub fn source_from_search_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "Search Results".to_string();
    };
    let lookup = |name: &str| {
        parsed
            .query_pairs()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    };
    lookup("facetConnectionOf")
        .or_else(|| lookup("connectionOf"))
        .unwrap_or_else(|| "Search Results".to_string())
}

/// Drops items whose URL is already queued.
pub fn without_known_urls(existing: &[QueueItem], incoming: Vec<QueueItem>) -> Vec<QueueItem> {
    incoming
        .into_iter()
        .filter(|item| !existing.iter().any(|known| known.url == item.url))
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_slug_becomes_title_case_name() {
        assert_eq!(
            profile_name_from_url("https://www.linkedin.com/in/jane-doe-12345/"),
            "Jane Doe"
        );
        assert_eq!(profile_name_from_url("https://www.linkedin.com/in/123/"), "Profile");
    }

    #[test]
    fn search_source_reads_connection_facet() {
        let url = "https://www.linkedin.com/search/results/people/?facetConnectionOf=%5B%22ACoAA%22%5D&page=2";
        assert_eq!(source_from_search_url(url), "[\"ACoAA\"]");
        assert_eq!(
            source_from_search_url("https://www.linkedin.com/search/results/people/"),
            "Search Results"
        );
    }
}
