//! Work items and source identity.

/// A candidate source discovered on disk or submitted interactively,
/// before any pipeline work has been done on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocator {
    /// Where the raw source lives: a file path for backlog items, a
    /// script URL for interactive submissions.
    pub locator: String,
    /// Human-readable script name; the item id is its slug.
    pub name: String,
    pub category: String,
}

impl SourceLocator {
    pub fn new(
        locator: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            locator: locator.into(),
            name: name.into(),
            category: category.into(),
        }
    }
}

/// Raw source text as returned by the fetch stage.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub item_id: String,
    pub name: String,
    pub raw: String,
}

/// One ingestible unit flowing through the pipeline. Immutable once
/// created; a rescrape with different content is a new candidate, not a
/// mutation of this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub item_id: String,
    pub category: String,
    pub content_hash: String,
}

/// Derive a stable, filesystem-safe item id from a script name.
///
/// Lowercases, keeps alphanumerics, folds runs of whitespace, `_` and `-`
/// into a single dash, drops other punctuation, and caps the slug at 80
/// characters.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            for lower in ch.to_lowercase().filter(|c| c.is_alphanumeric()) {
                slug.push(lower);
            }
            pending_dash = false;
        } else if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_dash = true;
        }
    }
    let truncated: String = slug.chars().take(80).collect();
    truncated.trim_end_matches('-').to_string()
}

/// Provisional script name from a submitted URL: its last path segment.
/// The scraper's page title replaces it once the source is fetched.
pub fn source_name_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn name_from_url_takes_last_segment() {
        assert_eq!(
            source_name_from_url("https://example.com/script/AbC123-my-indicator/"),
            "AbC123-my-indicator"
        );
        assert_eq!(source_name_from_url("plain-name"), "plain-name");
    }

    #[test]
    fn slugify_lowercases_and_dashes() {
        assert_eq!(slugify("RSI Divergence Finder"), "rsi-divergence-finder");
    }

    #[test]
    fn slugify_strips_punctuation() {
        assert_eq!(
            slugify("MACD + Signal (v2.1)!"),
            "macd-signal-v2-1",
        );
    }

    #[test]
    fn slugify_folds_underscores_and_runs() {
        assert_eq!(slugify("  twin__range   filter  "), "twin-range-filter");
    }

    #[test]
    fn slugify_caps_length() {
        let long = "a".repeat(200);
        assert_eq!(slugify(&long).chars().count(), 80);
    }

    #[test]
    fn slugify_empty_input() {
        assert_eq!(slugify("   "), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugify_never_leads_or_trails_with_dash() {
        assert_eq!(slugify("- leading and trailing -"), "leading-and-trailing");
    }

    proptest! {
        #[test]
        fn slugify_is_idempotent(name in ".{0,120}") {
            let once = slugify(&name);
            prop_assert_eq!(slugify(&once), once);
        }

        #[test]
        fn slugify_output_charset(name in ".{0,120}") {
            let slug = slugify(&name);
            prop_assert!(slug.chars().all(|c| c.is_alphanumeric() || c == '-'));
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(slug.chars().count() <= 80);
        }
    }
}
