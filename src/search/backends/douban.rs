//! Douban (豆瓣) catalog scrape — movies and TV shows.
//!
//! Two search endpoints are tried in order; the first page that yields any
//! parsed subject wins. Extraction works over raw HTML with a small set of
//! patterns tried most-specific first.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use tracing::warn;

use crate::search::{SearchKind, SearchResult};

use super::BROWSER_USER_AGENT;

const TIMEOUT: Duration = Duration::from_secs(8);

static ITEM_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?s)<div class="item">.*?</div>"#,
        r#"(?s)<div class="result">.*?</div>"#,
        r#"(?s)<li class="[^"]*">.*?</li>"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("item regex"))
    .collect()
});

/// Subject link patterns: the first captures the numeric subject id + title,
/// the fallback only the title.
static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a href="[^"]*?/subject/(\d+)/"[^>]*>([^<]+)</a>"#).expect("subject regex")
});
static SUBJECT_FALLBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a[^>]*href="[^"]*subject[^"]*"[^>]*>([^<]+)</a>"#).expect("fallback regex")
});

static RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+)\s*分|(\d+\.\d+)").expect("rating regex"));
// Word boundaries keep this from matching four digits inside a subject id.
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("year regex"));

fn endpoints(query: &str, kind: SearchKind) -> [String; 2] {
    let encoded = query.replace(' ', "+");
    match kind {
        SearchKind::Tv => [
            format!("https://search.douban.com/tv?q={encoded}"),
            format!("https://www.douban.com/search?q={encoded}&cat=1000"),
        ],
        _ => [
            format!("https://search.douban.com/movie?q={encoded}"),
            format!("https://www.douban.com/search?q={encoded}&cat=1002"),
        ],
    }
}

pub async fn search_movies(client: &Client, query: &str, limit: usize) -> Vec<SearchResult> {
    search(client, query, SearchKind::Movie, limit).await
}

pub async fn search_tv(client: &Client, query: &str, limit: usize) -> Vec<SearchResult> {
    search(client, query, SearchKind::Tv, limit).await
}

async fn search(client: &Client, query: &str, kind: SearchKind, limit: usize) -> Vec<SearchResult> {
    for url in endpoints(query, kind) {
        let body = match fetch(client, &url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "douban: endpoint failed — trying next");
                continue;
            }
        };

        let results = parse_subjects(&body, kind, limit, &url);
        if !results.is_empty() {
            return results;
        }
    }
    Vec::new()
}

async fn fetch(client: &Client, url: &str) -> Result<String, String> {
    let response = client
        .get(url)
        .timeout(TIMEOUT)
        .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }

    response.text().await.map_err(|e| format!("body: {e}"))
}

/// Extract subjects from a search results page.
///
/// `fallback_url` is used when an item matches only the title pattern (no
/// subject id to build a canonical link from).
pub(crate) fn parse_subjects(
    html: &str,
    kind: SearchKind,
    limit: usize,
    fallback_url: &str,
) -> Vec<SearchResult> {
    let items: Vec<&str> = ITEM_RES
        .iter()
        .map(|re| re.find_iter(html).map(|m| m.as_str()).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default();

    let description = match kind {
        SearchKind::Tv => "豆瓣电视剧",
        _ => "豆瓣电影",
    };

    let mut results = Vec::new();
    for item in items.into_iter().take(limit) {
        let (subject_id, title) = match SUBJECT_RE.captures(item) {
            Some(caps) => (Some(caps[1].to_string()), caps[2].trim().to_string()),
            None => match SUBJECT_FALLBACK_RE.captures(item) {
                Some(caps) => (None, caps[1].trim().to_string()),
                None => continue,
            },
        };
        if title.is_empty() {
            continue;
        }

        let rating = RATING_RE
            .captures(item)
            .and_then(|caps| caps.get(1).or(caps.get(2)))
            .map(|m| m.as_str().to_string());

        let year = YEAR_RE.captures(item).map(|caps| caps[1].to_string());

        let url = match subject_id {
            Some(id) => format!("https://www.douban.com/subject/{id}/"),
            None => fallback_url.to_string(),
        };

        results.push(SearchResult {
            title,
            kind,
            source: "Douban".to_string(),
            url,
            description: Some(description.to_string()),
            rating,
            year,
            timestamp: None,
            likes: None,
            api: "Douban".to_string(),
        });
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="item"><a href="https://movie.douban.com/subject/26266893/" class="title">流浪地球</a>
  <span>7.9分 2019</span></div>
<div class="item"><a href="https://movie.douban.com/subject/35267208/" class="title">流浪地球2</a>
  <span>8.3分 2023</span></div>
<div class="item"><span>no link here</span></div>
"#;

    #[test]
    fn parses_subject_items() {
        let results = parse_subjects(PAGE, SearchKind::Movie, 5, "https://search.douban.com/movie?q=x");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "流浪地球");
        assert_eq!(results[0].rating.as_deref(), Some("7.9"));
        assert_eq!(results[0].year.as_deref(), Some("2019"));
        assert_eq!(results[0].url, "https://www.douban.com/subject/26266893/");
        assert_eq!(results[1].rating.as_deref(), Some("8.3"));
    }

    #[test]
    fn limit_caps_parsed_items() {
        let results = parse_subjects(PAGE, SearchKind::Movie, 1, "fallback");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn tv_kind_sets_description() {
        let results = parse_subjects(PAGE, SearchKind::Tv, 5, "fallback");
        assert_eq!(results[0].description.as_deref(), Some("豆瓣电视剧"));
        assert_eq!(results[0].kind, SearchKind::Tv);
    }

    #[test]
    fn fallback_link_pattern_used_without_subject_id() {
        let html = r#"<div class="result"><a class="x" href="/link?target=subject%2F123">三体</a></div>"#;
        let results = parse_subjects(html, SearchKind::Tv, 5, "https://www.douban.com/search?q=三体");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "三体");
        assert_eq!(results[0].url, "https://www.douban.com/search?q=三体");
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(parse_subjects("<html></html>", SearchKind::Movie, 5, "f").is_empty());
    }

    #[test]
    fn endpoint_order_by_kind() {
        let movie = endpoints("流浪地球", SearchKind::Movie);
        assert!(movie[0].contains("search.douban.com/movie"));
        assert!(movie[1].contains("cat=1002"));
        let tv = endpoints("三体", SearchKind::Tv);
        assert!(tv[0].contains("search.douban.com/tv"));
        assert!(tv[1].contains("cat=1000"));
    }
}
