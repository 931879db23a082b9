//! Bing RSS scrape — keyless last-resort web search and news feed.
//!
//! Both entry points read the RSS rendering of a Bing results page. The
//! China-content variant runs only when every other backend came back
//! empty, and keeps an item only when the query literally appears in its
//! title or description (case-insensitive) — the feed is otherwise far too
//! loose to trust.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use tracing::warn;

use crate::search::{SearchKind, SearchResult};

use super::{BROWSER_USER_AGENT, strip_tags, truncate_chars};

const TIMEOUT: Duration = Duration::from_secs(10);
const NEWS_TIMEOUT: Duration = Duration::from_secs(15);
const DESCRIPTION_MAX_CHARS: usize = 150;
const NEWS_DESCRIPTION_MAX_CHARS: usize = 200;

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item>(.*?)</item>").expect("item regex"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title>(.*?)</title>").expect("title regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<link>(.*?)</link>").expect("link regex"));
static PUB_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<pubDate>(.*?)</pubDate>").expect("pubDate regex"));
static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<description>(.*?)</description>").expect("description regex")
});

/// One `<item>` from an RSS feed, tags stripped.
#[derive(Debug, Clone)]
pub(crate) struct RssItem {
    pub title: String,
    pub link: String,
    pub pub_date: Option<String>,
    pub description: String,
}

pub(crate) fn parse_rss_items(xml: &str) -> Vec<RssItem> {
    ITEM_RE
        .captures_iter(xml)
        .filter_map(|caps| {
            let item = &caps[1];
            let title = TITLE_RE.captures(item).map(|c| strip_tags(c[1].trim()))?;
            if title.is_empty() {
                return None;
            }
            Some(RssItem {
                title,
                link: LINK_RE
                    .captures(item)
                    .map(|c| c[1].trim().to_string())
                    .unwrap_or_default(),
                pub_date: PUB_DATE_RE.captures(item).map(|c| c[1].trim().to_string()),
                description: DESCRIPTION_RE
                    .captures(item)
                    .map(|c| strip_tags(&c[1]).trim().to_string())
                    .unwrap_or_default(),
            })
        })
        .collect()
}

/// Exact-match search query per content kind (quoted, zh-CN market terms).
fn china_query(query: &str, kind: SearchKind) -> String {
    match kind {
        SearchKind::Movie => format!("\"{query}\" 电影 豆瓣"),
        SearchKind::Tv => format!("\"{query}\" 电视剧 豆瓣"),
        SearchKind::Entertainment => format!("\"{query}\" 娱乐新闻"),
        SearchKind::Event => format!("\"{query}\" 活动 演唱会"),
        _ => format!("\"{query}\""),
    }
}

/// Last-resort China-content search over the zh-CN RSS feed.
pub async fn search_china(
    client: &Client,
    query: &str,
    kind: SearchKind,
    limit: usize,
) -> Vec<SearchResult> {
    let encoded = china_query(query, kind).replace(' ', "+");
    let url = format!("https://www.bing.com/search?q={encoded}&mkt=zh-CN&format=rss");

    let body = match fetch(client, &url, TIMEOUT).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "bing: china search failed — contributing zero results");
            return Vec::new();
        }
    };

    filter_china_items(parse_rss_items(&body), query, kind, limit)
}

/// Keep items whose title or description literally contains the query,
/// then shape them into results.
pub(crate) fn filter_china_items(
    items: Vec<RssItem>,
    query: &str,
    kind: SearchKind,
    limit: usize,
) -> Vec<SearchResult> {
    let needle = query.to_lowercase();
    let mut results = Vec::new();

    // Scan more than `limit` items — the relevance filter is expected to
    // discard most of the feed.
    for item in items.into_iter().take(limit * 2) {
        let description = truncate_chars(&item.description, DESCRIPTION_MAX_CHARS);
        if !item.title.to_lowercase().contains(&needle)
            && !description.to_lowercase().contains(&needle)
        {
            continue;
        }

        results.push(SearchResult {
            title: item.title,
            kind,
            source: "Bing China".to_string(),
            url: item.link,
            description: Some(description),
            rating: None,
            year: None,
            timestamp: item.pub_date,
            likes: None,
            api: "Bing".to_string(),
        });

        if results.len() >= limit {
            break;
        }
    }

    results
}

/// Keyless news feed.
pub async fn search_news(client: &Client, query: &str, limit: usize) -> Vec<SearchResult> {
    let encoded = urlencode(query);
    let url = format!("https://www.bing.com/news/search?q={encoded}&format=rss");

    let body = match fetch(client, &url, NEWS_TIMEOUT).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "bing: news search failed — contributing zero results");
            return Vec::new();
        }
    };

    parse_rss_items(&body)
        .into_iter()
        .take(limit)
        .map(|item| SearchResult {
            title: item.title,
            kind: SearchKind::News,
            source: "Bing News".to_string(),
            url: item.link,
            description: Some(truncate_chars(&item.description, NEWS_DESCRIPTION_MAX_CHARS)),
            rating: None,
            year: None,
            timestamp: item.pub_date,
            likes: None,
            api: "Bing".to_string(),
        })
        .collect()
}

async fn fetch(client: &Client, url: &str, timeout: Duration) -> Result<String, String> {
    let response = client
        .get(url)
        .timeout(timeout)
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

/// Percent-encode everything outside the unreserved set.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 3);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
