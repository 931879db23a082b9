//! Tavily search-aggregation backend (structured JSON API).
//!
//! First-tier backend for China content: the query is decorated per content
//! kind and constrained to a small allow-list of trusted domains. Also
//! serves the news pipeline with `topic: "news"`.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::search::{SearchKind, SearchResult};

use super::truncate_chars;

const ENDPOINT: &str = "https://api.tavily.com/search";
const TIMEOUT: Duration = Duration::from_secs(10);
const NEWS_TIMEOUT: Duration = Duration::from_secs(15);

/// Domains the China-content tier trusts.
const CHINA_DOMAINS: [&str; 3] = ["douban.com", "zhihu.com", "weibo.com"];

const DESCRIPTION_MAX_CHARS: usize = 150;
const NEWS_DESCRIPTION_MAX_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct SearchPayload<'a> {
    api_key: &'a str,
    query: String,
    search_depth: &'static str,
    max_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_domains: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_answer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ResultItem>,
}

#[derive(Debug, Deserialize)]
struct ResultItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    published_date: Option<String>,
}

/// Decorate the raw query the way the catalog sites index their content.
fn china_query(query: &str, kind: SearchKind) -> String {
    match kind {
        SearchKind::Movie => format!("{query} 电影 豆瓣"),
        SearchKind::Tv => format!("{query} 电视剧 豆瓣"),
        SearchKind::Entertainment => format!("{query} 娱乐"),
        _ => query.to_string(),
    }
}

/// China-content tier. Failures yield an empty set.
pub async fn search_china(
    client: &Client,
    api_key: &str,
    query: &str,
    kind: SearchKind,
    limit: usize,
) -> Vec<SearchResult> {
    let payload = SearchPayload {
        api_key,
        query: china_query(query, kind),
        search_depth: "basic",
        max_results: limit,
        include_domains: Some(CHINA_DOMAINS.to_vec()),
        include_answer: None,
        topic: None,
    };

    match post(client, &payload, TIMEOUT).await {
        Ok(response) => to_results(response, kind, DESCRIPTION_MAX_CHARS),
        Err(e) => {
            warn!(error = %e, "tavily: china search failed — contributing zero results");
            Vec::new()
        }
    }
}

/// News tier. Failures yield an empty set.
pub async fn search_news(
    client: &Client,
    api_key: &str,
    query: &str,
    limit: usize,
) -> Vec<SearchResult> {
    let payload = SearchPayload {
        api_key,
        query: query.to_string(),
        search_depth: "basic",
        max_results: limit,
        include_domains: None,
        include_answer: Some(false),
        topic: Some("news"),
    };

    match post(client, &payload, NEWS_TIMEOUT).await {
        Ok(response) => to_news_results(response),
        Err(e) => {
            warn!(error = %e, "tavily: news search failed — contributing zero results");
            Vec::new()
        }
    }
}

async fn post(
    client: &Client,
    payload: &SearchPayload<'_>,
    timeout: Duration,
) -> Result<SearchResponse, String> {
    let response = client
        .post(ENDPOINT)
        .timeout(timeout)
        .json(payload)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }

    response
        .json::<SearchResponse>()
        .await
        .map_err(|e| format!("parse: {e}"))
}

fn to_results(response: SearchResponse, kind: SearchKind, desc_max: usize) -> Vec<SearchResult> {
    response
        .results
        .into_iter()
        .filter(|item| !item.title.is_empty())
        .map(|item| SearchResult {
            title: item.title,
            kind,
            source: "Tavily".to_string(),
            url: item.url,
            description: Some(truncate_chars(&item.content, desc_max)),
            rating: None,
            year: None,
            timestamp: None,
            likes: None,
            api: "Tavily".to_string(),
        })
        .collect()
}

fn to_news_results(response: SearchResponse) -> Vec<SearchResult> {
    response
        .results
        .into_iter()
        .filter(|item| !item.title.is_empty())
        .map(|item| SearchResult {
            title: item.title,
            kind: SearchKind::News,
            source: "Tavily".to_string(),
            url: item.url,
            description: Some(truncate_chars(&item.content, NEWS_DESCRIPTION_MAX_CHARS)),
            rating: None,
            year: None,
            timestamp: item.published_date,
            likes: None,
            api: "Tavily".to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "results": [
            {"title": "流浪地球 (豆瓣)", "url": "https://movie.douban.com/subject/26266893/", "content": "中国科幻电影"},
            {"title": "", "url": "https://example.com", "content": "untitled"}
        ]
    }"#;

    #[test]
    fn parses_results_and_drops_untitled() {
        let response: SearchResponse = serde_json::from_str(BODY).unwrap();
        let results = to_results(response, SearchKind::Movie, DESCRIPTION_MAX_CHARS);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "流浪地球 (豆瓣)");
        assert_eq!(results[0].kind, SearchKind::Movie);
        assert_eq!(results[0].api, "Tavily");
    }

    #[test]
    fn news_results_carry_published_date() {
        let body = r#"{"results": [{"title": "t", "url": "u", "content": "c", "published_date": "2026-02-11T08:00:00Z"}]}"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        let results = to_news_results(response);
        assert_eq!(results[0].timestamp.as_deref(), Some("2026-02-11T08:00:00Z"));
        assert_eq!(results[0].kind, SearchKind::News);
    }

    #[test]
    fn query_decoration_by_kind() {
        assert_eq!(china_query("流浪地球", SearchKind::Movie), "流浪地球 电影 豆瓣");
        assert_eq!(china_query("三体", SearchKind::Tv), "三体 电视剧 豆瓣");
        assert_eq!(china_query("张艺谋", SearchKind::Entertainment), "张艺谋 娱乐");
        assert_eq!(china_query("天安门", SearchKind::All), "天安门");
    }

    #[test]
    fn domain_allow_list_serialized() {
        let payload = SearchPayload {
            api_key: "k",
            query: "q".into(),
            search_depth: "basic",
            max_results: 5,
            include_domains: Some(CHINA_DOMAINS.to_vec()),
            include_answer: None,
            topic: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("douban.com"));
        assert!(!json.contains("topic"));
    }
}
