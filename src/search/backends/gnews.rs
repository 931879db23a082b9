//! GNews API backend (structured JSON, key required).

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::search::{SearchKind, SearchResult};

const ENDPOINT: &str = "https://gnews.io/api/v4/search";
const TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    source: Source,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct Source {
    #[serde(default)]
    name: String,
}

/// `zh` for queries containing CJK ideographs, `en` otherwise.
pub(crate) fn detect_lang(query: &str) -> &'static str {
    if query.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c)) {
        "zh"
    } else {
        "en"
    }
}

pub async fn search(client: &Client, api_key: &str, query: &str, limit: usize) -> Vec<SearchResult> {
    let max = limit.to_string();
    let response = match client
        .get(ENDPOINT)
        .timeout(TIMEOUT)
        .query(&[
            ("q", query),
            ("lang", detect_lang(query)),
            ("max", max.as_str()),
            ("apikey", api_key),
        ])
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "gnews: request failed — contributing zero results");
            return Vec::new();
        }
    };

    let status = response.status();
    if !status.is_success() {
        warn!(%status, "gnews: non-success status — contributing zero results");
        return Vec::new();
    }

    match response.json::<SearchResponse>().await {
        Ok(parsed) => to_results(parsed),
        Err(e) => {
            warn!(error = %e, "gnews: parse failed — contributing zero results");
            Vec::new()
        }
    }
}

fn to_results(response: SearchResponse) -> Vec<SearchResult> {
    response
        .articles
        .into_iter()
        .filter(|a| !a.title.is_empty())
        .map(|a| SearchResult {
            title: a.title,
            kind: SearchKind::News,
            source: a.source.name,
            url: a.url,
            description: Some(a.description),
            rating: None,
            year: None,
            timestamp: a.published_at,
            likes: None,
            api: "GNews".to_string(),
        })
        .collect()
}
