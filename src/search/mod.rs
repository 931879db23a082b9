//! Multi-source content search.
//!
//! [`ChinaSearch`] aggregates China-mainland content (movies, TV,
//! entertainment) and [`news::NewsSearch`](news::NewsSearch) aggregates
//! news articles. Both follow the same shape: query each configured
//! backend in turn with isolated failure handling, merge, deduplicate,
//! rank, truncate. A search that ends with nothing does not return an
//! empty list — it returns [`SearchReply::NoContent`] carrying a localized
//! diagnostic plus remediation tips, and callers must handle that variant
//! explicitly.

pub mod backends;
pub mod news;

use std::fmt;
use std::str::FromStr;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SearchKeys;
use crate::error::AppError;

use backends::{bing, douban, tavily, weibo};

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Movie,
    Tv,
    Entertainment,
    Event,
    News,
    All,
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchKind::Movie => "movie",
            SearchKind::Tv => "tv",
            SearchKind::Entertainment => "entertainment",
            SearchKind::Event => "event",
            SearchKind::News => "news",
            SearchKind::All => "all",
        };
        f.write_str(s)
    }
}

impl FromStr for SearchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(SearchKind::Movie),
            "tv" => Ok(SearchKind::Tv),
            "entertainment" => Ok(SearchKind::Entertainment),
            "event" => Ok(SearchKind::Event),
            "news" => Ok(SearchKind::News),
            "all" => Ok(SearchKind::All),
            other => Err(format!("unknown search type '{other}'")),
        }
    }
}

/// One piece of content from one backend. Ephemeral — constructed per
/// query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: SearchKind,
    pub source: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<String>,
    /// Which backend produced this entry.
    pub api: String,
}

/// The "no content found" sentinel. Serialized with `error`/`tips` keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoContent {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tips: Option<String>,
}

impl NoContent {
    fn china(query: &str) -> Self {
        Self {
            error: format!("网络搜索未找到结果: {query}"),
            tips: Some(
                "💡 建议:\n   1. 检查网络连接\n   2. 尝试更简短的搜索词\n   3. 使用中文搜索关键词\n   4. 尝试其他搜索类型\n\n   离线建议:\n   • 推荐在豆瓣网站直接搜索: https://www.douban.com\n   • 或使用 'all' 类型进行综合搜索"
                    .to_string(),
            ),
        }
    }

    fn news() -> Self {
        Self {
            error: "未找到新闻或 API key 未配置".to_string(),
            tips: Some("💡 免费注册 GNews key: https://gnews.io".to_string()),
        }
    }
}

/// Outcome of one search call. `NoContent` is not an error condition in the
/// `Result` sense — it is a documented reply callers must special-case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchReply {
    Hits(Vec<SearchResult>),
    NoContent(NoContent),
}

impl SearchReply {
    pub fn is_no_content(&self) -> bool {
        matches!(self, SearchReply::NoContent(_))
    }
}

// ── Aggregation ───────────────────────────────────────────────────────────────

/// China-mainland content searcher.
pub struct ChinaSearch {
    client: Client,
    tavily_api_key: Option<String>,
}

impl ChinaSearch {
    pub fn new(keys: &SearchKeys) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            tavily_api_key: keys.tavily_api_key.clone(),
        })
    }

    /// Query the configured backends sequentially, merge, deduplicate by
    /// title, rank, truncate to `limit`.
    pub async fn search(&self, query: &str, kind: SearchKind, limit: usize) -> SearchReply {
        let mut all = Vec::new();

        if let Some(key) = &self.tavily_api_key {
            all.extend(tavily::search_china(&self.client, key, query, kind, limit).await);
        }

        if matches!(kind, SearchKind::All | SearchKind::Movie) {
            all.extend(douban::search_movies(&self.client, query, limit).await);
        }
        if matches!(kind, SearchKind::All | SearchKind::Tv) {
            all.extend(douban::search_tv(&self.client, query, limit).await);
        }
        if matches!(kind, SearchKind::All | SearchKind::Entertainment) {
            all.extend(weibo::search_entertainment(&self.client, query, limit).await);
        }

        // Last resort: keyless web search, relevance-filtered.
        if all.is_empty() {
            all.extend(bing::search_china(&self.client, query, kind, limit).await);
        }

        if all.is_empty() {
            debug!(%query, %kind, "all backends empty — returning no-content sentinel");
            return SearchReply::NoContent(NoContent::china(query));
        }

        SearchReply::Hits(finalize(all, limit))
    }
}

/// Deduplicate by exact title (first occurrence wins, order preserved),
/// sort by type priority with rating as descending secondary key, truncate.
pub fn finalize(results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    let mut seen = std::collections::HashSet::new();
    let mut unique: Vec<SearchResult> = results
        .into_iter()
        .filter(|r| !r.title.is_empty() && seen.insert(r.title.clone()))
        .collect();

    unique.sort_by(|a, b| {
        type_priority(a.kind)
            .cmp(&type_priority(b.kind))
            .then_with(|| compare_ratings_desc(a.rating.as_deref(), b.rating.as_deref()))
    });

    unique.truncate(limit);
    unique
}

fn type_priority(kind: SearchKind) -> u8 {
    match kind {
        SearchKind::Movie => 0,
        SearchKind::Tv => 1,
        SearchKind::Entertainment => 2,
        SearchKind::Event => 3,
        _ => 99,
    }
}

/// Ratings compare numerically, highest first; unparsable or absent
/// ratings sort after every parsed value.
fn compare_ratings_desc(a: Option<&str>, b: Option<&str>) -> std::cmp::Ordering {
    match (rating_value(a), rating_value(b)) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

fn rating_value(rating: Option<&str>) -> Option<f64> {
    rating.and_then(|r| r.parse::<f64>().ok())
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Human-readable numbered listing, used by the CLIs and as collaborator
/// output fed back to the model.
pub fn render_results(results: &[SearchResult]) -> String {
    let mut out = String::new();
    for (i, item) in results.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, item.title));

        if let Some(rating) = &item.rating {
            out.push_str(&format!("   ⭐ 评分: {rating}\n"));
        }
        if let Some(year) = &item.year {
            out.push_str(&format!("   📅 年份: {year}\n"));
        }
        if let Some(timestamp) = &item.timestamp {
            out.push_str(&format!("   🕐 时间: {timestamp}\n"));
        }
        if let Some(likes) = &item.likes {
            out.push_str(&format!("   👍 点赞: {likes}\n"));
        }

        out.push_str(&format!("   📌 来源: {} ({}) | 类型: {}\n", item.source, item.api, item.kind));

        if let Some(description) = &item.description {
            if !description.is_empty() {
                out.push_str(&format!("   📝 {}\n", backends::truncate_chars(description, 100)));
            }
        }
        if !item.url.is_empty() {
            out.push_str(&format!("   🔗 {}\n", item.url));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(title: &str, rating: Option<&str>) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            kind: SearchKind::Movie,
            source: "Douban".into(),
            url: format!("https://www.douban.com/subject/{title}/"),
            description: Some("豆瓣电影".into()),
            rating: rating.map(String::from),
            year: Some("2019".into()),
            timestamp: None,
            likes: None,
            api: "Douban".into(),
        }
    }

    fn with_kind(mut r: SearchResult, kind: SearchKind) -> SearchResult {
        r.kind = kind;
        r
    }

    #[test]
    fn five_titles_limit_three_sorted_by_rating_desc() {
        // Mocked movie backend: 5 distinct titles, mixed ratings.
        let raw = vec![
            movie("流浪地球", Some("7.9")),
            movie("流浪地球2", Some("8.3")),
            movie("独行月球", Some("6.7")),
            movie("三体：大史", Some("8.7")),
            movie("上海堡垒", Some("2.9")),
        ];
        let results = finalize(raw, 3);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.kind == SearchKind::Movie));
        let ratings: Vec<_> = results.iter().map(|r| r.rating.as_deref().unwrap()).collect();
        assert_eq!(ratings, vec!["8.7", "8.3", "7.9"]);
    }

    #[test]
    fn duplicate_titles_first_occurrence_wins() {
        let mut tavily_copy = movie("流浪地球", None);
        tavily_copy.api = "Tavily".into();
        let raw = vec![movie("流浪地球", Some("7.9")), tavily_copy];
        let results = finalize(raw, 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].api, "Douban");
    }

    #[test]
    fn titles_unique_and_within_limit() {
        let raw = vec![
            movie("a", Some("7.0")),
            movie("b", Some("6.0")),
            movie("a", Some("9.0")),
            movie("c", None),
        ];
        let results = finalize(raw, 2);
        assert!(results.len() <= 2);
        let mut titles: Vec<_> = results.iter().map(|r| r.title.clone()).collect();
        titles.dedup();
        assert_eq!(titles.len(), results.len());
    }

    #[test]
    fn type_priority_orders_kinds() {
        let raw = vec![
            with_kind(movie("weibo post about things", None), SearchKind::Entertainment),
            with_kind(movie("some tv show", Some("8.0")), SearchKind::Tv),
            movie("some film", Some("5.0")),
            with_kind(movie("a concert", None), SearchKind::Event),
        ];
        let results = finalize(raw, 10);
        let kinds: Vec<_> = results.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![SearchKind::Movie, SearchKind::Tv, SearchKind::Entertainment, SearchKind::Event]
        );
    }

    #[test]
    fn ratings_compare_numerically_not_lexicographically() {
        // "10.0" must beat "9.5" — string comparison would invert them.
        let raw = vec![movie("a", Some("9.5")), movie("b", Some("10.0"))];
        let results = finalize(raw, 2);
        assert_eq!(results[0].title, "b");
    }

    #[test]
    fn unrated_sorts_after_rated() {
        let raw = vec![movie("unrated", None), movie("rated", Some("3.1"))];
        let results = finalize(raw, 2);
        assert_eq!(results[0].title, "rated");
    }

    #[test]
    fn empty_titles_dropped() {
        let results = finalize(vec![movie("", Some("9.0")), movie("ok", None)], 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "ok");
    }

    #[test]
    fn no_content_serializes_with_error_and_tips_keys() {
        let sentinel = NoContent::china("流浪地球");
        let json = serde_json::to_value(&sentinel).unwrap();
        assert!(json["error"].as_str().unwrap().contains("流浪地球"));
        assert!(json["tips"].as_str().unwrap().contains("豆瓣"));
    }

    #[test]
    fn search_kind_round_trips_from_str() {
        for s in ["movie", "tv", "entertainment", "event", "news", "all"] {
            let kind: SearchKind = s.parse().unwrap();
            assert_eq!(kind.to_string(), s);
        }
        assert!("drama".parse::<SearchKind>().is_err());
    }

    #[test]
    fn render_lists_fields() {
        let out = render_results(&[movie("流浪地球", Some("7.9"))]);
        assert!(out.starts_with("1. 流浪地球\n"));
        assert!(out.contains("⭐ 评分: 7.9"));
        assert!(out.contains("来源: Douban (Douban) | 类型: movie"));
        assert!(out.contains("🔗 https://www.douban.com/subject/"));
    }
}
