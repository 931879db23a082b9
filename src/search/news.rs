//! News search across GNews, Tavily, and the Bing news feed.
//!
//! Same aggregation shape as the China-content pipeline, but ranked by
//! recency: merged results are cut to a publication-date window, URL-deduped
//! and sorted newest first. Backends publish dates in two formats (RFC 3339
//! from the JSON APIs, RFC 2822 from RSS); entries whose date cannot be
//! parsed are dropped by the window filter.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use tracing::debug;

use crate::config::SearchKeys;
use crate::error::AppError;

use super::backends::{bing, gnews, tavily};
use super::{NoContent, SearchReply, SearchResult};

pub struct NewsSearch {
    client: Client,
    gnews_api_key: Option<String>,
    tavily_api_key: Option<String>,
}

impl NewsSearch {
    pub fn new(keys: &SearchKeys) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            gnews_api_key: keys.gnews_api_key.clone(),
            tavily_api_key: keys.tavily_api_key.clone(),
        })
    }

    /// Merge the configured backends, keep articles published within the
    /// last `days` days, dedupe by URL, sort newest first, truncate.
    pub async fn search(&self, query: &str, days: i64, limit: usize) -> SearchReply {
        let mut all = Vec::new();

        if let Some(key) = &self.gnews_api_key {
            all.extend(gnews::search(&self.client, key, query, limit).await);
        }
        if let Some(key) = &self.tavily_api_key {
            all.extend(tavily::search_news(&self.client, key, query, limit).await);
        }
        all.extend(bing::search_news(&self.client, query, limit).await);

        if all.is_empty() {
            debug!(%query, "all news backends empty — returning no-content sentinel");
            return SearchReply::NoContent(NoContent::news());
        }

        SearchReply::Hits(filter_and_rank(all, days, Utc::now(), limit))
    }
}

/// The pure tail of the pipeline, with the clock injected.
pub fn filter_and_rank(
    results: Vec<SearchResult>,
    days: i64,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<SearchResult> {
    let cutoff = now - Duration::days(days);

    let mut dated: Vec<(DateTime<Utc>, SearchResult)> = results
        .into_iter()
        .filter_map(|r| {
            let published = parse_pub_date(r.timestamp.as_deref()?)?;
            (published >= cutoff).then_some((published, r))
        })
        .collect();

    let mut seen = std::collections::HashSet::new();
    dated.retain(|(_, r)| seen.insert(r.url.clone()));

    dated.sort_by(|a, b| b.0.cmp(&a.0));
    dated.truncate(limit);
    dated.into_iter().map(|(_, r)| r).collect()
}

/// Accept RFC 3339 (GNews, Tavily) and RFC 2822 (RSS feeds).
pub(crate) fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchKind;
    use chrono::TimeZone;

    fn article(url: &str, timestamp: Option<&str>) -> SearchResult {
        SearchResult {
            title: format!("article {url}"),
            kind: SearchKind::News,
            source: "Test".into(),
            url: url.to_string(),
            description: None,
            rating: None,
            year: None,
            timestamp: timestamp.map(String::from),
            likes: None,
            api: "Test".into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 12, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_both_date_formats() {
        assert!(parse_pub_date("2026-02-11T08:00:00Z").is_some());
        assert!(parse_pub_date("Wed, 11 Feb 2026 08:00:00 GMT").is_some());
        assert!(parse_pub_date("最近").is_none());
    }

    #[test]
    fn window_filter_drops_old_and_undated() {
        let results = vec![
            article("a", Some("2026-02-11T08:00:00Z")),
            article("b", Some("2026-01-01T08:00:00Z")),
            article("c", None),
            article("d", Some("not a date")),
        ];
        let kept = filter_and_rank(results, 7, now(), 10);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "a");
    }

    #[test]
    fn url_dedupe_keeps_first() {
        let results = vec![
            article("same", Some("2026-02-11T08:00:00Z")),
            article("same", Some("2026-02-10T08:00:00Z")),
        ];
        let kept = filter_and_rank(results, 7, now(), 10);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp.as_deref(), Some("2026-02-11T08:00:00Z"));
    }

    #[test]
    fn sorted_newest_first_and_truncated() {
        let results = vec![
            article("a", Some("Mon, 09 Feb 2026 08:00:00 GMT")),
            article("b", Some("2026-02-12T08:00:00Z")),
            article("c", Some("Wed, 11 Feb 2026 08:00:00 GMT")),
        ];
        let kept = filter_and_rank(results, 7, now(), 2);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].url, "b");
        assert_eq!(kept[1].url, "c");
    }
}
