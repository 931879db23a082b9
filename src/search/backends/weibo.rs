//! Weibo (微博) hot-search scrape — entertainment posts.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use tracing::warn;

use crate::search::{SearchKind, SearchResult};

use super::{BROWSER_USER_AGENT, strip_tags, truncate_chars};

const TIMEOUT: Duration = Duration::from_secs(10);
const TITLE_MAX_CHARS: usize = 80;

static POST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="s-page-result [^"]*">(.*?)</div>"#).expect("post regex")
});
/// Any stretch of visible text between tags long enough to be a post body.
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">([^<]{10,100}?)<").expect("title regex"));
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}分钟前|\d{1,2}小时前|\d{1,2}月\d{1,2}日)").expect("time regex")
});
static LIKES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"赞\[(\d+)\]").expect("likes regex"));

fn search_url(query: &str) -> String {
    let encoded = query.replace(' ', "%20");
    format!("https://s.weibo.com/weibo?q={encoded}&xsort=hot")
}

pub async fn search_entertainment(client: &Client, query: &str, limit: usize) -> Vec<SearchResult> {
    let url = search_url(query);

    let body = match fetch(client, &url).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "weibo: search failed — contributing zero results");
            return Vec::new();
        }
    };

    parse_posts(&body, &url, limit)
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

pub(crate) fn parse_posts(html: &str, search_url: &str, limit: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    for caps in POST_RE.captures_iter(html).take(limit) {
        let post = &caps[1];

        let Some(title_caps) = TITLE_RE.captures(post) else {
            continue;
        };
        let title = truncate_chars(strip_tags(title_caps[1].trim()).trim(), TITLE_MAX_CHARS);
        if title.is_empty() {
            continue;
        }

        let timestamp = TIME_RE
            .captures(post)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| "最近".to_string());

        let likes = LIKES_RE
            .captures(post)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| "0".to_string());

        results.push(SearchResult {
            title,
            kind: SearchKind::Entertainment,
            source: "Weibo".to_string(),
            url: search_url.to_string(),
            description: None,
            rating: None,
            year: None,
            timestamp: Some(timestamp),
            likes: Some(likes),
            api: "Weibo".to_string(),
        });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="s-page-result card"><p>张艺谋新片首映礼现场曝光，观众反响热烈</p>
  <span>3小时前</span> <em>赞[1024]</em></div>
<div class="s-page-result card"><p>short</p></div>
<div class="s-page-result card"><p>娱乐圈今日热点汇总，多位明星出席活动引发关注</p></div>
"#;

    #[test]
    fn parses_posts_with_engagement() {
        let results = parse_posts(PAGE, "https://s.weibo.com/weibo?q=x", 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "张艺谋新片首映礼现场曝光，观众反响热烈");
        assert_eq!(results[0].timestamp.as_deref(), Some("3小时前"));
        assert_eq!(results[0].likes.as_deref(), Some("1024"));
        assert_eq!(results[0].kind, SearchKind::Entertainment);
    }

    #[test]
    fn missing_engagement_defaults() {
        let results = parse_posts(PAGE, "url", 5);
        assert_eq!(results[1].timestamp.as_deref(), Some("最近"));
        assert_eq!(results[1].likes.as_deref(), Some("0"));
    }

    #[test]
    fn limit_caps_posts() {
        assert_eq!(parse_posts(PAGE, "url", 1).len(), 1);
    }

    #[test]
    fn query_url_encodes_spaces() {
        assert_eq!(
            search_url("王 菲"),
            "https://s.weibo.com/weibo?q=王%20菲&xsort=hot"
        );
    }
}
