//! Collaborator commands carried by `EXECUTE:` directives.
//!
//! The model is taught a two-verb grammar:
//!
//! ```text
//! search <query> [--type movie|tv|entertainment|event|all] [--limit N]
//! news <query> [--days N] [--limit N]
//! ```
//!
//! Queries may be double-quoted to include spaces. Parsing is strict —
//! an unknown verb or flag is an error the caller reports back instead of
//! executing anything.

use crate::search::news::NewsSearch;
use crate::search::{ChinaSearch, SearchKind, SearchReply, render_results};

const DEFAULT_LIMIT: usize = 5;
const DEFAULT_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollabCommand {
    Search {
        query: String,
        kind: SearchKind,
        limit: usize,
    },
    News {
        query: String,
        days: i64,
        limit: usize,
    },
}

/// Parse one `EXECUTE:` payload.
pub fn parse_command(raw: &str) -> Result<CollabCommand, String> {
    let tokens = tokenize(raw);
    let mut iter = tokens.into_iter();

    let verb = iter.next().ok_or_else(|| "empty command".to_string())?;
    let mut query_parts: Vec<String> = Vec::new();
    let mut kind = SearchKind::All;
    let mut limit = DEFAULT_LIMIT;
    let mut days = DEFAULT_DAYS;

    while let Some(token) = iter.next() {
        match token.as_str() {
            "--type" | "-t" => {
                let value = iter.next().ok_or("--type requires a value")?;
                kind = value.parse()?;
            }
            "--limit" | "-n" => {
                let value = iter.next().ok_or("--limit requires a value")?;
                limit = value
                    .parse()
                    .map_err(|_| format!("--limit '{value}' is not an integer"))?;
            }
            "--days" | "-d" => {
                let value = iter.next().ok_or("--days requires a value")?;
                days = value
                    .parse()
                    .map_err(|_| format!("--days '{value}' is not an integer"))?;
            }
            flag if flag.starts_with("--") => {
                return Err(format!("unknown flag '{flag}'"));
            }
            word => query_parts.push(word.to_string()),
        }
    }

    let query = query_parts.join(" ");
    if query.is_empty() {
        return Err("missing search query".to_string());
    }

    match verb.as_str() {
        "search" => Ok(CollabCommand::Search { query, kind, limit }),
        "news" => Ok(CollabCommand::News { query, days, limit }),
        other => Err(format!("unknown command '{other}'")),
    }
}

/// Run a parsed command and render its outcome as text for the model and
/// the user. A no-content sentinel renders as its diagnostic message — the
/// collaborator never fails the conversation turn.
pub async fn dispatch(command: &CollabCommand, china: &ChinaSearch, news: &NewsSearch) -> String {
    let reply = match command {
        CollabCommand::Search { query, kind, limit } => china.search(query, *kind, *limit).await,
        CollabCommand::News { query, days, limit } => news.search(query, *days, *limit).await,
    };

    match reply {
        SearchReply::Hits(results) if results.is_empty() => "未找到相关内容".to_string(),
        SearchReply::Hits(results) => render_results(&results),
        SearchReply::NoContent(sentinel) => match sentinel.tips {
            Some(tips) => format!("❌ {}\n💡 {tips}", sentinel.error),
            None => format!("❌ {}", sentinel.error),
        },
    }
}

/// Whitespace tokenizer with double-quote grouping.
fn tokenize(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in raw.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
