//! `glim-news` — news search CLI.
//!
//! # Usage
//!
//! ```text
//! glim-news <query> [--days N] [--limit N]
//! ```
//!
//! Articles published within the last `--days` days (default 7), newest
//! first. Same exit contract as `glim-search`: the no-content sentinel is
//! printed with its tips and the process exits non-zero.

use std::process;

use glim::config;
use glim::error::AppError;
use glim::logger;
use glim::search::news::NewsSearch;
use glim::search::{SearchReply, render_results};

struct Args {
    query: String,
    days: i64,
    limit: usize,
}

fn parse_args() -> Args {
    let mut query = None;
    let mut days = 7i64;
    let mut limit = 5usize;
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--days" | "-d" => {
                let value = iter.next().unwrap_or_default();
                days = value.parse().unwrap_or_else(|_| {
                    eprintln!("--days '{value}' is not an integer");
                    process::exit(2);
                });
            }
            "--limit" | "-n" => {
                let value = iter.next().unwrap_or_default();
                limit = value.parse().unwrap_or_else(|_| {
                    eprintln!("--limit '{value}' is not an integer");
                    process::exit(2);
                });
            }
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            _ if query.is_none() => query = Some(arg),
            other => {
                eprintln!("unexpected argument: {other}");
                process::exit(2);
            }
        }
    }

    let Some(query) = query else {
        print_help();
        process::exit(2);
    };
    Args { query, days, limit }
}

fn print_help() {
    eprintln!("usage: glim-news <query> [--days N] [--limit N]");
    eprintln!();
    eprintln!("flags:");
    eprintln!("  --days,  -d <n>   publication window in days (default 7)");
    eprintln!("  --limit, -n <n>   maximum articles (default 5)");
    eprintln!();
    eprintln!("environment:");
    eprintln!("  GNEWS_API_KEY    enables the GNews backend (免费注册: https://gnews.io)");
    eprintln!("  TAVILY_API_KEY   enables the Tavily backend");
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let _ = dotenvy::dotenv();
    let args = parse_args();

    let config = config::load(None)?;
    logger::init("warn", false)?;

    let searcher = NewsSearch::new(&config.search)?;

    println!("搜索新闻: {}\n", args.query);

    match searcher.search(&args.query, args.days, args.limit).await {
        SearchReply::Hits(results) if results.is_empty() => {
            println!("未找到相关新闻");
        }
        SearchReply::Hits(results) => {
            print!("{}", render_results(&results));
        }
        SearchReply::NoContent(sentinel) => {
            eprintln!("❌ {}", sentinel.error);
            if let Some(tips) = sentinel.tips {
                eprintln!("💡 {tips}");
            }
            process::exit(1);
        }
    }

    Ok(())
}
