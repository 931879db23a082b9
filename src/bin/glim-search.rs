//! `glim-search` — China mainland content search CLI.
//!
//! # Usage
//!
//! ```text
//! glim-search <query> [--type T] [--limit N]
//!
//! Types:
//!   movie          电影
//!   tv             电视剧
//!   entertainment  娱乐新闻
//!   event          活动和演唱会
//!   all            综合搜索（默认）
//! ```
//!
//! Prints formatted results to stdout. When every backend comes back empty
//! the no-content diagnostic plus remediation tips are printed and the
//! process exits non-zero.

use std::process;

use glim::config;
use glim::error::AppError;
use glim::logger;
use glim::search::{ChinaSearch, SearchKind, SearchReply, render_results};

struct Args {
    query: String,
    kind: SearchKind,
    limit: usize,
}

fn parse_args() -> Args {
    let mut query = None;
    let mut kind = SearchKind::All;
    let mut limit = 5usize;
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--type" | "-t" => {
                let value = iter.next().unwrap_or_default();
                kind = value.parse().unwrap_or_else(|e: String| {
                    eprintln!("{e}");
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
    Args { query, kind, limit }
}

fn print_help() {
    eprintln!("usage: glim-search <query> [--type T] [--limit N]");
    eprintln!();
    eprintln!("types:");
    eprintln!("  movie          电影");
    eprintln!("  tv             电视剧");
    eprintln!("  entertainment  娱乐新闻");
    eprintln!("  event          活动和演唱会");
    eprintln!("  all            综合搜索（默认）");
    eprintln!();
    eprintln!("examples:");
    eprintln!("  glim-search 流浪地球 --type movie");
    eprintln!("  glim-search 三体 --type tv");
    eprintln!("  glim-search 张艺谋 --type entertainment");
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

    let searcher = ChinaSearch::new(&config.search)?;

    println!("🔍 搜索中国内容: {} (类型: {})\n", args.query, args.kind);

    match searcher.search(&args.query, args.kind, args.limit).await {
        SearchReply::Hits(results) if results.is_empty() => {
            println!("❌ 未找到相关内容");
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
