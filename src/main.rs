//! `glim` — interactive GLM chat for the terminal.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI flags
//!   3. Load config (properties file + env overrides)
//!   4. Init logger at the effective level (CLI flag > env > config)
//!   5. Open long-term memory, load skills, build the chat client
//!   6. Run the prompt loop until exit/EOF
//!
//! Inside the loop, model replies are scanned for directives: every
//! `EXECUTE:` line is dispatched to the in-process search collaborator and
//! the results are fed back for a summary turn; every `SAVE_MEMORY:` line
//! is persisted. A rate-limited primary model (the documented "429"
//! sniff) switches the session to the configured fallback model and
//! retries the turn exactly once.

use std::io::Write as _;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use glim::commands;
use glim::config;
use glim::directives::{self, Directive, MemoryKind};
use glim::error::AppError;
use glim::llm::{ChatMessage, ClientOptions, GlmClient, ProviderError, is_rate_limited};
use glim::memory::MemoryManager;
use glim::search::news::NewsSearch;
use glim::search::ChinaSearch;
use glim::{logger, skills};

const SYSTEM_PROMPT: &str = "\
You are a helpful AI assistant with access to search tools.

When the user asks you to search or find information, you MUST emit the actual command on its own line:

**China Content Search**: EXECUTE: search \"search query\" --type [movie|tv|entertainment|event|all]
**News Search**: EXECUTE: news \"search query\" --limit 10

After seeing search results, summarize them in Chinese with key information.
Do NOT make up results. Always execute the command first.

To remember a lasting user preference or fact, emit on its own line:
SAVE_MEMORY: key=value";

const SUMMARY_REQUEST: &str = "请根据上面的实际搜索结果，用中文总结关键信息。";

// ── CLI arg parsing ────────────────────────────────────────────────────────

struct Args {
    config_path: Option<PathBuf>,
    log_level: Option<String>,
    model: Option<String>,
}

fn parse_args() -> Args {
    let mut config_path = None;
    let mut log_level = None;
    let mut model = None;
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => config_path = iter.next().map(PathBuf::from),
            "--log-level" | "-l" => log_level = iter.next(),
            "--model" | "-m" => model = iter.next(),
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            other => {
                eprintln!("unknown argument: {other}");
                print_help();
                process::exit(2);
            }
        }
    }

    Args { config_path, log_level, model }
}

fn print_help() {
    eprintln!("usage: glim [--config <path>] [--model <name>] [--log-level <level>]");
    eprintln!();
    eprintln!("flags:");
    eprintln!("  --config,    -c <path>   properties file (default: config.properties)");
    eprintln!("  --model,     -m <name>   override the configured model");
    eprintln!("  --log-level, -l <level>  error|warn|info|debug|trace");
    eprintln!("  --help,      -h          print this help");
    eprintln!();
    eprintln!("environment:");
    eprintln!("  ZHIPUAI_API_KEY   chat API key (required)");
    eprintln!("  TAVILY_API_KEY    enables the Tavily search backend");
    eprintln!("  GNEWS_API_KEY     enables the GNews backend");
}

// ── Session ────────────────────────────────────────────────────────────────

/// Chat client plus the one-shot fallback latch.
struct ChatSession {
    client: GlmClient,
    fallback_model: String,
    on_fallback: bool,
}

impl ChatSession {
    async fn invoke(&mut self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        match self.client.invoke(messages).await {
            Err(e) if is_rate_limited(&e) && !self.on_fallback => {
                println!(
                    "\n{} rate-limited, switching to {}...\n",
                    self.client.model(),
                    self.fallback_model
                );
                self.client = self.client.with_model(&self.fallback_model);
                self.on_fallback = true;
                self.client.invoke(messages).await
            }
            other => other,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_args();
    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        model = %args.model.as_deref().unwrap_or(&config.glm.model),
        memory_dir = %config.memory_dir.display(),
        "config loaded"
    );

    let memory = Arc::new(MemoryManager::open(&config.memory_dir)?);
    let skills_context = skills::load_skills(&config.skills_dir);

    let client = GlmClient::from_config(
        &config,
        ClientOptions { model: args.model, ..Default::default() },
        Some(memory.clone()),
        skills_context,
    )?;

    let china = ChinaSearch::new(&config.search)?;
    let news = NewsSearch::new(&config.search)?;

    let mut session = ChatSession {
        client,
        fallback_model: config.glm.fallback_model.clone(),
        on_fallback: false,
    };

    println!("GLM Chat (using {})", session.client.model());
    println!("Type 'exit' or 'quit' to end, 'clear' to reset, 'save-pref <key> <value>' to save a preference\n");

    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break; // EOF
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }
        if input.eq_ignore_ascii_case("clear") {
            messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
            println!("Chat history cleared.\n");
            continue;
        }
        if let Some(rest) = input.strip_prefix("save-pref ") {
            match rest.split_once(' ') {
                Some((key, value)) => {
                    memory.save_preference(key, serde_json::Value::String(value.to_string()))?;
                    println!("Preference saved: {key} = {value}\n");
                }
                None => println!("usage: save-pref <key> <value>\n"),
            }
            continue;
        }
        if input.eq_ignore_ascii_case("show-memory") {
            println!("{}", memory.summary()?);
            continue;
        }

        messages.push(ChatMessage::user(input));

        let reply = match session.invoke(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                eprintln!("\nError: {e}\n");
                messages.pop(); // drop the failed user message
                continue;
            }
        };

        let final_reply =
            handle_reply(&mut session, &mut messages, reply, &memory, &china, &news).await?;
        println!("\nAssistant: {final_reply}\n");
    }

    println!("\nGoodbye!");
    Ok(())
}

/// Apply every directive in `reply`; returns the text to show the user.
///
/// When at least one command executed, its output is appended to the
/// conversation and a summary turn is requested — the summary becomes the
/// shown reply.
async fn handle_reply(
    session: &mut ChatSession,
    messages: &mut Vec<ChatMessage>,
    reply: String,
    memory: &Arc<MemoryManager>,
    china: &ChinaSearch,
    news: &NewsSearch,
) -> Result<String, AppError> {
    let parsed = directives::parse(&reply);
    let mut executed = false;

    for directive in parsed {
        match directive {
            Directive::SaveMemory { kind, key, value } => {
                let value = serde_json::Value::String(value);
                match kind {
                    MemoryKind::Preference => memory.save_preference(&key, value)?,
                    MemoryKind::Context => memory.save_context(&key, value)?,
                }
                println!("[Memory saved: {key}]");
            }
            Directive::Execute(raw) => {
                println!("\n[Executing: {raw}]");
                let output = match commands::parse_command(&raw) {
                    Ok(command) => commands::dispatch(&command, china, news).await,
                    Err(e) => format!("无法执行命令: {e}"),
                };
                println!("{output}");
                messages.push(ChatMessage::assistant(format!(
                    "Command executed: {raw}\nResult: {output}"
                )));
                executed = true;
            }
        }
    }

    if !executed {
        messages.push(ChatMessage::assistant(reply.clone()));
        return Ok(reply);
    }

    messages.push(ChatMessage::user(SUMMARY_REQUEST));
    match session.invoke(messages).await {
        Ok(summary) => {
            messages.push(ChatMessage::assistant(summary.clone()));
            Ok(summary)
        }
        Err(e) => {
            eprintln!("\nError: {e}\n");
            // The search output was already shown; the lost summary turn is
            // not fatal.
            Ok(reply)
        }
    }
}
