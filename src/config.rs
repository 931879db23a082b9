//! Configuration loading with env-var overrides.
//!
//! Reads a flat `key=value` properties file (`config.properties` in the
//! current working directory by default; lines starting with `#` are
//! ignored), then applies environment overrides. Precedence, lowest to
//! highest: hard-coded default < config file < environment < explicit
//! constructor argument (the last one is applied by callers, e.g.
//! [`ClientOptions`](crate::llm::ClientOptions)).

use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use crate::error::AppError;

const DEFAULT_CONFIG_FILE: &str = "config.properties";

/// Chat-model configuration (`glm.*` keys).
#[derive(Debug, Clone)]
pub struct GlmConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Model substituted by callers after a rate-limit error.
    pub fallback_model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request streamed responses from the backend.
    pub streaming: bool,
    /// Hard cap on generated tokens; `None` leaves it to the backend.
    pub max_tokens: Option<u32>,
}

/// API keys for the search backends. Both optional — a missing key just
/// removes that backend from the aggregation.
#[derive(Debug, Clone, Default)]
pub struct SearchKeys {
    pub gnews_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
}

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub glm: GlmConfig,
    pub search: SearchKeys,
    /// Directory holding the long-term memory namespace files (already
    /// expanded, no `~`).
    pub memory_dir: PathBuf,
    /// Directory scanned for `*/SKILL.md` prompt blobs.
    pub skills_dir: PathBuf,
    pub log_level: String,
    /// API key from `ZHIPUAI_API_KEY` — never sourced from the file.
    pub api_key: Option<String>,
}

/// Environment-sourced overrides, split out so tests can pass them
/// explicitly instead of mutating process env vars.
#[derive(Debug, Default)]
pub struct EnvOverrides {
    pub api_key: Option<String>,
    pub gnews_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub memory_dir: Option<String>,
    pub log_level: Option<String>,
}

impl EnvOverrides {
    fn from_process_env() -> Self {
        Self {
            api_key: env::var("ZHIPUAI_API_KEY").ok(),
            gnews_api_key: env::var("GNEWS_API_KEY").ok(),
            tavily_api_key: env::var("TAVILY_API_KEY").ok(),
            memory_dir: env::var("GLIM_MEMORY_DIR").ok(),
            log_level: env::var("GLIM_LOG_LEVEL").ok(),
        }
    }
}

/// Load config from `path` (or `config.properties`), then apply env overrides.
///
/// A missing file is not an error — every key has a default and the file is
/// optional, matching the properties-file contract.
pub fn load(path: Option<&Path>) -> Result<Config, AppError> {
    load_from(
        path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE)),
        EnvOverrides::from_process_env(),
    )
}

/// Internal loader — accepts an explicit path and explicit overrides.
pub fn load_from(path: &Path, overrides: EnvOverrides) -> Result<Config, AppError> {
    let props = match fs::read_to_string(path) {
        Ok(raw) => parse_properties(&raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
        Err(e) => {
            return Err(AppError::Config(format!(
                "cannot read {}: {e}",
                path.display()
            )));
        }
    };

    let temperature = match props.get("glm.temperature") {
        Some(raw) => raw.parse::<f32>().map_err(|e| {
            AppError::Config(format!("glm.temperature '{raw}' is not a number: {e}"))
        })?,
        None => 0.5,
    };

    let max_tokens = match props.get("glm.max_tokens") {
        Some(raw) => Some(raw.parse::<u32>().map_err(|e| {
            AppError::Config(format!("glm.max_tokens '{raw}' is not an integer: {e}"))
        })?),
        None => None,
    };

    let memory_dir = overrides
        .memory_dir
        .as_deref()
        .or(props.get("memory.dir").map(String::as_str))
        .map(expand_home)
        .unwrap_or_else(default_memory_dir);

    Ok(Config {
        glm: GlmConfig {
            api_base_url: props
                .get("glm.api_base_url")
                .cloned()
                .unwrap_or_else(|| {
                    "https://open.bigmodel.cn/api/paas/v4/chat/completions".to_string()
                }),
            model: props
                .get("glm.model")
                .cloned()
                .unwrap_or_else(|| "glm-4.6v".to_string()),
            fallback_model: props
                .get("glm.fallback_model")
                .cloned()
                .unwrap_or_else(|| "glm-4.7".to_string()),
            temperature,
            streaming: props
                .get("glm.streaming")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            max_tokens,
        },
        search: SearchKeys {
            gnews_api_key: overrides
                .gnews_api_key
                .or_else(|| props.get("gnews.api_key").cloned()),
            tavily_api_key: overrides
                .tavily_api_key
                .or_else(|| props.get("tavily.api_key").cloned()),
        },
        memory_dir,
        skills_dir: props
            .get("skills.dir")
            .map(|s| expand_home(s))
            .unwrap_or_else(|| PathBuf::from("skills")),
        log_level: overrides
            .log_level
            .or_else(|| props.get("log.level").cloned())
            .unwrap_or_else(|| "info".to_string()),
        api_key: overrides.api_key,
    })
}

/// Parse the flat properties format: one `key=value` per line, split on the
/// first `=` only, `#` comment lines and blank lines skipped.
pub fn parse_properties(raw: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            out.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    out
}

fn default_memory_dir() -> PathBuf {
    expand_home("~/.glim/memories")
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — no API keys, endpoint pointing nowhere.
#[cfg(test)]
impl Config {
    pub fn test_default(memory_dir: &Path) -> Self {
        Self {
            glm: GlmConfig {
                api_base_url: "http://localhost:0/api/paas/v4/chat/completions".into(),
                model: "test-model".into(),
                fallback_model: "test-fallback".into(),
                temperature: 0.0,
                streaming: false,
                max_tokens: None,
            },
            search: SearchKeys::default(),
            memory_dir: memory_dir.to_path_buf(),
            skills_dir: memory_dir.join("skills"),
            log_level: "info".into(),
            api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC_PROPERTIES: &str = r#"
# GLM settings
glm.model=glm-4.7
glm.temperature=0.3
glm.streaming=true

gnews.api_key=abc123
"#;

    fn write_props(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_basic_properties() {
        let f = write_props(BASIC_PROPERTIES);
        let cfg = load_from(f.path(), EnvOverrides::default()).unwrap();
        assert_eq!(cfg.glm.model, "glm-4.7");
        assert_eq!(cfg.glm.temperature, 0.3);
        assert!(cfg.glm.streaming);
        assert_eq!(cfg.search.gnews_api_key.as_deref(), Some("abc123"));
    }

    #[test]
    fn comments_and_blanks_ignored() {
        let props = parse_properties("# comment\n\nkey=value\n  # indented comment\n");
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("key").map(String::as_str), Some("value"));
    }

    #[test]
    fn value_may_contain_equals() {
        let props = parse_properties("url=https://example.com/?a=b\n");
        assert_eq!(
            props.get("url").map(String::as_str),
            Some("https://example.com/?a=b")
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_from(Path::new("/nonexistent/config.properties"), EnvOverrides::default())
            .unwrap();
        assert_eq!(cfg.glm.model, "glm-4.6v");
        assert_eq!(cfg.glm.fallback_model, "glm-4.7");
        assert_eq!(cfg.glm.temperature, 0.5);
        assert!(!cfg.glm.streaming);
        assert!(cfg.search.tavily_api_key.is_none());
    }

    #[test]
    fn env_beats_file() {
        let f = write_props("gnews.api_key=from_file\nlog.level=debug\n");
        let cfg = load_from(
            f.path(),
            EnvOverrides {
                gnews_api_key: Some("from_env".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cfg.search.gnews_api_key.as_deref(), Some("from_env"));
        // untouched key still comes from the file
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn memory_dir_override() {
        let f = write_props("");
        let cfg = load_from(
            f.path(),
            EnvOverrides {
                memory_dir: Some("/tmp/glim-test".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cfg.memory_dir, PathBuf::from("/tmp/glim-test"));
    }

    #[test]
    fn bad_temperature_errors() {
        let f = write_props("glm.temperature=warm\n");
        let result = load_from(f.path(), EnvOverrides::default());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("glm.temperature"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.glim");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".glim"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }
}
