//! Directive recognition over model-generated text.
//!
//! Replies are scanned line by line; a line either carries one directive or
//! is plain text. Two exact prefixes are recognised:
//!
//! - `EXECUTE: <command>` — hand `<command>` to the search collaborator
//! - `SAVE_MEMORY: <key>=<value>` — persist a preference or context entry
//!
//! Every directive in a reply is collected, in document order, and applying
//! them all is the caller's job. A `SAVE_MEMORY` key on the preference
//! allow-list targets the preferences namespace; any other key targets
//! context. Prefixes must start the line — mid-line mentions stay plain
//! text. Malformed payloads (a `SAVE_MEMORY` without `=`) are ignored.

const EXECUTE_PREFIX: &str = "EXECUTE:";
const SAVE_MEMORY_PREFIX: &str = "SAVE_MEMORY:";

/// Keys treated as stated preferences rather than background context.
pub const PREFERENCE_KEYS: [&str; 4] =
    ["language", "content_type", "region_preference", "preferred_style"];

/// Which memory namespace a `SAVE_MEMORY` directive targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    Preference,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// A collaborator command, verbatim after the prefix.
    Execute(String),
    SaveMemory {
        kind: MemoryKind,
        key: String,
        value: String,
    },
}

/// Extract every directive from a reply, in order.
pub fn parse(text: &str) -> Vec<Directive> {
    let mut out = Vec::new();
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(EXECUTE_PREFIX) {
            let command = rest.trim();
            if !command.is_empty() {
                out.push(Directive::Execute(command.to_string()));
            }
        } else if let Some(rest) = line.strip_prefix(SAVE_MEMORY_PREFIX) {
            if let Some((key, value)) = rest.trim().split_once('=') {
                let key = key.trim();
                let value = value.trim();
                if !key.is_empty() {
                    out.push(Directive::SaveMemory {
                        kind: classify_key(key),
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }
    }
    out
}

fn classify_key(key: &str) -> MemoryKind {
    if PREFERENCE_KEYS.contains(&key) {
        MemoryKind::Preference
    } else {
        MemoryKind::Context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_extracted_verbatim() {
        let reply = "好的，我来搜索。\nEXECUTE: search \"三体\" --type tv\n稍等。";
        let directives = parse(reply);
        assert_eq!(directives, vec![Directive::Execute("search \"三体\" --type tv".into())]);
    }

    #[test]
    fn save_memory_preference_key() {
        let reply = "好的，我记住了。\nSAVE_MEMORY: content_type=movies\n我会为您推荐相关内容。";
        let directives = parse(reply);
        assert_eq!(
            directives,
            vec![Directive::SaveMemory {
                kind: MemoryKind::Preference,
                key: "content_type".into(),
                value: "movies".into(),
            }]
        );
    }

    #[test]
    fn unknown_key_targets_context() {
        let directives = parse("SAVE_MEMORY: hometown=Chengdu");
        assert_eq!(
            directives,
            vec![Directive::SaveMemory {
                kind: MemoryKind::Context,
                key: "hometown".into(),
                value: "Chengdu".into(),
            }]
        );
    }

    #[test]
    fn value_may_contain_equals() {
        let directives = parse("SAVE_MEMORY: note=a=b");
        assert_eq!(
            directives,
            vec![Directive::SaveMemory {
                kind: MemoryKind::Context,
                key: "note".into(),
                value: "a=b".into(),
            }]
        );
    }

    #[test]
    fn multiple_directives_all_collected_in_order() {
        let reply = "\
EXECUTE: news 足球 --limit 3
说明文字。
SAVE_MEMORY: language=Chinese
EXECUTE: search 流浪地球 --type movie";
        let directives = parse(reply);
        assert_eq!(directives.len(), 3);
        assert!(matches!(directives[0], Directive::Execute(_)));
        assert!(matches!(directives[1], Directive::SaveMemory { kind: MemoryKind::Preference, .. }));
        assert!(matches!(directives[2], Directive::Execute(_)));
    }

    #[test]
    fn mid_line_prefix_is_plain_text() {
        assert!(parse("我会使用 EXECUTE: search 这样的格式。").is_empty());
    }

    #[test]
    fn malformed_save_memory_ignored() {
        assert!(parse("SAVE_MEMORY: no_equals_sign_here").is_empty());
        assert!(parse("SAVE_MEMORY: =value").is_empty());
        assert!(parse("EXECUTE:   ").is_empty());
    }
}
