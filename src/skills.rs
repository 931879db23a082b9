//! Skill prompt loading.
//!
//! Each subdirectory of the skills directory may carry a `SKILL.md` whose
//! text teaches the model how to call that skill. All blobs are joined into
//! one block for system-prompt injection. Missing directories and skills
//! without a `SKILL.md` are silently skipped.

use std::fs;
use std::path::Path;

const SKILL_FILE: &str = "SKILL.md";
const SEPARATOR: &str = "\n\n---\n\n";

/// Concatenate every `<skills_dir>/*/SKILL.md`, sorted by directory name so
/// the result is deterministic. Returns an empty string when there is
/// nothing to load.
pub fn load_skills(skills_dir: &Path) -> String {
    let Ok(entries) = fs::read_dir(skills_dir) else {
        tracing::debug!(dir = %skills_dir.display(), "skills dir not found — skipped");
        return String::new();
    };

    let mut dirs: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let mut blobs = Vec::new();
    for dir in dirs {
        let skill_file = dir.join(SKILL_FILE);
        match fs::read_to_string(&skill_file) {
            Ok(text) => {
                let trimmed = text.trim().to_string();
                if !trimmed.is_empty() {
                    blobs.push(trimmed);
                }
            }
            Err(_) => {
                tracing::debug!(skill = %dir.display(), "no SKILL.md — skipped");
            }
        }
    }

    blobs.join(SEPARATOR)
}
