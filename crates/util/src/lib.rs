//! Shared helpers for the Doorstep workspace: draft persistence and a few
//! small filesystem/text utilities used by the store and the CLI.

use std::path::PathBuf;

pub mod draft_store;

pub use draft_store::{
    DRAFTS_FILE_NAME, DRAFTS_PATH_ENV, DraftKey, DraftStore, DraftStoreError, DraftSummary, InMemoryDraftStore, JsonDraftStore,
    StoredDraft,
};

/// Expands a leading `~` or `~/` to the user's home directory.
///
/// Paths without a tilde prefix pass through unchanged. When the home
/// directory cannot be determined the literal path is returned so callers
/// fail with an honest "no such directory" error instead of a panic.
pub fn expand_tilde(path: impl Into<PathBuf>) -> PathBuf {
    let path: PathBuf = path.into();
    let input = path.to_string_lossy();
    let trimmed = input.trim();

    if trimmed == "~" {
        return dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }

    if let Some(rest) = trimmed.strip_prefix("~/") {
        return dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }

    if let Some(rest) = trimmed.strip_prefix("~\\") {
        return dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }

    PathBuf::from(trimmed)
}

/// Strips formatting characters from a typed phone number, keeping digits
/// and a leading `+`. Used by the CLI before the schema's pattern check.
pub fn normalize_phone(input: &str) -> String {
    let mut normalized = String::with_capacity(input.len());
    for (index, character) in input.trim().chars().enumerate() {
        if character.is_ascii_digit() || (index == 0 && character == '+') {
            normalized.push(character);
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde_passes_plain_paths_through() {
        assert_eq!(expand_tilde("/tmp/x"), PathBuf::from("/tmp/x"));
        assert_eq!(expand_tilde("relative/path"), PathBuf::from("relative/path"));
    }

    #[test]
    fn expand_tilde_resolves_home_prefix() {
        let expanded = expand_tilde("~/drafts.json");
        assert!(!expanded.to_string_lossy().starts_with('~') || dirs_next::home_dir().is_none());
    }

    #[test]
    fn normalize_phone_strips_formatting() {
        assert_eq!(normalize_phone("(987) 654-3210"), "9876543210");
        assert_eq!(normalize_phone("+1 987 654 3210"), "+19876543210");
        assert_eq!(normalize_phone(" 98 76 "), "9876");
    }
}
