//! Utility Module - small helpers shared by every pass
//!
//! - `constants`: runtime paths, artifact names, limits
//! - `ordered_map`: insertion-ordered map used for emitted containers
//! - string helpers: content hashing, key casing, expression detection

pub mod constants;
mod ordered_map;

use std::sync::LazyLock;

use regex::Regex;

pub use ordered_map::OrderedMap;

/// Matches `${{ secrets.NAME }}` references (NAME captured)
static SECRET_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"secrets\.([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Content hash used for import memoization and the lock-file header.
///
/// xxh3 (64-bit), rendered as 16 hex chars.
pub fn content_hash(content: &str) -> String {
    use xxhash_rust::xxh3::xxh3_64;
    format!("{:016x}", xxh3_64(content.as_bytes()))
}

/// `create-pull-request` → `create_pull_request`
pub fn kebab_to_snake(s: &str) -> String {
    s.replace('-', "_")
}

/// True when the whole (trimmed) string is a GitHub Actions expression
pub fn is_expression(s: &str) -> bool {
    let t = s.trim();
    t.starts_with("${{") && t.ends_with("}}")
}

/// Secret names referenced in a value, in order of appearance
pub fn secret_refs(value: &str) -> Vec<String> {
    if !value.contains("${{") {
        return Vec::new();
    }
    SECRET_REF_RE
        .captures_iter(value)
        .map(|c| c[1].to_string())
        .collect()
}

/// Sort + dedup a list of strings, dropping blanks
pub fn sorted_unique(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Heredoc terminator `GH_AW_<TAG>_EOF`, salted with the content hash when
/// a line of `content` would end the heredoc early
pub fn heredoc_delimiter(tag: &str, content: &str) -> String {
    let collides = |d: &str| content.lines().any(|l| l == d);
    let plain = format!("GH_AW_{}_EOF", tag);
    if !collides(&plain) {
        return plain;
    }
    let hash = content_hash(content);
    let mut delimiter = format!("GH_AW_{}_{}_EOF", tag, hash);
    let mut n = 0u32;
    while collides(&delimiter) {
        n += 1;
        delimiter = format!("GH_AW_{}_{}_{}_EOF", tag, hash, n);
    }
    delimiter
}

/// Quote a string for a single-quoted shell argument
pub fn shell_single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_and_hex() {
        let a = content_hash("hello");
        assert_eq!(a, content_hash("hello"));
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, content_hash("hello!"));
    }

    #[test]
    fn kebab_case_converts() {
        assert_eq!(kebab_to_snake("push-to-pull-request-branch"), "push_to_pull_request_branch");
        assert_eq!(kebab_to_snake("noop"), "noop");
    }

    #[test]
    fn detects_expressions() {
        assert!(is_expression("${{ inputs.max }}"));
        assert!(is_expression("  ${{ vars.X }} "));
        assert!(!is_expression("3"));
        assert!(!is_expression("prefix ${{ x }} suffix"));
    }

    #[test]
    fn extracts_secret_refs() {
        assert_eq!(
            secret_refs("${{ secrets.A_TOKEN || secrets.B }}"),
            vec!["A_TOKEN".to_string(), "B".to_string()]
        );
        assert!(secret_refs("plain value").is_empty());
        assert!(secret_refs("secrets.NOT_AN_EXPR").is_empty());
    }

    #[test]
    fn sorted_unique_trims_and_dedups() {
        let out = sorted_unique(vec![" b ".into(), "a".into(), "b".into(), "".into()]);
        assert_eq!(out, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn heredoc_delimiter_avoids_content_lines() {
        assert_eq!(heredoc_delimiter("PROMPT", "hello\n"), "GH_AW_PROMPT_EOF");

        let hostile = "before\nGH_AW_PROMPT_EOF\nafter\n";
        let d = heredoc_delimiter("PROMPT", hostile);
        assert_eq!(d, format!("GH_AW_PROMPT_{}_EOF", content_hash(hostile)));
        assert!(!hostile.lines().any(|l| l == d));

        let both = format!("GH_AW_X_EOF\nGH_AW_X_{}_EOF\n", content_hash("ignored"));
        let d = heredoc_delimiter("X", &both);
        assert!(!both.lines().any(|l| l == d));
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_single_quote("it's"), r"'it'\''s'");
    }
}
