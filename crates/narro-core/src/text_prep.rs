//! Text preparation for synthesis and file naming.
//!
//! Pure functions, no I/O.

use regex::Regex;
use std::sync::LazyLock;

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Character limit of the remote (ElevenLabs) provider.
pub const REMOTE_MAX_CHARS: usize = 4_000;

/// Character limit of the local executable provider.
pub const LOCAL_MAX_CHARS: usize = 20_000;

/// Slug used when a title has no ASCII-representable characters.
pub const DEFAULT_SLUG: &str = "audio";

/// Longest slug [`slugify`] produces. Leaves room for the id and extension
/// inside a 255-byte file name.
pub const MAX_SLUG_LEN: usize = 80;

/// Collapse every whitespace run into a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Keep at most `max_chars` characters (Unicode scalar values, not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Normalize then truncate, producing exactly what a provider receives.
pub fn prepare_for_synthesis(text: &str, max_chars: usize) -> String {
    let normalized = normalize_whitespace(text);
    truncate_chars(&normalized, max_chars).to_string()
}

/// Lowercase, ASCII, hyphen-joined form of `title`, safe in paths and URLs.
///
/// Common Latin diacritics are folded to their base letter; every other
/// non-alphanumeric character acts as a separator. The result is cut to
/// [`MAX_SLUG_LEN`] and returns [`DEFAULT_SLUG`] if nothing survives.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        let folded = fold_diacritic(c);
        for ch in folded.chars() {
            if ch.is_ascii_alphanumeric() {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(ch);
            } else {
                pending_hyphen = true;
            }
        }
    }

    // ASCII only, so byte truncation never splits a character.
    slug.truncate(MAX_SLUG_LEN);
    let slug = slug.trim_end_matches('-');

    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Map a lowercase character to an ASCII spelling when one is obvious.
fn fold_diacritic(c: char) -> String {
    let mapped = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ą' | 'ă' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' | 'ĉ' => "c",
        'ď' | 'đ' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => "e",
        'ğ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'ı' => "i",
        'ł' | 'ľ' | 'ĺ' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'œ' => "oe",
        'ř' | 'ŕ' => "r",
        'ś' | 'š' | 'ş' | 'ș' => "s",
        'ß' => "ss",
        'ť' | 'ţ' | 'ț' => "t",
        'þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        other => return other.to_string(),
    };
    mapped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── normalize / truncate ─────────────────────────────────────

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(
            normalize_whitespace("  Hello\n\n\tworld   again "),
            "Hello world again"
        );
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let text = "żółw".repeat(3);
        assert_eq!(truncate_chars(&text, 5), "żółwż");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn remote_limit_truncates_to_exactly_4000() {
        let text = "a".repeat(10_000);
        assert_eq!(prepare_for_synthesis(&text, REMOTE_MAX_CHARS).chars().count(), 4_000);
    }

    #[test]
    fn local_limit_truncates_to_exactly_20000() {
        let text = "b".repeat(25_000);
        assert_eq!(prepare_for_synthesis(&text, LOCAL_MAX_CHARS).chars().count(), 20_000);
    }

    #[test]
    fn short_text_passes_through_normalized() {
        let text = "word ".repeat(2_000);
        let prepared = prepare_for_synthesis(&text, LOCAL_MAX_CHARS);
        assert_eq!(prepared.len(), 2_000 * 5 - 1);
        assert!(!prepared.ends_with(' '));
    }

    #[test]
    fn normalization_happens_before_truncation() {
        let text = format!("{}{}", " ".repeat(50), "x".repeat(10));
        assert_eq!(prepare_for_synthesis(&text, 5), "xxxxx");
    }

    // ── slugify ─────────────────────────────────────────────────

    #[test]
    fn slug_is_lowercase_and_hyphenated() {
        assert_eq!(slugify("Hello, World! Rust 2024"), "hello-world-rust-2024");
    }

    #[test]
    fn slug_folds_diacritics() {
        assert_eq!(slugify("Zażółć gęślą jaźń"), "zazolc-gesla-jazn");
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
    }

    #[test]
    fn slug_trims_separators() {
        assert_eq!(slugify("  --Breaking:  News--  "), "breaking-news");
    }

    #[test]
    fn slug_defaults_when_nothing_survives() {
        assert_eq!(slugify("東京"), DEFAULT_SLUG);
        assert_eq!(slugify(""), DEFAULT_SLUG);
        assert_eq!(slugify("!!!"), DEFAULT_SLUG);
    }

    #[test]
    fn slug_is_path_and_url_safe() {
        let slug = slugify("../etc/passwd?x=1&y=<2>");
        assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert_eq!(slug, "etc-passwd-x-1-y-2");
    }

    #[test]
    fn slug_is_capped_for_long_titles() {
        let title = "word ".repeat(60);
        assert_eq!(title.len(), 300);
        let slug = slugify(&title);
        assert!(slug.len() <= MAX_SLUG_LEN, "{} chars", slug.len());
        assert!(slug.starts_with("word-word-"));
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn slug_cap_drops_dangling_hyphen() {
        // 79 letters, a separator, then more: the cut lands on the hyphen.
        let title = format!("{} tail", "a".repeat(79));
        assert_eq!(slugify(&title), "a".repeat(79));
    }
}
