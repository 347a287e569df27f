use std::sync::LazyLock;

use regex::Regex;

static MD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static ARROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:-&gt;|->|→|↳)\s*$").unwrap());
static AGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\s*(mo|yr|h|d|w|y)\b").unwrap());

/// Listing glyphs, mapped 1:1 to the boolean flags below.
pub const EMOJI_NO_SPONSORSHIP: &str = "🛂";
pub const EMOJI_US_CITIZENSHIP: &str = "🇺🇸";
pub const EMOJI_FAANG_PLUS: &str = "🔥";
pub const EMOJI_CLOSED: &str = "🔒";
pub const EMOJI_ADVANCED_DEGREE: &str = "🎓";

const FLAG_EMOJIS: &[&str] = &[
    EMOJI_NO_SPONSORSHIP,
    EMOJI_US_CITIZENSHIP,
    EMOJI_FAANG_PLUS,
    EMOJI_CLOSED,
    EMOJI_ADVANCED_DEGREE,
];

/// Arrow glyphs used by multi-role listings to mean "same company as above".
const ARROW_GLYPHS: &[&str] = &["↳", "↠", "➜", "→", "⤷", "⮑", "›", "»"];

/// Heuristic classifiers for one listing row. Each is set independently by
/// emoji presence or a keyword match; nothing ever unsets one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub no_sponsorship: bool,
    pub requires_us_citizenship: bool,
    pub faang_plus: bool,
    pub closed: bool,
    pub advanced_degree: bool,
}

/// Replace every `[label](target)` span with its label, then collapse
/// whitespace runs to single spaces.
pub fn clean_md_text(md: &str) -> String {
    let without_links = MD_LINK_RE.replace_all(md, "$1");
    collapse_whitespace(&without_links)
}

pub fn strip_flag_emojis(s: &str) -> String {
    let mut out = s.to_string();
    for emoji in FLAG_EMOJIS {
        out = out.replace(emoji, "");
    }
    collapse_whitespace(&out)
}

pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RE.replace_all(s, " ").trim().to_string()
}

/// True when a table cell is only an arrow glyph (or an arrow-like token
/// such as `->` or its HTML escape), signaling a continuation row.
pub fn is_arrow_cell(cell: &str) -> bool {
    let cell = cell.trim();
    ARROW_GLYPHS.contains(&cell) || ARROW_RE.is_match(cell)
}

/// Classify a row's combined cell text (including image alt text).
pub fn detect_flags(text: &str) -> Flags {
    let low = text.to_lowercase();
    let any = |terms: &[&str]| terms.iter().any(|t| low.contains(t));

    Flags {
        no_sponsorship: text.contains(EMOJI_NO_SPONSORSHIP)
            || any(&[
                "no sponsorship",
                "does not offer sponsorship",
                "sponsorship not available",
                "no visa",
            ]),
        requires_us_citizenship: text.contains(EMOJI_US_CITIZENSHIP)
            || any(&[
                "requires u.s. citizenship",
                "us citizenship required",
                "citizens only",
                "u.s. citizens only",
            ]),
        faang_plus: text.contains(EMOJI_FAANG_PLUS) || low.contains("faang"),
        closed: text.contains(EMOJI_CLOSED)
            || any(&[
                "application is closed",
                "posting closed",
                "closed",
                "inactive",
                "not accepting",
                "no longer accepting",
                "apply disabled",
                "unavailable",
                "archived",
                "lock",
            ]),
        advanced_degree: text.contains(EMOJI_ADVANCED_DEGREE)
            || any(&["advanced degree", "master", "master’s", "masters", "phd", "mba"]),
    }
}

/// Parse a free-text age expression ("3d", "2 mo", "1 yr") into days.
/// Months and years use fixed 30/365-day approximations; good enough for a
/// freshness filter measured in days, and deliberately not calendar-exact.
pub fn age_to_days(text: &str) -> Option<u32> {
    let s = text.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }
    // Longest unit words first so plurals reduce cleanly.
    let s = s
        .replace("months", "mo")
        .replace("month", "mo")
        .replace("mth", "mo")
        .replace("years", "yr")
        .replace("year", "yr")
        .replace("weeks", "w")
        .replace("week", "w")
        .replace("days", "d")
        .replace("day", "d")
        .replace("hours", "h")
        .replace("hour", "h");

    let caps = AGE_RE.captures(&s)?;
    let n: u32 = caps[1].parse().ok()?;
    match &caps[2] {
        "h" => Some(0),
        "d" => Some(n),
        "w" => Some(n * 7),
        "mo" => Some(n * 30),
        "yr" | "y" => Some(n * 365),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md_links_resolve_to_labels() {
        assert_eq!(
            clean_md_text("[Acme](https://acme.com)  Platform   Team"),
            "Acme Platform Team"
        );
    }

    #[test]
    fn flag_emojis_are_stripped() {
        assert_eq!(strip_flag_emojis("Acme 🔒 🛂"), "Acme");
        assert_eq!(strip_flag_emojis("🇺🇸 Acme"), "Acme");
    }

    #[test]
    fn arrow_cells() {
        for glyph in ["↳", "→", "->", "-&gt;", "↳  ", "»"] {
            assert!(is_arrow_cell(glyph), "expected arrow: {glyph:?}");
        }
        assert!(!is_arrow_cell("Acme"));
        assert!(!is_arrow_cell("-> Acme"));
    }

    #[test]
    fn flags_from_emoji() {
        let f = detect_flags("Engineer 🛂 🎓");
        assert!(f.no_sponsorship);
        assert!(f.advanced_degree);
        assert!(!f.closed);
    }

    #[test]
    fn flags_from_keywords() {
        let f = detect_flags("No Sponsorship — U.S. Citizens Only, FAANG tier");
        assert!(f.no_sponsorship);
        assert!(f.requires_us_citizenship);
        assert!(f.faang_plus);
        assert!(detect_flags("this posting closed yesterday").closed);
        assert!(detect_flags("PhD preferred").advanced_degree);
    }

    #[test]
    fn flags_are_a_pure_union() {
        // Keyword sets the flag even with no emoji anywhere in sight.
        let f = detect_flags("no visa support");
        assert!(f.no_sponsorship);
        assert_eq!(detect_flags(""), Flags::default());
    }

    #[test]
    fn age_parsing() {
        assert_eq!(age_to_days("3d"), Some(3));
        assert_eq!(age_to_days("2 mo"), Some(60));
        assert_eq!(age_to_days("1 yr"), Some(365));
        assert_eq!(age_to_days("5h"), Some(0));
        assert_eq!(age_to_days("2 weeks"), Some(14));
        assert_eq!(age_to_days("garbage"), None);
        assert_eq!(age_to_days(""), None);
    }
}
