use std::sync::LazyLock;

use regex::Regex;

static SECTION_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^##\s*Software Engineering New Grad Roles.*$").unwrap());
static INACTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^###\s*Inactive roles.*$").unwrap());
static NEXT_H2_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^##\s").unwrap());

/// Slice the active new-grad SWE region out of the full README.
///
/// The section opens at the roles heading and closes at whichever comes
/// first after it: the "Inactive roles" sub-heading, the next `##` heading,
/// or end of document. The README is externally owned and loosely versioned,
/// so a missing heading falls open to the whole document rather than
/// producing zero rows.
pub fn extract_active_section(md: &str) -> &str {
    let Some(start) = SECTION_START_RE.find(md) else {
        return md;
    };
    let rest = &md[start.end()..];

    let inactive_at = INACTIVE_RE.find(rest).map(|m| m.start());
    let next_h2_at = NEXT_H2_RE.find(rest).map(|m| m.start());
    let end = match (inactive_at, next_h2_at) {
        (Some(a), Some(b)) => start.end() + a.min(b),
        (Some(a), None) | (None, Some(a)) => start.end() + a,
        (None, None) => md.len(),
    };

    &md[start.start()..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_inactive_subheading() {
        let md = "# Intro\n## Software Engineering New Grad Roles\n| table |\n### Inactive roles\n| stale |\n";
        let section = extract_active_section(md);
        assert!(section.contains("| table |"));
        assert!(!section.contains("stale"));
    }

    #[test]
    fn stops_at_next_top_level_heading() {
        let md = "## Software Engineering New Grad Roles\n| table |\n## Other Roles\n| other |\n";
        let section = extract_active_section(md);
        assert!(section.contains("| table |"));
        assert!(!section.contains("other"));
    }

    #[test]
    fn runs_to_end_of_document() {
        let md = "## Software Engineering New Grad Roles\n| a |\n| b |\n";
        assert_eq!(extract_active_section(md), md);
    }

    #[test]
    fn heading_match_is_case_insensitive() {
        let md = "## SOFTWARE ENGINEERING NEW GRAD ROLES\n| table |\n";
        assert!(extract_active_section(md).contains("| table |"));
    }

    #[test]
    fn missing_heading_fails_open() {
        let md = "no headings here\n| still | a | table |\n";
        assert_eq!(extract_active_section(md), md);
    }

    #[test]
    fn fixture_section_excludes_inactive_rows() {
        let md = std::fs::read_to_string("tests/fixtures/readme.md").unwrap();
        let section = extract_active_section(&md);
        assert!(section.contains("Software Engineering New Grad Roles"));
        assert!(!section.contains("Stale Industries"));
        assert!(!section.contains("Other Resources"));
    }
}
