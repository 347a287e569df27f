use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::parser::text::{
    age_to_days, clean_md_text, collapse_whitespace, detect_flags, is_arrow_cell,
    strip_flag_emojis, Flags,
};
use crate::urls::{dedupe_key, is_direct_ats, strip_tracking};

static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\|\s*-+\s*\|").unwrap());
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\|\s*Company\s*\|\s*Role\s*\|\s*Location\s*\|\s*Application\s*\|\s*Age\s*\|")
        .unwrap()
});
static LINK_TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((https?://[^)]+)\)").unwrap());
static BARE_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// One posting candidate, display-cleaned. `apply_url` has tracking stripped
/// but is not yet the canonical comparison key.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub company: String,
    pub title: String,
    pub location: String,
    pub apply_url: String,
    pub age_days: Option<u32>,
    pub flags: Flags,
}

/// Parse the active-roles fragment into job records.
///
/// Two strategies, never both: markdown-first, falling back to an HTML
/// `<table>` parse only when the fragment has no qualifying pipe-table
/// lines. The probe is the line scan itself.
pub fn parse_section(fragment: &str) -> Vec<JobRecord> {
    let lines: Vec<&str> = fragment
        .lines()
        .map(str::trim)
        .filter(|ln| ln.starts_with('|') && ln.matches('|').count() >= 5)
        .collect();
    if lines.is_empty() {
        parse_html_table(fragment)
    } else {
        parse_markdown_table(&lines)
    }
}

/// Running dedupe + continuation-company state threaded through either
/// strategy's row loop. The same posting can appear twice in one pull
/// (re-listed under a different tracking tag); first occurrence wins.
#[derive(Default)]
struct RowState {
    seen: HashSet<String>,
    last_company: Option<String>,
}

impl RowState {
    /// Resolve the company cell, inheriting from the previous row when the
    /// cell is an arrow glyph.
    fn resolve_company(&mut self, cell: &str) -> String {
        if is_arrow_cell(cell) {
            return self.last_company.clone().unwrap_or_default();
        }
        if !cell.is_empty() {
            self.last_company = Some(cell.to_string());
        }
        cell.to_string()
    }

    /// Strip tracking, re-check the ATS allow-list, and claim the dedupe
    /// key. Returns the cleaned URL only for a new, direct-ATS posting.
    fn claim_url(&mut self, raw_url: &str) -> Option<String> {
        let cleaned = strip_tracking(raw_url);
        if !is_direct_ats(&cleaned) {
            return None;
        }
        let key = dedupe_key(&cleaned);
        if !self.seen.insert(key) {
            return None;
        }
        Some(cleaned)
    }
}

fn parse_markdown_table(lines: &[&str]) -> Vec<JobRecord> {
    let mut rows = Vec::new();
    let mut state = RowState::default();

    for line in lines {
        if SEPARATOR_RE.is_match(line) || HEADER_RE.is_match(line) {
            continue;
        }
        let cells: Vec<&str> = line
            .trim_matches('|')
            .split('|')
            .map(str::trim)
            .collect();
        if cells.len() < 5 {
            continue;
        }
        let (comp_cell, role_cell, loc_cell, app_cell, age_cell) =
            (cells[0], cells[1], cells[2], cells[3], cells[4]);

        // The application cell mixes markdown and inline HTML; parse it as a
        // fragment to recover badge image alt text for flag detection.
        let app_fragment = Html::parse_fragment(app_cell);
        let app_text = fragment_text(&app_fragment);
        let app_alts = img_alts(app_fragment.root_element());
        let flags = detect_flags(&format!(
            "{comp_cell} {role_cell} {app_text} {app_alts} {age_cell}"
        ));

        let company = state.resolve_company(&strip_flag_emojis(&clean_md_text(comp_cell)));
        let title = strip_flag_emojis(&clean_md_text(role_cell));
        let location = clean_md_text(loc_cell);
        let age_days = age_to_days(&clean_md_text(age_cell));

        let Some(raw_url) = first_ats_url_in_cell(app_cell, &app_fragment) else {
            continue;
        };
        let Some(apply_url) = state.claim_url(&raw_url) else {
            continue;
        };

        rows.push(JobRecord {
            company,
            title,
            location,
            apply_url,
            age_days,
            flags,
        });
    }

    rows
}

fn parse_html_table(fragment: &str) -> Vec<JobRecord> {
    let tr_sel = Selector::parse("tr").unwrap();
    let td_sel = Selector::parse("td").unwrap();
    let a_sel = Selector::parse("a[href]").unwrap();

    let doc = Html::parse_fragment(fragment);
    let mut rows = Vec::new();
    let mut state = RowState::default();

    for tr in doc.select(&tr_sel) {
        let tds: Vec<ElementRef> = tr.select(&td_sel).collect();
        if tds.len() < 5 {
            continue;
        }
        let (comp_td, role_td, loc_td, app_td, age_td) = (tds[0], tds[1], tds[2], tds[3], tds[4]);

        let comp_text = element_text(comp_td);
        let role_text = element_text(role_td);
        let app_text = element_text(app_td);
        let age_text = element_text(age_td);
        let alts = format!(
            "{} {} {}",
            img_alts(comp_td),
            img_alts(role_td),
            img_alts(app_td)
        );
        let flags = detect_flags(&format!(
            "{comp_text} {role_text} {app_text} {alts} {age_text}"
        ));

        let company = state.resolve_company(&strip_flag_emojis(&comp_text));
        let title = strip_flag_emojis(&role_text);
        let location = element_text(loc_td);
        let age_days = age_to_days(&age_text);

        let Some(raw_url) = app_td
            .select(&a_sel)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| is_direct_ats(href))
            .map(|href| href.trim().to_string())
        else {
            continue;
        };
        let Some(apply_url) = state.claim_url(&raw_url) else {
            continue;
        };

        rows.push(JobRecord {
            company,
            title,
            location,
            apply_url,
            age_days,
            flags,
        });
    }

    rows
}

/// First URL in a markdown cell that passes the ATS allow-list. Candidates
/// in preference order: markdown link targets, anchor hrefs from the cell's
/// inline HTML, then bare `https://` tokens trimmed of table punctuation.
fn first_ats_url_in_cell(cell: &str, fragment: &Html) -> Option<String> {
    static A_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

    let mut candidates: Vec<String> = LINK_TARGET_RE
        .captures_iter(cell)
        .map(|c| c[1].to_string())
        .collect();
    candidates.extend(
        fragment
            .select(&A_SEL)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| href.trim().to_string()),
    );
    candidates.extend(
        BARE_URL_RE
            .find_iter(cell)
            .map(|m| m.as_str().trim_end_matches([')', '|', ',']).to_string()),
    );
    candidates.into_iter().find(|u| is_direct_ats(u))
}

fn element_text(el: ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn fragment_text(doc: &Html) -> String {
    element_text(doc.root_element())
}

fn img_alts(el: ElementRef) -> String {
    static IMG_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
    el.select(&IMG_SEL)
        .filter_map(|img| img.value().attr("alt"))
        .collect::<Vec<_>>()
        .join(" ")
}
