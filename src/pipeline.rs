use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::info;

use crate::applied::{self, AppliedSet};
use crate::fetch;
use crate::output;
use crate::parser::{self, JobRecord};
use crate::urls::dedupe_key;

const US_STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC",
];
const US_KEYWORDS: &[&str] = &["USA", "U.S.", "US", "UNITED STATES"];
const NON_US_KEYWORDS: &[&str] = &["CANADA", "UK", "UNITED KINGDOM"];

// Whole-word match so "CA" never fires inside "Canada".
static STATE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", US_STATE_CODES.join("|"))).unwrap()
});

/// Best-effort US-location check over free-text location cells. A non-US
/// keyword rejects outright; otherwise US keywords, whole-word state codes,
/// and finally a bare "Remote" accept.
pub fn is_us_location(location: &str) -> bool {
    let loc = location.to_uppercase();
    if NON_US_KEYWORDS.iter().any(|kw| loc.contains(kw)) {
        return false;
    }
    if US_KEYWORDS.iter().any(|kw| loc.contains(kw)) {
        return true;
    }
    if STATE_CODE_RE.is_match(&loc) {
        return true;
    }
    loc.contains("REMOTE")
}

/// AND-composed keep predicates; also counts rows dropped because they were
/// already applied to, for the run summary.
pub fn filter_records(
    records: Vec<JobRecord>,
    applied: &AppliedSet,
    max_age_days: u32,
) -> (Vec<JobRecord>, usize) {
    let mut applied_matched = 0;
    let kept = records
        .into_iter()
        .filter(|r| {
            if r.flags.closed || r.flags.advanced_degree {
                return false;
            }
            if applied.contains_url(&r.apply_url) {
                applied_matched += 1;
                return false;
            }
            // Unknown age is excluded, never guessed fresh.
            if !r.age_days.is_some_and(|age| age <= max_age_days) {
                return false;
            }
            is_us_location(&r.location)
        })
        .collect();
    (kept, applied_matched)
}

/// Deterministic ordering: flagged-first on sponsorship, citizenship, then
/// FAANG tier, then case-folded company/title/location. Empty text sorts
/// after all real values.
pub fn sort_records(records: &mut [JobRecord]) {
    fn text_key(s: &str) -> String {
        if s.trim().is_empty() {
            "zzz".to_string()
        } else {
            s.to_lowercase()
        }
    }
    records.sort_by_key(|r| {
        (
            !r.flags.no_sponsorship,
            !r.flags.requires_us_citizenship,
            !r.flags.faang_plus,
            text_key(&r.company),
            text_key(&r.title),
            text_key(&r.location),
        )
    });
}

/// Defensive second dedupe over whatever strategy produced the rows.
pub fn dedupe_records(records: Vec<JobRecord>) -> Vec<JobRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(dedupe_key(&r.apply_url)))
        .collect()
}

pub struct PullOptions {
    pub source_url: String,
    pub max_age_days: u32,
    pub applied_file: PathBuf,
    pub output: PathBuf,
    pub archive_dir: PathBuf,
    pub archive: bool,
}

pub struct RunCounts {
    pub parsed: usize,
    pub kept: usize,
    pub applied_matched: usize,
    pub applied_urls: usize,
    pub archive_files: usize,
}

impl RunCounts {
    pub fn print(&self, max_age_days: u32, output: &std::path::Path) {
        println!(
            "Wrote {} fresh, filtered, direct ATS links to {}",
            self.kept,
            output.display()
        );
        println!(
            "  parsed {} rows; excluded {} already-applied matches",
            self.parsed, self.applied_matched
        );
        println!(
            "  consulted {} applied URLs across {} tracking files",
            self.applied_urls, self.archive_files
        );
        println!("  kept only US roles posted in the last {max_age_days} days");
    }
}

/// Full pull: fetch -> slice section -> parse table -> dedupe -> reconcile
/// applied archives -> filter -> sort -> rotate old output -> write CSV.
/// Nothing is written unless the fetch and parse both succeed.
pub fn run_pull(opts: &PullOptions) -> Result<RunCounts> {
    let document = fetch::fetch_document(&opts.source_url)?;
    let section = parser::extract_active_section(&document);
    let records = parser::parse_section(section);
    let records = dedupe_records(records);
    let parsed = records.len();
    info!("Parsed {parsed} candidate rows from the active section");

    let applied = applied::load_applied_urls(&opts.archive_dir, Some(opts.applied_file.as_path()));
    let (mut kept, applied_matched) = filter_records(records, &applied, opts.max_age_days);
    sort_records(&mut kept);

    if opts.archive {
        output::rotate_previous(&opts.output, &opts.archive_dir)?;
    }
    output::write_jobs_csv(&opts.output, &kept)?;

    Ok(RunCounts {
        parsed,
        kept: kept.len(),
        applied_matched,
        applied_urls: applied.urls.len(),
        archive_files: applied.files_used,
    })
}
