use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use csv::StringRecord;
use tracing::{info, warn};

use crate::urls::{dedupe_key, strip_tracking};

/// Truthy spellings of an explicit applied column, case-insensitive.
const APPLIED_TRUE: &[&str] = &["TRUE", "YES", "Y", "1"];

/// Any of these in a status cell means the application already happened
/// (or progressed further; an offer implies a submission).
const APPLIED_STATUS_KEYWORDS: &[&str] =
    &["appl", "submitted", "interview", "offer", "accepted", "hired"];

/// Union of normalized applied URLs across every readable archive file.
#[derive(Debug, Default)]
pub struct AppliedSet {
    pub urls: HashSet<String>,
    pub files_used: usize,
}

impl AppliedSet {
    pub fn contains_url(&self, apply_url: &str) -> bool {
        self.urls.contains(&dedupe_key(apply_url))
    }
}

/// Column positions resolved from one file's headers. Archive headers vary
/// in case, spacing, and naming convention, so each column is found by an
/// ordered rule list (first match wins), not by exact lookup.
#[derive(Debug, PartialEq, Eq)]
pub struct ColumnMap {
    pub url: Option<usize>,
    pub applied: Option<usize>,
    pub date: Option<usize>,
    pub status: Option<usize>,
}

type HeaderRule = fn(&str) -> bool;

fn detect(headers: &[String], rules: &[HeaderRule]) -> Option<usize> {
    rules
        .iter()
        .find_map(|rule| headers.iter().position(|h| rule(h)))
}

pub fn detect_columns(raw_headers: &StringRecord) -> ColumnMap {
    let headers: Vec<String> = raw_headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();

    ColumnMap {
        url: detect(
            &headers,
            &[
                |h| matches!(h, "apply_url" | "apply-url" | "apply url"),
                |h| h.contains("apply") && (h.contains("url") || h.contains("link")),
                |h| h.contains("url") || h.contains("link"),
            ],
        ),
        applied: detect(
            &headers,
            &[
                |h| matches!(h, "applied" | "applied?"),
                |h| h.contains("appl") && !h.contains("date"),
            ],
        ),
        date: detect(
            &headers,
            &[
                |h| matches!(h, "date applied" | "date_applied"),
                |h| h.contains("date"),
            ],
        ),
        status: detect(&headers, &[|h| h == "status"]),
    }
}

/// Whether one archive row asserts its URL was applied to. The three
/// signals are ORed; precedence among them does not matter.
fn row_is_applied(row: &StringRecord, cols: &ColumnMap) -> bool {
    let cell = |i: Option<usize>| i.and_then(|i| row.get(i)).unwrap_or("").trim();

    if APPLIED_TRUE
        .iter()
        .any(|t| cell(cols.applied).eq_ignore_ascii_case(t))
    {
        return true;
    }
    if !cell(cols.date).is_empty() {
        return true;
    }
    let status = cell(cols.status).to_lowercase();
    !status.is_empty() && APPLIED_STATUS_KEYWORDS.iter().any(|k| status.contains(k))
}

/// Collect the applied-URL union from every `*.csv` under `archive_dir`,
/// plus the master tracking file when given. Historical snapshots disagree
/// on headers and occasionally on being parseable at all; a bad file is
/// warned about and skipped, never fatal to the batch.
pub fn load_applied_urls(archive_dir: &Path, master: Option<&Path>) -> AppliedSet {
    let mut set = AppliedSet::default();

    let mut files: Vec<_> = match std::fs::read_dir(archive_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
            .collect(),
        Err(_) => {
            info!("No archive directory at {}; skipping", archive_dir.display());
            Vec::new()
        }
    };
    files.sort();
    if let Some(master) = master {
        if master.exists() {
            files.push(master.to_path_buf());
        } else {
            info!("Applied file not found at {}; skipping", master.display());
        }
    }

    for path in files {
        match collect_file(&path, &mut set.urls) {
            Ok(()) => set.files_used += 1,
            Err(e) => warn!("Skipping unreadable archive {}: {e:#}", path.display()),
        }
    }

    set
}

fn collect_file(path: &Path, urls: &mut HashSet<String>) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("opening CSV")?;
    let cols = detect_columns(reader.headers().context("reading headers")?);
    let Some(url_col) = cols.url else {
        // No URL column means the file has nothing to contribute.
        return Ok(());
    };

    for record in reader.records() {
        let record = record.context("reading row")?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if !row_is_applied(&record, &cols) {
            continue;
        }
        let raw_url = record.get(url_col).unwrap_or("").trim();
        if !raw_url.is_empty() {
            urls.insert(dedupe_key(&strip_tracking(raw_url)));
        }
    }
    Ok(())
}
