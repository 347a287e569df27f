use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::StringRecord;
use serde::Serialize;
use tracing::{info, warn};

use crate::applied::{detect_columns, AppliedSet};
use crate::parser::text::{
    Flags, EMOJI_FAANG_PLUS, EMOJI_NO_SPONSORSHIP, EMOJI_US_CITIZENSHIP,
};
use crate::parser::JobRecord;
use crate::urls::strip_tracking;

/// Fixed output schema; the boolean columns round-trip through the archive
/// reconciler's truthy detection on later runs.
pub const CSV_FIELDS: &[&str] = &[
    "flags",
    "company",
    "title",
    "location",
    "apply_url",
    "age",
    "no_sponsorship",
    "requires_us_citizenship",
    "faang_plus",
    "closed",
    "advanced_degree",
];

/// Column the user fills in while tracking applications.
pub const TRACKER_COLUMN: &str = "Status";

/// Compact glyph summary for the spreadsheet view. Closed and
/// advanced-degree rows never survive the filter, so three glyphs suffice.
fn flags_cell(flags: &Flags) -> String {
    let mut cell = String::new();
    if flags.no_sponsorship {
        cell.push_str(EMOJI_NO_SPONSORSHIP);
    }
    if flags.requires_us_citizenship {
        cell.push_str(EMOJI_US_CITIZENSHIP);
    }
    if flags.faang_plus {
        cell.push_str(EMOJI_FAANG_PLUS);
    }
    cell
}

/// One output row in the fixed column order. Field order must track
/// `CSV_FIELDS`; the serializer derives the header from it.
#[derive(Serialize)]
struct OutputRow<'a> {
    flags: String,
    company: &'a str,
    title: &'a str,
    location: &'a str,
    apply_url: &'a str,
    age: Option<u32>,
    no_sponsorship: bool,
    requires_us_citizenship: bool,
    faang_plus: bool,
    closed: bool,
    advanced_degree: bool,
}

impl<'a> From<&'a JobRecord> for OutputRow<'a> {
    fn from(r: &'a JobRecord) -> Self {
        OutputRow {
            flags: flags_cell(&r.flags),
            company: &r.company,
            title: &r.title,
            location: &r.location,
            apply_url: &r.apply_url,
            age: r.age_days,
            no_sponsorship: r.flags.no_sponsorship,
            requires_us_citizenship: r.flags.requires_us_citizenship,
            faang_plus: r.flags.faang_plus,
            closed: r.flags.closed,
            advanced_degree: r.flags.advanced_degree,
        }
    }
}

/// Serialize records in the fixed column order and atomically replace
/// `path`. Unknown age renders as an empty cell.
pub fn write_jobs_csv(path: &Path, records: &[JobRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if records.is_empty() {
        // serialize() emits the header lazily; an empty run still needs one.
        writer.write_record(CSV_FIELDS)?;
    }
    for r in records {
        writer.serialize(OutputRow::from(r))?;
    }
    replace_file(path, &finish_csv(writer)?)
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("finishing CSV buffer: {e}"))
}

/// Full-file atomic rewrite: new content goes to a sibling temp path, then
/// renames over the target so readers never observe a half-written file.
pub fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = sibling_tmp_path(path);
    std::fs::write(&tmp, bytes)
        .with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Copy the previous output into the archive directory with a timestamp
/// suffix before it gets overwritten. Missing previous output is a no-op.
pub fn rotate_previous(output: &Path, archive_dir: &Path) -> Result<Option<PathBuf>> {
    if !output.exists() {
        return Ok(None);
    }
    std::fs::create_dir_all(archive_dir)
        .with_context(|| format!("creating {}", archive_dir.display()))?;
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("links");
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let dest = archive_dir.join(format!("{stem}_{stamp}.csv"));
    std::fs::copy(output, &dest)
        .with_context(|| format!("archiving {}", output.display()))?;
    info!("Archived previous output to {}", dest.display());
    Ok(Some(dest))
}

/// Ensure the tracking file carries a Status column, appending it with
/// empty values when absent. Re-running on a prepared file is a no-op.
/// Returns whether the file changed.
pub fn prepare_tracker(path: &Path) -> Result<bool> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut rows: Vec<StringRecord> = Vec::new();
    for record in reader.records() {
        rows.push(record.context("reading row")?);
    }
    let Some(headers) = rows.first() else {
        info!("{} is empty; nothing to prepare", path.display());
        return Ok(false);
    };

    let already = headers.iter().any(|h| {
        h.trim_start_matches('\u{feff}')
            .trim()
            .eq_ignore_ascii_case(TRACKER_COLUMN)
    });
    if already {
        return Ok(false);
    }

    let width = headers.len();
    let mut writer = csv::Writer::from_writer(Vec::new());
    for (i, row) in rows.iter().enumerate() {
        let mut out: Vec<&str> = row.iter().collect();
        // Short rows are padded so the new column lines up.
        while out.len() < width {
            out.push("");
        }
        out.push(if i == 0 { TRACKER_COLUMN } else { "" });
        writer.write_record(&out)?;
    }
    replace_file(path, &finish_csv(writer)?)?;
    Ok(true)
}

pub struct ReconcileCounts {
    pub removed: usize,
    pub remaining: usize,
}

/// Rewrite the links file, dropping every row whose apply URL matches the
/// applied set. Rows without a URL are kept; a file with no detectable URL
/// column is left untouched.
pub fn filter_links_file(
    path: &Path,
    applied: &AppliedSet,
    debug: bool,
) -> Result<ReconcileCounts> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers = reader.headers().context("reading headers")?.clone();
    let Some(url_col) = detect_columns(&headers).url else {
        warn!("{} has no URL column; leaving it untouched", path.display());
        return Ok(ReconcileCounts { removed: 0, remaining: 0 });
    };

    let mut kept: Vec<StringRecord> = Vec::new();
    let mut removed: Vec<StringRecord> = Vec::new();
    for record in reader.records() {
        let record = record.context("reading row")?;
        let raw_url = record.get(url_col).unwrap_or("").trim();
        if !raw_url.is_empty() && applied.contains_url(&strip_tracking(raw_url)) {
            removed.push(record);
        } else {
            kept.push(record);
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&headers)?;
    for row in &kept {
        writer.write_record(row)?;
    }
    replace_file(path, &finish_csv(writer)?)?;

    if debug {
        if removed.is_empty() {
            println!("No applied rows were matched.");
        } else {
            println!("Removed {} applied rows:", removed.len());
            for row in &removed {
                let cell = |name: &str| {
                    headers
                        .iter()
                        .position(|h| h.eq_ignore_ascii_case(name))
                        .and_then(|i| row.get(i))
                        .unwrap_or("")
                };
                println!("- {} | {} | {}", cell("company"), cell("title"), row.get(url_col).unwrap_or(""));
            }
        }
    }

    Ok(ReconcileCounts {
        removed: removed.len(),
        remaining: kept.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::text::Flags;
    use crate::urls::dedupe_key;

    fn sample_record() -> JobRecord {
        JobRecord {
            company: "Acme".to_string(),
            title: "SWE I".to_string(),
            location: "Austin, TX".to_string(),
            apply_url: "https://jobs.lever.co/acme/1".to_string(),
            age_days: Some(3),
            flags: Flags { no_sponsorship: true, ..Flags::default() },
        }
    }

    #[test]
    fn jobs_csv_round_trips_the_reconciler_boolean_detection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.csv");
        write_jobs_csv(&path, &[sample_record()]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), CSV_FIELDS.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("🛂,Acme,SWE I,"));
        assert!(row.contains(",3,true,false,"));

        // A later run must read these rows back as applied candidates once
        // the user flips a boolean column; "true" is in the truthy set.
        let headers = StringRecord::from(CSV_FIELDS.to_vec());
        let cols = detect_columns(&headers);
        assert_eq!(cols.url, Some(4));
    }

    #[test]
    fn unknown_age_renders_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.csv");
        let mut record = sample_record();
        record.age_days = None;
        write_jobs_csv(&path, &[record]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.lines().nth(1).unwrap().contains("acme/1,,true"));
    }

    #[test]
    fn empty_run_still_writes_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.csv");
        write_jobs_csv(&path, &[]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("{}\n", CSV_FIELDS.join(",")));
    }

    #[test]
    fn prepare_adds_status_column_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.csv");
        std::fs::write(&path, "company,apply_url\nAcme,https://jobs.lever.co/acme/1\n").unwrap();

        assert!(prepare_tracker(&path).unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "company,apply_url,Status\nAcme,https://jobs.lever.co/acme/1,\n"
        );

        // Idempotent: second run is a no-op, byte for byte.
        assert!(!prepare_tracker(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn prepare_respects_existing_status_in_any_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.csv");
        std::fs::write(&path, "company,STATUS\nAcme,applied\n").unwrap();
        assert!(!prepare_tracker(&path).unwrap());
    }

    #[test]
    fn prepare_pads_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.csv");
        std::fs::write(&path, "company,apply_url,notes\nAcme,https://jobs.lever.co/a/1\n").unwrap();
        assert!(prepare_tracker(&path).unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.lines().nth(1).unwrap(),
            "Acme,https://jobs.lever.co/a/1,,"
        );
    }

    #[test]
    fn rotation_copies_with_timestamp_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("links.csv");
        let archive = dir.path().join("past");
        std::fs::write(&output, "company\nAcme\n").unwrap();

        let dest = rotate_previous(&output, &archive).unwrap().unwrap();
        assert!(dest.starts_with(&archive));
        let name = dest.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("links_"));
        assert!(name.ends_with(".csv"));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "company\nAcme\n");
        // The original is copied, not moved.
        assert!(output.exists());
    }

    #[test]
    fn rotation_without_previous_output_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("links.csv");
        assert!(rotate_previous(&missing, &dir.path().join("past")).unwrap().is_none());
    }

    #[test]
    fn reconcile_drops_applied_rows_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.csv");
        std::fs::write(
            &path,
            "company,apply_url\nAcme,https://jobs.lever.co/acme/1?utm_source=x\nBeta,https://jobs.lever.co/beta/2\n",
        )
        .unwrap();

        let mut applied = AppliedSet::default();
        applied.urls.insert(dedupe_key("https://jobs.lever.co/acme/1"));

        let counts = filter_links_file(&path, &applied, false).unwrap();
        assert_eq!(counts.removed, 1);
        assert_eq!(counts.remaining, 1);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("acme"));
        assert!(content.contains("beta"));
    }

    #[test]
    fn reconcile_keeps_rows_without_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.csv");
        std::fs::write(&path, "company,apply_url\nAcme,\n").unwrap();
        let counts = filter_links_file(&path, &AppliedSet::default(), false).unwrap();
        assert_eq!(counts.removed, 0);
        assert_eq!(counts.remaining, 1);
    }
}
