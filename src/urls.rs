use url::Url;

/// Hosted applicant-tracking systems we accept as direct apply targets.
/// Substring match on the lowercased URL.
const ATS_ALLOWLIST: &[&str] = &[
    "myworkdayjobs.com",
    "workday",
    "greenhouse.io",
    "boards.greenhouse.io",
    "lever.co",
    "jobs.lever.co",
    "icims.com",
    "taleo.net",
    "ashbyhq.com",
    "smartrecruiters.com",
    "eightfold.ai",
    "myhirecloud.com",
    "successfactors",
    "dayforcehcm",
    "brassring",
    "workforcenow",
    "workable.com",
    "careers.",
    "jobs.",
];

/// Redirect/aggregator/image hosts that can never be an apply target,
/// even when an allow-list token also matches (e.g. "jobs." in simplify.jobs).
const EXCLUDE_DOMAINS: &[&str] = &[
    "simplify.jobs",
    "imgur.com",
    "github.com",
    "swelist.com",
    "raw.githubusercontent.com",
];

/// True when the URL points straight at a recognized ATS, not a tracking
/// or redirect page. Exclude-list always wins.
pub fn is_direct_ats(url: &str) -> bool {
    let low = url.to_lowercase();
    if EXCLUDE_DOMAINS.iter().any(|d| low.contains(d)) {
        return false;
    }
    ATS_ALLOWLIST.iter().any(|d| low.contains(d))
}

/// Drop tracking query parameters: every `utm_*` key, and every pair whose
/// key or value mentions "simplify" (the listing aggregator tags its
/// redirects that way). Remaining pairs keep their original order. A URL
/// with no query, or one that fails to parse, is returned unchanged.
pub fn strip_tracking(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_string();
    };
    if parsed.query().map_or(true, str::is_empty) {
        return raw.to_string();
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, v)| {
            let lk = k.to_lowercase();
            let lv = v.to_lowercase();
            !lk.starts_with("utm_") && !lk.contains("simplify") && !lv.contains("simplify")
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        // No real parameters left: scheme://host/path with no trailing '?'.
        parsed.set_query(None);
        parsed.set_fragment(None);
        return parsed.to_string();
    }

    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    parsed.to_string()
}

/// Canonical comparison key: lowercased scheme (https when absent) and host,
/// path without its trailing slash, query kept verbatim, fragment dropped.
/// Two apply URLs reference the same posting iff their keys are equal.
/// Falls back to a lexical normalization on unparseable input; never errors.
pub fn dedupe_key(raw: &str) -> String {
    let raw = raw.trim();
    let parsed = Url::parse(raw).or_else(|_| Url::parse(&format!("https://{raw}")));
    let Ok(parsed) = parsed else {
        return raw.trim_end_matches('/').to_lowercase();
    };
    let Some(host) = parsed.host_str() else {
        return raw.trim_end_matches('/').to_lowercase();
    };

    let scheme = parsed.scheme().to_lowercase();
    let mut host = host.to_lowercase();
    if let Some(port) = parsed.port() {
        host = format!("{host}:{port}");
    }
    let path = parsed.path().strip_suffix('/').unwrap_or(parsed.path());
    match parsed.query() {
        Some(q) if !q.is_empty() => format!("{scheme}://{host}{path}?{q}"),
        _ => format!("{scheme}://{host}{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_utm_params() {
        let url = "https://boards.greenhouse.io/acme/jobs/123?utm_source=x&gh_jid=9";
        assert_eq!(
            strip_tracking(url),
            "https://boards.greenhouse.io/acme/jobs/123?gh_jid=9"
        );
    }

    #[test]
    fn strips_simplify_params_by_key_and_value() {
        let by_key = "https://jobs.lever.co/acme/1?simplify_ref=abc";
        assert_eq!(strip_tracking(by_key), "https://jobs.lever.co/acme/1");
        let by_value = "https://jobs.lever.co/acme/1?ref=Simplify";
        assert_eq!(strip_tracking(by_value), "https://jobs.lever.co/acme/1");
    }

    #[test]
    fn empty_query_leaves_no_question_mark() {
        let url = "https://jobs.lever.co/acme/1?utm_campaign=gh";
        assert_eq!(strip_tracking(url), "https://jobs.lever.co/acme/1");
    }

    #[test]
    fn no_query_is_unchanged() {
        let url = "https://boards.greenhouse.io/acme/jobs/123";
        assert_eq!(strip_tracking(url), url);
    }

    #[test]
    fn unparseable_input_is_unchanged() {
        assert_eq!(strip_tracking("not a url"), "not a url");
    }

    #[test]
    fn dedupe_key_is_idempotent() {
        for raw in [
            "HTTPS://Boards.Greenhouse.io/Acme/jobs/123/",
            "https://jobs.lever.co/acme/1?token=ZZ",
            "total garbage///",
        ] {
            let once = dedupe_key(raw);
            assert_eq!(dedupe_key(&once), once);
        }
    }

    #[test]
    fn tracking_variants_share_a_key() {
        let a = strip_tracking("https://jobs.lever.co/acme/1?utm_source=github");
        let b = strip_tracking("https://jobs.lever.co/acme/1/?ref=simplify");
        assert_eq!(dedupe_key(&a), dedupe_key(&b));
    }

    #[test]
    fn key_lowercases_scheme_and_host_only() {
        assert_eq!(
            dedupe_key("HTTPS://Jobs.Lever.co/Acme/1"),
            "https://jobs.lever.co/Acme/1"
        );
    }

    #[test]
    fn key_defaults_scheme_to_https() {
        assert_eq!(
            dedupe_key("jobs.lever.co/acme/1"),
            "https://jobs.lever.co/acme/1"
        );
    }

    #[test]
    fn ats_classification() {
        assert!(is_direct_ats("https://boards.greenhouse.io/acme/jobs/123"));
        assert!(is_direct_ats("https://acme.wd1.myworkdayjobs.com/en-US/x"));
        assert!(is_direct_ats("https://careers.acme.com/openings/1"));
        assert!(!is_direct_ats("https://simplify.jobs/p/abc"));
        assert!(!is_direct_ats("https://github.com/acme/hiring"));
        assert!(!is_direct_ats("https://example.com/about"));
    }
}
