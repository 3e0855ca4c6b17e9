// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Query parameters that only carry tracking state and never identify a job.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "ref",
    "refid",
    "trk",
    "trackingid",
    "src",
    "source",
    "from",
    "gclid",
    "fbclid",
];

/// Query parameters that commonly hold a posting identifier.
const ID_PARAMS: &[&str] = &[
    "jk",
    "jobid",
    "job_id",
    "currentjobid",
    "gh_jid",
    "posting_id",
    "postingid",
    "reqid",
    "req_id",
    "id",
];

/// Resolve a potentially relative URL against a base URL.
pub fn resolve(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract domain from a URL, lowercased and without a `www.` prefix.
///
/// # Examples
/// ```
/// use jobsweep::utils::url::get_domain;
///
/// assert_eq!(
///     get_domain("https://www.Example.com/path"),
///     Some("example.com".to_string())
/// );
/// ```
pub fn get_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.trim_start_matches("www.").to_string())
}

/// Canonical form of a posting URL used for duplicate detection.
///
/// Drops scheme, `www.`, fragment, tracking parameters and trailing slashes,
/// and sorts the remaining query parameters.
pub fn canonicalize(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.trim_start_matches("www.");

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.to_lowercase().as_str()))
        .map(|(k, v)| (k.to_lowercase(), v.to_string()))
        .collect();
    params.sort();

    let path = parsed.path().trim_end_matches('/');
    let mut canonical = format!("{host}{path}");
    if !params.is_empty() {
        let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        canonical.push('?');
        canonical.push_str(&query.join("&"));
    }
    Some(canonical)
}

/// Extract a stable posting identifier from a URL, qualified by domain.
pub fn extract_posting_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let domain = get_domain(url)?;

    for (key, value) in parsed.query_pairs() {
        if value.is_empty() {
            continue;
        }
        if ID_PARAMS.contains(&key.to_lowercase().as_str()) {
            return Some(format!("{domain}:{value}"));
        }
    }

    // Trailing numeric segment, e.g. /jobs/view/3829101 or /job/rust-dev-48213
    let last = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())?;
    let digits: String = last
        .rsplit(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or("")
        .to_string();
    if digits.len() >= 4 {
        return Some(format!("{domain}:{digits}"));
    }
    None
}

/// Fill a search URL template's `{query}` and `{location}` placeholders.
pub fn build_search_url(template: &str, query: &str, location: Option<&str>) -> String {
    let encode = |s: &str| url::form_urlencoded::byte_serialize(s.as_bytes()).collect::<String>();
    template
        .replace("{query}", &encode(query))
        .replace("{location}", &encode(location.unwrap_or("")))
}
