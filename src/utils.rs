use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// URL-safe identifier derived from a display name: "Vitamin C 500mg" -> "vitamin-c-500mg".
pub fn slugify(name: &str) -> String {
    NON_ALNUM
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_owned()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 1-based page and a size capped at `max`.
pub fn page_params(page: Option<u64>, limit: Option<u64>, default: u64, max: u64) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(default).clamp(1, max);
    (page, limit)
}
