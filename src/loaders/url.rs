use std::net::IpAddr;

use url::{Host, Url};

use crate::core::errors::ApiError;

const INVALID_URL: &str = "Please enter a valid Url. It can be a YT video url or website url";

/// Accepts http(s) URLs whose host is an IP, `localhost`, or a dotted
/// domain with an alphabetic TLD.
pub fn validate_url(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(
            "Please provide the information to get started".to_string(),
        ));
    }

    let url = Url::parse(trimmed).map_err(|_| ApiError::BadRequest(INVALID_URL.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest(INVALID_URL.to_string()));
    }

    let host_ok = match url.host() {
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
        Some(Host::Domain(domain)) => is_valid_domain(domain),
        None => false,
    };
    if !host_ok {
        return Err(ApiError::BadRequest(INVALID_URL.to_string()));
    }

    Ok(url)
}

fn is_valid_domain(domain: &str) -> bool {
    if domain.eq_ignore_ascii_case("localhost") {
        return true;
    }
    if domain.parse::<IpAddr>().is_ok() {
        return true;
    }

    let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let tld = labels.last().copied().unwrap_or_default();
    labels_ok
        && tld.len() >= 2
        && (tld.chars().all(|c| c.is_ascii_alphabetic()) || tld.starts_with("xn--"))
}

pub fn is_youtube_url(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == "youtube.com" || host.ends_with(".youtube.com") || host == "youtu.be"
}
