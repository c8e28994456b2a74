//! Turns an HTTP request into a [`RawEvent`].
//!
//! Extraction never fails: anything it cannot find is left as `None` and
//! [`RawEvent::admit`] decides which check to report.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::http::HeaderMap;
use serde_json::{Map, Value};

use routing::RawEvent;

/// Headers that name the event type, in lookup order.
pub const EVENT_TYPE_HEADERS: [&str; 4] = [
    "x-gitcode-event",
    "x-github-event",
    "x-gitee-event",
    "x-gitlab-event",
];

/// Headers that carry the platform's delivery id, in lookup order.
pub const DELIVERY_HEADERS: [&str; 3] = [
    "x-gitcode-delivery",
    "x-github-delivery",
    "x-gitee-delivery",
];

/// Logging field holding the platform's delivery id.
pub const FIELD_DELIVERY: &str = "delivery";

/// Request headers copied onto every outbound delivery.
const FORWARDED_HEADERS: &[&str] = &[
    "content-type",
    "user-agent",
    "x-gitcode-event",
    "x-github-event",
    "x-gitee-event",
    "x-gitlab-event",
    "x-gitcode-delivery",
    "x-github-delivery",
    "x-gitee-delivery",
    "x-gitcode-signature-256",
    "x-hub-signature-256",
    "x-gitee-token",
    "x-gitlab-token",
    "x-request-id",
];

/// Builds a [`RawEvent`] from request headers and body.
pub fn extract_event(headers: &HeaderMap, body: Bytes) -> RawEvent {
    let document = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    };
    let (org, repo) = document.as_ref().map(locate_repository).unwrap_or_default();

    let mut logging_fields = BTreeMap::new();
    if let Some(delivery) = first_header(headers, &DELIVERY_HEADERS) {
        logging_fields.insert(FIELD_DELIVERY.to_string(), delivery);
    }

    RawEvent {
        event_type: first_header(headers, &EVENT_TYPE_HEADERS),
        payload: document.map(|_| body),
        org,
        repo,
        headers: forwarded_headers(headers),
        logging_fields,
    }
}

/// Returns the first non-empty value among `names`.
fn first_header(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}

/// Keeps allowlisted headers whose values are valid UTF-8.
///
/// Repeated headers are joined with `", "` in arrival order.
fn forwarded_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    FORWARDED_HEADERS
        .iter()
        .filter_map(|name| {
            let values: Vec<&str> = headers
                .get_all(*name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            (!values.is_empty()).then(|| (name.to_string(), values.join(", ")))
        })
        .collect()
}

/// Finds the owning organisation and repository name in a payload.
///
/// Tries `repository.full_name` first, then the separate owner and name
/// fields used by GitHub, Gitee and GitCode, then GitLab's `project` object.
fn locate_repository(document: &Map<String, Value>) -> (Option<String>, Option<String>) {
    let repository = document.get("repository");
    let project = document.get("project");

    if let Some((org, repo)) = repository
        .and_then(|r| str_at(r, &["full_name"]))
        .and_then(|full| full.split_once('/'))
    {
        return (non_empty(org), non_empty(repo));
    }

    let org = repository
        .and_then(|r| str_at(r, &["owner", "login"]).or_else(|| str_at(r, &["namespace"])))
        .or_else(|| project.and_then(|p| str_at(p, &["namespace"])));
    let repo = repository
        .and_then(|r| str_at(r, &["name"]))
        .or_else(|| project.and_then(|p| str_at(p, &["name"])));

    (org.map(str::to_string), repo.map(str::to_string))
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))?
        .as_str()
        .filter(|s| !s.is_empty())
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
