//! Candidate line parsing.
//!
//! Supported line formats:
//! - bare `@handle`
//! - bare alphanumeric token of at least 5 chars (handle without `@`)
//! - `https://t.me/<handle>[?...]`
//! - pipe-delimited record with an `@handle` or a `t.me/` URL among its fields

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::ChatHandle;

const TME_PREFIX: &str = "https://t.me/";
const TME_MARKER: &str = "t.me/";
const MIN_BARE_LEN: usize = 5;

/// Why a line did not yield a joinable handle.
///
/// Every kind is reported to the operator as "no public handle".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectKind {
    NoCandidate,
    PrivateInvite,
    InvalidUsername,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub raw: String,
    pub kind: RejectKind,
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        "no_public_handle"
    }
}

pub type ParsedLine = std::result::Result<ChatHandle, Rejection>;

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]{5,32}$").expect("valid regex"))
}

/// Parse one trimmed, non-empty line into a normalized handle.
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim();
    let reject = |kind| Rejection {
        raw: line.to_string(),
        kind,
    };

    let Some(username) = extract_username(line) else {
        return Err(reject(RejectKind::NoCandidate));
    };

    if username.starts_with('+') {
        return Err(reject(RejectKind::PrivateInvite));
    }
    if !username_re().is_match(username) {
        return Err(reject(RejectKind::InvalidUsername));
    }

    Ok(ChatHandle::from_username(username))
}

fn extract_username(line: &str) -> Option<&str> {
    if line.contains('|') {
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        if let Some(tag) = fields.iter().find_map(|f| f.strip_prefix('@')) {
            return Some(tag);
        }
        return fields
            .iter()
            .find(|f| f.contains(TME_MARKER))
            .map(|f| last_path_segment(f));
    }

    if line.starts_with(TME_PREFIX) {
        return Some(last_path_segment(line));
    }

    if let Some(rest) = line.strip_prefix('@') {
        return Some(rest);
    }

    if line.chars().count() >= MIN_BARE_LEN && line.chars().all(char::is_alphanumeric) {
        return Some(line);
    }

    None
}

/// Final path segment of a URL-ish string, query string dropped.
fn last_path_segment(url: &str) -> &str {
    let path = url.split('?').next().unwrap_or("");
    let path = path.trim_end_matches('/');
    path.rsplit('/').next().unwrap_or("")
}
