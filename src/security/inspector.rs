//! Request body inspection.
//!
//! Size is a hard stop; a pattern match only flags the request. Inspection
//! reads a borrowed slice, so the caller still owns the untouched body.

use axum::http::Method;

use crate::config::InspectorConfig;

/// Body as seen by the inspector.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// Whole body, within the read limit.
    Complete(&'a [u8]),
    /// The body exceeded the read limit and was not buffered.
    Overflowed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    RejectTooLarge,
    /// Suspicious content; carries an excerpt for the audit record.
    FlagSuspicious(String),
}

/// Methods whose bodies are inspected.
pub fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

pub struct RequestInspector {
    max_body_bytes: usize,
    patterns: Vec<Vec<u8>>,
    excerpt_chars: usize,
}

impl RequestInspector {
    pub fn new(config: &InspectorConfig) -> Self {
        Self {
            max_body_bytes: config.max_body_bytes,
            patterns: config
                .patterns
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.as_bytes().to_ascii_lowercase())
                .collect(),
            excerpt_chars: config.excerpt_chars,
        }
    }

    /// Largest accepted body. Callers buffer at most one byte more.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn inspect(&self, method: &Method, payload: Payload<'_>) -> Verdict {
        if !carries_body(method) {
            return Verdict::Pass;
        }

        let body = match payload {
            Payload::Overflowed => return Verdict::RejectTooLarge,
            Payload::Complete(body) if body.len() > self.max_body_bytes => {
                return Verdict::RejectTooLarge
            }
            Payload::Complete(body) => body,
        };

        if self.patterns.iter().any(|pattern| contains_ignore_case(body, pattern)) {
            Verdict::FlagSuspicious(self.excerpt(body))
        } else {
            Verdict::Pass
        }
    }

    /// Leading characters of the body, lossily decoded.
    pub fn excerpt(&self, body: &[u8]) -> String {
        String::from_utf8_lossy(body)
            .chars()
            .take(self.excerpt_chars)
            .collect()
    }
}

fn contains_ignore_case(haystack: &[u8], lowered_needle: &[u8]) -> bool {
    haystack.len() >= lowered_needle.len()
        && haystack
            .windows(lowered_needle.len())
            .any(|window| window.eq_ignore_ascii_case(lowered_needle))
}
