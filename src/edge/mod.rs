//! edge
//!
//! Viewer-request URI rewriting.
//!
//! The distribution serves a static bucket, which has no notion of a
//! directory index. Directory-style requests are rewritten to the
//! `index.html` inside that directory before they reach the origin.
//!
//! # Example
//!
//! ```
//! use sitestack::edge::rewrite_uri;
//!
//! assert_eq!(rewrite_uri("/"), "/index.html");
//! assert_eq!(rewrite_uri("/docs/button"), "/docs/button/index.html");
//! assert_eq!(rewrite_uri("/css/app.css"), "/css/app.css");
//! ```

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

const INDEX_DOCUMENT: &str = "index.html";

/// Rewrite a request URI.
///
/// - ends with `/`: append `index.html`
/// - last character not `/` and no `.` anywhere: append `/index.html`
/// - anything else is returned unchanged, without allocating
pub fn rewrite_uri(uri: &str) -> Cow<'_, str> {
    if uri.ends_with('/') {
        Cow::Owned(format!("{uri}{INDEX_DOCUMENT}"))
    } else if !uri.contains('.') {
        Cow::Owned(format!("{uri}/{INDEX_DOCUMENT}"))
    } else {
        Cow::Borrowed(uri)
    }
}

/// The request record handed to a viewer-request function.
///
/// Only `uri` is interpreted; method, headers, querystring and anything else
/// pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerRequest {
    pub uri: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Event delivered to a viewer-request function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeEvent {
    pub request: ViewerRequest,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Run the function: return the request with its URI rewritten.
pub fn handle(event: EdgeEvent) -> ViewerRequest {
    let mut request = event.request;
    if let Cow::Owned(rewritten) = rewrite_uri(&request.uri) {
        request.uri = rewritten;
    }
    request
}
