//! Request-context records produced by the browser-API adapter

use serde::{Deserialize, Serialize};

/// Classified request type, the shape the filtering engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    Document,
    Subdocument,
    Script,
    Stylesheet,
    Object,
    Image,
    Xmlhttprequest,
    Media,
    Font,
    Websocket,
    Other,
}

/// A single HTTP header as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

/// Event payload in the host's own shape, before normalization.
#[derive(Debug, Clone)]
pub struct RawRequestDetails {
    pub url: String,
    pub tab_id: i64,
    pub frame_id: i64,
    pub parent_frame_id: i64,
    /// Host-reported type string, e.g. "main_frame" or "stylesheet".
    pub kind: String,
    pub request_headers: Option<Vec<HttpHeader>>,
    pub response_headers: Option<Vec<HttpHeader>>,
}

/// The uniform request-context record handed to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDetails {
    pub request_url: String,
    pub tab_id: i64,
    /// Id of this frame (main_frame and sub_frame requests only).
    pub frame_id: i64,
    /// Id of the frame the request is executed in.
    pub request_frame_id: i64,
    pub request_type: RequestType,
    pub request_headers: Option<Vec<HttpHeader>>,
    pub response_headers: Option<Vec<HttpHeader>>,
}

/// Raw webNavigation target-creation payload.
#[derive(Debug, Clone)]
pub struct RawNavigationTarget {
    pub tab_id: i64,
    pub source_tab_id: i64,
    pub url: String,
}

/// Normalized navigation-target record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    pub tab_id: i64,
    pub source_tab_id: i64,
    pub url: String,
}
