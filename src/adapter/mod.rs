//! Browser-API adapter: host event payloads -> uniform request records

use crate::models::{
    NavigationTarget, RawNavigationTarget, RawRequestDetails, RequestDetails, RequestType,
};

impl RequestType {
    /// Map the host's type string; anything unrecognized classifies as
    /// Other and gets a second chance from the URL path.
    fn from_host(kind: &str) -> Self {
        match kind {
            "stylesheet" => Self::Stylesheet,
            "script" => Self::Script,
            "image" => Self::Image,
            "object" => Self::Object,
            "xmlhttprequest" => Self::Xmlhttprequest,
            "media" => Self::Media,
            "font" => Self::Font,
            "websocket" => Self::Websocket,
            _ => Self::Other,
        }
    }
}

/// Classify a request by the URL path's final extension. Hosts report a
/// generic type for plugin and media loads; the extension is the only
/// signal left.
pub fn content_type_from_path(path: &str) -> Option<RequestType> {
    let pos = path.rfind('.')?;
    let ext = path[pos + 1..].to_ascii_lowercase();
    if ext.is_empty() || ext.contains('/') {
        return None;
    }
    match ext.as_str() {
        "jar" | "swf" => Some(RequestType::Object),
        "mp4" | "flv" | "avi" | "m3u" | "webm" | "mpeg" | "3gp" | "3gpp" | "3g2" | "3gpp2"
        | "ogg" | "mov" | "qt" => Some(RequestType::Media),
        "ttf" | "otf" | "woff" | "woff2" | "eot" => Some(RequestType::Font),
        "ico" | "png" | "gif" | "jpg" | "jpeg" | "webp" => Some(RequestType::Image),
        _ => None,
    }
}

/// Path component of a URL, without query or fragment.
fn url_path(url: &str) -> &str {
    let after_scheme = match url.find("://") {
        Some(pos) => &url[pos + 3..],
        None => url,
    };
    let path = match after_scheme.find('/') {
        Some(pos) => &after_scheme[pos..],
        None => return "",
    };
    let end = path
        .find(['?', '#'])
        .unwrap_or(path.len());
    &path[..end]
}

/// Normalize a raw webRequest payload into the uniform request-context
/// record. Requests detached from any tab (tab id -1) are dropped.
pub fn normalize_request(raw: &RawRequestDetails) -> Option<RequestDetails> {
    if raw.tab_id == -1 {
        return None;
    }

    let mut frame_id = 0;
    let mut request_frame_id = 0;
    let request_type;

    match raw.kind.as_str() {
        "main_frame" => {
            request_type = RequestType::Document;
        }
        "sub_frame" => {
            // The wrapping frame is the parent, not the sub-frame itself.
            frame_id = raw.frame_id;
            request_frame_id = raw.parent_frame_id;
            request_type = RequestType::Subdocument;
        }
        other => {
            request_frame_id = raw.frame_id;
            request_type = RequestType::from_host(other);
        }
    }

    // Requests outside any frame relate to the main frame.
    if request_frame_id == -1 {
        request_frame_id = 0;
    }

    let request_type = if request_type == RequestType::Other {
        content_type_from_path(url_path(&raw.url)).unwrap_or(RequestType::Object)
    } else {
        request_type
    };

    Some(RequestDetails {
        request_url: raw.url.clone(),
        tab_id: raw.tab_id,
        frame_id,
        request_frame_id,
        request_type,
        request_headers: raw.request_headers.clone(),
        response_headers: raw.response_headers.clone(),
    })
}

/// Normalize a webNavigation target-creation payload.
pub fn normalize_navigation_target(raw: &RawNavigationTarget) -> Option<NavigationTarget> {
    if raw.tab_id == -1 {
        return None;
    }
    Some(NavigationTarget {
        tab_id: raw.tab_id,
        source_tab_id: raw.source_tab_id,
        url: raw.url.clone(),
    })
}
