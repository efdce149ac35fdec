//! Canonical Chrome header tables, keyed by resource type, built from a
//! [`SessionIdentity`]. Installed by the render state machine's
//! request-interception hook (§4.5) so every sub-resource fetch looks like
//! it came from a real browser with this identity.

use crate::identity::SessionIdentity;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Document,
    Stylesheet,
    Script,
    Image,
    Other,
}

impl ResourceKind {
    fn sec_fetch_dest(&self) -> &'static str {
        match self {
            ResourceKind::Document => "document",
            ResourceKind::Stylesheet => "style",
            ResourceKind::Script => "script",
            ResourceKind::Image => "image",
            ResourceKind::Other => "empty",
        }
    }

    fn sec_fetch_mode(&self) -> &'static str {
        match self {
            ResourceKind::Document => "navigate",
            _ => "no-cors",
        }
    }
}

/// Headers that mark a request as automation-originated; always stripped.
const FORBIDDEN_HEADERS: &[&str] = &["x-requested-with", "pragma"];

/// Build the ordered header table for one outgoing request.
pub fn canonical_headers(
    identity: &SessionIdentity,
    kind: ResourceKind,
    caller_extra_headers: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    headers.insert("user-agent".to_string(), identity.user_agent.clone());
    headers.insert(
        "accept".to_string(),
        match kind {
            ResourceKind::Document => {
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8".to_string()
            }
            ResourceKind::Stylesheet => "text/css,*/*;q=0.1".to_string(),
            ResourceKind::Script => "*/*".to_string(),
            ResourceKind::Image => "image/avif,image/webp,*/*".to_string(),
            ResourceKind::Other => "*/*".to_string(),
        },
    );
    headers.insert("accept-language".to_string(), identity.languages.join(","));
    headers.insert("accept-encoding".to_string(), "gzip, deflate, br".to_string());

    if let Some(hints) = &identity.client_hints {
        headers.insert("sec-ch-ua".to_string(), hints.brands.clone());
        headers.insert("sec-ch-ua-mobile".to_string(), if hints.mobile { "?1".to_string() } else { "?0".to_string() });
        headers.insert("sec-ch-ua-platform".to_string(), format!("\"{}\"", hints.platform));
    }

    headers.insert("sec-fetch-site".to_string(), "none".to_string());
    headers.insert("sec-fetch-mode".to_string(), kind.sec_fetch_mode().to_string());
    headers.insert("sec-fetch-dest".to_string(), kind.sec_fetch_dest().to_string());
    if kind == ResourceKind::Document {
        headers.insert("sec-fetch-user".to_string(), "?1".to_string());
        headers.insert("upgrade-insecure-requests".to_string(), "1".to_string());
    }

    headers.insert("dnt".to_string(), "1".to_string());
    headers.insert("connection".to_string(), "keep-alive".to_string());
    headers.insert("cache-control".to_string(), "max-age=0".to_string());

    for (key, value) in caller_extra_headers {
        headers.insert(key.to_lowercase(), value.clone());
    }

    for forbidden in FORBIDDEN_HEADERS {
        headers.remove(*forbidden);
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::FingerprintSynthesiser;

    #[test]
    fn firefox_headers_omit_client_hints() {
        let identity = FingerprintSynthesiser::generate(
            Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0"),
            (1920, 1080),
        );
        let headers = canonical_headers(&identity, ResourceKind::Document, &BTreeMap::new());
        assert!(!headers.contains_key("sec-ch-ua"));
    }

    #[test]
    fn forbidden_headers_are_stripped_even_if_caller_supplies_them() {
        let identity = FingerprintSynthesiser::generate(None, (1920, 1080));
        let mut extra = BTreeMap::new();
        extra.insert("X-Requested-With".to_string(), "XMLHttpRequest".to_string());
        let headers = canonical_headers(&identity, ResourceKind::Document, &extra);
        assert!(!headers.contains_key("x-requested-with"));
    }
}
