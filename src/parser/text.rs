use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Remove every `<...>` tag from an HTML fragment and decode the handful of
/// entities the serializer emits. Whitespace is left untouched.
pub fn strip_tags(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, "");
    decode_entities(&stripped)
}

/// Strip markup, then trim surrounding whitespace.
pub fn clean(html: &str) -> String {
    strip_tags(html).trim().to_string()
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
