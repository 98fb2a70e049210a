//! Minimal HTML/URL scraping for the simulated-browser login flow.
//!
//! Keycloak renders a login `<form>` whose `action` URL carries the session
//! parameters; after the credential POST the authorization code travels in
//! the redirect `Location` query string. Nothing here needs a full HTML
//! parser, just tolerant attribute scanning.

use std::collections::HashMap;

/// Extract the `action` URL of the first `<form>` whose method is POST.
///
/// Tag and attribute matching is case-insensitive and tolerates either
/// attribute order. The returned URL is HTML-entity-decoded.
pub fn extract_form_action(html: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with the original.
    let lower = html.to_ascii_lowercase();
    let mut at = 0;

    while let Some(rel) = lower[at..].find("<form") {
        let start = at + rel;
        let close = match lower[start..].find('>') {
            Some(off) => start + off,
            None => return None,
        };
        let attrs = parse_attributes(&html[start..close]);
        if attrs
            .get("method")
            .is_some_and(|m| m.eq_ignore_ascii_case("post"))
        {
            if let Some(action) = attrs.get("action") {
                return Some(decode_entities(action));
            }
        }
        at = close + 1;
    }
    None
}

/// Return the `code` query parameter of a redirect URL, if present and
/// non-empty. Relative URLs are tolerated.
pub fn extract_code_from_redirect(url: &str) -> Option<String> {
    let base = reqwest::Url::parse("https://localhost/").ok()?;
    let parsed = reqwest::Url::parse(url).or_else(|_| base.join(url)).ok()?;
    parsed
        .query_pairs()
        .find(|(key, value)| key == "code" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Scan `name="value"` pairs out of a tag body. Attribute names are
/// lowercased; unquoted and bare attributes are accepted.
fn parse_attributes(tag: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let bytes = tag.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && is_attr_name_byte(bytes[i]) {
            i += 1;
        }
        if i == name_start {
            i += 1;
            continue;
        }
        let name = tag[name_start..i].to_ascii_lowercase();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            attrs.insert(name, String::new());
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let value = if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
            let quote = bytes[i];
            i += 1;
            let value_start = i;
            while i < bytes.len() && bytes[i] != quote {
                i += 1;
            }
            let value = &tag[value_start..i];
            if i < bytes.len() {
                i += 1;
            }
            value
        } else {
            let value_start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            &tag[value_start..i]
        };
        attrs.insert(name, value.to_string());
    }
    attrs
}

fn is_attr_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

/// Decode the named entities Keycloak emits in action URLs plus numeric
/// character references.
fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if let Some(end) = rest.find(';') {
            let decoded = match &rest[1..end] {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                entity => entity.strip_prefix('#').and_then(|num| {
                    let code_point = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code_point.and_then(char::from_u32)
                }),
            };
            if let Some(ch) = decoded {
                out.push(ch);
                rest = &rest[end + 1..];
                continue;
            }
        }
        out.push('&');
        rest = &rest[1..];
    }
    out.push_str(rest);
    out
}
