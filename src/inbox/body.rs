//! Body extraction: pick the best representation of a stored message and
//! normalize it into markup the rule engine can parse.

use std::sync::LazyLock;

use mail_parser::MessageParser;
use regex::Regex;

use super::payload::{Headers, StoredMessage, header};

static MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(!doctype|/?[a-z][a-z0-9]*)(\s[^<>]*)?/?>").expect("static regex")
});

/// Extract the normalized body of a message.
///
/// Precedence: an HTML MIME part, the message-level `Body`, the raw
/// `Content.Body`, then plain text (wrapped into minimal HTML). Returns an
/// empty string when the message carries no content at all.
pub fn normalized_body(message: &StoredMessage) -> String {
    let parts = message.leaf_parts();

    if let Some(html) = parts
        .iter()
        .find(|p| content_type_is(p.headers.as_ref(), "text/html"))
        .and_then(|p| non_empty(p.body.as_deref()).map(|body| decode_part(p.headers.as_ref(), body)))
    {
        return unescape_transport(&html);
    }

    let top_headers = message.headers();
    let top_is_plain = content_type_is(top_headers, "text/plain");

    if let Some(body) = non_empty(message.body.as_deref()) {
        return as_markup(&unescape_transport(body), top_is_plain);
    }

    let is_multipart = header(top_headers, "Content-Type")
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("multipart/"));
    if !is_multipart
        && let Some(body) = non_empty(message.content.as_ref().and_then(|c| c.body.as_deref()))
    {
        let decoded = decode_part(top_headers, body);
        return as_markup(&unescape_transport(&decoded), top_is_plain);
    }

    if let Some(text) = parts
        .iter()
        .find(|p| content_type_is(p.headers.as_ref(), "text/plain"))
        .and_then(|p| non_empty(p.body.as_deref()).map(|body| decode_part(p.headers.as_ref(), body)))
    {
        return wrap_plain_text(&unescape_transport(&text));
    }

    String::new()
}

/// Decode a header value that may carry RFC 2047 encoded words.
pub fn decode_subject(raw: &str) -> String {
    if !raw.contains("=?") {
        return raw.to_string();
    }
    let synthetic = format!("Subject: {raw}\r\n\r\n");
    MessageParser::default()
        .parse(synthetic.as_bytes())
        .and_then(|m| m.subject().map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
}

/// Undo backslash escapes that leak through the store's JSON encoding.
///
/// Handles `\r`, `\n`, `\t` and `\"`; a single pass, so `\\n` stays literal
/// after its first backslash.
pub fn unescape_transport(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let replacement = match chars.peek() {
            Some('n') => Some('\n'),
            Some('r') => Some('\r'),
            Some('t') => Some('\t'),
            Some('"') => Some('"'),
            _ => None,
        };
        match replacement {
            Some(r) => {
                out.push(r);
                chars.next();
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Wrap plain text into a minimal HTML document, keeping line breaks.
pub fn wrap_plain_text(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let lines: Vec<String> = normalized.trim().lines().map(escape_html).collect();
    format!("<html><body><p>{}</p></body></html>", lines.join("<br>\n"))
}

/// Whether the text contains at least one markup tag.
pub fn looks_like_html(text: &str) -> bool {
    MARKUP_TAG.is_match(text)
}

fn as_markup(body: &str, declared_plain: bool) -> String {
    if declared_plain || !looks_like_html(body) {
        wrap_plain_text(body)
    } else {
        body.to_string()
    }
}

fn escape_html(line: &str) -> String {
    line.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn non_empty(body: Option<&str>) -> Option<&str> {
    body.filter(|b| !b.trim().is_empty())
}

fn content_type_is(headers: Option<&Headers>, mime: &str) -> bool {
    header(headers, "Content-Type").is_some_and(|ct| {
        ct.split(';')
            .next()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(mime))
    })
}

/// Apply the part's transfer encoding (quoted-printable, base64).
///
/// Unencoded parts and parts that fail to decode are returned as-is.
fn decode_part(headers: Option<&Headers>, body: &str) -> String {
    let Some(encoding) = header(headers, "Content-Transfer-Encoding") else {
        return body.to_string();
    };
    let encoding = encoding.trim().to_ascii_lowercase();
    if encoding != "quoted-printable" && encoding != "base64" {
        return body.to_string();
    }

    let content_type = header(headers, "Content-Type").unwrap_or("text/plain; charset=utf-8");
    let synthetic = format!(
        "Content-Type: {content_type}\r\nContent-Transfer-Encoding: {encoding}\r\n\r\n{body}"
    );
    let Some(parsed) = MessageParser::default().parse(synthetic.as_bytes()) else {
        return body.to_string();
    };

    let decoded = if content_type_is(headers, "text/html") {
        parsed.body_html(0)
    } else {
        parsed.body_text(0)
    };
    decoded
        .map(|d| d.into_owned())
        .unwrap_or_else(|| body.to_string())
}
