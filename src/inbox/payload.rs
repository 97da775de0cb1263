//! Wire types for the message store's listing endpoint (MailHog v2 shape).

use std::collections::HashMap;

use serde::Deserialize;

/// MIME headers: name → values.
pub type Headers = HashMap<String, Vec<String>>;

/// Response of the message-listing endpoint, newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub items: Vec<StoredMessage>,
}

/// A single stored message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoredMessage {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default, rename = "MIME")]
    pub mime: Option<Mime>,
    /// Some stores expose a decoded body directly on the message.
    #[serde(default)]
    pub body: Option<String>,
}

/// Top-level headers and raw body of a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Content {
    #[serde(default)]
    pub headers: Option<Headers>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, rename = "MIME")]
    pub mime: Option<Mime>,
}

/// Multi-part structure of a message or of a nested part.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Mime {
    #[serde(default)]
    pub parts: Option<Vec<MimePart>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MimePart {
    #[serde(default)]
    pub headers: Option<Headers>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, rename = "MIME")]
    pub mime: Option<Mime>,
}

/// Case-insensitive lookup of the first value of a header.
pub fn header<'a>(headers: Option<&'a Headers>, name: &str) -> Option<&'a str> {
    headers?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

impl StoredMessage {
    pub fn headers(&self) -> Option<&Headers> {
        self.content.as_ref().and_then(|c| c.headers.as_ref())
    }

    /// Leaf MIME parts in document order, from whichever MIME tree is present.
    pub fn leaf_parts(&self) -> Vec<&MimePart> {
        let root = self
            .mime
            .as_ref()
            .or_else(|| self.content.as_ref().and_then(|c| c.mime.as_ref()));
        let mut leaves = Vec::new();
        if let Some(mime) = root {
            collect_leaves(mime, &mut leaves);
        }
        leaves
    }
}

fn collect_leaves<'a>(mime: &'a Mime, out: &mut Vec<&'a MimePart>) {
    for part in mime.parts.iter().flatten() {
        match part.mime.as_ref() {
            Some(nested) if nested.parts.as_ref().is_some_and(|p| !p.is_empty()) => {
                collect_leaves(nested, out);
            }
            _ => out.push(part),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mailhog_listing() {
        let json = r#"{
            "total": 1, "count": 1, "start": 0,
            "items": [{
                "ID": "abc@mailhog.example",
                "Content": {
                    "Headers": {"Subject": ["Hello"], "Content-Type": ["multipart/alternative; boundary=x"]},
                    "Body": "--x...",
                    "Size": 10,
                    "MIME": null
                },
                "MIME": {"Parts": [
                    {"Headers": {"Content-Type": ["text/plain"]}, "Body": "hi", "MIME": null},
                    {"Headers": {"Content-Type": ["multipart/related"]}, "Body": "", "MIME": {"Parts": [
                        {"Headers": {"Content-Type": ["text/html"]}, "Body": "<p>hi</p>", "MIME": null}
                    ]}}
                ]}
            }]
        }"#;
        let list: MessageList = serde_json::from_str(json).unwrap();
        let message = &list.items[0];
        assert_eq!(message.id, "abc@mailhog.example");
        assert_eq!(header(message.headers(), "subject"), Some("Hello"));

        let leaves = message.leaf_parts();
        assert_eq!(leaves.len(), 2);
        assert_eq!(header(leaves[1].headers.as_ref(), "content-type"), Some("text/html"));
    }

    #[test]
    fn empty_listing_has_no_items() {
        let list: MessageList = serde_json::from_str(r#"{"total":0,"count":0,"start":0,"items":[]}"#).unwrap();
        assert!(list.items.is_empty());
    }
}
