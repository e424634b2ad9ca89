//! Gmail `format=full` message payloads and plain-text extraction.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub snippet: String,
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    pub data: Option<String>,
}

impl MessagePart {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn decoded_data(&self) -> Option<String> {
        self.body
            .as_ref()
            .and_then(|body| body.data.as_deref())
            .and_then(decode_base64url)
    }

    fn has_mime(&self, mime: &str) -> bool {
        self.mime_type.eq_ignore_ascii_case(mime)
    }
}

/// Gmail emits URL-safe base64, sometimes padded.
pub fn decode_base64url(data: &str) -> Option<String> {
    URL_SAFE_NO_PAD
        .decode(data.trim().trim_end_matches('='))
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Reduces HTML bodies to readable text.
pub struct HtmlToText {
    hidden_blocks: Regex,
    line_breaks: Regex,
    tags: Regex,
    numeric_entity: Regex,
    blank_lines: Regex,
}

impl HtmlToText {
    pub fn new() -> Self {
        Self {
            hidden_blocks: Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<head\b.*?</head\s*>")
                .expect("valid hidden block pattern"),
            line_breaks: Regex::new(r"(?i)<br\s*/?>|</(?:p|div|tr|li|h[1-6]|table)\s*>")
                .expect("valid line break pattern"),
            tags: Regex::new(r"<[^>]*>").expect("valid tag pattern"),
            numeric_entity: Regex::new(r"&#(x[0-9A-Fa-f]+|[0-9]+);")
                .expect("valid entity pattern"),
            blank_lines: Regex::new(r"\n[ \t\r]*(?:\n[ \t\r]*)+").expect("valid blank line pattern"),
        }
    }

    pub fn convert(&self, html: &str) -> String {
        let text = self.hidden_blocks.replace_all(html, "");
        let text = self.line_breaks.replace_all(&text, "\n");
        let text = self.tags.replace_all(&text, "");
        let text = self.numeric_entity.replace_all(&text, |caps: &regex::Captures| {
            let raw = &caps[1];
            let code = match raw.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => raw.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        });
        let text = text
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            // Last, so "&amp;lt;" stays "&lt;".
            .replace("&amp;", "&");

        let text = self.blank_lines.replace_all(&text, "\n\n");
        text.lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

impl Default for HtmlToText {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the MIME tree and return its readable text.
///
/// Inside `multipart/alternative` the `text/plain` rendition wins; other multiparts concatenate
/// their readable children.
pub fn extract_text(part: &MessagePart, html: &HtmlToText) -> Option<String> {
    if part.has_mime("text/plain") {
        return part.decoded_data().filter(|text| !text.trim().is_empty());
    }
    if part.has_mime("text/html") {
        return part
            .decoded_data()
            .map(|markup| html.convert(&markup))
            .filter(|text| !text.is_empty());
    }
    if part.parts.is_empty() {
        return None;
    }

    if part.has_mime("multipart/alternative") {
        let plain = part
            .parts
            .iter()
            .filter(|p| p.has_mime("text/plain"))
            .find_map(|p| extract_text(p, html));
        return plain.or_else(|| part.parts.iter().find_map(|p| extract_text(p, html)));
    }

    let texts: Vec<String> = part
        .parts
        .iter()
        .filter_map(|p| extract_text(p, html))
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}
