//! Parser for F5Bot notification emails.
//!
//! F5Bot rewrites every outbound link through `https://f5bot.com/url?u=<encoded>`, so the
//! destination Reddit permalink is recovered by decoding that parameter. Direct Reddit links are
//! used when no redirect link is present. The post/comment ids come from the permalink and the
//! text handed to the relevance check is scraped from the mail body on a best-effort basis.

use regex::{Captures, Regex};
use replybot_core::ParsedReference;
use std::borrow::Cow;
use tracing::debug;
use url::Url;

#[cfg(test)]
mod tests;

const CONTENT_WINDOW_CHARS: usize = 2000;
const FALLBACK_BODY_CHARS: usize = 500;
const MIN_STANDALONE_CONTENT_CHARS: usize = 50;
const MAX_COMMENT_ID_LEN: usize = 20;

/// Phrases that open F5Bot's promotional footer. Everything from the first one on is dropped.
pub const FOOTER_MARKERS: &[&str] = &[
    "Do you have comments",
    "RedPulse.io",
    "Want to advertise",
    "You are receiving",
    "IMPROVE YOUR AI SEARCH",
    "LaunchClub.ai",
];

/// Heuristic for the path segment that follows a permalink's title slug.
///
/// Reddit comment ids are short base36 strings while slugs are long and hyphenated. This is a
/// guess about the upstream URL format, not a guarantee, so keep every caller going through here.
pub fn looks_like_comment_id(segment: &str) -> bool {
    !segment.is_empty()
        && segment.len() < MAX_COMMENT_ID_LEN
        && !segment.contains('-')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Decode the `u` parameter of a redirect link. Undecodable input is returned unchanged.
pub fn decode_redirect_param(encoded: &str) -> String {
    urlencoding::decode(encoded)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| encoded.to_string())
}

pub struct NotificationParser {
    redirect_link: Regex,
    direct_link: Regex,
    permalink: Regex,
    footer: Regex,
    quoted_title: Regex,
    line_title: Regex,
    inline_url: Regex,
    email_address: Regex,
    blank_lines: Regex,
    qp_marker: Regex,
    qp_soft_break: Regex,
    qp_escape: Regex,
}

impl NotificationParser {
    pub fn new() -> Self {
        let footer_alternation = FOOTER_MARKERS
            .iter()
            .map(|marker| regex::escape(marker))
            .collect::<Vec<_>>()
            .join("|");

        Self {
            // Group 1 is the encoded destination; group 0 runs to the end of the link.
            redirect_link: Regex::new(r"https://f5bot\.com/url\?u=([^&\s]+)\S*")
                .expect("valid redirect pattern"),
            direct_link: Regex::new(r"https?://(?:www\.)?reddit\.com/r/\w+/comments/[^\s)]+")
                .expect("valid direct link pattern"),
            permalink: Regex::new(r"/r/\w+/comments/(\w+)(.*)").expect("valid permalink pattern"),
            footer: Regex::new(&format!("(?i){}", footer_alternation))
                .expect("valid footer pattern"),
            quoted_title: Regex::new(r#"Reddit Comments[^:\n]*:\s*['"]([^'"\n]+)['"]"#)
                .expect("valid quoted title pattern"),
            line_title: Regex::new(r"Reddit Comments[^:\n]*:[ \t]*([^\n]+)")
                .expect("valid line title pattern"),
            inline_url: Regex::new(r"https?://\S+").expect("valid url pattern"),
            email_address: Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
                .expect("valid email pattern"),
            blank_lines: Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").expect("valid blank line pattern"),
            qp_marker: Regex::new(r"=(?:\r?\n|3D|0A|20)").expect("valid qp marker pattern"),
            qp_soft_break: Regex::new(r"=\r?\n").expect("valid qp soft break pattern"),
            qp_escape: Regex::new(r"=([0-9A-Fa-f]{2})").expect("valid qp escape pattern"),
        }
    }

    /// Returns `None` when the body carries no usable Reddit permalink.
    pub fn parse(&self, body: &str, subject: &str) -> Option<ParsedReference> {
        let body = self.normalize_transfer_encoding(body);

        let (url, anchor_end) = match self.redirect_link.captures(&body) {
            Some(caps) => {
                let link = caps.get(0)?;
                let encoded = caps.get(1)?.as_str();
                (decode_redirect_param(encoded), Some(link.end()))
            }
            None => {
                let link = self.direct_link.find(&body)?;
                (link.as_str().to_string(), None)
            }
        };

        let Some((post_id, comment_id)) = self.extract_ids(&url) else {
            debug!("No post id in destination url {}", url);
            return None;
        };

        let mut content = self.extract_content(&body, subject, anchor_end);
        if content.trim().is_empty() {
            content = if subject.trim().is_empty() {
                url.clone()
            } else {
                subject.to_string()
            };
        }

        Some(ParsedReference {
            url,
            post_id,
            comment_id,
            content,
            subject: subject.to_string(),
        })
    }

    /// Split a Reddit permalink into `(post_id, comment_id)`.
    pub fn extract_ids(&self, url: &str) -> Option<(String, Option<String>)> {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url
                .split(|c| c == '?' || c == '#')
                .next()
                .unwrap_or(url)
                .to_string(),
        };

        let caps = self.permalink.captures(&path)?;
        let post_id = caps.get(1)?.as_str().to_string();
        let segments: Vec<&str> = caps
            .get(2)
            .map_or("", |m| m.as_str())
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        Some((post_id, comment_id_from_segments(&segments)))
    }

    fn extract_content(&self, body: &str, subject: &str, anchor_end: Option<usize>) -> String {
        let title = self.find_title(body);

        if let Some(end) = anchor_end {
            let window = take_chars(&body[end..], CONTENT_WINDOW_CHARS);
            let snippet = self.clean_snippet(window);

            let combined = match (&title, snippet.is_empty()) {
                (Some(title), false) => {
                    if snippet.to_lowercase().contains(&title.to_lowercase()) {
                        Some(snippet)
                    } else {
                        Some(format!("{}\n\n{}", title, snippet))
                    }
                }
                (None, false) if snippet.chars().count() > MIN_STANDALONE_CONTENT_CHARS => {
                    Some(snippet)
                }
                (Some(title), true) => Some(title.clone()),
                _ => None,
            };

            if let Some(content) = combined {
                return content;
            }
        }

        if let Some(title) = title {
            return title;
        }

        format!("{}\n\n{}", subject, take_chars(body, FALLBACK_BODY_CHARS))
            .trim()
            .to_string()
    }

    fn clean_snippet(&self, window: &str) -> String {
        let without_footer = match self.footer.find(window) {
            Some(m) => &window[..m.start()],
            None => window,
        };
        let without_urls = self.inline_url.replace_all(without_footer, "");
        let without_emails = self.email_address.replace_all(&without_urls, "");
        let collapsed = self.blank_lines.replace_all(&without_emails, "\n\n");
        collapsed.trim().to_string()
    }

    fn find_title(&self, body: &str) -> Option<String> {
        [&self.quoted_title, &self.line_title]
            .iter()
            .find_map(|pattern| pattern.captures(body))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|title| !title.is_empty())
    }

    /// Undo quoted-printable soft line breaks and the escapes that can safely be decoded without
    /// touching percent-encoded URLs.
    fn normalize_transfer_encoding<'a>(&self, body: &'a str) -> Cow<'a, str> {
        if !self.qp_marker.is_match(body) {
            return Cow::Borrowed(body);
        }

        let joined = self.qp_soft_break.replace_all(body, "");
        let decoded = self.qp_escape.replace_all(&joined, |caps: &Captures| {
            u8::from_str_radix(&caps[1], 16)
                .ok()
                .filter(|b| matches!(*b, b'\t' | b'\n' | b'\r' | 0x20..=0x7e))
                .map(|b| (b as char).to_string())
                .unwrap_or_else(|| caps[0].to_string())
        });
        Cow::Owned(decoded.into_owned())
    }
}

impl Default for NotificationParser {
    fn default() -> Self {
        Self::new()
    }
}

/// `segments` is the permalink path after the post id: `[slug, "c", id]`, `["c", id]`,
/// `[slug, id]` or just `[slug]`.
fn comment_id_from_segments(segments: &[&str]) -> Option<String> {
    for marker in 0..2 {
        if segments.get(marker) == Some(&"c") {
            let id = segments.get(marker + 1).map(|s| word_prefix(s)).unwrap_or("");
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }

    match segments.get(1) {
        Some(&"c") => None,
        Some(segment) if looks_like_comment_id(segment) => Some(segment.to_string()),
        _ => None,
    }
}

fn word_prefix(s: &str) -> &str {
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len());
    &s[..end]
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
