//! Outgoing RFC 2822 messages for `users.messages.send`.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use replybot_core::OutgoingEmail;

const LINE_LENGTH: usize = 76;

/// RFC 2047 encoded-word for non-ASCII header values.
pub fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}

fn encode_body(text: &str) -> String {
    let encoded = STANDARD.encode(text);
    // Base64 output is ASCII, so byte chunks are valid UTF-8.
    encoded
        .as_bytes()
        .chunks(LINE_LENGTH)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn text_part(subtype: &str, body: &str) -> String {
    format!(
        "Content-Type: text/{}; charset=\"utf-8\"\r\n\
         Content-Transfer-Encoding: base64\r\n\r\n\
         {}\r\n",
        subtype,
        encode_body(body)
    )
}

/// Render `email` addressed to `to`. A message with an HTML body becomes
/// `multipart/alternative` with the plain text first.
pub fn build_message(email: &OutgoingEmail, to: &str, boundary: &str) -> String {
    let mut message = format!(
        "To: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\n",
        to,
        encode_header(&email.subject)
    );

    match email.body_html.as_deref() {
        Some(html) => {
            message.push_str(&format!(
                "Content-Type: multipart/alternative; boundary=\"{}\"\r\n\r\n",
                boundary
            ));
            message.push_str(&format!("--{}\r\n", boundary));
            message.push_str(&text_part("plain", &email.body_text));
            message.push_str(&format!("--{}\r\n", boundary));
            message.push_str(&text_part("html", html));
            message.push_str(&format!("--{}--\r\n", boundary));
        }
        None => message.push_str(&text_part("plain", &email.body_text)),
    }

    message
}

/// The `raw` field of a send request.
pub fn encode_raw(message: &str) -> String {
    URL_SAFE.encode(message)
}
