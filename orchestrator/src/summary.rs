//! The run report and the summary mail rendered from it.

use chrono::{DateTime, Local};
use replybot_core::{LedgerStats, OutgoingEmail, SummaryConfig};
use std::fmt::Write as _;

const PREVIEW_CHARS: usize = 150;
const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedReply {
    pub original_url: String,
    pub comment_url: String,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub message_id: String,
    /// Permalink of the item, when the message got far enough to have one.
    pub url: Option<String>,
    pub error: String,
}

impl RunFailure {
    /// What the summary shows in place of a link.
    pub fn location(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("message {}", self.message_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Local>,
    pub processed: u64,
    pub relevant: u64,
    pub posted: u64,
    pub posted_replies: Vec<PostedReply>,
    pub failures: Vec<RunFailure>,
    pub lifetime: LedgerStats,
}

impl RunReport {
    pub fn new(run_id: String, started_at: DateTime<Local>) -> Self {
        Self {
            run_id,
            started_at,
            processed: 0,
            relevant: 0,
            posted: 0,
            posted_replies: Vec::new(),
            failures: Vec::new(),
            lifetime: LedgerStats::default(),
        }
    }

    pub fn errors(&self) -> usize {
        self.failures.len()
    }
}

/// First 150 characters, with `...` when the reply was longer.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn subject(report: &RunReport) -> String {
    format!(
        "Reddit Bot Summary - {}",
        report.started_at.format("%Y-%m-%d %H:%M")
    )
}

pub fn render_text(report: &RunReport, bot_name: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let thin_rule = "-".repeat(RULE_WIDTH);
    let mut body = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(body, "{} - Execution Summary", bot_name);
    let _ = writeln!(body, "{}\n", rule);
    let _ = writeln!(
        body,
        "Run Time: {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(body, "This Run:");
    let _ = writeln!(body, "  • Emails processed: {}", report.processed);
    let _ = writeln!(body, "  • Relevant posts found: {}", report.relevant);
    let _ = writeln!(body, "  • Responses posted: {}", report.posted);
    let _ = writeln!(body, "  • Errors: {}\n", report.errors());

    if !report.posted_replies.is_empty() {
        let _ = writeln!(body, "Posted Comments:");
        let _ = writeln!(body, "{}", thin_rule);
        for (i, reply) in report.posted_replies.iter().enumerate() {
            let _ = writeln!(body, "\n{}. Original Post/Comment: {}", i + 1, reply.original_url);
            let _ = writeln!(body, "   Your Response: {}", reply.comment_url);
            let _ = writeln!(body, "   Preview: {}", reply.preview);
        }
        body.push('\n');
    }

    if !report.failures.is_empty() {
        let _ = writeln!(body, "Errors:");
        let _ = writeln!(body, "{}", thin_rule);
        for (i, failure) in report.failures.iter().enumerate() {
            let _ = writeln!(body, "\n{}. URL: {}", i + 1, failure.location());
            let _ = writeln!(body, "   Error: {}", failure.error);
        }
        body.push('\n');
    }

    let _ = writeln!(body, "\nAll-Time Stats:");
    let _ = writeln!(body, "  • Total processed: {}", report.lifetime.total_processed);
    let _ = writeln!(body, "  • Total relevant: {}", report.lifetime.relevant);
    let _ = writeln!(
        body,
        "  • Total responses posted: {}\n",
        report.lifetime.responses_posted
    );
    let _ = writeln!(body, "{}", rule);
    body
}

const HTML_STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; }
        h2 { color: #333; }
        .stats { background-color: #f4f4f4; padding: 15px; border-radius: 5px; margin: 10px 0; }
        .stat-item { margin: 5px 0; }
        .comment { background-color: #e8f4f8; padding: 10px; margin: 10px 0; border-left: 3px solid #2196F3; }
        .error { background-color: #ffebee; padding: 10px; margin: 10px 0; border-left: 3px solid #f44336; }
        a { color: #2196F3; text-decoration: none; }
        a:hover { text-decoration: underline; }";

fn html_link(url: &str) -> String {
    let url = escape_html(url);
    format!("<a href=\"{0}\" target=\"_blank\">{0}</a>", url)
}

fn html_stat(label: &str, value: impl std::fmt::Display) -> String {
    format!(
        "        <div class=\"stat-item\">• {}: <strong>{}</strong></div>\n",
        label, value
    )
}

pub fn render_html(report: &RunReport, bot_name: &str) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<html>\n<head>\n    <style>\n        {}\n    </style>\n</head>\n<body>\n",
        HTML_STYLE
    );
    let _ = writeln!(html, "    <h2>{} - Execution Summary</h2>", escape_html(bot_name));
    let _ = writeln!(
        html,
        "    <p><strong>Run Time:</strong> {}</p>",
        report.started_at.format("%Y-%m-%d %H:%M:%S")
    );

    html.push_str("    <div class=\"stats\">\n        <h3>This Run:</h3>\n");
    html.push_str(&html_stat("Emails processed", report.processed));
    html.push_str(&html_stat("Relevant posts found", report.relevant));
    html.push_str(&html_stat("Responses posted", report.posted));
    html.push_str(&html_stat("Errors", report.errors()));
    html.push_str("    </div>\n");

    if !report.posted_replies.is_empty() {
        html.push_str("    <h3>Posted Comments:</h3>\n");
        for (i, reply) in report.posted_replies.iter().enumerate() {
            let _ = write!(
                html,
                "    <div class=\"comment\">\n\
                 \x20       <p><strong>{}. Original Post/Comment:</strong><br>\n        {}</p>\n\
                 \x20       <p><strong>Your Response:</strong><br>\n        {}</p>\n\
                 \x20       <p><strong>Preview:</strong> {}</p>\n\
                 \x20   </div>\n",
                i + 1,
                html_link(&reply.original_url),
                html_link(&reply.comment_url),
                escape_html(&reply.preview)
            );
        }
    }

    if !report.failures.is_empty() {
        html.push_str("    <h3>Errors:</h3>\n");
        for (i, failure) in report.failures.iter().enumerate() {
            let location = match &failure.url {
                Some(url) => html_link(url),
                None => escape_html(&failure.location()),
            };
            let _ = write!(
                html,
                "    <div class=\"error\">\n\
                 \x20       <p><strong>{}. URL:</strong> {}</p>\n\
                 \x20       <p><strong>Error:</strong> {}</p>\n\
                 \x20   </div>\n",
                i + 1,
                location,
                escape_html(&failure.error)
            );
        }
    }

    html.push_str("    <div class=\"stats\">\n        <h3>All-Time Stats:</h3>\n");
    html.push_str(&html_stat("Total processed", report.lifetime.total_processed));
    html.push_str(&html_stat("Total relevant", report.lifetime.relevant));
    html.push_str(&html_stat(
        "Total responses posted",
        report.lifetime.responses_posted,
    ));
    html.push_str("    </div>\n</body>\n</html>\n");
    html
}

/// The summary mail for `report`. An unset recipient goes to the mailbox owner.
pub fn build_email(report: &RunReport, config: &SummaryConfig) -> OutgoingEmail {
    OutgoingEmail {
        to: config.recipient.clone().unwrap_or_default(),
        subject: subject(report),
        body_text: render_text(report, &config.bot_name),
        body_html: Some(render_html(report, &config.bot_name)),
    }
}
