//! Relevance checks and reply drafting backed by a text-generation model.

use replybot_core::{CoreError, RelevanceVerdict};

mod gemini;

pub use gemini::GeminiOracle;

#[cfg(test)]
mod tests;

/// Words that start the model's verdict line, longest first so `RELEVANT` never shadows the
/// negative forms.
const VERDICT_PREFIXES: &[&str] = &["NOT_RELEVANT", "NOT RELEVANT", "NOT-RELEVANT", "RELEVANT"];

pub trait Oracle {
    async fn check_relevance(&self, text: &str) -> Result<RelevanceVerdict, CoreError>;

    /// Draft a reply for `text`. `source_url` identifies the thread being answered.
    async fn generate_response(&self, text: &str, source_url: &str) -> Result<String, CoreError>;
}

/// Interpret a raw relevance answer.
///
/// The answer is relevant only when it starts with `RELEVANT` (any case). The explanation is
/// everything after the first line, or what follows the verdict word on a one-line answer.
pub fn parse_relevance(raw: &str) -> RelevanceVerdict {
    let text = raw.trim();
    let relevant = text
        .get(..8)
        .is_some_and(|head| head.eq_ignore_ascii_case("RELEVANT"));

    let explanation = match text.split_once('\n') {
        Some((_, rest)) => rest.trim().to_string(),
        None => {
            let verdict_len = VERDICT_PREFIXES
                .iter()
                .find(|prefix| {
                    text.get(..prefix.len())
                        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
                })
                .map_or(0, |prefix| prefix.len());
            text[verdict_len..]
                .trim_start_matches(|c: char| c == ':' || c == '-' || c == '.' || c.is_whitespace())
                .trim_end()
                .to_string()
        }
    };

    RelevanceVerdict {
        relevant,
        explanation,
    }
}

/// The calculator link when `text` asks for numbers, otherwise the learning page.
pub fn choose_link<'a>(
    text: &str,
    calculator_keywords: &[String],
    calculator_url: &'a str,
    learn_url: &'a str,
) -> &'a str {
    let lowered = text.to_lowercase();
    if calculator_keywords
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()))
    {
        calculator_url
    } else {
        learn_url
    }
}

pub fn build_relevance_prompt(relevance_prompt: &str, text: &str) -> String {
    format!("{}\n\nPost/Comment content:\n{}", relevance_prompt, text)
}

pub fn build_response_prompt(
    template: &str,
    text: &str,
    calculator_url: &str,
    learn_url: &str,
    chosen_url: &str,
) -> String {
    let prompt = template
        .replace("{calculator_url}", calculator_url)
        .replace("{learn_url}", learn_url)
        // Last, so braces inside the post text are never treated as placeholders.
        .replace("{post_content}", text);
    format!("{}\n\nUse this URL: {}", prompt, chosen_url)
}
