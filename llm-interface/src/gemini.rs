use crate::{build_relevance_prompt, build_response_prompt, choose_link, parse_relevance, Oracle};
use replybot_core::{CoreError, LlmError, OracleConfig, RelevanceVerdict};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

const PROVIDER: &str = "gemini";

#[derive(Debug, Serialize)]
pub(crate) struct GenerateContentRequest<'a> {
    pub contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Content<'a> {
    pub parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestPart<'a> {
    pub text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, trimmed.
    pub(crate) fn into_text(self) -> Result<String, LlmError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(match self.prompt_feedback.and_then(|f| f.block_reason) {
                Some(reason) => LlmError::ContentFiltered { reason },
                None => LlmError::InvalidResponseFormat {
                    provider: PROVIDER.to_string(),
                    details: "no candidates in response".to_string(),
                },
            });
        };

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();
        let text = text.trim();

        if text.is_empty() {
            let finish_reason = candidate.finish_reason.unwrap_or_default();
            return Err(match finish_reason.as_str() {
                "SAFETY" | "RECITATION" | "BLOCKLIST" => LlmError::ContentFiltered {
                    reason: finish_reason.clone(),
                },
                _ => LlmError::InvalidResponseFormat {
                    provider: PROVIDER.to_string(),
                    details: "empty completion".to_string(),
                },
            });
        }

        Ok(text.to_string())
    }
}

/// Maps a non-success status from the generation endpoint.
pub(crate) fn status_error(status: StatusCode, model: &str, body: &str) -> CoreError {
    match status.as_u16() {
        401 | 403 => LlmError::InvalidApiKey {
            provider: PROVIDER.to_string(),
        }
        .into(),
        // Gemini reports a bad key as 400 INVALID_ARGUMENT.
        400 if body.contains("API_KEY_INVALID") || body.contains("API key not valid") => {
            LlmError::InvalidApiKey {
                provider: PROVIDER.to_string(),
            }
            .into()
        }
        404 => LlmError::ModelNotAvailable {
            model: model.to_string(),
        }
        .into(),
        429 => LlmError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
        }
        .into(),
        code if status.is_server_error() => LlmError::ServiceUnavailable {
            provider: PROVIDER.to_string(),
            status_code: code,
        }
        .into(),
        code => CoreError::RequestFailed {
            message: format!("generateContent returned {}: {}", status, body.trim()),
            status_code: Some(code),
        },
    }
}

/// [`Oracle`] backed by the Gemini `generateContent` REST endpoint.
#[derive(Debug)]
pub struct GeminiOracle {
    http_client: Client,
    api_key: String,
    model: String,
    api_base: String,
    relevance_prompt: String,
    response_prompt_template: String,
    calculator_url: String,
    learn_url: String,
    calculator_keywords: Vec<String>,
}

impl GeminiOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, CoreError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::InvalidApiKey {
                provider: PROVIDER.to_string(),
            })?;

        let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        info!("Using Gemini model {}", config.model);
        Ok(Self {
            http_client,
            api_key,
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            relevance_prompt: config.relevance_prompt.clone(),
            response_prompt_template: config.response_prompt_template.clone(),
            calculator_url: config.calculator_url.clone(),
            learn_url: config.learn_url.clone(),
            calculator_keywords: config.calculator_keywords.clone(),
        })
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    async fn generate(&self, prompt: &str) -> Result<String, CoreError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!("Calling {} ({} prompt chars)", self.model, prompt.len());
        let response = self
            .http_client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini request failed: {}", e);
                if e.is_timeout() {
                    CoreError::Llm(LlmError::RequestTimeout {
                        provider: PROVIDER.to_string(),
                    })
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Gemini returned {} for model {}", status, self.model);
            return Err(status_error(status, &self.model, &body));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
                details: e.to_string(),
            }
        })?;

        Ok(parsed.into_text()?)
    }
}

impl Oracle for GeminiOracle {
    async fn check_relevance(&self, text: &str) -> Result<RelevanceVerdict, CoreError> {
        let prompt = build_relevance_prompt(&self.relevance_prompt, text);
        let raw = self.generate(&prompt).await?;
        let verdict = parse_relevance(&raw);
        debug!("Relevance verdict: {}", verdict.relevant);
        Ok(verdict)
    }

    async fn generate_response(&self, text: &str, source_url: &str) -> Result<String, CoreError> {
        let chosen = choose_link(
            text,
            &self.calculator_keywords,
            &self.calculator_url,
            &self.learn_url,
        );
        debug!("Drafting reply for {} linking {}", source_url, chosen);

        let prompt = build_response_prompt(
            &self.response_prompt_template,
            text,
            &self.calculator_url,
            &self.learn_url,
            chosen,
        );
        self.generate(&prompt).await
    }
}
