#[cfg(test)]
mod tests {
    use crate::gemini::{status_error, GenerateContentResponse};
    use crate::{
        build_relevance_prompt, build_response_prompt, choose_link, parse_relevance, GeminiOracle,
    };
    use replybot_core::{CoreError, LlmError, OracleConfig, DEFAULT_CALCULATOR_KEYWORDS};
    use reqwest::StatusCode;

    const CALC: &str = "https://debt-recycler.aufintools.com";
    const LEARN: &str = "https://debt-recycler.aufintools.com/learn";

    fn keywords() -> Vec<String> {
        DEFAULT_CALCULATOR_KEYWORDS
            .iter()
            .map(|k| k.to_string())
            .collect()
    }

    fn config_with_key(key: Option<&str>) -> OracleConfig {
        OracleConfig {
            api_key: key.map(str::to_string),
            ..OracleConfig::default()
        }
    }

    #[test]
    fn test_relevant_with_explanation_on_next_line() {
        let verdict = parse_relevance("RELEVANT\nThey are asking how debt recycling works.\n");
        assert!(verdict.relevant);
        assert_eq!(verdict.explanation, "They are asking how debt recycling works.");
    }

    #[test]
    fn test_not_relevant_is_never_relevant() {
        for answer in ["NOT_RELEVANT\nOff topic.", "not relevant: off topic", "Not-Relevant"] {
            assert!(!parse_relevance(answer).relevant, "{answer}");
        }
    }

    #[test]
    fn test_single_line_explanation_follows_verdict() {
        let verdict = parse_relevance("relevant: mentions splitting an investment loan");
        assert!(verdict.relevant);
        assert_eq!(verdict.explanation, "mentions splitting an investment loan");

        let verdict = parse_relevance("NOT_RELEVANT - about US student loans");
        assert!(!verdict.relevant);
        assert_eq!(verdict.explanation, "about US student loans");

        assert_eq!(parse_relevance("RELEVANT").explanation, "");
    }

    #[test]
    fn test_unexpected_answer_is_not_relevant() {
        let verdict = parse_relevance("I think this might be relevant.");
        assert!(!verdict.relevant);
        assert_eq!(verdict.explanation, "I think this might be relevant.");
        assert!(!parse_relevance("").relevant);
    }

    #[test]
    fn test_choose_link_by_keywords() {
        let kws = keywords();
        assert_eq!(
            choose_link("How much would I save each year?", &kws, CALC, LEARN),
            CALC
        );
        assert_eq!(
            choose_link("Can someone ESTIMATE the tax benefit", &kws, CALC, LEARN),
            CALC
        );
        assert_eq!(
            choose_link("What is debt recycling in simple terms?", &kws, CALC, LEARN),
            LEARN
        );
    }

    #[test]
    fn test_response_prompt_substitutes_and_appends_url() {
        let template = "Reply to: {post_content}\nCalc: {calculator_url}\nLearn: {learn_url}";
        let prompt = build_response_prompt(template, "a {learn_url} b", CALC, LEARN, LEARN);

        assert!(prompt.starts_with("Reply to: a {learn_url} b\n"));
        assert!(prompt.contains(&format!("Calc: {}", CALC)));
        assert!(prompt.ends_with(&format!("\n\nUse this URL: {}", LEARN)));
    }

    #[test]
    fn test_relevance_prompt_layout() {
        let prompt = build_relevance_prompt("Judge this.", "Is debt recycling legal?");
        assert_eq!(
            prompt,
            "Judge this.\n\nPost/Comment content:\nIs debt recycling legal?"
        );
    }

    #[test]
    fn test_oracle_requires_api_key() {
        for key in [None, Some(""), Some("   ")] {
            let result = GeminiOracle::new(&config_with_key(key));
            assert!(matches!(
                result,
                Err(CoreError::Llm(LlmError::InvalidApiKey { .. }))
            ));
        }
    }

    #[test]
    fn test_endpoint_uses_configured_model() {
        let mut config = config_with_key(Some("test-key"));
        config.api_base = "http://localhost:9999/v1beta/".to_string();
        config.model = "gemini-test".to_string();

        let oracle = GeminiOracle::new(&config).unwrap();
        assert_eq!(
            oracle.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_response_text_is_joined_and_trimmed() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "  RELEVANT\n"}, {"text": "Asks about offsets. "}], "role": "model"},
                "finishReason": "STOP"
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_text().unwrap(), "RELEVANT\nAsks about offsets.");
    }

    #[test]
    fn test_blocked_prompt_is_content_filtered() {
        let json = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            response.into_text(),
            Err(LlmError::ContentFiltered { reason }) if reason == "SAFETY"
        ));
    }

    #[test]
    fn test_empty_completion_is_an_error() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "   "}]}, "finishReason": "STOP"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            response.into_text(),
            Err(LlmError::InvalidResponseFormat { .. })
        ));

        let json = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            response.into_text(),
            Err(LlmError::ContentFiltered { .. })
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "m", ""),
            CoreError::Llm(LlmError::RateLimitExceeded { .. })
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "m", ""),
            CoreError::Llm(LlmError::ModelNotAvailable { model }) if model == "m"
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "m", "API key not valid. Please pass a valid API key."),
            CoreError::Llm(LlmError::InvalidApiKey { .. })
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "m", ""),
            CoreError::Llm(LlmError::ServiceUnavailable { status_code: 503, .. })
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "m", "bad"),
            CoreError::RequestFailed { status_code: Some(400), .. }
        ));
    }
}
