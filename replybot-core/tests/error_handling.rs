use replybot_core::{
    ConfigError, CoreError, DatabaseError, ErrorExt, ErrorReporter, LlmError, MailboxError,
    RedditApiError,
};

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let db_error = CoreError::Database(DatabaseError::NotConnected);
    assert_eq!(db_error.error_code(), "DATABASE");

    let llm_error = CoreError::Llm(LlmError::InvalidApiKey {
        provider: "gemini".to_string(),
    });
    assert_eq!(llm_error.error_code(), "LLM");

    let mailbox_error = CoreError::Mailbox(MailboxError::NotAuthenticated);
    assert_eq!(mailbox_error.error_code(), "MAILBOX");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "oracle.api_key".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");
}

#[test]
fn test_nested_error_codes() {
    let rejected = RedditApiError::CommentRejected {
        reasons: "THREAD_LOCKED".to_string(),
    };
    assert_eq!(rejected.error_code(), "REDDIT_COMMENT_REJECTED");

    let missing = MailboxError::MessageNotFound {
        message_id: "18c2f".to_string(),
    };
    assert_eq!(missing.error_code(), "MAILBOX_MESSAGE_NOT_FOUND");
}

#[test]
fn test_display_includes_context() {
    let error: CoreError = RedditApiError::CommentRejected {
        reasons: "THREAD_LOCKED: that thread is locked".to_string(),
    }
    .into();
    let text = error.to_string();
    assert!(text.starts_with("Reddit API error:"));
    assert!(text.contains("THREAD_LOCKED"));
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    let message = reddit_error.user_friendly_message();
    assert!(!message.is_empty());
    assert!(message.contains("authentication token is invalid"));

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "oracle.api_key".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("oracle.api_key"));
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new()
        .with_error_reporting(true)
        .with_warning_reporting(true);
    let error = CoreError::Mailbox(MailboxError::NoRecipient);

    // This test just ensures the methods don't panic
    reporter.report_error(&error);
    reporter.report_warning(&error);
}
