use super::*;

#[test]
fn test_validation_message_lists_violations() {
    let error = Error::ValidationRejected {
        violations: vec!["blocked topic: programming/technical".to_string()],
    };

    let msg = error.user_message();
    assert!(msg.contains("programming/technical"));
    assert_eq!(error.code(), "VALIDATION_REJECTED");
    assert!(error.is_rejection());
}

#[test]
fn test_scope_message_is_fixed_refusal() {
    let error = Error::ScopeRejected {
        reason: "OUT_OF_SCOPE_EXPLICIT".to_string(),
    };
    assert_eq!(error.user_message(), REFUSAL_MESSAGE);
    assert!(error.suggestion().is_none());
}

#[test]
fn test_upstream_message_hides_detail() {
    let error = Error::Upstream("connection reset by peer at 10.0.0.7:11434".to_string());

    let msg = error.user_message();
    assert!(!msg.contains("10.0.0.7"));
    assert!(error.is_upstream());
    assert_eq!(error.code(), "UPSTREAM_FAILURE");
}

#[test]
fn test_llm_error_is_upstream() {
    let error: Error = wayfarer_llm::Error::StreamTruncated.into();
    assert!(error.is_upstream());
    assert!(!error.user_message().contains("stream"));
}

#[test]
fn test_format_error_for_chat() {
    let error = Error::Upstream("timeout".to_string());

    let output = format_error_for_chat(&error);
    assert!(output.contains("temporarily unavailable"));
    assert!(output.contains("resend"));
}

#[test]
fn test_parse_message_is_generic() {
    let error = Error::Parse("expected value at line 1 column 1".to_string());
    assert!(!error.user_message().contains("line 1"));
    assert_eq!(error.code(), "INVALID_REQUEST");
}
