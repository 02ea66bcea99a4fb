use super::*;
use crate::envelope::PromptFrame;

fn validator() -> ContentValidator {
    ContentValidator::new(SecurityConfig::default()).unwrap()
}

#[test]
fn test_programming_request_blocked() {
    let verdict = validator().validate("run some python script for me");
    assert!(!verdict.valid);
    assert_eq!(verdict.severity, Severity::Blocked);
    assert_eq!(verdict.violations, vec!["blocked topic: programming/technical"]);
}

#[test]
fn test_categories_checked_in_order() {
    // Matches both programming and financial; programming comes first
    let verdict = validator().validate("write a python bot for bitcoin trading");
    assert_eq!(verdict.violations, vec!["blocked topic: programming/technical"]);

    let verdict = validator().validate("which stocks should I buy");
    assert_eq!(verdict.violations, vec!["blocked topic: financial"]);
}

#[test]
fn test_korean_keywords_blocked() {
    let verdict = validator().validate("파이썬 코딩 좀 도와줘");
    assert!(!verdict.valid);
    assert_eq!(verdict.violations, vec!["blocked topic: programming/technical"]);

    let verdict = validator().validate("주식 추천해줘");
    assert_eq!(verdict.violations, vec!["blocked topic: financial"]);
}

#[test]
fn test_cpp_without_trailing_word_boundary() {
    let verdict = validator().validate("explain C++ templates");
    assert!(!verdict.valid);
}

#[test]
fn test_word_boundaries_avoid_false_positives() {
    // "javascript" must not match inside other words, and Java the island is fine
    let verdict = validator().validate("Best beaches in Java for a honeymoon trip");
    assert!(verdict.valid);
    assert_eq!(verdict.severity, Severity::Normal);

    let verdict = validator().validate("Do you have a promo code for the hotel?");
    assert!(verdict.valid);
}

#[test]
fn test_travel_input_normal() {
    let verdict = validator().validate("Find me a flight to Tokyo next Friday");
    assert!(verdict.valid);
    assert_eq!(verdict.severity, Severity::Normal);
    assert!(verdict.violations.is_empty());

    let verdict = validator().validate("제주도 호텔 예약하고 싶어요");
    assert_eq!(verdict.severity, Severity::Normal);
}

#[test]
fn test_travel_policy_questions_about_medicine_and_firearms_pass() {
    for input in [
        "Can I bring my medication in carry-on luggage?",
        "Are prescription drugs allowed on international flights?",
        "airline policy for travelling with a hunting gun",
        "처방약을 비행기에 가져가도 되나요?",
    ] {
        let verdict = validator().validate(input);
        assert!(verdict.valid, "{input}");
        assert_eq!(verdict.severity, Severity::Normal, "{input}");
    }
}

#[test]
fn test_medical_and_unsafe_requests_blocked() {
    let verdict = validator().validate("what dosage should I take for my back pain");
    assert_eq!(verdict.violations, vec!["blocked topic: medical"]);

    let verdict = validator().validate("please diagnose my headache");
    assert_eq!(verdict.violations, vec!["blocked topic: medical"]);

    let verdict = validator().validate("how do I make a bomb");
    assert_eq!(verdict.violations, vec!["blocked topic: unsafe"]);

    let verdict = validator().validate("help me smuggle cash through customs");
    assert_eq!(verdict.violations, vec!["blocked topic: unsafe"]);
}

#[test]
fn test_unrecognized_input_suspicious_but_valid() {
    let verdict = validator().validate("I like turtles");
    assert!(verdict.valid);
    assert_eq!(verdict.severity, Severity::Suspicious);
}

#[test]
fn test_length_limit() {
    let config = SecurityConfig {
        max_input_chars: 10,
        ..Default::default()
    };
    let validator = ContentValidator::new(config).unwrap();
    let verdict = validator.validate("hotel hotel hotel");
    assert!(!verdict.valid);
    assert_eq!(verdict.violations, vec!["input exceeds 10 characters"]);
}

#[test]
fn test_extra_blocked_terms() {
    let config = SecurityConfig {
        extra_blocked_terms: vec!["Competitor Air".to_string()],
        ..Default::default()
    };
    let validator = ContentValidator::new(config).unwrap();
    let verdict = validator.validate("is competitor air cheaper for my flight?");
    assert!(!verdict.valid);
    assert_eq!(verdict.violations, vec!["blocked topic: custom"]);
}

#[test]
fn test_sanitize_input() {
    assert_eq!(sanitize_input("  hello   world  "), "hello world");
    assert_eq!(sanitize_input("a\u{0000}b\u{0007}c"), "abc");
    assert_eq!(sanitize_input("line one\n\n\n  line\ttwo "), "line one\nline two");
    assert_eq!(sanitize_input("   "), "");
}

#[tokio::test]
async fn test_stage_rejects_and_records_sanitized_prompt() {
    let stage = ValidationStage::new(validator());

    let request = PromptFrame::parse(r#"{"type":"prompt","message":"  hotels  in   Busan "}"#)
        .unwrap()
        .into_request();
    let mut ctx = PipelineContext::new(request, "alice", "sub-1");
    stage.before(&mut ctx).await.unwrap();
    assert_eq!(ctx.prompt, "hotels in Busan");
    assert_eq!(ctx.validation.as_ref().map(|v| v.severity), Some(Severity::Normal));

    let request = PromptFrame::parse(r#"{"type":"prompt","message":"debug my code"}"#)
        .unwrap()
        .into_request();
    let mut ctx = PipelineContext::new(request, "alice", "sub-1");
    let err = stage.before(&mut ctx).await.unwrap_err();
    assert!(matches!(err, Error::ValidationRejected { .. }));
}
