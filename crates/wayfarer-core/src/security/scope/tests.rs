use super::*;
use crate::envelope::PromptFrame;

fn classifier() -> ScopeClassifier {
    ScopeClassifier::new().unwrap()
}

#[test]
fn test_travel_keywords_in_scope_explicit() {
    for input in [
        "Book a hotel in Seoul",
        "Is my flight delayed",
        "cancellation policy for my reservation",
        "weather in Osaka this weekend",
        "오사카 항공권 알려줘",
    ] {
        let verdict = classifier().classify(input);
        assert!(verdict.in_scope, "{input}");
        assert_eq!(verdict.reason, ScopeReason::InScopeExplicit, "{input}");
    }
}

#[test]
fn test_out_of_scope_takes_precedence() {
    // Contains "how" and "hotel", but recipes are explicitly unsupported
    let verdict = classifier().classify("how do I make the hotel's pasta recipe");
    assert!(!verdict.in_scope);
    assert_eq!(verdict.reason, ScopeReason::OutOfScopeExplicit);
    assert_eq!(verdict.message, REFUSAL_MESSAGE);

    for input in [
        "write me a poem",
        "who won the premier league",
        "translate this sentence",
        "최신 게임 추천해줘",
    ] {
        let verdict = classifier().classify(input);
        assert_eq!(verdict.reason, ScopeReason::OutOfScopeExplicit, "{input}");
    }
}

#[test]
fn test_travel_requests_mentioning_other_topics_in_scope() {
    for input in [
        "Book a hotel near the football stadium",
        "Can I watch Netflix on the flight?",
        "Do hotels in Tokyo offer translation services?",
        "Flights to Boston for the baseball season opener",
        "축구 경기장 근처 호텔 예약",
    ] {
        let verdict = classifier().classify(input);
        assert!(verdict.in_scope, "{input}");
        assert_eq!(verdict.reason, ScopeReason::InScopeExplicit, "{input}");
    }
}

#[test]
fn test_greeting_in_scope_general() {
    let verdict = classifier().classify("Hello there!");
    assert!(verdict.in_scope);
    assert_eq!(verdict.reason, ScopeReason::InScopeGeneral);

    let verdict = classifier().classify("안녕하세요");
    assert_eq!(verdict.reason, ScopeReason::InScopeGeneral);
}

#[test]
fn test_ambiguous_input_allowed() {
    let verdict = classifier().classify("I like turtles");
    assert!(verdict.in_scope);
    assert_eq!(verdict.reason, ScopeReason::OutOfScopeAmbiguous);
}

#[test]
fn test_reason_codes() {
    assert_eq!(ScopeReason::OutOfScopeAmbiguous.as_str(), "OUT_OF_SCOPE_AMBIGUOUS");
    assert_eq!(
        serde_json::to_string(&ScopeReason::InScopeGeneral).unwrap(),
        "\"IN_SCOPE_GENERAL\""
    );
}

#[tokio::test]
async fn test_stage_rejects_out_of_scope() {
    let stage = ScopeStage::new(classifier());
    let request = PromptFrame::parse(r#"{"type":"prompt","message":"give me a cookie recipe"}"#)
        .unwrap()
        .into_request();
    let mut ctx = PipelineContext::new(request, "alice", "sub-1");

    let err = stage.before(&mut ctx).await.unwrap_err();
    assert!(
        matches!(err, Error::ScopeRejected { ref reason } if reason == "OUT_OF_SCOPE_EXPLICIT")
    );
    assert!(ctx.scope.is_none());
}
