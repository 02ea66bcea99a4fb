//! Scope classification
//!
//! Decides whether a validated prompt belongs to the travel/booking
//! domain. Explicit out-of-scope topics are refused; anything that is
//! merely unrecognized is let through and left to the model.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{contains_any, word_regex};
use crate::error::{Error, Result};
use crate::pipeline::{PipelineContext, Stage};

/// Fixed refusal sent for out-of-scope requests
pub const REFUSAL_MESSAGE: &str = "I can only help with travel and booking questions: \
flights, hotels, reservations and their changes or cancellations, travel dates, \
destinations, weather and travel policies. I can't help with creative writing, \
recipes, sports, politics, entertainment recommendations, games or general \
translation.\n\n\
여행 및 예약 관련 질문만 도와드릴 수 있습니다: 항공권, 호텔, 예약 변경 및 취소, \
여행 일정, 목적지, 날씨, 여행 정책. 창작, 요리법, 스포츠, 정치, 엔터테인먼트 추천, \
게임, 일반 번역 요청은 도와드릴 수 없습니다.";

/// Why a verdict was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeReason {
    /// Travel vocabulary present
    InScopeExplicit,
    /// Greeting or request for help
    InScopeGeneral,
    /// Known unsupported topic
    OutOfScopeExplicit,
    /// Nothing recognized; allowed through
    OutOfScopeAmbiguous,
}

impl ScopeReason {
    /// Reason code string
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InScopeExplicit => "IN_SCOPE_EXPLICIT",
            Self::InScopeGeneral => "IN_SCOPE_GENERAL",
            Self::OutOfScopeExplicit => "OUT_OF_SCOPE_EXPLICIT",
            Self::OutOfScopeAmbiguous => "OUT_OF_SCOPE_AMBIGUOUS",
        }
    }
}

/// Scope decision for one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeVerdict {
    /// Whether the request may proceed
    pub in_scope: bool,
    /// Human-readable explanation
    pub message: String,
    /// Reason code
    pub reason: ScopeReason,
}

impl ScopeVerdict {
    fn new(in_scope: bool, reason: ScopeReason, message: &str) -> Self {
        Self {
            in_scope,
            message: message.to_string(),
            reason,
        }
    }
}

// Entries are phrased as requests; a bare topic word alone ("football",
// "netflix") can describe a travel plan.
const OUT_OF_SCOPE_ENGLISH: &[&str] = &[
    // creative writing
    "(?:write|compose) (?:me )?(?:a |an |some )?(?:poems?|haiku|short story|story|song|novel|lyrics)",
    "poems? (?:about|for)", "fan ?fiction",
    // cooking
    "recipes?", "how (?:do i|to) (?:cook|bake)",
    // sports
    "who won (?:the )?(?:[a-z]+ ){0,3}(?:game|match|league|cup|series|championship|super bowl)",
    "(?:nba|nfl|mlb|premier league|football|soccer|basketball|baseball) (?:scores?|standings|results?|predictions?)",
    // politics
    "who should i vote for", "(?:election|poll) results?",
    "(?:opinion|thoughts|views?) (?:on|about) (?:the )?(?:president|election|government|politics)",
    "(?:discuss|explain|debate) (?:the )?politics",
    // entertainment
    "recommend (?:me )?(?:a |some )?(?:movies?|films?|tv shows?|series|songs?|albums?)",
    "movies? to watch", "what should i watch",
    "(?:recommend|suggest) (?:me )?(?:a |some )?(?:good )?netflix",
    // gaming
    "(?:recommend|suggest) (?:me )?(?:a |some )?(?:good )?(?:video )?games?",
    "best video games?", "how (?:do i|to) beat (?:this|the) (?:level|boss)",
    // translation
    "translate (?:this|that|these|the following|it|my)",
];

const OUT_OF_SCOPE_KOREAN: &[&str] = &[
    "시 써", "소설 써", "노래 가사", "레시피", "요리법", "경기 결과", "누가 이겼", "선거 결과",
    "누구를 뽑", "영화 추천", "드라마 추천", "게임 추천", "번역해",
];

const DOMAIN_ENGLISH: &[&str] = &[
    // bookings
    "flights?", "airlines?", "airports?", "hotels?", "rooms?", "book", "booking", "booked",
    "reserve", "reservations?", "itinerary", "trips?", "travel", "tickets?", "seats?",
    // dates
    "dates?", "tomorrow", "tonight", "weekend", "next week", "monday", "tuesday",
    "wednesday", "thursday", "friday", "saturday", "sunday",
    // weather and places
    "weather", "forecast", "location", "where", "nearby", "near", "city", "country",
    // policy
    "polic(?:y|ies)", "cancel", "cancell?ation", "cancell?ed", "refund", "baggage", "luggage",
    // question words
    "what", "when", "how", "which", "can i", "is there",
];

const DOMAIN_KOREAN: &[&str] = &[
    "항공", "비행기", "호텔", "예약", "날짜", "날씨", "위치", "어디", "언제", "무엇", "어떻게",
    "정책", "취소", "환불", "여행", "일정", "수하물",
];

const GREETING_ENGLISH: &[&str] = &[
    "hi", "hello", "hey", "good (?:morning|afternoon|evening)", "thanks", "thank you", "help",
    "assist",
];

const GREETING_KOREAN: &[&str] = &["안녕", "감사", "고마워", "도와"];

/// Travel/booking scope classifier
#[derive(Debug)]
pub struct ScopeClassifier {
    out_of_scope: Regex,
    domain: Regex,
    greeting: Regex,
}

impl ScopeClassifier {
    /// Compile the built-in patterns
    pub fn new() -> Result<Self> {
        Ok(Self {
            out_of_scope: word_regex(OUT_OF_SCOPE_ENGLISH)?,
            domain: word_regex(DOMAIN_ENGLISH)?,
            greeting: word_regex(GREETING_ENGLISH)?,
        })
    }

    /// Classify a sanitized prompt
    #[must_use]
    pub fn classify(&self, text: &str) -> ScopeVerdict {
        if self.out_of_scope.is_match(text) || contains_any(text, OUT_OF_SCOPE_KOREAN) {
            debug!("Explicit out-of-scope topic");
            return ScopeVerdict::new(false, ScopeReason::OutOfScopeExplicit, REFUSAL_MESSAGE);
        }

        if self.domain.is_match(text) || contains_any(text, DOMAIN_KOREAN) {
            return ScopeVerdict::new(
                true,
                ScopeReason::InScopeExplicit,
                "travel or booking request",
            );
        }

        if self.greeting.is_match(text) || contains_any(text, GREETING_KOREAN) {
            return ScopeVerdict::new(true, ScopeReason::InScopeGeneral, "greeting or help request");
        }

        // Unrecognized input goes to the model, which has the final say
        info!(length = text.chars().count(), "Ambiguous scope, allowing");
        ScopeVerdict::new(
            true,
            ScopeReason::OutOfScopeAmbiguous,
            "no travel signal; deferred to the assistant",
        )
    }
}

/// Second pipeline gate
#[derive(Debug)]
pub struct ScopeStage {
    classifier: ScopeClassifier,
}

impl ScopeStage {
    /// Wrap a classifier
    #[must_use]
    pub fn new(classifier: ScopeClassifier) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Stage for ScopeStage {
    fn name(&self) -> &'static str {
        "scope"
    }

    async fn before(&self, ctx: &mut PipelineContext) -> Result<()> {
        let verdict = self.classifier.classify(&ctx.prompt);

        if !verdict.in_scope {
            return Err(Error::ScopeRejected {
                reason: verdict.reason.as_str().to_string(),
            });
        }

        ctx.scope = Some(verdict);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
