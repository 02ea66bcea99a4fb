//! Content validation
//!
//! Sanitizes the raw prompt and checks it against ordered topic
//! blocklists. The first matching category wins. Medical and unsafe
//! entries are phrased as requests so that travel policy questions
//! about medicine or sporting firearms pass. Inputs that match no
//! blocklist and no travel keyword are let through as SUSPICIOUS.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{contains_any, word_regex};
use crate::error::{Error, Result};
use crate::pipeline::{PipelineContext, Stage};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for content validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum raw input length (chars)
    pub max_input_chars: usize,
    /// Operator-supplied blocked terms (case-insensitive substrings)
    pub extra_blocked_terms: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 4000,
            extra_blocked_terms: Vec::new(),
        }
    }
}

// ============================================================================
// Verdict
// ============================================================================

/// Severity of a validated input
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Recognized travel content
    Normal,
    /// Nothing recognized either way
    Suspicious,
    /// Rejected
    Blocked,
}

/// Result of validating one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// Whether the input may proceed
    pub valid: bool,
    /// Ordered violation descriptions
    pub violations: Vec<String>,
    /// Severity level
    pub severity: Severity,
    /// Sanitized input text
    pub sanitized: String,
}

impl ValidationVerdict {
    fn blocked(violation: String, sanitized: String) -> Self {
        Self {
            valid: false,
            violations: vec![violation],
            severity: Severity::Blocked,
            sanitized,
        }
    }

    fn allowed(severity: Severity, sanitized: String) -> Self {
        Self {
            valid: true,
            violations: Vec::new(),
            severity,
            sanitized,
        }
    }
}

// ============================================================================
// Blocklist
// ============================================================================

/// A blocked topic category
struct BlockCategory {
    name: &'static str,
    english: &'static [&'static str],
    korean: &'static [&'static str],
}

/// Blocked categories, checked in order
const BLOCK_CATEGORIES: &[BlockCategory] = &[
    BlockCategory {
        name: "programming/technical",
        english: &[
            "python", "javascript", "typescript", "golang", "kotlin", "programming",
            "coding", "debug", "debugging", "compile", "compiler", "algorithm",
            "algorithms", "source code", "stack trace", "regex", "html", "css", "sql",
            "docker", "kubernetes", "github", "leetcode", "shell script", "bash script",
            "write (?:some |a )?code", r"c\+\+",
        ],
        korean: &["코딩", "프로그래밍", "파이썬", "자바스크립트", "디버깅", "알고리즘", "소스코드", "컴파일"],
    },
    BlockCategory {
        name: "financial",
        english: &[
            "stocks?", "stock market", "crypto", "cryptocurrency", "bitcoin", "ethereum",
            "forex", "day trading", "trading strategy", "options trading", "dividends?",
            "mutual funds?", "etfs?", "investment portfolio", "tax return", "mortgage",
        ],
        korean: &["주식", "비트코인", "가상화폐", "암호화폐", "펀드", "배당", "세금 신고", "주택담보대출"],
    },
    BlockCategory {
        name: "medical",
        english: &[
            "diagnose (?:me|my|this)", "(?:what|which) (?:dosage|dose) should i",
            "(?:what|which) (?:medication|medicine|pills?) should i take",
            "should i (?:stop|keep) taking", "prescribe me", "write me a prescription",
            "is (?:this|my) (?:rash|lump|mole|pain) (?:serious|cancer)", "treatment for my",
            "cure (?:for )?my", "am i depressed", "symptoms of (?:cancer|diabetes|depression)",
        ],
        korean: &["진단해", "처방해", "복용량 알려", "무슨 약을 먹어야", "치료법 알려", "우울증인가"],
    },
    BlockCategory {
        name: "legal",
        english: &[
            "lawsuit", "legal advice", "attorney", "lawyer", "divorce", "custody",
            "criminal charges?", "court case", "litigation",
        ],
        korean: &["소송", "변호사", "법률 자문", "이혼", "양육권", "형사 고소"],
    },
    BlockCategory {
        name: "academic",
        english: &[
            "homework", "essay", "thesis", "dissertation", "calculus", "algebra", "physics",
            "chemistry", "solve (?:this|the) equation", "exam answers?", "term paper",
        ],
        korean: &["숙제", "과제", "논문", "미적분", "방정식", "물리학", "화학"],
    },
    BlockCategory {
        name: "unsafe",
        english: &[
            "(?:make|build) (?:a |an )?(?:bombs?|explosives?|weapons?)", "how to kill",
            "murder (?:someone|somebody|my)", "kill myself", "suicide", "self-harm",
            "hack into", "hacking (?:into|someone)", "malware", "ransomware", "phishing",
            "(?:buy|sell|make) (?:illegal )?(?:drugs|narcotics|meth|cocaine|heroin)",
            "smuggle", "smuggling", "sneak (?:a |my )?(?:gun|weapon|knife) (?:through|past)",
        ],
        korean: &["폭탄 만드", "폭발물 만드", "살인", "자살", "해킹해", "마약 구", "마약 팔", "밀수"],
    },
];

/// Travel/booking vocabulary that marks an input as NORMAL
const ALLOW_ENGLISH: &[&str] = &[
    "flights?", "airlines?", "airports?", "hotels?", "hostels?", "resorts?", "book",
    "booking", "bookings", "booked", "reservations?", "itinerary", "itineraries", "trips?",
    "travel", "traveling", "travelling", "vacation", "holiday", "tickets?", "check-?in",
    "check-?out", "luggage", "baggage", "visa", "passport", "destinations?", "tours?",
    "rental car", "car rental", "cancel", "cancellation", "refund", "layover", "boarding",
];

const ALLOW_KOREAN: &[&str] = &[
    "항공", "비행기", "호텔", "숙소", "예약", "여행", "일정", "체크인", "체크아웃", "수하물",
    "비자", "여권", "관광", "렌터카", "취소", "환불",
];

struct CompiledCategory {
    name: &'static str,
    english: Regex,
    korean: &'static [&'static str],
}

// ============================================================================
// Validator
// ============================================================================

/// Sanitizes and classifies raw user input
pub struct ContentValidator {
    config: SecurityConfig,
    categories: Vec<CompiledCategory>,
    allow: Regex,
    extra_terms: Vec<String>,
}

impl std::fmt::Debug for ContentValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentValidator")
            .field("config", &self.config)
            .field("categories", &self.categories.len())
            .finish()
    }
}

impl ContentValidator {
    /// Compile the built-in patterns
    pub fn new(config: SecurityConfig) -> Result<Self> {
        let categories = BLOCK_CATEGORIES
            .iter()
            .map(|c| {
                Ok(CompiledCategory {
                    name: c.name,
                    english: word_regex(c.english)?,
                    korean: c.korean,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let extra_terms = config
            .extra_blocked_terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(Self {
            allow: word_regex(ALLOW_ENGLISH)?,
            categories,
            extra_terms,
            config,
        })
    }

    /// Validate a raw input
    #[must_use]
    pub fn validate(&self, input: &str) -> ValidationVerdict {
        let sanitized = sanitize_input(input);

        let length = input.chars().count();
        if length > self.config.max_input_chars {
            warn!(length, max = self.config.max_input_chars, "Input too long");
            return ValidationVerdict::blocked(
                format!("input exceeds {} characters", self.config.max_input_chars),
                sanitized,
            );
        }

        for category in &self.categories {
            if category.english.is_match(&sanitized) || contains_any(&sanitized, category.korean) {
                warn!(category = %category.name, "Blocked topic detected");
                return ValidationVerdict::blocked(
                    format!("blocked topic: {}", category.name),
                    sanitized,
                );
            }
        }

        let lowered = sanitized.to_lowercase();
        if let Some(term) = self.extra_terms.iter().find(|t| lowered.contains(t.as_str())) {
            warn!(term = %term, "Custom blocked term detected");
            return ValidationVerdict::blocked("blocked topic: custom".to_string(), sanitized);
        }

        if self.allow.is_match(&sanitized) || contains_any(&sanitized, ALLOW_KOREAN) {
            debug!("Input matched travel vocabulary");
            return ValidationVerdict::allowed(Severity::Normal, sanitized);
        }

        info!(length, "Input matched neither blocklist nor allowlist, allowing");
        ValidationVerdict::allowed(Severity::Suspicious, sanitized)
    }
}

/// Strip control characters (except newline and tab), collapse runs of
/// whitespace and trim
#[must_use]
pub fn sanitize_input(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();

    cleaned
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Stage
// ============================================================================

/// First pipeline gate
#[derive(Debug)]
pub struct ValidationStage {
    validator: ContentValidator,
}

impl ValidationStage {
    /// Wrap a validator
    #[must_use]
    pub fn new(validator: ContentValidator) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Stage for ValidationStage {
    fn name(&self) -> &'static str {
        "validation"
    }

    async fn before(&self, ctx: &mut PipelineContext) -> Result<()> {
        let verdict = self.validator.validate(&ctx.request.message);
        ctx.prompt = verdict.sanitized.clone();

        if !verdict.valid {
            return Err(Error::ValidationRejected {
                violations: verdict.violations,
            });
        }

        ctx.validation = Some(verdict);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
