//! C4 Router — decides, from a gated transcript, whether to answer via the
//! LLM or short-circuit to a canned response on a whole-word keyword match.

/// What the agent should do with a routed transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing worth responding to; return to listening silently.
    NoOp,
    /// Speak `text` directly, skipping the LLM entirely.
    Speak { text: String },
    /// Speak a short acknowledgement immediately, then (if `needs_llm`)
    /// follow up with the LLM's answer once it's ready.
    SpeakAckThenAnswer { ack_text: String, needs_llm: bool },
    /// The LLM call failed or was skipped; speak a fallback line.
    Fallback { text: String },
}

/// One entry in the fast-path table: a keyword and the canned reply it
/// short-circuits to. Matching is whole-word, case-insensitive, and
/// first-match-wins in table order.
#[derive(Debug, Clone)]
pub struct FastPathEntry {
    pub keyword: String,
    pub reply: String,
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub fast_path: Vec<FastPathEntry>,
    /// Transcripts with confidence below this (when reported) are treated
    /// as too unreliable to route at all; the agent asks for repair instead
    /// of calling the LLM.
    pub repair_confidence_threshold: f32,
    /// Spoken verbatim (via `Plan::Speak`) when a transcript falls below
    /// `repair_confidence_threshold`.
    pub repair_phrase: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            fast_path: Vec::new(),
            repair_confidence_threshold: 0.0,
            repair_phrase: "Say again, over.".to_string(),
        }
    }
}

fn word_boundary_contains(haystack: &str, needle: &str) -> bool {
    let haystack = haystack.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    if needle.is_empty() {
        return false;
    }
    let hay_bytes = haystack.as_bytes();
    let needle_bytes = needle.as_bytes();
    let is_word_byte = |b: u8| b.is_ascii_alphanumeric() || b == b'_';

    let mut start = 0;
    while let Some(pos) = haystack[start..].find(&needle) {
        let abs = start + pos;
        let before_ok = abs == 0 || !is_word_byte(hay_bytes[abs - 1]);
        let end = abs + needle_bytes.len();
        let after_ok = end >= hay_bytes.len() || !is_word_byte(hay_bytes[end]);
        if before_ok && after_ok {
            return true;
        }
        start = abs + 1;
        if start >= haystack.len() {
            break;
        }
    }
    false
}

/// Route a gated, non-low-signal transcript to a plan.
///
/// `confidence` is `None` when the backend didn't report one (gate already
/// let it through in that case); `Some(c)` below the repair threshold is too
/// unreliable to route at all and short-circuits to the repair phrase,
/// without ever reaching the LLM.
pub fn route(text: &str, confidence: Option<f32>, config: &RouterConfig) -> Plan {
    if config.repair_confidence_threshold > 0.0 {
        if let Some(c) = confidence {
            if c < config.repair_confidence_threshold {
                return Plan::Speak {
                    text: config.repair_phrase.clone(),
                };
            }
        }
    }

    for entry in &config.fast_path {
        if word_boundary_contains(text, &entry.keyword) {
            return Plan::Speak {
                text: entry.reply.clone(),
            };
        }
    }

    Plan::SpeakAckThenAnswer {
        ack_text: String::new(),
        needs_llm: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RouterConfig {
        RouterConfig {
            fast_path: vec![
                FastPathEntry {
                    keyword: "time".to_string(),
                    reply: "I don't have a clock, over.".to_string(),
                },
                FastPathEntry {
                    keyword: "status".to_string(),
                    reply: "All systems nominal, over.".to_string(),
                },
            ],
            repair_confidence_threshold: 0.3,
            repair_phrase: "Say again, over.".to_string(),
        }
    }

    #[test]
    fn whole_word_keyword_match_short_circuits() {
        let plan = route("what time is it", None, &config());
        assert_eq!(
            plan,
            Plan::Speak {
                text: "I don't have a clock, over.".to_string()
            }
        );
    }

    #[test]
    fn substring_match_inside_a_longer_word_does_not_fast_path() {
        // "timetable" contains "time" but not as a whole word.
        let plan = route("show me the timetable", None, &config());
        assert_ne!(
            plan,
            Plan::Speak {
                text: "I don't have a clock, over.".to_string()
            }
        );
    }

    #[test]
    fn first_match_wins_in_table_order() {
        let plan = route("what is the time and status", None, &config());
        assert_eq!(
            plan,
            Plan::Speak {
                text: "I don't have a clock, over.".to_string()
            }
        );
    }

    #[test]
    fn low_confidence_below_repair_threshold_asks_for_repair_without_llm() {
        let plan = route("what time is it", Some(0.1), &config());
        assert_eq!(
            plan,
            Plan::Speak {
                text: "Say again, over.".to_string()
            }
        );
    }

    #[test]
    fn no_keyword_match_falls_through_to_llm() {
        let plan = route("tell me a joke", None, &config());
        assert!(matches!(
            plan,
            Plan::SpeakAckThenAnswer {
                needs_llm: true,
                ..
            }
        ));
    }
}
