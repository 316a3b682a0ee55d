//! Difficulty estimation for incoming queries.
//!
//! Classification is a priority-ordered table of [`DifficultyRule`]s evaluated
//! over the lower-cased query; the first rule that matches decides the base
//! level. A large context then escalates the result by one level.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Context size (in tokens) at which a query is escalated one level.
pub const HIGH_CONTEXT_TOKENS: u64 = 8_000;

/// Word count above which an otherwise unclassified query is treated as medium.
pub const LONG_QUERY_WORDS: usize = 40;

/// Keyword stems denoting open-ended engineering work.
const HARD_KEYWORDS: &[&str] = &[
    "implement",
    "design",
    "architect",
    "refactor",
    "debug",
    "comprehensive",
];

/// Keyword stems denoting bounded analytical work.
///
/// Stems are cut short enough to cover noun forms ("summary", "explanation",
/// "comparison") as well as the verbs.
const MEDIUM_KEYWORDS: &[&str] = &["summar", "explain", "explan", "compar"];

/// Short arithmetic such as "what is 15 + 27?" or "3 * (4 - 1)".
const ARITHMETIC_PATTERN: &str =
    r"^\s*(?:what\s+is|what's|calculate|compute|evaluate)?\s*[\d\s.+\-*/x×÷^%()]*\d[\d\s.+\-*/x×÷^%()]*[?=\s]*$";

/// Clock and calendar lookups.
const CLOCK_PATTERN: &str = r"^\s*what\s+(?:time|day|date)\s+is\s+it\s*\??\s*$";

/// Difficulty tier of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// One level up, saturating at `Hard`.
    pub fn escalate(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium | Difficulty::Hard => Difficulty::Hard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyAssessment {
    /// Final difficulty level
    pub level: Difficulty,
    /// Signals that contributed to the decision, in evaluation order
    pub signals: Vec<String>,
}

/// Pre-processed view of a query shared by all rules.
#[derive(Debug, Clone)]
pub struct QueryFeatures {
    /// Lower-cased, trimmed query
    pub lowered: String,
    /// Alphanumeric words of the lowered query
    pub words: Vec<String>,
}

impl QueryFeatures {
    pub fn new(query: &str) -> Self {
        let lowered = query.trim().to_lowercase();
        let words = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self { lowered, words }
    }

    /// First stem that starts any word of the query.
    fn first_stem<'a>(&self, stems: &'a [&'a str]) -> Option<&'a str> {
        stems
            .iter()
            .copied()
            .find(|stem| self.words.iter().any(|w| w.starts_with(stem)))
    }
}

/// How a rule decides whether it applies.
#[derive(Clone)]
pub enum RuleMatcher {
    /// Any word starts with one of the stems
    Keywords(&'static [&'static str]),
    /// The lowered query matches the expression
    Pattern(Regex),
    /// Arbitrary predicate over the query features
    Predicate(fn(&QueryFeatures) -> bool),
}

impl fmt::Debug for RuleMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleMatcher::Keywords(stems) => f.debug_tuple("Keywords").field(stems).finish(),
            RuleMatcher::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            RuleMatcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// One entry of the classification table.
#[derive(Debug, Clone)]
pub struct DifficultyRule {
    /// Tag recorded in the assessment's signals
    pub name: &'static str,
    /// Level assigned when the rule matches
    pub level: Difficulty,
    pub matcher: RuleMatcher,
}

impl DifficultyRule {
    pub fn keywords(name: &'static str, level: Difficulty, stems: &'static [&'static str]) -> Self {
        Self {
            name,
            level,
            matcher: RuleMatcher::Keywords(stems),
        }
    }

    /// Build a pattern rule; `None` if the expression does not compile.
    pub fn pattern(name: &'static str, level: Difficulty, pattern: &str) -> Option<Self> {
        Regex::new(pattern).ok().map(|re| Self {
            name,
            level,
            matcher: RuleMatcher::Pattern(re),
        })
    }

    pub fn predicate(name: &'static str, level: Difficulty, f: fn(&QueryFeatures) -> bool) -> Self {
        Self {
            name,
            level,
            matcher: RuleMatcher::Predicate(f),
        }
    }

    /// Signal string if the rule applies to the query.
    pub fn evaluate(&self, features: &QueryFeatures) -> Option<String> {
        match &self.matcher {
            RuleMatcher::Keywords(stems) => features
                .first_stem(stems)
                .map(|stem| format!("{}:{}", self.name, stem)),
            RuleMatcher::Pattern(re) => re
                .is_match(&features.lowered)
                .then(|| self.name.to_string()),
            RuleMatcher::Predicate(f) => f(features).then(|| self.name.to_string()),
        }
    }
}

/// The built-in classification table, highest priority first.
pub fn default_rules() -> Vec<DifficultyRule> {
    let mut rules = vec![
        DifficultyRule::keywords("keyword", Difficulty::Hard, HARD_KEYWORDS),
        DifficultyRule::keywords("keyword", Difficulty::Medium, MEDIUM_KEYWORDS),
    ];
    rules.extend(DifficultyRule::pattern(
        "trivial:arithmetic",
        Difficulty::Easy,
        ARITHMETIC_PATTERN,
    ));
    rules.extend(DifficultyRule::pattern(
        "trivial:clock",
        Difficulty::Easy,
        CLOCK_PATTERN,
    ));
    rules.push(DifficultyRule::predicate(
        "length:long",
        Difficulty::Medium,
        |f| f.words.len() > LONG_QUERY_WORDS,
    ));
    rules.push(DifficultyRule::predicate(
        "default",
        Difficulty::Easy,
        |_| true,
    ));
    rules
}

/// Rule-table difficulty estimator.
#[derive(Debug, Clone)]
pub struct DifficultyEstimator {
    rules: Vec<DifficultyRule>,
    high_context_tokens: u64,
}

impl Default for DifficultyEstimator {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            high_context_tokens: HIGH_CONTEXT_TOKENS,
        }
    }
}

impl DifficultyEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an estimator with a custom rule table.
    pub fn with_rules(rules: Vec<DifficultyRule>) -> Self {
        Self {
            rules,
            high_context_tokens: HIGH_CONTEXT_TOKENS,
        }
    }

    /// Set the context size that triggers escalation.
    pub fn with_high_context_tokens(mut self, tokens: u64) -> Self {
        self.high_context_tokens = tokens;
        self
    }

    /// Insert a rule at the given priority position (0 = highest).
    pub fn insert_rule(&mut self, index: usize, rule: DifficultyRule) {
        let index = index.min(self.rules.len());
        self.rules.insert(index, rule);
    }

    pub fn rules(&self) -> &[DifficultyRule] {
        &self.rules
    }

    /// Classify a query given the size of the context it will be grounded in.
    pub fn estimate(&self, query: &str, context_tokens: u64) -> DifficultyAssessment {
        let features = QueryFeatures::new(query);
        let mut signals = Vec::new();

        // First match wins; an empty table falls through to easy.
        let mut level = Difficulty::Easy;
        for rule in &self.rules {
            if let Some(signal) = rule.evaluate(&features) {
                level = rule.level;
                signals.push(signal);
                break;
            }
        }

        if context_tokens >= self.high_context_tokens && level != Difficulty::Hard {
            level = level.escalate();
            signals.push(format!("context:large({})", context_tokens));
        }

        DifficultyAssessment { level, signals }
    }
}

/// Classify a query with the built-in rule table.
pub fn estimate_difficulty(query: &str, context_tokens: u64) -> DifficultyAssessment {
    static DEFAULT: OnceLock<DifficultyEstimator> = OnceLock::new();
    DEFAULT
        .get_or_init(DifficultyEstimator::default)
        .estimate(query, context_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_is_easy() {
        let assessment = estimate_difficulty("What is 15 + 27?", 100);
        assert_eq!(assessment.level, Difficulty::Easy);
        assert_eq!(assessment.signals, vec!["trivial:arithmetic".to_string()]);
    }

    #[test]
    fn test_clock_is_easy() {
        let assessment = estimate_difficulty("What time is it?", 0);
        assert_eq!(assessment.level, Difficulty::Easy);
        assert_eq!(assessment.signals, vec!["trivial:clock".to_string()]);
    }

    #[test]
    fn test_hard_keywords() {
        for query in [
            "Implement a rate limiter",
            "Design the storage layer",
            "Architect a plugin system",
            "Refactor this module",
            "Debug this error: connection refused",
            "Give a comprehensive review",
        ] {
            assert_eq!(estimate_difficulty(query, 0).level, Difficulty::Hard, "{query}");
        }
    }

    #[test]
    fn test_keyword_stems_match_inflections() {
        let assessment = estimate_difficulty("Help me with debugging the parser", 0);
        assert_eq!(assessment.level, Difficulty::Hard);
        assert_eq!(assessment.signals[0], "keyword:debug");
    }

    #[test]
    fn test_medium_keywords() {
        let assessment = estimate_difficulty("Summarize this chapter", 500);
        assert_eq!(assessment.level, Difficulty::Medium);
        assert_eq!(assessment.signals[0], "keyword:summar");

        assert_eq!(
            estimate_difficulty("Compare these two contracts", 0).level,
            Difficulty::Medium
        );
    }

    #[test]
    fn test_medium_keyword_noun_forms() {
        for query in [
            "Give me a summary of the report",
            "I need an explanation of this error",
            "Write a comparison of both designs",
        ] {
            let assessment = estimate_difficulty(query, 0);
            assert_eq!(assessment.level, Difficulty::Medium, "query: {query}");
        }
        assert_eq!(
            estimate_difficulty("Summarise the thread", 0).signals[0],
            "keyword:summar"
        );
    }

    #[test]
    fn test_hard_rule_wins_over_medium() {
        let assessment = estimate_difficulty("Explain and then refactor the code", 0);
        assert_eq!(assessment.level, Difficulty::Hard);
        assert_eq!(assessment.signals, vec!["keyword:refactor".to_string()]);
    }

    #[test]
    fn test_large_context_escalates_one_level() {
        let easy = estimate_difficulty("What is 2 + 2?", HIGH_CONTEXT_TOKENS);
        assert_eq!(easy.level, Difficulty::Medium);
        assert!(easy.signals.iter().any(|s| s.starts_with("context:large")));

        let medium = estimate_difficulty("Explain the findings", 10_000);
        assert_eq!(medium.level, Difficulty::Hard);

        let hard = estimate_difficulty("Debug this error: connection refused...", 10_000);
        assert_eq!(hard.level, Difficulty::Hard);
        assert_eq!(hard.signals.len(), 1);
    }

    #[test]
    fn test_context_below_threshold_does_not_escalate() {
        let assessment = estimate_difficulty("What is 2 + 2?", HIGH_CONTEXT_TOKENS - 1);
        assert_eq!(assessment.level, Difficulty::Easy);
    }

    #[test]
    fn test_long_unclassified_query_is_medium() {
        let query = "word ".repeat(LONG_QUERY_WORDS + 1);
        let assessment = estimate_difficulty(&query, 0);
        assert_eq!(assessment.level, Difficulty::Medium);
        assert_eq!(assessment.signals, vec!["length:long".to_string()]);
    }

    #[test]
    fn test_short_unclassified_query_defaults_to_easy() {
        let assessment = estimate_difficulty("Who wrote Hamlet?", 0);
        assert_eq!(assessment.level, Difficulty::Easy);
        assert_eq!(assessment.signals, vec!["default".to_string()]);
    }

    #[test]
    fn test_inserted_rule_takes_priority() {
        let mut estimator = DifficultyEstimator::new();
        estimator.insert_rule(
            0,
            DifficultyRule::keywords("keyword", Difficulty::Hard, &["prove"]),
        );
        assert_eq!(estimator.estimate("Prove that 2 + 2 = 4", 0).level, Difficulty::Hard);
        // Existing behaviour is untouched
        assert_eq!(estimator.estimate("What is 2 + 2?", 0).level, Difficulty::Easy);
    }

    #[test]
    fn test_invalid_pattern_rule_is_rejected() {
        assert!(DifficultyRule::pattern("broken", Difficulty::Easy, "(unclosed").is_none());
    }

    #[test]
    fn test_empty_rule_table_falls_back_to_easy() {
        let estimator = DifficultyEstimator::with_rules(Vec::new());
        let assessment = estimator.estimate("anything at all", 0);
        assert_eq!(assessment.level, Difficulty::Easy);
        assert!(assessment.signals.is_empty());
    }

    #[test]
    fn test_difficulty_ordering() {
        assert!(Difficulty::Easy < Difficulty::Medium);
        assert!(Difficulty::Medium < Difficulty::Hard);
        assert_eq!(Difficulty::Hard.escalate(), Difficulty::Hard);
    }
}
