//! Topic guard: a cheap pre-filter run before retrieval or any model call.
//!
//! Biased toward allowing: a farm keyword anywhere lets the message through,
//! and only messages that match a known off-topic or jailbreak pattern with
//! no farm keyword are refused. The chat system prompt is the second line of
//! refusal for everything ambiguous.
//!
//! Keywords and patterns are data (`TopicGuardRules`) so they can be extended
//! without touching the algorithm.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;

pub const OFF_TOPIC_REASON: &str = "I can only help with questions about your ranch: \
    pastures, herds, rainfall, and day-to-day operations recorded in your diary.";

/// Single words and two-word phrases that mark a message as farm-related.
pub const DEFAULT_FARM_KEYWORDS: &[&str] = &[
    // livestock
    "cattle", "cow", "cows", "calf", "calves", "calving", "heifer", "heifers", "steer",
    "steers", "bull", "bulls", "herd", "herds", "livestock", "sheep", "ewe", "ewes", "lamb",
    "lambs", "lambing", "goat", "goats", "horse", "horses", "pairs", "weaning", "weaned",
    "breeding", "bred", "vet", "vaccine", "vaccinated", "vaccinations", "lame", "sick",
    "branding", "preg",
    // land and grazing
    "pasture", "pastures", "paddock", "paddocks", "graze", "grazing", "grazed", "rotation",
    "rotate", "rotated", "forage", "grass", "hay", "feed", "feeding", "mineral", "minerals",
    "supplement", "acre", "acres", "soil", "ranch", "farm", "field", "fields", "range",
    "fence", "fences", "fencing", "corral", "barn", "irrigation", "seed", "seeded", "crop",
    "crops", "harvest", "weeds",
    // water and weather
    "rain", "rainfall", "rained", "raining", "drought", "snow", "frost", "freeze", "hail",
    "storm", "weather", "temperature", "water", "tank", "tanks", "trough", "creek", "pond",
    "windmill", "flood", "flooded", "flooding",
    // equipment
    "tractor", "baler", "truck", "trailer", "equipment",
    // the journal itself
    "diary", "journal", "entry", "entries", "notes", "logged",
    // phrases
    "this week", "last week", "this month", "last month", "this year", "last year",
    "this season", "head count", "stocking rate", "body condition", "weekly review",
];

/// Regexes run against the lower-cased message when no keyword matched.
pub const DEFAULT_OFF_TOPIC_PATTERNS: &[&str] = &[
    // code generation
    r"\b(write|generate|create|debug|fix|refactor)\b.*\b(code|script|program|function|class|regex|sql query|api)\b",
    r"\b(python|javascript|typescript|java|golang|html|css|sql)\b",
    // creative writing
    r"\b(write|compose|create)\b.*\b(poem|story|song|lyrics|essay|novel|haiku|limerick|screenplay)\b",
    r"\btell me a (joke|story)\b",
    // trivia / general knowledge
    r"\bcapital of\b",
    r"\bwho (invented|discovered|wrote|painted|won)\b",
    r"^(who|what|when|where) (is|was|were|are) the (tallest|largest|biggest|smallest|longest|first)\b",
    // math
    r"\b(solve|simplify|integrate|differentiate)\b.*(equation|integral|derivative|\d)",
    r"^what is \d+\s*[-+*/x^]\s*\d+",
    r"\b(algebra|calculus|trigonometry|quadratic)\b",
    // recipes
    r"\brecipes?\b",
    r"\bhow (do i|to) (cook|bake)\b",
    // travel
    r"\b(flights?|hotels?|vacation|itinerary|tourist|airbnb)\b",
    // entertainment
    r"\b(movies?|netflix|tv shows?|celebrit(y|ies)|video games?|playlist)\b",
    // politics
    r"\b(election|president|democrats?|republicans?|congress|senate|politics|political|vote for)\b",
    // prompt injection / jailbreak
    r"\bignore (all |any |the )?(previous|prior|above|earlier) (instructions|prompts|rules)\b",
    r"\b(jailbreak|dan mode|developer mode)\b",
    r"\bpretend (you are|you're|to be)\b",
    r"\byou are now\b",
    r"\b(system prompt|your instructions|your rules)\b",
    r"\bact as (a|an)\b",
    r"\bdisregard\b.*\b(instructions|rules|guidelines)\b",
];

/// Keyword set and pattern list the guard runs with.
#[derive(Debug, Clone)]
pub struct TopicGuardRules {
    pub keywords: Vec<String>,
    pub off_topic_patterns: Vec<String>,
    pub denial_reason: String,
}

impl Default for TopicGuardRules {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_FARM_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            off_topic_patterns: DEFAULT_OFF_TOPIC_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            denial_reason: OFF_TOPIC_REASON.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicVerdict {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TopicVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }
}

pub struct TopicGuard {
    keywords: HashSet<String>,
    patterns: Vec<Regex>,
    denial_reason: String,
}

impl TopicGuard {
    pub fn new(rules: TopicGuardRules) -> Result<Self, regex::Error> {
        let patterns = rules
            .off_topic_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            keywords: rules
                .keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
            patterns,
            denial_reason: rules.denial_reason,
        })
    }

    pub fn check(&self, message: &str) -> TopicVerdict {
        let normalized = message.trim().to_lowercase();
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        // Greetings and one-word acknowledgements.
        if tokens.len() < 2 {
            return TopicVerdict::allow();
        }

        let stripped: Vec<String> = tokens
            .iter()
            .map(|t| t.chars().filter(|c| c.is_alphanumeric()).collect())
            .collect();

        if stripped.iter().any(|t| self.keywords.contains(t)) {
            return TopicVerdict::allow();
        }

        if stripped
            .windows(2)
            .any(|pair| self.keywords.contains(&format!("{} {}", pair[0], pair[1])))
        {
            return TopicVerdict::allow();
        }

        if self.patterns.iter().any(|p| p.is_match(&normalized)) {
            return TopicVerdict {
                allowed: false,
                reason: Some(self.denial_reason.clone()),
            };
        }

        TopicVerdict::allow()
    }
}
