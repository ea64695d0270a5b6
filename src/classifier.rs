//! Inbound message classifier: bounce / unsubscribe / regular.
//!
//! Pattern matching only, no LLM. Runs before the sales reply pipeline so
//! delivery failures and opt-outs never reach sentiment analysis:
//! - Bounce indicators (SMTP 550, DSN failure notices) → `Bounce`
//! - Opt-out phrases ("unsubscribe", "remove me", ...) → `Unsubscribe`
//! - Anything else → `Regular`
//!
//! Bounce rules are checked first, so a bounce notice that quotes an
//! unsubscribe footer is still a bounce.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Classification of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Bounce,
    Unsubscribe,
    Regular,
}

impl MessageKind {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bounce => "bounce",
            Self::Unsubscribe => "unsubscribe",
            Self::Regular => "regular",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single classification rule with a compiled regex.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    /// Human-readable pattern description.
    pub pattern: String,
    /// Compiled regex, matched against the lower-cased subject + body.
    pub regex: Regex,
    /// Which kind a match produces.
    pub kind: MessageKind,
}

impl ClassifierRule {
    fn new(pattern: &str, kind: MessageKind) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(pattern)?,
            kind,
        })
    }
}

const BOUNCE_PATTERNS: &[&str] = &[
    r"550\s",
    r"delivery\sstatus\snotification\s\(failure\)",
    r"message\snot\sdelivered",
    r"permanent\sfailure",
    r"undeliverable",
];

const UNSUBSCRIBE_PATTERNS: &[&str] = &[
    r"stop",
    r"unsubscribe",
    r"remove\sme",
    r"not\sinterested",
    r"please\sstop",
];

static DEFAULT_CLASSIFIER: LazyLock<MessageClassifier> =
    LazyLock::new(MessageClassifier::default_rules);

/// Classify with the default rule sets.
pub fn classify(subject: &str, body: &str) -> MessageKind {
    DEFAULT_CLASSIFIER.classify(subject, body)
}

/// Ordered bounce and unsubscribe rule sets.
#[derive(Debug, Clone)]
pub struct MessageClassifier {
    bounce_rules: Vec<ClassifierRule>,
    unsubscribe_rules: Vec<ClassifierRule>,
}

impl MessageClassifier {
    /// Create a classifier with the default bounce and unsubscribe patterns.
    pub fn default_rules() -> Self {
        let compile = |patterns: &[&str], kind: MessageKind| -> Vec<ClassifierRule> {
            patterns
                .iter()
                .map(|p| ClassifierRule::new(p, kind).unwrap())
                .collect()
        };
        Self {
            bounce_rules: compile(BOUNCE_PATTERNS, MessageKind::Bounce),
            unsubscribe_rules: compile(UNSUBSCRIBE_PATTERNS, MessageKind::Unsubscribe),
        }
    }

    /// Create an empty classifier (everything is `Regular`).
    pub fn empty() -> Self {
        Self {
            bounce_rules: Vec::new(),
            unsubscribe_rules: Vec::new(),
        }
    }

    /// Append a bounce pattern. Patterns see lower-cased text.
    pub fn add_bounce_rule(&mut self, pattern: &str) -> Result<(), regex::Error> {
        self.bounce_rules
            .push(ClassifierRule::new(pattern, MessageKind::Bounce)?);
        Ok(())
    }

    /// Append an unsubscribe pattern. Patterns see lower-cased text.
    pub fn add_unsubscribe_rule(&mut self, pattern: &str) -> Result<(), regex::Error> {
        self.unsubscribe_rules
            .push(ClassifierRule::new(pattern, MessageKind::Unsubscribe)?);
        Ok(())
    }

    /// Return the first rule matching the message, bounce rules first.
    pub fn explain(&self, subject: &str, body: &str) -> Option<&ClassifierRule> {
        let text = format!("{subject} {body}").to_lowercase();
        self.bounce_rules
            .iter()
            .chain(self.unsubscribe_rules.iter())
            .find(|rule| rule.regex.is_match(&text))
    }

    /// Classify a message by subject and body.
    pub fn classify(&self, subject: &str, body: &str) -> MessageKind {
        match self.explain(subject, body) {
            Some(rule) => {
                debug!(
                    kind = rule.kind.label(),
                    rule = %rule.pattern,
                    "Message matched classifier rule"
                );
                rule.kind
            }
            None => MessageKind::Regular,
        }
    }
}

impl Default for MessageClassifier {
    fn default() -> Self {
        Self::default_rules()
    }
}
