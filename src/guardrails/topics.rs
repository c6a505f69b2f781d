use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Document categories used by the relevance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Medical,
    Legal,
    Financial,
    Technical,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::Medical,
        Topic::Legal,
        Topic::Financial,
        Topic::Technical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Medical => "medical",
            Topic::Legal => "legal",
            Topic::Financial => "financial",
            Topic::Technical => "technical",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Topic::Medical => &[
                "medical",
                "health",
                "patient",
                "diagnosis",
                "treatment",
                "prescription",
                "symptoms",
                "doctor",
                "hospital",
                "clinical",
                "medicine",
                "healthcare",
                "report",
                "test results",
            ],
            Topic::Legal => &[
                "legal",
                "law",
                "contract",
                "agreement",
                "lawsuit",
                "court",
                "attorney",
                "legal document",
                "clause",
                "jurisdiction",
            ],
            Topic::Financial => &[
                "financial",
                "bank",
                "loan",
                "investment",
                "tax",
                "revenue",
                "profit",
                "loss",
                "balance sheet",
                "income statement",
            ],
            Topic::Technical => &[
                "technical",
                "code",
                "programming",
                "software",
                "hardware",
                "system",
                "network",
                "database",
                "algorithm",
            ],
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories whose keywords occur anywhere in `text` (case-insensitive).
pub fn detect_topics(text: &str) -> BTreeSet<Topic> {
    let lower = text.to_lowercase();
    Topic::ALL
        .into_iter()
        .filter(|topic| topic.keywords().iter().any(|kw| lower.contains(kw)))
        .collect()
}

pub const NSFW_KEYWORDS: &[&str] = &[
    "porn",
    "nude",
    "sexual",
    "explicit",
    "adult content",
    "nsfw",
    "not safe for work",
    "erotic",
    "xxx",
    "pornography",
];

pub fn contains_nsfw(text: &str) -> bool {
    let lower = text.to_lowercase();
    NSFW_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
