//! Request guardrails: toxicity, NSFW and document relevance.
//!
//! All three checks lean permissive when they cannot decide: a failing
//! classifier scores 0.0, and a question or document set without detected
//! topics counts as relevant.

pub mod classifier;
pub mod topics;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Settings;

pub use classifier::{Classifier, HuggingFaceClassifier, LabelScore};
pub use topics::{contains_nsfw, detect_topics, Topic};

/// Scores above this are toxic.
pub const TOXICITY_THRESHOLD: f32 = 0.7;
/// Only the head of the message is classified.
pub const MAX_CLASSIFIED_CHARS: usize = 512;
pub const TOXIC_LABELS: &[&str] = &["toxic", "obscene", "insult", "threat"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToxicityCheck {
    pub score: f32,
    pub safe: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceCheck {
    pub is_relevant: bool,
    pub document_topics: Vec<Topic>,
    pub question_topics: Vec<Topic>,
}

/// Why a request was refused. Only the first failing check is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RejectionReason {
    ToxicContent,
    NsfwContent,
    Irrelevant { document_topics: Vec<Topic> },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::ToxicContent => f.write_str("Toxic content detected"),
            RejectionReason::NsfwContent => f.write_str("NSFW content requested"),
            RejectionReason::Irrelevant { document_topics } => {
                let topics: Vec<&str> = document_topics.iter().map(Topic::as_str).collect();
                write!(
                    f,
                    "Question is not relevant to uploaded documents. Document topics: {}",
                    topics.join(", ")
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailVerdict {
    pub safe: bool,
    pub toxicity_score: f32,
    pub is_nsfw: bool,
    pub is_relevant: bool,
    pub document_topics: Vec<Topic>,
    pub question_topics: Vec<Topic>,
    pub rejection_reason: Option<RejectionReason>,
}

pub struct GuardrailService {
    classifier: Option<Arc<dyn Classifier>>,
}

impl GuardrailService {
    pub fn new(classifier: Option<Arc<dyn Classifier>>) -> Self {
        Self { classifier }
    }

    /// Hugging Face classifier when `HF_API_KEY` is configured, otherwise
    /// keyword-only gating.
    pub fn from_settings(settings: &Settings) -> Self {
        let classifier = settings
            .huggingface_api_key
            .as_deref()
            .and_then(|key| match HuggingFaceClassifier::new(key) {
                Ok(client) => {
                    info!("Toxicity classifier: {}", classifier::TOXICITY_MODEL);
                    Some(Arc::new(client) as Arc<dyn Classifier>)
                }
                Err(err) => {
                    warn!("Toxicity classifier unavailable: {}", err);
                    None
                }
            });
        if classifier.is_none() {
            warn!("HF_API_KEY not set - toxicity check disabled");
        }
        Self::new(classifier)
    }

    pub async fn check_toxicity(&self, text: &str) -> ToxicityCheck {
        let Some(classifier) = &self.classifier else {
            return ToxicityCheck {
                score: 0.0,
                safe: true,
            };
        };

        let head: String = text.chars().take(MAX_CLASSIFIED_CHARS).collect();
        let score = match classifier.classify(&head).await {
            Ok(labels) => labels
                .iter()
                .filter(|l| TOXIC_LABELS.contains(&l.label.as_str()))
                .map(|l| l.score)
                .fold(None, |max: Option<f32>, s| Some(max.map_or(s, |m| m.max(s))))
                .unwrap_or(0.0),
            Err(err) => {
                warn!("Toxicity classifier failed, treating as safe: {}", err);
                0.0
            }
        };

        ToxicityCheck {
            score,
            safe: score <= TOXICITY_THRESHOLD,
        }
    }

    pub fn check_nsfw(&self, text: &str, _images: &[String]) -> bool {
        contains_nsfw(text)
    }

    pub fn check_relevance(&self, question: &str, document_context: &[String]) -> RelevanceCheck {
        if document_context.is_empty() {
            return RelevanceCheck {
                is_relevant: true,
                document_topics: Vec::new(),
                question_topics: Vec::new(),
            };
        }

        let document_topics = detect_topics(&document_context.join(" "));
        let question_topics = detect_topics(question);
        let is_relevant = topics_overlap(&question_topics, &document_topics);

        RelevanceCheck {
            is_relevant,
            document_topics: document_topics.into_iter().collect(),
            question_topics: question_topics.into_iter().collect(),
        }
    }

    pub async fn validate(
        &self,
        message: &str,
        images: &[String],
        document_context: &[String],
    ) -> GuardrailVerdict {
        let toxicity = self.check_toxicity(message).await;
        let is_nsfw = self.check_nsfw(message, images);
        let relevance = self.check_relevance(message, document_context);

        let rejection_reason = if !toxicity.safe {
            Some(RejectionReason::ToxicContent)
        } else if is_nsfw {
            Some(RejectionReason::NsfwContent)
        } else if !relevance.is_relevant {
            Some(RejectionReason::Irrelevant {
                document_topics: relevance.document_topics.clone(),
            })
        } else {
            None
        };

        debug!(
            toxicity = toxicity.score,
            nsfw = is_nsfw,
            relevant = relevance.is_relevant,
            "Guardrail checks complete"
        );

        GuardrailVerdict {
            safe: rejection_reason.is_none(),
            toxicity_score: toxicity.score,
            is_nsfw,
            is_relevant: relevance.is_relevant,
            document_topics: relevance.document_topics,
            question_topics: relevance.question_topics,
            rejection_reason,
        }
    }
}

fn topics_overlap(question: &BTreeSet<Topic>, documents: &BTreeSet<Topic>) -> bool {
    if documents.is_empty() || question.is_empty() {
        return true;
    }
    !question.is_disjoint(documents)
}
