//! Offline keyword classifier with the same three-label contract as the
//! remote `/api/classify` endpoint (`sos` / `urgent` / `normal`).
//!
//! Independent of [`crate::urgency::is_urgent`]: the two use different
//! phrase tables and may disagree. Neither result is merged into the other.

use crate::results::ClassificationResult;

/// Phrases that indicate an immediate life-safety emergency.
pub const SOS_PHRASES: [&str; 13] = [
    "sos",
    "mayday",
    "help me",
    "help!",
    "evacuate",
    "trapped",
    "under rubble",
    "bleeding",
    "unconscious",
    "not breathing",
    "no pulse",
    "blood",
    "explosion",
];

pub const URGENT_PHRASES: [&str; 12] = [
    "fire",
    "injury",
    "injured",
    "flood",
    "collapse",
    "gas leak",
    "smoke",
    "power out",
    "danger",
    "stuck",
    "medical",
    "dangerous",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriageLabel {
    Sos,
    Urgent,
    Normal,
}

impl TriageLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sos => "sos",
            Self::Urgent => "urgent",
            Self::Normal => "normal",
        }
    }

    /// Heuristic confidence attached to a keyword verdict.
    pub fn score(&self) -> f64 {
        match self {
            Self::Sos => 1.0,
            Self::Urgent => 0.7,
            Self::Normal => 0.1,
        }
    }
}

fn hits(text: &str, table: &[&'static str]) -> Vec<String> {
    table
        .iter()
        .filter(|phrase| text.contains(*phrase))
        .map(|phrase| phrase.to_string())
        .collect()
}

/// Classify `text` locally. SOS phrases win over urgent phrases; blank input
/// is `normal` with a zero score.
pub fn classify_offline(text: &str) -> ClassificationResult {
    if text.trim().is_empty() {
        return ClassificationResult {
            label: TriageLabel::Normal.as_str().to_string(),
            score: 0.0,
            matched: Vec::new(),
        };
    }

    let lower = text.to_lowercase();
    let (label, matched) = {
        let sos = hits(&lower, &SOS_PHRASES);
        if !sos.is_empty() {
            (TriageLabel::Sos, sos)
        } else {
            let urgent = hits(&lower, &URGENT_PHRASES);
            if urgent.is_empty() {
                (TriageLabel::Normal, urgent)
            } else {
                (TriageLabel::Urgent, urgent)
            }
        }
    };

    ClassificationResult {
        label: label.as_str().to_string(),
        score: label.score(),
        matched,
    }
}
