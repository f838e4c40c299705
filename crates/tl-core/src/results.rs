//! Result shapes of the three remote AI operations.
//!
//! These mirror the JSON bodies of `/api/classify` and `/api/summarize`;
//! compression results carry raw bytes and have no JSON envelope.

use serde::{Deserialize, Serialize};

/// Remote (or offline) classification of a message.
///
/// All three fields are required on the wire; a body missing any of them
/// is a malformed response, not a partial result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub score: f64,
    pub matched: Vec<String>,
}

impl ClassificationResult {
    /// True when `score` lies in the documented `[0, 1]` range.
    pub fn score_in_range(&self) -> bool {
        (0.0..=1.0).contains(&self.score)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
    /// Selected sentences, when the service reports them individually.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sentences: Vec<String>,
}

impl SummaryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }
}

/// Compressed image as returned by the service: the full body plus the
/// content type it was served with.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressionResult {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl CompressionResult {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the content type, for saving to disk.
    pub fn extension(&self) -> &'static str {
        let essence = self
            .content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}
