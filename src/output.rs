use serde::Serialize;

use crate::assertion::Outcome;
use crate::diff::DiffStats;
use crate::error::ErrorPayload;
use crate::report::ArtifactPaths;

/// Schema version for output payloads.
pub const OUTPUT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum PixelPerfectOutput {
    Compare(CompareOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareOutput {
    pub version: String,
    pub name: String,
    pub expected: String,
    pub passed: bool,
    pub message: String,
    pub pixel_threshold: f64,
    pub color_threshold: f64,
    #[serde(flatten)]
    pub stats: DiffStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactPaths>,
}

impl CompareOutput {
    pub fn from_outcome(
        outcome: &Outcome,
        name: &str,
        expected: &str,
        color_threshold: f64,
    ) -> Self {
        Self {
            version: OUTPUT_VERSION.to_string(),
            name: name.to_string(),
            expected: expected.to_string(),
            passed: outcome.pass,
            message: outcome.message(),
            pixel_threshold: outcome.verdict.pixel_threshold,
            color_threshold,
            stats: outcome.verdict.stats(),
            artifacts: outcome.artifacts.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    pub error: ErrorPayload,
}
