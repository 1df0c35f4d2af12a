use crate::reference::Provider;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum PixelPerfectError {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{provider} API error (status: {status:?}): {message}")]
    Remote {
        provider: Provider,
        status: Option<StatusCode>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image comparison error: {0}")]
    Comparison(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PixelPerfectError {
    pub fn usage(message: impl Into<String>) -> Self {
        PixelPerfectError::Usage(message.into())
    }

    pub fn remote(provider: Provider, status: Option<StatusCode>, message: impl Into<String>) -> Self {
        PixelPerfectError::Remote {
            provider,
            status,
            message: message.into(),
        }
    }

    /// Whether the failure happened before a verdict could be computed because
    /// of how the assertion was called (as opposed to the environment).
    pub fn is_usage(&self) -> bool {
        matches!(self, PixelPerfectError::Usage(_) | PixelPerfectError::Config(_))
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            PixelPerfectError::Usage(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("node-id") {
                    ErrorPayload::new(
                        ErrorCategory::Usage,
                        msg.to_string(),
                        "Point the Figma URL at a frame (e.g., ?node-id=12-34).",
                    )
                } else if lower.contains("file key") || lower.contains("document key") {
                    ErrorPayload::new(
                        ErrorCategory::Usage,
                        msg.to_string(),
                        "Use a design URL that includes the document id (https://www.figma.com/file/<FILE_KEY>/... or https://xd.adobe.com/view/<DOCUMENT_KEY>/).",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Usage,
                        msg.to_string(),
                        "Pass PNG bytes, an existing PNG path, or a Figma/XD URL as `expected`.",
                    )
                }
            }
            PixelPerfectError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("figmatoken") || lower.contains("figma_token") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Set FIGMA_TOKEN or pass figmaToken in the configuration.",
                    )
                } else if lower.contains("xdtoken") || lower.contains("xd_token") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Set XD_TOKEN or pass xdToken in the configuration.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check the configuration file and flags.",
                    )
                }
            }
            PixelPerfectError::Remote {
                provider,
                status,
                message,
            } => ErrorPayload::new(
                ErrorCategory::Remote,
                format!("{provider} API error (status {:?}): {}", status, message),
                "Check the token, the URL and rate limits; retry after waiting.",
            ),
            PixelPerfectError::Network(e) => ErrorPayload::new(
                ErrorCategory::Network,
                e.to_string(),
                "Check connectivity/proxy/VPN and retry.",
            ),
            PixelPerfectError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Usage,
                e.to_string(),
                "Verify the design URL (e.g., https://www.figma.com/file/...).",
            ),
            PixelPerfectError::Io(e) => ErrorPayload::new(
                ErrorCategory::Io,
                e.to_string(),
                "Check that the report directory is writable.",
            ),
            PixelPerfectError::Image(e) => ErrorPayload::new(
                ErrorCategory::Image,
                e.to_string(),
                "Verify both images are valid PNG files.",
            ),
            PixelPerfectError::Comparison(msg) => ErrorPayload::new(
                ErrorCategory::Image,
                msg.to_string(),
                "Verify both images are valid 8-bit PNG files.",
            ),
            PixelPerfectError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Remote,
                e.to_string(),
                "The provider returned an unexpected payload; run with --verbose for details.",
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, PixelPerfectError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Usage,
    Config,
    Remote,
    Network,
    Image,
    Io,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
