use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PixelPerfectError, Result};

const FIGMA_PREFIXES: &[&str] = &["https://www.figma.com", "https://figma.com"];
const XD_PREFIXES: &[&str] = &["https://xd.adobe.com"];

/// Design tool a remote reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Figma,
    Xd,
}

impl Provider {
    /// Directory name for this provider's cache.
    pub fn cache_namespace(&self) -> &'static str {
        match self {
            Provider::Figma => "figma",
            Provider::Xd => "xd",
        }
    }

    /// Config key holding this provider's token.
    pub fn token_key(&self) -> &'static str {
        match self {
            Provider::Figma => "figmaToken",
            Provider::Xd => "xdToken",
        }
    }

    fn detect(value: &str) -> Option<Self> {
        if FIGMA_PREFIXES.iter().any(|p| value.starts_with(p)) {
            Some(Provider::Figma)
        } else if XD_PREFIXES.iter().any(|p| value.starts_with(p)) {
            Some(Provider::Xd)
        } else {
            None
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Figma => f.write_str("Figma"),
            Provider::Xd => f.write_str("XD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteReference {
    pub provider: Provider,
    pub url: Url,
}

/// What the received image is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedReference {
    /// Encoded PNG bytes, used as-is.
    Bytes(Vec<u8>),
    FilePath(PathBuf),
    Remote(RemoteReference),
}

impl ExpectedReference {
    /// Classifies a string once: known design-tool URLs become remote
    /// references, everything else is treated as a local path.
    pub fn parse(value: &str) -> Result<Self> {
        match Provider::detect(value) {
            Some(provider) => {
                let url = Url::parse(value).map_err(|e| {
                    PixelPerfectError::usage(format!("Invalid {provider} URL '{value}': {e}"))
                })?;
                Ok(ExpectedReference::Remote(RemoteReference { provider, url }))
            }
            None => Ok(ExpectedReference::FilePath(PathBuf::from(value))),
        }
    }

    /// Short human description for messages and JSON output.
    pub fn describe(&self) -> String {
        match self {
            ExpectedReference::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            ExpectedReference::FilePath(path) => path.display().to_string(),
            ExpectedReference::Remote(remote) => remote.url.to_string(),
        }
    }
}

impl From<Vec<u8>> for ExpectedReference {
    fn from(bytes: Vec<u8>) -> Self {
        ExpectedReference::Bytes(bytes)
    }
}

impl From<&[u8]> for ExpectedReference {
    fn from(bytes: &[u8]) -> Self {
        ExpectedReference::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for ExpectedReference {
    fn from(path: PathBuf) -> Self {
        ExpectedReference::FilePath(path)
    }
}

impl From<RemoteReference> for ExpectedReference {
    fn from(remote: RemoteReference) -> Self {
        ExpectedReference::Remote(remote)
    }
}
