//! Adobe XD cloud content API: document for metadata, artboard for renders.
//! XD has no scale negotiation; artboards are fetched at native size.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::{ApiClient, DesignApi, Dimensions, FrameLocation};
use crate::cache::CacheKey;
use crate::error::{PixelPerfectError, Result};
use crate::reference::Provider;

const DEFAULT_BASE_URL: &str = "https://xdce.adobe.io/v2";
const AUTH_HEADER: &str = "x-api-key";

/// Identifying parts of an XD share URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XdDocumentRef {
    pub document_key: String,
    pub screen_id: Option<String>,
    pub version: Option<String>,
}

impl XdDocumentRef {
    /// Accepts `/view/<DOCUMENT_KEY>/` optionally followed by `screen/<ID>`.
    pub fn parse(url: &Url) -> Result<Self> {
        let segments: Vec<&str> = url
            .path_segments()
            .map(|c| c.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let document_key = segments
            .iter()
            .position(|&s| s == "view")
            .and_then(|i| segments.get(i + 1))
            .map(|s| s.to_string())
            .ok_or_else(|| {
                PixelPerfectError::usage(format!(
                    "The XD URL needs to point to a specific document (missing document key in '{url}')"
                ))
            })?;

        let screen_id = segments
            .iter()
            .position(|&s| s == "screen")
            .and_then(|i| segments.get(i + 1))
            .map(|s| s.to_string());

        let version = url
            .query_pairs()
            .find(|(k, _)| k == "version")
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty());

        Ok(Self {
            document_key,
            screen_id,
            version,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XdDocument {
    #[serde(default)]
    pub home_artboard_id: Option<String>,
    #[serde(default, rename = "lastupdated", alias = "lastUpdated")]
    pub last_updated: Option<serde_json::Value>,
}

impl XdDocument {
    fn last_updated(&self) -> String {
        match &self.last_updated {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct XdArtboard {
    #[serde(default)]
    pub thumbnail: Option<XdThumbnail>,
}

#[derive(Debug, Deserialize)]
pub struct XdThumbnail {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct XdApi {
    client: ApiClient,
    base_url: String,
}

impl XdApi {
    pub fn new(token: &str, timeout: Duration) -> Result<Self> {
        Self::with_base_url(token, DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(token: &str, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(Provider::Xd, AUTH_HEADER, token, timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn document_url(&self, document_key: &str, version: Option<&str>) -> Result<Url> {
        self.versioned(format!("{}/document/{}", self.base_url, document_key), version)
    }

    pub fn artboard_url(&self, key: &CacheKey) -> Result<Url> {
        self.versioned(
            format!(
                "{}/document/{}/artboard/{}",
                self.base_url, key.document_id, key.frame_id
            ),
            key.version.as_deref(),
        )
    }

    fn versioned(&self, raw: String, version: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&raw)?;
        if let Some(version) = version {
            url.query_pairs_mut().append_pair("version", version);
        }
        Ok(url)
    }
}

impl DesignApi for XdApi {
    fn provider(&self) -> Provider {
        Provider::Xd
    }

    async fn locate(&self, url: &Url, _target: Dimensions) -> Result<FrameLocation> {
        let reference = XdDocumentRef::parse(url)?;
        let document: XdDocument = self
            .client
            .get_json(self.document_url(&reference.document_key, reference.version.as_deref())?)
            .await?;
        locate_in_document(reference, document)
    }

    async fn render_url(&self, frame: &FrameLocation) -> Result<String> {
        let artboard: XdArtboard = self.client.get_json(self.artboard_url(&frame.key)?).await?;
        artboard.thumbnail.map(|t| t.url).ok_or_else(|| {
            PixelPerfectError::remote(
                Provider::Xd,
                None,
                format!("XD artboard {} has no thumbnail", frame.key.frame_id),
            )
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.client.download(url).await
    }
}

fn locate_in_document(reference: XdDocumentRef, document: XdDocument) -> Result<FrameLocation> {
    let last_modified = document.last_updated();
    let frame_id = match reference.screen_id {
        Some(id) => id,
        None => document.home_artboard_id.ok_or_else(|| {
            PixelPerfectError::remote(Provider::Xd, None, "Cannot find main XD artboard")
        })?,
    };

    Ok(FrameLocation {
        key: CacheKey {
            document_id: reference.document_key,
            frame_id,
            version: reference.version,
            scale: None,
        },
        last_modified,
    })
}
