//! Figma REST API: file nodes for metadata, images for renders.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::{render_scale, ApiClient, DesignApi, Dimensions, FrameLocation};
use crate::cache::CacheKey;
use crate::error::{PixelPerfectError, Result};
use crate::reference::Provider;

const DEFAULT_BASE_URL: &str = "https://api.figma.com/v1";
const AUTH_HEADER: &str = "x-figma-token";

/// Identifying parts of a Figma frame URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigmaFrameRef {
    pub file_key: String,
    pub node_id: String,
    pub version_id: Option<String>,
}

impl FigmaFrameRef {
    /// Accepts `/file/<KEY>/...` and `/design/<KEY>/...` URLs with a `node-id`
    /// query parameter in either `12:34` or `12-34` form.
    pub fn parse(url: &Url) -> Result<Self> {
        let segments: Vec<&str> = url.path_segments().map(|c| c.collect()).unwrap_or_default();

        let file_key = segments
            .iter()
            .position(|&s| s == "file" || s == "design" || s == "proto")
            .and_then(|i| segments.get(i + 1))
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                PixelPerfectError::usage(format!("Figma URL missing file key in '{url}'"))
            })?;

        let node_id = query_param(url, "node-id")
            .map(|v| v.replace('-', ":"))
            .ok_or_else(|| {
                PixelPerfectError::usage(format!(
                    "The Figma URL needs a node-id pointing to a specific frame: '{url}'"
                ))
            })?;

        Ok(Self {
            file_key,
            node_id,
            version_id: query_param(url, "version-id"),
        })
    }
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaNodesResponse {
    pub last_modified: String,
    #[serde(default)]
    pub nodes: HashMap<String, Option<FigmaNodeWrapper>>,
}

#[derive(Debug, Deserialize)]
pub struct FigmaNodeWrapper {
    pub document: FigmaNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaNode {
    #[serde(default)]
    pub absolute_bounding_box: Option<FigmaBoundingBox>,
}

#[derive(Debug, Deserialize)]
pub struct FigmaBoundingBox {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Deserialize)]
pub struct FigmaImageResponse {
    #[serde(default)]
    pub images: HashMap<String, Option<String>>,
}

#[derive(Debug, Clone)]
pub struct FigmaApi {
    client: ApiClient,
    base_url: String,
}

impl FigmaApi {
    pub fn new(token: &str, timeout: Duration) -> Result<Self> {
        Self::with_base_url(token, DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(token: &str, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(Provider::Figma, AUTH_HEADER, token, timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn nodes_url(&self, frame: &FigmaFrameRef) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/files/{}/nodes", self.base_url, frame.file_key))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("depth", "0");
            query.append_pair("ids", &frame.node_id);
            if let Some(version) = &frame.version_id {
                query.append_pair("version", version);
            }
        }
        Ok(url)
    }

    pub fn images_url(&self, key: &CacheKey) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/images/{}", self.base_url, key.document_id))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("scale", &key.scale.unwrap_or(1.0).to_string());
            query.append_pair("ids", &key.frame_id);
            query.append_pair("format", "png");
            if let Some(version) = &key.version {
                query.append_pair("version", version);
            }
        }
        Ok(url)
    }
}

impl DesignApi for FigmaApi {
    fn provider(&self) -> Provider {
        Provider::Figma
    }

    async fn locate(&self, url: &Url, target: Dimensions) -> Result<FrameLocation> {
        let frame = FigmaFrameRef::parse(url)?;
        let response: FigmaNodesResponse = self.client.get_json(self.nodes_url(&frame)?).await?;
        locate_in_response(frame, response, target)
    }

    async fn render_url(&self, frame: &FrameLocation) -> Result<String> {
        let response: FigmaImageResponse = self.client.get_json(self.images_url(&frame.key)?).await?;
        response
            .images
            .get(&frame.key.frame_id)
            .cloned()
            .flatten()
            .ok_or_else(|| {
                PixelPerfectError::remote(
                    Provider::Figma,
                    None,
                    format!("Cannot find Figma image URL for node {}", frame.key.frame_id),
                )
            })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.client.download(url).await
    }
}

fn locate_in_response(
    frame: FigmaFrameRef,
    response: FigmaNodesResponse,
    target: Dimensions,
) -> Result<FrameLocation> {
    let node = response
        .nodes
        .get(&frame.node_id)
        .and_then(Option::as_ref)
        .ok_or_else(|| {
            PixelPerfectError::remote(
                Provider::Figma,
                None,
                format!("Cannot find Figma node {}", frame.node_id),
            )
        })?;

    let bounds = node
        .document
        .absolute_bounding_box
        .as_ref()
        .filter(|b| b.width > 0.0)
        .ok_or_else(|| {
            PixelPerfectError::usage(format!(
                "Figma node {} has no bounds; the URL must point to a frame",
                frame.node_id
            ))
        })?;

    Ok(FrameLocation {
        key: CacheKey {
            document_id: frame.file_key,
            frame_id: frame.node_id,
            version: frame.version_id,
            scale: Some(render_scale(target.width, bounds.width)),
        },
        last_modified: response.last_modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> Result<FigmaFrameRef> {
        FigmaFrameRef::parse(&Url::parse(url).unwrap())
    }

    fn api() -> FigmaApi {
        FigmaApi::new("token", Duration::from_secs(5)).expect("api")
    }

    #[test]
    fn parses_file_url_with_encoded_node_id() {
        let frame = parse("https://www.figma.com/file/S2ukcXYvojo86oMu1tI9pt/Test-2-Colors?node-id=20%3A2")
            .expect("parse");
        assert_eq!(frame.file_key, "S2ukcXYvojo86oMu1tI9pt");
        assert_eq!(frame.node_id, "20:2");
        assert!(frame.version_id.is_none());
    }

    #[test]
    fn parses_design_url_with_dashed_node_id_and_version() {
        let frame = parse("https://www.figma.com/design/XYZ789/Name?node-id=5-10&version-id=123")
            .expect("parse");
        assert_eq!(frame.file_key, "XYZ789");
        assert_eq!(frame.node_id, "5:10");
        assert_eq!(frame.version_id.as_deref(), Some("123"));
    }

    #[test]
    fn missing_node_id_is_a_usage_error() {
        let err = parse("https://www.figma.com/file/ABC123/My-Design").expect_err("no node");
        match err {
            PixelPerfectError::Usage(msg) => assert!(msg.contains("node-id")),
            other => panic!("expected usage error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_key_is_a_usage_error() {
        let err = parse("https://www.figma.com/community?node-id=1-2").expect_err("no key");
        assert!(matches!(err, PixelPerfectError::Usage(msg) if msg.contains("file key")));
    }

    #[test]
    fn nodes_url_carries_depth_ids_and_version() {
        let frame = FigmaFrameRef {
            file_key: "KEY".into(),
            node_id: "20:2".into(),
            version_id: Some("99".into()),
        };
        let url = api().nodes_url(&frame).expect("url");
        assert_eq!(
            url.as_str(),
            "https://api.figma.com/v1/files/KEY/nodes?depth=0&ids=20%3A2&version=99"
        );
    }

    #[test]
    fn images_url_carries_scale_and_format() {
        let key = CacheKey {
            document_id: "KEY".into(),
            frame_id: "20:2".into(),
            version: None,
            scale: Some(2.0),
        };
        let url = api().images_url(&key).expect("url");
        assert_eq!(
            url.as_str(),
            "https://api.figma.com/v1/images/KEY?scale=2&ids=20%3A2&format=png"
        );
    }

    #[test]
    fn locate_computes_scale_from_bounding_box() {
        let response: FigmaNodesResponse = serde_json::from_str(
            r#"{
                "name": "Test",
                "lastModified": "2020-05-19T12:00:00Z",
                "nodes": {
                    "20:2": {"document": {"id": "20:2", "absoluteBoundingBox": {"x": 0, "y": 0, "width": 100, "height": 50}}}
                }
            }"#,
        )
        .expect("json");
        let frame = FigmaFrameRef {
            file_key: "KEY".into(),
            node_id: "20:2".into(),
            version_id: None,
        };

        let located = locate_in_response(
            frame,
            response,
            Dimensions {
                width: 200,
                height: 100,
            },
        )
        .expect("locate");

        assert_eq!(located.key.scale, Some(2.0));
        assert_eq!(located.last_modified, "2020-05-19T12:00:00Z");
    }

    #[test]
    fn locate_reports_missing_node() {
        let response: FigmaNodesResponse =
            serde_json::from_str(r#"{"lastModified": "x", "nodes": {"20:2": null}}"#).expect("json");
        let frame = FigmaFrameRef {
            file_key: "KEY".into(),
            node_id: "20:2".into(),
            version_id: None,
        };

        let err = locate_in_response(
            frame,
            response,
            Dimensions {
                width: 1,
                height: 1,
            },
        )
        .expect_err("missing node");
        assert!(matches!(err, PixelPerfectError::Remote { .. }));
    }

    #[test]
    fn locate_requires_bounds() {
        let response: FigmaNodesResponse = serde_json::from_str(
            r#"{"lastModified": "x", "nodes": {"1:1": {"document": {"id": "1:1"}}}}"#,
        )
        .expect("json");
        let frame = FigmaFrameRef {
            file_key: "KEY".into(),
            node_id: "1:1".into(),
            version_id: None,
        };

        let err = locate_in_response(
            frame,
            response,
            Dimensions {
                width: 1,
                height: 1,
            },
        )
        .expect_err("no bounds");
        assert!(matches!(err, PixelPerfectError::Usage(_)));
    }
}
