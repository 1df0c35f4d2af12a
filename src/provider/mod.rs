//! Design-tool references resolved to rendered PNG bytes.
//!
//! - [`DesignApi`] - what a provider must supply: locate a frame, request a
//!   render URL, download bytes
//! - [`resolve`] - the shared cache-aware pipeline over any [`DesignApi`]
//! - [`FigmaApi`] / [`XdApi`] - the two HTTP-backed providers

pub mod figma;
pub mod http;
pub mod xd;

pub use figma::FigmaApi;
pub use http::ApiClient;
pub use xd::XdApi;

use log::info;
use url::Url;

use crate::cache::{CacheKey, DiskCache};
use crate::error::Result;
use crate::reference::Provider;

/// Size of the received image; used to pick a render scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A frame identified on the provider plus its freshness marker.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLocation {
    pub key: CacheKey,
    pub last_modified: String,
}

#[allow(async_fn_in_trait)]
pub trait DesignApi {
    fn provider(&self) -> Provider;

    /// Parses `url` and queries the metadata endpoint for the frame it names.
    async fn locate(&self, url: &Url, target: Dimensions) -> Result<FrameLocation>;

    /// Asks the provider for a URL the rendered frame can be fetched from.
    async fn render_url(&self, frame: &FrameLocation) -> Result<String>;

    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// Resolves `url` to PNG bytes, serving from `cache` while the provider's
/// last-modified timestamp is unchanged.
pub async fn resolve<A: DesignApi>(
    api: &A,
    cache: &DiskCache,
    url: &Url,
    target: Dimensions,
) -> Result<Vec<u8>> {
    let frame = api.locate(url, target).await?;

    if let Some(bytes) = cache.lookup(&frame.key, &frame.last_modified).await {
        return Ok(bytes);
    }

    info!("rendering {} frame {}", api.provider(), frame.key);
    let render_url = api.render_url(&frame).await?;
    let bytes = api.download(&render_url).await?;

    cache.store(&frame.key, &frame.last_modified, &bytes).await;

    Ok(bytes)
}

/// Figma clamps export scales to this range.
pub fn render_scale(target_width: u32, intrinsic_width: f64) -> f64 {
    (target_width as f64 / intrinsic_width).clamp(0.01, 4.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PixelPerfectError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeApi {
        last_modified: Mutex<String>,
        image: Mutex<Vec<u8>>,
        render_calls: AtomicUsize,
        fail_render: bool,
    }

    impl FakeApi {
        fn new(last_modified: &str, image: &[u8]) -> Self {
            Self {
                last_modified: Mutex::new(last_modified.to_string()),
                image: Mutex::new(image.to_vec()),
                render_calls: AtomicUsize::new(0),
                fail_render: false,
            }
        }

        fn update(&self, last_modified: &str, image: &[u8]) {
            *self.last_modified.lock().unwrap() = last_modified.to_string();
            *self.image.lock().unwrap() = image.to_vec();
        }

        fn renders(&self) -> usize {
            self.render_calls.load(Ordering::SeqCst)
        }
    }

    impl DesignApi for FakeApi {
        fn provider(&self) -> Provider {
            Provider::Figma
        }

        async fn locate(&self, url: &Url, target: Dimensions) -> Result<FrameLocation> {
            Ok(FrameLocation {
                key: CacheKey {
                    document_id: url.path().trim_matches('/').to_string(),
                    frame_id: "1:2".to_string(),
                    version: None,
                    scale: Some(render_scale(target.width, 100.0)),
                },
                last_modified: self.last_modified.lock().unwrap().clone(),
            })
        }

        async fn render_url(&self, _frame: &FrameLocation) -> Result<String> {
            self.render_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_render {
                return Err(PixelPerfectError::remote(
                    Provider::Figma,
                    None,
                    "Render timeout",
                ));
            }
            Ok("https://renders.example/1.png".to_string())
        }

        async fn download(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(self.image.lock().unwrap().clone())
        }
    }

    fn url() -> Url {
        Url::parse("https://www.figma.com/file/ABC").unwrap()
    }

    const TARGET: Dimensions = Dimensions {
        width: 200,
        height: 100,
    };

    #[tokio::test]
    async fn second_resolution_is_served_from_cache() {
        let dir = TempDir::new().expect("tempdir");
        let cache = DiskCache::new(dir.path());
        let api = FakeApi::new("2021-03-01T10:00:00Z", b"first");

        let first = resolve(&api, &cache, &url(), TARGET).await.expect("first");
        let second = resolve(&api, &cache, &url(), TARGET).await.expect("second");

        assert_eq!(first, b"first");
        assert_eq!(second, first);
        assert_eq!(api.renders(), 1);
    }

    #[tokio::test]
    async fn changed_last_modified_invalidates_cache() {
        let dir = TempDir::new().expect("tempdir");
        let cache = DiskCache::new(dir.path());
        let api = FakeApi::new("2021-03-01T10:00:00Z", b"first");

        resolve(&api, &cache, &url(), TARGET).await.expect("first");
        api.update("2021-03-02T10:00:00Z", b"second");
        let refreshed = resolve(&api, &cache, &url(), TARGET).await.expect("second");

        assert_eq!(refreshed, b"second");
        assert_eq!(api.renders(), 2);
    }

    #[tokio::test]
    async fn different_scale_is_a_different_entry() {
        let dir = TempDir::new().expect("tempdir");
        let cache = DiskCache::new(dir.path());
        let api = FakeApi::new("2021-03-01T10:00:00Z", b"img");

        resolve(&api, &cache, &url(), TARGET).await.expect("1x");
        resolve(
            &api,
            &cache,
            &url(),
            Dimensions {
                width: 400,
                height: 200,
            },
        )
        .await
        .expect("2x");

        assert_eq!(api.renders(), 2);
    }

    #[tokio::test]
    async fn render_errors_propagate() {
        let dir = TempDir::new().expect("tempdir");
        let cache = DiskCache::new(dir.path());
        let api = FakeApi {
            fail_render: true,
            ..FakeApi::new("2021-03-01T10:00:00Z", b"img")
        };

        let err = resolve(&api, &cache, &url(), TARGET)
            .await
            .expect_err("render failure");
        assert!(matches!(err, PixelPerfectError::Remote { .. }));
    }

    #[tokio::test]
    async fn unwritable_cache_still_returns_bytes() {
        let dir = TempDir::new().expect("tempdir");
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").expect("write");
        let cache = DiskCache::new(blocker.join("figma"));
        let api = FakeApi::new("2021-03-01T10:00:00Z", b"img");

        let bytes = resolve(&api, &cache, &url(), TARGET).await.expect("resolve");
        assert_eq!(bytes, b"img");
    }

    #[test]
    fn render_scale_is_clamped() {
        assert_eq!(render_scale(200, 100.0), 2.0);
        assert_eq!(render_scale(10_000, 100.0), 4.0);
        assert_eq!(render_scale(1, 1_000.0), 0.01);
    }
}
