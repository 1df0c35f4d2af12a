//! The pixel-perfect assertion: acquire the expected image, diff it against
//! the received one, and persist artifacts for review.

use log::debug;

use crate::bitmap::png_dimensions;
use crate::cache::DiskCache;
use crate::config::{global_store, ConfigStore, Policy, PolicyOverrides};
use crate::diff::{diff, Verdict};
use crate::error::{PixelPerfectError, Result};
use crate::provider::{resolve, Dimensions, FigmaApi, XdApi};
use crate::reference::{ExpectedReference, Provider, RemoteReference};
use crate::report::{write_report, ArtifactPaths};

const FALLBACK_TEST_NAME: &str = "pixel-perfect";

/// Result of one assertion. A failed comparison is `pass == false`, not an error.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub pass: bool,
    pub verdict: Verdict,
    /// Paths actually written, if a report was due.
    pub artifacts: Option<ArtifactPaths>,
}

impl Outcome {
    pub fn message(&self) -> String {
        self.verdict.message()
    }
}

/// Assertion context: a configuration store plus provider endpoints.
#[derive(Debug, Clone)]
pub struct PixelPerfect<'s> {
    store: &'s ConfigStore,
    figma_base_url: Option<String>,
    xd_base_url: Option<String>,
}

impl PixelPerfect<'static> {
    /// Context backed by the process-wide store.
    pub fn global() -> Self {
        Self::new(global_store())
    }
}

impl<'s> PixelPerfect<'s> {
    pub fn new(store: &'s ConfigStore) -> Self {
        Self {
            store,
            figma_base_url: None,
            xd_base_url: None,
        }
    }

    pub fn with_figma_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.figma_base_url = Some(base_url.into());
        self
    }

    pub fn with_xd_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.xd_base_url = Some(base_url.into());
        self
    }

    pub fn policy(&self, overrides: Option<&PolicyOverrides>) -> Policy {
        self.store.merge(overrides)
    }

    /// Compares PNG bytes `received` against `expected`.
    pub async fn assert(
        &self,
        received: &[u8],
        expected: impl Into<ExpectedReference>,
        overrides: Option<&PolicyOverrides>,
        test_name: &str,
    ) -> Result<Outcome> {
        let policy = self.policy(overrides);
        let expected = expected.into();

        let (width, height) = png_dimensions(received)?;
        let target = Dimensions { width, height };

        let expected_bytes = self.acquire(&expected, target, &policy).await?;

        let paths = policy
            .report_dir
            .as_deref()
            .map(|dir| ArtifactPaths::new(dir, test_name));
        let verdict = diff(&expected_bytes, received, &policy, paths)?;

        let artifacts =
            write_report(&verdict, policy.always_report, received, &expected_bytes).await?;

        Ok(Outcome {
            pass: verdict.pass,
            verdict,
            artifacts,
        })
    }

    /// Turns a reference into encoded expected-image bytes.
    pub async fn acquire(
        &self,
        expected: &ExpectedReference,
        target: Dimensions,
        policy: &Policy,
    ) -> Result<Vec<u8>> {
        match expected {
            ExpectedReference::Bytes(bytes) => Ok(bytes.clone()),
            ExpectedReference::Remote(remote) => self.resolve_remote(remote, target, policy).await,
            ExpectedReference::FilePath(path) => match tokio::fs::read(path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) => {
                    debug!("could not read expected image {}: {e}", path.display());
                    Err(PixelPerfectError::usage(format!(
                        "`expected` must resolve to image bytes (raw PNG bytes, an existing file, or a Figma/XD URL); got '{}'",
                        path.display()
                    )))
                }
            },
        }
    }

    async fn resolve_remote(
        &self,
        remote: &RemoteReference,
        target: Dimensions,
        policy: &Policy,
    ) -> Result<Vec<u8>> {
        let token = match remote.provider {
            Provider::Figma => policy.figma_token.as_deref(),
            Provider::Xd => policy.xd_token.as_deref(),
        }
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            PixelPerfectError::Config(format!(
                "configuration.{} must be a non-empty string to resolve {}",
                remote.provider.token_key(),
                remote.url
            ))
        })?;

        let cache = DiskCache::new(policy.cache_dir.join(remote.provider.cache_namespace()));

        match remote.provider {
            Provider::Figma => {
                let api = match &self.figma_base_url {
                    Some(base) => FigmaApi::with_base_url(token, base.as_str(), policy.http_timeout)?,
                    None => FigmaApi::new(token, policy.http_timeout)?,
                };
                resolve(&api, &cache, &remote.url, target).await
            }
            Provider::Xd => {
                let api = match &self.xd_base_url {
                    Some(base) => XdApi::with_base_url(token, base.as_str(), policy.http_timeout)?,
                    None => XdApi::new(token, policy.http_timeout)?,
                };
                resolve(&api, &cache, &remote.url, target).await
            }
        }
    }
}

/// Asserts against the process-wide configuration, naming the report
/// directory after the running test.
pub async fn assert_pixel_perfect(
    received: &[u8],
    expected: impl Into<ExpectedReference>,
    overrides: Option<&PolicyOverrides>,
) -> Result<Outcome> {
    PixelPerfect::global()
        .assert(received, expected, overrides, &current_test_name())
        .await
}

/// libtest names each test's thread after the test path.
pub fn current_test_name() -> String {
    match std::thread::current().name() {
        Some(name) if name != "main" && !name.starts_with("tokio-runtime") => name.to_string(),
        _ => FALLBACK_TEST_NAME.to_string(),
    }
}
