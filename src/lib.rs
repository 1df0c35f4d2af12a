//! Pixel Perfect Library
//!
//! Visual-regression assertions: compare a rendered PNG against a reference
//! (raw bytes, a local file, or a Figma/XD frame URL) with a tolerant
//! pixel-level diff, and keep received/expected/diff images for review.
//!
//! # Module Overview
//!
//! - [`assertion`] - The assertion entry points and reference acquisition
//! - [`reference`] - Expected-reference variants and provider detection
//! - [`provider`] - Figma and XD resolvers sharing one cache-aware pipeline
//! - [`cache`] - On-disk render cache keyed by frame identity
//! - [`diff`] - Tolerance policy applied to a per-pixel comparison
//! - [`report`] - Artifact writing under a per-test directory
//! - [`config`] - Tolerance policy, overrides, and the configuration store
//!
//! # Example
//!
//! ```no_run
//! use pixel_perfect::{assert_pixel_perfect, ExpectedReference, PolicyOverrides};
//!
//! # async fn example() -> pixel_perfect::Result<()> {
//! let received = std::fs::read("screenshot.png")?;
//! let expected = ExpectedReference::parse(
//!     "https://www.figma.com/file/S2ukcXYvojo86oMu1tI9pt/Test?node-id=20%3A2",
//! )?;
//! let overrides = PolicyOverrides {
//!     pixel_threshold: Some(0.01),
//!     ..PolicyOverrides::from_env()
//! };
//!
//! let outcome = assert_pixel_perfect(&received, expected, Some(&overrides)).await?;
//! assert!(outcome.pass, "{}", outcome.message());
//! # Ok(())
//! # }
//! ```

pub mod assertion;
pub mod bitmap;
pub mod cache;
pub mod config;
pub mod diff;
pub mod error;
pub mod output;
pub mod provider;
pub mod reference;
pub mod report;

pub use assertion::{assert_pixel_perfect, current_test_name, Outcome, PixelPerfect};
pub use bitmap::Bitmap;
pub use cache::{CacheKey, DiskCache};
pub use config::{
    merged_configuration, restore_default_configuration, set_default_configuration, ConfigStore,
    Policy, PolicyOverrides,
};
pub use diff::{diff, DiffStats, Verdict};
pub use error::{ErrorCategory, ErrorPayload, PixelPerfectError, Result};
pub use output::{CompareOutput, ErrorOutput, PixelPerfectOutput, OUTPUT_VERSION};
pub use provider::{resolve, DesignApi, Dimensions, FigmaApi, FrameLocation, XdApi};
pub use reference::{ExpectedReference, Provider, RemoteReference};
pub use report::{write_report, ArtifactPaths};
