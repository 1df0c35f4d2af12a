use std::io::Cursor;

use pixelmatch::{pixelmatch, Options};
use serde::Serialize;

use crate::bitmap::png_dimensions;
use crate::config::Policy;
use crate::error::{PixelPerfectError, Result};
use crate::report::ArtifactPaths;

const PREAMBLE: &str = "Received value does not match expected value.";

/// Outcome of comparing two images under a policy.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub pass: bool,
    /// Encoded diff image; absent when the dimensions differ.
    pub diff_png: Option<Vec<u8>>,
    pub total_pixels: u64,
    pub changed_pixels: u64,
    pub changed_relative: f64,
    pub pixel_threshold: f64,
    pub expected_dimensions: (u32, u32),
    pub received_dimensions: (u32, u32),
    pub artifacts: Option<ArtifactPaths>,
}

impl Verdict {
    pub fn dimensions_match(&self) -> bool {
        self.expected_dimensions == self.received_dimensions
    }

    /// Human-readable explanation; built on demand.
    pub fn message(&self) -> String {
        if self.pass {
            return "Images are matching".to_string();
        }

        let detail = if self.dimensions_match() {
            format!(
                "Expected less than {:.2}% of the pixels to have changed, but {:.2}% of the pixels changed.",
                self.pixel_threshold * 100.0,
                self.changed_relative * 100.0
            )
        } else {
            let (ew, eh) = self.expected_dimensions;
            let (rw, rh) = self.received_dimensions;
            format!("Expected an image of {ew}x{eh} pixels, but received {rw}x{rh}.")
        };

        let mut message = format!("{PREAMBLE}\n\n{detail}");
        if let Some(paths) = &self.artifacts {
            message.push_str(&format!(
                "\n\nExpected {}\nReceived {}",
                paths.expected.display(),
                paths.received.display(),
            ));
            // No diff file is written without a diff image.
            if self.diff_png.is_some() {
                message.push_str(&format!("\nDiff     {}", paths.diff.display()));
            }
        }
        message
    }

    pub fn stats(&self) -> DiffStats {
        DiffStats {
            total_pixels: self.total_pixels,
            changed_pixels: self.changed_pixels,
            changed_relative: self.changed_relative,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    pub total_pixels: u64,
    pub changed_pixels: u64,
    pub changed_relative: f64,
}

/// Compares the encoded PNGs `received` against `expected`.
///
/// `total_pixels` is the larger of the two areas. Images of different sizes
/// are not compared pixel by pixel; every pixel counts as changed and the
/// verdict fails without a diff image.
pub fn diff(
    expected: &[u8],
    received: &[u8],
    policy: &Policy,
    artifacts: Option<ArtifactPaths>,
) -> Result<Verdict> {
    let expected_dimensions = png_dimensions(expected)?;
    let received_dimensions = png_dimensions(received)?;
    let area = |(w, h): (u32, u32)| w as u64 * h as u64;
    let total_pixels = area(expected_dimensions).max(area(received_dimensions));

    let (changed_pixels, diff_png) = if expected_dimensions == received_dimensions {
        let (width, height) = received_dimensions;
        let options = Options {
            threshold: policy.color_threshold,
            include_aa: policy.detect_antialiasing,
            ..Options::default()
        };

        let mut diff_png = Cursor::new(Vec::new());
        let changed = pixelmatch(
            Cursor::new(received),
            Cursor::new(expected),
            Some(&mut diff_png),
            Some(width),
            Some(height),
            Some(options),
        )
        .map_err(|e| PixelPerfectError::Comparison(e.to_string()))?;
        (changed as u64, Some(diff_png.into_inner()))
    } else {
        (total_pixels, None)
    };

    let changed_relative = if total_pixels == 0 {
        0.0
    } else {
        changed_pixels as f64 / total_pixels as f64
    };

    // A NaN threshold compares false and therefore fails.
    let pass = diff_png.is_some() && changed_relative <= policy.pixel_threshold;

    Ok(Verdict {
        pass,
        diff_png,
        total_pixels,
        changed_pixels,
        changed_relative,
        pixel_threshold: policy.pixel_threshold,
        expected_dimensions,
        received_dimensions,
        artifacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use std::path::Path;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        Bitmap::filled(width, height, rgba).encode_png().expect("encode")
    }

    fn policy(pixel_threshold: f64) -> Policy {
        Policy {
            pixel_threshold,
            ..Policy::default()
        }
    }

    #[test]
    fn identical_images_pass_with_no_changes() {
        let img = png(10, 10, RED);
        let verdict = diff(&img, &img, &Policy::default(), None).expect("diff");

        assert!(verdict.pass);
        assert_eq!(verdict.changed_pixels, 0);
        assert_eq!(verdict.total_pixels, 100);
        assert_eq!(verdict.message(), "Images are matching");

        let diff_image = Bitmap::decode(verdict.diff_png.as_deref().expect("diff png")).expect("decode");
        assert_eq!(diff_image.dimensions(), (10, 10));
    }

    #[test]
    fn single_pixel_change_is_relative_to_total() {
        let expected = Bitmap::filled(10, 10, RED);
        let mut received = expected.clone();
        received.put_pixel(5, 5, BLUE);
        let (expected, received) = (
            expected.encode_png().expect("encode"),
            received.encode_png().expect("encode"),
        );

        let strict = diff(&expected, &received, &policy(0.0), None).expect("diff");
        assert_eq!(strict.changed_pixels, 1);
        assert!((strict.changed_relative - 0.01).abs() < f64::EPSILON);
        assert!(!strict.pass);

        let tolerant = diff(&expected, &received, &policy(0.01), None).expect("diff");
        assert!(tolerant.pass);
    }

    #[test]
    fn changed_column_is_painted_in_diff_image() {
        let expected = Bitmap::filled(10, 10, RED);
        let mut received = expected.clone();
        for y in 0..10 {
            received.put_pixel(3, y, BLUE);
        }

        let verdict = diff(
            &expected.encode_png().expect("encode"),
            &received.encode_png().expect("encode"),
            &policy(0.0),
            None,
        )
        .expect("diff");

        assert_eq!(verdict.changed_pixels, 10);
        let painted = Bitmap::decode(verdict.diff_png.as_deref().expect("diff png")).expect("decode");
        let idx = (4 * 10 + 3) * 4;
        assert_eq!(&painted.data()[idx..idx + 4], &[255, 0, 0, 255]);
    }

    #[test]
    fn solid_colour_swap_changes_everything() {
        let verdict = diff(&png(10, 10, BLUE), &png(10, 10, RED), &policy(0.0), None).expect("diff");
        assert!(!verdict.pass);
        assert_eq!(verdict.changed_relative, 1.0);
    }

    #[test]
    fn failure_message_names_percentages_and_paths() {
        let paths = ArtifactPaths::new(Path::new("report"), "my test");
        let verdict = diff(
            &png(10, 10, BLUE),
            &png(10, 10, RED),
            &policy(0.05),
            Some(paths.clone()),
        )
        .expect("diff");

        let message = verdict.message();
        assert!(message.starts_with(PREAMBLE));
        assert!(message.contains("less than 5.00%"));
        assert!(message.contains("but 100.00%"));
        assert!(message.contains(&paths.expected.display().to_string()));
        assert!(message.contains(&paths.received.display().to_string()));
        assert!(message.contains(&paths.diff.display().to_string()));
    }

    #[test]
    fn dimension_mismatch_fails_without_diff_image() {
        let verdict = diff(&png(10, 10, RED), &png(20, 10, RED), &policy(1.0), None).expect("diff");

        assert!(!verdict.pass);
        assert!(verdict.diff_png.is_none());
        assert_eq!(verdict.total_pixels, 200);
        assert_eq!(verdict.changed_pixels, 200);
        assert!(verdict.message().contains("10x10"));
    }

    #[test]
    fn dimension_mismatch_message_omits_diff_path() {
        let paths = ArtifactPaths::new(Path::new("report"), "sizes");
        let verdict = diff(
            &png(10, 10, RED),
            &png(20, 10, RED),
            &policy(0.0),
            Some(paths.clone()),
        )
        .expect("diff");

        let message = verdict.message();
        assert!(message.contains(&paths.expected.display().to_string()));
        assert!(message.contains(&paths.received.display().to_string()));
        assert!(!message.contains("Diff"));
        assert!(!message.contains(&paths.diff.display().to_string()));
    }

    #[test]
    fn transposed_dimensions_are_a_mismatch() {
        let verdict = diff(&png(10, 20, RED), &png(20, 10, RED), &policy(1.0), None).expect("diff");
        assert!(!verdict.pass);
        assert!(verdict.diff_png.is_none());
        assert_eq!(verdict.changed_pixels, 200);
    }

    #[test]
    fn nan_pixel_threshold_fails() {
        let expected = Bitmap::filled(2, 2, RED);
        let mut received = expected.clone();
        received.put_pixel(0, 0, BLUE);

        let verdict = diff(
            &expected.encode_png().expect("encode"),
            &received.encode_png().expect("encode"),
            &policy(f64::NAN),
            None,
        )
        .expect("diff");
        assert!(!verdict.pass);
    }

    #[test]
    fn undecodable_input_is_an_image_error() {
        let err = diff(b"not a png", &png(1, 1, RED), &Policy::default(), None).expect_err("bad png");
        assert!(matches!(err, PixelPerfectError::Image(_)));
    }
}
