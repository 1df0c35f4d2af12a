use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;
use tokio::fs;

use crate::diff::Verdict;
use crate::error::Result;

/// Where one test's artifacts live: `<report_dir>/<test name>/{received,expected,diff}.png`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactPaths {
    pub directory: PathBuf,
    pub received: PathBuf,
    pub expected: PathBuf,
    pub diff: PathBuf,
}

impl ArtifactPaths {
    pub fn new(report_dir: &Path, test_name: &str) -> Self {
        let directory = report_dir.join(sanitize_test_name(test_name));
        Self {
            received: directory.join("received.png"),
            expected: directory.join("expected.png"),
            diff: directory.join("diff.png"),
            directory,
        }
    }
}

/// Collapses a test name into one path component.
pub fn sanitize_test_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .replace("::", "__")
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "unnamed".to_string(),
        _ => cleaned,
    }
}

/// Writes the report for `verdict` when it failed or `always_report` is set.
///
/// The per-test directory is recreated from scratch. Returns the paths that
/// were written, or `None` when nothing was due.
pub async fn write_report(
    verdict: &Verdict,
    always_report: bool,
    received: &[u8],
    expected: &[u8],
) -> Result<Option<ArtifactPaths>> {
    let Some(paths) = verdict.artifacts.as_ref() else {
        return Ok(None);
    };
    if verdict.pass && !always_report {
        return Ok(None);
    }

    if fs::metadata(&paths.directory).await.is_ok() {
        fs::remove_dir_all(&paths.directory).await?;
    }
    fs::create_dir_all(&paths.directory).await?;

    fs::write(&paths.received, received).await?;
    fs::write(&paths.expected, expected).await?;
    if let Some(diff) = &verdict.diff_png {
        fs::write(&paths.diff, diff).await?;
    }

    debug!("wrote report to {}", paths.directory.display());
    Ok(Some(paths.clone()))
}
