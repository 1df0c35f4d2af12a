use std::path::Path;

use pixel_perfect::{Policy, PixelPerfectError, PolicyOverrides};

use crate::cli::CompareArgs;

/// Config file name picked up from the working directory when `--config` is absent.
pub const LOCAL_CONFIG_FILE: &str = "pixel-perfect.toml";

/// Loads the config file: the explicit path must exist, the local one is optional.
pub fn load_config(path: Option<&Path>) -> Result<PolicyOverrides, PixelPerfectError> {
    match path {
        Some(path) => PolicyOverrides::load(path),
        None => {
            let local = Path::new(LOCAL_CONFIG_FILE);
            if local.is_file() {
                PolicyOverrides::load(local)
            } else {
                Ok(PolicyOverrides::default())
            }
        }
    }
}

/// Overrides carried by explicit CLI flags.
pub fn flag_overrides(args: &CompareArgs) -> PolicyOverrides {
    let report_dir = if args.no_report {
        Some(None)
    } else {
        args.report_dir.clone().map(Some)
    };

    PolicyOverrides {
        detect_antialiasing: args.detect_antialiasing,
        color_threshold: args.color_threshold,
        pixel_threshold: args.pixel_threshold,
        report_dir,
        always_report: args.always_report.then_some(true),
        cache_dir: args.cache_dir.clone(),
        ..PolicyOverrides::default()
    }
}

/// Config file, then environment, then flags; later layers win key by key.
pub fn resolve_overrides(
    config: PolicyOverrides,
    env: PolicyOverrides,
    args: &CompareArgs,
) -> PolicyOverrides {
    flag_overrides(args).merge_over(env.merge_over(config))
}

/// One-line summary of the effective policy for verbose logs. Tokens are
/// reported as present or absent, never printed.
pub fn format_effective_policy(policy: &Policy, config_source: Option<&Path>) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    let report = policy
        .report_dir
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "off".to_string());
    format!(
        "Effective policy (source: {source}): colorThreshold={}, pixelThreshold={}, detectAntialiasing={}, reportDir={report}, alwaysReport={}, cacheDir={}, httpTimeout={}s, figmaToken={}, xdToken={}",
        policy.color_threshold,
        policy.pixel_threshold,
        policy.detect_antialiasing,
        policy.always_report,
        policy.cache_dir.display(),
        policy.http_timeout.as_secs(),
        presence(policy.figma_token.as_deref()),
        presence(policy.xd_token.as_deref()),
    )
}

fn presence(token: Option<&str>) -> &'static str {
    match token {
        Some(t) if !t.is_empty() => "set",
        _ => "unset",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn args() -> CompareArgs {
        CompareArgs {
            received: PathBuf::from("received.png"),
            expected: "expected.png".to_string(),
            name: None,
            color_threshold: None,
            pixel_threshold: None,
            detect_antialiasing: None,
            report_dir: None,
            no_report: false,
            always_report: false,
            cache_dir: None,
            format: OutputFormat::Json,
            output: None,
        }
    }

    #[test]
    fn flags_override_env_and_config() {
        let config = PolicyOverrides {
            color_threshold: Some(0.3),
            pixel_threshold: Some(0.2),
            figma_token: Some("from-file".into()),
            ..Default::default()
        };
        let env = PolicyOverrides {
            figma_token: Some("from-env".into()),
            ..Default::default()
        };
        let cli = CompareArgs {
            pixel_threshold: Some(0.05),
            ..args()
        };

        let merged = resolve_overrides(config, env, &cli);

        assert_eq!(merged.pixel_threshold, Some(0.05));
        assert_eq!(merged.color_threshold, Some(0.3));
        assert_eq!(merged.figma_token.as_deref(), Some("from-env"));
    }

    #[test]
    fn no_report_flag_disables_reports() {
        let cli = CompareArgs {
            no_report: true,
            ..args()
        };
        let config = PolicyOverrides {
            report_dir: Some(Some(PathBuf::from("from-file"))),
            ..Default::default()
        };

        let merged = resolve_overrides(config, PolicyOverrides::default(), &cli);
        assert_eq!(merged.report_dir, Some(None));
    }

    #[test]
    fn unset_always_report_flag_does_not_override_config() {
        let config = PolicyOverrides {
            always_report: Some(true),
            ..Default::default()
        };
        let merged = resolve_overrides(config, PolicyOverrides::default(), &args());
        assert_eq!(merged.always_report, Some(true));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = load_config(Some(&dir.path().join("missing.toml"))).expect_err("missing");
        assert!(matches!(err, PixelPerfectError::Config(_)));
    }

    #[test]
    fn effective_policy_hides_tokens() {
        let policy = Policy {
            figma_token: Some("secret".into()),
            ..Policy::default()
        };
        let line = format_effective_policy(&policy, None);
        assert!(line.contains("figmaToken=set"));
        assert!(line.contains("xdToken=unset"));
        assert!(!line.contains("secret"));
    }
}
