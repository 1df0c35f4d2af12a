use std::path::{Path, PathBuf};
use std::process::ExitCode;

use log::{debug, info};
use pixel_perfect::{
    CompareOutput, ConfigStore, ExpectedReference, PixelPerfect, PixelPerfectError,
    PixelPerfectOutput, PolicyOverrides,
};

use crate::cli::CompareArgs;
use crate::formatting::{exit_code_for_compare, render_error, write_output};
use crate::settings::{format_effective_policy, load_config, resolve_overrides};

const DEFAULT_NAME: &str = "pixel-perfect";

/// Run the compare command.
pub async fn run_compare(config_path: Option<PathBuf>, args: CompareArgs) -> ExitCode {
    let format = args.format;
    let output = args.output.clone();

    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let overrides = resolve_overrides(config, PolicyOverrides::from_env(), &args);

    let store = ConfigStore::default();
    let checker = PixelPerfect::new(&store);
    let policy = checker.policy(Some(&overrides));
    debug!("{}", format_effective_policy(&policy, config_path.as_deref()));

    let received = match tokio::fs::read(&args.received).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = PixelPerfectError::usage(format!(
                "Failed to read received image {}: {e}",
                args.received.display()
            ));
            return render_error(err, format, output);
        }
    };

    let expected = match ExpectedReference::parse(&args.expected) {
        Ok(expected) => expected,
        Err(err) => return render_error(err, format, output),
    };
    let expected_label = expected.describe();
    let name = test_name(args.name.as_deref(), &args.received);

    info!("comparing {} against {expected_label}", args.received.display());
    let outcome = match checker
        .assert(&received, expected, Some(&overrides), &name)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => return render_error(err, format, output),
    };

    let body = PixelPerfectOutput::Compare(CompareOutput::from_outcome(
        &outcome,
        &name,
        &expected_label,
        policy.color_threshold,
    ));
    if let Err(err) = write_output(&body, format, output.clone()) {
        let err = PixelPerfectError::Io(std::io::Error::other(err.to_string()));
        return render_error(err, format, output);
    }

    exit_code_for_compare(outcome.pass)
}

/// `--name`, else the received file's stem.
fn test_name(explicit: Option<&str>, received: &Path) -> String {
    explicit
        .filter(|n| !n.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            received
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| DEFAULT_NAME.to_string())
}
