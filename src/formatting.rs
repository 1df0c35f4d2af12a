use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pixel_perfect::{ErrorOutput, PixelPerfectError, PixelPerfectOutput, OUTPUT_VERSION};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(
    body: &PixelPerfectOutput,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output.as_deref())?,
        OutputFormat::Pretty => write_pretty_output(body, output.as_deref())?,
    };
    Ok(())
}

/// Render an error and return the appropriate exit code.
pub fn render_error(
    err: PixelPerfectError,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let payload = PixelPerfectOutput::Error(ErrorOutput {
        version: OUTPUT_VERSION.to_string(),
        error: err.to_payload(),
    });

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {}", write_err);
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, output.as_deref()) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    // Exit code 2 is reserved for errors; mismatches use 1.
    ExitCode::from(2)
}

fn write_json_output(
    body: &PixelPerfectOutput,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

fn write_pretty_output(body: &PixelPerfectOutput, output: Option<&Path>) -> io::Result<()> {
    let use_human = output.is_none() && std::io::stdout().is_terminal();

    if use_human {
        println!("{}", format_pretty(body, true));
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &PixelPerfectOutput, colorize: bool) -> String {
    match body {
        PixelPerfectOutput::Compare(out) => {
            let mut buf = String::new();
            let status = if out.passed { "PASS" } else { "FAIL" };
            let status_colored = color(status, if out.passed { "32" } else { "31" }, colorize);
            writeln!(buf, "{} {}", status_colored, out.name).ok();
            writeln!(buf, "Expected: {}", out.expected).ok();

            let changed = format!(
                "{} of {} pixels ({:.2}%)",
                out.stats.changed_pixels,
                out.stats.total_pixels,
                out.stats.changed_relative * 100.0
            );
            let code = change_color_code(out.stats.changed_relative, out.pixel_threshold);
            writeln!(
                buf,
                "Changed: {} (threshold {:.2}%, color threshold {})",
                color(&changed, code, colorize),
                out.pixel_threshold * 100.0,
                out.color_threshold
            )
            .ok();

            if !out.passed {
                writeln!(buf).ok();
                writeln!(buf, "{}", out.message).ok();
            } else if let Some(art) = &out.artifacts {
                writeln!(buf, "Artifacts:").ok();
                for (label, path) in [
                    ("expected", &art.expected),
                    ("received", &art.received),
                    ("diff", &art.diff),
                ] {
                    writeln!(buf, "- {:9} {}", label, path.display()).ok();
                }
            }
            buf
        }
        PixelPerfectOutput::Error(out) => {
            let mut buf = String::new();
            let header = color("[ERROR]", "31", colorize);
            writeln!(buf, "{} {}", header, out.error.message).ok();
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
            buf
        }
    }
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

fn change_color_code(changed: f64, threshold: f64) -> &'static str {
    if changed == 0.0 {
        "32" // green
    } else if changed <= threshold {
        "33" // yellow
    } else {
        "31" // red
    }
}

/// Determine exit code for compare command.
pub fn exit_code_for_compare(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
