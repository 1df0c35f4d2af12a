use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pixel-perfect")]
#[command(
    version,
    about = "Pixel Perfect - Visual regression checks against PNG, Figma and XD references",
    long_about = "Pixel Perfect\n\nCompares a received PNG against an expected reference: a local PNG, or a Figma/XD frame URL rendered at the received image's width.\n\nExit codes: 0 match, 1 mismatch, 2 error."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose (debug) logging on stderr")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) with policy defaults; environment and CLI flags override it"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare a received image against an expected reference
    Compare(CompareArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(long, help = "Received image (PNG file)")]
    pub received: PathBuf,

    #[arg(long, help = "Expected reference (PNG file, Figma URL, or XD URL)")]
    pub expected: String,

    #[arg(
        long,
        help = "Test name used for the report directory (defaults to the received file stem)"
    )]
    pub name: Option<String>,

    #[arg(long, help = "Per-pixel color tolerance (0-1)")]
    pub color_threshold: Option<f64>,

    #[arg(long, help = "Fraction of changed pixels tolerated (0-1)")]
    pub pixel_threshold: Option<f64>,

    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Count anti-aliased pixels as changes"
    )]
    pub detect_antialiasing: Option<bool>,

    #[arg(long, value_name = "PATH", help = "Directory for received/expected/diff images")]
    pub report_dir: Option<PathBuf>,

    #[arg(long, conflicts_with = "report_dir", help = "Do not write any report images")]
    pub no_report: bool,

    #[arg(long, help = "Write report images even when the images match")]
    pub always_report: bool,

    #[arg(long, value_name = "PATH", help = "Directory for cached design renders")]
    pub cache_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "json", help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, short, help = "Output file path (stdout if omitted)")]
    pub output: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}
