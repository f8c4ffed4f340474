//! CLI arguments for the `weld` binary (SPEC_FULL.md §6 "CLI surface").

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use weld_orchestrator::config::Platform;

/// Build or watch one or more TypeScript/JavaScript entry points across the
/// variants declared in a weld config file.
#[derive(Parser, Debug)]
#[command(name = "weld", version, about = "Multi-variant TypeScript/JavaScript build orchestrator")]
pub struct CliArgs {
    /// Path to the weld config file (JSON). Defaults to `weld.config.json`
    /// in the current directory.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Rebuild on file changes instead of exiting after the first build.
    #[arg(short = 'w', long)]
    pub watch: bool,

    /// Serve `outdir` (or the given directory) over HTTP after each build.
    #[arg(long, value_name = "DIR", num_args = 0..=1, default_missing_value = "")]
    pub serve: Option<PathBuf>,

    /// Run the language service's diagnostic checks as part of the build.
    #[arg(long = "type-check", alias = "typeCheck")]
    pub type_check: bool,

    /// Bundle entry points instead of transpiling each file independently.
    #[arg(long)]
    pub bundle: bool,

    /// Minify bundled output.
    #[arg(long)]
    pub minify: bool,

    /// Output directory for build artifacts.
    #[arg(long)]
    pub outdir: Option<PathBuf>,

    /// Path to the tsconfig.json driving the shared language service.
    #[arg(long)]
    pub tsconfig: Option<PathBuf>,

    /// Target runtime platform.
    #[arg(long, value_enum, ignore_case = true)]
    pub platform: Option<PlatformArg>,

    /// Emit `.d.ts` declaration files.
    #[arg(long)]
    pub declaration: bool,

    /// Treat type-check diagnostics as build errors rather than warnings.
    #[arg(long = "fail-on-error", alias = "failOnError")]
    pub fail_on_error: bool,

    /// Enable verbose logging.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Pre-resolved entry-point file paths.
    #[arg(value_name = "PATH")]
    pub entry_points: Vec<PathBuf>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PlatformArg {
    Node,
    Browser,
    Neutral,
}

impl PlatformArg {
    #[must_use]
    pub fn to_platform(self) -> Platform {
        match self {
            Self::Node => Platform::Node,
            Self::Browser => Platform::Browser,
            Self::Neutral => Platform::Neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_and_entry_points_parse_together() {
        let args = CliArgs::parse_from(["weld", "--watch", "src/index.ts", "src/worker.ts"]);
        assert!(args.watch);
        assert_eq!(args.entry_points, vec![PathBuf::from("src/index.ts"), PathBuf::from("src/worker.ts")]);
    }

    #[test]
    fn fail_on_error_accepts_camel_case_alias() {
        let args = CliArgs::parse_from(["weld", "--fail-on-error"]);
        assert!(args.fail_on_error);
    }

    #[test]
    fn serve_without_value_defaults_to_empty_path() {
        let args = CliArgs::parse_from(["weld", "--serve"]);
        assert_eq!(args.serve, Some(PathBuf::new()));
    }

    #[test]
    fn platform_is_case_insensitive() {
        let args = CliArgs::parse_from(["weld", "--platform", "Browser"]);
        assert_eq!(args.platform, Some(PlatformArg::Browser));
    }
}
