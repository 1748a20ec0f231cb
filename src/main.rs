use crate::definition::parsing::ParseDocument;
use crate::definition::{BuildAction, BuildConfig, BuildTarget};
use crate::engine::environment::{HostPlatform, SystemProbe};
use crate::engine::fetcher::FetchOutcome;
use crate::engine::runner::ShellRunner;
use crate::engine::{Engine, EngineSettings};
use clap::{Args, Parser};
use kdl::KdlDocument;
use miette::IntoDiagnostic;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

mod definition;
mod engine;
mod error;
mod telemetry;

/// Configuration file picked up from the working directory when present.
const DEFAULT_CONFIG: &str = "v8net-build.kdl";

/// Builds the V8 engine, the V8.Net native proxy and the managed wrapper.
#[derive(Debug, Parser)]
#[command(name = "v8net-build", version)]
struct Cli {
    #[command(flatten)]
    action: ActionArgs,

    /// Parallel make jobs [default: number of CPUs]
    #[arg(short, long)]
    jobs: Option<usize>,

    /// KDL build configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON log lines
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct ActionArgs {
    /// Build V8, the native proxy and copy the outputs, e.g. `ia32.release`
    #[arg(short, long = "default", value_name = "SELECTOR")]
    default: Option<BuildTarget>,

    /// Only prepare the V8 engine for the selector
    #[arg(long = "v8", value_name = "SELECTOR")]
    v8: Option<BuildTarget>,

    /// Build the native proxy library only
    #[arg(short, long, value_name = "SELECTOR")]
    lib: Option<BuildTarget>,

    /// Build the managed wrapper solution
    #[arg(short, long)]
    wrapper: bool,

    /// Create the NuGet package
    #[arg(short, long)]
    nuget: bool,
}

impl ActionArgs {
    fn action(&self) -> BuildAction {
        if let Some(target) = self.default {
            BuildAction::Everything(target)
        } else if let Some(target) = self.v8 {
            BuildAction::EngineOnly(target)
        } else if let Some(target) = self.lib {
            BuildAction::NativeProxy(target)
        } else if self.wrapper {
            BuildAction::ManagedWrapper
        } else {
            BuildAction::Package
        }
    }
}

fn load_config(base_dir: &Path, explicit: Option<&Path>) -> miette::Result<BuildConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = base_dir.join(DEFAULT_CONFIG);
            if !path.is_file() {
                return Ok(BuildConfig::default());
            }
            path
        }
    };

    info!("loading configuration from {}", path.display());
    let source = std::fs::read_to_string(&path).into_diagnostic()?;
    let document: KdlDocument = source.parse()?;

    BuildConfig::parse_document_strict(&document, &source, &path.display().to_string())
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    telemetry::init_tracing(cli.json, level);

    let base_dir = std::env::current_dir().into_diagnostic()?;
    let config = load_config(&base_dir, cli.config.as_deref())?;
    let host = HostPlatform::detect()?;
    let jobs = cli.jobs.unwrap_or_else(num_cpus::get);

    let settings = EngineSettings::new(base_dir, host, jobs, config);
    let engine = Engine::new(settings, ShellRunner, SystemProbe);

    let state = engine.run(cli.action.action()).await?;
    let elapsed = state.build_time.elapsed().unwrap_or_default();
    info!(
        "finished {} in {:.1}s, {} dependencies fetched, {} artifacts",
        state.target,
        elapsed.as_secs_f64(),
        state
            .fetched
            .iter()
            .filter(|x| **x == FetchOutcome::Fetched)
            .count(),
        state.artifacts.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn selector_is_parsed_into_target() {
        let cli = Cli::try_parse_from(["v8net-build", "-d", "ia32.debug"]).unwrap();
        assert_eq!(
            cli.action.action(),
            BuildAction::Everything("ia32.debug".parse().unwrap())
        );
        assert_eq!(cli.jobs, None);
    }

    #[test]
    fn each_flag_selects_its_action() {
        let cli = Cli::try_parse_from(["v8net-build", "--v8", "x64.release"]).unwrap();
        assert!(matches!(cli.action.action(), BuildAction::EngineOnly(_)));

        let cli = Cli::try_parse_from(["v8net-build", "-l", "x64.debug", "-j", "8"]).unwrap();
        assert!(matches!(cli.action.action(), BuildAction::NativeProxy(_)));
        assert_eq!(cli.jobs, Some(8));

        let cli = Cli::try_parse_from(["v8net-build", "-w"]).unwrap();
        assert_eq!(cli.action.action(), BuildAction::ManagedWrapper);

        let cli = Cli::try_parse_from(["v8net-build", "--nuget"]).unwrap();
        assert_eq!(cli.action.action(), BuildAction::Package);
    }

    #[test]
    fn unsupported_selector_is_rejected() {
        let err = Cli::try_parse_from(["v8net-build", "-d", "arm.debug"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn an_action_is_required() {
        let err = Cli::try_parse_from(["v8net-build", "-j", "2"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn actions_are_exclusive() {
        let err = Cli::try_parse_from(["v8net-build", "-w", "-n"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn config_file_in_base_dir_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            load_config(dir.path(), None).unwrap().paths.result_dir,
            PathBuf::from("BuildResult")
        );

        std::fs::write(
            dir.path().join(DEFAULT_CONFIG),
            "paths {\n    result-dir \"out\"\n}\n",
        )
        .unwrap();
        assert_eq!(
            load_config(dir.path(), None).unwrap().paths.result_dir,
            PathBuf::from("out")
        );
    }

    #[test]
    fn invalid_config_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.kdl");
        std::fs::write(&path, "paths {\n    result-dir 1\n}\n").unwrap();

        assert!(load_config(dir.path(), Some(&path)).is_err());
    }
}
