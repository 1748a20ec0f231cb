use crate::definition::{BuildAction, BuildConfig, BuildTarget, Mode};
use crate::engine::build_state::BuildState;
use crate::engine::environment::{HostPlatform, HostProbe};
use crate::engine::fetcher::Fetcher;
use crate::engine::runner::CommandRunner;
use crate::engine::stages::Stage;
use crate::engine::templates::{CommandRenderer, TargetVars};
use crate::error::BuildResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

mod artifacts;
mod build_state;
pub mod environment;
pub mod fetcher;
pub mod runner;
mod stages;
mod templates;

#[derive(Debug)]
pub struct Engine {
    fetcher: Fetcher,
    renderer: Arc<CommandRenderer>,
    runner: Box<dyn CommandRunner>,
    probe: Box<dyn HostProbe>,
    pub settings: Arc<EngineSettings>,
}

#[derive(Debug)]
pub struct EngineSettings {
    base_dir: PathBuf,
    host: HostPlatform,
    jobs: usize,
    config: BuildConfig,
}

impl EngineSettings {
    pub fn new(base_dir: PathBuf, host: HostPlatform, jobs: usize, config: BuildConfig) -> Self {
        EngineSettings {
            base_dir,
            host,
            jobs,
            config,
        }
    }

    pub fn base_dir(&self) -> &Path {
        self.base_dir.as_path()
    }

    pub fn host(&self) -> HostPlatform {
        self.host
    }

    pub fn engine_path(&self) -> PathBuf {
        self.base_dir.join(&self.config.paths.engine_dir)
    }

    /// Relative to the base directory, e.g. `Build/ia32.release`.
    pub fn build_dir_for_target(&self, target: BuildTarget) -> PathBuf {
        self.config.paths.build_dir.join(target.to_string())
    }

    pub fn library_path_for_target(&self, target: BuildTarget) -> PathBuf {
        self.base_dir
            .join(self.build_dir_for_target(target))
            .join("makefiles/out/Default/lib.target")
    }

    pub fn result_path_for_mode(&self, mode: Mode) -> PathBuf {
        self.base_dir
            .join(&self.config.paths.result_dir)
            .join(mode.name())
    }

    pub fn console_bin_path_for_mode(&self, mode: Mode) -> PathBuf {
        self.base_dir
            .join(&self.config.paths.console_bin)
            .join(mode.title())
    }

    pub fn solution(&self) -> &str {
        if self.host.is_windows() {
            &self.config.wrapper.windows_solution
        } else {
            &self.config.wrapper.unix_solution
        }
    }

    pub fn target_vars(&self, target: BuildTarget) -> TargetVars {
        let gyp = Path::new(".")
            .join(&self.config.paths.engine_dir)
            .join("build/gyp/gyp");

        TargetVars {
            arch: target.arch.name(),
            mode: target.mode.name(),
            mode_title: target.mode.title(),
            selector: target.to_string(),
            platform: target.arch.msbuild_platform(),
            debug: target.mode == Mode::Debug,
            jobs: self.jobs,
            base_dir: self.base_dir.display().to_string(),
            engine_dir: self.engine_path().display().to_string(),
            build_dir: self.build_dir_for_target(target).display().to_string(),
            gyp: gyp.display().to_string(),
            proxy_gyp: self.config.paths.proxy_gyp.clone(),
            solution: self.solution().to_string(),
        }
    }
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        runner: impl CommandRunner + 'static,
        probe: impl HostProbe + 'static,
    ) -> Self {
        let settings = Arc::new(settings);
        let renderer = Arc::new(CommandRenderer::new(settings.config.commands.clone()));

        Engine {
            fetcher: Fetcher::new(settings.clone(), renderer.clone()),
            renderer,
            runner: Box::new(runner),
            probe: Box::new(probe),
            settings,
        }
    }

    /// Runs every stage of `action` in order. The first failing stage ends
    /// the run; whatever earlier stages produced is left on disk.
    pub async fn run(&self, action: BuildAction) -> BuildResult<BuildState> {
        let plan = Stage::plan(action)?;
        let mut state = BuildState::new(action.target(), self.settings.host());

        for stage in plan.iter().copied() {
            info!("running stage: {:?}", stage);

            if let Err(err) = self.run_stage(stage, &mut state).await {
                error!("stage {:?} failed for {}", stage, state.target);
                return Err(err);
            }
        }

        Ok(state)
    }

    async fn run_stage(&self, stage: Stage, state: &mut BuildState) -> BuildResult<()> {
        match stage {
            Stage::ResolveEnvironment => {
                state.toolchain = environment::resolve(
                    self.settings.host(),
                    self.probe.as_ref(),
                    &self.settings.config.toolchain,
                )?;
                info!("selected target {}", state.target);
            }

            Stage::SyncSubmodules => {
                self.sync_submodules(state).await?;
            }

            Stage::FetchDependencies => {
                state.fetched = self
                    .fetcher
                    .fetch_all(self.runner.as_ref(), &state.toolchain)
                    .await?;
            }

            Stage::NativeEngine => {
                self.build_native_engine(state).await?;
            }

            Stage::NativeProxy => {
                let copied = self.build_native_proxy(state).await?;
                state.artifacts.extend(copied);
            }

            Stage::ManagedWrapper => {
                let copied = self.build_managed_wrapper(state).await?;
                state.artifacts.extend(copied);
            }
        }

        Ok(())
    }
}
