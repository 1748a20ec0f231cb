use crate::definition::{BuildAction, Mode, Step};
use crate::engine::artifacts::{copy_if_present, copy_regular_files, PROXY_LIBRARIES};
use crate::engine::build_state::BuildState;
use crate::engine::runner::{capture_batch_environment, Invocation};
use crate::engine::Engine;
use crate::error::{BuildError, BuildResult};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Stage {
    ResolveEnvironment,
    SyncSubmodules,
    FetchDependencies,
    NativeEngine,
    NativeProxy,
    ManagedWrapper,
}

impl Stage {
    pub fn plan(action: BuildAction) -> BuildResult<&'static [Stage]> {
        let stages: &'static [Stage] = match action {
            BuildAction::Everything(_) => &[
                Stage::ResolveEnvironment,
                Stage::SyncSubmodules,
                Stage::FetchDependencies,
                Stage::NativeEngine,
                Stage::NativeProxy,
            ],
            BuildAction::EngineOnly(_) => &[Stage::ResolveEnvironment],
            BuildAction::NativeProxy(_) => &[
                Stage::ResolveEnvironment,
                Stage::FetchDependencies,
                Stage::NativeProxy,
            ],
            BuildAction::ManagedWrapper => &[Stage::ManagedWrapper],
            BuildAction::Package => return Err(BuildError::NotImplemented("nuget packaging")),
        };

        Ok(stages)
    }
}

impl Engine {
    fn render(&self, step: Step, state: &BuildState) -> BuildResult<String> {
        self.renderer
            .render(step, &self.settings.target_vars(state.target))
    }

    async fn run_step(&self, step: Step, state: &BuildState, cwd: &Path) -> BuildResult<()> {
        let command = self.render(step, state)?;
        info!("{}", command);
        self.runner
            .run(&Invocation::new(command, cwd, &state.toolchain))
            .await
    }

    pub(crate) async fn sync_submodules(&self, state: &BuildState) -> BuildResult<()> {
        info!("Init V8 Submodule");

        let command = self.render(Step::SubmoduleSync, state)?;
        let invocation = Invocation::new(command, self.settings.base_dir(), &state.toolchain);
        if let Err(err) = self.runner.run(&invocation).await {
            let detail = match err.stderr() {
                Some(stderr) => String::from_utf8_lossy(stderr).trim_end().to_string(),
                None => err.to_string(),
            };
            warn!("submodule sync failed, continuing with the current checkout: {}", detail);
        }

        Ok(())
    }

    pub(crate) async fn build_native_engine(&self, state: &BuildState) -> BuildResult<()> {
        info!("Build V8 Javascript Engine");

        let engine_dir = self.settings.engine_path();
        if self.settings.host().is_windows() {
            self.run_step(Step::EngineGenerateMsvc, state, &engine_dir)
                .await?;

            let msvc = state.toolchain.msvc()?;
            info!(
                "Loading Visual Studio {} environment from {}",
                msvc.version,
                msvc.dev_cmd.display()
            );

            let captured = capture_batch_environment(
                self.runner.as_ref(),
                &msvc.dev_cmd,
                &engine_dir,
                &state.toolchain,
            )
            .await?;

            let command = self.render(Step::EngineCompileMsvc, state)?;
            info!("{}", command);
            let invocation =
                Invocation::new(command, &engine_dir, &state.toolchain).with_captured(captured);
            self.runner.run(&invocation).await?;
        } else {
            self.run_step(Step::EngineDeps, state, &engine_dir).await?;
            self.run_step(Step::EngineCompile, state, &engine_dir)
                .await?;
        }

        Ok(())
    }

    /// Generates and compiles the native proxy, then copies whichever proxy
    /// libraries were produced into the result directory.
    pub(crate) async fn build_native_proxy(&self, state: &BuildState) -> BuildResult<Vec<PathBuf>> {
        info!("Build V8.Net native Proxy {}", state.target);

        let dest = self.settings.result_path_for_mode(state.target.mode);
        tokio::fs::create_dir_all(&dest).await?;

        let base_dir = self.settings.base_dir();
        self.run_step(Step::ProxyGenerate, state, base_dir).await?;
        self.run_step(Step::ProxyCompile, state, base_dir).await?;

        let lib_dir = self.settings.library_path_for_target(state.target);
        let mut copied = vec![];
        for library in PROXY_LIBRARIES {
            if let Some(path) = copy_if_present(&lib_dir.join(library), &dest).await? {
                copied.push(path);
            }
        }

        Ok(copied)
    }

    pub(crate) async fn build_managed_wrapper(&self, state: &BuildState) -> BuildResult<Vec<PathBuf>> {
        info!("Building V8.Net Wrapper....");

        for mode in Mode::modes() {
            tokio::fs::create_dir_all(self.settings.result_path_for_mode(mode)).await?;
        }

        let step = if self.settings.host().is_windows() {
            Step::WrapperMsvc
        } else {
            Step::WrapperMono
        };
        self.run_step(step, state, self.settings.base_dir()).await?;

        let mut copied = vec![];
        for mode in Mode::modes() {
            copied.extend(
                copy_regular_files(
                    &self.settings.console_bin_path_for_mode(mode),
                    &self.settings.result_path_for_mode(mode),
                )
                .await?,
            );
        }

        Ok(copied)
    }
}
