use crate::definition::Step;
use crate::engine::environment::ToolchainEnvironment;
use crate::engine::runner::{CommandRunner, Invocation};
use crate::engine::templates::{CommandRenderer, DependencyVars};
use crate::engine::EngineSettings;
use crate::error::{BuildError, BuildResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Dependency {
    pub name: &'static str,
    pub url: &'static str,
    /// Checkout directory relative to the engine source tree.
    pub path: &'static str,
}

pub const DEPENDENCIES: &[Dependency] = &[
    Dependency {
        name: "GYP",
        url: "https://chromium.googlesource.com/external/gyp",
        path: "build/gyp",
    },
    Dependency {
        name: "Cygwin",
        url: "https://chromium.googlesource.com/chromium/deps/cygwin",
        path: "third_party/cygwin",
    },
    Dependency {
        name: "python_26",
        url: "https://chromium.googlesource.com/chromium/deps/python_26",
        path: "third_party/python_26",
    },
    Dependency {
        name: "ICU",
        url: "https://chromium.googlesource.com/chromium/deps/icu52",
        path: "third_party/icu",
    },
    Dependency {
        name: "GTest",
        url: "https://chromium.googlesource.com/chromium/testing/gtest",
        path: "testing/gtest",
    },
    Dependency {
        name: "GMock",
        url: "https://chromium.googlesource.com/external/gmock",
        path: "testing/gmock",
    },
];

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FetchOutcome {
    Present,
    Fetched,
}

#[derive(Debug)]
pub struct Fetcher {
    settings: Arc<EngineSettings>,
    renderer: Arc<CommandRenderer>,
}

impl Fetcher {
    pub fn new(settings: Arc<EngineSettings>, renderer: Arc<CommandRenderer>) -> Self {
        Fetcher { settings, renderer }
    }

    /// Makes sure every dependency checkout exists. Stops at the first
    /// failed clone; checkouts made before it stay in place.
    pub async fn fetch_all(
        &self,
        runner: &dyn CommandRunner,
        env: &ToolchainEnvironment,
    ) -> BuildResult<Vec<FetchOutcome>> {
        info!("Downloading V8 build dependencies");

        let mut outcomes = Vec::with_capacity(DEPENDENCIES.len());
        for dependency in DEPENDENCIES {
            outcomes.push(self.fetch(dependency, runner, env).await?);
        }

        Ok(outcomes)
    }

    pub async fn fetch(
        &self,
        dependency: &Dependency,
        runner: &dyn CommandRunner,
        env: &ToolchainEnvironment,
    ) -> BuildResult<FetchOutcome> {
        info!("Downloading {} ...", dependency.name);

        // A directory that exists is trusted as a complete checkout, even if
        // an earlier clone was interrupted.
        let path = self.checkout_path(dependency);
        if is_dir(&path).await? {
            debug!("{} already present at {}", dependency.name, path.display());
            return Ok(FetchOutcome::Present);
        }

        let command = self.renderer.render(
            Step::Clone,
            &DependencyVars {
                name: dependency.name,
                url: dependency.url,
                path: path.display().to_string(),
            },
        )?;

        let invocation = Invocation::new(command, self.settings.base_dir(), env);
        match runner.run(&invocation).await {
            Ok(()) => Ok(FetchOutcome::Fetched),
            Err(BuildError::ExternalCommandFailed { command, stderr, .. }) => {
                Err(BuildError::FetchFailed {
                    name: dependency.name.to_string(),
                    command,
                    stderr,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn checkout_path(&self, dependency: &Dependency) -> PathBuf {
        self.settings.engine_path().join(dependency.path)
    }
}

async fn is_dir(path: &Path) -> BuildResult<bool> {
    match tokio::fs::metadata(path).await {
        Ok(md) => Ok(md.is_dir()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
