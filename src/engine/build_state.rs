use crate::definition::BuildTarget;
use crate::engine::environment::{HostPlatform, ToolchainEnvironment};
use crate::engine::fetcher::FetchOutcome;
use std::path::PathBuf;
use std::time::SystemTime;

#[derive(Debug)]
pub struct BuildState {
    pub build_time: SystemTime,
    pub target: BuildTarget,
    pub toolchain: ToolchainEnvironment,
    pub fetched: Vec<FetchOutcome>,
    /// Files copied into the result directory.
    pub artifacts: Vec<PathBuf>,
}

impl BuildState {
    pub fn new(target: BuildTarget, host: HostPlatform) -> Self {
        BuildState {
            build_time: SystemTime::now(),
            target,
            toolchain: ToolchainEnvironment::ambient(host),
            fetched: vec![],
            artifacts: vec![],
        }
    }
}
