pub mod parsing;

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const SELECTORS: &[&str] = &["ia32.debug", "ia32.release", "x64.debug", "x64.release"];

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Architecture {
    Ia32,
    X64,
}

impl Architecture {
    pub fn from_str(input: &str) -> Option<Self> {
        Some(match input {
            "ia32" => Architecture::Ia32,
            "x64" => Architecture::X64,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Architecture::Ia32 => "ia32",
            Architecture::X64 => "x64",
        }
    }

    /// Platform name understood by msbuild.
    pub fn msbuild_platform(&self) -> &'static str {
        match self {
            Architecture::Ia32 => "Win32",
            Architecture::X64 => "x64",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Mode {
    Debug,
    Release,
}

impl Mode {
    pub const fn modes() -> [Mode; 2] {
        [Mode::Debug, Mode::Release]
    }

    pub fn from_str(input: &str) -> Option<Self> {
        Some(match input {
            "debug" => Mode::Debug,
            "release" => Mode::Release,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Debug => "debug",
            Mode::Release => "release",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Mode::Debug => "Debug",
            Mode::Release => "Release",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct BuildTarget {
    pub arch: Architecture,
    pub mode: Mode,
}

impl Default for BuildTarget {
    fn default() -> Self {
        BuildTarget {
            arch: Architecture::Ia32,
            mode: Mode::Release,
        }
    }
}

impl Display for BuildTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.arch.name(), self.mode.name())
    }
}

#[derive(Debug, Eq, PartialEq, Error)]
#[error("invalid selector `{selector}`, supported options are: {}", SELECTORS.join(", "))]
pub struct InvalidSelector {
    pub selector: String,
}

impl FromStr for BuildTarget {
    type Err = InvalidSelector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidSelector {
            selector: s.to_string(),
        };

        let (arch, mode) = s.split_once('.').ok_or_else(invalid)?;
        Ok(BuildTarget {
            arch: Architecture::from_str(arch).ok_or_else(invalid)?,
            mode: Mode::from_str(mode).ok_or_else(invalid)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BuildAction {
    Everything(BuildTarget),
    EngineOnly(BuildTarget),
    NativeProxy(BuildTarget),
    ManagedWrapper,
    Package,
}

impl BuildAction {
    /// Target the action runs against. Actions without a selector run
    /// against the default target.
    pub fn target(&self) -> BuildTarget {
        match self {
            BuildAction::Everything(t) | BuildAction::EngineOnly(t) | BuildAction::NativeProxy(t) => {
                *t
            }
            BuildAction::ManagedWrapper | BuildAction::Package => BuildTarget::default(),
        }
    }
}

/// A single external command line of a build stage.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Step {
    SubmoduleSync,
    Clone,
    EngineDeps,
    EngineCompile,
    EngineGenerateMsvc,
    EngineCompileMsvc,
    ProxyGenerate,
    ProxyCompile,
    WrapperMsvc,
    WrapperMono,
}

impl Step {
    pub const fn steps() -> [Step; 10] {
        [
            Step::SubmoduleSync,
            Step::Clone,
            Step::EngineDeps,
            Step::EngineCompile,
            Step::EngineGenerateMsvc,
            Step::EngineCompileMsvc,
            Step::ProxyGenerate,
            Step::ProxyCompile,
            Step::WrapperMsvc,
            Step::WrapperMono,
        ]
    }

    pub fn from_str(input: &str) -> Option<Self> {
        Step::steps().into_iter().find(|x| x.name() == input)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Step::SubmoduleSync => "submodule-sync",
            Step::Clone => "clone",
            Step::EngineDeps => "engine-deps",
            Step::EngineCompile => "engine-compile",
            Step::EngineGenerateMsvc => "engine-generate-msvc",
            Step::EngineCompileMsvc => "engine-compile-msvc",
            Step::ProxyGenerate => "proxy-generate",
            Step::ProxyCompile => "proxy-compile",
            Step::WrapperMsvc => "wrapper-msvc",
            Step::WrapperMono => "wrapper-mono",
        }
    }

    pub fn default_template(&self) -> &'static str {
        match self {
            Step::SubmoduleSync => "git submodule update --init --recursive",
            Step::Clone => "git clone {{url}} {{path}}",
            Step::EngineDeps => "make builddeps -j {{jobs}}",
            Step::EngineCompile => {
                "make {{arch}}.{{mode}} library=shared snapshot=yes i18nsupport=off -j {{jobs}}"
            }
            Step::EngineGenerateMsvc => {
                "{{engine_dir}}/third_party/python_26/python build/gyp_v8{{#if debug}} -debug{{/if}} \
                 -Dtarget_arch={{arch}} -Dcomponent=shared_library -Dv8_use_snapshot=true \
                 -Dv8_enable_i18n_support=false"
            }
            Step::EngineCompileMsvc => {
                "msbuild /v:detailed /p:Configuration={{mode_title}} /p:Platform={{platform}} \
                 /p:TreatWarningsAsErrors=false {{engine_dir}}/tools/gyp/v8.sln"
            }
            Step::ProxyGenerate => {
                "{{gyp}}{{#if debug}} -debug{{/if}} -Dbase_dir={{base_dir}} -Dtarget_arch={{arch}} \
                 -Dbuild_option={{mode}} -f make --depth=. {{proxy_gyp}} \
                 --generator-output=./{{build_dir}}/makefiles"
            }
            Step::ProxyCompile => "V=1 make -C ./{{build_dir}}/makefiles -j {{jobs}}",
            Step::WrapperMsvc => {
                "msbuild /p:Configuration={{mode_title}} /p:Platform={{platform}} \
                 /p:TreatWarningsAsErrors=false {{solution}}"
            }
            Step::WrapperMono => "xbuild /p:Configuration={{mode_title}} {{solution}}",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandTemplates {
    overrides: HashMap<Step, String>,
}

impl CommandTemplates {
    pub fn get(&self, step: Step) -> &str {
        self.overrides
            .get(&step)
            .map_or_else(|| step.default_template(), |x| x.as_str())
    }

    pub fn set(&mut self, step: Step, template: String) {
        self.overrides.insert(step, template);
    }
}

#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub engine_dir: PathBuf,
    pub build_dir: PathBuf,
    pub result_dir: PathBuf,
    pub console_bin: PathBuf,
    pub proxy_gyp: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            engine_dir: PathBuf::from("Source/V8.NET-Proxy/V8"),
            build_dir: PathBuf::from("Build"),
            result_dir: PathBuf::from("BuildResult"),
            console_bin: PathBuf::from("Tests/V8.NET-Console/bin"),
            proxy_gyp: "v8dotnet.gyp".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolchainConfig {
    /// Visual Studio environment batch. When unset, `VsDevCmd.bat` inside the
    /// detected tools directory is used.
    pub vs_dev_cmd: Option<PathBuf>,
    pub mac_deployment_target: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        ToolchainConfig {
            vs_dev_cmd: None,
            mac_deployment_target: "10.10".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WrapperConfig {
    pub windows_solution: String,
    pub unix_solution: String,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        WrapperConfig {
            windows_solution: "V8.Net.sln".to_string(),
            unix_solution: "Source/V8.Net.MonoDevelop.sln".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    pub paths: PathsConfig,
    pub toolchain: ToolchainConfig,
    pub wrapper: WrapperConfig,
    pub commands: CommandTemplates,
}
