use crate::definition::ToolchainConfig;
use crate::error::{BuildError, BuildResult};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum HostPlatform {
    Linux,
    Mac,
    Windows,
}

impl HostPlatform {
    pub fn detect() -> BuildResult<Self> {
        Self::from_os(std::env::consts::OS).ok_or_else(|| {
            BuildError::Configuration(format!(
                "unsupported host operating system `{}`",
                std::env::consts::OS
            ))
        })
    }

    pub fn from_os(os: &str) -> Option<Self> {
        Some(match os {
            "linux" => HostPlatform::Linux,
            "macos" => HostPlatform::Mac,
            "windows" => HostPlatform::Windows,
            _ => return None,
        })
    }

    pub fn is_windows(&self) -> bool {
        *self == HostPlatform::Windows
    }
}

/// Visual Studio tools directories, newest first.
const MSVC_PROBES: &[(&str, &str)] = &[
    ("VS120COMNTOOLS", "2013"),
    ("VS110COMNTOOLS", "2012"),
    ("VS100COMNTOOLS", "2010"),
];

/// What the resolver may observe about the host.
pub trait HostProbe: Send + Sync + Debug {
    fn find_program(&self, name: &str) -> Option<PathBuf>;
    fn var(&self, name: &str) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct SystemProbe;

impl HostProbe for SystemProbe {
    fn find_program(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MsvcInstall {
    pub version: &'static str,
    pub dev_cmd: PathBuf,
}

/// Variables handed to every process of a run, on top of the ambient
/// environment.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ToolchainEnvironment {
    pub host: HostPlatform,
    pub vars: BTreeMap<String, String>,
    pub msvc: Option<MsvcInstall>,
}

impl ToolchainEnvironment {
    /// Environment of a run that never resolved a toolchain.
    pub fn ambient(host: HostPlatform) -> Self {
        ToolchainEnvironment {
            host,
            vars: BTreeMap::new(),
            msvc: None,
        }
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn msvc(&self) -> BuildResult<&MsvcInstall> {
        self.msvc.as_ref().ok_or_else(|| {
            BuildError::Configuration("no Visual Studio toolchain has been resolved".to_string())
        })
    }
}

pub fn resolve(
    host: HostPlatform,
    probe: &dyn HostProbe,
    config: &ToolchainConfig,
) -> BuildResult<ToolchainEnvironment> {
    let env = match host {
        HostPlatform::Linux => {
            info!("Export Linux defines");
            clang_environment(host, probe, "libstdc++", "clang=1".to_string())?
        }

        HostPlatform::Mac => {
            info!("Export Mac defines");
            let defines = format!("clang=1 mac_deployment_target={}", config.mac_deployment_target);
            clang_environment(host, probe, "libc++", defines)?
        }

        HostPlatform::Windows => msvc_environment(probe, config)?,
    };

    for (name, value) in &env.vars {
        info!("{}={}", name, value);
    }

    Ok(env)
}

fn find_tool(probe: &dyn HostProbe, name: &str) -> BuildResult<String> {
    probe
        .find_program(name)
        .map(|x| x.to_string_lossy().into_owned())
        .ok_or_else(|| BuildError::ToolNotFound {
            tool: name.to_string(),
        })
}

fn clang_environment(
    host: HostPlatform,
    probe: &dyn HostProbe,
    stdlib: &str,
    defines: String,
) -> BuildResult<ToolchainEnvironment> {
    let clangpp = find_tool(probe, "clang++")?;
    let clang = find_tool(probe, "clang")?;

    let cxx = format!("{} -v -std=c++11 -stdlib={}", clangpp, stdlib);
    let vars = [
        ("GYP_DEFINES", defines),
        ("CXX", cxx.clone()),
        ("CC", format!("{} -v", clang)),
        ("CPP", format!("{} -E -v", clang)),
        ("LINK", cxx),
        ("CXX_host", format!("{} -v", clangpp)),
        ("CC_host", format!("{} -v", clang)),
        ("CPP_host", format!("{} -E -v", clang)),
        ("LINK_host", format!("{} -v", clangpp)),
    ];

    Ok(ToolchainEnvironment {
        host,
        vars: vars
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        msvc: None,
    })
}

fn msvc_environment(
    probe: &dyn HostProbe,
    config: &ToolchainConfig,
) -> BuildResult<ToolchainEnvironment> {
    let (tools, version) = MSVC_PROBES
        .iter()
        .find_map(|(var, version)| {
            probe
                .var(var)
                .filter(|x| !x.is_empty())
                .map(|x| (PathBuf::from(x), *version))
        })
        .ok_or_else(|| {
            BuildError::Configuration(
                "Failed to detect correct version of Visual Studio. \
                 Please open the developer prompt and run the command file there."
                    .to_string(),
            )
        })?;

    info!("Visual Studio Version: {}", version);

    let mut vars = BTreeMap::new();
    vars.insert("GYP_MSVS_VERSION".to_string(), version.to_string());

    Ok(ToolchainEnvironment {
        host: HostPlatform::Windows,
        vars,
        msvc: Some(MsvcInstall {
            version,
            dev_cmd: config
                .vs_dev_cmd
                .clone()
                .unwrap_or_else(|| tools.join("VsDevCmd.bat")),
        }),
    })
}


#[cfg(test)]
mod tests {
    use super::testing::FakeProbe;
    use super::*;
    use std::path::Path;

    #[test]
    fn linux_uses_libstdcxx_and_clang_define() {
        let env = resolve(
            HostPlatform::Linux,
            &FakeProbe::with_clang(),
            &ToolchainConfig::default(),
        )
        .unwrap();

        assert_eq!(env.get("GYP_DEFINES"), Some("clang=1"));
        assert_eq!(
            env.get("CXX"),
            Some("/usr/bin/clang++ -v -std=c++11 -stdlib=libstdc++")
        );
        assert_eq!(env.get("LINK"), env.get("CXX"));
        assert_eq!(env.get("CPP"), Some("/usr/bin/clang -E -v"));
        assert_eq!(env.get("LINK_host"), Some("/usr/bin/clang++ -v"));
        assert!(env.msvc.is_none());
    }

    #[test]
    fn mac_adds_deployment_target() {
        let env = resolve(
            HostPlatform::Mac,
            &FakeProbe::with_clang(),
            &ToolchainConfig::default(),
        )
        .unwrap();

        assert_eq!(
            env.get("GYP_DEFINES"),
            Some("clang=1 mac_deployment_target=10.10")
        );
        assert_eq!(
            env.get("CXX"),
            Some("/usr/bin/clang++ -v -std=c++11 -stdlib=libc++")
        );
    }

    #[test]
    fn missing_compiler_is_tool_not_found() {
        let mut probe = FakeProbe::with_clang();
        probe.programs.remove("clang");

        let err = resolve(HostPlatform::Linux, &probe, &ToolchainConfig::default()).unwrap_err();
        assert!(matches!(err, BuildError::ToolNotFound { tool } if tool == "clang"));
    }

    #[test]
    fn resolving_twice_is_identical() {
        let probe = FakeProbe::with_clang();
        let config = ToolchainConfig::default();

        for host in [HostPlatform::Linux, HostPlatform::Mac] {
            let first = resolve(host, &probe, &config).unwrap();
            let second = resolve(host, &probe, &config).unwrap();
            assert_eq!(first, second);
        }

        let probe = FakeProbe::default().with_var("VS110COMNTOOLS", "C:\\VS11\\Tools\\");
        let first = resolve(HostPlatform::Windows, &probe, &config).unwrap();
        let second = resolve(HostPlatform::Windows, &probe, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn newest_visual_studio_wins() {
        let probe = FakeProbe::default()
            .with_var("VS100COMNTOOLS", "C:\\VS10\\Tools")
            .with_var("VS110COMNTOOLS", "C:\\VS11\\Tools");

        let env = resolve(HostPlatform::Windows, &probe, &ToolchainConfig::default()).unwrap();
        assert_eq!(env.get("GYP_MSVS_VERSION"), Some("2012"));

        let msvc = env.msvc.unwrap();
        assert_eq!(msvc.version, "2012");
        assert_eq!(msvc.dev_cmd, PathBuf::from("C:\\VS11\\Tools").join("VsDevCmd.bat"));
    }

    #[test]
    fn empty_markers_are_skipped() {
        let probe = FakeProbe::default()
            .with_var("VS120COMNTOOLS", "")
            .with_var("VS100COMNTOOLS", "C:\\VS10\\Tools");

        let env = resolve(HostPlatform::Windows, &probe, &ToolchainConfig::default()).unwrap();
        assert_eq!(env.get("GYP_MSVS_VERSION"), Some("2010"));
    }

    #[test]
    fn configured_dev_cmd_overrides_detected_one() {
        let probe = FakeProbe::default().with_var("VS120COMNTOOLS", "C:\\VS12\\Tools");
        let config = ToolchainConfig {
            vs_dev_cmd: Some(PathBuf::from("D:\\tools\\init.bat")),
            ..ToolchainConfig::default()
        };

        let env = resolve(HostPlatform::Windows, &probe, &config).unwrap();
        assert_eq!(env.msvc().unwrap().dev_cmd, Path::new("D:\\tools\\init.bat"));
    }

    #[test]
    fn no_visual_studio_is_configuration_error() {
        let err = resolve(
            HostPlatform::Windows,
            &FakeProbe::default(),
            &ToolchainConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn host_detection_from_os_name() {
        assert_eq!(HostPlatform::from_os("linux"), Some(HostPlatform::Linux));
        assert_eq!(HostPlatform::from_os("macos"), Some(HostPlatform::Mac));
        assert_eq!(HostPlatform::from_os("windows"), Some(HostPlatform::Windows));
        assert_eq!(HostPlatform::from_os("freebsd"), None);
    }
}
