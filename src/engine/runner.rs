use crate::engine::environment::ToolchainEnvironment;
use crate::error::{BuildError, BuildResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Marks the end of the init script's own output in an environment dump.
const ENV_DUMP_TAG: &str = "Done running command";

/// One shell command line together with where and how it runs.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Invocation {
    pub command: String,
    pub cwd: PathBuf,
    /// Added on top of the ambient (or captured) environment.
    pub env: BTreeMap<String, String>,
    /// Replaces the ambient environment entirely when set.
    pub captured: Option<HashMap<String, String>>,
}

impl Invocation {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>, env: &ToolchainEnvironment) -> Self {
        Invocation {
            command: command.into(),
            cwd: cwd.into(),
            env: env.vars.clone(),
            captured: None,
        }
    }

    pub fn with_captured(mut self, captured: HashMap<String, String>) -> Self {
        self.captured = Some(captured);
        self
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync + Debug {
    /// Runs to completion. Standard output goes to the terminal, standard
    /// error is captured and carried by the error on a non-zero exit.
    async fn run(&self, invocation: &Invocation) -> BuildResult<()>;

    /// Like [`CommandRunner::run`] but returns the captured standard output.
    async fn capture(&self, invocation: &Invocation) -> BuildResult<Vec<u8>>;
}

#[derive(Debug, Default)]
pub struct ShellRunner;

impl ShellRunner {
    fn command(invocation: &Invocation) -> Command {
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.args(["/S", "/C"])
                .raw_arg(format!("\"{}\"", invocation.command));
            cmd
        };

        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&invocation.command);
            cmd
        };

        if let Some(captured) = &invocation.captured {
            cmd.env_clear();
            cmd.envs(captured);
        }

        cmd.envs(&invocation.env);
        cmd.current_dir(&invocation.cwd);
        cmd.stdin(Stdio::null());
        cmd.stderr(Stdio::piped());
        cmd
    }

    async fn execute(&self, invocation: &Invocation, stdout: Stdio) -> BuildResult<Vec<u8>> {
        debug!("Execute: {}", invocation.command);

        let mut cmd = Self::command(invocation);
        cmd.stdout(stdout);

        let output = cmd.output().await.map_err(|source| BuildError::Spawn {
            command: invocation.command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(BuildError::ExternalCommandFailed {
                command: invocation.command.clone(),
                status: output.status.code(),
                stderr: output.stderr,
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, invocation: &Invocation) -> BuildResult<()> {
        self.execute(invocation, Stdio::inherit()).await?;
        Ok(())
    }

    async fn capture(&self, invocation: &Invocation) -> BuildResult<Vec<u8>> {
        self.execute(invocation, Stdio::piped()).await
    }
}

/// Runs an environment init batch file and returns the environment it
/// leaves behind.
pub async fn capture_batch_environment(
    runner: &dyn CommandRunner,
    batch: &Path,
    cwd: &Path,
    env: &ToolchainEnvironment,
) -> BuildResult<HashMap<String, String>> {
    let command = format!(
        "\"{}\" && echo \"{}\" && set",
        batch.display(),
        ENV_DUMP_TAG
    );

    let stdout = runner.capture(&Invocation::new(command, cwd, env)).await?;
    parse_environment_dump(&String::from_utf8_lossy(&stdout)).ok_or_else(|| {
        BuildError::Configuration(format!(
            "environment script {} did not complete",
            batch.display()
        ))
    })
}

/// Parses the `KEY=VALUE` lines following the dump tag. Lines without a `=`
/// or with an empty key are dropped. Returns `None` when the tag never
/// appears.
pub fn parse_environment_dump(output: &str) -> Option<HashMap<String, String>> {
    let mut lines = output.lines();
    lines.by_ref().find(|x| x.contains(ENV_DUMP_TAG))?;

    Some(
        lines
            .filter_map(|line| line.trim_end().split_once('='))
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    )
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingRunner;
    use super::*;
    use crate::engine::environment::HostPlatform;

    fn ambient() -> ToolchainEnvironment {
        ToolchainEnvironment::ambient(HostPlatform::Linux)
    }

    #[test]
    fn environment_dump_skips_script_output() {
        let dump = "** Visual Studio 2013 Developer Command Prompt\r\n\
                    PATH=C:\\nothing\r\n\
                    \"Done running command\"\r\n\
                    PATH=C:\\VS\\bin;C:\\Windows\r\n\
                    INCLUDE=C:\\VS\\include\r\n\
                    malformed line\r\n\
                    =C:=C:\\\r\n\
                    EQUATION=a=b\r\n";

        let env = parse_environment_dump(dump).unwrap();
        assert_eq!(env.len(), 3);
        assert_eq!(env["PATH"], "C:\\VS\\bin;C:\\Windows");
        assert_eq!(env["INCLUDE"], "C:\\VS\\include");
        assert_eq!(env["EQUATION"], "a=b");
    }

    #[test]
    fn environment_dump_without_tag_is_rejected() {
        assert_eq!(parse_environment_dump("PATH=C:\\\r\n"), None);
    }

    #[tokio::test]
    async fn batch_environment_is_captured_through_runner() {
        let runner = RecordingRunner {
            stdout: b"\"Done running command\"\nLIB=C:\\VS\\lib\n".to_vec(),
            ..RecordingRunner::default()
        };

        let env = capture_batch_environment(
            &runner,
            Path::new("C:\\VS\\VsDevCmd.bat"),
            Path::new("."),
            &ambient(),
        )
        .await
        .unwrap();

        assert_eq!(env["LIB"], "C:\\VS\\lib");
        assert_eq!(
            runner.commands(),
            vec!["\"C:\\VS\\VsDevCmd.bat\" && echo \"Done running command\" && set".to_string()]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_returns_normally() {
        let invocation = Invocation::new("true", ".", &ambient());
        ShellRunner.run(&invocation).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_exact_stderr() {
        let invocation = Invocation::new("printf 'no such target\\n\\377' >&2; exit 3", ".", &ambient());
        let err = ShellRunner.run(&invocation).await.unwrap_err();

        match err {
            BuildError::ExternalCommandFailed {
                command,
                status,
                stderr,
            } => {
                assert_eq!(command, invocation.command);
                assert_eq!(status, Some(3));
                assert_eq!(stderr, b"no such target\n\xff".to_vec());
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn toolchain_variables_reach_the_process() {
        let mut env = ambient();
        env.vars.insert("GYP_DEFINES".to_string(), "clang=1".to_string());

        let invocation = Invocation::new("printf %s \"$GYP_DEFINES\"", ".", &env);
        let stdout = ShellRunner.capture(&invocation).await.unwrap();
        assert_eq!(stdout, b"clang=1".to_vec());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captured_environment_replaces_ambient_one() {
        std::env::set_var("V8NET_BUILD_AMBIENT_ONLY", "ambient");

        let mut captured = HashMap::new();
        captured.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        captured.insert("CAPTURED".to_string(), "yes".to_string());

        let invocation = Invocation::new(
            "printf '%s|%s' \"$CAPTURED\" \"$V8NET_BUILD_AMBIENT_ONLY\"",
            ".",
            &ambient(),
        )
        .with_captured(captured);

        let stdout = ShellRunner.capture(&invocation).await.unwrap();
        assert_eq!(stdout, b"yes|".to_vec());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn commands_run_in_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let invocation = Invocation::new("pwd", dir.path(), &ambient());

        let stdout = ShellRunner.capture(&invocation).await.unwrap();
        let reported = PathBuf::from(String::from_utf8_lossy(&stdout).trim_end());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }
}
