use miette::Diagnostic;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Diagnostic, Error)]
pub enum BuildError {
    #[error("required tool `{tool}` was not found on the search path")]
    #[diagnostic(
        code(v8net_build::tool_not_found),
        help("install clang and make sure it is reachable through PATH")
    )]
    ToolNotFound { tool: String },

    #[error("{0}")]
    #[diagnostic(code(v8net_build::configuration))]
    Configuration(String),

    #[error("failed downloading {name}:\n{}", String::from_utf8_lossy(.stderr))]
    #[diagnostic(code(v8net_build::fetch_failed))]
    FetchFailed {
        name: String,
        command: String,
        stderr: Vec<u8>,
    },

    #[error("failed to execute command `{command}`:\n{}", String::from_utf8_lossy(.stderr))]
    #[diagnostic(code(v8net_build::command_failed))]
    ExternalCommandFailed {
        command: String,
        /// `None` when the process was terminated by a signal.
        status: Option<i32>,
        stderr: Vec<u8>,
    },

    #[error("failed to launch `{command}`")]
    #[diagnostic(code(v8net_build::spawn))]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not implemented")]
    #[diagnostic(code(v8net_build::not_implemented))]
    NotImplemented(&'static str),

    #[error("failed rendering command template `{name}`")]
    #[diagnostic(code(v8net_build::template))]
    Template {
        name: &'static str,
        #[source]
        source: handlebars::RenderError,
    },

    #[error(transparent)]
    #[diagnostic(code(v8net_build::io))]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Captured standard error of the failing process, if any.
    pub fn stderr(&self) -> Option<&[u8]> {
        match self {
            BuildError::FetchFailed { stderr, .. }
            | BuildError::ExternalCommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
