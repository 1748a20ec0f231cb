use crate::definition::{CommandTemplates, Step};
use crate::error::{BuildError, BuildResult};
use handlebars::Handlebars;
use serde::Serialize;

/// Variables available to build stage command templates.
#[derive(Serialize, Debug, Clone)]
pub struct TargetVars {
    pub arch: &'static str,
    pub mode: &'static str,
    pub mode_title: &'static str,
    pub selector: String,
    pub platform: &'static str,
    pub debug: bool,
    pub jobs: usize,
    pub base_dir: String,
    pub engine_dir: String,
    pub build_dir: String,
    pub gyp: String,
    pub proxy_gyp: String,
    pub solution: String,
}

/// Variables available to the clone template.
#[derive(Serialize, Debug)]
pub struct DependencyVars<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub path: String,
}

#[derive(Debug)]
pub struct CommandRenderer {
    engine: Handlebars<'static>,
    commands: CommandTemplates,
}

impl CommandRenderer {
    pub fn new(commands: CommandTemplates) -> Self {
        let mut engine = Handlebars::new();
        engine.register_escape_fn(handlebars::no_escape);
        engine.set_strict_mode(true);

        CommandRenderer { engine, commands }
    }

    pub fn render<T: Serialize>(&self, step: Step, vars: &T) -> BuildResult<String> {
        self.engine
            .render_template(self.commands.get(step), vars)
            .map_err(|source| BuildError::Template {
                name: step.name(),
                source,
            })
    }
}
