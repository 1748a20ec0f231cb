use crate::definition::{
    BuildConfig, CommandTemplates, PathsConfig, Step, ToolchainConfig, WrapperConfig,
};
use kdl::{KdlDocument, KdlNode};
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[error("Failed parsing build configuration")]
pub struct ConfigParseCompoundError {
    #[source_code]
    pub source_code: NamedSource,
    #[related]
    pub(crate) errors: Vec<ConfigParseError>,
}

#[derive(Debug, Diagnostic, Eq, PartialEq, Error)]
#[error("{kind}")]
pub struct ConfigParseError {
    /// Offset in chars of the error.
    #[label("{}", label.unwrap_or("here"))]
    pub span: SourceSpan,

    /// Label text for this span. Defaults to `"here"`.
    pub label: Option<&'static str>,

    /// Suggestion for fixing the parser error.
    #[help]
    pub help: Option<String>,

    /// Specific error kind for this parser error.
    pub kind: &'static str,
}

const EMPTY_NODES: &[KdlNode] = &[];

// Children outside these lists are ignored, repeated or not.
const PATHS_KEYS: &[&str] = &["engine-dir", "build-dir", "result-dir", "console-bin", "proxy-gyp"];
const TOOLCHAIN_KEYS: &[&str] = &["vs-dev-cmd", "mac-deployment-target"];
const WRAPPER_KEYS: &[&str] = &["windows-solution", "unix-solution"];

pub(crate) trait GetNodes {
    fn nodes(&self) -> &[KdlNode];
}

impl GetNodes for KdlNode {
    fn nodes(&self) -> &[KdlNode] {
        self.children().map_or(EMPTY_NODES, |x| x.nodes())
    }
}

pub trait ParseDocument {
    fn parse_document_strict(input: &KdlDocument, source: &str, filename: &str) -> miette::Result<Self>
    where
        Self: Sized,
    {
        let (data, errors) = Self::parse_document_with_errors(input);

        match data {
            Some(obj) if errors.is_empty() => Ok(obj),

            _ => Err(ConfigParseCompoundError {
                source_code: NamedSource::new(filename, source.to_string()),
                errors,
            }
            .into()),
        }
    }

    fn parse_document_with_errors(input: &KdlDocument) -> (Option<Self>, Vec<ConfigParseError>)
    where
        Self: Sized;
}

/// Merges the children of a config section into already defaulted values.
pub(crate) trait ApplyNode {
    fn apply_node(&mut self, input: &KdlNode) -> Vec<ConfigParseError>;
}

macro_rules! parse_string_into {
    ($input:ident, $into:expr, $errors:expr, $name:literal) => {
        match extract_single_string_value(
            $input,
            concat!($name, " missing"),
            concat!($name, " should be a string"),
            concat!("only 1 string expected for ", $name),
            concat!($name, " expected a value, property found instead"),
        ) {
            Ok(n) => $into = n.into(),
            Err(e) => $errors.push(e),
        }
    };
}

impl ParseDocument for BuildConfig {
    fn parse_document_with_errors(input: &KdlDocument) -> (Option<Self>, Vec<ConfigParseError>)
    where
        Self: Sized,
    {
        let mut config = BuildConfig::default();
        let mut errors = vec![];

        for node in input.nodes() {
            match node.name().value() {
                "paths" => errors.extend(config.paths.apply_node(node)),
                "toolchain" => errors.extend(config.toolchain.apply_node(node)),
                "wrapper" => errors.extend(config.wrapper.apply_node(node)),
                "commands" => errors.extend(config.commands.apply_node(node)),
                _ => {}
            }
        }

        (Some(config), errors)
    }
}

impl ApplyNode for PathsConfig {
    fn apply_node(&mut self, input: &KdlNode) -> Vec<ConfigParseError> {
        let mut errors = vec![];
        let mut seen = HashSet::new();

        for node in input.nodes() {
            let name = node.name().value();
            if !PATHS_KEYS.contains(&name) || !first_definition(node, &mut seen, &mut errors) {
                continue;
            }

            let mut value: Option<String> = None;
            match name {
                "engine-dir" => parse_string_into!(node, value, errors, "engine-dir"),
                "build-dir" => parse_string_into!(node, value, errors, "build-dir"),
                "result-dir" => parse_string_into!(node, value, errors, "result-dir"),
                "console-bin" => parse_string_into!(node, value, errors, "console-bin"),
                "proxy-gyp" => parse_string_into!(node, value, errors, "proxy-gyp"),
                _ => {}
            }

            if let Some(value) = value {
                match name {
                    "engine-dir" => self.engine_dir = PathBuf::from(value),
                    "build-dir" => self.build_dir = PathBuf::from(value),
                    "result-dir" => self.result_dir = PathBuf::from(value),
                    "console-bin" => self.console_bin = PathBuf::from(value),
                    _ => self.proxy_gyp = value,
                }
            }
        }

        errors
    }
}

impl ApplyNode for ToolchainConfig {
    fn apply_node(&mut self, input: &KdlNode) -> Vec<ConfigParseError> {
        let mut errors = vec![];
        let mut seen = HashSet::new();

        for node in input.nodes() {
            if !TOOLCHAIN_KEYS.contains(&node.name().value())
                || !first_definition(node, &mut seen, &mut errors)
            {
                continue;
            }

            match node.name().value() {
                "vs-dev-cmd" => {
                    let mut value: Option<String> = None;
                    parse_string_into!(node, value, errors, "vs-dev-cmd");
                    if let Some(value) = value {
                        self.vs_dev_cmd = Some(PathBuf::from(value));
                    }
                }

                "mac-deployment-target" => {
                    parse_string_into!(
                        node,
                        self.mac_deployment_target,
                        errors,
                        "mac-deployment-target"
                    );
                }

                _ => {}
            }
        }

        errors
    }
}

impl ApplyNode for WrapperConfig {
    fn apply_node(&mut self, input: &KdlNode) -> Vec<ConfigParseError> {
        let mut errors = vec![];
        let mut seen = HashSet::new();

        for node in input.nodes() {
            if !WRAPPER_KEYS.contains(&node.name().value())
                || !first_definition(node, &mut seen, &mut errors)
            {
                continue;
            }

            match node.name().value() {
                "windows-solution" => {
                    parse_string_into!(node, self.windows_solution, errors, "windows-solution");
                }

                "unix-solution" => {
                    parse_string_into!(node, self.unix_solution, errors, "unix-solution");
                }

                _ => {}
            }
        }

        errors
    }
}

impl ApplyNode for CommandTemplates {
    fn apply_node(&mut self, input: &KdlNode) -> Vec<ConfigParseError> {
        let mut errors = vec![];
        let mut seen = HashSet::new();

        for node in input.nodes() {
            let step = match Step::from_str(node.name().value()) {
                Some(step) => step,
                None => {
                    errors.push(ConfigParseError {
                        span: *node.name().span(),
                        label: None,
                        help: Some(format!(
                            "known steps are: {}",
                            Step::steps().map(|x| x.name()).join(", ")
                        )),
                        kind: "unknown command step",
                    });
                    continue;
                }
            };

            if !first_definition(node, &mut seen, &mut errors) {
                continue;
            }

            let mut template: Option<String> = None;
            parse_string_into!(node, template, errors, "command template");
            if let Some(template) = template {
                self.set(step, template);
            }
        }

        errors
    }
}

fn first_definition<'a>(
    node: &'a KdlNode,
    seen: &mut HashSet<&'a str>,
    errors: &mut Vec<ConfigParseError>,
) -> bool {
    if seen.insert(node.name().value()) {
        return true;
    }

    errors.push(ConfigParseError {
        span: *node.span(),
        label: Some("second definition here"),
        help: None,
        kind: "redefinition of a single valued entry",
    });

    false
}

pub(crate) fn extract_single_string_value(
    input: &KdlNode,
    missing_error: &'static str,
    wrong_type_error: &'static str,
    too_many_error: &'static str,
    property_found_error: &'static str,
) -> Result<String, ConfigParseError> {
    match input.entries() {
        [] => Err(ConfigParseError {
            span: *input.name().span(),
            label: None,
            help: None,
            kind: missing_error,
        }),

        [name_entry] => {
            if name_entry.name().is_some() {
                return Err(ConfigParseError {
                    span: *name_entry.span(),
                    label: None,
                    help: None,
                    kind: property_found_error,
                });
            }

            if let Some(v) = name_entry.value().as_string() {
                Ok(v.to_string())
            } else {
                Err(ConfigParseError {
                    span: *name_entry.span(),
                    label: None,
                    help: None,
                    kind: wrong_type_error,
                })
            }
        }

        [first, .., last] => {
            let start_args = first.span().offset();
            let end_args = last.span().offset() + last.span().len();

            let span = SourceSpan::new(start_args.into(), (end_args - start_args).into());
            Err(ConfigParseError {
                span,
                label: None,
                help: None,
                kind: too_many_error,
            })
        }
    }
}
