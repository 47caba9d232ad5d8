//! Macro expansion of document sources.
//!
//! Documents are expanded as templates before they are parsed, so values can
//! come from the environment, local files or a live Vault lookup:
//!
//! ```yaml
//! keys:
//! - key: secret/app/db
//!   values:
//!     password: {{ env "DB_PASSWORD" "changeme" }}
//!     ca: {{ file("/etc/ssl/ca.pem") | b64encode }}
//!     upstream: {{ vault "secret/shared/db" "password" }}
//! ```
//!
//! Expansion has no data context: every action is a function call.

mod functions;
mod parser;
mod registry;

pub use functions::{MacroError, MacroLookupError};
pub use registry::{FunctionRegistry, MacroFn, RegistryError};

use serde_json::Value;

use parser::{Arg, Node, Pipeline};

/// Errors raised while expanding a template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Unable to parse template: line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Unable to execute template: line {line}: error calling {function}: {source}")]
    Execution {
        line: usize,
        function: String,
        #[source]
        source: MacroError,
    },
}

/// Expands templates using the functions of a registry.
#[derive(Debug, Clone, Copy)]
pub struct Expander<'a> {
    registry: &'a FunctionRegistry,
}

impl<'a> Expander<'a> {
    pub fn new(registry: &'a FunctionRegistry) -> Self {
        Self { registry }
    }

    /// Expands every action in `source`.
    pub fn expand(&self, source: &str) -> Result<String, TemplateError> {
        let nodes = parser::parse(source, self.registry)?;

        let mut out = String::with_capacity(source.len());
        for node in &nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action { pipeline, line } => {
                    out.push_str(&render(&self.eval(pipeline, *line)?));
                }
            }
        }
        Ok(out)
    }

    /// Expands a raw byte buffer, which must be UTF-8.
    pub fn expand_bytes(&self, source: &[u8]) -> Result<Vec<u8>, TemplateError> {
        let source = std::str::from_utf8(source).map_err(|e| TemplateError::Syntax {
            line: 1 + source[..e.valid_up_to()]
                .iter()
                .filter(|b| **b == b'\n')
                .count(),
            message: format!("input is not valid UTF-8: {e}"),
        })?;
        self.expand(source).map(String::into_bytes)
    }

    /// Runs a pipeline, feeding each result as the last argument of the next command.
    fn eval(&self, pipeline: &Pipeline, line: usize) -> Result<Value, TemplateError> {
        let mut previous: Option<Value> = None;

        for command in &pipeline.commands {
            let mut args = Vec::with_capacity(command.args.len() + 1);
            for arg in &command.args {
                args.push(match arg {
                    Arg::Literal(value) => value.clone(),
                    Arg::Pipeline(inner) => render(&self.eval(inner, line)?),
                });
            }
            if let Some(value) = previous.take() {
                args.push(render(&value));
            }

            let function = self.registry.lookup(&command.function).ok_or_else(|| {
                TemplateError::Syntax {
                    line,
                    message: format!("function {:?} not defined", command.function),
                }
            })?;

            tracing::trace!(function = %command.function, "Calling template function");
            let value = function(&args).map_err(|source| TemplateError::Execution {
                line,
                function: command.function.clone(),
                source,
            })?;
            previous = Some(value);
        }

        Ok(previous.unwrap_or(Value::Null))
    }
}

/// Text substituted for a function result.
///
/// Sequences and mappings are written as JSON, which YAML reads as flow style.
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            value.to_string()
        }
    }
}
